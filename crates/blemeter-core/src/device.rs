//! Bluetooth transport backed by btleplug.
//!
//! [`BleTransport`] owns the adapter and opens a [`BleLink`] per meter.
//! Every BLE operation is wrapped in a timeout from [`ConnectionConfig`] so
//! a wedged stack surfaces as a transient [`Error::Timeout`] instead of a
//! hang.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{Characteristic, Peripheral as _, WriteType};
use btleplug::platform::{Adapter, Peripheral};
use futures::StreamExt;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::scan::{find_peripheral, get_adapter, scan_with_adapter};
use crate::traits::{Advertisement, Link, NotificationCallback, Transport};

/// Default timeout for establishing a BLE connection.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Default timeout for BLE characteristic write operations.
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for service discovery.
const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Default scan window when a peripheral is not yet known to the adapter.
const DEFAULT_SCAN_TIME: Duration = Duration::from_secs(5);

/// Configuration for BLE connection timeouts.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use blemeter_core::ConnectionConfig;
///
/// let config = ConnectionConfig::new()
///     .connection_timeout(Duration::from_secs(30))
///     .write_timeout(Duration::from_secs(5));
/// assert_eq!(config.write_timeout, Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Timeout for establishing a BLE connection.
    pub connection_timeout: Duration,
    /// Timeout for BLE write operations.
    pub write_timeout: Duration,
    /// Timeout for service discovery after connection.
    pub discovery_timeout: Duration,
    /// Scan window used to find a peripheral the adapter has not seen yet.
    pub scan_time: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connection_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            scan_time: DEFAULT_SCAN_TIME,
        }
    }
}

impl ConnectionConfig {
    /// Create a new connection config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the write timeout.
    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the service discovery timeout.
    #[must_use]
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    /// Set the scan window for unknown peripherals.
    #[must_use]
    pub fn scan_time(mut self, time: Duration) -> Self {
        self.scan_time = time;
        self
    }
}

/// Real Bluetooth transport on the first system adapter.
///
/// Must be created on the runtime that will use it.
pub struct BleTransport {
    adapter: Adapter,
    config: ConnectionConfig,
}

impl std::fmt::Debug for BleTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BleTransport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BleTransport {
    /// Open the first Bluetooth adapter.
    pub async fn new(config: ConnectionConfig) -> Result<Self> {
        let adapter = get_adapter().await?;
        Ok(Self { adapter, config })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

#[async_trait]
impl Transport for BleTransport {
    type Link = BleLink;

    #[tracing::instrument(level = "info", skip_all, fields(address = %address))]
    async fn connect(&self, address: &str) -> Result<BleLink> {
        let config = self.config;
        let peripheral = find_peripheral(&self.adapter, address, config.scan_time).await?;

        debug!("Connecting...");
        timeout(config.connection_timeout, peripheral.connect())
            .await
            .map_err(|_| Error::timeout("connect to device", config.connection_timeout))??;

        let discovered = timeout(config.discovery_timeout, peripheral.discover_services())
            .await
            .map_err(|_| Error::timeout("discover services", config.discovery_timeout))
            .and_then(|r| r.map_err(Error::from));
        if let Err(e) = discovered {
            // still connected at the radio level; release it before the retry
            if let Err(disconnect_err) = peripheral.disconnect().await {
                warn!(error = %disconnect_err, "Disconnect after failed discovery failed");
            }
            return Err(e);
        }

        let services = peripheral.services();
        let mut characteristics = HashMap::new();
        for service in &services {
            for characteristic in &service.characteristics {
                characteristics.insert(characteristic.uuid, characteristic.clone());
            }
        }
        info!(
            "Connected ({} services, {} characteristics)",
            services.len(),
            characteristics.len()
        );

        Ok(BleLink {
            address: address.to_string(),
            peripheral,
            service_count: services.len(),
            characteristics: RwLock::new(characteristics),
            notification_handles: Mutex::new(HashMap::new()),
            disconnected: AtomicBool::new(false),
            config,
        })
    }

    async fn scan(&self, duration: Duration) -> Result<Vec<Advertisement>> {
        scan_with_adapter(&self.adapter, duration).await
    }
}

/// A connected Bluetooth peripheral.
///
/// Call [`Link::disconnect`] before dropping; a dropped link that is still
/// connected logs a warning and disconnects in the background.
pub struct BleLink {
    address: String,
    peripheral: Peripheral,
    service_count: usize,
    characteristics: RwLock<HashMap<Uuid, Characteristic>>,
    /// Notification forwarding tasks by characteristic.
    notification_handles: Mutex<HashMap<Uuid, JoinHandle<()>>>,
    disconnected: AtomicBool,
    config: ConnectionConfig,
}

impl std::fmt::Debug for BleLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BleLink")
            .field("address", &self.address)
            .field("disconnected", &self.disconnected.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl BleLink {
    async fn characteristic(&self, uuid: Uuid) -> Result<Characteristic> {
        self.characteristics
            .read()
            .await
            .get(&uuid)
            .cloned()
            .ok_or_else(|| Error::characteristic_not_found(uuid.to_string(), self.service_count))
    }
}

#[async_trait]
impl Link for BleLink {
    #[tracing::instrument(level = "debug", skip_all, fields(address = %self.address, channel = %channel))]
    async fn subscribe(&self, channel: Uuid, callback: NotificationCallback) -> Result<()> {
        let characteristic = self.characteristic(channel).await?;
        self.peripheral.subscribe(&characteristic).await?;

        let mut stream = self.peripheral.notifications().await?;
        let handle = tokio::spawn(async move {
            while let Some(notification) = stream.next().await {
                if notification.uuid == channel {
                    callback(&notification.value);
                }
            }
        });

        if let Some(previous) = self.notification_handles.lock().await.insert(channel, handle) {
            previous.abort();
        }
        Ok(())
    }

    async fn write(&self, channel: Uuid, payload: &[u8], with_response: bool) -> Result<()> {
        let characteristic = self.characteristic(channel).await?;
        let kind = if with_response {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };
        timeout(
            self.config.write_timeout,
            self.peripheral.write(&characteristic, payload, kind),
        )
        .await
        .map_err(|_| Error::timeout("write characteristic", self.config.write_timeout))?
        .map_err(|e| Error::WriteFailed {
            uuid: channel.to_string(),
            reason: e.to_string(),
        })
    }

    async fn unsubscribe(&self, channel: Uuid) -> Result<()> {
        if let Some(handle) = self.notification_handles.lock().await.remove(&channel) {
            handle.abort();
        }
        let characteristic = self.characteristic(channel).await?;
        self.peripheral.unsubscribe(&characteristic).await?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip_all, fields(address = %self.address))]
    async fn disconnect(&self) -> Result<()> {
        self.disconnected.store(true, Ordering::SeqCst);
        for (_, handle) in self.notification_handles.lock().await.drain() {
            handle.abort();
        }
        self.peripheral.disconnect().await?;
        debug!("Disconnected");
        Ok(())
    }
}

impl Drop for BleLink {
    fn drop(&mut self) {
        if self.disconnected.swap(true, Ordering::SeqCst) {
            return;
        }
        warn!(
            device_address = %self.address,
            "Link dropped without calling disconnect() - performing best-effort cleanup"
        );

        if let Ok(mut handles) = self.notification_handles.try_lock() {
            for (_, handle) in handles.drain() {
                handle.abort();
            }
        }

        let peripheral = self.peripheral.clone();
        let address = self.address.clone();
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                if let Err(e) = peripheral.disconnect().await {
                    debug!(device_address = %address, error = %e, "Best-effort disconnect failed");
                }
            });
        }
    }
}
