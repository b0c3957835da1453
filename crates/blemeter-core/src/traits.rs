//! Transport abstractions for meter connections.
//!
//! The connection machine is written against [`Transport`] and [`Link`] so
//! the same code drives real Bluetooth peripherals and the in-memory
//! [`MockTransport`](crate::mock::MockTransport) used in tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;

/// Callback invoked with the payload of every notification on a channel.
pub type NotificationCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// A device seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    /// Connection identifier (MAC address, or peripheral UUID on macOS).
    pub address: String,
    /// Advertised local name, if any.
    pub name: Option<String>,
    /// Signal strength in dBm.
    pub rssi: Option<i16>,
}

impl Advertisement {
    /// Create an advertisement record.
    pub fn new(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: Some(name.into()),
            rssi: None,
        }
    }
}

/// An open connection to one device.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use blemeter_core::{Link, Result};
///
/// async fn listen<L: Link>(link: &L, channel: uuid::Uuid) -> Result<()> {
///     link.subscribe(channel, Arc::new(|frame: &[u8]| println!("{:02X?}", frame)))
///         .await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait Link: Send + Sync {
    /// Start delivering notifications from `channel` to `callback`.
    async fn subscribe(&self, channel: Uuid, callback: NotificationCallback) -> Result<()>;

    /// Write `payload` to `channel`, optionally waiting for an acknowledgment.
    async fn write(&self, channel: Uuid, payload: &[u8], with_response: bool) -> Result<()>;

    /// Stop delivering notifications from `channel`.
    async fn unsubscribe(&self, channel: Uuid) -> Result<()>;

    /// Release the connection.
    async fn disconnect(&self) -> Result<()>;
}

/// A way of reaching devices: Bluetooth in production, a mock in tests.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by [`Transport::connect`].
    type Link: Link + 'static;

    /// Connect to the device with the given address.
    async fn connect(&self, address: &str) -> Result<Self::Link>;

    /// Listen for advertisements for `duration`.
    async fn scan(&self, duration: Duration) -> Result<Vec<Advertisement>>;
}
