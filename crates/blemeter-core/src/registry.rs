//! Registered meters.
//!
//! The registry is plain storage: address to [`DeviceConfig`]. Auto-detect
//! and static configuration both end in [`DeviceRegistry::register`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use blemeter_types::MessageSpec;

use crate::decoder::Decoder;
use crate::error::Result;

/// When a device last delivered a frame.
///
/// Stored as milliseconds since the registry's time origin, with zero
/// meaning "never". Written only by the owning device's notification
/// callback and watchdog, so a relaxed atomic is enough.
#[derive(Debug)]
pub struct LastSeen {
    origin: Instant,
    millis: AtomicU64,
}

impl Default for LastSeen {
    fn default() -> Self {
        Self::new()
    }
}

impl LastSeen {
    /// A timestamp that has never been touched.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            millis: AtomicU64::new(0),
        }
    }

    /// Record that a frame arrived now.
    pub fn touch(&self) {
        // +1 so a frame at the origin instant is not mistaken for "never"
        let millis = self.origin.elapsed().as_millis() as u64 + 1;
        self.millis.store(millis, Ordering::Relaxed);
    }

    /// Forget the last frame.
    pub fn reset(&self) {
        self.millis.store(0, Ordering::Relaxed);
    }

    /// Whether any frame has arrived since the last reset.
    pub fn is_never(&self) -> bool {
        self.millis.load(Ordering::Relaxed) == 0
    }

    /// Time of the last frame, if any.
    pub fn get(&self) -> Option<Instant> {
        match self.millis.load(Ordering::Relaxed) {
            0 => None,
            millis => Some(self.origin + Duration::from_millis(millis - 1)),
        }
    }

    /// How long the device has been silent, counting from no earlier than `floor`.
    ///
    /// Returns `None` when no frame has arrived yet. A frame older than
    /// `floor` (left over from a previous connection) counts as arriving at
    /// `floor`.
    pub fn silence_since(&self, floor: Instant) -> Option<Duration> {
        let seen = self.get()?;
        Some(Instant::now().saturating_duration_since(seen.max(floor)))
    }
}

/// Everything needed to connect to one meter and decode its frames.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Connection address.
    pub address: String,
    /// Characteristic carrying display frames.
    pub notify: Uuid,
    /// Frame decoder for this device.
    pub decoder: Arc<Decoder>,
    /// Written once after subscribing.
    pub init: Option<MessageSpec>,
    /// Written periodically while active.
    pub poll: Option<MessageSpec>,
    /// Written before a graceful disconnect.
    pub stop: Option<MessageSpec>,
    /// Human-readable name.
    pub alias: Option<String>,
    /// Carry the last reading of a flushed batch into the next one.
    pub recycle: bool,
    /// Liveness timestamp.
    pub last_seen: Arc<LastSeen>,
}

impl DeviceConfig {
    /// Register a device with an explicit channel and decoder and no messages.
    pub fn new(address: impl Into<String>, notify: Uuid, decoder: Decoder) -> Self {
        Self {
            address: address.into(),
            notify,
            decoder: Arc::new(decoder),
            init: None,
            poll: None,
            stop: None,
            alias: None,
            recycle: false,
            last_seen: Arc::new(LastSeen::new()),
        }
    }

    /// Configure a device from a supported model name.
    ///
    /// Channel and messages come from the model table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownModel`](crate::Error::UnknownModel) if the model is not supported.
    pub fn for_model(model: &str, address: impl Into<String>) -> Result<Self> {
        let decoder = Decoder::for_model(model)?;
        let config = decoder.config();
        let (notify, init, poll, stop) = (
            config.notify,
            config.init.clone(),
            config.poll.clone(),
            config.stop.clone(),
        );
        Ok(Self {
            init,
            poll,
            stop,
            ..Self::new(address, notify, decoder)
        })
    }

    /// Set the alias.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Set the init message.
    #[must_use]
    pub fn init(mut self, message: MessageSpec) -> Self {
        self.init = Some(message);
        self
    }

    /// Set the poll message.
    #[must_use]
    pub fn poll(mut self, message: MessageSpec) -> Self {
        self.poll = Some(message);
        self
    }

    /// Set the stop message.
    #[must_use]
    pub fn stop(mut self, message: MessageSpec) -> Self {
        self.stop = Some(message);
        self
    }

    /// Set whether the last reading survives a flush.
    #[must_use]
    pub fn recycle(mut self, recycle: bool) -> Self {
        self.recycle = recycle;
        self
    }

    /// Canonical model name of the decoder.
    pub fn model(&self) -> &'static str {
        self.decoder.model()
    }

    /// Alias if set, else the address.
    pub fn display_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.address)
    }
}

/// Address-keyed set of registered devices.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: BTreeMap<String, Arc<DeviceConfig>>,
}

impl DeviceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a device; returns the entry it replaced.
    pub fn register(&mut self, config: DeviceConfig) -> Option<Arc<DeviceConfig>> {
        self.devices
            .insert(config.address.clone(), Arc::new(config))
    }

    /// Look up a device by address.
    pub fn get(&self, address: &str) -> Option<&Arc<DeviceConfig>> {
        self.devices.get(address)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Iterate over devices in address order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<DeviceConfig>> {
        self.devices.values()
    }

    /// Addresses of devices whose last reading survives a flush.
    pub fn recycle_addresses(&self) -> Vec<String> {
        self.iter()
            .filter(|d| d.recycle)
            .map(|d| d.address.clone())
            .collect()
    }
}
