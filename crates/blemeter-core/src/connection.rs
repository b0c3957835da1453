//! Per-device connection state machine.
//!
//! ```text
//! Disconnected -> Connecting (gate held) -> Subscribing -> [Initializing]
//!     -> Active (poll, watchdog) -> Closing -> Disconnected
//! ```
//!
//! Transient failures (connect errors, watchdog timeouts) back off and start
//! over until the session is cancelled. Any other failure abandons the
//! device and cancels the whole session.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::time::{Instant, MissedTickBehavior, interval, sleep, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use blemeter_types::{MessageSpec, Reading};

use crate::error::{Error, Result};
use crate::gate::AdmissionGate;
use crate::registry::DeviceConfig;
use crate::session::SessionOptions;
use crate::stream::ReadingSink;
use crate::traits::{Link, NotificationCallback, Transport};

/// Where a device task is in its connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// Waiting for or holding the admission gate while connecting.
    Connecting,
    Subscribing,
    /// Sending the init message.
    Initializing,
    /// Receiving frames, polling if configured.
    Active,
    Closing,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Subscribing => "subscribing",
            ConnectionState::Initializing => "initializing",
            ConnectionState::Active => "active",
            ConnectionState::Closing => "closing",
        };
        f.write_str(name)
    }
}

/// How a device task ended.
#[derive(Debug)]
pub enum DeviceOutcome {
    /// The session was cancelled and the device shut down cleanly.
    Stopped,
    /// The device hit an unrecoverable failure.
    Failed(Error),
}

impl DeviceOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, DeviceOutcome::Failed(_))
    }
}

/// The state machine for one registered device.
pub struct DeviceTask<T: Transport> {
    transport: Arc<T>,
    device: Arc<DeviceConfig>,
    gate: AdmissionGate,
    sink: ReadingSink,
    options: SessionOptions,
    cancel: CancellationToken,
    state: ConnectionState,
}

impl<T: Transport> fmt::Debug for DeviceTask<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceTask")
            .field("address", &self.device.address)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> DeviceTask<T> {
    pub fn new(
        transport: Arc<T>,
        device: Arc<DeviceConfig>,
        gate: AdmissionGate,
        sink: ReadingSink,
        options: SessionOptions,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            device,
            gate,
            sink,
            options,
            cancel,
            state: ConnectionState::Disconnected,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Run until the session is cancelled or the device fails for good.
    pub async fn run(mut self) -> DeviceOutcome {
        let name = self.device.display_name().to_string();
        while !self.cancel.is_cancelled() {
            match self.connection().await {
                Ok(()) | Err(Error::Cancelled) => {}
                Err(e) if e.is_transient() => {
                    if self.cancel.is_cancelled() {
                        break;
                    }
                    warn!("{}: {}", name, e);
                    info!("{}: retrying in {:?}", name, self.options.backoff);
                    if !self.pause(self.options.backoff).await {
                        break;
                    }
                }
                Err(e) => {
                    // only the first failure announces the shutdown
                    if !self.cancel.is_cancelled() {
                        error!("{}: {}", name, e);
                        self.cancel.cancel();
                    }
                    return DeviceOutcome::Failed(e);
                }
            }
        }
        DeviceOutcome::Stopped
    }

    fn transition(&mut self, next: ConnectionState) {
        debug!("{}: {} -> {}", self.device.display_name(), self.state, next);
        self.state = next;
    }

    /// Sleep unless cancelled first; `false` means cancelled.
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = sleep(duration) => true,
        }
    }

    /// Callback that timestamps, decodes and queues every frame.
    fn callback(&self) -> NotificationCallback {
        let device = Arc::clone(&self.device);
        let sink = self.sink.clone();
        Arc::new(move |frame: &[u8]| {
            device.last_seen.touch();
            let timestamp = OffsetDateTime::now_utc();
            for output in device.decoder.decode(frame) {
                sink.push(
                    device.display_name(),
                    Reading {
                        timestamp,
                        address: device.address.clone(),
                        lcd: output.lcd,
                        measurement: output.measurement,
                    },
                );
            }
        })
    }

    /// One pass from connect to disconnect.
    #[tracing::instrument(level = "debug", skip_all, fields(address = %self.device.address))]
    async fn connection(&mut self) -> Result<()> {
        self.transition(ConnectionState::Connecting);
        let permit = self
            .gate
            .enter(&self.cancel)
            .await
            .ok_or(Error::Cancelled)?;
        let link = match self.transport.connect(&self.device.address).await {
            Ok(link) => link,
            Err(e) => {
                self.transition(ConnectionState::Disconnected);
                return Err(e);
            }
        };

        self.transition(ConnectionState::Subscribing);
        if let Err(e) = link.subscribe(self.device.notify, self.callback()).await {
            drop(permit);
            self.transition(ConnectionState::Closing);
            release(&link, self.device.notify).await;
            self.transition(ConnectionState::Disconnected);
            return Err(e);
        }
        drop(permit);
        info!("{}: subscribed", self.device.display_name());

        let result = self.active(&link).await;

        self.transition(ConnectionState::Closing);
        if result.is_ok()
            && let Some(stop) = &self.device.stop
        {
            match send(&link, stop).await {
                Ok(()) => sleep(stop.interval).await,
                Err(e) => warn!("{}: stop message failed: {}", self.device.display_name(), e),
            }
        }
        release(&link, self.device.notify).await;
        self.transition(ConnectionState::Disconnected);
        result
    }

    /// Settle, initialise, then poll and watch until cancelled or silent.
    async fn active(&mut self, link: &T::Link) -> Result<()> {
        if !self.pause(self.options.subscribe_settle).await {
            return Ok(());
        }

        if let Some(init) = self.device.init.clone() {
            self.transition(ConnectionState::Initializing);
            send(link, &init).await?;
            if !self.pause(init.interval).await {
                return Ok(());
            }
        }

        self.transition(ConnectionState::Active);
        let active_since = Instant::now();
        let mut ticker = interval(self.options.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first poll one interval in, then on a fixed grid
        let first_poll = self.device.poll.as_ref().map_or(Duration::ZERO, |p| p.interval);
        let mut next_poll = active_since + first_poll;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                _ = ticker.tick() => {}
            }

            let last_seen = &self.device.last_seen;
            if let Some(silence) = last_seen.silence_since(active_since)
                && silence > self.options.liveness
            {
                last_seen.reset();
                return Err(Error::LinkLost { silence });
            }

            let Some(poll) = &self.device.poll else {
                continue;
            };
            let now = Instant::now();
            if next_poll > now + self.options.tick {
                continue;
            }
            tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                _ = sleep_until(next_poll) => {}
            }
            send(link, poll).await?;
            next_poll += poll.interval;
            // a stalled write skips missed polls instead of bursting
            if next_poll < now {
                next_poll = now + poll.interval;
            }
        }
    }
}

async fn send<L: Link>(link: &L, message: &MessageSpec) -> Result<()> {
    link.write(message.channel, &message.payload, message.with_response)
        .await
}

/// Best-effort unsubscribe and disconnect.
async fn release<L: Link>(link: &L, channel: uuid::Uuid) {
    if let Err(e) = link.unsubscribe(channel).await {
        debug!("Unsubscribe failed: {}", e);
    }
    if let Err(e) = link.disconnect().await {
        debug!("Disconnect failed: {}", e);
    }
}
