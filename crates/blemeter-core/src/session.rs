//! Session orchestration.
//!
//! An [`Orchestrator`] runs one [`DeviceTask`] per registered device on the
//! current runtime. A [`Session`] wraps that in a dedicated OS thread with
//! its own single-threaded tokio runtime, so synchronous consumers can read
//! the [`ReadingStream`] without an async context of their own.
//!
//! The consumer and the session share only the reading channel and a
//! [`CancellationToken`]; cancelling the token is the single stop signal
//! for every device task.

use std::future::Future;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::connection::{DeviceOutcome, DeviceTask};
use crate::error::{Error, Result};
use crate::gate::AdmissionGate;
use crate::registry::DeviceRegistry;
use crate::stream::{ReadingSink, ReadingStream, reading_channel};
use crate::traits::Transport;

/// Timing knobs for the connection machines of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Silence after which a connected device is declared lost.
    pub liveness: Duration,
    /// Pause before reconnecting after a transient failure.
    pub backoff: Duration,
    /// Resolution of the watchdog and poll checks.
    pub tick: Duration,
    /// Pause between subscribing and the first write.
    pub subscribe_settle: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            liveness: Duration::from_secs(2),
            backoff: Duration::from_secs(2),
            tick: Duration::from_millis(100),
            subscribe_settle: Duration::from_millis(500),
        }
    }
}

impl SessionOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the liveness window.
    #[must_use]
    pub fn liveness(mut self, window: Duration) -> Self {
        self.liveness = window;
        self
    }

    /// Set the reconnect backoff.
    #[must_use]
    pub fn backoff(mut self, delay: Duration) -> Self {
        self.backoff = delay;
        self
    }

    /// Set the check tick.
    #[must_use]
    pub fn tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Set the settle pause after subscribing.
    #[must_use]
    pub fn subscribe_settle(mut self, settle: Duration) -> Self {
        self.subscribe_settle = settle;
        self
    }

    /// Validate the options and return an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.tick.is_zero() {
            return Err(Error::invalid_config("tick must be > 0"));
        }
        if self.liveness < self.tick {
            return Err(Error::invalid_config("liveness must be >= tick"));
        }
        Ok(())
    }
}

/// How one device's task ended.
#[derive(Debug)]
pub struct DeviceReport {
    pub address: String,
    pub outcome: DeviceOutcome,
}

/// Runs every registered device concurrently until cancelled.
#[derive(Debug)]
pub struct Orchestrator<T: Transport> {
    transport: Arc<T>,
    registry: DeviceRegistry,
    sink: ReadingSink,
    cancel: CancellationToken,
    options: SessionOptions,
}

impl<T: Transport> Orchestrator<T> {
    pub fn new(
        transport: Arc<T>,
        registry: DeviceRegistry,
        sink: ReadingSink,
        cancel: CancellationToken,
        options: SessionOptions,
    ) -> Self {
        Self {
            transport,
            registry,
            sink,
            cancel,
            options,
        }
    }

    /// Spawn one task per device and wait for all of them.
    ///
    /// Tasks only end once the token is cancelled, either by the consumer
    /// or by the first device that fails for good or panics.
    pub async fn run(self) -> Vec<DeviceReport> {
        let gate = AdmissionGate::new();
        let (addresses, handles): (Vec<_>, Vec<_>) = self
            .registry
            .iter()
            .map(|device| {
                let task = DeviceTask::new(
                    Arc::clone(&self.transport),
                    Arc::clone(device),
                    gate.clone(),
                    self.sink.clone(),
                    self.options,
                    self.cancel.clone(),
                );
                let handle = tokio::spawn(task.run());
                let cancel = self.cancel.clone();
                let watched = async move {
                    let joined = handle.await;
                    // a panicked task takes the session down like a fatal error
                    if joined.is_err() {
                        cancel.cancel();
                    }
                    joined
                };
                (device.address.clone(), watched)
            })
            .unzip();
        info!("Started {} device task(s)", handles.len());

        join_all(handles)
            .await
            .into_iter()
            .zip(addresses)
            .map(|(joined, address)| {
                let outcome = joined.unwrap_or_else(|e| {
                    warn!("{}: device task aborted: {}", address, e);
                    DeviceOutcome::Failed(Error::Unexpected(e.to_string()))
                });
                DeviceReport { address, outcome }
            })
            .collect()
    }
}

/// Entry point for running a logging session on its own thread.
#[derive(Debug)]
pub struct Session;

impl Session {
    /// Start a session over an already constructed transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the registry is empty or the
    /// options are invalid, and [`Error::Io`] if the thread cannot start.
    pub fn start<T: Transport>(
        transport: T,
        registry: DeviceRegistry,
        options: SessionOptions,
    ) -> Result<(SessionHandle, ReadingStream)> {
        Self::start_with(registry, options, move || async move { Ok(transport) })
    }

    /// Start a session whose transport is built inside the session runtime.
    ///
    /// Bluetooth handles belong to the runtime that created them, so the
    /// real transport must be constructed by `factory` on the session
    /// thread.
    pub fn start_with<T, F, Fut>(
        registry: DeviceRegistry,
        options: SessionOptions,
        factory: F,
    ) -> Result<(SessionHandle, ReadingStream)>
    where
        T: Transport,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>>,
    {
        if registry.is_empty() {
            return Err(Error::invalid_config("no meters registered"));
        }
        options.validate()?;

        let cancel = CancellationToken::new();
        let (sink, mut stream) = reading_channel(cancel.clone());
        stream.set_recycle(registry.recycle_addresses());

        let token = cancel.clone();
        let thread = std::thread::Builder::new()
            .name("blemeter-session".to_string())
            .spawn(move || {
                let result = run_session(registry, options, sink, token.clone(), factory);
                // the stream must see the end even if setup failed
                token.cancel();
                result
            })?;

        Ok((
            SessionHandle {
                cancel,
                thread: Some(thread),
            },
            stream,
        ))
    }
}

fn run_session<T, F, Fut>(
    registry: DeviceRegistry,
    options: SessionOptions,
    sink: ReadingSink,
    cancel: CancellationToken,
    factory: F,
) -> Result<Vec<DeviceReport>>
where
    T: Transport,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async move {
        let transport = factory().await?;
        debug!("Session transport ready");
        let orchestrator = Orchestrator::new(Arc::new(transport), registry, sink, cancel, options);
        Ok(orchestrator.run().await)
    })
}

/// Owner's handle on a running session.
///
/// Dropping the handle cancels the session without waiting for it.
#[derive(Debug)]
pub struct SessionHandle {
    cancel: CancellationToken,
    thread: Option<JoinHandle<Result<Vec<DeviceReport>>>>,
}

impl SessionHandle {
    /// The session's stop signal.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether the session thread is still running.
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Cancel the session and wait for every device to shut down.
    pub fn close(mut self) -> Result<Vec<DeviceReport>> {
        self.cancel.cancel();
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| Error::Unexpected("session thread panicked".to_string()))?,
            None => Ok(Vec::new()),
        }
    }

    /// [`close`](Self::close) from async code without blocking the runtime.
    pub async fn shutdown(self) -> Result<Vec<DeviceReport>> {
        tokio::task::spawn_blocking(move || self.close())
            .await
            .map_err(|e| Error::Unexpected(e.to_string()))?
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.cancel.cancel();
        }
    }
}
