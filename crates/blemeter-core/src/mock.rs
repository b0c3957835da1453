//! In-memory transport for testing.
//!
//! [`MockTransport`] implements [`Transport`] without any Bluetooth hardware.
//! Tests push frames into subscribed devices with [`MockTransport::notify`]
//! and inspect what the connection machine did afterwards: how often it
//! connected, what it wrote and when, and how many handshakes overlapped.
//!
//! # Features
//!
//! - **Failure injection**: fail the next N connects to an address, or make
//!   subscribing fail with an unrecoverable error
//! - **Latency simulation**: delay every connect to exercise the admission gate
//! - **Scan results**: advertise fixed devices for discovery tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, sleep};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::traits::{Advertisement, Link, NotificationCallback, Transport};

/// One write observed by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenMessage {
    /// When the write happened (tokio clock, so paused tests are exact).
    pub at: Instant,
    pub channel: Uuid,
    pub payload: Vec<u8>,
    pub with_response: bool,
}

#[derive(Default)]
struct MockState {
    advertisements: Mutex<Vec<Advertisement>>,
    /// Simulated connect latency in milliseconds (0 = no delay).
    connect_latency_ms: AtomicU64,
    /// Connects left to fail, per address.
    connect_failures: Mutex<HashMap<String, u32>>,
    fatal_subscribe: Mutex<HashSet<String>>,
    panic_subscribe: Mutex<HashSet<String>>,
    subscriptions: Mutex<HashMap<String, NotificationCallback>>,
    connects: Mutex<HashMap<String, u32>>,
    disconnects: Mutex<HashMap<String, u32>>,
    writes: Mutex<HashMap<String, Vec<WrittenMessage>>>,
    handshakes: AtomicUsize,
    max_handshakes: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockState {
    fn begin_handshake(&self) {
        let now = self.handshakes.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_handshakes.fetch_max(now, Ordering::SeqCst);
    }

    fn end_handshake(&self) {
        self.handshakes.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A fake set of meters reachable without hardware.
///
/// Cloning shares the same simulated devices.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use blemeter_core::MockTransport;
///
/// let mock = MockTransport::new()
///     .with_connect_latency(Duration::from_millis(300))
///     .with_connect_failures("FC:58:FA:00:00:01", 2);
/// assert_eq!(mock.connect_count("FC:58:FA:00:00:01"), 0);
/// ```
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<MockState>,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("subscribed", &lock(&self.state.subscriptions).len())
            .field("handshakes", &self.state.handshakes.load(Ordering::Relaxed))
            .finish()
    }
}

impl MockTransport {
    /// A transport where every connect succeeds immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// A random address under a vendor prefix such as `"FC:58:FA:"`.
    pub fn random_address(prefix: &str) -> String {
        let [a, b, c] = rand::random::<[u8; 3]>();
        format!("{}{:02X}:{:02X}:{:02X}", prefix, a, b, c)
    }

    /// Report `advertisement` from [`Transport::scan`].
    #[must_use]
    pub fn with_advertisement(self, advertisement: Advertisement) -> Self {
        lock(&self.state.advertisements).push(advertisement);
        self
    }

    /// Delay every connect by `latency`.
    #[must_use]
    pub fn with_connect_latency(self, latency: Duration) -> Self {
        self.state
            .connect_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
        self
    }

    /// Fail the next `count` connects to `address`, then succeed.
    #[must_use]
    pub fn with_connect_failures(self, address: &str, count: u32) -> Self {
        lock(&self.state.connect_failures).insert(address.to_string(), count);
        self
    }

    /// Make subscribing on `address` fail with an unrecoverable error.
    #[must_use]
    pub fn with_fatal_subscribe(self, address: &str) -> Self {
        lock(&self.state.fatal_subscribe).insert(address.to_string());
        self
    }

    /// Make subscribing on `address` panic, as a crashing driver would.
    #[must_use]
    pub fn with_subscribe_panic(self, address: &str) -> Self {
        lock(&self.state.panic_subscribe).insert(address.to_string());
        self
    }

    /// Deliver `frame` to the device's subscriber.
    ///
    /// Returns `false` if nothing is subscribed on that address.
    pub fn notify(&self, address: &str, frame: &[u8]) -> bool {
        let callback = lock(&self.state.subscriptions).get(address).cloned();
        match callback {
            Some(callback) => {
                callback(frame);
                true
            }
            None => false,
        }
    }

    /// Whether a device currently has an active subscription.
    pub fn is_subscribed(&self, address: &str) -> bool {
        lock(&self.state.subscriptions).contains_key(address)
    }

    /// Connect attempts made to `address`, failed ones included.
    pub fn connect_count(&self, address: &str) -> u32 {
        lock(&self.state.connects).get(address).copied().unwrap_or(0)
    }

    /// Disconnects of `address`.
    pub fn disconnect_count(&self, address: &str) -> u32 {
        lock(&self.state.disconnects).get(address).copied().unwrap_or(0)
    }

    /// Everything written to `address`, in order.
    pub fn writes(&self, address: &str) -> Vec<WrittenMessage> {
        lock(&self.state.writes)
            .get(address)
            .cloned()
            .unwrap_or_default()
    }

    /// The most connect+subscribe handshakes ever in flight at once.
    pub fn max_concurrent_handshakes(&self) -> usize {
        self.state.max_handshakes.load(Ordering::SeqCst)
    }

    fn take_failure(&self, address: &str) -> bool {
        let mut failures = lock(&self.state.connect_failures);
        match failures.get_mut(address) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Link = MockLink;

    async fn connect(&self, address: &str) -> Result<MockLink> {
        *lock(&self.state.connects)
            .entry(address.to_string())
            .or_default() += 1;
        self.state.begin_handshake();

        let latency = self.state.connect_latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            sleep(Duration::from_millis(latency)).await;
        }

        if self.take_failure(address) {
            self.state.end_handshake();
            return Err(Error::device_not_found(address));
        }

        Ok(MockLink {
            address: address.to_string(),
            state: Arc::clone(&self.state),
            handshaking: AtomicBool::new(true),
            connected: AtomicBool::new(true),
        })
    }

    async fn scan(&self, duration: Duration) -> Result<Vec<Advertisement>> {
        sleep(duration).await;
        Ok(lock(&self.state.advertisements).clone())
    }
}

/// A connection produced by [`MockTransport`].
pub struct MockLink {
    address: String,
    state: Arc<MockState>,
    handshaking: AtomicBool,
    connected: AtomicBool,
}

impl std::fmt::Debug for MockLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockLink")
            .field("address", &self.address)
            .field("connected", &self.connected.load(Ordering::Relaxed))
            .finish()
    }
}

impl MockLink {
    fn finish_handshake(&self) {
        if self.handshaking.swap(false, Ordering::SeqCst) {
            self.state.end_handshake();
        }
    }

    fn check_connected(&self) -> Result<()> {
        if self.connected.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }
}

#[async_trait]
impl Link for MockLink {
    async fn subscribe(&self, channel: Uuid, callback: NotificationCallback) -> Result<()> {
        let crash = lock(&self.state.panic_subscribe).contains(&self.address);
        if crash {
            panic!("driver crashed subscribing on {}", self.address);
        }
        let result = if lock(&self.state.fatal_subscribe).contains(&self.address) {
            Err(Error::characteristic_not_found(channel.to_string(), 0))
        } else {
            self.check_connected().map(|()| {
                lock(&self.state.subscriptions).insert(self.address.clone(), callback);
            })
        };
        self.finish_handshake();
        result
    }

    async fn write(&self, channel: Uuid, payload: &[u8], with_response: bool) -> Result<()> {
        self.check_connected()?;
        lock(&self.state.writes)
            .entry(self.address.clone())
            .or_default()
            .push(WrittenMessage {
                at: Instant::now(),
                channel,
                payload: payload.to_vec(),
                with_response,
            });
        Ok(())
    }

    async fn unsubscribe(&self, _channel: Uuid) -> Result<()> {
        lock(&self.state.subscriptions).remove(&self.address);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.finish_handshake();
        if self.connected.swap(false, Ordering::Relaxed) {
            lock(&self.state.subscriptions).remove(&self.address);
            *lock(&self.state.disconnects)
                .entry(self.address.clone())
                .or_default() += 1;
        }
        Ok(())
    }
}

impl Drop for MockLink {
    fn drop(&mut self) {
        self.finish_handshake();
    }
}
