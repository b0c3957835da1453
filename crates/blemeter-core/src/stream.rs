//! The reading stream.
//!
//! Every device's notification callback pushes into one unbounded queue
//! through a [`ReadingSink`]. The consumer owns the [`ReadingStream`] and
//! either takes readings one at a time (live mode) or drains everything
//! queued at once with [`ReadingStream::flush`] (summary mode).

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use blemeter_types::Reading;

/// How often [`ReadingStream::blocking_next`] checks the queue.
const BLOCKING_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Per-label reading counts since the last reset, keyed `"name (unit)"`.
#[derive(Debug, Default)]
pub struct LiveCounter {
    counts: Mutex<BTreeMap<String, u64>>,
}

impl LiveCounter {
    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, u64>> {
        self.counts.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Count one reading.
    pub fn increment(&self, name: &str, unit: &str) {
        *self.lock().entry(format!("{} ({})", name, unit)).or_default() += 1;
    }

    /// Current counts in key order.
    pub fn snapshot(&self) -> Vec<(String, u64)> {
        self.lock().iter().map(|(k, v)| (k.clone(), *v)).collect()
    }

    pub fn reset(&self) {
        self.lock().clear();
    }
}

/// Writer side of the stream, one clone per device callback.
#[derive(Debug, Clone)]
pub struct ReadingSink {
    tx: mpsc::UnboundedSender<Reading>,
    counter: Arc<LiveCounter>,
}

impl ReadingSink {
    /// Queue a reading from the device known as `name`.
    pub fn push(&self, name: &str, reading: Reading) {
        if let Some(unit) = reading.unit() {
            self.counter.increment(name, unit);
        }
        if self.tx.send(reading).is_err() {
            debug!("Reading stream closed, dropping reading from {}", name);
        }
    }
}

/// Options for [`ReadingStream::flush`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushOptions {
    /// Discard the drained readings instead of returning them.
    pub discard: bool,
    /// Clear the live counter.
    pub reset_counter: bool,
}

impl Default for FlushOptions {
    fn default() -> Self {
        Self {
            discard: false,
            reset_counter: true,
        }
    }
}

impl FlushOptions {
    /// Drain and throw away, resetting the counter.
    pub fn discarding() -> Self {
        Self {
            discard: true,
            reset_counter: true,
        }
    }

    #[must_use]
    pub fn discard(mut self, discard: bool) -> Self {
        self.discard = discard;
        self
    }

    #[must_use]
    pub fn reset_counter(mut self, reset: bool) -> Self {
        self.reset_counter = reset;
        self
    }
}

/// Readings drained by one flush.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// End of the previous flush (or stream creation).
    pub started: OffsetDateTime,
    /// When this flush began.
    pub stopped: OffsetDateTime,
    /// Readings in arrival order per device.
    pub readings: Vec<Reading>,
}

impl Batch {
    /// Length of the window the batch covers.
    pub fn duration(&self) -> Duration {
        (self.stopped - self.started).try_into().unwrap_or_default()
    }
}

/// Reader side of the stream.
#[derive(Debug)]
pub struct ReadingStream {
    rx: mpsc::UnboundedReceiver<Reading>,
    // recycled readings, delivered before anything in `rx`
    pending: VecDeque<Reading>,
    counter: Arc<LiveCounter>,
    recycle: HashSet<String>,
    last_flush: OffsetDateTime,
    cancel: CancellationToken,
}

/// Create a connected sink and stream.
///
/// The stream stops yielding once `cancel` fires.
pub fn reading_channel(cancel: CancellationToken) -> (ReadingSink, ReadingStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    let counter = Arc::new(LiveCounter::default());
    let sink = ReadingSink {
        tx,
        counter: Arc::clone(&counter),
    };
    let stream = ReadingStream {
        rx,
        pending: VecDeque::new(),
        counter,
        recycle: HashSet::new(),
        last_flush: OffsetDateTime::now_utc(),
        cancel,
    };
    (sink, stream)
}

impl ReadingStream {
    /// Set the addresses whose last reading survives a flush.
    pub fn set_recycle<I, S>(&mut self, addresses: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.recycle = addresses.into_iter().map(Into::into).collect();
    }

    /// The live counter shared with the sinks.
    pub fn counter(&self) -> &Arc<LiveCounter> {
        &self.counter
    }

    /// Number of readings waiting.
    pub fn len(&self) -> usize {
        self.pending.len() + self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait for the next reading.
    ///
    /// Returns `None` once the session is cancelled or every sink is gone.
    pub async fn next(&mut self) -> Option<Reading> {
        if let Some(reading) = self.pending.pop_front() {
            return Some(reading);
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            reading = self.rx.recv() => reading,
        }
    }

    /// Wait for the next reading from synchronous code.
    ///
    /// Polls every 50 ms and gives up once the session is cancelled. Do not
    /// call from inside an async runtime.
    pub fn blocking_next(&mut self) -> Option<Reading> {
        loop {
            if let Some(reading) = self.pending.pop_front() {
                return Some(reading);
            }
            match self.rx.try_recv() {
                Ok(reading) => return Some(reading),
                Err(TryRecvError::Disconnected) => return None,
                Err(TryRecvError::Empty) => {}
            }
            if self.cancel.is_cancelled() {
                return None;
            }
            std::thread::sleep(BLOCKING_POLL_INTERVAL);
        }
    }

    /// Blocking iterator over readings; see [`blocking_next`](Self::blocking_next).
    pub fn blocking_iter(&mut self) -> impl Iterator<Item = Reading> + '_ {
        std::iter::from_fn(move || self.blocking_next())
    }

    /// Drain everything queued at this instant as one batch.
    ///
    /// Readings pushed while the drain runs belong to the next batch. For
    /// every recycle address, the batch's most recent reading with a value
    /// is queued again so it also appears in the next batch.
    pub fn flush(&mut self, options: FlushOptions) -> Batch {
        let stopped = OffsetDateTime::now_utc();
        let queued = self.rx.len();

        let mut readings: Vec<Reading> = self.pending.drain(..).collect();
        readings.reserve(queued);
        for _ in 0..queued {
            match self.rx.try_recv() {
                Ok(reading) => readings.push(reading),
                Err(_) => break,
            }
        }

        if options.reset_counter {
            self.counter.reset();
        }

        for address in &self.recycle {
            if let Some(last) = readings
                .iter()
                .rev()
                .find(|r| r.address == *address && !r.is_absent())
            {
                self.pending.push_back(last.clone());
            }
        }

        let started = std::mem::replace(&mut self.last_flush, stopped);
        if options.discard {
            readings.clear();
        }
        Batch {
            started,
            stopped,
            readings,
        }
    }

    /// Wait until every address has sent something, then discard what arrived.
    ///
    /// Returns the addresses that stayed silent for the whole `timeout`.
    pub async fn wait_for_devices(
        &mut self,
        addresses: &[String],
        timeout: Duration,
    ) -> HashSet<String> {
        let mut missing: HashSet<String> = addresses.iter().cloned().collect();
        let deadline = Instant::now() + timeout;

        while !missing.is_empty() {
            let reading = tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = sleep_until(deadline) => break,
                reading = self.rx.recv() => match reading {
                    Some(reading) => reading,
                    None => break,
                },
            };
            if missing.remove(&reading.address) {
                debug!("{} is reporting", reading.address);
            }
            self.pending.push_back(reading);
        }

        self.flush(FlushOptions::discarding());
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blemeter_types::Measurement;

    fn reading(address: &str, value: Option<f64>) -> Reading {
        Reading {
            timestamp: OffsetDateTime::now_utc(),
            address: address.to_string(),
            lcd: None,
            measurement: value.map(|v| Measurement::new(v, "volts")),
        }
    }

    #[test]
    fn test_flush_drains_in_order() {
        let (sink, mut stream) = reading_channel(CancellationToken::new());
        sink.push("a", reading("a", Some(1.0)));
        sink.push("a", reading("a", Some(2.0)));
        sink.push("b", reading("b", None));

        let batch = stream.flush(FlushOptions::default());
        let values: Vec<_> = batch.readings.iter().map(|r| r.value()).collect();
        assert_eq!(values, vec![Some(1.0), Some(2.0), None]);
        assert!(batch.started <= batch.stopped);
        assert!(stream.is_empty());
    }

    #[test]
    fn test_later_readings_go_to_next_batch() {
        let (sink, mut stream) = reading_channel(CancellationToken::new());
        sink.push("a", reading("a", Some(1.0)));
        let first = stream.flush(FlushOptions::default());
        sink.push("a", reading("a", Some(2.0)));
        let second = stream.flush(FlushOptions::default());

        assert_eq!(first.readings.len(), 1);
        assert_eq!(second.readings.len(), 1);
        assert_eq!(second.readings[0].value(), Some(2.0));
        assert_eq!(second.started, first.stopped);
    }

    #[test]
    fn test_counter_skips_absent_and_resets() {
        let (sink, mut stream) = reading_channel(CancellationToken::new());
        sink.push("bench", reading("a", Some(1.0)));
        sink.push("bench", reading("a", Some(1.0)));
        sink.push("bench", reading("a", None));
        assert_eq!(
            stream.counter().snapshot(),
            vec![("bench (volts)".to_string(), 2)]
        );

        stream.flush(FlushOptions::default().reset_counter(false));
        assert_eq!(stream.counter().snapshot().len(), 1);
        stream.flush(FlushOptions::default());
        assert!(stream.counter().snapshot().is_empty());
    }

    #[test]
    fn test_recycle_carries_last_value() {
        let (sink, mut stream) = reading_channel(CancellationToken::new());
        stream.set_recycle(["slow"]);
        sink.push("slow", reading("slow", Some(1.0)));
        sink.push("slow", reading("slow", Some(5.0)));
        sink.push("slow", reading("slow", None));
        sink.push("fast", reading("fast", Some(9.0)));

        let first = stream.flush(FlushOptions::default());
        assert_eq!(first.readings.len(), 4);

        let second = stream.flush(FlushOptions::default());
        assert_eq!(second.readings.len(), 1);
        assert_eq!(second.readings[0].address, "slow");
        assert_eq!(second.readings[0].value(), Some(5.0));

        // still carried while the device stays quiet
        let third = stream.flush(FlushOptions::default());
        assert_eq!(third.readings[0].value(), Some(5.0));
    }

    #[test]
    fn test_drop_flush() {
        let (sink, mut stream) = reading_channel(CancellationToken::new());
        sink.push("a", reading("a", Some(1.0)));
        let batch = stream.flush(FlushOptions::discarding());
        assert!(batch.readings.is_empty());
        assert!(stream.is_empty());
    }

    #[tokio::test]
    async fn test_next_and_cancel() {
        let cancel = CancellationToken::new();
        let (sink, mut stream) = reading_channel(cancel.clone());
        sink.push("a", reading("a", Some(3.0)));
        assert_eq!(stream.next().await.unwrap().value(), Some(3.0));

        cancel.cancel();
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn test_blocking_next_stops_when_sinks_dropped() {
        let (sink, mut stream) = reading_channel(CancellationToken::new());
        sink.push("a", reading("a", Some(1.0)));
        drop(sink);
        let values: Vec<_> = stream.blocking_iter().map(|r| r.value()).collect();
        assert_eq!(values, vec![Some(1.0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_devices() {
        let (sink, mut stream) = reading_channel(CancellationToken::new());
        sink.push("a", reading("a", Some(1.0)));

        let addresses = vec!["a".to_string(), "b".to_string()];
        let missing = stream
            .wait_for_devices(&addresses, Duration::from_secs(30))
            .await;
        assert_eq!(missing.len(), 1);
        assert!(missing.contains("b"));
        // what arrived while waiting is discarded
        assert!(stream.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_devices_returns_early() {
        let (sink, mut stream) = reading_channel(CancellationToken::new());
        let start = Instant::now();
        let task = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            sink.push("a", reading("a", Some(1.0)));
            sink
        });
        let missing = stream
            .wait_for_devices(&["a".to_string()], Duration::from_secs(30))
            .await;
        assert!(missing.is_empty());
        assert!(start.elapsed() < Duration::from_secs(2));
        drop(task.await.unwrap());
    }
}
