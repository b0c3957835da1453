//! Admission gate for the connect+subscribe handshake.
//!
//! Bluetooth stacks misbehave when several peripherals are connecting at
//! once, so only one device task may be between "start connect" and
//! "notifications subscribed" at any instant. Everything after that runs
//! in parallel.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

/// A permit-of-one shared by every device task of a session.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    permits: Arc<Semaphore>,
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self::new()
    }
}

impl AdmissionGate {
    pub fn new() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(1)),
        }
    }

    /// Wait for the gate.
    ///
    /// Returns `None` if the session is cancelled first. The gate is
    /// released when the permit is dropped.
    pub async fn enter(&self, cancel: &CancellationToken) -> Option<OwnedSemaphorePermit> {
        let permit = tokio::select! {
            _ = cancel.cancelled() => return None,
            permit = Arc::clone(&self.permits).acquire_owned() => permit.ok()?,
        };
        if cancel.is_cancelled() {
            return None;
        }
        Some(permit)
    }

    /// Whether a task currently holds the gate.
    pub fn is_held(&self) -> bool {
        self.permits.available_permits() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_single_holder() {
        let gate = AdmissionGate::new();
        let cancel = CancellationToken::new();

        let permit = gate.enter(&cancel).await.unwrap();
        assert!(gate.is_held());

        let waiter = {
            let gate = gate.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { gate.enter(&cancel).await.is_some() })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        drop(permit);
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_cancel_while_waiting() {
        let gate = AdmissionGate::new();
        let cancel = CancellationToken::new();
        let _permit = gate.enter(&cancel).await.unwrap();

        let waiter = {
            let gate = gate.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { gate.enter(&cancel).await.is_none() })
        };
        cancel.cancel();
        assert!(waiter.await.unwrap());
    }
}
