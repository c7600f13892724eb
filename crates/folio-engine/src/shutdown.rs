//! Graceful shutdown coordination.
//!
//! Requests enter through [`GracefulShutdown::enter`] and hold an
//! [`OperationGuard`] until they return. Closing the gate refuses new
//! requests with `CANCELLED`, tells background tasks to stop and lets the
//! caller wait until the requests already admitted have drained.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{broadcast, Notify};
use tokio::time::Instant;
use tracing::{info, warn};

use folio_portfolio::{OptimizerError, OptimizerResult};

/// Default time allowed for admitted requests to finish.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Admission gate and in-flight request counter.
pub struct GracefulShutdown {
    closed: AtomicBool,
    active: AtomicUsize,
    drained: Notify,
    stop_tx: broadcast::Sender<()>,
    drain_timeout: Duration,
}

impl GracefulShutdown {
    /// Creates an open gate that waits at most `drain_timeout` on close.
    pub fn new(drain_timeout: Duration) -> Self {
        let (stop_tx, _) = broadcast::channel(1);
        Self {
            closed: AtomicBool::new(false),
            active: AtomicUsize::new(0),
            drained: Notify::new(),
            stop_tx,
            drain_timeout,
        }
    }

    /// Creates a gate with [`DEFAULT_DRAIN_TIMEOUT`].
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_DRAIN_TIMEOUT)
    }

    /// Returns true once [`Self::close`] has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Admits a request, or fails with `CANCELLED` after close.
    pub fn enter(&self) -> OptimizerResult<OperationGuard<'_>> {
        // Count first so a concurrent close never misses an admitted request.
        self.active.fetch_add(1, Ordering::SeqCst);
        let guard = OperationGuard { gate: self };
        if self.is_shutting_down() {
            return Err(OptimizerError::Cancelled);
        }
        Ok(guard)
    }

    /// Number of admitted requests that have not returned.
    pub fn active_operations(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Receiver notified once when the gate closes.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.stop_tx.subscribe()
    }

    /// Refuses new requests and notifies subscribers.
    ///
    /// Returns false if the gate was already closed.
    pub fn close(&self) -> bool {
        let first = self
            .closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if first {
            let _ = self.stop_tx.send(());
            info!(active = self.active_operations(), "shutdown initiated");
        }
        first
    }

    /// Waits until every admitted request has returned.
    ///
    /// Returns false if the drain timeout passed first.
    pub async fn drain(&self) -> bool {
        let deadline = Instant::now() + self.drain_timeout;
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.active_operations() == 0 {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                warn!(
                    active = self.active_operations(),
                    "drain timeout reached, abandoning requests"
                );
                return false;
            }
        }
    }
}

impl std::fmt::Debug for GracefulShutdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GracefulShutdown")
            .field("closed", &self.is_shutting_down())
            .field("active", &self.active_operations())
            .finish()
    }
}

/// Marks one admitted request as in flight.
pub struct OperationGuard<'a> {
    gate: &'a GracefulShutdown,
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        if self.gate.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.gate.drained.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_close_refuses_new_requests() {
        let gate = GracefulShutdown::with_defaults();
        let guard = gate.enter().unwrap();
        assert_eq!(gate.active_operations(), 1);

        assert!(gate.close());
        assert!(!gate.close());
        assert!(matches!(gate.enter(), Err(OptimizerError::Cancelled)));
        assert_eq!(gate.active_operations(), 1);

        drop(guard);
        assert_eq!(gate.active_operations(), 0);
    }

    #[tokio::test]
    async fn test_subscribers_are_notified() {
        let gate = GracefulShutdown::with_defaults();
        let mut rx = gate.subscribe();
        gate.close();
        assert!(rx.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_drain_waits_for_admitted_requests() {
        let gate = Arc::new(GracefulShutdown::with_defaults());
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let (entered_tx, entered_rx) = tokio::sync::oneshot::channel::<()>();

        let worker = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                let _guard = gate.enter().unwrap();
                entered_tx.send(()).unwrap();
                release_rx.await.unwrap();
            })
        };

        entered_rx.await.unwrap();
        gate.close();
        release_tx.send(()).unwrap();
        assert!(gate.drain().await);
        worker.await.unwrap();
        assert_eq!(gate.active_operations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_gives_up_after_timeout() {
        let gate = GracefulShutdown::new(Duration::from_millis(30));
        let _guard = gate.enter().unwrap();
        gate.close();
        assert!(!gate.drain().await);
        assert_eq!(gate.active_operations(), 1);
    }
}
