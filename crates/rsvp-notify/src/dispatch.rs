//! Detached notification tasks.
//!
//! Request handlers hand side effects to a [`Dispatcher`] and return
//! without waiting. A task's error is logged at `warn`; a panic is caught
//! through its `JoinHandle` and logged at `error`. Neither reaches the
//! caller.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, warn};

#[derive(Debug, Clone)]
pub struct Dispatcher {
    inflight: Arc<watch::Sender<usize>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            inflight: Arc::new(tx),
        }
    }

    /// Number of tasks that have not finished yet.
    pub fn in_flight(&self) -> usize {
        *self.inflight.borrow()
    }

    /// Run `task` in the background under `label`.
    pub fn spawn<F, E>(&self, label: &'static str, task: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        self.inflight.send_modify(|n| *n += 1);
        let inflight = Arc::clone(&self.inflight);

        let handle = tokio::spawn(async move {
            if let Err(e) = task.await {
                warn!(task = label, error = %e, "notification failed");
            } else {
                debug!(task = label, "notification sent");
            }
        });

        tokio::spawn(async move {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    error!(task = label, "notification task panicked");
                } else {
                    warn!(task = label, error = %e, "notification task cancelled");
                }
            }
            inflight.send_modify(|n| *n = n.saturating_sub(1));
        });
    }

    /// Wait up to `grace` for in-flight tasks. Returns `true` when all of
    /// them finished in time.
    pub async fn drain(&self, grace: Duration) -> bool {
        let mut rx = self.inflight.subscribe();
        let drained = tokio::time::timeout(grace, rx.wait_for(|n| *n == 0))
            .await
            .is_ok_and(|r| r.is_ok());
        if !drained {
            warn!(pending = self.in_flight(), "shutdown with notifications still in flight");
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn errors_and_panics_stay_contained() {
        let dispatcher = Dispatcher::new();
        let ran = Arc::new(AtomicUsize::new(0));

        let r = Arc::clone(&ran);
        dispatcher.spawn("ok", async move {
            r.fetch_add(1, Ordering::SeqCst);
            Ok::<(), String>(())
        });
        dispatcher.spawn("err", async { Err::<(), _>("provider down".to_string()) });
        let r = Arc::clone(&ran);
        dispatcher.spawn("panic", async move {
            if r.load(Ordering::SeqCst) < 100 {
                panic!("boom");
            }
            Ok::<(), String>(())
        });

        assert!(dispatcher.drain(Duration::from_secs(5)).await);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn drain_gives_up_after_grace() {
        let dispatcher = Dispatcher::new();
        dispatcher.spawn("slow", async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<(), String>(())
        });

        assert!(!dispatcher.drain(Duration::from_secs(1)).await);
        assert_eq!(dispatcher.in_flight(), 1);
    }

    #[tokio::test]
    async fn drain_with_nothing_pending_returns_immediately() {
        assert!(Dispatcher::new().drain(Duration::from_millis(1)).await);
    }
}
