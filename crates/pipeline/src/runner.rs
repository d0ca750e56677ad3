//! Concurrent batch runner
//!
//! Fans stage work out per thread with bounded concurrency; the bound is
//! the capability rate limit, not CPU. A watch-channel cancellation signal
//! stops new dispatch while in-flight work finishes, so partial results
//! survive. Per-item failures are isolated into the summary; the run is
//! fatal only when every item failed on capability errors.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

use support_nba_core::{Error, Result};

/// Signals a running batch to stop dispatching new work.
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

pub struct Runner {
    semaphore: Arc<Semaphore>,
    cancel: watch::Receiver<bool>,
}

/// Outcome of one fan-out pass.
#[derive(Debug)]
pub struct RunSummary<T> {
    pub completed: Vec<T>,
    /// (item id, error text) per failed item
    pub failures: Vec<(String, String)>,
    /// How many of the failures were capability-layer errors
    pub capability_failures: usize,
    /// Items never dispatched because of cancellation
    pub skipped: usize,
    pub total: usize,
}

impl<T> RunSummary<T> {
    /// Fatal only when every item failed on the capability layer; anything
    /// short of that is a partial result the caller can persist.
    pub fn into_result(self) -> Result<Self> {
        if self.total > 0
            && self.completed.is_empty()
            && self.skipped == 0
            && self.capability_failures == self.total
        {
            return Err(Error::CapabilityOutage {
                failed: self.capability_failures,
                total: self.total,
            });
        }
        Ok(self)
    }
}

fn is_capability_error(error: &Error) -> bool {
    matches!(error, Error::Capability(_) | Error::CapabilityOutage { .. })
}

impl Runner {
    pub fn new(max_in_flight: usize) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                semaphore: Arc::new(Semaphore::new(max_in_flight.max(1))),
                cancel: rx,
            },
            CancelHandle { tx: Arc::new(tx) },
        )
    }

    /// Run `work` over every item with bounded concurrency. `id_of` names
    /// items for the failure report. Completion order is not input order.
    pub async fn run_all<I, T, F, Fut>(
        &self,
        items: Vec<I>,
        id_of: impl Fn(&I) -> String,
        work: F,
    ) -> RunSummary<T>
    where
        I: Send + 'static,
        T: Send + 'static,
        F: Fn(I) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let total = items.len();
        let mut tasks: JoinSet<(String, Result<T>)> = JoinSet::new();
        let mut skipped = 0usize;

        for item in items {
            // Acquiring first means a finished task's cancellation is seen
            // before the next dispatch.
            let permit = match self.semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            if *self.cancel.borrow() {
                skipped += 1;
                continue;
            }
            let id = id_of(&item);
            let work = work.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let result = work(item).await;
                (id, result)
            });
        }
        if skipped > 0 {
            tracing::warn!(skipped, "Cancellation stopped dispatch");
        }

        let mut completed = Vec::new();
        let mut failures = Vec::new();
        let mut capability_failures = 0usize;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(value))) => completed.push(value),
                Ok((id, Err(error))) => {
                    tracing::warn!(item = %id, error = %error, "Item failed");
                    if is_capability_error(&error) {
                        capability_failures += 1;
                    }
                    failures.push((id, error.to_string()));
                }
                Err(join_error) => {
                    tracing::error!(error = %join_error, "Worker task panicked");
                    failures.push(("<task>".to_string(), join_error.to_string()));
                }
            }
        }

        tracing::info!(
            total,
            completed = completed.len(),
            failed = failures.len(),
            skipped,
            "Batch pass finished"
        );
        RunSummary {
            completed,
            failures,
            capability_failures,
            skipped,
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn runs_everything_and_collects_results() {
        let (runner, _cancel) = Runner::new(4);
        let summary = runner
            .run_all(vec![1, 2, 3], |n| n.to_string(), |n| async move { Ok(n * 10) })
            .await;
        assert_eq!(summary.total, 3);
        assert_eq!(summary.failures.len(), 0);
        let mut values = summary.completed.clone();
        values.sort_unstable();
        assert_eq!(values, vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn concurrency_stays_within_bound() {
        let (runner, _cancel) = Runner::new(2);
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let (current_ref, peak_ref) = (current.clone(), peak.clone());
        let summary = runner
            .run_all(
                (0..8).collect::<Vec<_>>(),
                |n| n.to_string(),
                move |_| {
                    let current = current_ref.clone();
                    let peak = peak_ref.clone();
                    async move {
                        let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        current.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    }
                },
            )
            .await;
        assert_eq!(summary.completed.len(), 8);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn failures_are_isolated_not_fatal() {
        let (runner, _cancel) = Runner::new(2);
        let summary = runner
            .run_all(
                vec![1, 2, 3],
                |n| n.to_string(),
                |n| async move {
                    if n == 2 {
                        Err(Error::MalformedInput("bad".into()))
                    } else {
                        Ok(n)
                    }
                },
            )
            .await;
        assert_eq!(summary.completed.len(), 2);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].0, "2");
        assert!(summary.into_result().is_ok());
    }

    #[tokio::test]
    async fn all_capability_failures_is_an_outage() {
        let (runner, _cancel) = Runner::new(2);
        let summary = runner
            .run_all(
                vec![1, 2],
                |n| n.to_string(),
                |_| async move { Err::<(), _>(Error::Capability("model down".into())) },
            )
            .await;
        match summary.into_result() {
            Err(Error::CapabilityOutage { failed, total }) => {
                assert_eq!(failed, 2);
                assert_eq!(total, 2);
            }
            other => panic!("expected outage, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn mixed_failures_are_not_an_outage() {
        let (runner, _cancel) = Runner::new(2);
        let summary = runner
            .run_all(
                vec![1, 2],
                |n| n.to_string(),
                |n| async move {
                    if n == 1 {
                        Err::<(), _>(Error::Capability("model down".into()))
                    } else {
                        Err(Error::MalformedInput("bad".into()))
                    }
                },
            )
            .await;
        assert_eq!(summary.capability_failures, 1);
        assert!(summary.into_result().is_ok());
    }

    #[tokio::test]
    async fn cancellation_stops_new_dispatch() {
        let (runner, cancel) = Runner::new(1);
        let cancel_inside = cancel.clone();
        let summary = runner
            .run_all(
                (0..5).collect::<Vec<_>>(),
                |n| n.to_string(),
                move |n| {
                    let cancel = cancel_inside.clone();
                    async move {
                        // First item trips the switch; in-flight work finishes
                        if n == 0 {
                            cancel.cancel();
                        }
                        Ok(n)
                    }
                },
            )
            .await;
        assert_eq!(summary.completed.len(), 1);
        assert_eq!(summary.skipped, 4);
        assert!(summary.into_result().is_ok());
    }
}
