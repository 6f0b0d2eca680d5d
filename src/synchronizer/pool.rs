//! Bounded fan-out.
//!
//! [`WorkerPool::run`] dispatches one task per item, gated by a semaphore.
//! The dispatch loop waits for a permit before spawning, so at most
//! `max_concurrency` units of work exist at any time and the rest of the
//! items stay queued in the input vector.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// What a pool run produced.
#[derive(Debug)]
pub struct PoolRun<O> {
    /// Outputs of the units that completed, in completion order.
    pub outputs: Vec<O>,
    /// Cancellation stopped dispatch before every item was handed out.
    pub interrupted: bool,
    /// Items never dispatched because of cancellation.
    pub undispatched: usize,
    /// Units aborted once the grace period ran out.
    pub aborted: usize,
    /// Units that panicked.
    pub crashed: usize,
}

#[derive(Debug, Clone)]
pub struct WorkerPool {
    max_concurrency: usize,
    grace_period: Duration,
}

impl WorkerPool {
    /// `max_concurrency` is clamped to at least 1.
    pub fn new(max_concurrency: usize, grace_period: Duration) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
            grace_period,
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Runs `work` for every item with at most `max_concurrency` units in flight.
    ///
    /// This method:
    /// 1. Waits for a semaphore permit, then spawns the unit for the next item
    ///    into a `JoinSet`; items without a permit stay queued
    /// 2. Stops dispatching as soon as `cancel` fires
    /// 3. Drains the `JoinSet`. After cancellation, running units get the
    ///    grace period to finish and are aborted afterwards
    ///
    /// # Arguments
    ///
    /// * `items` - One unit of work per item
    /// * `cancel` - Stops dispatch and starts the grace period
    /// * `work` - Builds the unit of work for an item
    ///
    /// # Returns
    ///
    /// A [`PoolRun`] with the outputs of every unit that completed, in
    /// completion order, and counts of undispatched, aborted and crashed units.
    /// Completed work is kept as-is, there is no rollback.
    pub async fn run<T, F, Fut>(
        &self,
        items: Vec<T>,
        cancel: &CancellationToken,
        work: F,
    ) -> PoolRun<Fut::Output>
    where
        T: Send + 'static,
        F: Fn(T) -> Fut,
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        let total = items.len();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();
        let mut dispatched = 0;
        let mut interrupted = false;

        // =====================================================================
        // Steps 1-2: Permit-gated dispatch until done or cancelled
        // =====================================================================

        for item in items {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    interrupted = true;
                    break;
                }
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        interrupted = true;
                        break;
                    }
                },
            };

            let unit = work(item);
            tasks.spawn(async move {
                let output = unit.await;
                drop(permit);
                output
            });
            dispatched += 1;
        }

        let mut run = PoolRun {
            outputs: Vec::with_capacity(dispatched),
            interrupted,
            undispatched: total - dispatched,
            aborted: 0,
            crashed: 0,
        };

        // =====================================================================
        // Step 3: Drain, with a grace period once cancelled
        // =====================================================================

        let mut grace_deadline = interrupted.then(|| Instant::now() + self.grace_period);
        if interrupted {
            info!(
                dispatched,
                undispatched = run.undispatched,
                "Fan-out interrupted, draining workers"
            );
        }

        loop {
            let joined = match grace_deadline {
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                        Ok(joined) => joined,
                        Err(_) => {
                            warn!(
                                outstanding = tasks.len(),
                                "Grace period elapsed, aborting workers"
                            );
                            tasks.abort_all();
                            grace_deadline = None;
                            continue;
                        }
                    }
                }
                None => tokio::select! {
                    biased;
                    _ = cancel.cancelled(), if !run.interrupted => {
                        run.interrupted = true;
                        grace_deadline = Some(Instant::now() + self.grace_period);
                        continue;
                    }
                    joined = tasks.join_next() => joined,
                },
            };

            match joined {
                None => break,
                Some(Ok(output)) => run.outputs.push(output),
                Some(Err(e)) if e.is_cancelled() => run.aborted += 1,
                Some(Err(e)) => {
                    error!(error = %e, "Worker crashed");
                    run.crashed += 1;
                }
            }
        }

        run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_runs_every_item() {
        let pool = WorkerPool::new(4, Duration::from_secs(1));
        let run = pool
            .run((0..50).collect(), &CancellationToken::new(), |n: u32| async move { n * 2 })
            .await;

        let mut outputs = run.outputs;
        outputs.sort_unstable();
        assert_eq!(outputs, (0..50).map(|n| n * 2).collect::<Vec<_>>());
        assert!(!run.interrupted);
        assert_eq!(run.undispatched, 0);
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_bound() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let pool = WorkerPool::new(10, Duration::from_secs(1));

        let run = pool
            .run((0..1000).collect(), &CancellationToken::new(), |_: u32| {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                }
            })
            .await;

        assert_eq!(run.outputs.len(), 1000);
        let peak = peak.load(Ordering::SeqCst);
        assert!(peak <= 10, "peak concurrency {} exceeded bound", peak);
        assert!(peak > 1, "work never overlapped");
    }

    #[tokio::test]
    async fn test_zero_concurrency_is_clamped() {
        let pool = WorkerPool::new(0, Duration::from_secs(1));
        assert_eq!(pool.max_concurrency(), 1);
        let run = pool
            .run(vec![1, 2, 3], &CancellationToken::new(), |n: u32| async move { n })
            .await;
        assert_eq!(run.outputs.len(), 3);
    }

    #[tokio::test]
    async fn test_panicking_unit_is_isolated() {
        let pool = WorkerPool::new(2, Duration::from_secs(1));
        let run = pool
            .run((0..6).collect(), &CancellationToken::new(), |n: u32| async move {
                if n == 3 {
                    panic!("worker blew up");
                }
                n
            })
            .await;

        assert_eq!(run.crashed, 1);
        assert_eq!(run.outputs.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_dispatch_and_aborts_after_grace() {
        let pool = WorkerPool::new(2, Duration::from_secs(5));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let run = pool
            .run((0..10).collect(), &cancel, |_: u32| async move {
                // Ignores cancellation on purpose.
                tokio::time::sleep(Duration::from_secs(3600)).await;
            })
            .await;

        assert!(run.interrupted);
        assert_eq!(run.undispatched, 8);
        assert_eq!(run.aborted, 2);
        assert!(run.outputs.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooperative_workers_finish_within_grace() {
        let pool = WorkerPool::new(3, Duration::from_secs(5));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let run = pool
            .run((0..3).collect(), &cancel, |n: u32| {
                let cancel = cancel.clone();
                async move {
                    cancel.cancelled().await;
                    n
                }
            })
            .await;

        assert!(run.interrupted);
        assert_eq!(run.undispatched, 0);
        assert_eq!(run.aborted, 0);
        assert_eq!(run.outputs.len(), 3);
    }
}
