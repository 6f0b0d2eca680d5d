//! # Synchronizer
//!
//! Consumer side of the cycle. Blocks on the cycle [`Barrier`] until the
//! aggregation phase settles it, then reads the day's eligible (approved)
//! orders through its own store session and fans out over a bounded
//! [`WorkerPool`]. Each worker applies every effect client to its order.
//!
//! Failure isolation:
//! - an effect failing for one order does not stop the other effects for that order;
//! - an order failing does not stop any other order;
//! - a worker panicking only loses that order's outcome.

pub mod error;
pub mod outcome;
pub mod pool;

pub use error::*;
pub use outcome::*;
pub use pool::*;

use crate::barrier::{Barrier, BarrierTimeoutError, BarrierWait};
use crate::clients::{EffectClients, RetryPolicy};
use crate::model::{Order, OrderStatus};
use crate::store::OrderStore;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Tunables for the synchronization phase.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Hard cap on concurrently processed orders.
    pub max_concurrency: usize,
    /// How long to wait for the aggregation phase before giving up on the cycle.
    pub barrier_timeout: Duration,
    pub retry: RetryPolicy,
    /// How long in-flight workers get to finish after cancellation.
    pub grace_period: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            barrier_timeout: Duration::from_secs(300),
            retry: RetryPolicy::default(),
            grace_period: Duration::from_secs(10),
        }
    }
}

pub struct Synchronizer {
    store: Arc<dyn OrderStore>,
    effects: EffectClients,
    settings: SyncSettings,
    pool: WorkerPool,
}

impl Synchronizer {
    pub fn new(store: Arc<dyn OrderStore>, effects: EffectClients, settings: SyncSettings) -> Self {
        let pool = WorkerPool::new(settings.max_concurrency, settings.grace_period);
        Self {
            store,
            effects,
            settings,
            pool,
        }
    }

    /// Runs the whole synchronization phase of one cycle.
    ///
    /// This method:
    /// 1. Waits on `barrier` until aggregation settles it, the barrier timeout
    ///    passes or `cancel` fires
    /// 2. Reads the approved orders created on `as_of` through a fresh session
    /// 3. Fans out over the worker pool, one unit of work per order, applying
    ///    the ERP, loyalty and shipping effects in turn
    /// 4. Collects every per-order outcome into a [`SyncReport`]
    ///
    /// # Arguments
    ///
    /// * `as_of` - Reporting day, the same one the aggregation phase used
    /// * `barrier` - The cycle's barrier; no effect runs before it is signaled
    /// * `cancel` - The cycle's cancellation token
    ///
    /// # Returns
    ///
    /// - `Ok(SyncReport)` once fan-out finished, including failed effects and
    ///   an interrupted run
    /// - `Err(SyncError)` if no fan-out happened: the barrier was abandoned or
    ///   timed out, the query failed, or the phase was cancelled first
    #[instrument(name = "synchronization", skip_all, fields(as_of = %as_of))]
    pub async fn synchronize(
        &self,
        as_of: NaiveDate,
        barrier: &Barrier,
        cancel: &CancellationToken,
    ) -> Result<SyncReport, SyncError> {
        info!("Waiting for aggregation to complete before starting synchronization");

        // =====================================================================
        // Step 1: Wait for the report to be written
        // =====================================================================

        let deadline = Instant::now() + self.settings.barrier_timeout;
        match barrier.wait(deadline, cancel).await {
            BarrierWait::Signaled => {}
            BarrierWait::Abandoned => return Err(SyncError::Abandoned),
            BarrierWait::Cancelled => return Err(SyncError::Cancelled),
            BarrierWait::TimedOut => {
                return Err(BarrierTimeoutError {
                    waited: self.settings.barrier_timeout,
                }
                .into())
            }
        }

        // =====================================================================
        // Step 2: Query eligible orders
        // =====================================================================

        let orders = self.eligible_orders(as_of, cancel).await?;
        info!(
            eligible = orders.len(),
            max_concurrency = self.pool.max_concurrency(),
            "Starting order synchronization"
        );

        // =====================================================================
        // Step 3: Bounded fan-out
        // =====================================================================

        let mut report = SyncReport::new(as_of, orders.len());
        let effects = self.effects.clone();
        let retry = self.settings.retry.clone();
        let run = self
            .pool
            .run(orders, cancel, |order| {
                let effects = effects.clone();
                let retry = retry.clone();
                let cancel = cancel.clone();
                async move { sync_order(order, &effects, &retry, &cancel).await }
            })
            .await;

        // =====================================================================
        // Step 4: Record outcomes
        // =====================================================================

        report.outcomes = run.outputs;
        report.interrupted = run.interrupted;
        report.aborted_workers = run.aborted;
        report.crashed_workers = run.crashed;

        if report.is_clean() {
            info!(orders = report.outcomes.len(), "Order synchronization completed");
        } else {
            warn!(
                processed = report.outcomes.len(),
                eligible = report.eligible,
                failed_effects = report.failed_effects(),
                failed_orders = ?report.failed_orders(),
                interrupted = report.interrupted,
                "Order synchronization completed with failures"
            );
        }
        Ok(report)
    }

    async fn eligible_orders(
        &self,
        as_of: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<Vec<Order>, SyncError> {
        let query = async {
            let mut session = self.store.session().await?;
            session
                .orders_created_on_with_status(as_of, OrderStatus::Approved)
                .await
        };

        let orders = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SyncError::Cancelled),
            orders = query => orders?,
        };

        Ok(orders
            .into_iter()
            .filter(|o| o.status.is_eligible_for_sync() && o.created_on() == as_of)
            .collect())
    }
}

/// Applies every effect to one order, in order, regardless of earlier failures.
async fn sync_order(
    order: Order,
    effects: &EffectClients,
    retry: &RetryPolicy,
    cancel: &CancellationToken,
) -> SyncOutcome {
    let mut outcomes = Vec::with_capacity(3);
    for client in effects.iter() {
        outcomes.push(client.apply_with_retry(&order, retry, cancel).await);
    }

    let outcome = SyncOutcome {
        order_id: order.id,
        company_id: order.company_id,
        effects: outcomes,
    };
    debug!(order_id = %outcome.order_id, success = outcome.is_success(), "Order processed");
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::EffectKind;
    use crate::mock::{MockOrderStore, RecordingEffect};
    use crate::model::OrderId;
    use chrono::{TimeZone, Utc};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 10).unwrap()
    }

    fn orders() -> Vec<Order> {
        let at = Utc.with_ymd_and_hms(2024, 10, 10, 8, 0, 0).unwrap();
        vec![
            Order::new(1, 100, at, OrderStatus::Approved).with_item(1, 10),
            Order::new(2, 100, at, OrderStatus::Pending),
            Order::new(3, 101, at, OrderStatus::Approved),
            Order::new(4, 102, at, OrderStatus::Shipped),
        ]
    }

    fn settings() -> SyncSettings {
        SyncSettings {
            barrier_timeout: Duration::from_secs(5),
            ..SyncSettings::default()
        }
    }

    #[tokio::test]
    async fn test_only_approved_orders_fan_out() {
        let (effects, erp, loyalty, shipping) = RecordingEffect::clients();
        let sync = Synchronizer::new(Arc::new(MockOrderStore::new(orders())), effects, settings());
        let barrier = Barrier::new();
        barrier.signal();

        let report = sync
            .synchronize(day(), &barrier, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.eligible, 2);
        assert!(report.is_clean());
        for recorder in [&erp, &loyalty, &shipping] {
            let mut calls = recorder.calls();
            calls.sort();
            assert_eq!(calls, vec![OrderId(1), OrderId(3)]);
        }
    }

    #[tokio::test]
    async fn test_abandoned_barrier_skips_fan_out() {
        let (effects, erp, _, _) = RecordingEffect::clients();
        let store = Arc::new(MockOrderStore::new(orders()));
        let sync = Synchronizer::new(store.clone(), effects, settings());
        let barrier = Barrier::new();
        barrier.abandon();

        let err = sync
            .synchronize(day(), &barrier, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err, SyncError::Abandoned);
        assert!(erp.calls().is_empty());
        assert_eq!(store.sessions_opened(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_barrier_timeout() {
        let (effects, erp, _, _) = RecordingEffect::clients();
        let sync = Synchronizer::new(Arc::new(MockOrderStore::new(orders())), effects, settings());

        let err = sync
            .synchronize(day(), &Barrier::new(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            SyncError::BarrierTimeout(BarrierTimeoutError {
                waited: Duration::from_secs(5)
            })
        );
        assert!(erp.calls().is_empty());
    }

    #[tokio::test]
    async fn test_effect_failure_is_isolated_per_order_and_effect() {
        let erp = Arc::new(RecordingEffect::new(EffectKind::ErpSync).failing_for([OrderId(1)]));
        let loyalty = Arc::new(RecordingEffect::new(EffectKind::LoyaltyUpdate));
        let shipping = Arc::new(RecordingEffect::new(EffectKind::ShippingNotify));
        let effects = EffectClients::new(erp.clone(), loyalty.clone(), shipping.clone());
        let sync = Synchronizer::new(Arc::new(MockOrderStore::new(orders())), effects, settings());
        let barrier = Barrier::new();
        barrier.signal();

        let report = sync
            .synchronize(day(), &barrier, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.failed_orders(), vec![OrderId(1)]);
        assert_eq!(report.failed_effects(), 1);
        assert_eq!(report.succeeded_effects(), 5);

        let failed = report.outcome(OrderId(1)).unwrap();
        assert!(!failed.effect(EffectKind::ErpSync).unwrap().is_success());
        assert!(failed.effect(EffectKind::LoyaltyUpdate).unwrap().is_success());
        assert!(failed.effect(EffectKind::ShippingNotify).unwrap().is_success());
        assert!(report.outcome(OrderId(3)).unwrap().is_success());
        assert_eq!(loyalty.calls().len(), 2);
        assert_eq!(shipping.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let erp = Arc::new(RecordingEffect::new(EffectKind::ErpSync).failing_first(2));
        let effects = EffectClients::new(
            erp.clone(),
            Arc::new(RecordingEffect::new(EffectKind::LoyaltyUpdate)),
            Arc::new(RecordingEffect::new(EffectKind::ShippingNotify)),
        );
        let store = MockOrderStore::new(vec![orders().remove(0)]);
        let sync = Synchronizer::new(
            Arc::new(store),
            effects,
            SyncSettings {
                retry: RetryPolicy {
                    max_attempts: 3,
                    backoff: Duration::from_millis(1),
                },
                ..settings()
            },
        );
        let barrier = Barrier::new();
        barrier.signal();

        let report = sync
            .synchronize(day(), &barrier, &CancellationToken::new())
            .await
            .unwrap();

        assert!(report.is_clean());
        let erp_outcome = report.outcomes[0].effect(EffectKind::ErpSync).unwrap();
        assert_eq!(erp_outcome.attempts, 3);
        assert_eq!(erp.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_store_failure_surfaces_as_data_access_error() {
        let (effects, _, _, _) = RecordingEffect::clients();
        let store = MockOrderStore::new(orders()).unavailable("connection refused");
        let sync = Synchronizer::new(Arc::new(store), effects, settings());
        let barrier = Barrier::new();
        barrier.signal();

        let err = sync
            .synchronize(day(), &barrier, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::DataAccess(_)));
    }
}
