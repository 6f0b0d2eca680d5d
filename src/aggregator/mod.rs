//! # Aggregator
//!
//! Producer side of the cycle. Reads the day's orders through its own store
//! session, computes an [`AggregationResult`], writes the report artifact and
//! only then settles the cycle [`Barrier`].
//!
//! The barrier is settled on every path: signaled after a successful report
//! write, abandoned when the query, the report write or cancellation cuts the
//! phase short. The synchronization phase therefore never waits on a
//! producer that has already given up.

pub mod error;

pub use error::*;

use crate::barrier::Barrier;
use crate::model::AggregationResult;
use crate::report::ReportSink;
use crate::store::OrderStore;
use chrono::NaiveDate;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

pub struct Aggregator {
    store: Arc<dyn OrderStore>,
    sink: Arc<dyn ReportSink>,
}

impl Aggregator {
    pub fn new(store: Arc<dyn OrderStore>, sink: Arc<dyn ReportSink>) -> Self {
        Self { store, sink }
    }

    /// Computes the aggregation for `as_of` without side effects.
    #[instrument(skip(self, cancel))]
    pub async fn aggregate(
        &self,
        as_of: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<AggregationResult, AggregationError> {
        let query = async {
            let mut session = self.store.session().await?;
            session.orders_created_on(as_of).await
        };

        let orders = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AggregationError::Cancelled),
            orders = query => orders?,
        };

        Ok(AggregationResult::from_orders(as_of, &orders))
    }

    /// Runs the whole aggregation phase of one cycle.
    ///
    /// This method:
    /// 1. Opens a store session and reads every order created on `as_of`
    /// 2. Computes the [`AggregationResult`] and renders the report
    /// 3. Overwrites the report artifact through the sink
    /// 4. Settles `barrier`: signaled after a successful write, abandoned otherwise
    ///
    /// # Arguments
    ///
    /// * `as_of` - Reporting day; orders are bucketed by their UTC creation date
    /// * `barrier` - The cycle's barrier, shared with the synchronization phase
    /// * `cancel` - The cycle's cancellation token, raced against the query and the write
    ///
    /// # Returns
    ///
    /// - `Ok(AggregationResult)` once the report is written and the barrier signaled
    /// - `Err(AggregationError)` if the query, the write or cancellation cut the phase
    ///   short. The barrier is abandoned before the error is returned.
    #[instrument(name = "aggregation", skip_all, fields(as_of = %as_of))]
    pub async fn run(
        &self,
        as_of: NaiveDate,
        barrier: &Barrier,
        cancel: &CancellationToken,
    ) -> Result<AggregationResult, AggregationError> {
        info!("Starting order aggregation");

        // =====================================================================
        // Steps 1-3: Query, aggregate, write the report
        // =====================================================================

        let outcome = self.aggregate_and_report(as_of, cancel).await;

        // =====================================================================
        // Step 4: Settle the barrier on every path
        // =====================================================================

        match outcome {
            Ok(result) => {
                barrier.signal();
                info!(
                    total_revenue = %result.total_revenue,
                    orders = result.order_count(),
                    report = %self.sink.location(),
                    "Order aggregation completed, synchronization released"
                );
                Ok(result)
            }
            Err(e) => {
                barrier.abandon();
                warn!(error = %e, "Order aggregation failed, synchronization abandoned");
                Err(e)
            }
        }
    }

    async fn aggregate_and_report(
        &self,
        as_of: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<AggregationResult, AggregationError> {
        let result = self.aggregate(as_of, cancel).await?;
        let report = result.render_report();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AggregationError::Cancelled),
            written = self.sink.write_report(as_of, &report) => written?,
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barrier::BarrierState;
    use crate::mock::{MemoryReportSink, MockOrderStore};
    use crate::model::{Order, OrderStatus};
    use crate::store::DataAccessError;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, 1).unwrap()
    }

    fn orders() -> Vec<Order> {
        let at = Utc.with_ymd_and_hms(2024, 9, 1, 14, 0, 0).unwrap();
        vec![
            Order::new(1, 1, at, OrderStatus::Approved).with_item(2, 10).with_item(1, 5),
            Order::new(2, 1, at, OrderStatus::Pending),
            Order::new(3, 2, at, OrderStatus::Approved).with_item(3, 4),
        ]
    }

    #[tokio::test]
    async fn test_run_writes_report_then_signals() {
        let store = Arc::new(MockOrderStore::new(orders()));
        let sink = Arc::new(MemoryReportSink::new());
        let aggregator = Aggregator::new(store, sink.clone());
        let barrier = Barrier::new();

        let result = aggregator
            .run(day(), &barrier, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.total_revenue, Decimal::from(37));
        assert!(barrier.is_signaled());
        assert_eq!(
            sink.last_report().unwrap(),
            "Total revenue: 37\nOrders with status Pending: 1\nOrders with status Approved: 2\n"
        );
    }

    #[tokio::test]
    async fn test_store_failure_abandons_barrier() {
        let store = Arc::new(
            MockOrderStore::new(orders())
                .failing_aggregation_query(DataAccessError::QueryFailed("timeout".into())),
        );
        let sink = Arc::new(MemoryReportSink::new());
        let aggregator = Aggregator::new(store, sink.clone());
        let barrier = Barrier::new();

        let err = aggregator
            .run(day(), &barrier, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AggregationError::DataAccess(_)));
        assert_eq!(barrier.state(), BarrierState::Abandoned);
        assert_eq!(sink.write_count(), 0);
    }

    #[tokio::test]
    async fn test_report_failure_abandons_barrier() {
        let store = Arc::new(MockOrderStore::new(orders()));
        let sink = Arc::new(MemoryReportSink::failing());
        let aggregator = Aggregator::new(store, sink);
        let barrier = Barrier::new();

        let err = aggregator
            .run(day(), &barrier, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AggregationError::Report(_)));
        assert_eq!(barrier.state(), BarrierState::Abandoned);
    }

    #[tokio::test]
    async fn test_cancelled_before_query_completes() {
        let delay = std::time::Duration::from_secs(60);
        let store = Arc::new(MockOrderStore::new(orders()).with_aggregation_delay(delay));
        let aggregator = Aggregator::new(store, Arc::new(MemoryReportSink::new()));
        let barrier = Barrier::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = aggregator.run(day(), &barrier, &cancel).await.unwrap_err();

        assert_eq!(err, AggregationError::Cancelled);
        assert_eq!(barrier.state(), BarrierState::Abandoned);
    }

    #[tokio::test]
    async fn test_each_run_opens_its_own_session() {
        let store = Arc::new(MockOrderStore::new(orders()));
        let aggregator = Aggregator::new(store.clone(), Arc::new(MemoryReportSink::new()));

        aggregator.aggregate(day(), &CancellationToken::new()).await.unwrap();
        aggregator.aggregate(day(), &CancellationToken::new()).await.unwrap();

        assert_eq!(store.sessions_opened(), 2);
    }
}
