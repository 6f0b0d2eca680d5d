use crate::barrier::Barrier;
use crate::model::AggregationResult;
use crate::orchestrator::CycleError;
use crate::synchronizer::SyncReport;
use chrono::{DateTime, NaiveDate, Utc};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Transient state of one cycle, created at cycle start and dropped at its end.
///
/// Nothing in here outlives the cycle, so a failed cycle cannot leak into
/// the next one.
#[derive(Debug, Clone)]
pub struct CycleState {
    pub cycle_id: u64,
    pub as_of: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub barrier: Barrier,
    /// Child of the scheduler's token; cancelling it only ends this cycle.
    pub cancel: CancellationToken,
}

impl CycleState {
    pub fn begin(
        cycle_id: u64,
        as_of: NaiveDate,
        started_at: DateTime<Utc>,
        parent: &CancellationToken,
    ) -> Self {
        Self {
            cycle_id,
            as_of,
            started_at,
            barrier: Barrier::new(),
            cancel: parent.child_token(),
        }
    }
}

/// What one cycle produced. Both phase results are kept, failed or not.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: u64,
    pub as_of: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub aggregation: Result<AggregationResult, CycleError>,
    pub synchronization: Result<SyncReport, CycleError>,
}

impl CycleReport {
    /// Both phases completed and every effect succeeded.
    pub fn is_success(&self) -> bool {
        self.aggregation.is_ok()
            && self
                .synchronization
                .as_ref()
                .map(SyncReport::is_clean)
                .unwrap_or(false)
    }

    pub fn errors(&self) -> Vec<&CycleError> {
        [self.aggregation.as_ref().err(), self.synchronization.as_ref().err()]
            .into_iter()
            .flatten()
            .collect()
    }

    /// Emits the structured summary of the cycle.
    pub fn log(&self) {
        let elapsed_ms = self.elapsed.as_millis() as u64;

        for e in self.errors() {
            error!(
                cycle_id = self.cycle_id,
                as_of = %self.as_of,
                started_at = %self.started_at,
                phase = %e.phase(),
                error = %e,
                "Cycle phase failed"
            );
        }

        match (&self.aggregation, &self.synchronization) {
            (Ok(aggregation), Ok(sync)) if sync.is_clean() => info!(
                cycle_id = self.cycle_id,
                as_of = %self.as_of,
                elapsed_ms,
                total_revenue = %aggregation.total_revenue,
                orders = aggregation.order_count(),
                synced = sync.outcomes.len(),
                "Daily order processing completed"
            ),
            (_, Ok(sync)) => warn!(
                cycle_id = self.cycle_id,
                as_of = %self.as_of,
                elapsed_ms,
                synced = sync.outcomes.len(),
                eligible = sync.eligible,
                failed_effects = sync.failed_effects(),
                failed_orders = ?sync.failed_orders(),
                interrupted = sync.interrupted,
                "Daily order processing completed with failures"
            ),
            (_, Err(_)) => warn!(
                cycle_id = self.cycle_id,
                as_of = %self.as_of,
                elapsed_ms,
                "Daily order processing failed"
            ),
        }
    }
}
