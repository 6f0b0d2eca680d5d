//! # Cycle Orchestrator
//!
//! Runs the scheduling loop and, whenever the [`Trigger`] fires, one cycle:
//!
//! ```text
//!   poll ──► trigger? ──► spawn aggregation ──► report written ──► barrier.signal()
//!                    └──► spawn synchronization ── barrier.wait() ──► fan-out
//!                          both joined ──► CycleReport ──► log ──► next poll
//! ```
//!
//! The two phases run as separate tasks joined together; both results are
//! kept in the [`CycleReport`]. Failures are recorded and logged but never
//! leave the cycle, so the loop only stops on cancellation.

pub mod cycle;
pub mod error;

pub use cycle::*;
pub use error::*;

use crate::aggregator::Aggregator;
use crate::clock::Clock;
use crate::synchronizer::Synchronizer;
use crate::trigger::{Trigger, TriggerError};
use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinError;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

/// Which calendar day a fired cycle processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportingDay {
    /// The UTC date of the moment the trigger fired.
    #[default]
    Current,
    /// The UTC date before it.
    Previous,
}

impl ReportingDay {
    pub fn as_of(self, now: DateTime<Utc>) -> NaiveDate {
        let today = now.date_naive();
        match self {
            ReportingDay::Current => today,
            ReportingDay::Previous => today.checked_sub_days(Days::new(1)).unwrap_or(today),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScheduleSettings {
    pub poll_interval: Duration,
    pub reporting_day: ReportingDay,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            reporting_day: ReportingDay::Current,
        }
    }
}

pub struct CycleOrchestrator {
    trigger: Arc<dyn Trigger>,
    clock: Arc<dyn Clock>,
    aggregator: Arc<Aggregator>,
    synchronizer: Arc<Synchronizer>,
    settings: ScheduleSettings,
    next_cycle_id: AtomicU64,
}

impl CycleOrchestrator {
    pub fn new(
        trigger: Arc<dyn Trigger>,
        clock: Arc<dyn Clock>,
        aggregator: Aggregator,
        synchronizer: Synchronizer,
        settings: ScheduleSettings,
    ) -> Result<Self, TriggerError> {
        if settings.poll_interval.is_zero() {
            return Err(TriggerError::ZeroPollInterval);
        }
        Ok(Self {
            trigger,
            clock,
            aggregator: Arc::new(aggregator),
            synchronizer: Arc::new(synchronizer),
            settings,
            next_cycle_id: AtomicU64::new(1),
        })
    }

    /// Polls the trigger until `cancel` fires. Returns the number of cycles run.
    ///
    /// Cycles never overlap: the next poll happens after the current cycle is done.
    /// A trigger that stays true over several polls fires once per
    /// [`fire_slot`](Trigger::fire_slot).
    pub async fn run(&self, cancel: CancellationToken) -> u64 {
        info!(
            trigger = ?self.trigger,
            poll_interval = ?self.settings.poll_interval,
            "Scheduling loop started"
        );

        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycles = 0;
        // Slot of the last fire; the fire minute spans several polls.
        let mut last_slot: Option<NaiveDateTime> = None;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let now = self.clock.now();
            if !self.trigger.should_fire(now) {
                continue;
            }
            let slot = self.trigger.fire_slot(now);
            if slot.is_some() && slot == last_slot {
                debug!(?slot, "Cycle already ran for this slot");
                continue;
            }
            if cancel.is_cancelled() {
                break;
            }
            last_slot = slot;

            let as_of = self.settings.reporting_day.as_of(now);
            info!(%as_of, "Starting daily order processing");
            let report = self.run_cycle(as_of, &cancel).await;
            report.log();
            cycles += 1;
        }

        info!(cycles, "Scheduling loop stopped");
        cycles
    }

    /// Runs one cycle for `as_of` right away.
    pub async fn run_cycle(&self, as_of: NaiveDate, cancel: &CancellationToken) -> CycleReport {
        let cycle_id = self.next_cycle_id.fetch_add(1, Ordering::SeqCst);
        let state = CycleState::begin(cycle_id, as_of, self.clock.now(), cancel);
        let span = info_span!("cycle", cycle_id, as_of = %as_of);
        let started = Instant::now();

        let aggregation = {
            let aggregator = self.aggregator.clone();
            let barrier = state.barrier.clone();
            let cancel = state.cancel.clone();
            tokio::spawn(
                async move { aggregator.run(as_of, &barrier, &cancel).await }
                    .instrument(span.clone()),
            )
        };
        let synchronization = {
            let synchronizer = self.synchronizer.clone();
            let barrier = state.barrier.clone();
            let cancel = state.cancel.clone();
            tokio::spawn(
                async move { synchronizer.synchronize(as_of, &barrier, &cancel).await }
                    .instrument(span.clone()),
            )
        };

        let barrier = state.barrier.clone();
        let (aggregation, synchronization) = tokio::join!(
            async move {
                let joined = aggregation.await;
                if joined.is_err() {
                    // A crashed producer never settled the barrier.
                    barrier.abandon();
                }
                flatten(Phase::Aggregation, joined)
            },
            async move { flatten(Phase::Synchronization, synchronization.await) },
        );

        CycleReport {
            cycle_id,
            as_of,
            started_at: state.started_at,
            elapsed: started.elapsed(),
            aggregation,
            synchronization,
        }
    }
}

fn flatten<T, E>(phase: Phase, joined: Result<Result<T, E>, JoinError>) -> Result<T, CycleError>
where
    CycleError: From<E>,
{
    match joined {
        Ok(result) => result.map_err(CycleError::from),
        Err(e) => {
            warn!(%phase, error = %e, "Phase task did not complete");
            Err(CycleError::PhaseCrashed {
                phase,
                reason: e.to_string(),
            })
        }
    }
}
