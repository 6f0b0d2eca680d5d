use crate::clients::{EffectError, EffectKind};
use crate::model::{CompanyId, OrderId};
use chrono::NaiveDate;

/// Result of one effect for one order.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectOutcome {
    pub kind: EffectKind,
    /// Attempts made, including the first. Zero if cancelled before the first call.
    pub attempts: u32,
    pub result: Result<(), EffectError>,
}

impl EffectOutcome {
    pub fn new(kind: EffectKind, attempts: u32, result: Result<(), EffectError>) -> Self {
        Self {
            kind,
            attempts,
            result,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// All effect outcomes for one eligible order.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    pub order_id: OrderId,
    pub company_id: CompanyId,
    pub effects: Vec<EffectOutcome>,
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        self.effects.iter().all(EffectOutcome::is_success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &EffectError> {
        self.effects.iter().filter_map(|e| e.result.as_ref().err())
    }

    pub fn effect(&self, kind: EffectKind) -> Option<&EffectOutcome> {
        self.effects.iter().find(|e| e.kind == kind)
    }
}

/// Summary of a synchronization phase that got past the barrier.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub as_of: NaiveDate,
    pub eligible: usize,
    /// One entry per order whose worker ran to completion, in completion order.
    pub outcomes: Vec<SyncOutcome>,
    /// Cancellation stopped the fan-out before every order was processed.
    pub interrupted: bool,
    /// Workers aborted after the shutdown grace period.
    pub aborted_workers: usize,
    /// Workers that panicked.
    pub crashed_workers: usize,
}

impl SyncReport {
    pub fn new(as_of: NaiveDate, eligible: usize) -> Self {
        Self {
            as_of,
            eligible,
            outcomes: Vec::with_capacity(eligible),
            interrupted: false,
            aborted_workers: 0,
            crashed_workers: 0,
        }
    }

    pub fn succeeded_effects(&self) -> usize {
        self.all_effects().filter(|e| e.is_success()).count()
    }

    pub fn failed_effects(&self) -> usize {
        self.all_effects().filter(|e| !e.is_success()).count()
    }

    pub fn failed_orders(&self) -> Vec<OrderId> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| o.order_id)
            .collect()
    }

    pub fn outcome(&self, order_id: OrderId) -> Option<&SyncOutcome> {
        self.outcomes.iter().find(|o| o.order_id == order_id)
    }

    /// Every eligible order was processed and every effect succeeded.
    pub fn is_clean(&self) -> bool {
        !self.interrupted
            && self.crashed_workers == 0
            && self.aborted_workers == 0
            && self.outcomes.len() == self.eligible
            && self.outcomes.iter().all(SyncOutcome::is_success)
    }

    fn all_effects(&self) -> impl Iterator<Item = &EffectOutcome> {
        self.outcomes.iter().flat_map(|o| o.effects.iter())
    }
}
