//! Error types for cycle execution.

use crate::aggregator::AggregationError;
use crate::synchronizer::SyncError;
use std::fmt::Display;
use thiserror::Error;

/// The two concurrently running phases of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Aggregation,
    Synchronization,
}

impl Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Aggregation => f.write_str("aggregation"),
            Phase::Synchronization => f.write_str("synchronization"),
        }
    }
}

/// Failure of one phase of one cycle. Never escapes the cycle boundary.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CycleError {
    #[error("Aggregation phase failed: {0}")]
    Aggregation(#[from] AggregationError),

    #[error("Synchronization phase failed: {0}")]
    Synchronization(#[from] SyncError),

    /// The phase task panicked or was aborted.
    #[error("{phase} phase crashed: {reason}")]
    PhaseCrashed { phase: Phase, reason: String },
}

impl CycleError {
    pub fn phase(&self) -> Phase {
        match self {
            CycleError::Aggregation(_) => Phase::Aggregation,
            CycleError::Synchronization(_) => Phase::Synchronization,
            CycleError::PhaseCrashed { phase, .. } => *phase,
        }
    }
}
