//! Error types for the synchronization phase.

use crate::barrier::BarrierTimeoutError;
use crate::store::DataAccessError;
use thiserror::Error;

/// Reasons the synchronization phase did not fan out.
///
/// Per-order effect failures are not errors of the phase; they are reported
/// in the [`SyncReport`](crate::synchronizer::SyncReport).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SyncError {
    #[error(transparent)]
    BarrierTimeout(#[from] BarrierTimeoutError),

    #[error("Aggregation failed, synchronization abandoned")]
    Abandoned,

    #[error(transparent)]
    DataAccess(#[from] DataAccessError),

    #[error("Synchronization cancelled before fan-out")]
    Cancelled,
}
