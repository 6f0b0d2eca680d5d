//! Error types for the aggregation phase.

use crate::report::ReportError;
use crate::store::DataAccessError;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum AggregationError {
    #[error(transparent)]
    DataAccess(#[from] DataAccessError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error("Aggregation cancelled")]
    Cancelled,
}
