//! Error types for report writing.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReportError {
    #[error("Failed to write report to {location}: {reason}")]
    Write { location: String, reason: String },
}
