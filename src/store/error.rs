//! Error types for the order store.

use thiserror::Error;

/// Errors raised while reading orders.
///
/// Recoverable: the cycle that hits one fails, the next cycle starts fresh.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DataAccessError {
    /// No session could be opened against the store.
    #[error("Order store unavailable: {0}")]
    Unavailable(String),

    /// A query was accepted but failed.
    #[error("Order query failed: {0}")]
    QueryFailed(String),

    /// A stored record violates the order invariants.
    #[error("Invalid order record {id}: {reason}")]
    InvalidRecord { id: String, reason: String },
}
