//! Error types for trigger configuration.

use thiserror::Error;

/// A malformed fire condition. Fatal to the scheduling loop.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TriggerError {
    #[error("Invalid fire time {0:?}: expected HH:MM")]
    Malformed(String),

    #[error("Fire time out of range: hour {hour}, minute {minute}")]
    OutOfRange { hour: u32, minute: u32 },

    #[error("Poll interval must be greater than zero")]
    ZeroPollInterval,
}
