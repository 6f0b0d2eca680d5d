//! Report artifact produced by the aggregation phase.
//!
//! The artifact is plain text, overwritten every cycle:
//!
//! ```text
//! Total revenue: 37
//! Orders with status Pending: 1
//! Orders with status Approved: 2
//! ```

pub mod error;
pub mod file_sink;

pub use error::*;
pub use file_sink::*;

use async_trait::async_trait;
use chrono::NaiveDate;

/// Destination of the aggregation report.
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Replaces any previous artifact with `contents`.
    ///
    /// `as_of` is the reporting day the contents describe. The file sink keeps
    /// a single artifact and only records the day in its log line.
    async fn write_report(&self, as_of: NaiveDate, contents: &str) -> Result<(), ReportError>;

    /// Human-readable location, for logs.
    fn location(&self) -> String;
}
