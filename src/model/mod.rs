//! Pure data structures read by the pipeline.
//!
//! The order store owns these records; the pipeline only reads them and
//! derives an [`AggregationResult`] per cycle.

pub mod aggregation;
pub mod order;

pub use aggregation::*;
pub use order::*;
