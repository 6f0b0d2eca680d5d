//! # Observability & Tracing
//!
//! The [`setup_tracing`] function initializes structured logging with the `tracing` crate.
//! Every cycle runs inside a `cycle` span carrying `cycle_id` and `as_of`, and the
//! phases open `aggregation` / `synchronization` spans below it, so a single
//! line shows where it came from.
//!
//! ## Configuration
//!
//! - **Log levels** via the `RUST_LOG` environment variable, `info` when unset
//! - **Compact format** (default) hides the module prefix (`with_target(false)`)
//! - **JSON format** (`[logging] format = "json"`) for log shippers
//!
//! ```bash
//! # Milestones only
//! RUST_LOG=info order-pipeline --config pipeline.toml
//!
//! # Every effect attempt, with full order payloads
//! RUST_LOG=debug order-pipeline --run-once
//!
//! # Quiet everything except synchronization failures
//! RUST_LOG=warn,order_pipeline::synchronizer=debug order-pipeline
//! ```
//!
//! ## Cycle Trace Example
//!
//! **With `RUST_LOG=info`** (compact):
//!
//! ```text
//! INFO Starting daily order processing as_of=2024-03-01
//! INFO cycle:aggregation: Starting order aggregation cycle_id=1 as_of=2024-03-01
//! INFO cycle:synchronization: Waiting for aggregation to complete before starting synchronization cycle_id=1 as_of=2024-03-01
//! INFO cycle:aggregation: Order aggregation completed, synchronization released total_revenue=37 orders=3 report=daily_orders_aggregation.txt
//! INFO cycle:synchronization: Starting order synchronization eligible=2 max_concurrency=10
//! INFO cycle:synchronization: Order synchronization completed orders=2
//! INFO Daily order processing completed cycle_id=1 as_of=2024-03-01 elapsed_ms=4 total_revenue=37 orders=3 synced=2
//! ```
//!
//! A failed effect is a single `WARN` line with `order_id`, `effect` and `error`
//! fields. The rest of the cycle carries on.

use crate::config::LogFormat;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. Call once, at startup.
pub fn setup_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }
}
