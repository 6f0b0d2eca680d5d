//! # Order Pipeline
//!
//! > **A daily order aggregation and synchronization service.**
//!
//! Once a day (or on every poll, in interval mode) the pipeline runs one
//! **cycle** for a reporting date:
//!
//! 1. **Aggregation** reads every order created that day, computes the total
//!    revenue and the count per status, and overwrites the report artifact.
//! 2. **Synchronization** waits until the report is written, then pushes every
//!    `Approved` order of that day to the ERP, loyalty and shipping systems,
//!    with at most `max_concurrency` orders in flight.
//!
//! The two phases start together and are ordered only by a per-cycle
//! [`Barrier`](barrier::Barrier): synchronization never starts its fan-out
//! before aggregation has finished writing the report.
//!
//! ## 🏗️ Architecture Notes
//!
//! ### 1. Type-Safe Error Handling
//! Each concern defines its own error enum (`DataAccessError`, `EffectError`,
//! `SyncError`, ...). Phase errors convert into [`CycleError`](orchestrator::CycleError)
//! with `#[from]`, and a cycle's failures are recorded in its
//! [`CycleReport`](orchestrator::CycleReport). They never stop the scheduling loop.
//!
//! ### 2. Failure Isolation
//! A failed effect call is recorded against its order and effect only. The
//! other effects of that order and every other order still run.
//!
//! ### 3. Cancellation
//! One root `CancellationToken` stops the loop; each cycle gets a child token
//! that is checked by the store queries, the barrier wait, the worker pool and
//! effect retries.
//!
//! ### 4. Observability
//! `tracing` everywhere, with a `cycle` span per cycle and a span per phase.
//! See the [`runtime::tracing`] module for details.
//!
//! ## 🗺️ Module Tour
//!
//! - [`model`]: orders, statuses and the [`AggregationResult`](model::AggregationResult).
//! - [`store`]: the [`OrderStore`](store::OrderStore) seam and an in-memory implementation.
//! - [`clients`]: the [`EffectClient`](clients::EffectClient) seam and the logging clients.
//! - [`report`]: the [`ReportSink`](report::ReportSink) seam and the atomic file sink.
//! - [`aggregator`] and [`synchronizer`]: the two phases.
//! - [`barrier`]: the one-shot latch between them.
//! - [`trigger`] and [`clock`]: when a cycle fires.
//! - [`orchestrator`]: the scheduling loop and a single cycle.
//! - [`config`] and [`runtime`]: TOML configuration, wiring, shutdown and tracing setup.
//! - [`mock`]: test doubles for every seam.
//!
//! ## 🚀 Quick Start
//!
//! ```bash
//! # Run the scheduler with info logs
//! RUST_LOG=info cargo run -- --config config/pipeline.toml
//!
//! # Run a single cycle for a given day and exit
//! cargo run -- --run-once --date 2024-03-01
//! ```

pub mod aggregator;
pub mod barrier;
pub mod clients;
pub mod clock;
pub mod config;
pub mod mock;
pub mod model;
pub mod orchestrator;
pub mod report;
pub mod runtime;
pub mod store;
pub mod synchronizer;
pub mod trigger;
