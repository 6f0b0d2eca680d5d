//! Runtime orchestration and lifecycle management.
//!
//! This module contains the infrastructure for running the pipeline as a
//! long-lived process:
//!
//! - **Wiring**: building the trigger, phases and orchestrator from a
//!   [`PipelineConfig`](crate::config::PipelineConfig)
//! - **Lifecycle**: starting the scheduling loop and shutting it down within a grace period
//! - **Observability setup**: Initializing tracing and logging
//!
//! # Main Components
//!
//! - [`PipelineSystem`] - owns the scheduling loop task and its cancellation token
//! - [`setup_tracing`] - Initializes the tracing/logging infrastructure

pub mod error;
pub mod pipeline_system;
pub mod tracing;

pub use error::*;
pub use pipeline_system::*;
pub use tracing::*;
