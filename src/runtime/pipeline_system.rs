use super::PipelineError;
use crate::aggregator::Aggregator;
use crate::clients::EffectClients;
use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigError, PipelineConfig};
use crate::orchestrator::CycleOrchestrator;
use crate::report::ReportSink;
use crate::store::OrderStore;
use crate::synchronizer::Synchronizer;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Builds the trigger, both phases and the orchestrator from `config`.
///
/// The store is shared by the two phases; each opens its own session per cycle.
pub fn build_orchestrator(
    config: &PipelineConfig,
    store: Arc<dyn OrderStore>,
    effects: EffectClients,
    sink: Arc<dyn ReportSink>,
    clock: Arc<dyn Clock>,
) -> Result<CycleOrchestrator, ConfigError> {
    config.validate()?;
    let trigger = config.trigger()?;
    let aggregator = Aggregator::new(store.clone(), sink);
    let synchronizer = Synchronizer::new(store, effects, config.sync_settings());

    Ok(CycleOrchestrator::new(
        trigger,
        clock,
        aggregator,
        synchronizer,
        config.schedule_settings(),
    )?)
}

/// The running pipeline: the scheduling loop task and the token that stops it.
///
/// # Example
///
/// ```ignore
/// let system = PipelineSystem::start(&config, store, EffectClients::logging(), sink)?;
///
/// tokio::signal::ctrl_c().await?;
/// let cycles = system.shutdown().await?;
/// ```
pub struct PipelineSystem {
    cancel: CancellationToken,
    handle: JoinHandle<u64>,
    grace_period: Duration,
}

impl PipelineSystem {
    /// Wires the pipeline from `config` and starts the scheduling loop on the system clock.
    pub fn start(
        config: &PipelineConfig,
        store: Arc<dyn OrderStore>,
        effects: EffectClients,
        sink: Arc<dyn ReportSink>,
    ) -> Result<Self, PipelineError> {
        Self::start_with_clock(config, store, effects, sink, Arc::new(SystemClock))
    }

    pub fn start_with_clock(
        config: &PipelineConfig,
        store: Arc<dyn OrderStore>,
        effects: EffectClients,
        sink: Arc<dyn ReportSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, PipelineError> {
        let orchestrator = build_orchestrator(config, store, effects, sink, clock)?;
        info!(config = %config.source_name(), "Starting order pipeline");
        Ok(Self::spawn(orchestrator, config.grace_period()))
    }

    /// Starts the scheduling loop for an already built orchestrator.
    pub fn spawn(orchestrator: CycleOrchestrator, grace_period: Duration) -> Self {
        let cancel = CancellationToken::new();

        let handle = {
            let cancel = cancel.clone();
            tokio::spawn(async move { orchestrator.run(cancel).await })
        };

        Self {
            cancel,
            handle,
            grace_period,
        }
    }

    /// Root cancellation token. Cancelling it has the same effect as [`shutdown`](Self::shutdown)
    /// without waiting.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancels the loop and waits up to the grace period for it to stop.
    ///
    /// Returns the number of cycles the loop ran. The loop task is aborted
    /// when the grace period runs out.
    pub async fn shutdown(self) -> Result<u64, PipelineError> {
        info!(grace_period = ?self.grace_period, "Shutting down order pipeline...");
        self.cancel.cancel();

        let mut handle = self.handle;
        match tokio::time::timeout(self.grace_period, &mut handle).await {
            Ok(Ok(cycles)) => {
                info!(cycles, "Order pipeline shutdown complete.");
                Ok(cycles)
            }
            Ok(Err(e)) => {
                error!(error = %e, "Scheduling loop failed");
                Err(PipelineError::LoopCrashed(e.to_string()))
            }
            Err(_) => {
                warn!(grace_period = ?self.grace_period, "Scheduling loop still busy, aborting");
                handle.abort();
                Err(PipelineError::ShutdownTimedOut(self.grace_period))
            }
        }
    }
}
