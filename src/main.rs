use anyhow::{bail, Context};
use chrono::{NaiveDate, Utc};
use clap::Parser;
use order_pipeline::clients::EffectClients;
use order_pipeline::clock::SystemClock;
use order_pipeline::config::PipelineConfig;
use order_pipeline::report::{FileReportSink, ReportSink};
use order_pipeline::runtime::{build_orchestrator, setup_tracing, PipelineSystem};
use order_pipeline::store::{InMemoryOrderStore, OrderStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Daily order aggregation and synchronization service
#[derive(Parser, Debug)]
#[command(name = "order-pipeline", version, about)]
struct Args {
    /// Path to TOML configuration file (default: $CONFIG_FILE, then built-in defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a single cycle immediately and exit
    #[arg(long)]
    run_once: bool,

    /// Reporting date for --run-once, as YYYY-MM-DD
    #[arg(long, requires = "run_once")]
    date: Option<NaiveDate>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = PipelineConfig::load(args.config.as_deref()).context("loading configuration")?;
    setup_tracing(config.logging.format);

    info!(
        config = %config.source_name(),
        mode = ?config.schedule.mode,
        fire_at = %config.schedule.fire_at,
        report_path = %config.aggregation.report_path.display(),
        max_concurrency = config.synchronization.max_concurrency,
        "config_loaded"
    );

    let seeded = match &config.store.seed_file {
        Some(path) => InMemoryOrderStore::from_json_file(path).context("seeding order store")?,
        None => InMemoryOrderStore::default(),
    };
    if seeded.is_empty().await {
        warn!("Order store is empty, reports will show zero revenue");
    } else {
        info!(orders = seeded.len().await, "Order store ready");
    }
    let store: Arc<dyn OrderStore> = Arc::new(seeded);
    let sink: Arc<dyn ReportSink> = Arc::new(FileReportSink::new(&config.aggregation.report_path));
    let effects = EffectClients::logging();

    if args.run_once {
        return run_once(&config, store, effects, sink, args.date).await;
    }

    let system = PipelineSystem::start(&config, store, effects, sink)?;

    tokio::signal::ctrl_c()
        .await
        .context("listening for Ctrl+C")?;
    info!("Ctrl+C received");

    let cycles = system.shutdown().await?;
    info!(cycles, "order-pipeline stopped");
    Ok(())
}

async fn run_once(
    config: &PipelineConfig,
    store: Arc<dyn OrderStore>,
    effects: EffectClients,
    sink: Arc<dyn ReportSink>,
    date: Option<NaiveDate>,
) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(config, store, effects, sink, Arc::new(SystemClock))?;
    let as_of = date.unwrap_or_else(|| config.schedule.reporting_day.as_of(Utc::now()));

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl+C received, cancelling cycle");
                cancel.cancel();
            }
        })
    };

    let report = orchestrator.run_cycle(as_of, &cancel).await;
    interrupt.abort();
    report.log();

    if !report.is_success() {
        bail!("cycle {} for {} did not complete cleanly", report.cycle_id, as_of);
    }
    Ok(())
}
