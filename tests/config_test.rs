use chrono::NaiveDate;
use order_pipeline::clock::SystemClock;
use order_pipeline::config::{ConfigError, LogFormat, PipelineConfig, ScheduleMode};
use order_pipeline::mock::RecordingEffect;
use order_pipeline::model::OrderId;
use order_pipeline::orchestrator::ReportingDay;
use order_pipeline::report::FileReportSink;
use order_pipeline::runtime::build_orchestrator;
use order_pipeline::store::InMemoryOrderStore;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const SEED: &str = r#"[
  {
    "id": 1, "company_id": 10, "created_at": "2024-03-01T08:15:00Z", "status": "Approved",
    "items": [{"quantity": 2, "unit_price": "5"}]
  },
  {
    "id": 2, "company_id": 11, "created_at": "2024-03-01T11:40:00Z", "status": "Approved",
    "items": [{"quantity": 1, "unit_price": "12"}]
  },
  {
    "id": 3, "company_id": 10, "created_at": "2024-03-01T17:05:00Z", "status": "Pending",
    "items": [{"quantity": 3, "unit_price": "5"}]
  }
]"#;

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[schedule]
mode = "interval"
poll_interval_secs = 5
reporting_day = "previous"

[synchronization]
max_concurrency = 3
effect_max_attempts = 2

[logging]
format = "json"
"#
    )
    .unwrap();

    let config = PipelineConfig::load(Some(file.path())).unwrap();

    assert_eq!(config.schedule.mode, ScheduleMode::Interval);
    assert_eq!(config.schedule.reporting_day, ReportingDay::Previous);
    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(config.sync_settings().max_concurrency, 3);
    assert_eq!(config.sync_settings().retry.max_attempts, 2);
    assert_eq!(config.grace_period(), Duration::from_secs(10));
    assert_eq!(config.source_name(), file.path().display().to_string());
}

#[test]
fn test_missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = PipelineConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn test_parse_error_names_the_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[schedule\nmode = ").unwrap();

    match PipelineConfig::from_file(file.path()).unwrap_err() {
        ConfigError::Parse { path, .. } => assert_eq!(path, file.path().display().to_string()),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_seeded_run_writes_report_file() {
    let dir = tempfile::tempdir().unwrap();
    let seed = dir.path().join("orders.json");
    let report_path = dir.path().join("reports").join("daily_orders_aggregation.txt");
    std::fs::write(&seed, SEED).unwrap();

    let config = PipelineConfig::from_toml_str(&format!(
        "[aggregation]\nreport_path = {:?}\n\n[store]\nseed_file = {:?}\n",
        report_path.display().to_string(),
        seed.display().to_string(),
    ))
    .unwrap();

    let seed_file = config.store.seed_file.as_ref().unwrap();
    let store = InMemoryOrderStore::from_json_file(seed_file).unwrap();
    let (effects, erp, ..) = RecordingEffect::clients();
    let orchestrator = build_orchestrator(
        &config,
        Arc::new(store),
        effects,
        Arc::new(FileReportSink::new(&config.aggregation.report_path)),
        Arc::new(SystemClock),
    )
    .unwrap();

    let report = orchestrator
        .run_cycle(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), &CancellationToken::new())
        .await;

    assert!(report.is_success());
    assert_eq!(
        std::fs::read_to_string(&report_path).unwrap(),
        "Total revenue: 37\nOrders with status Pending: 1\nOrders with status Approved: 2\n"
    );
    let mut calls = erp.calls();
    calls.sort();
    assert_eq!(calls, vec![OrderId(1), OrderId(2)]);
    assert_eq!(report.synchronization.unwrap().outcome(OrderId(1)).unwrap().effects.len(), 3);
}
