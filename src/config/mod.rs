//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. `--config <path>` command line argument
//! 2. `CONFIG_FILE` environment variable
//! 3. Built-in defaults (no file)
//!
//! Every key is optional; a missing key takes the default shown below.
//!
//! ```toml
//! [schedule]
//! mode = "daily"              # or "interval": fire on every poll
//! fire_at = "00:00"           # UTC, daily mode only
//! poll_interval_secs = 60     # at most 60 in daily mode
//! reporting_day = "current"   # or "previous"
//!
//! [aggregation]
//! report_path = "daily_orders_aggregation.txt"
//!
//! [synchronization]
//! max_concurrency = 10
//! barrier_timeout_secs = 300
//! effect_max_attempts = 1
//! effect_retry_backoff_ms = 500
//!
//! [shutdown]
//! grace_period_secs = 10
//!
//! [store]
//! seed_file = "orders.json"   # optional
//!
//! [logging]
//! format = "compact"          # or "json"
//! ```

pub mod error;

pub use error::*;

use crate::clients::RetryPolicy;
use crate::orchestrator::{ReportingDay, ScheduleSettings};
use crate::synchronizer::SyncSettings;
use crate::trigger::{DailyTrigger, IntervalTrigger, Trigger, TriggerError};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Longest poll that still lands inside the daily fire minute.
pub const MAX_DAILY_POLL_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleMode {
    #[default]
    Daily,
    Interval,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub mode: ScheduleMode,
    pub fire_at: String,
    pub poll_interval_secs: u64,
    pub reporting_day: ReportingDay,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            mode: ScheduleMode::Daily,
            fire_at: "00:00".to_string(),
            poll_interval_secs: 60,
            reporting_day: ReportingDay::Current,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub report_path: PathBuf,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            report_path: PathBuf::from("daily_orders_aggregation.txt"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SynchronizationConfig {
    pub max_concurrency: usize,
    pub barrier_timeout_secs: u64,
    pub effect_max_attempts: u32,
    pub effect_retry_backoff_ms: u64,
}

impl Default for SynchronizationConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            barrier_timeout_secs: 300,
            effect_max_attempts: 1,
            effect_retry_backoff_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    pub grace_period_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { grace_period_secs: 10 }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub seed_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub schedule: ScheduleConfig,
    pub aggregation: AggregationConfig,
    pub synchronization: SynchronizationConfig,
    pub shutdown: ShutdownConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
    /// Where the configuration came from, for logs.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl PipelineConfig {
    /// Resolves the config path (explicit path, then `CONFIG_FILE`) and loads it.
    /// Falls back to the defaults when neither is set.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match Self::resolve_config_path(explicit) {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| env::var_os("CONFIG_FILE").map(PathBuf::from))
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut config = Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::Parse { reason, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                reason,
            },
            other => other,
        })?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: "<inline>".to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schedule.poll_interval_secs == 0 {
            return Err(TriggerError::ZeroPollInterval.into());
        }
        if self.schedule.mode == ScheduleMode::Daily {
            DailyTrigger::parse(&self.schedule.fire_at)?;
            if self.schedule.poll_interval_secs > MAX_DAILY_POLL_INTERVAL_SECS {
                return Err(ConfigError::Invalid(format!(
                    "schedule.poll_interval_secs is {} but daily mode needs at most {}: \
                     the fire condition holds for one minute, a longer poll can miss it",
                    self.schedule.poll_interval_secs, MAX_DAILY_POLL_INTERVAL_SECS
                )));
            }
        }
        if self.synchronization.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "synchronization.max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.synchronization.effect_max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "synchronization.effect_max_attempts must be at least 1".to_string(),
            ));
        }
        if self.synchronization.barrier_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "synchronization.barrier_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn trigger(&self) -> Result<Arc<dyn Trigger>, TriggerError> {
        Ok(match self.schedule.mode {
            ScheduleMode::Daily => Arc::new(DailyTrigger::parse(&self.schedule.fire_at)?),
            ScheduleMode::Interval => Arc::new(IntervalTrigger),
        })
    }

    pub fn schedule_settings(&self) -> ScheduleSettings {
        ScheduleSettings {
            poll_interval: Duration::from_secs(self.schedule.poll_interval_secs),
            reporting_day: self.schedule.reporting_day,
        }
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            max_concurrency: self.synchronization.max_concurrency,
            barrier_timeout: Duration::from_secs(self.synchronization.barrier_timeout_secs),
            retry: RetryPolicy {
                max_attempts: self.synchronization.effect_max_attempts,
                backoff: Duration::from_millis(self.synchronization.effect_retry_backoff_ms),
            },
            grace_period: self.grace_period(),
        }
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.shutdown.grace_period_secs)
    }

    pub fn source_name(&self) -> String {
        self.source
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "defaults".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_daily_midnight_run() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.schedule.fire_at, "00:00");
        assert_eq!(config.schedule_settings().poll_interval, Duration::from_secs(60));
        assert_eq!(config.sync_settings().max_concurrency, 10);
        assert_eq!(
            config.aggregation.report_path,
            PathBuf::from("daily_orders_aggregation.txt")
        );
        assert_eq!(config.source_name(), "defaults");
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
[synchronization]
max_concurrency = 4

[schedule]
reporting_day = "previous"
"#,
        )
        .unwrap();

        assert_eq!(config.synchronization.max_concurrency, 4);
        assert_eq!(config.synchronization.barrier_timeout_secs, 300);
        assert_eq!(config.schedule.reporting_day, ReportingDay::Previous);
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn test_malformed_fire_time_is_a_trigger_error() {
        let err = PipelineConfig::from_toml_str("[schedule]\nfire_at = \"25:00\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Trigger(TriggerError::OutOfRange { .. })));
    }

    #[test]
    fn test_interval_mode_ignores_fire_time() {
        let config = PipelineConfig::from_toml_str(
            "[schedule]\nmode = \"interval\"\nfire_at = \"whenever\"\npoll_interval_secs = 5\n",
        )
        .unwrap();
        assert!(config.trigger().is_ok());
    }

    #[test]
    fn test_daily_poll_longer_than_fire_minute_rejected() {
        let err = PipelineConfig::from_toml_str("[schedule]\npoll_interval_secs = 90\n")
            .unwrap_err();
        assert!(
            matches!(err, ConfigError::Invalid(ref reason) if reason.contains("poll_interval_secs"))
        );

        assert!(PipelineConfig::from_toml_str("[schedule]\npoll_interval_secs = 60\n").is_ok());
        let hourly = "[schedule]\nmode = \"interval\"\npoll_interval_secs = 3600\n";
        assert!(PipelineConfig::from_toml_str(hourly).is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let err =
            PipelineConfig::from_toml_str("[synchronization]\nmax_concurrency = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let err =
            PipelineConfig::from_toml_str("[schedule]\npoll_interval_secs = 0\n").unwrap_err();
        assert_eq!(err, ConfigError::Trigger(TriggerError::ZeroPollInterval));
    }

    #[test]
    fn test_unknown_mode_is_a_parse_error() {
        let err = PipelineConfig::from_toml_str("[schedule]\nmode = \"hourly\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
