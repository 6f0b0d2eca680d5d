use crate::report::{ReportError, ReportSink};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Writes the report to a fixed path.
///
/// The contents go to a `.tmp` sibling first and are then renamed over the
/// target, so readers never observe a half-written report. Writes through the
/// same sink are serialised.
#[derive(Debug)]
pub struct FileReportSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileReportSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        PathBuf::from(staging)
    }

    fn write_error(&self, e: std::io::Error) -> ReportError {
        ReportError::Write {
            location: self.location(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl ReportSink for FileReportSink {
    #[instrument(skip_all, fields(path = %self.path.display()))]
    async fn write_report(&self, as_of: NaiveDate, contents: &str) -> Result<(), ReportError> {
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.write_error(e))?;
        }

        let staging = self.staging_path();
        tokio::fs::write(&staging, contents)
            .await
            .map_err(|e| self.write_error(e))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|e| self.write_error(e))?;

        debug!(%as_of, bytes = contents.len(), "Report written");
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
