use crate::report::Report;
use anyhow::Context;
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

/// Where a finished report goes.
pub trait ReportSink {
    fn write_report(&self, report: &Report, generated_at: NaiveDateTime)
        -> anyhow::Result<PathBuf>;
}

/// Writes `report_YYYYMMDD_HHMMSS.txt` into a directory, creating it on first use.
#[derive(Debug, Clone)]
pub struct FileReportSink {
    dir: PathBuf,
}

impl FileReportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ReportSink for FileReportSink {
    fn write_report(
        &self,
        report: &Report,
        generated_at: NaiveDateTime,
    ) -> anyhow::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create output dir {}", self.dir.display()))?;

        let path = self
            .dir
            .join(format!("report_{}.txt", generated_at.format("%Y%m%d_%H%M%S")));
        let mut text = report.finalize();
        text.push('\n');
        std::fs::write(&path, text)
            .with_context(|| format!("failed to write report {}", path.display()))?;

        tracing::info!(path = %path.display(), lines = report.lines().len(), "report written");
        Ok(path)
    }
}
