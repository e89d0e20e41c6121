use crate::domain::BandSeries;
use crate::storage::file_stem;
use anyhow::Context;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Receives a series with its bands for rendering. Has no bearing on scores or the report.
pub trait ChartSink {
    fn export(&self, name: &str, bands: &BandSeries) -> anyhow::Result<PathBuf>;
}

#[derive(Debug, Serialize)]
struct BandRow {
    date: String,
    close: f64,
    mid: Option<f64>,
    upper: Option<f64>,
    lower: Option<f64>,
}

/// Writes `{name}_boll.csv` with one row per date; undefined band rows leave the band
/// columns empty.
#[derive(Debug, Clone)]
pub struct CsvChartSink {
    dir: PathBuf,
}

impl CsvChartSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ChartSink for CsvChartSink {
    fn export(&self, name: &str, bands: &BandSeries) -> anyhow::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create chart dir {}", self.dir.display()))?;

        let path = self.dir.join(format!("{}_boll.csv", file_stem(name)));
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;

        for p in &bands.points {
            writer
                .serialize(BandRow {
                    date: p.date.format("%Y-%m-%d").to_string(),
                    close: p.close,
                    mid: p.band.map(|b| b.mid),
                    upper: p.band.map(|b| b.upper),
                    lower: p.band.map(|b| b.lower),
                })
                .with_context(|| format!("failed to write row to {}", path.display()))?;
        }
        writer
            .flush()
            .with_context(|| format!("failed to flush {}", path.display()))?;

        tracing::debug!(
            name,
            path = %path.display(),
            rows = bands.points.len(),
            "band csv exported"
        );
        Ok(path)
    }
}
