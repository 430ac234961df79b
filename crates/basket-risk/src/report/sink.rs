//! Destinations for computed results.

use super::{charts::ChartSet, narrative::Report};
use crate::{
    Result,
    correlation::CorrelationMatrix,
    metrics::ExtremeDay,
    ranking::RiskTable,
    sector::{SectorSummary, sectors_to_frame},
};
use polars::prelude::*;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Receives the results of a run.
///
/// Sinks only persist or forward what they are given; they never compute.
pub trait ReportSink: std::fmt::Debug {
    /// Ranked risk table.
    fn write_risk_table(&mut self, table: &RiskTable) -> Result<()>;
    /// Sector aggregates.
    fn write_sector_summary(&mut self, sectors: &[SectorSummary]) -> Result<()>;
    /// Correlation matrix.
    fn write_correlations(&mut self, matrix: &CorrelationMatrix) -> Result<()>;
    /// Extreme days of one symbol.
    fn write_extreme_days(&mut self, symbol: &str, days: &[ExtremeDay]) -> Result<()>;
    /// Chart data.
    fn write_charts(&mut self, charts: &ChartSet) -> Result<()>;
    /// Narrative report.
    fn write_report(&mut self, report: &Report) -> Result<()>;
}

/// Tabular view of an extreme-day listing.
pub fn extreme_days_to_frame(days: &[ExtremeDay]) -> Result<DataFrame> {
    Ok(df![
        "date" => days.iter().map(|d| d.date.format("%Y-%m-%d").to_string()).collect::<Vec<_>>(),
        "log_return" => days.iter().map(|d| d.log_return).collect::<Vec<_>>(),
        "z_score" => days.iter().map(|d| d.z_score).collect::<Vec<_>>(),
        "direction" => days.iter().map(|d| d.direction.to_string()).collect::<Vec<_>>(),
    ]?)
}

/// Writes CSV, JSON and Markdown files under an output root.
///
/// Layout:
/// - `reports/risk_ranking.csv`
/// - `reports/sector_summary.csv`
/// - `reports/correlation_matrix.csv`
/// - `reports/summary_report.md`
/// - `data/<ticker>_extreme_days.csv`
/// - `plots/charts.json`
#[derive(Debug, Clone)]
pub struct FileSink {
    root: PathBuf,
}

impl FileSink {
    /// Create the output directories under `root`.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for dir in ["reports", "data", "plots"] {
            fs::create_dir_all(root.join(dir))?;
        }
        Ok(Self { root })
    }

    /// The output root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the extreme-day file of `symbol`.
    pub fn extreme_days_path(&self, symbol: &str) -> PathBuf {
        self.root
            .join("data")
            .join(format!("{}_extreme_days.csv", symbol.replace('.', "_")))
    }

    fn write_csv(&self, path: PathBuf, mut frame: DataFrame) -> Result<()> {
        let mut file = File::create(&path)?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut frame)?;
        debug!(path = %path.display(), rows = frame.height(), "wrote csv");
        Ok(())
    }
}

impl ReportSink for FileSink {
    fn write_risk_table(&mut self, table: &RiskTable) -> Result<()> {
        self.write_csv(self.root.join("reports/risk_ranking.csv"), table.to_frame()?)
    }

    fn write_sector_summary(&mut self, sectors: &[SectorSummary]) -> Result<()> {
        self.write_csv(self.root.join("reports/sector_summary.csv"), sectors_to_frame(sectors)?)
    }

    fn write_correlations(&mut self, matrix: &CorrelationMatrix) -> Result<()> {
        self.write_csv(self.root.join("reports/correlation_matrix.csv"), matrix.to_frame()?)
    }

    fn write_extreme_days(&mut self, symbol: &str, days: &[ExtremeDay]) -> Result<()> {
        self.write_csv(self.extreme_days_path(symbol), extreme_days_to_frame(days)?)
    }

    fn write_charts(&mut self, charts: &ChartSet) -> Result<()> {
        let path = self.root.join("plots/charts.json");
        fs::write(&path, serde_json::to_string_pretty(charts)?)?;
        debug!(path = %path.display(), "wrote charts");
        Ok(())
    }

    fn write_report(&mut self, report: &Report) -> Result<()> {
        let path = self.root.join("reports/summary_report.md");
        fs::write(&path, report.to_markdown())?;
        debug!(path = %path.display(), "wrote report");
        Ok(())
    }
}

/// Keeps everything it receives.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    /// Last risk table
    pub risk_table: Option<RiskTable>,
    /// Last sector summary
    pub sectors: Vec<SectorSummary>,
    /// Last correlation matrix
    pub correlations: Option<CorrelationMatrix>,
    /// Extreme days by ticker
    pub extreme_days: BTreeMap<String, Vec<ExtremeDay>>,
    /// Last chart set
    pub charts: Option<ChartSet>,
    /// Last report
    pub report: Option<Report>,
}

impl ReportSink for MemorySink {
    fn write_risk_table(&mut self, table: &RiskTable) -> Result<()> {
        self.risk_table = Some(table.clone());
        Ok(())
    }

    fn write_sector_summary(&mut self, sectors: &[SectorSummary]) -> Result<()> {
        self.sectors = sectors.to_vec();
        Ok(())
    }

    fn write_correlations(&mut self, matrix: &CorrelationMatrix) -> Result<()> {
        self.correlations = Some(matrix.clone());
        Ok(())
    }

    fn write_extreme_days(&mut self, symbol: &str, days: &[ExtremeDay]) -> Result<()> {
        self.extreme_days.insert(symbol.to_string(), days.to_vec());
        Ok(())
    }

    fn write_charts(&mut self, charts: &ChartSet) -> Result<()> {
        self.charts = Some(charts.clone());
        Ok(())
    }

    fn write_report(&mut self, report: &Report) -> Result<()> {
        self.report = Some(report.clone());
        Ok(())
    }
}
