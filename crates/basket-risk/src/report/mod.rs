//! Reporting: the narrative and chart data of a run, and where they go.

pub mod charts;
pub mod narrative;
pub mod sink;

pub use charts::{ChartSet, return_histogram, z_score_series};
pub use narrative::{Report, Section, build_report};
pub use sink::{FileSink, MemorySink, ReportSink, extreme_days_to_frame};

use crate::{AnalysisConfig, Result, pipeline::PipelineOutput};
use tracing::info;

/// Hand every result of `output` to `sink`.
///
/// Symbols without extreme days get no listing.
pub fn publish(output: &PipelineOutput, config: &AnalysisConfig, sink: &mut dyn ReportSink) -> Result<()> {
    sink.write_risk_table(&output.table)?;
    sink.write_sector_summary(&output.sectors)?;
    sink.write_correlations(&output.correlations)?;

    let mut listed = 0;
    for analysis in &output.analyses {
        let days = analysis.extreme_days(config.extreme_z_threshold);
        if !days.is_empty() {
            sink.write_extreme_days(&analysis.metrics.symbol, &days)?;
            listed += 1;
        }
    }

    sink.write_charts(&ChartSet::build(output, config))?;
    sink.write_report(&build_report(output, config, chrono::Local::now().naive_local()))?;
    info!(symbols = output.table.len(), extreme_listings = listed, "results published");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Instrument, RiskPipeline, provider::InMemoryProvider, series::PriceSeries};
    use chrono::NaiveDate;

    fn run() -> (PipelineOutput, AnalysisConfig) {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut spiky = vec![100.0; 40];
        spiky[20] = 130.0;
        let calm: Vec<f64> = (0..40).map(|i| 100.0 + (i % 3) as f64).collect();
        let provider = InMemoryProvider::new()
            .with_series(PriceSeries::from_closes("SPK.IS", start, &spiky))
            .with_series(PriceSeries::from_closes("CLM.IS", start, &calm));
        let config = AnalysisConfig {
            universe: vec![
                Instrument::new("SPK.IS", "Spiky", "Energy"),
                Instrument::new("CLM.IS", "Calm", "Utilities"),
            ],
            start_date: start,
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            ..AnalysisConfig::default()
        };
        let output = RiskPipeline::new(config.clone()).unwrap().run(&provider).unwrap();
        (output, config)
    }

    #[test]
    fn test_publish_to_memory() {
        let (output, config) = run();
        let mut sink = MemorySink::default();
        publish(&output, &config, &mut sink).unwrap();

        assert_eq!(sink.risk_table.as_ref(), Some(&output.table));
        assert_eq!(sink.sectors.len(), 2);
        assert!(sink.correlations.is_some());
        assert!(sink.charts.is_some());
        assert!(sink.report.is_some());
        // The spike and the drop back are the only extreme moves.
        let spiky = &sink.extreme_days["SPK.IS"];
        assert_eq!(spiky.len(), 2);
        assert!(spiky[0].z_score > 0.0 && spiky[1].z_score < 0.0);
        assert!(!sink.extreme_days.contains_key("CLM.IS"));
    }

    #[test]
    fn test_publish_to_files() {
        let (output, config) = run();
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::create(dir.path()).unwrap();
        publish(&output, &config, &mut sink).unwrap();

        for file in [
            "reports/risk_ranking.csv",
            "reports/sector_summary.csv",
            "reports/correlation_matrix.csv",
            "reports/summary_report.md",
            "plots/charts.json",
            "data/SPK_IS_extreme_days.csv",
        ] {
            assert!(dir.path().join(file).exists(), "missing {file}");
        }
        assert!(!sink.extreme_days_path("CLM.IS").exists());

        let ranking = std::fs::read_to_string(dir.path().join("reports/risk_ranking.csv")).unwrap();
        let mut lines = ranking.lines();
        assert!(lines.next().unwrap().starts_with("symbol,name,sector,observations"));
        assert_eq!(lines.count(), 2);

        let report = std::fs::read_to_string(dir.path().join("reports/summary_report.md")).unwrap();
        assert!(report.starts_with("# Basket Risk Analysis Report"));
    }
}
