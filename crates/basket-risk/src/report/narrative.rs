//! Markdown summary of a run.

use crate::{
    AnalysisConfig,
    components::RiskComponent,
    pipeline::PipelineOutput,
    ranking::{RiskCategory, RiskRow},
    sector::best_sector,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One titled block of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Heading text
    pub title: String,
    /// Heading level, 2 for top-level sections
    pub level: u8,
    /// Markdown lines of the body
    pub lines: Vec<String>,
}

impl Section {
    fn new(title: impl Into<String>, level: u8) -> Self {
        Self {
            title: title.into(),
            level,
            lines: Vec::new(),
        }
    }

    fn line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    fn lines(mut self, lines: impl IntoIterator<Item = String>) -> Self {
        self.lines.extend(lines);
        self
    }
}

/// A titled list of sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// Document title
    pub title: String,
    /// Sections in document order
    pub sections: Vec<Section>,
}

impl Report {
    /// Section titled `title`, if any.
    pub fn section(&self, title: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.title == title)
    }

    /// Render as Markdown.
    pub fn to_markdown(&self) -> String {
        let mut out = format!("# {}\n", self.title);
        for section in &self.sections {
            let hashes = "#".repeat(usize::from(section.level.max(1)));
            out.push_str(&format!("\n{hashes} {}\n", section.title));
            for line in &section.lines {
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }
}

fn pct(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { f64::NAN } else { sum / n as f64 }
}

fn top_by<'a>(rows: &'a [RiskRow], n: usize, key: fn(&RiskRow) -> f64) -> Vec<&'a RiskRow> {
    let mut sorted: Vec<&RiskRow> = rows.iter().collect();
    sorted.sort_by(|a, b| key(b).total_cmp(&key(a)));
    sorted.truncate(n);
    sorted
}

/// Assemble the narrative report of `output`.
pub fn build_report(output: &PipelineOutput, config: &AnalysisConfig, generated_at: NaiveDateTime) -> Report {
    let rows = output.table.rows();
    let top_n = config.report.top_n;

    let header = Section::new("Overview", 2)
        .line(format!("**Analysis date:** {}", generated_at.format("%Y-%m-%d %H:%M")))
        .line(format!("**Data range:** {} - {}", config.start_date, config.end_date))
        .line(format!("**Symbols analysed:** {}", rows.len()))
        .line(format!("**Scoring method:** {}", output.table.method()));

    let executive = Section::new("Executive Summary", 2)
        .line(format!(
            "- **Mean annual return:** {}",
            pct(mean(rows.iter().map(|r| r.metrics.annual_return)))
        ))
        .line(format!(
            "- **Mean annual volatility:** {}",
            pct(mean(rows.iter().map(|r| r.metrics.annual_volatility)))
        ))
        .line(format!(
            "- **Mean Sharpe ratio:** {:.3}",
            mean(rows.iter().map(|r| r.metrics.sharpe_ratio))
        ));

    let categories = Section::new("Risk Categories", 2).lines(
        output
            .table
            .category_counts()
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|(category, count)| {
                format!(
                    "- **{category}:** {count} symbols ({:.1}%)",
                    count as f64 / rows.len() as f64 * 100.0
                )
            }),
    );

    let top_return = Section::new("Highest Annual Return", 3).lines(
        top_by(rows, top_n, |r| r.metrics.annual_return)
            .into_iter()
            .map(|r| format!("- **{}:** {} ({})", r.metrics.name, pct(r.metrics.annual_return), r.risk_category)),
    );
    let top_sharpe = Section::new("Highest Sharpe Ratio", 3).lines(
        top_by(rows, top_n, |r| r.metrics.sharpe_ratio)
            .into_iter()
            .map(|r| format!("- **{}:** {:.3} ({})", r.metrics.name, r.metrics.sharpe_ratio, r.risk_category)),
    );

    let sector = match best_sector(&output.sectors) {
        Some(best) => Section::new("Sector Performance", 2)
            .line(format!("**Best sector by Sharpe ratio:** {}", best.sector))
            .line(format!("- Mean return: {}", pct(best.annual_return)))
            .line(format!("- Mean volatility: {}", pct(best.annual_volatility)))
            .line(format!("- Mean Sharpe: {:.3}", best.sharpe_ratio)),
        None => Section::new("Sector Performance", 2).line("No sector has a finite Sharpe ratio."),
    };

    let high: Vec<String> = rows
        .iter()
        .filter(|r| r.risk_category == RiskCategory::High)
        .map(|r| format!("- {}", r.metrics.name))
        .collect();
    let warnings = if high.is_empty() {
        Section::new("Risk Warnings", 2).line("No symbol is in the high risk category.")
    } else {
        Section::new("Risk Warnings", 2)
            .line(format!("**Symbols in the {} category:**", RiskCategory::High))
            .lines(high)
    };

    let scoring = Section::new("Risk Score", 3)
        .line("The risk score is a weighted mean of percentile ranks:")
        .lines(RiskComponent::ALL.iter().map(|c| {
            format!(
                "- {} ({:.0}%)",
                c.description(),
                c.weight(&config.risk_weights) * 100.0
            )
        }));
    let statistics = Section::new("Statistics", 3)
        .line(format!(
            "- **Z-score:** standardised return (|Z| > {} is an extreme day)",
            config.extreme_z_threshold
        ))
        .line("- **Skewness:** asymmetry of returns (positive leans right, negative leans left)")
        .line("- **Kurtosis:** excess tail weight (higher means more extreme values)")
        .line("- **Sharpe ratio:** annual return per unit of annual volatility (higher is better)")
        .line("- **VaR 95%:** 5th percentile of daily log returns");

    let mut sections = vec![
        header,
        executive,
        categories,
        Section::new("Top Performers", 2),
        top_return,
        top_sharpe,
        sector,
        warnings,
        Section::new("Methodology", 2),
        scoring,
        statistics,
    ];

    if !output.summary.excluded.is_empty() {
        sections.push(
            Section::new("Excluded Symbols", 2).lines(
                output
                    .summary
                    .excluded
                    .iter()
                    .map(|e| format!("- {} ({}): {}", e.name, e.symbol, e.reason)),
            ),
        );
    }

    Report {
        title: "Basket Risk Analysis Report".to_string(),
        sections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Instrument, RiskPipeline,
        provider::InMemoryProvider,
        series::PriceSeries,
    };
    use chrono::NaiveDate;

    fn output() -> (PipelineOutput, AnalysisConfig) {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let closes = |pattern: [f64; 4]| pattern.iter().copied().cycle().take(40).collect::<Vec<_>>();
        let provider = InMemoryProvider::new()
            .with_series(PriceSeries::from_closes("A", start, &closes([100.0, 101.0, 99.0, 102.0])))
            .with_series(PriceSeries::from_closes("B", start, &closes([100.0, 150.0, 60.0, 140.0])))
            .with_series(PriceSeries::from_closes("C", start, &closes([100.0, 104.0, 97.0, 103.0])));
        let config = AnalysisConfig {
            universe: vec![
                Instrument::new("A", "Alpha", "Utilities"),
                Instrument::new("B", "Bravo", "Energy"),
                Instrument::new("C", "Charlie", "Energy"),
                Instrument::new("D", "Delta", "Energy"),
            ],
            start_date: start,
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            ..AnalysisConfig::default()
        };
        let output = RiskPipeline::new(config.clone()).unwrap().run(&provider).unwrap();
        (output, config)
    }

    #[test]
    fn test_report_sections() {
        let (output, config) = output();
        let generated = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(9, 30, 0).unwrap();
        let report = build_report(&output, &config, generated);

        let overview = report.section("Overview").unwrap();
        assert_eq!(overview.lines[0], "**Analysis date:** 2024-06-01 09:30");
        assert_eq!(overview.lines[2], "**Symbols analysed:** 3");

        let high: Vec<String> = output
            .table
            .rows()
            .iter()
            .filter(|r| r.risk_category == RiskCategory::High)
            .map(|r| format!("- {}", r.metrics.name))
            .collect();
        let warnings = report.section("Risk Warnings").unwrap();
        if high.is_empty() {
            assert_eq!(warnings.lines.len(), 1);
        } else {
            assert_eq!(warnings.lines[1..], high[..]);
        }
        // Bravo has the widest swings on every spread-sensitive component.
        assert_eq!(output.table.rows().last().unwrap().metrics.name, "Bravo");

        let excluded = report.section("Excluded Symbols").unwrap();
        assert_eq!(excluded.lines, vec!["- Delta (D): no price history".to_string()]);

        let scoring = report.section("Risk Score").unwrap();
        assert_eq!(scoring.lines.len(), 1 + RiskComponent::ALL.len());
        assert!(scoring.lines[1].ends_with("(30%)"));
    }

    #[test]
    fn test_markdown_headings() {
        let (output, config) = output();
        let generated = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let markdown = build_report(&output, &config, generated).to_markdown();
        assert!(markdown.starts_with("# Basket Risk Analysis Report\n"));
        assert!(markdown.contains("\n## Executive Summary\n"));
        assert!(markdown.contains("\n### Highest Sharpe Ratio\n"));
    }

    #[test]
    fn test_markdown_layout() {
        let report = Report {
            title: "Title".to_string(),
            sections: vec![
                Section::new("Top", 2).line("- a").line("- b"),
                Section::new("Nested", 3),
                Section::new("Clamped", 0).line("text"),
            ],
        };
        assert_eq!(
            report.to_markdown(),
            "# Title\n\n## Top\n- a\n- b\n\n### Nested\n\n# Clamped\ntext\n"
        );
    }
}
