//! Renderer-agnostic chart data.
//!
//! Charts are plain data; any plotting front end can draw them from the
//! serialized [`ChartSet`].

use crate::{
    AnalysisConfig,
    correlation::CorrelationMatrix,
    metrics::SymbolAnalysis,
    pipeline::PipelineOutput,
    ranking::{RiskCategory, RiskTable},
    sector::SectorSummary,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// A labelled point of a scatter chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterPoint {
    /// Point label
    pub label: String,
    /// Horizontal coordinate
    pub x: f64,
    /// Vertical coordinate
    pub y: f64,
    /// Colour scale value, when the chart has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<f64>,
}

/// A labelled bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar label
    pub label: String,
    /// Bar length
    pub value: f64,
}

/// Scatter points of one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterSeries {
    /// Legend entry
    pub name: String,
    /// Points
    pub points: Vec<ScatterPoint>,
}

/// Density histogram of one symbol's log returns with a fitted normal curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnHistogram {
    /// Ticker
    pub symbol: String,
    /// Display title
    pub title: String,
    /// Bin edges, one more than `density`
    pub edges: Vec<f64>,
    /// Density of each bin; bar areas sum to one
    pub density: Vec<f64>,
    /// Normal pdf sampled across the return range
    pub normal_overlay: Vec<(f64, f64)>,
}

/// Z-scores of one symbol over time, with the extreme-day bands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZScoreSeries {
    /// Ticker
    pub symbol: String,
    /// Display title
    pub title: String,
    /// `(date, z)` in date order
    pub points: Vec<(NaiveDate, f64)>,
    /// Band drawn at `+threshold` and `-threshold`
    pub threshold: f64,
}

/// One cell of the correlation heatmap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatCell {
    /// Row index
    pub row: usize,
    /// Column index
    pub col: usize,
    /// Correlation; `None` when undefined
    pub value: Option<f64>,
}

/// Lower triangle of the correlation matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heatmap {
    /// Axis labels
    pub labels: Vec<String>,
    /// Cells with `row > col`
    pub cells: Vec<HeatCell>,
}

/// Every chart of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSet {
    /// Risk score against annual return, coloured by annual volatility
    pub risk_return: Vec<ScatterPoint>,
    /// Mean annual volatility per sector, highest first
    pub sector_volatility: Vec<Bar>,
    /// Mean annual return per sector, in sector order
    pub sector_return: Vec<Bar>,
    /// Mean risk score against mean annual return, one point per sector
    pub sector_risk_return: Vec<ScatterPoint>,
    /// Mean Sharpe ratio per sector, in sector order
    pub sector_sharpe: Vec<Bar>,
    /// Skewness against kurtosis, one series per category
    pub skew_kurtosis: Vec<ScatterSeries>,
    /// Highest Sharpe ratios, best first
    pub top_sharpe: Vec<Bar>,
    /// Number of symbols per non-empty category
    pub category_share: Vec<Bar>,
    /// Annual volatility against extreme-day count
    pub volatility_extremes: Vec<ScatterPoint>,
    /// Return histograms of the selected symbols
    pub distributions: Vec<ReturnHistogram>,
    /// Z-score time series of the selected symbols
    pub z_scores: Vec<ZScoreSeries>,
    /// Correlation heatmap
    pub correlation: Heatmap,
}

impl ChartSet {
    /// Build all charts from `output`.
    pub fn build(output: &PipelineOutput, config: &AnalysisConfig) -> Self {
        let table = &output.table;
        let report = &config.report;
        Self {
            risk_return: risk_return(table),
            sector_volatility: sector_volatility(&output.sectors),
            sector_return: sector_bars(&output.sectors, |s| s.annual_return * 100.0),
            sector_risk_return: output
                .sectors
                .iter()
                .map(|s| ScatterPoint {
                    label: s.sector.clone(),
                    x: s.risk_score,
                    y: s.annual_return * 100.0,
                    color: None,
                })
                .collect(),
            sector_sharpe: sector_bars(&output.sectors, |s| s.sharpe_ratio),
            skew_kurtosis: skew_kurtosis(table),
            top_sharpe: top_sharpe(table, report.chart_top_n),
            category_share: table
                .category_counts()
                .into_iter()
                .filter(|(_, count)| *count > 0)
                .map(|(category, count)| Bar {
                    label: category.to_string(),
                    value: count as f64,
                })
                .collect(),
            volatility_extremes: table
                .rows()
                .iter()
                .map(|r| ScatterPoint {
                    label: r.metrics.name.clone(),
                    x: r.metrics.annual_volatility * 100.0,
                    y: r.metrics.extreme_days as f64,
                    color: None,
                })
                .collect(),
            distributions: report
                .distribution_symbols
                .iter()
                .filter_map(|symbol| output.analysis(symbol))
                .map(|a| return_histogram(a, report.histogram_bins, report.normal_overlay_points))
                .collect(),
            z_scores: report
                .distribution_symbols
                .iter()
                .filter_map(|symbol| output.analysis(symbol))
                .map(|a| z_score_series(a, config.extreme_z_threshold))
                .collect(),
            correlation: heatmap(&output.correlations),
        }
    }
}

fn risk_return(table: &RiskTable) -> Vec<ScatterPoint> {
    table
        .rows()
        .iter()
        .map(|r| ScatterPoint {
            label: r.metrics.name.clone(),
            x: r.risk_score,
            y: r.metrics.annual_return * 100.0,
            color: Some(r.metrics.annual_volatility * 100.0),
        })
        .collect()
}

fn sector_volatility(sectors: &[SectorSummary]) -> Vec<Bar> {
    let mut bars: Vec<Bar> = sectors
        .iter()
        .map(|s| Bar {
            label: s.sector.clone(),
            value: s.annual_volatility * 100.0,
        })
        .collect();
    bars.sort_by(|a, b| b.value.total_cmp(&a.value));
    bars
}

fn sector_bars(sectors: &[SectorSummary], value: fn(&SectorSummary) -> f64) -> Vec<Bar> {
    sectors
        .iter()
        .map(|s| Bar {
            label: s.sector.clone(),
            value: value(s),
        })
        .collect()
}

fn skew_kurtosis(table: &RiskTable) -> Vec<ScatterSeries> {
    RiskCategory::ALL
        .iter()
        .map(|&category| ScatterSeries {
            name: category.to_string(),
            points: table
                .rows()
                .iter()
                .filter(|r| r.risk_category == category)
                .map(|r| ScatterPoint {
                    label: r.metrics.name.clone(),
                    x: r.metrics.skewness,
                    y: r.metrics.kurtosis,
                    color: None,
                })
                .collect(),
        })
        .filter(|series| !series.points.is_empty())
        .collect()
}

fn top_sharpe(table: &RiskTable, n: usize) -> Vec<Bar> {
    let mut bars: Vec<Bar> = table
        .rows()
        .iter()
        .map(|r| Bar {
            label: r.metrics.name.clone(),
            value: r.metrics.sharpe_ratio,
        })
        .collect();
    bars.sort_by(|a, b| b.value.total_cmp(&a.value));
    bars.truncate(n);
    bars
}

/// Density histogram of `analysis` returns with a normal pdf overlay.
///
/// A constant series gets a unit-wide range around its value and no overlay.
pub fn return_histogram(analysis: &SymbolAnalysis, bins: usize, overlay_points: usize) -> ReturnHistogram {
    let values = analysis.returns.values();
    let bins = bins.max(1);
    let (mut lo, mut hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if values.is_empty() {
        (lo, hi) = (0.0, 0.0);
    }
    let flat = hi <= lo;
    if flat {
        lo -= 0.5;
        hi += 0.5;
    }
    let width = (hi - lo) / bins as f64;

    let mut counts = vec![0usize; bins];
    for &v in values {
        let idx = (((v - lo) / width).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }
    let n = values.len().max(1) as f64;
    let density = counts.iter().map(|&c| c as f64 / (n * width)).collect();
    let edges = (0..=bins).map(|i| lo + width * i as f64).collect();

    let mu = analysis.metrics.mean_return;
    let sigma = analysis.metrics.std_return;
    let normal_overlay = if flat || sigma <= 0.0 || overlay_points < 2 {
        Vec::new()
    } else {
        let step = (hi - lo) / (overlay_points - 1) as f64;
        (0..overlay_points)
            .map(|i| {
                let x = lo + step * i as f64;
                let z = (x - mu) / sigma;
                (x, (-0.5 * z * z).exp() / (sigma * (2.0 * PI).sqrt()))
            })
            .collect()
    };

    ReturnHistogram {
        symbol: analysis.metrics.symbol.clone(),
        title: format!(
            "{}: skewness {:.3}, kurtosis {:.3}",
            analysis.metrics.name, analysis.metrics.skewness, analysis.metrics.kurtosis
        ),
        edges,
        density,
        normal_overlay,
    }
}

/// Z-score of every return of `analysis`, dated.
pub fn z_score_series(analysis: &SymbolAnalysis, threshold: f64) -> ZScoreSeries {
    ZScoreSeries {
        symbol: analysis.metrics.symbol.clone(),
        title: format!("{}: Z-score (|Z| > {threshold} is extreme)", analysis.metrics.name),
        points: analysis
            .returns
            .dates()
            .iter()
            .copied()
            .zip(analysis.z_scores.iter().copied())
            .collect(),
        threshold,
    }
}

fn heatmap(matrix: &CorrelationMatrix) -> Heatmap {
    let values = matrix.values();
    let n = matrix.symbols().len();
    let cells = (0..n)
        .flat_map(|row| (0..row).map(move |col| (row, col)))
        .map(|(row, col)| {
            let value = values[[row, col]];
            HeatCell {
                row,
                col,
                value: value.is_finite().then_some(value),
            }
        })
        .collect();
    Heatmap {
        labels: matrix.labels().to_vec(),
        cells,
    }
}
