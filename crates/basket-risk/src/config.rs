//! Analysis configuration.
//!
//! [`AnalysisConfig`] replaces module-level globals: the basket, the date
//! range and every tuning constant are passed explicitly into the pipeline
//! and never mutated once validated.

use crate::{Result, RiskError};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// A tradable instrument in the analysed basket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    /// Provider ticker, e.g. `THYAO.IS`
    pub ticker: String,
    /// Display name
    pub name: String,
    /// Sector label used for aggregation
    pub sector: String,
}

impl Instrument {
    /// Create a new instrument.
    pub fn new(ticker: impl Into<String>, name: impl Into<String>, sector: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            name: name.into(),
            sector: sector.into(),
        }
    }
}

/// Weights of the composite risk score. Must be non-negative and sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskWeights {
    /// Weight of annualized volatility (default: 0.3)
    pub volatility: f64,
    /// Weight of excess kurtosis (default: 0.2)
    pub kurtosis: f64,
    /// Weight of the extreme-day count (default: 0.2)
    pub extreme_days: f64,
    /// Weight of |max drawdown| (default: 0.2)
    pub max_drawdown: f64,
    /// Weight of |VaR 95| (default: 0.1)
    pub var_95: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            volatility: 0.3,
            kurtosis: 0.2,
            extreme_days: 0.2,
            max_drawdown: 0.2,
            var_95: 0.1,
        }
    }
}

impl RiskWeights {
    const SUM_TOLERANCE: f64 = 1e-9;

    /// Sum of all five weights.
    pub fn total(&self) -> f64 {
        self.volatility + self.kurtosis + self.extreme_days + self.max_drawdown + self.var_95
    }

    /// Check that every weight is finite and non-negative and that they sum to 1.0.
    pub fn validate(&self) -> Result<()> {
        let weights = [
            self.volatility,
            self.kurtosis,
            self.extreme_days,
            self.max_drawdown,
            self.var_95,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(RiskError::InvalidConfig(format!(
                "risk weights must be finite and non-negative, got {weights:?}"
            )));
        }
        let total = self.total();
        if (total - 1.0).abs() > Self::SUM_TOLERANCE {
            return Err(RiskError::InvalidConfig(format!(
                "risk weights must sum to 1.0, got {total}"
            )));
        }
        Ok(())
    }
}

/// Settings for the narrative report and charts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Number of symbols listed in the top-N report sections
    pub top_n: usize,
    /// Number of bars in the top Sharpe chart
    pub chart_top_n: usize,
    /// Histogram bin count for per-symbol return distributions
    pub histogram_bins: usize,
    /// Number of points sampled on the normal density overlay
    pub normal_overlay_points: usize,
    /// Tickers that get an individual return-distribution chart
    pub distribution_symbols: Vec<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_n: 5,
            chart_top_n: 10,
            histogram_bins: 50,
            normal_overlay_points: 100,
            distribution_symbols: ["AKBNK.IS", "GARAN.IS", "THYAO.IS", "EREGL.IS", "BIMAS.IS", "SISE.IS"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Full configuration of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Instruments to analyse
    pub universe: Vec<Instrument>,
    /// First date requested from the provider
    pub start_date: NaiveDate,
    /// Last date requested from the provider
    pub end_date: NaiveDate,
    /// Minimum number of log returns a symbol needs to be analysed
    pub min_observations: usize,
    /// |Z-score| above which a day counts as extreme
    pub extreme_z_threshold: f64,
    /// Composite risk score weights
    pub risk_weights: RiskWeights,
    /// Periods per year used for annualization
    pub trading_days_per_year: f64,
    /// Attempts per symbol when the provider reports a transient failure
    pub retrieval_attempts: usize,
    /// Report and chart settings
    pub report: ReportConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            universe: bist30(),
            start_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default(),
            end_date: Local::now().date_naive(),
            min_observations: 21,
            extreme_z_threshold: 2.0,
            risk_weights: RiskWeights::default(),
            trading_days_per_year: 252.0,
            retrieval_attempts: 3,
            report: ReportConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Load a configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Serialize the configuration as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Look up an instrument by ticker.
    pub fn instrument(&self, ticker: &str) -> Option<&Instrument> {
        self.universe.iter().find(|i| i.ticker == ticker)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.start_date > self.end_date {
            return Err(RiskError::InvalidDateRange {
                start: self.start_date.to_string(),
                end: self.end_date.to_string(),
            });
        }
        if self.universe.is_empty() {
            return Err(RiskError::InvalidConfig("universe is empty".to_string()));
        }
        let mut seen = HashSet::new();
        for instrument in &self.universe {
            if instrument.ticker.trim().is_empty() {
                return Err(RiskError::InvalidConfig("empty ticker in universe".to_string()));
            }
            if !seen.insert(instrument.ticker.as_str()) {
                return Err(RiskError::InvalidConfig(format!(
                    "duplicate ticker {}",
                    instrument.ticker
                )));
            }
        }
        if self.min_observations < 2 {
            return Err(RiskError::InvalidConfig(format!(
                "min_observations must be at least 2, got {}",
                self.min_observations
            )));
        }
        if !self.extreme_z_threshold.is_finite() || self.extreme_z_threshold <= 0.0 {
            return Err(RiskError::InvalidConfig(format!(
                "extreme_z_threshold must be positive, got {}",
                self.extreme_z_threshold
            )));
        }
        if !self.trading_days_per_year.is_finite() || self.trading_days_per_year <= 0.0 {
            return Err(RiskError::InvalidConfig(format!(
                "trading_days_per_year must be positive, got {}",
                self.trading_days_per_year
            )));
        }
        if self.retrieval_attempts == 0 {
            return Err(RiskError::InvalidConfig(
                "retrieval_attempts must be at least 1".to_string(),
            ));
        }
        if self.report.histogram_bins == 0 || self.report.normal_overlay_points < 2 {
            return Err(RiskError::InvalidConfig(
                "histogram needs at least one bin and two overlay points".to_string(),
            ));
        }
        self.risk_weights.validate()
    }
}

/// The BIST30 basket analysed by default.
pub fn bist30() -> Vec<Instrument> {
    [
        ("AKBNK.IS", "Akbank", "Banking"),
        ("ARCLK.IS", "Arçelik", "Consumer Durables"),
        ("ASELS.IS", "Aselsan", "Defense"),
        ("BIMAS.IS", "BİM", "Retail"),
        ("EKGYO.IS", "Emlak Konut GYO", "Real Estate"),
        ("EREGL.IS", "Ereğli Demir Çelik", "Basic Metals"),
        ("FROTO.IS", "Ford Otosan", "Automotive"),
        ("GARAN.IS", "Garanti BBVA", "Banking"),
        ("HALKB.IS", "Halkbank", "Banking"),
        ("ISCTR.IS", "İş Bankası (C)", "Banking"),
        ("KCHOL.IS", "Koç Holding", "Holding"),
        ("KOZAL.IS", "Koza Altın", "Mining"),
        ("KOZAA.IS", "Koza Anadolu", "Mining"),
        ("PETKM.IS", "Petkim", "Petrochemicals"),
        ("PGSUS.IS", "Pegasus", "Aviation"),
        ("SAHOL.IS", "Sabancı Holding", "Holding"),
        ("SISE.IS", "Şişe Cam", "Glass"),
        ("TCELL.IS", "Turkcell", "Telecommunications"),
        ("THYAO.IS", "Türk Hava Yolları", "Aviation"),
        ("TOASO.IS", "Tofaş", "Automotive"),
        ("TUPRS.IS", "Tüpraş", "Petroleum"),
        ("VAKBN.IS", "VakıfBank", "Banking"),
        ("YKBNK.IS", "Yapı Kredi", "Banking"),
        ("SMRTG.IS", "Smart Güneş", "Energy"),
        ("TAVHL.IS", "TAV Havalimanları", "Transportation"),
    ]
    .into_iter()
    .map(|(ticker, name, sector)| Instrument::new(ticker, name, sector))
    .collect()
}
