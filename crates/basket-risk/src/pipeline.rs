//! Batch pipeline: retrieve, calculate, rank, aggregate.
//!
//! Every symbol is processed independently and ends up either as a
//! [`SymbolAnalysis`] or as an [`Exclusion`] with a reason. Ranking runs once
//! all symbols have settled. The run fails only when nothing survives.

use crate::{
    AnalysisConfig, Instrument, Result, RiskError,
    correlation::CorrelationMatrix,
    metrics::{MetricCalculator, SymbolAnalysis},
    provider::{PriceProvider, ProviderError, RetryingProvider},
    ranking::{RiskRanker, RiskTable, ScoringMethod},
    sector::{SectorSummary, summarize_sectors},
};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

/// Why a symbol was left out of the risk table.
#[derive(Debug, Display, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExclusionReason {
    /// The provider had no data for the symbol
    #[display("no price history")]
    NotFound,
    /// The provider failed to deliver data
    #[display("retrieval failure: {message}")]
    RetrievalFailure {
        /// Provider error message
        message: String,
    },
    /// Too few returns after differencing
    #[display("insufficient history: {available} of {required} observations")]
    InsufficientHistory {
        /// Minimum number of returns
        required: usize,
        /// Returns available
        available: usize,
    },
    /// Prices were missing, non-positive or out of order
    #[display("data quality: {message}")]
    DataQuality {
        /// Validation message
        message: String,
    },
}

impl ExclusionReason {
    /// Stable reason code for logs and summaries.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::RetrievalFailure { .. } => "retrieval_failure",
            Self::InsufficientHistory { .. } => "insufficient_history",
            Self::DataQuality { .. } => "data_quality",
        }
    }
}

impl From<ProviderError> for ExclusionReason {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound { .. } => Self::NotFound,
            other => Self::RetrievalFailure {
                message: other.to_string(),
            },
        }
    }
}

impl From<RiskError> for ExclusionReason {
    fn from(err: RiskError) -> Self {
        match err {
            RiskError::InsufficientData {
                required,
                available,
            } => Self::InsufficientHistory {
                required,
                available,
            },
            other => Self::DataQuality {
                message: other.to_string(),
            },
        }
    }
}

/// A symbol that did not reach the risk table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exclusion {
    /// Ticker
    pub symbol: String,
    /// Display name
    pub name: String,
    /// Reason
    pub reason: ExclusionReason,
}

/// Outcome of a run: which symbols made it and why the others did not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Number of symbols in the configured universe
    pub requested: usize,
    /// Tickers that were ranked, in universe order
    pub succeeded: Vec<String>,
    /// Tickers that were excluded, in universe order
    pub excluded: Vec<Exclusion>,
    /// How the risk scores were produced
    pub scoring: ScoringMethod,
}

impl RunSummary {
    /// Number of exclusions per reason code.
    pub fn counts_by_reason(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for exclusion in &self.excluded {
            *counts.entry(exclusion.reason.code()).or_insert(0) += 1;
        }
        counts
    }
}

/// Everything a run computes; the input of the reporting stage.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Ranked table, lowest risk first
    pub table: RiskTable,
    /// Per-symbol analyses in table order
    pub analyses: Vec<SymbolAnalysis>,
    /// Sector aggregates
    pub sectors: Vec<SectorSummary>,
    /// Return correlations in table order
    pub correlations: CorrelationMatrix,
    /// Succeeded and excluded symbols
    pub summary: RunSummary,
}

impl PipelineOutput {
    /// Analysis of `symbol`, if it was ranked.
    pub fn analysis(&self, symbol: &str) -> Option<&SymbolAnalysis> {
        self.analyses.iter().find(|a| a.metrics.symbol == symbol)
    }
}

/// Runs the whole analysis for one validated [`AnalysisConfig`].
#[derive(Debug, Clone)]
pub struct RiskPipeline {
    config: AnalysisConfig,
    calculator: MetricCalculator,
    ranker: RiskRanker,
}

impl RiskPipeline {
    /// Validate `config` and build a pipeline around it.
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            calculator: MetricCalculator::with_config((&config).into()),
            ranker: RiskRanker::new(config.risk_weights),
            config,
        })
    }

    /// The configuration of this pipeline.
    pub const fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Retrieve and analyse one instrument.
    pub fn analyze_symbol(
        &self,
        provider: &dyn PriceProvider,
        instrument: &Instrument,
    ) -> std::result::Result<SymbolAnalysis, ExclusionReason> {
        let prices = provider.fetch(
            &instrument.ticker,
            self.config.start_date,
            self.config.end_date,
        )?;
        debug!(symbol = %instrument.ticker, bars = prices.len(), "price history retrieved");
        Ok(self.calculator.calculate(instrument, &prices)?)
    }

    /// Run the pipeline against `provider`.
    ///
    /// Transient provider failures are retried `retrieval_attempts` times.
    /// Fails with [`RiskError::NoSurvivors`] when every symbol is excluded.
    pub fn run(&self, provider: &dyn PriceProvider) -> Result<PipelineOutput> {
        let provider = RetryingProvider::new(provider, self.config.retrieval_attempts);
        info!(
            symbols = self.config.universe.len(),
            start = %self.config.start_date,
            end = %self.config.end_date,
            "starting risk analysis"
        );

        let mut analyses = HashMap::new();
        let mut succeeded = Vec::new();
        let mut excluded = Vec::new();
        for instrument in &self.config.universe {
            match self.analyze_symbol(&provider, instrument) {
                Ok(analysis) => {
                    succeeded.push(instrument.ticker.clone());
                    analyses.insert(instrument.ticker.clone(), analysis);
                }
                Err(reason) => {
                    warn!(
                        symbol = %instrument.ticker,
                        code = reason.code(),
                        %reason,
                        "symbol excluded"
                    );
                    excluded.push(Exclusion {
                        symbol: instrument.ticker.clone(),
                        name: instrument.name.clone(),
                        reason,
                    });
                }
            }
        }

        if succeeded.is_empty() {
            return Err(RiskError::NoSurvivors {
                excluded: excluded.len(),
            });
        }

        let metrics = succeeded
            .iter()
            .filter_map(|symbol| analyses.get(symbol))
            .map(|a| a.metrics.clone())
            .collect();
        let table = self.ranker.rank(metrics)?;

        let analyses: Vec<SymbolAnalysis> = table
            .rows()
            .iter()
            .filter_map(|row| analyses.remove(&row.metrics.symbol))
            .collect();
        let sectors = summarize_sectors(&table)?;
        let correlations = CorrelationMatrix::from_analyses(&analyses);

        let summary = RunSummary {
            requested: self.config.universe.len(),
            succeeded,
            excluded,
            scoring: table.method(),
        };
        info!(
            ranked = summary.succeeded.len(),
            excluded = summary.excluded.len(),
            scoring = %summary.scoring,
            "risk analysis complete"
        );

        Ok(PipelineOutput {
            table,
            analyses,
            sectors,
            correlations,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        RiskCategory,
        provider::InMemoryProvider,
        series::{DailyBar, PriceSeries},
    };
    use chrono::NaiveDate;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn cycle(pattern: &[f64], len: usize) -> Vec<f64> {
        pattern.iter().copied().cycle().take(len).collect()
    }

    fn config(universe: Vec<Instrument>) -> AnalysisConfig {
        AnalysisConfig {
            universe,
            start_date: start(),
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            ..AnalysisConfig::default()
        }
    }

    fn two_symbol_provider() -> InMemoryProvider {
        InMemoryProvider::new()
            .with_series(PriceSeries::from_closes(
                "A",
                start(),
                &cycle(&[100.0, 101.0, 99.0, 102.0], 30),
            ))
            .with_series(PriceSeries::from_closes(
                "B",
                start(),
                &cycle(&[100.0, 150.0, 60.0, 140.0], 30),
            ))
    }

    #[test]
    fn test_high_variance_symbol_ranks_riskier() {
        let pipeline = RiskPipeline::new(config(vec![
            Instrument::new("B", "Bravo", "Energy"),
            Instrument::new("A", "Alpha", "Utilities"),
        ]))
        .unwrap();
        let output = pipeline.run(&two_symbol_provider()).unwrap();

        assert_eq!(output.table.method(), ScoringMethod::Composite);
        let rows = output.table.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].metrics.symbol, "A");
        assert_eq!(rows[1].metrics.symbol, "B");
        assert!(rows[1].risk_score > rows[0].risk_score);
        assert!(rows[1].risk_category >= rows[0].risk_category);

        // Analyses and correlations follow table order.
        assert_eq!(output.analyses[0].metrics.symbol, "A");
        assert_eq!(output.correlations.symbols(), &["A".to_string(), "B".to_string()]);
        assert_eq!(output.sectors.len(), 2);
        assert_eq!(output.summary.succeeded, vec!["B".to_string(), "A".to_string()]);
        assert!(output.summary.excluded.is_empty());
    }

    #[test]
    fn test_single_symbol_uses_fallback() {
        let pipeline = RiskPipeline::new(config(vec![Instrument::new("A", "Alpha", "Utilities")])).unwrap();
        let output = pipeline.run(&two_symbol_provider()).unwrap();
        assert_eq!(output.summary.scoring, ScoringMethod::VolatilityFallback);
        let row = &output.table.rows()[0];
        assert!((0.0..=1.0).contains(&row.risk_score));
        assert_eq!(row.risk_category, RiskCategory::from_score(row.risk_score));
    }

    #[test]
    fn test_failures_are_isolated_and_classified() {
        let mut provider = two_symbol_provider();
        provider.insert(PriceSeries::from_closes("SHORT", start(), &[10.0; 10]));
        provider.insert(PriceSeries::new(
            "BAD",
            (0..30)
                .map(|i| {
                    let date = start() + chrono::Days::new(i);
                    DailyBar::flat(date, if i == 12 { -1.0 } else { 10.0 + i as f64 })
                })
                .collect(),
        ));

        let pipeline = RiskPipeline::new(config(vec![
            Instrument::new("A", "Alpha", "Utilities"),
            Instrument::new("MISSING", "Ghost", "None"),
            Instrument::new("SHORT", "Short", "None"),
            Instrument::new("BAD", "Broken", "None"),
            Instrument::new("B", "Bravo", "Energy"),
        ]))
        .unwrap();
        let output = pipeline.run(&provider).unwrap();

        assert_eq!(output.table.len(), 2);
        assert_eq!(output.summary.requested, 5);
        let reasons: Vec<_> = output
            .summary
            .excluded
            .iter()
            .map(|e| (e.symbol.as_str(), e.reason.code()))
            .collect();
        assert_eq!(
            reasons,
            vec![
                ("MISSING", "not_found"),
                ("SHORT", "insufficient_history"),
                ("BAD", "data_quality"),
            ]
        );
        assert_eq!(
            output.summary.excluded[1].reason,
            ExclusionReason::InsufficientHistory {
                required: 21,
                available: 9
            }
        );
        assert_eq!(output.summary.counts_by_reason().get("not_found"), Some(&1));
    }

    #[test]
    fn test_no_survivors_is_fatal() {
        let pipeline = RiskPipeline::new(config(vec![
            Instrument::new("X", "X", "None"),
            Instrument::new("Y", "Y", "None"),
        ]))
        .unwrap();
        match pipeline.run(&InMemoryProvider::new()) {
            Err(RiskError::NoSurvivors { excluded }) => assert_eq!(excluded, 2),
            other => panic!("expected NoSurvivors, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut bad = config(vec![Instrument::new("A", "Alpha", "Utilities")]);
        bad.risk_weights.volatility = 0.9;
        assert!(matches!(
            RiskPipeline::new(bad),
            Err(RiskError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_exclusion_reason_display() {
        let reason = ExclusionReason::InsufficientHistory {
            required: 21,
            available: 4,
        };
        assert_eq!(reason.to_string(), "insufficient history: 4 of 21 observations");
        assert_eq!(ExclusionReason::NotFound.to_string(), "no price history");
    }
}
