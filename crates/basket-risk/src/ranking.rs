//! Cross-sectional risk ranking.
//!
//! The ranker combines the dense percentile ranks of the five
//! [`RiskComponent`]s into a weighted risk score, bins the score into a
//! [`RiskCategory`] and orders the table from lowest to highest risk.
//!
//! When the cross-section cannot be ranked (fewer than two symbols, or every
//! component constant) the score falls back to min-max scaled annual
//! volatility.

use crate::{
    Result, RiskComponent, RiskError, RiskWeights, SymbolMetrics,
    frame::{f64_values, scalar_f64},
    normalize::{dense_percentile_rank, min_max_scale},
};
use derive_more::Display;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Risk bucket derived from the composite score.
///
/// Bins are right-closed: `[0, 0.33]` is Low, `(0.33, 0.66]` is Medium and
/// `(0.66, 1]` is High.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskCategory {
    /// Score in `[0, 0.33]`
    #[display("Low Risk")]
    Low,
    /// Score in `(0.33, 0.66]`
    #[display("Medium Risk")]
    Medium,
    /// Score in `(0.66, 1]`
    #[display("High Risk")]
    High,
}

impl RiskCategory {
    /// Upper bound (inclusive) of the Low bin.
    pub const LOW_UPPER: f64 = 0.33;
    /// Upper bound (inclusive) of the Medium bin.
    pub const MEDIUM_UPPER: f64 = 0.66;

    /// All categories, lowest risk first.
    pub const ALL: [Self; 3] = [Self::Low, Self::Medium, Self::High];

    /// Bin a risk score.
    pub fn from_score(score: f64) -> Self {
        if score <= Self::LOW_UPPER {
            Self::Low
        } else if score <= Self::MEDIUM_UPPER {
            Self::Medium
        } else {
            Self::High
        }
    }
}

/// How the risk scores of a table were produced.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoringMethod {
    /// Weighted dense percentile ranks of all components
    Composite,
    /// Min-max scaled annual volatility
    VolatilityFallback,
}

/// One ranked symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRow {
    /// Statistics of the symbol
    pub metrics: SymbolMetrics,
    /// Score in `[0, 1]`, higher is riskier
    pub risk_score: f64,
    /// Bin of the score
    pub risk_category: RiskCategory,
}

/// Cross-sectional risk table, ordered by ascending risk score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskTable {
    rows: Vec<RiskRow>,
    method: ScoringMethod,
}

impl RiskTable {
    /// Rows, lowest risk first.
    pub fn rows(&self) -> &[RiskRow] {
        &self.rows
    }

    /// Scoring method used for this table.
    pub const fn method(&self) -> ScoringMethod {
        self.method
    }

    /// Number of ranked symbols.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row of `symbol`, if ranked.
    pub fn get(&self, symbol: &str) -> Option<&RiskRow> {
        self.rows.iter().find(|r| r.metrics.symbol == symbol)
    }

    /// Number of symbols in each category, lowest risk first.
    pub fn category_counts(&self) -> Vec<(RiskCategory, usize)> {
        RiskCategory::ALL
            .iter()
            .map(|&category| {
                let count = self
                    .rows
                    .iter()
                    .filter(|r| r.risk_category == category)
                    .count();
                (category, count)
            })
            .collect()
    }

    /// Tabular view for persistence.
    pub fn to_frame(&self) -> Result<DataFrame> {
        let pick = |f: fn(&RiskRow) -> f64| self.rows.iter().map(f).collect::<Vec<f64>>();
        let text = |f: fn(&RiskRow) -> String| self.rows.iter().map(f).collect::<Vec<String>>();
        Ok(df![
            "symbol" => text(|r| r.metrics.symbol.clone()),
            "name" => text(|r| r.metrics.name.clone()),
            "sector" => text(|r| r.metrics.sector.clone()),
            "observations" => self.rows.iter().map(|r| r.metrics.observations as i64).collect::<Vec<i64>>(),
            "annual_return" => pick(|r| r.metrics.annual_return),
            "annual_volatility" => pick(|r| r.metrics.annual_volatility),
            "sharpe_ratio" => pick(|r| r.metrics.sharpe_ratio),
            "skewness" => pick(|r| r.metrics.skewness),
            "kurtosis" => pick(|r| r.metrics.kurtosis),
            "var_95" => pick(|r| r.metrics.var_95),
            "var_99" => pick(|r| r.metrics.var_99),
            "max_drawdown" => pick(|r| r.metrics.max_drawdown),
            "extreme_days" => self.rows.iter().map(|r| r.metrics.extreme_days as i64).collect::<Vec<i64>>(),
            "risk_score" => pick(|r| r.risk_score),
            "risk_category" => text(|r| r.risk_category.to_string()),
        ]?)
    }
}

/// Builds a [`RiskTable`] from the metrics of all surviving symbols.
#[derive(Debug, Clone, Default)]
pub struct RiskRanker {
    weights: RiskWeights,
}

impl RiskRanker {
    /// Create a ranker with the given weights.
    pub const fn new(weights: RiskWeights) -> Self {
        Self { weights }
    }

    /// Weights in use.
    pub const fn weights(&self) -> &RiskWeights {
        &self.weights
    }

    /// Rank `metrics` into a table ordered by ascending risk score.
    ///
    /// Ties in the score are ordered by symbol.
    pub fn rank(&self, metrics: Vec<SymbolMetrics>) -> Result<RiskTable> {
        if metrics.is_empty() {
            return Err(RiskError::NoSurvivors { excluded: 0 });
        }

        let frame = Self::component_frame(&metrics)?;
        let method = if Self::is_degenerate(&frame)? {
            tracing::warn!(
                symbols = metrics.len(),
                "risk components cannot be ranked, scoring by volatility"
            );
            ScoringMethod::VolatilityFallback
        } else {
            ScoringMethod::Composite
        };

        let score = match method {
            ScoringMethod::Composite => self.composite_score(),
            ScoringMethod::VolatilityFallback => {
                min_max_scale(col(RiskComponent::Volatility.column()), 0.5)
            }
        };

        let ranked = frame
            .lazy()
            .with_column(score.alias("risk_score"))
            .sort(
                ["risk_score", "symbol"],
                SortMultipleOptions::default().with_order_descending_multi([false, false]),
            )
            .select([col("row"), col("risk_score")])
            .collect()?;

        let order = ranked.column("row")?.i64()?;
        let scores = f64_values(&ranked, "risk_score")?;
        let mut slots: Vec<Option<SymbolMetrics>> = metrics.into_iter().map(Some).collect();

        let mut rows = Vec::with_capacity(slots.len());
        for (row, score) in order.into_iter().zip(scores) {
            let metrics = row
                .and_then(|r| slots.get_mut(r as usize))
                .and_then(Option::take)
                .ok_or_else(|| RiskError::Computation("ranking lost a row".to_string()))?;
            let risk_score = score.clamp(0.0, 1.0);
            rows.push(RiskRow {
                metrics,
                risk_score,
                risk_category: RiskCategory::from_score(risk_score),
            });
        }

        tracing::debug!(symbols = rows.len(), %method, "risk table ranked");
        Ok(RiskTable { rows, method })
    }

    fn composite_score(&self) -> Expr {
        RiskComponent::ALL
            .iter()
            .fold(lit(0.0), |score, component| {
                score
                    + dense_percentile_rank(col(component.column()))
                        * lit(component.weight(&self.weights))
            })
    }

    fn component_frame(metrics: &[SymbolMetrics]) -> Result<DataFrame> {
        let mut columns = vec![
            Column::new("row".into(), (0..metrics.len() as i64).collect::<Vec<i64>>()),
            Column::new(
                "symbol".into(),
                metrics.iter().map(|m| m.symbol.clone()).collect::<Vec<String>>(),
            ),
        ];
        for component in RiskComponent::ALL {
            let values: Vec<f64> = metrics.iter().map(|m| component.value(m)).collect();
            columns.push(Column::new(component.column().into(), values));
        }
        Ok(DataFrame::new(columns)?)
    }

    /// Fewer than two symbols, or no component varies across symbols.
    fn is_degenerate(frame: &DataFrame) -> Result<bool> {
        if frame.height() < 2 {
            return Ok(true);
        }
        let spreads = frame
            .clone()
            .lazy()
            .select(
                RiskComponent::ALL
                    .iter()
                    .map(|c| {
                        (col(c.column()).max() - col(c.column()).min()).alias(c.column())
                    })
                    .collect::<Vec<_>>(),
            )
            .collect()?;
        for component in RiskComponent::ALL {
            if scalar_f64(&spreads, component.column())? > 0.0 {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
