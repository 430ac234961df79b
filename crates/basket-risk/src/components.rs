//! Inputs of the composite risk score.
//!
//! Each [`RiskComponent`] names one column of the cross-sectional table, how
//! it is read from [`SymbolMetrics`] and which weight it carries.

use crate::{RiskWeights, SymbolMetrics};
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// A metric that feeds the composite risk score.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskComponent {
    /// Annualized volatility
    Volatility,
    /// Excess kurtosis
    Kurtosis,
    /// Count of |z| > threshold days
    ExtremeDays,
    /// Absolute maximum drawdown
    MaxDrawdown,
    /// Absolute 95% historical VaR
    ValueAtRisk95,
}

impl RiskComponent {
    /// All components, in score order.
    pub const ALL: [Self; 5] = [
        Self::Volatility,
        Self::Kurtosis,
        Self::ExtremeDays,
        Self::MaxDrawdown,
        Self::ValueAtRisk95,
    ];

    /// Column name in the ranking frame.
    pub const fn column(self) -> &'static str {
        match self {
            Self::Volatility => "annual_volatility",
            Self::Kurtosis => "kurtosis",
            Self::ExtremeDays => "extreme_days",
            Self::MaxDrawdown => "abs_max_drawdown",
            Self::ValueAtRisk95 => "abs_var_95",
        }
    }

    /// Human-readable description.
    pub const fn description(self) -> &'static str {
        match self {
            Self::Volatility => "Annualized volatility of daily log returns",
            Self::Kurtosis => "Excess kurtosis - tail heaviness of the return distribution",
            Self::ExtremeDays => "Number of days with |z-score| above the extreme threshold",
            Self::MaxDrawdown => "Maximum peak-to-trough decline (absolute value)",
            Self::ValueAtRisk95 => "95% historical Value at Risk (absolute value)",
        }
    }

    /// Weight of this component in the composite score.
    pub const fn weight(self, weights: &RiskWeights) -> f64 {
        match self {
            Self::Volatility => weights.volatility,
            Self::Kurtosis => weights.kurtosis,
            Self::ExtremeDays => weights.extreme_days,
            Self::MaxDrawdown => weights.max_drawdown,
            Self::ValueAtRisk95 => weights.var_95,
        }
    }

    /// Value ranked for `metrics`, larger meaning riskier. Non-finite values read as 0.
    pub fn value(self, metrics: &SymbolMetrics) -> f64 {
        let raw = match self {
            Self::Volatility => metrics.annual_volatility,
            Self::Kurtosis => metrics.kurtosis,
            Self::ExtremeDays => metrics.extreme_days as f64,
            Self::MaxDrawdown => metrics.max_drawdown.abs(),
            Self::ValueAtRisk95 => metrics.var_95.abs(),
        };
        if raw.is_finite() { raw } else { 0.0 }
    }
}
