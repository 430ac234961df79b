//! Per-symbol return and risk statistics.
//!
//! The calculator turns one [`PriceSeries`] into log returns and a
//! [`SymbolMetrics`] record:
//!
//! - log return `r_t = ln(P_t / P_{t-1})`, first row dropped
//! - mean and population standard deviation of `r`, annualized with
//!   `mean * 252` and `std * sqrt(252)`
//! - Sharpe ratio `annual_return / annual_volatility` (0 when volatility is 0)
//! - Fisher-Pearson skewness `E[z³]` and excess kurtosis `E[z⁴] - 3`
//! - historical VaR as the 5th and 1st percentiles of `r` (linear interpolation)
//! - maximum drawdown of the price path over the dates that carry a return
//! - counts of days with `|z|` above the extreme threshold
//!
//! Drawdown starts at the first price that has a prior close, so every
//! statistic covers the same dates as the [`ReturnSeries`]. A higher first
//! close never counts as a peak.
//!
//! A standard deviation within round-off of zero is treated as exactly zero,
//! so constant growth has no volatility, a Sharpe ratio of 0 and no extreme
//! days.

use crate::{
    AnalysisConfig, Instrument, Result, RiskError,
    frame::{f64_values, scalar_f64, scalar_i64},
    series::{PriceSeries, ReturnSeries},
};
use chrono::NaiveDate;
use derive_more::Display;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Summary statistics of one symbol. Immutable once computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolMetrics {
    /// Ticker
    pub symbol: String,
    /// Display name
    pub name: String,
    /// Sector label
    pub sector: String,
    /// Number of log returns the statistics were computed from
    pub observations: usize,
    /// Mean daily log return
    pub mean_return: f64,
    /// Population standard deviation of daily log returns
    pub std_return: f64,
    /// `mean_return * trading_days_per_year`
    pub annual_return: f64,
    /// `std_return * sqrt(trading_days_per_year)`
    pub annual_volatility: f64,
    /// `annual_return / annual_volatility`, 0 when volatility is 0
    pub sharpe_ratio: f64,
    /// Fisher-Pearson skewness
    pub skewness: f64,
    /// Excess kurtosis (normal distribution reports 0)
    pub kurtosis: f64,
    /// 5th percentile of daily log returns
    pub var_95: f64,
    /// 1st percentile of daily log returns
    pub var_99: f64,
    /// Most negative drawdown from the running peak, in `[-1, 0]`
    pub max_drawdown: f64,
    /// Days with z-score above the threshold
    pub extreme_positive: usize,
    /// Days with z-score below minus the threshold
    pub extreme_negative: usize,
    /// Days with |z-score| above the threshold
    pub extreme_days: usize,
    /// Largest z-score
    pub max_z_score: f64,
    /// Smallest z-score
    pub min_z_score: f64,
}

/// Direction of an extreme move.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Positive return
    Up,
    /// Zero or negative return
    Down,
}

/// A day whose |z-score| exceeded the extreme threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtremeDay {
    /// Date of the return
    pub date: NaiveDate,
    /// Log return of the day
    pub log_return: f64,
    /// Z-score of the day
    pub z_score: f64,
    /// Up or down move
    pub direction: Direction,
}

/// Everything the calculator derives from one price series.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolAnalysis {
    /// Summary statistics
    pub metrics: SymbolMetrics,
    /// Daily log returns
    pub returns: ReturnSeries,
    /// Z-score of each return against the full-history mean and std
    pub z_scores: Vec<f64>,
}

impl SymbolAnalysis {
    /// Days with |z| above `threshold`, largest z-score first.
    pub fn extreme_days(&self, threshold: f64) -> Vec<ExtremeDay> {
        let mut days: Vec<ExtremeDay> = self
            .returns
            .iter()
            .zip(&self.z_scores)
            .filter(|(_, z)| z.abs() > threshold)
            .map(|((date, log_return), &z_score)| ExtremeDay {
                date,
                log_return,
                z_score,
                direction: if log_return > 0.0 {
                    Direction::Up
                } else {
                    Direction::Down
                },
            })
            .collect();
        days.sort_by(|a, b| b.z_score.total_cmp(&a.z_score));
        days
    }
}

/// Configuration for the [`MetricCalculator`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricCalculatorConfig {
    /// Minimum number of log returns (default: 21)
    pub min_observations: usize,
    /// |z| threshold for extreme days (default: 2.0)
    pub extreme_z_threshold: f64,
    /// Annualization periods (default: 252)
    pub trading_days_per_year: f64,
}

impl Default for MetricCalculatorConfig {
    fn default() -> Self {
        Self {
            min_observations: 21,
            extreme_z_threshold: 2.0,
            trading_days_per_year: 252.0,
        }
    }
}

impl From<&AnalysisConfig> for MetricCalculatorConfig {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            min_observations: config.min_observations,
            extreme_z_threshold: config.extreme_z_threshold,
            trading_days_per_year: config.trading_days_per_year,
        }
    }
}

/// Computes [`SymbolAnalysis`] records from price series. Pure and stateless.
#[derive(Debug, Clone, Default)]
pub struct MetricCalculator {
    config: MetricCalculatorConfig,
}

impl MetricCalculator {
    /// Create a calculator with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a calculator with custom settings.
    pub const fn with_config(config: MetricCalculatorConfig) -> Self {
        Self { config }
    }

    /// Returns the current configuration.
    pub const fn config(&self) -> &MetricCalculatorConfig {
        &self.config
    }

    /// Compute returns and statistics for `instrument`.
    ///
    /// Fails with [`RiskError::InsufficientData`] when the series yields fewer
    /// than `min_observations` returns, and with [`RiskError::InvalidPrice`] or
    /// [`RiskError::UnorderedDates`] for malformed input.
    pub fn calculate(&self, instrument: &Instrument, prices: &PriceSeries) -> Result<SymbolAnalysis> {
        prices.validate()?;

        let required = self.config.min_observations.max(1);
        let available = prices.len().saturating_sub(1);
        if available < required {
            return Err(RiskError::InsufficientData {
                required,
                available,
            });
        }

        let path = Self::return_path(prices)?;
        let log_returns = f64_values(&path, "log_return")?;
        let returns = ReturnSeries::new(
            instrument.ticker.clone(),
            prices.dates()[1..].to_vec(),
            log_returns,
        )?;

        let stats = path
            .clone()
            .lazy()
            .select([
                col("log_return").mean().alias("mean"),
                col("log_return").std(0).alias("std"),
                col("log_return")
                    .quantile(lit(0.05), QuantileMethod::Linear)
                    .alias("var_95"),
                col("log_return")
                    .quantile(lit(0.01), QuantileMethod::Linear)
                    .alias("var_99"),
                col("drawdown").min().alias("max_drawdown"),
            ])
            .collect()?;

        let mean_return = scalar_f64(&stats, "mean")?;
        let std_return = scalar_f64(&stats, "std")?;
        let std_return = if is_flat(mean_return, std_return) { 0.0 } else { std_return };
        let moments = self.standardized_moments(path, mean_return, std_return)?;

        let annual_return = mean_return * self.config.trading_days_per_year;
        let annual_volatility = std_return * self.config.trading_days_per_year.sqrt();
        let sharpe_ratio = if annual_volatility > 0.0 {
            annual_return / annual_volatility
        } else {
            0.0
        };

        let metrics = SymbolMetrics {
            symbol: instrument.ticker.clone(),
            name: instrument.name.clone(),
            sector: instrument.sector.clone(),
            observations: returns.len(),
            mean_return,
            std_return,
            annual_return,
            annual_volatility,
            sharpe_ratio,
            skewness: moments.skewness,
            kurtosis: moments.kurtosis,
            var_95: scalar_f64(&stats, "var_95")?,
            var_99: scalar_f64(&stats, "var_99")?,
            max_drawdown: scalar_f64(&stats, "max_drawdown")?,
            extreme_positive: moments.extreme_positive,
            extreme_negative: moments.extreme_negative,
            extreme_days: moments.extreme_positive + moments.extreme_negative,
            max_z_score: moments.max_z,
            min_z_score: moments.min_z,
        };

        Ok(SymbolAnalysis {
            metrics,
            returns,
            z_scores: moments.z_scores,
        })
    }

    /// Log returns and drawdown for every row after the first.
    fn return_path(prices: &PriceSeries) -> Result<DataFrame> {
        let full = prices
            .to_frame()?
            .lazy()
            .with_column(
                (col("close") / col("close").shift(lit(1)))
                    .log(std::f64::consts::E)
                    .alias("log_return"),
            )
            .collect()?;

        // The first row has no prior close.
        Ok(full
            .slice(1, full.height().saturating_sub(1))
            .lazy()
            .with_column((col("close") / col("close").first()).alias("cumulative"))
            .with_column(col("cumulative").cum_max(false).alias("running_peak"))
            .with_column(
                ((col("cumulative") - col("running_peak")) / col("running_peak")).alias("drawdown"),
            )
            .select([col("date"), col("log_return"), col("drawdown")])
            .collect()?)
    }

    fn standardized_moments(&self, path: DataFrame, mean: f64, std: f64) -> Result<Moments> {
        if is_flat(mean, std) {
            return Ok(Moments::flat(path.height()));
        }

        let threshold = self.config.extreme_z_threshold;
        let scored = path
            .lazy()
            .with_column(((col("log_return") - lit(mean)) / lit(std)).alias("z_score"))
            .collect()?;

        let moments = scored
            .clone()
            .lazy()
            .select([
                col("z_score").pow(3.0).mean().alias("skewness"),
                (col("z_score").pow(4.0).mean() - lit(3.0)).alias("kurtosis"),
                col("z_score")
                    .gt(lit(threshold))
                    .cast(DataType::Int64)
                    .sum()
                    .alias("extreme_positive"),
                col("z_score")
                    .lt(lit(-threshold))
                    .cast(DataType::Int64)
                    .sum()
                    .alias("extreme_negative"),
                col("z_score").max().alias("max_z"),
                col("z_score").min().alias("min_z"),
            ])
            .collect()?;

        Ok(Moments {
            skewness: scalar_f64(&moments, "skewness")?,
            kurtosis: scalar_f64(&moments, "kurtosis")?,
            extreme_positive: scalar_i64(&moments, "extreme_positive")? as usize,
            extreme_negative: scalar_i64(&moments, "extreme_negative")? as usize,
            max_z: scalar_f64(&moments, "max_z")?,
            min_z: scalar_f64(&moments, "min_z")?,
            z_scores: f64_values(&scored, "z_score")?,
        })
    }
}

/// Standard deviation, per unit of `1 + |mean|`, below which it is round-off noise.
const FLAT_STD_TOLERANCE: f64 = 1e-12;

/// Whether `std` is zero up to floating-point noise.
fn is_flat(mean: f64, std: f64) -> bool {
    !std.is_finite() || std <= FLAT_STD_TOLERANCE * (1.0 + mean.abs())
}

struct Moments {
    skewness: f64,
    kurtosis: f64,
    extreme_positive: usize,
    extreme_negative: usize,
    max_z: f64,
    min_z: f64,
    z_scores: Vec<f64>,
}

impl Moments {
    /// Zero-variance returns: every z-score is 0 and the shape statistics are 0.
    fn flat(len: usize) -> Self {
        Self {
            skewness: 0.0,
            kurtosis: 0.0,
            extreme_positive: 0,
            extreme_negative: 0,
            max_z: 0.0,
            min_z: 0.0,
            z_scores: vec![0.0; len],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::{Rng, SeedableRng, rngs::StdRng};
    use rstest::rstest;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn instrument() -> Instrument {
        Instrument::new("TEST.IS", "Test Co", "Testing")
    }

    fn prices_from_returns(returns: &[f64]) -> PriceSeries {
        let mut closes = vec![100.0];
        for r in returns {
            let last = *closes.last().unwrap();
            closes.push(last * r.exp());
        }
        PriceSeries::from_closes("TEST.IS", start(), &closes)
    }

    fn random_walk(seed: u64, len: usize) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut price = 50.0;
        (0..len)
            .map(|_| {
                price *= 1.0 + rng.gen_range(-0.08..0.08);
                price
            })
            .collect()
    }

    #[rstest]
    #[case(22)]
    #[case(23)]
    #[case(250)]
    fn test_returns_one_shorter_than_prices(#[case] n: usize) {
        let prices = PriceSeries::from_closes("TEST.IS", start(), &random_walk(n as u64, n));
        let analysis = MetricCalculator::new().calculate(&instrument(), &prices).unwrap();
        assert_eq!(analysis.returns.len(), n - 1);
        assert_eq!(analysis.z_scores.len(), n - 1);
        assert_eq!(analysis.metrics.observations, n - 1);
        assert_eq!(analysis.returns.dates()[0], NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(21)]
    fn test_short_series_excluded(#[case] n: usize) {
        let prices = PriceSeries::from_closes("TEST.IS", start(), &random_walk(7, n));
        match MetricCalculator::new().calculate(&instrument(), &prices) {
            Err(RiskError::InsufficientData {
                required,
                available,
            }) => {
                assert_eq!(required, 21);
                assert_eq!(available, n.saturating_sub(1));
            }
            other => panic!("expected insufficient data, got {other:?}"),
        }
    }

    #[rstest]
    #[case(0.0)]
    #[case(-5.0)]
    #[case(f64::NAN)]
    fn test_non_positive_price_excluded(#[case] bad: f64) {
        let mut closes = random_walk(3, 40);
        closes[17] = bad;
        let prices = PriceSeries::from_closes("TEST.IS", start(), &closes);
        assert!(matches!(
            MetricCalculator::new().calculate(&instrument(), &prices),
            Err(RiskError::InvalidPrice { .. })
        ));
    }

    #[test]
    fn test_log_return_round_trip() {
        for seed in 0..5 {
            let closes = random_walk(seed, 60);
            let prices = PriceSeries::from_closes("TEST.IS", start(), &closes);
            let analysis = MetricCalculator::new().calculate(&instrument(), &prices).unwrap();
            let rebuilt = analysis.returns.reconstruct_prices(closes[0]);
            assert_eq!(rebuilt.len(), closes.len());
            for (a, b) in rebuilt.iter().zip(&closes) {
                assert_abs_diff_eq!(a, b, epsilon = 1e-9 * b);
            }
        }
    }

    #[test]
    fn test_alternating_returns_statistics() {
        let returns: Vec<f64> = (0..24).map(|i| if i % 2 == 0 { 0.01 } else { -0.01 }).collect();
        let analysis = MetricCalculator::new()
            .calculate(&instrument(), &prices_from_returns(&returns))
            .unwrap();
        let m = &analysis.metrics;

        assert_abs_diff_eq!(m.mean_return, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(m.std_return, 0.01, epsilon = 1e-9);
        assert_abs_diff_eq!(m.annual_volatility, 0.01 * 252.0_f64.sqrt(), epsilon = 1e-8);
        assert_abs_diff_eq!(m.skewness, 0.0, epsilon = 1e-6);
        // |z| = 1 everywhere, so E[z⁴] = 1
        assert_abs_diff_eq!(m.kurtosis, -2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(m.var_95, -0.01, epsilon = 1e-9);
        assert_abs_diff_eq!(m.var_99, -0.01, epsilon = 1e-9);
        assert_eq!(m.extreme_days, 0);
    }

    #[test]
    fn test_constant_prices_have_zero_sharpe() {
        let prices = PriceSeries::from_closes("TEST.IS", start(), &[100.0; 30]);
        let m = MetricCalculator::new()
            .calculate(&instrument(), &prices)
            .unwrap()
            .metrics;
        assert_eq!(m.annual_volatility, 0.0);
        assert_eq!(m.sharpe_ratio, 0.0);
        assert_eq!(m.skewness, 0.0);
        assert_eq!(m.kurtosis, 0.0);
        assert_eq!(m.max_drawdown, 0.0);
        assert_eq!(m.extreme_days, 0);
    }

    #[rstest]
    #[case(0.01)]
    #[case(-0.004)]
    #[case(0.0005)]
    fn test_constant_growth_has_zero_volatility(#[case] growth: f64) {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 * (1.0 + growth).powi(i)).collect();
        let prices = PriceSeries::from_closes("TEST.IS", start(), &closes);
        let analysis = MetricCalculator::new().calculate(&instrument(), &prices).unwrap();
        let m = &analysis.metrics;
        assert_abs_diff_eq!(m.mean_return, (1.0 + growth).ln(), epsilon = 1e-12);
        assert_eq!(m.std_return, 0.0);
        assert_eq!(m.annual_volatility, 0.0);
        assert_eq!(m.sharpe_ratio, 0.0);
        assert_eq!(m.skewness, 0.0);
        assert_eq!(m.kurtosis, 0.0);
        assert_eq!(m.extreme_days, 0);
        assert!(analysis.z_scores.iter().all(|z| *z == 0.0));
        assert!(analysis.extreme_days(2.0).is_empty());
    }

    #[test]
    fn test_first_close_is_not_a_drawdown_peak() {
        let mut closes = vec![200.0];
        closes.extend((0..30).map(|i| 100.0 + i as f64));
        let prices = PriceSeries::from_closes("TEST.IS", start(), &closes);
        let m = MetricCalculator::new()
            .calculate(&instrument(), &prices)
            .unwrap()
            .metrics;
        assert_eq!(m.max_drawdown, 0.0);
    }

    #[test]
    fn test_known_drawdown() {
        let mut closes = vec![100.0, 120.0, 60.0];
        closes.extend(std::iter::repeat_n(90.0, 22));
        let prices = PriceSeries::from_closes("TEST.IS", start(), &closes);
        let m = MetricCalculator::new()
            .calculate(&instrument(), &prices)
            .unwrap()
            .metrics;
        assert_abs_diff_eq!(m.max_drawdown, -0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_drawdown_bounded() {
        for seed in 10..20 {
            let prices = PriceSeries::from_closes("TEST.IS", start(), &random_walk(seed, 120));
            let m = MetricCalculator::new()
                .calculate(&instrument(), &prices)
                .unwrap()
                .metrics;
            assert!(m.max_drawdown <= 0.0);
            assert!(m.max_drawdown >= -1.0);
            assert!(m.var_99 <= m.var_95);
        }
    }

    #[test]
    fn test_single_jump_is_extreme() {
        let mut returns: Vec<f64> = (0..30).map(|i| if i % 2 == 0 { 0.001 } else { -0.001 }).collect();
        returns.push(0.2);
        let analysis = MetricCalculator::new()
            .calculate(&instrument(), &prices_from_returns(&returns))
            .unwrap();
        let m = &analysis.metrics;
        assert_eq!(m.extreme_positive, 1);
        assert_eq!(m.extreme_negative, 0);
        assert_eq!(m.extreme_days, 1);
        assert!(m.max_z_score > 2.0);
        assert!(m.skewness > 0.0);

        let days = analysis.extreme_days(2.0);
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].direction, Direction::Up);
        assert_abs_diff_eq!(days[0].log_return, 0.2, epsilon = 1e-9);
    }

    #[test]
    fn test_metadata_copied_from_instrument() {
        let prices = PriceSeries::from_closes("TEST.IS", start(), &random_walk(1, 30));
        let m = MetricCalculator::new()
            .calculate(&instrument(), &prices)
            .unwrap()
            .metrics;
        assert_eq!(m.symbol, "TEST.IS");
        assert_eq!(m.name, "Test Co");
        assert_eq!(m.sector, "Testing");
    }

    #[test]
    fn test_custom_min_observations() {
        let calculator = MetricCalculator::with_config(MetricCalculatorConfig {
            min_observations: 5,
            ..Default::default()
        });
        let prices = PriceSeries::from_closes("TEST.IS", start(), &random_walk(2, 6));
        assert_eq!(calculator.config().min_observations, 5);
        assert_eq!(
            calculator.calculate(&instrument(), &prices).unwrap().returns.len(),
            5
        );
    }
}
