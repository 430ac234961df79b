//! Daily price and return series.

use crate::{Result, RiskError};
use chrono::NaiveDate;
use polars::prelude::*;

/// One daily OHLCV observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyBar {
    /// Trading date
    pub date: NaiveDate,
    /// Opening price
    pub open: f64,
    /// Session high
    pub high: f64,
    /// Session low
    pub low: f64,
    /// Closing price (adjusted when the provider has adjusted prices)
    pub close: f64,
    /// Traded volume
    pub volume: f64,
}

impl DailyBar {
    /// A bar where open, high, low and close are all `close`.
    pub const fn flat(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 0.0,
        }
    }
}

/// Ordered daily price history of one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<DailyBar>,
}

impl PriceSeries {
    /// Create a series from bars. Ordering is checked by [`PriceSeries::validate`].
    pub fn new(symbol: impl Into<String>, bars: Vec<DailyBar>) -> Self {
        Self {
            symbol: symbol.into(),
            bars,
        }
    }

    /// Build a series of flat bars on consecutive calendar days starting at `start`.
    pub fn from_closes(symbol: impl Into<String>, start: NaiveDate, closes: &[f64]) -> Self {
        let bars = closes
            .iter()
            .zip(start.iter_days())
            .map(|(&close, date)| DailyBar::flat(date, close))
            .collect();
        Self::new(symbol, bars)
    }

    /// Ticker of the series.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// All bars, oldest first.
    pub fn bars(&self) -> &[DailyBar] {
        &self.bars
    }

    /// Number of bars.
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Whether the series has no bars.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Closing prices, oldest first.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Dates, oldest first.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.bars.iter().map(|b| b.date).collect()
    }

    /// Keep only bars dated within `[start, end]`.
    pub fn within(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.bars.retain(|b| b.date >= start && b.date <= end);
        self
    }

    /// Check that dates strictly increase and every close is finite and positive.
    pub fn validate(&self) -> Result<()> {
        for pair in self.bars.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(RiskError::UnorderedDates {
                    previous: pair[0].date.to_string(),
                    current: pair[1].date.to_string(),
                });
            }
        }
        if let Some(bad) = self
            .bars
            .iter()
            .find(|b| !b.close.is_finite() || b.close <= 0.0)
        {
            return Err(RiskError::InvalidPrice {
                date: bad.date.to_string(),
                price: bad.close,
            });
        }
        Ok(())
    }

    /// Columnar view with `date` (YYYY-MM-DD) and `close` columns.
    pub fn to_frame(&self) -> Result<DataFrame> {
        let dates: Vec<String> = self.bars.iter().map(|b| b.date.to_string()).collect();
        Ok(df![
            "date" => dates,
            "close" => self.closes(),
        ]?)
    }
}

/// Daily log returns of one symbol; one element shorter than its price series.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnSeries {
    symbol: String,
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl ReturnSeries {
    /// Create a return series. `dates` and `values` must have equal length.
    pub fn new(symbol: impl Into<String>, dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(RiskError::Computation(format!(
                "return series has {} dates but {} values",
                dates.len(),
                values.len()
            )));
        }
        Ok(Self {
            symbol: symbol.into(),
            dates,
            values,
        })
    }

    /// Ticker of the series.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Log returns, oldest first.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Date of each return (the later of the two prices).
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Number of returns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the series has no returns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(date, return)` pairs, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.dates.iter().copied().zip(self.values.iter().copied())
    }

    /// Rebuild the price path by compounding `exp(r)` from `anchor`.
    ///
    /// The result includes the anchor, so it has `len() + 1` elements.
    pub fn reconstruct_prices(&self, anchor: f64) -> Vec<f64> {
        std::iter::once(anchor)
            .chain(self.values.iter().scan(anchor, |price, r| {
                *price *= r.exp();
                Some(*price)
            }))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_from_closes_assigns_consecutive_dates() {
        let series = PriceSeries::from_closes("A", day(1), &[1.0, 2.0, 3.0]);
        assert_eq!(series.len(), 3);
        assert_eq!(series.dates(), vec![day(1), day(2), day(3)]);
        series.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_duplicate_dates() {
        let series = PriceSeries::new(
            "A",
            vec![DailyBar::flat(day(2), 10.0), DailyBar::flat(day(2), 11.0)],
        );
        assert!(matches!(
            series.validate(),
            Err(RiskError::UnorderedDates { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_non_positive_price() {
        let series = PriceSeries::from_closes("A", day(1), &[10.0, 0.0, 11.0]);
        match series.validate() {
            Err(RiskError::InvalidPrice { date, price }) => {
                assert_eq!(date, "2024-01-02");
                assert_eq!(price, 0.0);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_nan_price() {
        let series = PriceSeries::from_closes("A", day(1), &[10.0, f64::NAN]);
        assert!(matches!(
            series.validate(),
            Err(RiskError::InvalidPrice { .. })
        ));
    }

    #[test]
    fn test_within_filters_date_range() {
        let series = PriceSeries::from_closes("A", day(1), &[1.0, 2.0, 3.0, 4.0]).within(day(2), day(3));
        assert_eq!(series.closes(), vec![2.0, 3.0]);
    }

    #[test]
    fn test_to_frame_schema() {
        let frame = PriceSeries::from_closes("A", day(1), &[1.0, 2.0]).to_frame().unwrap();
        assert_eq!(frame.height(), 2);
        let schema = frame.schema();
        assert!(schema.contains("date"));
        assert!(schema.contains("close"));
    }

    #[test]
    fn test_reconstruct_prices() {
        let returns = ReturnSeries::new("A", vec![day(2), day(3)], vec![0.1_f64.ln_1p(), (-0.5_f64).ln_1p()]).unwrap();
        let prices = returns.reconstruct_prices(100.0);
        assert_eq!(prices.len(), 3);
        assert!((prices[1] - 110.0).abs() < 1e-9);
        assert!((prices[2] - 55.0).abs() < 1e-9);
    }

    #[test]
    fn test_return_series_length_mismatch() {
        assert!(ReturnSeries::new("A", vec![day(1)], vec![]).is_err());
    }
}
