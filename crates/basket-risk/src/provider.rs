//! Price history providers.
//!
//! The pipeline only sees the [`PriceProvider`] trait. Providers report
//! failures as [`ProviderError`]; the pipeline excludes the symbol and moves
//! on, and retrying is left to [`RetryingProvider`] at this boundary.

use crate::{
    Result, RiskError,
    series::{DailyBar, PriceSeries},
};
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Failure to retrieve price history for one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The provider has no data for the symbol
    #[error("No price history for {symbol}")]
    NotFound {
        /// Requested ticker
        symbol: String,
    },

    /// Temporary failure; the same request may succeed later
    #[error("Transient failure fetching {symbol}: {message}")]
    Transient {
        /// Requested ticker
        symbol: String,
        /// Underlying error
        message: String,
    },

    /// Data exists but cannot be interpreted
    #[error("Malformed price history for {symbol}: {message}")]
    Malformed {
        /// Requested ticker
        symbol: String,
        /// Underlying error
        message: String,
    },
}

impl ProviderError {
    /// Whether retrying the same request can help.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Source of daily price history.
pub trait PriceProvider: Send + Sync + std::fmt::Debug {
    /// Fetch bars of `symbol` dated within `[start, end]`, oldest first.
    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> std::result::Result<PriceSeries, ProviderError>;
}

impl<P: PriceProvider + ?Sized> PriceProvider for &P {
    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> std::result::Result<PriceSeries, ProviderError> {
        (**self).fetch(symbol, start, end)
    }
}

/// Reads one CSV file per symbol from a directory.
///
/// The file for `THYAO.IS` is `<dir>/THYAO_IS.csv`. Expected columns are
/// `date` (YYYY-MM-DD) and `close`; `adj_close` is preferred over `close`
/// when present, and `open`, `high`, `low`, `volume` are optional.
/// A file that exists but cannot be parsed is [`ProviderError::Malformed`].
#[derive(Debug, Clone)]
pub struct CsvPriceProvider {
    data_dir: PathBuf,
}

impl CsvPriceProvider {
    /// Create a provider reading from `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// File path holding the history of `symbol`.
    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.data_dir
            .join(format!("{}.csv", symbol.replace('.', "_")))
    }

    fn read(path: &Path) -> PolarsResult<DataFrame> {
        CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()
    }
}

impl PriceProvider for CsvPriceProvider {
    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> std::result::Result<PriceSeries, ProviderError> {
        let path = self.path_for(symbol);
        if !path.is_file() {
            return Err(ProviderError::NotFound {
                symbol: symbol.to_string(),
            });
        }

        // Only I/O failures can clear up on a later attempt; anything else is
        // a file the reader cannot parse.
        let frame = Self::read(&path).map_err(|e| match e {
            io @ PolarsError::IO { .. } => ProviderError::Transient {
                symbol: symbol.to_string(),
                message: io.to_string(),
            },
            other => ProviderError::Malformed {
                symbol: symbol.to_string(),
                message: other.to_string(),
            },
        })?;

        let series = series_from_frame(symbol, &frame).map_err(|e| ProviderError::Malformed {
            symbol: symbol.to_string(),
            message: e.to_string(),
        })?;

        let series = series.within(start, end);
        if series.is_empty() {
            return Err(ProviderError::NotFound {
                symbol: symbol.to_string(),
            });
        }
        Ok(series)
    }
}

/// Build a [`PriceSeries`] from a frame with `date` and `close`/`adj_close` columns.
///
/// Null prices become NaN and are rejected later by validation.
pub fn series_from_frame(symbol: &str, frame: &DataFrame) -> Result<PriceSeries> {
    let schema = frame.schema();
    let price_column = if schema.contains("adj_close") {
        "adj_close"
    } else if schema.contains("close") {
        "close"
    } else {
        return Err(RiskError::MissingColumn("close".to_string()));
    };
    if !schema.contains("date") {
        return Err(RiskError::MissingColumn("date".to_string()));
    }

    let dates = frame.column("date")?.cast(&DataType::String)?;
    let dates = dates.str()?;
    let close = float_column(frame, price_column)?;
    let open = optional_float_column(frame, "open")?;
    let high = optional_float_column(frame, "high")?;
    let low = optional_float_column(frame, "low")?;
    let volume = optional_float_column(frame, "volume")?;

    let mut bars = Vec::with_capacity(frame.height());
    for (i, raw_date) in dates.into_iter().enumerate() {
        let raw_date = raw_date.ok_or_else(|| RiskError::Computation(format!("row {i} has no date")))?;
        let date = NaiveDate::parse_from_str(raw_date.trim(), "%Y-%m-%d")
            .map_err(|e| RiskError::Computation(format!("row {i}: bad date {raw_date:?}: {e}")))?;
        let close = close[i].unwrap_or(f64::NAN);
        let pick = |column: &Option<Vec<Option<f64>>>| {
            column.as_ref().and_then(|values| values[i]).unwrap_or(close)
        };
        bars.push(DailyBar {
            date,
            open: pick(&open),
            high: pick(&high),
            low: pick(&low),
            close,
            volume: volume.as_ref().and_then(|values| values[i]).unwrap_or(0.0),
        });
    }
    Ok(PriceSeries::new(symbol, bars))
}

fn float_column(frame: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let values = frame.column(name)?.cast(&DataType::Float64)?;
    Ok(values.f64()?.into_iter().collect())
}

fn optional_float_column(frame: &DataFrame, name: &str) -> Result<Option<Vec<Option<f64>>>> {
    if frame.schema().contains(name) {
        float_column(frame, name).map(Some)
    } else {
        Ok(None)
    }
}

/// Serves price series held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    series: HashMap<String, PriceSeries>,
}

impl InMemoryProvider {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the series of its symbol.
    pub fn insert(&mut self, series: PriceSeries) {
        self.series.insert(series.symbol().to_string(), series);
    }

    /// Builder-style [`InMemoryProvider::insert`].
    pub fn with_series(mut self, series: PriceSeries) -> Self {
        self.insert(series);
        self
    }
}

impl PriceProvider for InMemoryProvider {
    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> std::result::Result<PriceSeries, ProviderError> {
        self.series
            .get(symbol)
            .map(|series| series.clone().within(start, end))
            .filter(|series| !series.is_empty())
            .ok_or_else(|| ProviderError::NotFound {
                symbol: symbol.to_string(),
            })
    }
}

/// Retries transient failures of an inner provider a bounded number of times.
#[derive(Debug, Clone)]
pub struct RetryingProvider<P> {
    inner: P,
    attempts: usize,
    backoff: Duration,
}

impl<P: PriceProvider> RetryingProvider<P> {
    /// Wrap `inner`, making at most `attempts` calls per fetch.
    pub fn new(inner: P, attempts: usize) -> Self {
        Self {
            inner,
            attempts: attempts.max(1),
            backoff: Duration::ZERO,
        }
    }

    /// Sleep `backoff` between attempts.
    pub const fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// The wrapped provider.
    pub const fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: PriceProvider> PriceProvider for RetryingProvider<P> {
    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> std::result::Result<PriceSeries, ProviderError> {
        let mut attempt = 1;
        loop {
            match self.inner.fetch(symbol, start, end) {
                Err(err) if err.is_transient() && attempt < self.attempts => {
                    tracing::warn!(symbol, attempt, error = %err, "retrying price fetch");
                    attempt += 1;
                    if !self.backoff.is_zero() {
                        std::thread::sleep(self.backoff);
                    }
                }
                result => return result,
            }
        }
    }
}
