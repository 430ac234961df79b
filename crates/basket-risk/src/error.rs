//! Error types for risk computations.

use thiserror::Error;

/// Result type for risk operations.
pub type Result<T> = std::result::Result<T, RiskError>;

/// Errors that can occur while computing, ranking or publishing risk statistics.
#[derive(Debug, Error)]
pub enum RiskError {
    /// Missing required column in input data
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// Insufficient observations after return differencing
    #[error("Insufficient data: need {required} observations, got {available}")]
    InsufficientData {
        /// Required number of observations
        required: usize,
        /// Available number of observations
        available: usize,
    },

    /// Missing, zero, negative or non-finite price
    #[error("Invalid price {price} on {date}")]
    InvalidPrice {
        /// Date of the offending bar
        date: String,
        /// The offending price
        price: f64,
    },

    /// Dates are not strictly increasing
    #[error("Dates must be strictly increasing: {current} follows {previous}")]
    UnorderedDates {
        /// Date of the earlier bar
        previous: String,
        /// Date of the later bar
        current: String,
    },

    /// Invalid date range
    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange {
        /// Start date of the range
        start: String,
        /// End date of the range
        end: String,
    },

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No symbol survived retrieval and metric computation
    #[error("No symbols survived to the ranking stage ({excluded} excluded)")]
    NoSurvivors {
        /// Number of excluded symbols
        excluded: usize,
    },

    /// Polars DataFrame error
    #[error("DataFrame error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),
}
