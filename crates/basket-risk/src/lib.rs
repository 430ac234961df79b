#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod components;
pub mod config;
pub mod correlation;
pub mod error;
pub mod metrics;
pub mod normalize;
pub mod pipeline;
pub mod provider;
pub mod ranking;
pub mod report;
pub mod sector;
pub mod series;

mod frame;

// Re-export core types
pub use components::RiskComponent;
pub use config::{AnalysisConfig, Instrument, ReportConfig, RiskWeights, bist30};
pub use correlation::CorrelationMatrix;
pub use error::{Result, RiskError};
pub use metrics::{
    Direction, ExtremeDay, MetricCalculator, MetricCalculatorConfig, SymbolAnalysis, SymbolMetrics,
};
pub use pipeline::{Exclusion, ExclusionReason, PipelineOutput, RiskPipeline, RunSummary};
pub use provider::{
    CsvPriceProvider, InMemoryProvider, PriceProvider, ProviderError, RetryingProvider,
};
pub use ranking::{RiskCategory, RiskRanker, RiskRow, RiskTable, ScoringMethod};
pub use report::{FileSink, MemorySink, ReportSink, publish};
pub use sector::SectorSummary;
pub use series::{DailyBar, PriceSeries, ReturnSeries};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
