use chrono::NaiveDate;
use session_instrument::error::IntervalParseError;
use thiserror::Error;

/// Raised while loading or validating a [`crate::config::SessionConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io { path: String, source: std::io::Error },

    #[error("failed to parse config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("session_data_config.symbols must not be empty")]
    NoSymbols,

    #[error("session_data_config.streams must include the base stream \"1m\"")]
    MissingBaseStream,

    #[error("invalid interval: {0}")]
    InvalidInterval(#[from] IntervalParseError),

    #[error("base_interval \"{base}\" is not the smallest declared stream (\"{other}\" is smaller)")]
    BaseIntervalNotSmallest { base: String, other: String },

    #[error("derived interval multiple must be a positive integer, got {0}")]
    InvalidDerivedMultiple(u32),

    #[error("mode is \"backtest\" but backtest_config is missing")]
    MissingBacktestConfig,

    #[error("backtest_config.end_date ({end}) precedes start_date ({start})")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
}

/// Top-level error type: config problems, a failed startup precondition, or an aggregated
/// worker-crate error, matching the teacher's per-crate `#[from]` aggregation convention one
/// level up.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{0} is not a trading day for the configured exchange group")]
    NonTradingDay(NaiveDate),

    #[error(transparent)]
    Coordinator(#[from] session_coordinator::CoordinatorError),

    #[error(transparent)]
    Analysis(#[from] analysis_engine::AnalysisError),

    #[error(transparent)]
    Quality(#[from] data_quality::QualityError),

    #[error(transparent)]
    Indicator(#[from] indicator_catalog::IndicatorError),

    #[error(transparent)]
    Calendar(#[from] session_data::error::CalendarError),

    #[error(transparent)]
    Repository(#[from] session_data::error::RepositoryError),
}
