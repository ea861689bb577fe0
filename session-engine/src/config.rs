use crate::error::ConfigError;
use chrono::NaiveDate;
use data_quality::GapFillerConfig;
use indicator_catalog::IndicatorConfig;
use serde::{Deserialize, Serialize};
use session_instrument::Interval;
use std::path::Path;

/// `session_name`'s run mode: `"live"` streams from a brokerage-adjacent feed, `"backtest"`
/// replays a [`session_data::BarRepository`] at `speed_multiplier`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    Live,
    Backtest,
}

/// `backtest_config` - only required when [`SessionMode::Backtest`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub speed_multiplier: f64,
    pub prefetch_days: u32,
}

/// `session_data_config.historical` - how much trailing history a full add warms up with.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HistoricalConfig {
    pub trailing_days: u32,
    #[serde(default)]
    pub intervals: Vec<String>,
}

/// `session_data_config.streaming` - the dynamic-add coordination knobs from §4.5.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StreamingConfig {
    #[serde(default = "default_catchup_threshold")]
    pub catchup_threshold_seconds: u64,
    #[serde(default = "default_adhoc_warmup_days")]
    pub adhoc_warmup_days: u32,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            catchup_threshold_seconds: default_catchup_threshold(),
            adhoc_warmup_days: default_adhoc_warmup_days(),
        }
    }
}

fn default_catchup_threshold() -> u64 {
    30
}

fn default_adhoc_warmup_days() -> u32 {
    1
}

/// `session_data_config` - everything that shapes symbols, intervals, and per-session workers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionDataConfig {
    pub symbols: Vec<String>,
    pub streams: Vec<String>,
    pub base_interval: String,
    #[serde(default)]
    pub derived_intervals: Vec<u32>,
    pub historical: HistoricalConfig,
    #[serde(default)]
    pub gap_filler: GapFillerConfig,
    #[serde(default)]
    pub streaming: StreamingConfig,
    #[serde(default)]
    pub indicators: Vec<IndicatorConfig>,
    #[serde(default)]
    pub strategies: Vec<analysis_engine::StrategyConfig>,
    #[serde(default)]
    pub scanners: Vec<analysis_engine::ScannerConfig>,
}

/// The process-owned, validated-at-startup declarative configuration. Loaded from disk by
/// [`SessionConfig::load`]; every nested struct rejects unknown keys.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    pub session_name: String,
    pub mode: SessionMode,
    pub exchange_group: String,
    pub asset_class: String,
    pub session_data_config: SessionDataConfig,
    #[serde(default)]
    pub backtest_config: Option<BacktestConfig>,
}

impl SessionConfig {
    /// Read and parse the config file. Does not validate - call [`Self::validate`] before use.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Strict validation: unknown keys are already rejected by `serde`; this checks the
    /// cross-field invariants serde can't express - base is the smallest declared stream,
    /// derived multiples are positive integers, and backtest mode carries a date range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let data = &self.session_data_config;

        if data.symbols.is_empty() {
            return Err(ConfigError::NoSymbols);
        }
        if !data.streams.iter().any(|stream| stream == "1m") {
            return Err(ConfigError::MissingBaseStream);
        }

        let base_info = Interval::new(data.base_interval.clone()).parse()?;
        for stream in &data.streams {
            let info = Interval::new(stream.clone()).parse()?;
            if info.seconds() < base_info.seconds() {
                return Err(ConfigError::BaseIntervalNotSmallest {
                    base: data.base_interval.clone(),
                    other: stream.clone(),
                });
            }
        }

        for &multiple in &data.derived_intervals {
            if multiple == 0 {
                return Err(ConfigError::InvalidDerivedMultiple(multiple));
            }
        }

        match (self.mode, &self.backtest_config) {
            (SessionMode::Backtest, None) => return Err(ConfigError::MissingBacktestConfig),
            (SessionMode::Backtest, Some(backtest)) if backtest.end_date < backtest.start_date => {
                return Err(ConfigError::InvalidDateRange { start: backtest.start_date, end: backtest.end_date });
            }
            _ => {}
        }

        Ok(())
    }

    pub fn base_interval(&self) -> Interval {
        Interval::new(self.session_data_config.base_interval.clone())
    }

    pub fn derived_intervals(&self) -> Vec<Interval> {
        let base = self.base_interval();
        self.session_data_config.derived_intervals.iter().map(|multiple| base.derive_minutes(*multiple)).collect()
    }
}
