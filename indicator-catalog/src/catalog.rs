use crate::{config::IndicatorConfig, error::IndicatorError, indicators};
use fnv::FnvHashMap;
use session_data::{Bar, IndicatorState};
use std::fmt::Debug;

/// An indicator's fixed lifecycle contract: given its declarative config, the full bar
/// history available so far, and its own prior state, produce the next state.
///
/// Implementations that only need O(1) incremental updates should read `prior.carry` and the
/// single newest bar (`bars.last()`) rather than rescanning the whole slice; the full slice
/// is offered for indicators whose warmup must inspect history (eg/ pivots).
pub trait Indicator: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    /// Minimum number of bars required before this indicator is considered `ready`.
    fn warmup_bars(&self, config: &IndicatorConfig) -> usize {
        config.period as usize
    }

    fn compute(&self, config: &IndicatorConfig, bars: &[Bar], prior: &IndicatorState) -> IndicatorState;
}

/// Registry of pluggable [`Indicator`] implementations, keyed by name. Ships with a handful of
/// built-ins (`sma`, `ema`, `rsi`, `macd`, `bollinger`, `stochastic`, `high_low`, `pivots`);
/// callers may [`register`](IndicatorCatalog::register) additional indicators to extend the
/// full 37-indicator catalog described by the session's `SessionConfig`.
#[derive(Debug)]
pub struct IndicatorCatalog {
    indicators: FnvHashMap<&'static str, Box<dyn Indicator>>,
}

impl Default for IndicatorCatalog {
    fn default() -> Self {
        let mut catalog = Self {
            indicators: FnvHashMap::default(),
        };
        catalog.register(Box::new(indicators::SimpleMovingAverage));
        catalog.register(Box::new(indicators::ExponentialMovingAverage));
        catalog.register(Box::new(indicators::RelativeStrengthIndex));
        catalog.register(Box::new(indicators::Macd));
        catalog.register(Box::new(indicators::BollingerBands));
        catalog.register(Box::new(indicators::Stochastic));
        catalog.register(Box::new(indicators::HighLow));
        catalog.register(Box::new(indicators::Pivots));
        catalog
    }
}

impl IndicatorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, indicator: Box<dyn Indicator>) {
        self.indicators.insert(indicator.name(), indicator);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Indicator> {
        self.indicators.get(name).map(AsRef::as_ref)
    }

    /// Run one indicator's lifecycle step, resolving `config.name` in the registry.
    pub fn compute(
        &self,
        config: &IndicatorConfig,
        bars: &[Bar],
        prior: &IndicatorState,
    ) -> Result<IndicatorState, IndicatorError> {
        let indicator = self
            .get(&config.name)
            .ok_or_else(|| IndicatorError::UnknownIndicator(config.name.clone()))?;

        let next = indicator.compute(config, bars, prior);
        tracing::trace!(name = config.name, ready = next.ready, bars_seen = next.bars_seen, "indicator computed");
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_has_builtins_registered() {
        let catalog = IndicatorCatalog::new();
        for name in ["sma", "ema", "rsi", "macd", "bollinger", "stochastic", "high_low", "pivots"] {
            assert!(catalog.get(name).is_some(), "missing builtin indicator {name}");
        }
    }

    #[test]
    fn compute_rejects_unknown_indicator_name() {
        let catalog = IndicatorCatalog::new();
        let config = IndicatorConfig::new("not_a_real_indicator", 20, session_instrument::Interval::new("5m"));
        let state = IndicatorState::new(session_data::IndicatorKey::new("x", 20, "5m"));
        let result = catalog.compute(&config, &[], &state);
        assert!(matches!(result, Err(IndicatorError::UnknownIndicator(_))));
    }
}
