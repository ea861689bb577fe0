use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};
use session_instrument::{ExchangeGroup, Symbol};

/// `SessionConfig`'s gap-filler block, named for what it is rather than its source section.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GapFillerConfig {
    pub enable_session_quality: bool,
    pub max_retries: u32,
    pub retry_interval_seconds: u64,
}

impl Default for GapFillerConfig {
    fn default() -> Self {
        Self {
            enable_session_quality: true,
            max_retries: 5,
            retry_interval_seconds: 30,
        }
    }
}

/// Static per-session configuration for the quality worker: the gap-filler policy plus the
/// `symbol -> exchange_group` map it needs to resolve each symbol's trading calendar (the
/// calendar service itself is keyed by exchange group, not by symbol).
#[derive(Debug, Clone, Default)]
pub struct DataQualityConfig {
    pub gap_filler: GapFillerConfig,
    exchange_groups: FnvHashMap<Symbol, ExchangeGroup>,
}

impl DataQualityConfig {
    pub fn new(gap_filler: GapFillerConfig) -> Self {
        Self {
            gap_filler,
            exchange_groups: FnvHashMap::default(),
        }
    }

    pub fn register_symbol(&mut self, symbol: Symbol, exchange: ExchangeGroup) {
        self.exchange_groups.insert(symbol, exchange);
    }

    pub fn exchange_for(&self, symbol: &Symbol) -> Option<&ExchangeGroup> {
        self.exchange_groups.get(symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_gap_filler_config_enables_quality() {
        let config = GapFillerConfig::default();
        assert!(config.enable_session_quality);
        assert_eq!(config.max_retries, 5);
    }

    #[test]
    fn resolves_registered_exchange_groups() {
        let mut config = DataQualityConfig::default();
        let symbol = Symbol::new("AAPL");
        config.register_symbol(symbol.clone(), ExchangeGroup::new("US_EQUITY"));
        assert_eq!(config.exchange_for(&symbol), Some(&ExchangeGroup::new("US_EQUITY")));
        assert_eq!(config.exchange_for(&Symbol::new("MSFT")), None);
    }
}
