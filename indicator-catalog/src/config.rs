use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};
use session_instrument::Interval;

/// Declarative configuration for one indicator instance, as it appears in
/// `SessionConfig.session_data_config.indicators`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IndicatorConfig {
    pub name: String,
    pub period: u32,
    pub interval: Interval,
    #[serde(default)]
    pub params: FnvHashMap<String, f64>,
}

impl IndicatorConfig {
    pub fn new(name: impl Into<String>, period: u32, interval: Interval) -> Self {
        Self {
            name: name.into(),
            period,
            interval,
            params: FnvHashMap::default(),
        }
    }

    pub fn param(&self, key: &str, default: f64) -> f64 {
        self.params.get(key).copied().unwrap_or(default)
    }
}
