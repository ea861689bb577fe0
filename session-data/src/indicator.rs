use derive_more::Display;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Key identifying one indicator instance: `name_period_interval`, eg/ `sma_20_5m`.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Display)]
#[display("{name}_{period}_{interval}")]
pub struct IndicatorKey {
    pub name: String,
    pub period: u32,
    pub interval: String,
}

impl IndicatorKey {
    pub fn new(name: impl Into<String>, period: u32, interval: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            period,
            interval: interval.into(),
        }
    }
}

/// The value of an indicator: a single scalar, or a named-tuple of scalars for multi-value
/// indicators (Bollinger `{upper, middle, lower}`, MACD `{macd, signal, histogram}`,
/// Stochastic `{k, d}`, high/low `{high, low}`, pivots `{pp, r1..r3, s1..s3}`).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum IndicatorValue {
    Scalar(Decimal),
    Multi(IndexMap<String, Decimal>),
}

impl IndicatorValue {
    pub fn as_scalar(&self) -> Option<Decimal> {
        match self {
            Self::Scalar(value) => Some(*value),
            Self::Multi(_) => None,
        }
    }

    pub fn component(&self, name: &str) -> Option<Decimal> {
        match self {
            Self::Scalar(_) => None,
            Self::Multi(map) => map.get(name).copied(),
        }
    }
}

/// Minimal recurrence state carried by recursive indicators so an incremental update is O(1).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub enum IndicatorCarry {
    /// Exponential moving average: previous EMA value.
    Ema { value: Decimal },
    /// Wilder-smoothed RSI: previous average gain/loss.
    WilderRsi {
        avg_gain: Decimal,
        avg_loss: Decimal,
    },
    /// MACD: previous fast/slow EMA values.
    Macd {
        fast_ema: Decimal,
        slow_ema: Decimal,
    },
}

/// Current state of one indicator instance on one `(symbol, interval)`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IndicatorState {
    pub key: IndicatorKey,
    pub value: Option<IndicatorValue>,
    pub ready: bool,
    pub carry: Option<IndicatorCarry>,
    pub bars_seen: u32,
}

impl IndicatorState {
    pub fn new(key: IndicatorKey) -> Self {
        Self {
            key,
            value: None,
            ready: false,
            carry: None,
            bars_seen: 0,
        }
    }
}
