use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use session_instrument::{Interval, Symbol};

/// Notification sent by the Coordinator to the Processor and DataQualityManager whenever a
/// new bar lands in `SessionData` for `(symbol, interval)`.
///
/// Intentionally just a coordinate, never a copy of the bar itself - every thread reads
/// `SessionData` by reference ("zero-copy").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct BarNotification {
    pub symbol: Symbol,
    pub interval: Interval,
    pub timestamp: DateTime<Utc>,
}

impl BarNotification {
    pub fn new(symbol: Symbol, interval: Interval, timestamp: DateTime<Utc>) -> Self {
        Self {
            symbol,
            interval,
            timestamp,
        }
    }
}

/// The kind of change a [`ProcessorNotification`] announces.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum ProcessorNotificationKind {
    /// A new bar landed on `(symbol, interval)`, base or derived.
    Bars,
    /// An indicator's value changed; `key` carries the `name_period_interval` indicator key.
    Indicator { key: String },
}

/// Notification sent downstream from the DataProcessor to the AnalysisEngine / StrategyManager.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub struct ProcessorNotification {
    pub symbol: Symbol,
    pub interval: Interval,
    pub kind: ProcessorNotificationKind,
}

impl ProcessorNotification {
    pub fn bars(symbol: Symbol, interval: Interval) -> Self {
        Self {
            symbol,
            interval,
            kind: ProcessorNotificationKind::Bars,
        }
    }

    pub fn indicator(symbol: Symbol, interval: Interval, key: impl Into<String>) -> Self {
        Self {
            symbol,
            interval,
            kind: ProcessorNotificationKind::Indicator { key: key.into() },
        }
    }
}
