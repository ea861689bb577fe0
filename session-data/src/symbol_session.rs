use crate::indicator::{IndicatorKey, IndicatorState};
use crate::interval_data::IntervalData;
use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use session_instrument::{Interval, Symbol};

/// Who caused a symbol to be provisioned into the active session.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum AddedBy {
    Config,
    Scanner,
    Strategy,
    Adhoc,
}

/// Aggregate per-symbol session metrics, updated exclusively by `SessionData`'s bar mutators.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct SessionMetrics {
    pub session_volume: u64,
    pub session_high: Option<Decimal>,
    pub session_low: Option<Decimal>,
    pub last_update: Option<DateTime<Utc>>,
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self {
            session_volume: 0,
            session_high: None,
            session_low: None,
            last_update: None,
        }
    }
}

impl SessionMetrics {
    pub fn record(&mut self, high: Decimal, low: Decimal, volume: u64, timestamp: DateTime<Utc>) {
        self.session_volume += volume;
        self.session_high = Some(self.session_high.map_or(high, |h| h.max(high)));
        self.session_low = Some(self.session_low.map_or(low, |l| l.min(low)));
        self.last_update = Some(self.last_update.map_or(timestamp, |t| t.max(timestamp)));
    }
}

/// Everything tracked for one symbol across one trading session: bars at every interval,
/// indicator state, aggregate metrics, and the provenance metadata used by dynamic symbol
/// management (see the three-phase analyze/validate/provision protocol).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolSessionData {
    pub symbol: Symbol,
    pub base_interval: Interval,
    pub bars: FnvHashMap<Interval, IntervalData>,
    pub indicators: FnvHashMap<IndicatorKey, IndicatorState>,
    pub metrics: SessionMetrics,

    // Provenance metadata (dynamic symbol management, see `analysis-engine`/`session-coordinator`).
    pub meets_session_config_requirements: bool,
    pub added_by: AddedBy,
    pub auto_provisioned: bool,
    pub upgraded_from_adhoc: bool,
    pub added_at: DateTime<Utc>,
}

impl SymbolSessionData {
    pub fn new(
        symbol: Symbol,
        base_interval: Interval,
        added_by: AddedBy,
        auto_provisioned: bool,
        meets_session_config_requirements: bool,
        added_at: DateTime<Utc>,
    ) -> Self {
        let mut bars = FnvHashMap::default();
        bars.insert(base_interval.clone(), IntervalData::new_base(base_interval.clone()));

        Self {
            symbol,
            base_interval,
            bars,
            indicators: FnvHashMap::default(),
            metrics: SessionMetrics::default(),
            meets_session_config_requirements,
            added_by,
            auto_provisioned,
            upgraded_from_adhoc: false,
            added_at,
        }
    }

    pub fn ensure_interval(&mut self, interval: Interval, base: Option<Interval>) -> &mut IntervalData {
        self.bars.entry(interval.clone()).or_insert_with(|| match base {
            Some(base) => IntervalData::new_derived(interval, base),
            None => IntervalData::new_base(interval),
        })
    }
}
