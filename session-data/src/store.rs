use crate::{
    bar::Bar,
    gap::Gap,
    indicator::{IndicatorKey, IndicatorValue},
    interval_data::InsertMode,
    symbol_session::SymbolSessionData,
};
use fnv::FnvHashMap;
use parking_lot::{RwLock, RwLockReadGuard};
use session_instrument::{Interval, Symbol};
use tracing::trace;

/// Shared, mutable aggregate of every symbol's session state. Every worker thread reads this
/// store by reference ("zero-copy") through [`SessionData::read`]; mutation is funneled
/// through the small set of methods below so that the documented single-writer-per-field
/// discipline (clock: Coordinator, derived bars/indicators: Processor, quality/gaps: Quality
/// Manager) holds even though the lock itself is coarse-grained.
///
/// A single `RwLock` guards the whole map. Readers may observe transient inconsistency
/// between sibling fields (eg/ a bar appended a moment before its indicator refreshes) but
/// never a torn/corrupt internal structure. Sharding per symbol is a valid refinement as long
/// as the externally observable contract matches this single-lock semantics.
#[derive(Debug, Default)]
pub struct SessionData {
    symbols: RwLock<FnvHashMap<Symbol, SymbolSessionData>>,
}

impl SessionData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero-copy read access to the whole store for multi-symbol operations (eg/ the merge
    /// loop's chronological scan, a strategy's cross-symbol logic).
    pub fn read(&self) -> RwLockReadGuard<'_, FnvHashMap<Symbol, SymbolSessionData>> {
        self.symbols.read()
    }

    pub fn register_symbol_data(&self, data: SymbolSessionData) {
        trace!(symbol = %data.symbol, "registering symbol session data");
        self.symbols.write().insert(data.symbol.clone(), data);
    }

    pub fn get_symbol_data<R>(&self, symbol: &Symbol, f: impl FnOnce(&SymbolSessionData) -> R) -> Option<R> {
        self.symbols.read().get(symbol).map(f)
    }

    pub fn with_symbol_data_mut<R>(
        &self,
        symbol: &Symbol,
        f: impl FnOnce(&mut SymbolSessionData) -> R,
    ) -> Option<R> {
        self.symbols.write().get_mut(symbol).map(f)
    }

    pub fn contains_symbol(&self, symbol: &Symbol) -> bool {
        self.symbols.read().contains_key(symbol)
    }

    pub fn remove_symbol(&self, symbol: &Symbol) {
        self.symbols.write().remove(symbol);
    }

    pub fn symbols(&self) -> Vec<Symbol> {
        self.symbols.read().keys().cloned().collect()
    }

    /// Append-only bar insert; a duplicate timestamp is a no-op. Returns `false` if the
    /// symbol or interval does not exist yet.
    pub fn append_bar(&self, symbol: &Symbol, interval: &Interval, bar: Bar) -> bool {
        self.symbols
            .write()
            .get_mut(symbol)
            .and_then(|data| data.bars.get_mut(interval))
            .map(|interval_data| interval_data.append(bar))
            .unwrap_or(false)
    }

    /// Batch insert, either `Append` (ordered, expected newer than last) or `GapFill`
    /// (inserted at correct chronological position). Idempotent: duplicate timestamps are
    /// skipped, not double counted.
    pub fn add_bars_batch(
        &self,
        symbol: &Symbol,
        interval: &Interval,
        bars: impl IntoIterator<Item = Bar>,
        mode: InsertMode,
    ) -> usize {
        let mut guard = self.symbols.write();
        let Some(interval_data) = guard
            .get_mut(symbol)
            .and_then(|data| data.bars.get_mut(interval))
        else {
            return 0;
        };

        bars.into_iter()
            .filter(|bar| interval_data.insert(*bar, mode))
            .count()
    }

    pub fn set_quality(&self, symbol: &Symbol, interval: &Interval, quality: f64) {
        if let Some(data) = self.symbols.write().get_mut(symbol) {
            if let Some(interval_data) = data.bars.get_mut(interval) {
                interval_data.quality = quality.clamp(0.0, 100.0);
            }
        }
    }

    pub fn set_gaps(&self, symbol: &Symbol, interval: &Interval, gaps: Vec<Gap>) {
        if let Some(data) = self.symbols.write().get_mut(symbol) {
            if let Some(interval_data) = data.bars.get_mut(interval) {
                interval_data.gaps = gaps;
            }
        }
    }

    pub fn set_indicator_value(
        &self,
        symbol: &Symbol,
        key: &IndicatorKey,
        value: IndicatorValue,
        ready: bool,
    ) {
        if let Some(data) = self.symbols.write().get_mut(symbol) {
            let state = data
                .indicators
                .entry(key.clone())
                .or_insert_with(|| crate::indicator::IndicatorState::new(key.clone()));
            state.value = Some(value);
            state.ready = ready;
            state.bars_seen = state.bars_seen.saturating_add(1);
        }
    }

    /// Replace an indicator's full state, including its `carry` - used by the indicator
    /// catalog's lifecycle step so a recursive indicator's recurrence state (EMA value,
    /// Wilder RSI averages, MACD's fast/slow EMAs) survives between bars.
    pub fn set_indicator_state(&self, symbol: &Symbol, state: crate::indicator::IndicatorState) {
        if let Some(data) = self.symbols.write().get_mut(symbol) {
            data.indicators.insert(state.key.clone(), state);
        }
    }

    /// Clear the entire store. Called at the start of each trading day's teardown phase - no
    /// persistence between sessions.
    pub fn clear(&self) {
        self.symbols.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol_session::AddedBy;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn bar(minute: u32) -> Bar {
        Bar::new(
            Utc.with_ymd_and_hms(2025, 11, 4, 9, minute, 0).unwrap(),
            dec!(100),
            dec!(101),
            dec!(99),
            dec!(100.5),
            1_000,
        )
        .unwrap()
    }

    fn symbol_data(symbol: &str) -> SymbolSessionData {
        SymbolSessionData::new(
            Symbol::new(symbol),
            Interval::new("1m"),
            AddedBy::Config,
            false,
            true,
            Utc::now(),
        )
    }

    #[test]
    fn append_bar_is_idempotent_on_duplicate_timestamp() {
        let store = SessionData::new();
        store.register_symbol_data(symbol_data("AAPL"));
        let symbol = Symbol::new("AAPL");
        let interval = Interval::new("1m");

        assert!(store.append_bar(&symbol, &interval, bar(30)));
        assert!(!store.append_bar(&symbol, &interval, bar(30)));

        let len = store
            .get_symbol_data(&symbol, |data| data.bars[&interval].bars().len())
            .unwrap();
        assert_eq!(len, 1);
    }

    #[test]
    fn clear_removes_every_symbol() {
        let store = SessionData::new();
        store.register_symbol_data(symbol_data("AAPL"));
        store.register_symbol_data(symbol_data("MSFT"));
        assert_eq!(store.symbols().len(), 2);

        store.clear();
        assert!(store.symbols().is_empty());
    }

    #[test]
    fn set_quality_clamps_to_0_100() {
        let store = SessionData::new();
        store.register_symbol_data(symbol_data("AAPL"));
        let symbol = Symbol::new("AAPL");
        let interval = Interval::new("1m");

        store.set_quality(&symbol, &interval, 150.0);
        let quality = store
            .get_symbol_data(&symbol, |data| data.bars[&interval].quality)
            .unwrap();
        assert_eq!(quality, 100.0);
    }
}
