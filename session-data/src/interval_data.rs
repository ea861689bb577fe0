use crate::{bar::Bar, gap::Gap};
use serde::{Deserialize, Serialize};
use session_instrument::Interval;

/// How a batch of bars should be merged into an [`IntervalData`]'s bar list.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum InsertMode {
    /// Bars are expected to be newer than the last bar on file; appended in order.
    Append,
    /// Bars may backfill a hole; each is inserted at its correct chronological position.
    GapFill,
}

/// The ordered bar history, synthesis bookkeeping and quality state for one
/// `(symbol, interval)` pair within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalData {
    pub interval: Interval,
    /// Append-only, oldest bar first.
    bars: Vec<Bar>,
    pub derived: bool,
    pub base: Option<Interval>,
    /// Set by a mutator, cleared by the `DataProcessor` once it has consumed the change.
    pub updated: bool,
    pub quality: f64,
    pub gaps: Vec<Gap>,
}

impl IntervalData {
    pub fn new_base(interval: Interval) -> Self {
        Self {
            interval,
            bars: Vec::new(),
            derived: false,
            base: None,
            updated: false,
            quality: 0.0,
            gaps: Vec::new(),
        }
    }

    pub fn new_derived(interval: Interval, base: Interval) -> Self {
        Self {
            interval,
            bars: Vec::new(),
            derived: true,
            base: Some(base),
            updated: false,
            quality: 0.0,
            gaps: Vec::new(),
        }
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn last_bar(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn contains_timestamp(&self, timestamp: chrono::DateTime<chrono::Utc>) -> bool {
        self.bars.binary_search_by_key(&timestamp, |bar| bar.timestamp).is_ok()
    }

    /// Append-only insert; a bar whose timestamp already exists is a no-op (idempotent),
    /// matching `SessionData::append_bar`'s contract.
    pub fn append(&mut self, bar: Bar) -> bool {
        if let Some(last) = self.bars.last() {
            if bar.timestamp <= last.timestamp {
                if bar.timestamp == last.timestamp {
                    return false;
                }
                // Strictly out of chronological order for an append: treat as a gap-fill
                // insert instead of silently corrupting ordering.
                return self.gap_fill(bar);
            }
        }

        self.bars.push(bar);
        self.updated = true;
        true
    }

    /// Insert preserving chronological order; deduplicates on timestamp. Used by gap-repair
    /// and out-of-order appends.
    pub fn gap_fill(&mut self, bar: Bar) -> bool {
        match self.bars.binary_search_by_key(&bar.timestamp, |b| b.timestamp) {
            Ok(_) => false,
            Err(index) => {
                self.bars.insert(index, bar);
                self.updated = true;
                true
            }
        }
    }

    pub fn insert(&mut self, bar: Bar, mode: InsertMode) -> bool {
        match mode {
            InsertMode::Append => self.append(bar),
            InsertMode::GapFill => self.gap_fill(bar),
        }
    }

    pub fn take_updated(&mut self) -> bool {
        std::mem::replace(&mut self.updated, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike, Utc};
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

    #[test]
    fn append_rejects_duplicate_timestamp() {
        let mut data = IntervalData::new_base(Interval::new("1m"));
        assert!(data.append(bar(30)));
        assert!(!data.append(bar(30)));
        assert_eq!(data.bars().len(), 1);
    }

    #[test]
    fn gap_fill_inserts_in_chronological_order() {
        let mut data = IntervalData::new_base(Interval::new("1m"));
        data.append(bar(30));
        data.append(bar(32));
        assert!(data.gap_fill(bar(31)));
        let timestamps: Vec<_> = data.bars().iter().map(|b| b.timestamp.minute()).collect();
        assert_eq!(timestamps, vec![30, 31, 32]);
    }

    #[test]
    fn gap_fill_deduplicates_on_timestamp() {
        let mut data = IntervalData::new_base(Interval::new("1m"));
        data.append(bar(30));
        assert!(!data.gap_fill(bar(30)));
        assert_eq!(data.bars().len(), 1);
    }
}
