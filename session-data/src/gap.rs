use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A contiguous `[start, end)` hole in an otherwise expected run of bars, detected within
/// regular trading hours. Owned and mutated exclusively by the data-quality worker.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Gap {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub bar_count: u64,
    pub retry_count: u32,
    pub last_retry: Option<DateTime<Utc>>,
}

impl Gap {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, bar_count: u64) -> Self {
        Self {
            start,
            end,
            bar_count,
            retry_count: 0,
            last_retry: None,
        }
    }

    /// Whether this gap covers `timestamp` within `[start, end)`.
    pub fn covers(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp < self.end
    }

    pub fn at_max_retries(&self, max_retries: u32) -> bool {
        self.retry_count >= max_retries
    }

    pub fn record_retry(&mut self, now: DateTime<Utc>) {
        self.retry_count += 1;
        self.last_retry = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 4, 9, minute, 0).unwrap()
    }

    #[test]
    fn covers_is_half_open() {
        let gap = Gap::new(ts(45), ts(50), 5);
        assert!(gap.covers(ts(45)));
        assert!(gap.covers(ts(49)));
        assert!(!gap.covers(ts(50)));
    }

    #[test]
    fn tracks_retries() {
        let mut gap = Gap::new(ts(45), ts(50), 5);
        assert!(!gap.at_max_retries(3));
        gap.record_retry(ts(46));
        gap.record_retry(ts(47));
        gap.record_retry(ts(48));
        assert!(gap.at_max_retries(3));
        assert_eq!(gap.last_retry, Some(ts(48)));
    }
}
