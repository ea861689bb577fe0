use chrono::{DateTime, TimeDelta, Utc};
use session_data::{Bar, Gap};
use std::collections::HashSet;

/// A bar's timestamp is its closing instant: one stamped exactly at `session_open` is the
/// pre-market bar and excluded; one at `session_close` is the last regular bar and counts.
pub fn in_regular_hours(timestamp: DateTime<Utc>, session_open: DateTime<Utc>, session_close: DateTime<Utc>) -> bool {
    timestamp > session_open && timestamp <= session_close
}

/// `expected = floor( min(now, session_close) - session_open ) / interval_seconds`.
pub fn expected_bar_count(
    session_open: DateTime<Utc>,
    session_close: DateTime<Utc>,
    now: DateTime<Utc>,
    interval_seconds: i64,
) -> u64 {
    if interval_seconds <= 0 {
        return 0;
    }
    let effective_end = now.min(session_close);
    if effective_end <= session_open {
        return 0;
    }
    ((effective_end - session_open).num_seconds() / interval_seconds) as u64
}

/// Unique regular-hours bar timestamps and how many of the feed's timestamps were duplicates of
/// one already seen. `SessionData::append_bar`/`gap_fill` already reject duplicate timestamps at
/// insertion, so `duplicates` is always `0` for bars read back out of the store - this stays a
/// pure, independently-testable function of a bar slice rather than assuming that invariant.
pub fn count_unique_and_duplicates(bars: &[Bar], session_open: DateTime<Utc>, session_close: DateTime<Utc>) -> (u64, u64) {
    let mut seen = HashSet::new();
    let mut duplicates = 0u64;
    for bar in bars {
        if !in_regular_hours(bar.timestamp, session_open, session_close) {
            continue;
        }
        if !seen.insert(bar.timestamp) {
            duplicates += 1;
        }
    }
    (seen.len() as u64, duplicates)
}

/// `quality = clamp((actual_unique - duplicates) / expected, 0, 1) * 100`.
///
/// Before the first interval boundary has elapsed (`expected == 0`) there is nothing to be
/// missing yet, so the score is a perfect `100`; bars whose timestamp lands after
/// `session_close` are surplus and never push the score above `100`.
pub fn quality_score(actual_unique: u64, duplicates: u64, expected: u64) -> f64 {
    if expected == 0 {
        return 100.0;
    }
    let unique = actual_unique.saturating_sub(duplicates) as f64;
    (unique / expected as f64).clamp(0.0, 1.0) * 100.0
}

/// Gaps between consecutive regular-hours bars, plus a trailing gap up to `min(now,
/// session_close)` if the most recent bar is not yet caught up. Each gap's `bar_count =
/// floor((effective_end - expected_next) / Δ)`, matching the interior-gap formula exactly - a
/// trailing gap is just the case where `effective_end` has no bar sitting at it yet.
pub fn detect_gaps(
    bars: &[Bar],
    session_open: DateTime<Utc>,
    session_close: DateTime<Utc>,
    now: DateTime<Utc>,
    interval_seconds: i64,
) -> Vec<Gap> {
    if interval_seconds <= 0 {
        return Vec::new();
    }

    let effective_end = now.min(session_close);
    if effective_end <= session_open {
        return Vec::new();
    }
    let delta = TimeDelta::seconds(interval_seconds);

    let mut timestamps: Vec<DateTime<Utc>> = bars
        .iter()
        .map(|bar| bar.timestamp)
        .filter(|&ts| ts > session_open && ts <= effective_end)
        .collect();
    timestamps.sort_unstable();
    timestamps.dedup();

    let mut gaps = Vec::new();
    let mut expected_next = session_open + delta;
    for ts in timestamps {
        if ts > expected_next {
            let bar_count = (ts - expected_next).num_seconds() / interval_seconds;
            if bar_count > 0 {
                gaps.push(Gap::new(expected_next, ts, bar_count as u64));
            }
        }
        expected_next = ts + delta;
    }

    if expected_next < effective_end {
        let bar_count = (effective_end - expected_next).num_seconds() / interval_seconds;
        if bar_count > 0 {
            gaps.push(Gap::new(expected_next, effective_end, bar_count as u64));
        }
    }

    gaps
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn open() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 4, 9, 30, 0).unwrap()
    }

    fn close() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 4, 16, 0, 0).unwrap()
    }

    fn bar(minute: u32) -> Bar {
        let timestamp = Utc.with_ymd_and_hms(2025, 11, 4, 9, minute, 0).unwrap();
        Bar::new(timestamp, dec!(100), dec!(101), dec!(99), dec!(100.5), 1_000).unwrap()
    }

    #[test]
    fn quality_with_a_gap_matches_the_worked_example() {
        let now = Utc.with_ymd_and_hms(2025, 11, 4, 10, 0, 0).unwrap();
        let bars: Vec<Bar> = (31..=44).chain(50..=60).map(bar).collect();
        assert_eq!(bars.len(), 25);

        let expected = expected_bar_count(open(), close(), now, 60);
        assert_eq!(expected, 30);

        let (unique, duplicates) = count_unique_and_duplicates(&bars, open(), close());
        assert_eq!(unique, 25);
        assert_eq!(duplicates, 0);

        let quality = quality_score(unique, duplicates, expected);
        assert!((quality - 83.333).abs() < 0.01);

        let gaps = detect_gaps(&bars, open(), close(), now, 60);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].start, Utc.with_ymd_and_hms(2025, 11, 4, 9, 45, 0).unwrap());
        assert_eq!(gaps[0].end, Utc.with_ymd_and_hms(2025, 11, 4, 9, 50, 0).unwrap());
        assert_eq!(gaps[0].bar_count, 5);
    }

    #[test]
    fn no_gap_before_the_first_interval_boundary() {
        assert_eq!(expected_bar_count(open(), close(), open(), 60), 0);
        assert_eq!(quality_score(0, 0, 0), 100.0);
    }

    #[test]
    fn trailing_gap_up_to_now_when_current_bar_is_behind() {
        let now = Utc.with_ymd_and_hms(2025, 11, 4, 9, 35, 0).unwrap();
        let bars = vec![bar(31)];

        let gaps = detect_gaps(&bars, open(), close(), now, 60);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].start, Utc.with_ymd_and_hms(2025, 11, 4, 9, 32, 0).unwrap());
        assert_eq!(gaps[0].end, now);
        assert_eq!(gaps[0].bar_count, 3);
    }

    #[test]
    fn pre_market_bar_at_session_open_is_excluded() {
        let at_open = Bar::new(open(), dec!(100), dec!(101), dec!(99), dec!(100.5), 1_000).unwrap();
        assert!(!in_regular_hours(at_open.timestamp, open(), close()));
    }

    #[test]
    fn surplus_bars_past_close_never_boost_quality_above_100() {
        let now = Utc.with_ymd_and_hms(2025, 11, 4, 16, 30, 0).unwrap();
        let past_close = Utc.with_ymd_and_hms(2025, 11, 4, 16, 5, 0).unwrap();
        let bar = Bar::new(past_close, dec!(100), dec!(101), dec!(99), dec!(100.5), 1_000).unwrap();
        assert!(!in_regular_hours(bar.timestamp, open(), close()));

        let expected = expected_bar_count(open(), close(), now, 60);
        let (unique, duplicates) = count_unique_and_duplicates(&[bar], open(), close());
        assert_eq!(unique, 0);
        assert_eq!(quality_score(unique, duplicates, expected), 0.0);
    }
}
