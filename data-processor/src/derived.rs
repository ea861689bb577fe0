use chrono::{DateTime, Utc};
use session_data::Bar;

/// Aggregate completed buckets of `multiple` consecutive `base_seconds`-long bars into derived
/// bars, with bucket boundaries aligned to `session_start` modulo `multiple * base_seconds`.
///
/// A bucket is only emitted once it is closed: either it has accumulated `multiple` bars, or a
/// later bar belongs to a subsequent bucket (the window elapsed with fewer bars, eg/ a gap).
/// The still-open trailing bucket is withheld so a derived bar's `close` never changes after
/// it is first emitted.
pub fn compute_derived_bars(base_bars: &[Bar], base_seconds: i64, multiple: u32, session_start: DateTime<Utc>) -> Vec<Bar> {
    let bucket_seconds = base_seconds * i64::from(multiple);
    if bucket_seconds <= 0 || base_bars.is_empty() {
        return Vec::new();
    }

    let bucket_index = |ts: DateTime<Utc>| -> i64 { (ts - session_start).num_seconds().div_euclid(bucket_seconds) };

    let mut result = Vec::new();
    let mut current_index = bucket_index(base_bars[0].timestamp);
    let mut group: Vec<&Bar> = vec![&base_bars[0]];

    for bar in &base_bars[1..] {
        let idx = bucket_index(bar.timestamp);
        if idx == current_index {
            group.push(bar);
        } else {
            result.push(aggregate(&group));
            group = vec![bar];
            current_index = idx;
        }
    }

    if group.len() as u32 >= multiple {
        result.push(aggregate(&group));
    }

    result
}

fn aggregate(bars: &[&Bar]) -> Bar {
    let open = bars.first().expect("non-empty bucket").open;
    let close = bars.last().expect("non-empty bucket").close;
    let high = bars.iter().map(|bar| bar.high).max().expect("non-empty bucket");
    let low = bars.iter().map(|bar| bar.low).min().expect("non-empty bucket");
    let volume = bars.iter().map(|bar| bar.volume).sum();
    let timestamp = bars.first().expect("non-empty bucket").timestamp;

    Bar::new(timestamp, open, high, low, close, volume).expect("aggregate of valid bars is itself valid OHLC")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn bar(minute: u32, close: rust_decimal::Decimal) -> Bar {
        Bar::new(
            Utc.with_ymd_and_hms(2025, 11, 4, 9, minute, 0).unwrap(),
            close,
            close + dec!(1),
            close - dec!(1),
            close,
            1_000,
        )
        .unwrap()
    }

    #[test]
    fn emits_a_5m_bar_once_five_1m_bars_close_its_bucket() {
        let session_start = Utc.with_ymd_and_hms(2025, 11, 4, 9, 30, 0).unwrap();
        let bars: Vec<Bar> = (0..5).map(|m| bar(30 + m, dec!(100) + rust_decimal::Decimal::from(m))).collect();

        let derived = compute_derived_bars(&bars, 60, 5, session_start);
        assert_eq!(derived.len(), 1);
        assert_eq!(derived[0].open, dec!(100));
        assert_eq!(derived[0].close, dec!(104));
        assert_eq!(derived[0].volume, 5_000);
    }

    #[test]
    fn withholds_the_still_open_trailing_bucket() {
        let session_start = Utc.with_ymd_and_hms(2025, 11, 4, 9, 30, 0).unwrap();
        let bars: Vec<Bar> = (0..3).map(|m| bar(30 + m, dec!(100) + rust_decimal::Decimal::from(m))).collect();

        let derived = compute_derived_bars(&bars, 60, 5, session_start);
        assert!(derived.is_empty());
    }

    #[test]
    fn closes_a_bucket_early_on_a_gap_into_the_next_bucket() {
        let session_start = Utc.with_ymd_and_hms(2025, 11, 4, 9, 30, 0).unwrap();
        let bars = vec![bar(30, dec!(100)), bar(31, dec!(101)), bar(40, dec!(110))];

        let derived = compute_derived_bars(&bars, 60, 5, session_start);
        assert_eq!(derived.len(), 1);
        assert_eq!(derived[0].close, dec!(101));
    }

    #[test]
    fn progressive_rule_5m_satisfied_before_15m() {
        let session_start = Utc.with_ymd_and_hms(2025, 11, 4, 9, 30, 0).unwrap();
        let bars: Vec<Bar> = (0..5).map(|m| bar(30 + m, dec!(100) + rust_decimal::Decimal::from(m))).collect();

        assert_eq!(compute_derived_bars(&bars, 60, 5, session_start).len(), 1);
        assert_eq!(compute_derived_bars(&bars, 60, 15, session_start).len(), 0);
    }
}
