use crate::error::QualityError;
use session_data::{BarRepository, Gap, InsertMode, SessionData};
use session_instrument::{Interval, Symbol};
use tracing::{debug, warn};

/// Attempt to fill one gap from the repository. Returns the number of bars actually inserted
/// (idempotent on timestamp via [`InsertMode::GapFill`]); a return less than `gap.bar_count`
/// means a partial or failed fill and the caller should schedule a retry.
pub async fn fill_gap(
    session_data: &SessionData,
    repository: &dyn BarRepository,
    symbol: &Symbol,
    interval: &Interval,
    gap: &Gap,
) -> Result<usize, QualityError> {
    debug!(%symbol, interval = interval.as_str(), start = %gap.start, end = %gap.end, "attempting gap fill");

    let bars = repository.get_bars(symbol, interval, gap.start, gap.end).await?;
    if bars.is_empty() {
        warn!(%symbol, interval = interval.as_str(), "repository returned no bars for gap");
        return Ok(0);
    }

    let inserted = session_data.add_bars_batch(symbol, interval, bars, InsertMode::GapFill);
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use session_data::{AddedBy, Bar, SymbolSessionData};
    use session_data::testing::FakeBarRepository;
    use std::sync::Arc;

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

    #[tokio::test]
    async fn fills_a_gap_from_the_repository() {
        let symbol = Symbol::new("AAPL");
        let interval = Interval::new("1m");
        let store = Arc::new(SessionData::new());
        store.register_symbol_data(SymbolSessionData::new(
            symbol.clone(),
            interval.clone(),
            AddedBy::Config,
            false,
            true,
            Utc::now(),
        ));
        store.append_bar(&symbol, &interval, bar(30));
        store.append_bar(&symbol, &interval, bar(36));

        let repository = FakeBarRepository::new();
        repository.seed(
            symbol.clone(),
            interval.clone(),
            (31..36).map(bar).collect(),
        );

        let gap = Gap::new(
            Utc.with_ymd_and_hms(2025, 11, 4, 9, 31, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 11, 4, 9, 36, 0).unwrap(),
            5,
        );

        let filled = fill_gap(&store, &repository, &symbol, &interval, &gap).await.unwrap();
        assert_eq!(filled, 5);

        let len = store.get_symbol_data(&symbol, |data| data.bars[&interval].bars().len()).unwrap();
        assert_eq!(len, 7);
    }

    #[tokio::test]
    async fn empty_repository_response_fills_nothing() {
        let symbol = Symbol::new("AAPL");
        let interval = Interval::new("1m");
        let store = Arc::new(SessionData::new());
        store.register_symbol_data(SymbolSessionData::new(
            symbol.clone(),
            interval.clone(),
            AddedBy::Config,
            false,
            true,
            Utc::now(),
        ));

        let repository = FakeBarRepository::new();
        let gap = Gap::new(
            Utc.with_ymd_and_hms(2025, 11, 4, 9, 31, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 11, 4, 9, 36, 0).unwrap(),
            5,
        );

        let filled = fill_gap(&store, &repository, &symbol, &interval, &gap).await.unwrap();
        assert_eq!(filled, 0);
    }
}
