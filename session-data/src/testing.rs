//! In-memory, deterministic fakes for [`crate::repository::BarRepository`],
//! [`crate::calendar::CalendarService`] and [`crate::clock::SessionClock`], shipped for every
//! downstream crate's tests - the same role `barter`'s `tests/integration.rs` fills with
//! hand-built fakes rather than mocking an exchange.

use crate::{
    bar::Bar,
    calendar::{CalendarService, TradingSession, TradingTimeUnit},
    clock::SessionClock,
    error::{CalendarError, RepositoryError},
    repository::BarRepository,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use parking_lot::Mutex;
use session_instrument::{ExchangeGroup, Interval, Symbol};
use std::collections::HashMap;

/// A [`SessionClock`] a test can advance by hand - mirrors `SimulatedClock`'s
/// monotonic-non-decreasing contract without pulling in `session-coordinator`.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }
}

impl SessionClock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// A [`BarRepository`] backed by an in-memory map, seeded by the test.
#[derive(Debug, Default)]
pub struct FakeBarRepository {
    bars: Mutex<HashMap<(Symbol, Interval), Vec<Bar>>>,
}

impl FakeBarRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, symbol: Symbol, interval: Interval, mut bars: Vec<Bar>) {
        bars.sort_by_key(|bar| bar.timestamp);
        self.bars.lock().insert((symbol, interval), bars);
    }
}

#[async_trait]
impl BarRepository for FakeBarRepository {
    async fn get_bars(
        &self,
        symbol: &Symbol,
        interval: &Interval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, RepositoryError> {
        let guard = self.bars.lock();
        let bars = guard
            .get(&(symbol.clone(), interval.clone()))
            .map(|bars| {
                bars.iter()
                    .filter(|bar| bar.timestamp >= start && bar.timestamp < end)
                    .copied()
                    .collect()
            })
            .unwrap_or_default();
        Ok(bars)
    }

    async fn get_latest_bar(
        &self,
        symbol: &Symbol,
        interval: &Interval,
    ) -> Result<Option<Bar>, RepositoryError> {
        Ok(self
            .bars
            .lock()
            .get(&(symbol.clone(), interval.clone()))
            .and_then(|bars| bars.last().copied()))
    }

    async fn write_bars(
        &self,
        symbol: &Symbol,
        interval: &Interval,
        bars: &[Bar],
    ) -> Result<(), RepositoryError> {
        let mut guard = self.bars.lock();
        let entry = guard.entry((symbol.clone(), interval.clone())).or_default();
        for bar in bars {
            if !entry.iter().any(|existing| existing.timestamp == bar.timestamp) {
                entry.push(*bar);
            }
        }
        entry.sort_by_key(|bar| bar.timestamp);
        Ok(())
    }
}

/// A [`CalendarService`] with a fixed, regular `09:30-16:00` US-equity-shaped session for
/// every weekday, and explicit holiday/early-close overrides a test can register.
#[derive(Debug)]
pub struct FakeCalendarService {
    open: NaiveTime,
    close: NaiveTime,
    timezone: String,
    holidays: Mutex<Vec<NaiveDate>>,
    early_closes: Mutex<HashMap<NaiveDate, NaiveTime>>,
}

impl Default for FakeCalendarService {
    fn default() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            close: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            timezone: "America/New_York".to_string(),
            holidays: Mutex::new(Vec::new()),
            early_closes: Mutex::new(HashMap::new()),
        }
    }
}

impl FakeCalendarService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_holiday(self, date: NaiveDate) -> Self {
        self.holidays.lock().push(date);
        self
    }

    pub fn with_early_close(self, date: NaiveDate, close: NaiveTime) -> Self {
        self.early_closes.lock().insert(date, close);
        self
    }

    fn is_weekend(date: NaiveDate) -> bool {
        use chrono::Datelike;
        matches!(date.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun)
    }
}

impl CalendarService for FakeCalendarService {
    fn get_trading_session(
        &self,
        date: NaiveDate,
        _exchange: &ExchangeGroup,
    ) -> Result<TradingSession, CalendarError> {
        let is_holiday = self.holidays.lock().contains(&date);
        let is_trading_day = !is_holiday && !Self::is_weekend(date);

        if !is_trading_day {
            return Ok(TradingSession {
                is_trading_day: false,
                is_holiday,
                open: None,
                close: None,
                timezone: self.timezone.clone(),
                early_close: None,
            });
        }

        let early_close = self.early_closes.lock().get(&date).copied();
        let close_time = early_close.unwrap_or(self.close);

        Ok(TradingSession {
            is_trading_day: true,
            is_holiday: false,
            open: Some(Utc.from_utc_datetime(&date.and_time(self.open))),
            close: Some(Utc.from_utc_datetime(&date.and_time(close_time))),
            timezone: self.timezone.clone(),
            early_close,
        })
    }

    fn is_market_open(
        &self,
        timestamp: DateTime<Utc>,
        exchange: &ExchangeGroup,
        include_extended: bool,
    ) -> Result<bool, CalendarError> {
        let session = self.get_trading_session(timestamp.date_naive(), exchange)?;
        if !session.is_trading_day {
            return Ok(false);
        }

        let (open, close) = (session.open.unwrap(), session.close.unwrap());
        if include_extended {
            Ok(timestamp >= open - chrono::TimeDelta::hours(1)
                && timestamp < close + chrono::TimeDelta::hours(4))
        } else {
            Ok(timestamp >= open && timestamp < close)
        }
    }

    fn count_trading_time(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        unit: TradingTimeUnit,
        _exchange: &ExchangeGroup,
    ) -> Result<i64, CalendarError> {
        let delta = end.signed_duration_since(start);
        Ok(match unit {
            TradingTimeUnit::Seconds => delta.num_seconds(),
            TradingTimeUnit::Days => delta.num_days(),
            TradingTimeUnit::Weeks => delta.num_weeks(),
        })
    }

    fn next_trading_date(
        &self,
        date: NaiveDate,
        n: u32,
        exchange: &ExchangeGroup,
    ) -> Result<NaiveDate, CalendarError> {
        let mut current = date;
        let mut remaining = n;
        while remaining > 0 {
            current += chrono::Duration::days(1);
            if self.get_trading_session(current, exchange)?.is_trading_day {
                remaining -= 1;
            }
        }
        Ok(current)
    }

    fn previous_trading_date(
        &self,
        date: NaiveDate,
        n: u32,
        exchange: &ExchangeGroup,
    ) -> Result<NaiveDate, CalendarError> {
        let mut current = date;
        let mut remaining = n;
        while remaining > 0 {
            current -= chrono::Duration::days(1);
            if self.get_trading_session(current, exchange)?.is_trading_day {
                remaining -= 1;
            }
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_repository_filters_by_range() {
        let repo = FakeBarRepository::new();
        let symbol = Symbol::new("AAPL");
        let interval = Interval::new("1m");

        let bars = vec![
            Bar::new(
                Utc.with_ymd_and_hms(2025, 11, 4, 9, 30, 0).unwrap(),
                rust_decimal_macros::dec!(100),
                rust_decimal_macros::dec!(101),
                rust_decimal_macros::dec!(99),
                rust_decimal_macros::dec!(100.5),
                1_000,
            )
            .unwrap(),
            Bar::new(
                Utc.with_ymd_and_hms(2025, 11, 4, 9, 31, 0).unwrap(),
                rust_decimal_macros::dec!(100.5),
                rust_decimal_macros::dec!(102),
                rust_decimal_macros::dec!(100),
                rust_decimal_macros::dec!(101),
                1_200,
            )
            .unwrap(),
        ];
        repo.seed(symbol.clone(), interval.clone(), bars);

        let result = repo
            .get_bars(
                &symbol,
                &interval,
                Utc.with_ymd_and_hms(2025, 11, 4, 9, 31, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 11, 4, 9, 32, 0).unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(result.len(), 1);
    }

    #[test]
    fn fake_calendar_reports_weekend_as_non_trading_day() {
        let calendar = FakeCalendarService::new();
        let exchange = ExchangeGroup::new("US_EQUITY");
        let saturday = NaiveDate::from_ymd_opt(2025, 11, 8).unwrap();
        let session = calendar.get_trading_session(saturday, &exchange).unwrap();
        assert!(!session.is_trading_day);
    }

    #[test]
    fn fake_calendar_honors_early_close_override() {
        let early_close_time = NaiveTime::from_hms_opt(13, 0, 0).unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 11, 28).unwrap();
        let calendar = FakeCalendarService::new().with_early_close(date, early_close_time);
        let exchange = ExchangeGroup::new("US_EQUITY");

        let session = calendar.get_trading_session(date, &exchange).unwrap();
        assert_eq!(session.early_close, Some(early_close_time));
    }
}
