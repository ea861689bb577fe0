use crate::error::CalendarError;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use session_instrument::ExchangeGroup;

/// Unit used by [`CalendarService::count_trading_time`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TradingTimeUnit {
    Seconds,
    Days,
    Weeks,
}

/// One trading day's session window for an exchange group, as resolved from the calendar.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TradingSession {
    pub is_trading_day: bool,
    pub is_holiday: bool,
    pub open: Option<DateTime<Utc>>,
    pub close: Option<DateTime<Utc>>,
    pub timezone: String,
    /// Present when the exchange is closing earlier than its regular close.
    pub early_close: Option<NaiveTime>,
}

/// Trading-calendar abstraction: resolves session windows, holidays, early closes, and DST
/// transitions for an [`ExchangeGroup`]. An external collaborator; the core only depends on
/// this trait.
pub trait CalendarService: Send + Sync {
    fn get_trading_session(
        &self,
        date: NaiveDate,
        exchange: &ExchangeGroup,
    ) -> Result<TradingSession, CalendarError>;

    fn is_market_open(
        &self,
        timestamp: DateTime<Utc>,
        exchange: &ExchangeGroup,
        include_extended: bool,
    ) -> Result<bool, CalendarError>;

    fn count_trading_time(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        unit: TradingTimeUnit,
        exchange: &ExchangeGroup,
    ) -> Result<i64, CalendarError>;

    fn next_trading_date(
        &self,
        date: NaiveDate,
        n: u32,
        exchange: &ExchangeGroup,
    ) -> Result<NaiveDate, CalendarError>;

    fn previous_trading_date(
        &self,
        date: NaiveDate,
        n: u32,
        exchange: &ExchangeGroup,
    ) -> Result<NaiveDate, CalendarError>;
}
