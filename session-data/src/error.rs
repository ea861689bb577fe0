use rust_decimal::Decimal;
use thiserror::Error;

/// A `Bar` failed one of its invariants at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum BarError {
    #[error("invalid OHLC: open={open} high={high} low={low} close={close}")]
    InvalidOhlc {
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
    },
}

/// Raised by a [`crate::repository::BarRepository`] implementation when the underlying store
/// is unavailable or returns unusable data.
#[derive(Debug, Clone, Error)]
pub enum RepositoryError {
    #[error("bar repository unavailable: {0}")]
    Unavailable(String),

    #[error("bar repository returned malformed data: {0}")]
    MalformedData(String),
}

/// Raised by a [`crate::calendar::CalendarService`] implementation.
#[derive(Debug, Clone, Error)]
pub enum CalendarError {
    #[error("no calendar data for exchange group '{0}'")]
    UnknownExchangeGroup(String),

    #[error("calendar lookup failed: {0}")]
    LookupFailed(String),
}
