use crate::error::BarError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A completed OHLCV sample over the half-open interval `[timestamp, timestamp + interval)`,
/// where `timestamp` is in the exchange's market timezone.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
}

impl Bar {
    /// Construct a `Bar`, validating `low <= {open, close} <= high`.
    ///
    /// `volume` is unsigned so "`volume >= 0`" is enforced by the type itself.
    pub fn new(
        timestamp: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: u64,
    ) -> Result<Self, BarError> {
        if low > open || low > close || open > high || close > high {
            return Err(BarError::InvalidOhlc {
                open,
                high,
                low,
                close,
            });
        }

        Ok(Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        })
    }

    /// The end of this bar's coverage: `timestamp + interval_seconds`.
    pub fn coverage_end(&self, interval_seconds: i64) -> DateTime<Utc> {
        self.timestamp + chrono::TimeDelta::seconds(interval_seconds)
    }
}
