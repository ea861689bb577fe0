#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::type_complexity, clippy::too_many_arguments)]

//! # Session-Instrument
//! Value types for identifying the things a trading session trades and the time
//! granularities it operates at.
//!
//! * [`Symbol`] - an interned ticker identifier.
//! * [`ExchangeGroup`] / [`AssetClass`] - together resolve a trading calendar and timezone.
//! * [`Interval`] / [`IntervalInfo`] - the base/derived bar granularities a session supports.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt::Debug;

/// Errors produced while parsing instrument-level value types.
pub mod error;

/// Interned ticker identifier, cheap to clone and hash.
///
/// eg/ `Symbol::new("AAPL")`
#[derive(
    Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, derive_more::Display,
)]
pub struct Symbol(SmolStr);

impl Symbol {
    pub fn new(symbol: impl Into<SmolStr>) -> Self {
        Self(symbol.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl<T> From<T> for Symbol
where
    T: Into<SmolStr>,
{
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

/// Logical grouping of exchanges sharing a trading calendar (eg/ `"US_EQUITY"`, `"CRYPTO"`).
#[derive(
    Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, derive_more::Display,
)]
pub struct ExchangeGroup(SmolStr);

impl ExchangeGroup {
    pub fn new(group: impl Into<SmolStr>) -> Self {
        Self(group.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Asset class within an [`ExchangeGroup`] (eg/ `"equity"`, `"future"`, `"crypto"`).
#[derive(
    Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, derive_more::Display,
)]
pub struct AssetClass(SmolStr);

impl AssetClass {
    pub fn new(class: impl Into<SmolStr>) -> Self {
        Self(class.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Coarse kind of an [`Interval`], used by [`IntervalInfo`] to derive a duration in seconds.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub enum IntervalKind {
    Second,
    Minute,
    Day,
    Week,
}

/// An interval string such as `"1m"`, `"5m"`, `"1s"`, parsed into its constituent parts.
///
/// Resolves the "Quality helpers import cycle" design note: both the indicator
/// framework and the data-quality worker depend on this directly instead of
/// importing a sibling module from inside a function body.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize)]
pub struct IntervalInfo {
    pub kind: IntervalKind,
    pub seconds: i64,
    pub value: u32,
}

impl IntervalInfo {
    pub fn seconds(&self) -> i64 {
        self.seconds
    }
}

/// A raw interval identifier as it appears in `SessionConfig` and notification tuples
/// (eg/ `"1m"`, `"5m"`, `"15m"`).
#[derive(
    Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, derive_more::Display,
)]
pub struct Interval(SmolStr);

impl Interval {
    pub fn new(interval: impl Into<SmolStr>) -> Self {
        Self(interval.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Parse this interval's string form into an [`IntervalInfo`].
    ///
    /// Accepts `<value><unit>` where unit is one of `s` (second), `m` (minute),
    /// `d` (day) or `w` (week).
    pub fn parse(&self) -> Result<IntervalInfo, error::IntervalParseError> {
        parse_interval(self.as_str())
    }

    /// Build the derived interval `value * base` minutes from this (minute) base interval.
    ///
    /// eg/ `Interval::new("1m").derive_minutes(5) == Interval::new("5m")`
    pub fn derive_minutes(&self, multiple: u32) -> Interval {
        Interval::new(format!("{multiple}m"))
    }
}

/// Parse an interval string (eg/ `"5m"`, `"1s"`, `"1d"`, `"1w"`) into an [`IntervalInfo`].
pub fn parse_interval(raw: &str) -> Result<IntervalInfo, error::IntervalParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(error::IntervalParseError::Empty);
    }

    let split_at = raw
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| error::IntervalParseError::MissingUnit(raw.to_string()))?;

    let (value_str, unit) = raw.split_at(split_at);
    let value: u32 = value_str
        .parse()
        .map_err(|_| error::IntervalParseError::InvalidValue(raw.to_string()))?;

    if value == 0 {
        return Err(error::IntervalParseError::InvalidValue(raw.to_string()));
    }

    let (kind, unit_seconds) = match unit {
        "s" => (IntervalKind::Second, 1),
        "m" => (IntervalKind::Minute, 60),
        "d" => (IntervalKind::Day, 86_400),
        "w" => (IntervalKind::Week, 7 * 86_400),
        other => return Err(error::IntervalParseError::UnknownUnit(other.to_string())),
    };

    Ok(IntervalInfo {
        kind,
        seconds: i64::from(value) * unit_seconds,
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minute_intervals() {
        assert_eq!(
            parse_interval("5m").unwrap(),
            IntervalInfo {
                kind: IntervalKind::Minute,
                seconds: 300,
                value: 5,
            }
        );
    }

    #[test]
    fn parses_second_and_day_and_week() {
        assert_eq!(parse_interval("1s").unwrap().seconds, 1);
        assert_eq!(parse_interval("1d").unwrap().seconds, 86_400);
        assert_eq!(parse_interval("2w").unwrap().seconds, 2 * 7 * 86_400);
    }

    #[test]
    fn rejects_malformed_intervals() {
        assert!(parse_interval("").is_err());
        assert!(parse_interval("m").is_err());
        assert!(parse_interval("0m").is_err());
        assert!(parse_interval("5x").is_err());
    }

    #[test]
    fn derives_minute_multiples() {
        let base = Interval::new("1m");
        assert_eq!(base.derive_minutes(5), Interval::new("5m"));
    }
}
