use thiserror::Error;

/// Errors produced by [`crate::parse_interval`] / [`crate::Interval::parse`].
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum IntervalParseError {
    #[error("interval string is empty")]
    Empty,

    #[error("interval '{0}' has no unit suffix")]
    MissingUnit(String),

    #[error("interval '{0}' has an invalid numeric value")]
    InvalidValue(String),

    #[error("interval has unknown unit '{0}', expected one of s, m, d, w")]
    UnknownUnit(String),
}
