use chrono::{DateTime, Utc};

/// The session's single source of truth for "now". Implemented by `session-coordinator`'s
/// `SimulatedClock` (backtest, monotonic-non-decreasing, advanced only by the Coordinator) and
/// `LiveClock` (wall-clock); every other worker that needs "now" - `DataQualityManager`'s
/// quality/gap-sweep timing chief among them - depends only on this trait.
pub trait SessionClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
