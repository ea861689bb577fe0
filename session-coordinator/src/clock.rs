use crate::error::ClockError;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use session_data::SessionClock;

/// Backtest clock: monotonic-non-decreasing, advanced only by the Coordinator's merge loop as
/// it yields data. Reading before [`SimulatedClock::init`] is a programmer error, surfaced via
/// [`ClockError::ReadBeforeInit`] rather than an arbitrary default timestamp.
///
/// Directly analogous to the teacher's `HistoricalClock`, but simpler: that type
/// live-interpolates between exchange events, where this one is only ever set explicitly by
/// the single thread that owns it.
#[derive(Debug, Default)]
pub struct SimulatedClock {
    now: RwLock<Option<DateTime<Utc>>>,
}

impl SimulatedClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial time ahead of a session's active phase.
    pub fn init(&self, at: DateTime<Utc>) {
        *self.now.write() = Some(at);
    }

    /// Advance the clock to `at`, clamped to never move backwards (monotonic-non-decreasing).
    pub fn advance_to(&self, at: DateTime<Utc>) {
        let mut guard = self.now.write();
        *guard = Some(guard.map_or(at, |current| current.max(at)));
    }

    /// Read the current time, or an error if [`Self::init`] was never called.
    pub fn try_now(&self) -> Result<DateTime<Utc>, ClockError> {
        self.now.read().ok_or(ClockError::ReadBeforeInit)
    }
}

impl SessionClock for SimulatedClock {
    fn now(&self) -> DateTime<Utc> {
        self.try_now().expect("SimulatedClock read before init")
    }
}

/// Live-mode clock: plain wall-clock time. The Coordinator never advances this one; every
/// worker just reads `Utc::now()` directly through it.
#[derive(Debug, Default)]
pub struct LiveClock;

impl LiveClock {
    pub fn new() -> Self {
        Self
    }
}

impl SessionClock for LiveClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn reading_before_init_is_an_error() {
        let clock = SimulatedClock::new();
        assert!(matches!(clock.try_now(), Err(ClockError::ReadBeforeInit)));
    }

    #[test]
    fn advance_to_never_moves_backwards() {
        let clock = SimulatedClock::new();
        let t1 = Utc.with_ymd_and_hms(2025, 11, 4, 9, 30, 0).unwrap();
        let t0 = Utc.with_ymd_and_hms(2025, 11, 4, 9, 0, 0).unwrap();

        clock.init(t1);
        clock.advance_to(t0);
        assert_eq!(clock.try_now().unwrap(), t1);

        let t2 = Utc.with_ymd_and_hms(2025, 11, 4, 9, 31, 0).unwrap();
        clock.advance_to(t2);
        assert_eq!(clock.try_now().unwrap(), t2);
    }
}
