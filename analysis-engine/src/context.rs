use session_data::{SessionClock, SessionData};
use std::sync::Arc;
use stream_subscription::SubscriptionMode;

/// Everything a [`crate::strategy::Strategy`] callback can read: the shared store, "now", and
/// which execution mode it is running under (a strategy never needs to know more than that to
/// decide how aggressively to compute).
#[derive(Clone)]
pub struct StrategyContext {
    pub session_data: Arc<SessionData>,
    pub clock: Arc<dyn SessionClock>,
    pub mode: SubscriptionMode,
}

impl std::fmt::Debug for StrategyContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyContext").field("mode", &self.mode).finish()
    }
}

impl StrategyContext {
    pub fn new(session_data: Arc<SessionData>, clock: Arc<dyn SessionClock>, mode: SubscriptionMode) -> Self {
        Self { session_data, clock, mode }
    }
}

/// Everything a [`crate::scanner::Scanner`] callback can read, plus the "as-of" time the scan
/// was triggered at (frozen for the duration of the call, even though `clock` can keep moving
/// underneath it in live mode).
#[derive(Clone)]
pub struct ScanContext {
    pub session_data: Arc<SessionData>,
    pub clock: Arc<dyn SessionClock>,
    pub mode: SubscriptionMode,
    pub current_time: chrono::DateTime<chrono::Utc>,
}

impl std::fmt::Debug for ScanContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanContext")
            .field("mode", &self.mode)
            .field("current_time", &self.current_time)
            .finish()
    }
}

impl ScanContext {
    pub fn new(
        session_data: Arc<SessionData>,
        clock: Arc<dyn SessionClock>,
        mode: SubscriptionMode,
        current_time: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        Self { session_data, clock, mode, current_time }
    }
}
