use crate::state::SystemState;
use session_data::error::{CalendarError, RepositoryError};
use thiserror::Error;

/// Raised on an attempt to read the simulated clock before backtest initialization.
#[derive(Debug, Clone, Copy, Error)]
pub enum ClockError {
    #[error("simulated clock read before backtest initialization")]
    ReadBeforeInit,
}

/// A session lifecycle operation was attempted in a state that doesn't allow it.
#[derive(Debug, Clone, Error)]
pub enum LifecycleError {
    #[error("start called while session is already {0:?}")]
    AlreadyStarted(SystemState),

    #[error("pause/resume attempted while session is {0:?}")]
    InvalidModeChange(SystemState),

    #[error("stop called while session is still starting up")]
    StopDuringStart,
}

/// The Coordinator's own downstream notification channels (to `DataProcessor` and
/// `DataQualityManager`) closed.
#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    #[error("downstream notification channel closed")]
    Closed,
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for NotifyError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        NotifyError::Closed
    }
}

/// A clock-driven downstream missed its ready deadline. The session stops, preserving
/// `SessionData` for inspection, per spec.
#[derive(Debug, Clone, Error)]
#[error("{worker} missed its ready deadline (overrun #{overrun_count})")]
pub struct OverrunError {
    pub worker: String,
    pub overrun_count: u64,
}

/// Raised when a symbol add/upgrade fails the three-phase provisioning protocol's validate
/// phase, or when a downstream collaborator it depends on fails.
#[derive(Debug, Clone, Error)]
pub enum ProvisioningError {
    #[error("symbol validation failed: {0}")]
    ValidationFailed(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Calendar(#[from] CalendarError),
}

/// Aggregate error type for the coordinator crate, matching the teacher's per-crate
/// aggregation-via-`#[from]` convention.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Clock(#[from] ClockError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Overrun(#[from] OverrunError),

    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),
}
