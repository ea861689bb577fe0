use crate::error::LifecycleError;
use serde::Serialize;
use std::sync::atomic::{AtomicU8, Ordering};

/// The session's run state. Transition legality ([`validate_transition`]) is a free function,
/// not a method on this type, so [`crate::coordinator::SessionCoordinator`] can check it
/// without holding a mutable reference.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub enum SystemState {
    Stopped,
    Running,
    Paused,
}

impl SystemState {
    fn to_u8(self) -> u8 {
        match self {
            SystemState::Stopped => 0,
            SystemState::Running => 1,
            SystemState::Paused => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => SystemState::Running,
            2 => SystemState::Paused,
            _ => SystemState::Stopped,
        }
    }
}

/// Lock-free shared handle to a [`SystemState`], read by the merge loop on every step and
/// written from whatever thread calls `start`/`stop`/`pause`/`resume`.
#[derive(Debug)]
pub struct SharedSystemState(AtomicU8);

impl Default for SharedSystemState {
    fn default() -> Self {
        Self(AtomicU8::new(SystemState::Stopped.to_u8()))
    }
}

impl SharedSystemState {
    pub fn new(initial: SystemState) -> Self {
        Self(AtomicU8::new(initial.to_u8()))
    }

    pub fn get(&self) -> SystemState {
        SystemState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, state: SystemState) {
        self.0.store(state.to_u8(), Ordering::Release);
    }
}

/// Legality check for a requested mode change, shared by the Coordinator's command handler.
/// `start` is only legal from `Stopped`; pause/resume only toggle between `Running`/`Paused`;
/// `stop` is legal from any state (idempotent while already `Stopped`).
pub fn validate_transition(current: SystemState, requested: SystemState) -> Result<(), LifecycleError> {
    use SystemState::{Paused, Running, Stopped};

    match (current, requested) {
        (Stopped, Running) | (Running, Paused) | (Paused, Running) => Ok(()),
        (_, Stopped) => Ok(()),
        (_, Running) => Err(LifecycleError::AlreadyStarted(current)),
        (Stopped, Paused) | (Paused, Paused) => Err(LifecycleError::InvalidModeChange(current)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_the_atomic() {
        let shared = SharedSystemState::new(SystemState::Stopped);
        assert_eq!(shared.get(), SystemState::Stopped);

        shared.set(SystemState::Running);
        assert_eq!(shared.get(), SystemState::Running);

        shared.set(SystemState::Paused);
        assert_eq!(shared.get(), SystemState::Paused);
    }

    #[test]
    fn start_is_only_legal_from_stopped() {
        assert!(validate_transition(SystemState::Stopped, SystemState::Running).is_ok());
        assert!(matches!(
            validate_transition(SystemState::Running, SystemState::Running),
            Err(LifecycleError::AlreadyStarted(SystemState::Running))
        ));
        assert!(validate_transition(SystemState::Paused, SystemState::Running).is_ok());
    }

    #[test]
    fn pause_requires_running_and_resume_requires_paused() {
        assert!(validate_transition(SystemState::Running, SystemState::Paused).is_ok());
        assert!(matches!(
            validate_transition(SystemState::Stopped, SystemState::Paused),
            Err(LifecycleError::InvalidModeChange(SystemState::Stopped))
        ));
        assert!(matches!(
            validate_transition(SystemState::Paused, SystemState::Paused),
            Err(LifecycleError::InvalidModeChange(SystemState::Paused))
        ));
    }

    #[test]
    fn stop_is_always_legal() {
        for state in [SystemState::Stopped, SystemState::Running, SystemState::Paused] {
            assert!(validate_transition(state, SystemState::Stopped).is_ok());
        }
    }
}
