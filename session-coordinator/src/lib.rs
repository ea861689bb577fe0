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

//! # Session-Coordinator
//! Session lifecycle, simulated clock, and the chronological bar merge-yield loop: the engine's
//! single source of truth for "what bar comes next".
//!
//! [`coordinator::SessionCoordinator`] runs the four-phase per-day lifecycle (teardown,
//! initialize, active, end-of-session) on its own OS thread, driving [`merge::MergeQueue`] -
//! a pure, independently-testable merge core - one tick at a time. Every external mutation
//! (start/stop/pause/resume/add/remove/feed a live bar) goes through the cheaply-clonable
//! [`coordinator::SessionCoordinatorHandle`] returned by `SessionCoordinator::handle`, since the
//! Coordinator itself is moved onto its own thread by `run`.
//!
//! [`clock::SimulatedClock`]/[`clock::LiveClock`] are the two [`session_data::SessionClock`]
//! implementations: the former is driven forward by the merge loop itself in backtest mode, the
//! latter simply reads the wall clock.
//!
//! [`provisioning`] implements the three-phase dynamic symbol management protocol (analyze,
//! validate, provision) shared by config-declared symbols, mid-session adds, and scanner finds.

/// `SessionClock` implementations: [`clock::SimulatedClock`] and [`clock::LiveClock`].
pub mod clock;

/// [`coordinator::SessionCoordinator`]/[`coordinator::SessionCoordinatorHandle`] - the session
/// lifecycle and merge-yield loop.
pub mod coordinator;

/// Error kinds for this crate.
pub mod error;

/// [`merge::MergeQueue`] - the pure chronological merge core.
pub mod merge;

/// The three-phase dynamic symbol provisioning protocol.
pub mod provisioning;

/// [`state::SystemState`]/[`state::SharedSystemState`] and transition legality.
pub mod state;

pub use clock::{LiveClock, SimulatedClock};
pub use coordinator::{SessionCoordinator, SessionCoordinatorConfig, SessionCoordinatorHandle, SymbolAddRequest};
pub use error::{ClockError, CoordinatorError, LifecycleError, NotifyError, OverrunError, ProvisioningError};
pub use merge::{MergeOutcome, MergeQueue};
pub use provisioning::{
    AddRegime, OperationType, ProvisioningRequirements, ProvisioningSource, ProvisioningStep, SymbolValidationResult,
};
pub use state::{validate_transition, SharedSystemState, SystemState};
