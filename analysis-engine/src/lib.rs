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

//! # Analysis-Engine
//! Strategy and scanner dispatch: the third link of the session engine's ready chain
//! (Coordinator -> Processor -> AnalysisEngine -> Strategies).
//!
//! [`StrategyManager`] owns one dedicated OS thread per registered [`Strategy`], routes
//! `(symbol, interval)` notifications to the strategies subscribed to them, and blocks the
//! dispatching side until every subscriber catches up (indefinitely in data-driven mode, up to
//! a short timeout in clock-driven/live mode). [`engine::AnalysisEngine`] is the worker that
//! pulls `ProcessorNotification`s off the DataProcessor's downstream channel and runs them
//! through the manager.
//!
//! [`ScannerManager`] is a separate, synchronous collaborator: scanners are invoked from the
//! session coordinator's own thread, never from a dedicated worker thread of their own - in
//! live mode a scan still runs off-thread so it never blocks the coordinator's merge loop.

/// Per-strategy/per-scanner config shapes loaded from `SessionConfig`.
pub mod config;

/// `StrategyContext`/`ScanContext` - the read-only handles passed into every strategy/scanner
/// callback.
pub mod context;

/// Error kinds for this crate.
pub mod error;

/// The `AnalysisEngine` worker: the dispatch loop's dedicated OS thread.
pub mod engine;

/// `Scanner` trait and its state machine.
pub mod scanner;

/// `ScannerManager` - synchronous scanner lifecycle and scheduling.
pub mod scanner_manager;

/// `Strategy` trait.
pub mod strategy;

/// `StrategyManager` - per-strategy threads and notification routing.
pub mod strategy_manager;

pub use config::{ScannerConfig, ScannerSchedule, StrategyConfig};
pub use context::{ScanContext, StrategyContext};
pub use engine::AnalysisEngine;
pub use error::AnalysisError;
pub use scanner::{ScanResult, Scanner, ScannerState};
pub use scanner_manager::ScannerManager;
pub use strategy::Strategy;
pub use strategy_manager::{DispatchError, StrategyManager};
