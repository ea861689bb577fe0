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

//! # Session-Engine
//! Top-level wiring: loads a declarative `SessionConfig`, constructs every worker crate with
//! its dependencies, and owns the running session's threads behind [`SystemManager`].
//!
//! This is the crate a binary actually links against. Everything below it - coordinator,
//! processor, quality manager, analysis engine - is reusable on its own, but only
//! `SystemManager::start` assembles them into a runnable session for one trading day.

/// `SessionConfig` and its nested structs - the validated, declarative top-level configuration.
pub mod config;

/// Error kinds for this crate.
pub mod error;

/// `init_logging`/`init_json_logging` - process-wide tracing setup.
pub mod logging;

/// `SystemManager` - the session factory and process handle.
pub mod manager;

/// `SystemStatus`/`SessionMetricsSnapshot` - the read-only status/metrics surface.
pub mod status;

pub use config::{BacktestConfig, HistoricalConfig, SessionConfig, SessionDataConfig, SessionMode, StreamingConfig};
pub use error::{ConfigError, EngineError};
pub use logging::{init_json_logging, init_logging};
pub use manager::SystemManager;
pub use status::{SessionMetricsSnapshot, SymbolStatus, SystemStatus};
