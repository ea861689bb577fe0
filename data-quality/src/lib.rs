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

//! # Data-Quality
//! Non-blocking measurement of per-interval data quality and, in live mode, gap repair.
//!
//! [`manager::DataQualityManager`] never signals ready and never blocks the Coordinator - it
//! reacts to the same `(symbol, interval, timestamp)` notifications as `data-processor`, but its
//! only effect is what it writes straight into [`session_data::SessionData`] via
//! `set_quality`/`set_gaps`. The scoring and gap-detection math in [`quality`] is pure and
//! independently tested; [`gap_fill`] is the only place that touches the external
//! [`session_data::BarRepository`].

/// `GapFillerConfig`/`DataQualityConfig` - static per-session configuration.
pub mod config;

/// Error kinds for this crate.
pub mod error;

/// Live-mode-only gap repair against a `BarRepository`.
pub mod gap_fill;

/// `DataQualityManager` - the non-blocking background worker itself.
pub mod manager;

/// Pure quality-score and gap-detection functions.
pub mod quality;

pub use config::{DataQualityConfig, GapFillerConfig};
pub use error::QualityError;
pub use manager::DataQualityManager;
