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

//! # Indicator-Catalog
//! A pluggable technical-indicator library built around one fixed lifecycle contract:
//! `(config, bars, prior_state) -> state`.
//!
//! Every indicator is a pure function of its declarative [`config::IndicatorConfig`], the bar
//! history available so far, and its own previous [`session_data::IndicatorState`] - nothing is
//! hidden in indicator-local mutable state. Indicators that would otherwise need to rescan their
//! whole window on every bar instead carry a minimal [`session_data::IndicatorCarry`] forward
//! (an EMA value, Wilder RSI's running averages, MACD's two EMAs) so a single new bar is an O(1)
//! update rather than an O(period) one.
//!
//! [`catalog::IndicatorCatalog`] is the registry a data-processor worker holds: one instance per
//! session, looked up by name as bars arrive.

/// `IndicatorCatalog`/`Indicator` - the registry and lifecycle trait.
pub mod catalog;

/// `IndicatorConfig` - one indicator instance's declarative configuration.
pub mod config;

/// Error kinds for this crate.
pub mod error;

/// Built-in `Indicator` implementations: SMA, EMA, Wilder RSI, MACD, Bollinger Bands,
/// Stochastic `%K`, High/Low, and floor-trader Pivots.
pub mod indicators;

pub use catalog::{Indicator, IndicatorCatalog};
pub use config::IndicatorConfig;
pub use error::IndicatorError;
