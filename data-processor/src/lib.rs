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

//! # Data-Processor
//! Event-driven generation of derived bars and real-time indicators.
//!
//! [`processor::DataProcessor`] owns the notification mailbox from the Coordinator: a base-
//! interval bar arriving triggers progressive derived-bar synthesis ([`derived`]), and any
//! interval whose bars changed this cycle triggers an indicator refresh ([`indicators`])
//! through the shared [`indicator_catalog::IndicatorCatalog`]. Both effects are written
//! straight into [`session_data::SessionData`]; only a lightweight notification travels
//! downstream to the AnalysisEngine and StrategyManager.

/// `DataProcessorConfig`/`DerivedIntervalSpec` - static per-session configuration.
pub mod config;

/// Progressive, bucket-aligned derived bar synthesis.
pub mod derived;

/// Error kinds for this crate.
pub mod error;

/// Real-time indicator refresh against the shared catalog.
pub mod indicators;

/// `DataProcessor` - the event-driven worker itself.
pub mod processor;

pub use config::{DataProcessorConfig, DerivedIntervalSpec};
pub use error::{NotifyError, ProcessorError};
pub use processor::DataProcessor;
