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

//! # Session-Data
//! The passive, shared store every session engine worker reads by reference.
//!
//! [`SessionData`] is created fresh at the start of each trading day and cleared at day end -
//! there is no persistence between days. It owns:
//! * [`bar::Bar`] history per `(symbol, interval)`, held in an [`interval_data::IntervalData`].
//! * [`indicator::IndicatorState`] per indicator instance.
//! * [`gap::Gap`] and quality bookkeeping, written exclusively by the data-quality worker.
//! * [`symbol_session::SymbolSessionData`] provenance metadata used by dynamic symbol
//!   management.
//!
//! A single coarse-grained lock protects the whole store (see [`store::SessionData`]'s docs);
//! mutation is funneled through the documented single-writer-per-field methods so that every
//! other thread's zero-copy reads stay consistent.

/// `Bar` - the OHLCV sample type and its invariants.
pub mod bar;

/// `CalendarService` - the external trading-calendar collaborator interface.
pub mod calendar;

/// `SessionClock` - the session's single source of truth for "now".
pub mod clock;

/// Error kinds for this crate.
pub mod error;

/// `Gap` - a contiguous hole in an interval's expected bars.
pub mod gap;

/// `IndicatorState`/`IndicatorValue`/`IndicatorCarry` - indicator framework data model.
pub mod indicator;

/// `IntervalData` - one `(symbol, interval)`'s ordered bar history and quality state.
pub mod interval_data;

/// `BarRepository` - the external durable bar store collaborator interface.
pub mod repository;

/// `SessionData` - the shared, zero-copy store.
pub mod store;

/// `SymbolSessionData` - per-symbol session state and provenance metadata.
pub mod symbol_session;

/// In-memory fakes for `BarRepository`/`CalendarService`, for use in downstream crate tests.
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use bar::Bar;
pub use calendar::{CalendarService, TradingSession, TradingTimeUnit};
pub use clock::SessionClock;
pub use gap::Gap;
pub use indicator::{IndicatorCarry, IndicatorKey, IndicatorState, IndicatorValue};
pub use interval_data::{InsertMode, IntervalData};
pub use repository::BarRepository;
pub use store::SessionData;
pub use symbol_session::{AddedBy, SessionMetrics, SymbolSessionData};
