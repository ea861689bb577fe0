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
#![allow(clippy::type_complexity)]

//! # Session-Integration
//! Low-level framework for composing the channels and notification tuples that connect the
//! session engine's workers.
//!
//! Every cross-thread message in the engine is a lightweight, `Copy`-able tuple, never a
//! borrowed or cloned slice of [`SessionData`](https://docs.rs/session-data) - threads read
//! the shared store by reference and only pass around coordinates into it.

use serde::{Deserialize, Serialize};

/// Channel abstractions (`Tx`/`Rx`) used to wire workers together.
pub mod channel;

/// Shutdown marker types and the graceful-shutdown trait contract.
pub mod shutdown;

/// Notification tuples exchanged between the Coordinator, Processor, QualityManager and
/// AnalysisEngine.
pub mod notification;

/// Marker trait for events that terminate a worker's processing loop.
pub trait Terminal {
    fn is_terminal(&self) -> bool;
}

/// A value paired with the [`chrono::DateTime<Utc>`] it was observed at.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub struct Timed<T> {
    pub value: T,
    pub time: chrono::DateTime<chrono::Utc>,
}

impl<T> Timed<T> {
    pub fn new(value: T, time: chrono::DateTime<chrono::Utc>) -> Self {
        Self { value, time }
    }
}
