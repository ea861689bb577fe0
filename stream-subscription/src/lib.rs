#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    clippy::unused_self,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! # Stream-Subscription
//! Per-edge synchronisation primitive implementing the session engine's "ready chain":
//! Coordinator -> Processor -> AnalysisEngine -> Strategies, and the gate back from each of
//! those to the Coordinator.
//!
//! A [`StreamSubscription`] has one of three modes, selected once at construction time
//! according to the session's execution mode (see [`SubscriptionMode`]):
//! * [`SubscriptionMode::Live`] - always ready, a no-op gate.
//! * [`SubscriptionMode::ClockDriven`] - waits up to a timeout, counting overruns on expiry.
//! * [`SubscriptionMode::DataDriven`] - waits indefinitely for an explicit signal.

pub mod error;

use std::{
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
    time::Duration,
};
use tokio::sync::Notify;
use tracing::{debug, warn};

/// Selects how a [`StreamSubscription`] resolves `wait_until_ready`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SubscriptionMode {
    /// No-op gate: `wait_until_ready` always returns `true` immediately.
    Live,
    /// Waits up to the supplied (or default) timeout; increments `overrun_count` on expiry.
    ClockDriven,
    /// Waits indefinitely until `signal_ready` is called; the `timeout` argument is ignored.
    DataDriven,
}

/// Default wait budget for [`SubscriptionMode::ClockDriven`] subscriptions when the caller
/// doesn't supply an explicit timeout.
pub const DEFAULT_CLOCK_DRIVEN_TIMEOUT: Duration = Duration::from_secs(1);

/// A single ready-gate edge between two workers in the pipeline.
///
/// `signal_ready` is one-shot: the gate stays "ready" until [`StreamSubscription::reset`] is
/// called. Skipping `reset` between cycles does not panic - it silently lets the next
/// `wait_until_ready` observe a stale "ready" state from the previous tick, which is how a
/// missed reset in clock-driven mode surfaces as an overrun one tick later rather than
/// immediately.
#[derive(Debug)]
pub struct StreamSubscription {
    mode: SubscriptionMode,
    ready: AtomicBool,
    notify: Notify,
    overrun_count: AtomicU64,
    default_timeout: Duration,
}

impl StreamSubscription {
    pub fn new(mode: SubscriptionMode) -> Self {
        Self::with_timeout(mode, DEFAULT_CLOCK_DRIVEN_TIMEOUT)
    }

    pub fn with_timeout(mode: SubscriptionMode, default_timeout: Duration) -> Self {
        Self {
            mode,
            ready: AtomicBool::new(false),
            notify: Notify::new(),
            overrun_count: AtomicU64::new(0),
            default_timeout,
        }
    }

    pub fn mode(&self) -> SubscriptionMode {
        self.mode
    }

    /// Wait until this edge's downstream has signalled ready for the current tick.
    ///
    /// * `Live` returns `true` immediately.
    /// * `ClockDriven` waits up to `timeout` (or the configured default); on expiry it
    ///   increments `overrun_count` and returns `false`.
    /// * `DataDriven` ignores `timeout` and waits indefinitely.
    pub async fn wait_until_ready(&self, timeout: Option<Duration>) -> bool {
        match self.mode {
            SubscriptionMode::Live => true,
            SubscriptionMode::ClockDriven => self.wait_clock_driven(timeout).await,
            SubscriptionMode::DataDriven => {
                while !self.ready.load(Ordering::Acquire) {
                    self.notify.notified().await;
                }
                true
            }
        }
    }

    async fn wait_clock_driven(&self, timeout: Option<Duration>) -> bool {
        let budget = timeout.unwrap_or(self.default_timeout);
        let deadline = tokio::time::Instant::now() + budget;

        loop {
            if self.ready.load(Ordering::Acquire) {
                return true;
            }

            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                let total = self.overrun_count.fetch_add(1, Ordering::AcqRel) + 1;
                warn!(overrun_count = total, "StreamSubscription overran its deadline");
                return false;
            }

            // A racing notify between the flag check and this wait is caught on the next
            // loop iteration's flag re-check, so a timed-out wait here just means "no signal
            // yet" rather than a correctness hazard.
            let _ = tokio::time::timeout(remaining, self.notify.notified()).await;
        }
    }

    /// Signal that this edge's downstream has finished its work for the current tick.
    ///
    /// Idempotent within a cycle; callers in a `finally`/`Drop`-style cleanup path should
    /// still call this even on error so the upstream `wait_until_ready` never deadlocks.
    pub fn signal_ready(&self) {
        self.ready.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    /// Clear the ready flag ahead of the next tick. Must be called once per cycle before the
    /// next `wait_until_ready`, or the gate will observe the previous tick's signal as if it
    /// were fresh.
    pub fn reset(&self) {
        debug!("resetting StreamSubscription ready gate");
        self.ready.store(false, Ordering::Release);
    }

    /// Total number of times this subscription has missed its clock-driven deadline.
    pub fn overrun_count(&self) -> u64 {
        self.overrun_count.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, time::Duration};

    #[tokio::test]
    async fn live_mode_is_always_ready() {
        let sub = StreamSubscription::new(SubscriptionMode::Live);
        assert!(sub.wait_until_ready(Some(Duration::from_millis(1))).await);
    }

    #[tokio::test]
    async fn clock_driven_overruns_on_timeout() {
        let sub = StreamSubscription::new(SubscriptionMode::ClockDriven);
        let ready = sub
            .wait_until_ready(Some(Duration::from_millis(20)))
            .await;
        assert!(!ready);
        assert_eq!(sub.overrun_count(), 1);
    }

    #[tokio::test]
    async fn clock_driven_succeeds_when_signalled_in_time() {
        let sub = Arc::new(StreamSubscription::new(SubscriptionMode::ClockDriven));
        let signaller = sub.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            signaller.signal_ready();
        });

        let ready = sub
            .wait_until_ready(Some(Duration::from_millis(200)))
            .await;
        assert!(ready);
        assert_eq!(sub.overrun_count(), 0);
    }

    #[tokio::test]
    async fn data_driven_waits_indefinitely_until_signalled() {
        let sub = Arc::new(StreamSubscription::new(SubscriptionMode::DataDriven));
        let signaller = sub.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            signaller.signal_ready();
        });

        let ready = sub.wait_until_ready(None).await;
        assert!(ready);
    }

    #[tokio::test]
    async fn reset_clears_ready_for_the_next_cycle() {
        let sub = StreamSubscription::new(SubscriptionMode::ClockDriven);
        sub.signal_ready();
        assert!(sub.wait_until_ready(Some(Duration::from_millis(10))).await);

        sub.reset();
        let ready = sub
            .wait_until_ready(Some(Duration::from_millis(10)))
            .await;
        assert!(!ready);
        assert_eq!(sub.overrun_count(), 1);
    }

    #[tokio::test]
    async fn missing_reset_lets_stale_ready_satisfy_next_cycle() {
        let sub = StreamSubscription::new(SubscriptionMode::ClockDriven);
        sub.signal_ready();
        assert!(sub.wait_until_ready(Some(Duration::from_millis(10))).await);

        // No reset() here: the next wait observes the stale signal from last cycle.
        let ready = sub
            .wait_until_ready(Some(Duration::from_millis(10)))
            .await;
        assert!(ready);
        assert_eq!(sub.overrun_count(), 0);
    }
}
