use crate::{
    config::DataProcessorConfig,
    derived::compute_derived_bars,
    indicators::refresh_indicators,
};
use chrono::{DateTime, Utc};
use indicator_catalog::IndicatorCatalog;
use parking_lot::RwLock;
use session_data::{InsertMode, SessionData};
use session_instrument::{Interval, Symbol};
use session_integration::{
    channel::{ChannelTxDroppable, UnboundedRx, UnboundedTx},
    notification::{BarNotification, ProcessorNotification},
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use stream_subscription::{StreamSubscription, SubscriptionMode};
use tracing::{info, trace, warn};

use crate::error::NotifyError;

type DownstreamTx = ChannelTxDroppable<UnboundedTx<ProcessorNotification, NotifyError>>;

/// Event-driven worker: on every `(symbol, interval, timestamp)` notification from the
/// Coordinator it synthesizes any now-satisfied derived bars, refreshes real-time indicators,
/// forwards lightweight notifications to the AnalysisEngine/StrategyManager, and signals ready
/// back to the Coordinator.
///
/// Runs on its own OS thread via [`DataProcessor::run`]; the one tokio runtime it owns is used
/// only to await the downstream `StreamSubscription` in data-driven mode.
#[derive(Debug)]
pub struct DataProcessor {
    session_data: Arc<SessionData>,
    catalog: Arc<IndicatorCatalog>,
    config: DataProcessorConfig,
    base_interval: Interval,
    notifications_in: UnboundedRx<BarNotification>,
    downstream: Vec<DownstreamTx>,
    coordinator_subscription: Arc<StreamSubscription>,
    analysis_subscription: Option<Arc<StreamSubscription>>,
    mode: SubscriptionMode,
    notifications_active: Arc<AtomicBool>,
    session_start: Arc<RwLock<Option<DateTime<Utc>>>>,
    runtime: tokio::runtime::Runtime,
}

impl DataProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_data: Arc<SessionData>,
        catalog: Arc<IndicatorCatalog>,
        config: DataProcessorConfig,
        base_interval: Interval,
        notifications_in: UnboundedRx<BarNotification>,
        coordinator_subscription: Arc<StreamSubscription>,
        analysis_subscription: Option<Arc<StreamSubscription>>,
        mode: SubscriptionMode,
    ) -> Self {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("failed to build DataProcessor's dedicated runtime");

        info!(?mode, "DataProcessor initialized");

        Self {
            session_data,
            catalog,
            config,
            base_interval,
            notifications_in,
            downstream: Vec::new(),
            coordinator_subscription,
            analysis_subscription,
            mode,
            notifications_active: Arc::new(AtomicBool::new(true)),
            session_start: Arc::new(RwLock::new(None)),
            runtime,
        }
    }

    /// Register a downstream consumer (AnalysisEngine, StrategyManager) of processor
    /// notifications.
    pub fn add_downstream(&mut self, tx: UnboundedTx<ProcessorNotification, NotifyError>) {
        self.downstream.push(ChannelTxDroppable::new(tx));
    }

    /// Pause outgoing notifications during a dynamic-symbol catchup: the processor keeps
    /// computing, but downstream never observes the intermediate state. Notifications raised
    /// while paused are dropped, not queued.
    pub fn pause_notifications(&self) {
        info!("pausing downstream notifications (catchup mode)");
        self.notifications_active.store(false, Ordering::Release);
    }

    pub fn resume_notifications(&self) {
        info!("resuming downstream notifications");
        self.notifications_active.store(true, Ordering::Release);
    }

    /// Shared handle to the pause/resume gate, clonable before `self` is moved into [`Self::run`]
    /// on its own thread - this is how the Coordinator pauses/resumes a `DataProcessor` it no
    /// longer owns.
    pub fn notifications_gate(&self) -> Arc<AtomicBool> {
        self.notifications_active.clone()
    }

    /// Called at the start of a new session, before the session activates.
    pub fn setup(&self, session_start: DateTime<Utc>) {
        *self.session_start.write() = Some(session_start);
    }

    /// Reset to initial state ahead of a new session. Idempotent.
    pub fn teardown(&self) {
        *self.session_start.write() = None;
    }

    /// Main event-driven loop. Returns once the upstream notification channel closes.
    pub fn run(mut self) {
        info!("DataProcessor loop started");

        while let Some(notification) = self.notifications_in.blocking_recv() {
            self.process(notification);
        }

        info!("DataProcessor loop exited: upstream channel closed");
    }

    fn process(&mut self, notification: BarNotification) {
        let BarNotification { symbol, interval, .. } = notification;
        trace!(%symbol, interval = interval.as_str(), "processing notification");

        let mut changed_intervals = vec![interval.clone()];
        if interval == self.base_interval {
            changed_intervals.extend(self.generate_derived_bars(&symbol));
        }

        for changed in &changed_intervals {
            let updated_keys =
                refresh_indicators(&self.session_data, &self.catalog, &symbol, changed, &self.config.indicators);
            for key in updated_keys {
                self.notify(ProcessorNotification::indicator(symbol.clone(), changed.clone(), key.to_string()));
            }
        }

        for changed in &changed_intervals {
            self.notify(ProcessorNotification::bars(symbol.clone(), changed.clone()));
        }

        if self.mode == SubscriptionMode::DataDriven {
            if let Some(analysis) = self.analysis_subscription.clone() {
                self.runtime.block_on(analysis.wait_until_ready(None));
                analysis.reset();
            }
        }

        self.coordinator_subscription.signal_ready();
    }

    fn generate_derived_bars(&self, symbol: &Symbol) -> Vec<Interval> {
        if self.config.derived_intervals.is_empty() {
            return Vec::new();
        }

        let Some(Some(base_bars)) = self
            .session_data
            .get_symbol_data(symbol, |data| data.bars.get(&self.base_interval).map(|id| id.bars().to_vec()))
        else {
            return Vec::new();
        };

        let Ok(base_info) = self.base_interval.parse() else {
            warn!(base_interval = self.base_interval.as_str(), "unparseable base interval, skipping derived bars");
            return Vec::new();
        };

        let session_start = (*self.session_start.read()).unwrap_or_else(|| base_bars[0].timestamp);

        let mut specs = self.config.derived_intervals.clone();
        specs.sort_by_key(|spec| spec.multiple);

        let mut updated = Vec::new();
        for spec in &specs {
            if (base_bars.len() as u32) < spec.multiple {
                continue;
            }

            let derived = compute_derived_bars(&base_bars, base_info.seconds(), spec.multiple, session_start);
            if derived.is_empty() {
                continue;
            }

            let inserted = self.session_data.add_bars_batch(symbol, &spec.interval, derived, InsertMode::Append);
            if inserted > 0 {
                updated.push(spec.interval.clone());
            }
        }

        updated
    }

    fn notify(&mut self, notification: ProcessorNotification) {
        if !self.notifications_active.load(Ordering::Acquire) {
            trace!(?notification, "dropping notification: downstream paused for catchup");
            return;
        }

        for tx in &mut self.downstream {
            tx.send(notification.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DerivedIntervalSpec;
    use chrono::TimeZone;
    use indicator_catalog::IndicatorConfig;
    use rust_decimal_macros::dec;
    use session_data::{AddedBy, Bar, SymbolSessionData};

    fn bar(minute: u32, close: rust_decimal::Decimal) -> Bar {
        Bar::new(
            Utc.with_ymd_and_hms(2025, 11, 4, 9, minute, 0).unwrap(),
            close,
            close + dec!(1),
            close - dec!(1),
            close,
            1_000,
        )
        .unwrap()
    }

    fn setup_store(symbol: &Symbol, base: &Interval) -> Arc<SessionData> {
        let store = Arc::new(SessionData::new());
        store.register_symbol_data(SymbolSessionData::new(
            symbol.clone(),
            base.clone(),
            AddedBy::Config,
            false,
            true,
            Utc::now(),
        ));
        store.with_symbol_data_mut(symbol, |data| {
            data.ensure_interval(Interval::new("5m"), Some(base.clone()));
        });
        store
    }

    #[test]
    fn derives_bars_and_notifies_downstream_on_base_interval_notification() {
        let symbol = Symbol::new("AAPL");
        let base = Interval::new("1m");
        let store = setup_store(&symbol, &base);

        for m in 0..5 {
            store.append_bar(&symbol, &base, bar(30 + m, dec!(100) + rust_decimal::Decimal::from(m)));
        }

        let (in_tx, in_rx) = tokio::sync::mpsc::unbounded_channel();
        let (out_tx, mut out_rx) = tokio::sync::mpsc::unbounded_channel();

        let config = DataProcessorConfig::new(
            vec![DerivedIntervalSpec::new(Interval::new("5m"), 5)],
            vec![IndicatorConfig::new("sma", 3, Interval::new("1m"))],
        );

        let coordinator_sub = Arc::new(StreamSubscription::new(SubscriptionMode::Live));

        let mut processor = DataProcessor::new(
            store.clone(),
            Arc::new(IndicatorCatalog::new()),
            config,
            base.clone(),
            UnboundedRx::new(in_rx),
            coordinator_sub,
            None,
            SubscriptionMode::Live,
        );
        processor.add_downstream(UnboundedTx::new(out_tx));

        in_tx
            .send(BarNotification::new(symbol.clone(), base.clone(), bar(34, dec!(104)).timestamp))
            .unwrap();
        drop(in_tx);

        let handle = std::thread::spawn(move || processor.run());
        handle.join().unwrap();

        let derived_len = store
            .get_symbol_data(&symbol, |data| data.bars[&Interval::new("5m")].bars().len())
            .unwrap();
        assert_eq!(derived_len, 1);

        let mut saw_bars_notification = false;
        while let Ok(notification) = out_rx.try_recv() {
            if notification.interval == Interval::new("5m") {
                saw_bars_notification = true;
            }
        }
        assert!(saw_bars_notification);
    }

    #[test]
    fn pause_notifications_drops_rather_than_queues() {
        let symbol = Symbol::new("AAPL");
        let base = Interval::new("1m");
        let store = setup_store(&symbol, &base);
        store.append_bar(&symbol, &base, bar(30, dec!(100)));

        let (_in_tx, in_rx) = tokio::sync::mpsc::unbounded_channel();
        let (out_tx, mut out_rx) = tokio::sync::mpsc::unbounded_channel();

        let coordinator_sub = Arc::new(StreamSubscription::new(SubscriptionMode::Live));
        let mut processor = DataProcessor::new(
            store.clone(),
            Arc::new(IndicatorCatalog::new()),
            DataProcessorConfig::default(),
            base.clone(),
            UnboundedRx::new(in_rx),
            coordinator_sub,
            None,
            SubscriptionMode::Live,
        );
        processor.add_downstream(UnboundedTx::new(out_tx));
        processor.pause_notifications();

        processor.notify(ProcessorNotification::bars(symbol, base));
        assert!(out_rx.try_recv().is_err());
    }
}
