use crate::strategy_manager::StrategyManager;
use session_integration::{channel::UnboundedRx, notification::ProcessorNotification};
use std::sync::Arc;
use stream_subscription::StreamSubscription;
use tracing::info;

/// Dispatch-loop worker: receives [`ProcessorNotification`]s from the DataProcessor, routes
/// them through [`StrategyManager`], waits for every subscribed strategy to signal ready, then
/// signals its own `coordinator_subscription`.
///
/// Runs on its own OS thread via [`AnalysisEngine::run`]; owns one dedicated tokio runtime used
/// only to await `StrategyManager::dispatch_and_wait` (which in turn awaits the per-strategy
/// `StreamSubscription`s). `ScannerManager` deliberately lives outside this worker: scans are
/// invoked synchronously from the session coordinator's own thread, never from here.
pub struct AnalysisEngine {
    notifications_in: UnboundedRx<ProcessorNotification>,
    strategy_manager: StrategyManager,
    coordinator_subscription: Arc<StreamSubscription>,
    runtime: tokio::runtime::Runtime,
}

impl std::fmt::Debug for AnalysisEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisEngine").field("strategy_manager", &self.strategy_manager).finish()
    }
}

impl AnalysisEngine {
    pub fn new(
        notifications_in: UnboundedRx<ProcessorNotification>,
        strategy_manager: StrategyManager,
        coordinator_subscription: Arc<StreamSubscription>,
    ) -> Self {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("failed to build AnalysisEngine's dedicated runtime");

        Self {
            notifications_in,
            strategy_manager,
            coordinator_subscription,
            runtime,
        }
    }

    pub fn strategy_manager_mut(&mut self) -> &mut StrategyManager {
        &mut self.strategy_manager
    }

    /// Main event-driven loop. Returns once the upstream notification channel closes.
    pub fn run(mut self) {
        info!("AnalysisEngine loop started");

        while let Some(notification) = self.notifications_in.blocking_recv() {
            let dispatch_future = self.strategy_manager.dispatch_and_wait(notification);
            self.runtime.block_on(dispatch_future);
            self.coordinator_subscription.signal_ready();
        }

        info!("AnalysisEngine loop exited: upstream channel closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{context::StrategyContext, strategy::Strategy};
    use chrono::Utc;
    use session_data::testing::FixedClock;
    use session_data::{Bar, IndicatorKey, IndicatorValue, SessionData};
    use session_instrument::{Interval, Symbol};
    use session_integration::notification::ProcessorNotification;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use stream_subscription::SubscriptionMode;

    #[derive(Debug, Default)]
    struct CountingStrategy {
        subscriptions: Vec<(Symbol, Interval)>,
        bars_seen: AtomicUsize,
    }

    impl Strategy for CountingStrategy {
        fn name(&self) -> &str {
            "counting"
        }

        fn get_subscriptions(&self) -> Vec<(Symbol, Interval)> {
            self.subscriptions.clone()
        }

        fn setup(&self, _ctx: &StrategyContext) -> bool {
            true
        }

        fn teardown(&self, _ctx: &StrategyContext) {}

        fn on_bar(&self, _ctx: &StrategyContext, _symbol: &Symbol, _interval: &Interval, _bars: &[Bar]) {
            self.bars_seen.fetch_add(1, Ordering::SeqCst);
        }

        fn on_indicator(&self, _ctx: &StrategyContext, _symbol: &Symbol, _key: &IndicatorKey, _value: &IndicatorValue) {}

        fn on_symbol_added(&self, _ctx: &StrategyContext, _symbol: &Symbol) {}
    }

    #[test]
    fn signals_the_coordinator_subscription_after_dispatching() {
        let symbol = Symbol::new("AAPL");
        let interval = Interval::new("1m");

        let ctx = StrategyContext::new(
            Arc::new(SessionData::new()),
            Arc::new(FixedClock::new(Utc::now())),
            SubscriptionMode::DataDriven,
        );
        ctx.session_data.register_symbol_data(session_data::SymbolSessionData::new(
            symbol.clone(),
            interval.clone(),
            session_data::AddedBy::Config,
            false,
            true,
            Utc::now(),
        ));

        let strategy = std::sync::Arc::new(CountingStrategy {
            subscriptions: vec![(symbol.clone(), interval.clone())],
            ..Default::default()
        });

        let mut strategy_manager = StrategyManager::new(SubscriptionMode::DataDriven);
        strategy_manager.register(strategy.clone(), ctx.clone()).unwrap();
        strategy_manager.rebuild_routing();

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let coordinator_subscription = Arc::new(StreamSubscription::new(SubscriptionMode::Live));
        let engine = AnalysisEngine::new(UnboundedRx::new(rx), strategy_manager, coordinator_subscription.clone());

        tx.send(ProcessorNotification::bars(symbol, interval)).unwrap();
        drop(tx);

        let handle = std::thread::spawn(move || engine.run());
        handle.join().unwrap();

        assert_eq!(strategy.bars_seen.load(Ordering::SeqCst), 1);
    }
}
