use crate::{context::StrategyContext, error::AnalysisError, strategy::Strategy};
use fnv::FnvHashMap;
use session_instrument::{Interval, Symbol};
use session_integration::{
    channel::{ChannelTxDroppable, Tx, UnboundedRx, UnboundedTx},
    notification::{ProcessorNotification, ProcessorNotificationKind},
};
use std::{sync::Arc, time::Duration};
use stream_subscription::{StreamSubscription, SubscriptionMode};
use tracing::{info, warn};

/// Error carried by a strategy's dedicated notification channel.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DispatchError {
    #[error("strategy notification channel closed")]
    Closed,
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for DispatchError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        DispatchError::Closed
    }
}

struct StrategyHandle {
    strategy: Arc<dyn Strategy>,
    tx: ChannelTxDroppable<UnboundedTx<ProcessorNotification, DispatchError>>,
    subscription: Arc<StreamSubscription>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl std::fmt::Debug for StrategyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyHandle").field("strategy", &self.strategy.name()).finish()
    }
}

/// Keeps a `(symbol, interval) -> [StrategyThread]` routing table and owns one dedicated OS
/// thread per registered strategy. On a notification it pushes an event to every subscriber's
/// queue, then - in data-driven mode - blocks until all of them signal ready (no timeout); in
/// clock-driven/live mode it waits up to a short timeout and lets a slow strategy simply miss
/// that tick, incrementing its `overrun_count`.
#[derive(Debug)]
pub struct StrategyManager {
    handles: Vec<StrategyHandle>,
    routing: FnvHashMap<(Symbol, Interval), Vec<usize>>,
    mode: SubscriptionMode,
    wait_timeout: Duration,
}

impl StrategyManager {
    pub fn new(mode: SubscriptionMode) -> Self {
        Self {
            handles: Vec::new(),
            routing: FnvHashMap::default(),
            mode,
            wait_timeout: Duration::from_millis(100),
        }
    }

    /// Register a strategy, run its `setup`, and spawn its dedicated thread. Call
    /// [`Self::rebuild_routing`] once after registering every strategy.
    pub fn register(&mut self, strategy: Arc<dyn Strategy>, ctx: StrategyContext) -> Result<(), AnalysisError> {
        let name = strategy.name().to_string();
        if !strategy.setup(&ctx) {
            return Err(AnalysisError::StrategySetupFailed(name.clone()));
        }

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let subscription = Arc::new(StreamSubscription::new(self.mode));

        let thread_strategy = strategy.clone();
        let thread_subscription = subscription.clone();
        let mut notifications_in = UnboundedRx::new(rx);

        let join_handle = std::thread::Builder::new()
            .name(format!("strategy-{name}"))
            .spawn(move || {
                info!(strategy = thread_strategy.name(), "strategy thread started");
                while let Some(notification) = notifications_in.blocking_recv() {
                    dispatch(&thread_strategy, &ctx, &notification);
                    thread_subscription.signal_ready();
                }
                info!(strategy = thread_strategy.name(), "strategy thread exited");
            })
            .expect("failed to spawn strategy thread");

        self.handles.push(StrategyHandle {
            strategy,
            tx: ChannelTxDroppable::new(UnboundedTx::new(tx)),
            subscription,
            join_handle: Some(join_handle),
        });
        Ok(())
    }

    /// Rebuild the `(symbol, interval) -> [handle index]` routing table. Call after registering
    /// all strategies, and again after any [`Self::notify_symbol_added`] (a dynamic-universe
    /// strategy may have extended its own subscriptions).
    pub fn rebuild_routing(&mut self) {
        self.routing.clear();
        for (index, handle) in self.handles.iter().enumerate() {
            for key in handle.strategy.get_subscriptions() {
                self.routing.entry(key).or_default().push(index);
            }
        }
        info!(subscriptions = self.routing.len(), "rebuilt strategy routing table");
    }

    /// Dispatch one notification to every subscribed strategy and wait for them to signal
    /// ready: indefinitely in data-driven mode, up to a short timeout otherwise.
    pub async fn dispatch_and_wait(&self, notification: ProcessorNotification) {
        let key = (notification.symbol.clone(), notification.interval.clone());
        let Some(indices) = self.routing.get(&key).cloned() else {
            return;
        };

        for &index in &indices {
            self.handles[index].tx.send(notification.clone());
        }

        let timeout = match self.mode {
            SubscriptionMode::DataDriven => None,
            _ => Some(self.wait_timeout),
        };

        for &index in &indices {
            let handle = &self.handles[index];
            if !handle.subscription.wait_until_ready(timeout).await {
                warn!(strategy = handle.strategy.name(), "strategy missed its tick (overrun)");
            }
            handle.subscription.reset();
        }
    }

    /// Notify every strategy of a mid-session symbol addition and rebuild the routing table.
    pub fn notify_symbol_added(&mut self, ctx: &StrategyContext, symbol: &Symbol) {
        for handle in &self.handles {
            handle.strategy.on_symbol_added(ctx, symbol);
        }
        self.rebuild_routing();
    }

    /// Stop every strategy thread (disable its sender, join, call teardown). Idempotent.
    pub fn shutdown(&mut self, ctx: &StrategyContext) {
        for handle in &mut self.handles {
            handle.tx.disable();
        }
        for handle in &mut self.handles {
            if let Some(join_handle) = handle.join_handle.take() {
                let _ = join_handle.join();
            }
            handle.strategy.teardown(ctx);
        }
    }

    pub fn overrun_counts(&self) -> Vec<(String, u64)> {
        self.handles
            .iter()
            .map(|handle| (handle.strategy.name().to_string(), handle.subscription.overrun_count()))
            .collect()
    }
}

fn dispatch(strategy: &Arc<dyn Strategy>, ctx: &StrategyContext, notification: &ProcessorNotification) {
    match &notification.kind {
        ProcessorNotificationKind::Bars => {
            let bars = ctx
                .session_data
                .get_symbol_data(&notification.symbol, |data| {
                    data.bars.get(&notification.interval).map(|id| id.bars().to_vec())
                })
                .flatten()
                .unwrap_or_default();
            strategy.on_bar(ctx, &notification.symbol, &notification.interval, &bars);
        }
        ProcessorNotificationKind::Indicator { key } => {
            let Some((indicator_key, value)) = ctx
                .session_data
                .get_symbol_data(&notification.symbol, |data| {
                    data.indicators
                        .iter()
                        .find(|(k, _)| k.to_string() == *key)
                        .map(|(k, state)| (k.clone(), state.value.clone()))
                })
                .flatten()
            else {
                return;
            };
            let Some(value) = value else { return };
            strategy.on_indicator(ctx, &notification.symbol, &indicator_key, &value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use session_data::{Bar, IndicatorKey, IndicatorValue, SessionData};
    use session_data::testing::FixedClock;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct RecordingStrategy {
        subscriptions: Vec<(Symbol, Interval)>,
        bars_seen: Mutex<Vec<(Symbol, Interval, usize)>>,
        setup_result: bool,
        symbols_added: Mutex<Vec<Symbol>>,
    }

    impl Strategy for RecordingStrategy {
        fn name(&self) -> &str {
            "recording"
        }

        fn get_subscriptions(&self) -> Vec<(Symbol, Interval)> {
            self.subscriptions.clone()
        }

        fn setup(&self, _ctx: &StrategyContext) -> bool {
            self.setup_result
        }

        fn teardown(&self, _ctx: &StrategyContext) {}

        fn on_bar(&self, _ctx: &StrategyContext, symbol: &Symbol, interval: &Interval, bars: &[Bar]) {
            self.bars_seen.lock().unwrap().push((symbol.clone(), interval.clone(), bars.len()));
        }

        fn on_indicator(&self, _ctx: &StrategyContext, _symbol: &Symbol, _key: &IndicatorKey, _value: &IndicatorValue) {}

        fn on_symbol_added(&self, _ctx: &StrategyContext, symbol: &Symbol) {
            self.symbols_added.lock().unwrap().push(symbol.clone());
        }
    }

    fn context() -> StrategyContext {
        StrategyContext::new(
            Arc::new(SessionData::new()),
            Arc::new(FixedClock::new(Utc::now())),
            SubscriptionMode::Live,
        )
    }

    #[tokio::test]
    async fn routes_a_notification_only_to_subscribed_strategies() {
        let symbol = Symbol::new("AAPL");
        let interval = Interval::new("1m");
        let ctx = context();
        ctx.session_data.register_symbol_data(session_data::SymbolSessionData::new(
            symbol.clone(),
            interval.clone(),
            session_data::AddedBy::Config,
            false,
            true,
            Utc::now(),
        ));

        let strategy = Arc::new(RecordingStrategy {
            subscriptions: vec![(symbol.clone(), interval.clone())],
            setup_result: true,
            ..Default::default()
        });

        let mut manager = StrategyManager::new(SubscriptionMode::Live);
        manager.register(strategy.clone(), ctx.clone()).unwrap();
        manager.rebuild_routing();

        manager
            .dispatch_and_wait(ProcessorNotification::bars(symbol.clone(), interval.clone()))
            .await;
        manager
            .dispatch_and_wait(ProcessorNotification::bars(Symbol::new("MSFT"), interval.clone()))
            .await;

        manager.shutdown(&ctx);

        let seen = strategy.bars_seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, symbol);
    }

    #[tokio::test]
    async fn setup_failure_is_reported() {
        let ctx = context();
        let strategy = Arc::new(RecordingStrategy { setup_result: false, ..Default::default() });
        let mut manager = StrategyManager::new(SubscriptionMode::Live);
        let result = manager.register(strategy, ctx);
        assert!(matches!(result, Err(AnalysisError::StrategySetupFailed(_))));
    }

    #[tokio::test]
    async fn notify_symbol_added_reaches_every_strategy() {
        let ctx = context();
        let strategy = Arc::new(RecordingStrategy { setup_result: true, ..Default::default() });
        let mut manager = StrategyManager::new(SubscriptionMode::Live);
        manager.register(strategy.clone(), ctx.clone()).unwrap();

        manager.notify_symbol_added(&ctx, &Symbol::new("TSLA"));
        manager.shutdown(&ctx);

        assert_eq!(strategy.symbols_added.lock().unwrap().as_slice(), &[Symbol::new("TSLA")]);
    }
}
