use crate::context::StrategyContext;
use session_data::{Bar, IndicatorKey, IndicatorValue};
use session_instrument::{Interval, Symbol};

/// A continuous, event-driven consumer of bar/indicator notifications.
///
/// Each `Strategy` runs on its own dedicated thread (see
/// [`crate::strategy_manager::StrategyManager`]), so implementations must be `Send + Sync`.
/// Object-safe by construction: every method takes and returns concrete, owned/borrowed types,
/// never `impl Trait`, so a `Box<dyn Strategy>` can be built from any implementor.
pub trait Strategy: Send + Sync {
    /// A short, stable identifier used in logs and metrics.
    fn name(&self) -> &str;

    /// The `(symbol, interval)` pairs this strategy wants notified on. Consulted once when the
    /// routing table is built and again whenever a symbol is added mid-session.
    fn get_subscriptions(&self) -> Vec<(Symbol, Interval)>;

    /// Called once before the strategy starts receiving notifications. Returning `false` aborts
    /// startup for the whole strategy manager.
    fn setup(&self, ctx: &StrategyContext) -> bool;

    /// Called once the strategy's thread has stopped accepting new notifications. Must be
    /// idempotent.
    fn teardown(&self, ctx: &StrategyContext);

    /// A new bar (or batch of newly-settled derived bars) landed on a subscribed
    /// `(symbol, interval)`.
    fn on_bar(&self, ctx: &StrategyContext, symbol: &Symbol, interval: &Interval, bars: &[Bar]);

    /// An indicator's value changed on a subscribed `(symbol, interval)`.
    fn on_indicator(&self, ctx: &StrategyContext, symbol: &Symbol, key: &IndicatorKey, value: &IndicatorValue);

    /// A scanner (or config) added a symbol mid-session. Dynamic-universe strategies use this to
    /// extend their own subscription set; the manager rebuilds its routing table afterward.
    fn on_symbol_added(&self, ctx: &StrategyContext, symbol: &Symbol);
}
