use chrono::NaiveDate;
use serde::Serialize;
use session_coordinator::SystemState;
use session_instrument::Symbol;

/// Per-symbol snapshot of how far along the dynamic-add protocol a symbol is, for the system
/// status view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolStatus {
    pub symbol: Symbol,
    pub meets_session_config_requirements: bool,
    pub auto_provisioned: bool,
    pub upgraded_from_adhoc: bool,
}

/// A point-in-time read of the running system, returned by `SystemManager::get_state`. Mirrors
/// the original CLI status view: run state, active trading date, and per-symbol/per-worker
/// liveness, all read-only.
#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub state: SystemState,
    pub active_trading_date: Option<NaiveDate>,
    pub symbols: Vec<SymbolStatus>,
    pub strategy_overrun_counts: Vec<(String, u64)>,
}

/// Lightweight, in-memory counters exposed read-only from `SystemManager`. No external metrics
/// backend is wired in - that integration point is out of scope; this is just what the process
/// itself can report about its own run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionMetricsSnapshot {
    pub bars_processed: u64,
    pub notifications_dropped_during_catchup: u64,
    pub processor_overrun_count: u64,
    pub strategy_overrun_counts: Vec<(String, u64)>,
}
