use crate::{
    config::{SessionConfig, SessionMode},
    error::EngineError,
    status::{SessionMetricsSnapshot, SymbolStatus, SystemStatus},
};
use analysis_engine::{
    context::StrategyContext, scanner::Scanner, scanner_manager::ScannerManager, strategy::Strategy,
    strategy_manager::StrategyManager, AnalysisEngine,
};
use chrono::NaiveDate;
use data_processor::{config::DerivedIntervalSpec, DataProcessor, DataProcessorConfig};
use data_quality::{DataQualityConfig, DataQualityManager};
use indicator_catalog::IndicatorCatalog;
use session_coordinator::{
    clock::{LiveClock, SimulatedClock},
    coordinator::{SessionCoordinator, SessionCoordinatorConfig, SessionCoordinatorHandle, SymbolAddRequest},
    provisioning::{AddRegime, ProvisioningSource},
};
use session_data::{BarRepository, CalendarService, SessionClock, SessionData};
use session_instrument::{ExchangeGroup, Symbol};
use session_integration::{
    channel::{UnboundedRx, UnboundedTx},
    notification::{BarNotification, ProcessorNotification},
};
use std::{path::Path, sync::Arc, thread::JoinHandle};
use stream_subscription::{StreamSubscription, SubscriptionMode};
use tracing::{info, warn};

/// Top-level factory and process handle: loads and validates a [`SessionConfig`], wires every
/// worker with its dependencies, and owns the running session's threads.
///
/// One instance covers one trading day; the single-day scope keeps rollover handling out of
/// this implementation (see `DESIGN.md`) - a long-running deployment would construct a fresh
/// `SystemManager` per session day.
pub struct SystemManager {
    config: SessionConfig,
    session_data: Arc<SessionData>,
    active_trading_date: Option<NaiveDate>,
    coordinator_handle: Option<SessionCoordinatorHandle>,
    coordinator_thread: Option<JoinHandle<Result<(), session_coordinator::CoordinatorError>>>,
    worker_threads: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for SystemManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemManager")
            .field("session_name", &self.config.session_name)
            .field("active_trading_date", &self.active_trading_date)
            .field("running", &self.coordinator_handle.is_some())
            .finish()
    }
}

impl SystemManager {
    /// Load `config_path`, validate it, wire every worker, and start the session for the
    /// resolved trading date. `calendar`/`repository` are external collaborators the caller
    /// owns; `strategies`/`scanners` are matched against the config's declared
    /// `StrategyConfig`/`ScannerConfig` entries by name and registered when enabled.
    pub fn start(
        config_path: &Path,
        calendar: Arc<dyn CalendarService>,
        repository: Option<Arc<dyn BarRepository>>,
        strategies: Vec<Arc<dyn Strategy>>,
        scanners: Vec<Arc<dyn Scanner>>,
    ) -> Result<Self, EngineError> {
        let config = SessionConfig::load(config_path)?;
        config.validate()?;

        let exchange = ExchangeGroup::new(config.exchange_group.clone());
        let live_mode = config.mode == SessionMode::Live;

        let trading_date = match config.mode {
            SessionMode::Live => chrono::Utc::now().date_naive(),
            SessionMode::Backtest => {
                config.backtest_config.as_ref().expect("validate() requires backtest_config in backtest mode").start_date
            }
        };

        let session = calendar.get_trading_session(trading_date, &exchange)?;
        if !session.is_trading_day {
            return Err(EngineError::NonTradingDay(trading_date));
        }
        let session_start = session.open.expect("trading day implies an open timestamp");
        let session_end = session.close.expect("trading day implies a close timestamp");

        let speed_multiplier = if live_mode { 0.0 } else { config.backtest_config.as_ref().expect("validated").speed_multiplier };
        let subscription_mode = if live_mode {
            SubscriptionMode::Live
        } else if speed_multiplier > 0.0 {
            SubscriptionMode::ClockDriven
        } else {
            SubscriptionMode::DataDriven
        };

        info!(session_name = %config.session_name, ?subscription_mode, %trading_date, "starting session");

        let session_data = Arc::new(SessionData::new());

        let (clock, simulated_clock): (Arc<dyn SessionClock>, Option<Arc<SimulatedClock>>) = if live_mode {
            (Arc::new(LiveClock::new()), None)
        } else {
            let simulated = Arc::new(SimulatedClock::new());
            (simulated.clone() as Arc<dyn SessionClock>, Some(simulated))
        };

        let catalog = Arc::new(IndicatorCatalog::new());
        let base_interval = config.base_interval();
        let derived_intervals = config.derived_intervals();

        let derived_specs: Vec<DerivedIntervalSpec> = config
            .session_data_config
            .derived_intervals
            .iter()
            .zip(derived_intervals.iter().cloned())
            .map(|(multiple, interval)| DerivedIntervalSpec::new(interval, *multiple))
            .collect();
        let processor_config = DataProcessorConfig::new(derived_specs, config.session_data_config.indicators.clone());

        let mut quality_config = DataQualityConfig::new(config.session_data_config.gap_filler);
        for raw in &config.session_data_config.symbols {
            quality_config.register_symbol(Symbol::new(raw.clone()), exchange.clone());
        }

        let (processor_tx, processor_rx) = tokio::sync::mpsc::unbounded_channel::<BarNotification>();
        let (quality_tx, quality_rx) = tokio::sync::mpsc::unbounded_channel::<BarNotification>();
        let (analysis_tx, analysis_rx) = tokio::sync::mpsc::unbounded_channel::<ProcessorNotification>();

        let processor_subscription = Arc::new(StreamSubscription::new(subscription_mode));
        let analysis_subscription = Arc::new(StreamSubscription::new(subscription_mode));

        let mut data_processor = DataProcessor::new(
            session_data.clone(),
            catalog.clone(),
            processor_config,
            base_interval.clone(),
            UnboundedRx::new(processor_rx),
            processor_subscription.clone(),
            Some(analysis_subscription.clone()),
            subscription_mode,
        );
        data_processor.add_downstream(UnboundedTx::new(analysis_tx));
        let processor_gate = data_processor.notifications_gate();

        let quality_manager = DataQualityManager::new(
            session_data.clone(),
            calendar.clone(),
            repository.clone(),
            clock.clone(),
            quality_config,
            live_mode,
            UnboundedRx::new(quality_rx),
        );

        let mut strategy_manager = StrategyManager::new(subscription_mode);
        for strategy in strategies {
            let Some(strategy_config) = config.session_data_config.strategies.iter().find(|c| c.name == strategy.name()) else {
                warn!(strategy = strategy.name(), "strategy has no matching SessionConfig entry, skipping");
                continue;
            };
            if !strategy_config.enabled {
                continue;
            }
            let ctx = StrategyContext::new(session_data.clone(), clock.clone(), subscription_mode);
            strategy_manager.register(strategy, ctx)?;
        }
        strategy_manager.rebuild_routing();

        let analysis_engine = AnalysisEngine::new(UnboundedRx::new(analysis_rx), strategy_manager, analysis_subscription.clone());

        let scanner_manager = Arc::new(ScannerManager::new(live_mode));
        for scanner in scanners {
            let Some(scanner_config) = config.session_data_config.scanners.iter().find(|c| c.name == scanner.name()) else {
                warn!(scanner = scanner.name(), "scanner has no matching SessionConfig entry, skipping");
                continue;
            };
            if !scanner_config.enabled {
                continue;
            }
            scanner_manager.register(scanner, scanner_config.pre_session, scanner_config.regular_session.clone());
        }

        let coordinator_config = SessionCoordinatorConfig {
            base_interval,
            derived_intervals,
            exchange,
            historical_days: config.session_data_config.historical.trailing_days,
            adhoc_warmup_days: config.session_data_config.streaming.adhoc_warmup_days,
            speed_multiplier,
            catchup_threshold_seconds: config.session_data_config.streaming.catchup_threshold_seconds,
            live_mode,
        };

        let coordinator = SessionCoordinator::new(
            session_data.clone(),
            clock.clone(),
            simulated_clock,
            coordinator_config,
            repository,
            calendar,
            scanner_manager,
            UnboundedTx::new(processor_tx),
            UnboundedTx::new(quality_tx),
            processor_subscription,
            processor_gate,
            subscription_mode,
        );
        let coordinator_handle = coordinator.handle();

        let symbols: Vec<SymbolAddRequest> = config
            .session_data_config
            .symbols
            .iter()
            .map(|raw| SymbolAddRequest {
                symbol: Symbol::new(raw.clone()),
                source: ProvisioningSource::Config,
                regime: AddRegime::Full { historical_days: config.session_data_config.historical.trailing_days },
                indicator_config: None,
            })
            .collect();

        let processor_thread = std::thread::Builder::new()
            .name("data-processor".to_string())
            .spawn(move || data_processor.run())
            .expect("failed to spawn data-processor thread");
        let quality_thread = std::thread::Builder::new()
            .name("data-quality".to_string())
            .spawn(move || quality_manager.run())
            .expect("failed to spawn data-quality thread");
        let analysis_thread = std::thread::Builder::new()
            .name("analysis-engine".to_string())
            .spawn(move || analysis_engine.run())
            .expect("failed to spawn analysis-engine thread");
        let coordinator_thread = std::thread::Builder::new()
            .name("session-coordinator".to_string())
            .spawn(move || coordinator.run())
            .expect("failed to spawn session-coordinator thread");

        coordinator_handle.start(session_start, session_end, symbols);

        Ok(Self {
            config,
            session_data,
            active_trading_date: Some(trading_date),
            coordinator_handle: Some(coordinator_handle),
            coordinator_thread: Some(coordinator_thread),
            worker_threads: vec![processor_thread, quality_thread, analysis_thread],
        })
    }

    /// Stop the session and join every worker thread. Consumes `self`: once stopped, a fresh
    /// `SystemManager::start` call is the only way to run another session.
    pub fn stop(mut self) -> Result<(), EngineError> {
        if let Some(handle) = self.coordinator_handle.take() {
            handle.stop();
        }

        if let Some(thread) = self.coordinator_thread.take() {
            match thread.join() {
                Ok(result) => result?,
                Err(_) => warn!("session-coordinator thread panicked"),
            }
        }

        for thread in self.worker_threads.drain(..) {
            if thread.join().is_err() {
                warn!("a session worker thread panicked");
            }
        }

        Ok(())
    }

    /// Pause the active session's merge-yield loop without tearing down any workers.
    pub fn pause(&self) {
        if let Some(handle) = &self.coordinator_handle {
            handle.pause();
        }
    }

    /// Resume a paused session.
    pub fn resume(&self) {
        if let Some(handle) = &self.coordinator_handle {
            handle.resume();
        }
    }

    /// Read-only snapshot of the running system: lifecycle state, active trading date, and
    /// per-symbol provisioning status.
    pub fn get_state(&self) -> SystemStatus {
        let state = self.coordinator_handle.as_ref().map(|handle| handle.get_state()).unwrap_or(session_coordinator::SystemState::Stopped);

        let symbols = self
            .session_data
            .read()
            .values()
            .map(|data| SymbolStatus {
                symbol: data.symbol.clone(),
                meets_session_config_requirements: data.meets_session_config_requirements,
                auto_provisioned: data.auto_provisioned,
                upgraded_from_adhoc: data.upgraded_from_adhoc,
            })
            .collect();

        SystemStatus {
            state,
            active_trading_date: self.active_trading_date,
            symbols,
            strategy_overrun_counts: Vec::new(),
        }
    }

    /// In-process metrics snapshot. Strategy overrun counts are only ever available while the
    /// `StrategyManager` is still owned by this process, which after `start` has moved it into
    /// the `AnalysisEngine` worker thread - so this always reports an empty vector here; see
    /// `DESIGN.md` for why that counter isn't plumbed back out.
    pub fn metrics(&self) -> SessionMetricsSnapshot {
        SessionMetricsSnapshot::default()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Direct access to the shared store, for callers (and tests) that need more than
    /// [`Self::get_state`]'s summary - mirrors [`SessionCoordinatorHandle::session_data`] at
    /// this crate's own level.
    pub fn session_data(&self) -> &Arc<SessionData> {
        &self.session_data
    }
}
