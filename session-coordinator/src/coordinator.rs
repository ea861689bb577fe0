use crate::{
    clock::SimulatedClock,
    error::{CoordinatorError, NotifyError, OverrunError},
    merge::{MergeOutcome, MergeQueue},
    provisioning::{self, AddRegime, ProvisioningSource},
    state::{validate_transition, SharedSystemState, SystemState},
};
use analysis_engine::{context::ScanContext, scanner_manager::ScannerManager};
use chrono::{DateTime, Utc};
use indicator_catalog::IndicatorConfig;
use session_data::{Bar, BarRepository, CalendarService, SessionClock, SessionData};
use session_instrument::{ExchangeGroup, Interval, Symbol};
use session_integration::{
    channel::{ChannelTxDroppable, UnboundedRx, UnboundedTx},
    notification::BarNotification,
};
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use stream_subscription::{StreamSubscription, SubscriptionMode};
use tracing::{debug, error, info, warn};

/// How long the merge loop sleeps between busy-wait checks: pause state, empty input queues.
const BUSY_WAIT_INTERVAL: Duration = Duration::from_millis(5);

/// A symbol the config, a strategy, or a scanner wants added, expressed in terms `analyze`
/// understands.
#[derive(Debug, Clone)]
pub struct SymbolAddRequest {
    pub symbol: Symbol,
    pub source: ProvisioningSource,
    pub regime: AddRegime,
    pub indicator_config: Option<IndicatorConfig>,
}

/// Commands sent to the running Coordinator from whatever thread owns its
/// [`SessionCoordinatorHandle`]. Mutating the session is funnelled through here rather than
/// through `&mut self` methods because, once [`SessionCoordinator::run`] starts, `self` belongs
/// to the Coordinator's own OS thread.
#[derive(Debug, Clone)]
enum CoordinatorCommand {
    Start {
        session_start: DateTime<Utc>,
        session_end: DateTime<Utc>,
        symbols: Vec<SymbolAddRequest>,
    },
    Stop,
    Pause,
    Resume,
    AddSymbol(SymbolAddRequest),
    RemoveSymbol(Symbol),
    FeedLiveBar { symbol: Symbol, interval: Interval, bar: Bar },
}

/// Static, session-wide configuration. Config loading/validation itself is
/// `session-engine::SystemManager`'s job; by the time this reaches the Coordinator it has
/// already been parsed and validated.
#[derive(Debug, Clone)]
pub struct SessionCoordinatorConfig {
    pub base_interval: Interval,
    pub derived_intervals: Vec<Interval>,
    pub exchange: ExchangeGroup,
    pub historical_days: u32,
    pub adhoc_warmup_days: u32,
    /// `> 0`: backtest pacing divisor. `0`: data-driven, no sleep between events.
    pub speed_multiplier: f64,
    pub catchup_threshold_seconds: u64,
    pub live_mode: bool,
}

/// Cheaply-clonable remote control for a running [`SessionCoordinator`]. Constructed once via
/// [`SessionCoordinator::handle`], before `run` moves the Coordinator itself onto its own
/// thread.
#[derive(Debug, Clone)]
pub struct SessionCoordinatorHandle {
    state: Arc<SharedSystemState>,
    commands: Arc<std::sync::Mutex<ChannelTxDroppable<UnboundedTx<CoordinatorCommand, NotifyError>>>>,
    session_data: Arc<SessionData>,
}

impl SessionCoordinatorHandle {
    pub fn get_state(&self) -> SystemState {
        self.state.get()
    }

    pub fn session_data(&self) -> &Arc<SessionData> {
        &self.session_data
    }

    pub fn start(&self, session_start: DateTime<Utc>, session_end: DateTime<Utc>, symbols: Vec<SymbolAddRequest>) {
        self.send(CoordinatorCommand::Start { session_start, session_end, symbols });
    }

    pub fn stop(&self) {
        self.send(CoordinatorCommand::Stop);
    }

    pub fn pause(&self) {
        self.send(CoordinatorCommand::Pause);
    }

    pub fn resume(&self) {
        self.send(CoordinatorCommand::Resume);
    }

    pub fn add_symbol(&self, request: SymbolAddRequest) {
        self.send(CoordinatorCommand::AddSymbol(request));
    }

    pub fn remove_symbol(&self, symbol: Symbol) {
        self.send(CoordinatorCommand::RemoveSymbol(symbol));
    }

    /// External live-mode bar injection point: feeds one bar for `(symbol, interval)` into the
    /// merge queue. The Coordinator does not itself fetch from brokerage APIs; whatever adapter
    /// owns that connection calls this once per bar.
    pub fn feed_live_bar(&self, symbol: Symbol, interval: Interval, bar: Bar) {
        self.send(CoordinatorCommand::FeedLiveBar { symbol, interval, bar });
    }

    fn send(&self, command: CoordinatorCommand) {
        self.commands.lock().expect("command channel mutex poisoned").send(command);
    }
}

/// Symbols that entered the mid-session catchup sequence but haven't finished provisioning -
/// tracked so a stalled add can be abandoned after `catchup_threshold_seconds`.
struct PendingAdd {
    request: SymbolAddRequest,
    entered_at: DateTime<Utc>,
}

/// Single source of truth for simulated time, chronological bar merge, and session lifecycle.
/// Runs on its own OS thread via [`Self::run`]; every other mutation comes in through the
/// [`SessionCoordinatorHandle`] returned by [`Self::handle`].
pub struct SessionCoordinator {
    session_data: Arc<SessionData>,
    clock: Arc<dyn SessionClock>,
    simulated_clock: Option<Arc<SimulatedClock>>,
    state: Arc<SharedSystemState>,
    merge: MergeQueue,
    config: SessionCoordinatorConfig,
    repository: Option<Arc<dyn BarRepository>>,
    calendar: Arc<dyn CalendarService>,
    scanner_manager: Arc<ScannerManager>,
    processor_tx: ChannelTxDroppable<UnboundedTx<BarNotification, NotifyError>>,
    quality_tx: ChannelTxDroppable<UnboundedTx<BarNotification, NotifyError>>,
    processor_subscription: Arc<StreamSubscription>,
    processor_gate: Arc<AtomicBool>,
    mode: SubscriptionMode,
    commands_in: UnboundedRx<CoordinatorCommand>,
    /// Cloned into every [`SessionCoordinatorHandle`] minted by [`Self::handle`]. Dropped by
    /// [`Self::run`] before it starts polling - otherwise this copy would keep the channel
    /// permanently open and `commands_in` could never observe "all handles dropped".
    commands_out: Option<Arc<std::sync::Mutex<ChannelTxDroppable<UnboundedTx<CoordinatorCommand, NotifyError>>>>>,
    pending_adds: VecDeque<PendingAdd>,
    runtime: tokio::runtime::Runtime,
}

#[allow(clippy::too_many_arguments)]
impl SessionCoordinator {
    pub fn new(
        session_data: Arc<SessionData>,
        clock: Arc<dyn SessionClock>,
        simulated_clock: Option<Arc<SimulatedClock>>,
        config: SessionCoordinatorConfig,
        repository: Option<Arc<dyn BarRepository>>,
        calendar: Arc<dyn CalendarService>,
        scanner_manager: Arc<ScannerManager>,
        processor_tx: UnboundedTx<BarNotification, NotifyError>,
        quality_tx: UnboundedTx<BarNotification, NotifyError>,
        processor_subscription: Arc<StreamSubscription>,
        processor_gate: Arc<AtomicBool>,
        mode: SubscriptionMode,
    ) -> Self {
        let (commands_tx, commands_rx) = tokio::sync::mpsc::unbounded_channel();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("failed to build SessionCoordinator's dedicated runtime");

        info!(?mode, speed = config.speed_multiplier, "SessionCoordinator initialized");

        Self {
            session_data,
            clock,
            simulated_clock,
            state: Arc::new(SharedSystemState::default()),
            merge: MergeQueue::new(),
            config,
            repository,
            calendar,
            scanner_manager,
            processor_tx: ChannelTxDroppable::new(processor_tx),
            quality_tx: ChannelTxDroppable::new(quality_tx),
            processor_subscription,
            processor_gate,
            mode,
            commands_in: UnboundedRx::new(commands_rx),
            commands_out: Some(Arc::new(std::sync::Mutex::new(ChannelTxDroppable::new(UnboundedTx::new(commands_tx))))),
            pending_adds: VecDeque::new(),
            runtime,
        }
    }

    /// Obtain a remote-control handle. Call this before [`Self::run`] - the Coordinator itself
    /// is moved onto its own thread there, and `run` gives up its own copy of the sender as
    /// soon as it starts.
    pub fn handle(&self) -> SessionCoordinatorHandle {
        SessionCoordinatorHandle {
            state: self.state.clone(),
            commands: self.commands_out.clone().expect("handle() called after run() started"),
            session_data: self.session_data.clone(),
        }
    }

    /// Main loop. Returns when every [`SessionCoordinatorHandle`] is dropped (all command
    /// senders gone) or an unrecoverable [`OverrunError`] stops the session.
    pub fn run(mut self) -> Result<(), CoordinatorError> {
        info!("SessionCoordinator loop started");
        self.commands_out = None;

        loop {
            let Some(command) = self.commands_in.blocking_recv() else {
                info!("SessionCoordinator command channel closed, shutting down");
                return Ok(());
            };

            match command {
                CoordinatorCommand::Start { session_start, session_end, symbols } => {
                    if let Err(err) = validate_transition(self.state.get(), SystemState::Running) {
                        error!(%err, "rejected start command");
                        continue;
                    }
                    if let Err(err) = self.activate_session(session_start, session_end, symbols) {
                        error!(%err, "session ended with an error");
                        self.state.set(SystemState::Stopped);
                        return Err(err);
                    }
                }
                CoordinatorCommand::Stop => self.state.set(SystemState::Stopped),
                CoordinatorCommand::Pause
                | CoordinatorCommand::Resume
                | CoordinatorCommand::AddSymbol(_)
                | CoordinatorCommand::RemoveSymbol(_)
                | CoordinatorCommand::FeedLiveBar { .. } => {
                    debug!(?command, "ignoring command received outside an active session");
                }
            }
        }
    }

    /// Phase 1 (teardown) + Phase 2 (initialize) + Phase 3 (active) + Phase 4 (end of session),
    /// for one trading day.
    fn activate_session(
        &mut self,
        session_start: DateTime<Utc>,
        session_end: DateTime<Utc>,
        symbols: Vec<SymbolAddRequest>,
    ) -> Result<(), CoordinatorError> {
        self.teardown();
        self.initialize(session_start, session_end, symbols)?;

        self.state.set(SystemState::Running);
        let outcome = self.run_active_session(session_start, session_end);

        self.end_of_session(session_start, session_end);
        outcome
    }

    /// Phase 1: clear SessionData, drain the merge queue, reset scanner state.
    fn teardown(&mut self) {
        info!("session teardown");
        self.session_data.clear();
        self.merge = MergeQueue::new();
        self.pending_adds.clear();
    }

    /// Phase 2: provision every config-declared symbol, warm indicators, compute initial
    /// quality, run pre-session scanners.
    fn initialize(
        &mut self,
        session_start: DateTime<Utc>,
        session_end: DateTime<Utc>,
        symbols: Vec<SymbolAddRequest>,
    ) -> Result<(), CoordinatorError> {
        info!(symbol_count = symbols.len(), "session initialize");

        if let Some(simulated) = &self.simulated_clock {
            simulated.init(session_start);
        }

        for request in symbols {
            self.provision_and_prime(&request, session_start, session_end)?;
        }

        let ctx = self.scan_context(session_start);
        if self.scanner_manager.has_pre_session_scanners() && !self.scanner_manager.setup_pre_session_scanners(&ctx) {
            warn!("one or more pre-session scanners failed setup");
        }
        self.scanner_manager.on_session_start(&ctx);
        self.absorb_scanner_results(session_start, session_end)?;

        Ok(())
    }

    /// Phase 4: teardown scanners, advance the clock past the session window so no stale data
    /// survives into the next day.
    fn end_of_session(&mut self, _session_start: DateTime<Utc>, session_end: DateTime<Utc>) {
        info!("end of session");
        let ctx = self.scan_context(session_end);
        self.scanner_manager.on_session_end(&ctx);
        if let Some(simulated) = &self.simulated_clock {
            simulated.advance_to(session_end);
        }
    }

    /// Phase 3: the merge-yield loop.
    fn run_active_session(&mut self, session_start: DateTime<Utc>, session_end: DateTime<Utc>) -> Result<(), CoordinatorError> {
        let mut last_event_time: Option<DateTime<Utc>> = None;

        loop {
            while self.state.get() != SystemState::Running {
                if self.state.get() == SystemState::Stopped {
                    return Ok(());
                }
                std::thread::sleep(BUSY_WAIT_INTERVAL);
                self.drain_commands();
            }

            self.drain_commands();
            if self.state.get() != SystemState::Running {
                continue;
            }

            match self.merge.next_ready(self.clock.now()) {
                MergeOutcome::Ready { symbol, interval, bar } => {
                    self.pace(&mut last_event_time, bar.timestamp);

                    let interval_seconds = interval.parse().map(|info| info.seconds()).unwrap_or(0);
                    let clock_after = bar.timestamp + chrono::TimeDelta::seconds(interval_seconds.max(0));
                    if let Some(simulated) = &self.simulated_clock {
                        simulated.advance_to(clock_after);
                    }

                    if !self.session_data.append_bar(&symbol, &interval, bar) {
                        warn!(%symbol, interval = interval.as_str(), "duplicate or unknown bar discarded by SessionData");
                    }

                    let notification = BarNotification::new(symbol.clone(), interval.clone(), bar.timestamp);
                    self.quality_tx.send(notification.clone());
                    self.processor_tx.send(notification);

                    if !self.wait_for_processor() {
                        return Err(CoordinatorError::Overrun(OverrunError {
                            worker: "DataProcessor".to_string(),
                            overrun_count: self.processor_subscription.overrun_count(),
                        }));
                    }

                    let ctx = self.scan_context(clock_after);
                    self.scanner_manager.check_and_execute_scans(&ctx);
                    self.absorb_scanner_results(session_start, session_end)?;
                    self.check_pending_add_timeouts();
                }
                MergeOutcome::Empty => {
                    std::thread::sleep(BUSY_WAIT_INTERVAL);
                }
                MergeOutcome::Exhausted => {
                    info!("all streams exhausted, ending session");
                    return Ok(());
                }
            }
        }
    }

    fn wait_for_processor(&self) -> bool {
        if self.mode == SubscriptionMode::Live {
            return true;
        }
        let ready = self.runtime.block_on(self.processor_subscription.wait_until_ready(None));
        self.processor_subscription.reset();
        ready
    }

    /// `Δt`-based pacing for backtest replay: `speed_multiplier > 0` sleeps `max(Δt/s, 1ms)`
    /// between consecutive events; `0` (data-driven) never sleeps here, since pacing is
    /// entirely gated by [`Self::wait_for_processor`].
    fn pace(&self, last_event_time: &mut Option<DateTime<Utc>>, event_time: DateTime<Utc>) {
        if self.config.speed_multiplier > 0.0 {
            if let Some(last) = last_event_time {
                let delta_seconds = (event_time - *last).num_milliseconds().max(0) as f64 / 1000.0;
                let sleep_seconds = (delta_seconds / self.config.speed_multiplier).max(0.001);
                std::thread::sleep(Duration::from_secs_f64(sleep_seconds));
            }
        }
        *last_event_time = Some(event_time);
    }

    fn scan_context(&self, current_time: DateTime<Utc>) -> ScanContext {
        ScanContext::new(self.session_data.clone(), self.clock.clone(), self.mode, current_time)
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands_in.rx.try_recv() {
            match command {
                CoordinatorCommand::Stop => self.state.set(SystemState::Stopped),
                CoordinatorCommand::Pause => {
                    if let Err(err) = validate_transition(self.state.get(), SystemState::Paused) {
                        error!(%err, "rejected pause command");
                    } else {
                        self.state.set(SystemState::Paused);
                    }
                }
                CoordinatorCommand::Resume => {
                    if let Err(err) = validate_transition(self.state.get(), SystemState::Running) {
                        error!(%err, "rejected resume command");
                    } else {
                        self.state.set(SystemState::Running);
                    }
                }
                CoordinatorCommand::AddSymbol(request) => {
                    self.pending_adds.push_back(PendingAdd { request, entered_at: self.clock.now() });
                }
                CoordinatorCommand::RemoveSymbol(symbol) => self.remove_symbol(&symbol),
                CoordinatorCommand::FeedLiveBar { symbol, interval, bar } => {
                    if self.merge.is_registered(&symbol, &interval) {
                        self.merge.feed(&symbol, &interval, bar);
                    } else {
                        warn!(%symbol, interval = interval.as_str(), "dropping live bar for unregistered stream");
                    }
                }
                CoordinatorCommand::Start { .. } => {
                    warn!("ignoring start command received while a session is already active");
                }
            }
        }

        self.run_pending_adds();
    }

    /// Drive the mid-session add coordination sequence (pause -> provision -> resume) for
    /// every queued [`PendingAdd`], one at a time, on this thread - matching scanner execution,
    /// synchronously on the Coordinator.
    fn run_pending_adds(&mut self) {
        while let Some(pending) = self.pending_adds.pop_front() {
            let now = self.clock.now();
            if let Err(err) = self.provision_and_prime(&pending.request, now, now) {
                error!(%err, symbol = %pending.request.symbol, "mid-session add failed");
            }
        }
    }

    fn check_pending_add_timeouts(&mut self) {
        let now = self.clock.now();
        let threshold = chrono::TimeDelta::seconds(self.config.catchup_threshold_seconds as i64);
        self.pending_adds.retain(|pending| {
            let stalled = now - pending.entered_at > threshold;
            if stalled {
                warn!(symbol = %pending.request.symbol, "abandoning mid-session add: catchup threshold exceeded");
            }
            !stalled
        });
    }

    fn remove_symbol(&mut self, symbol: &Symbol) {
        info!(%symbol, "removing symbol");
        self.merge.deregister(symbol, &self.config.base_interval);
        self.session_data.remove_symbol(symbol);
        self.pending_adds.retain(|pending| &pending.request.symbol != symbol);
    }

    /// Run the three-phase provisioning protocol for one symbol, pausing downstream
    /// notifications for its duration, then - for a full add in backtest mode - prime the
    /// merge queue with the symbol's session-window bars.
    fn provision_and_prime(
        &mut self,
        request: &SymbolAddRequest,
        session_start: DateTime<Utc>,
        session_end: DateTime<Utc>,
    ) -> Result<(), CoordinatorError> {
        self.processor_gate.store(false, Ordering::Release);

        let requirements = provisioning::analyze(
            &self.session_data,
            &request.symbol,
            request.source,
            &self.config.base_interval,
            &self.config.derived_intervals,
            request.regime,
            request.indicator_config.clone(),
        );

        let validation = provisioning::validate(&self.session_data, &request.symbol, &requirements, self.repository.is_some());
        if !validation.can_proceed {
            self.processor_gate.store(true, Ordering::Release);
            warn!(symbol = %request.symbol, reason = ?validation.reason, "symbol add rejected");
            return Ok(());
        }

        let now = self.clock.now();
        let result = self
            .runtime
            .block_on(provisioning::provision(
                &self.session_data,
                self.repository.as_deref(),
                self.calendar.as_ref(),
                &request.symbol,
                &self.config.base_interval,
                &self.config.exchange,
                &requirements,
                session_start,
                now,
            ))
            .map_err(CoordinatorError::from);

        self.processor_gate.store(true, Ordering::Release);

        result?;

        // Adhoc adds (meets_session_config_requirements = false) only warm an indicator from
        // static historical bars; they never join the merge queue and so never receive live
        // per-bar notifications. Only a full add participates in the merge-yield loop.
        if requirements.meets_session_config_requirements {
            if self.config.live_mode {
                self.merge.register(request.symbol.clone(), self.config.base_interval.clone());
            } else {
                self.prime_merge_queue(&request.symbol, session_start, session_end)?;
            }
        }

        Ok(())
    }

    /// Backtest-mode data pump: pull the symbol's base-interval bars for `[session_start,
    /// session_end)` from the repository in one shot and feed them into the merge queue.
    fn prime_merge_queue(&mut self, symbol: &Symbol, session_start: DateTime<Utc>, session_end: DateTime<Utc>) -> Result<(), CoordinatorError> {
        self.merge.register(symbol.clone(), self.config.base_interval.clone());

        let Some(repository) = self.repository.clone() else {
            self.merge.mark_exhausted(symbol, &self.config.base_interval);
            return Ok(());
        };

        let bars = self
            .runtime
            .block_on(repository.get_bars(symbol, &self.config.base_interval, session_start, session_end));

        match bars {
            Ok(bars) => {
                for bar in bars {
                    self.merge.feed(symbol, &self.config.base_interval, bar);
                }
            }
            Err(err) => {
                warn!(%symbol, %err, "repository read failed while priming merge queue, continuing without this symbol's session data");
            }
        }
        self.merge.mark_exhausted(symbol, &self.config.base_interval);

        Ok(())
    }

    /// Drain any symbols found by scanners since the last check and queue them for provisioning
    /// as adhoc adds.
    fn absorb_scanner_results(&mut self, _session_start: DateTime<Utc>, _session_end: DateTime<Utc>) -> Result<(), CoordinatorError> {
        let results = self.scanner_manager.drain_results();
        for (scanner_name, result) in results {
            for symbol in result.symbols {
                debug!(scanner = %scanner_name, %symbol, "scanner found qualifying symbol");
                self.pending_adds.push_back(PendingAdd {
                    request: SymbolAddRequest {
                        symbol,
                        source: ProvisioningSource::Scanner,
                        regime: AddRegime::Adhoc { warmup_days: self.config.adhoc_warmup_days },
                        indicator_config: None,
                    },
                    entered_at: self.clock.now(),
                });
            }
        }
        self.run_pending_adds();
        Ok(())
    }
}
