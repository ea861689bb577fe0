use crate::{
    config::ScannerSchedule,
    context::ScanContext,
    scanner::{ScanResult, Scanner, ScannerState},
};
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use session_instrument::Symbol;
use std::sync::Arc;
use tracing::{error, info};

struct ScannerInstance {
    scanner: Arc<dyn Scanner>,
    state: ScannerState,
    pre_session: bool,
    regular_schedules: Vec<ScannerSchedule>,
    next_scan_time: Option<DateTime<Utc>>,
    last_scan_time: Option<DateTime<Utc>>,
    scan_count: u32,
    qualifying_symbols: Vec<Symbol>,
}

impl ScannerInstance {
    fn name(&self) -> &str {
        self.scanner.name()
    }
}

/// Drives every registered scanner's `Initialized -> ... -> TeardownComplete` state machine.
///
/// Called synchronously from the caller's own thread - typically the session coordinator's
/// merge loop, never a dedicated worker thread of its own - so that in backtest mode the
/// simulated clock is naturally paused for the duration of a scan. In live mode,
/// [`ScannerManager::check_and_execute_scans`] instead offloads the `scan()` call to a
/// short-lived background thread so the caller's loop is not blocked by it; setup/teardown
/// remain blocking in both modes (they run once, not on every tick).
pub struct ScannerManager {
    scanners: Arc<Mutex<Vec<ScannerInstance>>>,
    results: Arc<Mutex<Vec<(String, ScanResult)>>>,
    live_mode: bool,
}

impl std::fmt::Debug for ScannerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScannerManager")
            .field("live_mode", &self.live_mode)
            .field("scanner_count", &self.scanners.lock().len())
            .finish()
    }
}

impl ScannerManager {
    pub fn new(live_mode: bool) -> Self {
        Self {
            scanners: Arc::new(Mutex::new(Vec::new())),
            results: Arc::new(Mutex::new(Vec::new())),
            live_mode,
        }
    }

    pub fn register(&self, scanner: Arc<dyn Scanner>, pre_session: bool, regular_schedules: Vec<ScannerSchedule>) {
        info!(scanner = scanner.name(), pre_session, "registering scanner");
        self.scanners.lock().push(ScannerInstance {
            scanner,
            state: ScannerState::Initialized,
            pre_session,
            regular_schedules,
            next_scan_time: None,
            last_scan_time: None,
            scan_count: 0,
            qualifying_symbols: Vec::new(),
        });
    }

    pub fn has_pre_session_scanners(&self) -> bool {
        self.scanners.lock().iter().any(|instance| instance.pre_session)
    }

    /// Setup every scanner, run the pre-session scan for those flagged `pre_session`, then
    /// teardown the ones that are pre-session-only (no regular schedule).
    pub fn setup_pre_session_scanners(&self, ctx: &ScanContext) -> bool {
        info!("=== pre-session scanner setup ===");
        let count = self.scanners.lock().len();

        for index in 0..count {
            if !self.execute_setup(index, ctx) {
                return false;
            }
        }

        for index in 0..count {
            if self.scanners.lock()[index].pre_session {
                self.execute_scan(index, ctx);
            }
        }

        for index in 0..count {
            let (pre_session, has_regular) = {
                let scanners = self.scanners.lock();
                (scanners[index].pre_session, !scanners[index].regular_schedules.is_empty())
            };
            if pre_session && !has_regular {
                self.execute_teardown(index, ctx);
            }
        }

        info!("pre-session scanner setup complete");
        true
    }

    pub fn on_session_start(&self, ctx: &ScanContext) {
        info!("scanner manager: session started");
        let count = self.scanners.lock().len();
        for index in 0..count {
            if !self.scanners.lock()[index].regular_schedules.is_empty() {
                self.update_next_scan_time(index, ctx.current_time);
            }
        }
    }

    pub fn on_session_end(&self, ctx: &ScanContext) {
        info!("scanner manager: session ended, tearing down scanners");
        let count = self.scanners.lock().len();
        for index in 0..count {
            if !self.is_torn_down(index) {
                self.execute_teardown(index, ctx);
            }
        }
    }

    /// Check every scanner's regular schedule against `ctx.current_time` and execute any that
    /// are due. Call periodically from the coordinator's merge loop during the regular session.
    pub fn check_and_execute_scans(&self, ctx: &ScanContext) {
        let due: Vec<usize> = {
            let scanners = self.scanners.lock();
            scanners
                .iter()
                .enumerate()
                .filter(|(_, instance)| {
                    !matches!(instance.state, ScannerState::Error(_))
                        && !instance.regular_schedules.is_empty()
                        && instance.next_scan_time.is_some_and(|t| ctx.current_time >= t)
                })
                .map(|(index, _)| index)
                .collect()
        };

        for index in due {
            info!(index, at = %ctx.current_time, "scheduled scan triggered");
            self.execute_scan(index, ctx);
            self.update_next_scan_time(index, ctx.current_time);
        }
    }

    /// Teardown any scanner not already finished, then drop all scanner state. Idempotent.
    pub fn shutdown(&self, ctx: &ScanContext) {
        self.on_session_end(ctx);
        self.scanners.lock().clear();
        self.results.lock().clear();
    }

    /// Drain every symbol-qualifying scan result produced since the last drain. The caller
    /// (session coordinator) is responsible for running the three-phase provisioning protocol
    /// on any symbols found.
    pub fn drain_results(&self) -> Vec<(String, ScanResult)> {
        std::mem::take(&mut self.results.lock())
    }

    pub fn scanner_states(&self) -> Vec<(String, ScannerState)> {
        self.scanners.lock().iter().map(|instance| (instance.name().to_string(), instance.state.clone())).collect()
    }

    fn is_torn_down(&self, index: usize) -> bool {
        matches!(self.scanners.lock()[index].state, ScannerState::TeardownComplete | ScannerState::Error(_))
    }

    fn execute_setup(&self, index: usize, ctx: &ScanContext) -> bool {
        let (scanner, name) = {
            let mut scanners = self.scanners.lock();
            let instance = &mut scanners[index];
            instance.state = ScannerState::SetupPending;
            (instance.scanner.clone(), instance.name().to_string())
        };

        let ok = scanner.setup(ctx);
        let mut scanners = self.scanners.lock();
        scanners[index].state = if ok {
            ScannerState::SetupComplete
        } else {
            error!(scanner = %name, "scanner setup returned false");
            ScannerState::Error("setup returned false".to_string())
        };
        ok
    }

    fn execute_teardown(&self, index: usize, ctx: &ScanContext) {
        let scanner = {
            let mut scanners = self.scanners.lock();
            let instance = &mut scanners[index];
            instance.state = ScannerState::TeardownPending;
            instance.scanner.clone()
        };

        scanner.teardown(ctx);
        self.scanners.lock()[index].state = ScannerState::TeardownComplete;
    }

    /// Blocking in backtest, fire-and-forget on a background thread in live mode.
    fn execute_scan(&self, index: usize, ctx: &ScanContext) {
        let scanner = {
            let mut scanners = self.scanners.lock();
            let instance = &mut scanners[index];
            instance.state = ScannerState::Scanning;
            instance.scanner.clone()
        };

        if self.live_mode {
            let scanners = self.scanners.clone();
            let results = self.results.clone();
            let ctx = ctx.clone();
            let name = scanner.name().to_string();
            std::thread::spawn(move || {
                let result = scanner.scan(&ctx);
                finish_scan(&scanners, index, &ctx, result.clone());
                results.lock().push((name, result));
            });
        } else {
            let result = scanner.scan(ctx);
            let name = scanner.name().to_string();
            finish_scan(&self.scanners, index, ctx, result.clone());
            self.results.lock().push((name, result));
        }
    }

    fn update_next_scan_time(&self, index: usize, current_time: DateTime<Utc>) {
        let mut scanners = self.scanners.lock();
        let instance = &mut scanners[index];
        let time_of_day = current_time.time();
        let date = current_time.date_naive();

        let mut next: Option<DateTime<Utc>> = None;
        for schedule in &instance.regular_schedules {
            let candidate = if time_of_day < schedule.start {
                Some(date.and_time(schedule.start).and_utc())
            } else if schedule.contains(time_of_day) {
                let candidate_time = current_time + TimeDelta::seconds(schedule.interval.seconds());
                (candidate_time.time() <= schedule.end).then_some(candidate_time)
            } else {
                None
            };

            if let Some(candidate) = candidate {
                next = Some(next.map_or(candidate, |current| current.min(candidate)));
            }
        }

        instance.next_scan_time = next;
    }
}

fn finish_scan(scanners: &Mutex<Vec<ScannerInstance>>, index: usize, ctx: &ScanContext, result: ScanResult) {
    let mut scanners = scanners.lock();
    let instance = &mut scanners[index];
    instance.scan_count += 1;
    instance.last_scan_time = Some(ctx.current_time);
    instance.qualifying_symbols.extend(result.symbols);
    instance.state = ScannerState::ScanComplete;
}
