use crate::{
    config::DataQualityConfig,
    gap_fill::fill_gap,
    quality::{count_unique_and_duplicates, detect_gaps, expected_bar_count, quality_score},
};
use fnv::FnvHashMap;
use parking_lot::Mutex;
use session_data::{BarRepository, CalendarService, Gap, SessionClock, SessionData};
use session_instrument::{ExchangeGroup, Interval, Symbol};
use session_integration::{channel::UnboundedRx, notification::BarNotification};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Non-blocking background worker: measures per-`(symbol, interval)` quality, detects gaps, and
/// (live mode only) repairs them from a [`BarRepository`]. Never signals ready and never blocks
/// the Coordinator - its only output is what it writes into [`SessionData`] directly.
///
/// Runs on its own OS thread via [`DataQualityManager::run`], polling its notification channel
/// with a timeout so the retry sweep still runs during a quiet period.
pub struct DataQualityManager {
    session_data: Arc<SessionData>,
    calendar: Arc<dyn CalendarService>,
    repository: Option<Arc<dyn BarRepository>>,
    clock: Arc<dyn SessionClock>,
    config: DataQualityConfig,
    live_mode: bool,
    notifications_in: UnboundedRx<BarNotification>,
    failed_gaps: Mutex<FnvHashMap<(Symbol, Interval), Vec<Gap>>>,
    runtime: tokio::runtime::Runtime,
}

impl std::fmt::Debug for DataQualityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataQualityManager")
            .field("live_mode", &self.live_mode)
            .field("gap_filling_enabled", &self.gap_filling_enabled())
            .field("config", &self.config)
            .finish()
    }
}

impl DataQualityManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_data: Arc<SessionData>,
        calendar: Arc<dyn CalendarService>,
        repository: Option<Arc<dyn BarRepository>>,
        clock: Arc<dyn SessionClock>,
        config: DataQualityConfig,
        live_mode: bool,
        notifications_in: UnboundedRx<BarNotification>,
    ) -> Self {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("failed to build DataQualityManager's dedicated runtime");

        info!(
            live_mode,
            enable_session_quality = config.gap_filler.enable_session_quality,
            "DataQualityManager initialized"
        );

        Self {
            session_data,
            calendar,
            repository,
            clock,
            config,
            live_mode,
            notifications_in,
            failed_gaps: Mutex::new(FnvHashMap::default()),
            runtime,
        }
    }

    /// Gap filling only runs in live mode with quality enabled.
    fn gap_filling_enabled(&self) -> bool {
        self.live_mode && self.config.gap_filler.enable_session_quality && self.repository.is_some()
    }

    /// Reset to initial state ahead of a new session. Idempotent.
    pub fn teardown(&self) {
        self.failed_gaps.lock().clear();
    }

    pub fn setup(&self) {}

    /// Main event-driven loop. Returns once the upstream notification channel closes.
    pub fn run(mut self) {
        info!("DataQualityManager loop started");
        let mut last_retry_check = self.clock.now();

        loop {
            let recv_future = self.notifications_in.rx.recv();
            let received = self.runtime.block_on(tokio::time::timeout(POLL_INTERVAL, recv_future));

            match received {
                Ok(Some(notification)) => self.process(notification),
                Ok(None) => break,
                Err(_elapsed) => {
                    if self.gap_filling_enabled() {
                        let now = self.clock.now();
                        let elapsed = (now - last_retry_check).num_seconds();
                        if elapsed >= self.config.gap_filler.retry_interval_seconds as i64 {
                            self.retry_failed_gaps(now);
                            last_retry_check = now;
                        }
                    }
                }
            }
        }

        info!("DataQualityManager loop exited");
    }

    fn process(&self, notification: BarNotification) {
        if !self.config.gap_filler.enable_session_quality {
            return;
        }

        let BarNotification { symbol, interval, .. } = notification;
        trace!(%symbol, interval = interval.as_str(), "processing quality notification");

        self.calculate_quality(&symbol, &interval);

        if self.gap_filling_enabled() {
            self.check_and_fill_gaps(&symbol, &interval);
        }

        self.propagate_quality_to_derived(&symbol, &interval);
    }

    fn exchange_for(&self, symbol: &Symbol) -> Option<ExchangeGroup> {
        self.config.exchange_for(symbol).cloned()
    }

    fn calculate_quality(&self, symbol: &Symbol, interval: &Interval) {
        let Some(exchange) = self.exchange_for(symbol) else {
            warn!(%symbol, "no exchange group registered, skipping quality calculation");
            return;
        };

        let now = self.clock.now();
        let Ok(session) = self.calendar.get_trading_session(now.date_naive(), &exchange) else {
            warn!(%symbol, "calendar lookup failed, skipping quality calculation");
            return;
        };
        let (Some(session_open), Some(session_close)) = (session.open, session.close) else {
            debug!(%symbol, "not a trading day, skipping quality calculation");
            return;
        };

        let Ok(interval_info) = interval.parse() else {
            warn!(%symbol, interval = interval.as_str(), "unparseable interval, skipping quality calculation");
            return;
        };

        let Some(Some(bars)) = self
            .session_data
            .get_symbol_data(symbol, |data| data.bars.get(interval).map(|id| id.bars().to_vec()))
        else {
            return;
        };

        let (unique, duplicates) = count_unique_and_duplicates(&bars, session_open, session_close);
        let expected = expected_bar_count(session_open, session_close, now, interval_info.seconds());
        let quality = quality_score(unique, duplicates, expected);
        self.session_data.set_quality(symbol, interval, quality);

        let gaps = detect_gaps(&bars, session_open, session_close, now, interval_info.seconds());
        let gap_count = gaps.len();
        self.session_data.set_gaps(symbol, interval, gaps);

        info!(
            %symbol,
            interval = interval.as_str(),
            quality,
            actual_unique = unique,
            expected,
            gaps = gap_count,
            "quality updated"
        );
    }

    fn check_and_fill_gaps(&self, symbol: &Symbol, interval: &Interval) {
        let Some(repository) = self.repository.clone() else {
            return;
        };

        let mut gaps = self
            .session_data
            .get_symbol_data(symbol, |data| {
                data.bars.get(interval).map(|id| id.gaps.clone()).unwrap_or_default()
            })
            .unwrap_or_default();

        let gap_key = (symbol.clone(), interval.clone());
        if let Some(failed) = self.failed_gaps.lock().remove(&gap_key) {
            gaps.extend(failed);
        }

        if gaps.is_empty() {
            return;
        }

        let now = self.clock.now();
        let mut remaining = Vec::new();
        let mut filled_any = false;

        for mut gap in gaps {
            if gap.at_max_retries(self.config.gap_filler.max_retries) {
                warn!(%symbol, interval = interval.as_str(), start = %gap.start, "max retries reached for gap");
                continue;
            }

            let filled = self.runtime.block_on(fill_gap(&self.session_data, repository.as_ref(), symbol, interval, &gap));
            match filled {
                Ok(count) if count as u64 >= gap.bar_count => {
                    filled_any = true;
                }
                Ok(_) => {
                    gap.record_retry(now);
                    remaining.push(gap);
                }
                Err(error) => {
                    warn!(%symbol, interval = interval.as_str(), %error, "gap fill failed");
                    gap.record_retry(now);
                    remaining.push(gap);
                }
            }
        }

        if !remaining.is_empty() {
            self.failed_gaps.lock().insert(gap_key, remaining);
        }

        if filled_any {
            self.calculate_quality(symbol, interval);
        }
    }

    fn retry_failed_gaps(&self, now: chrono::DateTime<chrono::Utc>) {
        let Some(repository) = self.repository.clone() else {
            return;
        };

        let keys: Vec<(Symbol, Interval)> = self.failed_gaps.lock().keys().cloned().collect();
        for (symbol, interval) in keys {
            let gaps = self.failed_gaps.lock().remove(&(symbol.clone(), interval.clone())).unwrap_or_default();
            let mut remaining = Vec::new();
            let mut filled_any = false;

            for mut gap in gaps {
                if gap.at_max_retries(self.config.gap_filler.max_retries) {
                    warn!(%symbol, interval = interval.as_str(), "abandoning gap after max retries");
                    continue;
                }

                let elapsed = gap
                    .last_retry
                    .map(|last| (now - last).num_seconds())
                    .unwrap_or(i64::MAX);
                if elapsed < self.config.gap_filler.retry_interval_seconds as i64 {
                    remaining.push(gap);
                    continue;
                }

                let filled =
                    self.runtime.block_on(fill_gap(&self.session_data, repository.as_ref(), &symbol, &interval, &gap));
                match filled {
                    Ok(count) if count as u64 >= gap.bar_count => {
                        filled_any = true;
                    }
                    Ok(_) => {
                        gap.record_retry(now);
                        remaining.push(gap);
                    }
                    Err(error) => {
                        warn!(%symbol, interval = interval.as_str(), %error, "retry gap fill failed");
                        gap.record_retry(now);
                        remaining.push(gap);
                    }
                }
            }

            if !remaining.is_empty() {
                self.failed_gaps.lock().insert((symbol, interval), remaining);
            } else if filled_any {
                self.calculate_quality(&symbol, &interval);
            }
        }
    }

    /// Copy the base interval's quality onto every derived interval under the same symbol.
    fn propagate_quality_to_derived(&self, symbol: &Symbol, interval: &Interval) {
        let Some(base_interval) = self.session_data.get_symbol_data(symbol, |data| data.base_interval.clone()) else {
            return;
        };
        if *interval != base_interval {
            return;
        }

        let Some(base_quality) = self
            .session_data
            .get_symbol_data(symbol, |data| data.bars.get(interval).map(|id| id.quality))
            .flatten()
        else {
            return;
        };

        let derived_intervals = self
            .session_data
            .get_symbol_data(symbol, |data| {
                data.bars
                    .iter()
                    .filter(|(key, id)| id.derived && *key != interval && !id.bars().is_empty())
                    .map(|(key, _)| key.clone())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        for derived in derived_intervals {
            self.session_data.set_quality(symbol, &derived, base_quality);
            trace!(%symbol, base = interval.as_str(), derived = derived.as_str(), base_quality, "propagated quality");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GapFillerConfig;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use session_data::testing::{FakeBarRepository, FakeCalendarService, FixedClock};
    use session_data::{AddedBy, Bar, SymbolSessionData};

    fn bar(minute: u32) -> Bar {
        Bar::new(
            Utc.with_ymd_and_hms(2025, 11, 4, 9, minute, 0).unwrap(),
            dec!(100),
            dec!(101),
            dec!(99),
            dec!(100.5),
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
        store
    }

    fn config(symbol: &Symbol, gap_filler: GapFillerConfig) -> DataQualityConfig {
        let mut config = DataQualityConfig::new(gap_filler);
        config.register_symbol(symbol.clone(), ExchangeGroup::new("US_EQUITY"));
        config
    }

    #[test]
    fn calculates_quality_and_records_a_gap() {
        let symbol = Symbol::new("AAPL");
        let interval = Interval::new("1m");
        let store = setup_store(&symbol, &interval);
        for m in (31..=44).chain(50..=60) {
            store.append_bar(&symbol, &interval, bar(m));
        }

        let (in_tx, in_rx) = tokio::sync::mpsc::unbounded_channel();
        let now = Utc.with_ymd_and_hms(2025, 11, 4, 10, 0, 0).unwrap();

        let manager = DataQualityManager::new(
            store.clone(),
            Arc::new(FakeCalendarService::new()),
            None,
            Arc::new(FixedClock::new(now)),
            config(&symbol, GapFillerConfig::default()),
            false,
            UnboundedRx::new(in_rx),
        );

        manager.calculate_quality(&symbol, &interval);

        let (quality, gaps) = store
            .get_symbol_data(&symbol, |data| {
                let id = &data.bars[&interval];
                (id.quality, id.gaps.clone())
            })
            .unwrap();

        assert!((quality - 83.333).abs() < 0.01);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].bar_count, 5);
        drop(in_tx);
    }

    #[test]
    fn no_op_when_session_quality_disabled() {
        let symbol = Symbol::new("AAPL");
        let interval = Interval::new("1m");
        let store = setup_store(&symbol, &interval);
        store.append_bar(&symbol, &interval, bar(31));

        let (_in_tx, in_rx) = tokio::sync::mpsc::unbounded_channel();
        let now = Utc.with_ymd_and_hms(2025, 11, 4, 10, 0, 0).unwrap();
        let gap_filler = GapFillerConfig {
            enable_session_quality: false,
            ..GapFillerConfig::default()
        };

        let manager = DataQualityManager::new(
            store.clone(),
            Arc::new(FakeCalendarService::new()),
            None,
            Arc::new(FixedClock::new(now)),
            config(&symbol, gap_filler),
            false,
            UnboundedRx::new(in_rx),
        );

        manager.process(BarNotification::new(symbol.clone(), interval.clone(), now));

        let quality = store.get_symbol_data(&symbol, |data| data.bars[&interval].quality).unwrap();
        assert_eq!(quality, 0.0);
    }

    #[tokio::test]
    async fn fills_gaps_in_live_mode_and_recalculates_quality() {
        let symbol = Symbol::new("AAPL");
        let interval = Interval::new("1m");
        let store = setup_store(&symbol, &interval);
        store.append_bar(&symbol, &interval, bar(31));
        store.append_bar(&symbol, &interval, bar(36));

        let repository = Arc::new(FakeBarRepository::new());
        repository.seed(symbol.clone(), interval.clone(), (32..36).map(bar).collect());

        let now = Utc.with_ymd_and_hms(2025, 11, 4, 9, 40, 0).unwrap();
        let (_in_tx, in_rx) = tokio::sync::mpsc::unbounded_channel();

        let manager = DataQualityManager::new(
            store.clone(),
            Arc::new(FakeCalendarService::new()),
            Some(repository.clone() as Arc<dyn BarRepository>),
            Arc::new(FixedClock::new(now)),
            config(&symbol, GapFillerConfig::default()),
            true,
            UnboundedRx::new(in_rx),
        );

        manager.calculate_quality(&symbol, &interval);
        manager.check_and_fill_gaps(&symbol, &interval);

        let len = store.get_symbol_data(&symbol, |data| data.bars[&interval].bars().len()).unwrap();
        assert_eq!(len, 6);
    }

    #[test]
    fn propagates_base_quality_onto_derived_intervals() {
        let symbol = Symbol::new("AAPL");
        let base = Interval::new("1m");
        let store = setup_store(&symbol, &base);
        store.with_symbol_data_mut(&symbol, |data| {
            data.ensure_interval(Interval::new("5m"), Some(base.clone()));
        });
        store.append_bar(&symbol, &Interval::new("5m"), bar(30));
        store.set_quality(&symbol, &base, 77.0);

        let (_in_tx, in_rx) = tokio::sync::mpsc::unbounded_channel();
        let now = Utc.with_ymd_and_hms(2025, 11, 4, 10, 0, 0).unwrap();
        let manager = DataQualityManager::new(
            store.clone(),
            Arc::new(FakeCalendarService::new()),
            None,
            Arc::new(FixedClock::new(now)),
            config(&symbol, GapFillerConfig::default()),
            false,
            UnboundedRx::new(in_rx),
        );

        manager.propagate_quality_to_derived(&symbol, &base);

        let derived_quality = store
            .get_symbol_data(&symbol, |data| data.bars[&Interval::new("5m")].quality)
            .unwrap();
        assert_eq!(derived_quality, 77.0);
    }
}
