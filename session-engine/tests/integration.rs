//! End-to-end coverage of [`session_engine::SystemManager`]: load a config from disk, wire
//! every worker against fake collaborators, drive a trading day to completion, and shut down
//! cleanly. Lower-level behavior (merge ordering, derived-bar synthesis, quality scoring,
//! provisioning) is covered where it lives - `session-coordinator`, `data-processor`,
//! `data-quality` - so these tests only exercise the wiring `SystemManager::start` owns.

use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;
use session_data::{
    testing::{FakeBarRepository, FakeCalendarService},
    Bar, BarRepository, CalendarService,
};
use session_engine::{ConfigError, EngineError, SystemManager};
use session_instrument::{Interval, Symbol};
use std::{io::Write, sync::Arc, time::Duration};

fn write_config(json: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("failed to create temp config file");
    file.write_all(json.as_bytes()).expect("failed to write temp config file");
    file
}

fn one_symbol_backtest_config(start_date: &str, end_date: &str) -> String {
    format!(
        r#"{{
            "session_name": "integration_test",
            "mode": "backtest",
            "exchange_group": "US_EQUITY",
            "asset_class": "equity",
            "session_data_config": {{
                "symbols": ["AAPL"],
                "streams": ["1m"],
                "base_interval": "1m",
                "historical": {{ "trailing_days": 0 }}
            }},
            "backtest_config": {{
                "start_date": "{start_date}",
                "end_date": "{end_date}",
                "speed_multiplier": 0.0,
                "prefetch_days": 0
            }}
        }}"#
    )
}

#[test]
fn start_rejects_a_config_with_no_symbols() {
    let json = r#"{
        "session_name": "no_symbols",
        "mode": "backtest",
        "exchange_group": "US_EQUITY",
        "asset_class": "equity",
        "session_data_config": {
            "symbols": [],
            "streams": ["1m"],
            "base_interval": "1m",
            "historical": { "trailing_days": 0 }
        },
        "backtest_config": {
            "start_date": "2025-11-04",
            "end_date": "2025-11-04",
            "speed_multiplier": 0.0,
            "prefetch_days": 0
        }
    }"#;
    let file = write_config(json);

    let calendar: Arc<dyn CalendarService> = Arc::new(FakeCalendarService::new());
    let result = SystemManager::start(file.path(), calendar, None, Vec::new(), Vec::new());

    assert!(matches!(result, Err(EngineError::Config(ConfigError::NoSymbols))));
}

#[test]
fn start_rejects_a_non_trading_day() {
    // 2025-11-08 is a Saturday; FakeCalendarService treats every weekend as a non-trading day.
    let json = one_symbol_backtest_config("2025-11-08", "2025-11-08");
    let file = write_config(&json);

    let calendar: Arc<dyn CalendarService> = Arc::new(FakeCalendarService::new());
    let result = SystemManager::start(file.path(), calendar, None, Vec::new(), Vec::new());

    assert!(matches!(result, Err(EngineError::NonTradingDay(_))));
}

#[test]
fn start_rejects_a_declared_holiday() {
    let holiday = chrono::NaiveDate::from_ymd_opt(2025, 11, 4).unwrap();
    let json = one_symbol_backtest_config("2025-11-04", "2025-11-04");
    let file = write_config(&json);

    let calendar: Arc<dyn CalendarService> = Arc::new(FakeCalendarService::new().with_holiday(holiday));
    let result = SystemManager::start(file.path(), calendar, None, Vec::new(), Vec::new());

    assert!(matches!(result, Err(EngineError::NonTradingDay(_))));
}

/// Spec scenario 1's shape, exercised end-to-end: a one-symbol backtest session, fed entirely
/// from a seeded [`FakeBarRepository`], running data-driven (`speed_multiplier: 0.0`) so the
/// whole session drains without any real-time pacing sleep.
#[test]
fn runs_a_one_symbol_backtest_session_end_to_end_and_stops_cleanly() {
    let symbol = Symbol::new("AAPL");
    let interval = Interval::new("1m");

    let repository = FakeBarRepository::new();
    repository.seed(
        symbol.clone(),
        interval.clone(),
        vec![
            Bar::new(
                Utc.with_ymd_and_hms(2025, 11, 4, 9, 30, 0).unwrap(),
                dec!(100),
                dec!(101),
                dec!(99),
                dec!(100.5),
                1_000,
            )
            .unwrap(),
            Bar::new(
                Utc.with_ymd_and_hms(2025, 11, 4, 9, 31, 0).unwrap(),
                dec!(100.5),
                dec!(102),
                dec!(100),
                dec!(101),
                1_200,
            )
            .unwrap(),
        ],
    );

    let json = one_symbol_backtest_config("2025-11-04", "2025-11-04");
    let file = write_config(&json);

    let calendar: Arc<dyn CalendarService> = Arc::new(FakeCalendarService::new());
    let repository: Arc<dyn BarRepository> = Arc::new(repository);

    let manager = SystemManager::start(file.path(), calendar, Some(repository), Vec::new(), Vec::new())
        .expect("a valid, well-formed config on a trading day should start cleanly");

    // The config-declared symbol is provisioned synchronously during Phase 2, before `start`
    // returns control to the caller.
    let status = manager.get_state();
    assert_eq!(status.symbols.len(), 1);
    assert_eq!(status.symbols[0].symbol, symbol);
    assert!(status.symbols[0].meets_session_config_requirements);
    assert!(!status.symbols[0].auto_provisioned);

    // The merge-yield loop runs on its own thread; poll briefly rather than assume it has
    // already drained both seeded bars the instant `start` returns.
    let mut observed = 0;
    for _ in 0..100 {
        observed = manager
            .session_data()
            .get_symbol_data(&symbol, |data| data.bars.get(&interval).map(|id| id.bars().len()).unwrap_or(0))
            .unwrap_or(0);
        if observed >= 2 {
            break;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    assert_eq!(observed, 2, "both seeded bars should have reached SessionData");

    manager.stop().expect("a cleanly-running session should stop and join without error");
}

#[test]
fn pause_and_resume_are_fire_and_forget_on_a_running_session() {
    let json = one_symbol_backtest_config("2025-11-04", "2025-11-04");
    let file = write_config(&json);

    let calendar: Arc<dyn CalendarService> = Arc::new(FakeCalendarService::new());
    let repository: Arc<dyn BarRepository> = Arc::new(FakeBarRepository::new());

    let manager = SystemManager::start(file.path(), calendar, Some(repository), Vec::new(), Vec::new())
        .expect("a valid, well-formed config on a trading day should start cleanly");

    manager.pause();
    manager.resume();

    manager.stop().expect("pause/resume should not prevent a clean stop");
}
