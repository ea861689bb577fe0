use indicator_catalog::{IndicatorCatalog, IndicatorConfig};
use session_data::{IndicatorKey, IndicatorState, SessionData};
use session_instrument::{Interval, Symbol};
use tracing::warn;

/// Run every configured indicator whose interval matches `interval` forward one step and
/// persist the result, returning the keys that actually changed so the caller can notify
/// downstream. `bars` is copied out of the store for the duration of the catalog call rather
/// than held under lock - a small, local overhead, not the cross-thread copy the zero-copy
/// contract forbids.
pub fn refresh_indicators(
    session_data: &SessionData,
    catalog: &IndicatorCatalog,
    symbol: &Symbol,
    interval: &Interval,
    configs: &[IndicatorConfig],
) -> Vec<IndicatorKey> {
    let mut updated = Vec::new();

    for config in configs.iter().filter(|config| &config.interval == interval) {
        let key = IndicatorKey::new(config.name.clone(), config.period, interval.as_str());

        let snapshot = session_data.get_symbol_data(symbol, |data| {
            let bars = data.bars.get(interval).map(|interval_data| interval_data.bars().to_vec());
            let prior = data
                .indicators
                .get(&key)
                .cloned()
                .unwrap_or_else(|| IndicatorState::new(key.clone()));
            (bars, prior)
        });

        let Some((Some(bars), prior)) = snapshot else {
            continue;
        };

        match catalog.compute(config, &bars, &prior) {
            Ok(next) => {
                session_data.set_indicator_state(symbol, next);
                updated.push(key);
            }
            Err(error) => {
                warn!(%symbol, interval = interval.as_str(), %error, "indicator compute failed, keeping prior state");
            }
        }
    }

    updated
}
