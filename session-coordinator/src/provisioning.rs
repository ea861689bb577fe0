use crate::error::ProvisioningError;
use chrono::{DateTime, Utc};
use indicator_catalog::IndicatorConfig;
use session_data::{AddedBy, BarRepository, CalendarService, InsertMode, SessionData, SymbolSessionData};
use session_instrument::{ExchangeGroup, Interval, Symbol};
use tracing::{info, warn};

/// Who/what triggered a provisioning request. Mirrors [`AddedBy`] one-for-one; kept as its own
/// type because provisioning also needs a `Config` source that predates any symbol existing.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ProvisioningSource {
    Config,
    Strategy,
    Scanner,
    Adhoc,
}

impl From<ProvisioningSource> for AddedBy {
    fn from(source: ProvisioningSource) -> Self {
        match source {
            ProvisioningSource::Config => AddedBy::Config,
            ProvisioningSource::Strategy => AddedBy::Strategy,
            ProvisioningSource::Scanner => AddedBy::Scanner,
            ProvisioningSource::Adhoc => AddedBy::Adhoc,
        }
    }
}

/// What kind of thing is being added. Only `Symbol` is fully provisioned today; `Indicator`
/// and `Bar` are named so `ProvisioningRequirements` has somewhere to carry an adhoc
/// indicator-only add (scenario 6) without conflating it with a full symbol add.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum OperationType {
    Symbol,
    Indicator,
    Bar,
}

/// One ordered step of the provisioning protocol's third phase.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ProvisioningStep {
    CreateSymbol,
    UpgradeSymbol,
    AddInterval(Interval),
    LoadHistorical,
    LoadSession,
    RegisterIndicator,
    CalculateQuality,
}

/// Phase 1 output: what provisioning this add requires, before anything is touched.
#[derive(Debug, Clone)]
pub struct ProvisioningRequirements {
    pub operation_type: OperationType,
    pub source: ProvisioningSource,
    pub symbol_exists: bool,
    pub required_intervals: Vec<Interval>,
    pub historical_days: u32,
    pub warmup_days: u32,
    pub needs_session: bool,
    pub indicator_config: Option<IndicatorConfig>,
    pub meets_session_config_requirements: bool,
    pub auto_provisioned: bool,
    pub provisioning_steps: Vec<ProvisioningStep>,
}

/// Input to [`analyze`]: which regime this add belongs to.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum AddRegime {
    /// Minimal provisioning: warmup only, no quality, `meets_session_config_requirements =
    /// false`. Used for a scanner-triggered indicator add on a symbol the session doesn't
    /// otherwise track.
    Adhoc { warmup_days: u32 },
    /// Full provisioning: historical load, all configured derived intervals, quality
    /// calculation, `meets_session_config_requirements = true`. Used for config-load and
    /// strategy-triggered adds.
    Full { historical_days: u32 },
}

/// Build the requirements for adding `symbol` at `base_interval` (plus any already-configured
/// derived intervals), given whether it already exists in `session_data`.
pub fn analyze(
    session_data: &SessionData,
    symbol: &Symbol,
    source: ProvisioningSource,
    base_interval: &Interval,
    derived_intervals: &[Interval],
    regime: AddRegime,
    indicator_config: Option<IndicatorConfig>,
) -> ProvisioningRequirements {
    let symbol_exists = session_data.contains_symbol(symbol);
    let upgrading = symbol_exists
        && session_data
            .get_symbol_data(symbol, |data| !data.meets_session_config_requirements)
            .unwrap_or(false)
        && matches!(regime, AddRegime::Full { .. });

    let mut required_intervals = vec![base_interval.clone()];
    let (historical_days, warmup_days, needs_session, meets_session_config_requirements) = match regime {
        AddRegime::Adhoc { warmup_days } => {
            if let Some(config) = &indicator_config {
                required_intervals.push(config.interval.clone());
            }
            (0, warmup_days, false, false)
        }
        AddRegime::Full { historical_days } => {
            required_intervals.extend(derived_intervals.iter().cloned());
            (historical_days, 0, true, true)
        }
    };
    required_intervals.sort();
    required_intervals.dedup();

    let mut steps = Vec::new();
    if !symbol_exists {
        steps.push(ProvisioningStep::CreateSymbol);
    } else if upgrading {
        steps.push(ProvisioningStep::UpgradeSymbol);
    }
    for interval in &required_intervals {
        steps.push(ProvisioningStep::AddInterval(interval.clone()));
    }
    if historical_days > 0 {
        steps.push(ProvisioningStep::LoadHistorical);
    }
    if needs_session {
        steps.push(ProvisioningStep::LoadSession);
    }
    if indicator_config.is_some() {
        steps.push(ProvisioningStep::RegisterIndicator);
    }
    if meets_session_config_requirements {
        steps.push(ProvisioningStep::CalculateQuality);
    }

    ProvisioningRequirements {
        operation_type: if indicator_config.is_some() && matches!(regime, AddRegime::Adhoc { .. }) {
            OperationType::Indicator
        } else {
            OperationType::Symbol
        },
        source,
        symbol_exists,
        required_intervals,
        historical_days,
        warmup_days,
        needs_session,
        indicator_config,
        meets_session_config_requirements,
        auto_provisioned: matches!(source, ProvisioningSource::Scanner | ProvisioningSource::Adhoc),
        provisioning_steps: steps,
    }
}

/// Phase 2 output.
#[derive(Debug, Clone)]
pub struct SymbolValidationResult {
    pub can_proceed: bool,
    pub reason: Option<String>,
    pub data_source_available: bool,
    pub has_historical_data: bool,
}

impl SymbolValidationResult {
    fn rejected(reason: impl Into<String>) -> Self {
        Self {
            can_proceed: false,
            reason: Some(reason.into()),
            data_source_available: false,
            has_historical_data: false,
        }
    }
}

/// Validate an add against duplicate-detection rules and repository availability.
///
/// A fully-loaded symbol receiving another full add, or an adhoc indicator already present on
/// a symbol, is rejected outright - neither is an upgrade, both are duplicates.
pub fn validate(
    session_data: &SessionData,
    symbol: &Symbol,
    requirements: &ProvisioningRequirements,
    repository_available: bool,
) -> SymbolValidationResult {
    let already_full = session_data
        .get_symbol_data(symbol, |data| data.meets_session_config_requirements)
        .unwrap_or(false);

    if already_full && requirements.meets_session_config_requirements && requirements.symbol_exists {
        return SymbolValidationResult::rejected("symbol already fully provisioned");
    }

    if requirements.operation_type == OperationType::Indicator {
        if let Some(config) = &requirements.indicator_config {
            let key = session_data::IndicatorKey::new(config.name.clone(), config.period, config.interval.as_str());
            let already_registered = session_data
                .get_symbol_data(symbol, |data| data.indicators.contains_key(&key))
                .unwrap_or(false);
            if already_registered {
                return SymbolValidationResult::rejected("indicator already registered for this symbol");
            }
        }
    }

    if requirements.historical_days > 0 && !repository_available {
        return SymbolValidationResult::rejected("historical data required but no repository is configured");
    }

    SymbolValidationResult {
        can_proceed: true,
        reason: None,
        data_source_available: repository_available,
        has_historical_data: repository_available && requirements.historical_days > 0,
    }
}

/// Phase 3: execute `requirements.provisioning_steps` in order.
///
/// `historical_days`/`session_start` drive how far back `load_historical` reaches; `exchange`
/// is needed only for the `calculate_quality` step.
#[allow(clippy::too_many_arguments)]
pub async fn provision(
    session_data: &SessionData,
    repository: Option<&dyn BarRepository>,
    calendar: &dyn CalendarService,
    symbol: &Symbol,
    base_interval: &Interval,
    exchange: &ExchangeGroup,
    requirements: &ProvisioningRequirements,
    session_start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), ProvisioningError> {
    let added_by: AddedBy = requirements.source.into();

    for step in &requirements.provisioning_steps {
        match step {
            ProvisioningStep::CreateSymbol => {
                info!(%symbol, ?added_by, "provisioning: creating symbol");
                session_data.register_symbol_data(SymbolSessionData::new(
                    symbol.clone(),
                    base_interval.clone(),
                    added_by,
                    requirements.auto_provisioned,
                    requirements.meets_session_config_requirements,
                    now,
                ));
            }
            ProvisioningStep::UpgradeSymbol => {
                info!(%symbol, "provisioning: upgrading from adhoc to full");
                session_data.with_symbol_data_mut(symbol, |data| {
                    data.upgraded_from_adhoc = true;
                    data.meets_session_config_requirements = true;
                });
            }
            ProvisioningStep::AddInterval(interval) => {
                let base = (interval != base_interval).then(|| base_interval.clone());
                session_data.with_symbol_data_mut(symbol, |data| {
                    data.ensure_interval(interval.clone(), base);
                });
            }
            ProvisioningStep::LoadHistorical => {
                let Some(repository) = repository else {
                    warn!(%symbol, "load_historical requested but no repository is configured");
                    continue;
                };
                let start = session_start - chrono::TimeDelta::days(i64::from(requirements.historical_days));
                for interval in &requirements.required_intervals {
                    let bars = repository.get_bars(symbol, interval, start, session_start).await?;
                    session_data.add_bars_batch(symbol, interval, bars, InsertMode::Append);
                }
            }
            ProvisioningStep::LoadSession => {
                let Some(repository) = repository else { continue };
                for interval in &requirements.required_intervals {
                    let bars = repository.get_bars(symbol, interval, session_start, now).await?;
                    session_data.add_bars_batch(symbol, interval, bars, InsertMode::Append);
                }
            }
            ProvisioningStep::RegisterIndicator => {
                info!(%symbol, "provisioning: indicator registration deferred to DataProcessor's catalog config");
            }
            ProvisioningStep::CalculateQuality => {
                let session = calendar.get_trading_session(now.date_naive(), exchange)?;
                if let (Some(open), Some(close)) = (session.open, session.close) {
                    for interval in &requirements.required_intervals {
                        let Ok(info) = interval.parse() else { continue };
                        let bars = session_data
                            .get_symbol_data(symbol, |data| data.bars.get(interval).map(|id| id.bars().to_vec()))
                            .flatten()
                            .unwrap_or_default();
                        let (unique, duplicates) = data_quality_metrics(&bars, open, close);
                        let expected = expected_count(open, close, now, info.seconds());
                        let quality = quality_score(unique, duplicates, expected);
                        session_data.set_quality(symbol, interval, quality);
                    }
                }
            }
        }
    }

    Ok(())
}

fn data_quality_metrics(bars: &[session_data::Bar], open: DateTime<Utc>, close: DateTime<Utc>) -> (u64, u64) {
    let mut seen = std::collections::HashSet::new();
    let mut duplicates = 0u64;
    for bar in bars.iter().filter(|bar| bar.timestamp >= open && bar.timestamp < close) {
        if !seen.insert(bar.timestamp) {
            duplicates += 1;
        }
    }
    (seen.len() as u64, duplicates)
}

fn expected_count(open: DateTime<Utc>, close: DateTime<Utc>, now: DateTime<Utc>, interval_seconds: i64) -> u64 {
    let effective_end = now.min(close);
    if effective_end <= open || interval_seconds <= 0 {
        return 0;
    }
    ((effective_end - open).num_seconds() / interval_seconds) as u64
}

fn quality_score(unique: u64, duplicates: u64, expected: u64) -> f64 {
    if expected == 0 {
        return 100.0;
    }
    let ratio = (unique as f64 - duplicates as f64) / expected as f64;
    ratio.clamp(0.0, 1.0) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use session_data::testing::{FakeBarRepository, FakeCalendarService};

    fn symbol() -> Symbol {
        Symbol::new("TSLA")
    }

    fn base() -> Interval {
        Interval::new("1m")
    }

    /// Spec scenario 6: adhoc indicator add, then a full strategy add, upgrading it.
    #[tokio::test]
    async fn adhoc_add_then_full_add_upgrades_and_preserves_added_at_and_auto_provisioned() {
        let store = SessionData::new();
        let calendar = FakeCalendarService::new();
        let repository = FakeBarRepository::new();
        let exchange = ExchangeGroup::new("US_EQUITY");

        let added_at = Utc.with_ymd_and_hms(2025, 11, 4, 10, 0, 0).unwrap();
        let indicator_config = IndicatorConfig::new("sma", 20, Interval::new("5m"));

        let adhoc_requirements = analyze(
            &store,
            &symbol(),
            ProvisioningSource::Scanner,
            &base(),
            &[],
            AddRegime::Adhoc { warmup_days: 2 },
            Some(indicator_config.clone()),
        );
        assert_eq!(adhoc_requirements.historical_days, 0);
        assert_eq!(adhoc_requirements.warmup_days, 2);
        assert!(!adhoc_requirements.meets_session_config_requirements);
        assert!(adhoc_requirements.auto_provisioned);

        let validation = validate(&store, &symbol(), &adhoc_requirements, true);
        assert!(validation.can_proceed);

        provision(
            &store,
            Some(&repository),
            &calendar,
            &symbol(),
            &base(),
            &exchange,
            &adhoc_requirements,
            added_at,
            added_at,
        )
        .await
        .unwrap();

        assert!(store.contains_symbol(&symbol()));
        assert_eq!(store.get_symbol_data(&symbol(), |d| d.added_by), Some(AddedBy::Scanner));
        assert_eq!(store.get_symbol_data(&symbol(), |d| d.meets_session_config_requirements), Some(false));

        let full_at = Utc.with_ymd_and_hms(2025, 11, 4, 10, 15, 0).unwrap();
        let full_requirements = analyze(
            &store,
            &symbol(),
            ProvisioningSource::Strategy,
            &base(),
            &[Interval::new("5m")],
            AddRegime::Full { historical_days: 30 },
            None,
        );
        assert!(full_requirements.symbol_exists);
        assert!(full_requirements.provisioning_steps.contains(&ProvisioningStep::UpgradeSymbol));

        provision(
            &store,
            Some(&repository),
            &calendar,
            &symbol(),
            &base(),
            &exchange,
            &full_requirements,
            added_at,
            full_at,
        )
        .await
        .unwrap();

        let (added_at_after, auto_provisioned, upgraded, meets_requirements) = store
            .get_symbol_data(&symbol(), |d| (d.added_at, d.auto_provisioned, d.upgraded_from_adhoc, d.meets_session_config_requirements))
            .unwrap();
        assert_eq!(added_at_after, added_at);
        assert!(auto_provisioned);
        assert!(upgraded);
        assert!(meets_requirements);
    }

    #[test]
    fn duplicate_full_add_on_an_already_full_symbol_is_rejected() {
        let store = SessionData::new();
        store.register_symbol_data(SymbolSessionData::new(
            symbol(),
            base(),
            AddedBy::Config,
            false,
            true,
            Utc::now(),
        ));

        let requirements = analyze(
            &store,
            &symbol(),
            ProvisioningSource::Strategy,
            &base(),
            &[],
            AddRegime::Full { historical_days: 30 },
            None,
        );

        let result = validate(&store, &symbol(), &requirements, true);
        assert!(!result.can_proceed);
    }

    #[test]
    fn full_add_requiring_history_without_a_repository_is_rejected() {
        let store = SessionData::new();
        let requirements = analyze(
            &store,
            &symbol(),
            ProvisioningSource::Config,
            &base(),
            &[],
            AddRegime::Full { historical_days: 30 },
            None,
        );

        let result = validate(&store, &symbol(), &requirements, false);
        assert!(!result.can_proceed);
    }
}
