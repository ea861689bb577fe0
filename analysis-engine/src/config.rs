use chrono::NaiveTime;
use serde::{de::Error as DeError, Deserialize, Deserializer, Serialize};
use session_instrument::{parse_interval, IntervalInfo};

/// One `{start, end, interval}` window within which a regular scanner repeats. Deserialized
/// from a plain interval string (eg/ `"5m"`) and eagerly parsed into an [`IntervalInfo`] so
/// `ScannerManager` never has to re-parse it on every schedule check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScannerSchedule {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub interval: IntervalInfo,
}

impl ScannerSchedule {
    pub fn new(start: NaiveTime, end: NaiveTime, interval: IntervalInfo) -> Self {
        Self { start, end, interval }
    }

    pub fn contains(&self, time_of_day: NaiveTime) -> bool {
        self.start <= time_of_day && time_of_day <= self.end
    }
}

impl<'de> Deserialize<'de> for ScannerSchedule {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Raw {
            start: NaiveTime,
            end: NaiveTime,
            interval: String,
        }

        let raw = Raw::deserialize(deserializer)?;
        let interval = parse_interval(&raw.interval).map_err(DeError::custom)?;
        Ok(ScannerSchedule { start: raw.start, end: raw.end, interval })
    }
}

/// `SessionConfig`'s per-scanner entry: which module/type to load, whether it runs pre-session,
/// and its regular-session schedule(s).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ScannerConfig {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub pre_session: bool,
    #[serde(default)]
    pub regular_session: Vec<ScannerSchedule>,
}

/// `SessionConfig`'s per-strategy entry.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StrategyConfig {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    #[test]
    fn parses_a_schedule_from_an_interval_string() {
        let json = r#"{"start":"09:35:00","end":"15:55:00","interval":"5m"}"#;
        let schedule: ScannerSchedule = serde_json::from_str(json).unwrap();
        assert_eq!(schedule.interval.seconds(), 300);
        assert!(schedule.contains(NaiveTime::from_hms_opt(10, 0, 0).unwrap()));
        assert!(!schedule.contains(NaiveTime::from_hms_opt(16, 0, 0).unwrap()));
    }

    #[test]
    fn rejects_an_unparseable_interval() {
        let json = r#"{"start":"09:35:00","end":"15:55:00","interval":"bogus"}"#;
        assert!(serde_json::from_str::<ScannerSchedule>(json).is_err());
    }

    #[test]
    fn scanner_config_defaults_enabled_true() {
        let json = r#"{"name":"gap_scanner"}"#;
        let config: ScannerConfig = serde_json::from_str(json).unwrap();
        assert!(config.enabled);
        assert!(!config.pre_session);
        assert!(config.regular_session.is_empty());
    }

    #[test]
    fn rejects_unknown_fields() {
        let json = r#"{"name":"gap_scanner","bogus":true}"#;
        assert!(serde_json::from_str::<ScannerConfig>(json).is_err());
    }
}
