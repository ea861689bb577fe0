use indicator_catalog::IndicatorConfig;
use session_instrument::Interval;

/// One configured derived interval: `multiple` base-interval bars make up one bar here.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedIntervalSpec {
    pub interval: Interval,
    pub multiple: u32,
}

impl DerivedIntervalSpec {
    pub fn new(interval: Interval, multiple: u32) -> Self {
        Self { interval, multiple }
    }
}

/// Static configuration the Processor needs at construction: which derived intervals to
/// synthesize and which indicators to keep current, applied uniformly across every symbol
/// that shares the base interval.
#[derive(Debug, Clone, Default)]
pub struct DataProcessorConfig {
    pub derived_intervals: Vec<DerivedIntervalSpec>,
    pub indicators: Vec<IndicatorConfig>,
}

impl DataProcessorConfig {
    pub fn new(derived_intervals: Vec<DerivedIntervalSpec>, indicators: Vec<IndicatorConfig>) -> Self {
        Self {
            derived_intervals,
            indicators,
        }
    }
}
