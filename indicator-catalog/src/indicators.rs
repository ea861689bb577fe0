use crate::{catalog::Indicator, config::IndicatorConfig};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use session_data::{Bar, IndicatorCarry, IndicatorState, IndicatorValue};

fn not_ready(prior: &IndicatorState, bars_seen: u32) -> IndicatorState {
    IndicatorState {
        key: prior.key.clone(),
        value: None,
        ready: false,
        carry: None,
        bars_seen,
    }
}

#[derive(Debug)]
pub struct SimpleMovingAverage;

impl Indicator for SimpleMovingAverage {
    fn name(&self) -> &'static str {
        "sma"
    }

    fn compute(&self, config: &IndicatorConfig, bars: &[Bar], prior: &IndicatorState) -> IndicatorState {
        let period = config.period as usize;
        if period == 0 || bars.len() < period {
            return not_ready(prior, bars.len() as u32);
        }
        let window = &bars[bars.len() - period..];
        let sum: Decimal = window.iter().map(|bar| bar.close).sum();
        let avg = sum / Decimal::from(period as u64);

        IndicatorState {
            key: prior.key.clone(),
            value: Some(IndicatorValue::Scalar(avg)),
            ready: true,
            carry: None,
            bars_seen: bars.len() as u32,
        }
    }
}

#[derive(Debug)]
pub struct ExponentialMovingAverage;

impl Indicator for ExponentialMovingAverage {
    fn name(&self) -> &'static str {
        "ema"
    }

    fn compute(&self, config: &IndicatorConfig, bars: &[Bar], prior: &IndicatorState) -> IndicatorState {
        let period = config.period as usize;
        if period == 0 || bars.is_empty() {
            return not_ready(prior, bars.len() as u32);
        }

        let alpha = Decimal::from(2u32) / Decimal::from((period + 1) as u64);
        let last_close = bars[bars.len() - 1].close;

        let value = match prior.carry {
            Some(IndicatorCarry::Ema { value }) => alpha * last_close + (Decimal::ONE - alpha) * value,
            _ => {
                if bars.len() < period {
                    return not_ready(prior, bars.len() as u32);
                }
                let window = &bars[bars.len() - period..];
                let sum: Decimal = window.iter().map(|bar| bar.close).sum();
                sum / Decimal::from(period as u64)
            }
        };

        IndicatorState {
            key: prior.key.clone(),
            value: Some(IndicatorValue::Scalar(value)),
            ready: true,
            carry: Some(IndicatorCarry::Ema { value }),
            bars_seen: bars.len() as u32,
        }
    }
}

/// Wilder-smoothed relative strength index.
#[derive(Debug)]
pub struct RelativeStrengthIndex;

impl RelativeStrengthIndex {
    fn rsi_from_averages(avg_gain: Decimal, avg_loss: Decimal) -> Decimal {
        if avg_loss.is_zero() {
            return Decimal::from(100u32);
        }
        let rs = avg_gain / avg_loss;
        Decimal::from(100u32) - (Decimal::from(100u32) / (Decimal::ONE + rs))
    }
}

impl Indicator for RelativeStrengthIndex {
    fn name(&self) -> &'static str {
        "rsi"
    }

    fn warmup_bars(&self, config: &IndicatorConfig) -> usize {
        config.period as usize + 1
    }

    fn compute(&self, config: &IndicatorConfig, bars: &[Bar], prior: &IndicatorState) -> IndicatorState {
        let period = config.period as usize;
        if period == 0 || bars.len() < 2 {
            return not_ready(prior, bars.len() as u32);
        }

        let (avg_gain, avg_loss) = match prior.carry {
            Some(IndicatorCarry::WilderRsi { avg_gain, avg_loss }) => {
                let diff = bars[bars.len() - 1].close - bars[bars.len() - 2].close;
                let gain = diff.max(Decimal::ZERO);
                let loss = (-diff).max(Decimal::ZERO);
                let period_dec = Decimal::from(period as u64);
                (
                    (avg_gain * Decimal::from((period - 1) as u64) + gain) / period_dec,
                    (avg_loss * Decimal::from((period - 1) as u64) + loss) / period_dec,
                )
            }
            _ => {
                if bars.len() < period + 1 {
                    return not_ready(prior, bars.len() as u32);
                }
                let window = &bars[bars.len() - period - 1..];
                let mut gain_sum = Decimal::ZERO;
                let mut loss_sum = Decimal::ZERO;
                for pair in window.windows(2) {
                    let diff = pair[1].close - pair[0].close;
                    gain_sum += diff.max(Decimal::ZERO);
                    loss_sum += (-diff).max(Decimal::ZERO);
                }
                let period_dec = Decimal::from(period as u64);
                (gain_sum / period_dec, loss_sum / period_dec)
            }
        };

        IndicatorState {
            key: prior.key.clone(),
            value: Some(IndicatorValue::Scalar(Self::rsi_from_averages(avg_gain, avg_loss))),
            ready: true,
            carry: Some(IndicatorCarry::WilderRsi { avg_gain, avg_loss }),
            bars_seen: bars.len() as u32,
        }
    }
}

#[derive(Debug)]
pub struct Macd;

impl Indicator for Macd {
    fn name(&self) -> &'static str {
        "macd"
    }

    fn warmup_bars(&self, config: &IndicatorConfig) -> usize {
        config.param("slow_period", 26.0) as usize
    }

    fn compute(&self, config: &IndicatorConfig, bars: &[Bar], prior: &IndicatorState) -> IndicatorState {
        let fast_period = config.param("fast_period", 12.0) as usize;
        let slow_period = config.param("slow_period", 26.0) as usize;
        if fast_period == 0 || slow_period == 0 || bars.is_empty() {
            return not_ready(prior, bars.len() as u32);
        }

        let last_close = bars[bars.len() - 1].close;
        let fast_alpha = Decimal::from(2u32) / Decimal::from((fast_period + 1) as u64);
        let slow_alpha = Decimal::from(2u32) / Decimal::from((slow_period + 1) as u64);

        let (fast_ema, slow_ema) = match prior.carry {
            Some(IndicatorCarry::Macd { fast_ema, slow_ema }) => (
                fast_alpha * last_close + (Decimal::ONE - fast_alpha) * fast_ema,
                slow_alpha * last_close + (Decimal::ONE - slow_alpha) * slow_ema,
            ),
            _ => {
                if bars.len() < slow_period {
                    return not_ready(prior, bars.len() as u32);
                }
                let seed = |period: usize| -> Decimal {
                    let window = &bars[bars.len() - period..];
                    window.iter().map(|bar| bar.close).sum::<Decimal>() / Decimal::from(period as u64)
                };
                (seed(fast_period), seed(slow_period))
            }
        };

        let mut components = IndexMap::new();
        components.insert("macd".to_string(), fast_ema - slow_ema);
        components.insert("fast_ema".to_string(), fast_ema);
        components.insert("slow_ema".to_string(), slow_ema);

        IndicatorState {
            key: prior.key.clone(),
            value: Some(IndicatorValue::Multi(components)),
            ready: true,
            carry: Some(IndicatorCarry::Macd { fast_ema, slow_ema }),
            bars_seen: bars.len() as u32,
        }
    }
}

#[derive(Debug)]
pub struct BollingerBands;

impl Indicator for BollingerBands {
    fn name(&self) -> &'static str {
        "bollinger"
    }

    fn compute(&self, config: &IndicatorConfig, bars: &[Bar], prior: &IndicatorState) -> IndicatorState {
        let period = config.period as usize;
        if period == 0 || bars.len() < period {
            return not_ready(prior, bars.len() as u32);
        }

        let window = &bars[bars.len() - period..];
        let period_dec = Decimal::from(period as u64);
        let mean: Decimal = window.iter().map(|bar| bar.close).sum::<Decimal>() / period_dec;
        let variance: Decimal =
            window.iter().map(|bar| (bar.close - mean) * (bar.close - mean)).sum::<Decimal>() / period_dec;
        let stddev = variance.sqrt().unwrap_or(Decimal::ZERO);
        let k = Decimal::try_from(config.param("k", 2.0)).unwrap_or(Decimal::from(2u32));

        let mut components = IndexMap::new();
        components.insert("middle".to_string(), mean);
        components.insert("upper".to_string(), mean + k * stddev);
        components.insert("lower".to_string(), mean - k * stddev);

        IndicatorState {
            key: prior.key.clone(),
            value: Some(IndicatorValue::Multi(components)),
            ready: true,
            carry: None,
            bars_seen: bars.len() as u32,
        }
    }
}

#[derive(Debug)]
pub struct Stochastic;

impl Indicator for Stochastic {
    fn name(&self) -> &'static str {
        "stochastic"
    }

    fn compute(&self, config: &IndicatorConfig, bars: &[Bar], prior: &IndicatorState) -> IndicatorState {
        let period = config.period as usize;
        if period == 0 || bars.len() < period {
            return not_ready(prior, bars.len() as u32);
        }

        let window = &bars[bars.len() - period..];
        let highest = window.iter().map(|bar| bar.high).max().unwrap();
        let lowest = window.iter().map(|bar| bar.low).min().unwrap();
        let last_close = bars[bars.len() - 1].close;

        let k = if highest == lowest {
            Decimal::from(50u32)
        } else {
            (last_close - lowest) / (highest - lowest) * Decimal::from(100u32)
        };

        let mut components = IndexMap::new();
        components.insert("k".to_string(), k);

        IndicatorState {
            key: prior.key.clone(),
            value: Some(IndicatorValue::Multi(components)),
            ready: true,
            carry: None,
            bars_seen: bars.len() as u32,
        }
    }
}

#[derive(Debug)]
pub struct HighLow;

impl Indicator for HighLow {
    fn name(&self) -> &'static str {
        "high_low"
    }

    fn warmup_bars(&self, _config: &IndicatorConfig) -> usize {
        1
    }

    fn compute(&self, config: &IndicatorConfig, bars: &[Bar], prior: &IndicatorState) -> IndicatorState {
        if bars.is_empty() {
            return not_ready(prior, 0);
        }

        let window: &[Bar] = if config.period == 0 {
            bars
        } else {
            let period = config.period as usize;
            &bars[bars.len().saturating_sub(period)..]
        };

        let high = window.iter().map(|bar| bar.high).max().unwrap();
        let low = window.iter().map(|bar| bar.low).min().unwrap();

        let mut components = IndexMap::new();
        components.insert("high".to_string(), high);
        components.insert("low".to_string(), low);

        IndicatorState {
            key: prior.key.clone(),
            value: Some(IndicatorValue::Multi(components)),
            ready: true,
            carry: None,
            bars_seen: bars.len() as u32,
        }
    }
}

/// Classic floor-trader pivot points, derived from the most recently completed bar.
#[derive(Debug)]
pub struct Pivots;

impl Indicator for Pivots {
    fn name(&self) -> &'static str {
        "pivots"
    }

    fn warmup_bars(&self, _config: &IndicatorConfig) -> usize {
        1
    }

    fn compute(&self, _config: &IndicatorConfig, bars: &[Bar], prior: &IndicatorState) -> IndicatorState {
        let Some(basis) = bars.last() else {
            return not_ready(prior, 0);
        };

        let three = Decimal::from(3u32);
        let pivot = (basis.high + basis.low + basis.close) / three;
        let r1 = pivot * Decimal::from(2u32) - basis.low;
        let s1 = pivot * Decimal::from(2u32) - basis.high;
        let r2 = pivot + (basis.high - basis.low);
        let s2 = pivot - (basis.high - basis.low);

        let mut components = IndexMap::new();
        components.insert("pivot".to_string(), pivot);
        components.insert("r1".to_string(), r1);
        components.insert("s1".to_string(), s1);
        components.insert("r2".to_string(), r2);
        components.insert("s2".to_string(), s2);

        IndicatorState {
            key: prior.key.clone(),
            value: Some(IndicatorValue::Multi(components)),
            ready: true,
            carry: None,
            bars_seen: bars.len() as u32,
        }
    }
}
