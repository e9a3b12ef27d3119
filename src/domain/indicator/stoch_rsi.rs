//! Stochastic RSI.
//!
//! raw = (RSI - min(RSI, n)) / (max(RSI, n) - min(RSI, n))
//! %K = SMA(raw, k), %D = SMA(%K, d)
//!
//! Output is a fraction in [0, 1]. A window with zero RSI range is NaN.

use super::rsi::calculate_rsi;
use crate::domain::indicator_helpers::{rolling_max, rolling_min, sma};

pub const DEFAULT_RSI_PERIOD: usize = 14;
pub const DEFAULT_STOCH_PERIOD: usize = 14;
pub const DEFAULT_K: usize = 3;
pub const DEFAULT_D: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct StochRsiSeries {
    pub k: Vec<f64>,
    pub d: Vec<f64>,
}

pub fn calculate_stoch_rsi(
    closes: &[f64],
    rsi_period: usize,
    stoch_period: usize,
    k_period: usize,
    d_period: usize,
) -> StochRsiSeries {
    let rsi = calculate_rsi(closes, rsi_period);
    let highest = rolling_max(&rsi, stoch_period);
    let lowest = rolling_min(&rsi, stoch_period);

    let raw: Vec<f64> = (0..rsi.len())
        .map(|i| {
            let range = highest[i] - lowest[i];
            if range.is_nan() || range == 0.0 {
                f64::NAN
            } else {
                (rsi[i] - lowest[i]) / range
            }
        })
        .collect();

    let k = sma(&raw, k_period);
    let d = sma(&k, d_period);
    StochRsiSeries { k, d }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oscillating(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + (i as f64 * 0.6).sin() * 4.0).collect()
    }

    #[test]
    fn warmup_length() {
        let series = calculate_stoch_rsi(&oscillating(40), 14, 14, 3, 3);
        // RSI defined from 1, raw from 14, %K from 16, %D from 18
        assert!(series.k[15].is_nan());
        assert!(!series.k[16].is_nan());
        assert!(series.d[17].is_nan());
        assert!(!series.d[18].is_nan());
    }

    #[test]
    fn values_are_fractions() {
        let series = calculate_stoch_rsi(&oscillating(80), 14, 14, 3, 3);
        for v in series.k.iter().chain(&series.d).filter(|v| !v.is_nan()) {
            assert!((0.0..=1.0).contains(v), "value {} out of range", v);
        }
    }

    #[test]
    fn monotonic_rise_has_no_range() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let series = calculate_stoch_rsi(&closes, 14, 14, 3, 3);
        assert!(series.k.iter().all(|v| v.is_nan()));
    }
}
