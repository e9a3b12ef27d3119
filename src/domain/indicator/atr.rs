//! Average True Range.
//!
//! TR[0] = high - low; TR[i] = max(high - low, |high - prev_close|, |low - prev_close|)
//! ATR = EMA(TR, n); ATR% = ATR / close × 100

use super::ema::calculate_ema;
use crate::domain::ohlcv::Bar;

#[derive(Debug, Clone, PartialEq)]
pub struct AtrSeries {
    pub atr: Vec<f64>,
    pub atr_pct: Vec<f64>,
}

pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            if i == 0 {
                bar.high - bar.low
            } else {
                bar.true_range(bars[i - 1].close)
            }
        })
        .collect()
}

pub fn calculate_atr(bars: &[Bar], period: usize) -> AtrSeries {
    let atr = calculate_ema(&true_range(bars), period);
    let atr_pct = atr
        .iter()
        .zip(bars)
        .map(|(a, bar)| {
            if bar.close == 0.0 {
                f64::NAN
            } else {
                a / bar.close * 100.0
            }
        })
        .collect();
    AtrSeries { atr, atr_pct }
}
