//! VWAP (Volume Weighted Average Price), intraday only.
//!
//! VWAP = Σ(typical × volume) / Σ(volume), sums reset at each calendar day.
//! A day whose cumulative volume is still zero is NaN.

use crate::domain::ohlcv::Bar;

pub fn calculate_vwap(bars: &[Bar]) -> Vec<f64> {
    let mut values = Vec::with_capacity(bars.len());
    let mut pv_sum = 0.0;
    let mut vol_sum = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        if i > 0 && bar.date() != bars[i - 1].date() {
            pv_sum = 0.0;
            vol_sum = 0.0;
        }
        pv_sum += bar.typical_price() * bar.volume;
        vol_sum += bar.volume;
        values.push(if vol_sum == 0.0 {
            f64::NAN
        } else {
            pv_sum / vol_sum
        });
    }

    values
}
