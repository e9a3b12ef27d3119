//! Exponential Moving Average.
//!
//! k = 2/(n+1), seeded with the first close, then EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Defined from the first bar; no warmup.

use crate::domain::indicator_helpers::exponential_smooth;

pub fn calculate_ema(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 {
        return vec![f64::NAN; values.len()];
    }
    let k = 2.0 / (period as f64 + 1.0);
    exponential_smooth(values, k)
}
