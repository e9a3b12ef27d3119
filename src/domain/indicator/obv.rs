//! OBV (On-Balance Volume) indicator.

use crate::domain::ohlcv::Bar;

/// Calculate OBV (On-Balance Volume).
///
/// OBV[0] = volume[0]
/// If close[i] > close[i-1]: OBV[i] = OBV[i-1] + volume[i]
/// If close[i] < close[i-1]: OBV[i] = OBV[i-1] - volume[i]
/// If close[i] == close[i-1]: OBV[i] = OBV[i-1]
///
/// No warmup period.
pub fn calculate_obv(bars: &[Bar]) -> Vec<f64> {
    let mut values = Vec::with_capacity(bars.len());
    let mut obv = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        if i == 0 {
            obv = bar.volume;
        } else if bar.close > bars[i - 1].close {
            obv += bar.volume;
        } else if bar.close < bars[i - 1].close {
            obv -= bar.volume;
        }
        values.push(obv);
    }

    values
}
