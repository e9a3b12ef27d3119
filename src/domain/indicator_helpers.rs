//! Shared rolling-window and smoothing primitives for indicator calculations.
//!
//! Every helper returns a series aligned 1:1 with its input. Cells whose window
//! is not yet full, or whose window contains a NaN, are NaN.

/// Simple moving average over `period` values.
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    rolling(values, period, |w| w.iter().sum::<f64>() / w.len() as f64)
}

/// Rolling population standard deviation (divides by N, not N-1).
pub fn rolling_stddev(values: &[f64], period: usize) -> Vec<f64> {
    rolling(values, period, |w| {
        let n = w.len() as f64;
        let mean = w.iter().sum::<f64>() / n;
        let variance = w.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
        variance.sqrt()
    })
}

pub fn rolling_max(values: &[f64], period: usize) -> Vec<f64> {
    rolling(values, period, |w| w.iter().copied().fold(f64::MIN, f64::max))
}

pub fn rolling_min(values: &[f64], period: usize) -> Vec<f64> {
    rolling(values, period, |w| w.iter().copied().fold(f64::MAX, f64::min))
}

fn rolling<F>(values: &[f64], period: usize, f: F) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64,
{
    if period == 0 {
        return vec![f64::NAN; values.len()];
    }
    (0..values.len())
        .map(|i| {
            if i + 1 < period {
                return f64::NAN;
            }
            let window = &values[i + 1 - period..=i];
            if window.iter().any(|v| v.is_nan()) {
                f64::NAN
            } else {
                f(window)
            }
        })
        .collect()
}

/// Recursive exponential smoothing with factor `alpha`.
///
/// Seeded with the first non-NaN input; cells before the seed are NaN. A NaN
/// input after the seed yields NaN for that cell and leaves the running value
/// untouched.
pub fn exponential_smooth(values: &[f64], alpha: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    let mut state: Option<f64> = None;

    for &value in values {
        if value.is_nan() {
            out.push(f64::NAN);
            continue;
        }
        let next = match state {
            None => value,
            Some(prev) => alpha * value + (1.0 - alpha) * prev,
        };
        state = Some(next);
        out.push(next);
    }

    out
}

/// Wilder smoothing: exponential smoothing with alpha = 1/n.
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 {
        return vec![f64::NAN; values.len()];
    }
    exponential_smooth(values, 1.0 / period as f64)
}

/// Shift a series by `offset` bars: positive moves values later, negative
/// moves them earlier. Vacated cells are NaN.
pub fn shift(values: &[f64], offset: isize) -> Vec<f64> {
    let n = values.len() as isize;
    (0..n)
        .map(|i| {
            let src = i - offset;
            if src >= 0 && src < n {
                values[src as usize]
            } else {
                f64::NAN
            }
        })
        .collect()
}
