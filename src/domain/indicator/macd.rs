//! MACD (Moving Average Convergence Divergence).
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//! Histogram = MACD Line - Signal Line
//!
//! Default parameters: fast=12, slow=26, signal=9

use super::ema::calculate_ema;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub fn calculate_macd(closes: &[f64], fast: usize, slow: usize, signal_period: usize) -> MacdSeries {
    let ema_fast = calculate_ema(closes, fast);
    let ema_slow = calculate_ema(closes, slow);

    let line: Vec<f64> = ema_fast.iter().zip(&ema_slow).map(|(f, s)| f - s).collect();
    let signal = calculate_ema(&line, signal_period);
    let histogram = line.iter().zip(&signal).map(|(m, s)| m - s).collect();

    MacdSeries {
        line,
        signal,
        histogram,
    }
}

pub fn calculate_macd_default(closes: &[f64]) -> MacdSeries {
    calculate_macd(closes, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trending(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64 * 0.5 + (i as f64).sin()).collect()
    }

    #[test]
    fn macd_lengths_align() {
        let closes = trending(40);
        let macd = calculate_macd_default(&closes);
        assert_eq!(macd.line.len(), 40);
        assert_eq!(macd.signal.len(), 40);
        assert_eq!(macd.histogram.len(), 40);
    }

    #[test]
    fn histogram_is_line_minus_signal() {
        let macd = calculate_macd_default(&trending(60));
        for i in 0..60 {
            assert_eq!(macd.histogram[i], macd.line[i] - macd.signal[i]);
        }
    }

    #[test]
    fn macd_zero_on_flat_prices() {
        let macd = calculate_macd(&[50.0; 30], 3, 6, 4);
        for i in 0..30 {
            assert!(macd.line[i].abs() < 1e-12);
            assert!(macd.signal[i].abs() < 1e-12);
        }
    }

    #[test]
    fn macd_positive_in_uptrend() {
        let closes: Vec<f64> = (0..50).map(|i| 100.0 + i as f64).collect();
        let macd = calculate_macd_default(&closes);
        assert!(macd.line[49] > 0.0);
    }

    #[test]
    fn macd_line_matches_ema_difference() {
        let closes = trending(30);
        let macd = calculate_macd(&closes, 3, 5, 2);
        let fast = calculate_ema(&closes, 3);
        let slow = calculate_ema(&closes, 5);
        assert!((macd.line[20] - (fast[20] - slow[20])).abs() < 1e-12);
    }
}
