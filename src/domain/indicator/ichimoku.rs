//! Ichimoku Kinko Hyo.
//!
//! Tenkan  = (max high(9) + min low(9)) / 2
//! Kijun   = (max high(26) + min low(26)) / 2
//! SenkouA = (Tenkan + Kijun) / 2, shifted forward 26 bars
//! SenkouB = (max high(52) + min low(52)) / 2, shifted forward 26 bars
//! Chikou  = close, shifted back 26 bars
//!
//! The displacement equals the Kijun period. Shifted values that fall outside
//! the series are dropped so every line stays aligned with the bars.

use crate::domain::indicator_helpers::{rolling_max, rolling_min, shift};
use crate::domain::ohlcv::Bar;

pub const DEFAULT_TENKAN: usize = 9;
pub const DEFAULT_KIJUN: usize = 26;
pub const DEFAULT_SENKOU: usize = 52;

#[derive(Debug, Clone, PartialEq)]
pub struct IchimokuSeries {
    pub tenkan: Vec<f64>,
    pub kijun: Vec<f64>,
    pub senkou_a: Vec<f64>,
    pub senkou_b: Vec<f64>,
    pub chikou: Vec<f64>,
}

fn midpoint(highs: &[f64], lows: &[f64], period: usize) -> Vec<f64> {
    rolling_max(highs, period)
        .iter()
        .zip(rolling_min(lows, period))
        .map(|(h, l)| (h + l) / 2.0)
        .collect()
}

pub fn calculate_ichimoku(bars: &[Bar], tenkan: usize, kijun: usize, senkou: usize) -> IchimokuSeries {
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let displacement = kijun as isize;

    let tenkan_line = midpoint(&highs, &lows, tenkan);
    let kijun_line = midpoint(&highs, &lows, kijun);
    let span_a: Vec<f64> = tenkan_line
        .iter()
        .zip(&kijun_line)
        .map(|(t, k)| (t + k) / 2.0)
        .collect();
    let span_b = midpoint(&highs, &lows, senkou);

    IchimokuSeries {
        senkou_a: shift(&span_a, displacement),
        senkou_b: shift(&span_b, displacement),
        chikou: shift(&closes, -displacement),
        tenkan: tenkan_line,
        kijun: kijun_line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn make_bars(n: usize) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (0..n)
            .map(|i| {
                let close = 100.0 + i as f64;
                Bar {
                    timestamp: start + Duration::days(i as i64),
                    open: close,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 1000.0,
                }
            })
            .collect()
    }

    #[test]
    fn tenkan_midpoint() {
        let bars = make_bars(10);
        let series = calculate_ichimoku(&bars, 3, 5, 8);
        // bars 0..=2: max high 103, min low 99
        assert!((series.tenkan[2] - 101.0).abs() < 1e-12);
        assert!(series.tenkan[1].is_nan());
    }

    #[test]
    fn senkou_is_displaced_forward() {
        let bars = make_bars(20);
        let series = calculate_ichimoku(&bars, 3, 5, 8);
        let a_at_6 = (series.tenkan[6] + series.kijun[6]) / 2.0;
        assert!((series.senkou_a[11] - a_at_6).abs() < 1e-12);
        assert!(series.senkou_b[11].is_nan());
        assert!(!series.senkou_b[12].is_nan());
    }

    #[test]
    fn chikou_is_displaced_back() {
        let bars = make_bars(20);
        let series = calculate_ichimoku(&bars, 3, 5, 8);
        assert_eq!(series.chikou[0], bars[5].close);
        assert!(series.chikou[15].is_nan());
        assert!(series.chikou[19].is_nan());
    }
}
