//! Bollinger Bands.
//!
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//! - Bandwidth: (Upper - Lower) / Middle × 100
//! - %B: (Close - Lower) / (Upper - Lower)
//!
//! Where StdDev is population standard deviation (divides by N, not N-1).
//!
//! Default parameters: period=20, multiplier=2.0
//! Warmup: first (period-1) bars are NaN.

use crate::domain::indicator_helpers::{rolling_stddev, sma};

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_MULT_X100: u32 = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerSeries {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
    pub bandwidth: Vec<f64>,
    pub percent_b: Vec<f64>,
}

pub fn calculate_bollinger(closes: &[f64], period: usize, stddev_mult_x100: u32) -> BollingerSeries {
    let mult = stddev_mult_x100 as f64 / 100.0;
    let middle = sma(closes, period);
    let stddev = rolling_stddev(closes, period);

    let upper: Vec<f64> = middle.iter().zip(&stddev).map(|(m, s)| m + mult * s).collect();
    let lower: Vec<f64> = middle.iter().zip(&stddev).map(|(m, s)| m - mult * s).collect();

    let bandwidth = (0..closes.len())
        .map(|i| {
            if middle[i] == 0.0 {
                f64::NAN
            } else {
                (upper[i] - lower[i]) / middle[i] * 100.0
            }
        })
        .collect();

    let percent_b = (0..closes.len())
        .map(|i| {
            let width = upper[i] - lower[i];
            if width == 0.0 {
                f64::NAN
            } else {
                (closes[i] - lower[i]) / width
            }
        })
        .collect();

    BollingerSeries {
        upper,
        middle,
        lower,
        bandwidth,
        percent_b,
    }
}
