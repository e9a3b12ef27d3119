//! Trendline breakout flags.
//!
//! For each bar `i >= lookback`, the `lookback` closes before `i` form the
//! window. Peaks and troughs of the window (prominence at least
//! `prominence_fraction × window range`, no distance constraint) give a
//! two-point resistance and support line through the two most recent of each
//! kind. Both lines are projected to the current bar (window position
//! `lookback`). Closing above resistance flags `1`, below support flags `-1`;
//! support is checked second and wins when both fire. Everything else is `0`.

use super::extrema::{find_peaks, find_troughs, ExtremumParams, ExtremumPoint};
use super::trendline::fit_two_point;
use crate::domain::error::BarscopeError;

pub const DEFAULT_LOOKBACK: usize = 30;
pub const DEFAULT_PROMINENCE_FRACTION: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakoutConfig {
    pub lookback: usize,
    pub prominence_fraction: f64,
}

impl Default for BreakoutConfig {
    fn default() -> Self {
        Self {
            lookback: DEFAULT_LOOKBACK,
            prominence_fraction: DEFAULT_PROMINENCE_FRACTION,
        }
    }
}

impl BreakoutConfig {
    pub fn new(lookback: usize, prominence_fraction: f64) -> Result<Self, BarscopeError> {
        if lookback < 3 {
            return Err(BarscopeError::invalid(
                "breakout.lookback",
                "must be at least 3 bars",
            ));
        }
        if prominence_fraction.is_nan() || prominence_fraction < 0.0 {
            return Err(BarscopeError::invalid(
                "breakout.prominence_fraction",
                "must be non-negative",
            ));
        }
        Ok(Self {
            lookback,
            prominence_fraction,
        })
    }
}

/// Breakout flag per bar, aligned with `closes`.
pub fn detect_breakouts(closes: &[f64], config: &BreakoutConfig) -> Vec<i8> {
    let mut flags = vec![0i8; closes.len()];
    let params = ExtremumParams {
        distance: 1,
        prominence_fraction: config.prominence_fraction,
    };
    let at = config.lookback as f64;
    let project_last_two = |points: &[ExtremumPoint]| -> Option<f64> {
        match points {
            [.., a, b] => fit_two_point(a, b).map(|line| line.project(at)),
            _ => None,
        }
    };

    for i in config.lookback..closes.len() {
        let window = &closes[i - config.lookback..i];
        let close = closes[i];
        if close.is_nan() || !has_range(window) {
            continue;
        }

        if let Some(resistance) = project_last_two(&find_peaks(window, &params)) {
            if close > resistance {
                flags[i] = 1;
            }
        }
        if let Some(support) = project_last_two(&find_troughs(window, &params)) {
            if close < support {
                flags[i] = -1;
            }
        }
    }

    flags
}

fn has_range(window: &[f64]) -> bool {
    let mut min = f64::MAX;
    let mut max = f64::MIN;
    for &v in window {
        if v.is_nan() {
            return false;
        }
        min = min.min(v);
        max = max.max(v);
    }
    max > min
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Falling highs: peaks at 2 (110) and 6 (106), resistance slope -1.
    fn descending_window() -> Vec<f64> {
        vec![100.0, 105.0, 110.0, 104.0, 100.0, 103.0, 106.0, 102.0, 101.0, 100.5]
    }

    #[test]
    fn config_defaults() {
        let config = BreakoutConfig::default();
        assert_eq!(config.lookback, 30);
        assert_eq!(config.prominence_fraction, 0.02);
    }

    #[test]
    fn config_rejects_bad_values() {
        assert!(BreakoutConfig::new(2, 0.02).is_err());
        assert!(BreakoutConfig::new(30, -0.1).is_err());
        assert!(BreakoutConfig::new(30, f64::NAN).is_err());
        assert!(BreakoutConfig::new(10, 0.0).is_ok());
    }

    #[test]
    fn close_above_resistance_flags_up() {
        let mut closes = descending_window();
        // line through (2,110) and (6,106) projects to 102 at x=10
        closes.push(103.0);
        let config = BreakoutConfig::new(10, 0.02).unwrap();
        let flags = detect_breakouts(&closes, &config);
        assert_eq!(flags.len(), 11);
        assert!(flags[..10].iter().all(|&f| f == 0));
        assert_eq!(flags[10], 1);
    }

    #[test]
    fn close_below_projection_but_above_support_is_neutral() {
        let mut closes = descending_window();
        closes.push(101.5);
        let config = BreakoutConfig::new(10, 0.02).unwrap();
        // the window holds a single trough, so there is no support line
        assert_eq!(detect_breakouts(&closes, &config)[10], 0);
    }

    #[test]
    fn close_below_support_flags_down() {
        // rising lows: troughs at 2 (100) and 6 (102), support slope 0.5
        let mut closes = vec![106.0, 103.0, 100.0, 104.0, 108.0, 105.0, 102.0, 106.0, 107.0, 108.0];
        closes.push(103.0);
        let config = BreakoutConfig::new(10, 0.02).unwrap();
        // projected support at x=10 is 104
        assert_eq!(detect_breakouts(&closes, &config)[10], -1);
    }

    #[test]
    fn flat_window_is_skipped() {
        let mut closes = vec![100.0; 10];
        closes.push(150.0);
        let config = BreakoutConfig::new(10, 0.02).unwrap();
        assert_eq!(detect_breakouts(&closes, &config)[10], 0);
    }

    #[test]
    fn short_series_has_no_flags() {
        let closes = vec![1.0, 2.0, 3.0];
        assert_eq!(detect_breakouts(&closes, &BreakoutConfig::default()), vec![0, 0, 0]);
    }
}
