//! Peak and trough detection.
//!
//! A candidate is a strict local maximum (plateaus resolve to their middle
//! index, edges never qualify). A candidate is accepted when its topographic
//! prominence reaches `prominence_fraction × (max − min)` of the searched
//! series and it sits at least `distance` bars after the previously accepted
//! extremum of the same kind. Troughs are peaks of the negated series.

use crate::domain::ohlcv::Interval;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ExtremumKind {
    Peak,
    Trough,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ExtremumPoint {
    pub index: usize,
    pub price: f64,
    pub kind: ExtremumKind,
    pub prominence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtremumParams {
    /// Minimum bar gap between two accepted extrema of the same kind.
    pub distance: usize,
    /// Required prominence as a fraction of the searched series' range.
    pub prominence_fraction: f64,
}

impl ExtremumParams {
    pub fn for_interval(interval: Interval) -> Self {
        let (distance, prominence_fraction) = match interval {
            Interval::OneHour => (3, 0.001),
            Interval::FourHours => (5, 0.002),
            Interval::OneDay => (10, 0.005),
            Interval::OneWeek => (15, 0.01),
            Interval::OneMonth => (20, 0.015),
        };
        Self {
            distance,
            prominence_fraction,
        }
    }
}

pub fn find_peaks(values: &[f64], params: &ExtremumParams) -> Vec<ExtremumPoint> {
    detect(values, params, ExtremumKind::Peak)
}

pub fn find_troughs(values: &[f64], params: &ExtremumParams) -> Vec<ExtremumPoint> {
    let negated: Vec<f64> = values.iter().map(|v| -v).collect();
    detect(&negated, params, ExtremumKind::Trough)
}

/// Peaks and troughs together, ordered by index.
pub fn find_extrema(values: &[f64], params: &ExtremumParams) -> Vec<ExtremumPoint> {
    let mut points = find_peaks(values, params);
    points.extend(find_troughs(values, params));
    points.sort_by_key(|p| p.index);
    points
}

fn detect(values: &[f64], params: &ExtremumParams, kind: ExtremumKind) -> Vec<ExtremumPoint> {
    let Some(range) = value_range(values) else {
        return Vec::new();
    };
    let threshold = range * params.prominence_fraction;

    let mut accepted: Vec<ExtremumPoint> = Vec::new();
    for index in local_maxima(values) {
        let prominence = prominence(values, index);
        if prominence < threshold {
            continue;
        }
        if let Some(prev) = accepted.last() {
            if index - prev.index < params.distance {
                continue;
            }
        }
        let price = match kind {
            ExtremumKind::Peak => values[index],
            ExtremumKind::Trough => -values[index],
        };
        accepted.push(ExtremumPoint {
            index,
            price,
            kind,
            prominence,
        });
    }
    accepted
}

fn value_range(values: &[f64]) -> Option<f64> {
    let mut defined = values.iter().copied().filter(|v| !v.is_nan()).peekable();
    defined.peek()?;
    let (min, max) = defined.fold((f64::MAX, f64::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));
    Some(max - min)
}

/// Indices of local maxima; a flat top reports its middle index.
fn local_maxima(values: &[f64]) -> Vec<usize> {
    let n = values.len();
    let mut maxima = Vec::new();
    if n < 3 {
        return maxima;
    }

    let mut i = 1;
    while i < n - 1 {
        if values[i - 1] < values[i] {
            let mut ahead = i + 1;
            while ahead < n - 1 && values[ahead] == values[i] {
                ahead += 1;
            }
            if values[ahead] < values[i] {
                maxima.push((i + ahead - 1) / 2);
                i = ahead;
                continue;
            }
        }
        i += 1;
    }
    maxima
}

/// Height of a peak above the higher of the two lowest points reachable on
/// either side before meeting a strictly higher value (or a NaN).
fn prominence(values: &[f64], peak: usize) -> f64 {
    let height = values[peak];

    let mut left_min = height;
    for &v in values[..peak].iter().rev() {
        if v.is_nan() || v > height {
            break;
        }
        left_min = left_min.min(v);
    }

    let mut right_min = height;
    for &v in &values[peak + 1..] {
        if v.is_nan() || v > height {
            break;
        }
        right_min = right_min.min(v);
    }

    height - left_min.max(right_min)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loose() -> ExtremumParams {
        ExtremumParams {
            distance: 1,
            prominence_fraction: 0.0,
        }
    }

    #[test]
    fn params_scale_with_interval() {
        let hourly = ExtremumParams::for_interval(Interval::OneHour);
        assert_eq!(hourly.distance, 3);
        assert_eq!(hourly.prominence_fraction, 0.001);
        let monthly = ExtremumParams::for_interval(Interval::OneMonth);
        assert_eq!(monthly.distance, 20);
        assert_eq!(monthly.prominence_fraction, 0.015);
    }

    #[test]
    fn simple_peak_and_trough() {
        let values = [1.0, 3.0, 1.0, 0.0, 2.0];
        let peaks = find_peaks(&values, &loose());
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].index, 1);
        assert_eq!(peaks[0].price, 3.0);
        assert_eq!(peaks[0].prominence, 2.0);

        let troughs = find_troughs(&values, &loose());
        assert_eq!(troughs.len(), 1);
        assert_eq!(troughs[0].index, 3);
        assert_eq!(troughs[0].price, 0.0);
        assert_eq!(troughs[0].kind, ExtremumKind::Trough);
    }

    #[test]
    fn edges_are_never_extrema() {
        let values = [5.0, 1.0, 2.0, 1.0, 5.0];
        let peaks = find_peaks(&values, &loose());
        assert_eq!(peaks.iter().map(|p| p.index).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn plateau_resolves_to_middle() {
        let values = [0.0, 2.0, 2.0, 2.0, 0.0];
        let peaks = find_peaks(&values, &loose());
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].index, 2);
    }

    #[test]
    fn prominence_uses_higher_base() {
        // peak at 3 (height 4): left base 0, right base 2 before the 5 at 5
        let values = [0.0, 1.0, 1.5, 4.0, 2.0, 5.0, 0.0];
        let peaks = find_peaks(&values, &loose());
        let small = peaks.iter().find(|p| p.index == 3).unwrap();
        assert!((small.prominence - 2.0).abs() < 1e-12);
    }

    #[test]
    fn prominence_threshold_filters_noise() {
        let values = [0.0, 10.0, 9.9, 9.95, 0.0, 5.0, 0.0];
        let params = ExtremumParams {
            distance: 1,
            prominence_fraction: 0.05,
        };
        let peaks = find_peaks(&values, &params);
        // the shoulder at 9.95 has prominence 0.05, below 0.05 × range 10
        assert_eq!(peaks.iter().map(|p| p.index).collect::<Vec<_>>(), vec![1, 5]);
    }

    #[test]
    fn distance_skips_close_extrema() {
        let values = [0.0, 3.0, 0.0, 3.0, 0.0, 3.0, 0.0];
        let params = ExtremumParams {
            distance: 3,
            prominence_fraction: 0.0,
        };
        let peaks = find_peaks(&values, &params);
        assert_eq!(peaks.iter().map(|p| p.index).collect::<Vec<_>>(), vec![1, 5]);
    }

    #[test]
    fn extrema_are_ordered() {
        let values = [0.0, 2.0, 1.0, 3.0, 0.0, 1.0];
        let points = find_extrema(&values, &loose());
        let indices: Vec<usize> = points.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4]);
    }

    #[test]
    fn empty_and_nan_inputs() {
        assert!(find_peaks(&[], &loose()).is_empty());
        assert!(find_peaks(&[f64::NAN; 5], &loose()).is_empty());
        let values = [0.0, f64::NAN, 2.0, 0.0];
        assert!(find_peaks(&values, &loose()).is_empty());
    }
}
