//! Straight-line fits through extrema.
//!
//! `fit_two_point` anchors a line on two extrema (breakout detection).
//! `fit_least_squares` regresses a line through every extremum of one kind
//! (whole-series support and resistance). Degenerate inputs give `None`.

use super::extrema::{find_peaks, find_troughs, ExtremumParams, ExtremumPoint};

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TrendPoint {
    pub index: usize,
    pub price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Trendline {
    pub point_a: TrendPoint,
    pub point_b: TrendPoint,
    pub slope: f64,
    pub intercept: f64,
}

impl Trendline {
    /// Price on the line at bar position `x`.
    pub fn project(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SupportResistance {
    pub support: Option<Trendline>,
    pub resistance: Option<Trendline>,
}

/// Line through two extrema. `None` when both share an index.
pub fn fit_two_point(a: &ExtremumPoint, b: &ExtremumPoint) -> Option<Trendline> {
    if a.index == b.index {
        return None;
    }
    let slope = (b.price - a.price) / (b.index as f64 - a.index as f64);
    let intercept = a.price - slope * a.index as f64;
    Some(Trendline {
        point_a: TrendPoint {
            index: a.index,
            price: a.price,
        },
        point_b: TrendPoint {
            index: b.index,
            price: b.price,
        },
        slope,
        intercept,
    })
}

/// Ordinary least-squares line through `points`.
///
/// The anchor points are the fitted line evaluated at the first and last
/// extremum, giving the segment to draw.
pub fn fit_least_squares(points: &[ExtremumPoint]) -> Option<Trendline> {
    if points.len() < 2 {
        return None;
    }

    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.index as f64).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.price).sum::<f64>() / n;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for p in points {
        let dx = p.index as f64 - mean_x;
        sxx += dx * dx;
        sxy += dx * (p.price - mean_y);
    }
    if sxx == 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    let first = points.iter().map(|p| p.index).min()?;
    let last = points.iter().map(|p| p.index).max()?;
    let at = |index: usize| TrendPoint {
        index,
        price: slope * index as f64 + intercept,
    };

    Some(Trendline {
        point_a: at(first),
        point_b: at(last),
        slope,
        intercept,
    })
}

/// Support through all troughs and resistance through all peaks of `values`.
pub fn support_resistance(values: &[f64], params: &ExtremumParams) -> SupportResistance {
    SupportResistance {
        support: fit_least_squares(&find_troughs(values, params)),
        resistance: fit_least_squares(&find_peaks(values, params)),
    }
}
