//! Geometric pattern detection over price and indicator series.

pub mod breakout;
pub mod crossover;
pub mod extrema;
pub mod trendline;

pub use breakout::{detect_breakouts, BreakoutConfig};
pub use crossover::{
    cross_directions, detect_crossovers, detect_threshold_crossings, CrossDirection, CrossEvent,
    CrossKind,
};
pub use extrema::{find_extrema, find_peaks, find_troughs, ExtremumKind, ExtremumParams, ExtremumPoint};
pub use trendline::{
    fit_least_squares, fit_two_point, support_resistance, SupportResistance, TrendPoint, Trendline,
};
