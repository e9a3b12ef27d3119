//! One-shot technical analysis of a bar series.
//!
//! Bundles the indicator set, extrema, support/resistance overlay, EMA(50) /
//! EMA(200) golden and death crosses, and breakout flags into a single value
//! for presentation.

use tracing::debug;

use crate::domain::error::BarscopeError;
use crate::domain::indicator::{ema::calculate_ema, IndicatorSet, IndicatorType};
use crate::domain::ohlcv::{BarSeries, Interval};
use crate::domain::pattern::{
    detect_breakouts, detect_crossovers, find_peaks, find_troughs, support_resistance,
    BreakoutConfig, CrossEvent, ExtremumParams, ExtremumPoint, SupportResistance,
};

pub const CROSS_FAST: usize = 50;
pub const CROSS_SLOW: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    pub indicators: Vec<IndicatorType>,
    pub extrema: ExtremumParams,
    pub breakout: BreakoutConfig,
}

impl AnalysisConfig {
    pub fn for_interval(interval: Interval) -> Self {
        Self {
            indicators: IndicatorType::default_analysis_set(interval),
            extrema: ExtremumParams::for_interval(interval),
            breakout: BreakoutConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Analysis {
    pub symbol: String,
    pub interval: Interval,
    pub indicators: IndicatorSet,
    pub peaks: Vec<ExtremumPoint>,
    pub troughs: Vec<ExtremumPoint>,
    pub trendlines: SupportResistance,
    pub crosses: Vec<CrossEvent>,
    pub breakouts: Vec<i8>,
}

/// Analyze `series` with the default set for its interval.
pub fn analyze(series: &BarSeries) -> Result<Analysis, BarscopeError> {
    analyze_with(series, &AnalysisConfig::for_interval(series.interval()))
}

pub fn analyze_with(series: &BarSeries, config: &AnalysisConfig) -> Result<Analysis, BarscopeError> {
    if series.is_empty() {
        return Err(BarscopeError::InsufficientData {
            context: format!("analysis of {}", series.symbol()),
            bars: 0,
            minimum: 1,
        });
    }

    let closes = series.closes();
    let mut indicators = IndicatorSet::compute(series, &config.indicators)?;

    let fast = IndicatorType::Ema(CROSS_FAST).to_string();
    let slow = IndicatorType::Ema(CROSS_SLOW).to_string();
    for (name, period) in [(&fast, CROSS_FAST), (&slow, CROSS_SLOW)] {
        if indicators.get(name).is_none() {
            indicators.insert(name.clone(), calculate_ema(&closes, period))?;
        }
    }
    let crosses = match (indicators.get(&fast), indicators.get(&slow)) {
        (Some(a), Some(b)) => detect_crossovers(a, b),
        _ => Vec::new(),
    };

    let analysis = Analysis {
        symbol: series.symbol().to_string(),
        interval: series.interval(),
        peaks: find_peaks(&closes, &config.extrema),
        troughs: find_troughs(&closes, &config.extrema),
        trendlines: support_resistance(&closes, &config.extrema),
        breakouts: detect_breakouts(&closes, &config.breakout),
        crosses,
        indicators,
    };

    debug!(
        symbol = %analysis.symbol,
        bars = series.len(),
        columns = analysis.indicators.names().count(),
        peaks = analysis.peaks.len(),
        troughs = analysis.troughs.len(),
        crosses = analysis.crosses.len(),
        "analysis complete"
    );

    Ok(analysis)
}
