//! Categorical reading of the latest bar of an analysis.

use std::fmt;

use chrono::NaiveDateTime;

use crate::domain::analysis::{Analysis, CROSS_FAST, CROSS_SLOW};
use crate::domain::error::BarscopeError;
use crate::domain::indicator::{IndicatorField, IndicatorSet, IndicatorType};
use crate::domain::ohlcv::BarSeries;
use crate::domain::pattern::CrossEvent;

const RSI_PERIOD: usize = 14;
const ADX_PERIOD: usize = 14;
const RSI_OVERBOUGHT: f64 = 70.0;
const RSI_OVERSOLD: f64 = 30.0;
const ADX_TRENDING: f64 = 25.0;
const WIDE_BANDS: f64 = 1.5;
const NARROW_BANDS: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum TrendOutlook {
    StrongUptrend,
    StrongDowntrend,
    WeakeningUptrend,
    WeakeningDowntrend,
    Sideways,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum RsiZone {
    Overbought,
    Oversold,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum MacdMomentum {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum TrendStrength {
    StrongBullish,
    StrongBearish,
    Weak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum VolumeFlow {
    Rising,
    Falling,
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Volatility {
    High,
    Low,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum BreakoutSignal {
    Up,
    Down,
    None,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TechnicalSummary {
    pub timestamp: NaiveDateTime,
    pub close: f64,
    pub rsi: Option<f64>,
    pub adx: Option<f64>,
    pub trend: TrendOutlook,
    pub rsi_zone: RsiZone,
    pub macd: MacdMomentum,
    pub trend_strength: TrendStrength,
    pub volume_flow: VolumeFlow,
    pub volatility: Volatility,
    pub last_cross: Option<CrossEvent>,
    /// True when `last_cross` happened on the latest bar.
    pub cross_on_last_bar: bool,
    pub breakout: BreakoutSignal,
}

impl TechnicalSummary {
    pub fn from_analysis(series: &BarSeries, analysis: &Analysis) -> Result<Self, BarscopeError> {
        let last_bar = series.last().ok_or_else(|| BarscopeError::InsufficientData {
            context: format!("summary of {}", series.symbol()),
            bars: 0,
            minimum: 1,
        })?;
        let set = &analysis.indicators;
        let last_index = series.len() - 1;
        let close = last_bar.close;

        let ema_fast = set.last(&IndicatorType::Ema(CROSS_FAST).to_string());
        let ema_slow = set.last(&IndicatorType::Ema(CROSS_SLOW).to_string());
        let rsi = set.last(&IndicatorType::Rsi(RSI_PERIOD).to_string());
        let adx_spec = IndicatorType::Adx(ADX_PERIOD);
        let adx = set.last(&adx_spec.to_string());

        let last_cross = analysis.crosses.last().copied();
        let breakout = match analysis.breakouts.last() {
            Some(1) => BreakoutSignal::Up,
            Some(-1) => BreakoutSignal::Down,
            _ => BreakoutSignal::None,
        };

        Ok(Self {
            timestamp: last_bar.timestamp,
            close,
            rsi,
            adx,
            trend: trend_outlook(close, ema_fast, ema_slow),
            rsi_zone: rsi_zone(rsi),
            macd: macd_momentum(set),
            trend_strength: trend_strength(set, &adx_spec, adx),
            volume_flow: volume_flow(set),
            volatility: volatility(set),
            cross_on_last_bar: last_cross.is_some_and(|c| c.index == last_index),
            last_cross,
            breakout,
        })
    }
}

fn trend_outlook(close: f64, fast: Option<f64>, slow: Option<f64>) -> TrendOutlook {
    let (Some(fast), Some(slow)) = (fast, slow) else {
        return TrendOutlook::Sideways;
    };
    if fast > slow && close > fast {
        TrendOutlook::StrongUptrend
    } else if fast < slow && close < fast {
        TrendOutlook::StrongDowntrend
    } else if fast > slow && close < fast {
        TrendOutlook::WeakeningUptrend
    } else if fast < slow && close > fast {
        TrendOutlook::WeakeningDowntrend
    } else {
        TrendOutlook::Sideways
    }
}

fn rsi_zone(rsi: Option<f64>) -> RsiZone {
    match rsi {
        Some(v) if v > RSI_OVERBOUGHT => RsiZone::Overbought,
        Some(v) if v < RSI_OVERSOLD => RsiZone::Oversold,
        _ => RsiZone::Neutral,
    }
}

fn default_macd() -> IndicatorType {
    IndicatorType::Macd {
        fast: crate::domain::indicator::macd::DEFAULT_FAST,
        slow: crate::domain::indicator::macd::DEFAULT_SLOW,
        signal: crate::domain::indicator::macd::DEFAULT_SIGNAL,
    }
}

fn macd_momentum(set: &IndicatorSet) -> MacdMomentum {
    let spec = default_macd();
    let line = set.last(&spec.column(IndicatorField::Value));
    let signal = set.last(&spec.column(IndicatorField::Signal));
    let histogram = set.last(&spec.column(IndicatorField::Histogram));
    match (line, signal, histogram) {
        (Some(l), Some(s), Some(h)) if l > s && h > 0.0 => MacdMomentum::Bullish,
        (Some(l), Some(s), Some(h)) if l < s && h < 0.0 => MacdMomentum::Bearish,
        _ => MacdMomentum::Neutral,
    }
}

fn trend_strength(set: &IndicatorSet, spec: &IndicatorType, adx: Option<f64>) -> TrendStrength {
    match adx {
        Some(v) if v > ADX_TRENDING => {
            let plus = set.last(&spec.column(IndicatorField::PlusDi));
            let minus = set.last(&spec.column(IndicatorField::MinusDi));
            match (plus, minus) {
                (Some(p), Some(m)) if p > m => TrendStrength::StrongBullish,
                _ => TrendStrength::StrongBearish,
            }
        }
        _ => TrendStrength::Weak,
    }
}

fn volume_flow(set: &IndicatorSet) -> VolumeFlow {
    let Some(obv) = set.get(&IndicatorType::Obv.to_string()) else {
        return VolumeFlow::Flat;
    };
    match obv {
        [.., prev, last] if last > prev => VolumeFlow::Rising,
        [.., prev, last] if last < prev => VolumeFlow::Falling,
        _ => VolumeFlow::Flat,
    }
}

fn volatility(set: &IndicatorSet) -> Volatility {
    let spec = IndicatorType::Bollinger {
        period: crate::domain::indicator::bollinger::DEFAULT_PERIOD,
        stddev_mult_x100: crate::domain::indicator::bollinger::DEFAULT_MULT_X100,
    };
    let name = spec.column(IndicatorField::Bandwidth);
    let (Some(values), Some(current)) = (set.get(&name), set.last(&name)) else {
        return Volatility::Normal;
    };
    let defined: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    let mean = defined.iter().sum::<f64>() / defined.len() as f64;
    if current > mean * WIDE_BANDS {
        Volatility::High
    } else if current < mean * NARROW_BANDS {
        Volatility::Low
    } else {
        Volatility::Normal
    }
}

impl fmt::Display for TrendOutlook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TrendOutlook::StrongUptrend => "strong uptrend (close > EMA50 > EMA200)",
            TrendOutlook::StrongDowntrend => "strong downtrend (close < EMA50 < EMA200)",
            TrendOutlook::WeakeningUptrend => "uptrend weakening or correcting",
            TrendOutlook::WeakeningDowntrend => "downtrend weakening or recovering",
            TrendOutlook::Sideways => "sideways or unclear",
        };
        f.write_str(text)
    }
}

impl fmt::Display for TechnicalSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmt_opt = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"));
        writeln!(f, "Date:           {}", self.timestamp.format("%Y-%m-%d %H:%M"))?;
        writeln!(f, "Close:          {:.2}", self.close)?;
        writeln!(f, "RSI(14):        {}", fmt_opt(self.rsi))?;
        writeln!(f, "ADX(14):        {}", fmt_opt(self.adx))?;
        writeln!(f, "Trend:          {}", self.trend)?;
        writeln!(f, "RSI zone:       {:?}", self.rsi_zone)?;
        writeln!(f, "MACD momentum:  {:?}", self.macd)?;
        writeln!(f, "Trend strength: {:?}", self.trend_strength)?;
        writeln!(f, "OBV:            {:?}", self.volume_flow)?;
        writeln!(f, "Volatility:     {:?}", self.volatility)?;
        match self.last_cross {
            Some(cross) => writeln!(
                f,
                "Last cross:     {:?} at bar {}{}",
                cross.kind,
                cross.index,
                if self.cross_on_last_bar { " (latest bar)" } else { "" }
            )?,
            None => writeln!(f, "Last cross:     none")?,
        }
        write!(f, "Breakout:       {:?}", self.breakout)
    }
}
