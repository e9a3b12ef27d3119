//! Technical indicator engine.
//!
//! This module provides:
//! - `IndicatorType`: closed enum of indicator identity + parameters. Its
//!   `Display` form is the column-name stem (`EMA(20)`, `MACD(12,26,9)`).
//! - `IndicatorField`: the named outputs of multi-series indicators. A field
//!   other than `Value` adds a suffix to the stem (`MACD(12,26,9).signal`).
//! - `IndicatorSet`: name → series mapping aligned 1:1 with a `BarSeries`.
//!   Undefined cells are NaN. Columns are append-only.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod ichimoku;
pub mod macd;
pub mod obv;
pub mod rsi;
pub mod stoch_rsi;
pub mod vwap;

use std::collections::BTreeMap;
use std::fmt;

use crate::domain::error::BarscopeError;
use crate::domain::indicator_helpers::sma;
use crate::domain::ohlcv::{BarSeries, Interval};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Atr(usize),
    Adx(usize),
    Obv,
    Vwap,
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
    StochRsi {
        rsi_period: usize,
        stoch_period: usize,
        k_period: usize,
        d_period: usize,
    },
    Ichimoku {
        tenkan: usize,
        kijun: usize,
        senkou: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum IndicatorField {
    Value,
    Pct,
    PlusDi,
    MinusDi,
    Signal,
    Histogram,
    Upper,
    Middle,
    Lower,
    Bandwidth,
    PercentB,
    K,
    D,
    Tenkan,
    Kijun,
    SenkouA,
    SenkouB,
    Chikou,
}

impl IndicatorField {
    pub fn suffix(self) -> Option<&'static str> {
        match self {
            IndicatorField::Value => None,
            IndicatorField::Pct => Some("pct"),
            IndicatorField::PlusDi => Some("plus_di"),
            IndicatorField::MinusDi => Some("minus_di"),
            IndicatorField::Signal => Some("signal"),
            IndicatorField::Histogram => Some("histogram"),
            IndicatorField::Upper => Some("upper"),
            IndicatorField::Middle => Some("middle"),
            IndicatorField::Lower => Some("lower"),
            IndicatorField::Bandwidth => Some("bandwidth"),
            IndicatorField::PercentB => Some("percent_b"),
            IndicatorField::K => Some("k"),
            IndicatorField::D => Some("d"),
            IndicatorField::Tenkan => Some("tenkan"),
            IndicatorField::Kijun => Some("kijun"),
            IndicatorField::SenkouA => Some("senkou_a"),
            IndicatorField::SenkouB => Some("senkou_b"),
            IndicatorField::Chikou => Some("chikou"),
        }
    }
}

impl IndicatorType {
    /// Output fields produced by this indicator, in insertion order.
    pub fn fields(&self) -> &'static [IndicatorField] {
        use IndicatorField::*;
        match self {
            IndicatorType::Sma(_)
            | IndicatorType::Ema(_)
            | IndicatorType::Rsi(_)
            | IndicatorType::Obv
            | IndicatorType::Vwap => &[Value],
            IndicatorType::Atr(_) => &[Value, Pct],
            IndicatorType::Adx(_) => &[Value, PlusDi, MinusDi],
            IndicatorType::Macd { .. } => &[Value, Signal, Histogram],
            IndicatorType::Bollinger { .. } => &[Upper, Middle, Lower, Bandwidth, PercentB],
            IndicatorType::StochRsi { .. } => &[K, D],
            IndicatorType::Ichimoku { .. } => &[Tenkan, Kijun, SenkouA, SenkouB, Chikou],
        }
    }

    /// Column name for one output of this indicator.
    pub fn column(&self, field: IndicatorField) -> String {
        match field.suffix() {
            None => self.to_string(),
            Some(suffix) => format!("{}.{}", self, suffix),
        }
    }

    /// Number of bars needed before the indicator's last value is defined.
    ///
    /// For Ichimoku this covers the forward-displaced spans; the Chikou line
    /// is always undefined over its final `kijun` bars.
    pub fn lookback(&self) -> usize {
        match *self {
            IndicatorType::Sma(n) => n,
            IndicatorType::Ema(_)
            | IndicatorType::Atr(_)
            | IndicatorType::Obv
            | IndicatorType::Vwap
            | IndicatorType::Macd { .. } => 1,
            IndicatorType::Rsi(_) | IndicatorType::Adx(_) => 2,
            IndicatorType::Bollinger { period, .. } => period,
            IndicatorType::StochRsi {
                stoch_period,
                k_period,
                d_period,
                ..
            } => (stoch_period + k_period + d_period).saturating_sub(1),
            IndicatorType::Ichimoku { kijun, senkou, .. } => senkou + kijun,
        }
    }

    pub fn validate(&self) -> Result<(), BarscopeError> {
        let positive = |field: &str, value: usize| {
            if value == 0 {
                Err(BarscopeError::invalid(
                    format!("{}.{}", self, field),
                    "window must be at least 1",
                ))
            } else {
                Ok(())
            }
        };

        match *self {
            IndicatorType::Sma(n)
            | IndicatorType::Ema(n)
            | IndicatorType::Rsi(n)
            | IndicatorType::Atr(n)
            | IndicatorType::Adx(n) => positive("period", n),
            IndicatorType::Obv | IndicatorType::Vwap => Ok(()),
            IndicatorType::Macd { fast, slow, signal } => {
                positive("fast", fast)?;
                positive("slow", slow)?;
                positive("signal", signal)?;
                if fast >= slow {
                    return Err(BarscopeError::invalid(
                        format!("{}.fast", self),
                        "fast period must be shorter than slow period",
                    ));
                }
                Ok(())
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                positive("period", period)?;
                if stddev_mult_x100 == 0 {
                    return Err(BarscopeError::invalid(
                        format!("{}.stddev", self),
                        "multiplier must be positive",
                    ));
                }
                Ok(())
            }
            IndicatorType::StochRsi {
                rsi_period,
                stoch_period,
                k_period,
                d_period,
            } => {
                positive("rsi_period", rsi_period)?;
                positive("stoch_period", stoch_period)?;
                positive("k_period", k_period)?;
                positive("d_period", d_period)
            }
            IndicatorType::Ichimoku {
                tenkan,
                kijun,
                senkou,
            } => {
                positive("tenkan", tenkan)?;
                positive("kijun", kijun)?;
                positive("senkou", senkou)
            }
        }
    }

    /// The analysis set shown for a symbol: EMA 8/13/21/50/200, Bollinger,
    /// StochRSI, MACD, RSI, ADX, ATR, OBV, Ichimoku, plus VWAP when intraday.
    pub fn default_analysis_set(interval: Interval) -> Vec<IndicatorType> {
        let mut specs: Vec<IndicatorType> = [8, 13, 21, 50, 200]
            .into_iter()
            .map(IndicatorType::Ema)
            .collect();
        specs.extend([
            IndicatorType::Bollinger {
                period: bollinger::DEFAULT_PERIOD,
                stddev_mult_x100: bollinger::DEFAULT_MULT_X100,
            },
            IndicatorType::StochRsi {
                rsi_period: stoch_rsi::DEFAULT_RSI_PERIOD,
                stoch_period: stoch_rsi::DEFAULT_STOCH_PERIOD,
                k_period: stoch_rsi::DEFAULT_K,
                d_period: stoch_rsi::DEFAULT_D,
            },
            IndicatorType::Macd {
                fast: macd::DEFAULT_FAST,
                slow: macd::DEFAULT_SLOW,
                signal: macd::DEFAULT_SIGNAL,
            },
            IndicatorType::Rsi(14),
            IndicatorType::Adx(14),
            IndicatorType::Atr(14),
            IndicatorType::Obv,
            IndicatorType::Ichimoku {
                tenkan: ichimoku::DEFAULT_TENKAN,
                kijun: ichimoku::DEFAULT_KIJUN,
                senkou: ichimoku::DEFAULT_SENKOU,
            },
        ]);
        if interval.is_intraday() {
            specs.push(IndicatorType::Vwap);
        }
        specs
    }

    /// Compute every output of this indicator, paired with its field.
    fn compute(&self, series: &BarSeries) -> Vec<(IndicatorField, Vec<f64>)> {
        use IndicatorField::*;
        let bars = series.bars();
        let closes = series.closes();

        match *self {
            IndicatorType::Sma(n) => vec![(Value, sma(&closes, n))],
            IndicatorType::Ema(n) => vec![(Value, ema::calculate_ema(&closes, n))],
            IndicatorType::Rsi(n) => vec![(Value, rsi::calculate_rsi(&closes, n))],
            IndicatorType::Atr(n) => {
                let out = atr::calculate_atr(bars, n);
                vec![(Value, out.atr), (Pct, out.atr_pct)]
            }
            IndicatorType::Adx(n) => {
                let out = adx::calculate_adx(bars, n);
                vec![(Value, out.adx), (PlusDi, out.plus_di), (MinusDi, out.minus_di)]
            }
            IndicatorType::Obv => vec![(Value, obv::calculate_obv(bars))],
            IndicatorType::Vwap => {
                let values = if series.interval().is_intraday() {
                    vwap::calculate_vwap(bars)
                } else {
                    vec![f64::NAN; bars.len()]
                };
                vec![(Value, values)]
            }
            IndicatorType::Macd { fast, slow, signal } => {
                let out = macd::calculate_macd(&closes, fast, slow, signal);
                vec![(Value, out.line), (Signal, out.signal), (Histogram, out.histogram)]
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let out = bollinger::calculate_bollinger(&closes, period, stddev_mult_x100);
                vec![
                    (Upper, out.upper),
                    (Middle, out.middle),
                    (Lower, out.lower),
                    (Bandwidth, out.bandwidth),
                    (PercentB, out.percent_b),
                ]
            }
            IndicatorType::StochRsi {
                rsi_period,
                stoch_period,
                k_period,
                d_period,
            } => {
                let out = stoch_rsi::calculate_stoch_rsi(
                    &closes,
                    rsi_period,
                    stoch_period,
                    k_period,
                    d_period,
                );
                vec![(K, out.k), (D, out.d)]
            }
            IndicatorType::Ichimoku {
                tenkan,
                kijun,
                senkou,
            } => {
                let out = ichimoku::calculate_ichimoku(bars, tenkan, kijun, senkou);
                vec![
                    (Tenkan, out.tenkan),
                    (Kijun, out.kijun),
                    (SenkouA, out.senkou_a),
                    (SenkouB, out.senkou_b),
                    (Chikou, out.chikou),
                ]
            }
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
            IndicatorType::Adx(period) => write!(f, "ADX({})", period),
            IndicatorType::Obv => write!(f, "OBV"),
            IndicatorType::Vwap => write!(f, "VWAP"),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
            IndicatorType::StochRsi {
                rsi_period,
                stoch_period,
                k_period,
                d_period,
            } => write!(
                f,
                "STOCHRSI({},{},{},{})",
                rsi_period, stoch_period, k_period, d_period
            ),
            IndicatorType::Ichimoku {
                tenkan,
                kijun,
                senkou,
            } => write!(f, "ICHIMOKU({},{},{})", tenkan, kijun, senkou),
        }
    }
}

/// Named indicator columns aligned with one bar series.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct IndicatorSet {
    len: usize,
    columns: BTreeMap<String, Vec<f64>>,
}

impl IndicatorSet {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            columns: BTreeMap::new(),
        }
    }

    /// Validate every spec, then compute its columns over `series`.
    ///
    /// Series shorter than an indicator's lookback produce NaN-filled
    /// columns rather than errors.
    pub fn compute(series: &BarSeries, specs: &[IndicatorType]) -> Result<Self, BarscopeError> {
        for spec in specs {
            spec.validate()?;
        }

        let mut set = Self::new(series.len());
        for spec in specs {
            for (field, values) in spec.compute(series) {
                set.insert(spec.column(field), values)?;
            }
        }
        Ok(set)
    }

    /// Add a column. Returns `Ok(false)` and leaves the set untouched when
    /// the name is already present.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<bool, BarscopeError> {
        let name = name.into();
        if values.len() != self.len {
            return Err(BarscopeError::invalid(
                name,
                format!("column has {} values, series has {} bars", values.len(), self.len),
            ));
        }
        if self.columns.contains_key(&name) {
            return Ok(false);
        }
        self.columns.insert(name, values);
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn field(&self, spec: &IndicatorType, field: IndicatorField) -> Option<&[f64]> {
        self.get(&spec.column(field))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Last value of a column, if the column exists and that value is defined.
    pub fn last(&self, name: &str) -> Option<f64> {
        self.get(name)?.last().copied().filter(|v| !v.is_nan())
    }

    /// Count of consecutive defined values at the end of a column.
    pub fn valid_tail(&self, name: &str) -> usize {
        self.get(name)
            .map(|values| values.iter().rev().take_while(|v| !v.is_nan()).count())
            .unwrap_or(0)
    }

    /// Column `name`, provided its last `n` values are all defined.
    pub fn require_tail(&self, name: &str, n: usize) -> Result<&[f64], BarscopeError> {
        let tail = self.valid_tail(name);
        match self.get(name) {
            Some(values) if tail >= n => Ok(values),
            _ => Err(BarscopeError::InsufficientData {
                context: name.to_string(),
                bars: tail,
                minimum: n,
            }),
        }
    }
}
