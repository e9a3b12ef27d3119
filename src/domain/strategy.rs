//! Strategy configuration and per-bar signal generation.
//!
//! A `StrategyConfig` (kind + optional stop-loss / take-profit) is validated
//! at construction. `StrategyConfig::prepare` derives the indicator state a
//! strategy needs from a bar series and returns a `PreparedStrategy`, which
//! answers `on_bar` through the `Strategy` trait.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::error::BarscopeError;
use crate::domain::indicator::{IndicatorField, IndicatorSet, IndicatorType};
use crate::domain::ohlcv::{Bar, BarSeries};
use crate::domain::pattern::{cross_directions, CrossDirection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Signal {
    EnterLong,
    Exit,
    Hold,
}

/// Whether the executor holds a position when a bar is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    Flat,
    Long,
}

/// Uniform per-bar contract. `index` is the bar's position in the series the
/// strategy was prepared against.
pub trait Strategy {
    fn on_bar(&mut self, index: usize, bar: &Bar, state: PositionState) -> Signal;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum StrategyName {
    EmaCross,
    RsiOscillator,
    MacdCross,
    BollingerReversion,
}

impl StrategyName {
    pub const ALL: [StrategyName; 4] = [
        StrategyName::EmaCross,
        StrategyName::RsiOscillator,
        StrategyName::MacdCross,
        StrategyName::BollingerReversion,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyName::EmaCross => "ema_cross",
            StrategyName::RsiOscillator => "rsi_oscillator",
            StrategyName::MacdCross => "macd_cross",
            StrategyName::BollingerReversion => "bollinger_reversion",
        }
    }

    /// Strategy-specific parameter names accepted by `from_params`.
    pub fn param_names(self) -> &'static [&'static str] {
        match self {
            StrategyName::EmaCross => &["n1", "n2"],
            StrategyName::RsiOscillator => &["rsi_window", "buy_threshold", "sell_threshold"],
            StrategyName::MacdCross => &["fast", "slow", "signal"],
            StrategyName::BollingerReversion => &["length", "std"],
        }
    }

    pub fn default_kind(self) -> StrategyKind {
        match self {
            StrategyName::EmaCross => StrategyKind::EmaCross { n1: 50, n2: 200 },
            StrategyName::RsiOscillator => StrategyKind::RsiOscillator {
                window: 14,
                buy_threshold: 30.0,
                sell_threshold: 70.0,
            },
            StrategyName::MacdCross => StrategyKind::MacdCross {
                fast: 12,
                slow: 26,
                signal: 9,
            },
            StrategyName::BollingerReversion => StrategyKind::BollingerReversion {
                length: 20,
                std: 2.0,
            },
        }
    }
}

impl fmt::Display for StrategyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyName {
    type Err = BarscopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        StrategyName::ALL
            .into_iter()
            .find(|name| name.as_str() == normalized)
            .ok_or_else(|| BarscopeError::UnknownStrategy {
                name: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum StrategyKind {
    /// Enter on EMA(n1) crossing over EMA(n2), exit on the reverse.
    EmaCross { n1: usize, n2: usize },
    /// Enter on RSI rising through `buy_threshold`, exit on RSI falling
    /// through `sell_threshold`.
    RsiOscillator {
        window: usize,
        buy_threshold: f64,
        sell_threshold: f64,
    },
    /// Enter on MACD crossing over its signal line, exit on the reverse.
    MacdCross {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    /// Enter on close rising through the lower band, exit on close rising
    /// through the upper band. `std` is kept in hundredths, so it must be a
    /// multiple of 0.01.
    BollingerReversion { length: usize, std: f64 },
}

impl StrategyKind {
    pub fn name(&self) -> StrategyName {
        match self {
            StrategyKind::EmaCross { .. } => StrategyName::EmaCross,
            StrategyKind::RsiOscillator { .. } => StrategyName::RsiOscillator,
            StrategyKind::MacdCross { .. } => StrategyName::MacdCross,
            StrategyKind::BollingerReversion { .. } => StrategyName::BollingerReversion,
        }
    }

    /// Indicator specs this strategy reads.
    pub fn indicators(&self) -> Vec<IndicatorType> {
        match *self {
            StrategyKind::EmaCross { n1, n2 } => vec![IndicatorType::Ema(n1), IndicatorType::Ema(n2)],
            StrategyKind::RsiOscillator { window, .. } => vec![IndicatorType::Rsi(window)],
            StrategyKind::MacdCross { fast, slow, signal } => {
                vec![IndicatorType::Macd { fast, slow, signal }]
            }
            StrategyKind::BollingerReversion { length, std } => vec![IndicatorType::Bollinger {
                period: length,
                stddev_mult_x100: (std * 100.0).round() as u32,
            }],
        }
    }

    /// Named parameter values, the inverse of `StrategyConfig::from_params`.
    pub fn params(&self) -> BTreeMap<String, f64> {
        let pairs: Vec<(&str, f64)> = match *self {
            StrategyKind::EmaCross { n1, n2 } => vec![("n1", n1 as f64), ("n2", n2 as f64)],
            StrategyKind::RsiOscillator {
                window,
                buy_threshold,
                sell_threshold,
            } => vec![
                ("rsi_window", window as f64),
                ("buy_threshold", buy_threshold),
                ("sell_threshold", sell_threshold),
            ],
            StrategyKind::MacdCross { fast, slow, signal } => vec![
                ("fast", fast as f64),
                ("slow", slow as f64),
                ("signal", signal as f64),
            ],
            StrategyKind::BollingerReversion { length, std } => {
                vec![("length", length as f64), ("std", std)]
            }
        };
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    fn validate(&self) -> Result<(), BarscopeError> {
        match *self {
            StrategyKind::EmaCross { n1, n2 } => {
                positive_window("n1", n1)?;
                positive_window("n2", n2)
            }
            StrategyKind::RsiOscillator {
                window,
                buy_threshold,
                sell_threshold,
            } => {
                positive_window("rsi_window", window)?;
                for (name, value) in [("buy_threshold", buy_threshold), ("sell_threshold", sell_threshold)] {
                    if !(value > 0.0 && value < 100.0) {
                        return Err(BarscopeError::invalid(name, "must be between 0 and 100"));
                    }
                }
                if buy_threshold >= sell_threshold {
                    return Err(BarscopeError::invalid(
                        "buy_threshold",
                        "must be below sell_threshold",
                    ));
                }
                Ok(())
            }
            StrategyKind::MacdCross { .. } => {
                for spec in self.indicators() {
                    spec.validate()?;
                }
                Ok(())
            }
            StrategyKind::BollingerReversion { length, std } => {
                positive_window("length", length)?;
                if !std.is_finite() || (std * 100.0).round() < 1.0 {
                    return Err(BarscopeError::invalid("std", "must be at least 0.01"));
                }
                if ((std * 100.0).round() - std * 100.0).abs() > 1e-9 {
                    return Err(BarscopeError::invalid("std", "must be a multiple of 0.01"));
                }
                Ok(())
            }
        }
    }
}

fn positive_window(name: &str, value: usize) -> Result<(), BarscopeError> {
    if value == 0 {
        Err(BarscopeError::invalid(name, "window must be at least 1"))
    } else {
        Ok(())
    }
}

fn fraction(name: &str, value: Option<f64>) -> Result<(), BarscopeError> {
    match value {
        Some(v) if !(v > 0.0 && v < 1.0) => {
            Err(BarscopeError::invalid(name, "must be a fraction in (0, 1)"))
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StrategyConfig {
    pub kind: StrategyKind,
    /// Fractional distance below entry that closes the position.
    pub stop_loss: Option<f64>,
    /// Fractional distance above entry that closes the position.
    pub take_profit: Option<f64>,
}

impl StrategyConfig {
    pub fn new(
        kind: StrategyKind,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
    ) -> Result<Self, BarscopeError> {
        let config = Self {
            kind,
            stop_loss,
            take_profit,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BarscopeError> {
        self.kind.validate()?;
        fraction("stop_loss", self.stop_loss)?;
        fraction("take_profit", self.take_profit)
    }

    pub fn name(&self) -> StrategyName {
        self.kind.name()
    }

    /// Build from named scalars. Missing names keep their defaults; names the
    /// strategy does not know are rejected. `stop_loss` and `take_profit`
    /// apply to every strategy.
    pub fn from_params(name: StrategyName, params: &BTreeMap<String, f64>) -> Result<Self, BarscopeError> {
        for key in params.keys() {
            let known = name.param_names().contains(&key.as_str())
                || key == "stop_loss"
                || key == "take_profit";
            if !known {
                return Err(BarscopeError::invalid(
                    key.as_str(),
                    format!("not a parameter of {}", name),
                ));
            }
        }

        let window = |key: &str, default: usize| -> Result<usize, BarscopeError> {
            match params.get(key) {
                None => Ok(default),
                Some(&v) if v >= 1.0 && v.fract() == 0.0 => Ok(v as usize),
                Some(_) => Err(BarscopeError::invalid(key, "must be a positive whole number")),
            }
        };
        let scalar = |key: &str, default: f64| params.get(key).copied().unwrap_or(default);

        let kind = match name.default_kind() {
            StrategyKind::EmaCross { n1, n2 } => StrategyKind::EmaCross {
                n1: window("n1", n1)?,
                n2: window("n2", n2)?,
            },
            StrategyKind::RsiOscillator {
                window: w,
                buy_threshold,
                sell_threshold,
            } => StrategyKind::RsiOscillator {
                window: window("rsi_window", w)?,
                buy_threshold: scalar("buy_threshold", buy_threshold),
                sell_threshold: scalar("sell_threshold", sell_threshold),
            },
            StrategyKind::MacdCross { fast, slow, signal } => StrategyKind::MacdCross {
                fast: window("fast", fast)?,
                slow: window("slow", slow)?,
                signal: window("signal", signal)?,
            },
            StrategyKind::BollingerReversion { length, std } => StrategyKind::BollingerReversion {
                length: window("length", length)?,
                std: scalar("std", std),
            },
        };

        Self::new(
            kind,
            params.get("stop_loss").copied(),
            params.get("take_profit").copied(),
        )
    }

    /// Compute the indicator state for `series` and bind it to this config.
    pub fn prepare(&self, series: &BarSeries) -> Result<PreparedStrategy, BarscopeError> {
        let specs = self.kind.indicators();
        let indicators = IndicatorSet::compute(series, &specs)?;
        let closes = series.closes();
        let column = |spec: &IndicatorType, field: IndicatorField| -> Result<Vec<f64>, BarscopeError> {
            indicators
                .field(spec, field)
                .map(<[f64]>::to_vec)
                .ok_or_else(|| BarscopeError::invalid(spec.column(field), "column was not computed"))
        };

        let (entry, exit) = match self.kind {
            StrategyKind::EmaCross { .. } => {
                let fast = column(&specs[0], IndicatorField::Value)?;
                let slow = column(&specs[1], IndicatorField::Value)?;
                let crosses = cross_directions(&fast, &slow);
                (
                    matching(&crosses, CrossDirection::Up),
                    matching(&crosses, CrossDirection::Down),
                )
            }
            StrategyKind::RsiOscillator {
                buy_threshold,
                sell_threshold,
                ..
            } => {
                let rsi = column(&specs[0], IndicatorField::Value)?;
                let buy = cross_directions(&rsi, &vec![buy_threshold; rsi.len()]);
                let sell = cross_directions(&rsi, &vec![sell_threshold; rsi.len()]);
                (
                    matching(&buy, CrossDirection::Up),
                    matching(&sell, CrossDirection::Down),
                )
            }
            StrategyKind::MacdCross { .. } => {
                let line = column(&specs[0], IndicatorField::Value)?;
                let signal = column(&specs[0], IndicatorField::Signal)?;
                let crosses = cross_directions(&line, &signal);
                (
                    matching(&crosses, CrossDirection::Up),
                    matching(&crosses, CrossDirection::Down),
                )
            }
            StrategyKind::BollingerReversion { .. } => {
                let lower = column(&specs[0], IndicatorField::Lower)?;
                let upper = column(&specs[0], IndicatorField::Upper)?;
                (
                    matching(&cross_directions(&closes, &lower), CrossDirection::Up),
                    matching(&cross_directions(&closes, &upper), CrossDirection::Up),
                )
            }
        };

        Ok(PreparedStrategy {
            config: *self,
            indicators,
            entry,
            exit,
        })
    }
}

fn matching(crosses: &[Option<CrossDirection>], direction: CrossDirection) -> Vec<bool> {
    crosses.iter().map(|c| *c == Some(direction)).collect()
}

/// A strategy bound to the indicator state of one series.
#[derive(Debug, Clone)]
pub struct PreparedStrategy {
    config: StrategyConfig,
    indicators: IndicatorSet,
    entry: Vec<bool>,
    exit: Vec<bool>,
}

impl PreparedStrategy {
    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn indicators(&self) -> &IndicatorSet {
        &self.indicators
    }
}

impl Strategy for PreparedStrategy {
    /// When entry and exit fire on the same bar, the one that fits `state`
    /// is reported; otherwise entry is checked first.
    fn on_bar(&mut self, index: usize, _bar: &Bar, state: PositionState) -> Signal {
        let entry = self.entry.get(index).copied().unwrap_or(false);
        let exit = self.exit.get(index).copied().unwrap_or(false);
        match (entry, exit, state) {
            (true, true, PositionState::Long) => Signal::Exit,
            (true, _, _) => Signal::EnterLong,
            (false, true, _) => Signal::Exit,
            (false, false, _) => Signal::Hold,
        }
    }
}
