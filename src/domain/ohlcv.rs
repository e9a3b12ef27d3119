//! OHLCV bars, sampling intervals and immutable bar series.

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use super::error::BarscopeError;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

/// Sampling frequency of a bar series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Interval {
    OneHour,
    FourHours,
    OneDay,
    OneWeek,
    OneMonth,
}

impl Interval {
    pub fn is_intraday(self) -> bool {
        matches!(self, Interval::OneHour | Interval::FourHours)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Interval::OneHour => "1h",
            Interval::FourHours => "4h",
            Interval::OneDay => "1d",
            Interval::OneWeek => "1wk",
            Interval::OneMonth => "1mo",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = BarscopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1h" => Ok(Interval::OneHour),
            "4h" => Ok(Interval::FourHours),
            "1d" => Ok(Interval::OneDay),
            "1wk" => Ok(Interval::OneWeek),
            "1mo" => Ok(Interval::OneMonth),
            other => Err(BarscopeError::invalid(
                "interval",
                format!("unsupported interval '{other}' (expected 1h, 4h, 1d, 1wk or 1mo)"),
            )),
        }
    }
}

/// Ordered, deduplicated bars for one symbol at one interval.
///
/// Fields are private: once built, a series is never mutated.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BarSeries {
    symbol: String,
    interval: Interval,
    bars: Vec<Bar>,
}

impl BarSeries {
    /// Sorts bars by timestamp and keeps the first bar seen for any timestamp.
    pub fn new(symbol: impl Into<String>, interval: Interval, bars: Vec<Bar>) -> Self {
        let mut seen = HashSet::with_capacity(bars.len());
        let mut bars: Vec<Bar> = bars
            .into_iter()
            .filter(|bar| seen.insert(bar.timestamp))
            .collect();
        bars.sort_by_key(|b| b.timestamp);
        Self {
            symbol: symbol.into(),
            interval,
            bars,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.low).collect()
    }

    /// Bars whose date falls within `[start, end]`.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> BarSeries {
        let bars = self
            .bars
            .iter()
            .filter(|b| b.date() >= start && b.date() <= end)
            .cloned()
            .collect();
        BarSeries {
            symbol: self.symbol.clone(),
            interval: self.interval,
            bars,
        }
    }

    /// Resample to one bar per calendar day: first open, max high, min low,
    /// last close, summed volume. Non-intraday series are returned unchanged.
    pub fn to_daily(&self) -> BarSeries {
        if !self.interval.is_intraday() {
            return self.clone();
        }

        let mut daily: Vec<Bar> = Vec::new();
        for bar in &self.bars {
            match daily.last_mut() {
                Some(day) if day.date() == bar.date() => {
                    day.high = day.high.max(bar.high);
                    day.low = day.low.min(bar.low);
                    day.close = bar.close;
                    day.volume += bar.volume;
                }
                _ => daily.push(Bar {
                    timestamp: bar.date().and_time(chrono::NaiveTime::MIN),
                    ..bar.clone()
                }),
            }
        }

        BarSeries {
            symbol: self.symbol.clone(),
            interval: Interval::OneDay,
            bars: daily,
        }
    }
}
