#![allow(dead_code)]

use barscope::domain::backtest::{BacktestConfig, Backtester};
use barscope::domain::error::BarscopeError;
pub use barscope::domain::ohlcv::{Bar, BarSeries, Interval};
use barscope::ports::data_port::DataPort;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        symbol: &str,
        interval: Interval,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<BarSeries, BarscopeError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(BarscopeError::DataSource {
                reason: reason.clone(),
            });
        }
        let bars = self.data.get(symbol).cloned().unwrap_or_default();
        let series = BarSeries::new(symbol, interval, bars);
        Ok(match range {
            Some((start, end)) => series.between(start, end),
            None => series,
        })
    }

    fn list_symbols(&self, _interval: Interval) -> Result<Vec<String>, BarscopeError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn day(offset: usize) -> NaiveDateTime {
    date(2023, 1, 1).and_hms_opt(0, 0, 0).unwrap() + Duration::days(offset as i64)
}

/// One daily bar per `(low, high, close)` row, opening at the close.
pub fn make_bars(rows: &[(f64, f64, f64)]) -> Vec<Bar> {
    rows.iter()
        .enumerate()
        .map(|(i, &(low, high, close))| Bar {
            timestamp: day(i),
            open: close,
            high,
            low,
            close,
            volume: 1_000.0 + i as f64,
        })
        .collect()
}

/// Daily bars whose high and low equal the close, so no stop or target fires.
pub fn flat_bars(closes: &[f64]) -> Vec<Bar> {
    let rows: Vec<(f64, f64, f64)> = closes.iter().map(|&c| (c, c, c)).collect();
    make_bars(&rows)
}

pub fn make_series(symbol: &str, closes: &[f64]) -> BarSeries {
    BarSeries::new(symbol, Interval::OneDay, flat_bars(closes))
}

/// The 14-bar sample used for indicator sanity checks.
pub fn sample_bars() -> Vec<Bar> {
    let open = [100., 102., 101., 103., 105., 104., 106., 108., 107., 109., 110., 112., 111., 113.];
    let high = [103., 104., 103., 105., 106., 105., 107., 109., 108., 110., 111., 113., 112., 114.];
    let low = [99., 101., 100., 102., 104., 103., 105., 107., 106., 108., 109., 111., 110., 112.];
    let close = [102., 103., 102., 104., 105., 104., 106., 108., 107., 109., 110., 112., 111., 113.];
    (0..close.len())
        .map(|i| Bar {
            timestamp: day(i),
            open: open[i],
            high: high[i],
            low: low[i],
            close: close[i],
            volume: 1000.0 + 50.0 * i as f64,
        })
        .collect()
}

/// 40 bars down, 40 up, 40 down: EMA(3) crosses EMA(10) up once, then down once.
pub fn down_up_down_closes() -> Vec<f64> {
    let mut closes: Vec<f64> = (0..40).map(|i| 100.0 - i as f64).collect();
    closes.extend((0..40).map(|i| 61.0 + i as f64));
    closes.extend((0..40).map(|i| 100.0 - i as f64));
    closes
}

/// A drifting wave long enough for the default indicator set.
pub fn wave_closes(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let x = i as f64;
            100.0 + 0.05 * x + 8.0 * (x / 9.0).sin() + 3.0 * (x / 4.0).cos()
        })
        .collect()
}

pub fn backtester(closes: &[f64], commission: f64) -> Backtester {
    let config = BacktestConfig {
        commission,
        min_bars: 1,
        ..BacktestConfig::default()
    };
    Backtester::new(&make_series("TEST", closes), config).unwrap()
}

/// Write `bars` as `<dir>/<symbol>_1d.csv`.
pub fn write_csv(dir: &Path, symbol: &str, bars: &[Bar]) {
    let mut content = String::from("date,open,high,low,close,volume\n");
    for bar in bars {
        writeln!(
            content,
            "{},{},{},{},{},{}",
            bar.timestamp.date(),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume
        )
        .unwrap();
    }
    std::fs::write(dir.join(format!("{}_1d.csv", symbol)), content).unwrap();
}
