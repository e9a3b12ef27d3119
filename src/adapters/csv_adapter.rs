//! CSV file data adapter.
//!
//! One file per symbol and interval, `<dir>/<symbol>_<interval>.csv`, with a
//! header row naming `timestamp` (or `date`), `open`, `high`, `low`, `close`
//! and `volume` in any order and any letter case.

use crate::domain::error::BarscopeError;
use crate::domain::ohlcv::{Bar, BarSeries, Interval};
use crate::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime};
use std::fs;
use std::path::PathBuf;

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

pub struct CsvAdapter {
    base_path: PathBuf,
}

struct Columns {
    timestamp: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, BarscopeError> {
        let find = |names: &[&str]| -> Result<usize, BarscopeError> {
            headers
                .iter()
                .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
                .ok_or_else(|| BarscopeError::DataSource {
                    reason: format!("missing {} column", names[0]),
                })
        };
        Ok(Self {
            timestamp: find(&["timestamp", "date", "datetime"])?,
            open: find(&["open"])?,
            high: find(&["high"])?,
            low: find(&["low"])?,
            close: find(&["close"])?,
            volume: find(&["volume"])?,
        })
    }
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str, interval: Interval) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", symbol, interval))
    }
}

fn parse_timestamp(value: &str) -> Result<NaiveDateTime, BarscopeError> {
    let value = value.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
        .ok_or_else(|| BarscopeError::DataSource {
            reason: format!("invalid timestamp '{}'", value),
        })
}

fn parse_field(record: &csv::StringRecord, index: usize, name: &str) -> Result<f64, BarscopeError> {
    let value: f64 = record
        .get(index)
        .ok_or_else(|| BarscopeError::DataSource {
            reason: format!("missing {} value", name),
        })?
        .trim()
        .parse()
        .map_err(|e| BarscopeError::DataSource {
            reason: format!("invalid {} value: {}", name, e),
        })?;
    if !value.is_finite() {
        return Err(BarscopeError::DataSource {
            reason: format!("non-finite {} value: {}", name, value),
        });
    }
    Ok(value)
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        interval: Interval,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<BarSeries, BarscopeError> {
        let path = self.csv_path(symbol, interval);
        let content = fs::read_to_string(&path).map_err(|e| BarscopeError::DataSource {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr.headers().map_err(|e| BarscopeError::DataSource {
            reason: format!("CSV header error: {}", e),
        })?;
        let columns = Columns::from_headers(headers)?;

        let mut bars = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| BarscopeError::DataSource {
                reason: format!("CSV parse error: {}", e),
            })?;

            let timestamp = parse_timestamp(record.get(columns.timestamp).unwrap_or_default())?;
            bars.push(Bar {
                timestamp,
                open: parse_field(&record, columns.open, "open")?,
                high: parse_field(&record, columns.high, "high")?,
                low: parse_field(&record, columns.low, "low")?,
                close: parse_field(&record, columns.close, "close")?,
                volume: parse_field(&record, columns.volume, "volume")?,
            });
        }

        let series = BarSeries::new(symbol, interval, bars);
        Ok(match range {
            Some((start, end)) => series.between(start, end),
            None => series,
        })
    }

    fn list_symbols(&self, interval: Interval) -> Result<Vec<String>, BarscopeError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| BarscopeError::DataSource {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let suffix = format!("_{}.csv", interval);
        let mut symbols = Vec::new();

        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();

            if let Some(symbol) = name_str.strip_suffix(&suffix) {
                if !symbol.is_empty() {
                    symbols.push(symbol.to_string());
                }
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}
