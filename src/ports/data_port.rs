//! Market data access port trait.

use crate::domain::error::BarscopeError;
use crate::domain::ohlcv::{BarSeries, Interval};
use chrono::NaiveDate;

pub trait DataPort {
    /// Bars for `symbol` at `interval`, optionally limited to an inclusive
    /// date range.
    fn fetch_bars(
        &self,
        symbol: &str,
        interval: Interval,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<BarSeries, BarscopeError>;

    fn list_symbols(&self, interval: Interval) -> Result<Vec<String>, BarscopeError>;
}
