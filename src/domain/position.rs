//! Open long positions and closed trade records.

use chrono::NaiveDateTime;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub size: f64,
    pub entry_price: f64,
    pub entry_index: usize,
    pub entry_time: NaiveDateTime,
    pub entry_commission: f64,
    /// Absolute stop price, if a stop-loss fraction was configured.
    pub stop_loss: Option<f64>,
    /// Absolute take-profit price, if configured.
    pub take_profit: Option<f64>,
}

impl Position {
    pub fn market_value(&self, price: f64) -> f64 {
        self.size * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.size * (price - self.entry_price)
    }

    pub fn should_stop_loss(&self, low: f64) -> bool {
        self.stop_loss.is_some_and(|stop| low <= stop)
    }

    pub fn should_take_profit(&self, high: f64) -> bool {
        self.take_profit.is_some_and(|target| high >= target)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ExitReason {
    Signal,
    StopLoss,
    TakeProfit,
    EndOfData,
}

impl ExitReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ExitReason::Signal => "signal",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::EndOfData => "end_of_data",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Trade {
    pub entry_index: usize,
    pub exit_index: usize,
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub entry_price: f64,
    pub exit_price: f64,
    pub size: f64,
    /// Net of both commissions.
    pub pnl: f64,
    /// `pnl` as a percentage of entry notional.
    pub return_pct: f64,
    /// Entry plus exit commission.
    pub commission: f64,
    pub exit_reason: ExitReason,
}

impl Trade {
    pub fn duration_bars(&self) -> usize {
        self.exit_index.saturating_sub(self.entry_index)
    }

    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn sample_position() -> Position {
        Position {
            size: 100.0,
            entry_price: 50.0,
            entry_index: 3,
            entry_time: ts(15),
            entry_commission: 10.0,
            stop_loss: Some(45.0),
            take_profit: Some(60.0),
        }
    }

    #[test]
    fn market_value_and_pnl() {
        let pos = sample_position();
        assert!((pos.market_value(55.0) - 5500.0).abs() < f64::EPSILON);
        assert!((pos.unrealized_pnl(55.0) - 500.0).abs() < f64::EPSILON);
        assert!((pos.unrealized_pnl(45.0) + 500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn stop_loss_triggered_by_low() {
        let pos = sample_position();
        assert!(pos.should_stop_loss(44.0));
        assert!(pos.should_stop_loss(45.0));
        assert!(!pos.should_stop_loss(46.0));
    }

    #[test]
    fn take_profit_triggered_by_high() {
        let pos = sample_position();
        assert!(pos.should_take_profit(61.0));
        assert!(pos.should_take_profit(60.0));
        assert!(!pos.should_take_profit(59.0));
    }

    #[test]
    fn disabled_levels_never_trigger() {
        let pos = Position {
            stop_loss: None,
            take_profit: None,
            ..sample_position()
        };
        assert!(!pos.should_stop_loss(0.0));
        assert!(!pos.should_take_profit(1_000_000.0));
    }

    #[test]
    fn trade_duration_and_outcome() {
        let trade = Trade {
            entry_index: 3,
            exit_index: 8,
            entry_time: ts(15),
            exit_time: ts(20),
            entry_price: 50.0,
            exit_price: 55.0,
            size: 100.0,
            pnl: 485.0,
            return_pct: 9.7,
            commission: 15.0,
            exit_reason: ExitReason::Signal,
        };
        assert_eq!(trade.duration_bars(), 5);
        assert!(trade.is_win());
        assert_eq!(trade.exit_reason.to_string(), "signal");
    }
}
