//! Fill simulation for the single-instrument long-only executor.
//!
//! Entries and signal exits fill at the bar close. Stop-loss and take-profit
//! exits fill at their trigger level. Commission is a fraction of notional
//! charged on both legs.

use chrono::NaiveDateTime;

use super::ohlcv::Bar;
use super::portfolio::Portfolio;
use super::position::{ExitReason, Position, Trade};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionConfig {
    /// Fraction of notional, e.g. `0.002` for 0.2%.
    pub commission_rate: f64,
    /// Stop distance below entry as a fraction.
    pub stop_loss: Option<f64>,
    /// Target distance above entry as a fraction.
    pub take_profit: Option<f64>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            commission_rate: 0.0,
            stop_loss: None,
            take_profit: None,
        }
    }
}

pub fn calculate_commission(trade_value: f64, config: &ExecutionConfig) -> f64 {
    trade_value.abs() * config.commission_rate
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryResult {
    Entered {
        size: f64,
        execution_price: f64,
        cost: f64,
        commission: f64,
    },
    InsufficientCapital,
}

/// Invest all cash at the bar close.
///
/// Size is `cash / close`; the entry commission is taken on top, so cash
/// ends marginally negative while the position is open.
pub fn enter_long(
    portfolio: &mut Portfolio,
    index: usize,
    bar: &Bar,
    config: &ExecutionConfig,
) -> EntryResult {
    let execution_price = bar.close;
    let positive = |v: f64| v > 0.0;
    if !positive(portfolio.cash) || !positive(execution_price) {
        return EntryResult::InsufficientCapital;
    }

    let size = portfolio.cash / execution_price;
    let cost = size * execution_price;
    let commission = calculate_commission(cost, config);
    portfolio.cash -= cost + commission;

    portfolio.open(Position {
        size,
        entry_price: execution_price,
        entry_index: index,
        entry_time: bar.timestamp,
        entry_commission: commission,
        stop_loss: config.stop_loss.map(|s| execution_price * (1.0 - s)),
        take_profit: config.take_profit.map(|t| execution_price * (1.0 + t)),
    });

    EntryResult::Entered {
        size,
        execution_price,
        cost,
        commission,
    }
}

/// Close the open position at `price` and record the trade.
///
/// Returns `None` when flat.
pub fn exit_position(
    portfolio: &mut Portfolio,
    index: usize,
    timestamp: NaiveDateTime,
    price: f64,
    reason: ExitReason,
    config: &ExecutionConfig,
) -> Option<Trade> {
    let position = portfolio.take_position()?;

    let exit_value = position.size * price;
    let exit_commission = calculate_commission(exit_value, config);
    let commission = position.entry_commission + exit_commission;
    let pnl = position.unrealized_pnl(price) - commission;
    let entry_notional = position.size * position.entry_price;
    let return_pct = if entry_notional > 0.0 {
        pnl / entry_notional * 100.0
    } else {
        0.0
    };

    portfolio.cash += exit_value - exit_commission;

    let trade = Trade {
        entry_index: position.entry_index,
        exit_index: index,
        entry_time: position.entry_time,
        exit_time: timestamp,
        entry_price: position.entry_price,
        exit_price: price,
        size: position.size,
        pnl,
        return_pct,
        commission,
        exit_reason: reason,
    };
    portfolio.record_trade(trade.clone());
    Some(trade)
}

/// Intrabar stop-loss / take-profit check for the open position.
///
/// A stop breached by the bar low wins over a target breached by the high.
pub fn check_triggers(portfolio: &Portfolio, bar: &Bar) -> Option<(f64, ExitReason)> {
    let pos = portfolio.position.as_ref()?;
    if pos.should_stop_loss(bar.low) {
        return pos.stop_loss.map(|stop| (stop, ExitReason::StopLoss));
    }
    if pos.should_take_profit(bar.high) {
        return pos.take_profit.map(|target| (target, ExitReason::TakeProfit));
    }
    None
}
