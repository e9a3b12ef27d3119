//! Cash, the single open position, and equity tracking for one backtest run.

use chrono::NaiveDateTime;

use super::position::{Position, Trade};

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_cash: f64,
    pub position: Option<Position>,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    /// Number of recorded equity points with a position open.
    pub bars_in_market: usize,
}

impl Portfolio {
    pub fn new(initial_cash: f64) -> Self {
        Portfolio {
            cash: initial_cash,
            initial_cash,
            position: None,
            trades: Vec::new(),
            equity_curve: Vec::new(),
            bars_in_market: 0,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    pub fn open(&mut self, position: Position) {
        self.position = Some(position);
    }

    pub fn take_position(&mut self) -> Option<Position> {
        self.position.take()
    }

    pub fn record_trade(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    pub fn total_equity(&self, price: f64) -> f64 {
        let position_value = self
            .position
            .as_ref()
            .map_or(0.0, |pos| pos.market_value(price));
        self.cash + position_value
    }

    /// Append a mark-to-market equity point at `price`.
    pub fn record_equity(&mut self, timestamp: NaiveDateTime, price: f64) {
        if self.position.is_some() {
            self.bars_in_market += 1;
        }
        let equity = self.total_equity(price);
        self.equity_curve.push(EquityPoint { timestamp, equity });
    }

    pub fn final_equity(&self) -> f64 {
        self.equity_curve
            .last()
            .map_or(self.initial_cash, |p| p.equity)
    }
}
