//! Single-instrument, long-only backtest engine and its event loop.

use tracing::{debug, info_span};

use super::error::BarscopeError;
use super::execution::{check_triggers, enter_long, exit_position, EntryResult, ExecutionConfig};
use super::metrics::PerformanceStats;
use super::ohlcv::BarSeries;
use super::portfolio::{EquityPoint, Portfolio};
use super::position::{ExitReason, Trade};
use super::strategy::{PositionState, Signal, Strategy, StrategyConfig};

pub const DEFAULT_INITIAL_CASH: f64 = 100_000.0;
pub const DEFAULT_COMMISSION: f64 = 0.002;
pub const DEFAULT_MIN_BARS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BacktestConfig {
    pub initial_cash: f64,
    /// Fraction of notional charged per fill.
    pub commission: f64,
    /// Annual rate used by the Sharpe and Sortino ratios.
    pub risk_free_rate: f64,
    /// Minimum number of daily bars required to run.
    pub min_bars: usize,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_cash: DEFAULT_INITIAL_CASH,
            commission: DEFAULT_COMMISSION,
            risk_free_rate: 0.0,
            min_bars: DEFAULT_MIN_BARS,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), BarscopeError> {
        if !self.initial_cash.is_finite() || self.initial_cash <= 0.0 {
            return Err(BarscopeError::invalid(
                "initial_cash",
                format!("must be a positive number, got {}", self.initial_cash),
            ));
        }
        if !(0.0..1.0).contains(&self.commission) {
            return Err(BarscopeError::invalid(
                "commission",
                format!("must be in [0, 1), got {}", self.commission),
            ));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(BarscopeError::invalid("risk_free_rate", "must be finite"));
        }
        if self.min_bars == 0 {
            return Err(BarscopeError::invalid("min_bars", "must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BacktestResult {
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<Trade>,
    pub stats: PerformanceStats,
}

/// A daily series ready to be simulated against any number of strategies.
#[derive(Debug, Clone)]
pub struct Backtester {
    series: BarSeries,
    config: BacktestConfig,
}

impl Backtester {
    /// Resamples sub-daily input to daily bars and checks the bar count.
    pub fn new(series: &BarSeries, config: BacktestConfig) -> Result<Self, BarscopeError> {
        config.validate()?;
        let daily = series.to_daily();
        if daily.len() < config.min_bars {
            return Err(BarscopeError::InsufficientData {
                context: format!("backtest of {}", series.symbol()),
                bars: daily.len(),
                minimum: config.min_bars,
            });
        }
        Ok(Self {
            series: daily,
            config,
        })
    }

    pub fn series(&self) -> &BarSeries {
        &self.series
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    pub fn run(&self, strategy: &StrategyConfig) -> Result<BacktestResult, BarscopeError> {
        let _span = info_span!(
            "backtest",
            symbol = %self.series.symbol(),
            strategy = %strategy.name(),
        )
        .entered();

        strategy.validate()?;
        let mut prepared = strategy.prepare(&self.series)?;
        let execution = ExecutionConfig {
            commission_rate: self.config.commission,
            stop_loss: strategy.stop_loss,
            take_profit: strategy.take_profit,
        };
        Ok(self.run_strategy(&mut prepared, &execution))
    }

    /// Drive any [`Strategy`] bar by bar.
    ///
    /// Per bar: an intrabar stop or target closes the position and skips the
    /// strategy for that bar; otherwise the signal is applied. An open
    /// position is force-closed at the last close before the final equity
    /// point. Entries on the final bar are ignored.
    pub fn run_strategy<S: Strategy + ?Sized>(
        &self,
        strategy: &mut S,
        execution: &ExecutionConfig,
    ) -> BacktestResult {
        let bars = self.series.bars();
        let last_index = bars.len().saturating_sub(1);
        let mut portfolio = Portfolio::new(self.config.initial_cash);

        for (index, bar) in bars.iter().enumerate() {
            let triggered = check_triggers(&portfolio, bar);
            if let Some((price, reason)) = triggered {
                if let Some(trade) =
                    exit_position(&mut portfolio, index, bar.timestamp, price, reason, execution)
                {
                    debug!(index, price, pnl = trade.pnl, reason = %reason, "position closed");
                }
            } else {
                let state = if portfolio.is_flat() {
                    PositionState::Flat
                } else {
                    PositionState::Long
                };
                match strategy.on_bar(index, bar, state) {
                    Signal::EnterLong if portfolio.is_flat() && index < last_index => {
                        if let EntryResult::Entered { size, .. } =
                            enter_long(&mut portfolio, index, bar, execution)
                        {
                            debug!(index, price = bar.close, size, "entered long");
                        }
                    }
                    Signal::Exit if !portfolio.is_flat() => {
                        if let Some(trade) = exit_position(
                            &mut portfolio,
                            index,
                            bar.timestamp,
                            bar.close,
                            ExitReason::Signal,
                            execution,
                        ) {
                            debug!(index, price = bar.close, pnl = trade.pnl, "exited on signal");
                        }
                    }
                    _ => {}
                }
            }

            if index == last_index {
                exit_position(
                    &mut portfolio,
                    index,
                    bar.timestamp,
                    bar.close,
                    ExitReason::EndOfData,
                    execution,
                );
            }
            portfolio.record_equity(bar.timestamp, bar.close);
        }

        let stats = PerformanceStats::compute(&portfolio, &self.series, self.config.risk_free_rate);
        debug!(
            trades = stats.trade_count,
            final_equity = stats.final_equity,
            "backtest complete"
        );

        BacktestResult {
            equity_curve: portfolio.equity_curve,
            trades: portfolio.trades,
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::{Bar, Interval};
    use crate::domain::strategy::{StrategyKind, StrategyName};
    use chrono::{Duration, NaiveDate};

    struct Scripted(Vec<Signal>);

    impl Strategy for Scripted {
        fn on_bar(&mut self, index: usize, _bar: &Bar, _state: PositionState) -> Signal {
            self.0.get(index).copied().unwrap_or(Signal::Hold)
        }
    }

    fn make_bars(rows: &[(f64, f64, f64)]) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        rows.iter()
            .enumerate()
            .map(|(i, &(low, high, close))| Bar {
                timestamp: start + Duration::days(i as i64),
                open: close,
                high,
                low,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    fn flat_rows(closes: &[f64]) -> Vec<(f64, f64, f64)> {
        closes.iter().map(|&c| (c, c, c)).collect()
    }

    fn backtester(rows: &[(f64, f64, f64)]) -> Backtester {
        let series = BarSeries::new("TEST", Interval::OneDay, make_bars(rows));
        let config = BacktestConfig {
            commission: 0.0,
            min_bars: 1,
            ..BacktestConfig::default()
        };
        Backtester::new(&series, config).unwrap()
    }

    fn no_stops() -> ExecutionConfig {
        ExecutionConfig::default()
    }

    #[test]
    fn default_config() {
        let c = BacktestConfig::default();
        assert!((c.initial_cash - 100_000.0).abs() < f64::EPSILON);
        assert!((c.commission - 0.002).abs() < f64::EPSILON);
        assert!(c.risk_free_rate.abs() < f64::EPSILON);
        assert_eq!(c.min_bars, 30);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn config_validation() {
        let bad_cash = BacktestConfig {
            initial_cash: 0.0,
            ..BacktestConfig::default()
        };
        assert!(bad_cash.validate().is_err());
        let bad_commission = BacktestConfig {
            commission: 1.5,
            ..BacktestConfig::default()
        };
        assert!(bad_commission.validate().is_err());
        let bad_rf = BacktestConfig {
            risk_free_rate: f64::NAN,
            ..BacktestConfig::default()
        };
        assert!(bad_rf.validate().is_err());
    }

    #[test]
    fn too_few_bars_is_insufficient_data() {
        let series = BarSeries::new("TEST", Interval::OneDay, make_bars(&flat_rows(&[1.0; 10])));
        let err = Backtester::new(&series, BacktestConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            BarscopeError::InsufficientData {
                bars: 10,
                minimum: 30,
                ..
            }
        ));
    }

    #[test]
    fn hourly_input_is_resampled_to_daily() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let bars: Vec<Bar> = (0..24)
            .map(|i| Bar {
                timestamp: start + Duration::hours((i / 6) * 24 + i % 6),
                open: 10.0,
                high: 11.0,
                low: 9.0,
                close: 10.0,
                volume: 1.0,
            })
            .collect();
        let series = BarSeries::new("TEST", Interval::OneHour, bars);
        let config = BacktestConfig {
            min_bars: 4,
            ..BacktestConfig::default()
        };
        let bt = Backtester::new(&series, config).unwrap();
        assert_eq!(bt.series().len(), 4);
        assert_eq!(bt.series().interval(), Interval::OneDay);
    }

    #[test]
    fn never_signalling_keeps_cash() {
        let bt = backtester(&flat_rows(&[100.0, 105.0, 95.0, 110.0]));
        let result = bt.run_strategy(&mut Scripted(vec![]), &no_stops());
        assert!(result.trades.is_empty());
        assert_eq!(result.equity_curve.len(), 4);
        assert!(result
            .equity_curve
            .iter()
            .all(|p| (p.equity - 100_000.0).abs() < f64::EPSILON));
        assert!((result.stats.final_equity - 100_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn signal_round_trip() {
        let bt = backtester(&flat_rows(&[100.0, 100.0, 110.0, 120.0, 120.0]));
        let mut strategy = Scripted(vec![
            Signal::Hold,
            Signal::EnterLong,
            Signal::Hold,
            Signal::Exit,
        ]);
        let result = bt.run_strategy(&mut strategy, &no_stops());

        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.entry_index, 1);
        assert_eq!(trade.exit_index, 3);
        assert_eq!(trade.exit_reason, ExitReason::Signal);
        assert!((trade.pnl - 20_000.0).abs() < 1e-6);
        assert!((result.equity_curve[2].equity - 110_000.0).abs() < 1e-6);
        assert!((result.stats.final_equity - 120_000.0).abs() < 1e-6);
        assert!((result.stats.exposure_pct - 40.0).abs() < 1e-9);
    }

    #[test]
    fn stop_loss_closes_at_level_and_skips_signal() {
        let rows = [
            (100.0, 100.0, 100.0),
            (90.0, 101.0, 98.0),
            (98.0, 98.0, 98.0),
            (98.0, 98.0, 98.0),
        ];
        let bt = backtester(&rows);
        let mut strategy = Scripted(vec![Signal::EnterLong, Signal::EnterLong, Signal::EnterLong]);
        let execution = ExecutionConfig {
            stop_loss: Some(0.05),
            ..no_stops()
        };
        let result = bt.run_strategy(&mut strategy, &execution);

        assert_eq!(result.trades.len(), 2);
        let stopped = &result.trades[0];
        assert_eq!(stopped.exit_reason, ExitReason::StopLoss);
        assert_eq!(stopped.exit_index, 1);
        assert!((stopped.exit_price - 95.0).abs() < 1e-9);
        assert!((stopped.pnl + 5_000.0).abs() < 1e-6);

        let reentry = &result.trades[1];
        assert_eq!(reentry.entry_index, 2);
        assert_eq!(reentry.exit_reason, ExitReason::EndOfData);
    }

    #[test]
    fn take_profit_closes_at_target() {
        let rows = [(100.0, 100.0, 100.0), (100.0, 112.0, 104.0), (104.0, 104.0, 104.0)];
        let bt = backtester(&rows);
        let execution = ExecutionConfig {
            take_profit: Some(0.10),
            ..no_stops()
        };
        let result = bt.run_strategy(&mut Scripted(vec![Signal::EnterLong]), &execution);
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].exit_reason, ExitReason::TakeProfit);
        assert!((result.trades[0].exit_price - 110.0).abs() < 1e-9);
    }

    #[test]
    fn open_position_closed_at_end_of_data() {
        let bt = backtester(&flat_rows(&[100.0, 100.0, 150.0]));
        let result = bt.run_strategy(&mut Scripted(vec![Signal::EnterLong]), &no_stops());
        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.exit_reason, ExitReason::EndOfData);
        assert_eq!(trade.exit_index, 2);
        assert!((result.stats.final_equity - 150_000.0).abs() < 1e-6);
        assert_eq!(result.equity_curve.len(), 3);
    }

    #[test]
    fn entry_on_final_bar_is_ignored() {
        let bt = backtester(&flat_rows(&[100.0, 100.0]));
        let mut strategy = Scripted(vec![Signal::Hold, Signal::EnterLong]);
        let result = bt.run_strategy(&mut strategy, &no_stops());
        assert!(result.trades.is_empty());
    }

    #[test]
    fn commission_charged_on_both_legs() {
        let series = BarSeries::new(
            "TEST",
            Interval::OneDay,
            make_bars(&flat_rows(&[100.0, 100.0, 100.0])),
        );
        let config = BacktestConfig {
            min_bars: 1,
            ..BacktestConfig::default()
        };
        let bt = Backtester::new(&series, config).unwrap();
        let execution = ExecutionConfig {
            commission_rate: config.commission,
            ..no_stops()
        };
        let mut strategy = Scripted(vec![Signal::EnterLong, Signal::Exit]);
        let result = bt.run_strategy(&mut strategy, &execution);
        assert!((result.trades[0].commission - 400.0).abs() < 1e-6);
        assert!((result.stats.final_equity - 99_600.0).abs() < 1e-6);
    }

    #[test]
    fn run_validates_strategy() {
        let bt = backtester(&flat_rows(&[100.0; 40]));
        let bad = StrategyConfig {
            kind: StrategyName::EmaCross.default_kind(),
            stop_loss: Some(1.5),
            take_profit: None,
        };
        assert!(matches!(
            bt.run(&bad),
            Err(BarscopeError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn run_named_strategy_on_flat_series_has_no_trades() {
        let bt = backtester(&flat_rows(&[100.0; 40]));
        let config = StrategyConfig {
            kind: StrategyKind::EmaCross { n1: 5, n2: 10 },
            stop_loss: None,
            take_profit: None,
        };
        let result = bt.run(&config).unwrap();
        assert!(result.trades.is_empty());
        assert_eq!(result.equity_curve.len(), 40);
    }

    #[test]
    fn exit_wins_same_bar_entry_while_long() {
        let closes = [
            100.0, 100.5, 99.5, 100.0, 90.0, 95.0, 94.0, 93.0, 92.0, 60.0, 130.0, 130.0, 130.0,
        ];
        let bt = backtester(&flat_rows(&closes));
        let config = StrategyConfig {
            kind: StrategyKind::BollingerReversion { length: 3, std: 1.0 },
            stop_loss: None,
            take_profit: None,
        };
        let result = bt.run(&config).unwrap();

        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.entry_index, 3);
        assert_eq!(trade.exit_index, 10);
        assert_eq!(trade.exit_reason, ExitReason::Signal);
    }
}
