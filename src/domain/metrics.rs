//! Performance statistics for a backtest run and benchmark comparison.

use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;

use super::error::BarscopeError;
use super::ohlcv::BarSeries;
use super::portfolio::{EquityPoint, Portfolio};

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const CALENDAR_DAYS_PER_YEAR: f64 = 365.25;

/// Result sheet of one backtest. Percentages are in percent units.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PerformanceStats {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub duration_bars: usize,
    pub exposure_pct: f64,
    pub final_equity: f64,
    pub peak_equity: f64,
    pub total_return_pct: f64,
    pub buy_hold_return_pct: f64,
    pub annualized_return_pct: f64,
    pub annualized_volatility_pct: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown_pct: f64,
    pub max_drawdown_duration: usize,
    pub trade_count: usize,
    pub win_rate_pct: f64,
    pub best_trade_pct: f64,
    pub worst_trade_pct: f64,
    pub avg_trade_pct: f64,
    pub profit_factor: f64,
    pub total_commission: f64,
}

impl PerformanceStats {
    pub fn compute(portfolio: &Portfolio, series: &BarSeries, risk_free_rate: f64) -> Self {
        let equity_curve = &portfolio.equity_curve;
        let trades = &portfolio.trades;
        let initial_cash = portfolio.initial_cash;
        let final_equity = portfolio.final_equity();

        let total_return = if initial_cash > 0.0 {
            (final_equity - initial_cash) / initial_cash
        } else {
            0.0
        };

        let bars = equity_curve.len();
        let years = bars as f64 / TRADING_DAYS_PER_YEAR;
        let annualized_return = if years > 0.0 && total_return > -1.0 && total_return.is_finite() {
            (1.0 + total_return).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let peak_equity = equity_curve
            .iter()
            .map(|p| p.equity)
            .fold(initial_cash, f64::max);

        let buy_hold_return = match (series.bars().first(), series.bars().last()) {
            (Some(first), Some(last)) if first.close > 0.0 => last.close / first.close - 1.0,
            _ => 0.0,
        };

        let exposure = if bars > 0 {
            portfolio.bars_in_market as f64 / bars as f64
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(equity_curve);

        let returns = period_returns(equity_curve);
        let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
        let (sharpe_ratio, sortino_ratio) = compute_risk_adjusted(&returns, daily_rf);
        let annualized_volatility = population_stddev(&returns) * TRADING_DAYS_PER_YEAR.sqrt();

        let mut wins = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut total_commission = 0.0_f64;
        for trade in trades {
            if trade.pnl > 0.0 {
                wins += 1;
                total_wins += trade.pnl;
            } else if trade.pnl < 0.0 {
                total_losses += trade.pnl.abs();
            }
            total_commission += trade.commission;
        }

        let trade_count = trades.len();
        let win_rate = if trade_count > 0 {
            wins as f64 / trade_count as f64
        } else {
            0.0
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let trade_returns = trades.iter().map(|t| t.return_pct);
        let (best_trade_pct, worst_trade_pct, avg_trade_pct) = if trade_count > 0 {
            (
                trade_returns.clone().fold(f64::NEG_INFINITY, f64::max),
                trade_returns.clone().fold(f64::INFINITY, f64::min),
                trade_returns.sum::<f64>() / trade_count as f64,
            )
        } else {
            (0.0, 0.0, 0.0)
        };

        PerformanceStats {
            start: equity_curve.first().map(|p| p.timestamp),
            end: equity_curve.last().map(|p| p.timestamp),
            duration_bars: bars,
            exposure_pct: exposure * 100.0,
            final_equity,
            peak_equity,
            total_return_pct: total_return * 100.0,
            buy_hold_return_pct: buy_hold_return * 100.0,
            annualized_return_pct: annualized_return * 100.0,
            annualized_volatility_pct: annualized_volatility * 100.0,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown_pct: max_drawdown * 100.0,
            max_drawdown_duration,
            trade_count,
            win_rate_pct: win_rate * 100.0,
            best_trade_pct,
            worst_trade_pct,
            avg_trade_pct,
            profit_factor,
            total_commission,
        }
    }
}

impl fmt::Display for PerformanceStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ts = |t: Option<NaiveDateTime>| t.map_or_else(|| "-".to_string(), |t| t.to_string());
        writeln!(f, "{:<26}{}", "Start", ts(self.start))?;
        writeln!(f, "{:<26}{}", "End", ts(self.end))?;
        writeln!(f, "{:<26}{}", "Duration [bars]", self.duration_bars)?;
        writeln!(f, "{:<26}{:.2}", "Exposure Time [%]", self.exposure_pct)?;
        writeln!(f, "{:<26}{:.2}", "Equity Final [$]", self.final_equity)?;
        writeln!(f, "{:<26}{:.2}", "Equity Peak [$]", self.peak_equity)?;
        writeln!(f, "{:<26}{:.2}", "Return [%]", self.total_return_pct)?;
        writeln!(f, "{:<26}{:.2}", "Buy & Hold Return [%]", self.buy_hold_return_pct)?;
        writeln!(f, "{:<26}{:.2}", "Return (Ann.) [%]", self.annualized_return_pct)?;
        writeln!(f, "{:<26}{:.2}", "Volatility (Ann.) [%]", self.annualized_volatility_pct)?;
        writeln!(f, "{:<26}{:.4}", "Sharpe Ratio", self.sharpe_ratio)?;
        writeln!(f, "{:<26}{:.4}", "Sortino Ratio", self.sortino_ratio)?;
        writeln!(f, "{:<26}{:.2}", "Max. Drawdown [%]", -self.max_drawdown_pct)?;
        writeln!(f, "{:<26}{}", "Max. Drawdown Duration", self.max_drawdown_duration)?;
        writeln!(f, "{:<26}{}", "# Trades", self.trade_count)?;
        writeln!(f, "{:<26}{:.2}", "Win Rate [%]", self.win_rate_pct)?;
        writeln!(f, "{:<26}{:.2}", "Best Trade [%]", self.best_trade_pct)?;
        writeln!(f, "{:<26}{:.2}", "Worst Trade [%]", self.worst_trade_pct)?;
        writeln!(f, "{:<26}{:.2}", "Avg. Trade [%]", self.avg_trade_pct)?;
        writeln!(f, "{:<26}{:.4}", "Profit Factor", self.profit_factor)?;
        write!(f, "{:<26}{:.2}", "Commissions [$]", self.total_commission)
    }
}

/// Statistic an optimization maximizes. Higher is better for every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Statistic {
    #[default]
    FinalEquity,
    ReturnPct,
    AnnualizedReturn,
    SharpeRatio,
    SortinoRatio,
    WinRate,
    ProfitFactor,
    /// Negated max drawdown, so shallower drawdowns rank higher.
    MaxDrawdown,
}

impl Statistic {
    pub const ALL: [Statistic; 8] = [
        Statistic::FinalEquity,
        Statistic::ReturnPct,
        Statistic::AnnualizedReturn,
        Statistic::SharpeRatio,
        Statistic::SortinoRatio,
        Statistic::WinRate,
        Statistic::ProfitFactor,
        Statistic::MaxDrawdown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Statistic::FinalEquity => "final_equity",
            Statistic::ReturnPct => "return_pct",
            Statistic::AnnualizedReturn => "annualized_return",
            Statistic::SharpeRatio => "sharpe_ratio",
            Statistic::SortinoRatio => "sortino_ratio",
            Statistic::WinRate => "win_rate",
            Statistic::ProfitFactor => "profit_factor",
            Statistic::MaxDrawdown => "max_drawdown",
        }
    }

    pub fn value(self, stats: &PerformanceStats) -> f64 {
        match self {
            Statistic::FinalEquity => stats.final_equity,
            Statistic::ReturnPct => stats.total_return_pct,
            Statistic::AnnualizedReturn => stats.annualized_return_pct,
            Statistic::SharpeRatio => stats.sharpe_ratio,
            Statistic::SortinoRatio => stats.sortino_ratio,
            Statistic::WinRate => stats.win_rate_pct,
            Statistic::ProfitFactor => stats.profit_factor,
            Statistic::MaxDrawdown => -stats.max_drawdown_pct,
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Statistic {
    type Err = BarscopeError;

    /// Accepts snake_case names as well as result-sheet labels such as
    /// `Equity Final [$]` or `Win Rate [%]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s
            .to_ascii_lowercase()
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect::<Vec<_>>()
            .join("_");
        match normalized.as_str() {
            "final_equity" | "equity_final" | "equity" => Ok(Statistic::FinalEquity),
            "return_pct" | "return" | "total_return" => Ok(Statistic::ReturnPct),
            "annualized_return" | "return_ann" => Ok(Statistic::AnnualizedReturn),
            "sharpe_ratio" | "sharpe" => Ok(Statistic::SharpeRatio),
            "sortino_ratio" | "sortino" => Ok(Statistic::SortinoRatio),
            "win_rate" | "win_rate_pct" => Ok(Statistic::WinRate),
            "profit_factor" => Ok(Statistic::ProfitFactor),
            "max_drawdown" | "max_drawdown_pct" => Ok(Statistic::MaxDrawdown),
            _ => Err(BarscopeError::UnknownStatistic {
                name: s.to_string(),
            }),
        }
    }
}

/// Benchmark comparison over two value histories. Values are fractions.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BenchmarkMetrics {
    pub beta: f64,
    pub sharpe_ratio: f64,
    pub annualized_volatility: f64,
    pub cumulative_return: f64,
    pub annualized_return: f64,
    /// Deepest peak-to-trough decline, `<= 0`.
    pub max_drawdown: f64,
}

/// Compare an equity history against a benchmark history.
///
/// Per-period returns of each history are joined on timestamp. Returns
/// `None` when either history is empty or fewer than two returns align.
pub fn benchmark_metrics(
    equity: &[EquityPoint],
    benchmark: &[EquityPoint],
    risk_free_rate: f64,
) -> Option<BenchmarkMetrics> {
    let (first, last) = (equity.first()?, equity.last()?);
    if benchmark.is_empty() {
        return None;
    }

    let portfolio_returns = timed_returns(equity);
    let benchmark_returns = timed_returns(benchmark);
    let aligned: Vec<(f64, f64)> = portfolio_returns
        .iter()
        .filter_map(|(t, r)| {
            benchmark_returns
                .binary_search_by(|(bt, _)| bt.cmp(t))
                .ok()
                .map(|i| (*r, benchmark_returns[i].1))
        })
        .collect();
    if aligned.len() < 2 {
        return None;
    }

    let (p, b): (Vec<f64>, Vec<f64>) = aligned.into_iter().unzip();
    let variance = sample_variance(&b);
    let beta = if variance != 0.0 {
        sample_covariance(&p, &b) / variance
    } else {
        0.0
    };

    let returns: Vec<f64> = portfolio_returns.iter().map(|(_, r)| *r).collect();
    let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
    let excess_std = sample_variance(&excess).sqrt();
    let sharpe_ratio = if excess_std != 0.0 {
        mean(&excess) / excess_std * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };
    let annualized_volatility = sample_variance(&returns).sqrt() * TRADING_DAYS_PER_YEAR.sqrt();

    let cumulative_return = if first.equity != 0.0 {
        last.equity / first.equity - 1.0
    } else {
        0.0
    };
    let days = (last.timestamp - first.timestamp).num_days();
    let annualized_return = if days > 0 {
        (1.0 + cumulative_return).powf(CALENDAR_DAYS_PER_YEAR / days as f64) - 1.0
    } else {
        0.0
    };

    let (drawdown, _) = compute_drawdown(equity);

    Some(BenchmarkMetrics {
        beta,
        sharpe_ratio,
        annualized_volatility,
        cumulative_return,
        annualized_return,
        max_drawdown: -drawdown,
    })
}

/// Deepest drawdown as a fraction of the running peak, and the longest
/// stretch of consecutive points spent below a peak.
fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, usize) {
    let Some(first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0usize;
    let mut current_dd_duration = 0usize;

    for point in equity_curve {
        if point.equity >= peak {
            peak = point.equity;
            current_dd_duration = 0;
        } else if peak > 0.0 {
            let dd = (peak - point.equity) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
            current_dd_duration += 1;
            if current_dd_duration > max_dd_duration {
                max_dd_duration = current_dd_duration;
            }
        }
    }

    (max_dd, max_dd_duration)
}

fn period_returns(equity_curve: &[EquityPoint]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].equity;
            let curr = w[1].equity;
            if prev > 0.0 {
                (curr - prev) / prev
            } else {
                0.0
            }
        })
        .collect()
}

fn timed_returns(history: &[EquityPoint]) -> Vec<(NaiveDateTime, f64)> {
    history
        .windows(2)
        .zip(period_returns(history))
        .map(|(w, r)| (w[1].timestamp, r))
        .collect()
}

/// Annualized Sharpe and Sortino ratios from per-period returns.
fn compute_risk_adjusted(returns: &[f64], daily_rf: f64) -> (f64, f64) {
    if returns.is_empty() {
        return (0.0, 0.0);
    }

    let n = returns.len() as f64;
    let stddev = population_stddev(returns);
    let excess_return = mean(returns) - daily_rf;

    let sharpe = if stddev > 0.0 {
        (excess_return / stddev) * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    let downside: f64 = returns
        .iter()
        .filter(|&&r| r < daily_rf)
        .map(|&r| (r - daily_rf).powi(2))
        .sum();
    let downside_stddev = (downside / n).sqrt();

    let sortino = if downside_stddev > 0.0 {
        (excess_return / downside_stddev) * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    (sharpe, sortino)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_stddev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

fn sample_variance(values: &[f64]) -> f64 {
    sample_covariance(values, values)
}

fn sample_covariance(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let (ma, mb) = (mean(&a[..n]), mean(&b[..n]));
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - ma) * (y - mb))
        .sum::<f64>()
        / (n - 1) as f64
}
