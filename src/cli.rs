//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::analysis::analyze;
use crate::domain::backtest::{BacktestConfig, BacktestResult, Backtester};
use crate::domain::config_validation::{
    read_date_range, read_interval, read_param_grid, read_statistic, read_strategy_name,
    read_strategy_params, read_symbol, validate_backtest_config, validate_data_config, validate_optimize_config,
    validate_strategy_config,
};
use crate::domain::error::BarscopeError;
use crate::domain::ohlcv::{BarSeries, Interval};
use crate::domain::optimizer::{OptimizationResult, Optimizer};
use crate::domain::strategy::StrategyConfig;
use crate::domain::summary::TechnicalSummary;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;

const LOG_ENV: &str = "BARSCOPE_LOG";

#[derive(Parser, Debug)]
#[command(name = "barscope", about = "Technical analysis and strategy backtesting")]
pub struct Cli {
    /// Log filter used when BARSCOPE_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compute indicators and patterns and print a technical summary
    Analyze {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        interval: Option<Interval>,
    },
    /// Run the configured strategy once
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        /// Print the trade log
        #[arg(long)]
        trades: bool,
    },
    /// Sweep the configured parameter grid
    Optimize {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        /// Number of ranked rows to print
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Validate a configuration file without loading data
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List symbols with data files for an interval
    ListSymbols {
        #[arg(long)]
        data_dir: PathBuf,
        #[arg(long, default_value = "1d")]
        interval: Interval,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    if let Err(e) = init_tracing(&cli.log_level) {
        eprintln!("error: {e}");
        return ExitCode::from(2);
    }

    match cli.command {
        Command::Analyze {
            config,
            symbol,
            interval,
        } => run_analyze(&config, symbol.as_deref(), interval),
        Command::Backtest {
            config,
            symbol,
            trades,
        } => run_backtest(&config, symbol.as_deref(), trades),
        Command::Optimize {
            config,
            symbol,
            top,
        } => run_optimize(&config, symbol.as_deref(), top),
        Command::Validate { config } => run_validate(&config),
        Command::ListSymbols { data_dir, interval } => run_list_symbols(data_dir, interval),
    }
}

/// Install the stderr subscriber. `BARSCOPE_LOG` overrides `log_level`.
pub fn init_tracing(log_level: &str) -> Result<(), String> {
    let filter = std::env::var(LOG_ENV).unwrap_or_else(|_| log_level.to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(filter)
        .map_err(|err| format!("invalid log filter: {err}"))?;

    // A subscriber may already be installed when run() is called repeatedly.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
    Ok(())
}

fn fail(err: BarscopeError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::from(&err)
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(fail)
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, BarscopeError> {
    validate_backtest_config(adapter)?;
    let defaults = BacktestConfig::default();
    let min_bars = adapter.get_int("backtest", "min_bars", defaults.min_bars as i64);
    Ok(BacktestConfig {
        initial_cash: adapter.get_double("backtest", "initial_cash", defaults.initial_cash),
        commission: adapter.get_double("backtest", "commission", defaults.commission),
        risk_free_rate: adapter.get_double("backtest", "risk_free_rate", defaults.risk_free_rate),
        min_bars: usize::try_from(min_bars).unwrap_or(defaults.min_bars),
    })
}

pub fn build_strategy_config(adapter: &dyn ConfigPort) -> Result<StrategyConfig, BarscopeError> {
    validate_strategy_config(adapter)?;
    let (name, params) = read_strategy_params(adapter)?;
    StrategyConfig::from_params(name, &params)
}

/// Fetch the configured series through the CSV adapter rooted at `[data] dir`.
pub fn load_series(
    adapter: &dyn ConfigPort,
    symbol_override: Option<&str>,
    interval_override: Option<Interval>,
) -> Result<BarSeries, BarscopeError> {
    let symbol = match symbol_override {
        Some(s) => s.to_string(),
        None => read_symbol(adapter)?,
    };
    let interval = match interval_override {
        Some(i) => i,
        None => read_interval(adapter)?,
    };
    let range = read_date_range(adapter)?;
    let dir = adapter
        .get_string("data", "dir")
        .unwrap_or_else(|| ".".to_string());

    eprintln!("Loading {} {} bars from {}", symbol, interval, dir);
    let data = CsvAdapter::new(PathBuf::from(dir));
    let series = data.fetch_bars(&symbol, interval, range)?;
    eprintln!("  {} bars loaded", series.len());
    Ok(series)
}

pub fn backtest_from_config(
    config: &dyn ConfigPort,
    symbol: Option<&str>,
) -> Result<BacktestResult, BarscopeError> {
    let backtest_config = build_backtest_config(config)?;
    let strategy = build_strategy_config(config)?;
    let series = load_series(config, symbol, None)?;
    eprintln!("Running {} on {}", strategy.name(), series.symbol());
    let backtester = Backtester::new(&series, backtest_config)?;
    backtester.run(&strategy)
}

pub fn optimize_from_config(
    config: &dyn ConfigPort,
    symbol: Option<&str>,
) -> Result<OptimizationResult, BarscopeError> {
    validate_optimize_config(config)?;
    let backtest_config = build_backtest_config(config)?;
    let name = read_strategy_name(config)?;
    let grid = read_param_grid(config)?;
    let statistic = read_statistic(config)?;
    let series = load_series(config, symbol, None)?;
    eprintln!(
        "Sweeping {} combinations of {} by {}",
        grid.size(),
        name,
        statistic
    );
    let backtester = Backtester::new(&series, backtest_config)?;
    let mut optimizer = Optimizer::new(&backtester).with_statistic(statistic);
    let threads = config.get_int("optimize", "threads", 0);
    if threads > 0 {
        optimizer = optimizer.with_threads(threads as usize);
    }
    optimizer.optimize(name, &grid)
}

fn run_analyze(config_path: &Path, symbol: Option<&str>, interval: Option<Interval>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let result = load_series(&config, symbol, interval).and_then(|series| {
        let analysis = analyze(&series)?;
        let summary = TechnicalSummary::from_analysis(&series, &analysis)?;
        Ok((analysis, summary))
    });

    match result {
        Ok((analysis, summary)) => {
            println!("{summary}");
            eprintln!(
                "\n{} peaks, {} troughs, {} crosses, {} breakout bars",
                analysis.peaks.len(),
                analysis.troughs.len(),
                analysis.crosses.len(),
                analysis.breakouts.iter().filter(|&&b| b != 0).count()
            );
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn run_backtest(config_path: &Path, symbol: Option<&str>, show_trades: bool) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let result = backtest_from_config(&config, symbol);

    match result {
        Ok(result) => {
            println!("{}", result.stats);
            if show_trades {
                println!(
                    "\n{:>6} {:>6} {:>12} {:>12} {:>12} {:>8}  reason",
                    "entry", "exit", "entry_px", "exit_px", "pnl", "ret%"
                );
                for t in &result.trades {
                    println!(
                        "{:>6} {:>6} {:>12.4} {:>12.4} {:>12.2} {:>8.2}  {}",
                        t.entry_index,
                        t.exit_index,
                        t.entry_price,
                        t.exit_price,
                        t.pnl,
                        t.return_pct,
                        t.exit_reason
                    );
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn run_optimize(config_path: &Path, symbol: Option<&str>, top: usize) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let result = optimize_from_config(&config, symbol);

    match result {
        Ok(result) => {
            print_optimization(&result, top);
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn print_optimization(result: &OptimizationResult, top: usize) {
    let statistic = result.statistic;
    let names: Vec<&str> = result
        .rows
        .first()
        .map(|r| r.params.keys().map(String::as_str).collect())
        .unwrap_or_default();

    let header: Vec<String> = names.iter().map(|n| format!("{n:>12}")).collect();
    println!("{} {:>16}", header.join(" "), statistic);
    for row in result.ranked(statistic).into_iter().take(top) {
        let params: Vec<String> = row.params.values().map(|v| format!("{v:>12}")).collect();
        match (row.value(statistic), &row.error) {
            (Some(v), _) => println!("{} {:>16.4}", params.join(" "), v),
            (None, Some(e)) => println!("{} {:>16}  ({e})", params.join(" "), "failed"),
            (None, None) => println!("{} {:>16}", params.join(" "), "NaN"),
        }
    }

    if let Some(best) = result.best() {
        let params: Vec<String> = best.params.iter().map(|(k, v)| format!("{k}={v}")).collect();
        eprintln!("\nBest: {}", params.join(", "));
    }
    if result.failed() > 0 {
        eprintln!("{} of {} combinations failed", result.failed(), result.rows.len());
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let checks: [(&str, fn(&dyn ConfigPort) -> Result<(), BarscopeError>); 4] = [
        ("data", validate_data_config),
        ("backtest", validate_backtest_config),
        ("strategy", validate_strategy_config),
        ("optimize", validate_optimize_config),
    ];
    for (section, check) in checks {
        let present = !config.keys(section).is_empty();
        if !present && section != "data" && section != "strategy" {
            continue;
        }
        if let Err(e) = check(&config) {
            return fail(e);
        }
        eprintln!("  [{section}] ok");
    }

    eprintln!("Config validated successfully");
    ExitCode::SUCCESS
}

fn run_list_symbols(data_dir: PathBuf, interval: Interval) -> ExitCode {
    let data = CsvAdapter::new(data_dir);
    match data.list_symbols(interval) {
        Ok(symbols) if symbols.is_empty() => {
            eprintln!("No symbols found for interval {}", interval);
            ExitCode::SUCCESS
        }
        Ok(symbols) => {
            for symbol in &symbols {
                println!("{}", symbol);
            }
            eprintln!("{} symbols found", symbols.len());
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}
