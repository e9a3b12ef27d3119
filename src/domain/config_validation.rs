//! Configuration validation.
//!
//! Validates every section before any data is loaded or simulated.
//!
//! ```ini
//! [data]
//! dir = ./data
//! symbol = AAPL
//! interval = 1d
//! start_date = 2020-01-01
//! end_date = 2024-12-31
//!
//! [backtest]
//! initial_cash = 100000
//! commission = 0.002
//! risk_free_rate = 0.0
//! min_bars = 30
//!
//! [strategy]
//! name = ema_cross
//! n1 = 50
//! n2 = 200
//! stop_loss = 0.05
//!
//! [optimize]
//! statistic = final_equity
//! threads = 4
//! n1 = 10:60:10
//! n2 = 100, 150, 200
//! ```

use std::collections::BTreeMap;

use crate::domain::error::BarscopeError;
use crate::domain::metrics::Statistic;
use crate::domain::ohlcv::Interval;
use crate::domain::optimizer::{ParamGrid, ParamRange};
use crate::domain::strategy::{StrategyConfig, StrategyName};
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

const OPTIMIZE_OPTIONS: [&str; 2] = ["statistic", "threads"];

fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> BarscopeError {
    BarscopeError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn config_missing(section: &str, key: &str) -> BarscopeError {
    BarscopeError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), BarscopeError> {
    read_symbol(config)?;
    read_interval(config)?;
    read_date_range(config)?;
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), BarscopeError> {
    validate_initial_cash(config)?;
    validate_commission(config)?;
    validate_risk_free_rate(config)?;
    validate_min_bars(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), BarscopeError> {
    let (name, params) = read_strategy_params(config)?;
    StrategyConfig::from_params(name, &params).map_err(|e| match e {
        BarscopeError::InvalidParameter { name, reason } => config_invalid("strategy", &name, reason),
        other => other,
    })?;
    Ok(())
}

pub fn validate_optimize_config(config: &dyn ConfigPort) -> Result<(), BarscopeError> {
    read_statistic(config)?;
    if config.get_string("optimize", "threads").is_some() && config.get_int("optimize", "threads", 0) < 1 {
        return Err(config_invalid(
            "optimize",
            "threads",
            "threads must be a whole number of at least 1",
        ));
    }
    read_param_grid(config)?;
    Ok(())
}

pub fn read_symbol(config: &dyn ConfigPort) -> Result<String, BarscopeError> {
    match config.get_string("data", "symbol") {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(config_missing("data", "symbol")),
    }
}

/// Bar interval, `1d` when absent.
pub fn read_interval(config: &dyn ConfigPort) -> Result<Interval, BarscopeError> {
    match config.get_string("data", "interval") {
        None => Ok(Interval::OneDay),
        Some(s) => s
            .parse()
            .map_err(|e: BarscopeError| config_invalid("data", "interval", e.to_string())),
    }
}

/// Inclusive date range. Either bound may be omitted; both absent is `None`.
pub fn read_date_range(
    config: &dyn ConfigPort,
) -> Result<Option<(NaiveDate, NaiveDate)>, BarscopeError> {
    let start = parse_date(config, "start_date")?;
    let end = parse_date(config, "end_date")?;
    match (start, end) {
        (None, None) => Ok(None),
        (start, end) => {
            let start = start.unwrap_or(NaiveDate::MIN);
            let end = end.unwrap_or(NaiveDate::MAX);
            if start > end {
                return Err(config_invalid(
                    "data",
                    "start_date",
                    "start_date must not be after end_date",
                ));
            }
            Ok(Some((start, end)))
        }
    }
}

fn parse_date(config: &dyn ConfigPort, field: &str) -> Result<Option<NaiveDate>, BarscopeError> {
    config
        .get_string("data", field)
        .map(|s| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
                config_invalid(
                    "data",
                    field,
                    format!("invalid {} format, expected YYYY-MM-DD", field),
                )
            })
        })
        .transpose()
}

fn validate_initial_cash(config: &dyn ConfigPort) -> Result<(), BarscopeError> {
    let value = config.get_double("backtest", "initial_cash", 100_000.0);
    if value <= 0.0 || !value.is_finite() {
        return Err(config_invalid(
            "backtest",
            "initial_cash",
            "initial_cash must be positive",
        ));
    }
    Ok(())
}

fn validate_commission(config: &dyn ConfigPort) -> Result<(), BarscopeError> {
    let value = config.get_double("backtest", "commission", 0.002);
    if !(0.0..1.0).contains(&value) {
        return Err(config_invalid(
            "backtest",
            "commission",
            "commission must be a fraction between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<(), BarscopeError> {
    let value = config.get_double("backtest", "risk_free_rate", 0.0);
    if !(0.0..1.0).contains(&value) {
        return Err(config_invalid(
            "backtest",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_min_bars(config: &dyn ConfigPort) -> Result<(), BarscopeError> {
    let value = config.get_int("backtest", "min_bars", 30);
    if value < 1 {
        return Err(config_invalid(
            "backtest",
            "min_bars",
            "min_bars must be at least 1",
        ));
    }
    Ok(())
}

/// Strategy name and its numeric overrides from `[strategy]`.
pub fn read_strategy_name(config: &dyn ConfigPort) -> Result<StrategyName, BarscopeError> {
    let name = config
        .get_string("strategy", "name")
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| config_missing("strategy", "name"))?;
    name.parse()
        .map_err(|e: BarscopeError| config_invalid("strategy", "name", e.to_string()))
}

pub fn read_strategy_params(
    config: &dyn ConfigPort,
) -> Result<(StrategyName, BTreeMap<String, f64>), BarscopeError> {
    let name = read_strategy_name(config)?;
    let mut params = BTreeMap::new();
    for key in config.keys("strategy") {
        if key == "name" {
            continue;
        }
        let raw = config.get_string("strategy", &key).unwrap_or_default();
        let value: f64 = raw
            .trim()
            .parse()
            .map_err(|_| config_invalid("strategy", &key, format!("'{}' is not a number", raw.trim())))?;
        params.insert(key, value);
    }
    Ok((name, params))
}

/// Statistic to maximize, final equity when absent.
pub fn read_statistic(config: &dyn ConfigPort) -> Result<Statistic, BarscopeError> {
    match config.get_string("optimize", "statistic") {
        None => Ok(Statistic::default()),
        Some(s) => s
            .parse()
            .map_err(|e: BarscopeError| config_invalid("optimize", "statistic", e.to_string())),
    }
}

/// Parameter ranges from `[optimize]`. Strategy parameters in `[strategy]`
/// that have no range are swept as fixed values.
pub fn read_param_grid(config: &dyn ConfigPort) -> Result<ParamGrid, BarscopeError> {
    let (name, fixed) = read_strategy_params(config)?;
    let mut grid = ParamGrid::new();
    for (key, value) in fixed {
        grid.insert(key, ParamRange::Fixed(value))?;
    }

    for key in config.keys("optimize") {
        if OPTIMIZE_OPTIONS.contains(&key.as_str()) {
            continue;
        }
        let known = name.param_names().contains(&key.as_str())
            || key == "stop_loss"
            || key == "take_profit";
        if !known {
            return Err(config_invalid(
                "optimize",
                &key,
                format!("not a parameter of {}", name),
            ));
        }
        let raw = config.get_string("optimize", &key).unwrap_or_default();
        let range = ParamRange::parse(&raw).map_err(|e| config_invalid("optimize", &key, e.to_string()))?;
        grid.insert(key, range)?;
    }
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn assert_invalid_key(err: BarscopeError, expected: &str) {
        assert!(
            matches!(&err, BarscopeError::ConfigInvalid { key, .. } if key == expected),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn valid_full_config_passes() {
        let config = make_config(
            r#"
[data]
dir = ./data
symbol = AAPL
interval = 1d
start_date = 2020-01-01
end_date = 2024-12-31

[backtest]
initial_cash = 100000.0
commission = 0.002
risk_free_rate = 0.02
min_bars = 30

[strategy]
name = ema_cross
n1 = 20
n2 = 50
stop_loss = 0.05

[optimize]
statistic = sharpe_ratio
threads = 2
n1 = 10:40:10
n2 = 50, 100
"#,
        );
        assert!(validate_data_config(&config).is_ok());
        assert!(validate_backtest_config(&config).is_ok());
        assert!(validate_strategy_config(&config).is_ok());
        assert!(validate_optimize_config(&config).is_ok());
    }

    #[test]
    fn defaults_apply_to_empty_backtest_section() {
        let config = make_config("[backtest]\n");
        assert!(validate_backtest_config(&config).is_ok());
    }

    #[test]
    fn symbol_is_required() {
        let config = make_config("[data]\ninterval = 1d\n");
        let err = validate_data_config(&config).unwrap_err();
        assert!(matches!(err, BarscopeError::ConfigMissing { key, .. } if key == "symbol"));
    }

    #[test]
    fn interval_must_parse() {
        let config = make_config("[data]\nsymbol = X\ninterval = 3d\n");
        assert_invalid_key(validate_data_config(&config).unwrap_err(), "interval");
    }

    #[test]
    fn interval_defaults_to_daily() {
        let config = make_config("[data]\nsymbol = X\n");
        assert_eq!(read_interval(&config).unwrap(), Interval::OneDay);
    }

    #[test]
    fn dates_must_be_ordered() {
        let config = make_config("[data]\nsymbol = X\nstart_date = 2024-01-01\nend_date = 2023-01-01\n");
        assert_invalid_key(validate_data_config(&config).unwrap_err(), "start_date");
    }

    #[test]
    fn dates_must_parse() {
        let config = make_config("[data]\nsymbol = X\nend_date = 01/02/2024\n");
        assert_invalid_key(validate_data_config(&config).unwrap_err(), "end_date");
    }

    #[test]
    fn open_ended_range() {
        let config = make_config("[data]\nsymbol = X\nstart_date = 2024-01-01\n");
        let (start, end) = read_date_range(&config).unwrap().unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(end, NaiveDate::MAX);
        assert!(read_date_range(&make_config("[data]\n")).unwrap().is_none());
    }

    #[test]
    fn initial_cash_must_be_positive() {
        let config = make_config("[backtest]\ninitial_cash = -100\n");
        assert_invalid_key(validate_backtest_config(&config).unwrap_err(), "initial_cash");
    }

    #[test]
    fn commission_must_be_fraction() {
        let config = make_config("[backtest]\ncommission = 2\n");
        assert_invalid_key(validate_backtest_config(&config).unwrap_err(), "commission");
    }

    #[test]
    fn risk_free_rate_range() {
        let config = make_config("[backtest]\nrisk_free_rate = -0.1\n");
        assert_invalid_key(validate_backtest_config(&config).unwrap_err(), "risk_free_rate");
    }

    #[test]
    fn min_bars_at_least_one() {
        let config = make_config("[backtest]\nmin_bars = 0\n");
        assert_invalid_key(validate_backtest_config(&config).unwrap_err(), "min_bars");
    }

    #[test]
    fn strategy_name_required_and_known() {
        let missing = make_config("[strategy]\nn1 = 5\n");
        assert!(matches!(
            validate_strategy_config(&missing).unwrap_err(),
            BarscopeError::ConfigMissing { key, .. } if key == "name"
        ));
        let unknown = make_config("[strategy]\nname = turtle\n");
        assert_invalid_key(validate_strategy_config(&unknown).unwrap_err(), "name");
    }

    #[test]
    fn strategy_params_must_be_numbers_and_valid() {
        let not_number = make_config("[strategy]\nname = ema_cross\nn1 = fast\n");
        assert_invalid_key(validate_strategy_config(&not_number).unwrap_err(), "n1");

        let bad_thresholds =
            make_config("[strategy]\nname = rsi_oscillator\nbuy_threshold = 80\nsell_threshold = 20\n");
        assert!(matches!(
            validate_strategy_config(&bad_thresholds).unwrap_err(),
            BarscopeError::ConfigInvalid { section, .. } if section == "strategy"
        ));

        let bad_stop = make_config("[strategy]\nname = ema_cross\nstop_loss = 5\n");
        assert_invalid_key(validate_strategy_config(&bad_stop).unwrap_err(), "stop_loss");

        let unknown = make_config("[strategy]\nname = ema_cross\nperiod = 5\n");
        assert_invalid_key(validate_strategy_config(&unknown).unwrap_err(), "period");
    }

    #[test]
    fn strategy_params_are_read() {
        let config = make_config("[strategy]\nname = MACD-Cross\nfast = 8\nslow = 21\n");
        let (name, params) = read_strategy_params(&config).unwrap();
        assert_eq!(name, StrategyName::MacdCross);
        assert_eq!(params.len(), 2);
        assert_eq!(params["fast"], 8.0);
    }

    #[test]
    fn optimize_statistic_must_parse() {
        let config = make_config("[strategy]\nname = ema_cross\n[optimize]\nstatistic = alpha\n");
        assert_invalid_key(validate_optimize_config(&config).unwrap_err(), "statistic");
    }

    #[test]
    fn optimize_threads_at_least_one() {
        let config = make_config("[strategy]\nname = ema_cross\n[optimize]\nthreads = 0\n");
        assert_invalid_key(validate_optimize_config(&config).unwrap_err(), "threads");
    }

    #[test]
    fn optimize_ranges_must_parse_and_be_known() {
        let bad_range = make_config("[strategy]\nname = ema_cross\n[optimize]\nn1 = 10:5:1\n");
        assert_invalid_key(validate_optimize_config(&bad_range).unwrap_err(), "n1");

        let unknown = make_config("[strategy]\nname = ema_cross\n[optimize]\nfast = 1, 2\n");
        assert_invalid_key(validate_optimize_config(&unknown).unwrap_err(), "fast");
    }

    #[test]
    fn param_grid_merges_fixed_strategy_values() {
        let config = make_config(
            "[strategy]\nname = ema_cross\nn2 = 200\nstop_loss = 0.1\n[optimize]\nn1 = 10:40:10\nn2 = 100, 150\n",
        );
        let grid = read_param_grid(&config).unwrap();
        assert_eq!(grid.size(), 6);
        assert_eq!(grid.names().collect::<Vec<_>>(), vec!["n1", "n2", "stop_loss"]);
    }
}
