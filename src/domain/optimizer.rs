//! Parameter sweeps over a strategy's grid.
//!
//! Every combination is an independent backtest against the same daily
//! series, so the sweep fans out on rayon. Rows come back sorted by
//! parameter tuple regardless of completion order.

use rayon::prelude::*;
use std::cmp::Ordering as CmpOrdering;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::{info_span, warn};

use super::backtest::Backtester;
use super::error::BarscopeError;
use super::metrics::{PerformanceStats, Statistic};
use super::strategy::{StrategyConfig, StrategyName};

/// Candidate values for one parameter.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ParamRange {
    Fixed(f64),
    Values(Vec<f64>),
}

const STEP_EPSILON: f64 = 1e-9;
const SIGNIFICANT_DIGITS: i32 = 12;

/// Round to `SIGNIFICANT_DIGITS`, so `0.1 * 3` is keyed as `0.3`.
fn round_significant(value: f64) -> f64 {
    if value == 0.0 || !value.is_finite() {
        return value;
    }
    let magnitude = value.abs().log10().ceil() as i32;
    let scale = 10f64.powi(SIGNIFICANT_DIGITS - magnitude);
    (value * scale).round() / scale
}

impl ParamRange {
    /// Expand a half-open `start..stop` walk by `step` into explicit values.
    ///
    /// A negative step walks downwards. The expansion must not be empty.
    pub fn stepped(start: f64, stop: f64, step: f64) -> Result<Self, BarscopeError> {
        if !(start.is_finite() && stop.is_finite() && step.is_finite()) {
            return Err(BarscopeError::invalid("range", "bounds and step must be finite"));
        }
        if step == 0.0 {
            return Err(BarscopeError::invalid("range", "step must be non-zero"));
        }

        // Shave off division noise so a stop that lands on the grid stays excluded.
        let steps = (stop - start) / step;
        let count = (steps - STEP_EPSILON * steps.abs().max(1.0)).ceil();
        if count < 1.0 {
            return Err(BarscopeError::invalid(
                "range",
                format!("{start}:{stop}:{step} is empty"),
            ));
        }
        let values = (0..count as usize)
            .map(|i| round_significant(start + step * i as f64))
            .collect();
        Ok(ParamRange::Values(values))
    }

    /// Parse `v`, `a, b, c`, or `start:stop:step`.
    pub fn parse(s: &str) -> Result<Self, BarscopeError> {
        let number = |part: &str| -> Result<f64, BarscopeError> {
            part.trim()
                .parse::<f64>()
                .map_err(|_| BarscopeError::invalid("range", format!("'{}' is not a number", part.trim())))
        };

        if s.contains(':') {
            let parts: Vec<&str> = s.split(':').collect();
            return match parts.as_slice() {
                [start, stop, step] => Self::stepped(number(start)?, number(stop)?, number(step)?),
                [start, stop] => Self::stepped(number(start)?, number(stop)?, 1.0),
                _ => Err(BarscopeError::invalid(
                    "range",
                    format!("expected start:stop:step, got '{s}'"),
                )),
            };
        }

        if s.contains(',') {
            let values = s
                .split(',')
                .filter(|p| !p.trim().is_empty())
                .map(number)
                .collect::<Result<Vec<_>, _>>()?;
            let range = ParamRange::Values(values);
            range.validate("range")?;
            return Ok(range);
        }

        let value = number(s)?;
        let range = ParamRange::Fixed(value);
        range.validate("range")?;
        Ok(range)
    }

    pub fn values(&self) -> &[f64] {
        match self {
            ParamRange::Fixed(v) => std::slice::from_ref(v),
            ParamRange::Values(values) => values,
        }
    }

    pub fn len(&self) -> usize {
        self.values().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values().is_empty()
    }

    fn validate(&self, name: &str) -> Result<(), BarscopeError> {
        if self.is_empty() {
            return Err(BarscopeError::invalid(name, "no candidate values"));
        }
        if self.values().iter().any(|v| !v.is_finite()) {
            return Err(BarscopeError::invalid(name, "candidate values must be finite"));
        }
        Ok(())
    }
}

impl FromStr for ParamRange {
    type Err = BarscopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Named parameter ranges. Keys iterate in name order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamGrid {
    ranges: BTreeMap<String, ParamRange>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, range: ParamRange) -> Result<(), BarscopeError> {
        let name = name.into();
        range.validate(&name)?;
        self.ranges.insert(name, range);
        Ok(())
    }

    pub fn with(mut self, name: impl Into<String>, range: ParamRange) -> Result<Self, BarscopeError> {
        self.insert(name, range)?;
        Ok(self)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ranges.keys().map(String::as_str)
    }

    /// Number of combinations. An empty grid has one: all defaults.
    pub fn size(&self) -> usize {
        self.ranges.values().map(ParamRange::len).product()
    }

    /// Cartesian product, the last name varying fastest.
    pub fn combinations(&self) -> Vec<BTreeMap<String, f64>> {
        let mut combos = vec![BTreeMap::new()];
        for (name, range) in &self.ranges {
            combos = combos
                .into_iter()
                .flat_map(|combo| {
                    range.values().iter().map(move |&v| {
                        let mut next = combo.clone();
                        next.insert(name.clone(), v);
                        next
                    })
                })
                .collect();
        }
        combos
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct OptimizationRow {
    pub params: BTreeMap<String, f64>,
    pub stats: Option<PerformanceStats>,
    /// Why the combination could not be run.
    pub error: Option<String>,
}

impl OptimizationRow {
    /// Statistic value; `None` for failed rows and NaN values.
    pub fn value(&self, statistic: Statistic) -> Option<f64> {
        self.stats
            .as_ref()
            .map(|s| statistic.value(s))
            .filter(|v| !v.is_nan())
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct OptimizationResult {
    pub strategy: StrategyName,
    pub statistic: Statistic,
    /// Sorted by parameter tuple.
    pub rows: Vec<OptimizationRow>,
    best: Option<usize>,
}

impl OptimizationResult {
    /// Row maximizing the chosen statistic; the first in parameter order on ties.
    pub fn best(&self) -> Option<&OptimizationRow> {
        self.best.map(|i| &self.rows[i])
    }

    /// Rows by descending `statistic`, failed rows last.
    pub fn ranked(&self, statistic: Statistic) -> Vec<&OptimizationRow> {
        let mut rows: Vec<&OptimizationRow> = self.rows.iter().collect();
        rows.sort_by(|a, b| match (a.value(statistic), b.value(statistic)) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => CmpOrdering::Less,
            (None, Some(_)) => CmpOrdering::Greater,
            (None, None) => CmpOrdering::Equal,
        });
        rows
    }

    /// Parameter combination to statistic value, NaN where a run failed.
    pub fn heatmap(&self, statistic: Statistic) -> Vec<(&BTreeMap<String, f64>, f64)> {
        self.rows
            .iter()
            .map(|row| (&row.params, row.value(statistic).unwrap_or(f64::NAN)))
            .collect()
    }

    pub fn failed(&self) -> usize {
        self.rows.iter().filter(|r| r.stats.is_none()).count()
    }
}

/// Sweep driver bound to one prepared [`Backtester`].
pub struct Optimizer<'a> {
    backtester: &'a Backtester,
    statistic: Statistic,
    threads: Option<usize>,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> Optimizer<'a> {
    pub fn new(backtester: &'a Backtester) -> Self {
        Self {
            backtester,
            statistic: Statistic::default(),
            threads: None,
            cancel: None,
        }
    }

    pub fn with_statistic(mut self, statistic: Statistic) -> Self {
        self.statistic = statistic;
        self
    }

    /// Run on a dedicated pool of `threads` workers instead of the global pool.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Checked before each run; once set, the sweep stops and returns
    /// [`BarscopeError::Cancelled`].
    pub fn with_cancel_flag(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn optimize(
        &self,
        strategy: StrategyName,
        grid: &ParamGrid,
    ) -> Result<OptimizationResult, BarscopeError> {
        let _span = info_span!(
            "optimize",
            symbol = %self.backtester.series().symbol(),
            strategy = %strategy,
            statistic = %self.statistic,
        )
        .entered();

        for name in grid.names() {
            let known = strategy.param_names().contains(&name)
                || name == "stop_loss"
                || name == "take_profit";
            if !known {
                return Err(BarscopeError::invalid(
                    name,
                    format!("not a parameter of {strategy}"),
                ));
            }
        }

        let combos = grid.combinations();
        let total = combos.len();
        let completed = AtomicUsize::new(0);

        let run_one = |params: &BTreeMap<String, f64>| -> Option<OptimizationRow> {
            if self.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                return None;
            }
            let outcome = StrategyConfig::from_params(strategy, params)
                .and_then(|config| self.backtester.run(&config));
            completed.fetch_add(1, Ordering::Relaxed);
            Some(match outcome {
                Ok(result) => OptimizationRow {
                    params: params.clone(),
                    stats: Some(result.stats),
                    error: None,
                },
                Err(e) => {
                    warn!(?params, error = %e, "combination failed");
                    OptimizationRow {
                        params: params.clone(),
                        stats: None,
                        error: Some(e.to_string()),
                    }
                }
            })
        };

        let sweep = || -> Vec<Option<OptimizationRow>> { combos.par_iter().map(&run_one).collect() };
        let outcomes = match self.threads {
            Some(threads) => rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| BarscopeError::invalid("threads", e.to_string()))?
                .install(sweep),
            None => sweep(),
        };

        let mut rows = outcomes
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| BarscopeError::Cancelled {
                completed: completed.load(Ordering::Relaxed),
                total,
            })?;
        rows.sort_by(|a, b| compare_params(&a.params, &b.params));

        let mut best: Option<(usize, f64)> = None;
        for (i, row) in rows.iter().enumerate() {
            if let Some(v) = row.value(self.statistic) {
                if best.is_none_or(|(_, top)| v > top) {
                    best = Some((i, v));
                }
            }
        }

        Ok(OptimizationResult {
            strategy,
            statistic: self.statistic,
            rows,
            best: best.map(|(i, _)| i),
        })
    }
}

fn compare_params(a: &BTreeMap<String, f64>, b: &BTreeMap<String, f64>) -> CmpOrdering {
    a.values()
        .zip(b.values())
        .map(|(x, y)| x.total_cmp(y))
        .find(|o| o.is_ne())
        .unwrap_or(CmpOrdering::Equal)
}
