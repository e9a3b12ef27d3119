//! Core domain types and logic.

pub mod ohlcv;
pub mod error;
pub mod indicator;
pub mod indicator_helpers;
pub mod pattern;
pub mod analysis;
pub mod summary;
pub mod strategy;
pub mod position;
pub mod portfolio;
pub mod execution;
pub mod backtest;
pub mod metrics;
pub mod optimizer;
pub mod config_validation;
