//! Core domain types and logic.

pub mod ohlcv;
pub mod series;
pub mod signal;
pub mod indicator;
pub mod strategy;
pub mod position;
pub mod portfolio;
pub mod backtest;
pub mod metrics;
pub mod risk;
pub mod decision;
pub mod analysis;
pub mod config_validation;
pub mod universe;
pub mod error;
