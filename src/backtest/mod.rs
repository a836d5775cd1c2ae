//! Strategy backtesting over recorded or simulated outcomes.

pub mod runner;

pub use runner::{BacktestReport, BacktestTrade, Backtester};
