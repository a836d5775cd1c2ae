//! Roulette bot: betting-progression and session-orchestration engine.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod backtest;
pub mod bridge;
pub mod config;
pub mod dashboard;
pub mod engine;
pub mod simulator;
pub mod storage;
pub mod strategy;
pub mod types;
