//! Offline strategy backtesting.
//!
//! Replays a sequence of settled outcomes through a real `Session` (no
//! bridge, no orchestrator) to evaluate a strategy: profit curve, drawdown,
//! streaks, win rate and the stop condition that ended the run.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::engine::session::Session;
use crate::simulator::WheelSimulator;
use crate::strategy::Strategy;
use crate::types::{BotError, RoundOutcome, StopReason};

/// Account id recorded on backtest sessions.
const BACKTEST_ACCOUNT: &str = "backtest";

// ---------------------------------------------------------------------------
// Backtest results
// ---------------------------------------------------------------------------

/// Complete backtest performance report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    pub strategy_name: String,
    /// Outcomes supplied.
    pub rounds_available: usize,
    /// Outcomes consumed before the session stopped.
    pub rounds_played: usize,
    pub bets_placed: u64,
    pub wins: u64,
    pub losses: u64,
    pub win_rate: f64,
    pub final_profit: Decimal,
    pub peak_profit: Decimal,
    pub max_drawdown: Decimal,
    pub longest_losing_streak: u32,
    pub largest_stake: Decimal,
    pub total_wagered: Decimal,
    /// Profit as a percentage of everything wagered.
    pub return_on_wagered_pct: f64,
    /// `None` when the outcomes ran out before any stop condition fired.
    pub stop_reason: Option<StopReason>,
    /// Cumulative profit after each round played.
    pub profit_curve: Vec<Decimal>,
    /// Per-bet log. Rounds skipped waiting for entry are not listed.
    pub trade_log: Vec<BacktestTrade>,
}

/// Individual bet in the backtest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestTrade {
    /// 1-based index into the supplied outcomes.
    pub round: usize,
    pub outcome: RoundOutcome,
    pub stake: Decimal,
    pub won: bool,
    pub pnl: Decimal,
    pub cumulative_profit: Decimal,
}

// ---------------------------------------------------------------------------
// Backtester
// ---------------------------------------------------------------------------

pub struct Backtester {
    /// Synthetic clock step between rounds, for time-limited strategies.
    round_interval: Duration,
    start_time: DateTime<Utc>,
}

impl Default for Backtester {
    fn default() -> Self {
        Self::new(Duration::seconds(30))
    }
}

impl Backtester {
    pub fn new(round_interval: Duration) -> Self {
        Self {
            round_interval,
            start_time: Utc::now(),
        }
    }

    /// Run one strategy over `outcomes` in order.
    pub fn run(
        &self,
        strategy: Arc<Strategy>,
        outcomes: &[RoundOutcome],
    ) -> Result<BacktestReport, BotError> {
        strategy.validate()?;

        let mut session = Session::starting_at(BACKTEST_ACCOUNT, Arc::clone(&strategy), self.start_time);
        session.activate();

        let mut profit_curve = Vec::with_capacity(outcomes.len());
        let mut trade_log = Vec::new();
        let mut rounds_played = 0;

        for (i, outcome) in outcomes.iter().enumerate() {
            let now = self.clock_at(i + 1);
            let applied = session.apply_round_at(outcome, now)?;
            rounds_played += 1;

            let cumulative_profit = session.stats().profit;
            profit_curve.push(cumulative_profit);
            if applied.bet_placed {
                trade_log.push(BacktestTrade {
                    round: i + 1,
                    outcome: *outcome,
                    stake: applied.stake,
                    won: applied.won,
                    pnl: applied.profit,
                    cumulative_profit,
                });
            }

            if let Some(reason) = applied.stop_reason {
                session.begin_stop(reason)?;
                session.finish_stop(now);
                break;
            }
        }

        let stats = session.stats();
        let return_on_wagered_pct = if stats.total_wagered > Decimal::ZERO {
            stats
                .profit
                .checked_div(stats.total_wagered)
                .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
                .and_then(|pct| pct.to_f64())
                .unwrap_or(0.0)
        } else {
            0.0
        };

        let report = BacktestReport {
            strategy_name: strategy.name.clone(),
            rounds_available: outcomes.len(),
            rounds_played,
            bets_placed: stats.bets_placed,
            wins: stats.wins,
            losses: stats.losses,
            win_rate: stats.win_rate(),
            final_profit: stats.profit,
            peak_profit: stats.peak_profit,
            max_drawdown: stats.max_drawdown,
            longest_losing_streak: stats.longest_losing_streak,
            largest_stake: stats.largest_stake,
            total_wagered: stats.total_wagered,
            return_on_wagered_pct,
            stop_reason: session.stop_reason(),
            profit_curve,
            trade_log,
        };

        info!(
            strategy = %strategy.name,
            rounds = report.rounds_played,
            bets = report.bets_placed,
            profit = %report.final_profit,
            drawdown = %report.max_drawdown,
            stop_reason = ?report.stop_reason,
            "Backtest complete"
        );
        Ok(report)
    }

    /// Run over `rounds` spins of a seeded simulated wheel.
    pub fn run_simulated(
        &self,
        strategy: Arc<Strategy>,
        seed: u64,
        rounds: usize,
    ) -> Result<BacktestReport, BotError> {
        let outcomes = WheelSimulator::new(Some(seed)).spins(rounds);
        self.run(strategy, &outcomes)
    }

    /// Synthetic time of `round`. Pinned to the end of the calendar on overflow.
    fn clock_at(&self, round: usize) -> DateTime<Utc> {
        let round = i32::try_from(round).unwrap_or(i32::MAX);
        self.round_interval
            .checked_mul(round)
            .and_then(|offset| self.start_time.checked_add_signed(offset))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
