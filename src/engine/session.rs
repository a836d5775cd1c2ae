//! Session: one account's progression and statistics.
//!
//! A session applies settled rounds and reports when a stop condition
//! fires. It never stops itself; the orchestrator owns teardown.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::engine::events::BetInstruction;
use crate::strategy::evaluator::{self, payout_multiplier};
use crate::strategy::progression::{self, ProgressionState};
use crate::strategy::{BetTarget, ProgressionKind, Strategy};
use crate::types::{BotError, RoundOutcome, SessionId, SessionState, StopReason};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Cumulative results for one session. `bets_placed == wins + losses`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionStats {
    pub bets_placed: u64,
    pub wins: u64,
    pub losses: u64,
    /// Net result, signed.
    pub profit: Decimal,
    pub last_outcome: Option<RoundOutcome>,
    /// Reset to 0 on any win.
    pub consecutive_losses: u32,
    pub longest_losing_streak: u32,
    pub total_wagered: Decimal,
    pub largest_stake: Decimal,
    pub peak_profit: Decimal,
    /// Largest fall from `peak_profit`.
    pub max_drawdown: Decimal,
    /// Every round seen, including rounds skipped while waiting to enter.
    pub rounds_observed: u64,
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bets={} (W{}/L{}) profit=${:.2} wagered=${:.2} streak={} dd=${:.2}",
            self.bets_placed,
            self.wins,
            self.losses,
            self.profit,
            self.total_wagered,
            self.consecutive_losses,
            self.max_drawdown,
        )
    }
}

impl SessionStats {
    /// Win rate as a fraction. 0.0 before the first bet.
    pub fn win_rate(&self) -> f64 {
        if self.bets_placed == 0 {
            0.0
        } else {
            self.wins as f64 / self.bets_placed as f64
        }
    }

    /// Money totals saturate at the `Decimal` bounds instead of overflowing.
    fn record_bet(&mut self, stake: Decimal, won: bool, profit: Decimal) {
        self.bets_placed += 1;
        self.total_wagered = self.total_wagered.saturating_add(stake);
        self.largest_stake = self.largest_stake.max(stake);

        if won {
            self.wins += 1;
            self.consecutive_losses = 0;
        } else {
            self.losses += 1;
            self.consecutive_losses += 1;
            self.longest_losing_streak = self.longest_losing_streak.max(self.consecutive_losses);
        }

        self.profit = self.profit.saturating_add(profit);
        self.peak_profit = self.peak_profit.max(self.profit);
        self.max_drawdown = self
            .max_drawdown
            .max(self.peak_profit.saturating_sub(self.profit));
    }
}

// ---------------------------------------------------------------------------
// Round result
// ---------------------------------------------------------------------------

/// What applying one round did to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundApplied {
    /// False while the session is still waiting on its entry condition.
    pub bet_placed: bool,
    pub won: bool,
    /// Stake riding on this round (zero when no bet was placed).
    pub stake: Decimal,
    /// Net result of this round.
    pub profit: Decimal,
    pub next_stake: Decimal,
    pub should_stop: bool,
    pub stop_reason: Option<StopReason>,
}

// ---------------------------------------------------------------------------
// Reporting views
// ---------------------------------------------------------------------------

/// One row of the status query.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub account_id: String,
    pub strategy: Strategy,
    pub state: SessionState,
    pub stats: SessionStats,
    pub current_stake: Decimal,
    pub awaiting_entry: bool,
    pub start_time: DateTime<Utc>,
    pub stop_reason: Option<StopReason>,
}

/// Final record of a stopped session, kept for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub id: SessionId,
    pub account_id: String,
    pub strategy_name: String,
    pub kind: ProgressionKind,
    pub bet_target: BetTarget,
    pub stats: SessionStats,
    pub final_stake: Decimal,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub stop_reason: Option<StopReason>,
}

impl SessionReport {
    pub fn duration_secs(&self) -> i64 {
        (self.end_time - self.start_time).num_seconds()
    }
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = self
            .stop_reason
            .map(|r| r.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        write!(
            f,
            "[{}] {} ({} on {}) {} | {}s | {}",
            self.account_id,
            self.strategy_name,
            self.kind,
            self.bet_target,
            self.stats,
            self.duration_secs(),
            reason,
        )
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Mutable runtime state for one strategy on one account.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    account_id: String,
    strategy: Arc<Strategy>,
    progression: ProgressionState,
    stats: SessionStats,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    state: SessionState,
    stop_reason: Option<StopReason>,
    /// Consecutive misses of the target seen while waiting to enter.
    entry_misses: u32,
    armed: bool,
}

impl Session {
    /// A new session in `Starting` state.
    pub fn new(account_id: impl Into<String>, strategy: Arc<Strategy>) -> Self {
        Self::starting_at(account_id, strategy, Utc::now())
    }

    pub fn starting_at(
        account_id: impl Into<String>,
        strategy: Arc<Strategy>,
        start_time: DateTime<Utc>,
    ) -> Self {
        let armed = strategy.entry_condition.unwrap_or(0) == 0;
        Self {
            id: SessionId::new(),
            account_id: account_id.into(),
            progression: ProgressionState::initial(&strategy),
            strategy,
            stats: SessionStats::default(),
            start_time,
            end_time: None,
            state: SessionState::Starting,
            stop_reason: None,
            entry_misses: 0,
            armed,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn progression(&self) -> &ProgressionState {
        &self.progression
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    /// Still waiting for the entry condition before the first bet.
    pub fn awaiting_entry(&self) -> bool {
        !self.armed
    }

    /// The bet this session wants on the next round, if any.
    pub fn pending_bet(&self) -> Option<BetInstruction> {
        (self.is_active() && self.armed).then(|| BetInstruction {
            amount: self.progression.current_stake,
            target: self.strategy.bet_target,
        })
    }

    /// `Starting → Active`.
    pub fn activate(&mut self) {
        debug_assert_eq!(self.state, SessionState::Starting);
        self.state = SessionState::Active;
    }

    /// Apply one settled round using the current wall clock.
    pub fn apply_round(&mut self, outcome: &RoundOutcome) -> Result<RoundApplied, BotError> {
        self.apply_round_at(outcome, Utc::now())
    }

    /// Apply one settled round as of `now`.
    ///
    /// Rejected without mutation unless the session is `Active`.
    pub fn apply_round_at(
        &mut self,
        outcome: &RoundOutcome,
        now: DateTime<Utc>,
    ) -> Result<RoundApplied, BotError> {
        if !self.is_active() {
            return Err(BotError::SessionNotActive(self.id));
        }

        self.stats.rounds_observed += 1;

        if !self.armed {
            self.observe_entry(outcome);
            self.stats.last_outcome = Some(*outcome);
            let stop_reason = self.stop_condition(now);
            return Ok(RoundApplied {
                bet_placed: false,
                won: false,
                stake: Decimal::ZERO,
                profit: Decimal::ZERO,
                next_stake: self.progression.current_stake,
                should_stop: stop_reason.is_some(),
                stop_reason,
            });
        }

        let stake = self.progression.current_stake;
        let won = evaluator::is_win(&self.strategy, outcome);
        let profit = if won {
            stake.saturating_mul(payout_multiplier(self.strategy.bet_target))
        } else {
            -stake
        };

        self.stats.record_bet(stake, won, profit);
        self.stats.last_outcome = Some(*outcome);
        self.progression = progression::next_stake(&self.strategy, &self.progression, won);

        let stop_reason = self.stop_condition(now);

        debug!(
            session_id = %self.id,
            account = %self.account_id,
            outcome = %outcome,
            won,
            stake = %stake,
            profit = %self.stats.profit,
            next_stake = %self.progression.current_stake,
            "Round applied"
        );

        Ok(RoundApplied {
            bet_placed: true,
            won,
            stake,
            profit,
            next_stake: self.progression.current_stake,
            should_stop: stop_reason.is_some(),
            stop_reason,
        })
    }

    /// First matching stop condition, in priority order.
    pub fn stop_condition(&self, now: DateTime<Utc>) -> Option<StopReason> {
        let s = &self.strategy;
        let stats = &self.stats;

        if stats.profit >= s.target_profit {
            return Some(StopReason::TargetReached);
        }
        if stats.profit <= -s.stop_loss {
            return Some(StopReason::StopLossReached);
        }
        if stats.consecutive_losses >= s.max_consecutive_losses {
            return Some(StopReason::MaxLossesReached);
        }
        if let Some(max_bets) = s.max_consecutive_bets {
            if stats.bets_placed >= u64::from(max_bets) {
                return Some(StopReason::MaxBetsReached);
            }
        }
        if let Some(max_secs) = s.max_session_secs {
            let elapsed = (now - self.start_time).num_seconds();
            if elapsed >= 0 && elapsed as u64 >= max_secs {
                return Some(StopReason::TimeLimitReached);
            }
        }
        None
    }

    /// `Active → Stopping`, recording why.
    pub fn begin_stop(&mut self, reason: StopReason) -> Result<(), BotError> {
        if !self.is_active() {
            return Err(BotError::SessionNotActive(self.id));
        }
        self.state = SessionState::Stopping;
        self.stop_reason = Some(reason);
        Ok(())
    }

    /// `Stopping → Stopped`.
    pub fn finish_stop(&mut self, now: DateTime<Utc>) {
        debug_assert_eq!(self.state, SessionState::Stopping);
        self.state = SessionState::Stopped;
        self.end_time = Some(now);
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            account_id: self.account_id.clone(),
            strategy: (*self.strategy).clone(),
            state: self.state,
            stats: self.stats.clone(),
            current_stake: self.progression.current_stake,
            awaiting_entry: !self.armed,
            start_time: self.start_time,
            stop_reason: self.stop_reason,
        }
    }

    pub fn report(&self) -> SessionReport {
        SessionReport {
            id: self.id,
            account_id: self.account_id.clone(),
            strategy_name: self.strategy.name.clone(),
            kind: self.strategy.kind,
            bet_target: self.strategy.bet_target,
            stats: self.stats.clone(),
            final_stake: self.progression.current_stake,
            start_time: self.start_time,
            end_time: self.end_time.unwrap_or_else(Utc::now),
            stop_reason: self.stop_reason,
        }
    }

    fn observe_entry(&mut self, outcome: &RoundOutcome) {
        let needed = self.strategy.entry_condition.unwrap_or(0);
        if evaluator::target_hit(self.strategy.bet_target, outcome) {
            self.entry_misses = 0;
        } else {
            self.entry_misses += 1;
        }
        if self.entry_misses >= needed {
            self.armed = true;
            debug!(
                session_id = %self.id,
                misses = self.entry_misses,
                "Entry condition met, betting from next round"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
