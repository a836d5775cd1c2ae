//! Progression engine.
//!
//! Pure stake sequencing: given the strategy, the current progression state
//! and whether the last bet won, compute the next stake. No I/O, no
//! randomness, no caps. Table limits and balance checks live elsewhere.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{ProgressionKind, ResetPolicy, Strategy};

/// Progression state owned by exactly one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionState {
    /// Amount to bet next.
    pub current_stake: Decimal,
    /// Position in the Fibonacci sequence (fibonacci variant only).
    pub sequence_index: u32,
}

impl ProgressionState {
    /// Clean state: base stake, index 0.
    pub fn initial(strategy: &Strategy) -> Self {
        Self {
            current_stake: strategy.initial_bet,
            sequence_index: 0,
        }
    }
}

/// The `n`-th term of 1, 1, 2, 3, 5, 8, ... (0-based). Saturates at `u64::MAX`.
pub fn fibonacci(n: u32) -> u64 {
    let (mut a, mut b) = (1u64, 1u64);
    for _ in 0..n {
        let next = a.saturating_add(b);
        a = b;
        b = next;
    }
    a
}

/// Compute the state after a settled round.
pub fn next_stake(strategy: &Strategy, state: &ProgressionState, won: bool) -> ProgressionState {
    let base = strategy.initial_bet;
    let reset = ProgressionState::initial(strategy);

    let next = match strategy.kind {
        ProgressionKind::Martingala => double_or_reset(strategy, state, won),
        ProgressionKind::Fibonacci => {
            let sequence_index = if won {
                state.sequence_index.saturating_sub(2)
            } else {
                state.sequence_index.saturating_add(1)
            };
            ProgressionState {
                current_stake: base.saturating_mul(Decimal::from(fibonacci(sequence_index))),
                sequence_index,
            }
        }
        ProgressionKind::Dalembert => {
            let current_stake = if won {
                (state.current_stake - base).max(base)
            } else {
                state.current_stake.saturating_add(base)
            };
            ProgressionState {
                current_stake,
                sequence_index: 0,
            }
        }
        ProgressionKind::Custom => {
            let policy_reset = match strategy.reset_policy {
                ResetPolicy::AfterWin => won,
                ResetPolicy::AfterLoss => !won,
                ResetPolicy::Manual => false,
            };
            if policy_reset {
                reset
            } else {
                double_or_reset(strategy, state, won)
            }
        }
    };

    debug_assert!(
        next.current_stake > Decimal::ZERO,
        "progression produced a non-positive stake: {}",
        next.current_stake
    );
    next
}

/// Martingala rule: reset on a win, double on a loss.
fn double_or_reset(strategy: &Strategy, state: &ProgressionState, won: bool) -> ProgressionState {
    if won {
        ProgressionState::initial(strategy)
    } else {
        ProgressionState {
            current_stake: state.current_stake.saturating_mul(Decimal::TWO),
            sequence_index: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
