//! Strategy definitions: the immutable description of a betting plan.
//!
//! A `Strategy` names the progression rule, what to bet on, the base stake
//! and every stop threshold. Sessions share a strategy by `Arc` and never
//! mutate it.

pub mod evaluator;
pub mod progression;

use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::types::{BotError, Color};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// How the stake evolves between rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressionKind {
    Martingala,
    Fibonacci,
    Dalembert,
    Custom,
}

impl fmt::Display for ProgressionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressionKind::Martingala => write!(f, "martingala"),
            ProgressionKind::Fibonacci => write!(f, "fibonacci"),
            ProgressionKind::Dalembert => write!(f, "dalembert"),
            ProgressionKind::Custom => write!(f, "custom"),
        }
    }
}

/// When a `Custom` progression falls back to the base stake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetPolicy {
    #[default]
    AfterWin,
    AfterLoss,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    Even,
    Odd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dozen {
    First,
    Second,
    Third,
}

impl Dozen {
    /// Inclusive pocket range covered by this dozen.
    pub fn range(&self) -> std::ops::RangeInclusive<u8> {
        match self {
            Dozen::First => 1..=12,
            Dozen::Second => 13..=24,
            Dozen::Third => 25..=36,
        }
    }
}

/// The outcome category a strategy bets on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum BetTarget {
    Color(Color),
    Parity(Parity),
    Dozen(Dozen),
}

impl fmt::Display for BetTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetTarget::Color(c) => write!(f, "color:{c}"),
            BetTarget::Parity(Parity::Even) => write!(f, "parity:even"),
            BetTarget::Parity(Parity::Odd) => write!(f, "parity:odd"),
            BetTarget::Dozen(Dozen::First) => write!(f, "dozen:first"),
            BetTarget::Dozen(Dozen::Second) => write!(f, "dozen:second"),
            BetTarget::Dozen(Dozen::Third) => write!(f, "dozen:third"),
        }
    }
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// A casino account a session can run against.
///
/// The credential is only ever handed to the automation bridge and is never
/// serialised back out.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Account {
    pub id: String,
    #[serde(default, skip_serializing)]
    pub credential: Option<SecretString>,
}

impl Account {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            credential: None,
        }
    }

    pub fn with_credential(id: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            credential: Some(SecretString::new(credential.into())),
        }
    }
}

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// Immutable betting plan.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Strategy {
    #[serde(default = "default_strategy_name")]
    pub name: String,
    pub kind: ProgressionKind,
    pub bet_target: BetTarget,
    /// Base stake unit.
    pub initial_bet: Decimal,
    /// Loss streak that forces a stop.
    pub max_consecutive_losses: u32,
    /// Stop once cumulative profit reaches this.
    pub target_profit: Decimal,
    /// Stop once cumulative loss reaches this (profit <= -stop_loss).
    pub stop_loss: Decimal,
    #[serde(default)]
    pub max_consecutive_bets: Option<u32>,
    #[serde(default)]
    pub reset_policy: ResetPolicy,
    /// Consecutive misses of the target to wait for before the first bet.
    #[serde(default)]
    pub entry_condition: Option<u32>,
    /// Wall-clock limit for one session.
    #[serde(default)]
    pub max_session_secs: Option<u64>,
    #[serde(default)]
    pub accounts: Vec<Account>,
}

fn default_strategy_name() -> String {
    "unnamed".to_string()
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{} on {}] base=${:.2} target=+${:.2} stop=-${:.2} max_losses={}",
            self.name,
            self.kind,
            self.bet_target,
            self.initial_bet,
            self.target_profit,
            self.stop_loss,
            self.max_consecutive_losses,
        )
    }
}

impl Strategy {
    /// A strategy with conservative default limits: stop after 5 straight
    /// losses, at +10 base units of profit or -20 base units of loss.
    pub fn new(kind: ProgressionKind, bet_target: BetTarget, initial_bet: Decimal) -> Self {
        Self {
            name: kind.to_string(),
            kind,
            bet_target,
            initial_bet,
            max_consecutive_losses: 5,
            target_profit: initial_bet.saturating_mul(Decimal::from(10)),
            stop_loss: initial_bet.saturating_mul(Decimal::from(20)),
            max_consecutive_bets: None,
            reset_policy: ResetPolicy::AfterWin,
            entry_condition: None,
            max_session_secs: None,
            accounts: Vec::new(),
        }
    }

    /// Replace the three mandatory stop thresholds.
    pub fn with_limits(
        mut self,
        max_consecutive_losses: u32,
        target_profit: Decimal,
        stop_loss: Decimal,
    ) -> Self {
        self.max_consecutive_losses = max_consecutive_losses;
        self.target_profit = target_profit;
        self.stop_loss = stop_loss;
        self
    }

    pub fn with_accounts(mut self, accounts: Vec<Account>) -> Self {
        self.accounts = accounts;
        self
    }

    /// Check the strategy invariants.
    pub fn validate(&self) -> Result<(), BotError> {
        let invalid = |msg: String| Err(BotError::InvalidStrategy(msg));

        if self.initial_bet <= Decimal::ZERO {
            return invalid(format!("initial_bet must be positive, got {}", self.initial_bet));
        }
        if self.max_consecutive_losses < 1 {
            return invalid("max_consecutive_losses must be at least 1".into());
        }
        if self.target_profit <= Decimal::ZERO {
            return invalid(format!(
                "target_profit must be positive, got {}",
                self.target_profit
            ));
        }
        if self.stop_loss <= Decimal::ZERO {
            return invalid(format!("stop_loss must be positive, got {}", self.stop_loss));
        }
        if self.max_consecutive_bets == Some(0) {
            return invalid("max_consecutive_bets must be at least 1 when set".into());
        }
        if self.max_session_secs == Some(0) {
            return invalid("max_session_secs must be at least 1 when set".into());
        }
        if self.bet_target == BetTarget::Color(Color::Green) {
            return invalid("colour bets must be red or black".into());
        }

        let mut seen = HashSet::new();
        for account in &self.accounts {
            if account.id.trim().is_empty() {
                return invalid("account ids must not be empty".into());
            }
            if !seen.insert(account.id.as_str()) {
                return invalid(format!("account {} listed twice", account.id));
            }
        }

        Ok(())
    }

    /// Look up a listed account, or a bare account with no credential when
    /// the strategy does not list it.
    pub fn account(&self, account_id: &str) -> Account {
        self.accounts
            .iter()
            .find(|a| a.id == account_id)
            .cloned()
            .unwrap_or_else(|| Account::new(account_id))
    }

    pub fn is_multi_account(&self) -> bool {
        self.accounts.len() > 1
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
