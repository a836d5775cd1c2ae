//! Shared types for the roulette bot.
//!
//! Round outcomes, identifiers, lifecycle enums and the domain error type.
//! Strategy definitions live in `strategy`, per-session runtime state in
//! `engine::session`.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Wheel
// ---------------------------------------------------------------------------

/// Highest pocket on a single-zero wheel.
pub const MAX_POCKET: u8 = 36;

/// Red pockets on a European wheel. Every other non-zero pocket is black.
pub const RED_NUMBERS: [u8; 18] = [
    1, 3, 5, 7, 9, 12, 14, 16, 18, 19, 21, 23, 25, 27, 30, 32, 34, 36,
];

/// Pocket colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Black,
    Green,
}

impl Color {
    /// Colour of a pocket. Callers guarantee `number <= MAX_POCKET`.
    pub fn of(number: u8) -> Self {
        if number == 0 {
            Color::Green
        } else if RED_NUMBERS.contains(&number) {
            Color::Red
        } else {
            Color::Black
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Red => write!(f, "red"),
            Color::Black => write!(f, "black"),
            Color::Green => write!(f, "green"),
        }
    }
}

impl std::str::FromStr for Color {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "red" | "rojo" => Ok(Color::Red),
            "black" | "negro" => Ok(Color::Black),
            "green" | "verde" => Ok(Color::Green),
            _ => Err(anyhow::anyhow!("Unknown colour: {s}")),
        }
    }
}

/// The result of one spin.
///
/// Colour and parity are always derived from `number`; deserialisation only
/// reads `number` and recomputes the rest, so an inconsistent payload can
/// never enter the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "OutcomeWire")]
pub struct RoundOutcome {
    pub number: u8,
    pub color: Color,
    pub is_even: bool,
}

#[derive(Deserialize)]
struct OutcomeWire {
    number: u8,
}

impl TryFrom<OutcomeWire> for RoundOutcome {
    type Error = BotError;

    fn try_from(wire: OutcomeWire) -> Result<Self, Self::Error> {
        RoundOutcome::from_number(wire.number)
    }
}

impl RoundOutcome {
    /// Build an outcome from the winning pocket.
    pub fn from_number(number: u8) -> Result<Self, BotError> {
        if number > MAX_POCKET {
            return Err(BotError::InvalidOutcome(number));
        }
        Ok(Self::from_pocket(number))
    }

    /// Outcome for a pocket the caller has already range-checked.
    pub(crate) fn from_pocket(number: u8) -> Self {
        debug_assert!(number <= MAX_POCKET);
        Self {
            number,
            color: Color::of(number),
            is_even: number % 2 == 0,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.number == 0
    }
}

impl fmt::Display for RoundOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.number, self.color)
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Unique identifier of a bot session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(SessionId)
    }
}

// ---------------------------------------------------------------------------
// Lifecycle enums
// ---------------------------------------------------------------------------

/// Session lifecycle: `Starting → Active → Stopping → Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Starting,
    Active,
    Stopping,
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Starting => write!(f, "starting"),
            SessionState::Active => write!(f, "active"),
            SessionState::Stopping => write!(f, "stopping"),
            SessionState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    TargetReached,
    StopLossReached,
    MaxLossesReached,
    MaxBetsReached,
    TimeLimitReached,
    /// Stopped by an operator command (`stop_session` / `stop_all`).
    Manual,
}

impl StopReason {
    /// Whether the reason came from the session's own stop conditions.
    pub fn is_automatic(&self) -> bool {
        !matches!(self, StopReason::Manual)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::TargetReached => write!(f, "target_reached"),
            StopReason::StopLossReached => write!(f, "stop_loss_reached"),
            StopReason::MaxLossesReached => write!(f, "max_losses_reached"),
            StopReason::MaxBetsReached => write!(f, "max_bets_reached"),
            StopReason::TimeLimitReached => write!(f, "time_limit_reached"),
            StopReason::Manual => write!(f, "manual"),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors surfaced by the engine to its immediate caller.
///
/// None of these are fatal to the process.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BotError {
    #[error("Invalid strategy: {0}")]
    InvalidStrategy(String),

    #[error("Account already has an active session: {0}")]
    AccountAlreadyActive(String),

    #[error("Session not active: {0}")]
    SessionNotActive(SessionId),

    #[error("External actor failure ({account_id}): {message}")]
    ExternalActorFailure { account_id: String, message: String },

    #[error("Invalid round outcome: pocket {0} is not on the wheel")]
    InvalidOutcome(u8),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
