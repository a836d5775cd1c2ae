//! Lifecycle and diagnostic events published by the orchestrator.
//!
//! Consumers (dashboard, history recorder, bet dispatcher) subscribe to a
//! `tokio::sync::broadcast` channel. Publishing never blocks and never
//! fails when nobody is listening.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::bridge::BridgeHandle;
use crate::engine::session::{RoundApplied, SessionReport, SessionStats};
use crate::strategy::BetTarget;
use crate::types::{RoundOutcome, SessionId};

/// Default broadcast buffer size.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// A bet a session wants placed on the next round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetInstruction {
    pub amount: Decimal,
    pub target: BetTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SessionEvent {
    SessionStarted {
        session_id: SessionId,
        account_id: String,
        strategy_name: String,
        handle: BridgeHandle,
        next_bet: Option<BetInstruction>,
        timestamp: DateTime<Utc>,
    },
    SessionStopped {
        report: SessionReport,
    },
    RoundApplied {
        session_id: SessionId,
        account_id: String,
        outcome: RoundOutcome,
        result: RoundApplied,
        stats: SessionStats,
        /// Present only when the session keeps running and has a bet to place.
        next_bet: Option<BetInstruction>,
    },
    Log {
        level: LogLevel,
        session_id: Option<SessionId>,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl SessionEvent {
    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            SessionEvent::SessionStarted { session_id, .. }
            | SessionEvent::RoundApplied { session_id, .. } => Some(*session_id),
            SessionEvent::SessionStopped { report } => Some(report.id),
            SessionEvent::Log { session_id, .. } => *session_id,
        }
    }
}

/// Cloneable publisher handle.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: SessionEvent) {
        // No receivers is fine.
        let _ = self.tx.send(event);
    }

    /// Publish a free-text `log` event and mirror it into `tracing`.
    pub fn log(&self, level: LogLevel, session_id: Option<SessionId>, message: impl Into<String>) {
        let message = message.into();
        let sid = session_id.map(|id| id.to_string()).unwrap_or_default();
        match level {
            LogLevel::Debug => debug!(session_id = %sid, "{message}"),
            LogLevel::Info => info!(session_id = %sid, "{message}"),
            LogLevel::Warn => warn!(session_id = %sid, "{message}"),
            LogLevel::Error => error!(session_id = %sid, "{message}"),
        }
        self.publish(SessionEvent::Log {
            level,
            session_id,
            message,
            timestamp: Utc::now(),
        });
    }
}
