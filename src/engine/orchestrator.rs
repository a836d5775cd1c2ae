//! Session orchestrator: lifecycle and fan-out for every bot session.
//!
//! The orchestrator is the only component that starts or stops sessions and
//! the only one that talks to the automation bridge. It holds an explicit
//! registry (no process-wide singleton); share it behind an `Arc`.
//!
//! Locking:
//! - the registry `RwLock` guards membership, insertion order and the
//!   account index (one live session per account);
//! - each session sits behind its own `Mutex`, so a stop waits for an
//!   in-flight round and a round never interleaves with a stop;
//! - `round_gate` serialises fan-outs so one outcome is processed at a time.

use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::bridge::{AutomationBridge, BridgeHandle};
use crate::engine::events::{EventBus, LogLevel, SessionEvent};
use crate::engine::session::{Session, SessionReport, SessionSummary};
use crate::strategy::Strategy;
use crate::types::{BotError, RoundOutcome, SessionId, SessionState, StopReason};

/// Default time to wait for the bridge to acknowledge a launch or release.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub ack_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            ack_timeout: DEFAULT_ACK_TIMEOUT,
        }
    }
}

// ---------------------------------------------------------------------------
// Reporting types
// ---------------------------------------------------------------------------

/// Result of the status query.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    /// True when at least one session is active.
    pub active: bool,
    pub sessions: Vec<SessionSummary>,
}

impl StatusSnapshot {
    pub fn active_count(&self) -> usize {
        self.sessions
            .iter()
            .filter(|s| s.state == SessionState::Active)
            .count()
    }
}

/// What one fan-out did.
#[derive(Debug, Clone, Default)]
pub struct FanOutReport {
    /// Sessions the round was applied to, in fan-out order.
    pub applied: Vec<SessionId>,
    /// Sessions stopped because of this round.
    pub stopped: Vec<(SessionId, StopReason)>,
    /// Per-session failures. Never abort the fan-out.
    pub errors: Vec<(SessionId, BotError)>,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Tracked {
    session: Session,
    handle: Option<BridgeHandle>,
}

type Slot = Arc<Mutex<Tracked>>;

#[derive(Default)]
struct Registry {
    order: Vec<SessionId>,
    slots: HashMap<SessionId, Slot>,
    /// Accounts with a starting, active or stopping session.
    accounts: HashMap<String, SessionId>,
}

impl Registry {
    fn ordered_slots(&self) -> Vec<(SessionId, Slot)> {
        self.order
            .iter()
            .filter_map(|id| self.slots.get(id).map(|slot| (*id, Arc::clone(slot))))
            .collect()
    }

    fn remove(&mut self, id: SessionId) {
        self.slots.remove(&id);
        self.order.retain(|other| *other != id);
        self.accounts.retain(|_, owner| *owner != id);
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct SessionOrchestrator {
    registry: RwLock<Registry>,
    bridge: Arc<dyn AutomationBridge>,
    events: EventBus,
    config: OrchestratorConfig,
    round_gate: Mutex<()>,
}

impl SessionOrchestrator {
    pub fn new(bridge: Arc<dyn AutomationBridge>, events: EventBus, config: OrchestratorConfig) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            bridge,
            events,
            config,
            round_gate: Mutex::new(()),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Validate, register, launch the automation and activate a session.
    ///
    /// The account is reserved before the launch is awaited so a concurrent
    /// start for the same account is rejected. A failed or timed-out launch
    /// removes the registration again.
    pub async fn start_session(
        &self,
        strategy: Arc<Strategy>,
        account_id: &str,
    ) -> Result<SessionSummary, BotError> {
        strategy.validate()?;

        let session = Session::new(account_id, Arc::clone(&strategy));
        let id = session.id();
        let slot: Slot = Arc::new(Mutex::new(Tracked {
            session,
            handle: None,
        }));

        {
            let mut registry = self.registry.write().await;
            if registry.accounts.contains_key(account_id) {
                return Err(BotError::AccountAlreadyActive(account_id.to_string()));
            }
            registry.accounts.insert(account_id.to_string(), id);
            registry.order.push(id);
            registry.slots.insert(id, Arc::clone(&slot));
        }

        let account = strategy.account(account_id);
        let launch = tokio::time::timeout(
            self.config.ack_timeout,
            self.bridge.launch(&account, &strategy),
        )
        .await;

        let handle = match launch {
            Ok(Ok(handle)) => handle,
            Ok(Err(e)) => return Err(self.roll_back(id, account_id, e.to_string()).await),
            Err(_) => {
                let message = format!(
                    "launch not acknowledged within {}ms",
                    self.config.ack_timeout.as_millis()
                );
                return Err(self.roll_back(id, account_id, message).await);
            }
        };

        let (summary, next_bet) = {
            let mut tracked = slot.lock().await;
            tracked.handle = Some(handle.clone());
            tracked.session.activate();
            (tracked.session.summary(), tracked.session.pending_bet())
        };

        info!(
            session_id = %id,
            account = account_id,
            strategy = %strategy,
            handle = %handle,
            "Session started"
        );
        self.events.publish(SessionEvent::SessionStarted {
            session_id: id,
            account_id: account_id.to_string(),
            strategy_name: strategy.name.clone(),
            handle,
            next_bet,
            timestamp: Utc::now(),
        });

        Ok(summary)
    }

    /// Start one independent session per account listed on the strategy.
    ///
    /// Each account succeeds or fails on its own.
    pub async fn start_accounts(
        &self,
        strategy: Arc<Strategy>,
    ) -> Vec<(String, Result<SessionSummary, BotError>)> {
        if strategy.accounts.is_empty() {
            return vec![(
                String::new(),
                Err(BotError::InvalidStrategy("strategy lists no accounts".into())),
            )];
        }

        let mut results = Vec::with_capacity(strategy.accounts.len());
        for account in &strategy.accounts {
            let result = self.start_session(Arc::clone(&strategy), &account.id).await;
            results.push((account.id.clone(), result));
        }
        results
    }

    /// Stop an active session on operator request.
    pub async fn stop_session(&self, id: SessionId) -> Result<SessionReport, BotError> {
        self.stop_with_reason(id, StopReason::Manual).await
    }

    /// Stop every active session, best effort.
    ///
    /// Keeps going after a failure and returns the first one. Sessions that
    /// were stopped concurrently by a fan-out are not counted as failures.
    pub async fn stop_all(&self) -> Result<Vec<SessionReport>, BotError> {
        let slots = self.registry.read().await.ordered_slots();

        let mut reports = Vec::new();
        let mut first_error = None;
        for (id, slot) in slots {
            if !slot.lock().await.session.is_active() {
                continue;
            }
            match self.stop_with_reason(id, StopReason::Manual).await {
                Ok(report) => reports.push(report),
                Err(BotError::SessionNotActive(_)) => {}
                Err(e) => {
                    warn!(session_id = %id, error = %e, "Failed to stop session");
                    first_error.get_or_insert(e);
                }
            }
        }

        info!(stopped = reports.len(), "Stop-all complete");
        match first_error {
            Some(e) => Err(e),
            None => Ok(reports),
        }
    }

    /// Deliver one outcome to every active session, in start order.
    ///
    /// A session whose stop condition fires moves to `Stopping` under its own
    /// lock, so no manual stop can claim it. Releasing its automation happens
    /// after every session has seen the round.
    pub async fn on_round_outcome(&self, outcome: RoundOutcome) -> FanOutReport {
        let _gate = self.round_gate.lock().await;
        let slots = self.registry.read().await.ordered_slots();

        let mut report = FanOutReport::default();
        let mut triggered = Vec::new();
        for (id, slot) in slots {
            let mut tracked = slot.lock().await;
            let session = &mut tracked.session;
            // Starting sessions have no automation yet; stopped ones are done.
            if !session.is_active() {
                continue;
            }

            match session.apply_round(&outcome) {
                Ok(result) => {
                    report.applied.push(id);
                    let next_bet = if result.should_stop {
                        None
                    } else {
                        session.pending_bet()
                    };
                    self.events.publish(SessionEvent::RoundApplied {
                        session_id: id,
                        account_id: session.account_id().to_string(),
                        outcome,
                        result,
                        stats: session.stats().clone(),
                        next_bet,
                    });
                    if let Some(reason) = result.stop_reason {
                        match session.begin_stop(reason) {
                            Ok(()) => triggered.push((id, reason, Arc::clone(&slot))),
                            Err(e) => report.errors.push((id, e)),
                        }
                    }
                }
                Err(e) => {
                    self.events.log(
                        LogLevel::Error,
                        Some(id),
                        format!("round {outcome} rejected: {e}"),
                    );
                    report.errors.push((id, e));
                }
            }
        }

        for (id, reason, slot) in triggered {
            self.complete_stop(id, &slot).await;
            report.stopped.push((id, reason));
        }

        report
    }

    /// Status of every tracked session (active and recently stopped).
    pub async fn get_status(&self) -> StatusSnapshot {
        let slots = self.registry.read().await.ordered_slots();
        let mut sessions = Vec::with_capacity(slots.len());
        for (_, slot) in slots {
            sessions.push(slot.lock().await.session.summary());
        }
        StatusSnapshot {
            active: sessions.iter().any(|s| s.state == SessionState::Active),
            sessions,
        }
    }

    /// Summary of a single tracked session.
    pub async fn session(&self, id: SessionId) -> Option<SessionSummary> {
        let slot = self.registry.read().await.slots.get(&id).cloned()?;
        let summary = slot.lock().await.session.summary();
        Some(summary)
    }

    /// Drop stopped sessions from the registry and return their reports.
    pub async fn purge_stopped(&self) -> Vec<SessionReport> {
        let mut registry = self.registry.write().await;
        let mut purged = Vec::new();
        for (id, slot) in registry.ordered_slots() {
            // try_lock: a busy session is by definition not stopped.
            let Ok(tracked) = slot.try_lock() else { continue };
            if tracked.session.state() == SessionState::Stopped {
                purged.push((id, tracked.session.report()));
            }
        }
        for (id, _) in &purged {
            registry.remove(*id);
        }
        purged.into_iter().map(|(_, report)| report).collect()
    }

    // -- internals --------------------------------------------------------

    async fn stop_with_reason(
        &self,
        id: SessionId,
        reason: StopReason,
    ) -> Result<SessionReport, BotError> {
        let slot = self
            .registry
            .read()
            .await
            .slots
            .get(&id)
            .cloned()
            .ok_or(BotError::SessionNotActive(id))?;

        if let Err(e) = slot.lock().await.session.begin_stop(reason) {
            warn!(session_id = %id, "Stop requested for a session that is not active");
            return Err(e);
        }

        Ok(self.complete_stop(id, &slot).await)
    }

    /// Release the automation of a `Stopping` session and mark it `Stopped`.
    ///
    /// Only the caller that moved the session to `Stopping` may call this.
    async fn complete_stop(&self, id: SessionId, slot: &Slot) -> SessionReport {
        let report = {
            let mut tracked = slot.lock().await;
            if let Some(handle) = tracked.handle.take() {
                let release =
                    tokio::time::timeout(self.config.ack_timeout, self.bridge.release(&handle))
                        .await;
                let failure = match release {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => Some(e.to_string()),
                    Err(_) => Some("release not acknowledged in time".to_string()),
                };
                if let Some(message) = failure {
                    self.events.log(
                        LogLevel::Warn,
                        Some(id),
                        format!("automation release failed for {handle}: {message}"),
                    );
                }
            }

            tracked.session.finish_stop(Utc::now());
            tracked.session.report()
        };

        {
            let mut registry = self.registry.write().await;
            registry.accounts.retain(|_, owner| *owner != id);
        }

        info!(
            session_id = %id,
            account = %report.account_id,
            reason = ?report.stop_reason,
            profit = %report.stats.profit,
            bets = report.stats.bets_placed,
            "Session stopped"
        );
        self.events.publish(SessionEvent::SessionStopped {
            report: report.clone(),
        });

        report
    }

    async fn roll_back(&self, id: SessionId, account_id: &str, message: String) -> BotError {
        self.registry.write().await.remove(id);
        self.events.log(
            LogLevel::Warn,
            Some(id),
            format!("session start rolled back for {account_id}: {message}"),
        );
        BotError::ExternalActorFailure {
            account_id: account_id.to_string(),
            message,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
