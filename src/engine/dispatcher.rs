//! Bet dispatcher.
//!
//! Listens on the event bus and forwards each session's next bet to the
//! automation bridge, so placing a bet never holds up outcome fan-out.
//! Placement failures are logged and counted; the dispatcher never retries.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bridge::{AutomationBridge, BridgeHandle};
use crate::engine::events::{BetInstruction, SessionEvent};
use crate::types::SessionId;

/// Counters returned when the dispatcher shuts down.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub placed: u64,
    pub failed: u64,
    /// Events dropped because the dispatcher fell behind the bus.
    pub lagged: u64,
}

/// Spawn the dispatcher task. It ends when the event bus closes.
pub fn spawn_bet_dispatcher(
    bridge: Arc<dyn AutomationBridge>,
    rx: broadcast::Receiver<SessionEvent>,
) -> JoinHandle<DispatchStats> {
    tokio::spawn(run_dispatcher(bridge, rx))
}

async fn run_dispatcher(
    bridge: Arc<dyn AutomationBridge>,
    mut rx: broadcast::Receiver<SessionEvent>,
) -> DispatchStats {
    let mut handles: HashMap<SessionId, BridgeHandle> = HashMap::new();
    let mut stats = DispatchStats::default();

    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Bet dispatcher lagging behind event bus");
                stats.lagged += skipped;
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        let (session_id, bet) = match event {
            SessionEvent::SessionStarted {
                session_id,
                handle,
                next_bet,
                ..
            } => {
                handles.insert(session_id, handle);
                (session_id, next_bet)
            }
            SessionEvent::RoundApplied {
                session_id,
                next_bet,
                ..
            } => (session_id, next_bet),
            SessionEvent::SessionStopped { report } => {
                handles.remove(&report.id);
                continue;
            }
            SessionEvent::Log { .. } => continue,
        };

        let Some(BetInstruction { amount, target }) = bet else {
            continue;
        };
        let Some(handle) = handles.get(&session_id) else {
            debug!(session_id = %session_id, "No bridge handle for session, bet skipped");
            continue;
        };

        match bridge.place_bet(handle, amount, target).await {
            Ok(ack) => {
                stats.placed += 1;
                debug!(
                    session_id = %session_id,
                    bet_id = %ack.bet_id,
                    amount = %amount,
                    target = %target,
                    "Bet placed"
                );
            }
            Err(e) => {
                stats.failed += 1;
                warn!(
                    session_id = %session_id,
                    amount = %amount,
                    error = %e,
                    "Bet placement failed"
                );
            }
        }
    }

    info!(
        placed = stats.placed,
        failed = stats.failed,
        lagged = stats.lagged,
        "Bet dispatcher stopped"
    );
    stats
}
