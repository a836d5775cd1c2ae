//! In-process stand-in for the automation bridge.
//!
//! Acknowledges launches after a configurable delay, records every bet and
//! can be told to reject specific accounts. Used by the demo binary and by
//! tests.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use super::{AutomationBridge, BetAck, BridgeHandle};
use crate::strategy::{Account, BetTarget, Strategy};

#[derive(Debug, Clone, Default)]
pub struct SimulatedBridgeConfig {
    /// Delay before a launch is acknowledged.
    pub launch_delay: Duration,
    /// Accounts whose launch always fails.
    pub fail_accounts: HashSet<String>,
    /// Reject accounts that carry no credential.
    pub require_credentials: bool,
}

#[derive(Debug, Default)]
struct Ledger {
    live: HashSet<String>,
    launched: u64,
    released: u64,
    bets: Vec<BetAck>,
}

pub struct SimulatedBridge {
    config: SimulatedBridgeConfig,
    ledger: Mutex<Ledger>,
}

impl SimulatedBridge {
    pub fn new(config: SimulatedBridgeConfig) -> Self {
        Self {
            config,
            ledger: Mutex::new(Ledger::default()),
        }
    }

    /// Every bet placed so far.
    pub fn bets(&self) -> Vec<BetAck> {
        self.ledger().bets.clone()
    }

    pub fn launched(&self) -> u64 {
        self.ledger().launched
    }

    pub fn released(&self) -> u64 {
        self.ledger().released
    }

    /// Handles launched and not yet released.
    pub fn live_handles(&self) -> usize {
        self.ledger().live.len()
    }

    fn ledger(&self) -> std::sync::MutexGuard<'_, Ledger> {
        // A poisoned ledger only means a test panicked mid-update.
        self.ledger.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for SimulatedBridge {
    fn default() -> Self {
        Self::new(SimulatedBridgeConfig::default())
    }
}

#[async_trait]
impl AutomationBridge for SimulatedBridge {
    async fn launch(&self, account: &Account, strategy: &Strategy) -> Result<BridgeHandle> {
        if !self.config.launch_delay.is_zero() {
            tokio::time::sleep(self.config.launch_delay).await;
        }

        if self.config.fail_accounts.contains(&account.id) {
            bail!("automation refused to start for account {}", account.id);
        }
        if self.config.require_credentials {
            let has_credential = account
                .credential
                .as_ref()
                .is_some_and(|c| !c.expose_secret().is_empty());
            if !has_credential {
                bail!("account {} has no credential", account.id);
            }
        }

        let handle = BridgeHandle {
            id: format!("sim-{}", Uuid::new_v4()),
            account_id: account.id.clone(),
        };

        let mut ledger = self.ledger();
        ledger.live.insert(handle.id.clone());
        ledger.launched += 1;

        info!(
            handle = %handle,
            strategy = %strategy.name,
            "Simulated automation launched"
        );
        Ok(handle)
    }

    async fn place_bet(
        &self,
        handle: &BridgeHandle,
        amount: Decimal,
        target: BetTarget,
    ) -> Result<BetAck> {
        let mut ledger = self.ledger();
        if !ledger.live.contains(&handle.id) {
            bail!("handle {handle} is not live");
        }

        let ack = BetAck {
            bet_id: format!("bet-{}", Uuid::new_v4()),
            account_id: handle.account_id.clone(),
            amount,
            target,
            timestamp: Utc::now(),
        };
        ledger.bets.push(ack.clone());

        debug!(handle = %handle, amount = %amount, target = %target, "Simulated bet placed");
        Ok(ack)
    }

    async fn release(&self, handle: &BridgeHandle) -> Result<()> {
        let mut ledger = self.ledger();
        if !ledger.live.remove(&handle.id) {
            bail!("handle {handle} already released");
        }
        ledger.released += 1;
        debug!(handle = %handle, "Simulated automation released");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}
