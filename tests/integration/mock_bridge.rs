//! Mock automation bridge for integration testing.
//!
//! Provides a deterministic `AutomationBridge` implementation that launches,
//! accepts bets and releases handles entirely in memory. Failures and
//! launch latency are controllable from test code.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use roulette_bot::bridge::{AutomationBridge, BetAck, BridgeHandle};
use roulette_bot::strategy::{Account, BetTarget, Strategy};

/// A mock bridge for deterministic testing.
///
/// Clones share state, so a test can keep a handle after giving the
/// orchestrator its own `Arc`.
#[derive(Clone, Default)]
pub struct MockBridge {
    launch_delay: Arc<Mutex<Duration>>,
    release_delay: Arc<Mutex<Duration>>,
    failing_accounts: Arc<Mutex<HashSet<String>>>,
    /// If set, every launch and bet returns this error.
    force_error: Arc<Mutex<Option<String>>>,
    live: Arc<Mutex<HashSet<String>>>,
    launches: Arc<Mutex<Vec<String>>>,
    releases: Arc<Mutex<Vec<String>>>,
    bets: Arc<Mutex<Vec<BetAck>>>,
}

impl MockBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every launch acknowledgement by `delay`.
    pub fn set_launch_delay(&self, delay: Duration) {
        *self.launch_delay.lock().unwrap() = delay;
    }

    /// Delay every release acknowledgement by `delay`.
    pub fn set_release_delay(&self, delay: Duration) {
        *self.release_delay.lock().unwrap() = delay;
    }

    /// Make launches for `account_id` fail.
    pub fn fail_account(&self, account_id: &str) {
        self.failing_accounts
            .lock()
            .unwrap()
            .insert(account_id.to_string());
    }

    /// Force all subsequent launches and bets to return an error.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    /// Clear any forced error.
    pub fn clear_error(&self) {
        *self.force_error.lock().unwrap() = None;
    }

    /// Account ids launched, in order.
    pub fn launches(&self) -> Vec<String> {
        self.launches.lock().unwrap().clone()
    }

    /// Account ids released, in order.
    pub fn releases(&self) -> Vec<String> {
        self.releases.lock().unwrap().clone()
    }

    pub fn bets(&self) -> Vec<BetAck> {
        self.bets.lock().unwrap().clone()
    }

    pub fn bets_for(&self, account_id: &str) -> Vec<Decimal> {
        self.bets()
            .into_iter()
            .filter(|b| b.account_id == account_id)
            .map(|b| b.amount)
            .collect()
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap().len()
    }

    fn forced_error(&self) -> Option<String> {
        self.force_error.lock().unwrap().clone()
    }
}

#[async_trait]
impl AutomationBridge for MockBridge {
    async fn launch(&self, account: &Account, _strategy: &Strategy) -> Result<BridgeHandle> {
        let delay = *self.launch_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(msg) = self.forced_error() {
            return Err(anyhow!(msg));
        }
        if self.failing_accounts.lock().unwrap().contains(&account.id) {
            return Err(anyhow!("mock launch refused for {}", account.id));
        }

        let handle = BridgeHandle {
            id: format!("mock-{}", uuid::Uuid::new_v4()),
            account_id: account.id.clone(),
        };
        self.live.lock().unwrap().insert(handle.id.clone());
        self.launches.lock().unwrap().push(account.id.clone());
        Ok(handle)
    }

    async fn place_bet(
        &self,
        handle: &BridgeHandle,
        amount: Decimal,
        target: BetTarget,
    ) -> Result<BetAck> {
        if let Some(msg) = self.forced_error() {
            return Err(anyhow!(msg));
        }
        if !self.live.lock().unwrap().contains(&handle.id) {
            return Err(anyhow!("handle {handle} not live"));
        }
        let ack = BetAck {
            bet_id: format!("mock-bet-{}", uuid::Uuid::new_v4()),
            account_id: handle.account_id.clone(),
            amount,
            target,
            timestamp: Utc::now(),
        };
        self.bets.lock().unwrap().push(ack.clone());
        Ok(ack)
    }

    async fn release(&self, handle: &BridgeHandle) -> Result<()> {
        let delay = *self.release_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if !self.live.lock().unwrap().remove(&handle.id) {
            return Err(anyhow!("handle {handle} already released"));
        }
        self.releases.lock().unwrap().push(handle.account_id.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use roulette_bot::strategy::ProgressionKind;
    use roulette_bot::types::Color;
    use rust_decimal_macros::dec;

    fn strategy() -> Strategy {
        Strategy::new(ProgressionKind::Martingala, BetTarget::Color(Color::Red), dec!(5))
    }

    #[tokio::test]
    async fn test_mock_launch_bet_release() {
        let bridge = MockBridge::new();
        let handle = bridge.launch(&Account::new("a"), &strategy()).await.unwrap();
        bridge
            .place_bet(&handle, dec!(5), BetTarget::Color(Color::Red))
            .await
            .unwrap();
        bridge.release(&handle).await.unwrap();

        assert_eq!(bridge.launches(), vec!["a"]);
        assert_eq!(bridge.bets_for("a"), vec![dec!(5)]);
        assert_eq!(bridge.releases(), vec!["a"]);
        assert_eq!(bridge.live_count(), 0);
    }

    #[tokio::test]
    async fn test_mock_forced_error() {
        let bridge = MockBridge::new();
        bridge.set_error("automation offline");
        let err = bridge.launch(&Account::new("a"), &strategy()).await.unwrap_err();
        assert!(err.to_string().contains("automation offline"));

        bridge.clear_error();
        assert!(bridge.launch(&Account::new("a"), &strategy()).await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_failing_account() {
        let bridge = MockBridge::new();
        bridge.fail_account("bad");
        assert!(bridge.launch(&Account::new("bad"), &strategy()).await.is_err());
        assert!(bridge.launch(&Account::new("good"), &strategy()).await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_clones_share_state() {
        let bridge = MockBridge::new();
        let clone = bridge.clone();
        clone.launch(&Account::new("a"), &strategy()).await.unwrap();
        assert_eq!(bridge.live_count(), 1);
    }
}
