//! Automation bridge: the external actor that drives a casino client.
//!
//! In a real deployment an implementation would launch a UI-automation
//! process per account and click the table on request. The engine only
//! needs three capabilities: launch, place a bet, release.

pub mod simulated;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::strategy::{Account, BetTarget, Strategy};

/// Opaque reference to a launched automation process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BridgeHandle {
    pub id: String,
    pub account_id: String,
}

impl fmt::Display for BridgeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.account_id, self.id)
    }
}

/// Acknowledgement that a bet was put on the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetAck {
    pub bet_id: String,
    pub account_id: String,
    pub amount: Decimal,
    pub target: BetTarget,
    pub timestamp: DateTime<Utc>,
}

/// Abstraction over bet-placement automation.
///
/// Implementors own their retry policy; the engine never retries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AutomationBridge: Send + Sync {
    /// Start automation for an account and wait for it to confirm.
    async fn launch(&self, account: &Account, strategy: &Strategy) -> Result<BridgeHandle>;

    /// Place a bet through a launched handle.
    async fn place_bet(
        &self,
        handle: &BridgeHandle,
        amount: Decimal,
        target: BetTarget,
    ) -> Result<BetAck>;

    /// Tear down the automation behind a handle.
    async fn release(&self, handle: &BridgeHandle) -> Result<()>;

    /// Bridge name for logging.
    fn name(&self) -> &'static str;
}
