//! Configuration loading from TOML.
//!
//! Reads `config.toml` (or the file named by `ROULETTE_BOT_CONFIG`) and
//! deserializes into strongly-typed structs. Every section except `[app]`
//! has defaults, so a minimal file only names the bot.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::time::Duration;

use crate::bridge::simulated::SimulatedBridgeConfig;
use crate::engine::events::DEFAULT_EVENT_CAPACITY;
use crate::engine::orchestrator::OrchestratorConfig;
use crate::strategy::Strategy;

/// Environment variable that overrides the config file path.
pub const CONFIG_PATH_ENV: &str = "ROULETTE_BOT_CONFIG";

/// Config file used when `ROULETTE_BOT_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub app: AppSection,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Strategies started at boot.
    #[serde(default)]
    pub autostart: Vec<Strategy>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
    #[serde(default = "default_currency")]
    pub currency: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    /// How long to wait for the bridge to acknowledge a launch or release.
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct BridgeConfig {
    #[serde(default)]
    pub launch_delay_ms: u64,
    /// Accounts the simulated bridge refuses to launch.
    #[serde(default)]
    pub fail_accounts: Vec<String>,
    #[serde(default)]
    pub require_credentials: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SimulatorConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Fixed seed for a reproducible wheel. Random when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_spin_interval_ms")]
    pub spin_interval_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Log lines kept in memory for `GET /api/logs`.
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
    /// Stopped-session reports kept for `GET /api/history` and on disk.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_history_path")]
    pub history_path: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_ack_timeout_ms() -> u64 {
    10_000
}

fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

fn default_true() -> bool {
    true
}

fn default_spin_interval_ms() -> u64 {
    30_000
}

fn default_port() -> u16 {
    8080
}

fn default_log_capacity() -> usize {
    500
}

fn default_history_capacity() -> usize {
    1_000
}

fn default_history_path() -> String {
    "roulette_history.json".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ack_timeout_ms: default_ack_timeout_ms(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            seed: None,
            spin_interval_ms: default_spin_interval_ms(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_port(),
            log_capacity: default_log_capacity(),
            history_capacity: default_history_capacity(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            history_path: default_history_path(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse configuration from TOML text and validate autostart strategies.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        for strategy in &config.autostart {
            strategy
                .validate()
                .with_context(|| format!("Invalid autostart strategy '{}'", strategy.name))?;
        }
        Ok(config)
    }

    /// Path from `ROULETTE_BOT_CONFIG`, falling back to `config.toml`.
    pub fn resolve_path() -> String {
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            ack_timeout: Duration::from_millis(self.engine.ack_timeout_ms),
        }
    }

    pub fn simulated_bridge_config(&self) -> SimulatedBridgeConfig {
        SimulatedBridgeConfig {
            launch_delay: Duration::from_millis(self.bridge.launch_delay_ms),
            fail_accounts: self.bridge.fail_accounts.iter().cloned().collect::<HashSet<_>>(),
            require_credentials: self.bridge.require_credentials,
        }
    }

    pub fn spin_interval(&self) -> Duration {
        Duration::from_millis(self.simulator.spin_interval_ms)
    }
}
