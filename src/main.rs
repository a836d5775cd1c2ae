//! Roulette bot: progression engine and multi-account session orchestrator.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! restores session history from disk, starts the configured strategies and
//! feeds settled rounds to every active session until shutdown.

use anyhow::Result;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{error, info, warn};

use roulette_bot::bridge::simulated::SimulatedBridge;
use roulette_bot::config::AppConfig;
use roulette_bot::dashboard::{self, routes::DashboardState};
use roulette_bot::engine::dispatcher::spawn_bet_dispatcher;
use roulette_bot::engine::events::EventBus;
use roulette_bot::engine::orchestrator::{FanOutReport, SessionOrchestrator};
use roulette_bot::simulator::WheelSimulator;
use roulette_bot::storage;
use roulette_bot::types::RoundOutcome;

const BANNER: &str = r#"
  ____             _      _   _         ____        _
 |  _ \ ___  _   _| | ___| |_| |_ ___  | __ )  ___ | |_
 | |_) / _ \| | | | |/ _ \ __| __/ _ \ |  _ \ / _ \| __|
 |  _ < (_) | |_| | |  __/ |_| ||  __/ | |_) | (_) | |_
 |_| \_\___/ \__,_|_|\___|\__|\__\___| |____/ \___/ \__|

  Progression engine & session orchestrator
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = AppConfig::resolve_path();
    let cfg = AppConfig::load(&config_path)?;

    init_logging();

    println!("{BANNER}");
    info!(
        name = %cfg.app.name,
        config = %config_path,
        currency = %cfg.app.currency,
        autostart = cfg.autostart.len(),
        "Roulette bot starting up"
    );

    // -- Restore history ---------------------------------------------------

    let history_path = cfg.storage.history_path.clone();
    let history = storage::load_history(Some(&history_path))?;

    // -- Initialise components ---------------------------------------------

    let bridge = Arc::new(SimulatedBridge::new(cfg.simulated_bridge_config()));
    let events = EventBus::new(cfg.engine.event_capacity);
    let dispatcher = spawn_bet_dispatcher(bridge.clone(), events.subscribe());
    let recorder_rx = events.subscribe();

    let orchestrator = Arc::new(SessionOrchestrator::new(
        bridge,
        events,
        cfg.orchestrator_config(),
    ));

    let dashboard_state = Arc::new(
        DashboardState::new(orchestrator.clone(), history, cfg.dashboard.log_capacity)
            .with_history_capacity(cfg.dashboard.history_capacity),
    );
    let recorder = dashboard::spawn_event_recorder(dashboard_state.clone(), recorder_rx);

    if cfg.dashboard.enabled {
        dashboard::spawn_dashboard(dashboard_state.clone(), cfg.dashboard.port).await?;
    }

    // -- Autostart -----------------------------------------------------------

    for strategy in &cfg.autostart {
        if strategy.accounts.is_empty() {
            warn!(strategy = %strategy.name, "Autostart strategy lists no accounts, skipped");
            continue;
        }
        for (account, result) in orchestrator.start_accounts(Arc::new(strategy.clone())).await {
            match result {
                Ok(summary) => info!(
                    session_id = %summary.id,
                    account = %account,
                    strategy = %strategy.name,
                    "Autostarted session"
                ),
                Err(e) => error!(account = %account, strategy = %strategy.name, error = %e, "Autostart failed"),
            }
        }
    }

    // -- Main loop -----------------------------------------------------------

    let mut outcomes = if cfg.simulator.enabled {
        info!(
            seed = ?cfg.simulator.seed,
            interval_ms = cfg.simulator.spin_interval_ms,
            "Simulated wheel enabled"
        );
        WheelSimulator::new(cfg.simulator.seed).into_stream(cfg.spin_interval())
    } else {
        info!("Simulated wheel disabled, waiting for shutdown");
        futures::stream::pending::<RoundOutcome>().boxed()
    };

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Entering main loop. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            Some(outcome) = outcomes.next() => {
                let report = orchestrator.on_round_outcome(outcome).await;
                log_fan_out(&outcome, &report);
                // Stopped sessions already reached the history through the bus.
                if !report.stopped.is_empty() {
                    orchestrator.purge_stopped().await;
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    // -- Shutdown ------------------------------------------------------------

    let final_reports = match orchestrator.stop_all().await {
        Ok(reports) => reports,
        Err(e) => {
            error!(error = %e, "Stop-all reported a failure");
            Vec::new()
        }
    };

    // The recorder may not have seen the final stops yet.
    for report in final_reports {
        dashboard_state.archive(report).await;
    }
    let history = dashboard_state.history.read().await.clone();
    storage::save_history(&history, Some(&history_path))?;

    recorder.abort();
    dispatcher.abort();

    let total_profit: rust_decimal::Decimal = history.iter().map(|r| r.stats.profit).sum();
    info!(
        sessions = history.len(),
        profit = %total_profit,
        path = %history_path,
        "Roulette bot shut down cleanly."
    );

    Ok(())
}

/// Log a one-line fan-out summary.
fn log_fan_out(outcome: &RoundOutcome, report: &FanOutReport) {
    info!(
        outcome = %outcome,
        applied = report.applied.len(),
        stopped = report.stopped.len(),
        errors = report.errors.len(),
        "Round settled"
    );
    for (id, reason) in &report.stopped {
        info!(session_id = %id, reason = %reason, "Session hit a stop condition");
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("roulette_bot=info"));

    let json_logging = std::env::var("ROULETTE_BOT_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
