//! Dashboard API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<DashboardState>`.
//! Handlers are thin: every lifecycle decision stays in the orchestrator.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

use crate::backtest::{BacktestReport, Backtester};
use crate::engine::events::{LogLevel, SessionEvent};
use crate::engine::orchestrator::SessionOrchestrator;
use crate::engine::session::{SessionReport, SessionSummary};
use crate::simulator::WheelSimulator;
use crate::strategy::Strategy;
use crate::types::{BotError, RoundOutcome, SessionId};

/// Simulated rounds used by `POST /api/backtest` when none are supplied.
const DEFAULT_BACKTEST_ROUNDS: usize = 500;
const MAX_BACKTEST_ROUNDS: usize = 100_000;
/// Longest synthetic gap between backtest rounds.
const MAX_ROUND_INTERVAL_SECS: i64 = 86_400;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Stopped-session reports kept unless configured otherwise.
pub const DEFAULT_HISTORY_CAPACITY: usize = 1_000;

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub orchestrator: Arc<SessionOrchestrator>,
    /// Reports of the most recent stopped sessions, oldest first.
    pub history: RwLock<Vec<SessionReport>>,
    pub logs: RwLock<VecDeque<LogEntry>>,
    log_capacity: usize,
    history_capacity: usize,
    started_at: DateTime<Utc>,
}

impl DashboardState {
    pub fn new(
        orchestrator: Arc<SessionOrchestrator>,
        history: Vec<SessionReport>,
        log_capacity: usize,
    ) -> Self {
        let mut history = history;
        trim_oldest(&mut history, DEFAULT_HISTORY_CAPACITY);
        Self {
            orchestrator,
            history: RwLock::new(history),
            logs: RwLock::new(VecDeque::with_capacity(log_capacity)),
            log_capacity: log_capacity.max(1),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            started_at: Utc::now(),
        }
    }

    /// Keep at most `capacity` reports, dropping the oldest.
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity.max(1);
        trim_oldest(self.history.get_mut(), self.history_capacity);
        self
    }

    /// Add a stopped-session report unless it is already recorded.
    pub async fn archive(&self, report: SessionReport) {
        let mut history = self.history.write().await;
        if history.iter().any(|r| r.id == report.id) {
            return;
        }
        history.push(report);
        trim_oldest(&mut history, self.history_capacity);
    }

    /// Fold one bus event into the history and log buffers.
    pub async fn record(&self, event: &SessionEvent) {
        let entry = match event {
            SessionEvent::SessionStopped { report } => {
                self.archive(report.clone()).await;
                LogEntry {
                    timestamp: report.end_time,
                    level: LogLevel::Info,
                    session_id: Some(report.id),
                    message: format!("session stopped: {report}"),
                }
            }
            SessionEvent::SessionStarted {
                session_id,
                account_id,
                strategy_name,
                timestamp,
                ..
            } => LogEntry {
                timestamp: *timestamp,
                level: LogLevel::Info,
                session_id: Some(*session_id),
                message: format!("session started: {strategy_name} on {account_id}"),
            },
            SessionEvent::Log {
                level,
                session_id,
                message,
                timestamp,
            } => LogEntry {
                timestamp: *timestamp,
                level: *level,
                session_id: *session_id,
                message: message.clone(),
            },
            SessionEvent::RoundApplied { .. } => return,
        };

        let mut logs = self.logs.write().await;
        if logs.len() == self.log_capacity {
            logs.pop_front();
        }
        logs.push_back(entry);
    }
}

fn trim_oldest(history: &mut Vec<SessionReport>, capacity: usize) {
    if history.len() > capacity {
        let excess = history.len() - capacity;
        history.drain(..excess);
    }
}

pub type AppState = Arc<DashboardState>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub session_id: Option<SessionId>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub active: bool,
    pub active_sessions: usize,
    pub stopped_sessions: usize,
    pub uptime_secs: i64,
    pub sessions: Vec<SessionSummary>,
}

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub strategy: Strategy,
    /// Start a single session on this account. When absent, one session is
    /// started per account listed on the strategy.
    #[serde(default)]
    pub account_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartResult {
    pub account_id: String,
    pub session: Option<SessionSummary>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BacktestRequest {
    pub strategy: Strategy,
    /// Winning pockets to replay. A seeded simulated wheel is used when empty.
    #[serde(default)]
    pub outcomes: Vec<u8>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub rounds: Option<usize>,
    #[serde(default)]
    pub round_interval_secs: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A `BotError` rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub BotError);

impl From<BotError> for ApiError {
    fn from(e: BotError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            BotError::InvalidStrategy(_) | BotError::InvalidOutcome(_) => StatusCode::BAD_REQUEST,
            BotError::AccountAlreadyActive(_) => StatusCode::CONFLICT,
            BotError::SessionNotActive(_) => StatusCode::NOT_FOUND,
            BotError::ExternalActorFailure { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    fn kind(&self) -> &'static str {
        match self.0 {
            BotError::InvalidStrategy(_) => "invalid_strategy",
            BotError::InvalidOutcome(_) => "invalid_outcome",
            BotError::AccountAlreadyActive(_) => "account_already_active",
            BotError::SessionNotActive(_) => "session_not_active",
            BotError::ExternalActorFailure { .. } => "external_actor_failure",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self.0, "Request failed upstream");
        }
        let body = serde_json::json!({
            "error": self.kind(),
            "message": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

fn bad_request(message: String) -> Response {
    let body = serde_json::json!({ "error": "bad_request", "message": message });
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let snapshot = state.orchestrator.get_status().await;
    let active_sessions = snapshot.active_count();
    Json(StatusResponse {
        active: snapshot.active,
        active_sessions,
        stopped_sessions: state.history.read().await.len(),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
        sessions: snapshot.sessions,
    })
}

/// POST /api/sessions
pub async fn start_sessions(
    State(state): State<AppState>,
    Json(req): Json<StartRequest>,
) -> Result<Response, ApiError> {
    let strategy = Arc::new(req.strategy);

    if let Some(account_id) = req.account_id {
        let summary = state.orchestrator.start_session(strategy, &account_id).await?;
        return Ok((StatusCode::CREATED, Json(summary)).into_response());
    }

    strategy.validate()?;
    let results: Vec<StartResult> = state
        .orchestrator
        .start_accounts(strategy)
        .await
        .into_iter()
        .map(|(account_id, result)| match result {
            Ok(summary) => StartResult {
                account_id,
                session: Some(summary),
                error: None,
            },
            Err(e) => StartResult {
                account_id,
                session: None,
                error: Some(e.to_string()),
            },
        })
        .collect();

    let status = if results.iter().any(|r| r.session.is_some()) {
        StatusCode::CREATED
    } else {
        StatusCode::BAD_GATEWAY
    };
    Ok((status, Json(results)).into_response())
}

/// DELETE /api/sessions/:id
pub async fn stop_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: SessionId = match id.parse() {
        Ok(id) => id,
        Err(e) => return Ok(bad_request(format!("{e}"))),
    };
    let report = state.orchestrator.stop_session(id).await?;
    Ok(Json(report).into_response())
}

/// POST /api/sessions/stop-all
pub async fn stop_all(State(state): State<AppState>) -> Result<Json<Vec<SessionReport>>, ApiError> {
    Ok(Json(state.orchestrator.stop_all().await?))
}

/// GET /api/history
pub async fn get_history(State(state): State<AppState>) -> Json<Vec<SessionReport>> {
    Json(state.history.read().await.clone())
}

/// GET /api/logs?limit=N
pub async fn get_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Json<Vec<LogEntry>> {
    let logs = state.logs.read().await;
    let limit = query.limit.unwrap_or(100).min(logs.len());
    let start = logs.len() - limit;
    Json(logs.iter().skip(start).cloned().collect())
}

/// POST /api/backtest
pub async fn run_backtest(Json(req): Json<BacktestRequest>) -> Result<Response, ApiError> {
    let outcomes = if req.outcomes.is_empty() {
        let rounds = req.rounds.unwrap_or(DEFAULT_BACKTEST_ROUNDS);
        if rounds > MAX_BACKTEST_ROUNDS {
            return Ok(bad_request(format!(
                "rounds must be at most {MAX_BACKTEST_ROUNDS}, got {rounds}"
            )));
        }
        WheelSimulator::new(req.seed).spins(rounds)
    } else {
        if req.outcomes.len() > MAX_BACKTEST_ROUNDS {
            return Ok(bad_request(format!(
                "at most {MAX_BACKTEST_ROUNDS} outcomes may be replayed, got {}",
                req.outcomes.len()
            )));
        }
        req.outcomes
            .iter()
            .map(|n| RoundOutcome::from_number(*n))
            .collect::<Result<Vec<_>, _>>()?
    };

    let backtester = match req.round_interval_secs {
        Some(secs) if !(0..=MAX_ROUND_INTERVAL_SECS).contains(&secs) => {
            return Ok(bad_request(format!(
                "round_interval_secs must be between 0 and {MAX_ROUND_INTERVAL_SECS}, got {secs}"
            )));
        }
        Some(secs) => Backtester::new(chrono::Duration::seconds(secs)),
        None => Backtester::default(),
    };

    let strategy = Arc::new(req.strategy);
    let run = tokio::task::spawn_blocking(move || backtester.run(strategy, &outcomes)).await;
    match run {
        Ok(report) => {
            let report: BacktestReport = report?;
            Ok(Json(report).into_response())
        }
        Err(e) => {
            warn!(error = %e, "Backtest task failed");
            let body = serde_json::json!({ "error": "internal", "message": "backtest failed" });
            Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
