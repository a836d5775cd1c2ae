//! Persistence layer.
//!
//! Saves and loads the stopped-session history to/from a JSON file so
//! reports survive a restart. Live sessions are never persisted: a restart
//! always begins with no active sessions.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};

use crate::engine::session::SessionReport;

/// Default history file path.
const DEFAULT_HISTORY_FILE: &str = "roulette_history.json";

/// Save session history to a JSON file.
pub fn save_history(history: &[SessionReport], path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_HISTORY_FILE);
    let json = serde_json::to_string_pretty(history).context("Failed to serialise session history")?;

    std::fs::write(path, &json).with_context(|| format!("Failed to write history to {path}"))?;

    debug!(path, reports = history.len(), "History saved");
    Ok(())
}

/// Load session history from a JSON file.
/// Returns an empty history if the file doesn't exist (fresh start).
pub fn load_history(path: Option<&str>) -> Result<Vec<SessionReport>> {
    let path = path.unwrap_or(DEFAULT_HISTORY_FILE);

    if !Path::new(path).exists() {
        info!(path, "No saved history found, starting fresh");
        return Ok(Vec::new());
    }

    let json =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read history from {path}"))?;

    let history: Vec<SessionReport> =
        serde_json::from_str(&json).with_context(|| format!("Failed to parse history from {path}"))?;

    info!(path, reports = history.len(), "History loaded from disk");
    Ok(history)
}

/// Delete the history file (for testing or reset).
pub fn delete_history(path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_HISTORY_FILE);
    if Path::new(path).exists() {
        std::fs::remove_file(path).with_context(|| format!("Failed to delete history file {path}"))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::session::Session;
    use crate::strategy::{BetTarget, ProgressionKind, Strategy};
    use crate::types::{Color, RoundOutcome, StopReason};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn temp_path() -> String {
        let mut p = std::env::temp_dir();
        p.push(format!("roulette_test_history_{}.json", uuid::Uuid::new_v4()));
        p.to_string_lossy().to_string()
    }

    fn stopped_report(account: &str, spins: &[u8]) -> SessionReport {
        let strategy = Strategy::new(ProgressionKind::Fibonacci, BetTarget::Color(Color::Black), dec!(2));
        let mut session = Session::new(account, Arc::new(strategy));
        session.activate();
        for n in spins {
            session.apply_round(&RoundOutcome::from_number(*n).unwrap()).unwrap();
        }
        session.begin_stop(StopReason::Manual).unwrap();
        session.finish_stop(Utc::now());
        session.report()
    }

    #[test]
    fn test_save_and_load() {
        let path = temp_path();
        let history = vec![stopped_report("a", &[1, 2]), stopped_report("b", &[0])];
        save_history(&history, Some(&path)).unwrap();

        let loaded = load_history(Some(&path)).unwrap();
        assert_eq!(loaded, history);

        delete_history(Some(&path)).unwrap();
    }

    #[test]
    fn test_save_preserves_fields() {
        let path = temp_path();
        // Black bets: red 1 loses 2, black 2 wins 2, zero loses 2.
        let report = stopped_report("acct-9", &[1, 2, 0]);
        save_history(std::slice::from_ref(&report), Some(&path)).unwrap();

        let loaded = load_history(Some(&path)).unwrap();
        let loaded = &loaded[0];
        assert_eq!(loaded.account_id, "acct-9");
        assert_eq!(loaded.kind, ProgressionKind::Fibonacci);
        assert_eq!(loaded.stats.bets_placed, 3);
        assert_eq!(loaded.stats.wins, 1);
        assert_eq!(loaded.stats.profit, dec!(-2));
        assert_eq!(loaded.stats.last_outcome.unwrap().number, 0);
        assert_eq!(loaded.stop_reason, Some(StopReason::Manual));

        delete_history(Some(&path)).unwrap();
    }

    #[test]
    fn test_load_nonexistent() {
        let loaded = load_history(Some("/tmp/roulette_nonexistent_history_12345.json")).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_load_corrupt_file_errors() {
        let path = temp_path();
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_history(Some(&path)).is_err());
        delete_history(Some(&path)).unwrap();
    }

    #[test]
    fn test_delete_history() {
        let path = temp_path();
        save_history(&[], Some(&path)).unwrap();
        assert!(Path::new(&path).exists());

        delete_history(Some(&path)).unwrap();
        assert!(!Path::new(&path).exists());
    }

    #[test]
    fn test_delete_nonexistent_ok() {
        let result = delete_history(Some("/tmp/roulette_does_not_exist_xyz.json"));
        assert!(result.is_ok());
    }
}
