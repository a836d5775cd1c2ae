//! End-to-end orchestration scenarios.
//!
//! Drives the orchestrator, dispatcher and event bus together against the
//! mock bridge, the way the binary wires them.

use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

use roulette_bot::engine::dispatcher::spawn_bet_dispatcher;
use roulette_bot::engine::events::{EventBus, SessionEvent};
use roulette_bot::engine::orchestrator::{OrchestratorConfig, SessionOrchestrator};
use roulette_bot::simulator::WheelSimulator;
use roulette_bot::strategy::{Account, BetTarget, Parity, ProgressionKind, Strategy};
use roulette_bot::types::{BotError, Color, RoundOutcome, SessionState, StopReason};

use crate::mock_bridge::MockBridge;

const RED: u8 = 1;
const BLACK: u8 = 2;

fn spin(n: u8) -> RoundOutcome {
    RoundOutcome::from_number(n).unwrap()
}

fn martingala_on(color: Color, max_losses: u32) -> Arc<Strategy> {
    Arc::new(
        Strategy::new(ProgressionKind::Martingala, BetTarget::Color(color), dec!(5))
            .with_limits(max_losses, dec!(100), dec!(500)),
    )
}

fn orchestrator(bridge: &MockBridge) -> Arc<SessionOrchestrator> {
    Arc::new(SessionOrchestrator::new(
        Arc::new(bridge.clone()),
        EventBus::new(256),
        OrchestratorConfig {
            ack_timeout: Duration::from_secs(2),
        },
    ))
}

#[tokio::test]
async fn test_losing_streak_doubles_then_stops() {
    let bridge = MockBridge::new();
    let orc = orchestrator(&bridge);
    let mut rx = orc.events().subscribe();
    let summary = orc.start_session(martingala_on(Color::Red, 3), "alice").await.unwrap();

    let mut next_stakes = Vec::new();
    for _ in 0..3 {
        orc.on_round_outcome(spin(BLACK)).await;
    }
    while let Ok(event) = rx.try_recv() {
        if let SessionEvent::RoundApplied { result, .. } = event {
            next_stakes.push(result.next_stake);
        }
    }
    assert_eq!(next_stakes, vec![dec!(10), dec!(20), dec!(40)]);

    let after = orc.session(summary.id).await.unwrap();
    assert_eq!(after.state, SessionState::Stopped);
    assert_eq!(after.stop_reason, Some(StopReason::MaxLossesReached));
    assert_eq!(after.stats.profit, dec!(-35));
    assert_eq!(bridge.releases(), vec!["alice"]);
}

#[tokio::test]
async fn test_immediate_win() {
    let bridge = MockBridge::new();
    let orc = orchestrator(&bridge);
    let summary = orc.start_session(martingala_on(Color::Red, 3), "alice").await.unwrap();

    orc.on_round_outcome(spin(RED)).await;

    let after = orc.session(summary.id).await.unwrap();
    assert_eq!(after.stats.profit, dec!(5));
    assert_eq!(after.stats.wins, 1);
    assert_eq!(after.current_stake, dec!(5));
    assert_eq!(after.state, SessionState::Active);
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let bridge = MockBridge::new();
    let orc = orchestrator(&bridge);
    let red = orc.start_session(martingala_on(Color::Red, 5), "red-acct").await.unwrap();
    let black = orc
        .start_session(martingala_on(Color::Black, 5), "black-acct")
        .await
        .unwrap();

    orc.on_round_outcome(spin(RED)).await;

    let red = orc.session(red.id).await.unwrap();
    let black = orc.session(black.id).await.unwrap();
    assert_eq!(red.stats.profit, dec!(5));
    assert_eq!(red.current_stake, dec!(5));
    assert_eq!(black.stats.profit, dec!(-5));
    assert_eq!(black.current_stake, dec!(10));
}

#[tokio::test]
async fn test_zero_loses_for_every_even_money_target() {
    let bridge = MockBridge::new();
    let orc = orchestrator(&bridge);
    let even = Arc::new(
        Strategy::new(ProgressionKind::Dalembert, BetTarget::Parity(Parity::Even), dec!(2))
            .with_limits(5, dec!(50), dec!(50)),
    );
    let a = orc.start_session(martingala_on(Color::Red, 5), "a").await.unwrap();
    let b = orc.start_session(martingala_on(Color::Black, 5), "b").await.unwrap();
    let c = orc.start_session(even, "c").await.unwrap();

    let report = orc.on_round_outcome(spin(0)).await;
    assert_eq!(report.applied.len(), 3);

    for id in [a.id, b.id, c.id] {
        let s = orc.session(id).await.unwrap();
        assert_eq!(s.stats.losses, 1);
        assert!(s.stats.profit < dec!(0));
    }
}

#[tokio::test]
async fn test_failed_account_does_not_affect_others() {
    let bridge = MockBridge::new();
    bridge.fail_account("broken");
    let orc = orchestrator(&bridge);

    let strategy = Arc::new(
        (*martingala_on(Color::Red, 5))
            .clone()
            .with_accounts(vec![Account::new("ok-1"), Account::new("broken"), Account::new("ok-2")]),
    );
    let results = orc.start_accounts(strategy).await;

    let failures: Vec<_> = results.iter().filter(|(_, r)| r.is_err()).collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "broken");
    assert!(matches!(
        failures[0].1,
        Err(BotError::ExternalActorFailure { .. })
    ));

    let report = orc.on_round_outcome(spin(RED)).await;
    assert_eq!(report.applied.len(), 2);
    assert!(report.errors.is_empty());
    assert_eq!(orc.get_status().await.active_count(), 2);
}

#[tokio::test]
async fn test_concurrent_start_same_account() {
    let bridge = MockBridge::new();
    bridge.set_launch_delay(Duration::from_millis(50));
    let orc = orchestrator(&bridge);

    let (first, second) = tokio::join!(
        orc.start_session(martingala_on(Color::Red, 3), "alice"),
        orc.start_session(martingala_on(Color::Red, 3), "alice"),
    );

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|r| matches!(r, Err(BotError::AccountAlreadyActive(a)) if a == "alice")));
    assert_eq!(bridge.launches(), vec!["alice"]);
}

#[tokio::test]
async fn test_concurrent_stop_and_round_are_consistent() {
    let bridge = MockBridge::new();
    let orc = orchestrator(&bridge);
    let summary = orc.start_session(martingala_on(Color::Red, 5), "alice").await.unwrap();

    let (stop, _) = tokio::join!(
        orc.stop_session(summary.id),
        orc.on_round_outcome(spin(BLACK)),
    );
    let report = stop.unwrap();

    // Either the round landed before the stop or it was skipped; the
    // report always matches the final state.
    assert!(report.stats.bets_placed <= 1);
    let after = orc.session(summary.id).await.unwrap();
    assert_eq!(after.state, SessionState::Stopped);
    assert_eq!(after.stats, report.stats);

    // Later rounds never touch a stopped session.
    orc.on_round_outcome(spin(BLACK)).await;
    assert_eq!(orc.session(summary.id).await.unwrap().stats, report.stats);
}

#[tokio::test]
async fn test_triggered_stop_wins_over_late_manual_stop() {
    let bridge = MockBridge::new();
    let orc = orchestrator(&bridge);
    orc.start_session(martingala_on(Color::Red, 1), "first").await.unwrap();
    let second = orc.start_session(martingala_on(Color::Red, 1), "second").await.unwrap();
    bridge.set_release_delay(Duration::from_millis(100));

    // Both sessions hit max losses; the manual stop arrives while the first
    // release is still in flight.
    let fan_out = {
        let orc = Arc::clone(&orc);
        tokio::spawn(async move { orc.on_round_outcome(spin(BLACK)).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    let manual = orc.stop_session(second.id).await;
    let report = fan_out.await.unwrap();

    assert!(matches!(manual, Err(BotError::SessionNotActive(id)) if id == second.id));
    assert!(report.errors.is_empty());
    assert_eq!(report.stopped.len(), 2);
    let after = orc.session(second.id).await.unwrap();
    assert_eq!(after.state, SessionState::Stopped);
    assert_eq!(after.stop_reason, Some(StopReason::MaxLossesReached));
    assert_eq!(bridge.live_count(), 0);
}

#[tokio::test]
async fn test_stop_all_with_mixed_states() {
    let bridge = MockBridge::new();
    let orc = orchestrator(&bridge);
    orc.start_session(martingala_on(Color::Red, 1), "fragile").await.unwrap();
    orc.start_session(martingala_on(Color::Red, 5), "sturdy").await.unwrap();

    // One black stops "fragile" on max losses; "sturdy" keeps going.
    let report = orc.on_round_outcome(spin(BLACK)).await;
    assert_eq!(report.stopped.len(), 1);

    let reports = orc.stop_all().await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].account_id, "sturdy");
    assert_eq!(reports[0].stop_reason, Some(StopReason::Manual));
    assert_eq!(bridge.live_count(), 0);
}

#[tokio::test]
async fn test_dispatcher_places_progression_bets() {
    let bridge = MockBridge::new();
    let events = EventBus::new(256);
    let dispatcher = spawn_bet_dispatcher(Arc::new(bridge.clone()), events.subscribe());
    let orc = SessionOrchestrator::new(
        Arc::new(bridge.clone()),
        events,
        OrchestratorConfig::default(),
    );

    orc.start_session(martingala_on(Color::Red, 5), "alice").await.unwrap();
    // Each bet must reach the table before the round it rides on settles.
    for (placed, n) in [(1, BLACK), (2, BLACK), (3, RED)] {
        wait_for_bets(&bridge, placed).await;
        orc.on_round_outcome(spin(n)).await;
    }
    wait_for_bets(&bridge, 4).await;

    drop(orc);
    let stats = dispatcher.await.unwrap();
    assert_eq!(
        bridge.bets_for("alice"),
        vec![dec!(5), dec!(10), dec!(20), dec!(5)]
    );
    assert_eq!(stats.placed, 4);
}

#[tokio::test]
async fn test_dispatcher_counts_bridge_failures() {
    let bridge = MockBridge::new();
    let events = EventBus::new(256);
    let dispatcher = spawn_bet_dispatcher(Arc::new(bridge.clone()), events.subscribe());
    let orc = SessionOrchestrator::new(
        Arc::new(bridge.clone()),
        events,
        OrchestratorConfig::default(),
    );

    orc.start_session(martingala_on(Color::Red, 5), "alice").await.unwrap();
    bridge.set_error("table closed");
    orc.on_round_outcome(spin(BLACK)).await;

    // Session state is unaffected by bet placement failures.
    let status = orc.get_status().await;
    assert_eq!(status.sessions[0].stats.losses, 1);

    drop(orc);
    let stats = dispatcher.await.unwrap();
    assert_eq!(stats.placed + stats.failed, 2);
}

#[tokio::test]
async fn test_simulated_wheel_keeps_invariants() {
    let bridge = MockBridge::new();
    let orc = orchestrator(&bridge);
    for (i, color) in [Color::Red, Color::Black, Color::Red].into_iter().enumerate() {
        orc.start_session(martingala_on(color, 6), &format!("acct-{i}"))
            .await
            .unwrap();
    }

    let mut wheel = WheelSimulator::new(Some(2024));
    for outcome in wheel.spins(300) {
        orc.on_round_outcome(outcome).await;
    }

    let status = orc.get_status().await;
    for s in &status.sessions {
        assert_eq!(s.stats.bets_placed, s.stats.wins + s.stats.losses);
        assert!(s.stats.consecutive_losses <= s.strategy.max_consecutive_losses);
        if s.state == SessionState::Stopped {
            assert!(s.stop_reason.is_some());
        }
    }

    let purged = orc.purge_stopped().await;
    assert!(purged.iter().all(|r| r.stop_reason.is_some()));
    assert_eq!(
        orc.get_status().await.sessions.len() + purged.len(),
        status.sessions.len()
    );
}

async fn wait_for_bets(bridge: &MockBridge, count: usize) {
    for _ in 0..200 {
        if bridge.bets().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("expected {count} bets, saw {}", bridge.bets().len());
}
