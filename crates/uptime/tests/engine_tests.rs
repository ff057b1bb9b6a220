//! Integration tests for the monitor engine against the in-memory ledger

mod common;

use std::time::Duration;

use common::{addr, engine, eventually, node, profile, ScriptedProbe};
use serde_json::json;
use tokio::time::timeout;
use tokio_test::assert_ok;
use uptime::ledger::{LedgerReader, LedgerSubmitter, MemoryLedger};
use uptime::{
    ActorId, EngineError, EngineState, LedgerError, PollTask, RegistryKind, ReportPayload, Transaction,
};

fn reports_against(submitted: &[uptime::ledger::SubmittedTransaction], target: u64) -> usize {
    submitted
        .iter()
        .filter(|tx| {
            tx.transaction == Transaction::ReportChecker(ReportPayload { checker: ActorId::new(target) })
        })
        .count()
}

async fn submitted_by(ledger: &MemoryLedger, caller: u64) -> usize {
    ledger.submitted().await.iter().filter(|tx| tx.caller == ActorId::new(caller)).count()
}

#[tokio::test]
async fn test_registers_once() {
    let _ = tracing_subscriber::fmt::try_init();

    let ledger = MemoryLedger::new();
    let me = profile(1, &["/ip4/10.0.0.1/tcp/3000"]);

    let first = engine(&ledger, me.clone(), ScriptedProbe::new());
    first.start().await.unwrap().shutdown().await;

    let registrations = |submitted: Vec<uptime::ledger::SubmittedTransaction>| {
        submitted.iter().filter(|tx| matches!(tx.transaction, Transaction::Register(_))).count()
    };
    assert_eq!(registrations(ledger.submitted().await), 1);
    assert!(ledger.load().await.unwrap().has_registered(ActorId::new(1)));

    // A restart finds the checker already registered
    let second = engine(&ledger, me, ScriptedProbe::new());
    second.start().await.unwrap().shutdown().await;
    assert_eq!(registrations(ledger.submitted().await), 1);
}

#[tokio::test]
async fn test_failed_registration_aborts_start() {
    let _ = tracing_subscriber::fmt::try_init();

    let ledger = MemoryLedger::new();
    ledger.fail_next_writes(1).await;
    let engine = engine(&ledger, profile(1, &["/ip4/10.0.0.1/tcp/3000"]), ScriptedProbe::new());

    let result = engine.start().await;
    assert!(matches!(result, Err(EngineError::Registration(LedgerError::Transient(_)))));
    assert_eq!(engine.state(), EngineState::Stopped);
    assert!(!ledger.load().await.unwrap().has_registered(ActorId::new(1)));
}

#[tokio::test]
async fn test_own_addresses_never_probed() {
    let _ = tracing_subscriber::fmt::try_init();

    let ledger = MemoryLedger::new();
    let own = "/ip4/10.0.0.1/tcp/3000";
    ledger.insert_checker(node(1, &[own])).await;
    ledger.insert_checker(node(2, &["/ip4/10.0.0.2/tcp/3000", own])).await;
    ledger.insert_member(node(10, &["/ip4/10.0.0.10/tcp/80", own])).await;

    let probe = ScriptedProbe::new();
    let engine = engine(&ledger, profile(1, &[own]), probe.clone());

    for task in PollTask::ALL {
        assert_ok!(engine.poll_once(task).await);
    }

    let calls = probe.calls();
    assert!(!calls.contains(&addr(own)));
    assert!(calls.contains(&addr("/ip4/10.0.0.2/tcp/3000")));
    assert!(calls.contains(&addr("/ip4/10.0.0.10/tcp/80")));
    assert!(ledger.submitted().await.is_empty());
}

#[tokio::test]
async fn test_single_vote_before_confirmation() {
    let _ = tracing_subscriber::fmt::try_init();

    let ledger = MemoryLedger::new();
    for id in [1, 2, 3] {
        ledger.insert_checker(node(id, &[format!("/ip4/10.0.0.{}/tcp/3000", id).as_str()])).await;
    }
    let up = addr("/ip4/10.0.0.42/tcp/3000");
    let down = addr("/ip4/10.0.0.42/tcp/3001");
    ledger.insert_checker(node(42, &[up.as_str(), down.as_str()])).await;

    // Another checker already reported 42
    ledger
        .submitter(ActorId::new(3))
        .submit(Transaction::ReportChecker(ReportPayload { checker: ActorId::new(42) }))
        .await
        .unwrap();

    let probe = ScriptedProbe::new();
    probe.set_down(&down);
    let engine = engine(&ledger, profile(1, &["/ip4/10.0.0.1/tcp/3000"]), probe);

    ledger.hold_confirmations(true).await;
    assert_ok!(engine.poll_once(PollTask::ReportedCheckers).await);
    assert_ok!(engine.poll_once(PollTask::Checkers).await);
    assert_ok!(engine.poll_once(PollTask::Checkers).await);
    assert_ok!(engine.poll_once(PollTask::ReportedCheckers).await);

    assert_eq!(reports_against(&ledger.submitted().await, 42), 2);
    assert_eq!(
        ledger.submitted().await.iter().filter(|tx| tx.caller == ActorId::new(1)).count(),
        1
    );
    assert!(engine.vote_cache().has_voted_locally(ActorId::new(42)).await);

    // Once confirmed, the ledger itself records the vote
    assert_eq!(ledger.confirm_held().await, 1);
    assert!(ledger.load().await.unwrap().has_voted(ActorId::new(42), ActorId::new(1)));
    assert_ok!(engine.poll_once(PollTask::Checkers).await);
    assert_eq!(reports_against(&ledger.submitted().await, 42), 2);
}

#[tokio::test]
async fn test_single_vote_with_loops_running() {
    let _ = tracing_subscriber::fmt::try_init();

    let ledger = MemoryLedger::new();
    for id in [1, 3] {
        ledger.insert_checker(node(id, &[format!("/ip4/10.0.0.{}/tcp/3000", id).as_str()])).await;
    }
    let down = addr("/ip4/10.0.0.42/tcp/3000");
    ledger.insert_checker(node(42, &[down.as_str()])).await;
    ledger
        .submitter(ActorId::new(3))
        .submit(Transaction::ReportChecker(ReportPayload { checker: ActorId::new(42) }))
        .await
        .unwrap();

    // Slow probes keep the reconciler and the checker monitor evaluating 42 together
    let probe = ScriptedProbe::new();
    probe.set_down(&down);
    probe.set_delay(&down, Duration::from_millis(30));

    let engine = engine(&ledger, profile(1, &["/ip4/10.0.0.1/tcp/3000"]), probe.clone());
    ledger.hold_confirmations(true).await;
    let handle = engine.start().await.unwrap();

    let voted = eventually(Duration::from_secs(5), || {
        let ledger = ledger.clone();
        async move { submitted_by(&ledger, 1).await >= 1 }
    })
    .await;
    assert!(voted);

    // Many more ticks of both loops, still unconfirmed
    tokio::time::sleep(Duration::from_millis(300)).await;
    let probed = probe.calls().iter().filter(|a| **a == down).count();
    handle.shutdown().await;

    assert!(probed >= 3, "42 probed {} times", probed);
    assert_eq!(submitted_by(&ledger, 1).await, 1);
    assert_eq!(reports_against(&ledger.submitted().await, 42), 2);
}

#[tokio::test]
async fn test_healthy_checker_not_reported() {
    let _ = tracing_subscriber::fmt::try_init();

    let ledger = MemoryLedger::new();
    ledger.insert_checker(node(1, &["/ip4/10.0.0.1/tcp/3000"])).await;
    ledger.insert_checker(node(2, &["/ip4/10.0.0.2/tcp/3000", "/ip4/10.0.0.2/tcp/8080/http/get/health"])).await;

    let engine = engine(&ledger, profile(1, &["/ip4/10.0.0.1/tcp/3000"]), ScriptedProbe::new());
    assert_ok!(engine.poll_once(PollTask::Checkers).await);

    assert!(ledger.submitted().await.is_empty());
    let health = engine.health().snapshot().await;
    assert_eq!(health[&ActorId::new(2)].len(), 2);
}

#[tokio::test]
async fn test_failed_report_is_retried() {
    let _ = tracing_subscriber::fmt::try_init();

    let ledger = MemoryLedger::new();
    ledger.insert_checker(node(1, &["/ip4/10.0.0.1/tcp/3000"])).await;
    ledger.insert_checker(node(7, &["/ip4/10.0.0.7/tcp/3000"])).await;

    let probe = ScriptedProbe::new();
    probe.set_down(&addr("/ip4/10.0.0.7/tcp/3000"));
    let engine = engine(&ledger, profile(1, &["/ip4/10.0.0.1/tcp/3000"]), probe);

    ledger.fail_next_writes(1).await;
    assert_ok!(engine.poll_once(PollTask::Checkers).await);
    assert!(!engine.vote_cache().has_voted_locally(ActorId::new(7)).await);

    assert_ok!(engine.poll_once(PollTask::Checkers).await);
    assert!(engine.vote_cache().has_voted_locally(ActorId::new(7)).await);
    assert_eq!(reports_against(&ledger.submitted().await, 7), 2);
    assert!(ledger.load().await.unwrap().has_voted(ActorId::new(7), ActorId::new(1)));
}

#[tokio::test]
async fn test_member_health_recorded() {
    let _ = tracing_subscriber::fmt::try_init();

    let ledger = MemoryLedger::new();
    let up = addr("/ip4/10.0.0.10/tcp/80/http/get/health");
    let down = addr("/ip4/10.0.0.10/tcp/3000");
    ledger.insert_member(node(10, &[up.as_str(), down.as_str()])).await;

    let probe = ScriptedProbe::new();
    probe.set_down(&down);
    probe.set_latency(&up, 100);
    let engine = engine(&ledger, profile(1, &["/ip4/10.0.0.1/tcp/3000"]), probe.clone());

    assert_ok!(engine.poll_once(PollTask::Members).await);
    probe.set_latency(&up, 300);
    assert_ok!(engine.poll_once(PollTask::Members).await);

    let health = engine.health();
    let up_info = health.get(ActorId::new(10), &up).await.unwrap();
    assert!(up_info.is_online);
    assert_eq!(up_info.avg_latency, 200);
    assert_eq!(up_info.latency_counts, 2);
    assert_eq!(up_info.latency, 300);

    let down_info = health.get(ActorId::new(10), &down).await.unwrap();
    assert!(!down_info.is_online);
    assert_eq!(down_info.avg_latency, 0);

    // Members are never reported
    assert!(ledger.submitted().await.is_empty());
}

#[tokio::test]
async fn test_malformed_entry_skipped() {
    let _ = tracing_subscriber::fmt::try_init();

    let ledger = MemoryLedger::new();
    ledger.insert_checker(node(1, &["/ip4/10.0.0.1/tcp/3000"])).await;
    ledger.insert_checker(node(5, &["/ip4/10.0.0.5/tcp/3000"])).await;
    ledger.insert_raw(RegistryKind::Checkers, "6", json!({ "id": 12 })).await;

    let probe = ScriptedProbe::new();
    let engine = engine(&ledger, profile(1, &["/ip4/10.0.0.1/tcp/3000"]), probe.clone());
    assert_ok!(engine.poll_once(PollTask::Checkers).await);

    assert_eq!(ledger.load().await.unwrap().decode_failures(), 1);
    assert_eq!(probe.calls(), vec![addr("/ip4/10.0.0.5/tcp/3000")]);
}

#[tokio::test]
async fn test_unavailable_ledger() {
    let _ = tracing_subscriber::fmt::try_init();

    let ledger = MemoryLedger::new();
    ledger.insert_member(node(10, &["/ip4/10.0.0.10/tcp/80"])).await;
    let engine = engine(&ledger, profile(1, &["/ip4/10.0.0.1/tcp/3000"]), ScriptedProbe::new());

    ledger.set_unavailable(true).await;
    assert!(matches!(engine.poll_once(PollTask::Members).await, Err(LedgerError::Transient(_))));
    assert!(engine.health().is_empty().await);

    ledger.set_unavailable(false).await;
    assert_ok!(engine.poll_once(PollTask::Members).await);
    assert_eq!(engine.health().len().await, 1);
}

#[tokio::test]
async fn test_loops_recover_after_outage() {
    let _ = tracing_subscriber::fmt::try_init();

    let ledger = MemoryLedger::new();
    let engine = engine(&ledger, profile(1, &["/ip4/10.0.0.1/tcp/3000"]), ScriptedProbe::new());
    let handle = engine.start().await.unwrap();

    ledger.set_unavailable(true).await;
    ledger.insert_member(node(10, &["/ip4/10.0.0.10/tcp/80"])).await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(engine.health().is_empty().await);

    ledger.set_unavailable(false).await;
    let health = engine.health();
    let recovered = eventually(Duration::from_secs(3), || {
        let health = health.clone();
        async move { !health.is_empty().await }
    })
    .await;
    assert!(recovered);

    handle.shutdown().await;
    assert_eq!(engine.state(), EngineState::Stopped);
}

#[tokio::test]
async fn test_stop_interrupts_hanging_probe() {
    let _ = tracing_subscriber::fmt::try_init();

    let ledger = MemoryLedger::new();
    let stuck = addr("/ip4/10.0.0.9/tcp/3000");
    ledger.insert_checker(node(9, &[stuck.as_str()])).await;

    let probe = ScriptedProbe::new();
    probe.set_hanging(&stuck);
    let engine = engine(&ledger, profile(1, &["/ip4/10.0.0.1/tcp/3000"]), probe.clone());
    let handle = engine.start().await.unwrap();

    let probing = eventually(Duration::from_secs(3), || {
        let called = !probe.calls().is_empty();
        async move { called }
    })
    .await;
    assert!(probing);

    timeout(Duration::from_secs(2), handle.shutdown()).await.unwrap();
    assert_eq!(engine.state(), EngineState::Stopped);
}

#[tokio::test]
async fn test_quorum_removes_checker() {
    let _ = tracing_subscriber::fmt::try_init();

    let ledger = MemoryLedger::new();
    for id in 1..=4 {
        ledger.insert_checker(node(id, &[format!("/ip4/10.0.0.{}/tcp/3000", id).as_str()])).await;
    }
    let probe = ScriptedProbe::new();
    probe.set_down(&addr("/ip4/10.0.0.4/tcp/3000"));

    // 4 checkers: more than 2 votes are needed
    for id in 1..=3 {
        let own = format!("/ip4/10.0.0.{}/tcp/3000", id);
        let engine = engine(&ledger, profile(id, &[own.as_str()]), probe.clone());
        assert_ok!(engine.poll_once(PollTask::Checkers).await);

        let registered = ledger.load().await.unwrap().has_registered(ActorId::new(4));
        assert_eq!(registered, id < 3, "after vote {}", id);
    }

    assert_eq!(reports_against(&ledger.submitted().await, 4), 3);
}
