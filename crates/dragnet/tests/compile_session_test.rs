//! Compile sessions driven through a running coordinator.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use dragnet::Coordinator;
use dragnet_protocol::defaults::{DEFAULT_COMMAND_CAPACITY, DEFAULT_ENGINE_EVENT_CAPACITY};
use dragnet_protocol::{
    FileStats, RuleEngineEvent, RulesetSelection, RulesetView, ScanResult, SessionId, StatsReply,
    Target, UiCommand, UiEvent,
};
use dragnet_test_utils::{
    drain_now, init_tracing, recv_event, recv_until, RecordingRuleEngine, RecordingStatsEngine,
};

struct Harness {
    rules: Arc<RecordingRuleEngine>,
    stats: Arc<RecordingStatsEngine>,
    commands: mpsc::Sender<UiCommand>,
    rule_events: mpsc::Sender<RuleEngineEvent>,
    stats_events: mpsc::Sender<StatsReply>,
    ui: mpsc::UnboundedReceiver<UiEvent>,
    // Held so the loop keeps running for the whole test.
    #[allow(dead_code)]
    coordinator: JoinHandle<dragnet::Result<()>>,
}

fn spawn(rules: Arc<RecordingRuleEngine>) -> Harness {
    init_tracing();
    let (cmd_tx, cmd_rx) = mpsc::channel(DEFAULT_COMMAND_CAPACITY);
    let (rule_tx, rule_rx) = mpsc::channel(DEFAULT_ENGINE_EVENT_CAPACITY);
    let (stats_tx, stats_rx) = mpsc::channel(DEFAULT_ENGINE_EVENT_CAPACITY);
    let (ui_tx, ui_rx) = mpsc::unbounded_channel();

    let stats = Arc::new(RecordingStatsEngine::new());
    let coordinator = Coordinator::new(
        rules.clone(),
        stats.clone(),
        cmd_rx,
        rule_rx,
        stats_rx,
        ui_tx,
    );
    let handle = tokio::spawn(coordinator.run());

    Harness {
        rules,
        stats,
        commands: cmd_tx,
        rule_events: rule_tx,
        stats_events: stats_tx,
        ui: ui_rx,
        coordinator: handle,
    }
}

async fn await_ready(harness: &mut Harness) {
    let event = recv_event(&mut harness.ui).await;
    assert!(matches!(event, UiEvent::RulesChanged(_)));
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(25)).await;
}

fn view(path: &str) -> RulesetView {
    RulesetView::new(path).unwrap()
}

/// Open a session for `view` and return its id plus everything emitted up to
/// and including the disable that accompanies the compile request.
async fn open_session(harness: &mut Harness, view: RulesetView) -> SessionId {
    harness
        .commands
        .send(UiCommand::OpenCompileSession(view))
        .await
        .unwrap();
    let events = recv_until(&mut harness.ui, |e| {
        matches!(e, UiEvent::SessionsEnabled(false))
    })
    .await;
    match events.first() {
        Some(UiEvent::SessionOpened { id, .. }) => id.clone(),
        other => panic!("expected a session-opened event first, got {other:?}"),
    }
}

/// Report the pending compile as done with `result` standing in for the
/// engine's refreshed rule list.
async fn finish_compile(harness: &mut Harness, result: Vec<RulesetView>) {
    harness.rules.set_rules(result);
    harness
        .rule_events
        .send(RuleEngineEvent::RulesUpdated)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_open_session_requests_compile_under_busy_gate() -> Result<()> {
    let mut harness = spawn(Arc::new(RecordingRuleEngine::new()));
    await_ready(&mut harness).await;

    let source = view("/rules/fresh.yar");
    harness
        .commands
        .send(UiCommand::OpenCompileSession(source.clone()))
        .await?;

    let events = recv_until(&mut harness.ui, |e| {
        matches!(e, UiEvent::SessionsEnabled(false))
    })
    .await;
    assert!(matches!(
        events.as_slice(),
        [
            UiEvent::SessionOpened { .. },
            UiEvent::CompileBusy(true),
            UiEvent::SessionsEnabled(false),
        ]
    ));
    assert_eq!(harness.rules.compile_calls(), vec![source]);
    Ok(())
}

#[tokio::test]
async fn test_successful_compile_updates_session_and_lifts_gate() -> Result<()> {
    let mut harness = spawn(Arc::new(RecordingRuleEngine::new()));
    await_ready(&mut harness).await;

    let source = view("/rules/fresh.yar");
    let id = open_session(&mut harness, source.clone()).await;

    finish_compile(&mut harness, vec![source.compiled_ok()]).await;

    let events = recv_until(&mut harness.ui, |e| {
        matches!(e, UiEvent::SessionsEnabled(true))
    })
    .await;
    assert!(events
        .iter()
        .any(|e| matches!(e, UiEvent::RulesChanged(views) if views[0].is_compiled())));
    assert!(events.iter().any(|e| matches!(
        e,
        UiEvent::SessionUpdated { id: updated, view }
            if *updated == id && view.is_compiled()
    )));
    assert!(events
        .iter()
        .any(|e| matches!(e, UiEvent::CompileBusy(false))));
    Ok(())
}

#[tokio::test]
async fn test_failed_compile_carries_diagnostics_into_session() -> Result<()> {
    let mut harness = spawn(Arc::new(RecordingRuleEngine::new()));
    await_ready(&mut harness).await;

    let source = view("/rules/broken.yar");
    let id = open_session(&mut harness, source.clone()).await;

    finish_compile(
        &mut harness,
        vec![source.compile_failed("unterminated string at line 7")],
    )
    .await;

    let events = recv_until(&mut harness.ui, |e| {
        matches!(e, UiEvent::SessionsEnabled(true))
    })
    .await;
    let updated = events.iter().find_map(|e| match e {
        UiEvent::SessionUpdated { id: updated, view } if *updated == id => Some(view.clone()),
        _ => None,
    });
    let updated = updated.expect("session should see the failed compile");
    assert!(!updated.is_compiled());
    assert_eq!(updated.error(), Some("unterminated string at line 7"));

    // A failed compile still releases the gate.
    assert!(events
        .iter()
        .any(|e| matches!(e, UiEvent::CompileBusy(false))));
    Ok(())
}

#[tokio::test]
async fn test_scans_blocked_until_compile_finishes() -> Result<()> {
    let mut harness = spawn(Arc::new(RecordingRuleEngine::new()));
    await_ready(&mut harness).await;

    let source = view("/rules/fresh.yar");
    open_session(&mut harness, source.clone()).await;

    harness
        .commands
        .send(UiCommand::ChangeTargets(vec![
            Target::new("/tmp/a.bin").unwrap()
        ]))
        .await?;
    harness
        .commands
        .send(UiCommand::ChangeRuleset(RulesetSelection::All))
        .await?;
    settle().await;
    assert!(harness.rules.scan_calls().is_empty());
    assert_eq!(harness.stats.reset_count(), 0);

    finish_compile(&mut harness, vec![source.compiled_ok()]).await;
    recv_until(&mut harness.ui, |e| {
        matches!(e, UiEvent::SessionsEnabled(true))
    })
    .await;

    // Selecting a ruleset again starts the scan now that the gate is open.
    harness
        .commands
        .send(UiCommand::ChangeRuleset(RulesetSelection::All))
        .await?;
    let events = recv_until(&mut harness.ui, |e| matches!(e, UiEvent::ScanBegin)).await;
    assert!(matches!(events.last(), Some(UiEvent::ScanBegin)));
    assert_eq!(harness.rules.scan_calls().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_recompile_uses_latest_bound_view() -> Result<()> {
    let mut harness = spawn(Arc::new(RecordingRuleEngine::new()));
    await_ready(&mut harness).await;

    let source = view("/rules/fresh.yar");
    let id = open_session(&mut harness, source.clone()).await;
    finish_compile(&mut harness, vec![source.compiled_ok()]).await;
    recv_until(&mut harness.ui, |e| {
        matches!(e, UiEvent::SessionsEnabled(true))
    })
    .await;

    harness
        .commands
        .send(UiCommand::RecompileSession(id))
        .await?;
    settle().await;

    let compiles = harness.rules.compile_calls();
    assert_eq!(compiles.len(), 2);
    assert_eq!(compiles[1].revision(), 1);
    assert!(compiles[1].same_source(&source));
    Ok(())
}

#[tokio::test]
async fn test_session_mutation_refused_during_scan() -> Result<()> {
    let mut harness = spawn(Arc::new(RecordingRuleEngine::new()));
    await_ready(&mut harness).await;

    let source = view("/rules/fresh.yar");
    let id = open_session(&mut harness, source.clone()).await;
    finish_compile(&mut harness, vec![source.compiled_ok()]).await;
    recv_until(&mut harness.ui, |e| {
        matches!(e, UiEvent::SessionsEnabled(true))
    })
    .await;

    harness
        .commands
        .send(UiCommand::ChangeTargets(vec![
            Target::new("/tmp/a.bin").unwrap()
        ]))
        .await?;
    harness
        .commands
        .send(UiCommand::ChangeRuleset(RulesetSelection::All))
        .await?;
    recv_until(&mut harness.ui, |e| matches!(e, UiEvent::ScanBegin)).await;

    // Neither recompiles nor new sessions may slip in mid-scan.
    harness
        .commands
        .send(UiCommand::RecompileSession(id))
        .await?;
    harness
        .commands
        .send(UiCommand::OpenCompileSession(view("/rules/other.yar")))
        .await?;
    settle().await;
    assert_eq!(harness.rules.compile_calls().len(), 1);

    let events = drain_now(&mut harness.ui);
    assert!(!events
        .iter()
        .any(|e| matches!(e, UiEvent::SessionOpened { .. })));
    Ok(())
}

#[tokio::test]
async fn test_completion_refreshes_sessions_with_latest_rules() -> Result<()> {
    let mut harness = spawn(Arc::new(RecordingRuleEngine::new()));
    await_ready(&mut harness).await;

    let source = view("/rules/fresh.yar");
    let id = open_session(&mut harness, source.clone()).await;
    finish_compile(&mut harness, vec![source.compiled_ok()]).await;
    recv_until(&mut harness.ui, |e| {
        matches!(e, UiEvent::SessionsEnabled(true))
    })
    .await;

    harness
        .commands
        .send(UiCommand::ChangeTargets(vec![
            Target::new("/tmp/a.bin").unwrap()
        ]))
        .await?;
    harness
        .commands
        .send(UiCommand::ChangeRuleset(RulesetSelection::All))
        .await?;
    recv_until(&mut harness.ui, |e| matches!(e, UiEvent::ScanBegin)).await;

    // The engine's rule state moves on while the scan runs.
    let newer = source.compiled_ok().compile_failed("stale include");
    harness.rules.set_rules(vec![newer.clone()]);

    harness
        .rule_events
        .send(RuleEngineEvent::ScanResult(ScanResult::target_complete(
            Target::new("/tmp/a.bin").unwrap(),
            source.clone(),
        )))
        .await?;
    harness
        .rule_events
        .send(RuleEngineEvent::ScanComplete { error: None })
        .await?;
    settle().await;
    let request = harness.stats.requests()[0].clone();
    harness
        .stats_events
        .send(StatsReply {
            generation: request.generation,
            stats: FileStats::new(request.filename, 512),
        })
        .await?;

    let events = recv_until(&mut harness.ui, |e| {
        matches!(e, UiEvent::SessionUpdated { .. })
    })
    .await;
    assert!(events.iter().any(|e| matches!(e, UiEvent::ScanEnd(_))));
    assert!(events
        .iter()
        .any(|e| matches!(e, UiEvent::SessionsEnabled(true))));
    assert!(matches!(
        events.last(),
        Some(UiEvent::SessionUpdated { id: updated, view })
            if *updated == id && view.error() == Some("stale include")
    ));
    Ok(())
}

#[tokio::test]
async fn test_rules_update_mid_scan_leaves_sessions_locked() -> Result<()> {
    let mut harness = spawn(Arc::new(RecordingRuleEngine::new()));
    await_ready(&mut harness).await;

    let source = view("/rules/fresh.yar");
    let id = open_session(&mut harness, source.clone()).await;
    finish_compile(&mut harness, vec![source.compiled_ok()]).await;
    recv_until(&mut harness.ui, |e| {
        matches!(e, UiEvent::SessionsEnabled(true))
    })
    .await;

    harness
        .commands
        .send(UiCommand::ChangeTargets(vec![
            Target::new("/tmp/a.bin").unwrap()
        ]))
        .await?;
    harness
        .commands
        .send(UiCommand::ChangeRuleset(RulesetSelection::All))
        .await?;
    recv_until(&mut harness.ui, |e| matches!(e, UiEvent::ScanBegin)).await;

    // A rules update lands while the scan is still running.
    finish_compile(&mut harness, vec![source.compiled_ok().compiled_ok()]).await;
    settle().await;

    let events = drain_now(&mut harness.ui);
    assert!(events
        .iter()
        .any(|e| matches!(e, UiEvent::RulesChanged(_))));
    assert!(events.iter().any(|e| matches!(
        e,
        UiEvent::SessionUpdated { id: updated, .. } if *updated == id
    )));
    // The gate stays down until the scan itself completes.
    assert!(!events
        .iter()
        .any(|e| matches!(e, UiEvent::SessionsEnabled(true))));

    harness
        .rule_events
        .send(RuleEngineEvent::ScanComplete { error: None })
        .await?;
    let events = recv_until(&mut harness.ui, |e| {
        matches!(e, UiEvent::SessionsEnabled(true))
    })
    .await;
    assert!(events.iter().any(|e| matches!(e, UiEvent::ScanEnd(_))));
    Ok(())
}

#[tokio::test]
async fn test_closed_session_no_longer_refreshes() -> Result<()> {
    let mut harness = spawn(Arc::new(RecordingRuleEngine::new()));
    await_ready(&mut harness).await;

    let source = view("/rules/fresh.yar");
    let id = open_session(&mut harness, source.clone()).await;
    finish_compile(&mut harness, vec![source.compiled_ok()]).await;
    recv_until(&mut harness.ui, |e| {
        matches!(e, UiEvent::SessionsEnabled(true))
    })
    .await;

    harness.commands.send(UiCommand::CloseSession(id)).await?;
    settle().await;

    finish_compile(&mut harness, vec![source.compiled_ok().compiled_ok()]).await;
    settle().await;

    let events = drain_now(&mut harness.ui);
    assert!(events
        .iter()
        .any(|e| matches!(e, UiEvent::RulesChanged(_))));
    assert!(!events
        .iter()
        .any(|e| matches!(e, UiEvent::SessionUpdated { .. })));
    Ok(())
}

#[tokio::test]
async fn test_save_rules_forwards_to_engine() -> Result<()> {
    let mut harness = spawn(Arc::new(RecordingRuleEngine::with_rules(vec![view(
        "/rules/a.yar",
    )])));
    await_ready(&mut harness).await;

    let reordered = vec![view("/rules/b.yar"), view("/rules/a.yar")];
    harness
        .commands
        .send(UiCommand::SaveRules(reordered.clone()))
        .await?;
    settle().await;
    assert_eq!(harness.rules.update_calls(), vec![reordered.clone()]);

    // The engine acknowledges with a rules-updated event.
    harness
        .rule_events
        .send(RuleEngineEvent::RulesUpdated)
        .await?;
    let events = recv_until(&mut harness.ui, |e| matches!(e, UiEvent::RulesChanged(_))).await;
    assert!(matches!(
        events.last(),
        Some(UiEvent::RulesChanged(views)) if *views == reordered
    ));
    Ok(())
}
