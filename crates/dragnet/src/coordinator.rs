//! The coordinator event loop.
//!
//! Owns all orchestration state on a single task and serializes every input:
//! presentation commands, rule engine events, and statistics replies each
//! arrive on their own channel, wired in at construction. Per-channel FIFO
//! order is what the scan accounting relies on; the `biased` select keeps
//! commands (notably aborts) ahead of engine event floods.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use dragnet_protocol::{
    RuleEngineEvent, RulesetSelection, RulesetView, SessionId, StatsReply, Target, UiCommand,
    UiEvent,
};

use crate::engine::{EngineKind, RuleEngine, StatsEngine};
use crate::error::{CoordinatorError, Result};
use crate::orchestrator::ScanOrchestrator;
use crate::session::SessionRegistry;

/// Drives the scan orchestrator and the session registry from three inboxes.
pub struct Coordinator {
    orchestrator: ScanOrchestrator,
    sessions: SessionRegistry,
    rules: Arc<dyn RuleEngine>,

    /// Last target selection from the presentation layer.
    targets: Vec<Target>,
    /// Last ruleset selection; `None` until the first change arrives.
    selection: Option<RulesetSelection>,

    commands: mpsc::Receiver<UiCommand>,
    rule_events: mpsc::Receiver<RuleEngineEvent>,
    stats_events: mpsc::Receiver<StatsReply>,
    ui: mpsc::UnboundedSender<UiEvent>,
}

impl Coordinator {
    /// Wire a coordinator to its collaborators.
    ///
    /// The engines must deliver their events on the senders paired with
    /// `rule_events` and `stats_events`; the presentation layer submits
    /// commands on the sender paired with `commands` and renders the events
    /// appearing on `ui`'s receiver. Capacities for the bounded channels live
    /// in [`dragnet_protocol::defaults`].
    pub fn new(
        rules: Arc<dyn RuleEngine>,
        stats: Arc<dyn StatsEngine>,
        commands: mpsc::Receiver<UiCommand>,
        rule_events: mpsc::Receiver<RuleEngineEvent>,
        stats_events: mpsc::Receiver<StatsReply>,
        ui: mpsc::UnboundedSender<UiEvent>,
    ) -> Self {
        let orchestrator = ScanOrchestrator::new(rules.clone(), stats, ui.clone());
        let sessions = SessionRegistry::new(ui.clone());
        Self {
            orchestrator,
            sessions,
            rules,
            targets: Vec::new(),
            selection: None,
            commands,
            rule_events,
            stats_events,
            ui,
        }
    }

    /// Main event loop. Consumes the coordinator; runs until the presentation
    /// layer closes its command channel.
    ///
    /// An engine channel closing while an operation is in flight is a fault
    /// and ends the loop with [`CoordinatorError::EngineDisconnected`];
    /// closing while idle is treated as teardown.
    pub async fn run(mut self) -> Result<()> {
        info!("coordinator started");
        self.emit(UiEvent::RulesChanged(self.rules.rules()));

        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => {
                    match command {
                        Some(command) => self.handle_command(command),
                        None => {
                            info!("command channel closed; coordinator stopping");
                            break;
                        }
                    }
                }

                event = self.rule_events.recv() => {
                    match event {
                        Some(event) => self.handle_rule_event(event),
                        None => return self.engine_disconnected(EngineKind::Rules),
                    }
                }

                reply = self.stats_events.recv() => {
                    match reply {
                        Some(reply) => self.handle_stats_reply(reply),
                        None => return self.engine_disconnected(EngineKind::Stats),
                    }
                }
            }
        }

        Ok(())
    }

    // ------------------------------------------------------------------------
    // Presentation commands
    // ------------------------------------------------------------------------

    fn handle_command(&mut self, command: UiCommand) {
        match command {
            UiCommand::ChangeTargets(targets) => {
                debug!(count = targets.len(), "target selection changed");
                self.targets = targets;
            }
            UiCommand::ChangeRuleset(selection) => {
                debug!(ruleset = %selection.describe(), "ruleset selection changed");
                self.selection = Some(selection);
                self.try_scan();
            }
            UiCommand::AbortScan => self.orchestrator.abort(),
            UiCommand::OpenCompileSession(view) => self.open_compile_session(view),
            UiCommand::RecompileSession(id) => self.recompile_session(&id),
            UiCommand::CloseSession(id) => {
                self.sessions.close(&id);
            }
            UiCommand::SaveRules(rules) => {
                info!(count = rules.len(), "saving rule list");
                self.rules.update_rules(rules);
            }
        }
    }

    /// Kick off a scan of the current targets with the current selection.
    /// The orchestrator refuses starts that would overlap other work.
    fn try_scan(&mut self) {
        let Some(selection) = self.selection.clone() else {
            return;
        };
        if self.orchestrator.request_scan(&self.targets, &selection) {
            self.sessions.set_enabled(false);
        }
    }

    fn open_compile_session(&mut self, view: RulesetView) {
        if !self.orchestrator.is_idle() {
            warn!(
                ruleset = %view.display_name(),
                "compile session refused while a scan is in flight"
            );
            return;
        }
        self.sessions.open(view.clone());
        self.begin_compile(view);
    }

    fn recompile_session(&mut self, id: &SessionId) {
        if !self.orchestrator.is_idle() {
            warn!(session = %id, "recompile refused while a scan is in flight");
            return;
        }
        match self.sessions.view_of(id) {
            Some(view) => self.begin_compile(view),
            None => warn!(session = %id, "recompile for unknown compile session ignored"),
        }
    }

    fn begin_compile(&mut self, view: RulesetView) {
        info!(ruleset = %view.display_name(), "compile requested");
        self.orchestrator.set_compile_busy(true);
        self.sessions.set_enabled(false);
        self.rules.compile(view);
    }

    // ------------------------------------------------------------------------
    // Engine events
    // ------------------------------------------------------------------------

    fn handle_rule_event(&mut self, event: RuleEngineEvent) {
        match event {
            RuleEngineEvent::ScanResult(result) => self.orchestrator.handle_scan_result(result),
            RuleEngineEvent::ScanComplete { error } => {
                if self.orchestrator.handle_scan_complete(error) {
                    self.operation_complete();
                }
            }
            RuleEngineEvent::RulesUpdated => self.handle_rules_updated(),
        }
    }

    fn handle_stats_reply(&mut self, reply: StatsReply) {
        if self.orchestrator.handle_stats_reply(reply) {
            self.operation_complete();
        }
    }

    /// Side effects of reaching idle: sessions become mutable again and every
    /// open session sees the freshest rule state.
    fn operation_complete(&mut self) {
        self.sessions.set_enabled(true);
        self.sessions.refresh(&self.rules.rules());
    }

    fn handle_rules_updated(&mut self) {
        let views = self.rules.rules();
        debug!(count = views.len(), "rules updated");
        self.emit(UiEvent::RulesChanged(views.clone()));
        self.sessions.refresh(&views);
        if self.orchestrator.is_idle() {
            self.orchestrator.set_compile_busy(false);
            self.sessions.set_enabled(true);
        }
    }

    fn engine_disconnected(&self, engine: EngineKind) -> Result<()> {
        if self.orchestrator.is_idle() {
            info!(%engine, "engine channel closed while idle; coordinator stopping");
            Ok(())
        } else {
            warn!(%engine, "engine channel closed with an operation in flight");
            Err(CoordinatorError::EngineDisconnected(engine))
        }
    }

    fn emit(&self, event: UiEvent) {
        if self.ui.send(event).is_err() {
            warn!("presentation channel closed; dropping event");
        }
    }
}
