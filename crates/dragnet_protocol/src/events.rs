//! Event and command vocabulary crossing the orchestration boundary.
//!
//! One enum per producer. Each producer writes into a single channel, so the
//! per-producer ordering the engines guarantee (match rows before a target's
//! finished marker, markers before scan-complete) survives transport. The
//! statistics engine emits exactly one event kind and its channel carries
//! [`crate::types::StatsReply`] directly.

use serde::{Deserialize, Serialize};

use crate::types::{
    FileStats, RulesetSelection, RulesetView, ScanOutcome, ScanResult, SessionId, Target,
};

/// Events emitted by the rule engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum RuleEngineEvent {
    /// One result row: a rule match, or the finished marker for a target.
    ScanResult(ScanResult),
    /// The scan finished on the engine side. An error means the operation
    /// failed as a unit; rows already delivered stand.
    ScanComplete { error: Option<String> },
    /// Some ruleset changed: compiled, recompiled, reordered, or removed.
    RulesUpdated,
}

/// Requests from the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum UiCommand {
    /// Replace the target set used by subsequent scans.
    ChangeTargets(Vec<Target>),
    /// Select the ruleset(s) to scan with, then start a scan if permitted.
    ChangeRuleset(RulesetSelection),
    /// Best-effort cancellation of the in-flight operation.
    AbortScan,
    /// Open a compile session bound to the view and compile it.
    OpenCompileSession(RulesetView),
    /// Re-issue the compile for an open session's bound view.
    RecompileSession(SessionId),
    /// The presentation side closed this session; drop it.
    CloseSession(SessionId),
    /// Persist an edited/reordered rule list to the engine.
    SaveRules(Vec<RulesetView>),
}

/// Events the coordinator raises toward the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum UiEvent {
    /// A scan was accepted and is now running.
    ScanBegin,
    /// One result row, in engine order. Rows with `rule == None` mark that
    /// the target's scanning has finished.
    ScanResult(ScanResult),
    /// Statistics for one scanned file arrived.
    FileStats(FileStats),
    /// The scan and every outstanding statistics request have finished.
    /// Raised exactly once per scan.
    ScanEnd(ScanOutcome),
    /// Fresh snapshot of all known rulesets.
    RulesChanged(Vec<RulesetView>),
    /// Whether a compile is in flight; scan initiation is gated on this.
    CompileBusy(bool),
    /// A compile session was opened for the presentation side to display.
    SessionOpened { id: SessionId, view: RulesetView },
    /// An open session's bound view was replaced with a newer revision.
    SessionUpdated { id: SessionId, view: RulesetView },
    /// Bulk mutability toggle for all open sessions.
    SessionsEnabled(bool),
}
