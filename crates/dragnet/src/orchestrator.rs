//! Scan orchestration state machine.
//!
//! One scan operation fans out across two engines: the rule engine streams
//! match rows and per-target finished markers, and every marker triggers an
//! asynchronous statistics request for that target. The operation is complete
//! only when the rule engine has reported scan-complete AND every statistics
//! reply has arrived. [`ScanOrchestrator`] tracks that joint condition, tags
//! all statistics traffic with a scan generation so late replies from a
//! previous scan cannot corrupt the current one, and owns the compile-busy
//! flag that keeps scans and compiles mutually exclusive.
//!
//! The orchestrator is purely synchronous state; the coordinator's event loop
//! feeds it engine events one at a time.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use dragnet_protocol::{
    FileStats, RulesetSelection, ScanGeneration, ScanOutcome, ScanResult, StatsReply,
    StatsRequest, Target, UiEvent,
};

use crate::engine::{RuleEngine, StatsEngine};

// ============================================================================
// Phases
// ============================================================================

/// Where the current operation stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    /// No scan in flight. The only phase that accepts a new scan.
    Idle,
    /// The rule engine is scanning; statistics fan out as targets finish.
    Scanning,
    /// The rule engine is done but statistics replies are still outstanding.
    Draining,
}

impl ScanPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanPhase::Idle => "idle",
            ScanPhase::Scanning => "scanning",
            ScanPhase::Draining => "draining",
        }
    }
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Tracks one scan operation from start to fully-drained completion.
pub struct ScanOrchestrator {
    rules: Arc<dyn RuleEngine>,
    stats: Arc<dyn StatsEngine>,
    ui: mpsc::UnboundedSender<UiEvent>,

    phase: ScanPhase,
    /// Set when the user requested cancellation of the current operation.
    aborted: bool,
    /// Set around compile requests; gates scan starts like `Scanning` does.
    compile_busy: bool,
    /// Bumped on every accepted scan start.
    generation: ScanGeneration,
    /// Targets granted a statistics request this generation. Guards against
    /// duplicate finished markers from the engine.
    requested: HashSet<String>,
    /// Targets whose statistics reply is still outstanding.
    pending: HashSet<String>,
    /// Error from the engine's scan-complete event, held until the drain ends.
    scan_error: Option<String>,
    /// Statistics delivered this generation, keyed by filename.
    stats_cache: HashMap<String, FileStats>,
}

impl ScanOrchestrator {
    pub fn new(
        rules: Arc<dyn RuleEngine>,
        stats: Arc<dyn StatsEngine>,
        ui: mpsc::UnboundedSender<UiEvent>,
    ) -> Self {
        Self {
            rules,
            stats,
            ui,
            phase: ScanPhase::Idle,
            aborted: false,
            compile_busy: false,
            generation: ScanGeneration::default(),
            requested: HashSet::new(),
            pending: HashSet::new(),
            scan_error: None,
            stats_cache: HashMap::new(),
        }
    }

    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase == ScanPhase::Idle
    }

    pub fn is_compile_busy(&self) -> bool {
        self.compile_busy
    }

    pub fn generation(&self) -> ScanGeneration {
        self.generation
    }

    /// Number of statistics replies the current operation is still waiting on.
    pub fn outstanding_stats(&self) -> usize {
        self.pending.len()
    }

    /// Statistics cached for `filename` during the current generation.
    pub fn stats_for(&self, filename: &str) -> Option<&FileStats> {
        self.stats_cache.get(filename)
    }

    // ------------------------------------------------------------------------
    // Scan lifecycle
    // ------------------------------------------------------------------------

    /// Start a scan of `targets` with `selection`.
    ///
    /// Refused (returning `false`, with no engine traffic and no state
    /// change) when the target list is empty, when an operation is already in
    /// flight, or while a compile is busy.
    pub fn request_scan(&mut self, targets: &[Target], selection: &RulesetSelection) -> bool {
        if targets.is_empty() {
            debug!("scan refused: no targets selected");
            return false;
        }
        if self.phase != ScanPhase::Idle {
            debug!(phase = %self.phase, "scan refused: operation already in flight");
            return false;
        }
        if self.compile_busy {
            debug!("scan refused: compile in progress");
            return false;
        }

        self.generation = self.generation.next();
        self.phase = ScanPhase::Scanning;
        self.aborted = false;
        self.scan_error = None;
        self.requested.clear();
        self.pending.clear();
        self.stats_cache.clear();

        info!(
            generation = %self.generation,
            targets = targets.len(),
            ruleset = %selection.describe(),
            "scan started"
        );

        self.emit(UiEvent::ScanBegin);
        self.stats.reset();
        self.rules.scan(targets.to_vec(), selection.clone());
        true
    }

    /// Feed one scan-result row from the rule engine.
    ///
    /// Match rows are forwarded as-is. A target-finished marker additionally
    /// triggers the statistics request for that target before being
    /// forwarded. Rows arriving outside an active scan, and duplicate
    /// markers, are dropped without reaching the presentation layer.
    pub fn handle_scan_result(&mut self, result: ScanResult) {
        if self.phase != ScanPhase::Scanning {
            warn!(
                target = %result.target,
                phase = %self.phase,
                "dropping scan result outside an active scan"
            );
            return;
        }

        if result.is_target_complete() && !self.request_stats_for(&result.target) {
            return;
        }
        self.emit(UiEvent::ScanResult(result));
    }

    /// Issue the statistics request for a finished target. Returns `false`
    /// for a duplicate marker, which leaves the accounting untouched.
    fn request_stats_for(&mut self, target: &Target) -> bool {
        let filename = target.as_str().to_string();
        if !self.requested.insert(filename.clone()) {
            warn!(
                target = %target,
                "duplicate finished marker; statistics already requested"
            );
            return false;
        }
        self.pending.insert(filename.clone());
        debug!(
            target = %target,
            outstanding = self.pending.len(),
            "requesting file statistics"
        );
        self.stats.request(StatsRequest {
            filename,
            generation: self.generation,
        });
        true
    }

    /// Feed the rule engine's scan-complete signal.
    ///
    /// Moves the operation into its drain; returns `true` when the whole
    /// operation finished right now (no statistics left outstanding).
    pub fn handle_scan_complete(&mut self, error: Option<String>) -> bool {
        if self.phase != ScanPhase::Scanning {
            warn!(phase = %self.phase, "dropping scan-complete outside an active scan");
            return false;
        }
        if let Some(err) = &error {
            warn!(error = %err, "rule engine reported a scan failure");
        }
        self.scan_error = error;
        self.phase = ScanPhase::Draining;
        debug!(outstanding = self.pending.len(), "scan draining");
        self.try_finish()
    }

    /// Feed one statistics reply.
    ///
    /// Replies from a previous generation and replies with no outstanding
    /// request are dropped. Returns `true` when the whole operation finished
    /// right now.
    pub fn handle_stats_reply(&mut self, reply: StatsReply) -> bool {
        if reply.generation != self.generation {
            debug!(
                file = %reply.stats.filename,
                reply_generation = %reply.generation,
                current_generation = %self.generation,
                "dropping stale statistics reply"
            );
            return false;
        }
        if !self.pending.remove(&reply.stats.filename) {
            warn!(
                file = %reply.stats.filename,
                "dropping statistics reply with no outstanding request"
            );
            return false;
        }

        debug!(
            file = %reply.stats.filename,
            outstanding = self.pending.len(),
            "file statistics arrived"
        );
        self.stats_cache
            .insert(reply.stats.filename.clone(), reply.stats.clone());
        self.emit(UiEvent::FileStats(reply.stats));
        self.try_finish()
    }

    /// Request cancellation of the in-flight operation.
    ///
    /// Best effort: both engines are asked to stop, but the operation ends
    /// through the normal completion path once their remaining events arrive.
    /// No-op when idle.
    pub fn abort(&mut self) {
        if self.phase == ScanPhase::Idle {
            debug!("abort ignored: no operation in flight");
            return;
        }
        info!(generation = %self.generation, "cancellation requested");
        self.aborted = true;
        self.rules.abort_scan();
        self.stats.abort();
    }

    /// Set the compile-busy flag. Emits the gate change to the presentation
    /// layer when the value actually flips.
    pub fn set_compile_busy(&mut self, busy: bool) {
        if self.compile_busy == busy {
            return;
        }
        self.compile_busy = busy;
        self.emit(UiEvent::CompileBusy(busy));
    }

    fn try_finish(&mut self) -> bool {
        if self.phase == ScanPhase::Scanning || !self.pending.is_empty() {
            return false;
        }
        self.phase = ScanPhase::Idle;
        let outcome = ScanOutcome {
            aborted: self.aborted,
            error: self.scan_error.take(),
        };
        info!(
            generation = %self.generation,
            aborted = outcome.aborted,
            clean = outcome.is_clean(),
            "scan complete"
        );
        self.emit(UiEvent::ScanEnd(outcome));
        true
    }

    fn emit(&self, event: UiEvent) {
        if self.ui.send(event).is_err() {
            warn!("presentation channel closed; dropping event");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
