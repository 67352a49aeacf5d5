//! Engine doubles.
//!
//! Recording doubles capture every call so tests can assert on engine
//! traffic; the test itself plays the engine's event side by sending on the
//! channels it wired into the coordinator. [`AnsweringStatsEngine`]
//! additionally replies to each request immediately, for end-to-end flows
//! that do not care about reply interleaving.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::warn;

use dragnet::{RuleEngine, StatsEngine};
use dragnet_protocol::{
    FileStats, RulesetSelection, RulesetView, StatsReply, StatsRequest, Target,
};

/// A rule engine that records calls and serves a programmable rule list.
#[derive(Default)]
pub struct RecordingRuleEngine {
    rules: Mutex<Vec<RulesetView>>,
    scans: Mutex<Vec<(Vec<Target>, RulesetSelection)>>,
    compiles: Mutex<Vec<RulesetView>>,
    updates: Mutex<Vec<Vec<RulesetView>>>,
    aborts: AtomicUsize,
}

impl RecordingRuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a known rule list, as an engine would after loading its
    /// configured sources.
    pub fn with_rules(rules: Vec<RulesetView>) -> Self {
        let engine = Self::default();
        *engine.rules.lock().unwrap() = rules;
        engine
    }

    /// Replace the rule list the double serves. The test decides when the
    /// matching rules-updated event goes out.
    pub fn set_rules(&self, rules: Vec<RulesetView>) {
        *self.rules.lock().unwrap() = rules;
    }

    pub fn scan_calls(&self) -> Vec<(Vec<Target>, RulesetSelection)> {
        self.scans.lock().unwrap().clone()
    }

    pub fn compile_calls(&self) -> Vec<RulesetView> {
        self.compiles.lock().unwrap().clone()
    }

    pub fn update_calls(&self) -> Vec<Vec<RulesetView>> {
        self.updates.lock().unwrap().clone()
    }

    pub fn abort_count(&self) -> usize {
        self.aborts.load(Ordering::SeqCst)
    }
}

impl RuleEngine for RecordingRuleEngine {
    fn scan(&self, targets: Vec<Target>, selection: RulesetSelection) {
        self.scans.lock().unwrap().push((targets, selection));
    }

    fn abort_scan(&self) {
        self.aborts.fetch_add(1, Ordering::SeqCst);
    }

    fn compile(&self, view: RulesetView) {
        self.compiles.lock().unwrap().push(view);
    }

    fn rules(&self) -> Vec<RulesetView> {
        self.rules.lock().unwrap().clone()
    }

    fn update_rules(&self, rules: Vec<RulesetView>) {
        self.updates.lock().unwrap().push(rules.clone());
        *self.rules.lock().unwrap() = rules;
    }
}

/// A statistics engine that records calls and never answers by itself.
#[derive(Default)]
pub struct RecordingStatsEngine {
    requests: Mutex<Vec<StatsRequest>>,
    resets: AtomicUsize,
    aborts: AtomicUsize,
}

impl RecordingStatsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<StatsRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn reset_count(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    pub fn abort_count(&self) -> usize {
        self.aborts.load(Ordering::SeqCst)
    }
}

impl StatsEngine for RecordingStatsEngine {
    fn request(&self, request: StatsRequest) {
        self.requests.lock().unwrap().push(request);
    }

    fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }

    fn abort(&self) {
        self.aborts.fetch_add(1, Ordering::SeqCst);
    }
}

/// A statistics engine that answers every request on the spot.
///
/// Replies go out on the channel the test wired into the coordinator,
/// echoing each request's generation.
pub struct AnsweringStatsEngine {
    reply_tx: mpsc::Sender<StatsReply>,
    size_bytes: u64,
    requests: Mutex<Vec<StatsRequest>>,
}

impl AnsweringStatsEngine {
    pub fn new(reply_tx: mpsc::Sender<StatsReply>) -> Self {
        Self {
            reply_tx,
            size_bytes: 4096,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Size reported in every reply.
    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = size_bytes;
        self
    }

    pub fn requests(&self) -> Vec<StatsRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl StatsEngine for AnsweringStatsEngine {
    fn request(&self, request: StatsRequest) {
        let reply = StatsReply {
            generation: request.generation,
            stats: FileStats::new(request.filename.clone(), self.size_bytes),
        };
        self.requests.lock().unwrap().push(request);
        if self.reply_tx.try_send(reply).is_err() {
            warn!("reply channel full or closed; dropping statistics reply");
        }
    }

    fn reset(&self) {}

    fn abort(&self) {}
}
