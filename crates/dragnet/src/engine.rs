//! Interfaces to the two engines the coordinator drives.
//!
//! Both engines run off the coordinator thread. Command methods are
//! fire-and-forget: they must return promptly, and all results come back as
//! events on the channels the engine implementation was handed at
//! construction. The coordinator never blocks on an engine.

use std::fmt;

use dragnet_protocol::{RulesetSelection, RulesetView, StatsRequest, Target};

/// The rule engine: compiles rule sources and matches them against targets.
///
/// Implementations deliver results as [`RuleEngineEvent`] values on the
/// sender they were built with: zero or more match rows per target, exactly
/// one finished marker per target, exactly one scan-complete per scan, and
/// one rules-updated after every compile or rule-list change.
///
/// [`RuleEngineEvent`]: dragnet_protocol::RuleEngineEvent
pub trait RuleEngine: Send + Sync {
    /// Start scanning `targets` with the selected ruleset(s).
    fn scan(&self, targets: Vec<Target>, selection: RulesetSelection);

    /// Request cancellation of the in-flight scan. Best effort; the engine
    /// still emits its scan-complete event.
    fn abort_scan(&self);

    /// Compile one rule source. Completion surfaces as a rules-updated
    /// event, with compiler diagnostics recorded on the refreshed view.
    fn compile(&self, view: RulesetView);

    /// Snapshot of every known ruleset, in presentation order.
    fn rules(&self) -> Vec<RulesetView>;

    /// Replace the full ordered rule list.
    fn update_rules(&self, rules: Vec<RulesetView>);
}

/// The statistics engine: computes per-file statistics in the background.
///
/// Every accepted request is answered with exactly one [`StatsReply`] on the
/// sender the implementation was built with, echoing the request's
/// generation even when the computation was aborted.
///
/// [`StatsReply`]: dragnet_protocol::StatsReply
pub trait StatsEngine: Send + Sync {
    /// Request statistics for one file.
    fn request(&self, request: StatsRequest);

    /// Discard cached and queued work ahead of a new scan.
    fn reset(&self);

    /// Request cancellation of in-flight computations. Best effort.
    fn abort(&self);
}

/// Which engine a coordinator-level failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    Rules,
    Stats,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Rules => "rule engine",
            EngineKind::Stats => "statistics engine",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
