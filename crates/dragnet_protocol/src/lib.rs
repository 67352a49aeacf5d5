//! Shared protocol types for the Dragnet orchestration core.
//!
//! This crate holds the leaf data model (targets, ruleset views, scan
//! results, file statistics) and the event/command vocabulary exchanged
//! between the engines, the orchestration core, and the presentation layer.
//! It is pure data: serde-serializable values with no runtime dependencies,
//! so engine implementations and frontends can depend on it without pulling
//! in the orchestration machinery.

pub mod defaults;
pub mod events;
pub mod types;

// Re-export the vocabulary for convenience
pub use events::{RuleEngineEvent, UiCommand, UiEvent};
pub use types::{
    FileStats, ProtocolError, RulesetSelection, RulesetView, ScanGeneration, ScanOutcome,
    ScanResult, ScannerRule, SessionId, StatsReply, StatsRequest, Target,
};
