//! Core data model for the Dragnet scan pipeline.
//!
//! Leaf records exchanged between the rule engine, the statistics engine,
//! the orchestration core, and the presentation layer. Everything here is an
//! immutable value: an update is a new value, never an in-place mutation of
//! shared state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Errors
// ============================================================================

/// Validation errors for protocol values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("target path must not be empty")]
    EmptyTarget,

    #[error("ruleset file path must not be empty")]
    EmptyRulesetPath,

    #[error("invalid session id: {0}")]
    InvalidSessionId(String),
}

// ============================================================================
// Identifiers
// ============================================================================

/// Identifier of one live compile session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn parse(value: &str) -> Result<Self, ProtocolError> {
        Uuid::parse_str(value)
            .map_err(|e| ProtocolError::InvalidSessionId(format!("{value}: {e}")))?;
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Monotonic counter identifying one scan operation.
///
/// Every accepted scan start bumps the generation. Statistics requests carry
/// it and replies echo it, so a reply that outlived its scan can be told
/// apart from one belonging to the current operation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct ScanGeneration(u64);

impl ScanGeneration {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScanGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Targets
// ============================================================================

/// A file or directory path to be scanned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Target(String);

impl Target {
    /// Create a target, rejecting empty or whitespace-only paths.
    pub fn new(path: impl Into<String>) -> Result<Self, ProtocolError> {
        let path = path.into();
        if path.trim().is_empty() {
            return Err(ProtocolError::EmptyTarget);
        }
        Ok(Self(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Target {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Rulesets
// ============================================================================

/// A reference to one rule-definition source and its compiled state.
///
/// Views are immutable values keyed by their file path. A (re)compile never
/// mutates an existing view; the engine publishes a replacement with a bumped
/// `revision`, and holders swap whole values after matching identity with
/// [`RulesetView::same_source`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RulesetView {
    /// Path to the rule-definition file. Immutable identity of the view.
    file: PathBuf,
    /// Optional display name; presentation falls back to the file name.
    name: Option<String>,
    /// Whether the engine currently holds a compiled form of this source.
    compiled: bool,
    /// Compiler diagnostics from the most recent compile, when it failed.
    error: Option<String>,
    /// Bumped on every state change the engine publishes for this source.
    revision: u64,
}

impl RulesetView {
    /// Create an uncompiled view of a rule source.
    pub fn new(file: impl Into<PathBuf>) -> Result<Self, ProtocolError> {
        let file = file.into();
        if file.as_os_str().is_empty() {
            return Err(ProtocolError::EmptyRulesetPath);
        }
        Ok(Self {
            file,
            name: None,
            compiled: false,
            error: None,
            revision: 0,
        })
    }

    /// Attach a display name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name to show for this view: the display name if set, otherwise the
    /// file name component of the path.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self
                .file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.file.to_string_lossy().into_owned()),
        }
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether two views refer to the same rule source, across revisions.
    pub fn same_source(&self, other: &RulesetView) -> bool {
        self.file == other.file
    }

    /// Successor view after a successful compile.
    pub fn compiled_ok(&self) -> RulesetView {
        RulesetView {
            file: self.file.clone(),
            name: self.name.clone(),
            compiled: true,
            error: None,
            revision: self.revision + 1,
        }
    }

    /// Successor view after a failed compile. The view stays usable as a
    /// reference; only its compiled state and diagnostics change.
    pub fn compile_failed(&self, error: impl Into<String>) -> RulesetView {
        RulesetView {
            file: self.file.clone(),
            name: self.name.clone(),
            compiled: false,
            error: Some(error.into()),
            revision: self.revision + 1,
        }
    }
}

/// Which rulesets a scan runs against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum RulesetSelection {
    /// Scan with every ruleset the engine knows.
    All,
    /// Scan with a single ruleset.
    Ruleset(RulesetView),
}

impl RulesetSelection {
    pub fn view(&self) -> Option<&RulesetView> {
        match self {
            RulesetSelection::All => None,
            RulesetSelection::Ruleset(view) => Some(view),
        }
    }

    /// Short human-readable form for logs.
    pub fn describe(&self) -> String {
        match self {
            RulesetSelection::All => "all rules".to_string(),
            RulesetSelection::Ruleset(view) => view.display_name(),
        }
    }
}

/// One named rule inside a compiled ruleset.
///
/// The pairing with its owning [`RulesetView`] is carried by the enclosing
/// [`ScanResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannerRule {
    /// Rule identifier as declared in the ruleset source.
    pub identifier: String,
}

impl ScannerRule {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
        }
    }
}

// ============================================================================
// Scan results
// ============================================================================

/// A single result row from the rule engine.
///
/// A row with `rule == None` marks that `target`'s scanning has finished;
/// it is not a match. The whole operation's end is signalled separately by
/// the engine's scan-complete event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    /// The scanned target this row belongs to.
    pub target: Target,
    /// The rule that matched, or `None` for a target-finished marker.
    pub rule: Option<ScannerRule>,
    /// The ruleset the rule belongs to (the selected view for markers).
    pub view: RulesetView,
}

impl ScanResult {
    /// A row reporting that `rule` matched `target`.
    pub fn matched(target: Target, rule: ScannerRule, view: RulesetView) -> Self {
        Self {
            target,
            rule: Some(rule),
            view,
        }
    }

    /// The marker row reporting that `target`'s scanning has finished.
    pub fn target_complete(target: Target, view: RulesetView) -> Self {
        Self {
            target,
            rule: None,
            view,
        }
    }

    /// True when this row marks the end of the target's scanning.
    pub fn is_target_complete(&self) -> bool {
        self.rule.is_none()
    }
}

/// Terminal state of one scan operation, reported exactly once per scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanOutcome {
    /// True when the user requested cancellation at any point.
    pub aborted: bool,
    /// Engine-reported error for the operation as a whole, if any.
    pub error: Option<String>,
}

impl ScanOutcome {
    /// True for a scan that ran to completion without errors.
    pub fn is_clean(&self) -> bool {
        !self.aborted && self.error.is_none()
    }
}

// ============================================================================
// File statistics
// ============================================================================

/// Computed statistics for one scanned file.
///
/// Produced by the statistics engine and cached by the orchestrator until the
/// next scan begins. Keyed uniquely by `filename`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStats {
    /// Path of the file these statistics describe.
    pub filename: String,
    /// File size in bytes.
    pub size_bytes: u64,
    /// Shannon entropy of the contents in bits per byte, if computed.
    pub entropy: Option<f64>,
    /// Digest name to lowercase hex digest, e.g. `"sha256" -> "9f86d0…"`.
    pub digests: BTreeMap<String, String>,
    /// When the statistics were computed.
    pub computed_at: DateTime<Utc>,
}

impl FileStats {
    pub fn new(filename: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            filename: filename.into(),
            size_bytes,
            entropy: None,
            digests: BTreeMap::new(),
            computed_at: Utc::now(),
        }
    }

    pub fn with_entropy(mut self, entropy: f64) -> Self {
        self.entropy = Some(entropy);
        self
    }

    pub fn with_digest(mut self, name: impl Into<String>, hex: impl Into<String>) -> Self {
        self.digests.insert(name.into(), hex.into());
        self
    }
}

/// A request for file statistics, tagged with the scan generation issuing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsRequest {
    /// File to compute statistics for.
    pub filename: String,
    /// Generation of the scan this request belongs to.
    pub generation: ScanGeneration,
}

/// The statistics engine's asynchronous reply.
///
/// Echoes the generation from the request so the orchestrator can drop
/// replies that outlived their scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReply {
    /// Generation copied from the originating [`StatsRequest`].
    pub generation: ScanGeneration,
    /// The computed statistics.
    pub stats: FileStats,
}
