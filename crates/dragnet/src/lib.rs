//! Dragnet orchestration core
//!
//! Coordinates a rule engine and a statistics engine behind a single-task
//! event loop. A scan fans out one statistics request per finished target and
//! is complete only when the rule engine is done and every reply has been
//! drained back in; compiles and scans are mutually exclusive; compile
//! sessions track their ruleset across recompiles until explicitly closed.
//!
//! Wiring happens at construction: each collaborator gets exactly one channel
//! endpoint, and [`Coordinator::run`] serializes everything that arrives.
//!
//! ```rust,ignore
//! let (cmd_tx, cmd_rx) = mpsc::channel(defaults::DEFAULT_COMMAND_CAPACITY);
//! let (rule_tx, rule_rx) = mpsc::channel(defaults::DEFAULT_ENGINE_EVENT_CAPACITY);
//! let (stats_tx, stats_rx) = mpsc::channel(defaults::DEFAULT_ENGINE_EVENT_CAPACITY);
//! let (ui_tx, ui_rx) = mpsc::unbounded_channel();
//!
//! let rules = Arc::new(YaraEngine::spawn(rule_tx)?);
//! let stats = Arc::new(HashingStats::spawn(stats_tx)?);
//!
//! let coordinator = Coordinator::new(rules, stats, cmd_rx, rule_rx, stats_rx, ui_tx);
//! tokio::spawn(coordinator.run());
//! ```

pub mod coordinator;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod session;

pub use coordinator::Coordinator;
pub use engine::{EngineKind, RuleEngine, StatsEngine};
pub use error::{CoordinatorError, Result};
pub use orchestrator::{ScanOrchestrator, ScanPhase};
pub use session::{CompileSession, SessionRegistry};
