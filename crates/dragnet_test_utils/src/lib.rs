//! Dragnet test utilities
//!
//! Engine doubles and channel helpers for exercising the coordinator without
//! a real rule or statistics engine. The doubles record every command call;
//! the test drives the event side by sending on the channels it wired in.
//!
//! # Usage
//!
//! ```rust,ignore
//! use dragnet_test_utils::{recv_until, RecordingRuleEngine, RecordingStatsEngine};
//!
//! #[tokio::test]
//! async fn test_scan_round_trip() {
//!     let rules = Arc::new(RecordingRuleEngine::new());
//!     let stats = Arc::new(RecordingStatsEngine::new());
//!     let coordinator = Coordinator::new(rules.clone(), stats, cmd_rx, rule_rx, stats_rx, ui_tx);
//!     let handle = tokio::spawn(coordinator.run());
//!
//!     cmd_tx.send(UiCommand::ChangeRuleset(RulesetSelection::All)).await.unwrap();
//!     let events = recv_until(&mut ui_rx, |e| matches!(e, UiEvent::ScanBegin)).await;
//!     // ...
//! }
//! ```

pub mod engines;
pub mod events;
pub mod logging;

// Re-exports for convenience
pub use engines::{AnsweringStatsEngine, RecordingRuleEngine, RecordingStatsEngine};
pub use events::{drain_now, recv_event, recv_until, EVENT_TIMEOUT};
pub use logging::init_tracing;
