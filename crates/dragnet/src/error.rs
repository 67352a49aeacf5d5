//! Coordinator error types.
//!
//! Scan and compile failures reported by the engines are not errors at this
//! level; they travel as event payloads and end in a completed-with-error
//! outcome. Only faults that leave the coordinator unable to continue are
//! modeled here.

use thiserror::Error;

use crate::engine::EngineKind;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// An engine dropped its event channel while the coordinator still
    /// expected events from it.
    #[error("{0} disconnected with an operation in flight")]
    EngineDisconnected(EngineKind),
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;
