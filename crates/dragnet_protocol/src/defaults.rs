//! Canonical default values shared by embedders and tests.

/// Capacity of the bounded channels carrying engine events inward.
pub const DEFAULT_ENGINE_EVENT_CAPACITY: usize = 256;

/// Capacity of the bounded channel carrying presentation commands inward.
pub const DEFAULT_COMMAND_CAPACITY: usize = 64;
