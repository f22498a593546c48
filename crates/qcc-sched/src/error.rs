//! Errors for the scheduling crate (§7's "Scheduling" and "Analysis" kinds).

use thiserror::Error;

/// Errors that can occur while building a DDG or running the list
/// scheduler.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SchedError {
    /// No statement could be scheduled for more than `max_blocked_cycles`
    /// consecutive cycle advances; the resource state is dumped for
    /// diagnosis.
    #[error("resource deadlock after {blocked_cycles} blocked cycles: {resource_dump}")]
    ResourceDeadlock {
        /// How many consecutive cycle advances produced no progress.
        blocked_cycles: u32,
        /// A human-readable dump of the resource state at the time of
        /// failure.
        resource_dump: String,
    },

    /// The constructed DDG contains a cycle; this indicates a builder bug,
    /// not a user error.
    #[error("cyclic DDG detected: {0}")]
    CyclicDdg(String),

    /// A DDG was passed to a routine expecting a different direction or
    /// in an otherwise inconsistent state.
    #[error("inconsistent DDG: {0}")]
    InconsistentDdg(String),

    /// Propagated error from the IR crate (e.g. an `InvalidDag` violation
    /// surfaced while resolving an instruction type during scheduling).
    #[error(transparent)]
    Ir(#[from] qcc_ir::IrError),
}

/// Result type for scheduling operations.
pub type SchedResult<T> = Result<T, SchedError>;
