//! Errors for the initial-placement solver (§7).

use thiserror::Error;

/// Errors the MIP solver can raise. Both variants leave the input mapping
/// untouched — the caller falls back to whatever mapping it already had.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlaceError {
    /// The solver ran to completion but reported no feasible assignment.
    #[error("initial placement MIP is infeasible")]
    Infeasible,

    /// The solver did not finish within the configured wall-clock budget.
    #[error("initial placement solve timed out")]
    TimedOut,
}

/// Result type for placement operations.
pub type PlaceResult<T> = Result<T, PlaceError>;
