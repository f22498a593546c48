//! Ambient logging setup: an `EnvFilter`-based subscriber init helper.
//!
//! The compiler core itself only ever emits `tracing` events (the scheduler,
//! the DDG builder, and the pass manager are all instrumented); wiring up a
//! subscriber is left to the embedding application, except for this one
//! convenience entry point for binaries and tests that just want sane
//! defaults.

use tracing_subscriber::EnvFilter;

/// Install a global `tracing` subscriber that honors `RUST_LOG`, falling
/// back to `info` for this crate's targets when the variable is unset.
///
/// Returns an error if a global subscriber is already installed (calling
/// this more than once in one process, for instance).
pub fn init_tracing() -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).try_init()
}
