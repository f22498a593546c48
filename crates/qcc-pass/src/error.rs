//! Errors for the options facility, pass-tree framework, and pass manager
//! (§7's "Pass management" and "External" kinds).

use thiserror::Error;

/// Errors that can occur while configuring options, building a pass tree,
/// or running the manager.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PassError {
    /// `Factory` has no registered constructor for this dotted type name.
    #[error("unknown pass type '{0}'")]
    UnknownPassType(String),

    /// Two sibling passes share an instance name, or a name collides with
    /// an existing path component tree-wide.
    #[error("duplicate instance name '{0}'")]
    DuplicateInstanceName(String),

    /// A wildcard path matched no passes and `must_exist` was set.
    #[error("wildcard path '{path}' matched no passes")]
    WildcardNoMatch {
        /// The path that failed to match.
        path: String,
    },

    /// An attempt was made to mutate options or sub-passes after
    /// `construct()` has run.
    #[error("cannot mutate '{0}' after construct()")]
    MutationAfterConstruct(String),

    /// `Options::get`/`set` referenced a name not present in the set.
    #[error("unknown option '{0}'")]
    UnknownOption(String),

    /// A numeric option's value (or synonym) fell outside its configured
    /// `[min, max]` range.
    #[error("value '{value}' for option '{name}' is out of range")]
    OutOfRange {
        /// The option's name.
        name: String,
        /// The rejected value, as given.
        value: String,
    },

    /// A string value could not be parsed into the option's kind, or an
    /// enum value was not in its allowed set.
    #[error("invalid value '{value}' for option '{name}'")]
    InvalidOptionValue {
        /// The option's name.
        name: String,
        /// The rejected value, as given.
        value: String,
    },

    /// An error re-raised with the failing pass's dotted path prefixed onto
    /// the message chain (§7's propagation policy).
    #[error("{path}: {source}")]
    PathPrefixed {
        /// The dotted path of the pass that caught and re-raised the error.
        path: String,
        /// The underlying error.
        #[source]
        source: Box<PassError>,
    },

    /// Filesystem error writing a debug artifact.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Propagated error from the IR crate.
    #[error(transparent)]
    Ir(#[from] qcc_ir::IrError),

    /// Propagated error from the scheduling crate (including
    /// `SchedError::ResourceDeadlock`, which the manager catches
    /// specifically — see `Manager::compile`).
    #[error(transparent)]
    Sched(#[from] qcc_sched::SchedError),

    /// Propagated error from the initial-placement crate.
    #[error(transparent)]
    Place(#[from] qcc_place::PlaceError),
}

impl PassError {
    /// Wrap `self` with a pass's dotted path, per §7's propagation policy:
    /// every pass prefixes its own path onto a propagated error before
    /// re-raising it.
    pub fn with_path(self, path: impl Into<String>) -> Self {
        PassError::PathPrefixed {
            path: path.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error (or the one it wraps) is a resource deadlock —
    /// the one `SchedError` variant the manager handles specially.
    pub fn is_resource_deadlock(&self) -> bool {
        match self {
            PassError::Sched(qcc_sched::SchedError::ResourceDeadlock { .. }) => true,
            PassError::PathPrefixed { source, .. } => source.is_resource_deadlock(),
            _ => false,
        }
    }
}

/// Result type for pass-tree and manager operations.
pub type PassResult<T> = Result<T, PassError>;
