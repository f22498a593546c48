//! Error types for the IR crate.
//!
//! Follows the propagation policy of §7: configuration errors are fatal for
//! the whole compile, IR-construction errors are expected failures callers
//! can recover from, and `InvalidDag` is reserved for internal-consistency
//! violations that should never occur if the builders are used correctly.

use thiserror::Error;

/// Errors that can occur in IR construction and configuration loading.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IrError {
    /// A name is not a valid identifier.
    #[error("invalid identifier: '{0}'")]
    InvalidName(String),

    /// A name already exists in a registry that requires uniqueness.
    #[error("duplicate name '{name}' in {registry} registry")]
    Duplicate {
        /// The registry the duplicate was attempted in.
        registry: &'static str,
        /// The duplicate name.
        name: String,
    },

    /// No instruction type matches the requested name and operand types.
    #[error("no instruction type named '{name}' matches operand types {operand_types:?}")]
    NoSuchInstruction {
        /// The requested name.
        name: String,
        /// The requested operand types, formatted for diagnostics.
        operand_types: Vec<String>,
    },

    /// Operand types did not match an instruction type's prototype.
    #[error("operand type mismatch for '{name}': expected {expected:?}, got {got:?}")]
    OperandTypeMismatch {
        /// Instruction name.
        name: String,
        /// Expected operand types.
        expected: Vec<String>,
        /// Actual operand types.
        got: Vec<String>,
    },

    /// A condition expression was not a valid classical bit condition.
    #[error("invalid condition: {0}")]
    InvalidCondition(String),

    /// An operand was invalid for its position (e.g. non-assignable LHS).
    #[error("invalid operand: {0}")]
    InvalidOperand(String),

    /// An index expression was out of range for its referenced object.
    #[error("index out of range: {0}")]
    IndexOutOfRange(String),

    /// Malformed or incomplete platform configuration JSON.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Referenced an unknown device architecture namespace.
    #[error("unknown architecture: '{0}'")]
    UnknownArchitecture(String),

    /// Access-mode analysis found an inconsistency it could not resolve.
    #[error("access-mode inconsistency: {0}")]
    AccessInconsistency(String),

    /// Internal consistency violation: should never happen given correct
    /// use of the builders. Kept as a typed error rather than a panic so
    /// callers (e.g. the pass manager) can report it uniformly.
    #[error("invalid IR structure: {0}")]
    InvalidDag(String),
}

/// Result type for IR operations.
pub type IrResult<T> = Result<T, IrError>;

/// Validate that `name` is a non-empty identifier: starts with an
/// alphabetic character or underscore, followed by alphanumerics or
/// underscores.
pub fn validate_identifier(name: &str) -> IrResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {
            chars.all(|c| c.is_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(IrError::InvalidName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers() {
        assert!(validate_identifier("q0").is_ok());
        assert!(validate_identifier("_tmp").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("0q").is_err());
        assert!(validate_identifier("a b").is_err());
    }
}
