//! Instruction types: operand-mode prototypes, specialization tree, and
//! decomposition rules (§3.4, §3.5).

use serde::{Deserialize, Serialize};

use crate::arena::Link;
use crate::datatype::DataType;
use crate::expr::Expr;
use crate::statement::Statement;

/// How an operand is accessed by an instruction (§3.4).
///
/// Two accesses commute iff their modes are equal and belong to
/// `{Read, CommuteX, CommuteY, CommuteZ, Literal, Ignore}` (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessMode {
    /// Not commuting with any other access.
    Write,
    /// Classical read.
    Read,
    /// Compile-time known (e.g. a template operand).
    Literal,
    /// Qubit usage commuting with the same mode about the X axis.
    CommuteX,
    /// Qubit usage commuting with the same mode about the Y axis.
    CommuteY,
    /// Qubit usage commuting with the same mode about the Z axis.
    CommuteZ,
    /// Combined qubit-write plus implicit-bit-write.
    Measure,
    /// Not tracked by dependency analysis.
    Ignore,
}

impl AccessMode {
    /// Whether two accesses of this mode commute with each other.
    pub fn commutes_with_self(self) -> bool {
        matches!(
            self,
            AccessMode::Read
                | AccessMode::CommuteX
                | AccessMode::CommuteY
                | AccessMode::CommuteZ
                | AccessMode::Literal
                | AccessMode::Ignore
        )
    }
}

/// One operand slot in an instruction type's prototype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperandType {
    /// How the operand is accessed.
    pub mode: AccessMode,
    /// The operand's data type.
    pub data_type: DataType,
}

impl OperandType {
    /// Create a new operand-type prototype entry.
    pub fn new(mode: AccessMode, data_type: DataType) -> Self {
        Self { mode, data_type }
    }
}

/// A decomposition rule attached to an instruction type (§3.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecompositionRule {
    /// Name of the rule.
    pub name: String,
    /// Abstract parameter objects standing in for the to-be-decomposed
    /// instruction's operands.
    pub parameters: Vec<String>,
    /// The statements the decomposed instruction expands to. Operands
    /// reference either a parameter name or a concrete template operand.
    pub expansion: Vec<Statement>,
}

impl DecompositionRule {
    /// Total duration of the expansion, used to validate decomposition
    /// consistency (S6: the composite duration equals the sum of the
    /// expansion's instruction durations).
    pub fn expansion_len(&self) -> usize {
        self.expansion.len()
    }
}

/// An instruction type: name, operand prototype, duration, and links into
/// the specialization tree (§3.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructionType {
    /// Internal-namespace name.
    pub name: String,
    /// External (cQASM/textual) name.
    pub external_name: String,
    /// Ordered operand-type prototype.
    pub operand_types: Vec<OperandType>,
    /// Duration in cycles. Zero is allowed for classical instructions.
    pub duration_cycles: u32,
    /// Template operands, if this is a specialization. `None` for the most
    /// general form.
    pub template_operands: Option<Vec<Expr>>,
    /// Back-edge to the generalization (one fewer template operand). Not
    /// owning: the arena owns the referenced node; this is pure navigation.
    pub generalization: Option<Link<InstructionType>>,
    /// Owning-by-index links to child specializations (one more template
    /// operand pinned than this node).
    pub specializations: Vec<Link<InstructionType>>,
    /// Decomposition rules attached to this instruction type.
    pub decompositions: Vec<DecompositionRule>,
}

impl InstructionType {
    /// Create a new, most-general instruction type (no generalization, no
    /// template operands, no specializations yet).
    pub fn new(
        name: impl Into<String>,
        external_name: impl Into<String>,
        operand_types: Vec<OperandType>,
        duration_cycles: u32,
    ) -> Self {
        Self {
            name: name.into(),
            external_name: external_name.into(),
            operand_types,
            duration_cycles,
            template_operands: None,
            generalization: None,
            specializations: Vec::new(),
            decompositions: Vec::new(),
        }
    }

    /// Number of template operands pinned (0 for the most general form).
    pub fn specialization_depth(&self) -> usize {
        self.template_operands.as_ref().map_or(0, Vec::len)
    }

    /// Total operand arity, counting template operands already pinned plus
    /// the remaining free operand slots.
    pub fn total_arity(&self) -> usize {
        self.specialization_depth() + self.operand_types.len()
    }
}

/// A function type: pure, total, typed (§3.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionType {
    /// Function name.
    pub name: String,
    /// Operand prototype, driving per-operand access classification for
    /// function calls (§4.4).
    pub operand_types: Vec<OperandType>,
    /// Return type.
    pub return_type: DataType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commutation_classes() {
        assert!(AccessMode::Read.commutes_with_self());
        assert!(AccessMode::CommuteZ.commutes_with_self());
        assert!(!AccessMode::Write.commutes_with_self());
        assert!(!AccessMode::Measure.commutes_with_self());
    }

    #[test]
    fn specialization_depth() {
        let mut it = InstructionType::new(
            "rz",
            "rz",
            vec![OperandType::new(AccessMode::CommuteZ, DataType::Qubit)],
            20,
        );
        assert_eq!(it.specialization_depth(), 0);
        it.template_operands = Some(vec![]);
        assert_eq!(it.specialization_depth(), 0);
    }
}
