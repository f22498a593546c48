//! Statements, sub-blocks, and blocks (§3.6).

use serde::{Deserialize, Serialize};

use crate::arena::Link;
use crate::expr::Expr;
use crate::instruction_type::InstructionType;

/// Either `Break` or `Continue` (for [`Statement::LoopControl`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopControlKind {
    /// Break out of the enclosing loop.
    Break,
    /// Continue to the next iteration of the enclosing loop.
    Continue,
}

/// One conditional branch of an [`Statement::IfElse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IfBranch {
    /// The branch condition.
    pub condition: Expr,
    /// The branch body.
    pub body: SubBlock,
}

/// A statement in the IR (§3.6).
///
/// Variant tags and the `cycle` fields are renamed to short keys (§6.5):
/// the node-kind tag and the per-statement cycle number are the
/// highest-frequency fields in a serialized program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Statement {
    /// A custom (non-`set`, non-`wait`) instruction.
    #[serde(rename = "ci")]
    CustomInstruction {
        /// The instruction's (specialized) type.
        instruction_type: Link<InstructionType>,
        /// Operand expressions, matching the instruction type's prototype.
        operands: Vec<Expr>,
        /// Optional classical condition; `None` means unconditional.
        condition: Option<Expr>,
        /// Scheduled cycle, assigned by the scheduler (§3.9).
        #[serde(rename = "c")]
        cycle: i64,
    },
    /// A classical assignment `lhs = rhs`.
    #[serde(rename = "si")]
    SetInstruction {
        /// The assignable classical reference.
        lhs: Expr,
        /// The right-hand-side expression; must match `lhs`'s type.
        rhs: Expr,
        /// Optional classical condition.
        condition: Option<Expr>,
        /// Scheduled cycle.
        #[serde(rename = "c")]
        cycle: i64,
    },
    /// An unconditional jump to a named block.
    #[serde(rename = "go")]
    GotoInstruction {
        /// The jump target.
        target_block: Link<Block>,
    },
    /// Wait for a duration on a set of objects (empty = all live objects in
    /// the enclosing block; see the wait/barrier scope decision in
    /// DESIGN.md).
    #[serde(rename = "wi")]
    WaitInstruction {
        /// Duration to wait, in cycles.
        duration_cycles: u32,
        /// Objects to wait on; empty means "all objects" (full barrier).
        objects: Vec<Expr>,
    },
    /// Structured if/else-if/.../else control flow.
    #[serde(rename = "ie")]
    IfElse {
        /// Ordered list of `if`/`else if` branches.
        branches: Vec<IfBranch>,
        /// Optional final `else` body.
        otherwise: Option<SubBlock>,
    },
    /// A statically unrolled loop with a compile-time-known trip count.
    #[serde(rename = "sl")]
    StaticLoop {
        /// The loop variable's classical reference.
        lhs: Expr,
        /// Inclusive lower bound.
        from: i64,
        /// Inclusive upper bound.
        to: i64,
        /// Loop body.
        body: SubBlock,
    },
    /// A general C-style for loop.
    #[serde(rename = "fl")]
    ForLoop {
        /// Initialization statement, boxed to keep `Statement` from being
        /// infinitely sized.
        init: Box<Statement>,
        /// Loop condition, tested before each iteration.
        condition: Expr,
        /// Update statement, run after each iteration.
        update: Box<Statement>,
        /// Loop body.
        body: SubBlock,
    },
    /// A do/while-style loop that repeats until `condition` is false.
    #[serde(rename = "ru")]
    RepeatUntilLoop {
        /// Loop body, run before the condition is tested.
        body: SubBlock,
        /// Exit condition.
        condition: Expr,
    },
    /// `break` or `continue` inside a loop body.
    #[serde(rename = "lc")]
    LoopControl {
        /// Which control-flow kind this is.
        kind: LoopControlKind,
    },
    /// A schedule placeholder used as a DDG source/sink and nowhere else.
    #[serde(rename = "du")]
    DummyInstruction {
        /// Scheduled cycle.
        #[serde(rename = "c")]
        cycle: i64,
    },
}

impl Statement {
    /// The statement's scheduled cycle, if it carries one.
    pub fn cycle(&self) -> Option<i64> {
        match self {
            Statement::CustomInstruction { cycle, .. }
            | Statement::SetInstruction { cycle, .. }
            | Statement::DummyInstruction { cycle } => Some(*cycle),
            _ => None,
        }
    }

    /// Set the statement's scheduled cycle, if it carries one. Returns
    /// `false` if this statement kind has no cycle field.
    pub fn set_cycle(&mut self, new_cycle: i64) -> bool {
        match self {
            Statement::CustomInstruction { cycle, .. }
            | Statement::SetInstruction { cycle, .. }
            | Statement::DummyInstruction { cycle } => {
                *cycle = new_cycle;
                true
            }
            _ => false,
        }
    }

    /// A new dummy instruction at cycle 0.
    pub fn dummy() -> Self {
        Statement::DummyInstruction { cycle: 0 }
    }

    /// Whether this statement is a structured-control-flow statement that
    /// owns nested sub-blocks (used by the access-mode analyzer's recursion
    /// and by the DDG builder, which treats such statements as opaque
    /// single nodes at the enclosing level).
    pub fn is_control_flow(&self) -> bool {
        matches!(
            self,
            Statement::IfElse { .. }
                | Statement::StaticLoop { .. }
                | Statement::ForLoop { .. }
                | Statement::RepeatUntilLoop { .. }
        )
    }
}

/// The transient deep-criticality annotation (§3.9, §4.6).
///
/// A pure navigation back-edge within the same block; must be cleared
/// (`DeepCriticality::clear` in `qcc-sched`) before the block leaves the
/// current pass.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DeepCriticality {
    /// Length of the critical path starting at this statement.
    pub critical_path_length: u32,
    /// Index (within the same block) of the most critical dependent, if any.
    pub most_critical_dependent: Option<usize>,
}

/// An anonymous ordered sequence of statements, with optional DDG and
/// scheduling annotations (§3.6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubBlock {
    /// The statements, in program order.
    pub statements: Vec<Statement>,
    /// Transient deep-criticality annotations, indexed in parallel with
    /// `statements`. Empty when not currently computed.
    #[serde(default)]
    pub deep_criticality: Vec<DeepCriticality>,
}

impl SubBlock {
    /// Create an empty sub-block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a statement, returning its index.
    pub fn push(&mut self, statement: Statement) -> usize {
        self.statements.push(statement);
        self.statements.len() - 1
    }

    /// Number of statements.
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// Whether the sub-block has no statements.
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// A named [`SubBlock`] that can be a control-flow (`goto`) target (§3.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// The block's unique name within its program.
    pub name: String,
    /// The block's statements and annotations.
    pub body: SubBlock,
}

impl Block {
    /// Create a new, empty named block.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: SubBlock::new(),
        }
    }
}
