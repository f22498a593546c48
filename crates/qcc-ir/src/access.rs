//! Access-mode analysis (§4.4): per-statement reference-key to aggregated
//! access-mode maps, and the commutation predicate the DDG builder relies
//! on.

use rustc_hash::FxHashMap;

use crate::arena::Link;
use crate::datatype::PhysicalObject;
use crate::expr::{Expr, IndexExpr};
use crate::instruction_type::{AccessMode, InstructionType};
use crate::platform::Platform;
use crate::statement::{IfBranch, Statement, SubBlock};

/// A reference key: the object, the known-literal index prefix accumulated
/// so far, and whether this addresses the implicit bit register.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferenceKey {
    /// The referenced physical object.
    pub object: Link<PhysicalObject>,
    /// Known literal indices, in dimension order. A dynamic index ends the
    /// known-index prefix (later dimensions are not distinguished).
    pub known_indices: Vec<u32>,
    /// Whether this addresses the implicit bit register.
    pub implicit_bit: bool,
}

impl ReferenceKey {
    fn from_reference(target: Link<PhysicalObject>, indices: &[IndexExpr], implicit_bit: bool) -> Self {
        let mut known_indices = Vec::new();
        for idx in indices {
            match idx {
                IndexExpr::Literal(v) => known_indices.push(*v),
                IndexExpr::Dynamic(_) => break,
            }
        }
        Self {
            object: target,
            known_indices,
            implicit_bit,
        }
    }
}

/// Commutation-policy flags controlling §4.4's mode downgrades.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommutationPolicy {
    /// Downgrade `CommuteX` to `Write` before insertion.
    pub disable_single_qubit_commutation: bool,
    /// Downgrade `CommuteY`/`CommuteZ` to `Write` before insertion.
    pub disable_multi_qubit_commutation: bool,
}

impl CommutationPolicy {
    fn apply(self, mode: AccessMode) -> AccessMode {
        match mode {
            AccessMode::CommuteX if self.disable_single_qubit_commutation => AccessMode::Write,
            AccessMode::CommuteY | AccessMode::CommuteZ if self.disable_multi_qubit_commutation => {
                AccessMode::Write
            }
            other => other,
        }
    }
}

/// The aggregated access-mode map produced by [`ObjectAccesses::add_statement`].
#[derive(Debug, Clone, Default)]
pub struct ObjectAccesses {
    modes: FxHashMap<ReferenceKey, AccessMode>,
}

impl ObjectAccesses {
    /// An empty access map.
    pub fn new() -> Self {
        Self::default()
    }

    /// The aggregated access map, in no particular order.
    pub fn entries(&self) -> impl Iterator<Item = (&ReferenceKey, &AccessMode)> {
        self.modes.iter()
    }

    /// The mode recorded for `key`, if any.
    pub fn mode_of(&self, key: &ReferenceKey) -> Option<AccessMode> {
        self.modes.get(key).copied()
    }

    /// Record (or merge) a single access.
    ///
    /// `Literal` is upgraded to `Read`. A second access to an
    /// already-present key with a different mode combines to `Write` (§4.4).
    fn record(&mut self, key: ReferenceKey, mode: AccessMode, policy: CommutationPolicy) {
        let mode = policy.apply(mode);
        let mode = if matches!(mode, AccessMode::Literal) {
            AccessMode::Read
        } else {
            mode
        };
        match self.modes.get(&key).copied() {
            None => {
                self.modes.insert(key, mode);
            }
            Some(existing) if existing == mode => {}
            Some(_existing) => {
                self.modes.insert(key, AccessMode::Write);
            }
        }
    }

    /// Walk `statement` and record every object access it makes, recursing
    /// into structured control flow (§4.4).
    pub fn add_statement(
        &mut self,
        platform: &Platform,
        statement: &Statement,
        policy: CommutationPolicy,
    ) {
        match statement {
            Statement::CustomInstruction {
                instruction_type,
                operands,
                condition,
                ..
            } => {
                self.classify_instruction_operands(platform, *instruction_type, operands, policy);
                if let Some(cond) = condition {
                    self.classify_expr(platform, cond, AccessMode::Read, policy);
                }
            }
            Statement::SetInstruction {
                lhs,
                rhs,
                condition,
                ..
            } => {
                self.classify_expr(platform, lhs, AccessMode::Write, policy);
                self.classify_expr(platform, rhs, AccessMode::Read, policy);
                if let Some(cond) = condition {
                    self.classify_expr(platform, cond, AccessMode::Read, policy);
                }
            }
            Statement::WaitInstruction { objects, .. } => {
                for obj in objects {
                    self.classify_expr(platform, obj, AccessMode::Read, policy);
                }
            }
            Statement::GotoInstruction { .. } | Statement::LoopControl { .. } | Statement::DummyInstruction { .. } => {}
            Statement::IfElse { branches, otherwise } => {
                for IfBranch { condition, body } in branches {
                    self.classify_expr(platform, condition, AccessMode::Read, policy);
                    self.add_subblock(platform, body, policy);
                }
                if let Some(body) = otherwise {
                    self.add_subblock(platform, body, policy);
                }
            }
            Statement::StaticLoop { lhs, body, .. } => {
                self.classify_expr(platform, lhs, AccessMode::Write, policy);
                self.add_subblock(platform, body, policy);
            }
            Statement::ForLoop {
                init,
                condition,
                update,
                body,
            } => {
                self.add_statement(platform, init, policy);
                self.classify_expr(platform, condition, AccessMode::Read, policy);
                self.add_statement(platform, update, policy);
                self.add_subblock(platform, body, policy);
            }
            Statement::RepeatUntilLoop { body, condition } => {
                self.add_subblock(platform, body, policy);
                self.classify_expr(platform, condition, AccessMode::Read, policy);
            }
        }
    }

    fn add_subblock(&mut self, platform: &Platform, body: &SubBlock, policy: CommutationPolicy) {
        for stmt in &body.statements {
            self.add_statement(platform, stmt, policy);
        }
    }

    fn classify_instruction_operands(
        &mut self,
        platform: &Platform,
        instruction_type: Link<InstructionType>,
        operands: &[Expr],
        policy: CommutationPolicy,
    ) {
        let node = platform.instruction_type(instruction_type);
        let (_, template_prefix) = platform.generalize_instruction(instruction_type);
        let depth = template_prefix.len();
        for (i, operand) in operands.iter().enumerate() {
            let mode = if i < depth {
                AccessMode::Literal
            } else {
                node.operand_types
                    .get(i - depth)
                    .map(|ot| ot.mode)
                    .unwrap_or(AccessMode::Write)
            };
            self.classify_with_measure(platform, operand, mode, policy);
        }
    }

    /// Classify `expr` per `mode`, decomposing `Measure` into qubit-`Write`
    /// plus implicit-bit-`Write` (§4.4).
    fn classify_with_measure(&mut self, platform: &Platform, expr: &Expr, mode: AccessMode, policy: CommutationPolicy) {
        if mode == AccessMode::Measure {
            if let Expr::Reference { target, indices, .. } = expr {
                let qubit_key = ReferenceKey::from_reference(*target, indices, false);
                self.record(qubit_key, AccessMode::Write, policy);
                let bit_key = ReferenceKey::from_reference(*target, indices, true);
                self.record(bit_key, AccessMode::Write, policy);
            }
            return;
        }
        self.classify_expr(platform, expr, mode, policy);
    }

    fn classify_expr(&mut self, platform: &Platform, expr: &Expr, mode: AccessMode, policy: CommutationPolicy) {
        match expr {
            Expr::Reference {
                target,
                indices,
                implicit_bit,
            } => {
                let key = ReferenceKey::from_reference(*target, indices, *implicit_bit);
                self.record(key, mode, policy);
                for idx in indices {
                    if let IndexExpr::Dynamic(inner) = idx {
                        self.classify_expr(platform, inner, AccessMode::Read, policy);
                    }
                }
            }
            Expr::TypeCast { inner, .. } => self.classify_expr(platform, inner, mode, policy),
            // The function type's own operand modes drive per-operand
            // classification (§4.4), not a blanket `Read`.
            Expr::FunctionCall { function, operands } => {
                self.classify_function_call(platform, *function, operands, policy);
            }
            Expr::Literal { .. } => {}
            // An uninstantiated rule parameter has no object to record an
            // access against; the rule's expansion is only ever scheduled
            // after substitution replaces it with a real reference.
            Expr::Parameter(_) => {}
        }
    }

    /// Classify a function call's operands using the callee's declared
    /// per-operand access modes (§4.4: "the function type's operand modes
    /// drive per-operand access classification"). Called from
    /// [`Self::classify_expr`]'s `FunctionCall` arm.
    pub fn classify_function_call(
        &mut self,
        platform: &Platform,
        function: Link<crate::instruction_type::FunctionType>,
        operands: &[Expr],
        policy: CommutationPolicy,
    ) {
        let func = platform.function_value(function);
        for (operand, operand_type) in operands.iter().zip(func.operand_types.iter()) {
            self.classify_with_measure(platform, operand, operand_type.mode, policy);
        }
    }
}

/// Two accesses commute iff their modes are equal and belong to
/// `{Read, CommuteX, CommuteY, CommuteZ, Literal, Ignore}` (§4.4).
pub fn commutes(a: AccessMode, b: AccessMode) -> bool {
    a == b && a.commutes_with_self()
}
