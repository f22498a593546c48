//! Expression model (§3.6): literals, references, typecasts, and calls.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::arena::Link;
use crate::datatype::DataType;
use crate::error::{IrError, IrResult};
use crate::instruction_type::FunctionType;
use crate::platform::Platform;
use crate::statement::Statement;

/// A typed immediate value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LiteralValue {
    /// A classical bit value.
    Bit(bool),
    /// A signed or unsigned integer value (sign interpreted by the type).
    Int(i64),
    /// A real value.
    Real(f64),
    /// A complex value.
    Complex(#[serde(with = "complex_serde")] Complex64),
    /// A string-enum value.
    String(String),
    /// A flattened matrix of complex values.
    Matrix(Vec<Complex64>),
}

mod complex_serde {
    use num_complex::Complex64;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Complex64, s: S) -> Result<S::Ok, S::Error> {
        (value.re, value.im).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Complex64, D::Error> {
        let (re, im) = <(f64, f64)>::deserialize(d)?;
        Ok(Complex64::new(re, im))
    }
}

/// An index expression used inside a [`Expr::Reference`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IndexExpr {
    /// A compile-time known index.
    Literal(u32),
    /// A dynamic index given by another expression.
    Dynamic(Box<Expr>),
}

/// A tagged union of expression forms (§3.6).
///
/// Variant tags are renamed to short keys (§6.5): this is one of the
/// "hottest" node kinds in a serialized program, appearing at every operand
/// position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// A typed immediate value.
    #[serde(rename = "l")]
    Literal {
        /// The value.
        value: LiteralValue,
        /// The value's static type.
        data_type: DataType,
    },
    /// A reference to a whole object or a slice of one, by index
    /// expressions; `implicit_bit` selects the implicit bit register of a
    /// qubit reference.
    #[serde(rename = "r")]
    Reference {
        /// The referenced physical object.
        target: Link<crate::datatype::PhysicalObject>,
        /// Index expressions, one per dimension addressed.
        indices: Vec<IndexExpr>,
        /// Whether this reference addresses the implicit bit of a qubit
        /// reference rather than the qubit itself.
        implicit_bit: bool,
    },
    /// A type cast of an inner expression to a target type.
    #[serde(rename = "tc")]
    TypeCast {
        /// The expression being cast.
        inner: Box<Expr>,
        /// The target type.
        target_type: DataType,
    },
    /// A call to a pure, total, typed function.
    #[serde(rename = "fc")]
    FunctionCall {
        /// The function's type (drives operand access classification).
        function: Link<FunctionType>,
        /// Operand expressions.
        operands: Vec<Expr>,
    },
    /// A decomposition rule's abstract parameter placeholder (the `%N` of
    /// §3.5/§6.1): stands in for the `N`th operand of the instruction being
    /// decomposed until the rule is instantiated against a concrete call
    /// site.
    #[serde(rename = "p")]
    Parameter(usize),
}

impl Expr {
    /// Build a boolean literal `true`/`false` bit expression.
    pub fn bit_literal(value: bool) -> Self {
        Expr::Literal {
            value: LiteralValue::Bit(value),
            data_type: DataType::Bit,
        }
    }

    /// Build a non-negative integer literal.
    pub fn int_literal(value: i64, bits: u32, signed: bool) -> Self {
        Expr::Literal {
            value: LiteralValue::Int(value),
            data_type: DataType::Int { signed, bits },
        }
    }

    /// A literal `true` bit, used as the default condition (§4.3).
    pub fn true_condition() -> Self {
        Expr::bit_literal(true)
    }

    /// A plain (whole-object, non-implicit-bit) reference.
    pub fn reference(target: Link<crate::datatype::PhysicalObject>, indices: Vec<IndexExpr>) -> Self {
        Expr::Reference {
            target,
            indices,
            implicit_bit: false,
        }
    }

    /// A decomposition-rule parameter placeholder (`%N`).
    pub fn parameter(index: usize) -> Self {
        Expr::Parameter(index)
    }

    /// Whether this is a reference expression (used to validate assignable
    /// LHS positions, §4.3).
    pub fn is_reference(&self) -> bool {
        matches!(self, Expr::Reference { .. })
    }

    /// Whether this is a compile-time-known literal integer, and if so its
    /// value (used by `wait`'s duration operand, §4.3).
    pub fn as_literal_int(&self) -> Option<i64> {
        match self {
            Expr::Literal {
                value: LiteralValue::Int(v),
                ..
            } => Some(*v),
            _ => None,
        }
    }

    /// The expression's static type, resolved against `platform`'s object
    /// and function registries. `None` for an uninstantiated decomposition
    /// parameter, which has no type until substitution replaces it.
    pub fn data_type(&self, platform: &Platform) -> Option<DataType> {
        match self {
            Expr::Literal { data_type, .. } => Some(data_type.clone()),
            Expr::Reference { target, implicit_bit, .. } => {
                if *implicit_bit {
                    Some(DataType::Bit)
                } else {
                    Some(platform.object_value(*target).data_type.clone())
                }
            }
            Expr::TypeCast { target_type, .. } => Some(target_type.clone()),
            Expr::FunctionCall { function, .. } => Some(platform.function_value(*function).return_type.clone()),
            Expr::Parameter(_) => None,
        }
    }
}

/// Validate that every literal index of a [`Expr::Reference`] falls within
/// the referenced object's declared shape. Dynamic indices are not
/// statically checkable and are skipped.
fn validate_reference_indices(platform: &Platform, expr: &Expr) -> IrResult<()> {
    let Expr::Reference { target, indices, .. } = expr else {
        return Ok(());
    };
    let object = platform.object_value(*target);
    for (dim, index) in indices.iter().enumerate() {
        let IndexExpr::Literal(i) = index else { continue };
        match object.shape.get(dim) {
            Some(&bound) if *i < bound => {}
            _ => {
                return Err(IrError::IndexOutOfRange(format!(
                    "index {i} out of range for dimension {dim} of '{}' (shape {:?})",
                    object.name, object.shape
                )));
            }
        }
    }
    Ok(())
}

/// Resolve `condition` against the §4.3 default rule: `None` becomes the
/// literal true bit; a supplied condition must statically type as `Bit`.
fn resolve_condition(platform: &Platform, condition: Option<Expr>) -> IrResult<Option<Expr>> {
    match condition {
        None => Ok(Some(Expr::true_condition())),
        Some(expr) => match expr.data_type(platform) {
            Some(DataType::Bit) => Ok(Some(expr)),
            other => Err(IrError::InvalidCondition(format!(
                "condition must be a bit expression, got {other:?}"
            ))),
        },
    }
}

/// Build a validated [`Statement`] from a raw instruction application
/// (§4.3). Dispatches on `name`: `"set"` builds an assignment, `"wait"`/
/// `"barrier"` build the corresponding timing instruction, and any other
/// name resolves against `platform`'s instruction-type registry.
///
/// `allow_fail` only suppresses the lookup failure of a custom instruction
/// name with no matching operand-type overload, returning `Ok(None)`
/// instead of [`IrError::NoSuchInstruction`]; every other validation
/// failure, for every dispatch branch, is always an `Err`. `synthesize` is
/// forwarded to [`Platform::find_instruction_type`] for the custom-name
/// branch.
pub fn make_instruction(
    platform: &mut Platform,
    name: &str,
    operands: Vec<Expr>,
    condition: Option<Expr>,
    allow_fail: bool,
    synthesize: bool,
) -> IrResult<Option<Statement>> {
    match name {
        "set" => build_set(platform, operands, condition).map(Some),
        "wait" => build_wait(platform, operands, condition).map(Some),
        "barrier" => build_barrier(platform, operands, condition).map(Some),
        _ => build_custom(platform, name, operands, condition, allow_fail, synthesize),
    }
}

fn build_set(platform: &Platform, operands: Vec<Expr>, condition: Option<Expr>) -> IrResult<Statement> {
    let [lhs, rhs]: [Expr; 2] = operands
        .try_into()
        .map_err(|_| IrError::InvalidOperand("'set' requires exactly two operands".into()))?;
    if !lhs.is_reference() {
        return Err(IrError::InvalidOperand("'set' lhs must be an assignable reference".into()));
    }
    let lhs_type = lhs
        .data_type(platform)
        .ok_or_else(|| IrError::InvalidOperand("'set' lhs has no static type".into()))?;
    let rhs_type = rhs
        .data_type(platform)
        .ok_or_else(|| IrError::InvalidOperand("'set' rhs has no static type".into()))?;
    if lhs_type != rhs_type {
        return Err(IrError::OperandTypeMismatch {
            name: "set".to_string(),
            expected: vec![lhs_type.type_name()],
            got: vec![rhs_type.type_name()],
        });
    }
    validate_reference_indices(platform, &lhs)?;
    validate_reference_indices(platform, &rhs)?;
    let condition = resolve_condition(platform, condition)?;
    Ok(Statement::SetInstruction {
        lhs,
        rhs,
        condition,
        cycle: 0,
    })
}

fn build_wait(platform: &Platform, operands: Vec<Expr>, condition: Option<Expr>) -> IrResult<Statement> {
    if condition.is_some() {
        return Err(IrError::InvalidCondition("'wait' cannot carry a condition".into()));
    }
    let mut operands = operands.into_iter();
    let duration_expr = operands
        .next()
        .ok_or_else(|| IrError::InvalidOperand("'wait' requires a duration operand".into()))?;
    let duration = duration_expr
        .as_literal_int()
        .ok_or_else(|| IrError::InvalidOperand("'wait' duration must be an integer literal".into()))?;
    if duration < 0 {
        return Err(IrError::InvalidOperand("'wait' duration must be non-negative".into()));
    }
    let objects: Vec<Expr> = operands.collect();
    for object in &objects {
        if !object.is_reference() {
            return Err(IrError::InvalidOperand("'wait' objects must be references".into()));
        }
        validate_reference_indices(platform, object)?;
    }
    Ok(Statement::WaitInstruction {
        duration_cycles: duration as u32,
        objects,
    })
}

fn build_barrier(platform: &Platform, operands: Vec<Expr>, condition: Option<Expr>) -> IrResult<Statement> {
    if condition.is_some() {
        return Err(IrError::InvalidCondition("'barrier' cannot carry a condition".into()));
    }
    for object in &operands {
        if !object.is_reference() {
            return Err(IrError::InvalidOperand("'barrier' objects must be references".into()));
        }
        validate_reference_indices(platform, object)?;
    }
    Ok(Statement::WaitInstruction {
        duration_cycles: 0,
        objects: operands,
    })
}

fn build_custom(
    platform: &mut Platform,
    name: &str,
    operands: Vec<Expr>,
    condition: Option<Expr>,
    allow_fail: bool,
    synthesize: bool,
) -> IrResult<Option<Statement>> {
    let operand_types: Vec<DataType> = operands
        .iter()
        .map(|operand| {
            operand
                .data_type(platform)
                .ok_or_else(|| IrError::InvalidOperand(format!("operand of '{name}' has no static type")))
        })
        .collect::<IrResult<_>>()?;

    let instruction_type = match platform.find_instruction_type(name, &operand_types, synthesize) {
        Some(link) => link,
        None if allow_fail => return Ok(None),
        None => {
            return Err(IrError::NoSuchInstruction {
                name: name.to_string(),
                operand_types: operand_types.iter().map(DataType::type_name).collect(),
            });
        }
    };

    for operand in &operands {
        validate_reference_indices(platform, operand)?;
    }
    let condition = resolve_condition(platform, condition)?;
    Ok(Some(Statement::CustomInstruction {
        instruction_type,
        operands,
        condition,
        cycle: 0,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn true_condition_is_bit() {
        let t = Expr::true_condition();
        assert_eq!(
            t,
            Expr::Literal {
                value: LiteralValue::Bit(true),
                data_type: DataType::Bit
            }
        );
    }

    #[test]
    fn literal_int_extraction() {
        let lit = Expr::int_literal(5, 32, false);
        assert_eq!(lit.as_literal_int(), Some(5));
        assert_eq!(Expr::true_condition().as_literal_int(), None);
    }

    use crate::instruction_type::OperandType;
    use crate::platform::Topology;

    fn setup() -> (Platform, Link<crate::datatype::PhysicalObject>) {
        let mut p = Platform::new("t", Topology::linear(5));
        let (q, _b) = p.add_main_qubit_register("q", vec![5]).unwrap();
        p.add_instruction_type(
            "x",
            "x",
            vec![OperandType::new(crate::instruction_type::AccessMode::Write, DataType::Qubit)],
            1,
            vec![],
        )
        .unwrap();
        (p, q)
    }

    #[test]
    fn make_instruction_custom_defaults_condition_to_true() {
        let (mut p, q) = setup();
        let stmt = make_instruction(&mut p, "x", vec![Expr::reference(q, vec![IndexExpr::Literal(0)])], None, false, false)
            .unwrap()
            .unwrap();
        match stmt {
            Statement::CustomInstruction { condition, .. } => {
                assert_eq!(condition, Some(Expr::true_condition()));
            }
            _ => panic!("expected CustomInstruction"),
        }
    }

    #[test]
    fn make_instruction_custom_unknown_name_fails_without_allow_fail() {
        let (mut p, q) = setup();
        let err = make_instruction(&mut p, "y", vec![Expr::reference(q, vec![IndexExpr::Literal(0)])], None, false, false)
            .unwrap_err();
        assert!(matches!(err, IrError::NoSuchInstruction { .. }));
    }

    #[test]
    fn make_instruction_custom_unknown_name_allow_fail_returns_none() {
        let (mut p, q) = setup();
        let result = make_instruction(&mut p, "y", vec![Expr::reference(q, vec![IndexExpr::Literal(0)])], None, true, false)
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn make_instruction_custom_index_out_of_range() {
        let (mut p, q) = setup();
        let err = make_instruction(&mut p, "x", vec![Expr::reference(q, vec![IndexExpr::Literal(9)])], None, false, false)
            .unwrap_err();
        assert!(matches!(err, IrError::IndexOutOfRange(_)));
    }

    #[test]
    fn make_instruction_set_requires_matching_types() {
        let (mut p, q) = setup();
        let lhs = Expr::Reference {
            target: q,
            indices: vec![IndexExpr::Literal(0)],
            implicit_bit: true,
        };
        let rhs = Expr::int_literal(1, 32, false);
        let err = make_instruction(&mut p, "set", vec![lhs, rhs], None, false, false).unwrap_err();
        assert!(matches!(err, IrError::OperandTypeMismatch { .. }));
    }

    #[test]
    fn make_instruction_set_valid() {
        let (mut p, q) = setup();
        let lhs = Expr::Reference {
            target: q,
            indices: vec![IndexExpr::Literal(0)],
            implicit_bit: true,
        };
        let rhs = Expr::bit_literal(true);
        let stmt = make_instruction(&mut p, "set", vec![lhs, rhs], None, false, false)
            .unwrap()
            .unwrap();
        assert!(matches!(stmt, Statement::SetInstruction { .. }));
    }

    #[test]
    fn make_instruction_set_rejects_non_reference_lhs() {
        let (mut p, _q) = setup();
        let lhs = Expr::bit_literal(false);
        let rhs = Expr::bit_literal(true);
        let err = make_instruction(&mut p, "set", vec![lhs, rhs], None, false, false).unwrap_err();
        assert!(matches!(err, IrError::InvalidOperand(_)));
    }

    #[test]
    fn make_instruction_wait_splits_duration_and_objects() {
        let (mut p, q) = setup();
        let stmt = make_instruction(
            &mut p,
            "wait",
            vec![Expr::int_literal(5, 32, false), Expr::reference(q, vec![IndexExpr::Literal(0)])],
            None,
            false,
            false,
        )
        .unwrap()
        .unwrap();
        match stmt {
            Statement::WaitInstruction { duration_cycles, objects } => {
                assert_eq!(duration_cycles, 5);
                assert_eq!(objects.len(), 1);
            }
            _ => panic!("expected WaitInstruction"),
        }
    }

    #[test]
    fn make_instruction_wait_empty_objects_is_full_barrier() {
        let (mut p, _q) = setup();
        let stmt = make_instruction(&mut p, "wait", vec![Expr::int_literal(3, 32, false)], None, false, false)
            .unwrap()
            .unwrap();
        match stmt {
            Statement::WaitInstruction { duration_cycles, objects } => {
                assert_eq!(duration_cycles, 3);
                assert!(objects.is_empty());
            }
            _ => panic!("expected WaitInstruction"),
        }
    }

    #[test]
    fn make_instruction_wait_rejects_condition() {
        let (mut p, _q) = setup();
        let err = make_instruction(
            &mut p,
            "wait",
            vec![Expr::int_literal(1, 32, false)],
            Some(Expr::true_condition()),
            false,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, IrError::InvalidCondition(_)));
    }

    #[test]
    fn make_instruction_barrier_zero_duration() {
        let (mut p, q) = setup();
        let stmt = make_instruction(
            &mut p,
            "barrier",
            vec![Expr::reference(q, vec![IndexExpr::Literal(0)])],
            None,
            false,
            false,
        )
        .unwrap()
        .unwrap();
        match stmt {
            Statement::WaitInstruction { duration_cycles, .. } => assert_eq!(duration_cycles, 0),
            _ => panic!("expected WaitInstruction"),
        }
    }
}
