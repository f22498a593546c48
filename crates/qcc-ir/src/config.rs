//! Platform-configuration loading from JSON (§6.1) and regex-driven
//! operand-mode inference (§6.2).

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::datatype::DataType;
use crate::error::{IrError, IrResult};
use crate::expr::Expr;
use crate::instruction_type::{AccessMode, DecompositionRule, OperandType};
use crate::platform::{Platform, Topology};
use crate::statement::Statement;

/// Build a fully populated [`Platform`] from a `§6.1` JSON configuration
/// document.
pub fn load_platform(name: impl Into<String>, config: &Value) -> IrResult<Platform> {
    let hardware = parse_hardware_settings(config)?;
    let topology = parse_topology(config, hardware.qubit_number)?;

    let mut platform = Platform::new(name, topology);
    platform.architecture = parse_architecture(config);
    platform.add_main_qubit_register("q", vec![hardware.qubit_number])?;

    if let Some(resources) = config.get("resources").and_then(Value::as_object) {
        for (name, cfg) in resources {
            platform.resource_config.insert(name.clone(), cfg.clone());
        }
    }

    // `topology.number_of_cores` names a distinct multi-core hardware
    // concept, not the qubit count `Topology` is sized from (it is never
    // used for that above); fold it into the `channel` resource's config
    // so `ChannelResource` can derive a default per-core qubit assignment
    // when no explicit `qubit_core` map is given.
    if let Some(num_cores) = config
        .get("topology")
        .and_then(|t| t.get("number_of_cores"))
        .and_then(Value::as_u64)
    {
        let entry = platform
            .resource_config
            .entry("channel".to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        if let Some(obj) = entry.as_object_mut() {
            obj.entry("number_of_cores".to_string()).or_insert(Value::from(num_cores));
        }
    }

    if let Some(instructions) = config.get("instructions").and_then(Value::as_object) {
        for (key, def) in instructions {
            load_instruction(&mut platform, key, def, hardware.cycle_time_ns)?;
        }
    }

    if let Some(decompositions) = config.get("gate_decomposition").and_then(Value::as_object) {
        for (pattern, expansion) in decompositions {
            load_decomposition(&mut platform, pattern, expansion)?;
        }
    }

    platform.extra = config.clone();
    Ok(platform)
}

struct HardwareSettings {
    qubit_number: u32,
    #[allow(dead_code)]
    creg_number: u32,
    #[allow(dead_code)]
    breg_number: u32,
    cycle_time_ns: f64,
}

fn parse_hardware_settings(config: &Value) -> IrResult<HardwareSettings> {
    let hw = config.get("hardware_settings").ok_or_else(|| {
        IrError::Configuration("missing required section 'hardware_settings'".to_string())
    })?;
    let qubit_number = hw
        .get("qubit_number")
        .and_then(Value::as_u64)
        .ok_or_else(|| IrError::Configuration("hardware_settings.qubit_number is required".to_string()))?
        as u32;
    if qubit_number == 0 {
        return Err(IrError::Configuration(
            "hardware_settings.qubit_number must be positive".to_string(),
        ));
    }
    let creg_number = hw.get("creg_number").and_then(Value::as_u64).unwrap_or(0) as u32;
    let breg_number = hw.get("breg_number").and_then(Value::as_u64).unwrap_or(0) as u32;
    let cycle_time_ns = hw.get("cycle_time").and_then(Value::as_f64).unwrap_or(1.0);
    Ok(HardwareSettings {
        qubit_number,
        creg_number,
        breg_number,
        cycle_time_ns,
    })
}

fn parse_architecture(config: &Value) -> String {
    match config.get("eqasm_compiler") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(_)) => "inline".to_string(),
        _ => "none".to_string(),
    }
}

/// Build the device [`Topology`], always sized from `hardware_settings`'s
/// qubit count. `topology.number_of_cores`, when present, is a distinct
/// multi-core concept (see `load_platform`'s `channel` resource wiring) and
/// never contributes to this sizing.
fn parse_topology(config: &Value, qubit_number: u32) -> IrResult<Topology> {
    let Some(topo) = config.get("topology") else {
        return Ok(Topology::fully_connected(qubit_number));
    };
    let edges = match topo.get("edges").and_then(Value::as_array) {
        Some(list) => {
            let mut edges = Vec::with_capacity(list.len());
            for edge in list {
                let src = edge
                    .get("src")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| IrError::Configuration("topology edge missing 'src'".to_string()))?
                    as u32;
                let dst = edge
                    .get("dst")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| IrError::Configuration("topology edge missing 'dst'".to_string()))?
                    as u32;
                edges.push((src, dst));
            }
            edges
        }
        None => return Ok(Topology::fully_connected(qubit_number)),
    };
    Ok(Topology::new(qubit_number, edges))
}

fn load_instruction(platform: &mut Platform, key: &str, def: &Value, cycle_time_ns: f64) -> IrResult<()> {
    let (name, qubit_indices) = parse_instruction_key(key)?;
    let external_name = def
        .get("cqasm_name")
        .and_then(Value::as_str)
        .unwrap_or(&name)
        .to_string();

    let duration_cycles = def
        .get("duration_cycles")
        .and_then(Value::as_u64)
        .map(|v| v as u32)
        .or_else(|| {
            def.get("duration")
                .and_then(Value::as_f64)
                .map(|ns| (ns / cycle_time_ns).ceil() as u32)
        })
        .unwrap_or(0);

    let operand_types = match def.get("parameters").and_then(Value::as_array) {
        Some(params) => parse_explicit_parameters(params)?,
        None => {
            let arity = qubit_indices.len().max(1);
            infer_operand_types(&name, arity)
        }
    };

    let template_operands: Vec<Expr> = qubit_indices
        .iter()
        .map(|&i| Expr::int_literal(i64::from(i), 32, false))
        .collect();

    platform.add_instruction_type(
        name,
        external_name,
        operand_types,
        duration_cycles,
        template_operands,
    )?;
    Ok(())
}

/// Parse `"<name>"` or `"<name> q<i>,q<j>,..."` into a name and the literal
/// qubit indices that pin a specialization (§6.1).
fn parse_instruction_key(key: &str) -> IrResult<(String, Vec<u32>)> {
    let key = key.trim();
    let Some((name, rest)) = key.split_once(' ') else {
        return Ok((key.to_string(), Vec::new()));
    };
    let mut indices = Vec::new();
    for part in rest.split(',') {
        let part = part.trim().trim_start_matches(['q', 'Q']);
        let idx: u32 = part
            .parse()
            .map_err(|_| IrError::Configuration(format!("invalid qubit index in instruction key '{key}'")))?;
        indices.push(idx);
    }
    Ok((name.to_string(), indices))
}

/// Parse `<type>[:<mode>]` parameter strings (§6.1).
fn parse_explicit_parameters(params: &[Value]) -> IrResult<Vec<OperandType>> {
    params
        .iter()
        .map(|p| {
            let s = p
                .as_str()
                .ok_or_else(|| IrError::Configuration("instruction parameter must be a string".to_string()))?;
            let (type_name, mode_code) = s.split_once(':').unwrap_or((s, "W"));
            let data_type = parse_type_name(type_name)?;
            let mode = parse_mode_code(mode_code)?;
            Ok(OperandType::new(mode, data_type))
        })
        .collect()
}

fn parse_type_name(name: &str) -> IrResult<DataType> {
    match name {
        "qubit" => Ok(DataType::Qubit),
        "bit" => Ok(DataType::Bit),
        "real" => Ok(DataType::Real),
        "complex" => Ok(DataType::Complex),
        other => Err(IrError::Configuration(format!("unknown parameter type '{other}'"))),
    }
}

fn parse_mode_code(code: &str) -> IrResult<AccessMode> {
    match code {
        "W" => Ok(AccessMode::Write),
        "R" => Ok(AccessMode::Read),
        "L" => Ok(AccessMode::Literal),
        "X" => Ok(AccessMode::CommuteX),
        "Y" => Ok(AccessMode::CommuteY),
        "Z" => Ok(AccessMode::CommuteZ),
        "M" => Ok(AccessMode::Measure),
        other => Err(IrError::Configuration(format!("unknown access-mode code '{other}'"))),
    }
}

/// Attach one `gate_decomposition` entry as a [`DecompositionRule`] on the
/// instruction type its pattern names (§3.5, §6.1).
fn load_decomposition(platform: &mut Platform, pattern: &str, expansion: &Value) -> IrResult<()> {
    let (name, arity) = parse_decomposition_pattern(pattern)?;
    let operand_types = vec![DataType::Qubit; arity];
    let link = platform
        .find_instruction_type(&name, &operand_types, false)
        .ok_or_else(|| {
            IrError::Configuration(format!(
                "gate_decomposition pattern '{pattern}' names unknown instruction type '{name}'"
            ))
        })?;

    let expansion_patterns = expansion.as_array().ok_or_else(|| {
        IrError::Configuration(format!("gate_decomposition entry '{pattern}' must be an array"))
    })?;
    let expansion_statements = expansion_patterns
        .iter()
        .map(|entry| {
            let text = entry.as_str().ok_or_else(|| {
                IrError::Configuration(format!("gate_decomposition entry '{pattern}' expansion must be strings"))
            })?;
            parse_expansion_instruction(platform, text)
        })
        .collect::<IrResult<Vec<_>>>()?;

    let rule = DecompositionRule {
        name: name.clone(),
        parameters: (0..arity).map(|i| format!("%{i}")).collect(),
        expansion: expansion_statements,
    };
    platform.instruction_type_mut(link).decompositions.push(rule);
    Ok(())
}

/// Parse `"<name>"` or `"<name> %i,%j,..."` into a name and the arity implied
/// by the highest placeholder index used.
fn parse_decomposition_pattern(pattern: &str) -> IrResult<(String, usize)> {
    let pattern = pattern.trim();
    let Some((name, rest)) = pattern.split_once(' ') else {
        return Ok((pattern.to_string(), 0));
    };
    let mut max_index = None;
    for part in rest.split(',') {
        let idx = parse_placeholder(part, pattern)?;
        max_index = Some(max_index.map_or(idx, |m: usize| m.max(idx)));
    }
    Ok((name.to_string(), max_index.map_or(0, |m| m + 1)))
}

/// Parse one expansion-pattern string (`"<name> %i,%j,..."`) into a
/// `CustomInstruction` statement whose operands are
/// [`Expr::Parameter`] placeholders (§3.5).
fn parse_expansion_instruction(platform: &mut Platform, text: &str) -> IrResult<Statement> {
    let text = text.trim();
    let (name, operands) = match text.split_once(' ') {
        None => (text, Vec::new()),
        Some((name, rest)) => {
            let operands = rest
                .split(',')
                .map(|part| parse_placeholder(part, text).map(Expr::parameter))
                .collect::<IrResult<Vec<_>>>()?;
            (name, operands)
        }
    };
    let operand_types = vec![DataType::Qubit; operands.len()];
    let instruction_type = platform.find_instruction_type(name, &operand_types, false).ok_or_else(|| {
        IrError::Configuration(format!("gate_decomposition expansion '{text}' names unknown instruction type '{name}'"))
    })?;
    Ok(Statement::CustomInstruction {
        instruction_type,
        operands,
        condition: None,
        cycle: 0,
    })
}

fn parse_placeholder(part: &str, context: &str) -> IrResult<usize> {
    part.trim()
        .trim_start_matches('%')
        .parse()
        .map_err(|_| IrError::Configuration(format!("invalid '%N' parameter placeholder in '{context}'")))
}

struct InferenceRule {
    pattern: &'static str,
    modes: &'static [(AccessMode, bool)],
}

// `bool` marks whether the slot is a qubit (`true`) or an angle/real
// parameter (`false`).
const RULES: &[InferenceRule] = &[
    InferenceRule {
        pattern: r"^(h|id|i)$",
        modes: &[(AccessMode::Write, true)],
    },
    InferenceRule {
        pattern: r"^rx$",
        modes: &[(AccessMode::CommuteX, true), (AccessMode::Literal, false)],
    },
    InferenceRule {
        pattern: r"^ry$",
        modes: &[(AccessMode::CommuteY, true), (AccessMode::Literal, false)],
    },
    InferenceRule {
        pattern: r"^(rz|crk|crz?)$",
        modes: &[(AccessMode::CommuteZ, true), (AccessMode::Literal, false)],
    },
    InferenceRule {
        pattern: r"^(s|sdg|t|tdg)$",
        modes: &[(AccessMode::CommuteZ, true)],
    },
    InferenceRule {
        pattern: r"^(swap|move)$",
        modes: &[(AccessMode::Write, true), (AccessMode::Write, true)],
    },
    InferenceRule {
        pattern: r"^(cnot|cx)$",
        modes: &[(AccessMode::CommuteZ, true), (AccessMode::CommuteX, true)],
    },
    InferenceRule {
        pattern: r"^(cz|cphase)$",
        modes: &[(AccessMode::CommuteZ, true), (AccessMode::CommuteZ, true)],
    },
    InferenceRule {
        pattern: r"^toffoli$",
        modes: &[
            (AccessMode::CommuteZ, true),
            (AccessMode::CommuteZ, true),
            (AccessMode::CommuteX, true),
        ],
    },
];

const MEASURE_PATTERN: &str = r"^meas";

static COMPILED_RULES: OnceLock<Vec<(Regex, &'static InferenceRule)>> = OnceLock::new();
static MEASURE_REGEX: OnceLock<Regex> = OnceLock::new();

fn compiled_rules() -> &'static [(Regex, &'static InferenceRule)] {
    COMPILED_RULES.get_or_init(|| {
        RULES
            .iter()
            .map(|rule| {
                (
                    Regex::new(&format!("(?i){}", rule.pattern)).expect("static regex is valid"),
                    rule,
                )
            })
            .collect()
    })
}

fn measure_regex() -> &'static Regex {
    MEASURE_REGEX.get_or_init(|| Regex::new(&format!("(?i){MEASURE_PATTERN}")).expect("static regex is valid"))
}

/// Infer operand types from an instruction name when no explicit
/// `parameters` are given (§6.2). `arity` is the specialization's known
/// arity (from the instruction key's qubit-index list, or 1); used to fall
/// back to conservative all-`Write` when the inferred pattern disagrees.
pub fn infer_operand_types(name: &str, arity: usize) -> Vec<OperandType> {
    if measure_regex().is_match(name) {
        return if arity >= 2 {
            vec![
                OperandType::new(AccessMode::Write, DataType::Qubit),
                OperandType::new(AccessMode::Write, DataType::Bit),
            ]
        } else {
            vec![OperandType::new(AccessMode::Measure, DataType::Qubit)]
        };
    }

    for (regex, rule) in compiled_rules() {
        if regex.is_match(name) {
            let inferred: Vec<OperandType> = rule
                .modes
                .iter()
                .map(|&(mode, is_qubit)| {
                    OperandType::new(mode, if is_qubit { DataType::Qubit } else { DataType::Real })
                })
                .collect();
            if inferred.len() == arity {
                return inferred;
            }
            warn!(
                name,
                expected = inferred.len(),
                actual = arity,
                "inferred operand-mode pattern disagrees with specialization arity; falling back to all-Write"
            );
            break;
        }
    }

    (0..arity)
        .map(|_| OperandType::new(AccessMode::Write, DataType::Qubit))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn loads_minimal_platform() {
        let config = json!({
            "hardware_settings": { "qubit_number": 5 },
            "instructions": {
                "h": {},
                "cnot": {},
            }
        });
        let platform = load_platform("test", &config).unwrap();
        assert_eq!(platform.topology.num_qubits, 5);
        assert!(platform.find_physical_object("q").is_some());
    }

    #[test]
    fn topology_sizing_ignores_number_of_cores() {
        let config = json!({
            "hardware_settings": { "qubit_number": 5 },
            "topology": { "number_of_cores": 2 },
        });
        let platform = load_platform("test", &config).unwrap();
        assert_eq!(platform.topology.num_qubits, 5);
        assert_eq!(
            platform
                .resource_config
                .get("channel")
                .and_then(|c| c.get("number_of_cores"))
                .and_then(Value::as_u64),
            Some(2)
        );
    }

    #[test]
    fn missing_qubit_number_is_configuration_error() {
        let config = json!({ "hardware_settings": {} });
        let err = load_platform("test", &config);
        assert!(matches!(err, Err(IrError::Configuration(_))));
    }

    #[test]
    fn infers_rx_as_commute_x_plus_literal() {
        let modes = infer_operand_types("rx", 2);
        assert_eq!(modes[0].mode, AccessMode::CommuteX);
        assert_eq!(modes[1].mode, AccessMode::Literal);
    }

    #[test]
    fn arity_mismatch_falls_back_to_all_write() {
        let modes = infer_operand_types("rx", 3);
        assert!(modes.iter().all(|ot| ot.mode == AccessMode::Write));
        assert_eq!(modes.len(), 3);
    }

    #[test]
    fn unmatched_name_defaults_to_all_write() {
        let modes = infer_operand_types("frobnicate", 2);
        assert!(modes.iter().all(|ot| ot.mode == AccessMode::Write));
    }

    #[test]
    fn instruction_key_parses_qubit_specialization() {
        let (name, indices) = parse_instruction_key("rz q0").unwrap();
        assert_eq!(name, "rz");
        assert_eq!(indices, vec![0]);
    }

    #[test]
    fn gate_decomposition_builds_rule_with_parameter_operands() {
        let config = json!({
            "hardware_settings": { "qubit_number": 2 },
            "instructions": {
                "ry90": { "parameters": ["qubit:Y"] },
                "cz": { "parameters": ["qubit:Z", "qubit:Z"] },
                "cnot": { "parameters": ["qubit:Z", "qubit:X"] },
            },
            "gate_decomposition": {
                "cnot %0,%1": ["ry90 %1", "cz %0,%1", "ry90 %1"],
            },
        });
        let mut platform = load_platform("test", &config).unwrap();
        let cnot = platform
            .find_instruction_type("cnot", &[DataType::Qubit, DataType::Qubit], false)
            .unwrap();
        let node = platform.instruction_type(cnot);
        assert_eq!(node.decompositions.len(), 1);
        let rule = &node.decompositions[0];
        assert_eq!(rule.parameters, vec!["%0", "%1"]);
        assert_eq!(rule.expansion_len(), 3);

        let durations: u32 = rule
            .expansion
            .iter()
            .map(|stmt| match stmt {
                Statement::CustomInstruction { instruction_type, .. } => {
                    platform.instruction_type(*instruction_type).duration_cycles
                }
                _ => 0,
            })
            .sum();
        let ry90 = platform.find_instruction_type("ry90", &[DataType::Qubit], false).unwrap();
        let cz = platform
            .find_instruction_type("cz", &[DataType::Qubit, DataType::Qubit], false)
            .unwrap();
        assert_eq!(
            durations,
            2 * platform.instruction_type(ry90).duration_cycles + platform.instruction_type(cz).duration_cycles
        );

        match &rule.expansion[1] {
            Statement::CustomInstruction { operands, .. } => {
                assert_eq!(operands, &[Expr::parameter(0), Expr::parameter(1)]);
            }
            other => panic!("expected CustomInstruction, got {other:?}"),
        }
    }

    #[test]
    fn gate_decomposition_unknown_instruction_is_configuration_error() {
        let config = json!({
            "hardware_settings": { "qubit_number": 2 },
            "gate_decomposition": {
                "cnot %0,%1": ["ry90 %1"],
            },
        });
        let err = load_platform("test", &config);
        assert!(matches!(err, Err(IrError::Configuration(_))));
    }
}
