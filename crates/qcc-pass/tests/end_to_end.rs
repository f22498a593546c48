//! End-to-end scenarios across the IR, scheduler, placement solver, and
//! pass manager together.

use qcc_ir::{AccessMode, DataType, Expr, IndexExpr, OperandType, Platform, Program, Statement, Topology};
use qcc_pass::pass::{Condition, NodeType, Pass, PassState, Relation};
use qcc_pass::{PassResult, Manager};
use qcc_place::{solve, Kernel, Mapping, Outcome, PlaceConfig};
use serde_json::json;

fn one_qubit_platform() -> Platform {
    let mut platform = Platform::new("s1", Topology::linear(1));
    platform.add_main_qubit_register("q", vec![1]).unwrap();
    platform
        .add_instruction_type("x", "x", vec![OperandType::new(AccessMode::Write, DataType::Qubit)], 1, vec![])
        .unwrap();
    platform
}

// S1 — trivial forward schedule.
#[test]
fn s1_trivial_forward_schedule() {
    let mut platform = one_qubit_platform();
    let x = platform.find_instruction_type("x", &[DataType::Qubit], false).unwrap();
    let q = platform.find_physical_object("q").unwrap();
    let mut program = Program::new("s1", platform);
    for _ in 0..3 {
        program.entry_block_mut().body.push(Statement::CustomInstruction {
            instruction_type: x,
            operands: vec![Expr::reference(q, vec![IndexExpr::Literal(0)])],
            condition: None,
            cycle: 0,
        });
    }

    let mut manager = Manager::new();
    manager.add_pass("sch.schedule", "sched").unwrap();
    manager.run(&mut program).unwrap();

    let cycles: Vec<i64> = program
        .entry_block()
        .body
        .statements
        .iter()
        .map(|s| s.cycle().unwrap())
        .collect();
    assert_eq!(cycles, vec![0, 1, 2]);
}

// S2 — commutation under Z: two commuting `rz`s plus a `cz` that writes both
// qubits. With per-cycle qubit resources the two `rz`s cannot share a cycle,
// so the ordering constraint from the DDG (no edge between the `rz`s, both
// precede `cz`) is what we check instead of exact cycle numbers.
#[test]
fn s2_commuting_rz_both_precede_cz() {
    let mut platform = Platform::new("s2", Topology::linear(2));
    platform.add_main_qubit_register("q", vec![2]).unwrap();
    let rz = platform
        .add_instruction_type("rz", "rz", vec![OperandType::new(AccessMode::CommuteZ, DataType::Qubit)], 1, vec![])
        .unwrap();
    let cz = platform
        .add_instruction_type(
            "cz",
            "cz",
            vec![
                OperandType::new(AccessMode::CommuteZ, DataType::Qubit),
                OperandType::new(AccessMode::CommuteZ, DataType::Qubit),
            ],
            1,
            vec![],
        )
        .unwrap();
    let q = platform.find_physical_object("q").unwrap();
    let mut program = Program::new("s2", platform);
    let body = &mut program.entry_block_mut().body;
    body.push(Statement::CustomInstruction {
        instruction_type: rz,
        operands: vec![Expr::reference(q, vec![IndexExpr::Literal(0)])],
        condition: None,
        cycle: 0,
    });
    body.push(Statement::CustomInstruction {
        instruction_type: rz,
        operands: vec![Expr::reference(q, vec![IndexExpr::Literal(0)])],
        condition: None,
        cycle: 0,
    });
    body.push(Statement::CustomInstruction {
        instruction_type: cz,
        operands: vec![
            Expr::reference(q, vec![IndexExpr::Literal(0)]),
            Expr::reference(q, vec![IndexExpr::Literal(1)]),
        ],
        condition: None,
        cycle: 0,
    });

    let mut manager = Manager::new();
    manager.add_pass("sch.schedule", "sched").unwrap();
    manager.run(&mut program).unwrap();

    let cycles: Vec<i64> = program
        .entry_block()
        .body
        .statements
        .iter()
        .map(|s| s.cycle().unwrap())
        .collect();
    assert!(cycles[0] < cycles[2]);
    assert!(cycles[1] < cycles[2]);
}

// S3 — measurement dependency: the conditional `x` must not run before the
// measurement completes.
#[test]
fn s3_measurement_dependency_orders_conditional_x() {
    let mut platform = Platform::new("s3", Topology::linear(1));
    platform.add_main_qubit_register("q", vec![1]).unwrap();
    let measure = platform
        .add_instruction_type(
            "measure",
            "measure",
            vec![OperandType::new(AccessMode::Measure, DataType::Qubit)],
            5,
            vec![],
        )
        .unwrap();
    let x = platform
        .add_instruction_type("x", "x", vec![OperandType::new(AccessMode::Write, DataType::Qubit)], 1, vec![])
        .unwrap();
    let q = platform.find_physical_object("q").unwrap();
    let mut program = Program::new("s3", platform);
    let body = &mut program.entry_block_mut().body;
    body.push(Statement::CustomInstruction {
        instruction_type: measure,
        operands: vec![Expr::reference(q, vec![IndexExpr::Literal(0)])],
        condition: None,
        cycle: 0,
    });
    body.push(Statement::CustomInstruction {
        instruction_type: x,
        operands: vec![Expr::reference(q, vec![IndexExpr::Literal(0)])],
        condition: Some(Expr::Reference {
            target: q,
            indices: vec![IndexExpr::Literal(0)],
            implicit_bit: true,
        }),
        cycle: 0,
    });

    let mut manager = Manager::new();
    manager.add_pass("sch.schedule", "sched").unwrap();
    manager.run(&mut program).unwrap();

    let cycles: Vec<i64> = program
        .entry_block()
        .body
        .statements
        .iter()
        .map(|s| s.cycle().unwrap())
        .collect();
    assert_eq!(cycles[0], 0);
    assert_eq!(cycles[1], 5);
}

// S4 — initial placement, line topology of 5: a single 2-qubit gate on a
// far-apart pair must come back nearest-neighbor.
#[test]
fn s4_initial_placement_line_topology() {
    let topology = Topology::linear(5);
    let kernel = Kernel::new(vec![(0, 4)]);
    let input = Mapping::identity(5);
    let (mapping, outcome) = solve(&topology, &kernel, &PlaceConfig::default(), &input);

    assert_eq!(outcome, Outcome::NewMap);
    let p0 = mapping.physical_of(0).unwrap();
    let p4 = mapping.physical_of(4).unwrap();
    assert_eq!(topology.distance(p0, p4), Some(1));
}

// Property 13: fully-connected topology, no two-qubit gates -> Any.
#[test]
fn property_13_fully_connected_no_gates_is_any() {
    let topology = Topology::fully_connected(4);
    let kernel = Kernel::new(vec![]);
    let input = Mapping::identity(4);
    let (mapping, outcome) = solve(&topology, &kernel, &PlaceConfig::default(), &input);
    assert_eq!(outcome, Outcome::Any);
    assert_eq!(mapping, input);
}

// S5 — pass manager conditional loop: a `GroupRepeatUntilNot` whose body
// returns a counter value and whose condition stops the loop as soon as
// that value goes negative; expect exactly one body execution when the
// first run already returns a negative value.
#[derive(Debug)]
struct CounterPass {
    state: PassState,
    runs: i64,
}

impl CounterPass {
    fn new() -> Self {
        Self {
            state: PassState::new("test.counter", "counter"),
            runs: 0,
        }
    }
}

impl Pass for CounterPass {
    fn state(&self) -> &PassState {
        &self.state
    }
    fn state_mut(&mut self) -> &mut PassState {
        &mut self.state
    }
    fn build(&mut self) -> NodeType {
        self.set_condition(Condition::Compare { value: 0, relation: Relation::Ge });
        NodeType::GroupRepeatUntilNot
    }
    fn run_internal(&mut self, _ir: &mut Program, _path: &str) -> PassResult<i64> {
        self.runs += 1;
        Ok(-1)
    }
}

#[test]
fn s5_repeat_until_not_stops_on_first_negative_return() {
    let platform = Platform::new("s5", Topology::linear(1));
    let mut program = Program::new("s5", platform);
    let mut pass = CounterPass::new();
    pass.construct();
    pass.compile(&mut program, "counter").unwrap();
    assert_eq!(pass.runs, 1);
}

// S6 — gate decomposition: a `cnot` decomposed into `ry90, cz, ry90` carries
// a rule whose expansion duration equals the sum of the expansion
// instructions' own durations, and whose operands are `%N` placeholders
// resolved against the call site's qubits.
#[test]
fn s6_gate_decomposition_rule_duration_matches_expansion() {
    let config = json!({
        "hardware_settings": { "qubit_number": 2 },
        "instructions": {
            "ry90": { "parameters": ["qubit:Y"], "duration_cycles": 2 },
            "cz": { "parameters": ["qubit:Z", "qubit:Z"], "duration_cycles": 4 },
            "cnot": { "parameters": ["qubit:Z", "qubit:X"], "duration_cycles": 1 },
        },
        "gate_decomposition": {
            "cnot %0,%1": ["ry90 %1", "cz %0,%1", "ry90 %1"],
        },
    });
    let platform = qcc_ir::config::load_platform("s6", &config).unwrap();
    let cnot = platform
        .find_instruction_type("cnot", &[DataType::Qubit, DataType::Qubit], false)
        .unwrap();
    let ry90 = platform.find_instruction_type("ry90", &[DataType::Qubit], false).unwrap();
    let cz = platform
        .find_instruction_type("cz", &[DataType::Qubit, DataType::Qubit], false)
        .unwrap();

    let node = platform.instruction_type(cnot);
    assert_eq!(node.decompositions.len(), 1);
    let rule = &node.decompositions[0];
    let expansion_duration: u32 = rule
        .expansion
        .iter()
        .map(|stmt| match stmt {
            Statement::CustomInstruction { instruction_type, .. } => {
                platform.instruction_type(*instruction_type).duration_cycles
            }
            _ => 0,
        })
        .sum();
    assert_eq!(
        expansion_duration,
        2 * platform.instruction_type(ry90).duration_cycles + platform.instruction_type(cz).duration_cycles
    );
}
