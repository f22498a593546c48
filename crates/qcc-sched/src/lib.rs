//! Data-dependency graph construction, hardware resource modeling, and
//! resource-constrained list scheduling for compiled quantum programs
//! (§3.7, §3.8, §4.5, §4.6, §4.7).
//!
//! A block is scheduled in three steps:
//!
//! 1. [`ddg::build_ddg`] turns a [`qcc_ir::SubBlock`] into a [`ddg::Ddg`],
//!    threading data dependencies through an access-mode analysis that
//!    lets commuting accesses (same `AccessMode`, e.g. two `rz`-like
//!    `CommuteZ` writes) run in any relative order.
//! 2. [`resource::ResourceManager`] turns a [`qcc_ir::Platform`]'s
//!    `resource_config` into live [`resource::ResourceState`] instances —
//!    one [`resource::Resource`] implementation per hardware constraint
//!    kind (qubits, waveform generators, measurement units, edges, parked
//!    qubits, inter-core channels).
//! 3. [`scheduler::schedule_block`] runs the list scheduler itself,
//!    ordering the DDG's `available` set by a pluggable
//!    [`heuristic::Criticality`] comparator and writing the resulting
//!    cycle back onto each statement.
//!
//! ```
//! use qcc_ir::{AccessMode, CommutationPolicy, DataType, Expr, IndexExpr, OperandType, Platform, Statement, SubBlock, Topology};
//! use qcc_sched::{heuristic::Trivial, resource::ResourceManager, scheduler::{schedule_block, ScheduleConfig}};
//!
//! let mut platform = Platform::new("demo", Topology::linear(2));
//! platform.add_main_qubit_register("q", vec![2]).unwrap();
//! let rz = platform
//!     .add_instruction_type("rz", "rz", vec![OperandType::new(AccessMode::CommuteZ, DataType::Qubit)], 20, vec![])
//!     .unwrap();
//! let q = platform.find_physical_object("q").unwrap();
//!
//! let mut body = SubBlock::new();
//! body.push(Statement::CustomInstruction {
//!     instruction_type: rz,
//!     operands: vec![Expr::reference(q, vec![IndexExpr::Literal(0)])],
//!     condition: None,
//!     cycle: 0,
//! });
//!
//! let resources = ResourceManager::from_platform(&platform);
//! schedule_block(&platform, &mut body, &resources, &Trivial, CommutationPolicy::default(), ScheduleConfig::default()).unwrap();
//! assert_eq!(body.statements[0].cycle(), Some(0));
//! ```

pub mod ddg;
pub mod error;
pub mod heuristic;
pub mod resource;
pub mod scheduler;

pub use ddg::{build_ddg, reverse_ddg, Ddg, DdgNode, Edge};
pub use error::{SchedError, SchedResult};
pub use heuristic::{compute as compute_deep_criticality, CriticalPath, Criticality, DeepCriticalityHeuristic, Trivial};
pub use resource::{
    instruction_view, ChannelResource, DetunedQubitsResource, EdgeResource, InstructionView, MeasurementUnitResource,
    QubitResource, Resource, ResourceManager, ResourceState, WaveformGeneratorResource,
};
pub use scheduler::{schedule_block, ScheduleConfig};
