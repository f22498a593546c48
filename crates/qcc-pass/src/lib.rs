//! Quantum Compiler Core: options, pass-tree framework, pass manager
//!
//! This crate provides the options facility, the pass-tree execution model,
//! and the pass manager that drives a compile over a [`qcc_ir::Program`].
//! It does not implement any optimization or translation passes itself —
//! those live outside the core — but it ships the two passes every backend
//! needs regardless of target: scheduling (`sch.schedule`, wrapping
//! [`qcc_sched`]) and initial qubit placement (`map.qubits.place_mip`,
//! wrapping [`qcc_place`]).
//!
//! # Overview
//!
//! - [`option`]: a typed, insertion-ordered [`Options`] set every pass
//!   carries (§4.8).
//! - [`pass`]: the [`Pass`] trait — `construct()`/`compile()` lifecycle,
//!   [`NodeType`]-driven execution (plain pass, unconditional group,
//!   conditional group, pre- and post-tested loops), group-editing methods,
//!   and the `%n %N %p %P %U %D %%` debug-artifact substitution grammar.
//! - [`manager`]: [`Manager`], the root [`Pass`] that owns a [`Factory`] of
//!   pass constructors, recursively constructs the tree, enforces unique
//!   instance paths, and resolves wildcarded option paths.
//! - [`logging`]: an `EnvFilter`-based `tracing` subscriber init helper.
//!
//! # Example
//!
//! ```rust
//! use qcc_ir::{DataType, OperandType, AccessMode, Platform, Program, Topology};
//! use qcc_pass::Manager;
//!
//! let mut platform = Platform::new("demo", Topology::linear(2));
//! platform.add_main_qubit_register("q", vec![2]).unwrap();
//! platform
//!     .add_instruction_type("rz", "rz", vec![OperandType::new(AccessMode::CommuteZ, DataType::Qubit)], 20, vec![])
//!     .unwrap();
//! let mut program = Program::new("demo", platform);
//!
//! let mut manager = Manager::new();
//! manager.add_pass("sch.schedule", "sched").unwrap();
//! manager.run(&mut program).unwrap();
//! ```

pub mod error;
pub mod logging;
pub mod manager;
pub mod option;
pub mod pass;

pub use error::{PassError, PassResult};
pub use logging::init_tracing;
pub use manager::{Factory, Manager, PassFactoryFn};
pub use option::{Opt, OptionCallback, OptionValue, Options};
pub use pass::{substitute_prefix, Condition, NodeType, Pass, PassState, Relation, SubstitutionContext};
