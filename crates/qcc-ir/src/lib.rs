//! Quantum Compiler Core IR
//!
//! This crate provides the static, owned data model shared by every stage of
//! the compiler core: the platform's registries (types, physical objects,
//! instruction types, function types), the instruction-type specialization
//! tree and its decomposition rules, the expression and statement model, and
//! access-mode analysis.
//!
//! # Overview
//!
//! Everything is arena-owned and addressed by [`Link`] — a small `Copy`
//! handle into an [`Arena`]. There is no reference counting and no lifetime
//! parameter anywhere in the public API: a [`Platform`] (or a [`Block`]
//! belonging to one) owns every node it reaches, and code that needs to pass
//! a node around passes its `Link` instead.
//!
//! # Core components
//!
//! - **Registries**: [`Platform`] owns name-sorted registries of
//!   [`DataType`], [`PhysicalObject`], [`InstructionType`], and
//!   [`FunctionType`].
//! - **Instruction types**: [`InstructionType`] models a generalized
//!   operation together with its specialization tree (operands pinned to
//!   concrete template values) and [`DecompositionRule`]s.
//! - **Expressions & statements**: [`Expr`] and [`Statement`] form the
//!   per-block program tree; [`Block`] is a named, addressable [`SubBlock`].
//! - **Access-mode analysis**: [`ObjectAccesses`] computes the
//!   per-reference access map a statement makes, which the scheduler's DDG
//!   builder consumes.
//! - **Platform configuration**: [`config::load_platform`] builds a
//!   [`Platform`] from the JSON document described in the project's
//!   configuration format.
//!
//! # Example
//!
//! ```rust
//! use qcc_ir::{Platform, Topology, DataType, AccessMode, OperandType};
//!
//! let mut platform = Platform::new("example", Topology::linear(3));
//! platform.add_main_qubit_register("q", vec![3]).unwrap();
//! let rz = platform
//!     .add_instruction_type(
//!         "rz",
//!         "rz",
//!         vec![OperandType::new(AccessMode::CommuteZ, DataType::Qubit)],
//!         20,
//!         vec![],
//!     )
//!     .unwrap();
//! assert_eq!(platform.instruction_type(rz).name, "rz");
//! ```

pub mod access;
pub mod arena;
pub mod cbor;
pub mod config;
pub mod datatype;
pub mod error;
pub mod expr;
pub mod instruction_type;
pub mod platform;
pub mod program;
pub mod statement;

pub use access::{commutes, CommutationPolicy, ObjectAccesses, ReferenceKey};
pub use arena::{Arena, Link};
pub use config::load_platform;
pub use datatype::{DataType, PhysicalObject};
pub use error::{IrError, IrResult};
pub use expr::{make_instruction, Expr, IndexExpr, LiteralValue};
pub use instruction_type::{AccessMode, DecompositionRule, FunctionType, InstructionType, OperandType};
pub use platform::{Platform, Topology};
pub use program::Program;
pub use statement::{Block, DeepCriticality, IfBranch, LoopControlKind, Statement, SubBlock};
