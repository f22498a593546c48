//! Quantum Compiler Core: initial-placement solver
//!
//! Given a device [`qcc_ir::Topology`] and a kernel's two-qubit gate usage,
//! [`solve`] produces a virtual-to-physical qubit [`Mapping`] that minimizes
//! the routing distance a downstream router would otherwise have to bridge
//! (§4.11). The solve is a small mixed-integer program built with
//! [`good_lp`] and run with a wall-clock timeout on a dedicated thread, so a
//! slow or hung solve never blocks the compiler core indefinitely.
//!
//! # Example
//!
//! ```rust
//! use qcc_ir::Topology;
//! use qcc_place::{solve, Kernel, Mapping, Outcome, PlaceConfig};
//!
//! let topology = Topology::linear(5);
//! let kernel = Kernel::new(vec![(0, 1)]);
//! let input = Mapping::identity(5);
//! let (mapping, outcome) = solve(&topology, &kernel, &PlaceConfig::default(), &input);
//! assert_eq!(outcome, Outcome::Current);
//! assert_eq!(mapping, input);
//! ```

pub mod error;
pub mod solver;

pub use error::{PlaceError, PlaceResult};
pub use solver::{solve, Kernel, Mapping, Outcome, PlaceConfig};
