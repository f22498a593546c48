//! Property-based tests for the initial-placement solver.
//!
//! Tests that `solve` always returns a valid mapping: a bijection from
//! virtual qubits onto distinct physical qubits of the topology, whatever
//! two-qubit gate usage it is given (§8 property 13-14's underlying
//! invariant, checked generally rather than on the two hand-picked cases).

use std::collections::HashSet;
use std::time::Duration;

use proptest::prelude::*;
use qcc_ir::Topology;
use qcc_place::solver::{Kernel, Mapping, Outcome, PlaceConfig};

fn arb_kernel(num_qubits: u32) -> impl Strategy<Value = Kernel> {
    prop::collection::vec((0..num_qubits, 0..num_qubits).prop_filter("distinct", |(a, b)| a != b), 0..6)
        .prop_map(Kernel::new)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn solve_always_returns_a_valid_bijection(num_qubits in 2_u32..6, kernel in (2_u32..6).prop_flat_map(arb_kernel)) {
        let topology = Topology::linear(num_qubits);
        let config = PlaceConfig {
            horizon: 100,
            timeout: Duration::from_millis(500),
            map_all: true,
        };
        let input = Mapping::identity(num_qubits);

        let (mapping, outcome) = qcc_place::solver::solve(&topology, &kernel, &config, &input);

        if !matches!(outcome, Outcome::Failed | Outcome::TimedOut) {
            prop_assert_eq!(mapping.virtual_to_physical.len(), num_qubits as usize);
            let distinct: HashSet<_> = mapping.virtual_to_physical.iter().collect();
            prop_assert_eq!(distinct.len(), num_qubits as usize, "mapping is not a bijection");
            for &p in &mapping.virtual_to_physical {
                prop_assert!(p < num_qubits, "physical qubit out of range");
            }
        }
    }
}
