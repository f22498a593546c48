//! MIP-based initial-placement solver (§4.11).
//!
//! Maps virtual qubits used by a kernel's two-qubit gates onto physical
//! qubits of a [`Topology`], minimizing the routing distance the scheduler
//! will later have to bridge. The heavy lifting — building and solving the
//! mixed-integer program — runs on a dedicated worker thread so a
//! user-configured timeout can abandon it without touching caller-owned
//! state (§5).

use std::collections::BTreeMap;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use good_lp::{variable, Expression, ProblemVariables, Solution, SolverModel};
use qcc_ir::Topology;
use tracing::{debug, instrument, warn};

use crate::error::PlaceError;

/// A two-qubit kernel to place: the virtual-qubit pair touched by each
/// two-qubit gate, in program order.
#[derive(Debug, Clone, Default)]
pub struct Kernel {
    /// `(virtual_a, virtual_b)` for each two-qubit gate.
    pub two_qubit_gates: Vec<(u32, u32)>,
}

impl Kernel {
    /// Create a kernel from an explicit gate list.
    pub fn new(two_qubit_gates: Vec<(u32, u32)>) -> Self {
        Self { two_qubit_gates }
    }
}

/// Tunables for one placement solve (§4.11).
#[derive(Debug, Clone)]
pub struct PlaceConfig {
    /// Scan at most this many leading two-qubit gates when building
    /// refcounts.
    pub horizon: usize,
    /// Wall-clock budget for the MIP solve.
    pub timeout: Duration,
    /// Whether to complete the mapping with an arbitrary permutation of
    /// unused locations for virtual qubits the kernel never touches.
    pub map_all: bool,
}

impl Default for PlaceConfig {
    fn default() -> Self {
        Self {
            horizon: 10_000,
            timeout: Duration::from_secs(5),
            map_all: false,
        }
    }
}

/// A virtual-to-physical qubit assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    /// `virtual_to_physical[v]` is the physical qubit virtual qubit `v` is
    /// bound to.
    pub virtual_to_physical: Vec<u32>,
}

impl Mapping {
    /// The identity mapping over `n` qubits.
    pub fn identity(n: u32) -> Self {
        Self {
            virtual_to_physical: (0..n).collect(),
        }
    }

    /// The physical qubit bound to virtual qubit `v`, if in range.
    pub fn physical_of(&self, v: u32) -> Option<u32> {
        self.virtual_to_physical.get(v as usize).copied()
    }
}

/// The algorithm's result indicator (§4.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No two-qubit gates in the scanned horizon: any mapping works.
    Any,
    /// Every scanned two-qubit gate is already nearest-neighbor under the
    /// input mapping.
    Current,
    /// A new mapping was found and is returned.
    NewMap,
    /// The solver ran but reported infeasibility; the input mapping is
    /// returned unchanged.
    Failed,
    /// The solve did not finish within `timeout`; the input mapping is
    /// returned unchanged.
    TimedOut,
}

#[derive(Default)]
struct Usage {
    /// `refcount[(i, j)]` for `i < j`, the virtual-qubit pair indices.
    refcount: BTreeMap<(u32, u32), u32>,
}

fn scan(kernel: &Kernel, horizon: usize) -> Usage {
    let mut usage = Usage::default();
    for &(a, b) in kernel.two_qubit_gates.iter().take(horizon) {
        let key = if a <= b { (a, b) } else { (b, a) };
        *usage.refcount.entry(key).or_insert(0) += 1;
    }
    usage
}

fn all_nearest_neighbor(usage: &Usage, topology: &Topology, mapping: &Mapping) -> bool {
    usage.refcount.keys().all(|&(i, j)| {
        let (pi, pj) = (mapping.physical_of(i), mapping.physical_of(j));
        matches!((pi, pj), (Some(pi), Some(pj)) if topology.distance(pi, pj) == Some(1))
    })
}

/// Solve the initial-placement problem (§4.11): given `topology`, a
/// `kernel`'s two-qubit gate usage, a `config`, and the current
/// `input_mapping`, produce a new mapping and an [`Outcome`].
#[instrument(skip(topology, kernel, input_mapping))]
pub fn solve(topology: &Topology, kernel: &Kernel, config: &PlaceConfig, input_mapping: &Mapping) -> (Mapping, Outcome) {
    let usage = scan(kernel, config.horizon);

    if usage.refcount.values().all(|&c| c == 0) || usage.refcount.is_empty() {
        debug!("no two-qubit gate usage in horizon, any mapping is valid");
        return (input_mapping.clone(), Outcome::Any);
    }

    if all_nearest_neighbor(&usage, topology, input_mapping) {
        debug!("input mapping is already nearest-neighbor for every scanned gate");
        return (input_mapping.clone(), Outcome::Current);
    }

    match solve_mip_with_timeout(topology, &usage, config) {
        Ok(assignment) => {
            let mut mapping = input_mapping.clone();
            for (facility, location) in &assignment {
                if (*facility as usize) < mapping.virtual_to_physical.len() {
                    mapping.virtual_to_physical[*facility as usize] = *location;
                } else {
                    mapping.virtual_to_physical.resize(*facility as usize + 1, 0);
                    mapping.virtual_to_physical[*facility as usize] = *location;
                }
            }
            if config.map_all {
                complete_mapping(&mut mapping, topology.num_qubits, &assignment);
            }
            (mapping, Outcome::NewMap)
        }
        Err(PlaceError::TimedOut) => {
            warn!("initial placement solve timed out, keeping input mapping");
            (input_mapping.clone(), Outcome::TimedOut)
        }
        Err(PlaceError::Infeasible) => {
            warn!("initial placement MIP infeasible, keeping input mapping");
            (input_mapping.clone(), Outcome::Failed)
        }
    }
}

/// Fill every physical qubit not assigned by `assignment` into the
/// mapping's unused virtual-qubit slots, in index order.
fn complete_mapping(mapping: &mut Mapping, num_qubits: u32, assignment: &[(u32, u32)]) {
    let used_locations: std::collections::BTreeSet<u32> = assignment.iter().map(|&(_, k)| k).collect();
    let assigned_virtuals: std::collections::BTreeSet<u32> = assignment.iter().map(|&(i, _)| i).collect();
    let mut free_locations = (0..num_qubits).filter(|k| !used_locations.contains(k));
    for v in 0..mapping.virtual_to_physical.len() as u32 {
        if !assigned_virtuals.contains(&v) {
            if let Some(loc) = free_locations.next() {
                mapping.virtual_to_physical[v as usize] = loc;
            }
        }
    }
}

fn solve_mip_with_timeout(topology: &Topology, usage: &Usage, config: &PlaceConfig) -> Result<Vec<(u32, u32)>, PlaceError> {
    let facilities: Vec<u32> = usage
        .refcount
        .keys()
        .flat_map(|&(a, b)| [a, b])
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();
    let refcount = usage.refcount.clone();

    let (tx, rx) = mpsc::channel();
    let facilities_for_thread = facilities.clone();
    let topology_for_thread = topology.clone();
    thread::spawn(move || {
        let result = build_and_solve(&facilities_for_thread, &topology_for_thread, &refcount);
        // If the receiver already timed out and was dropped, this send
        // simply fails and is ignored; the thread owns everything it
        // touches and never reaches back into caller state.
        let _ = tx.send(result);
    });

    match rx.recv_timeout(config.timeout) {
        Ok(Some(assignment)) => Ok(assignment),
        Ok(None) => Err(PlaceError::Infeasible),
        Err(mpsc::RecvTimeoutError::Timeout) => Err(PlaceError::TimedOut),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(PlaceError::Infeasible),
    }
}

fn build_and_solve(facilities: &[u32], topology: &Topology, refcount: &BTreeMap<(u32, u32), u32>) -> Option<Vec<(u32, u32)>> {
    let nfac = facilities.len();
    let nlocs = topology.num_qubits as usize;
    if nfac == 0 || nlocs == 0 {
        return None;
    }

    let refcount_matrix = |i: u32, j: u32| -> u32 {
        let key = if i <= j { (i, j) } else { (j, i) };
        refcount.get(&key).copied().unwrap_or(0)
    };

    let mut vars = ProblemVariables::new();
    let x: Vec<Vec<_>> = (0..nfac).map(|_| (0..nlocs).map(|_| vars.add(variable().binary())).collect()).collect();
    let w: Vec<Vec<_>> = (0..nfac).map(|_| (0..nlocs).map(|_| vars.add(variable().min(0.0))).collect()).collect();

    let objective: Expression = w.iter().flatten().fold(Expression::from(0.0), |acc, &v| acc + v);

    let mut problem = vars.minimise(objective.clone()).using(good_lp::minilp);

    for i in 0..nfac {
        let sum: Expression = x[i].iter().fold(Expression::from(0.0), |acc, &v| acc + v);
        problem = problem.with(sum.eq(1.0));
    }
    for k in 0..nlocs {
        let sum: Expression = (0..nfac).fold(Expression::from(0.0), |acc, i| acc + x[i][k]);
        problem = problem.with(sum.leq(1.0));
    }
    for i in 0..nfac {
        for k in 0..nlocs {
            let cm = placement_costmax(facilities, i, k as u32, refcount, topology);
            let mut expr = Expression::from(cm) * x[i][k] - w[i][k];
            for (j, &fj) in facilities.iter().enumerate() {
                let rc = f64::from(refcount_matrix(facilities[i], fj));
                if rc == 0.0 {
                    continue;
                }
                for l in 0..nlocs {
                    if let Some(d) = topology.distance(k as u32, l as u32) {
                        expr = expr + rc * f64::from(d) * x[j][l];
                    }
                }
            }
            problem = problem.with(expr.leq(cm));
        }
    }

    let solution = problem.solve().ok()?;
    let mut assignment = Vec::with_capacity(nfac);
    for (i, &fac) in facilities.iter().enumerate() {
        for k in 0..nlocs {
            if solution.value(x[i][k]) > 0.5 {
                assignment.push((fac, k as u32));
                break;
            }
        }
    }
    Some(assignment)
}

fn placement_costmax(facilities: &[u32], i: usize, k: u32, refcount: &BTreeMap<(u32, u32), u32>, topology: &Topology) -> f64 {
    let mut total = 0.0;
    for (j, &fj) in facilities.iter().enumerate() {
        if j == i {
            continue;
        }
        let key = if facilities[i] <= fj { (facilities[i], fj) } else { (fj, facilities[i]) };
        let Some(&rc) = refcount.get(&key) else { continue };
        if rc == 0 {
            continue;
        }
        for l in 0..topology.num_qubits {
            if let Some(d) = topology.distance(k, l) {
                total += f64::from(rc) * (f64::from(d) - 1.0);
            }
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_kernel_returns_any() {
        let topology = Topology::linear(5);
        let kernel = Kernel::default();
        let config = PlaceConfig::default();
        let input = Mapping::identity(5);
        let (mapping, outcome) = solve(&topology, &kernel, &config, &input);
        assert_eq!(outcome, Outcome::Any);
        assert_eq!(mapping, input);
    }

    #[test]
    fn already_nearest_neighbor_returns_current() {
        let topology = Topology::linear(5);
        let kernel = Kernel::new(vec![(0, 1), (1, 2)]);
        let config = PlaceConfig::default();
        let input = Mapping::identity(5);
        let (mapping, outcome) = solve(&topology, &kernel, &config, &input);
        assert_eq!(outcome, Outcome::Current);
        assert_eq!(mapping, input);
    }

    #[test]
    fn disconnected_pair_on_line_produces_new_map() {
        let topology = Topology::linear(5);
        let kernel = Kernel::new(vec![(0, 4)]);
        let config = PlaceConfig::default();
        let input = Mapping::identity(5);
        let (mapping, outcome) = solve(&topology, &kernel, &config, &input);
        assert_eq!(outcome, Outcome::NewMap);
        let p0 = mapping.physical_of(0).unwrap();
        let p4 = mapping.physical_of(4).unwrap();
        assert_eq!(topology.distance(p0, p4), Some(1));
    }

    // Property 14: a line topology is a Hamiltonian path, so a chain of
    // 2-qubit gates `(i, i+1)` for every i is satisfiable with every gate
    // nearest-neighbor, whatever mapping the solver settles on.
    #[test]
    fn hamiltonian_path_chain_of_gates_is_all_nearest_neighbor() {
        let topology = Topology::linear(5);
        let kernel = Kernel::new((0..4).map(|i| (i, i + 1)).collect());
        let config = PlaceConfig::default();
        let input = Mapping::identity(5);
        let (mapping, outcome) = solve(&topology, &kernel, &config, &input);
        assert!(matches!(outcome, Outcome::NewMap | Outcome::Current));
        for i in 0..4 {
            let pi = mapping.physical_of(i).unwrap();
            let pj = mapping.physical_of(i + 1).unwrap();
            assert_eq!(topology.distance(pi, pj), Some(1));
        }
    }
}
