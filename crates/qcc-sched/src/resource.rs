//! Resource model (§3.7, §4.7): named resources, a factory-built
//! `ResourceManager`, and the per-direction `ResourceState` produced for a
//! scheduling run.

use rustc_hash::FxHashMap;
use serde_json::Value;

use qcc_ir::{DataType, IndexExpr, Platform, Statement};

/// A resolved view of an instruction's name, duration, and qubit operands,
/// extracted once per lookup so resources don't each re-walk the operand
/// list (§4.7).
#[derive(Debug, Clone)]
pub struct InstructionView {
    /// The instruction type's internal name.
    pub name: String,
    /// Duration in cycles.
    pub duration_cycles: u32,
    /// Qubit-register indices touched by this instruction, in operand
    /// order. Only literal indices are resolved; a dynamic index is
    /// omitted (conservatively, the resource then treats the instruction
    /// as touching no qubits of its own).
    pub qubit_indices: Vec<u32>,
}

/// Build an [`InstructionView`] for `stmt`, or `None` if `stmt` is not a
/// custom instruction (resources apply only to those, per §4.7).
pub fn instruction_view(platform: &Platform, stmt: &Statement) -> Option<InstructionView> {
    let Statement::CustomInstruction {
        instruction_type,
        operands,
        ..
    } = stmt
    else {
        return None;
    };
    let node = platform.instruction_type(*instruction_type);
    let mut qubit_indices = Vec::new();
    for operand in operands {
        if let qcc_ir::Expr::Reference { target, indices, implicit_bit } = operand {
            if *implicit_bit {
                continue;
            }
            if platform.object_value(*target).data_type != DataType::Qubit {
                continue;
            }
            if let Some(IndexExpr::Literal(i)) = indices.first() {
                qubit_indices.push(*i);
            }
        }
    }
    Some(InstructionView {
        name: node.name.clone(),
        duration_cycles: node.duration_cycles,
        qubit_indices,
    })
}

/// The per-scheduling-direction availability/reservation contract every
/// resource implements (§3.7).
pub trait Resource: std::fmt::Debug {
    /// The resource's configured name (matches `resource_config`'s key).
    fn name(&self) -> &str;

    /// Whether `instruction` can start at `cycle` without conflicting with
    /// anything already reserved.
    fn available(&self, cycle: i64, instruction: &InstructionView) -> bool;

    /// Commit `instruction` as starting at `cycle`.
    fn reserve(&mut self, cycle: i64, instruction: &InstructionView);

    /// Human-readable state dump used in `ResourceDeadlock` diagnostics.
    fn dump(&self) -> String;
}

/// A qubit may be used by at most one non-commuting access per cycle
/// (§4.7). Modeled as a busy-until (forward) / busy-from (backward) cycle
/// per qubit index.
#[derive(Debug, Clone)]
pub struct QubitResource {
    name: String,
    direction: i8,
    busy_until: FxHashMap<u32, i64>,
}

impl QubitResource {
    /// Create a new qubit resource for the given scheduling direction.
    pub fn new(name: impl Into<String>, direction: i8) -> Self {
        Self {
            name: name.into(),
            direction,
            busy_until: FxHashMap::default(),
        }
    }
}

impl Resource for QubitResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn available(&self, cycle: i64, instruction: &InstructionView) -> bool {
        instruction.qubit_indices.iter().all(|q| match self.busy_until.get(q) {
            None => true,
            Some(&until) => (self.direction > 0 && cycle >= until) || (self.direction < 0 && cycle <= until),
        })
    }

    fn reserve(&mut self, cycle: i64, instruction: &InstructionView) {
        let end = cycle + self.direction as i64 * instruction.duration_cycles as i64;
        for &q in &instruction.qubit_indices {
            self.busy_until.insert(q, end);
        }
    }

    fn dump(&self) -> String {
        format!("qubit: {:?}", self.busy_until)
    }
}

/// A waveform generator ("qwg") controls a fixed set of qubits. While
/// playing an instruction of a given name it accepts concurrent
/// instructions of the *same* name in the overlap window, but not of a
/// different name (§4.7).
#[derive(Debug, Clone)]
pub struct WaveformGeneratorResource {
    name: String,
    direction: i8,
    /// generator id -> qubits it controls
    generators: Vec<Vec<u32>>,
    /// generator id -> (from, to, current op name)
    state: FxHashMap<usize, (i64, i64, String)>,
}

impl WaveformGeneratorResource {
    /// Create a new waveform-generator resource from a `generators` list,
    /// each entry the set of qubit indices that generator controls.
    pub fn new(name: impl Into<String>, direction: i8, generators: Vec<Vec<u32>>) -> Self {
        Self {
            name: name.into(),
            direction,
            generators,
            state: FxHashMap::default(),
        }
    }

    fn generator_for(&self, qubit: u32) -> Option<usize> {
        self.generators.iter().position(|qs| qs.contains(&qubit))
    }
}

impl Resource for WaveformGeneratorResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn available(&self, cycle: i64, instruction: &InstructionView) -> bool {
        instruction.qubit_indices.iter().all(|&q| {
            let Some(gen_id) = self.generator_for(q) else {
                return true;
            };
            match self.state.get(&gen_id) {
                None => true,
                Some((from, to, op_name)) => {
                    let overlapping = cycle >= *from.min(to) && cycle <= *from.max(to);
                    !overlapping || *op_name == instruction.name
                }
            }
        })
    }

    fn reserve(&mut self, cycle: i64, instruction: &InstructionView) {
        let end = cycle + self.direction as i64 * instruction.duration_cycles as i64;
        for &q in &instruction.qubit_indices {
            if let Some(gen_id) = self.generator_for(q) {
                self.state.insert(gen_id, (cycle, end, instruction.name.clone()));
            }
        }
    }

    fn dump(&self) -> String {
        format!("qwg: {:?}", self.state)
    }
}

/// A measurement unit controls a fixed set of qubits; concurrent
/// measurements on the same unit must start in the exact same cycle
/// (§4.7).
#[derive(Debug, Clone)]
pub struct MeasurementUnitResource {
    name: String,
    units: Vec<Vec<u32>>,
    state: FxHashMap<usize, (i64, i64)>,
}

impl MeasurementUnitResource {
    /// Create a new measurement-unit resource from a `units` list, each
    /// entry the set of qubit indices that unit controls.
    pub fn new(name: impl Into<String>, units: Vec<Vec<u32>>) -> Self {
        Self {
            name: name.into(),
            units,
            state: FxHashMap::default(),
        }
    }

    fn unit_for(&self, qubit: u32) -> Option<usize> {
        self.units.iter().position(|qs| qs.contains(&qubit))
    }
}

impl Resource for MeasurementUnitResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn available(&self, cycle: i64, instruction: &InstructionView) -> bool {
        instruction.qubit_indices.iter().all(|&q| {
            let Some(unit_id) = self.unit_for(q) else {
                return true;
            };
            match self.state.get(&unit_id) {
                None => true,
                Some((from, _to)) => *from == cycle,
            }
        })
    }

    fn reserve(&mut self, cycle: i64, instruction: &InstructionView) {
        for &q in &instruction.qubit_indices {
            if let Some(unit_id) = self.unit_for(q) {
                self.state.insert(unit_id, (cycle, cycle + instruction.duration_cycles as i64));
            }
        }
    }

    fn dump(&self) -> String {
        format!("measurement-unit: {:?}", self.state)
    }
}

/// Two-qubit flux gates occupy an edge for their full duration; edges
/// listed as conflicting in configuration also conflict (§4.7).
#[derive(Debug, Clone)]
pub struct EdgeResource {
    name: String,
    direction: i8,
    /// edge id -> (qubit a, qubit b)
    edges: Vec<(u32, u32)>,
    /// edge id -> ids of edges that also conflict when this one is busy.
    conflicts: FxHashMap<usize, Vec<usize>>,
    busy_until: FxHashMap<usize, i64>,
}

impl EdgeResource {
    /// Create a new edge resource.
    pub fn new(
        name: impl Into<String>,
        direction: i8,
        edges: Vec<(u32, u32)>,
        conflicts: FxHashMap<usize, Vec<usize>>,
    ) -> Self {
        Self {
            name: name.into(),
            direction,
            edges,
            conflicts,
            busy_until: FxHashMap::default(),
        }
    }

    fn edge_for(&self, a: u32, b: u32) -> Option<usize> {
        self.edges
            .iter()
            .position(|&(x, y)| (x, y) == (a, b) || (x, y) == (b, a))
    }

    fn edge_pair(instruction: &InstructionView) -> Option<(u32, u32)> {
        match instruction.qubit_indices.as_slice() {
            [a, b] => Some((*a, *b)),
            _ => None,
        }
    }

    fn is_busy(&self, id: usize, cycle: i64) -> bool {
        match self.busy_until.get(&id) {
            None => false,
            Some(&until) => (self.direction > 0 && cycle < until) || (self.direction < 0 && cycle > until),
        }
    }
}

impl Resource for EdgeResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn available(&self, cycle: i64, instruction: &InstructionView) -> bool {
        let Some((a, b)) = Self::edge_pair(instruction) else {
            return true;
        };
        let Some(id) = self.edge_for(a, b) else {
            return true;
        };
        if self.is_busy(id, cycle) {
            return false;
        }
        self.conflicts
            .get(&id)
            .into_iter()
            .flatten()
            .all(|&other| !self.is_busy(other, cycle))
    }

    fn reserve(&mut self, cycle: i64, instruction: &InstructionView) {
        let Some((a, b)) = Self::edge_pair(instruction) else {
            return;
        };
        let Some(id) = self.edge_for(a, b) else {
            return;
        };
        let end = cycle + self.direction as i64 * instruction.duration_cycles as i64;
        self.busy_until.insert(id, end);
    }

    fn dump(&self) -> String {
        format!("edge: {:?}", self.busy_until)
    }
}

/// A two-qubit flux gate parks ("detunes") a configured list of additional
/// qubits; single-qubit microwave gates on a detuned qubit are forbidden,
/// but same-type operations may overlap (§4.7).
#[derive(Debug, Clone)]
pub struct DetunedQubitsResource {
    name: String,
    direction: i8,
    /// (qubit a, qubit b) -> additional qubits parked by a gate on that edge.
    parks: FxHashMap<(u32, u32), Vec<u32>>,
    /// qubit -> (from, to, op name)
    state: FxHashMap<u32, (i64, i64, String)>,
}

impl DetunedQubitsResource {
    /// Create a new detuned-qubits resource.
    pub fn new(name: impl Into<String>, direction: i8, parks: FxHashMap<(u32, u32), Vec<u32>>) -> Self {
        Self {
            name: name.into(),
            direction,
            parks,
            state: FxHashMap::default(),
        }
    }

    fn parked_by(&self, instruction: &InstructionView) -> Vec<u32> {
        if let [a, b] = instruction.qubit_indices.as_slice() {
            self.parks
                .get(&(*a, *b))
                .or_else(|| self.parks.get(&(*b, *a)))
                .cloned()
                .unwrap_or_default()
        } else {
            Vec::new()
        }
    }
}

impl Resource for DetunedQubitsResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn available(&self, cycle: i64, instruction: &InstructionView) -> bool {
        let is_single_qubit = instruction.qubit_indices.len() == 1;
        if is_single_qubit {
            let q = instruction.qubit_indices[0];
            if let Some((from, to, _)) = self.state.get(&q) {
                let overlapping = cycle >= *from.min(to) && cycle <= *from.max(to);
                if overlapping {
                    return false;
                }
            }
        }
        self.parked_by(instruction).iter().all(|q| match self.state.get(q) {
            None => true,
            Some((_, _, op_name)) => op_name == &instruction.name,
        })
    }

    fn reserve(&mut self, cycle: i64, instruction: &InstructionView) {
        let end = cycle + self.direction as i64 * instruction.duration_cycles as i64;
        for q in self.parked_by(instruction) {
            self.state.insert(q, (cycle, end, instruction.name.clone()));
        }
    }

    fn dump(&self) -> String {
        format!("detuned-qubits: {:?}", self.state)
    }
}

/// Each core has a fixed number of inter-core channels; an "extern"
/// instruction must find one free channel on each of its operand qubits'
/// cores (§4.7).
#[derive(Debug, Clone)]
pub struct ChannelResource {
    name: String,
    direction: i8,
    channels_per_core: u32,
    qubit_core: FxHashMap<u32, u32>,
    /// (core, channel) -> busy-until/from
    busy: FxHashMap<(u32, u32), i64>,
}

impl ChannelResource {
    /// Create a new channel resource.
    pub fn new(
        name: impl Into<String>,
        direction: i8,
        channels_per_core: u32,
        qubit_core: FxHashMap<u32, u32>,
    ) -> Self {
        Self {
            name: name.into(),
            direction,
            channels_per_core,
            qubit_core,
            busy: FxHashMap::default(),
        }
    }

    fn free_channel(&self, core: u32, cycle: i64) -> Option<u32> {
        (0..self.channels_per_core).find(|&ch| match self.busy.get(&(core, ch)) {
            None => true,
            Some(&until) => (self.direction > 0 && cycle >= until) || (self.direction < 0 && cycle <= until),
        })
    }
}

impl Resource for ChannelResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn available(&self, cycle: i64, instruction: &InstructionView) -> bool {
        instruction.qubit_indices.iter().all(|q| {
            let Some(&core) = self.qubit_core.get(q) else {
                return true;
            };
            self.free_channel(core, cycle).is_some()
        })
    }

    fn reserve(&mut self, cycle: i64, instruction: &InstructionView) {
        let end = cycle + self.direction as i64 * instruction.duration_cycles as i64;
        for q in &instruction.qubit_indices {
            let Some(&core) = self.qubit_core.get(q) else {
                continue;
            };
            if let Some(ch) = self.free_channel(core, cycle) {
                self.busy.insert((core, ch), end);
            }
        }
    }

    fn dump(&self) -> String {
        format!("channel: {:?}", self.busy)
    }
}

/// A live set of resource instances for one scheduling direction (§3.7).
/// Not reusable across directions or blocks without being rebuilt.
#[derive(Debug)]
pub struct ResourceState {
    resources: Vec<Box<dyn Resource>>,
}

impl ResourceState {
    /// Whether `instruction` can start at `cycle` without conflicting with
    /// any configured resource.
    pub fn available(&self, cycle: i64, instruction: &InstructionView) -> bool {
        self.resources.iter().all(|r| r.available(cycle, instruction))
    }

    /// Reserve `instruction` at `cycle` across every configured resource.
    pub fn reserve(&mut self, cycle: i64, instruction: &InstructionView) {
        for r in &mut self.resources {
            r.reserve(cycle, instruction);
        }
    }

    /// A human-readable dump of every resource's state, used in
    /// `ResourceDeadlock` diagnostics.
    pub fn dump(&self) -> String {
        self.resources.iter().map(|r| r.dump()).collect::<Vec<_>>().join("; ")
    }
}

type ResourceFactory = Box<dyn Fn(&Value, i8) -> Box<dyn Resource> + Send + Sync>;

/// Owns the resource configuration (name to typed parameters) plus a
/// factory; [`ResourceManager::instantiate`] produces a fresh
/// [`ResourceState`] for one scheduling direction (§3.7).
pub struct ResourceManager {
    config: FxHashMap<String, Value>,
    factories: FxHashMap<String, ResourceFactory>,
}

impl std::fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceManager")
            .field("resources", &self.config.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ResourceManager {
    /// Create a manager with the built-in factories registered for the
    /// six core resource kinds (§4.7), reading `resource_config` from the
    /// platform.
    pub fn from_platform(platform: &Platform) -> Self {
        let mut manager = Self {
            config: platform.resource_config.clone(),
            factories: FxHashMap::default(),
        };
        manager.register_builtin("qubit", |_cfg, direction| {
            Box::new(QubitResource::new("qubit", direction))
        });
        manager.register_builtin("qwg", |cfg, direction| {
            let generators = parse_qubit_groups(cfg);
            Box::new(WaveformGeneratorResource::new("qwg", direction, generators))
        });
        manager.register_builtin("measurement_unit", |cfg, direction| {
            let _ = direction;
            let units = parse_qubit_groups(cfg);
            Box::new(MeasurementUnitResource::new("measurement_unit", units))
        });
        manager.register_builtin("edge", |cfg, direction| {
            let (edges, conflicts) = parse_edges(cfg);
            Box::new(EdgeResource::new("edge", direction, edges, conflicts))
        });
        manager.register_builtin("detuned_qubits", |cfg, direction| {
            let parks = parse_parks(cfg);
            Box::new(DetunedQubitsResource::new("detuned_qubits", direction, parks))
        });
        let num_qubits = platform.topology.num_qubits;
        manager.register_builtin("channel", move |cfg, direction| {
            let channels_per_core = cfg.get("channels_per_core").and_then(Value::as_u64).unwrap_or(1) as u32;
            let qubit_core = parse_qubit_core(cfg, num_qubits);
            Box::new(ChannelResource::new("channel", direction, channels_per_core, qubit_core))
        });
        manager
    }

    /// Register (or override) the factory for a named resource kind.
    pub fn register_builtin(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn(&Value, i8) -> Box<dyn Resource> + Send + Sync + 'static,
    ) {
        self.factories.insert(name.into(), Box::new(factory));
    }

    /// Build a fresh [`ResourceState`] for `direction`, instantiating every
    /// configured resource whose name has a registered factory.
    pub fn instantiate(&self, direction: i8) -> ResourceState {
        let empty = Value::Null;
        let resources = self
            .config
            .iter()
            .filter_map(|(name, cfg)| {
                self.factories.get(name).map(|factory| factory(cfg, direction))
            })
            .collect::<Vec<_>>();
        let resources = if resources.is_empty() {
            // No configuration at all still gets the unconditional qubit
            // resource: every platform has qubits, whether or not its JSON
            // configuration names an explicit `qubit` resource entry.
            vec![self
                .factories
                .get("qubit")
                .map(|f| f(&empty, direction))
                .unwrap_or_else(|| Box::new(QubitResource::new("qubit", direction)))]
        } else {
            resources
        };
        ResourceState { resources }
    }
}

fn parse_qubit_groups(cfg: &Value) -> Vec<Vec<u32>> {
    cfg.get("groups")
        .and_then(Value::as_array)
        .map(|groups| {
            groups
                .iter()
                .map(|g| {
                    g.as_array()
                        .map(|qs| qs.iter().filter_map(Value::as_u64).map(|q| q as u32).collect())
                        .unwrap_or_default()
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_edges(cfg: &Value) -> (Vec<(u32, u32)>, FxHashMap<usize, Vec<usize>>) {
    let edges: Vec<(u32, u32)> = cfg
        .get("edges")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|e| {
                    let src = e.get("src").and_then(Value::as_u64)? as u32;
                    let dst = e.get("dst").and_then(Value::as_u64)? as u32;
                    Some((src, dst))
                })
                .collect()
        })
        .unwrap_or_default();
    let mut conflicts: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
    if let Some(list) = cfg.get("conflicting_edges").and_then(Value::as_array) {
        for pair in list {
            let Some(pair) = pair.as_array() else { continue };
            let (Some(a), Some(b)) = (pair.first().and_then(Value::as_u64), pair.get(1).and_then(Value::as_u64))
            else {
                continue;
            };
            conflicts.entry(a as usize).or_default().push(b as usize);
            conflicts.entry(b as usize).or_default().push(a as usize);
        }
    }
    (edges, conflicts)
}

fn parse_parks(cfg: &Value) -> FxHashMap<(u32, u32), Vec<u32>> {
    let mut parks = FxHashMap::default();
    if let Some(list) = cfg.get("parks").and_then(Value::as_array) {
        for entry in list {
            let src = entry.get("src").and_then(Value::as_u64);
            let dst = entry.get("dst").and_then(Value::as_u64);
            let parked = entry
                .get("parked")
                .and_then(Value::as_array)
                .map(|qs| qs.iter().filter_map(Value::as_u64).map(|q| q as u32).collect::<Vec<_>>())
                .unwrap_or_default();
            if let (Some(src), Some(dst)) = (src, dst) {
                parks.insert((src as u32, dst as u32), parked);
            }
        }
    }
    parks
}

/// Explicit `qubit_core` entries win; otherwise, if `number_of_cores` names
/// a multi-core device (§4.7, plumbed in by `qcc_ir::config::load_platform`
/// from `topology.number_of_cores`), distribute every platform qubit across
/// its cores round-robin.
fn parse_qubit_core(cfg: &Value, num_qubits: u32) -> FxHashMap<u32, u32> {
    let mut map = FxHashMap::default();
    if let Some(obj) = cfg.get("qubit_core").and_then(Value::as_object) {
        for (qubit, core) in obj {
            if let (Ok(qubit), Some(core)) = (qubit.parse::<u32>(), core.as_u64()) {
                map.insert(qubit, core as u32);
            }
        }
        return map;
    }
    let num_cores = cfg.get("number_of_cores").and_then(Value::as_u64).unwrap_or(0) as u32;
    if num_cores > 0 {
        for q in 0..num_qubits {
            map.insert(q, q % num_cores);
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(name: &str, duration: u32, qubits: &[u32]) -> InstructionView {
        InstructionView {
            name: name.to_string(),
            duration_cycles: duration,
            qubit_indices: qubits.to_vec(),
        }
    }

    #[test]
    fn qubit_resource_blocks_reused_qubit_until_free() {
        let mut r = QubitResource::new("qubit", 1);
        let inst = view("rz", 20, &[0]);
        assert!(r.available(0, &inst));
        r.reserve(0, &inst);
        assert!(!r.available(5, &inst));
        assert!(r.available(20, &inst));
    }

    #[test]
    fn waveform_generator_allows_same_name_overlap() {
        let mut r = WaveformGeneratorResource::new("qwg", 1, vec![vec![0, 1]]);
        let rx0 = view("rx", 20, &[0]);
        let rx1 = view("rx", 20, &[1]);
        let ry0 = view("ry", 20, &[0]);
        r.reserve(0, &rx0);
        assert!(r.available(10, &rx1));
        assert!(!r.available(10, &ry0));
    }

    #[test]
    fn measurement_unit_requires_exact_start_cycle() {
        let mut r = MeasurementUnitResource::new("measurement_unit", vec![vec![0, 1]]);
        let m0 = view("measure", 300, &[0]);
        let m1 = view("measure", 300, &[1]);
        r.reserve(5, &m0);
        assert!(r.available(5, &m1));
        assert!(!r.available(6, &m1));
    }

    #[test]
    fn qubit_core_explicit_map_wins_over_number_of_cores() {
        let cfg = serde_json::json!({
            "number_of_cores": 2,
            "qubit_core": { "0": 7 },
        });
        let map = parse_qubit_core(&cfg, 4);
        assert_eq!(map.get(&0), Some(&7));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn qubit_core_falls_back_to_round_robin_over_number_of_cores() {
        let cfg = serde_json::json!({ "number_of_cores": 2 });
        let map = parse_qubit_core(&cfg, 4);
        assert_eq!(map, FxHashMap::from_iter([(0, 0), (1, 1), (2, 0), (3, 1)]));
    }

    #[test]
    fn channel_resource_via_platform_uses_number_of_cores_fallback() {
        let mut platform = Platform::new("t", qcc_ir::Topology::linear(4));
        platform.resource_config.insert(
            "channel".to_string(),
            serde_json::json!({ "number_of_cores": 2 }),
        );
        let manager = ResourceManager::from_platform(&platform);
        let mut state = manager.instantiate(1);
        let inst = view("extern", 1, &[0, 1]);
        assert!(state.available(0, &inst));
        state.reserve(0, &inst);
    }
}
