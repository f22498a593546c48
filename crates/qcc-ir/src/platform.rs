//! Platform: the owning root of types, objects, instruction types,
//! function types, topology, and resource configuration (§3.2, §4.1, §4.2).

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::arena::{Arena, Link};
use crate::datatype::{DataType, PhysicalObject};
use crate::error::{validate_identifier, IrError, IrResult};
use crate::expr::Expr;
use crate::instruction_type::{FunctionType, InstructionType, OperandType};

/// Qubit-count-and-connectivity capability of a device (§3.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topology {
    /// Number of qubits the device exposes.
    pub num_qubits: u32,
    /// Default edges (undirected pairs of qubit indices).
    pub edges: Vec<(u32, u32)>,
    /// Precomputed all-pairs shortest-path distance table, `num_qubits x
    /// num_qubits`, `u32::MAX` where unreachable.
    distances: Vec<u32>,
}

impl Topology {
    /// Build a topology from an explicit edge list.
    pub fn new(num_qubits: u32, edges: Vec<(u32, u32)>) -> Self {
        let distances = compute_distances(num_qubits, &edges);
        Self {
            num_qubits,
            edges,
            distances,
        }
    }

    /// Build a fully connected topology (every pair of qubits is an edge).
    pub fn fully_connected(num_qubits: u32) -> Self {
        let mut edges = Vec::new();
        for a in 0..num_qubits {
            for b in (a + 1)..num_qubits {
                edges.push((a, b));
            }
        }
        Self::new(num_qubits, edges)
    }

    /// Build a linear-chain topology: qubit `i` connects to `i+1`.
    pub fn linear(num_qubits: u32) -> Self {
        let edges = (0..num_qubits.saturating_sub(1)).map(|i| (i, i + 1)).collect();
        Self::new(num_qubits, edges)
    }

    /// Shortest-path distance between two qubit indices, or `None` if
    /// unreachable.
    pub fn distance(&self, a: u32, b: u32) -> Option<u32> {
        let idx = (a as usize) * (self.num_qubits as usize) + (b as usize);
        self.distances.get(idx).copied().filter(|&d| d != u32::MAX)
    }

    /// Whether `(a, b)` is a default edge (in either direction).
    pub fn is_edge(&self, a: u32, b: u32) -> bool {
        self.distance(a, b) == Some(1)
    }
}

fn compute_distances(num_qubits: u32, edges: &[(u32, u32)]) -> Vec<u32> {
    let n = num_qubits as usize;
    let mut adjacency = vec![Vec::new(); n];
    for &(a, b) in edges {
        adjacency[a as usize].push(b as usize);
        adjacency[b as usize].push(a as usize);
    }
    let mut distances = vec![u32::MAX; n * n];
    for src in 0..n {
        distances[src * n + src] = 0;
        let mut queue = std::collections::VecDeque::new();
        queue.push_back(src);
        while let Some(u) = queue.pop_front() {
            let du = distances[src * n + u];
            for &v in &adjacency[u] {
                if distances[src * n + v] == u32::MAX {
                    distances[src * n + v] = du + 1;
                    queue.push_back(v);
                }
            }
        }
    }
    distances
}

/// A platform: the owned root of the IR's static registries (§3.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Platform {
    /// Platform name.
    pub name: String,

    type_arena: Arena<DataType>,
    types: Vec<(String, Link<DataType>)>,

    object_arena: Arena<PhysicalObject>,
    objects: Vec<(String, Link<PhysicalObject>)>,
    /// The main qubit register, if one has been designated.
    main_qubit_register: Option<Link<PhysicalObject>>,
    /// The implicit bit register paired with the main qubit register.
    main_implicit_bits: Option<Link<PhysicalObject>>,

    instr_arena: Arena<InstructionType>,
    /// Name-sorted list of *generalized* (non-specialized) instruction
    /// types. Overloads of the same name are permitted (§4.2), so this is
    /// sorted but not required to be unique by name.
    instruction_types: Vec<(String, Link<InstructionType>)>,

    function_arena: Arena<FunctionType>,
    functions: Vec<(String, Link<FunctionType>)>,

    /// Device topology.
    pub topology: Topology,
    /// Architecture namespace string, drives backend selection.
    pub architecture: String,
    /// Resource-manager configuration: resource name to typed parameters.
    pub resource_config: FxHashMap<String, Value>,
    /// Remaining platform-specific data not modeled above.
    pub extra: Value,
}

impl Platform {
    /// Create a new, empty platform over the given topology.
    pub fn new(name: impl Into<String>, topology: Topology) -> Self {
        Self {
            name: name.into(),
            type_arena: Arena::new(),
            types: Vec::new(),
            object_arena: Arena::new(),
            objects: Vec::new(),
            main_qubit_register: None,
            main_implicit_bits: None,
            instr_arena: Arena::new(),
            instruction_types: Vec::new(),
            function_arena: Arena::new(),
            functions: Vec::new(),
            topology,
            architecture: "none".to_string(),
            resource_config: FxHashMap::default(),
            extra: Value::Null,
        }
    }

    // ---- Type registry (§4.1) --------------------------------------

    /// Add a data type under `name`. Fails on an invalid identifier or a
    /// duplicate name, leaving the registry untouched (§8 property 3).
    pub fn add_type(&mut self, name: impl Into<String>, data_type: DataType) -> IrResult<Link<DataType>> {
        let name = name.into();
        validate_identifier(&name)?;
        let pos = self
            .types
            .binary_search_by(|(n, _)| n.as_str().cmp(name.as_str()));
        if pos.is_ok() {
            return Err(IrError::Duplicate {
                registry: "types",
                name,
            });
        }
        let link = self.type_arena.insert(data_type);
        let insert_at = pos.unwrap_err();
        self.types.insert(insert_at, (name, link));
        Ok(link)
    }

    /// Find a data type link by name.
    pub fn find_type(&self, name: &str) -> Option<Link<DataType>> {
        self.types
            .binary_search_by(|(n, _)| n.as_str().cmp(name))
            .ok()
            .map(|i| self.types[i].1)
    }

    /// Resolve a data-type link to its value.
    pub fn type_value(&self, link: Link<DataType>) -> &DataType {
        &self.type_arena[link]
    }

    // ---- Physical object registry (§4.1) -----------------------------

    /// Add a physical object (register array) under `name`.
    pub fn add_physical_object(
        &mut self,
        name: impl Into<String>,
        object: PhysicalObject,
    ) -> IrResult<Link<PhysicalObject>> {
        let name = name.into();
        validate_identifier(&name)?;
        let pos = self
            .objects
            .binary_search_by(|(n, _)| n.as_str().cmp(name.as_str()));
        if pos.is_ok() {
            return Err(IrError::Duplicate {
                registry: "physical objects",
                name,
            });
        }
        let link = self.object_arena.insert(object);
        let insert_at = pos.unwrap_err();
        self.objects.insert(insert_at, (name, link));
        Ok(link)
    }

    /// Find a physical object link by name.
    pub fn find_physical_object(&self, name: &str) -> Option<Link<PhysicalObject>> {
        self.objects
            .binary_search_by(|(n, _)| n.as_str().cmp(name))
            .ok()
            .map(|i| self.objects[i].1)
    }

    /// Resolve a physical-object link to its value.
    pub fn object_value(&self, link: Link<PhysicalObject>) -> &PhysicalObject {
        &self.object_arena[link]
    }

    /// Add the main qubit register and its implicit, same-shape bit
    /// register (§3.2's implicit-rule invariant).
    pub fn add_main_qubit_register(
        &mut self,
        name: impl Into<String>,
        shape: Vec<u32>,
    ) -> IrResult<(Link<PhysicalObject>, Link<PhysicalObject>)> {
        let name = name.into();
        let qubit_obj = PhysicalObject::new(name.clone(), DataType::Qubit, shape.clone());
        let qlink = self.add_physical_object(name.clone(), qubit_obj)?;
        let bit_obj = PhysicalObject::new(format!("{name}_b"), DataType::Bit, shape);
        let blink = self.add_physical_object(format!("{name}_b"), bit_obj)?;
        self.main_qubit_register = Some(qlink);
        self.main_implicit_bits = Some(blink);
        Ok((qlink, blink))
    }

    /// The implicit bit register paired with the main qubit register, if any.
    pub fn main_implicit_bits(&self) -> Option<Link<PhysicalObject>> {
        self.main_implicit_bits
    }

    /// The main qubit register, if designated.
    pub fn main_qubit_register(&self) -> Option<Link<PhysicalObject>> {
        self.main_qubit_register
    }

    // ---- Instruction-type registry (§4.2) ----------------------------

    /// Implements the add-instruction-type algorithm of §4.2.
    ///
    /// `operand_types` is the *full* un-pinned operand prototype of the
    /// generalized form (the type the specialization tree descends from).
    /// `template_operand_values`, if non-empty, pins a prefix of those
    /// operands to literal expressions, producing (or returning an
    /// existing) specialization.
    pub fn add_instruction_type(
        &mut self,
        name: impl Into<String>,
        external_name: impl Into<String>,
        operand_types: Vec<OperandType>,
        duration_cycles: u32,
        template_operand_values: Vec<Expr>,
    ) -> IrResult<Link<InstructionType>> {
        let name = name.into();
        validate_identifier(&name)?;

        let existing = self.find_generalization(&name, &operand_types);

        if existing.is_some() && template_operand_values.is_empty() {
            return Err(IrError::Duplicate {
                registry: "instruction types",
                name,
            });
        }

        let generalization = match existing {
            Some(link) => link,
            None => {
                let it = InstructionType::new(
                    name.clone(),
                    external_name,
                    operand_types,
                    duration_cycles,
                );
                let link = self.instr_arena.insert(it);
                let pos = self
                    .instruction_types
                    .partition_point(|(n, _)| n.as_str() < name.as_str());
                self.instruction_types.insert(pos, (name.clone(), link));
                link
            }
        };

        if template_operand_values.is_empty() {
            return Ok(generalization);
        }

        // Step 3: descend/build the specialization chain, one template
        // operand at a time.
        let mut current = generalization;
        for depth in 1..=template_operand_values.len() {
            let prefix = &template_operand_values[..depth];
            let existing_child = self.instr_arena[current]
                .specializations
                .iter()
                .copied()
                .find(|&child| {
                    self.instr_arena[child].template_operands.as_deref() == Some(prefix)
                });

            current = match existing_child {
                Some(child) => child,
                None => {
                    let parent = &self.instr_arena[current];
                    let mut child_operand_types = parent.operand_types.clone();
                    if child_operand_types.is_empty() {
                        return Err(IrError::InvalidOperand(format!(
                            "instruction type '{name}' has no remaining operand to specialize at depth {depth}"
                        )));
                    }
                    child_operand_types.remove(0);
                    let mut child = InstructionType::new(
                        parent.name.clone(),
                        parent.external_name.clone(),
                        child_operand_types,
                        parent.duration_cycles,
                    );
                    child.template_operands = Some(prefix.to_vec());
                    child.generalization = Some(current);
                    let child_link = self.instr_arena.insert(child);
                    self.instr_arena[current].specializations.push(child_link);
                    child_link
                }
            };
        }

        Ok(current)
    }

    /// Search top-level (generalized) instruction types for `name` with an
    /// exact operand-type-list match.
    fn find_generalization(
        &self,
        name: &str,
        operand_types: &[OperandType],
    ) -> Option<Link<InstructionType>> {
        self.instruction_types
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, link)| *link)
            .find(|&link| self.instr_arena[link].operand_types == operand_types)
    }

    /// Find the most specialized instruction type matching `name` and the
    /// requested operand *types* (ignoring access mode). If no match
    /// exists and `synthesize` is true, clone the first instruction type
    /// sharing `name`, overwrite its operand list with `operand_types` all
    /// in `Write` mode, and insert the synthesized overload.
    pub fn find_instruction_type(
        &mut self,
        name: &str,
        operand_types: &[DataType],
        synthesize: bool,
    ) -> Option<Link<InstructionType>> {
        let found = self.instruction_types.iter().find(|(n, link)| {
            n == name
                && self.instr_arena[*link]
                    .operand_types
                    .iter()
                    .map(|ot| &ot.data_type)
                    .eq(operand_types.iter())
        });
        if let Some((_, link)) = found {
            return Some(*link);
        }
        if !synthesize {
            return None;
        }
        let template = self
            .instruction_types
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, link)| *link)?;
        let mut clone = self.instr_arena[template].clone();
        clone.operand_types = operand_types
            .iter()
            .map(|dt| OperandType::new(crate::instruction_type::AccessMode::Write, dt.clone()))
            .collect();
        clone.template_operands = None;
        clone.generalization = None;
        clone.specializations.clear();
        let new_link = self.instr_arena.insert(clone);
        let pos = self
            .instruction_types
            .partition_point(|(n, _)| n.as_str() < name);
        self.instruction_types
            .insert(pos, (name.to_string(), new_link));
        Some(new_link)
    }

    /// Resolve an instruction-type link to its value.
    pub fn instruction_type(&self, link: Link<InstructionType>) -> &InstructionType {
        &self.instr_arena[link]
    }

    /// Resolve an instruction-type link to its value, mutably (used to
    /// attach [`crate::instruction_type::DecompositionRule`]s, §3.5).
    pub fn instruction_type_mut(&mut self, link: Link<InstructionType>) -> &mut InstructionType {
        &mut self.instr_arena[link]
    }

    /// Walk the specialization tree of `link`'s instruction type using the
    /// literal operand values in `operands`, returning the deepest
    /// (most-specialized) match whose pinned template operands agree with
    /// a prefix of `operands`.
    pub fn specialize_instruction(
        &self,
        link: Link<InstructionType>,
        operands: &[Expr],
    ) -> Link<InstructionType> {
        let mut current = link;
        loop {
            let node = &self.instr_arena[current];
            let next_depth = node.specialization_depth() + 1;
            let Some(candidate_value) = operands.get(next_depth - 1) else {
                break;
            };
            let next = node.specializations.iter().copied().find(|&child| {
                self.instr_arena[child]
                    .template_operands
                    .as_ref()
                    .and_then(|t| t.last())
                    == Some(candidate_value)
            });
            match next {
                Some(child) => current = child,
                None => break,
            }
        }
        current
    }

    /// Walk upward through generalizations, returning the most general
    /// link together with the template operands that must be prepended to
    /// any remaining operand list to reconstruct the full operand sequence.
    pub fn generalize_instruction(&self, link: Link<InstructionType>) -> (Link<InstructionType>, Vec<Expr>) {
        let node = &self.instr_arena[link];
        match node.generalization {
            None => (link, Vec::new()),
            Some(parent) => {
                let (root, mut prefix) = self.generalize_instruction(parent);
                if let Some(template) = &node.template_operands {
                    if let Some(last) = template.last() {
                        prefix.push(last.clone());
                    }
                }
                (root, prefix)
            }
        }
    }

    // ---- Function-type registry ---------------------------------------

    /// Add a function type under `name`.
    pub fn add_function_type(
        &mut self,
        name: impl Into<String>,
        function: FunctionType,
    ) -> IrResult<Link<FunctionType>> {
        let name = name.into();
        validate_identifier(&name)?;
        if self.functions.iter().any(|(n, _)| n == &name) {
            return Err(IrError::Duplicate {
                registry: "function types",
                name,
            });
        }
        let link = self.function_arena.insert(function);
        let pos = self.functions.partition_point(|(n, _)| n.as_str() < name.as_str());
        self.functions.insert(pos, (name, link));
        Ok(link)
    }

    /// Find a function type link by name.
    pub fn find_function_type(&self, name: &str) -> Option<Link<FunctionType>> {
        self.functions.iter().find(|(n, _)| n == name).map(|(_, l)| *l)
    }

    /// Resolve a function-type link to its value.
    pub fn function_value(&self, link: Link<FunctionType>) -> &FunctionType {
        &self.function_arena[link]
    }

    /// Check registry invariant: every registry's names are strictly
    /// sorted and valid identifiers (§8 property 1).
    pub fn check_sorted_invariant(&self) -> bool {
        is_strictly_sorted(&self.types) && is_strictly_sorted(&self.objects)
    }
}

fn is_strictly_sorted<T>(entries: &[(String, Link<T>)]) -> bool {
    entries.windows(2).all(|w| w[0].0 < w[1].0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction_type::AccessMode;

    fn platform() -> Platform {
        Platform::new("test", Topology::fully_connected(5))
    }

    #[test]
    fn add_and_find_type() {
        let mut p = platform();
        let link = p.add_type("angle", DataType::Real).unwrap();
        assert_eq!(p.find_type("angle"), Some(link));
        assert!(p.check_sorted_invariant());
    }

    #[test]
    fn duplicate_type_fails_without_mutating() {
        let mut p = platform();
        p.add_type("angle", DataType::Real).unwrap();
        let before = p.types.len();
        let err = p.add_type("angle", DataType::Real);
        assert!(err.is_err());
        assert_eq!(p.types.len(), before);
    }

    #[test]
    fn sorted_insertion_order() {
        let mut p = platform();
        p.add_type("zeta", DataType::Real).unwrap();
        p.add_type("alpha", DataType::Real).unwrap();
        p.add_type("mu", DataType::Real).unwrap();
        let names: Vec<_> = p.types.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["alpha", "mu", "zeta"]);
    }

    #[test]
    fn main_qubit_register_has_implicit_bits() {
        let mut p = platform();
        let (q, b) = p.add_main_qubit_register("q", vec![5]).unwrap();
        assert_eq!(p.object_value(q).data_type, DataType::Qubit);
        assert_eq!(p.object_value(b).data_type, DataType::Bit);
        assert_eq!(p.object_value(q).shape, p.object_value(b).shape);
    }

    #[test]
    fn instruction_specialization_chain_length_two() {
        let mut p = platform();
        let crz = p
            .add_instruction_type(
                "cr",
                "cr",
                vec![
                    OperandType::new(AccessMode::CommuteZ, DataType::Qubit),
                    OperandType::new(AccessMode::CommuteZ, DataType::Qubit),
                ],
                40,
                vec![],
            )
            .unwrap();

        let template = vec![Expr::int_literal(0, 32, false), Expr::int_literal(1, 32, false)];
        let specialized = p
            .add_instruction_type(
                "cr",
                "cr",
                vec![
                    OperandType::new(AccessMode::CommuteZ, DataType::Qubit),
                    OperandType::new(AccessMode::CommuteZ, DataType::Qubit),
                ],
                40,
                template.clone(),
            )
            .unwrap();

        assert_ne!(crz, specialized);
        let (root, prefix) = p.generalize_instruction(specialized);
        assert_eq!(root, crz);
        assert_eq!(prefix, template);
    }

    #[test]
    fn find_instruction_type_synthesizes_conservative_overload() {
        let mut p = platform();
        p.add_instruction_type(
            "toffoli",
            "toffoli",
            vec![
                OperandType::new(AccessMode::CommuteZ, DataType::Qubit),
                OperandType::new(AccessMode::CommuteZ, DataType::Qubit),
                OperandType::new(AccessMode::Write, DataType::Qubit),
            ],
            80,
            vec![],
        )
        .unwrap();

        let synthesized = p
            .find_instruction_type("toffoli", &[DataType::Qubit, DataType::Qubit], true)
            .expect("synthesized overload");
        let node = p.instruction_type(synthesized);
        assert_eq!(node.operand_types.len(), 2);
        assert!(node
            .operand_types
            .iter()
            .all(|ot| ot.mode == AccessMode::Write));
    }
}
