//! Pass manager: the root pass, its factory, and the two built-in passes
//! that drive scheduling and initial placement (§4.10, §6.3).

use std::time::Duration;

use rustc_hash::FxHashMap;
use tracing::{debug, info, instrument};

use qcc_ir::{CommutationPolicy, Program};
use qcc_place::{solve as place_solve, Kernel, Mapping, PlaceConfig};
use qcc_sched::{
    build_ddg, compute_deep_criticality, instruction_view, schedule_block, DeepCriticalityHeuristic, ResourceManager, ScheduleConfig, Trivial,
};

use crate::error::{PassError, PassResult};
use crate::option::{Opt, OptionValue};
use crate::pass::{NodeType, Pass, PassState};

/// A pass constructor, keyed by dotted type name (e.g. `sch.schedule`).
pub type PassFactoryFn = fn(&str) -> Box<dyn Pass>;

/// Registry of known pass type names (§4.10).
pub struct Factory {
    constructors: FxHashMap<String, PassFactoryFn>,
}

impl Factory {
    /// A factory pre-populated with the built-in scheduling and
    /// initial-placement passes.
    pub fn with_builtins() -> Self {
        let mut factory = Self { constructors: FxHashMap::default() };
        factory.register("sch.schedule", |name| Box::new(SchedulePass::new(name)));
        factory.register("map.qubits.place_mip", |name| Box::new(PlaceMipPass::new(name)));
        factory
    }

    /// Register a pass constructor under `type_name`, overwriting any
    /// existing registration.
    pub fn register(&mut self, type_name: &str, ctor: PassFactoryFn) {
        self.constructors.insert(type_name.to_string(), ctor);
    }

    /// Instantiate a pass of `type_name` named `instance_name`.
    pub fn create(&self, type_name: &str, instance_name: &str) -> PassResult<Box<dyn Pass>> {
        let ctor = self
            .constructors
            .get(type_name)
            .ok_or_else(|| PassError::UnknownPassType(type_name.to_string()))?;
        Ok(ctor(instance_name))
    }
}

/// The root of a pass tree (§4.10). Owns a [`Factory`] used to instantiate
/// sub-passes by type name, orchestrates `construct_recursive`, and runs
/// the whole tree via [`Pass::compile`].
pub struct Manager {
    state: PassState,
    factory: Factory,
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager").field("sub_passes", &self.sub_passes().len()).finish()
    }
}

impl Manager {
    /// Create an empty manager. The root has no instance name and is
    /// addressed by its children's own paths (§4.10).
    pub fn new() -> Self {
        Self { state: PassState::new("manager", ""), factory: Factory::with_builtins() }
    }

    /// Instantiate a pass from the manager's factory and append it as a
    /// top-level sub-pass. Errors if `instance_name` collides with an
    /// existing sibling.
    pub fn add_pass(&mut self, type_name: &str, instance_name: &str) -> PassResult<()> {
        let pass = self.factory.create(type_name, instance_name)?;
        if self.sub_passes().iter().any(|p| p.instance_name() == instance_name) {
            return Err(PassError::DuplicateInstanceName(instance_name.to_string()));
        }
        self.sub_passes_mut().push(pass);
        Ok(())
    }

    /// Register an additional pass constructor on this manager's factory.
    pub fn register_pass_type(&mut self, type_name: &str, ctor: PassFactoryFn) {
        self.factory.register(type_name, ctor);
    }

    /// Call `construct()` on every pass in the tree, pre-order, then
    /// validate that every dotted path (instance name chain) is unique
    /// tree-wide (§4.10).
    pub fn construct_recursive(&mut self) -> PassResult<()> {
        self.construct();
        construct_children(self.sub_passes_mut());
        let mut seen = std::collections::HashSet::new();
        collect_paths(self.sub_passes(), String::new(), &mut seen)?;
        Ok(())
    }

    /// Set an option by dotted path (`pass.sub.option`); wildcards `*`/`?`
    /// match a single path component, `**` matches any number of them
    /// (§4.9). Errors if `must_exist` and the path matches nothing.
    pub fn set_option(&mut self, path: &str, raw_value: &str, must_exist: bool) -> PassResult<usize> {
        let segments: Vec<&str> = path.split('.').collect();
        let Some((option_name, pass_path)) = segments.split_last() else {
            return Ok(0);
        };
        if pass_path.is_empty() {
            self.options_mut()?.set(option_name, raw_value)?;
            return Ok(1);
        }
        let paths = match_paths(self.sub_passes(), pass_path);
        if paths.is_empty() {
            if must_exist {
                return Err(PassError::WildcardNoMatch { path: path.to_string() });
            }
            return Ok(0);
        }
        for index_path in &paths {
            let target = pass_at_path_mut(self.sub_passes_mut(), index_path);
            target.options_mut()?.set(option_name, raw_value)?;
        }
        Ok(paths.len())
    }

    /// Run the whole tree over `ir`. Catches `SchedError::ResourceDeadlock`
    /// specifically: dumps the failing tree's option help if a pass has
    /// `debug` configured, and returns the error with its path chain
    /// intact. Any other error (including a propagated
    /// `qcc_ir::IrError::Configuration`) is not caught and aborts the
    /// compile immediately (§3.4/§7).
    #[instrument(skip(self, ir))]
    pub fn run(&mut self, ir: &mut Program) -> PassResult<()> {
        info!(program = %ir.name, sub_passes = self.sub_passes().len(), "running pass manager");
        self.construct_recursive()?;
        match self.compile(ir, "") {
            Ok(_) => {
                info!("pass manager completed");
                Ok(())
            }
            Err(err) if err.is_resource_deadlock() => {
                debug!(error = %err, options = %self.options().help(), "resource deadlock");
                Err(err)
            }
            Err(err) => Err(err),
        }
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

impl Pass for Manager {
    fn state(&self) -> &PassState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut PassState {
        &mut self.state
    }

    fn build(&mut self) -> NodeType {
        NodeType::Group
    }

    fn run_internal(&mut self, _ir: &mut Program, _path: &str) -> PassResult<i64> {
        Ok(0)
    }
}

fn construct_children(passes: &mut [Box<dyn Pass>]) {
    for pass in passes {
        pass.construct();
        construct_children(pass.sub_passes_mut());
    }
}

fn collect_paths(passes: &[Box<dyn Pass>], prefix: String, seen: &mut std::collections::HashSet<String>) -> PassResult<()> {
    for pass in passes {
        let path = if prefix.is_empty() { pass.instance_name().to_string() } else { format!("{prefix}.{}", pass.instance_name()) };
        if !seen.insert(path.clone()) {
            return Err(PassError::DuplicateInstanceName(path));
        }
        collect_paths(pass.sub_passes(), path, seen)?;
    }
    Ok(())
}

fn glob_match(pattern: &str, text: &str) -> bool {
    fn inner(p: &[u8], t: &[u8]) -> bool {
        match (p.first(), t.first()) {
            (None, None) => true,
            (Some(b'*'), _) => inner(&p[1..], t) || (!t.is_empty() && inner(p, &t[1..])),
            (Some(b'?'), Some(_)) => inner(&p[1..], &t[1..]),
            (Some(&pc), Some(&tc)) if pc == tc => inner(&p[1..], &t[1..]),
            _ => false,
        }
    }
    inner(pattern.as_bytes(), text.as_bytes())
}

/// Resolve a dotted, possibly-wildcarded pass path against `passes`,
/// returning the index path (a chain of sibling-list positions) of every
/// match. Matching stays read-only so the caller can apply edits with a
/// second, single-path mutable descent per match (`pass_at_path_mut`)
/// instead of juggling many live `&mut` borrows into the same tree.
fn match_paths(passes: &[Box<dyn Pass>], segments: &[&str]) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    let mut prefix = Vec::new();
    match_paths_into(passes, segments, &mut prefix, &mut out);
    out
}

fn match_paths_into(passes: &[Box<dyn Pass>], segments: &[&str], prefix: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
    let Some((seg, rest)) = segments.split_first() else {
        return;
    };
    if *seg == "**" {
        collect_any_depth(passes, rest, prefix, out);
        return;
    }
    for (idx, pass) in passes.iter().enumerate() {
        if glob_match(seg, pass.instance_name()) {
            prefix.push(idx);
            if rest.is_empty() {
                out.push(prefix.clone());
            } else {
                match_paths_into(pass.sub_passes(), rest, prefix, out);
            }
            prefix.pop();
        }
    }
}

/// `**` consumed; `rest` may still match starting at this level (zero
/// further levels consumed) or at any descendant level.
fn collect_any_depth(passes: &[Box<dyn Pass>], rest: &[&str], prefix: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
    if rest.is_empty() {
        for (idx, pass) in passes.iter().enumerate() {
            prefix.push(idx);
            out.push(prefix.clone());
            collect_any_depth(pass.sub_passes(), rest, prefix, out);
            prefix.pop();
        }
        return;
    }
    match_paths_into(passes, rest, prefix, out);
    for (idx, pass) in passes.iter().enumerate() {
        prefix.push(idx);
        collect_any_depth(pass.sub_passes(), rest, prefix, out);
        prefix.pop();
    }
}

fn pass_at_path_mut<'a>(passes: &'a mut [Box<dyn Pass>], path: &[usize]) -> &'a mut dyn Pass {
    let (&first, rest) = path.split_first().expect("index path is never empty");
    if rest.is_empty() {
        passes[first].as_mut()
    } else {
        pass_at_path_mut(passes[first].sub_passes_mut(), rest)
    }
}

/// Built-in pass wrapping [`qcc_sched::schedule_block`] over every
/// sub-block of the program, factory name `sch.schedule` (§6.3).
#[derive(Debug)]
struct SchedulePass {
    state: PassState,
}

impl SchedulePass {
    fn new(instance_name: &str) -> Self {
        let mut state = PassState::new("sch.schedule", instance_name);
        state
            .options_mut_for_build()
            .add(Opt::new(
                "heuristic",
                "criticality heuristic used to break scheduling ties",
                OptionValue::Enum { value: "trivial".to_string(), allowed: vec!["trivial".into(), "deep".into()] },
            ))
            .expect("fresh option set never collides");
        state
            .options_mut_for_build()
            .add(Opt::new(
                "max_blocked_cycles",
                "consecutive blocked cycle advances before ResourceDeadlock",
                OptionValue::Int { value: 10_000, min: 1, max: i64::MAX, synonyms: FxHashMap::default() },
            ))
            .expect("fresh option set never collides");
        Self { state }
    }
}

impl Pass for SchedulePass {
    fn state(&self) -> &PassState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut PassState {
        &mut self.state
    }

    fn build(&mut self) -> NodeType {
        NodeType::Normal
    }

    fn run_internal(&mut self, ir: &mut Program, path: &str) -> PassResult<i64> {
        let resources = ResourceManager::from_platform(&ir.platform);
        let use_deep = self.options().get("heuristic").and_then(|o| o.value().as_str()) == Some("deep");
        let max_blocked_cycles: u32 = self
            .options()
            .get("max_blocked_cycles")
            .and_then(|o| o.value().as_int())
            .unwrap_or(10_000)
            .try_into()
            .unwrap_or(u32::MAX);
        let config = ScheduleConfig { max_blocked_cycles };
        let platform = ir.platform.clone();

        let policy = CommutationPolicy::default();
        let mut blocks_scheduled = 0i64;
        let mut schedule_error = None;
        ir.for_each_sub_block_mut(|body| {
            if schedule_error.is_some() {
                return;
            }
            let result = if use_deep {
                // `schedule_block` builds its own DDG internally; rebuilding
                // one here with the same (platform, body, policy) gives
                // identical node indices, so the annotations line up.
                let ddg = build_ddg(&platform, body, policy);
                let annotations = compute_deep_criticality(&ddg);
                let heuristic = DeepCriticalityHeuristic { annotations };
                schedule_block(&platform, body, &resources, &heuristic, policy, config)
            } else {
                schedule_block(&platform, body, &resources, &Trivial, policy, config)
            };
            match result {
                Ok(()) => blocks_scheduled += 1,
                Err(e) => schedule_error = Some(e),
            }
        });

        if let Some(e) = schedule_error {
            return Err(PassError::from(e).with_path(path.to_string()));
        }
        Ok(blocks_scheduled)
    }
}

/// Built-in pass wrapping [`qcc_place::solve`], factory name
/// `map.qubits.place_mip` (§6.3).
#[derive(Debug)]
struct PlaceMipPass {
    state: PassState,
}

impl PlaceMipPass {
    fn new(instance_name: &str) -> Self {
        let mut state = PassState::new("map.qubits.place_mip", instance_name);
        state
            .options_mut_for_build()
            .add(Opt::new(
                "horizon",
                "number of leading two-qubit gates scanned",
                OptionValue::Int { value: 10_000, min: 1, max: i64::MAX, synonyms: FxHashMap::default() },
            ))
            .expect("fresh option set never collides");
        state
            .options_mut_for_build()
            .add(Opt::new(
                "timeout_ms",
                "wall-clock solve budget, in milliseconds",
                OptionValue::Int { value: 5_000, min: 1, max: i64::MAX, synonyms: FxHashMap::default() },
            ))
            .expect("fresh option set never collides");
        state
            .options_mut_for_build()
            .add(Opt::new("map_all", "complete the mapping with an arbitrary permutation of unused locations", OptionValue::Bool(false)))
            .expect("fresh option set never collides");
        Self { state }
    }
}

impl Pass for PlaceMipPass {
    fn state(&self) -> &PassState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut PassState {
        &mut self.state
    }

    fn build(&mut self) -> NodeType {
        NodeType::Normal
    }

    fn run_internal(&mut self, ir: &mut Program, _path: &str) -> PassResult<i64> {
        let horizon = self.options().get("horizon").and_then(|o| o.value().as_int()).unwrap_or(10_000) as usize;
        let timeout_ms = self.options().get("timeout_ms").and_then(|o| o.value().as_int()).unwrap_or(5_000) as u64;
        let map_all = self.options().get("map_all").and_then(|o| o.value().as_bool()).unwrap_or(false);
        let config = PlaceConfig { horizon, timeout: Duration::from_millis(timeout_ms), map_all };

        let platform = ir.platform.clone();
        let two_qubit_gates = collect_two_qubit_gates(ir, &platform);
        let kernel = Kernel::new(two_qubit_gates);
        let input_mapping = Mapping::identity(platform.topology.num_qubits);
        let (_mapping, outcome) = place_solve(&platform.topology, &kernel, &config, &input_mapping);
        Ok(outcome as i64)
    }
}

fn collect_two_qubit_gates(ir: &mut Program, platform: &qcc_ir::Platform) -> Vec<(u32, u32)> {
    let mut gates = Vec::new();
    ir.for_each_sub_block_mut(|body| {
        for stmt in &body.statements {
            if let Some(view) = instruction_view(platform, stmt) {
                if let [a, b] = view.qubit_indices[..] {
                    gates.push((a, b));
                }
            }
        }
    });
    gates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_pass_type_is_rejected() {
        let mut manager = Manager::new();
        assert!(manager.add_pass("no.such.pass", "x").is_err());
    }

    #[test]
    fn duplicate_instance_name_is_rejected() {
        let mut manager = Manager::new();
        manager.add_pass("sch.schedule", "sched").unwrap();
        assert!(manager.add_pass("sch.schedule", "sched").is_err());
    }

    #[test]
    fn glob_match_supports_star_and_question_mark() {
        assert!(glob_match("sch*", "schedule"));
        assert!(glob_match("sc?e", "scxe"));
        assert!(!glob_match("sc?e", "scxxe"));
    }

    #[test]
    fn set_option_resolves_direct_and_wildcard_paths() {
        let mut manager = Manager::new();
        manager.add_pass("sch.schedule", "sched").unwrap();
        manager.construct_recursive().unwrap();
        assert_eq!(manager.set_option("sched.heuristic", "deep", true).unwrap(), 1);
        assert_eq!(manager.set_option("**.heuristic", "trivial", true).unwrap(), 1);
        assert!(manager.set_option("nope.heuristic", "deep", true).is_err());
    }
}
