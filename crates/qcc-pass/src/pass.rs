//! The pass-tree framework (§4.9): node types, conditions, the `Pass`
//! trait lifecycle, group-editing, and the debug-artifact substitution
//! grammar.

use std::fs;
use std::path::Path;

use qcc_ir::Program;

use crate::error::{PassError, PassResult};
use crate::option::{Opt, OptionValue, Options};

/// The execution shape a pass settles on at `construct()` time (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    /// Runs `run_internal` once; no sub-passes.
    Normal,
    /// Runs every sub-pass in order; no condition.
    Group,
    /// Runs `run_internal`, tests `condition`, and conditionally runs
    /// sub-passes once.
    GroupIf,
    /// Runs `run_internal` → test → sub-passes, looping while true.
    GroupWhile,
    /// Runs sub-passes → `run_internal` → test, looping while true.
    GroupRepeatUntilNot,
}

/// A comparison relation used by [`Condition::Compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Relation {
    fn holds(self, lhs: i64, rhs: i64) -> bool {
        match self {
            Relation::Eq => lhs == rhs,
            Relation::Ne => lhs != rhs,
            Relation::Gt => lhs > rhs,
            Relation::Ge => lhs >= rhs,
            Relation::Lt => lhs < rhs,
            Relation::Le => lhs <= rhs,
        }
    }
}

/// The condition a `GroupIf`/`GroupWhile`/`GroupRepeatUntilNot` pass tests
/// its `run_internal` return value against (§4.9).
#[derive(Debug, Clone)]
pub enum Condition {
    /// `value <op> threshold` for some [`Relation`].
    Compare { value: i64, relation: Relation },
    /// Whether `value` falls in `[min, max]`, optionally inverted.
    Range { min: i64, max: i64, invert: bool },
}

impl Condition {
    /// Evaluate the condition against a pass's `run_internal` result.
    pub fn evaluate(&self, value: i64) -> bool {
        match self {
            Condition::Compare { value: rhs, relation } => relation.holds(value, *rhs),
            Condition::Range { min, max, invert } => {
                let inside = value >= *min && value <= *max;
                if *invert {
                    !inside
                } else {
                    inside
                }
            }
        }
    }
}

/// The lifecycle and tree-structure state every [`Pass`] implementation
/// embeds; the trait's default methods operate purely through
/// [`Pass::state`]/[`Pass::state_mut`].
#[derive(Debug)]
pub struct PassState {
    type_name: String,
    instance_name: String,
    options: Options,
    node_type: Option<NodeType>,
    sub_passes: Vec<Box<dyn Pass>>,
    condition: Option<Condition>,
    constructed: bool,
}

impl PassState {
    /// Create a fresh, unconstructed state with the standard `debug` and
    /// `output_prefix` options every pass carries (§4.9).
    pub fn new(type_name: impl Into<String>, instance_name: impl Into<String>) -> Self {
        let mut options = Options::new();
        options
            .add(Opt::new(
                "debug",
                "debug artifact mode",
                OptionValue::Enum {
                    value: "no".to_string(),
                    allowed: vec!["no", "yes", "stats", "qasm", "both"].into_iter().map(String::from).collect(),
                },
            ))
            .expect("standard options never collide on a fresh state");
        options
            .add(Opt::new("output_prefix", "debug artifact path prefix", OptionValue::Str("out".to_string())))
            .expect("standard options never collide on a fresh state");
        Self {
            type_name: type_name.into(),
            instance_name: instance_name.into(),
            options,
            node_type: None,
            sub_passes: Vec::new(),
            condition: None,
            constructed: false,
        }
    }

    /// Mutable access to the option set for use by a concrete pass's own
    /// constructor, before it is ever wrapped as a `Box<dyn Pass>` — at
    /// that point `constructed` is always `false`, so this is equivalent
    /// to (and simpler than) going through `Pass::options_mut`.
    pub fn options_mut_for_build(&mut self) -> &mut Options {
        &mut self.options
    }
}

/// A node in the pass tree (§4.9). Implementors provide `state`/`state_mut`
/// plus the two subclass hooks `build` and `run_internal`; every other
/// method is a default implementation driven by `PassState`.
pub trait Pass: std::fmt::Debug {
    /// Access the pass's lifecycle/tree state.
    fn state(&self) -> &PassState;
    /// Access the pass's lifecycle/tree state, mutably.
    fn state_mut(&mut self) -> &mut PassState;

    /// Subclass hook, called once by `construct()`: decide this pass's
    /// [`NodeType`] and set up any initial sub-passes/condition. Options
    /// are still mutable during this call; they freeze immediately after.
    fn build(&mut self) -> NodeType;

    /// Subclass hook: the pass's own effect. The returned `i64` is what
    /// `GroupIf`/`GroupWhile`/`GroupRepeatUntilNot` test their condition
    /// against.
    fn run_internal(&mut self, ir: &mut Program, path: &str) -> PassResult<i64>;

    /// The factory key this pass was constructed from.
    fn type_name(&self) -> &str {
        &self.state().type_name
    }

    /// This pass's name, unique among its siblings.
    fn instance_name(&self) -> &str {
        &self.state().instance_name
    }

    /// The pass's options. Mutable only before `construct()` runs.
    fn options(&self) -> &Options {
        &self.state().options
    }

    /// The pass's options, mutably. Errors after `construct()` has run.
    fn options_mut(&mut self) -> PassResult<&mut Options> {
        if self.state().constructed {
            return Err(PassError::MutationAfterConstruct(self.instance_name().to_string()));
        }
        Ok(&mut self.state_mut().options)
    }

    /// This pass's node type, if `construct()` has run.
    fn node_type(&self) -> Option<NodeType> {
        self.state().node_type
    }

    /// Whether `construct()` has run.
    fn is_constructed(&self) -> bool {
        self.state().constructed
    }

    /// This pass's sub-passes, in order.
    fn sub_passes(&self) -> &[Box<dyn Pass>] {
        &self.state().sub_passes
    }

    /// This pass's sub-passes, mutably.
    fn sub_passes_mut(&mut self) -> &mut Vec<Box<dyn Pass>> {
        &mut self.state_mut().sub_passes
    }

    /// Freeze options, decide the node type (and any initial sub-passes /
    /// condition) via [`Pass::build`].
    fn construct(&mut self) -> NodeType {
        let node_type = self.build();
        let state = self.state_mut();
        state.node_type = Some(node_type);
        state.constructed = true;
        node_type
    }

    /// Set this pass's condition (used by `GroupIf`/`GroupWhile`/
    /// `GroupRepeatUntilNot` implementations inside `build()`).
    fn set_condition(&mut self, condition: Condition) {
        self.state_mut().condition = Some(condition);
    }

    /// This pass's condition, if any.
    fn condition(&self) -> Option<&Condition> {
        self.state().condition.as_ref()
    }

    /// Execute this pass per its node type (§4.9), writing debug artifacts
    /// around the call if the `debug` option is not `no`.
    fn compile(&mut self, ir: &mut Program, path: &str) -> PassResult<i64> {
        let debug_mode = self
            .options()
            .get("debug")
            .and_then(|o| o.value().as_str())
            .unwrap_or("no")
            .to_string();
        let output_prefix = self
            .options()
            .get("output_prefix")
            .and_then(|o| o.value().as_str())
            .unwrap_or("out")
            .to_string();
        let ctx = SubstitutionContext {
            program_name: ir.name.clone(),
            instance_name: self.instance_name().to_string(),
            full_path: path.to_string(),
        };

        if debug_mode != "no" {
            write_debug_artifact(&output_prefix, &ctx, "_debug_in.ir", ir).map_err(PassError::from)?;
        }

        let result = self.run_node(ir, path)?;

        if debug_mode != "no" {
            write_debug_artifact(&output_prefix, &ctx, "_debug_out.ir", ir).map_err(PassError::from)?;
            if debug_mode == "stats" || debug_mode == "both" {
                write_report(&output_prefix, &ctx, ir).map_err(PassError::from)?;
            }
        }

        Ok(result)
    }

    /// The node-type execution rules of §4.9, without the artifact writing
    /// wrapper (factored out so `compile` stays readable).
    fn run_node(&mut self, ir: &mut Program, path: &str) -> PassResult<i64> {
        match self.node_type().unwrap_or(NodeType::Normal) {
            NodeType::Normal => self.run_internal(ir, path),
            NodeType::Group => {
                for sub in self.sub_passes_mut() {
                    let sub_path = format!("{path}.{}", sub.instance_name());
                    sub.compile(ir, &sub_path)?;
                }
                Ok(0)
            }
            NodeType::GroupIf => {
                let value = self.run_internal(ir, path)?;
                let runs = self.condition().is_some_and(|c| c.evaluate(value));
                if runs {
                    for sub in self.sub_passes_mut() {
                        let sub_path = format!("{path}.{}", sub.instance_name());
                        sub.compile(ir, &sub_path)?;
                    }
                }
                Ok(value)
            }
            NodeType::GroupWhile => loop {
                let value = self.run_internal(ir, path)?;
                if !self.condition().is_some_and(|c| c.evaluate(value)) {
                    break Ok(value);
                }
                for sub in self.sub_passes_mut() {
                    let sub_path = format!("{path}.{}", sub.instance_name());
                    sub.compile(ir, &sub_path)?;
                }
            },
            NodeType::GroupRepeatUntilNot => loop {
                for sub in self.sub_passes_mut() {
                    let sub_path = format!("{path}.{}", sub.instance_name());
                    sub.compile(ir, &sub_path)?;
                }
                let value = self.run_internal(ir, path)?;
                if !self.condition().is_some_and(|c| c.evaluate(value)) {
                    break Ok(value);
                }
            },
        }
    }

    // ---- Group editing (§4.9), callable only after `construct()` -------

    /// Append `child` to the end of this group's sub-passes.
    fn append_sub_pass(&mut self, child: Box<dyn Pass>) -> PassResult<()> {
        self.require_constructed()?;
        check_unique(self.sub_passes(), child.instance_name())?;
        self.sub_passes_mut().push(child);
        Ok(())
    }

    /// Prepend `child` to this group's sub-passes.
    fn prefix_sub_pass(&mut self, child: Box<dyn Pass>) -> PassResult<()> {
        self.require_constructed()?;
        check_unique(self.sub_passes(), child.instance_name())?;
        self.sub_passes_mut().insert(0, child);
        Ok(())
    }

    /// Insert `child` immediately before the sub-pass named `before`.
    fn insert_sub_pass_before(&mut self, before: &str, child: Box<dyn Pass>) -> PassResult<()> {
        self.require_constructed()?;
        check_unique(self.sub_passes(), child.instance_name())?;
        let idx = find_index(self.sub_passes(), before)?;
        self.sub_passes_mut().insert(idx, child);
        Ok(())
    }

    /// Insert `child` immediately after the sub-pass named `after`.
    fn insert_sub_pass_after(&mut self, after: &str, child: Box<dyn Pass>) -> PassResult<()> {
        self.require_constructed()?;
        check_unique(self.sub_passes(), child.instance_name())?;
        let idx = find_index(self.sub_passes(), after)?;
        self.sub_passes_mut().insert(idx + 1, child);
        Ok(())
    }

    /// Remove the sub-pass named `name`.
    fn remove_sub_pass(&mut self, name: &str) -> PassResult<()> {
        self.require_constructed()?;
        let idx = find_index(self.sub_passes(), name)?;
        self.sub_passes_mut().remove(idx);
        Ok(())
    }

    /// Remove every sub-pass.
    fn clear_sub_passes(&mut self) -> PassResult<()> {
        self.require_constructed()?;
        self.sub_passes_mut().clear();
        Ok(())
    }

    fn require_constructed(&self) -> PassResult<()> {
        if !self.is_constructed() {
            return Err(PassError::MutationAfterConstruct(self.instance_name().to_string()));
        }
        Ok(())
    }
}

fn find_index(sub_passes: &[Box<dyn Pass>], name: &str) -> PassResult<usize> {
    sub_passes
        .iter()
        .position(|p| p.instance_name() == name)
        .ok_or_else(|| PassError::WildcardNoMatch { path: name.to_string() })
}

fn check_unique(sub_passes: &[Box<dyn Pass>], name: &str) -> PassResult<()> {
    if sub_passes.iter().any(|p| p.instance_name() == name) {
        return Err(PassError::DuplicateInstanceName(name.to_string()));
    }
    Ok(())
}

/// Values available to the debug-artifact substitution grammar (§4.9).
pub struct SubstitutionContext {
    /// The program's name (`%n`).
    pub program_name: String,
    /// The constructing pass's own instance name (`%p`).
    pub instance_name: String,
    /// The pass's full dotted path from the root (`%P`, `%U`, `%D`).
    pub full_path: String,
}

/// Expand the `%n %N %p %P %U %D %%` debug-artifact prefix grammar (§4.9).
pub fn substitute_prefix(template: &str, ctx: &SubstitutionContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push_str(&ctx.program_name),
            // No separate "unique program name" registry exists in this
            // model; %N is treated as a synonym for %n (see DESIGN.md).
            Some('N') => out.push_str(&ctx.program_name),
            Some('p') => out.push_str(&ctx.instance_name),
            Some('P') => out.push_str(&ctx.full_path),
            Some('U') => out.push_str(&ctx.full_path.replace('.', "_")),
            Some('D') => out.push_str(&ctx.full_path.replace('.', "/")),
            Some('%') => out.push('%'),
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    out
}

fn write_debug_artifact(output_prefix: &str, ctx: &SubstitutionContext, suffix: &str, ir: &Program) -> std::io::Result<()> {
    let path = format!("{}{suffix}", substitute_prefix(output_prefix, ctx));
    if let Some(parent) = Path::new(&path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let bytes = qcc_ir::cbor::to_vec(ir).map_err(std::io::Error::other)?;
    fs::write(path, bytes)
}

fn write_report(output_prefix: &str, ctx: &SubstitutionContext, ir: &Program) -> std::io::Result<()> {
    let path = format!("{}.report", substitute_prefix(output_prefix, ctx));
    if let Some(parent) = Path::new(&path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let report = format!("program: {}\nblocks: {}\n", ir.name, ir.blocks.len());
    fs::write(path, report)
}
