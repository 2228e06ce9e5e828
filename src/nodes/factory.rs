//! Node type definitions and the registry that creates nodes from them
//!
//! A [`NodeTypeDef`] is the single source of truth for a node type: its
//! group, declared ancestry, flow ports, argument and result parameters and
//! the behavior run when the engine executes an instance.

use crate::constants::node::{DEFAULT_BORDER_COLOR, DEFAULT_FILL_COLOR, DEFAULT_GROUP};
use crate::constants::{port, INPUT_PREFIX, OUTPUT_PREFIX};
use crate::error::{ComputeError, GraphError};
use crate::nodes::execution_engine::RunContext;
use crate::nodes::port::PortType;
use crate::nodes::NodeId;
use crate::parameter::{ParameterType, ParameterTypeRegistry};
use crate::value::Value;
use log::{debug, warn};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Flavor of a pass-through node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DotKind {
    /// Carries flow or data
    Any,
    /// Carries flow only
    Flow,
    /// Carries parameter data only
    Param,
}

/// Structural category of a node type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Holds parameters, never executes
    Plain,
    /// Forwards whatever enters its single input
    PassThrough(DotKind),
    /// Resizable annotation box
    Annotation,
    /// Runs a behavior; `flow` types are driven by control flow, others are pulled
    Executable { flow: bool },
}

/// Declared flow port of a node type
#[derive(Debug, Clone, PartialEq)]
pub struct FlowPortDef {
    pub name: String,
    pub port_type: PortType,
}

/// Declared argument or result parameter
#[derive(Debug, Clone)]
pub struct ParamDef {
    pub name: Option<String>,
    pub type_tag: String,
    pub default: Option<Value>,
    pub visible: Option<bool>,
    pub hints: BTreeMap<String, String>,
}

impl ParamDef {
    /// Unnamed parameter; its name is derived from its position
    pub fn new(type_tag: &str) -> Self {
        Self {
            name: None,
            type_tag: type_tag.to_string(),
            default: None,
            visible: None,
            hints: BTreeMap::new(),
        }
    }

    pub fn named(name: &str, type_tag: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::new(type_tag)
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = Some(visible);
        self
    }

    pub fn hidden(self) -> Self {
        self.visible(false)
    }

    pub fn with_hint(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.hints.insert(key.to_string(), value.to_string());
        self
    }
}

/// Behavior run by the engine for an executable node
pub trait Executable: Send + Sync {
    fn run_body(&self, ctx: &mut RunContext<'_>, node: NodeId) -> Result<(), GraphError>;
}

/// Behavior backed by a plain function
struct Body<F>(F);

impl<F> Executable for Body<F>
where
    F: Fn(&mut RunContext<'_>, NodeId) -> Result<(), GraphError> + Send + Sync,
{
    fn run_body(&self, ctx: &mut RunContext<'_>, node: NodeId) -> Result<(), GraphError> {
        (self.0)(ctx, node)
    }
}

/// Keyword arguments handed to a compute function
pub type Kwargs = BTreeMap<String, Value>;

/// Generic compute behavior: positional and keyword arguments in, results out
///
/// Results are written to the node's result parameters by position. Flow
/// nodes then continue on their `Out` port.
struct Compute<F>(F);

impl<F> Executable for Compute<F>
where
    F: Fn(&[Value], &Kwargs) -> Result<Vec<Value>, ComputeError> + Send + Sync,
{
    fn run_body(&self, ctx: &mut RunContext<'_>, node: NodeId) -> Result<(), GraphError> {
        let (args, kwargs) = ctx.arguments(node)?;
        let results = (self.0)(&args, &kwargs).map_err(|err| ctx.fail(node, err))?;
        ctx.write_results(node, results)?;
        if ctx.is_flow(node) {
            ctx.goto_next(node, port::OUT)?;
        }
        Ok(())
    }
}

/// Rich description of a node type
#[derive(Clone)]
pub struct NodeTypeDef {
    node_type: String,
    group: String,
    parents: Vec<String>,
    kind: NodeKind,
    flow_ports: Vec<FlowPortDef>,
    args: Vec<ParamDef>,
    results: Vec<ParamDef>,
    addable_port: Option<String>,
    fill_color: Vec<u8>,
    border_color: Vec<u8>,
    behavior: Option<Arc<dyn Executable>>,
}

impl fmt::Debug for NodeTypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeTypeDef")
            .field("node_type", &self.node_type)
            .field("group", &self.group)
            .field("kind", &self.kind)
            .field("args", &self.args.len())
            .field("results", &self.results.len())
            .field("has_behavior", &self.behavior.is_some())
            .finish()
    }
}

impl NodeTypeDef {
    /// A plain node type in the default group
    pub fn new(node_type: &str) -> Self {
        Self {
            node_type: node_type.to_string(),
            group: DEFAULT_GROUP.to_string(),
            parents: Vec::new(),
            kind: NodeKind::Plain,
            flow_ports: Vec::new(),
            args: Vec::new(),
            results: Vec::new(),
            addable_port: None,
            fill_color: DEFAULT_FILL_COLOR.to_vec(),
            border_color: DEFAULT_BORDER_COLOR.to_vec(),
            behavior: None,
        }
    }

    /// Executable type driven by control flow, with `In` and `Out` ports
    pub fn flow(node_type: &str) -> Self {
        Self::new(node_type)
            .with_kind(NodeKind::Executable { flow: true })
            .with_flow_ports(&[(port::IN, PortType::Input), (port::OUT, PortType::Output)])
    }

    /// Executable type evaluated on demand when downstream reads it
    pub fn pure(node_type: &str) -> Self {
        Self::new(node_type).with_kind(NodeKind::Executable { flow: false })
    }

    /// Builder pattern methods for fluent configuration
    pub fn with_group(mut self, group: &str) -> Self {
        self.group = group.to_string();
        self
    }

    pub fn with_parents(mut self, parents: &[&str]) -> Self {
        self.parents = parents.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_kind(mut self, kind: NodeKind) -> Self {
        self.kind = kind;
        self
    }

    /// Replace the declared flow ports
    pub fn with_flow_ports(mut self, ports: &[(&str, PortType)]) -> Self {
        self.flow_ports = ports
            .iter()
            .map(|(name, port_type)| FlowPortDef {
                name: name.to_string(),
                port_type: *port_type,
            })
            .collect();
        self
    }

    pub fn with_args(mut self, args: Vec<ParamDef>) -> Self {
        self.args = args;
        self
    }

    pub fn with_results(mut self, results: Vec<ParamDef>) -> Self {
        self.results = results;
        self
    }

    /// Type tag of the argument ports the user may add
    pub fn with_addable_port(mut self, type_tag: &str) -> Self {
        self.addable_port = Some(type_tag.to_string());
        self
    }

    pub fn with_colors(mut self, fill: &[u8], border: &[u8]) -> Self {
        self.fill_color = fill.to_vec();
        self.border_color = border.to_vec();
        self
    }

    pub fn with_behavior(mut self, behavior: impl Executable + 'static) -> Self {
        self.behavior = Some(Arc::new(behavior));
        self
    }

    /// Behavior from a function taking the run context
    pub fn with_body<F>(self, body: F) -> Self
    where
        F: Fn(&mut RunContext<'_>, NodeId) -> Result<(), GraphError> + Send + Sync + 'static,
    {
        self.with_behavior(Body(body))
    }

    /// Behavior from a function of the collected arguments
    pub fn with_compute<F>(self, compute: F) -> Self
    where
        F: Fn(&[Value], &Kwargs) -> Result<Vec<Value>, ComputeError> + Send + Sync + 'static,
    {
        self.with_behavior(Compute(compute))
    }

    /// Copy of this type under a new name that lists this type as a parent
    pub fn derive(&self, node_type: &str) -> Self {
        let mut derived = self.clone();
        derived.node_type = node_type.to_string();
        derived.parents.insert(0, self.node_type.clone());
        derived
    }

    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn flow_ports(&self) -> &[FlowPortDef] {
        &self.flow_ports
    }

    pub fn args(&self) -> &[ParamDef] {
        &self.args
    }

    pub fn results(&self) -> &[ParamDef] {
        &self.results
    }

    pub fn addable_port(&self) -> Option<&str> {
        self.addable_port.as_deref()
    }

    pub fn fill_color(&self) -> &[u8] {
        &self.fill_color
    }

    pub fn border_color(&self) -> &[u8] {
        &self.border_color
    }

    pub fn behavior(&self) -> Option<&Arc<dyn Executable>> {
        self.behavior.as_ref()
    }

    pub fn is_executable(&self) -> bool {
        matches!(self.kind, NodeKind::Executable { .. })
    }

    /// Executable node driven by control flow
    pub fn is_flow(&self) -> bool {
        matches!(self.kind, NodeKind::Executable { flow: true })
    }

    pub fn is_pass_through(&self) -> bool {
        matches!(self.kind, NodeKind::PassThrough(_))
    }

    /// The type name followed by its declared ancestors and the implied base types
    pub fn ancestry(&self) -> Vec<String> {
        let mut chain = vec![self.node_type.clone()];
        chain.extend(self.parents.iter().cloned());
        match self.kind {
            NodeKind::PassThrough(_) => chain.push("Dot".to_string()),
            NodeKind::Executable { .. } => chain.push("PyNode".to_string()),
            NodeKind::Annotation => chain.push("Backdrop".to_string()),
            NodeKind::Plain => {}
        }
        chain.push("Node".to_string());
        let mut seen = Vec::with_capacity(chain.len());
        for name in chain {
            if !seen.contains(&name) {
                seen.push(name);
            }
        }
        seen
    }

    pub fn is_subtype(&self, ancestor: &str) -> bool {
        self.ancestry().iter().any(|t| t == ancestor)
    }

    /// Parameter names of the declared arguments, with the input prefix
    pub fn arg_parameter_names(&self) -> Vec<String> {
        declared_names(&self.args, INPUT_PREFIX, "arg")
    }

    /// Parameter names of the declared results, with the output prefix
    pub fn result_parameter_names(&self) -> Vec<String> {
        declared_names(&self.results, OUTPUT_PREFIX, "result")
    }
}

/// A lone unnamed entry is `<base>`, several are `<base>1`, `<base>2`, ...
fn declared_names(defs: &[ParamDef], prefix: &str, base: &str) -> Vec<String> {
    defs.iter()
        .enumerate()
        .map(|(i, def)| match &def.name {
            Some(name) => format!("{}{}", prefix, name),
            None if defs.len() == 1 => format!("{}{}", prefix, base),
            None => format!("{}{}{}", prefix, base, i + 1),
        })
        .collect()
}

/// Registry for managing node types and parameter types
pub struct NodeRegistry {
    types: BTreeMap<String, Arc<NodeTypeDef>>,
    param_types: ParameterTypeRegistry,
    param_defaults: RwLock<HashMap<String, BTreeMap<String, Value>>>,
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("types", &self.types.len())
            .field("param_types", &self.param_types.tags().len())
            .finish()
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeRegistry {
    /// Registry with the standard parameter types and no node types
    pub fn new() -> Self {
        Self {
            types: BTreeMap::new(),
            param_types: ParameterTypeRegistry::with_builtin_types(),
            param_defaults: RwLock::new(HashMap::new()),
        }
    }

    /// Registry holding the whole built-in node catalogue
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::nodes::builtin::register_all(&mut registry);
        registry
    }

    /// Register or replace a node type. Replacing resets its parameter defaults.
    pub fn register(&mut self, def: NodeTypeDef) {
        let node_type = def.node_type.clone();
        if self.types.contains_key(&node_type) {
            debug!("Replacing node type '{}'", node_type);
        }
        self.param_defaults
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&node_type);
        self.types.insert(node_type, Arc::new(def));
    }

    /// Register a type under a new name copied from an existing one
    pub fn register_alias(&mut self, base: &str, alias: &str, group: Option<&str>) -> Result<(), GraphError> {
        let base_def = self
            .get(base)
            .ok_or_else(|| GraphError::UnknownNodeType(base.to_string()))?;
        let mut derived = base_def.derive(alias);
        if let Some(group) = group {
            derived = derived.with_group(group);
        }
        self.register(derived);
        Ok(())
    }

    pub fn get(&self, node_type: &str) -> Option<Arc<NodeTypeDef>> {
        self.types.get(node_type).cloned()
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.types.contains_key(node_type)
    }

    /// All registered node type names in sorted order
    pub fn node_types(&self) -> Vec<&str> {
        self.types.keys().map(String::as_str).collect()
    }

    /// Node type names keyed by group, both sorted
    pub fn nodes_by_group(&self) -> BTreeMap<String, Vec<String>> {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for def in self.types.values() {
            groups
                .entry(def.group.clone())
                .or_default()
                .push(def.node_type.clone());
        }
        groups
    }

    pub fn nodes_in_group(&self, group: &str) -> Vec<&str> {
        self.types
            .values()
            .filter(|def| def.group == group)
            .map(|def| def.node_type.as_str())
            .collect()
    }

    /// Ancestry of a registered type, empty for unknown types
    pub fn ancestry(&self, node_type: &str) -> Vec<String> {
        self.types
            .get(node_type)
            .map(|def| def.ancestry())
            .unwrap_or_default()
    }

    pub fn is_subtype(&self, node_type: &str, ancestor: &str) -> bool {
        self.types
            .get(node_type)
            .map_or(false, |def| def.is_subtype(ancestor))
    }

    pub fn param_types(&self) -> &ParameterTypeRegistry {
        &self.param_types
    }

    pub fn register_parameter_type(&mut self, ty: ParameterType) {
        self.param_types.register(ty);
    }

    /// Change the default of a parameter for instances created from now on
    pub fn set_param_default(&self, node_type: &str, parameter: &str, value: Value) -> bool {
        if !self.types.contains_key(node_type) {
            warn!("Cannot set default of '{}' on unknown node type '{}'", parameter, node_type);
            return false;
        }
        let mut defaults = self
            .param_defaults
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        defaults
            .entry(node_type.to_string())
            .or_default()
            .insert(parameter.to_string(), value);
        true
    }

    /// Per-type parameter defaults currently in effect
    pub fn param_defaults(&self, node_type: &str) -> BTreeMap<String, Value> {
        self.param_defaults
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(node_type)
            .cloned()
            .unwrap_or_default()
    }
}
