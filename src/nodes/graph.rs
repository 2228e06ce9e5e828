//! Node graph container: naming, connections and change notification

use crate::config::GraphConfig;
use crate::constants::engine::DEFAULT_MAX_DEPTH;
use crate::constants::param::NAME;
use crate::constants::{port, ARG_PREFIX, INPUT_PREFIX};
use crate::error::{GraphError, Result};
use crate::nodes::events::{GraphEvent, GraphObserver};
use crate::nodes::factory::{NodeRegistry, NodeTypeDef};
use crate::nodes::item::{DetachedItem, NodeItem};
use crate::nodes::node::{Node, NodeId};
use crate::nodes::port::{Pipe, Port, PortRef, PortType};
use crate::parameter::{ParamOptions, Parameter};
use crate::value::Value;
use glam::Vec2;
use log::{debug, warn};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Builds the presentation item for each new node
pub type ItemFactory = Box<dyn Fn(&NodeTypeDef) -> Box<dyn NodeItem> + Send + Sync>;

/// Split a name into its prefix and trailing decimal index
fn split_suffix(name: &str) -> (&str, u64) {
    let prefix = name.trim_end_matches(|c: char| c.is_ascii_digit());
    match name[prefix.len()..].parse::<u64>() {
        Ok(index) => (prefix, index),
        Err(_) => (name, 0),
    }
}

/// A graph containing nodes and the pipes between their ports
pub struct NodeGraph {
    registry: Arc<NodeRegistry>,
    nodes: HashMap<NodeId, Node>,
    names: HashMap<String, NodeId>,
    suffix_indices: HashMap<String, u64>,
    pipes: Vec<Pipe>,
    next_node_id: NodeId,
    observers: Vec<Box<dyn GraphObserver>>,
    item_factory: ItemFactory,
    viewport_center: Vec2,
    max_depth: usize,
    path: Option<PathBuf>,
}

impl fmt::Debug for NodeGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeGraph")
            .field("nodes", &self.nodes.len())
            .field("pipes", &self.pipes.len())
            .field("observers", &self.observers.len())
            .field("path", &self.path)
            .finish()
    }
}

impl NodeGraph {
    /// Creates a new empty node graph backed by the registry
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self {
            registry,
            nodes: HashMap::new(),
            names: HashMap::new(),
            suffix_indices: HashMap::new(),
            pipes: Vec::new(),
            next_node_id: 0,
            observers: Vec::new(),
            item_factory: Box::new(DetachedItem::create),
            viewport_center: Vec2::ZERO,
            max_depth: DEFAULT_MAX_DEPTH,
            path: None,
        }
    }

    pub fn with_config(registry: Arc<NodeRegistry>, config: &GraphConfig) -> Self {
        let mut graph = Self::new(registry);
        graph.viewport_center = Vec2::from_array(config.viewport_center);
        graph.max_depth = config.max_execution_depth;
        graph
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn add_observer(&mut self, observer: impl GraphObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn set_item_factory(&mut self, factory: ItemFactory) {
        self.item_factory = factory;
    }

    pub fn viewport_center(&self) -> Vec2 {
        self.viewport_center
    }

    /// Where nodes created without a position are placed
    pub fn set_viewport_center(&mut self, center: Vec2) {
        self.viewport_center = center;
    }

    /// Longest pass-through chain followed when resolving connections
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn set_max_depth(&mut self, max_depth: usize) {
        self.max_depth = max_depth;
    }

    /// File the graph was loaded from or saved to
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn set_path(&mut self, path: Option<PathBuf>) {
        self.path = path;
    }

    fn emit(&mut self, event: GraphEvent) {
        for observer in self.observers.iter_mut() {
            observer.on_event(&event);
        }
    }

    fn node_ref(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(&id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))
    }

    fn node_entry(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_by_name(&self, name: &str) -> Option<&Node> {
        self.names.get(name).and_then(|id| self.nodes.get(id))
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Node ids in creation order
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Nodes in creation order
    pub fn nodes(&self) -> Vec<&Node> {
        self.node_ids()
            .into_iter()
            .filter_map(|id| self.nodes.get(&id))
            .collect()
    }

    pub fn node_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.names.keys().cloned().collect();
        names.sort();
        names
    }

    /// Ids of every node whose type is, or derives from, `node_type`
    pub fn nodes_of_type(&self, node_type: &str) -> Vec<NodeId> {
        self.node_ids()
            .into_iter()
            .filter(|id| {
                self.nodes
                    .get(id)
                    .map_or(false, |n| n.def().is_subtype(node_type))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Resolve a requested name against live names and the suffix counters
    fn unique_name(&self, requested: &str) -> (String, String, u64) {
        let (prefix, index) = split_suffix(requested);
        if !self.names.contains_key(requested) {
            return (requested.to_string(), prefix.to_string(), index);
        }
        let start = self.suffix_indices.get(prefix).copied().unwrap_or(index);
        if let Some(found) = self.next_free_name(prefix, start) {
            return found;
        }
        // Trailing number already at the top of its range: number the whole name
        let start = self.suffix_indices.get(requested).copied().unwrap_or(0);
        self.next_free_name(requested, start).unwrap_or_else(|| {
            let candidate = format!("{}_{}", requested, self.next_node_id);
            (candidate, requested.to_string(), start)
        })
    }

    /// First `prefix<n>` with `n > start` that no live node uses
    fn next_free_name(&self, prefix: &str, start: u64) -> Option<(String, String, u64)> {
        let mut index = start;
        loop {
            index = index.checked_add(1)?;
            let candidate = format!("{}{}", prefix, index);
            if !self.names.contains_key(&candidate) {
                return Some((candidate, prefix.to_string(), index));
            }
        }
    }

    fn record_suffix(&mut self, prefix: String, index: u64) {
        self.suffix_indices
            .entry(prefix)
            .and_modify(|max| *max = (*max).max(index))
            .or_insert(index);
    }

    /// Create a node of a registered type. The name is made unique; the node
    /// is placed at `position` or at the viewport center.
    pub fn create_node(
        &mut self,
        node_type: &str,
        name: Option<&str>,
        position: Option<Vec2>,
    ) -> Result<NodeId> {
        let registry = Arc::clone(&self.registry);
        let Some(def) = registry.get(node_type) else {
            warn!("Unknown node type '{}', nothing created", node_type);
            return Err(GraphError::UnknownNodeType(node_type.to_string()));
        };
        let (name, prefix, index) = self.unique_name(name.unwrap_or(node_type));
        let id = self.next_node_id;
        let item = (self.item_factory)(&def);
        let mut node = Node::new(id, &name, def, &registry, item)?;
        node.set_position(position.unwrap_or(self.viewport_center));

        self.next_node_id += 1;
        self.nodes.insert(id, node);
        self.names.insert(name.clone(), id);
        self.record_suffix(prefix, index);
        debug!("Created node '{}' of type '{}'", name, node_type);
        self.emit(GraphEvent::NodeCreated {
            node: name,
            node_type: node_type.to_string(),
        });
        Ok(id)
    }

    /// Sever every connection touching the node, clear references to it,
    /// then remove it. Suffix counters are never rolled back.
    pub fn delete_node(&mut self, id: NodeId) -> Result<()> {
        let name = self.node_ref(id)?.name().to_string();
        let touching: Vec<Pipe> = self.pipes.iter().filter(|p| p.touches(id)).cloned().collect();
        for pipe in touching {
            self.remove_pipe(&pipe);
        }

        let mut cleared = Vec::new();
        for (other_id, other) in self.nodes.iter_mut() {
            if *other_id == id {
                continue;
            }
            for param in other.parameters_mut() {
                if param.retarget_connect(&name, None) {
                    cleared.push((*other_id, param.name().to_string()));
                }
            }
        }
        for (other_id, param) in cleared {
            self.emit_value_changed(other_id, &param);
        }

        self.nodes.remove(&id);
        self.names.remove(&name);
        debug!("Deleted node '{}'", name);
        self.emit(GraphEvent::NodeDeleted { node: name });
        Ok(())
    }

    /// Delete every node
    pub fn clear(&mut self) -> Result<()> {
        for id in self.node_ids() {
            self.delete_node(id)?;
        }
        Ok(())
    }

    /// Rename a node through the uniqueness check; connection references
    /// pointing at the old name follow it. Returns the name actually used.
    pub fn rename(&mut self, id: NodeId, requested: &str) -> Result<String> {
        let old = self.node_ref(id)?.name().to_string();
        if requested == old {
            return Ok(old);
        }
        let (new, prefix, index) = self.unique_name(requested);
        self.record_suffix(prefix, index);
        self.names.remove(&old);
        self.names.insert(new.clone(), id);
        if let Some(param) = self.node_entry(id)?.parameter_mut(NAME) {
            param.assign_value(Value::String(new.clone()), true);
        }
        for node in self.nodes.values_mut() {
            for param in node.parameters_mut() {
                param.retarget_connect(&old, Some(&new));
            }
        }
        debug!("Renamed node '{}' to '{}'", old, new);
        self.emit_value_changed(id, NAME);
        self.emit(GraphEvent::NodeRenamed {
            old,
            new: new.clone(),
        });
        Ok(new)
    }

    fn emit_value_changed(&mut self, id: NodeId, parameter: &str) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        let event = GraphEvent::ParameterValueChanged {
            node: node.name().to_string(),
            parameter: parameter.to_string(),
            value: node.value(parameter).unwrap_or_default(),
        };
        self.emit(event);
    }

    /// Set a parameter value, coerced to the parameter's type.
    /// Setting `name` renames the node.
    pub fn set_value_with(
        &mut self,
        id: NodeId,
        parameter: &str,
        value: Value,
        emit: bool,
        value_override: bool,
    ) -> Result<()> {
        if parameter == NAME {
            self.rename(id, &value.to_string())?;
            return Ok(());
        }
        let registry = Arc::clone(&self.registry);
        let node = self.node_entry(id)?;
        let is_property = node.has_property(parameter);
        let node_name = node.name().to_string();
        let param = node
            .parameter_mut(parameter)
            .ok_or_else(|| GraphError::ParameterNotFound {
                node: node_name,
                parameter: parameter.to_string(),
            })?;
        let value = registry.param_types().coerce(param.type_tag(), value)?;
        param.assign_value(value.clone(), value_override);
        if is_property {
            node.set_property(parameter, &value);
        }
        if emit {
            self.emit_value_changed(id, parameter);
        }
        Ok(())
    }

    pub fn set_value(&mut self, id: NodeId, parameter: &str, value: impl Into<Value>) -> Result<()> {
        self.set_value_with(id, parameter, value.into(), true, true)
    }

    /// Set a value without notifying observers
    pub fn set_value_quietly(&mut self, id: NodeId, parameter: &str, value: impl Into<Value>) -> Result<()> {
        self.set_value_with(id, parameter, value.into(), false, true)
    }

    fn parameter_entry(&mut self, id: NodeId, parameter: &str) -> Result<&mut Parameter> {
        let node = self.node_entry(id)?;
        let node_name = node.name().to_string();
        node.parameter_mut(parameter)
            .ok_or_else(|| GraphError::ParameterNotFound {
                node: node_name,
                parameter: parameter.to_string(),
            })
    }

    /// Point a parameter at an upstream `"node.param"` reference
    pub fn set_connect_with(
        &mut self,
        id: NodeId,
        parameter: &str,
        connect: Option<&str>,
        emit: bool,
        value_override: bool,
    ) -> Result<()> {
        if let Some(reference) = connect {
            if reference.rsplit_once('.').is_none() {
                return Err(GraphError::InvalidConnect(reference.to_string()));
            }
        }
        self.parameter_entry(id, parameter)?
            .assign_connect(connect.map(str::to_string), value_override);
        if emit {
            self.emit_value_changed(id, parameter);
        }
        Ok(())
    }

    pub fn set_connect(&mut self, id: NodeId, parameter: &str, connect: &str) -> Result<()> {
        self.set_connect_with(id, parameter, Some(connect), true, true)
    }

    /// Clear a parameter's connection reference and notify
    pub fn break_connect(&mut self, id: NodeId, parameter: &str) -> Result<()> {
        self.parameter_entry(id, parameter)?.clear_connect();
        self.emit_value_changed(id, parameter);
        Ok(())
    }

    pub fn set_inherit_value(&mut self, id: NodeId, parameter: &str, value: Value) -> Result<()> {
        let registry = Arc::clone(&self.registry);
        let param = self.parameter_entry(id, parameter)?;
        let value = registry.param_types().coerce(param.type_tag(), value)?;
        param.set_inherit_value(value);
        Ok(())
    }

    pub fn set_inherit_connect(&mut self, id: NodeId, parameter: &str, connect: Option<&str>) -> Result<()> {
        self.parameter_entry(id, parameter)?
            .set_inherit_connect(connect.map(str::to_string));
        Ok(())
    }

    pub fn set_parameter_metadata(&mut self, id: NodeId, parameter: &str, key: &str, value: impl fmt::Display) -> Result<()> {
        self.parameter_entry(id, parameter)?.set_metadata(key, value);
        Ok(())
    }

    pub fn set_parameter_hint(&mut self, id: NodeId, parameter: &str, key: &str, value: impl fmt::Display) -> Result<()> {
        self.parameter_entry(id, parameter)?.set_hint(key, value);
        Ok(())
    }

    pub fn set_parameter_visible(&mut self, id: NodeId, parameter: &str, visible: bool) -> Result<()> {
        self.parameter_entry(id, parameter)?.set_visible(visible);
        Ok(())
    }

    pub fn set_metadata(&mut self, id: NodeId, key: &str, value: &str) -> Result<()> {
        self.node_entry(id)?.set_metadata(key, value);
        Ok(())
    }

    /// Write a geometry property straight to the node's item
    pub fn set_property(&mut self, id: NodeId, name: &str, value: &Value) -> Result<bool> {
        Ok(self.node_entry(id)?.set_property(name, value))
    }

    pub fn set_position(&mut self, id: NodeId, position: Vec2) -> Result<()> {
        self.node_entry(id)?.set_position(position);
        Ok(())
    }

    pub(crate) fn set_node_error(&mut self, id: NodeId, has_error: bool) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.set_error(has_error);
        }
    }

    /// Add a parameter to a node. Returns the existing parameter when the
    /// name is taken and `None` when the type tag is not registered.
    pub fn add_parameter(
        &mut self,
        id: NodeId,
        name: &str,
        type_tag: &str,
        options: ParamOptions,
    ) -> Result<Option<&Parameter>> {
        let registry = Arc::clone(&self.registry);
        let node = self.node_entry(id)?;
        let existed = node.has_parameter(name);
        let present = node
            .add_parameter(name, type_tag, options, registry.param_types())
            .is_some();
        if present && !existed {
            let node = node.name().to_string();
            self.emit(GraphEvent::ParameterAdded {
                node,
                parameter: name.to_string(),
            });
        }
        Ok(if present {
            self.nodes.get(&id).and_then(|n| n.parameter(name))
        } else {
            None
        })
    }

    /// Remove a parameter and any pipe attached to its port
    pub fn remove_parameter(&mut self, id: NodeId, name: &str) -> Result<bool> {
        self.disconnect_port(id, name)?;
        let node = self.node_entry(id)?;
        if !node.remove_parameter(name) {
            return Ok(false);
        }
        let node = node.name().to_string();
        self.emit(GraphEvent::ParameterRemoved {
            node,
            parameter: name.to_string(),
        });
        Ok(true)
    }

    /// Add the next `inputs:argN` port on a node whose type allows it
    pub fn add_input_port(&mut self, id: NodeId) -> Result<String> {
        let node = self.node_ref(id)?;
        let type_tag = node
            .def()
            .addable_port()
            .ok_or_else(|| GraphError::NoAddablePort(node.name().to_string()))?
            .to_string();
        let mut index = node.parameters_with_prefix(ARG_PREFIX).count() + 1;
        while node.has_parameter(&format!("{}{}", ARG_PREFIX, index)) {
            index += 1;
        }
        let name = format!("{}{}", ARG_PREFIX, index);
        self.add_parameter(id, &name, &type_tag, ParamOptions::new().custom())?;
        Ok(name)
    }

    fn port(&self, id: NodeId, name: &str, port_type: PortType) -> Result<Port> {
        let node = self.node_ref(id)?;
        node.port(name, port_type)
            .ok_or_else(|| GraphError::PortNotFound {
                node: node.name().to_string(),
                port: name.to_string(),
            })
    }

    /// Connect an output port to an input port. An input keeps a single
    /// connection, so an existing one is replaced.
    pub fn connect(&mut self, source: NodeId, output: &str, target: NodeId, input: &str) -> Result<()> {
        if source == target {
            return Err(GraphError::SelfConnection(self.node_ref(source)?.name().to_string()));
        }
        let source_port = self.port(source, output, PortType::Output)?;
        let target_port = self.port(target, input, PortType::Input)?;
        let source_name = self.node_ref(source)?.name().to_string();
        let target_name = self.node_ref(target)?.name().to_string();
        if !source_port
            .kind
            .can_connect_to(&target_port.kind, self.registry.param_types())
        {
            return Err(GraphError::IncompatiblePorts {
                from: format!("{}.{}", source_name, output),
                to: format!("{}.{}", target_name, input),
            });
        }

        let pipe = Pipe::new(PortRef::new(source, output), PortRef::new(target, input));
        if self.pipes.contains(&pipe) {
            return Ok(());
        }
        let replaced: Vec<Pipe> = self
            .pipes
            .iter()
            .filter(|p| p.target == pipe.target)
            .cloned()
            .collect();
        for old in replaced {
            self.remove_pipe(&old);
        }
        self.pipes.push(pipe);

        if input.starts_with(INPUT_PREFIX) {
            let reference = format!("{}.{}", source_name, output);
            self.set_connect_with(target, input, Some(&reference), true, true)?;
        }
        self.emit(GraphEvent::Connected {
            source: (source_name, output.to_string()),
            target: (target_name, input.to_string()),
        });
        Ok(())
    }

    /// Remove one pipe. Returns whether it existed.
    pub fn disconnect(&mut self, source: NodeId, output: &str, target: NodeId, input: &str) -> Result<bool> {
        let pipe = Pipe::new(PortRef::new(source, output), PortRef::new(target, input));
        if !self.pipes.contains(&pipe) {
            return Ok(false);
        }
        self.remove_pipe(&pipe);
        Ok(true)
    }

    /// Remove every pipe attached to one port of a node
    pub fn disconnect_port(&mut self, id: NodeId, port_name: &str) -> Result<usize> {
        self.node_ref(id)?;
        let attached: Vec<Pipe> = self
            .pipes
            .iter()
            .filter(|p| {
                (p.source.node == id && p.source.port == port_name)
                    || (p.target.node == id && p.target.port == port_name)
            })
            .cloned()
            .collect();
        for pipe in &attached {
            self.remove_pipe(pipe);
        }
        Ok(attached.len())
    }

    fn remove_pipe(&mut self, pipe: &Pipe) {
        self.pipes.retain(|p| p != pipe);
        let clears_connect = self
            .nodes
            .get(&pipe.target.node)
            .map_or(false, |n| n.has_parameter(&pipe.target.port));
        if clears_connect {
            if let Some(param) = self
                .nodes
                .get_mut(&pipe.target.node)
                .and_then(|n| n.parameter_mut(&pipe.target.port))
            {
                param.clear_connect();
            }
            self.emit_value_changed(pipe.target.node, &pipe.target.port);
        }
        let name_of = |id: NodeId| {
            self.nodes
                .get(&id)
                .map(|n| n.name().to_string())
                .unwrap_or_default()
        };
        let event = GraphEvent::Disconnected {
            source: (name_of(pipe.source.node), pipe.source.port.clone()),
            target: (name_of(pipe.target.node), pipe.target.port.clone()),
        };
        self.emit(event);
    }

    /// All pipes in the order they were connected
    pub fn pipes(&self) -> &[Pipe] {
        &self.pipes
    }

    /// Source feeding an input port, if connected
    pub fn connection_into(&self, id: NodeId, input: &str) -> Option<&PortRef> {
        self.pipes
            .iter()
            .find(|p| p.target.node == id && p.target.port == input)
            .map(|p| &p.source)
    }

    /// Targets of an output port in connection order
    pub fn connections_from(&self, id: NodeId, output: &str) -> Vec<&PortRef> {
        self.pipes
            .iter()
            .filter(|p| p.source.node == id && p.source.port == output)
            .map(|p| &p.target)
            .collect()
    }

    fn describe(&self, pipe_end: &PortRef) -> (String, String) {
        let name = self
            .nodes
            .get(&pipe_end.node)
            .map(|n| n.name().to_string())
            .unwrap_or_default();
        (name, pipe_end.port.clone())
    }

    /// Outgoing connections as `(output, target node, target port)`
    pub fn outputs_of(&self, id: NodeId) -> Vec<(String, String, String)> {
        self.pipes
            .iter()
            .filter(|p| p.source.node == id)
            .map(|p| {
                let (node, port) = self.describe(&p.target);
                (p.source.port.clone(), node, port)
            })
            .collect()
    }

    /// Incoming connections as `(input, source node, source port)`
    pub fn inputs_of(&self, id: NodeId) -> Vec<(String, String, String)> {
        self.pipes
            .iter()
            .filter(|p| p.target.node == id)
            .map(|p| {
                let (node, port) = self.describe(&p.source);
                (p.target.port.clone(), node, port)
            })
            .collect()
    }

    /// Nodes reached from a flow output, with pass-through nodes flattened,
    /// in connection order
    pub fn flow_targets(&self, id: NodeId, output: &str) -> Vec<NodeId> {
        let mut targets = Vec::new();
        self.collect_flow_targets(id, output, 0, &mut targets);
        targets
    }

    fn collect_flow_targets(&self, id: NodeId, output: &str, depth: usize, targets: &mut Vec<NodeId>) {
        if depth > self.max_depth {
            warn!("Pass-through chain deeper than {}, stopping", self.max_depth);
            return;
        }
        for target in self.connections_from(id, output) {
            let pass_through = self
                .nodes
                .get(&target.node)
                .map_or(false, |n| n.def().is_pass_through());
            if pass_through {
                self.collect_flow_targets(target.node, port::DOT_OUTPUT, depth + 1, targets);
            } else {
                targets.push(target.node);
            }
        }
    }

    /// Follow a `"node.param"` reference through pass-through nodes to the
    /// producing port
    pub fn resolve_source(&self, reference: &str) -> Result<PortRef> {
        let (node_name, port_name) = reference
            .rsplit_once('.')
            .ok_or_else(|| GraphError::InvalidConnect(reference.to_string()))?;
        let mut current = PortRef::new(
            self.node_id(node_name)
                .ok_or_else(|| GraphError::NodeNotFound(node_name.to_string()))?,
            port_name,
        );
        for _ in 0..self.max_depth {
            let node = self.node_ref(current.node)?;
            if !node.def().is_pass_through() {
                return Ok(current);
            }
            current = self
                .connection_into(current.node, port::DOT_INPUT)
                .cloned()
                .ok_or_else(|| GraphError::DanglingPassThrough(node.name().to_string()))?;
        }
        Err(GraphError::RecursionLimit(self.max_depth))
    }

    /// Value a parameter reads, following its connection without executing anything
    pub fn resolved_value(&self, id: NodeId, parameter: &str) -> Result<Value> {
        let node = self.node_ref(id)?;
        if let Some(reference) = node.connect(parameter) {
            let source = self.resolve_source(reference)?;
            let upstream = self.node_ref(source.node)?;
            return upstream
                .value(&source.port)
                .ok_or_else(|| GraphError::ParameterNotFound {
                    node: upstream.name().to_string(),
                    parameter: source.port.clone(),
                });
        }
        node.value(parameter)
            .ok_or_else(|| GraphError::ParameterNotFound {
                node: node.name().to_string(),
                parameter: parameter.to_string(),
            })
    }
}
