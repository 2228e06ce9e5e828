//! Node instances and their parameter tables

use crate::constants::hint;
use crate::constants::node::DEFAULT_LABEL_FONT_SIZE;
use crate::constants::param::{
    BORDER_COLOR, DISABLE, FILL_COLOR, HEIGHT, LABEL, LABEL_FONT_SIZE, LOCKED, NAME, WIDTH, X, Y,
};
use crate::constants::{port, INPUT_PREFIX, OUTPUT_PREFIX};
use crate::error::GraphError;
use crate::literal;
use crate::nodes::factory::{DotKind, NodeKind, NodeRegistry, NodeTypeDef, ParamDef};
use crate::nodes::item::NodeItem;
use crate::nodes::port::{Port, PortKind, PortType};
use crate::parameter::{ParamOptions, Parameter, ParameterTypeRegistry};
use crate::value::Value;
use glam::Vec2;
use log::warn;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Unique identifier for a node
pub type NodeId = usize;

/// A node in the graph: a type, an ordered parameter table and a presentation item
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    def: Arc<NodeTypeDef>,
    parameters: HashMap<String, Parameter>,
    parameter_names: Vec<String>,
    metadata: BTreeMap<String, String>,
    item: Box<dyn NodeItem>,
    has_error: bool,
}

fn color_value(components: &[u8]) -> Value {
    Value::List(
        components
            .iter()
            .map(|c| Value::Float(f64::from(*c) / 255.0))
            .collect(),
    )
}

/// Parameters every node carries regardless of its type
const BUILT_IN_NAMES: [&str; 9] = [
    BORDER_COLOR, DISABLE, FILL_COLOR, LABEL, LABEL_FONT_SIZE, LOCKED, NAME, X, Y,
];

impl Node {
    /// Build a node with its built-in, argument and result parameters.
    /// Per-type defaults registered on the registry are applied last.
    pub fn new(
        id: NodeId,
        name: &str,
        def: Arc<NodeTypeDef>,
        registry: &NodeRegistry,
        item: Box<dyn NodeItem>,
    ) -> Result<Self, GraphError> {
        let types = registry.param_types();
        let mut node = Self {
            id,
            def: Arc::clone(&def),
            parameters: HashMap::new(),
            parameter_names: Vec::new(),
            metadata: BTreeMap::new(),
            item,
            has_error: false,
        };

        let node_tab = |options: ParamOptions| options.with_hint(hint::TAB, "Node");
        let untabbed = |options: ParamOptions| options.with_hint(hint::TAB, "None");
        let color_hints = |options: ParamOptions| untabbed(options.with_hint(hint::SHOW_EDITOR, "False"));
        let built_ins: Vec<(&str, &str, ParamOptions)> = vec![
            (BORDER_COLOR, "color4f", color_hints(ParamOptions::new().with_default(color_value(def.border_color())))),
            (DISABLE, "bool", node_tab(ParamOptions::new().with_default(false))),
            (FILL_COLOR, "color4f", color_hints(ParamOptions::new().with_default(color_value(def.fill_color())))),
            (LABEL, "text", node_tab(ParamOptions::new())),
            (LABEL_FONT_SIZE, "int", node_tab(ParamOptions::new().with_default(DEFAULT_LABEL_FONT_SIZE))),
            (LOCKED, "bool", node_tab(ParamOptions::new().with_default(false).hidden())),
            (NAME, "str", untabbed(ParamOptions::new().with_default(name))),
            (X, "float", node_tab(ParamOptions::new().hidden())),
            (Y, "float", node_tab(ParamOptions::new().hidden())),
        ];
        for (param_name, tag, options) in built_ins {
            node.require_parameter(param_name, tag, options, types)?;
        }

        if def.kind() == NodeKind::Annotation {
            for size in [WIDTH, HEIGHT] {
                node.require_parameter(size, "float", node_tab(ParamOptions::new().hidden()), types)?;
            }
        }

        let declared = def
            .arg_parameter_names()
            .into_iter()
            .zip(def.args())
            .chain(def.result_parameter_names().into_iter().zip(def.results()));
        for (param_name, param_def) in declared {
            node.require_parameter(&param_name, &param_def.type_tag, declared_options(param_def), types)?;
        }

        for (param_name, value) in registry.param_defaults(def.node_type()) {
            node.apply_type_default(&param_name, value, types);
        }

        Ok(node)
    }

    fn require_parameter(
        &mut self,
        name: &str,
        tag: &str,
        options: ParamOptions,
        types: &ParameterTypeRegistry,
    ) -> Result<(), GraphError> {
        if !types.contains(tag) {
            return Err(GraphError::UnknownParameterType {
                name: name.to_string(),
                tag: tag.to_string(),
            });
        }
        self.add_parameter(name, tag, options, types);
        Ok(())
    }

    fn apply_type_default(&mut self, name: &str, value: Value, types: &ParameterTypeRegistry) {
        let Some(param) = self.parameters.get_mut(name) else {
            warn!("Default for unknown parameter '{}' on '{}' ignored", name, self.def.node_type());
            return;
        };
        match types.coerce(param.type_tag(), value) {
            Ok(value) => {
                let active_override = param.is_override();
                param.assign_value(value.clone(), active_override);
                param.set_inherit_value(value);
            }
            Err(err) => warn!("Default for '{}' ignored: {}", name, err),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn def(&self) -> &Arc<NodeTypeDef> {
        &self.def
    }

    pub fn node_type(&self) -> &str {
        self.def.node_type()
    }

    /// Current unique name
    pub fn name(&self) -> &str {
        self.parameters
            .get(NAME)
            .and_then(|p| p.value().as_str())
            .unwrap_or("")
    }

    pub fn is_flow(&self) -> bool {
        self.def.is_flow()
    }

    /// Add a parameter, or return the existing one of the same name.
    /// Unregistered type tags are reported and yield `None`.
    pub(crate) fn add_parameter(
        &mut self,
        name: &str,
        tag: &str,
        mut options: ParamOptions,
        types: &ParameterTypeRegistry,
    ) -> Option<&Parameter> {
        if self.parameters.contains_key(name) {
            return self.parameters.get(name);
        }
        let Some(ty) = types.get(tag) else {
            warn!("Unsupported parameter type '{}' for '{}' on {}", tag, name, self.name());
            return None;
        };
        if let Some(default) = options.default.take() {
            match types.coerce(tag, default) {
                Ok(value) => options.default = Some(value),
                Err(err) => {
                    warn!("Parameter '{}' not added: {}", name, err);
                    return None;
                }
            }
        }
        if options.label.is_none() {
            let short = name
                .strip_prefix(INPUT_PREFIX)
                .or_else(|| name.strip_prefix(OUTPUT_PREFIX))
                .unwrap_or(name);
            options.label = Some(short.to_string());
        }
        if options.visible.is_none() && name.starts_with(OUTPUT_PREFIX) {
            options.visible = Some(false);
        }

        let parameter = Parameter::new(name, ty, options);
        if name.starts_with(INPUT_PREFIX) {
            self.item.add_parameter_input_port(name, parameter.label(), tag);
        } else if name.starts_with(OUTPUT_PREFIX) {
            self.item.add_parameter_output_port(name, parameter.label(), tag);
        }
        self.parameter_names.push(name.to_string());
        self.parameters.insert(name.to_string(), parameter);
        self.parameters.get(name)
    }

    pub(crate) fn remove_parameter(&mut self, name: &str) -> bool {
        if self.parameters.remove(name).is_none() {
            return false;
        }
        self.parameter_names.retain(|n| n != name);
        self.item.remove_parameter_port(name);
        true
    }

    /// Whether the parameter comes with the node type rather than being added later
    pub fn is_declared(&self, name: &str) -> bool {
        BUILT_IN_NAMES.contains(&name)
            || (self.def.kind() == NodeKind::Annotation && matches!(name, WIDTH | HEIGHT))
            || self.def.arg_parameter_names().iter().any(|n| n == name)
            || self.def.result_parameter_names().iter().any(|n| n == name)
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.parameters.contains_key(name)
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.get(name)
    }

    pub(crate) fn parameter_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.parameters.get_mut(name)
    }

    pub(crate) fn parameters_mut(&mut self) -> impl Iterator<Item = &mut Parameter> {
        self.parameters.values_mut()
    }

    /// Parameter names in creation order
    pub fn parameter_names(&self) -> &[String] {
        &self.parameter_names
    }

    /// Parameters in creation order
    pub fn parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameter_names
            .iter()
            .filter_map(move |name| self.parameters.get(name))
    }

    /// Names of the parameters carrying the given prefix, in creation order
    pub fn parameters_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.parameter_names
            .iter()
            .map(String::as_str)
            .filter(move |name| name.starts_with(prefix))
    }

    /// Effective value: properties come from the item, everything else from the parameter
    pub fn value(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.property(name) {
            return Some(value);
        }
        self.parameters.get(name).map(|p| p.value().clone())
    }

    /// Active connection reference of a parameter
    pub fn connect(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).and_then(Parameter::connect)
    }

    /// Geometry exposed through the item: `x`/`y` always, `width`/`height` on annotations
    pub fn has_property(&self, name: &str) -> bool {
        matches!(name, X | Y)
            || (self.def.kind() == NodeKind::Annotation && matches!(name, WIDTH | HEIGHT))
    }

    pub fn property(&self, name: &str) -> Option<Value> {
        if !self.has_property(name) {
            return None;
        }
        let position = self.item.position();
        let size = self.item.size();
        let component = match name {
            X => position.x,
            Y => position.y,
            WIDTH => size.x,
            _ => size.y,
        };
        Some(Value::Float(f64::from(component)))
    }

    pub(crate) fn set_property(&mut self, name: &str, value: &Value) -> bool {
        if !self.has_property(name) {
            return false;
        }
        let Some(component) = value.as_f64() else {
            warn!("Property '{}' needs a number, got {}", name, value.type_name());
            return false;
        };
        let component = component as f32;
        match name {
            X | Y => {
                let mut position = self.item.position();
                if name == X {
                    position.x = component;
                } else {
                    position.y = component;
                }
                self.item.set_position(position);
            }
            _ => {
                let mut size = self.item.size();
                if name == WIDTH {
                    size.x = component;
                } else {
                    size.y = component;
                }
                self.item.set_size(size);
            }
        }
        true
    }

    pub fn position(&self) -> Vec2 {
        self.item.position()
    }

    pub(crate) fn set_position(&mut self, position: Vec2) {
        self.item.set_position(position);
    }

    pub fn item(&self) -> &dyn NodeItem {
        self.item.as_ref()
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Metadata read as a literal, falling back to the stored text
    pub fn metadata_value(&self, key: &str) -> Option<Value> {
        self.metadata.get(key).map(|text| literal::interpret(text))
    }

    pub(crate) fn set_metadata(&mut self, key: &str, value: &str) {
        self.metadata.insert(key.to_string(), value.to_string());
    }

    pub fn has_error(&self) -> bool {
        self.has_error
    }

    pub(crate) fn set_error(&mut self, has_error: bool) {
        self.has_error = has_error;
        self.item.set_error(has_error);
    }

    /// Ports derived from the type's flow ports and the prefixed parameters
    pub fn ports(&self) -> Vec<Port> {
        let mut ports = Vec::new();
        if let NodeKind::PassThrough(dot) = self.def.kind() {
            let kind = match dot {
                DotKind::Any => PortKind::Any,
                DotKind::Flow => PortKind::Flow,
                DotKind::Param => PortKind::Data("object".to_string()),
            };
            ports.push(Port::new(port::DOT_INPUT, PortType::Input, kind.clone()));
            ports.push(Port::new(port::DOT_OUTPUT, PortType::Output, kind));
        }
        for flow in self.def.flow_ports() {
            ports.push(Port::new(flow.name.clone(), flow.port_type, PortKind::Flow));
        }
        for param in self.parameters() {
            let port_type = if param.name().starts_with(INPUT_PREFIX) {
                PortType::Input
            } else if param.name().starts_with(OUTPUT_PREFIX) {
                PortType::Output
            } else {
                continue;
            };
            ports.push(Port::new(
                param.name(),
                port_type,
                PortKind::Data(param.type_tag().to_string()),
            ));
        }
        ports
    }

    pub fn port(&self, name: &str, port_type: PortType) -> Option<Port> {
        self.ports()
            .into_iter()
            .find(|p| p.name == name && p.port_type == port_type)
    }
}

fn declared_options(def: &ParamDef) -> ParamOptions {
    let mut options = ParamOptions::new();
    options.default = def.default.clone();
    options.visible = def.visible;
    options.hints = def.hints.clone();
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::item::DetachedItem;

    fn build(def: NodeTypeDef) -> (Node, NodeRegistry) {
        let mut registry = NodeRegistry::new();
        let node_type = def.node_type().to_string();
        registry.register(def);
        let def = registry.get(&node_type).unwrap();
        let node = Node::new(1, &node_type, def, &registry, Box::new(DetachedItem::new())).unwrap();
        (node, registry)
    }

    #[test]
    fn test_built_in_parameters_are_sorted() {
        let (node, _) = build(NodeTypeDef::new("Blank"));
        assert_eq!(
            node.parameter_names(),
            &["borderColor", "disable", "fillColor", "label", "labelFontSize", "locked", "name", "x", "y"]
        );
        assert_eq!(node.name(), "Blank");
        assert_eq!(node.value(LABEL_FONT_SIZE), Some(Value::Int(10)));
        assert!(!node.parameter(X).unwrap().is_visible());
    }

    #[test]
    fn test_built_in_tabs() {
        let (node, _) = build(NodeTypeDef::new("Note").with_kind(NodeKind::Annotation));
        let tab = |name: &str| node.parameter(name).unwrap().hint_raw(hint::TAB).map(str::to_string);
        for name in [NAME, FILL_COLOR, BORDER_COLOR] {
            assert_eq!(tab(name).as_deref(), Some("None"), "{}", name);
        }
        for name in [LABEL, LABEL_FONT_SIZE, X, Y, LOCKED, DISABLE, WIDTH, HEIGHT] {
            assert_eq!(tab(name).as_deref(), Some("Node"), "{}", name);
        }
        assert_eq!(
            node.parameter(FILL_COLOR).unwrap().hint_raw(hint::SHOW_EDITOR),
            Some("False")
        );
    }

    #[test]
    fn test_metadata_values_fail_soft() {
        let (mut node, _) = build(NodeTypeDef::new("Blank"));
        node.set_metadata("count", "3");
        node.set_metadata("items", "[1, 'a']");
        node.set_metadata("call", "os.getcwd()");
        assert_eq!(node.metadata_value("count"), Some(Value::Int(3)));
        assert_eq!(
            node.metadata_value("items"),
            Some(Value::List(vec![Value::Int(1), Value::from("a")]))
        );
        assert_eq!(node.metadata_value("call"), Some(Value::from("os.getcwd()")));
        assert_eq!(node.metadata_value("missing"), None);
    }

    #[test]
    fn test_declared_args_and_results() {
        let def = NodeTypeDef::pure("Plus")
            .with_args(vec![ParamDef::new("object").hidden(), ParamDef::new("object").hidden()])
            .with_results(vec![ParamDef::new("object")]);
        let (node, _) = build(def);
        let inputs: Vec<_> = node.parameters_with_prefix(INPUT_PREFIX).collect();
        assert_eq!(inputs, vec!["inputs:arg1", "inputs:arg2"]);
        let result = node.parameter("outputs:result").unwrap();
        assert_eq!(result.label(), "result");
        assert!(!result.is_visible());
        assert!(node.is_declared("inputs:arg2"));
        assert!(node.is_declared(LABEL));
        assert!(!node.is_declared("inputs:arg3"));
        assert!(!node.is_declared(WIDTH));
    }

    #[test]
    fn test_add_parameter_is_idempotent() {
        let (mut node, registry) = build(NodeTypeDef::new("Blank"));
        let types = registry.param_types();
        node.add_parameter("count", "int", ParamOptions::new().with_default(3), types);
        let before = node.parameter_names().len();
        let again = node
            .add_parameter("count", "float", ParamOptions::new().with_default(9.5), types)
            .unwrap();
        assert_eq!(again.type_tag(), "int");
        assert_eq!(again.value(), &Value::Int(3));
        assert_eq!(node.parameter_names().len(), before);
    }

    #[test]
    fn test_unknown_type_is_reported_not_added() {
        let (mut node, registry) = build(NodeTypeDef::new("Blank"));
        assert!(node
            .add_parameter("weird", "quaternion", ParamOptions::new(), registry.param_types())
            .is_none());
        assert!(!node.has_parameter("weird"));
    }

    #[test]
    fn test_properties_read_from_item() {
        let (mut node, _) = build(NodeTypeDef::new("Note").with_kind(NodeKind::Annotation));
        assert!(node.set_property(X, &Value::Float(12.5)));
        assert!(node.set_property(WIDTH, &Value::Int(400)));
        assert!(!node.set_property(LABEL, &Value::from("x")));
        assert_eq!(node.value(X), Some(Value::Float(12.5)));
        assert_eq!(node.value(WIDTH), Some(Value::Float(400.0)));
        assert_eq!(node.position(), Vec2::new(12.5, 0.0));
    }

    #[test]
    fn test_ports_follow_parameters() {
        let def = NodeTypeDef::flow("Print").with_args(vec![ParamDef::new("object")]);
        let (mut node, registry) = build(def);
        let names: Vec<_> = node.ports().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["In", "Out", "inputs:arg"]);
        assert!(node.remove_parameter("inputs:arg"));
        assert!(node.port("inputs:arg", PortType::Input).is_none());
        node.add_parameter("outputs:extra", "int", ParamOptions::new(), registry.param_types());
        let extra = node.port("outputs:extra", PortType::Output).unwrap();
        assert_eq!(extra.kind, PortKind::Data("int".to_string()));
    }

    #[test]
    fn test_type_defaults_apply_to_new_instances() {
        let mut registry = NodeRegistry::new();
        registry.register(NodeTypeDef::new("Blank"));
        registry.set_param_default("Blank", LABEL_FONT_SIZE, Value::Float(14.0));
        let def = registry.get("Blank").unwrap();
        let node = Node::new(0, "Blank", def, &registry, Box::new(DetachedItem::new())).unwrap();
        let param = node.parameter(LABEL_FONT_SIZE).unwrap();
        assert_eq!(param.value(), &Value::Int(14));
        assert_eq!(param.inherit_value(), &Value::Int(14));
    }
}
