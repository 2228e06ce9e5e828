//! Built-in node catalogue
//!
//! Each submodule registers one family of node types. Pure types compute
//! their results from positional (`inputs:arg*`) and keyword (other
//! `inputs:*`) arguments; flow types drive control through their ports.

pub mod control;
pub mod list;
pub mod math;
pub mod operators;
pub mod string;
pub mod system;
pub mod variables;

use crate::error::ComputeError;
use crate::nodes::factory::{DotKind, Kwargs, NodeKind, NodeRegistry, NodeTypeDef};
use crate::value::Value;
use log::debug;

/// Node colors as 0-255 components; a fourth component is alpha
pub(crate) mod colors {
    pub const PURE_FILL: [u8; 3] = [60, 50, 80];
    pub const PURE_BORDER: [u8; 3] = [140, 200, 190];
    pub const VAR_FILL: [u8; 3] = [30, 85, 50];
    pub const VAR_BORDER: [u8; 3] = [220, 200, 250];
    pub const OPERATION_FILL: [u8; 3] = [120, 50, 90];
    pub const OPERATION_BORDER: [u8; 4] = [90, 200, 150, 200];
    pub const LOGIC_FILL: [u8; 3] = [120, 10, 50];
    pub const MAIN_FILL: [u8; 3] = [20, 10, 30];
    pub const MAIN_BORDER: [u8; 3] = [240, 250, 240];
    pub const PRINT_FILL: [u8; 3] = [50, 60, 50];
    pub const PRINT_BORDER: [u8; 4] = [200, 150, 150, 200];
    pub const LIBRARY_FILL: [u8; 3] = [80, 150, 70];
    pub const LIBRARY_BORDER: [u8; 3] = [160, 180, 200];
    pub const SHUTIL_FILL: [u8; 3] = [65, 145, 75];
    pub const SHUTIL_BORDER: [u8; 3] = [180, 220, 250];
    pub const BACKDROP: [u8; 4] = [50, 60, 70, 100];
}

/// Register every built-in node type
pub fn register_all(registry: &mut NodeRegistry) {
    register_structural(registry);
    variables::register(registry);
    operators::register(registry);
    control::register(registry);
    math::register(registry);
    string::register(registry);
    list::register(registry);
    system::register(registry);
    debug!("Registered {} built-in node types", registry.node_types().len());
}

/// Pass-through dots and the annotation box
fn register_structural(registry: &mut NodeRegistry) {
    registry.register(NodeTypeDef::new("Dot").with_kind(NodeKind::PassThrough(DotKind::Any)));
    registry.register(
        NodeTypeDef::new("DotF")
            .with_parents(&["Dot"])
            .with_kind(NodeKind::PassThrough(DotKind::Flow)),
    );
    registry.register(
        NodeTypeDef::new("DotP")
            .with_parents(&["Dot"])
            .with_kind(NodeKind::PassThrough(DotKind::Param)),
    );
    registry.register(
        NodeTypeDef::new("Backdrop")
            .with_kind(NodeKind::Annotation)
            .with_colors(&colors::BACKDROP, &colors::BACKDROP),
    );
}

/// Positional argument or a missing-argument error
pub(crate) fn arg(args: &[Value], index: usize) -> Result<&Value, ComputeError> {
    args.get(index)
        .ok_or_else(|| ComputeError::MissingArgument(format!("arg{}", index + 1)))
}

/// Keyword argument or a missing-argument error
pub(crate) fn kwarg<'a>(kwargs: &'a Kwargs, name: &str) -> Result<&'a Value, ComputeError> {
    kwargs
        .get(name)
        .ok_or_else(|| ComputeError::MissingArgument(name.to_string()))
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::error::GraphError;
    use crate::nodes::{ExecutionEngine, NodeGraph, NodeId, NodeRegistry};
    use crate::value::Value;
    use std::sync::Arc;

    pub fn graph() -> NodeGraph {
        NodeGraph::new(Arc::new(NodeRegistry::with_builtins()))
    }

    /// Create a node and set its inputs
    pub fn node_with(graph: &mut NodeGraph, node_type: &str, inputs: &[(&str, Value)]) -> NodeId {
        let id = graph.create_node(node_type, None, None).unwrap();
        for (name, value) in inputs {
            graph.set_value(id, name, value.clone()).unwrap();
        }
        id
    }

    /// Execute a pure node and read its single result
    pub fn compute(graph: &mut NodeGraph, id: NodeId) -> Result<Value, GraphError> {
        ExecutionEngine::new().execute_node(graph, id)?;
        graph.resolved_value(id, "outputs:result")
    }

    /// Build, execute and read a pure node in one go
    pub fn eval(node_type: &str, inputs: &[(&str, Value)]) -> Result<Value, GraphError> {
        let mut g = graph();
        let id = node_with(&mut g, node_type, inputs);
        compute(&mut g, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_groups() {
        let registry = NodeRegistry::with_builtins();
        let groups = registry.nodes_by_group();
        for group in ["Other", "Var", "Operation", "Logic", "Math", "String", "List", "os", "shutil", "System", "Time"] {
            assert!(groups.contains_key(group), "missing group {}", group);
        }
        assert!(registry.is_subtype("DotF", "Dot"));
        assert!(registry.is_subtype("Backdrop", "Node"));
        assert!(registry.is_subtype("Var Int Array", "Var Object Array"));
        assert!(!registry.contains("Execute CMD"));
    }

    #[test]
    fn test_missing_arguments_are_named() {
        let kwargs = Kwargs::new();
        assert_eq!(
            arg(&[], 1).unwrap_err(),
            ComputeError::MissingArgument("arg2".to_string())
        );
        assert_eq!(
            kwarg(&kwargs, "start").unwrap_err(),
            ComputeError::MissingArgument("start".to_string())
        );
    }
}
