//! Port types and connection rules

use crate::nodes::NodeId;
use crate::parameter::ParameterTypeRegistry;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Type of port (input or output)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortType {
    Input,
    Output,
}

/// What travels through a port
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortKind {
    /// Control flow
    Flow,
    /// Parameter data of the given type tag
    Data(String),
    /// Pass-through ports that accept anything
    Any,
}

impl PortKind {
    /// Check whether an output of this kind can feed an input of the other
    pub fn can_connect_to(&self, other: &PortKind, types: &ParameterTypeRegistry) -> bool {
        match (self, other) {
            (PortKind::Any, _) | (_, PortKind::Any) => true,
            (PortKind::Flow, PortKind::Flow) => true,
            (PortKind::Data(a), PortKind::Data(b)) => types.compatible(a, b),
            _ => false,
        }
    }
}

/// A connection point on a node, derived from its type and parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Port {
    pub name: String,
    pub port_type: PortType,
    pub kind: PortKind,
}

impl Port {
    pub fn new(name: impl Into<String>, port_type: PortType, kind: PortKind) -> Self {
        Self {
            name: name.into(),
            port_type,
            kind,
        }
    }

    /// Checks if this port is an input
    pub fn is_input(&self) -> bool {
        matches!(self.port_type, PortType::Input)
    }

    /// Checks if this port is an output
    pub fn is_output(&self) -> bool {
        matches!(self.port_type, PortType::Output)
    }

    /// Inputs keep at most one connection; outputs fan out freely
    pub fn accepts_multiple(&self) -> bool {
        self.is_output()
    }

    pub fn is_flow(&self) -> bool {
        self.kind == PortKind::Flow
    }
}

/// A port addressed by node id and port name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortRef {
    pub node: NodeId,
    pub port: String,
}

impl PortRef {
    pub fn new(node: NodeId, port: impl Into<String>) -> Self {
        Self {
            node,
            port: port.into(),
        }
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.port)
    }
}

/// A directed connection from an output port to an input port
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pipe {
    pub source: PortRef,
    pub target: PortRef,
}

impl Pipe {
    pub fn new(source: PortRef, target: PortRef) -> Self {
        Self { source, target }
    }

    /// Whether either end belongs to the node
    pub fn touches(&self, node: NodeId) -> bool {
        self.source.node == node || self.target.node == node
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_and_data_do_not_mix() {
        let types = ParameterTypeRegistry::with_builtin_types();
        let flow = PortKind::Flow;
        let int = PortKind::Data("int".to_string());
        assert!(flow.can_connect_to(&PortKind::Flow, &types));
        assert!(!flow.can_connect_to(&int, &types));
        assert!(!int.can_connect_to(&flow, &types));
    }

    #[test]
    fn test_data_ports_follow_type_tree() {
        let types = ParameterTypeRegistry::with_builtin_types();
        let object = PortKind::Data("object".to_string());
        let float = PortKind::Data("float".to_string());
        let text = PortKind::Data("str".to_string());
        assert!(float.can_connect_to(&object, &types));
        assert!(object.can_connect_to(&float, &types));
        assert!(!float.can_connect_to(&text, &types));
    }

    #[test]
    fn test_any_matches_everything() {
        let types = ParameterTypeRegistry::with_builtin_types();
        assert!(PortKind::Any.can_connect_to(&PortKind::Flow, &types));
        assert!(PortKind::Data("str".into()).can_connect_to(&PortKind::Any, &types));
    }

    #[test]
    fn test_pipe_touches_both_ends() {
        let pipe = Pipe::new(PortRef::new(1, "Out"), PortRef::new(2, "In"));
        assert!(pipe.touches(1));
        assert!(pipe.touches(2));
        assert!(!pipe.touches(3));
        assert!(Port::new("Out", PortType::Output, PortKind::Flow).accepts_multiple());
    }
}
