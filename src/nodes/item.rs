//! Presentation-layer interface attached to every node
//!
//! The core never draws anything. It asks the item for geometry (the node's
//! "properties") and tells it when parameter ports appear or disappear.

use crate::constants::node::{DEFAULT_HEIGHT, DEFAULT_WIDTH};
use crate::nodes::factory::NodeTypeDef;
use glam::Vec2;
use std::fmt;

/// Visual representation of a node, supplied by the embedding editor
pub trait NodeItem: fmt::Debug + Send + Sync {
    /// Scene position of the node
    fn position(&self) -> Vec2;

    fn set_position(&mut self, position: Vec2);

    /// Size, meaningful for resizable annotation nodes
    fn size(&self) -> Vec2 {
        Vec2::new(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }

    fn set_size(&mut self, _size: Vec2) {}

    /// Called after an `inputs:` parameter is added
    fn add_parameter_input_port(&mut self, _name: &str, _label: &str, _type_tag: &str) {}

    /// Called after an `outputs:` parameter is added
    fn add_parameter_output_port(&mut self, _name: &str, _label: &str, _type_tag: &str) {}

    /// Called after a parameter is removed
    fn remove_parameter_port(&mut self, _name: &str) {}

    /// Highlight state after a failed execution
    fn set_error(&mut self, _has_error: bool) {}
}

/// Item used when no editor is attached
#[derive(Debug, Clone, PartialEq)]
pub struct DetachedItem {
    position: Vec2,
    size: Vec2,
    parameter_ports: Vec<String>,
    has_error: bool,
}

impl DetachedItem {
    pub fn new() -> Self {
        Self {
            position: Vec2::ZERO,
            size: Vec2::new(DEFAULT_WIDTH, DEFAULT_HEIGHT),
            parameter_ports: Vec::new(),
            has_error: false,
        }
    }

    /// Factory matching [`crate::nodes::NodeGraph::set_item_factory`]
    pub fn create(_def: &NodeTypeDef) -> Box<dyn NodeItem> {
        Box::new(Self::new())
    }

    /// Parameter ports announced so far, in order
    pub fn parameter_ports(&self) -> &[String] {
        &self.parameter_ports
    }

    pub fn has_error(&self) -> bool {
        self.has_error
    }
}

impl Default for DetachedItem {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeItem for DetachedItem {
    fn position(&self) -> Vec2 {
        self.position
    }

    fn set_position(&mut self, position: Vec2) {
        self.position = position;
    }

    fn size(&self) -> Vec2 {
        self.size
    }

    fn set_size(&mut self, size: Vec2) {
        self.size = size;
    }

    fn add_parameter_input_port(&mut self, name: &str, _label: &str, _type_tag: &str) {
        self.parameter_ports.push(name.to_string());
    }

    fn add_parameter_output_port(&mut self, name: &str, _label: &str, _type_tag: &str) {
        self.parameter_ports.push(name.to_string());
    }

    fn remove_parameter_port(&mut self, name: &str) {
        self.parameter_ports.retain(|p| p != name);
    }

    fn set_error(&mut self, has_error: bool) {
        self.has_error = has_error;
    }
}
