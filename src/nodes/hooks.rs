//! Node execution hooks
//!
//! Hooks observe the execution lifecycle of a node without changing its
//! behavior. They are registered on the engine per node type, or globally.

use crate::error::GraphError;
use crate::nodes::{Node, NodeGraph};
use std::sync::{Arc, Mutex, PoisonError};

/// Trait for node-specific execution lifecycle hooks
pub trait NodeExecutionHooks: Send + Sync {
    /// Called before the body runs; an error aborts the execution
    fn before_execution(&mut self, _node: &Node, _graph: &NodeGraph) -> Result<(), GraphError> {
        Ok(())
    }

    /// Called after the body finished successfully
    fn after_execution(&mut self, _node: &Node, _graph: &NodeGraph) -> Result<(), GraphError> {
        Ok(())
    }

    /// Called when the body failed, before the error propagates
    fn on_failure(&mut self, _node: &Node, _error: &GraphError) {}
}

/// Records the name of every node as it starts executing
#[derive(Debug, Clone, Default)]
pub struct ExecutionTrace {
    entries: Arc<Mutex<Vec<String>>>,
}

impl ExecutionTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// How many times the named node started
    pub fn count(&self, name: &str) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|entry| *entry == name)
            .count()
    }
}

impl NodeExecutionHooks for ExecutionTrace {
    fn before_execution(&mut self, node: &Node, _graph: &NodeGraph) -> Result<(), GraphError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(node.name().to_string());
        Ok(())
    }
}
