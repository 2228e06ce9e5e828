//! Node system - graph container, node types, execution and the built-in catalogue

// Core node system modules
pub mod events;
pub mod execution_engine;
pub mod factory;
pub mod graph;
pub mod hooks;
pub mod item;
pub mod node;
pub mod port;

// Built-in node implementations
pub mod builtin;

// Re-export core types
pub use graph::NodeGraph;
pub use node::{Node, NodeId};
pub use port::{Pipe, Port, PortKind, PortRef, PortType};

// Re-export factory types
pub use factory::{DotKind, Executable, Kwargs, NodeKind, NodeRegistry, NodeTypeDef, ParamDef};

// Re-export presentation and notification types
pub use events::{EventRecorder, GraphEvent, GraphObserver};
pub use item::{DetachedItem, NodeItem};

// Re-export execution engine types
pub use execution_engine::{ExecutionEngine, ExecutionStats, RunContext};
pub use hooks::{ExecutionTrace, NodeExecutionHooks};
