//! Nodeflow core library
//!
//! Typed node graphs with lazily resolved parameters, explicit control-flow
//! nodes and a lossless XML document format. Editors attach through
//! [`nodes::NodeItem`] and [`nodes::GraphObserver`]; nothing here draws.

pub mod config;
pub mod constants;
pub mod document;
pub mod error;
pub mod label;
pub mod literal;
pub mod nodes;
pub mod parameter;
pub mod plugins;
pub mod value;

pub use config::GraphConfig;
pub use document::GraphDocument;
pub use error::{ComputeError, DocumentError, GraphError, Result};
pub use nodes::{ExecutionEngine, Node, NodeGraph, NodeId, NodeRegistry, NodeTypeDef};
pub use parameter::{ParamOptions, Parameter, ParameterTypeRegistry};
pub use plugins::{GraphPlugin, PluginManager};
pub use value::Value;
