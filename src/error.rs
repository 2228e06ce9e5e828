//! Error types for graph editing, execution and document I/O

use std::path::PathBuf;
use thiserror::Error;

/// Failure raised from inside a node body
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComputeError {
    #[error("unsupported operand types for {op}: {left} and {right}")]
    TypeMismatch {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("expected {expected}, got {found}")]
    UnexpectedType {
        expected: &'static str,
        found: &'static str,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("missing argument '{0}'")]
    MissingArgument(String),

    #[error("value not found in list")]
    ValueNotFound,

    #[error("math domain error in {0}")]
    MathDomain(&'static str),

    #[error("{0}")]
    Io(String),

    #[error("{0}")]
    Message(String),
}

impl From<std::io::Error> for ComputeError {
    fn from(err: std::io::Error) -> Self {
        ComputeError::Io(err.to_string())
    }
}

/// Failure while reading or writing a graph document
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("malformed xml: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed attribute: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("invalid utf-8 in document: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("bad escape sequence: {0}")]
    Escape(#[from] quick_xml::escape::EscapeError),

    #[error("<{element}> is missing attribute '{attribute}'")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },

    #[error("unexpected element <{0}>")]
    UnexpectedElement(String),

    #[error("document has no root element")]
    MissingRoot,

    #[error("unknown node type '{0}' in document")]
    UnknownNodeType(String),

    #[error("invalid value '{value}' for attribute '{attribute}'")]
    InvalidAttribute { attribute: &'static str, value: String },
}

/// Errors surfaced by the graph container and the execution engine
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("unknown node type '{0}'")]
    UnknownNodeType(String),

    #[error("unknown parameter type '{tag}' for parameter '{name}'")]
    UnknownParameterType { name: String, tag: String },

    #[error("node '{0}' not found")]
    NodeNotFound(String),

    #[error("parameter '{parameter}' not found on node '{node}'")]
    ParameterNotFound { node: String, parameter: String },

    #[error("port '{port}' not found on node '{node}'")]
    PortNotFound { node: String, port: String },

    #[error("cannot connect {from} to {to}: incompatible ports")]
    IncompatiblePorts { from: String, to: String },

    #[error("cannot connect node '{0}' to itself")]
    SelfConnection(String),

    #[error("malformed connection reference '{0}'")]
    InvalidConnect(String),

    #[error("pass-through node '{0}' has no upstream connection")]
    DanglingPassThrough(String),

    #[error("node '{node}' failed: {source}")]
    Computation {
        node: String,
        #[source]
        source: ComputeError,
    },

    #[error("execution depth exceeded {0}, the flow graph probably contains a cycle")]
    RecursionLimit(usize),

    #[error("graph has no '{0}' node to start from")]
    NoEntryPoint(String),

    #[error("node '{0}' has no addable port")]
    NoAddablePort(String),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl GraphError {
    /// Whether this error came out of a node body rather than graph structure
    pub fn is_computation(&self) -> bool {
        matches!(self, GraphError::Computation { .. })
    }
}

pub type Result<T, E = GraphError> = std::result::Result<T, E>;
