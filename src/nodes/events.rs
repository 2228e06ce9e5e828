//! Synchronous change notifications
//!
//! The graph dispatches an event to every registered observer right after a
//! mutation completes. Observers see fully applied state.

use crate::value::Value;
use std::sync::{Arc, Mutex, PoisonError};

/// A change to the graph or one of its nodes
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    NodeCreated { node: String, node_type: String },
    NodeDeleted { node: String },
    NodeRenamed { old: String, new: String },
    ParameterValueChanged { node: String, parameter: String, value: Value },
    ParameterAdded { node: String, parameter: String },
    ParameterRemoved { node: String, parameter: String },
    Connected { source: (String, String), target: (String, String) },
    Disconnected { source: (String, String), target: (String, String) },
}

impl GraphEvent {
    /// Name of the node the event concerns, the new name for renames
    pub fn node(&self) -> &str {
        match self {
            GraphEvent::NodeCreated { node, .. }
            | GraphEvent::NodeDeleted { node }
            | GraphEvent::ParameterValueChanged { node, .. }
            | GraphEvent::ParameterAdded { node, .. }
            | GraphEvent::ParameterRemoved { node, .. } => node,
            GraphEvent::NodeRenamed { new, .. } => new,
            GraphEvent::Connected { target, .. } | GraphEvent::Disconnected { target, .. } => &target.0,
        }
    }
}

/// Receiver of graph events
pub trait GraphObserver: Send {
    fn on_event(&mut self, event: &GraphEvent);
}

impl<F> GraphObserver for F
where
    F: FnMut(&GraphEvent) + Send,
{
    fn on_event(&mut self, event: &GraphEvent) {
        self(event)
    }
}

/// Observer that keeps every event; clones share the same log
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<GraphEvent>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<GraphEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove and return everything recorded so far
    pub fn take(&self) -> Vec<GraphEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl GraphObserver for EventRecorder {
    fn on_event(&mut self, event: &GraphEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
