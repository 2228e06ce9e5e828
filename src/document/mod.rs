//! Persisted graph documents
//!
//! A graph is captured into a [`GraphDocument`] (plain records of names,
//! external value text and connections), which the writer turns into XML and
//! the reader parses back. Importing a document into a [`NodeGraph`] checks
//! every node type first and removes whatever it created if a later step
//! fails, so a document is applied completely or not at all.

pub mod reader;
pub mod writer;

use crate::constants::document::NEWLINE_TOKEN;
use crate::constants::param::{LABEL, X, Y};
use crate::error::{DocumentError, GraphError, Result};
use crate::nodes::{NodeGraph, NodeId};
use crate::parameter::ParamOptions;
use crate::value::Value;
use glam::Vec2;
use log::{info, warn};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Parsed or captured graph document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphDocument {
    /// Top-left corner of the bounding box of the contained nodes
    pub origin: Vec2,
    pub nodes: Vec<NodeRecord>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeRecord {
    pub name: String,
    pub node_type: String,
    pub parameters: Vec<ParamRecord>,
    pub outputs: Vec<LinkRecord>,
    pub inputs: Vec<LinkRecord>,
    pub metadata: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamRecord {
    pub name: String,
    /// Present when the node type does not imply the parameter
    pub type_tag: Option<String>,
    pub hidden: bool,
    pub custom: bool,
    pub content: ParamContent,
    pub metadata: Vec<(String, String)>,
    pub hints: Vec<(String, String)>,
}

/// A parameter stores either a connection reference or literal text
#[derive(Debug, Clone, PartialEq)]
pub enum ParamContent {
    Connect(String),
    Value(String),
}

impl Default for ParamContent {
    fn default() -> Self {
        ParamContent::Value(String::new())
    }
}

/// One end of a pipe as seen from the node holding the record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkRecord {
    pub port: String,
    pub node: String,
    pub node_port: String,
}

/// Value text as stored in the document; only the label escapes newlines
pub(crate) fn encode_text(parameter: &str, text: String) -> String {
    if parameter == LABEL {
        text.replace('\n', NEWLINE_TOKEN)
    } else {
        text
    }
}

pub(crate) fn decode_text(parameter: &str, text: &str) -> String {
    if parameter == LABEL {
        text.replace(NEWLINE_TOKEN, "\n")
    } else {
        text.to_string()
    }
}

/// Point a `"node.port"` reference at the name a node actually received
fn remap_reference(reference: &str, renamed: &HashMap<String, String>) -> String {
    match reference.rsplit_once('.') {
        Some((node, port)) => match renamed.get(node) {
            Some(actual) => format!("{}.{}", actual, port),
            None => reference.to_string(),
        },
        None => reference.to_string(),
    }
}

fn io_error(path: &Path, source: std::io::Error) -> GraphError {
    GraphError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl NodeGraph {
    /// Serialize the whole graph
    pub fn to_xml(&self) -> Result<String> {
        self.nodes_to_xml(&self.node_ids())
    }

    /// Serialize a selection of nodes, keeping every connection they have
    pub fn nodes_to_xml(&self, ids: &[NodeId]) -> Result<String> {
        Ok(GraphDocument::capture(self, ids)?.to_xml()?)
    }

    /// Replace the graph's contents with a document. The current contents
    /// are kept when the document cannot be imported.
    pub fn load_xml(&mut self, xml: &str) -> Result<Vec<NodeId>> {
        let document = GraphDocument::parse(xml)?;
        self.validate_document(&document)?;
        // Trial import into an empty graph before anything is cleared
        NodeGraph::new(Arc::clone(self.registry())).import_document(&document, Vec2::ZERO)?;
        self.clear()?;
        self.import_document(&document, Vec2::ZERO)
    }

    /// Add a document's nodes with their top-left corner moved to `at`
    pub fn paste_xml(&mut self, xml: &str, at: Vec2) -> Result<Vec<NodeId>> {
        let document = GraphDocument::parse(xml)?;
        let offset = at - document.origin;
        self.import_document(&document, offset)
    }

    pub fn save(&mut self, path: &Path) -> Result<()> {
        let xml = self.to_xml()?;
        fs::write(path, xml).map_err(|err| io_error(path, err))?;
        self.set_path(Some(path.to_path_buf()));
        info!("Saved {} nodes to {}", self.len(), path.display());
        Ok(())
    }

    pub fn open(&mut self, path: &Path) -> Result<Vec<NodeId>> {
        let xml = fs::read_to_string(path).map_err(|err| io_error(path, err))?;
        let ids = self.load_xml(&xml)?;
        self.set_path(Some(path.to_path_buf()));
        info!("Loaded {} nodes from {}", ids.len(), path.display());
        Ok(ids)
    }

    fn validate_document(&self, document: &GraphDocument) -> Result<()> {
        match document
            .nodes
            .iter()
            .find(|record| !self.registry().contains(&record.node_type))
        {
            Some(record) => Err(DocumentError::UnknownNodeType(record.node_type.clone()).into()),
            None => Ok(()),
        }
    }

    /// Create the document's nodes, shifted by `offset`, and wire them up.
    /// Connections that cannot be made are logged and skipped.
    pub fn import_document(&mut self, document: &GraphDocument, offset: Vec2) -> Result<Vec<NodeId>> {
        self.validate_document(document)?;

        let mut ids = Vec::with_capacity(document.nodes.len());
        let mut created = HashMap::new();
        let mut renamed = HashMap::new();
        for record in &document.nodes {
            let id = match self.create_node(&record.node_type, Some(&record.name), None) {
                Ok(id) => id,
                Err(err) => {
                    self.discard(&ids);
                    return Err(err);
                }
            };
            if let Some(node) = self.node(id) {
                if node.name() != record.name {
                    renamed.insert(record.name.clone(), node.name().to_string());
                }
            }
            created.insert(record.name.clone(), id);
            ids.push(id);
        }

        for (record, &id) in document.nodes.iter().zip(&ids) {
            if let Err(err) = self.apply_record(id, record, offset, &renamed) {
                self.discard(&ids);
                return Err(err);
            }
        }

        for (record, &id) in document.nodes.iter().zip(&ids) {
            for link in &record.outputs {
                // Targets outside the document keep their own inputs
                let Some(&target) = created.get(&link.node) else {
                    continue;
                };
                if let Err(err) = self.connect(id, &link.port, target, &link.node_port) {
                    warn!("Skipped connection {}.{} -> {}.{}: {}", record.name, link.port, link.node, link.node_port, err);
                }
            }
            for link in &record.inputs {
                let source = created
                    .get(&link.node)
                    .copied()
                    .or_else(|| self.node_id(&link.node));
                let Some(source) = source else {
                    warn!("Skipped connection from missing node '{}'", link.node);
                    continue;
                };
                if let Err(err) = self.connect(source, &link.node_port, id, &link.port) {
                    warn!("Skipped connection {}.{} -> {}.{}: {}", link.node, link.node_port, record.name, link.port, err);
                }
            }
        }

        info!("Imported {} nodes", ids.len());
        Ok(ids)
    }

    fn discard(&mut self, ids: &[NodeId]) {
        for &id in ids {
            if let Err(err) = self.delete_node(id) {
                warn!("Could not remove partially imported node {}: {}", id, err);
            }
        }
    }

    fn apply_record(
        &mut self,
        id: NodeId,
        record: &NodeRecord,
        offset: Vec2,
        renamed: &HashMap<String, String>,
    ) -> Result<()> {
        for param in &record.parameters {
            let exists = self.node(id).map_or(false, |n| n.has_parameter(&param.name));
            if !exists {
                let Some(tag) = &param.type_tag else {
                    warn!("'{}' has no parameter '{}' and the document gives no type", record.name, param.name);
                    continue;
                };
                let options = if param.custom {
                    ParamOptions::new().custom()
                } else {
                    ParamOptions::new()
                };
                if self.add_parameter(id, &param.name, tag, options)?.is_none() {
                    continue;
                }
            }
            if param.hidden {
                self.set_parameter_visible(id, &param.name, false)?;
            }

            match &param.content {
                ParamContent::Connect(reference) => {
                    let reference = remap_reference(reference, renamed);
                    self.set_connect_with(id, &param.name, Some(&reference), false, true)?;
                }
                ParamContent::Value(text) => {
                    let tag = self
                        .node(id)
                        .and_then(|n| n.parameter(&param.name))
                        .map(|p| p.type_tag().to_string())
                        .unwrap_or_default();
                    let text = decode_text(&param.name, text);
                    let mut value = self.registry().param_types().from_external(&tag, &text)?;
                    if let Some(component) = value.as_f64() {
                        if param.name == X {
                            value = Value::Float(component + f64::from(offset.x));
                        } else if param.name == Y {
                            value = Value::Float(component + f64::from(offset.y));
                        }
                    }
                    self.set_value_with(id, &param.name, value, false, true)?;
                }
            }

            for (key, value) in &param.metadata {
                self.set_parameter_metadata(id, &param.name, key, value)?;
            }
            for (key, value) in &param.hints {
                self.set_parameter_hint(id, &param.name, key, value)?;
            }
        }
        for (key, value) in &record.metadata {
            self.set_metadata(id, key, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{ExecutionEngine, NodeRegistry};
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn graph() -> NodeGraph {
        NodeGraph::new(Arc::new(NodeRegistry::with_builtins()))
    }

    /// Main -> For Loop over a Var Object, printing each item, then a labelled Print
    fn sample() -> NodeGraph {
        let mut g = graph();
        let main = g.create_node("Main", None, Some(Vec2::new(10.0, -4.0))).unwrap();
        let var = g.create_node("Var Object", Some("Items"), Some(Vec2::new(20.0, 30.0))).unwrap();
        let each_loop = g.create_node("For Loop", None, Some(Vec2::new(60.0, 0.0))).unwrap();
        let print = g.create_node("Print", None, Some(Vec2::new(120.0, 5.0))).unwrap();
        let done = g.create_node("Print", Some("Done"), Some(Vec2::new(120.0, 40.0))).unwrap();
        g.set_value(var, "outputs:result", Value::List(vec![Value::Int(1), Value::from("two")])).unwrap();
        g.set_value(done, "inputs:arg", "finished").unwrap();
        g.set_value(done, LABEL, "line one\nline two").unwrap();
        g.set_metadata(done, "note", "'kept'").unwrap();
        g.set_parameter_hint(done, "inputs:arg", "tab", "Inputs").unwrap();
        g.connect(main, "Out", each_loop, "In").unwrap();
        g.connect(var, "outputs:result", each_loop, "inputs:array").unwrap();
        g.connect(each_loop, "For Each Loop", print, "In").unwrap();
        g.connect(each_loop, "outputs:each", print, "inputs:arg").unwrap();
        g.connect(each_loop, "Finally", done, "In").unwrap();
        g
    }

    fn connection_set(g: &NodeGraph) -> BTreeSet<(String, String, String, String)> {
        g.nodes()
            .iter()
            .flat_map(|node| {
                g.outputs_of(node.id())
                    .into_iter()
                    .map(move |(port, target, target_port)| (node.name().to_string(), port, target, target_port))
            })
            .collect()
    }

    #[test]
    fn test_round_trip_preserves_graph() {
        let original = sample();
        let xml = original.to_xml().unwrap();

        let mut restored = graph();
        restored.load_xml(&xml).unwrap();

        let names = |g: &NodeGraph| g.node_names().into_iter().collect::<BTreeSet<_>>();
        assert_eq!(names(&original), names(&restored));
        assert_eq!(connection_set(&original), connection_set(&restored));
        for node in original.nodes() {
            let copy = restored.node_by_name(node.name()).unwrap();
            assert_eq!(copy.node_type(), node.node_type());
            assert_eq!(copy.position(), node.position());
            for param in node.parameters() {
                assert_eq!(copy.value(param.name()), node.value(param.name()), "{}.{}", node.name(), param.name());
                assert_eq!(copy.connect(param.name()), param.connect());
            }
        }
        let done = restored.node_by_name("Done").unwrap();
        assert_eq!(done.metadata().get("note").map(String::as_str), Some("'kept'"));
        assert_eq!(done.parameter("inputs:arg").unwrap().hint_raw("tab"), Some("Inputs"));
    }

    #[test]
    fn test_round_trip_is_independent_of_creation_order() {
        let mut forward = graph();
        let a = forward.create_node("Var Int", Some("A"), None).unwrap();
        let b = forward.create_node("Print", Some("B"), None).unwrap();
        forward.connect(a, "outputs:result", b, "inputs:arg").unwrap();

        let mut backward = graph();
        let b2 = backward.create_node("Print", Some("B"), None).unwrap();
        let a2 = backward.create_node("Var Int", Some("A"), None).unwrap();
        backward.connect(a2, "outputs:result", b2, "inputs:arg").unwrap();

        let mut first = graph();
        first.load_xml(&forward.to_xml().unwrap()).unwrap();
        let mut second = graph();
        second.load_xml(&backward.to_xml().unwrap()).unwrap();
        assert_eq!(connection_set(&first), connection_set(&second));
        assert_eq!(first.node_names().len(), 2);
    }

    #[test]
    fn test_loaded_graph_runs() {
        let mut restored = graph();
        restored.load_xml(&sample().to_xml().unwrap()).unwrap();
        let mut engine = ExecutionEngine::new();
        engine.run(&mut restored).unwrap();
        assert_eq!(engine.console(), &["1", "two", "finished"]);
    }

    #[test]
    fn test_label_newlines_are_escaped() {
        let xml = sample().to_xml().unwrap();
        assert!(xml.contains("line one&lt;\\n&gt;line two"));
        assert!(!xml.contains("line one\nline two"));
    }

    #[test]
    fn test_custom_ports_survive() {
        let mut g = graph();
        let array = g.create_node("Var Int Array", None, None).unwrap();
        let port = g.add_input_port(array).unwrap();
        g.set_value(array, &port, 7).unwrap();

        let mut restored = graph();
        restored.load_xml(&g.to_xml().unwrap()).unwrap();
        let copy = restored.node_by_name("Var Int Array").unwrap();
        let param = copy.parameter(&port).unwrap();
        assert!(param.is_custom());
        assert_eq!(param.value(), &Value::Int(7));
    }

    #[test]
    fn test_failed_load_keeps_current_graph() {
        let mut g = graph();
        g.create_node("Print", Some("Keep"), None).unwrap();
        let xml = r#"<nodegraph x="0.0" y="0.0">
  <n n="Broken" c="Print">
    <p n="inputs:arg" con="no-separator"/>
  </n>
</nodegraph>"#;
        assert!(matches!(g.load_xml(xml), Err(GraphError::InvalidConnect(_))));
        assert_eq!(g.node_names(), vec!["Keep".to_string()]);
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn test_unknown_type_imports_nothing() {
        let mut g = graph();
        g.create_node("Main", None, None).unwrap();
        let xml = r#"<nodegraph x="0.0" y="0.0">
  <n n="Print" c="Print"/>
  <n n="Warp" c="Warp Drive"/>
</nodegraph>"#;
        let err = g.load_xml(xml).unwrap_err();
        assert!(matches!(err, GraphError::Document(DocumentError::UnknownNodeType(ref t)) if t == "Warp Drive"));
        assert_eq!(g.node_names(), vec!["Main".to_string()]);

        assert!(g.paste_xml(xml, Vec2::ZERO).is_err());
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn test_paste_offsets_and_renames() {
        let source = sample();
        let selection: Vec<NodeId> = ["Items", "For Loop"]
            .iter()
            .filter_map(|name| source.node_id(name))
            .collect();
        let xml = source.nodes_to_xml(&selection).unwrap();

        let mut g = sample();
        let pasted = g.paste_xml(&xml, Vec2::new(100.0, 100.0)).unwrap();
        assert_eq!(pasted.len(), 2);
        let items = g.node(pasted[0]).unwrap();
        assert_eq!(items.name(), "Items1");
        assert_eq!(items.position(), Vec2::new(100.0, 130.0));
        let each_loop = g.node(pasted[1]).unwrap();
        assert_eq!(each_loop.position(), Vec2::new(140.0, 100.0));
        assert_eq!(each_loop.connect("inputs:array"), Some("Items1.outputs:result"));
        // The pasted loop does not steal the original downstream nodes
        let print = g.node_id("Print").unwrap();
        assert_eq!(g.connection_into(print, "In").map(|p| p.node), g.node_id("For Loop"));
    }

    #[test]
    fn test_save_and_open() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("graph.xml");
        let mut original = sample();
        original.save(&path).unwrap();
        assert_eq!(original.path(), Some(path.as_path()));

        let mut restored = graph();
        restored.open(&path).unwrap();
        assert_eq!(restored.path(), Some(path.as_path()));
        assert_eq!(restored.len(), original.len());

        let missing = restored.open(&tmp.path().join("missing.xml")).unwrap_err();
        assert!(matches!(missing, GraphError::Io { .. }));
        assert_eq!(restored.len(), original.len());
    }

    #[test]
    fn test_remap_reference() {
        let renamed = HashMap::from([("A".to_string(), "A1".to_string())]);
        assert_eq!(remap_reference("A.outputs:result", &renamed), "A1.outputs:result");
        assert_eq!(remap_reference("B.Out", &renamed), "B.Out");
    }
}
