//! [`GraphDocument`] capture and XML output

use super::{encode_text, GraphDocument, LinkRecord, NodeRecord, ParamContent, ParamRecord};
use crate::constants::document::{HINT, INPUT, METADATA, NODE, OUTPUT, PARAM, ROOT};
use crate::constants::param::NAME;
use crate::error::{DocumentError, Result};
use crate::nodes::{Node, NodeGraph, NodeId};
use glam::Vec2;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::Writer;

type XmlWriter = Writer<Vec<u8>>;

fn pairs<'a>(entries: impl Iterator<Item = (&'a String, &'a String)>) -> Vec<(String, String)> {
    entries.map(|(k, v)| (k.clone(), v.clone())).collect()
}

fn links(entries: Vec<(String, String, String)>) -> Vec<LinkRecord> {
    entries
        .into_iter()
        .map(|(port, node, node_port)| LinkRecord { port, node, node_port })
        .collect()
}

/// Parameters worth storing: overridden, custom, added after creation, or node properties
fn capture_parameters(graph: &NodeGraph, node: &Node) -> Result<Vec<ParamRecord>> {
    let types = graph.registry().param_types();
    let mut records = Vec::new();
    for param in node.parameters() {
        let name = param.name();
        if name == NAME {
            continue;
        }
        let declared = node.is_declared(name);
        let property = node.has_property(name);
        if !(param.is_override() || param.is_custom() || property || !declared) {
            continue;
        }
        let content = match param.connect() {
            Some(reference) => ParamContent::Connect(reference.to_string()),
            None => {
                let value = node.value(name).unwrap_or_default();
                ParamContent::Value(encode_text(name, types.to_external(param.type_tag(), &value)?))
            }
        };
        records.push(ParamRecord {
            name: name.to_string(),
            type_tag: (param.is_custom() || !declared).then(|| param.type_tag().to_string()),
            hidden: !param.is_visible() && !property,
            custom: param.is_custom(),
            content,
            metadata: pairs(param.changed_metadata()),
            hints: pairs(param.changed_hints()),
        });
    }
    Ok(records)
}

fn format_coordinate(value: f32) -> String {
    format!("{:?}", value)
}

/// Write an element, as an empty tag when `children` writes nothing
fn write_element(
    writer: &mut XmlWriter,
    start: BytesStart<'_>,
    has_children: bool,
    children: impl FnOnce(&mut XmlWriter) -> Result<(), DocumentError>,
) -> Result<(), DocumentError> {
    if !has_children {
        return emit(writer, Event::Empty(start));
    }
    let end = BytesEnd::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    emit(writer, Event::Start(start))?;
    children(writer)?;
    emit(writer, Event::End(end))
}

fn emit(writer: &mut XmlWriter, event: Event<'_>) -> Result<(), DocumentError> {
    writer
        .write_event(event)
        .map_err(|err| DocumentError::Xml(quick_xml::Error::from(err)))
}

fn write_entries(writer: &mut XmlWriter, tag: &str, entries: &[(String, String)]) -> Result<(), DocumentError> {
    for (key, value) in entries {
        let mut start = BytesStart::new(tag);
        start.push_attribute(("k", key.as_str()));
        start.push_attribute(("v", value.as_str()));
        emit(writer, Event::Empty(start))?;
    }
    Ok(())
}

fn write_parameter(writer: &mut XmlWriter, param: &ParamRecord) -> Result<(), DocumentError> {
    let mut start = BytesStart::new(PARAM);
    start.push_attribute(("n", param.name.as_str()));
    if let Some(tag) = &param.type_tag {
        start.push_attribute(("t", tag.as_str()));
    }
    if param.hidden {
        start.push_attribute(("vis", "0"));
    }
    if param.custom {
        start.push_attribute(("cus", "True"));
    }
    match &param.content {
        ParamContent::Connect(reference) => start.push_attribute(("con", reference.as_str())),
        ParamContent::Value(text) => start.push_attribute(("val", text.as_str())),
    }
    let has_children = !param.metadata.is_empty() || !param.hints.is_empty();
    write_element(writer, start, has_children, |writer| {
        write_entries(writer, METADATA, &param.metadata)?;
        write_entries(writer, HINT, &param.hints)
    })
}

fn write_links(writer: &mut XmlWriter, tag: &str, links: &[LinkRecord]) -> Result<(), DocumentError> {
    for link in links {
        let mut start = BytesStart::new(tag);
        start.push_attribute(("n", link.port.as_str()));
        start.push_attribute(("conN", link.node.as_str()));
        start.push_attribute(("conP", link.node_port.as_str()));
        emit(writer, Event::Empty(start))?;
    }
    Ok(())
}

fn write_node(writer: &mut XmlWriter, node: &NodeRecord) -> Result<(), DocumentError> {
    let mut start = BytesStart::new(NODE);
    start.push_attribute(("n", node.name.as_str()));
    start.push_attribute(("c", node.node_type.as_str()));
    let has_children = !(node.parameters.is_empty()
        && node.outputs.is_empty()
        && node.inputs.is_empty()
        && node.metadata.is_empty());
    write_element(writer, start, has_children, |writer| {
        for param in &node.parameters {
            write_parameter(writer, param)?;
        }
        write_links(writer, OUTPUT, &node.outputs)?;
        write_links(writer, INPUT, &node.inputs)?;
        write_entries(writer, METADATA, &node.metadata)
    })
}

impl GraphDocument {
    /// Snapshot the given nodes in id order, with every connection they touch
    pub fn capture(graph: &NodeGraph, ids: &[NodeId]) -> Result<Self> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let mut nodes = Vec::with_capacity(ids.len());
        let mut origin: Option<Vec2> = None;
        for id in ids {
            let Some(node) = graph.node(id) else {
                continue;
            };
            let position = node.position();
            origin = Some(origin.map_or(position, |o| o.min(position)));
            nodes.push(NodeRecord {
                name: node.name().to_string(),
                node_type: node.node_type().to_string(),
                parameters: capture_parameters(graph, node)?,
                outputs: links(graph.outputs_of(id)),
                inputs: links(graph.inputs_of(id)),
                metadata: pairs(node.metadata().iter()),
            });
        }
        Ok(Self {
            origin: origin.unwrap_or(Vec2::ZERO),
            nodes,
        })
    }

    pub fn to_xml(&self) -> Result<String, DocumentError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        let mut root = BytesStart::new(ROOT);
        root.push_attribute(("x", format_coordinate(self.origin.x).as_str()));
        root.push_attribute(("y", format_coordinate(self.origin.y).as_str()));
        write_element(&mut writer, root, !self.nodes.is_empty(), |writer| {
            for node in &self.nodes {
                write_node(writer, node)?;
            }
            Ok(())
        })?;
        String::from_utf8(writer.into_inner()).map_err(|err| DocumentError::Encoding(err.utf8_error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::NodeRegistry;
    use crate::value::Value;
    use std::sync::Arc;

    fn graph() -> NodeGraph {
        NodeGraph::new(Arc::new(NodeRegistry::with_builtins()))
    }

    #[test]
    fn test_untouched_parameters_are_skipped() {
        let mut g = graph();
        let print = g.create_node("Print", None, Some(Vec2::new(3.0, 4.0))).unwrap();
        let doc = GraphDocument::capture(&g, &[print]).unwrap();
        let names: Vec<&str> = doc.nodes[0].parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["x", "y"]);
        assert_eq!(doc.origin, Vec2::new(3.0, 4.0));

        g.set_value(print, "inputs:arg", "hi").unwrap();
        let doc = GraphDocument::capture(&g, &[print]).unwrap();
        let arg = doc.nodes[0].parameters.iter().find(|p| p.name == "inputs:arg").unwrap();
        assert_eq!(arg.content, ParamContent::Value("'hi'".to_string()));
        assert_eq!(arg.type_tag, None);
        assert!(arg.hidden);
    }

    #[test]
    fn test_added_parameters_carry_their_type() {
        let mut g = graph();
        let var = g.create_node("Var Object", None, None).unwrap();
        g.add_parameter(var, "count", "int", crate::parameter::ParamOptions::new()).unwrap();
        let doc = GraphDocument::capture(&g, &[var]).unwrap();
        let count = doc.nodes[0].parameters.iter().find(|p| p.name == "count").unwrap();
        assert_eq!(count.type_tag.as_deref(), Some("int"));
        assert_eq!(count.content, ParamContent::Value("0".to_string()));
    }

    #[test]
    fn test_origin_is_top_left_of_selection() {
        let mut g = graph();
        let a = g.create_node("Print", None, Some(Vec2::new(5.0, 40.0))).unwrap();
        let b = g.create_node("Print", None, Some(Vec2::new(-2.0, 50.0))).unwrap();
        let doc = GraphDocument::capture(&g, &[b, a]).unwrap();
        assert_eq!(doc.origin, Vec2::new(-2.0, 40.0));
        assert_eq!(doc.nodes[0].name, "Print");
    }

    #[test]
    fn test_xml_shape() {
        let mut g = graph();
        let main = g.create_node("Main", None, Some(Vec2::new(10.0, -4.0))).unwrap();
        let print = g.create_node("Print", None, Some(Vec2::new(30.0, 0.0))).unwrap();
        g.connect(main, "Out", print, "In").unwrap();
        g.set_metadata(main, "key", "'value'").unwrap();
        g.set_value(print, "inputs:arg", Value::Int(1)).unwrap();

        let xml = g.to_xml().unwrap();
        assert!(xml.starts_with(r#"<nodegraph x="10.0" y="-4.0">"#));
        assert!(xml.contains(r#"<n n="Main" c="Main">"#));
        assert!(xml.contains(r#"<p n="x" val="10.0"/>"#));
        assert!(xml.contains(r#"<o n="Out" conN="Print" conP="In"/>"#));
        assert!(xml.contains(r#"<i n="In" conN="Main" conP="Out"/>"#));
        assert!(xml.contains(r#"<m k="key" v="&apos;value&apos;"/>"#));
        assert!(xml.contains(r#"<p n="inputs:arg" vis="0" val="1"/>"#));

        assert_eq!(graph().to_xml().unwrap(), r#"<nodegraph x="0.0" y="0.0"/>"#);
    }
}
