//! XML to [`GraphDocument`]

use super::{GraphDocument, LinkRecord, NodeRecord, ParamContent, ParamRecord};
use crate::constants::document::{HINT, INPUT, METADATA, NODE, OUTPUT, PARAM, ROOT};
use crate::error::DocumentError;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;

const ELEMENTS: [&str; 7] = [ROOT, NODE, PARAM, OUTPUT, INPUT, METADATA, HINT];

fn element(name: &[u8]) -> Result<&'static str, DocumentError> {
    ELEMENTS
        .into_iter()
        .find(|tag| tag.as_bytes() == name)
        .ok_or_else(|| DocumentError::UnexpectedElement(String::from_utf8_lossy(name).into_owned()))
}

/// Unescaped attributes of one element
struct Attributes {
    element: &'static str,
    values: HashMap<String, String>,
}

impl Attributes {
    fn read(element: &'static str, start: &BytesStart<'_>) -> Result<Self, DocumentError> {
        let mut values = HashMap::new();
        for attr in start.attributes() {
            let attr = attr?;
            let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
            let raw = std::str::from_utf8(&attr.value)?;
            values.insert(key, unescape(raw)?.into_owned());
        }
        Ok(Self { element, values })
    }

    fn take(&mut self, attribute: &str) -> Option<String> {
        self.values.remove(attribute)
    }

    fn require(&mut self, attribute: &'static str) -> Result<String, DocumentError> {
        self.take(attribute).ok_or(DocumentError::MissingAttribute {
            element: self.element,
            attribute,
        })
    }

    fn coordinate(&mut self, attribute: &'static str) -> Result<f32, DocumentError> {
        match self.take(attribute) {
            None => Ok(0.0),
            Some(text) => text
                .trim()
                .parse()
                .map_err(|_| DocumentError::InvalidAttribute { attribute, value: text }),
        }
    }

    fn flag(&mut self, attribute: &str, set: &str) -> bool {
        self.take(attribute).map_or(false, |v| v == set)
    }
}

/// Builds the document as elements open; `open` holds the element path
struct Builder {
    document: GraphDocument,
    open: Vec<&'static str>,
    seen_root: bool,
}

impl Builder {
    fn current_node(&mut self) -> Result<&mut NodeRecord, DocumentError> {
        self.document.nodes.last_mut().ok_or(DocumentError::MissingRoot)
    }

    fn current_param(&mut self) -> Result<&mut ParamRecord, DocumentError> {
        let node = self.current_node()?;
        node.parameters.last_mut().ok_or(DocumentError::MissingRoot)
    }

    fn start(&mut self, start: &BytesStart<'_>) -> Result<&'static str, DocumentError> {
        let name = element(start.name().as_ref())?;
        let parent = self.open.last().copied();
        let mut attrs = Attributes::read(name, start)?;
        match (name, parent) {
            (ROOT, None) if !self.seen_root => {
                self.seen_root = true;
                self.document.origin.x = attrs.coordinate("x")?;
                self.document.origin.y = attrs.coordinate("y")?;
            }
            (NODE, Some(ROOT)) => {
                let record = NodeRecord {
                    name: attrs.require("n")?,
                    node_type: attrs.require("c")?,
                    ..NodeRecord::default()
                };
                self.document.nodes.push(record);
            }
            (PARAM, Some(NODE)) => {
                let name = attrs.require("n")?;
                let content = match (attrs.take("con"), attrs.take("val")) {
                    (Some(reference), _) => ParamContent::Connect(reference),
                    (None, Some(text)) => ParamContent::Value(text),
                    (None, None) => {
                        return Err(DocumentError::MissingAttribute {
                            element: PARAM,
                            attribute: "val",
                        })
                    }
                };
                let record = ParamRecord {
                    name,
                    type_tag: attrs.take("t"),
                    hidden: attrs.flag("vis", "0"),
                    custom: attrs.flag("cus", "True"),
                    content,
                    ..ParamRecord::default()
                };
                self.current_node()?.parameters.push(record);
            }
            (OUTPUT | INPUT, Some(NODE)) => {
                let link = LinkRecord {
                    port: attrs.require("n")?,
                    node: attrs.require("conN")?,
                    node_port: attrs.require("conP")?,
                };
                let node = self.current_node()?;
                if name == OUTPUT {
                    node.outputs.push(link);
                } else {
                    node.inputs.push(link);
                }
            }
            (METADATA, Some(NODE)) => {
                let entry = (attrs.require("k")?, attrs.require("v")?);
                self.current_node()?.metadata.push(entry);
            }
            (METADATA, Some(PARAM)) => {
                let entry = (attrs.require("k")?, attrs.require("v")?);
                self.current_param()?.metadata.push(entry);
            }
            (HINT, Some(PARAM)) => {
                let entry = (attrs.require("k")?, attrs.require("v")?);
                self.current_param()?.hints.push(entry);
            }
            _ => return Err(DocumentError::UnexpectedElement(name.to_string())),
        }
        Ok(name)
    }
}

impl GraphDocument {
    /// Parse a complete document. Any malformed part fails the whole parse.
    pub fn parse(xml: &str) -> Result<Self, DocumentError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text_start = true;
        reader.config_mut().trim_text_end = true;

        let mut builder = Builder {
            document: GraphDocument::default(),
            open: Vec::new(),
            seen_root: false,
        };
        loop {
            match reader.read_event()? {
                Event::Start(start) => {
                    let name = builder.start(&start)?;
                    builder.open.push(name);
                }
                Event::Empty(start) => {
                    builder.start(&start)?;
                }
                Event::End(end) => {
                    let name = element(end.name().as_ref())?;
                    if builder.open.pop() != Some(name) {
                        return Err(DocumentError::UnexpectedElement(name.to_string()));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !builder.seen_root {
            return Err(DocumentError::MissingRoot);
        }
        Ok(builder.document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<nodegraph x="10.0" y="-4.0">
  <n n="Main" c="Main">
    <p n="x" val="10.0"/>
    <o n="Out" conN="Print" conP="In"/>
    <m k="key" v="'value'"/>
  </n>
  <n n="Print" c="Print">
    <p n="inputs:arg" t="object" vis="0" cus="True" con="Var.outputs:result">
      <h k="tab" v="Inputs"/>
    </p>
    <p n="label" val="a &amp; b"/>
    <i n="In" conN="Main" conP="Out"/>
  </n>
</nodegraph>"#;

    #[test]
    fn test_parse_sample() {
        let doc = GraphDocument::parse(SAMPLE).unwrap();
        assert_eq!(doc.origin, Vec2::new(10.0, -4.0));
        assert_eq!(doc.nodes.len(), 2);

        let main = &doc.nodes[0];
        assert_eq!((main.name.as_str(), main.node_type.as_str()), ("Main", "Main"));
        assert_eq!(main.parameters[0].content, ParamContent::Value("10.0".to_string()));
        assert_eq!(main.outputs[0].node, "Print");
        assert_eq!(main.metadata, vec![("key".to_string(), "'value'".to_string())]);

        let print = &doc.nodes[1];
        let arg = &print.parameters[0];
        assert_eq!(arg.type_tag.as_deref(), Some("object"));
        assert!(arg.hidden && arg.custom);
        assert_eq!(arg.content, ParamContent::Connect("Var.outputs:result".to_string()));
        assert_eq!(arg.hints, vec![("tab".to_string(), "Inputs".to_string())]);
        assert_eq!(print.parameters[1].content, ParamContent::Value("a & b".to_string()));
        assert_eq!(print.inputs[0].node_port, "Out");
    }

    #[test]
    fn test_empty_root() {
        let doc = GraphDocument::parse("<nodegraph/>").unwrap();
        assert!(doc.nodes.is_empty());
        assert_eq!(doc.origin, Vec2::ZERO);
    }

    #[test]
    fn test_malformed_documents() {
        assert!(matches!(GraphDocument::parse(""), Err(DocumentError::MissingRoot)));
        assert!(matches!(
            GraphDocument::parse(r#"<nodegraph><n c="Main"/></nodegraph>"#),
            Err(DocumentError::MissingAttribute { element: "n", attribute: "n" })
        ));
        assert!(matches!(
            GraphDocument::parse(r#"<nodegraph><p n="x" val="1"/></nodegraph>"#),
            Err(DocumentError::UnexpectedElement(_))
        ));
        assert!(matches!(
            GraphDocument::parse(r#"<nodegraph x="left"/>"#),
            Err(DocumentError::InvalidAttribute { attribute: "x", .. })
        ));
        assert!(matches!(
            GraphDocument::parse(r#"<nodegraph><n n="A" c="Main"><p n="x"/></n></nodegraph>"#),
            Err(DocumentError::MissingAttribute { element: "p", attribute: "val" })
        ));
        assert!(GraphDocument::parse(r#"<nodegraph><n n="A" c="Main"></nodegraph>"#).is_err());
    }
}
