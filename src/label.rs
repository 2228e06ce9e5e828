//! Node label templates
//!
//! A label may embed `[value <parameter>]`; each occurrence naming an existing
//! parameter is replaced by that parameter's value. Everything else,
//! including bracketed text that is not a value reference, stays as written.

use crate::constants::param::LABEL;
use crate::nodes::Node;
use crate::value::Value;

const VALUE_TAG: &str = "[value ";

/// Expand `[value name]` references using `lookup`
pub fn render(template: &str, lookup: impl Fn(&str) -> Option<Value>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find(VALUE_TAG) {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let body = &tail[VALUE_TAG.len()..];
        let expansion = body
            .find(|c| c == '[' || c == ']')
            .filter(|&end| body[end..].starts_with(']') && end > 0)
            .and_then(|end| lookup(&body[..end]).map(|value| (end, value)));
        match expansion {
            Some((end, value)) => {
                out.push_str(&value.to_string());
                rest = &body[end + 1..];
            }
            None => {
                out.push('[');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

impl Node {
    /// The `label` parameter with its value references expanded
    pub fn display_label(&self) -> String {
        let template = self.value(LABEL).map(|v| v.to_string()).unwrap_or_default();
        render(&template, |name| self.value(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{NodeGraph, NodeRegistry};
    use std::sync::Arc;

    fn lookup(name: &str) -> Option<Value> {
        match name {
            "count" => Some(Value::Int(3)),
            "inputs:arg" => Some(Value::from("hello")),
            _ => None,
        }
    }

    #[test]
    fn test_render_substitutes_known_parameters() {
        assert_eq!(render("n = [value count]", lookup), "n = 3");
        assert_eq!(render("[value inputs:arg], [value count]!", lookup), "hello, 3!");
    }

    #[test]
    fn test_render_leaves_everything_else() {
        assert_eq!(render("[value missing] stays", lookup), "[value missing] stays");
        assert_eq!(render("[eval 1 + 1]", lookup), "[python 1 + 1]");
        assert_eq!(render("[value count", lookup), "[value count");
        assert_eq!(render("[value [value count]]", lookup), "[value 3]");
        assert_eq!(render("[value ]", lookup), "[value ]");
        assert_eq!(render("plain", lookup), "plain");
    }

    #[test]
    fn test_display_label_reads_node_values() {
        let mut g = NodeGraph::new(Arc::new(NodeRegistry::with_builtins()));
        let print = g.create_node("Print", Some("Echo"), None).unwrap();
        g.set_value(print, "inputs:arg", 42).unwrap();
        g.set_value(print, LABEL, "[value name] prints [value inputs:arg]").unwrap();
        assert_eq!(g.node(print).unwrap().display_label(), "Echo prints 42");
    }
}
