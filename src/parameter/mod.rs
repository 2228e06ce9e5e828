//! Typed parameter cells owned by nodes
//!
//! A parameter keeps two value slots. The override slot holds what the user
//! or a node body set; the inherit slot holds type-level defaults. The
//! override flag selects which slot (value and connection) is active.

pub mod types;

pub use types::{ParameterType, ParameterTypeRegistry, ValueKind};

use crate::constants::hint;
use crate::literal;
use crate::value::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Construction options for a parameter
#[derive(Debug, Clone)]
pub struct ParamOptions {
    pub default: Option<Value>,
    pub label: Option<String>,
    pub visible: Option<bool>,
    pub built_in: bool,
    pub custom: bool,
    pub hints: BTreeMap<String, String>,
}

impl Default for ParamOptions {
    fn default() -> Self {
        Self {
            default: None,
            label: None,
            visible: None,
            built_in: true,
            custom: false,
            hints: BTreeMap::new(),
        }
    }
}

impl ParamOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = Some(visible);
        self
    }

    pub fn hidden(self) -> Self {
        self.visible(false)
    }

    /// Mark as user-added; custom parameters always serialize their type
    pub fn custom(mut self) -> Self {
        self.custom = true;
        self.built_in = false;
        self
    }

    pub fn with_hint(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.hints.insert(key.to_string(), value.to_string());
        self
    }
}

/// A named, typed value slot with override/inherit resolution
#[derive(Debug, Clone)]
pub struct Parameter {
    name: String,
    label: String,
    ty: Arc<ParameterType>,
    default_value: Value,
    override_value: Value,
    override_connect: Option<String>,
    value_override: bool,
    inherit_value: Value,
    inherit_connect: Option<String>,
    metadata: BTreeMap<String, String>,
    default_metadata: BTreeMap<String, String>,
    hints: BTreeMap<String, String>,
    default_hints: BTreeMap<String, String>,
    built_in: bool,
    visible: bool,
    custom: bool,
}

impl Parameter {
    /// Create a parameter. The default must already be in the type's representation.
    pub fn new(name: &str, ty: Arc<ParameterType>, options: ParamOptions) -> Self {
        let default_value = options.default.unwrap_or_else(|| ty.default_value());
        let mut hints = options.hints;
        let widget_missing = hints.get(hint::WIDGET).map_or(true, |w| w.is_empty());
        if widget_missing {
            hints.insert(hint::WIDGET.to_string(), ty.widget().to_string());
        }
        Self {
            name: name.to_string(),
            label: options.label.unwrap_or_else(|| name.to_string()),
            default_value: default_value.clone(),
            override_value: default_value.clone(),
            override_connect: None,
            value_override: false,
            inherit_value: default_value,
            inherit_connect: None,
            metadata: BTreeMap::new(),
            default_metadata: BTreeMap::new(),
            default_hints: hints.clone(),
            hints,
            built_in: options.built_in,
            visible: options.visible.unwrap_or(true),
            custom: options.custom,
            ty,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: &str) {
        self.label = label.to_string();
    }

    pub fn parameter_type(&self) -> &Arc<ParameterType> {
        &self.ty
    }

    pub fn type_tag(&self) -> &str {
        self.ty.tag()
    }

    pub fn is_built_in(&self) -> bool {
        self.built_in
    }

    pub fn is_custom(&self) -> bool {
        self.custom
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Active stored value. Node properties are resolved by [`crate::nodes::Node::value`].
    pub fn value(&self) -> &Value {
        if self.value_override {
            &self.override_value
        } else {
            &self.inherit_value
        }
    }

    pub fn default_value(&self) -> &Value {
        &self.default_value
    }

    pub fn override_value(&self) -> &Value {
        &self.override_value
    }

    pub fn inherit_value(&self) -> &Value {
        &self.inherit_value
    }

    /// Active upstream reference `"node.param"`, if any
    pub fn connect(&self) -> Option<&str> {
        if self.value_override {
            self.override_connect.as_deref()
        } else {
            self.inherit_connect.as_deref()
        }
    }

    pub fn has_connect(&self) -> bool {
        self.connect().is_some()
    }

    pub fn is_override(&self) -> bool {
        self.value_override
    }

    pub fn set_override(&mut self, value_override: bool) {
        self.value_override = value_override;
    }

    /// Store a value; the caller coerces it and dispatches notifications
    pub(crate) fn assign_value(&mut self, value: Value, value_override: bool) {
        self.value_override = value_override;
        self.override_value = value;
    }

    pub(crate) fn assign_connect(&mut self, connect: Option<String>, value_override: bool) {
        self.value_override = value_override;
        self.override_connect = connect;
    }

    pub(crate) fn clear_connect(&mut self) {
        self.override_connect = None;
    }

    /// Repoint both connection slots that reference `old_node`, or drop them
    /// when `new_node` is `None`. Returns whether anything changed.
    pub(crate) fn retarget_connect(&mut self, old_node: &str, new_node: Option<&str>) -> bool {
        let mut changed = false;
        for slot in [&mut self.override_connect, &mut self.inherit_connect] {
            let replacement = match slot.as_deref().and_then(|c| c.rsplit_once('.')) {
                Some((node, port)) if node == old_node => {
                    Some(new_node.map(|n| format!("{}.{}", n, port)))
                }
                _ => None,
            };
            if let Some(replacement) = replacement {
                *slot = replacement;
                changed = true;
            }
        }
        changed
    }

    pub fn set_inherit_value(&mut self, value: Value) {
        self.inherit_value = value;
    }

    pub fn set_inherit_connect(&mut self, connect: Option<String>) {
        self.inherit_connect = connect;
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn has_metadata(&self, key: &str) -> bool {
        self.metadata.contains_key(key)
    }

    /// Store metadata as text. A `custom` entry of `False` is ignored.
    pub fn set_metadata(&mut self, key: &str, value: impl fmt::Display) {
        let text = value.to_string();
        if key == "custom" && text == "False" {
            return;
        }
        self.metadata.insert(key.to_string(), text);
    }

    /// Metadata read back as a literal when possible, raw text otherwise
    pub fn metadata_value(&self, key: &str) -> Option<Value> {
        self.metadata.get(key).map(|raw| literal::interpret(raw))
    }

    /// Metadata entries that differ from the construction snapshot
    pub fn changed_metadata(&self) -> impl Iterator<Item = (&String, &String)> {
        self.metadata
            .iter()
            .filter(move |(k, v)| self.default_metadata.get(*k) != Some(*v))
    }

    pub fn hints(&self) -> &BTreeMap<String, String> {
        &self.hints
    }

    pub fn has_hint(&self, key: &str) -> bool {
        self.hints.contains_key(key)
    }

    pub fn set_hint(&mut self, key: &str, value: impl fmt::Display) {
        self.hints.insert(key.to_string(), value.to_string());
    }

    pub fn hint_raw(&self, key: &str) -> Option<&str> {
        self.hints.get(key).map(String::as_str)
    }

    pub fn hint_value(&self, key: &str) -> Option<Value> {
        self.hints.get(key).map(|raw| literal::interpret(raw))
    }

    /// Hint entries that differ from the construction snapshot
    pub fn changed_hints(&self) -> impl Iterator<Item = (&String, &String)> {
        self.hints
            .iter()
            .filter(move |(k, v)| self.default_hints.get(*k) != Some(*v))
    }

    /// Editor widget name
    pub fn widget(&self) -> &str {
        self.hint_raw(hint::WIDGET).unwrap_or_else(|| self.ty.widget())
    }

    /// Choices offered by a `choose` parameter
    pub fn options(&self) -> Vec<Value> {
        match self.hint_value(hint::OPTIONS) {
            Some(Value::List(items)) => items,
            _ => Vec::new(),
        }
    }

    pub fn add_options(&mut self, items: &[Value]) {
        let mut all = self.options();
        all.extend(items.iter().cloned());
        self.set_hint(hint::OPTIONS, Value::List(all).to_literal());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(tag: &str, options: ParamOptions) -> Parameter {
        let registry = ParameterTypeRegistry::with_builtin_types();
        Parameter::new("p", registry.get(tag).unwrap(), options)
    }

    #[test]
    fn test_new_parameter_reads_default_through_inherit() {
        let p = param("int", ParamOptions::new().with_default(7));
        assert!(!p.is_override());
        assert_eq!(p.value(), &Value::Int(7));
        assert_eq!(p.widget(), "integer");
        assert!(p.is_visible());
    }

    #[test]
    fn test_override_flag_selects_slot() {
        let mut p = param("int", ParamOptions::new());
        p.set_inherit_value(Value::Int(3));
        p.assign_value(Value::Int(9), false);
        assert_eq!(p.value(), &Value::Int(3));
        p.assign_value(Value::Int(9), true);
        assert_eq!(p.value(), &Value::Int(9));
        p.set_override(false);
        assert_eq!(p.value(), &Value::Int(3));
    }

    #[test]
    fn test_connect_follows_override_flag() {
        let mut p = param("object", ParamOptions::new());
        p.set_inherit_connect(Some("A.outputs:result".to_string()));
        assert_eq!(p.connect(), Some("A.outputs:result"));
        p.assign_connect(Some("B.outputs:result".to_string()), true);
        assert_eq!(p.connect(), Some("B.outputs:result"));
        p.clear_connect();
        assert!(!p.has_connect());
    }

    #[test]
    fn test_retarget_connect_rewrites_both_slots() {
        let mut p = param("object", ParamOptions::new());
        p.set_inherit_connect(Some("Var.outputs:result".to_string()));
        p.assign_connect(Some("Var.outputs:result".to_string()), true);
        assert!(p.retarget_connect("Var", Some("Total")));
        assert_eq!(p.connect(), Some("Total.outputs:result"));
        assert!(!p.retarget_connect("Var", None));
        assert!(p.retarget_connect("Total", None));
        assert!(!p.has_connect());
    }

    #[test]
    fn test_metadata_fail_soft() {
        let mut p = param("str", ParamOptions::new());
        p.set_metadata("count", 3);
        p.set_metadata("note", "hello world");
        p.set_metadata("custom", "False");
        assert_eq!(p.metadata_value("count"), Some(Value::Int(3)));
        assert_eq!(p.metadata_value("note"), Some(Value::from("hello world")));
        assert!(!p.has_metadata("custom"));
    }

    #[test]
    fn test_changed_hints_skip_defaults() {
        let mut p = param("str", ParamOptions::new().with_hint("tab", "Node"));
        assert_eq!(p.changed_hints().count(), 0);
        p.set_hint("tab", "Extra");
        p.set_hint("widget", "text");
        let changed: Vec<_> = p.changed_hints().map(|(k, _)| k.as_str()).collect();
        assert_eq!(changed, vec!["tab", "widget"]);
    }

    #[test]
    fn test_choose_options_accumulate() {
        let mut p = param("choose", ParamOptions::new());
        assert_eq!(p.widget(), "choose");
        p.add_options(&["a".into()]);
        p.add_options(&["b".into()]);
        assert_eq!(p.options(), vec![Value::from("a"), Value::from("b")]);
    }

    #[test]
    fn test_custom_option_clears_built_in() {
        let p = param("float", ParamOptions::new().custom().hidden());
        assert!(p.is_custom());
        assert!(!p.is_built_in());
        assert!(!p.is_visible());
    }
}
