//! Parameter type catalogue and value conversion
//!
//! Every parameter carries a type tag. Tags form a single-inheritance tree
//! rooted at `object`; the tree decides port compatibility. Each type also
//! names its default editor widget and default value, and knows how to
//! convert values to and from the text stored in graph documents.

use crate::error::GraphError;
use crate::literal;
use crate::value::Value;
use log::warn;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Storage family of a parameter type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Anything goes
    Object,
    /// Raw text, stored without quoting in documents
    Text,
    Bool,
    /// Integer or float
    Number,
    Int,
    Float,
    /// Fixed-width float tuple (vectors and colors)
    Vector,
    /// Homogeneous list of the child type named by the tag without `[]`
    Array,
}

/// A registered parameter type
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterType {
    tag: String,
    parent: Option<String>,
    widget: String,
    kind: ValueKind,
    default: Value,
}

impl ParameterType {
    pub fn new(tag: &str, parent: Option<&str>, widget: &str, kind: ValueKind, default: Value) -> Self {
        Self {
            tag: tag.to_string(),
            parent: parent.map(str::to_string),
            widget: widget.to_string(),
            kind,
            default,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Editor widget used when the parameter does not override the hint
    pub fn widget(&self) -> &str {
        &self.widget
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn default_value(&self) -> Value {
        self.default.clone()
    }

    pub fn is_array(&self) -> bool {
        self.kind == ValueKind::Array
    }

    /// Element tag for array types
    pub fn child_tag(&self) -> Option<&str> {
        if self.is_array() {
            self.tag.strip_suffix("[]")
        } else {
            None
        }
    }

    /// Coerce a value of a non-array type. Mismatches fall back to the default.
    fn coerce_scalar(&self, value: Value) -> Value {
        if value.is_none() && self.kind != ValueKind::Text {
            return value;
        }
        let coerced = match (self.kind, value) {
            (ValueKind::Object, v) => Some(v),
            (ValueKind::Text, Value::None) => Some(Value::String(String::new())),
            (ValueKind::Text, Value::String(s)) => Some(Value::String(s)),
            (ValueKind::Text, v) => Some(Value::String(v.to_string())),
            (ValueKind::Bool, Value::String(s)) => match literal::parse(&s) {
                Ok(Value::Bool(b)) => Some(Value::Bool(b)),
                Ok(other) => Some(Value::Bool(other.truthy())),
                Err(_) => Some(Value::Bool(!s.is_empty())),
            },
            (ValueKind::Bool, v) => Some(Value::Bool(v.truthy())),
            (_, Value::String(s))
                if matches!(self.kind, ValueKind::Number | ValueKind::Int | ValueKind::Float) =>
            {
                literal::parse(&s).ok().and_then(|v| self.coerce_number(v))
            }
            (ValueKind::Number | ValueKind::Int | ValueKind::Float, v) => self.coerce_number(v),
            (ValueKind::Vector, Value::String(s)) => match literal::parse(&s) {
                Ok(v @ Value::List(_)) => Some(self.coerce_scalar(v)),
                _ => None,
            },
            (ValueKind::Vector, Value::List(items)) => items
                .into_iter()
                .map(|item| item.as_f64().map(Value::Float))
                .collect::<Option<Vec<_>>>()
                .map(Value::List),
            (_, _) => None,
        };
        coerced.unwrap_or_else(|| {
            warn!("value does not fit parameter type '{}', using default", self.tag);
            self.default.clone()
        })
    }

    fn coerce_number(&self, value: Value) -> Option<Value> {
        match (self.kind, value) {
            (ValueKind::Int, Value::Int(i)) => Some(Value::Int(i)),
            (ValueKind::Int, v) => v.as_f64().map(|f| Value::Int(f.trunc() as i64)),
            (ValueKind::Float, v) => v.as_f64().map(Value::Float),
            (_, Value::Bool(b)) => Some(Value::Int(b as i64)),
            (_, v @ (Value::Int(_) | Value::Float(_))) => Some(v),
            _ => None,
        }
    }
}

/// Registry of parameter types keyed by tag
/// Standard catalogue, built once and cloned into each registry
static STANDARD_TYPES: Lazy<ParameterTypeRegistry> = Lazy::new(ParameterTypeRegistry::standard_catalogue);

#[derive(Debug, Clone, Default)]
pub struct ParameterTypeRegistry {
    types: BTreeMap<String, Arc<ParameterType>>,
}

impl ParameterTypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the standard type catalogue
    pub fn with_builtin_types() -> Self {
        STANDARD_TYPES.clone()
    }

    fn standard_catalogue() -> Self {
        use ValueKind::*;
        let mut registry = Self::new();
        let empty = || Value::List(Vec::new());
        let scalars: [(&str, Option<&str>, &str, ValueKind, Value); 15] = [
            ("object", None, "str", Object, Value::None),
            ("str", Some("object"), "str", Text, Value::String(String::new())),
            ("file", Some("str"), "str", Text, Value::String(String::new())),
            ("text", Some("str"), "text", Text, Value::String(String::new())),
            ("choose", Some("str"), "choose", Text, Value::String(String::new())),
            ("token", Some("str"), "str", Text, Value::String(String::new())),
            ("bool", Some("object"), "boolean", Bool, Value::Bool(false)),
            ("number", Some("object"), "floating", Number, Value::Int(0)),
            ("int", Some("number"), "integer", Int, Value::Int(0)),
            ("float", Some("number"), "floating", Float, Value::Float(0.0)),
            ("float2", Some("object"), "vec2f", Vector, empty()),
            ("float3", Some("object"), "vec3f", Vector, empty()),
            ("float4", Some("object"), "vec4f", Vector, empty()),
            ("color3f", Some("object"), "color3f", Vector, empty()),
            ("color4f", Some("object"), "color4f", Vector, empty()),
        ];
        for (tag, parent, widget, kind, default) in scalars {
            registry.register(ParameterType::new(tag, parent, widget, kind, default));
        }
        let arrays: [(&str, &str, &str); 12] = [
            ("object[]", "object", "object[]"),
            ("str[]", "object[]", "str[]"),
            ("token[]", "object[]", "token[]"),
            ("number[]", "object[]", "float[]"),
            ("int[]", "number[]", "int[]"),
            ("float[]", "number[]", "float[]"),
            ("float2[]", "object[]", "vec2f[]"),
            ("float3[]", "object[]", "vec3f[]"),
            ("float4[]", "object[]", "vec4f[]"),
            ("color3f[]", "object[]", "vec3f[]"),
            ("color4f[]", "object[]", "vec4f[]"),
            ("file[]", "str[]", "str[]"),
        ];
        for (tag, parent, widget) in arrays {
            registry.register(ParameterType::new(tag, Some(parent), widget, Array, empty()));
        }
        registry
    }

    /// Register or replace a type
    pub fn register(&mut self, ty: ParameterType) {
        self.types.insert(ty.tag.clone(), Arc::new(ty));
    }

    pub fn get(&self, tag: &str) -> Option<Arc<ParameterType>> {
        self.types.get(tag).cloned()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.types.contains_key(tag)
    }

    /// All registered tags in sorted order
    pub fn tags(&self) -> Vec<&str> {
        self.types.keys().map(String::as_str).collect()
    }

    /// The tag followed by each of its ancestors
    pub fn ancestry(&self, tag: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = self.types.get(tag);
        while let Some(ty) = current {
            if chain.contains(&ty.tag) {
                break;
            }
            chain.push(ty.tag.clone());
            current = ty.parent.as_ref().and_then(|p| self.types.get(p));
        }
        chain
    }

    pub fn is_subtype(&self, tag: &str, ancestor: &str) -> bool {
        self.ancestry(tag).iter().any(|t| t == ancestor)
    }

    /// Whether data of one type may flow into a port of the other
    pub fn compatible(&self, a: &str, b: &str) -> bool {
        a == b || self.is_subtype(a, b) || self.is_subtype(b, a)
    }

    fn lookup(&self, tag: &str) -> Result<Arc<ParameterType>, GraphError> {
        self.get(tag).ok_or_else(|| GraphError::UnknownParameterType {
            name: String::new(),
            tag: tag.to_string(),
        })
    }

    /// Convert any value into the internal representation of `tag`
    pub fn coerce(&self, tag: &str, value: Value) -> Result<Value, GraphError> {
        let ty = self.lookup(tag)?;
        let child = match ty.child_tag() {
            None => return Ok(ty.coerce_scalar(value)),
            Some(child) => self.lookup(child)?,
        };
        let items = match value {
            Value::None => return Ok(Value::List(Vec::new())),
            Value::List(items) => items,
            Value::String(s) => match literal::parse(&s) {
                Ok(Value::List(items)) => items,
                _ => {
                    warn!("value does not fit parameter type '{}', using default", tag);
                    return Ok(ty.default_value());
                }
            },
            _ => {
                warn!("value does not fit parameter type '{}', using default", tag);
                return Ok(ty.default_value());
            }
        };
        Ok(Value::List(
            items.into_iter().map(|item| child.coerce_scalar(item)).collect(),
        ))
    }

    /// Text stored in a document for a value of this type
    pub fn to_external(&self, tag: &str, value: &Value) -> Result<String, GraphError> {
        let ty = self.lookup(tag)?;
        if let Some(child) = ty.child_tag() {
            self.lookup(child)?;
        }
        Ok(match (ty.kind, value) {
            (ValueKind::Text, Value::String(s)) => s.clone(),
            (ValueKind::Text, Value::None) => String::new(),
            (ValueKind::Text, other) => other.to_string(),
            (_, other) => other.to_literal(),
        })
    }

    /// Parse document text into the internal representation of this type
    pub fn from_external(&self, tag: &str, text: &str) -> Result<Value, GraphError> {
        let ty = self.lookup(tag)?;
        match ty.kind {
            ValueKind::Text => Ok(Value::String(text.to_string())),
            ValueKind::Object => Ok(literal::interpret(text)),
            _ => {
                let parsed = literal::interpret(text);
                self.coerce(tag, parsed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_builtin_ancestry() {
        let registry = ParameterTypeRegistry::with_builtin_types();
        assert_eq!(registry.ancestry("int"), vec!["int", "number", "object"]);
        assert!(registry.is_subtype("file", "str"));
        assert!(registry.compatible("object", "int"));
        assert!(registry.compatible("int[]", "object[]"));
        assert!(!registry.compatible("str", "int"));
        assert!(!registry.compatible("int[]", "int"));
    }

    #[test]
    fn test_widget_defaults() {
        let registry = ParameterTypeRegistry::with_builtin_types();
        assert_eq!(registry.get("bool").unwrap().widget(), "boolean");
        assert_eq!(registry.get("int").unwrap().widget(), "integer");
        assert_eq!(registry.get("color4f").unwrap().widget(), "color4f");
        assert_eq!(registry.get("str").unwrap().default_value(), Value::from(""));
    }

    #[test]
    fn test_coerce_scalars() {
        let registry = ParameterTypeRegistry::with_builtin_types();
        assert_eq!(registry.coerce("int", Value::Float(3.9)).unwrap(), Value::Int(3));
        assert_eq!(registry.coerce("float", Value::Int(2)).unwrap(), Value::Float(2.0));
        assert_eq!(registry.coerce("int", Value::from("12")).unwrap(), Value::Int(12));
        assert_eq!(registry.coerce("bool", Value::from("False")).unwrap(), Value::Bool(false));
        assert_eq!(registry.coerce("str", Value::Int(5)).unwrap(), Value::from("5"));
        assert_eq!(registry.coerce("int", Value::from("abc")).unwrap(), Value::Int(0));
        assert_eq!(registry.coerce("int", Value::None).unwrap(), Value::None);
    }

    #[test]
    fn test_coerce_arrays_delegate_to_child() {
        let registry = ParameterTypeRegistry::with_builtin_types();
        let value = Value::List(vec![Value::Float(1.5), Value::from("2")]);
        assert_eq!(
            registry.coerce("int[]", value).unwrap(),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
        assert_eq!(
            registry.coerce("str[]", Value::from("['a', 'b']")).unwrap(),
            Value::List(vec!["a".into(), "b".into()])
        );
    }

    #[test]
    fn test_missing_child_type_is_configuration_error() {
        let mut registry = ParameterTypeRegistry::with_builtin_types();
        registry.register(ParameterType::new(
            "matrix[]",
            Some("object[]"),
            "object[]",
            ValueKind::Array,
            Value::List(vec![]),
        ));
        let err = registry.coerce("matrix[]", Value::List(vec![])).unwrap_err();
        assert!(matches!(err, GraphError::UnknownParameterType { tag, .. } if tag == "matrix"));
        assert!(registry.to_external("matrix[]", &Value::List(vec![])).is_err());
    }

    #[test]
    fn test_external_text_forms() {
        let registry = ParameterTypeRegistry::with_builtin_types();
        assert_eq!(registry.to_external("str", &Value::from("a b")).unwrap(), "a b");
        assert_eq!(registry.to_external("float", &Value::Float(2.0)).unwrap(), "2.0");
        assert_eq!(registry.to_external("bool", &Value::Bool(true)).unwrap(), "True");
        assert_eq!(
            registry.to_external("color4f", &Value::List(vec![0.5.into(), 1.0.into()])).unwrap(),
            "[0.5, 1.0]"
        );
        assert_eq!(registry.from_external("object", "'x'").unwrap(), Value::from("x"));
        assert_eq!(registry.from_external("object", "plain").unwrap(), Value::from("plain"));
    }

    fn scalar_for(kind: ValueKind) -> BoxedStrategy<Value> {
        match kind {
            ValueKind::Text => ".*".prop_map(Value::String).boxed(),
            ValueKind::Bool => any::<bool>().prop_map(Value::Bool).boxed(),
            ValueKind::Int => any::<i64>().prop_map(Value::Int).boxed(),
            ValueKind::Float => (-1.0e9f64..1.0e9).prop_map(Value::Float).boxed(),
            ValueKind::Number => prop_oneof![
                any::<i64>().prop_map(Value::Int),
                (-1.0e9f64..1.0e9).prop_map(Value::Float)
            ]
            .boxed(),
            ValueKind::Vector => prop::collection::vec((-1.0e6f64..1.0e6).prop_map(Value::Float), 0..5)
                .prop_map(Value::List)
                .boxed(),
            ValueKind::Object | ValueKind::Array => prop_oneof![
                Just(Value::None),
                any::<i64>().prop_map(Value::Int),
                ".*".prop_map(Value::String),
                any::<bool>().prop_map(Value::Bool)
            ]
            .boxed(),
        }
    }

    fn typed_value() -> impl Strategy<Value = (String, Value)> {
        let registry = ParameterTypeRegistry::with_builtin_types();
        let tags: Vec<String> = registry.tags().into_iter().map(String::from).collect();
        prop::sample::select(tags).prop_flat_map(move |tag| {
            let ty = registry.get(&tag).unwrap();
            let strategy = match ty.child_tag() {
                Some(child) => {
                    let child_kind = registry.get(child).unwrap().kind();
                    prop::collection::vec(scalar_for(child_kind), 0..4)
                        .prop_map(Value::List)
                        .boxed()
                }
                None => scalar_for(ty.kind()),
            };
            (Just(tag), strategy)
        })
    }

    proptest! {
        #[test]
        fn test_external_round_trip((tag, value) in typed_value()) {
            let registry = ParameterTypeRegistry::with_builtin_types();
            let text = registry.to_external(&tag, &value).unwrap();
            prop_assert_eq!(registry.from_external(&tag, &text).unwrap(), value);
        }
    }
}
