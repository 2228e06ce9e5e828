//! Dynamic values carried by parameters and passed between nodes

use crate::error::ComputeError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A value stored in a parameter or produced by a node body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    /// Absent value
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
}

/// Numeric view used by arithmetic; booleans count as integers
#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }
}

/// Upper bound on the length of a repeated string or list
const MAX_REPEAT_LEN: usize = 1 << 28;

/// Repeat count for a sequence of `len` items; negative counts repeat zero times
fn repeat_count(len: usize, n: i64) -> Result<usize, ComputeError> {
    let count = usize::try_from(n.max(0)).unwrap_or(usize::MAX);
    match len.checked_mul(count) {
        Some(total) if total <= MAX_REPEAT_LEN => Ok(count),
        _ => Err(ComputeError::Message(format!(
            "repeat count {} too large for a sequence of length {}",
            n, len
        ))),
    }
}

impl Value {
    /// Short type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "None",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "str",
            Value::List(_) => "list",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// Truthiness as used by branch and logic nodes
    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.number().map(Number::as_f64)
    }

    /// Integer view; floats are accepted only when integral
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(*b as i64),
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            _ => None,
        }
    }

    fn number(&self) -> Option<Number> {
        match self {
            Value::Bool(b) => Some(Number::Int(*b as i64)),
            Value::Int(i) => Some(Number::Int(*i)),
            Value::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }

    fn mismatch(&self, op: &'static str, other: &Value) -> ComputeError {
        ComputeError::TypeMismatch {
            op,
            left: self.type_name(),
            right: other.type_name(),
        }
    }

    /// String argument or a type error
    pub fn expect_str(&self) -> Result<&str, ComputeError> {
        self.as_str().ok_or(ComputeError::UnexpectedType {
            expected: "str",
            found: self.type_name(),
        })
    }

    /// List argument or a type error
    pub fn expect_list(&self) -> Result<&[Value], ComputeError> {
        self.as_list().ok_or(ComputeError::UnexpectedType {
            expected: "list",
            found: self.type_name(),
        })
    }

    /// Numeric argument or a type error
    pub fn expect_f64(&self) -> Result<f64, ComputeError> {
        self.as_f64().ok_or(ComputeError::UnexpectedType {
            expected: "number",
            found: self.type_name(),
        })
    }

    /// Integer argument or a type error
    pub fn expect_i64(&self) -> Result<i64, ComputeError> {
        self.as_i64().ok_or(ComputeError::UnexpectedType {
            expected: "int",
            found: self.type_name(),
        })
    }

    pub fn add(&self, other: &Value) -> Result<Value, ComputeError> {
        match (self, other) {
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
            (Value::List(a), Value::List(b)) => {
                Ok(Value::List(a.iter().chain(b.iter()).cloned().collect()))
            }
            _ => match (self.number(), other.number()) {
                (Some(Number::Int(a)), Some(Number::Int(b))) => Ok(a
                    .checked_add(b)
                    .map(Value::Int)
                    .unwrap_or(Value::Float(a as f64 + b as f64))),
                (Some(a), Some(b)) => Ok(Value::Float(a.as_f64() + b.as_f64())),
                _ => Err(self.mismatch("+", other)),
            },
        }
    }

    pub fn sub(&self, other: &Value) -> Result<Value, ComputeError> {
        match (self.number(), other.number()) {
            (Some(Number::Int(a)), Some(Number::Int(b))) => Ok(a
                .checked_sub(b)
                .map(Value::Int)
                .unwrap_or(Value::Float(a as f64 - b as f64))),
            (Some(a), Some(b)) => Ok(Value::Float(a.as_f64() - b.as_f64())),
            _ => Err(self.mismatch("-", other)),
        }
    }

    /// Numeric product, or a string or list repeated `n` times
    pub fn mul(&self, other: &Value) -> Result<Value, ComputeError> {
        match (self, other) {
            (Value::String(s), Value::Int(n)) | (Value::Int(n), Value::String(s)) => {
                Ok(Value::String(s.repeat(repeat_count(s.len(), *n)?)))
            }
            (Value::List(items), Value::Int(n)) | (Value::Int(n), Value::List(items)) => {
                let count = repeat_count(items.len(), *n)?;
                Ok(Value::List(
                    items.iter().cloned().cycle().take(items.len() * count).collect(),
                ))
            }
            _ => match (self.number(), other.number()) {
                (Some(Number::Int(a)), Some(Number::Int(b))) => Ok(a
                    .checked_mul(b)
                    .map(Value::Int)
                    .unwrap_or(Value::Float(a as f64 * b as f64))),
                (Some(a), Some(b)) => Ok(Value::Float(a.as_f64() * b.as_f64())),
                _ => Err(self.mismatch("*", other)),
            },
        }
    }

    /// True division, always producing a float
    pub fn div(&self, other: &Value) -> Result<Value, ComputeError> {
        match (self.number(), other.number()) {
            (Some(a), Some(b)) => {
                let divisor = b.as_f64();
                if divisor == 0.0 {
                    return Err(ComputeError::DivisionByZero);
                }
                Ok(Value::Float(a.as_f64() / divisor))
            }
            _ => Err(self.mismatch("/", other)),
        }
    }

    /// Ordering between comparable values
    pub fn compare(&self, other: &Value) -> Result<Ordering, ComputeError> {
        match (self, other) {
            (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.compare(y)? {
                        Ordering::Equal => continue,
                        ord => return Ok(ord),
                    }
                }
                Ok(a.len().cmp(&b.len()))
            }
            _ => match (self.number(), other.number()) {
                (Some(Number::Int(a)), Some(Number::Int(b))) => Ok(a.cmp(&b)),
                (Some(a), Some(b)) => a
                    .as_f64()
                    .partial_cmp(&b.as_f64())
                    .ok_or_else(|| self.mismatch("<", other)),
                _ => Err(self.mismatch("<", other)),
            },
        }
    }

    /// Equality where numbers compare across int, float and bool
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.loose_eq(y))
            }
            _ => match (self.number(), other.number()) {
                (Some(a), Some(b)) => a.as_f64() == b.as_f64(),
                _ => self == other,
            },
        }
    }

    /// Identity check: same variant and same content
    pub fn is(&self, other: &Value) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other) && self == other
    }

    /// Membership test: substring for strings, element equality for lists
    pub fn contains(&self, item: &Value) -> Result<bool, ComputeError> {
        match (self, item) {
            (Value::String(haystack), Value::String(needle)) => Ok(haystack.contains(needle.as_str())),
            (Value::List(items), _) => Ok(items.iter().any(|v| v.loose_eq(item))),
            _ => Err(item.mismatch("in", self)),
        }
    }

    pub fn max_with(&self, other: &Value) -> Result<Value, ComputeError> {
        Ok(if other.compare(self)? == Ordering::Greater {
            other.clone()
        } else {
            self.clone()
        })
    }

    pub fn min_with(&self, other: &Value) -> Result<Value, ComputeError> {
        Ok(if other.compare(self)? == Ordering::Less {
            other.clone()
        } else {
            self.clone()
        })
    }

    pub fn len(&self) -> Result<usize, ComputeError> {
        match self {
            Value::String(s) => Ok(s.chars().count()),
            Value::List(items) => Ok(items.len()),
            _ => Err(ComputeError::UnexpectedType {
                expected: "str or list",
                found: self.type_name(),
            }),
        }
    }

    /// Element access with negative indices counting from the end
    pub fn index(&self, index: i64) -> Result<Value, ComputeError> {
        let len = self.len()?;
        let resolved = if index < 0 { index + len as i64 } else { index };
        if resolved < 0 || resolved as usize >= len {
            return Err(ComputeError::IndexOutOfRange { index, len });
        }
        let at = resolved as usize;
        Ok(match self {
            Value::List(items) => items[at].clone(),
            _ => Value::String(self.to_string().chars().nth(at).map(String::from).unwrap_or_default()),
        })
    }

    /// Half-open slice with clamped, optionally negative bounds
    pub fn slice(&self, start: Option<i64>, end: Option<i64>) -> Result<Value, ComputeError> {
        let len = self.len()? as i64;
        let clamp = |bound: i64| -> usize {
            let b = if bound < 0 { bound + len } else { bound };
            b.clamp(0, len) as usize
        };
        let from = start.map(clamp).unwrap_or(0);
        let to = end.map(clamp).unwrap_or(len as usize).max(from);
        Ok(match self {
            Value::List(items) => Value::List(items[from..to].to_vec()),
            _ => Value::String(self.to_string().chars().skip(from).take(to - from).collect()),
        })
    }

    /// Canonical literal text, readable back by [`crate::literal::parse`]
    pub fn to_literal(&self) -> String {
        match self {
            Value::String(s) => quote(s),
            Value::List(items) => {
                let inner: Vec<String> = items.iter().map(Value::to_literal).collect();
                format!("[{}]", inner.join(", "))
            }
            other => other.to_string(),
        }
    }
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        "nan".to_string()
    } else if f.is_infinite() {
        (if f > 0.0 { "inf" } else { "-inf" }).to_string()
    } else if f.fract() == 0.0 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Plain text rendering: strings unquoted, everything else as a literal
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", format_float(*x)),
            Value::String(s) => write!(f, "{}", s),
            Value::List(_) => write!(f, "{}", self.to_literal()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_mixed_numbers() {
        assert_eq!(Value::Int(2).add(&Value::Int(3)).unwrap(), Value::Int(5));
        assert_eq!(Value::Int(2).add(&Value::Float(0.5)).unwrap(), Value::Float(2.5));
        assert_eq!(Value::Bool(true).add(&Value::Int(1)).unwrap(), Value::Int(2));
    }

    #[test]
    fn test_add_strings_and_lists() {
        assert_eq!(Value::from("ab").add(&Value::from("cd")).unwrap(), Value::from("abcd"));
        let joined = Value::List(vec![1.into()]).add(&Value::List(vec![2.into()])).unwrap();
        assert_eq!(joined, Value::List(vec![1.into(), 2.into()]));
    }

    #[test]
    fn test_add_type_mismatch() {
        let err = Value::from("a").add(&Value::Int(1)).unwrap_err();
        assert_eq!(
            err,
            ComputeError::TypeMismatch { op: "+", left: "str", right: "int" }
        );
    }

    #[test]
    fn test_division_is_true_division() {
        assert_eq!(Value::Int(7).div(&Value::Int(2)).unwrap(), Value::Float(3.5));
        assert_eq!(Value::Int(1).div(&Value::Int(0)).unwrap_err(), ComputeError::DivisionByZero);
    }

    #[test]
    fn test_multiply_repeats_sequences() {
        assert_eq!(Value::from("ab").mul(&Value::Int(3)).unwrap(), Value::from("ababab"));
        assert_eq!(
            Value::Int(2).mul(&Value::List(vec![Value::None])).unwrap(),
            Value::List(vec![Value::None, Value::None])
        );
    }

    #[test]
    fn test_multiply_rejects_huge_repeats() {
        let huge = Value::Int(i64::MAX);
        assert!(matches!(Value::from("ab").mul(&huge), Err(ComputeError::Message(_))));
        assert!(matches!(
            Value::List(vec![Value::Int(1)]).mul(&huge),
            Err(ComputeError::Message(_))
        ));
        assert_eq!(Value::from("").mul(&huge).unwrap(), Value::from(""));
        assert_eq!(Value::List(vec![]).mul(&huge).unwrap(), Value::List(vec![]));
    }

    #[test]
    fn test_compare_and_extremes() {
        assert_eq!(Value::Int(1).compare(&Value::Float(1.5)).unwrap(), Ordering::Less);
        assert_eq!(Value::from("b").compare(&Value::from("a")).unwrap(), Ordering::Greater);
        assert_eq!(Value::Int(3).max_with(&Value::Int(9)).unwrap(), Value::Int(9));
        assert_eq!(Value::Int(3).min_with(&Value::Int(9)).unwrap(), Value::Int(3));
        assert!(Value::Int(1).compare(&Value::from("1")).is_err());
    }

    #[test]
    fn test_loose_equality_and_identity() {
        assert!(Value::Int(1).loose_eq(&Value::Float(1.0)));
        assert!(Value::Bool(true).loose_eq(&Value::Int(1)));
        assert!(!Value::Int(1).is(&Value::Float(1.0)));
        assert!(Value::None.is(&Value::None));
    }

    #[test]
    fn test_contains() {
        assert!(Value::from("hello").contains(&Value::from("ell")).unwrap());
        let list = Value::List(vec![1.into(), 2.into()]);
        assert!(list.contains(&Value::Float(2.0)).unwrap());
        assert!(Value::Int(3).contains(&Value::Int(3)).is_err());
    }

    #[test]
    fn test_index_and_slice() {
        let list = Value::List(vec![10.into(), 20.into(), 30.into()]);
        assert_eq!(list.index(-1).unwrap(), Value::Int(30));
        assert!(list.index(3).is_err());
        assert_eq!(
            list.slice(Some(1), None).unwrap(),
            Value::List(vec![20.into(), 30.into()])
        );
        assert_eq!(Value::from("abcdef").slice(Some(-3), Some(-1)).unwrap(), Value::from("de"));
        assert_eq!(Value::from("abc").slice(Some(2), Some(1)).unwrap(), Value::from(""));
    }

    #[test]
    fn test_literal_text() {
        assert_eq!(Value::Float(1.0).to_literal(), "1.0");
        assert_eq!(Value::Float(0.25).to_literal(), "0.25");
        assert_eq!(Value::from("it's").to_literal(), "'it\\'s'");
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::from("a"), Value::None]).to_literal(),
            "[1, 'a', None]"
        );
        assert_eq!(Value::from("plain").to_string(), "plain");
    }

    #[test]
    fn test_json_shape() {
        let v = Value::List(vec![Value::Int(1), Value::Float(2.5), Value::None, "x".into()]);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "[1,2.5,null,\"x\"]");
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }
}
