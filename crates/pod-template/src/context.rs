/*
 * context.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template value and context types.
//!
//! A [`PodContext`] is a flat mapping from names to [`PodValue`]s. It is
//! mutated in place while rendering: loops and `with` statements bind names
//! on entry and restore whatever was there before on exit, so the caller gets
//! its context back unchanged (apart from `@global` bindings).

use crate::template::Template;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// A value that can be stored in the context or produced by an expression.
#[derive(Debug, Clone, Default)]
pub enum PodValue {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<PodValue>),
    Map(IndexMap<String, PodValue>),
    /// A compiled template; rendering it inserts its output unescaped.
    Template(Rc<Template>),
}

impl PodValue {
    /// Check if this value is "truthy" for conditions.
    ///
    /// - `None`, `False`, `0`, `0.0`, the empty string and empty containers are falsy
    /// - Everything else, including nested templates, is truthy
    pub fn is_truthy(&self) -> bool {
        match self {
            PodValue::None => false,
            PodValue::Bool(b) => *b,
            PodValue::Int(i) => *i != 0,
            PodValue::Float(f) => *f != 0.0,
            PodValue::Str(s) => !s.is_empty(),
            PodValue::List(items) => !items.is_empty(),
            PodValue::Map(m) => !m.is_empty(),
            PodValue::Template(_) => true,
        }
    }

    /// Short name of the value's type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            PodValue::None => "None",
            PodValue::Bool(_) => "a boolean",
            PodValue::Int(_) => "an integer",
            PodValue::Float(_) => "a float",
            PodValue::Str(_) => "a string",
            PodValue::List(_) => "a list",
            PodValue::Map(_) => "a map",
            PodValue::Template(_) => "a template",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, PodValue::Int(_) | PodValue::Float(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PodValue::Int(i) => Some(*i as f64),
            PodValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PodValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get a nested field by path.
    pub fn get_path(&self, path: &[&str]) -> Option<&PodValue> {
        match path.split_first() {
            None => Some(self),
            Some((first, rest)) => match self {
                PodValue::Map(m) => m.get(*first).and_then(|v| v.get_path(rest)),
                _ => None,
            },
        }
    }

    /// Render this value as text for output.
    ///
    /// `None` renders as the empty string. Nested templates render as the
    /// empty string here; expressions render them against the live context.
    pub fn render(&self) -> String {
        match self {
            PodValue::None | PodValue::Template(_) => String::new(),
            other => other.to_string(),
        }
    }

    /// Build a map value from key/value pairs.
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, PodValue)>) -> Self {
        PodValue::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Structural equality. Integers and floats compare by numeric value and
/// templates compare by identity.
impl PartialEq for PodValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PodValue::None, PodValue::None) => true,
            (PodValue::Bool(a), PodValue::Bool(b)) => a == b,
            (PodValue::Int(a), PodValue::Int(b)) => a == b,
            (PodValue::Str(a), PodValue::Str(b)) => a == b,
            (PodValue::List(a), PodValue::List(b)) => a == b,
            (PodValue::Map(a), PodValue::Map(b)) => a == b,
            (PodValue::Template(a), PodValue::Template(b)) => Rc::ptr_eq(a, b),
            (a, b) if a.is_numeric() && b.is_numeric() => a.as_f64() == b.as_f64(),
            _ => false,
        }
    }
}

impl fmt::Display for PodValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PodValue::None => f.write_str("None"),
            PodValue::Bool(true) => f.write_str("True"),
            PodValue::Bool(false) => f.write_str("False"),
            PodValue::Int(i) => write!(f, "{i}"),
            PodValue::Float(x) => write!(f, "{x}"),
            PodValue::Str(s) => f.write_str(s),
            PodValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_repr(f, item)?;
                }
                f.write_str("]")
            }
            PodValue::Map(m) => {
                f.write_str("{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "'{k}': ")?;
                    write_repr(f, v)?;
                }
                f.write_str("}")
            }
            PodValue::Template(_) => f.write_str("<template>"),
        }
    }
}

/// Strings inside containers are quoted.
fn write_repr(f: &mut fmt::Formatter<'_>, value: &PodValue) -> fmt::Result {
    match value {
        PodValue::Str(s) => write!(f, "'{s}'"),
        other => write!(f, "{other}"),
    }
}

impl From<bool> for PodValue {
    fn from(b: bool) -> Self {
        PodValue::Bool(b)
    }
}

impl From<i64> for PodValue {
    fn from(i: i64) -> Self {
        PodValue::Int(i)
    }
}

impl From<i32> for PodValue {
    fn from(i: i32) -> Self {
        PodValue::Int(i64::from(i))
    }
}

impl From<f64> for PodValue {
    fn from(f: f64) -> Self {
        PodValue::Float(f)
    }
}

impl From<&str> for PodValue {
    fn from(s: &str) -> Self {
        PodValue::Str(s.to_string())
    }
}

impl From<String> for PodValue {
    fn from(s: String) -> Self {
        PodValue::Str(s)
    }
}

impl<T: Into<PodValue>> From<Vec<T>> for PodValue {
    fn from(items: Vec<T>) -> Self {
        PodValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<Template> for PodValue {
    fn from(template: Template) -> Self {
        PodValue::Template(Rc::new(template))
    }
}

impl From<serde_json::Value> for PodValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => PodValue::None,
            serde_json::Value::Bool(b) => PodValue::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => PodValue::Int(i),
                None => PodValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => PodValue::Str(s),
            serde_json::Value::Array(items) => {
                PodValue::List(items.into_iter().map(PodValue::from).collect())
            }
            serde_json::Value::Object(m) => {
                PodValue::Map(m.into_iter().map(|(k, v)| (k, PodValue::from(v))).collect())
            }
        }
    }
}

/// The variable bindings a template is rendered against.
#[derive(Debug, Clone, Default)]
pub struct PodContext {
    variables: HashMap<String, PodValue>,
}

impl PodContext {
    /// Create a new empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from a JSON object. Returns `None` for any other JSON value.
    pub fn from_json(value: serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Object(m) => Some(Self {
                variables: m.into_iter().map(|(k, v)| (k, PodValue::from(v))).collect(),
            }),
            _ => None,
        }
    }

    /// Bind a name, returning the value it previously had.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PodValue>) -> Option<PodValue> {
        self.variables.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&PodValue> {
        self.variables.get(key)
    }

    /// Get a variable by path (e.g. `["client", "name"]`).
    pub fn get_path(&self, path: &[&str]) -> Option<&PodValue> {
        let (first, rest) = path.split_first()?;
        self.get(first).and_then(|v| v.get_path(rest))
    }

    pub fn remove(&mut self, key: &str) -> Option<PodValue> {
        self.variables.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.variables.contains_key(key)
    }

    /// Put back a binding saved by [`PodContext::insert`]: the previous value
    /// if there was one, or no binding at all.
    pub fn restore(&mut self, key: &str, previous: Option<PodValue>) {
        match previous {
            Some(value) => {
                self.variables.insert(key.to_string(), value);
            }
            None => {
                self.variables.remove(key);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PodValue)> {
        self.variables.iter()
    }
}

impl<K: Into<String>, V: Into<PodValue>> FromIterator<(K, V)> for PodContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            variables: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
