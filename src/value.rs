//! Evaluation values threaded through chains.
//!
//! `Value` is the tagged union every link consumes and produces. The tag
//! carries everything the engine needs to know about a value: null
//! propagation is `Value::Null`, and "is this still a node-set" is
//! [`Value::is_node_like`].

use crate::document::Node;
use chrono::{NaiveDateTime, TimeDelta};
use indexmap::IndexMap;
use std::fmt;

/// Key of a mapping produced by `multi`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Index(usize),
    Name(String),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(i) => write!(f, "{i}"),
            Key::Name(name) => f.write_str(name),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Date(NaiveDateTime),
    Duration(TimeDelta),
    Node(Node),
    List(Vec<Value>),
    Map(IndexMap<Key, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// A single node, or a non-empty list made only of nodes.
    pub fn is_node_like(&self) -> bool {
        match self {
            Value::Node(_) => true,
            Value::List(items) => !items.is_empty() && items.iter().all(|v| matches!(v, Value::Node(_))),
            _ => false,
        }
    }

    /// Python-style truthiness, used by `filter`.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(x) => *x != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Duration(d) => !d.is_zero(),
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
            Value::Date(_) | Value::Node(_) => true,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Date(_) => "date",
            Value::Duration(_) => "duration",
            Value::Node(_) => "node",
            Value::List(_) => "list",
            Value::Map(_) => "mapping",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Nodes contained in a node or a list (non-node items are skipped).
    pub fn nodes(&self) -> Vec<Node> {
        match self {
            Value::Node(node) => vec![node.clone()],
            Value::List(items) => items.iter().filter_map(|v| v.as_node().cloned()).collect(),
            _ => Vec::new(),
        }
    }

    /// Bounded single-line rendering used in error messages.
    ///
    /// Nodes are serialized to markup with whitespace runs collapsed instead of
    /// dumping their structure.
    pub fn preview(&self, max_chars: usize) -> String {
        let raw = match self {
            Value::Node(node) => node.outer_html(),
            other => other.to_string(),
        };
        let collapsed = crate::regex!(r"\s+").replace_all(&raw, " ");
        collapsed.chars().take(max_chars).collect()
    }

    /// JSON rendering: nodes become their outer markup, dates ISO-8601
    /// strings and durations whole seconds.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;
        match self {
            Value::Null => J::Null,
            Value::Bool(b) => J::Bool(*b),
            Value::Int(i) => J::from(*i),
            Value::Float(x) => serde_json::Number::from_f64(*x).map(J::Number).unwrap_or(J::Null),
            Value::Str(s) => J::String(s.clone()),
            Value::Date(d) => J::String(d.format("%Y-%m-%dT%H:%M:%S").to_string()),
            Value::Duration(d) => J::from(d.num_seconds()),
            Value::Node(node) => J::String(node.outer_html()),
            Value::List(items) => J::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => J::Object(map.iter().map(|(k, v)| (k.to_string(), v.to_json())).collect()),
        }
    }

    /// Convert parsed JSON into a value (objects keep their key order).
    pub fn from_json(json: serde_json::Value) -> Value {
        use serde_json::Value as J;
        match json {
            J::Null => Value::Null,
            J::Bool(b) => Value::Bool(b),
            J::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            J::String(s) => Value::Str(s),
            J::Array(items) => Value::List(items.into_iter().map(Value::from_json).collect()),
            J::Object(map) => Value::Map(map.into_iter().map(|(k, v)| (Key::Name(k), Value::from_json(v))).collect()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d %H:%M:%S")),
            Value::Duration(d) => write!(f, "{}s", d.num_seconds()),
            Value::Node(node) => write!(f, "<{}>", node.tag()),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match k {
                        Key::Index(i) => write!(f, "{i}: {v}")?,
                        Key::Name(name) => write!(f, "{name:?}: {v}")?,
                    }
                }
                f.write_str("}")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        Value::Node(node)
    }
}

impl From<Vec<Node>> for Value {
    fn from(nodes: Vec<Node>) -> Self {
        Value::List(nodes.into_iter().map(Value::Node).collect())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    #[test]
    fn node_like_requires_homogeneous_nonempty_lists() {
        let nodes = Document::fragment_nodes("<a></a><b></b>");
        assert!(Value::from(nodes[0].clone()).is_node_like());
        assert!(Value::from(nodes.clone()).is_node_like());
        assert!(!Value::List(vec![]).is_node_like());
        assert!(!Value::List(vec![Value::Node(nodes[0].clone()), Value::from("x")]).is_node_like());
        assert!(!Value::from("x").is_node_like());
    }

    #[test]
    fn preview_collapses_markup_whitespace() {
        let div = Document::fragment_nodes("<div>\n  <p>a</p>\n  <p>b</p>\n</div>").remove(0);
        assert_eq!(Value::Node(div.clone()).preview(100), "<div> <p>a</p> <p>b</p> </div>");
        assert_eq!(Value::Node(div).preview(8), "<div> <p");
    }

    #[test]
    fn truthiness_matches_python() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(!Value::List(vec![]).is_truthy());
    }

    #[test]
    fn json_round_trip_keeps_key_order() {
        let json: serde_json::Value = serde_json::from_str(r#"{"b": 1, "a": [true, null, 1.5]}"#).unwrap();
        let value = Value::from_json(json);
        let Value::Map(map) = &value else { panic!("expected mapping") };
        assert_eq!(map.keys().map(Key::to_string).collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(value.to_string(), r#"{"b": 1, "a": [true, null, 1.5]}"#);
    }
}
