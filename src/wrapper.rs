//! Eager values: the chain vocabulary applied immediately.
//!
//! A [`Chainy`] wraps a string, list or node and runs operations on it
//! straight away instead of building a chain. Dispatch goes through
//! [`apply_operation`], the same bind-then-apply core that links use, so the
//! two paths cannot drift apart.
//!
//! ```
//! use parsechain::{Chainy, Value, args};
//!
//! let s = Chainy::new(" hey!");
//! assert_eq!(s.op("trim").unwrap().value(), &Value::from("hey!"));
//! assert_eq!(s.call("strip", args![" !"]).unwrap().into_value(), Value::from("hey"));
//! ```

use crate::engine::{Args, Chain};
use crate::error::{Error, Result};
use crate::ops::apply_operation;
use crate::value::Value;
use std::fmt;
use std::ops::Deref;

/// What a wrapped value can be used as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Sequence,
    Node,
    Other,
}

impl ValueKind {
    pub fn of(value: &Value) -> ValueKind {
        match value {
            Value::Str(_) => ValueKind::String,
            Value::List(_) => ValueKind::Sequence,
            Value::Node(_) => ValueKind::Node,
            _ => ValueKind::Other,
        }
    }
}

/// A value with the operation vocabulary attached.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Chainy(Value);

impl Chainy {
    pub fn new(value: impl Into<Value>) -> Self {
        Chainy(value.into())
    }

    pub fn kind(&self) -> ValueKind {
        ValueKind::of(&self.0)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Run an operation that needs no arguments. Parameterized operations
    /// whose parameters are all optional (`strip`) run with none.
    pub fn op(&self, name: &str) -> Result<Chainy> {
        self.call(name, Args::new())
    }

    pub fn call(&self, name: &str, args: Args) -> Result<Chainy> {
        if name.starts_with('_') {
            return Err(Error::ReservedName { name: name.to_string() });
        }
        apply_operation(name, Some(&args), &self.0).map(Chainy)
    }

    /// Apply a whole chain to the wrapped value.
    pub fn apply(&self, chain: &Chain) -> Result<Chainy> {
        chain.apply(self.0.clone()).map(Chainy)
    }

    /// `css(selector)`, the most common entry point on nodes.
    pub fn css(&self, selector: &str) -> Result<Chainy> {
        self.call("css", Args::new().arg(selector))
    }

    pub fn xpath(&self, query: &str) -> Result<Chainy> {
        self.call("xpath", Args::new().arg(query))
    }
}

impl Deref for Chainy {
    type Target = Value;

    fn deref(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for Chainy {
    fn from(value: Value) -> Self {
        Chainy(value)
    }
}

impl From<Chainy> for Value {
    fn from(chainy: Chainy) -> Self {
        chainy.0
    }
}

impl fmt::Display for Chainy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    #[test]
    fn strings_run_text_operations() {
        let s = Chainy::new(" hey!");
        assert_eq!(s.kind(), ValueKind::String);
        assert_eq!(s.op("trim").unwrap().into_value(), Value::from("hey!"));
        assert_eq!(s.op("strip").unwrap().into_value(), Value::from("hey!"));
        assert_eq!(
            s.call("strip", Args::new().arg("!")).unwrap().op("trim").unwrap().into_value(),
            Value::from("hey")
        );
    }

    #[test]
    fn nodes_and_lists() {
        let root = Chainy::new(Document::parse_fragment("<ul><li>A</li><li>B</li></ul>").root());
        assert_eq!(root.kind(), ValueKind::Node);

        let items = root.css("li").unwrap();
        assert_eq!(items.kind(), ValueKind::Sequence);
        assert_eq!(items.op("len").unwrap().into_value(), Value::Int(2));
        assert_eq!(items.op("text").unwrap().into_value(), Value::from("A"));
        assert_eq!(root.xpath("//li[2]").unwrap().op("text").unwrap().into_value(), Value::from("B"));
    }

    #[test]
    fn eager_and_lazy_paths_agree() {
        let value = Value::from("  a  b ");
        let chain = Chain::parse("normspace.split(null)").unwrap();
        let eager = Chainy::new(value.clone()).op("normspace").unwrap();
        let eager = eager.call("split", Args::new().arg(crate::engine::Arg::Null)).unwrap();
        assert_eq!(eager.into_value(), chain.apply(value).unwrap());
    }

    #[test]
    fn errors_are_not_wrapped() {
        let err = Chainy::new(Value::Int(1)).op("trim").unwrap_err();
        assert!(matches!(err, Error::Type { op: "trim", .. }));
        assert!(matches!(Chainy::new("x").op("_hidden").unwrap_err(), Error::ReservedName { .. }));
        assert!(matches!(Chainy::new("x").op("attr").unwrap_err(), Error::Arity { .. }));
        assert_eq!(ValueKind::of(&Value::Int(1)), ValueKind::Other);
    }
}
