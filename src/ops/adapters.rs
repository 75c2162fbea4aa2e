//! List-awareness adapters.
//!
//! Operations written for a single node are lifted to node lists by one of
//! three wrappers instead of each operation handling lists itself:
//!
//! ```text
//! list_first   [a, b] -> f(a)        a -> f(a)      [] -> null
//! list_map     [a, b] -> [f(a), f(b)]               a -> f(a)
//! list_mapcat  [a, b] -> f(a) ++ f(b)               a -> f(a)
//! ```
//!
//! Null items inside a list are carried through as null.

use crate::document::Node;
use crate::engine::Materialized;
use crate::error::{Error, Result};
use crate::value::Value;
use std::sync::Arc;

/// Box a closure as a materialized transform.
pub(crate) fn transform<F>(f: F) -> Materialized
where
    F: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
{
    Materialized::Transform(Arc::new(f))
}

pub(crate) fn list_first<F>(f: F) -> impl Fn(&Value) -> Result<Value> + Send + Sync + 'static
where
    F: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
{
    move |value| match value {
        Value::List(items) => match items.first() {
            None | Some(Value::Null) => Ok(Value::Null),
            Some(first) => f(first),
        },
        other => f(other),
    }
}

pub(crate) fn list_map<F>(f: F) -> impl Fn(&Value) -> Result<Value> + Send + Sync + 'static
where
    F: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
{
    move |value| match value {
        Value::List(items) => items
            .iter()
            .map(|item| if item.is_null() { Ok(Value::Null) } else { f(item) })
            .collect::<Result<Vec<_>>>()
            .map(Value::List),
        other => f(other),
    }
}

pub(crate) fn list_mapcat<F>(f: F) -> impl Fn(&Value) -> Result<Value> + Send + Sync + 'static
where
    F: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
{
    move |value| match value {
        Value::List(items) => {
            let mut out = Vec::new();
            for item in items.iter().filter(|item| !item.is_null()) {
                match f(item)? {
                    Value::List(more) => out.extend(more),
                    single => out.push(single),
                }
            }
            Ok(Value::List(out))
        }
        other => f(other),
    }
}

/// Borrow the node inside `value`, or fail with a type error naming `op`.
pub(crate) fn expect_node<'v>(op: &'static str, value: &'v Value) -> Result<&'v Node> {
    value.as_node().ok_or_else(|| Error::Type { op, expected: "a node", found: value.kind_name() })
}

pub(crate) fn expect_str<'v>(op: &'static str, value: &'v Value) -> Result<&'v str> {
    value.as_str().ok_or_else(|| Error::Type { op, expected: "a string", found: value.kind_name() })
}

pub(crate) fn expect_list<'v>(op: &'static str, value: &'v Value) -> Result<&'v [Value]> {
    value.as_list().ok_or_else(|| Error::Type { op, expected: "a list", found: value.kind_name() })
}
