//! Structural combinators: `const`, `multi` and `notnone`.
//!
//! These are ordinary registry entries, but they carry the flags the
//! provenance walk dispatches on, and their arguments are themselves chains.

use super::adapters::transform;
use super::registry::{Bound, OpFlags, Registry};
use crate::engine::{Arg, Materialized};
use crate::error::{Error, Result};
use crate::value::{Key, Value};
use indexmap::IndexMap;

pub(super) fn register(reg: &mut Registry) {
    reg.parameterized("const", OpFlags::CONSTANT, &["value"], 1, constant);
    reg.parameterized("multi", OpFlags::BRANCH, &["spec"], 1, multi);
    reg.parameterized("notnone", OpFlags::VARIADIC | OpFlags::ALTERNATION, &["chains"], 1, notnone);
}

fn constant(b: &Bound<'_>) -> Result<Materialized> {
    let arg = b.raw(0).cloned().unwrap_or(Arg::Null);
    // Reject callables up front rather than on every application.
    arg.to_value()?;
    Ok(transform(move |_| arg.to_value()))
}

/// Entries of a branch specification, keyed by index for lists.
pub(crate) fn branch_entries(spec: &Arg) -> Option<Vec<(Key, &Arg)>> {
    match spec {
        Arg::List(items) => Some(items.iter().enumerate().map(|(i, arg)| (Key::Index(i), arg)).collect()),
        Arg::Map(map) => Some(map.iter().map(|(k, arg)| (k.clone(), arg)).collect()),
        _ => None,
    }
}

fn multi(b: &Bound<'_>) -> Result<Materialized> {
    let spec = b.require(0)?.clone();
    if branch_entries(&spec).is_none() {
        return Err(Error::arity("multi", format!("`spec` must be a list or a mapping, got {}", spec.kind_name())));
    }
    Ok(transform(move |el| fan_out(&spec, el)))
}

/// Apply every entry of `spec` to `el`; literal entries pass through.
pub(crate) fn fan_out(spec: &Arg, el: &Value) -> Result<Value> {
    match spec {
        Arg::List(items) => items.iter().map(|entry| entry.apply(el)).collect::<Result<Vec<_>>>().map(Value::List),
        Arg::Map(map) => map
            .iter()
            .map(|(key, entry)| Ok((key.clone(), entry.apply(el)?)))
            .collect::<Result<IndexMap<_, _>>>()
            .map(Value::Map),
        other => other.apply(el),
    }
}

fn notnone(b: &Bound<'_>) -> Result<Materialized> {
    let alternatives: Vec<Arg> = b.positional().to_vec();
    Ok(transform(move |value| {
        for alternative in &alternatives {
            let result = alternative.apply(value)?;
            if !result.is_null() {
                return Ok(result);
            }
        }
        Ok(Value::Null)
    }))
}
