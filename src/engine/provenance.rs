//! Node introspection: which input nodes each output path came from.
//!
//! The walk mirrors evaluation structurally, but only follows links while
//! their results stay node-like. As soon as a link leaves node-space (reads
//! text, counts, converts), the nodes reached so far are the provenance of
//! everything downstream.
//!
//! Dispatch happens on operation flags:
//!
//! - `CONSTANT`: the value does not depend on the input, empty leaf.
//! - `BRANCH` (`multi`): one sub-walk per entry, keyed like the entries.
//! - `ALTERNATION` (`notnone`): the union of every alternative's walk.
//!   Evaluation stops at the first non-null alternative; the walk does not,
//!   because it cannot know which one would win without running side chains.
//! - anything else is materialized; sub-chains are inlined, transforms are
//!   applied.

use super::chain::Chain;
use super::link::{Arg, Link, Materialized};
use crate::api::Options;
use crate::error::{Error, Result};
use crate::ops::OpFlags;
use crate::ops::branch_entries;
use crate::value::{Key, Value};
use indexmap::IndexMap;
use tracing::trace;

/// Nodes responsible for a chain's output, shaped like the output's branches.
#[derive(Debug, Clone, PartialEq)]
pub enum Provenance {
    Leaf(Value),
    Branches(IndexMap<Key, Provenance>),
}

impl Provenance {
    fn empty() -> Provenance {
        Provenance::Leaf(Value::List(Vec::new()))
    }

    pub fn is_empty_leaf(&self) -> bool {
        match self {
            Provenance::Leaf(Value::Null) => true,
            Provenance::Leaf(Value::List(items)) => items.is_empty(),
            _ => false,
        }
    }

    /// Flatten to `path → nodes`, joining keys with `separator`.
    ///
    /// A provenance without branches flattens to a single entry under the
    /// empty path.
    pub fn flatten(&self, separator: &str) -> IndexMap<String, Value> {
        let mut out = IndexMap::new();
        self.flatten_into("", separator, &mut out);
        out
    }

    fn flatten_into(&self, path: &str, separator: &str, out: &mut IndexMap<String, Value>) {
        match self {
            Provenance::Leaf(nodes) => {
                out.insert(path.to_string(), nodes.clone());
            }
            Provenance::Branches(branches) => {
                for (key, sub) in branches {
                    let path = if path.is_empty() { key.to_string() } else { format!("{path}{separator}{key}") };
                    sub.flatten_into(&path, separator, out);
                }
            }
        }
    }

    /// Merge two provenances; an empty leaf is the identity.
    fn union(self, other: Provenance) -> Provenance {
        if self.is_empty_leaf() {
            return other;
        }
        if other.is_empty_leaf() {
            return self;
        }
        match (self, other) {
            (Provenance::Leaf(a), Provenance::Leaf(b)) => Provenance::Leaf(union_nodes(&a, &b)),
            (Provenance::Branches(mut a), Provenance::Branches(b)) => {
                for (key, sub) in b {
                    match a.get_mut(&key) {
                        Some(slot) => {
                            let prev = std::mem::replace(slot, Provenance::empty());
                            *slot = prev.union(sub);
                        }
                        None => {
                            a.insert(key, sub);
                        }
                    }
                }
                Provenance::Branches(a)
            }
            (Provenance::Branches(branches), leaf @ Provenance::Leaf(_))
            | (leaf @ Provenance::Leaf(_), Provenance::Branches(branches)) => Provenance::Branches(
                branches.into_iter().map(|(key, sub)| (key, sub.union(leaf.clone()))).collect(),
            ),
        }
    }
}

/// Items of both values, in order, without duplicates.
fn union_nodes(a: &Value, b: &Value) -> Value {
    let mut out: Vec<Value> = Vec::new();
    for item in items(a).into_iter().chain(items(b)) {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    Value::List(out)
}

fn items(value: &Value) -> Vec<Value> {
    match value {
        Value::Null => Vec::new(),
        Value::List(items) => items.clone(),
        other => vec![other.clone()],
    }
}

/// Provenance of `chain` applied to `nodes`.
pub fn provenance(nodes: &Value, chain: &Chain) -> Result<Provenance> {
    walk(nodes, chain.links())
}

/// [`provenance`] flattened with the default separator.
pub fn flat_provenance(nodes: &Value, chain: &Chain) -> Result<IndexMap<String, Value>> {
    flat_provenance_with(nodes, chain, &Options::default())
}

pub fn flat_provenance_with(nodes: &Value, chain: &Chain, options: &Options) -> Result<IndexMap<String, Value>> {
    Ok(options.in_context(|| provenance(nodes, chain))?.flatten(&options.separator))
}

fn walk(nodes: &Value, links: &[Link]) -> Result<Provenance> {
    let Some((link, rest)) = links.split_first() else {
        return Ok(Provenance::Leaf(nodes.clone()));
    };
    if nodes.is_null() {
        return Ok(Provenance::empty());
    }

    let flags = link.operation().map_or(OpFlags::empty(), |op| op.flags);

    if flags.contains(OpFlags::CONSTANT) {
        return Ok(Provenance::empty());
    }

    if flags.contains(OpFlags::BRANCH) {
        let spec = link.args().and_then(|args| args.positional().first().or_else(|| args.iter().next()));
        let entries = spec
            .and_then(branch_entries)
            .ok_or_else(|| Error::arity(link.to_string(), "branch without a list or mapping spec"))?;
        let mut branches = IndexMap::with_capacity(entries.len());
        for (key, entry) in entries {
            let sub = match callable_links(entry) {
                Some(head) => walk_joined(nodes, &head, rest)?,
                None => Provenance::empty(),
            };
            branches.insert(key, sub);
        }
        return Ok(Provenance::Branches(branches));
    }

    if flags.contains(OpFlags::ALTERNATION) {
        let mut merged = Provenance::empty();
        for alternative in link.args().into_iter().flat_map(|args| args.iter()) {
            if let Some(head) = callable_links(alternative) {
                merged = merged.union(walk_joined(nodes, &head, rest)?);
            }
        }
        return Ok(merged);
    }

    match link.materialize().map_err(|err| failure(link, nodes, links, err))? {
        Materialized::Chain(sub) => walk_joined(nodes, sub.links(), rest),
        Materialized::Transform(f) => {
            let next = f(nodes).map_err(|err| failure(link, nodes, links, err))?;
            if next.is_node_like() {
                walk(&next, rest)
            } else {
                trace!(link = %link, "provenance walk left node-space");
                Ok(Provenance::Leaf(nodes.clone()))
            }
        }
    }
}

/// Links of a callable branch entry; literals have none.
fn callable_links(arg: &Arg) -> Option<Vec<Link>> {
    match arg {
        Arg::Chain(chain) => Some(chain.links().to_vec()),
        Arg::Func(func) => Some(vec![Link::func(func.clone())]),
        _ => None,
    }
}

fn walk_joined(nodes: &Value, head: &[Link], rest: &[Link]) -> Result<Provenance> {
    let mut joined = Vec::with_capacity(head.len() + rest.len());
    joined.extend_from_slice(head);
    joined.extend_from_slice(rest);
    walk(nodes, &joined)
}

fn failure(link: &Link, nodes: &Value, links: &[Link], source: Error) -> Error {
    Error::Evaluation {
        link: link.to_string(),
        value: nodes.preview(Options::default().preview_len),
        chain: Chain::from_links(links.to_vec()).to_string(),
        source: Box::new(source),
    }
}
