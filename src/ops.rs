//! Built-in operations.
//!
//! Every operation lives in the process-wide [`Registry`], populated once by
//! the `register` function of each submodule below:
//!
//! ```text
//! combinators.rs  const, multi, notnone            (structural)
//! traverse.rs     css, xpath, parent, prev, next,
//!                 itemscope, itemprop, microdata, ld
//! select.rs       get, first, second, last, slice
//! access.rs       text, texts, tail, attr, attrs, head,
//!                 inner_text, inner_html, outer_html, html_to_text
//! text.rs         trim, strip, normspace, split, re, re_sub
//! data.rs         len, map, filter, float, int, clean_float,
//!                 clean_int, date, duration
//! ```
//!
//! Node-level operations are lifted over node lists by the adapters in
//! `adapters.rs`, never by hand.
//!
//! ## Adding an operation
//!
//! Pick the submodule by concern, call `reg.direct(..)` or
//! `reg.parameterized(..)` from its `register`, and declare the parameter
//! names so that named arguments and arity checks work. Operations that are
//! just other chains should return [`Materialized::Chain`] so that provenance
//! can see through them.
//!
//! [`Materialized::Chain`]: crate::engine::Materialized::Chain

#[path = "ops/access.rs"]
mod access;
#[path = "ops/adapters.rs"]
mod adapters;
#[path = "ops/combinators.rs"]
mod combinators;
#[path = "ops/data.rs"]
mod data;
#[path = "ops/registry.rs"]
mod registry;
#[path = "ops/select.rs"]
mod select;
#[path = "ops/text.rs"]
mod text;
#[path = "ops/traverse.rs"]
mod traverse;

pub use registry::{Bound, Factory, OpFlags, OpKind, Operation, Registry, Transform, apply_operation, registry};

pub(crate) use combinators::branch_entries;
pub(crate) use registry::builtin;
