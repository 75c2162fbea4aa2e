//! Chain construction, evaluation and introspection.
//!
//! ## How the parts work together
//!
//! ```text
//! Chain::op / call / parse        (chain.rs, expr.rs)
//!        │   name → &'static Operation   (ops::registry)
//!        v
//!   [Link, Link, ...]  ── immutable, shared via Arc<[Link]>
//!        │
//!        │  apply(value)
//!        v
//!   for each link:                (chain.rs)
//!     - null? stop, result is null
//!     - link.materialize()        (link.rs, cached per link)
//!         Direct        → the operation's transform
//!         Parameterized → factory(args) → Transform | sub-Chain
//!     - run it; on failure wrap once as Error::Evaluation
//!        │
//!        v
//!      Value
//! ```
//!
//! [`provenance`] walks the same links without producing output values: it
//! follows node-producing links and stops at the first link that leaves
//! node-space, recording which input nodes each output path depends on.
//!
//! ## Responsibilities by module
//!
//! - `link.rs`: construction arguments (`Arg`, `Args`), external callables
//!   (`Func`) and the `Link` itself, including its display label.
//! - `chain.rs`: the builder API, `+` and `|`, and evaluation with null
//!   short-circuit and error wrapping.
//! - `expr.rs`: the textual chain language (`css("li").map(text)`).
//! - `provenance.rs`: the introspection walk and path flattening.
//! - `metrics.rs`: optional per-link timing and output previews.
//!
//! ## Debugging
//!
//! Link failures are logged at `debug` and walks that leave node-space at
//! `trace`, under the `parsechain` target.

#[path = "engine/chain.rs"]
mod chain;
#[path = "engine/expr.rs"]
mod expr;
#[path = "engine/link.rs"]
mod link;
#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/provenance.rs"]
mod provenance;

#[cfg(test)]
#[path = "engine/tests.rs"]
mod tests;

pub use chain::Chain;
pub use link::{Arg, Args, Func, Link, Materialized};
pub use metrics::{RunMetrics, RunResult, StepMetrics};
pub use provenance::{Provenance, flat_provenance, flat_provenance_with, provenance};
