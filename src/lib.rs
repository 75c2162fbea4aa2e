//! Lazy, composable query chains for pulling values out of HTML.
//!
//! A [`Chain`] is built by naming operations and only runs when applied:
//!
//! ```
//! use parsechain::{Chain, Document, Value};
//!
//! let doc = Document::parse("<ul><li>A</li><li>B</li></ul>");
//! let items: Chain = "css('li').map(text)".parse().unwrap();
//!
//! let out = items.apply(doc.root()).unwrap();
//! assert_eq!(out, Value::List(vec![Value::from("A"), Value::from("B")]));
//! ```
//!
//! Null flows through a chain without raising; `get` insists on exactly one
//! match; `multi` fans one input out to several branches and `|` falls back
//! to the next alternative on null. [`provenance`] reports which input nodes
//! each branch of the output came from.

#[macro_use]
mod macros;
mod api;
mod document;
mod engine;
mod error;
pub mod ops;
mod response;
mod value;
mod wrapper;
mod xpath;

pub use api::{
    Context, Extraction, ExtractionDetails, ExtractionVerbose, Options, extract, extract_verbose_with, extract_with,
};
pub use document::{Document, Node};
pub use engine::{
    Arg, Args, Chain, Func, Link, Materialized, Provenance, RunMetrics, RunResult, StepMetrics, flat_provenance,
    flat_provenance_with, provenance,
};
pub use error::{Error, Result};
pub use response::Response;
pub use value::{Key, Value};
pub use wrapper::{Chainy, ValueKind};
pub use xpath::XPath;
