//! Chains: immutable link sequences, and their evaluation.

use super::link::{Args, Func, Link};
use super::metrics::{RunMetrics, RunResult, StepMetrics};
use crate::api::Options;
use crate::error::{Error, Result};
use crate::ops::builtin;
use crate::value::Value;
use std::fmt;
use std::ops::{Add, BitOr};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// An ordered, immutable sequence of links.
///
/// Every builder method returns a new chain; links are shared between the
/// old and the new one. The empty chain is the identity.
///
/// ```
/// use parsechain::{Chain, Document, Value, args};
///
/// let items = Chain::new().call("css", args!["li"]).unwrap().op("texts").unwrap();
/// let doc = Document::parse_fragment("<ul><li>A</li><li>B</li></ul>");
///
/// let out = items.apply(doc.root()).unwrap();
/// assert_eq!(out, Value::List(vec![Value::from("A"), Value::from("B")]));
/// assert_eq!(items.to_string(), r#"C.css("li").texts"#);
/// ```
#[derive(Clone)]
pub struct Chain {
    links: Arc<[Link]>,
}

impl Chain {
    pub fn new() -> Self {
        Chain { links: Arc::from(Vec::new()) }
    }

    pub fn from_links(links: Vec<Link>) -> Self {
        Chain { links: Arc::from(links) }
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// True while the last link is a parameterized operation awaiting its
    /// arguments.
    pub fn is_pending(&self) -> bool {
        self.links.last().is_some_and(Link::is_pending)
    }

    /// Links with a trailing pending link closed with no arguments.
    fn closed_links(&self) -> Result<Vec<Link>> {
        let mut links = self.links.to_vec();
        if let Some(last) = links.last_mut() {
            *last = last.close()?;
        }
        Ok(links)
    }

    /// Close a trailing pending link with no arguments.
    pub(crate) fn close(&self) -> Result<Chain> {
        if self.is_pending() { self.closed_links().map(Chain::from_links) } else { Ok(self.clone()) }
    }

    /// Append the operation `name`.
    ///
    /// Parameterized operations leave the chain pending until
    /// [`with_args`](Self::with_args) supplies their arguments.
    pub fn op(&self, name: &str) -> Result<Chain> {
        if name.starts_with('_') {
            return Err(Error::ReservedName { name: name.to_string() });
        }
        let link = Link::op(name)?;
        let mut links = self.closed_links()?;
        links.push(link);
        Ok(Chain::from_links(links))
    }

    /// Fill in the arguments of the trailing pending link.
    pub fn with_args(&self, args: Args) -> Result<Chain> {
        match self.links.split_last() {
            Some((last, head)) if last.is_pending() => {
                let mut links = head.to_vec();
                links.push(last.with_args(args)?);
                Ok(Chain::from_links(links))
            }
            _ => Err(Error::arity(self.to_string(), "chain is not awaiting arguments")),
        }
    }

    /// `op(name)` followed by `with_args(args)`.
    pub fn call(&self, name: &str, args: Args) -> Result<Chain> {
        let chain = self.op(name)?;
        if chain.is_pending() {
            chain.with_args(args)
        } else if args.is_empty() {
            Ok(chain)
        } else {
            Err(Error::arity(name, "takes no arguments"))
        }
    }

    /// Sequential composition: `self` followed by `other`.
    pub fn then(&self, other: impl Into<Chain>) -> Chain {
        let other = other.into();
        if other.is_empty() {
            return self.clone();
        }
        let mut links = self.links.to_vec();
        links.extend(other.links.iter().cloned());
        Chain::from_links(links)
    }

    /// Alternation: a single-link chain trying `self`, then `other`.
    pub fn or(&self, other: &Chain) -> Chain {
        let args = Args::new().arg(self.clone()).arg(other.clone());
        Chain::from_links(vec![Link::from_operation(builtin("notnone"), args)])
    }

    /// Parse the textual chain form, e.g. `css("li").map(text)`.
    pub fn parse(expr: &str) -> Result<Chain> {
        super::expr::parse_chain(expr)
    }

    pub fn apply(&self, value: impl Into<Value>) -> Result<Value> {
        self.apply_with(value.into(), &Options::default())
    }

    /// Apply under `options`, including its [`Context`](crate::Context) if set.
    pub fn apply_with(&self, value: Value, options: &Options) -> Result<Value> {
        options.in_context(|| self.evaluate(value, options, None))
    }

    /// Call-style application: exactly one value.
    pub fn apply_values(&self, values: Vec<Value>) -> Result<Value> {
        let [value]: [Value; 1] = values.try_into().map_err(|values: Vec<Value>| {
            Error::arity(self.to_string(), format!("expecting a single value to process, got {}", values.len()))
        })?;
        self.apply(value)
    }

    /// Apply and record per-link timings and output previews.
    pub fn apply_with_metrics(&self, value: Value, options: &Options) -> Result<RunResult> {
        let start = Instant::now();
        let mut steps = Vec::with_capacity(self.len());
        let value = options.in_context(|| self.evaluate(value, options, Some(&mut steps)))?;
        let skipped = self.len() - steps.len();
        Ok(RunResult { value, metrics: RunMetrics { total: start.elapsed(), steps, skipped } })
    }

    fn evaluate(&self, mut value: Value, options: &Options, mut trace: Option<&mut Vec<StepMetrics>>) -> Result<Value> {
        if self.is_pending() {
            return Err(Error::arity(self.to_string(), "chain is still awaiting arguments"));
        }

        for link in self.links.iter() {
            if value.is_null() {
                return Ok(Value::Null);
            }
            let started = Instant::now();
            match link.call(&value) {
                Ok(next) => {
                    if let Some(steps) = trace.as_deref_mut() {
                        steps.push(StepMetrics {
                            link: link.to_string(),
                            duration: started.elapsed(),
                            output: next.preview(options.preview_len),
                            node_like: next.is_node_like(),
                        });
                    }
                    value = next;
                }
                Err(source) => {
                    debug!(link = %link, chain = %self, error = %source, "link failed");
                    return Err(Error::Evaluation {
                        link: link.to_string(),
                        value: value.preview(options.preview_len),
                        chain: self.to_string(),
                        source: Box::new(source),
                    });
                }
            }
        }
        Ok(value)
    }
}

impl Default for Chain {
    fn default() -> Self {
        Chain::new()
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("C")?;
        for link in self.links.iter() {
            write!(f, ".{link}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Chain: {self}>")
    }
}

impl PartialEq for Chain {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

impl FromStr for Chain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Chain> {
        Chain::parse(s)
    }
}

impl From<Link> for Chain {
    fn from(link: Link) -> Self {
        Chain::from_links(vec![link])
    }
}

impl From<Vec<Link>> for Chain {
    fn from(links: Vec<Link>) -> Self {
        Chain::from_links(links)
    }
}

impl From<Func> for Chain {
    fn from(func: Func) -> Self {
        Chain::from(Link::func(func))
    }
}

impl From<&Chain> for Chain {
    fn from(chain: &Chain) -> Self {
        chain.clone()
    }
}

impl<T: Into<Chain>> Add<T> for Chain {
    type Output = Chain;

    fn add(self, other: T) -> Chain {
        self.then(other)
    }
}

impl<T: Into<Chain>> Add<T> for &Chain {
    type Output = Chain;

    fn add(self, other: T) -> Chain {
        self.then(other)
    }
}

impl BitOr for Chain {
    type Output = Chain;

    fn bitor(self, other: Chain) -> Chain {
        self.or(&other)
    }
}

impl BitOr for &Chain {
    type Output = Chain;

    fn bitor(self, other: &Chain) -> Chain {
        self.or(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    #[test]
    fn builder_returns_new_chains() {
        let base = Chain::new().op("parent").unwrap();
        let longer = base.op("text").unwrap();
        assert_eq!(base.to_string(), "C.parent");
        assert_eq!(longer.to_string(), "C.parent.text");
        assert_eq!(Chain::new().to_string(), "C");
    }

    #[test]
    fn unknown_and_reserved_names() {
        assert!(matches!(Chain::new().op("nope").unwrap_err(), Error::UnknownOperation { .. }));
        assert!(matches!(Chain::new().op("_private").unwrap_err(), Error::ReservedName { .. }));
    }

    #[test]
    fn pending_links_take_arguments_once() {
        let pending = Chain::new().op("attr").unwrap();
        assert!(pending.is_pending());
        assert_eq!(pending.to_string(), "C.attr(...)");

        let bound = pending.with_args(Args::new().arg("href")).unwrap();
        assert_eq!(bound.to_string(), r#"C.attr("href")"#);
        assert!(bound.with_args(Args::new().arg("x")).is_err());

        assert!(matches!(pending.apply(Value::from("x")).unwrap_err(), Error::Arity { .. }));
        assert!(pending.op("text").is_err());
        assert_eq!(Chain::new().op("strip").unwrap().op("len").unwrap().to_string(), "C.strip().len");
    }

    #[test]
    fn application_takes_exactly_one_value() {
        let chain = Chain::new().op("len").unwrap();
        assert_eq!(chain.apply_values(vec![Value::from("abc")]).unwrap(), Value::Int(3));
        assert!(chain.apply_values(vec![]).is_err());
        assert!(chain.apply_values(vec![Value::from("a"), Value::from("b")]).is_err());
    }

    #[test]
    fn failures_name_the_link_and_chain() {
        let chain = Chain::new().op("trim").unwrap().op("int").unwrap();
        let err = chain.apply(Value::from(" 4x ")).unwrap_err();
        assert_eq!(err.to_string(), r#"link .int failed on "4x" in C.trim.int"#);
        assert!(matches!(err.root_cause(), Error::Conversion { .. }));
    }

    #[test]
    fn node_previews_are_single_line_and_bounded() {
        let ul = Document::fragment_nodes("<ul>\n  <li>A</li>\n  <li>B</li>\n</ul>").remove(0);
        let chain = Chain::new().op("len").unwrap();
        let options = Options { preview_len: 12, ..Options::default() };
        let Error::Evaluation { value, .. } = chain.apply_with(Value::Node(ul), &options).unwrap_err() else {
            panic!("expected evaluation error")
        };
        assert_eq!(value, "<ul> <li>A</");
    }

    #[test]
    fn metrics_record_each_step() {
        let chain = Chain::new().op("trim").unwrap().op("len").unwrap();
        let run = chain.apply_with_metrics(Value::from(" ab "), &Options::default()).unwrap();
        assert_eq!(run.value, Value::Int(2));
        assert_eq!(run.metrics.steps.len(), 2);
        assert_eq!(run.metrics.steps[0].output, r#""ab""#);
        assert_eq!(run.metrics.skipped, 0);
        let slowest = run.metrics.slowest().unwrap();
        assert!(run.metrics.steps.iter().all(|step| step.duration <= slowest.duration));
        assert!(RunMetrics::default().slowest().is_none());
    }

    #[test]
    fn chains_are_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Chain>();
    }
}
