use crate::document::Document;
use crate::engine::{Chain, RunMetrics, flat_provenance_with};
use crate::error::Result;
use crate::value::Value;
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::time::{Duration, Instant};

thread_local! {
    static CURRENT: RefCell<Option<Context>> = const { RefCell::new(None) };
}

/// Evaluation context.
///
/// This holds environment needed to resolve relative expressions (like "tomorrow").
#[derive(Debug, Clone)]
pub struct Context {
    /// Reference datetime used to resolve relative dates.
    pub reference_time: NaiveDateTime,
}

impl Default for Context {
    fn default() -> Self {
        if cfg!(test) {
            let date = NaiveDate::from_ymd_opt(2013, 2, 12).unwrap_or_default();
            Self { reference_time: NaiveDateTime::new(date, NaiveTime::MIN) }
        } else {
            Self { reference_time: Local::now().naive_local() }
        }
    }
}

impl Context {
    pub fn at(reference_time: NaiveDateTime) -> Self {
        Context { reference_time }
    }

    /// The context of the innermost running [`Context::scope`], or the
    /// default one outside any scope.
    pub fn current() -> Context {
        CURRENT.with(|cell| cell.borrow().clone()).unwrap_or_default()
    }

    /// Run `f` with `self` as the current context. The enclosing context is
    /// restored when `f` returns or unwinds.
    pub fn scope<T>(&self, f: impl FnOnce() -> T) -> T {
        let previous = CURRENT.with(|cell| cell.replace(Some(self.clone())));
        let _restore = Restore(previous);
        f()
    }
}

struct Restore(Option<Context>);

impl Drop for Restore {
    fn drop(&mut self) {
        let previous = self.0.take();
        CURRENT.with(|cell| *cell.borrow_mut() = previous);
    }
}

/// Options that affect evaluation context, diagnostics and introspection output.
#[derive(Debug, Clone)]
pub struct Options {
    /// Maximum characters of a value shown in error messages and traces.
    pub preview_len: usize,
    /// Joins branch keys when flattening provenance.
    pub separator: String,
    /// Context for the run. `None` keeps the enclosing one.
    pub context: Option<Context>,
}

impl Options {
    /// Run `f` under `self.context`, if one is set.
    pub(crate) fn in_context<T>(&self, f: impl FnOnce() -> T) -> T {
        match &self.context {
            Some(ctx) => ctx.scope(f),
            None => f(),
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        Options { preview_len: 100, separator: ".".to_string(), context: None }
    }
}

/// Result from [`extract`] and [`extract_with`].
#[derive(Debug, Clone)]
pub struct Extraction {
    /// The chain that ran, in canonical form.
    pub chain: String,
    pub value: Value,
    /// Total elapsed time spent parsing the document and applying the chain.
    pub elapsed: Duration,
}

/// Additional details returned by [`extract_verbose_with`].
#[derive(Debug, Clone)]
pub struct ExtractionDetails {
    /// Time spent parsing the HTML.
    pub parse: Duration,
    /// Per-link trace of applying the chain.
    pub metrics: RunMetrics,
    /// Flattened provenance: output path → source nodes.
    pub provenance: IndexMap<String, Value>,
}

#[derive(Debug, Clone)]
pub struct ExtractionVerbose {
    pub chain: String,
    pub value: Value,
    pub elapsed: Duration,
    pub details: ExtractionDetails,
}

/// Apply the chain expression `expr` to the `<html>` element of `html`.
///
/// # Example
/// ```
/// use parsechain::{extract, Value};
///
/// let out = extract("<ul><li>A</li><li>B</li></ul>", "css('li').map(text)").unwrap();
/// assert_eq!(out.value, Value::List(vec![Value::from("A"), Value::from("B")]));
/// ```
pub fn extract(html: &str, expr: &str) -> Result<Extraction> {
    extract_with(html, expr, &Options::default())
}

pub fn extract_with(html: &str, expr: &str, options: &Options) -> Result<Extraction> {
    let start = Instant::now();
    let chain = Chain::parse(expr)?;
    let root = Value::Node(Document::parse(html).root());
    let value = chain.apply_with(root, options)?;

    Ok(Extraction { chain: chain.to_string(), value, elapsed: start.elapsed() })
}

/// Like [`extract_with`], plus the per-link trace and the provenance map.
///
/// The default [`extract_with`] path does not collect these.
pub fn extract_verbose_with(html: &str, expr: &str, options: &Options) -> Result<ExtractionVerbose> {
    let start = Instant::now();
    let chain = Chain::parse(expr)?;

    let parse_start = Instant::now();
    let root = Value::Node(Document::parse(html).root());
    let parse = parse_start.elapsed();

    let run = chain.apply_with_metrics(root.clone(), options)?;
    let provenance = flat_provenance_with(&root, &chain, options)?;

    let details = ExtractionDetails { parse, metrics: run.metrics, provenance };
    Ok(ExtractionVerbose { chain: chain.to_string(), value: run.value, elapsed: start.elapsed(), details })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
        <h1 class="title">Lamp</h1>
        <ul><li>one</li><li>two</li></ul>
        <span class="price">$ 1 299,90</span>
    </body></html>"#;

    #[test]
    fn extract_returns_value_and_canonical_chain() {
        let res = extract(PAGE, "css('.price').text.clean_float").unwrap();
        assert_eq!(res.value, Value::Float(1299.9));
        assert_eq!(res.chain, r#"C.css(".price").text.clean_float"#);
        assert!(res.elapsed >= Duration::ZERO);
    }

    #[test]
    fn extract_verbose_includes_trace_and_provenance() {
        let options = Options { separator: "/".to_string(), ..Options::default() };
        let res = extract_verbose_with(PAGE, "multi({'title': C.css('h1').text, 'items': C.css('li').texts})", &options)
            .unwrap();

        let Value::Map(map) = &res.value else { panic!("expected mapping") };
        assert_eq!(map.len(), 2);
        assert_eq!(res.details.metrics.steps.len(), 1);
        assert_eq!(res.details.metrics.skipped, 0);

        let keys: Vec<&str> = res.details.provenance.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["title", "items"]);
        assert!(res.details.provenance["items"].is_node_like());
        assert!(res.details.parse <= res.elapsed);
    }

    #[test]
    fn errors_propagate() {
        assert!(extract(PAGE, "css('li').get").is_err());
        assert!(extract(PAGE, "css('li'").is_err());
    }

    #[test]
    fn test_context_is_fixed() {
        let ctx = Context::default();
        assert_eq!(ctx.reference_time.to_string(), "2013-02-12 00:00:00");
    }

    #[test]
    fn reference_time_drives_relative_dates() {
        let day = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
        let dated = |value: Value| match value {
            Value::Date(dt) => dt.date(),
            other => panic!("expected date, got {other:?}"),
        };
        let html = "<p>tomorrow</p><p>2014-03-01</p>";

        let res = extract(html, "css('p').text.date").unwrap();
        assert_eq!(dated(res.value), day(2013, 2, 13));

        let options = Options {
            context: Some(Context::at(day(2020, 5, 1).and_time(NaiveTime::MIN))),
            ..Options::default()
        };
        let res = extract_with(html, "css('p').text.date", &options).unwrap();
        assert_eq!(dated(res.value), day(2020, 5, 2));

        // Nested chains inherit the context of the run.
        let res = extract_with(html, "css('p').map(C.text.date)", &options).unwrap();
        let Value::List(items) = res.value else { panic!("expected list") };
        let days: Vec<NaiveDate> = items.into_iter().map(dated).collect();
        assert_eq!(days, vec![day(2020, 5, 2), day(2014, 3, 1)]);

        assert_eq!(Context::current().reference_time, Context::default().reference_time);
    }

    #[test]
    fn scopes_nest_and_restore() {
        let outer = Context::at(NaiveDate::from_ymd_opt(2001, 1, 1).unwrap().and_time(NaiveTime::MIN));
        let inner = Context::at(NaiveDate::from_ymd_opt(2002, 2, 2).unwrap().and_time(NaiveTime::MIN));
        outer.scope(|| {
            inner.scope(|| assert_eq!(Context::current().reference_time, inner.reference_time));
            assert_eq!(Context::current().reference_time, outer.reference_time);
        });
        assert_eq!(Context::current().reference_time, Context::default().reference_time);
    }
}
