//! Tree traversal: selectors, navigation and embedded metadata.

use super::adapters::{expect_node, list_map, list_mapcat, transform};
use super::registry::{Bound, OpFlags, Registry};
use crate::document::compile_selector;
use crate::engine::{Arg, Args, Chain, Materialized};
use crate::error::{Error, Result};
use crate::value::Value;
use crate::xpath::XPath;
use indexmap::IndexMap;

const LD_JSON: &str = r#"script[type="application/ld+json"]"#;

pub(super) fn register(reg: &mut Registry) {
    reg.parameterized("css", OpFlags::LIST_AWARE, &["selector"], 1, css);
    reg.parameterized("xpath", OpFlags::LIST_AWARE, &["query", "vars"], 1, xpath);

    reg.direct("parent", OpFlags::LIST_AWARE, list_map(|v| Ok(Value::from(expect_node("parent", v)?.parent()))));
    reg.direct("prev", OpFlags::LIST_AWARE, list_map(|v| Ok(Value::from(expect_node("prev", v)?.prev()))));
    reg.direct("next", OpFlags::LIST_AWARE, list_map(|v| Ok(Value::from(expect_node("next", v)?.next()))));

    reg.parameterized("itemscope", OpFlags::empty(), &["name"], 1, itemscope);
    reg.parameterized("itemprop", OpFlags::empty(), &["name"], 1, itemprop);
    reg.parameterized("microdata", OpFlags::empty(), &["name"], 1, microdata);
    reg.direct("ld", OpFlags::empty(), ld);
}

fn css(b: &Bound<'_>) -> Result<Materialized> {
    let selector = compile_selector(b.str(0)?)?;
    Ok(transform(list_mapcat(move |v| Ok(Value::from(expect_node("css", v)?.select(&selector))))))
}

fn xpath(b: &Bound<'_>) -> Result<Materialized> {
    let vars = match b.get(1) {
        None => IndexMap::new(),
        Some(Arg::Map(map)) => map
            .iter()
            .map(|(k, v)| Ok((k.to_string(), xpath_literal(v)?)))
            .collect::<Result<IndexMap<_, _>>>()?,
        Some(other) => {
            return Err(Error::arity("xpath", format!("`vars` must be a mapping, got {}", other.kind_name())));
        }
    };
    let query = XPath::compile_with(b.str(0)?, &vars)?;
    Ok(transform(list_mapcat(move |v| Ok(Value::List(query.evaluate(expect_node("xpath", v)?))))))
}

fn xpath_literal(arg: &Arg) -> Result<String> {
    match arg {
        Arg::Str(s) => Ok(s.clone()),
        Arg::Int(i) => Ok(i.to_string()),
        Arg::Float(x) => Ok(x.to_string()),
        Arg::Bool(b) => Ok(b.to_string()),
        other => Err(Error::arity("xpath", format!("variable values must be scalars, got {}", other.kind_name()))),
    }
}

fn itemprop_selector(name: &str) -> String {
    let quoted = name.replace('\\', r"\\").replace('"', r#"\""#);
    format!(r#"[itemprop*="{quoted}"]"#)
}

fn itemscope(b: &Bound<'_>) -> Result<Materialized> {
    let selector = format!("[itemscope]{}", itemprop_selector(b.str(0)?));
    Ok(Materialized::Chain(Chain::new().call("css", Args::new().arg(selector))?))
}

fn itemprop(b: &Bound<'_>) -> Result<Materialized> {
    let selector = itemprop_selector(b.str(0)?);
    Ok(Materialized::Chain(Chain::new().call("css", Args::new().arg(selector))?))
}

/// `css([itemprop*=name]).map(attr("content") | inner_text)`
fn microdata(b: &Bound<'_>) -> Result<Materialized> {
    let content = Chain::new().call("attr", Args::new().arg("content"))? | Chain::new().op("inner_text")?;
    let chain = Chain::new()
        .call("css", Args::new().arg(itemprop_selector(b.str(0)?)))?
        .call("map", Args::new().arg(content))?;
    Ok(Materialized::Chain(chain))
}

/// Parse the first JSON-LD script under the input.
fn ld(value: &Value) -> Result<Value> {
    if !value.is_node_like() {
        return Err(Error::Type { op: "ld", expected: "a node or node list", found: value.kind_name() });
    }
    for node in value.nodes() {
        if let Some(script) = node.css(LD_JSON)?.first() {
            let json: serde_json::Value = serde_json::from_str(&script.inner_text())?;
            return Ok(Value::from_json(json));
        }
    }
    Ok(Value::Null)
}

#[cfg(test)]
mod tests {
    use crate::document::Document;
    use crate::engine::Args;
    use crate::ops::apply_operation;
    use crate::value::{Key, Value};

    const PRODUCT: &str = r#"<html><head>
        <script type="application/ld+json">{"@type": "Product", "name": "Lamp", "offers": {"price": 9.5}}</script>
    </head><body>
        <div itemscope itemprop="product">
            <span itemprop="name">Lamp</span>
            <meta itemprop="price" content="9.50">
            <ul><li>a</li><li id="x">b</li><li>c</li></ul>
        </div>
    </body></html>"#;

    fn root() -> Value {
        Value::Node(Document::parse(PRODUCT).root())
    }

    fn run(name: &str, args: Option<Args>, value: &Value) -> Value {
        apply_operation(name, args.as_ref(), value).unwrap()
    }

    #[test]
    fn css_maps_and_concatenates() {
        let lis = run("css", Some(Args::new().arg("li")), &root());
        assert_eq!(lis.as_list().map(<[Value]>::len), Some(3));

        let again = run("css", Some(Args::new().arg("li")), &lis);
        assert_eq!(again, lis);
    }

    #[test]
    fn navigation_is_mapped_over_lists() {
        let x = run("css", Some(Args::new().arg("#x")), &root());
        let prev = run("prev", None, &x);
        let next = run("next", None, &x);
        assert_eq!(run("text", None, &prev), Value::from("a"));
        assert_eq!(run("text", None, &next), Value::from("c"));
        let parent = run("parent", None, &x);
        assert_eq!(parent.nodes().first().map(|n| n.tag()).as_deref(), Some("ul"));
    }

    #[test]
    fn xpath_returns_nodes_and_strings() {
        let ids = run("xpath", Some(Args::new().arg("//li/@id")), &root());
        assert_eq!(ids, Value::List(vec![Value::from("x")]));

        let mut vars = indexmap::IndexMap::new();
        vars.insert(Key::from("id"), crate::engine::Arg::from("x"));
        let args = Args::new().arg("//li[@id=$id]").named("vars", crate::engine::Arg::Map(vars));
        let found = run("xpath", Some(args), &root());
        assert_eq!(run("text", None, &found), Value::from("b"));
    }

    #[test]
    fn microdata_prefers_content_attribute() {
        let price = run("microdata", Some(Args::new().arg("price")), &root());
        assert_eq!(price, Value::List(vec![Value::from("9.50")]));

        let name = run("microdata", Some(Args::new().arg("name")), &root());
        assert_eq!(name, Value::List(vec![Value::from("Lamp")]));
    }

    #[test]
    fn itemscope_requires_scope() {
        let scoped = run("itemscope", Some(Args::new().arg("product")), &root());
        assert_eq!(scoped.as_list().map(<[Value]>::len), Some(1));
        let none = run("itemscope", Some(Args::new().arg("price")), &root());
        assert_eq!(none, Value::List(vec![]));
    }

    #[test]
    fn itemprop_names_are_quoted() {
        let doc = Document::parse(r#"<p itemprop='say"hi'>quote</p><p itemprop="a\b">slash</p>"#);
        let root = Value::Node(doc.root());
        let quoted = run("itemprop", Some(Args::new().arg(r#"say"hi"#)), &root);
        assert_eq!(run("text", None, &quoted), Value::from("quote"));
        let slashed = run("itemprop", Some(Args::new().arg(r"a\b")), &root);
        assert_eq!(run("text", None, &slashed), Value::from("slash"));
    }

    #[test]
    fn ld_parses_embedded_json() {
        let Value::Map(data) = run("ld", None, &root()) else { panic!("expected mapping") };
        assert_eq!(data[&Key::from("name")], Value::from("Lamp"));
    }
}
