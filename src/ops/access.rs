//! Reading text, attributes and markup off elements.

use super::adapters::{expect_list, expect_node, list_first, transform};
use super::registry::{Bound, OpFlags, Registry};
use crate::document::Document;
use crate::engine::Materialized;
use crate::error::{Error, Result};
use crate::value::Value;

pub(super) fn register(reg: &mut Registry) {
    reg.direct("text", OpFlags::LIST_AWARE, list_first(|v| Ok(Value::from(expect_node("text", v)?.text()))));
    reg.direct("texts", OpFlags::empty(), texts);
    reg.direct("tail", OpFlags::LIST_AWARE, list_first(|v| Ok(Value::from(expect_node("tail", v)?.tail()))));
    reg.parameterized("attr", OpFlags::LIST_AWARE, &["name"], 1, attr);
    reg.parameterized("attrs", OpFlags::empty(), &["name"], 1, attrs);
    reg.direct("head", OpFlags::LIST_AWARE, list_first(head));

    reg.direct(
        "inner_text",
        OpFlags::LIST_AWARE,
        list_first(|v| Ok(Value::from(expect_node("inner_text", v)?.inner_text()))),
    );
    reg.direct(
        "inner_html",
        OpFlags::LIST_AWARE,
        list_first(|v| Ok(Value::from(expect_node("inner_html", v)?.inner_html()))),
    );
    reg.direct(
        "outer_html",
        OpFlags::LIST_AWARE,
        list_first(|v| Ok(Value::from(expect_node("outer_html", v)?.outer_html()))),
    );
    reg.direct("html_to_text", OpFlags::LIST_AWARE, list_first(html_to_text));
}

fn texts(value: &Value) -> Result<Value> {
    expect_list("texts", value)?
        .iter()
        .map(|item| Ok(Value::from(expect_node("texts", item)?.text())))
        .collect::<Result<Vec<_>>>()
        .map(Value::List)
}

fn attr(b: &Bound<'_>) -> Result<Materialized> {
    let name = b.str(0)?.to_string();
    Ok(transform(list_first(move |v| Ok(Value::from(expect_node("attr", v)?.attr(&name))))))
}

fn attrs(b: &Bound<'_>) -> Result<Materialized> {
    let name = b.str(0)?.to_string();
    Ok(transform(move |v| {
        expect_list("attrs", v)?
            .iter()
            .map(|item| Ok(Value::from(expect_node("attrs", item)?.attr(&name))))
            .collect::<Result<Vec<_>>>()
            .map(Value::List)
    }))
}

/// Text right before the element: the previous sibling's tail, or the
/// parent's leading text when the element comes first.
fn head(value: &Value) -> Result<Value> {
    let node = expect_node("head", value)?;
    let text = match node.prev() {
        Some(prev) => prev.tail(),
        None => node.parent().and_then(|parent| parent.text()),
    };
    Ok(Value::from(text))
}

/// Strip markup, keeping line breaks for `<br>`, `</li>` and paragraphs.
fn html_to_text(value: &Value) -> Result<Value> {
    let html = match value {
        Value::Node(node) => node.inner_html(),
        Value::Str(s) => s.clone(),
        other => return Err(Error::Type { op: "html_to_text", expected: "a node or markup", found: other.kind_name() }),
    };

    let html = crate::regex!(r"\s+").replace_all(&html, " ");
    let html = crate::regex!(r"(?i)<br[^>]*>|</li>").replace_all(html.trim(), "\n");
    let html = crate::regex!(r"(?i)</p>").replace_all(&html, "\n\n");
    if html.trim().is_empty() {
        return Ok(Value::from(""));
    }
    Ok(Value::from(Document::parse_fragment(&html).root().inner_text()))
}
