use super::*;
use crate::document::Document;
use crate::error::Error;
use crate::value::{Key, Value};
use indexmap::IndexMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

const TWO_ITEMS: &str = "<li>A</li><li>B</li>";

/// A func that counts its calls and passes the value through.
fn spy(name: &'static str) -> (Func, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let func = Func::new(name, move |v: &Value| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(v.clone())
    });
    (func, calls)
}

fn chain(expr: &str) -> Chain {
    Chain::parse(expr).unwrap()
}

fn items() -> Value {
    Value::from(Document::fragment_nodes(TWO_ITEMS))
}

fn strs(xs: &[&str]) -> Value {
    Value::List(xs.iter().map(|s| Value::from(*s)).collect())
}

// --- Evaluation --------------------------------------------------------------

#[test]
fn null_stops_the_chain() {
    let (after, calls) = spy("after");
    let c = chain("css('li').get.attr('missing')") + after + chain("len");

    let single = Value::from(Document::fragment_nodes("<li>A</li>"));
    assert_eq!(c.apply(single).unwrap(), Value::Null);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let (first, first_calls) = spy("first");
    assert_eq!(Chain::from(first).apply(Value::Null).unwrap(), Value::Null);
    assert_eq!(first_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn multi_preserves_shape_and_order() {
    let list = chain("multi([C.first, C.len, 'k'])");
    assert_eq!(
        list.apply(strs(&["x", "y"])).unwrap(),
        Value::List(vec![Value::from("x"), Value::Int(2), Value::from("k")])
    );

    let map = chain("multi({'z': C.last, 'a': C.first})");
    let Value::Map(out) = map.apply(strs(&["x", "y"])).unwrap() else { panic!("expected mapping") };
    let keys: Vec<String> = out.keys().map(Key::to_string).collect();
    assert_eq!(keys, vec!["z", "a"]);
    assert_eq!(out[&Key::from("z")], Value::from("y"));
    assert_eq!(out[&Key::from("a")], Value::from("x"));
}

#[test]
fn alternation_short_circuits() {
    let (right, calls) = spy("right");
    let c = chain("first") | Chain::from(right);

    assert_eq!(c.apply(strs(&["x"])).unwrap(), Value::from("x"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let fallback = chain("first | const('none')");
    assert_eq!(fallback.apply(strs(&[])).unwrap(), Value::from("none"));

    let (again, calls) = spy("again");
    let c = chain("second") | Chain::from(again);
    assert_eq!(c.apply(strs(&["x"])).unwrap(), strs(&["x"]));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn sequencing_is_associative() {
    let (c1, c2, c3) = (chain("css('li')"), chain("texts"), chain("len"));
    let left = (c1.clone() + c2.clone()) + c3.clone();
    let right = c1 + (c2 + c3);

    assert_eq!(left, right);
    assert_eq!(left.apply(items()).unwrap(), right.apply(items()).unwrap());
    assert_eq!(left.apply(items()).unwrap(), Value::Int(2));
}

#[test]
fn failures_are_wrapped_once_per_level() {
    let c = chain("multi([C.css('li').get.text])");
    let err = c.apply(items()).unwrap_err();

    let Error::Evaluation { link, chain: outer, source, .. } = &err else { panic!("expected evaluation error") };
    assert!(link.starts_with("multi("));
    assert_eq!(outer, &c.to_string());

    let Error::Evaluation { link, chain: inner, .. } = source.as_ref() else { panic!("expected nested wrapper") };
    assert_eq!(link, "get");
    assert_eq!(inner, r#"C.css("li").get.text"#);
    assert!(matches!(err.root_cause(), Error::SelectionCardinality { found: 2, .. }));
}

// --- The <li> examples -------------------------------------------------------

#[test]
fn list_items_end_to_end() {
    assert_eq!(chain("css('li').map(text)").apply(items()).unwrap(), strs(&["A", "B"]));

    let single = Value::from(Document::fragment_nodes("<li>A</li>"));
    assert_eq!(chain("css('li').get.text").apply(single).unwrap(), Value::from("A"));

    let err = chain("css('li').get.text").apply(items()).unwrap_err();
    let Error::SelectionCardinality { found, preview } = err.root_cause() else {
        panic!("expected cardinality error, got {err}")
    };
    assert_eq!(*found, 2);
    assert_eq!(preview, "[<li>A</li>, <li>B</li>]");
}

#[test]
fn get_on_empty_selection() {
    let err = chain("css('p').get").apply(items()).unwrap_err();
    assert!(matches!(err.root_cause(), Error::SelectionCardinality { found: 0, .. }));
}

// --- Provenance --------------------------------------------------------------

#[test]
fn provenance_stops_before_scalar_links() {
    let ul = Document::fragment_nodes("<ul><li>A</li><li>B</li></ul>").remove(0);
    let lis = ul.css("li").unwrap();

    let navigation = chain("css('li')");
    let Provenance::Leaf(nodes) = provenance(&Value::Node(ul.clone()), &navigation).unwrap() else {
        panic!("expected leaf")
    };
    assert_eq!(nodes, navigation.apply(Value::Node(ul.clone())).unwrap());

    let with_text = chain("css('li').texts.first");
    let Provenance::Leaf(nodes) = provenance(&Value::Node(ul.clone()), &with_text).unwrap() else {
        panic!("expected leaf")
    };
    assert_eq!(nodes, Value::from(lis.clone()));

    let up = chain("css('li').parent");
    let Provenance::Leaf(nodes) = provenance(&Value::from(lis), &up).unwrap() else { panic!("expected leaf") };
    assert_eq!(nodes, Value::List(vec![Value::Node(ul.clone()), Value::Node(ul)]));
}

#[test]
fn provenance_follows_branches_and_alternatives() {
    let page = Document::fragment_nodes(r#"<div><h1>T</h1><p class="a">x</p><p class="b">y</p></div>"#).remove(0);
    let root = Value::Node(page.clone());
    let c = chain("multi({'title': C.css('h1').text, 'body': C.css('.a') | C.css('.b'), 'fixed': C.const(1), 'lit': 2})");

    let flat = flat_provenance(&root, &c).unwrap();
    let keys: Vec<&str> = flat.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["title", "body", "fixed", "lit"]);

    let h1 = page.css("h1").unwrap();
    assert_eq!(flat["title"], Value::from(h1));

    let ps = page.css("p").unwrap();
    assert_eq!(flat["body"], Value::from(ps));
    assert_eq!(flat["fixed"], Value::List(vec![]));
    assert_eq!(flat["lit"], Value::List(vec![]));
}

#[test]
fn provenance_inlines_subchain_operations() {
    let doc = Document::fragment_nodes(r#"<div itemscope><span itemprop="name">Lamp</span></div>"#).remove(0);
    let c = chain("itemprop('name').inner_text");
    let Provenance::Leaf(nodes) = provenance(&Value::Node(doc.clone()), &c).unwrap() else {
        panic!("expected leaf")
    };
    assert_eq!(nodes, Value::from(doc.css("span").unwrap()));
}

#[test]
fn flattening_is_injective_and_reconstructs_paths() {
    let doc = Document::fragment_nodes("<div><a>1</a><b>2</b></div>").remove(0);
    let c = chain("multi({'outer': C.multi({'a': C.css('a'), 'b': C.css('b')}), 'list': C.multi([C.css('a'), C.css('b')])})");
    let prov = provenance(&Value::Node(doc), &c).unwrap();

    let flat = prov.flatten("/");
    let keys: Vec<&str> = flat.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["outer/a", "outer/b", "list/0", "list/1"]);

    let Provenance::Branches(top) = &prov else { panic!("expected branches") };
    for (path, nodes) in &flat {
        let mut parts = path.split('/');
        let Some(Provenance::Branches(level)) = parts.next().and_then(|k| top.get(&Key::from(k))) else {
            panic!("missing top-level key in {path}")
        };
        let child = parts.next().unwrap();
        let key = child.parse::<usize>().map(Key::Index).unwrap_or_else(|_| Key::from(child));
        assert_eq!(level.get(&key), Some(&Provenance::Leaf(nodes.clone())));
    }
}

#[test]
fn flatten_of_plain_chain_uses_empty_path() {
    let nodes = items();
    let mut expected = IndexMap::new();
    expected.insert(String::new(), nodes.clone());
    assert_eq!(flat_provenance(&nodes, &Chain::new()).unwrap(), expected);
}

#[test]
fn provenance_reports_link_failures() {
    let err = provenance(&items(), &chain("css('li').xpath('//[')")).unwrap_err();
    assert!(matches!(err, Error::Evaluation { .. }));
    assert!(matches!(err.root_cause(), Error::XPath { .. }));
}
