//! Tree collaborator: parsed HTML documents and node handles.
//!
//! Parsing is delegated to `scraper` (html5ever underneath). A [`Node`] is a
//! cheap handle made of a shared reference to the parsed document plus the
//! `ego_tree` id of an element, so nodes can be cloned into values, compared
//! and deduplicated without borrowing the tree.
//!
//! Navigation mirrors the classic element API: `text` is the text run that
//! follows the opening tag, `tail` is the text run that follows the closing
//! tag, `prev`/`next` skip text nodes and return sibling elements.

use crate::error::{Error, Result};
use ego_tree::{NodeId, NodeRef};
use scraper::{ElementRef, Html, Selector};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// A parsed HTML document.
#[derive(Debug, Clone)]
pub struct Document {
    html: Rc<Html>,
}

impl Document {
    /// Parse a full HTML document.
    pub fn parse(source: &str) -> Self {
        Document { html: Rc::new(Html::parse_document(source)) }
    }

    /// Parse an HTML fragment (no implied `<head>`/`<body>`).
    pub fn parse_fragment(source: &str) -> Self {
        Document { html: Rc::new(Html::parse_fragment(source)) }
    }

    /// The root element (`<html>`).
    pub fn root(&self) -> Node {
        Node { doc: Rc::clone(&self.html), id: self.html.root_element().id() }
    }

    /// Top-level elements of a fragment, in document order.
    ///
    /// For `"<li>A</li><li>B</li>"` this yields the two `<li>` nodes.
    pub fn top_level(&self) -> Vec<Node> {
        self.html
            .root_element()
            .children()
            .filter_map(ElementRef::wrap)
            .map(|el| Node { doc: Rc::clone(&self.html), id: el.id() })
            .collect()
    }

    /// Convenience: parse a fragment and return its top-level elements.
    pub fn fragment_nodes(source: &str) -> Vec<Node> {
        Self::parse_fragment(source).top_level()
    }
}

/// Handle to one element of a parsed document.
#[derive(Clone)]
pub struct Node {
    doc: Rc<Html>,
    id: NodeId,
}

impl Node {
    fn node_ref(&self) -> NodeRef<'_, scraper::Node> {
        // Ids are only ever taken from this same tree, which is never mutated.
        self.doc.tree.get(self.id).expect("node id belongs to its document")
    }

    fn element(&self) -> ElementRef<'_> {
        ElementRef::wrap(self.node_ref()).expect("node handles always point at elements")
    }

    fn handle(&self, node: NodeRef<'_, scraper::Node>) -> Option<Node> {
        ElementRef::wrap(node).map(|el| Node { doc: Rc::clone(&self.doc), id: el.id() })
    }

    /// Lowercased tag name.
    pub fn tag(&self) -> String {
        self.element().value().name().to_string()
    }

    /// Elements matching `selector` among this element and its descendants,
    /// in document order.
    pub fn select(&self, selector: &Selector) -> Vec<Node> {
        self.node_ref()
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|el| selector.matches(el))
            .map(|el| Node { doc: Rc::clone(&self.doc), id: el.id() })
            .collect()
    }

    /// Parse `selector` and [`select`](Self::select) with it.
    pub fn css(&self, selector: &str) -> Result<Vec<Node>> {
        let compiled = compile_selector(selector)?;
        Ok(self.select(&compiled))
    }

    /// Evaluate an XPath query with this element as the context node.
    pub fn xpath(&self, query: &str) -> Result<Vec<crate::value::Value>> {
        Ok(crate::xpath::XPath::compile(query)?.evaluate(self))
    }

    pub fn parent(&self) -> Option<Node> {
        self.node_ref().parent().and_then(|p| self.handle(p))
    }

    pub fn prev(&self) -> Option<Node> {
        self.node_ref().prev_siblings().find_map(|s| self.handle(s))
    }

    pub fn next(&self) -> Option<Node> {
        self.node_ref().next_siblings().find_map(|s| self.handle(s))
    }

    /// Text directly after the opening tag, before the first child element.
    pub fn text(&self) -> Option<String> {
        text_run(self.node_ref().first_child())
    }

    /// Text directly after the closing tag, before the next sibling element.
    pub fn tail(&self) -> Option<String> {
        text_run(self.node_ref().next_sibling())
    }

    pub fn attr(&self, name: &str) -> Option<String> {
        self.element().value().attr(name).map(str::to_owned)
    }

    /// Concatenated text of the element and all its descendants.
    pub fn inner_text(&self) -> String {
        self.element().text().collect()
    }

    pub fn inner_html(&self) -> String {
        self.element().inner_html()
    }

    pub fn outer_html(&self) -> String {
        self.element().html()
    }

    /// The underlying tree id, used by the XPath evaluator.
    pub(crate) fn id(&self) -> NodeId {
        self.id
    }

    pub(crate) fn document(&self) -> &Rc<Html> {
        &self.doc
    }

    pub(crate) fn from_parts(doc: Rc<Html>, id: NodeId) -> Self {
        Node { doc, id }
    }
}

/// Collect consecutive text nodes starting at `node`.
fn text_run(mut node: Option<NodeRef<'_, scraper::Node>>) -> Option<String> {
    let mut out: Option<String> = None;
    while let Some(current) = node {
        match current.value().as_text() {
            Some(text) => out.get_or_insert_with(String::new).push_str(text),
            None => break,
        }
        node = current.next_sibling();
    }
    out
}

pub(crate) fn compile_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|err| Error::Selector { selector: selector.to_string(), message: format!("{err:?}") })
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.doc, &other.doc) && self.id == other.id
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.doc) as usize).hash(state);
        self.id.hash(state);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Node {}>", self.tag())
    }
}
