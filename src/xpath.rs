//! A small XPath 1.0 subset evaluated directly on the parsed tree.
//!
//! Supported:
//!
//! ```text
//! paths       /a/b   //a   a/b   .//a   /
//! steps       name  *  .  ..  node()  text()  @name  @*
//! predicates  [2]  [last()]  [@id]  [@id='x']  [@id!='x']  [text()='x']
//!             [name]  [name='x']  [contains(@class, 'x')]
//!             [starts-with(text(), 'x')]  [not(...)]  [a and b]  [a or b]
//! variables   $name, bound when the query is compiled
//! ```
//!
//! `//step` expands to descendant-or-self followed by the child step, so
//! positional predicates count per parent exactly like XPath does. Element
//! results come back as nodes, attribute and text results as strings.

use crate::document::Node;
use crate::error::{Error, Result};
use crate::value::Value;
use ego_tree::{NodeId, NodeRef, Tree};
use indexmap::IndexMap;
use nom::IResult;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_while, take_while1};
use nom::character::complete::{char, digit1, multispace0};
use nom::combinator::{all_consuming, map, map_res, opt, recognize, value};
use nom::multi::many0;
use nom::sequence::{delimited, pair, preceded, tuple};
use std::collections::HashMap;
use std::rc::Rc;

/// A compiled query.
#[derive(Debug, Clone)]
pub struct XPath {
    query: String,
    path: Path,
}

#[derive(Debug, Clone, PartialEq)]
struct Path {
    absolute: bool,
    steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
struct Step {
    descend: bool,
    test: Test,
    predicates: Vec<Predicate>,
}

#[derive(Debug, Clone, PartialEq)]
enum Test {
    Name(String),
    AnyElement,
    Node,
    Text,
    SelfNode,
    Parent,
    Attr(String),
    AnyAttr,
}

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    Position(usize),
    Last,
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare { left: Operand, op: CmpOp, right: Operand },
    Contains(Operand, Operand),
    StartsWith(Operand, Operand),
    Exists(Operand),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CmpOp {
    Eq,
    Ne,
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Attr(String),
    Text,
    Child(String),
    Context,
    Literal(String),
    Var(String),
}

impl XPath {
    pub fn compile(query: &str) -> Result<XPath> {
        Self::compile_with(query, &IndexMap::new())
    }

    /// Compile `query`, substituting `$name` references from `vars`.
    pub fn compile_with(query: &str, vars: &IndexMap<String, String>) -> Result<XPath> {
        let parsed = all_consuming(delimited(multispace0, path, multispace0))(query);
        let mut path = match parsed {
            Ok((_, path)) => path,
            Err(nom::Err::Error(e) | nom::Err::Failure(e)) => {
                return Err(Error::XPath {
                    query: query.to_string(),
                    offset: query.len() - e.input.len(),
                    message: "unexpected input".to_string(),
                });
            }
            Err(nom::Err::Incomplete(_)) => {
                return Err(Error::XPath {
                    query: query.to_string(),
                    offset: query.len(),
                    message: "unexpected end of query".to_string(),
                });
            }
        };
        bind_vars(&mut path, vars).map_err(|name| Error::XPath {
            query: query.to_string(),
            offset: query.find(&format!("${name}")).unwrap_or(0),
            message: format!("unbound variable ${name}"),
        })?;
        Ok(XPath { query: query.to_string(), path })
    }

    pub fn as_str(&self) -> &str {
        &self.query
    }

    /// Run the query with `context` as the context node.
    pub fn evaluate(&self, context: &Node) -> Vec<Value> {
        let doc = context.document();
        let tree = &doc.tree;
        let start = if self.path.absolute { tree.root().id() } else { context.id() };
        let mut items = vec![Item::Tree(start)];

        for step in &self.path.steps {
            let contexts = if step.descend { descendants_or_self(tree, &items) } else { items };
            let mut next = Vec::new();
            for ctx in contexts {
                let Item::Tree(id) = ctx else { continue };
                let Some(node) = tree.get(id) else { continue };
                let mut candidates = candidates(node, &step.test);
                for predicate in &step.predicates {
                    candidates = filter(tree, candidates, predicate);
                }
                next.extend(candidates);
            }
            items = document_order(tree, next);
        }

        items.into_iter().filter_map(|item| to_value(doc, item)).collect()
    }
}

// --- Parsing -------------------------------------------------------------------

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn name(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ':')),
    ))(input)
}

fn string_literal(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('\''), take_while(|c| c != '\''), char('\'')),
        delimited(char('"'), take_while(|c| c != '"'), char('"')),
    ))(input)
}

fn number_literal(input: &str) -> IResult<&str, &str> {
    recognize(tuple((opt(char('-')), digit1, opt(pair(char('.'), digit1)))))(input)
}

/// `/` or `//`; true for the descendant form.
fn separator(input: &str) -> IResult<&str, bool> {
    alt((value(true, tag("//")), value(false, tag("/"))))(input)
}

fn node_test(input: &str) -> IResult<&str, Test> {
    alt((
        value(Test::Parent, tag("..")),
        value(Test::SelfNode, char('.')),
        value(Test::Text, tag("text()")),
        value(Test::Node, tag("node()")),
        value(Test::AnyElement, char('*')),
        value(Test::AnyAttr, tag("@*")),
        map(preceded(char('@'), name), |n| Test::Attr(n.to_ascii_lowercase())),
        map(name, |n| Test::Name(n.to_ascii_lowercase())),
    ))(input)
}

fn step(input: &str) -> IResult<&str, Step> {
    map(pair(node_test, many0(predicate)), |(test, predicates)| Step { descend: false, test, predicates })(input)
}

fn path(input: &str) -> IResult<&str, Path> {
    let (input, lead) = opt(separator)(input)?;
    let absolute = lead.is_some();
    let (mut input, first) = match lead {
        Some(_) => opt(step)(input)?,
        None => map(step, Some)(input)?,
    };

    let mut steps = Vec::new();
    match first {
        Some(first) => steps.push(Step { descend: lead == Some(true), ..first }),
        None => return Ok((input, Path { absolute, steps })),
    }

    loop {
        match separator(input) {
            Ok((rest, descend)) => {
                let (rest, next) = step(rest)?;
                steps.push(Step { descend, ..next });
                input = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }
    Ok((input, Path { absolute, steps }))
}

fn predicate(input: &str) -> IResult<&str, Predicate> {
    delimited(
        ws(char('[')),
        alt((
            value(Predicate::Last, ws(tag("last()"))),
            map(ws(map_res(digit1, str::parse::<usize>)), Predicate::Position),
            map(or_expr, Predicate::Expr),
        )),
        ws(char(']')),
    )(input)
}

fn or_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = and_expr(input)?;
    let (input, rest) = many0(preceded(ws(tag("or")), and_expr))(input)?;
    Ok((input, rest.into_iter().fold(first, |acc, e| Expr::Or(Box::new(acc), Box::new(e)))))
}

fn and_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = primary(input)?;
    let (input, rest) = many0(preceded(ws(tag("and")), primary))(input)?;
    Ok((input, rest.into_iter().fold(first, |acc, e| Expr::And(Box::new(acc), Box::new(e)))))
}

fn call2(name: &'static str) -> impl FnMut(&str) -> IResult<&str, (Operand, Operand)> {
    move |input| {
        let (input, (_, _, a, _, b, _)) =
            tuple((ws(tag(name)), ws(char('(')), operand, ws(char(',')), operand, ws(char(')'))))(input)?;
        Ok((input, (a, b)))
    }
}

fn primary(input: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(ws(tag("not")), delimited(ws(char('(')), or_expr, ws(char(')')))), |e| Expr::Not(Box::new(e))),
        map(call2("contains"), |(a, b)| Expr::Contains(a, b)),
        map(call2("starts-with"), |(a, b)| Expr::StartsWith(a, b)),
        delimited(ws(char('(')), or_expr, ws(char(')'))),
        map(pair(operand, opt(pair(ws(cmp_op), operand))), |(left, right)| match right {
            Some((op, right)) => Expr::Compare { left, op, right },
            None => Expr::Exists(left),
        }),
    ))(input)
}

fn cmp_op(input: &str) -> IResult<&str, CmpOp> {
    alt((value(CmpOp::Ne, tag("!=")), value(CmpOp::Eq, char('='))))(input)
}

fn operand(input: &str) -> IResult<&str, Operand> {
    ws(alt((
        map(preceded(char('@'), name), |n| Operand::Attr(n.to_ascii_lowercase())),
        value(Operand::Text, tag("text()")),
        value(Operand::Context, char('.')),
        map(string_literal, |s| Operand::Literal(s.to_string())),
        map(number_literal, |s| Operand::Literal(s.to_string())),
        map(preceded(char('$'), name), |n| Operand::Var(n.to_string())),
        map(name, |n| Operand::Child(n.to_ascii_lowercase())),
    )))(input)
}

/// Replace `$name` operands with literals; `Err` carries the first unbound name.
fn bind_vars(path: &mut Path, vars: &IndexMap<String, String>) -> std::result::Result<(), String> {
    fn operand(op: &mut Operand, vars: &IndexMap<String, String>) -> std::result::Result<(), String> {
        if let Operand::Var(name) = op {
            let bound = vars.get(name.as_str()).ok_or_else(|| name.clone())?;
            *op = Operand::Literal(bound.clone());
        }
        Ok(())
    }

    fn expr(e: &mut Expr, vars: &IndexMap<String, String>) -> std::result::Result<(), String> {
        match e {
            Expr::Or(a, b) | Expr::And(a, b) => {
                expr(a, vars)?;
                expr(b, vars)
            }
            Expr::Not(inner) => expr(inner, vars),
            Expr::Compare { left, right, .. } => {
                operand(left, vars)?;
                operand(right, vars)
            }
            Expr::Contains(a, b) | Expr::StartsWith(a, b) => {
                operand(a, vars)?;
                operand(b, vars)
            }
            Expr::Exists(op) => operand(op, vars),
        }
    }

    for step in &mut path.steps {
        for predicate in &mut step.predicates {
            if let Predicate::Expr(e) = predicate {
                expr(e, vars)?;
            }
        }
    }
    Ok(())
}

// --- Evaluation ----------------------------------------------------------------

type HtmlTree = Tree<scraper::Node>;
type TreeRef<'a> = NodeRef<'a, scraper::Node>;

#[derive(Debug, Clone)]
enum Item {
    Tree(NodeId),
    Attr(String),
}

fn descendants_or_self(tree: &HtmlTree, items: &[Item]) -> Vec<Item> {
    let mut out = Vec::new();
    for item in items {
        if let Item::Tree(id) = item {
            if let Some(node) = tree.get(*id) {
                out.extend(node.descendants().map(|d| Item::Tree(d.id())));
            }
        }
    }
    document_order(tree, out)
}

fn tree_items<'a>(nodes: impl Iterator<Item = TreeRef<'a>>) -> Vec<Item> {
    nodes.map(|n| Item::Tree(n.id())).collect()
}

fn candidates(node: TreeRef<'_>, test: &Test) -> Vec<Item> {
    match test {
        Test::Name(name) => {
            tree_items(node.children().filter(|c| c.value().as_element().is_some_and(|el| el.name() == name.as_str())))
        }
        Test::AnyElement => tree_items(node.children().filter(|c| c.value().is_element())),
        Test::Node => tree_items(node.children().filter(|c| c.value().is_element() || c.value().is_text())),
        Test::Text => tree_items(node.children().filter(|c| c.value().is_text())),
        Test::SelfNode => vec![Item::Tree(node.id())],
        Test::Parent => node.parent().map(|p| Item::Tree(p.id())).into_iter().collect(),
        Test::Attr(name) => node
            .value()
            .as_element()
            .and_then(|el| el.attr(name))
            .map(|v| Item::Attr(v.to_string()))
            .into_iter()
            .collect(),
        Test::AnyAttr => node
            .value()
            .as_element()
            .map(|el| el.attrs().map(|(_, v)| Item::Attr(v.to_string())).collect())
            .unwrap_or_default(),
    }
}

fn filter(tree: &HtmlTree, items: Vec<Item>, predicate: &Predicate) -> Vec<Item> {
    let len = items.len();
    items
        .into_iter()
        .enumerate()
        .filter(|(i, item)| match predicate {
            Predicate::Position(n) => i + 1 == *n,
            Predicate::Last => i + 1 == len,
            Predicate::Expr(e) => holds(tree, item, e),
        })
        .map(|(_, item)| item)
        .collect()
}

fn holds(tree: &HtmlTree, item: &Item, e: &Expr) -> bool {
    match e {
        Expr::Or(a, b) => holds(tree, item, a) || holds(tree, item, b),
        Expr::And(a, b) => holds(tree, item, a) && holds(tree, item, b),
        Expr::Not(inner) => !holds(tree, item, inner),
        Expr::Exists(Operand::Literal(s)) => !s.is_empty(),
        Expr::Exists(op) => !strings(tree, item, op).is_empty(),
        Expr::Compare { left, op, right } => {
            let (left, right) = (strings(tree, item, left), strings(tree, item, right));
            left.iter().any(|l| {
                right.iter().any(|r| match op {
                    CmpOp::Eq => l == r,
                    CmpOp::Ne => l != r,
                })
            })
        }
        Expr::Contains(a, b) => first_string(tree, item, a).contains(first_string(tree, item, b).as_str()),
        Expr::StartsWith(a, b) => first_string(tree, item, a).starts_with(first_string(tree, item, b).as_str()),
    }
}

fn first_string(tree: &HtmlTree, item: &Item, op: &Operand) -> String {
    strings(tree, item, op).into_iter().next().unwrap_or_default()
}

fn strings(tree: &HtmlTree, item: &Item, op: &Operand) -> Vec<String> {
    if let Operand::Literal(s) = op {
        return vec![s.clone()];
    }
    let node = match item {
        Item::Tree(id) => tree.get(*id),
        Item::Attr(s) => return if matches!(op, Operand::Context) { vec![s.clone()] } else { Vec::new() },
    };
    let Some(node) = node else { return Vec::new() };

    match op {
        Operand::Attr(name) => {
            node.value().as_element().and_then(|el| el.attr(name)).map(str::to_owned).into_iter().collect()
        }
        Operand::Text => node.children().filter_map(|c| c.value().as_text().map(|t| t.to_string())).collect(),
        Operand::Child(name) => node
            .children()
            .filter(|c| c.value().as_element().is_some_and(|el| el.name() == name.as_str()))
            .map(string_value)
            .collect(),
        Operand::Context => vec![string_value(node)],
        Operand::Literal(_) | Operand::Var(_) => Vec::new(),
    }
}

fn string_value(node: TreeRef<'_>) -> String {
    node.descendants().filter_map(|d| d.value().as_text().map(|t| t.to_string())).collect()
}

/// Deduplicate tree items and sort them in document order. Attribute values
/// are left in the order they were produced.
fn document_order(tree: &HtmlTree, items: Vec<Item>) -> Vec<Item> {
    if items.len() < 2 || items.iter().any(|item| matches!(item, Item::Attr(_))) {
        return items;
    }
    let order: HashMap<NodeId, usize> = tree.root().descendants().enumerate().map(|(i, n)| (n.id(), i)).collect();
    let mut ids: Vec<NodeId> = items
        .into_iter()
        .filter_map(|item| match item {
            Item::Tree(id) => Some(id),
            Item::Attr(_) => None,
        })
        .collect();
    ids.sort_by_key(|id| order.get(id).copied().unwrap_or(usize::MAX));
    ids.dedup();
    ids.into_iter().map(Item::Tree).collect()
}

fn to_value(doc: &Rc<scraper::Html>, item: Item) -> Option<Value> {
    match item {
        Item::Attr(s) => Some(Value::Str(s)),
        Item::Tree(id) => {
            let node = doc.tree.get(id)?;
            match node.value() {
                scraper::Node::Element(_) => Some(Value::Node(Node::from_parts(Rc::clone(doc), id))),
                scraper::Node::Text(text) => Some(Value::Str(text.to_string())),
                scraper::Node::Document | scraper::Node::Fragment => {
                    Some(Value::Node(Node::from_parts(Rc::clone(doc), doc.root_element().id())))
                }
                _ => None,
            }
        }
    }
}
