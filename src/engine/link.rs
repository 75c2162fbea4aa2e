//! Links: one operation bound to its construction arguments.
//!
//! A [`Link`] is immutable once its arguments are fixed. Parameterized
//! operations start out `Pending` when appended by name, and the next
//! `with_args` call rebuilds the link with the arguments filled in.
//!
//! Materializing a link yields either a plain transform or, for operations
//! that are defined in terms of other operations (`itemprop`, `microdata`,
//! ...), a sub-chain. The introspection engine relies on that distinction to
//! look inside such links.

use super::chain::Chain;
use crate::error::{Error, Result};
use crate::ops::{Operation, Transform, registry};
use crate::value::{Key, Value};
use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// An externally supplied unary callable, usable anywhere a chain is.
#[derive(Clone)]
pub struct Func {
    name: Cow<'static, str>,
    f: Transform,
}

impl Func {
    pub fn new<F>(name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    {
        Func { name: name.into(), f: Arc::new(f) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, value: &Value) -> Result<Value> {
        (self.f)(value)
    }
}

impl fmt::Debug for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Func {}>", self.name)
    }
}

/// A construction argument.
#[derive(Debug, Clone)]
pub enum Arg {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Chain(Chain),
    Func(Func),
    List(Vec<Arg>),
    Map(IndexMap<Key, Arg>),
}

impl Arg {
    /// Chains and funcs are applied to the input; everything else is a literal.
    pub fn is_callable(&self) -> bool {
        matches!(self, Arg::Chain(_) | Arg::Func(_))
    }

    /// Apply a callable argument, or pass a literal through unchanged.
    pub fn apply(&self, value: &Value) -> Result<Value> {
        match self {
            Arg::Chain(chain) => chain.apply(value.clone()),
            Arg::Func(func) => func.call(value),
            literal => literal.to_value(),
        }
    }

    /// Literal conversion. Callables nested inside a literal list or mapping
    /// have no value of their own and are rejected.
    pub fn to_value(&self) -> Result<Value> {
        Ok(match self {
            Arg::Null => Value::Null,
            Arg::Bool(b) => Value::Bool(*b),
            Arg::Int(i) => Value::Int(*i),
            Arg::Float(x) => Value::Float(*x),
            Arg::Str(s) => Value::Str(s.clone()),
            Arg::List(items) => Value::List(items.iter().map(Arg::to_value).collect::<Result<_>>()?),
            Arg::Map(map) => {
                Value::Map(map.iter().map(|(k, v)| Ok((k.clone(), v.to_value()?))).collect::<Result<_>>()?)
            }
            Arg::Chain(_) | Arg::Func(_) => {
                return Err(Error::arity("literal", format!("{self} is callable and has no literal value")));
            }
        })
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Arg::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Arg::Null => "null",
            Arg::Bool(_) => "bool",
            Arg::Int(_) => "int",
            Arg::Float(_) => "float",
            Arg::Str(_) => "string",
            Arg::Chain(_) => "chain",
            Arg::Func(_) => "func",
            Arg::List(_) => "list",
            Arg::Map(_) => "mapping",
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Null => f.write_str("null"),
            Arg::Bool(b) => write!(f, "{b}"),
            Arg::Int(i) => write!(f, "{i}"),
            Arg::Float(x) => write!(f, "{x:?}"),
            Arg::Str(s) => write!(f, "{s:?}"),
            Arg::Chain(chain) => write!(f, "{chain}"),
            Arg::Func(func) => f.write_str(func.name()),
            Arg::List(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Arg::Map(map) => {
                let parts: Vec<String> = map
                    .iter()
                    .map(|(k, v)| match k {
                        Key::Index(i) => format!("{i}: {v}"),
                        Key::Name(name) => format!("{name:?}: {v}"),
                    })
                    .collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Str(s.to_string())
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::Str(s)
    }
}

impl From<i32> for Arg {
    fn from(i: i32) -> Self {
        Arg::Int(i64::from(i))
    }
}

impl From<i64> for Arg {
    fn from(i: i64) -> Self {
        Arg::Int(i)
    }
}

impl From<usize> for Arg {
    fn from(i: usize) -> Self {
        Arg::Int(i as i64)
    }
}

impl From<f64> for Arg {
    fn from(x: f64) -> Self {
        Arg::Float(x)
    }
}

impl From<bool> for Arg {
    fn from(b: bool) -> Self {
        Arg::Bool(b)
    }
}

impl From<Chain> for Arg {
    fn from(chain: Chain) -> Self {
        Arg::Chain(chain)
    }
}

impl From<Func> for Arg {
    fn from(func: Func) -> Self {
        Arg::Func(func)
    }
}

impl<T: Into<Arg>> From<Vec<T>> for Arg {
    fn from(items: Vec<T>) -> Self {
        Arg::List(items.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<Key>, T: Into<Arg>> From<IndexMap<K, T>> for Arg {
    fn from(map: IndexMap<K, T>) -> Self {
        Arg::Map(map.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<T: Into<Arg>> From<Option<T>> for Arg {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Arg::Null)
    }
}

/// Positional and named construction arguments, in the order given.
#[derive(Debug, Clone, Default)]
pub struct Args {
    positional: Vec<Arg>,
    named: Vec<(String, Arg)>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, arg: impl Into<Arg>) -> Self {
        self.positional.push(arg.into());
        self
    }

    pub fn named(mut self, name: impl Into<String>, arg: impl Into<Arg>) -> Self {
        self.named.push((name.into(), arg.into()));
        self
    }

    pub fn positional(&self) -> &[Arg] {
        &self.positional
    }

    pub fn named_args(&self) -> &[(String, Arg)] {
        &self.named
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    /// Look up the parameter at `index` of `params`, positionally or by name.
    pub(crate) fn slot(&self, params: &[&str], index: usize) -> Option<&Arg> {
        self.positional.get(index).or_else(|| {
            let name = params.get(index)?;
            self.named.iter().find(|(n, _)| n == name).map(|(_, arg)| arg)
        })
    }

    /// Every argument, positional first then named, for walking sub-chains.
    pub fn iter(&self) -> impl Iterator<Item = &Arg> {
        self.positional.iter().chain(self.named.iter().map(|(_, arg)| arg))
    }
}

impl fmt::Display for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self.positional.iter().map(ToString::to_string).collect();
        parts.extend(self.named.iter().map(|(name, arg)| format!("{name}={arg}")));
        f.write_str(&parts.join(", "))
    }
}

/// What a link turns into once its arguments are known.
#[derive(Clone)]
pub enum Materialized {
    Transform(Transform),
    Chain(Chain),
}

impl Materialized {
    pub fn apply(&self, value: &Value) -> Result<Value> {
        match self {
            Materialized::Transform(f) => f(value),
            Materialized::Chain(chain) => chain.apply(value.clone()),
        }
    }
}

impl fmt::Debug for Materialized {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Materialized::Transform(_) => f.write_str("Transform(<function>)"),
            Materialized::Chain(chain) => write!(f, "Chain({chain})"),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Target {
    Op(&'static Operation),
    Func(Func),
}

#[derive(Debug, Clone)]
pub(crate) enum LinkArgs {
    None,
    Pending,
    Bound(Args),
}

#[derive(Clone)]
pub struct Link {
    target: Target,
    args: LinkArgs,
    cache: Arc<OnceCell<Materialized>>,
}

impl Link {
    fn build(target: Target, args: LinkArgs) -> Self {
        Link { target, args, cache: Arc::new(OnceCell::new()) }
    }

    /// Link for a registered operation; parameterized ones start pending.
    pub fn op(name: &str) -> Result<Link> {
        let op = registry().get(name)?;
        let args = if op.is_parameterized() { LinkArgs::Pending } else { LinkArgs::None };
        Ok(Link::build(Target::Op(op), args))
    }

    /// Link for a registered operation with its arguments fixed.
    pub fn bound(name: &str, args: Args) -> Result<Link> {
        Link::op(name)?.with_args(args)
    }

    pub(crate) fn from_operation(op: &'static Operation, args: Args) -> Link {
        Link::build(Target::Op(op), LinkArgs::Bound(args))
    }

    /// Wrap an external callable as an ad-hoc link.
    pub fn func(func: Func) -> Link {
        Link::build(Target::Func(func), LinkArgs::None)
    }

    pub fn name(&self) -> &str {
        match &self.target {
            Target::Op(op) => op.name,
            Target::Func(func) => func.name(),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.args, LinkArgs::Pending)
    }

    /// The registry operation behind this link, if any.
    pub fn operation(&self) -> Option<&'static Operation> {
        match self.target {
            Target::Op(op) => Some(op),
            Target::Func(_) => None,
        }
    }

    pub fn args(&self) -> Option<&Args> {
        match &self.args {
            LinkArgs::Bound(args) => Some(args),
            _ => None,
        }
    }

    /// Rebuild a pending link with `args` filled in.
    pub fn with_args(&self, args: Args) -> Result<Link> {
        match (&self.target, &self.args) {
            (Target::Op(op), LinkArgs::Pending) => {
                op.check_args(&args)?;
                Ok(Link::build(self.target.clone(), LinkArgs::Bound(args)))
            }
            _ => Err(Error::arity(self.to_string(), "link is not awaiting arguments")),
        }
    }

    /// Close a pending link with no arguments.
    pub(crate) fn close(&self) -> Result<Link> {
        if self.is_pending() { self.with_args(Args::new()) } else { Ok(self.clone()) }
    }

    pub fn materialize(&self) -> Result<Materialized> {
        self.cache
            .get_or_try_init(|| match (&self.target, &self.args) {
                (Target::Func(func), _) => Ok(Materialized::Transform(Arc::clone(&func.f))),
                (Target::Op(_), LinkArgs::Pending) => {
                    Err(Error::arity(self.to_string(), "link is still awaiting arguments"))
                }
                (Target::Op(op), LinkArgs::None) => op.bind(None),
                (Target::Op(op), LinkArgs::Bound(args)) => op.bind(Some(args)),
            })
            .cloned()
    }

    /// `materialize()(value)`.
    pub fn call(&self, value: &Value) -> Result<Value> {
        self.materialize()?.apply(value)
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())?;
        match &self.args {
            LinkArgs::None => Ok(()),
            LinkArgs::Pending => f.write_str("(...)"),
            LinkArgs::Bound(args) => write!(f, "({args})"),
        }
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Link: {self}>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_render_arguments() {
        let css = Link::bound("css", Args::new().arg("li")).unwrap();
        assert_eq!(css.to_string(), r#"css("li")"#);

        let pending = Link::op("attr").unwrap();
        assert!(pending.is_pending());
        assert_eq!(pending.to_string(), "attr(...)");

        let sub = Link::bound("re_sub", Args::new().arg(r"\s").arg("").named("count", 1)).unwrap();
        assert_eq!(sub.to_string(), r#"re_sub("\\s", "", count=1)"#);

        assert_eq!(Link::op("text").unwrap().to_string(), "text");
    }

    #[test]
    fn pending_links_cannot_run() {
        let pending = Link::op("attr").unwrap();
        assert!(matches!(pending.call(&Value::Null).unwrap_err(), Error::Arity { .. }));
    }

    #[test]
    fn direct_links_reject_arguments() {
        let text = Link::op("text").unwrap();
        assert!(matches!(text.with_args(Args::new().arg(1)).unwrap_err(), Error::Arity { .. }));
    }

    #[test]
    fn func_links_apply_the_callable() {
        let double = Link::func(Func::new("double", |v: &Value| match v {
            Value::Int(i) => Ok(Value::Int(i * 2)),
            other => Err(Error::custom(format!("not an int: {other}"))),
        }));
        assert_eq!(double.to_string(), "double");
        assert_eq!(double.call(&Value::Int(21)).unwrap(), Value::Int(42));
    }

    #[test]
    fn literal_args_convert_to_values() {
        let arg = Arg::from(vec![Arg::from(1), Arg::from("x"), Arg::Null]);
        assert_eq!(arg.to_value().unwrap(), Value::List(vec![Value::Int(1), Value::from("x"), Value::Null]));
        assert!(Arg::Chain(Chain::new()).to_value().is_err());
    }
}
