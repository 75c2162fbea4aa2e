//! The operation catalog.
//!
//! The registry is assembled once, by explicit registration calls from each
//! `ops/*` module, and is read-only afterwards. Links hold `&'static`
//! references into it.
//!
//! ## Invariants
//!
//! - Every operation declares its shape: `Direct` operations are callable on a
//!   value straight away, `Parameterized` ones need construction arguments
//!   first (and carry [`OpFlags::PARAMETERIZED`]).
//! - The structural flags (`CONSTANT`, `BRANCH`, `ALTERNATION`) are what the
//!   introspection engine dispatches on; at most one is set per operation.
//! - `params` lists the parameter names in positional order, `required` how
//!   many of them must be supplied.

use crate::engine::{Arg, Args, Materialized};
use crate::error::{Error, Result};
use crate::value::Value;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A compiled `value → value` step.
pub type Transform = Arc<dyn Fn(&Value) -> Result<Value> + Send + Sync>;

/// Builds a step from construction arguments.
pub type Factory = Arc<dyn Fn(&Bound<'_>) -> Result<Materialized> + Send + Sync>;

bitflags::bitflags! {
    /// Capabilities and structural role of an operation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpFlags: u8 {
        const PARAMETERIZED = 1 << 0;
        const VARIADIC      = 1 << 1;
        const LIST_AWARE    = 1 << 2;
        const CONSTANT      = 1 << 3;
        const BRANCH        = 1 << 4;
        const ALTERNATION   = 1 << 5;
    }
}

#[derive(Clone)]
pub enum OpKind {
    Direct(Transform),
    Parameterized(Factory),
}

/// A named operation.
#[derive(Clone)]
pub struct Operation {
    pub name: &'static str,
    pub flags: OpFlags,
    pub params: &'static [&'static str],
    pub required: usize,
    kind: OpKind,
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("flags", &self.flags)
            .field("params", &self.params)
            .field("kind", &"<function>")
            .finish()
    }
}

/// Arguments handed to a factory, resolved against the operation signature.
pub struct Bound<'a> {
    op: &'a Operation,
    args: &'a Args,
}

impl<'a> Bound<'a> {
    pub fn get(&self, index: usize) -> Option<&'a Arg> {
        match self.args.slot(self.op.params, index) {
            Some(Arg::Null) | None => None,
            Some(arg) => Some(arg),
        }
    }

    /// The argument at `index` as given, including explicit nulls.
    pub fn raw(&self, index: usize) -> Option<&'a Arg> {
        self.args.slot(self.op.params, index)
    }

    pub fn require(&self, index: usize) -> Result<&'a Arg> {
        self.get(index).ok_or_else(|| {
            let param = self.op.params.get(index).copied().unwrap_or("argument");
            Error::arity(self.op.name, format!("missing argument `{param}`"))
        })
    }

    pub fn str(&self, index: usize) -> Result<&'a str> {
        let arg = self.require(index)?;
        arg.as_str().ok_or_else(|| self.mismatch(index, "a string", arg))
    }

    pub fn opt_str(&self, index: usize) -> Result<Option<&'a str>> {
        match self.get(index) {
            None => Ok(None),
            Some(arg) => arg.as_str().map(Some).ok_or_else(|| self.mismatch(index, "a string", arg)),
        }
    }

    pub fn opt_int(&self, index: usize) -> Result<Option<i64>> {
        match self.get(index) {
            None => Ok(None),
            Some(arg) => arg.as_int().map(Some).ok_or_else(|| self.mismatch(index, "an integer", arg)),
        }
    }

    /// All positional arguments (used by variadic operations).
    pub fn positional(&self) -> &'a [Arg] {
        self.args.positional()
    }

    pub fn name(&self) -> &'static str {
        self.op.name
    }

    fn mismatch(&self, index: usize, expected: &str, arg: &Arg) -> Error {
        let param = self.op.params.get(index).copied().unwrap_or("argument");
        Error::arity(self.op.name, format!("`{param}` must be {expected}, got {}", arg.kind_name()))
    }
}

impl Operation {
    pub fn is_parameterized(&self) -> bool {
        self.flags.contains(OpFlags::PARAMETERIZED)
    }

    /// Lifted over node lists by one of the list adapters.
    pub fn is_list_aware(&self) -> bool {
        self.flags.contains(OpFlags::LIST_AWARE)
    }

    /// Signature line, e.g. `slice(start, stop=, step=)`.
    pub fn signature(&self) -> String {
        if !self.is_parameterized() {
            return self.name.to_string();
        }
        let params: Vec<String> = self
            .params
            .iter()
            .enumerate()
            .map(|(i, p)| if i < self.required { p.to_string() } else { format!("{p}=") })
            .collect();
        let dots = if self.flags.contains(OpFlags::VARIADIC) { ", ..." } else { "" };
        format!("{}({}{dots})", self.name, params.join(", "))
    }

    /// Validate construction arguments against the signature.
    pub fn check_args(&self, args: &Args) -> Result<()> {
        if !self.is_parameterized() {
            if args.is_empty() {
                return Ok(());
            }
            return Err(Error::arity(self.name, "takes no arguments"));
        }

        let given = args.positional().len();
        if given > self.params.len() && !self.flags.contains(OpFlags::VARIADIC) {
            return Err(Error::arity(
                self.name,
                format!("takes at most {} arguments ({given} given)", self.params.len()),
            ));
        }

        for (i, (name, _)) in args.named_args().iter().enumerate() {
            let Some(pos) = self.params.iter().position(|p| p == name) else {
                return Err(Error::arity(self.name, format!("unexpected argument `{name}`")));
            };
            if pos < given || args.named_args()[..i].iter().any(|(n, _)| n == name) {
                return Err(Error::arity(self.name, format!("argument `{name}` given twice")));
            }
        }

        if self.flags.contains(OpFlags::VARIADIC) {
            if given < self.required {
                return Err(Error::arity(self.name, format!("needs at least {} arguments", self.required)));
            }
            return Ok(());
        }

        for (index, param) in self.params.iter().enumerate().take(self.required) {
            if args.slot(self.params, index).is_none() {
                return Err(Error::arity(self.name, format!("missing argument `{param}`")));
            }
        }
        Ok(())
    }

    /// Turn this operation (plus arguments, if any) into something runnable.
    ///
    /// This is the single evaluation core shared by lazy chains and eager
    /// [`Chainy`](crate::Chainy) values.
    pub fn bind(&self, args: Option<&Args>) -> Result<Materialized> {
        match (&self.kind, args) {
            (OpKind::Direct(f), None) => Ok(Materialized::Transform(Arc::clone(f))),
            (OpKind::Direct(f), Some(args)) if args.is_empty() => Ok(Materialized::Transform(Arc::clone(f))),
            (OpKind::Direct(_), Some(_)) => Err(Error::arity(self.name, "takes no arguments")),
            (OpKind::Parameterized(_), None) => Err(Error::arity(self.name, "awaiting arguments")),
            (OpKind::Parameterized(factory), Some(args)) => {
                self.check_args(args)?;
                factory(&Bound { op: self, args })
            }
        }
    }
}

/// Name → operation table.
#[derive(Default)]
pub struct Registry {
    ops: HashMap<&'static str, Operation>,
}

impl Registry {
    pub(crate) fn direct<F>(&mut self, name: &'static str, flags: OpFlags, f: F)
    where
        F: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.insert(Operation { name, flags, params: &[], required: 0, kind: OpKind::Direct(Arc::new(f)) });
    }

    pub(crate) fn parameterized<F>(
        &mut self,
        name: &'static str,
        flags: OpFlags,
        params: &'static [&'static str],
        required: usize,
        factory: F,
    ) where
        F: Fn(&Bound<'_>) -> Result<Materialized> + Send + Sync + 'static,
    {
        self.insert(Operation {
            name,
            flags: flags | OpFlags::PARAMETERIZED,
            params,
            required,
            kind: OpKind::Parameterized(Arc::new(factory)),
        });
    }

    /// Register `alias` as another name for an existing operation.
    pub(crate) fn alias(&mut self, alias: &'static str, target: &str) {
        if let Some(op) = self.ops.get(target).cloned() {
            self.insert(Operation { name: alias, ..op });
        }
    }

    fn insert(&mut self, op: Operation) {
        debug_assert!(!self.ops.contains_key(op.name), "operation `{}` registered twice", op.name);
        self.ops.insert(op.name, op);
    }

    pub fn get(&self, name: &str) -> Result<&Operation> {
        self.ops.get(name).ok_or_else(|| Error::UnknownOperation { name: name.to_string() })
    }

    /// Sorted operation names.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.ops.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

static REGISTRY: Lazy<Registry> = Lazy::new(build);

/// The process-wide registry.
pub fn registry() -> &'static Registry {
    &REGISTRY
}

/// Look up a built-in operation that is known to exist.
pub(crate) fn builtin(name: &str) -> &'static Operation {
    REGISTRY.get(name).unwrap_or_else(|_| panic!("built-in operation `{name}` is registered"))
}

fn build() -> Registry {
    let mut reg = Registry::default();
    super::combinators::register(&mut reg);
    super::traverse::register(&mut reg);
    super::select::register(&mut reg);
    super::access::register(&mut reg);
    super::text::register(&mut reg);
    super::data::register(&mut reg);
    debug!(operations = reg.len(), "operation registry built");
    reg
}

/// Look up `name`, bind `args` and apply the result to `value` in one go.
pub fn apply_operation(name: &str, args: Option<&Args>, value: &Value) -> Result<Value> {
    registry().get(name)?.bind(args)?.apply(value)
}
