//! Error taxonomy for chain construction and evaluation.
//!
//! Build-time problems (`UnknownOperation`, `ReservedName`, `Arity`,
//! `Expression`) surface when a chain is assembled. Everything an operation
//! raises while running is caught once per chain level and wrapped in
//! [`Error::Evaluation`], which records the failing link, a bounded preview of
//! the offending value and the owning chain. The original failure stays
//! reachable through [`std::error::Error::source`] and [`Error::root_cause`].
//!
//! Null is never an error: it propagates silently through a chain.

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No operation with this name is registered.
    #[error("unknown operation `{name}`")]
    UnknownOperation { name: String },

    /// Names starting with `_` are reserved and never resolve to operations.
    #[error("no attribute `{name}` on chain")]
    ReservedName { name: String },

    /// Wrong number or shape of arguments or values.
    #[error("{context}: {message}")]
    Arity { context: String, message: String },

    /// A link failed while a chain was being applied.
    #[error("link .{link} failed on {value} in {chain}")]
    Evaluation {
        link: String,
        value: String,
        chain: String,
        #[source]
        source: Box<Error>,
    },

    /// `get` found zero or several elements.
    #[error("{}: {preview}", cardinality_message(.found))]
    SelectionCardinality { found: usize, preview: String },

    /// An operation received a value of the wrong kind.
    #[error("{op} expects {expected}, got {found}")]
    Type { op: &'static str, expected: &'static str, found: &'static str },

    /// Text could not be converted to the requested scalar.
    #[error("cannot convert {input:?} to {target}")]
    Conversion { input: String, target: &'static str },

    #[error("invalid selector {selector:?}: {message}")]
    Selector { selector: String, message: String },

    #[error("invalid xpath {query:?} at offset {offset}: {message}")]
    XPath { query: String, offset: usize, message: String },

    /// Syntax error in a textual chain expression.
    #[error("invalid chain expression at offset {offset}: {message}")]
    Expression { offset: usize, message: String },

    #[error(transparent)]
    Regex(#[from] regex::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Failure reported by an externally supplied callable.
    #[error("{0}")]
    Custom(String),
}

fn cardinality_message(found: &usize) -> &'static str {
    if *found == 0 {
        "trying to get value from empty list"
    } else {
        "trying to get single value from multivalue list"
    }
}

impl Error {
    pub(crate) fn arity(context: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Arity { context: context.into(), message: message.into() }
    }

    /// Unwrap nested [`Error::Evaluation`] layers down to the failure that
    /// started it.
    pub fn root_cause(&self) -> &Error {
        let mut current = self;
        while let Error::Evaluation { source, .. } = current {
            current = source;
        }
        current
    }

    /// Convenience constructor for errors raised by user callables.
    pub fn custom(message: impl Into<String>) -> Self {
        Error::Custom(message.into())
    }
}
