/// Compile a regex literal once and hand out a `&'static Regex`.
#[macro_export]
macro_rules! regex {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).unwrap());
        &*RE
    }};
}

/// Build construction [`Args`](crate::Args): positional values, then an
/// optional `;` followed by `name = value` pairs.
///
/// ```
/// use parsechain::{args, Chain};
///
/// let chain = Chain::new().call("slice", args![1; stop = 3]).unwrap();
/// assert_eq!(chain.to_string(), "C.slice(1, stop=3)");
/// ```
#[macro_export]
macro_rules! args {
    () => {
        $crate::Args::new()
    };
    ( $($pos:expr),+ $(,)? ) => {
        $crate::Args::new() $(.arg($pos))+
    };
    ( $($pos:expr),* ; $($name:ident = $val:expr),* $(,)? ) => {
        $crate::Args::new() $(.arg($pos))* $(.named(stringify!($name), $val))*
    };
}
