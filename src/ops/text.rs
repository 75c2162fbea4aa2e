//! String cleanup and regular expressions.

use super::adapters::{expect_str, transform};
use super::registry::{Bound, OpFlags, Registry};
use crate::engine::Materialized;
use crate::error::{Error, Result};
use crate::value::{Key, Value};
use regex::{Captures, Regex, RegexBuilder};

/// Python `re` flag bits accepted by `re_sub`.
mod flags {
    pub const IGNORECASE: i64 = 2;
    pub const MULTILINE: i64 = 8;
    pub const DOTALL: i64 = 16;
    pub const VERBOSE: i64 = 64;
}

pub(super) fn register(reg: &mut Registry) {
    reg.direct("trim", OpFlags::empty(), |v| Ok(Value::from(expect_str("trim", v)?.trim())));
    reg.parameterized("strip", OpFlags::empty(), &["dirt"], 0, strip);
    reg.direct("normspace", OpFlags::empty(), normspace);
    reg.alias("normalize_whitespace", "normspace");
    reg.parameterized("split", OpFlags::empty(), &["by"], 1, split);
    reg.parameterized("re", OpFlags::empty(), &["pattern"], 1, re);
    reg.parameterized("re_sub", OpFlags::empty(), &["pattern", "repl", "count", "flags"], 2, re_sub);
}

fn strip(b: &Bound<'_>) -> Result<Materialized> {
    let dirt = b.opt_str(0)?.map(str::to_owned);
    Ok(transform(move |v| {
        let text = expect_str("strip", v)?;
        Ok(Value::from(match &dirt {
            Some(dirt) => text.trim_matches(|c: char| dirt.contains(c)),
            None => text.trim(),
        }))
    }))
}

fn normspace(value: &Value) -> Result<Value> {
    let text = expect_str("normspace", value)?;
    Ok(Value::from(crate::regex!(r"\s+").replace_all(text, " ").trim()))
}

fn split(b: &Bound<'_>) -> Result<Materialized> {
    let by = b.opt_str(0)?.map(str::to_owned);
    if by.as_deref() == Some("") {
        return Err(Error::arity("split", "empty separator"));
    }
    Ok(transform(move |v| {
        let text = expect_str("split", v)?;
        let parts: Vec<Value> = match &by {
            Some(by) => text.split(by.as_str()).map(Value::from).collect(),
            None => text.split_whitespace().map(Value::from).collect(),
        };
        Ok(Value::List(parts))
    }))
}

fn re(b: &Bound<'_>) -> Result<Materialized> {
    let regex = Regex::new(b.str(0)?)?;
    Ok(transform(move |v| {
        let text = expect_str("re", v)?;
        Ok(regex.captures(text).map(|caps| match_value(&regex, &caps)).unwrap_or(Value::Null))
    }))
}

/// Shape of a match: the whole match without groups, the group for a single
/// unnamed group, a mapping when every group is named, else the group list.
fn match_value(regex: &Regex, caps: &Captures<'_>) -> Value {
    let group = |i: usize| Value::from(caps.get(i).map(|m| m.as_str()));
    let groups = regex.captures_len() - 1;
    let names: Vec<&str> = regex.capture_names().flatten().collect();

    match groups {
        0 => group(0),
        1 if names.is_empty() => group(1),
        n if !names.is_empty() && names.len() == n => Value::Map(
            names.iter().map(|name| (Key::from(*name), Value::from(caps.name(name).map(|m| m.as_str())))).collect(),
        ),
        n => Value::List((1..=n).map(group).collect()),
    }
}

fn re_sub(b: &Bound<'_>) -> Result<Materialized> {
    let bits = b.opt_int(3)?.unwrap_or(0);
    let regex = RegexBuilder::new(b.str(0)?)
        .case_insensitive(bits & flags::IGNORECASE != 0)
        .multi_line(bits & flags::MULTILINE != 0)
        .dot_matches_new_line(bits & flags::DOTALL != 0)
        .ignore_whitespace(bits & flags::VERBOSE != 0)
        .build()?;
    let repl = python_replacement(b.str(1)?);
    let count = usize::try_from(b.opt_int(2)?.unwrap_or(0).max(0)).unwrap_or(0);

    Ok(transform(move |v| {
        let text = expect_str("re_sub", v)?;
        let replaced = if count == 0 {
            regex.replace_all(text, repl.as_str())
        } else {
            regex.replacen(text, count, repl.as_str())
        };
        Ok(Value::from(replaced.into_owned()))
    }))
}

/// Translate a Python replacement template (`\1`, `\g<name>`) into the
/// `regex` crate's `${1}` syntax, escaping literal dollars.
fn python_replacement(repl: &str) -> String {
    let chars: Vec<char> = repl.chars().collect();
    let mut out = String::with_capacity(repl.len());
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '$' => out.push_str("$$"),
            '\\' if i + 1 < chars.len() => {
                let next = chars[i + 1];
                if next.is_ascii_digit() {
                    let digits: String = chars[i + 1..].iter().take(2).take_while(|c| c.is_ascii_digit()).collect();
                    i += digits.len();
                    out.push_str(&format!("${{{digits}}}"));
                } else if next == 'g' && chars.get(i + 2) == Some(&'<') {
                    match chars[i + 3..].iter().position(|&c| c == '>') {
                        Some(len) => {
                            let name: String = chars[i + 3..i + 3 + len].iter().collect();
                            out.push_str(&format!("${{{name}}}"));
                            i += 3 + len;
                        }
                        None => {
                            out.push('\\');
                        }
                    }
                } else {
                    i += 1;
                    match next {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        '\\' => out.push('\\'),
                        other => {
                            out.push('\\');
                            out.push(other);
                        }
                    }
                }
            }
            c => out.push(c),
        }
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Args;
    use crate::ops::apply_operation;

    fn run(name: &str, args: Args, input: &str) -> Value {
        apply_operation(name, Some(&args), &Value::from(input)).unwrap()
    }

    #[test]
    fn strip_with_and_without_dirt() {
        assert_eq!(run("strip", Args::new(), "  x  "), Value::from("x"));
        assert_eq!(run("strip", Args::new().arg("-*"), "*-x-*"), Value::from("x"));
        assert_eq!(apply_operation("trim", None, &Value::from("\tx\n")).unwrap(), Value::from("x"));
    }

    #[test]
    fn split_on_separator_or_whitespace() {
        assert_eq!(run("split", Args::new().arg(","), "a,b"), Value::List(vec![Value::from("a"), Value::from("b")]));
        assert_eq!(
            run("split", Args::new().arg(crate::engine::Arg::Null), " a  b "),
            Value::List(vec![Value::from("a"), Value::from("b")])
        );
    }

    #[test]
    fn re_result_shapes() {
        assert_eq!(run("re", Args::new().arg(r"\d+"), "ab 12 34"), Value::from("12"));
        assert_eq!(run("re", Args::new().arg(r"(\d+)px"), "w: 40px"), Value::from("40"));
        assert_eq!(
            run("re", Args::new().arg(r"(\d+)x(\d+)"), "3x4"),
            Value::List(vec![Value::from("3"), Value::from("4")])
        );
        let Value::Map(named) = run("re", Args::new().arg(r"(?P<w>\d+)x(?P<h>\d+)"), "3x4") else {
            panic!("expected mapping")
        };
        assert_eq!(named[&Key::from("h")], Value::from("4"));
        assert_eq!(run("re", Args::new().arg(r"\d"), "none"), Value::Null);
    }

    #[test]
    fn re_sub_translates_python_templates() {
        assert_eq!(run("re_sub", Args::new().arg(r"(\w+)@(\w+)").arg(r"\2 at \1"), "me@home"), Value::from("home at me"));
        assert_eq!(run("re_sub", Args::new().arg(r"\s").arg("").named("count", 1), "a b c"), Value::from("ab c"));
        assert_eq!(run("re_sub", Args::new().arg("X").arg("$").named("flags", 2), "axb"), Value::from("a$b"));
        assert_eq!(python_replacement(r"\g<year>-\1\n"), "${year}-${1}\n");
    }
}
