//! Positional selection: `get`, `first`, `second`, `last`, `slice`.
//!
//! All of these work on lists and, character-wise, on strings. Missing
//! positions give null, except for `get`, which insists on exactly one item.

use super::adapters::transform;
use super::registry::{Bound, OpFlags, Registry};
use crate::engine::Materialized;
use crate::error::{Error, Result};
use crate::value::Value;

/// How many offending items a cardinality error shows, and how much of each.
const CARDINALITY_PREVIEW_ITEMS: usize = 3;
const CARDINALITY_PREVIEW_CHARS: usize = 100;

pub(super) fn register(reg: &mut Registry) {
    reg.direct("get", OpFlags::empty(), get);
    reg.direct("first", OpFlags::empty(), |v| nth("first", v, 0));
    reg.direct("second", OpFlags::empty(), |v| nth("second", v, 1));
    reg.direct("last", OpFlags::empty(), last);
    reg.parameterized("slice", OpFlags::empty(), &["start", "stop", "step"], 1, slice);
}

fn get(value: &Value) -> Result<Value> {
    let items = match value {
        Value::List(items) => items,
        other => return Err(Error::Type { op: "get", expected: "a list", found: other.kind_name() }),
    };
    match items.as_slice() {
        [single] => Ok(single.clone()),
        _ => {
            let shown: Vec<String> = items
                .iter()
                .take(CARDINALITY_PREVIEW_ITEMS)
                .map(|item| item.preview(CARDINALITY_PREVIEW_CHARS))
                .collect();
            let more = if items.len() > CARDINALITY_PREVIEW_ITEMS { "..." } else { "" };
            Err(Error::SelectionCardinality { found: items.len(), preview: format!("[{}{more}]", shown.join(", ")) })
        }
    }
}

fn nth(op: &'static str, value: &Value, index: usize) -> Result<Value> {
    match value {
        Value::List(items) => Ok(items.get(index).cloned().unwrap_or(Value::Null)),
        Value::Str(s) => Ok(s.chars().nth(index).map(|c| Value::Str(c.to_string())).unwrap_or(Value::Null)),
        other => Err(Error::Type { op, expected: "a list or string", found: other.kind_name() }),
    }
}

fn last(value: &Value) -> Result<Value> {
    match value {
        Value::List(items) => Ok(items.last().cloned().unwrap_or(Value::Null)),
        Value::Str(s) => Ok(s.chars().last().map(|c| Value::Str(c.to_string())).unwrap_or(Value::Null)),
        other => Err(Error::Type { op: "last", expected: "a list or string", found: other.kind_name() }),
    }
}

fn slice(b: &Bound<'_>) -> Result<Materialized> {
    let (start, stop) = (b.opt_int(0)?, b.opt_int(1)?);
    let step = b.opt_int(2)?.unwrap_or(1);
    if step == 0 {
        return Err(Error::arity("slice", "step cannot be zero"));
    }
    Ok(transform(move |value| match value {
        Value::List(items) => {
            let picked = slice_indices(items.len(), start, stop, step).into_iter().map(|i| items[i].clone());
            Ok(Value::List(picked.collect()))
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(Value::Str(slice_indices(chars.len(), start, stop, step).into_iter().map(|i| chars[i]).collect()))
        }
        other => Err(Error::Type { op: "slice", expected: "a list or string", found: other.kind_name() }),
    }))
}

/// Indices selected by `[start:stop:step]` on a sequence of `len` items,
/// with negative indices counting from the end and out-of-range bounds
/// clamped.
fn slice_indices(len: usize, start: Option<i64>, stop: Option<i64>, step: i64) -> Vec<usize> {
    let len = len as i64;
    let (lower, upper) = if step > 0 { (0, len) } else { (-1, len - 1) };
    let clamp = |bound: i64| if bound < 0 { (bound + len).max(lower) } else { bound.min(upper) };

    let start = start.map(clamp).unwrap_or(if step > 0 { lower } else { upper });
    let stop = stop.map(clamp).unwrap_or(if step > 0 { upper } else { lower });

    let mut out = Vec::new();
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        out.push(i as usize);
        match i.checked_add(step) {
            Some(next) => i = next,
            None => break,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Arg, Args};
    use crate::ops::apply_operation;

    fn ints(xs: &[i64]) -> Value {
        Value::List(xs.iter().copied().map(Value::Int).collect())
    }

    fn sliced(args: Args, value: &Value) -> Value {
        apply_operation("slice", Some(&args), value).unwrap()
    }

    #[test]
    fn get_requires_exactly_one() {
        assert_eq!(get(&ints(&[7])).unwrap(), Value::Int(7));

        let Error::SelectionCardinality { found, preview } = get(&ints(&[])).unwrap_err() else {
            panic!("expected cardinality error")
        };
        assert_eq!((found, preview.as_str()), (0, "[]"));

        let Error::SelectionCardinality { found, preview } = get(&ints(&[1, 2, 3, 4])).unwrap_err() else {
            panic!("expected cardinality error")
        };
        assert_eq!((found, preview.as_str()), (4, "[1, 2, 3...]"));
    }

    #[test]
    fn positional_access_on_lists_and_strings() {
        assert_eq!(nth("first", &ints(&[1, 2]), 0).unwrap(), Value::Int(1));
        assert_eq!(nth("second", &ints(&[1]), 1).unwrap(), Value::Null);
        assert_eq!(last(&Value::from("abc")).unwrap(), Value::from("c"));
        assert_eq!(last(&ints(&[])).unwrap(), Value::Null);
        assert!(nth("first", &Value::Int(3), 0).is_err());
    }

    #[test]
    fn slice_follows_python_rules() {
        let xs = ints(&[0, 1, 2, 3, 4, 5]);
        assert_eq!(sliced(Args::new().arg(1).arg(3), &xs), ints(&[1, 2]));
        assert_eq!(sliced(Args::new().arg(-2), &xs), ints(&[4, 5]));
        assert_eq!(sliced(Args::new().arg(Arg::Null).named("step", 2), &xs), ints(&[0, 2, 4]));
        assert_eq!(sliced(Args::new().arg(Arg::Null).named("step", -1), &xs), ints(&[5, 4, 3, 2, 1, 0]));
        assert_eq!(sliced(Args::new().arg(10), &xs), ints(&[]));
        assert_eq!(sliced(Args::new().arg(1).arg(-1), &Value::from("hello")), Value::from("ell"));
        assert_eq!(sliced(Args::new().arg(1).arg(Arg::Null).arg(i64::MAX), &ints(&[0, 1, 2])), ints(&[1]));
        assert_eq!(sliced(Args::new().arg(Arg::Null).arg(Arg::Null).arg(i64::MIN), &ints(&[0, 1, 2])), ints(&[2]));
    }

    #[test]
    fn slice_rejects_zero_step() {
        let args = Args::new().arg(0).named("step", 0);
        assert!(apply_operation("slice", Some(&args), &ints(&[1])).is_err());
    }
}
