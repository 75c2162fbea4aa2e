//! Collections and scalar conversion.

use super::adapters::{expect_list, expect_str, transform};
use super::combinators::fan_out;
use super::registry::{Bound, OpFlags, Registry};
use crate::api::Context;
use crate::engine::{Arg, Materialized};
use crate::error::{Error, Result};
use crate::value::Value;
use chrono::{NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_english::{Dialect, parse_date_string};
use tracing::debug;

pub(super) fn register(reg: &mut Registry) {
    reg.direct("len", OpFlags::empty(), len);
    reg.parameterized("map", OpFlags::empty(), &["f"], 1, map);
    reg.parameterized("filter", OpFlags::empty(), &["pred"], 1, filter);

    reg.direct("float", OpFlags::empty(), to_float);
    reg.direct("int", OpFlags::empty(), to_int);
    reg.direct("clean_float", OpFlags::empty(), clean_float);
    reg.direct("clean_int", OpFlags::empty(), clean_int);
    reg.direct("date", OpFlags::empty(), date);
    reg.direct("duration", OpFlags::empty(), duration);
}

fn len(value: &Value) -> Result<Value> {
    let n = match value {
        Value::List(items) => items.len(),
        Value::Str(s) => s.chars().count(),
        Value::Map(map) => map.len(),
        other => return Err(Error::Type { op: "len", expected: "a list, string or mapping", found: other.kind_name() }),
    };
    Ok(Value::Int(n as i64))
}

/// `map(f)`; a literal list or mapping is shorthand for `map(multi(f))`.
fn map(b: &Bound<'_>) -> Result<Materialized> {
    let f = b.require(0)?.clone();
    let branch = matches!(f, Arg::List(_) | Arg::Map(_));
    if !branch && !f.is_callable() {
        return Err(Error::arity("map", format!("`f` must be callable, got {}", f.kind_name())));
    }
    Ok(transform(move |v| {
        expect_list("map", v)?
            .iter()
            .map(|item| if branch { fan_out(&f, item) } else { f.apply(item) })
            .collect::<Result<Vec<_>>>()
            .map(Value::List)
    }))
}

fn filter(b: &Bound<'_>) -> Result<Materialized> {
    let pred = b.require(0)?.clone();
    if !pred.is_callable() {
        return Err(Error::arity("filter", format!("`pred` must be callable, got {}", pred.kind_name())));
    }
    Ok(transform(move |v| {
        let mut kept = Vec::new();
        for item in expect_list("filter", v)? {
            if pred.apply(item)?.is_truthy() {
                kept.push(item.clone());
            }
        }
        Ok(Value::List(kept))
    }))
}

fn conversion(input: &str, target: &'static str) -> Error {
    Error::Conversion { input: input.to_string(), target }
}

fn to_float(value: &Value) -> Result<Value> {
    match value {
        Value::Float(x) => Ok(Value::Float(*x)),
        Value::Int(i) => Ok(Value::Float(*i as f64)),
        Value::Bool(b) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
        Value::Str(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| conversion(s, "float")),
        other => Err(Error::Type { op: "float", expected: "a number or string", found: other.kind_name() }),
    }
}

fn to_int(value: &Value) -> Result<Value> {
    match value {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Float(x) if x.is_finite() => Ok(Value::Int(x.trunc() as i64)),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Str(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| conversion(s, "int")),
        other => Err(Error::Type { op: "int", expected: "a number or string", found: other.kind_name() }),
    }
}

/// `"$ 1 299,90"` → `1299.9`: drop everything but digits and separators,
/// reading a comma as the decimal point.
fn clean_float(value: &Value) -> Result<Value> {
    let text = expect_str("clean_float", value)?;
    let cleaned = crate::regex!(r"[^\d,.]").replace_all(text, "").replace(',', ".");
    cleaned.parse::<f64>().map(Value::Float).map_err(|_| conversion(text, "float"))
}

fn clean_int(value: &Value) -> Result<Value> {
    let text = expect_str("clean_int", value)?;
    let cleaned = crate::regex!(r"\D").replace_all(text, "");
    cleaned.parse::<i64>().map(Value::Int).map_err(|_| conversion(text, "int"))
}

/// Natural-language date, resolved against the current [`Context`].
/// Unparseable text gives null.
fn date(value: &Value) -> Result<Value> {
    let text = expect_str("date", value)?.trim();
    Ok(parse_date(text, Context::current().reference_time).map(Value::Date).unwrap_or(Value::Null))
}

pub(crate) fn parse_date(text: &str, reference: NaiveDateTime) -> Option<NaiveDateTime> {
    const FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%d.%m.%Y %H:%M"];
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y"];

    if let Some(parsed) = FORMATS.iter().find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok()) {
        return Some(parsed);
    }
    if let Some(day) = DATE_FORMATS.iter().find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok()) {
        return Some(day.and_time(chrono::NaiveTime::MIN));
    }

    match parse_date_string(text, Utc.from_utc_datetime(&reference), Dialect::Uk) {
        Ok(parsed) => Some(parsed.naive_utc()),
        Err(err) => {
            debug!(input = text, error = ?err, "date not recognized");
            None
        }
    }
}

/// `hh:mm:ss` / `mm:ss`, or day/hour/minute amounts (`2 ч 30 мин`,
/// `1 day 3h`). Null when nothing is found or the amount is under a minute.
fn duration(value: &Value) -> Result<Value> {
    let text = expect_str("duration", value)?;
    let clock = crate::regex!(r"(?:(\d\d):)?(\d\d):(\d\d)(?:\s|$)");
    let units = crate::regex!(
        r"(?ix)
        (?:(\d+)\s*(?:д[еньяй.]*|days?|d\b))?
        \s*(?:(\d+)\s*(?:ч[ас.]*|hours?|hrs?|h\b))?
        \s*(?:(\d+)\s*(?:м[инуты.]*|minutes?|mins?|m\b))?"
    );

    let parts = if let Some(caps) = clock.captures(text) {
        Some((0, amount(caps.get(1)), amount(caps.get(2)), amount(caps.get(3))))
    } else {
        units
            .captures_iter(text)
            .find(|caps| caps.iter().skip(1).any(|g| g.is_some()))
            .map(|caps| (amount(caps.get(1)), amount(caps.get(2)), amount(caps.get(3)), 0))
    };

    Ok(match parts {
        Some((days, hours, minutes, seconds)) if days != 0 || hours != 0 || minutes != 0 => {
            match total_seconds(days, hours, minutes, seconds).and_then(TimeDelta::try_seconds) {
                Some(delta) => Value::Duration(delta),
                None => {
                    debug!(input = text, "duration out of range");
                    Value::Null
                }
            }
        }
        _ => Value::Null,
    })
}

fn total_seconds(days: i64, hours: i64, minutes: i64, seconds: i64) -> Option<i64> {
    let hours = days.checked_mul(24)?.checked_add(hours)?;
    let minutes = hours.checked_mul(60)?.checked_add(minutes)?;
    minutes.checked_mul(60)?.checked_add(seconds)
}

fn amount(group: Option<regex::Match<'_>>) -> i64 {
    group.and_then(|m| m.as_str().parse::<i64>().ok()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Args, Chain, Func};
    use crate::ops::apply_operation;

    fn strs(xs: &[&str]) -> Value {
        Value::List(xs.iter().map(|s| Value::from(*s)).collect())
    }

    #[test]
    fn len_counts_chars_items_and_keys() {
        assert_eq!(len(&Value::from("héllo")).unwrap(), Value::Int(5));
        assert_eq!(len(&strs(&["a", "b"])).unwrap(), Value::Int(2));
        assert!(len(&Value::Int(3)).is_err());
    }

    #[test]
    fn map_applies_chains_and_branch_literals() {
        let trim = Chain::new().op("trim").unwrap();
        let out = apply_operation("map", Some(&Args::new().arg(trim)), &strs(&[" a", "b "])).unwrap();
        assert_eq!(out, strs(&["a", "b"]));

        let spec = Args::new().arg(vec![Arg::from(Chain::new().op("len").unwrap()), Arg::from("k")]);
        let out = apply_operation("map", Some(&spec), &strs(&["ab"])).unwrap();
        assert_eq!(out, Value::List(vec![Value::List(vec![Value::Int(2), Value::from("k")])]));

        assert!(apply_operation("map", Some(&Args::new().arg(3)), &strs(&[])).is_err());
    }

    #[test]
    fn filter_keeps_truthy_results() {
        let long = Func::new("long", |v: &Value| Ok(Value::Bool(v.as_str().is_some_and(|s| s.len() > 1))));
        let out = apply_operation("filter", Some(&Args::new().arg(long)), &strs(&["a", "bb", "ccc"])).unwrap();
        assert_eq!(out, strs(&["bb", "ccc"]));
    }

    #[test]
    fn numeric_conversions() {
        assert_eq!(to_float(&Value::from(" 2.5 ")).unwrap(), Value::Float(2.5));
        assert_eq!(to_int(&Value::from("42")).unwrap(), Value::Int(42));
        assert!(matches!(to_int(&Value::from("4x")).unwrap_err(), Error::Conversion { target: "int", .. }));
        assert_eq!(clean_float(&Value::from("$ 1 299,90")).unwrap(), Value::Float(1299.9));
        assert_eq!(clean_int(&Value::from("1 234 pcs")).unwrap(), Value::Int(1234));
    }

    #[test]
    fn dates_resolve_against_reference() {
        let reference = Context::default().reference_time;
        let explicit = parse_date("2014-03-01", reference).unwrap();
        assert_eq!(explicit.date(), NaiveDate::from_ymd_opt(2014, 3, 1).unwrap());

        let tomorrow = parse_date("tomorrow", reference).unwrap();
        assert_eq!(tomorrow.date(), NaiveDate::from_ymd_opt(2013, 2, 13).unwrap());

        assert_eq!(date(&Value::from("not a date at all")).unwrap(), Value::Null);
    }

    #[test]
    fn durations_from_clock_and_units() {
        let secs = |v: Value| match v {
            Value::Duration(d) => Some(d.num_seconds()),
            _ => None,
        };
        assert_eq!(secs(duration(&Value::from("01:02:03")).unwrap()), Some(3723));
        assert_eq!(secs(duration(&Value::from("12:30")).unwrap()), Some(750));
        assert_eq!(secs(duration(&Value::from("2 ч 30 мин")).unwrap()), Some(9000));
        assert_eq!(secs(duration(&Value::from("takes 1 day 2h")).unwrap()), Some(93600));
        assert_eq!(duration(&Value::from("no time here")).unwrap(), Value::Null);
    }

    #[test]
    fn oversized_durations_are_null() {
        assert_eq!(duration(&Value::from("99999999999999999 days")).unwrap(), Value::Null);
        assert_eq!(duration(&Value::from("9223372036854775807 h")).unwrap(), Value::Null);
        assert_eq!(total_seconds(0, 1, 0, 5), Some(3605));
    }
}
