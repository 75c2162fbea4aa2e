//! Textual chain expressions.
//!
//! ```text
//! expr     := seq ( '|' seq )*
//! seq      := ( 'C' | step | '(' expr ')' ) ( '.' step )*
//! step     := ident ( '(' args ')' )?
//! args     := arg ( ',' arg )* ','?
//! arg      := ident '=' value | value
//! value    := string | number | null | None | true | false
//!           | '[' values ']' | '{' key ':' value, ... '}' | expr
//! ```
//!
//! The grammar accepts everything `Chain`'s `Display` prints, so a chain
//! label can be pasted back in. Strings take single or double quotes with
//! backslash escapes; unknown escapes such as `\d` are kept verbatim, which
//! keeps regex patterns readable.
//!
//! Parsing produces a small AST first; operation names are resolved only
//! once the whole expression is known to be well-formed.

use super::chain::Chain;
use super::link::{Arg, Args};
use crate::error::{Error, Result};
use crate::value::Key;
use nom::IResult;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_while};
use nom::character::complete::{char, digit1, multispace0, one_of, satisfy};
use nom::combinator::{all_consuming, map, map_res, not, opt, peek, recognize, value};
use nom::error::{Error as NomError, ErrorKind};
use nom::multi::{many0, separated_list0, separated_list1};
use nom::sequence::{delimited, pair, preceded, separated_pair, terminated, tuple};

#[derive(Debug, Clone)]
enum Ast {
    Alt(Vec<Ast>),
    Seq { group: Option<Box<Ast>>, steps: Vec<Step> },
}

#[derive(Debug, Clone)]
struct Step {
    name: String,
    args: Option<Vec<ArgAst>>,
}

#[derive(Debug, Clone)]
enum ArgAst {
    Positional(Literal),
    Named(String, Literal),
}

#[derive(Debug, Clone)]
enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Literal>),
    Map(Vec<(Key, Literal)>),
    Chain(Ast),
}

pub(crate) fn parse_chain(expr: &str) -> Result<Chain> {
    let ast = match all_consuming(ws(alternation))(expr) {
        Ok((_, ast)) => ast,
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => {
            return Err(Error::Expression { offset: expr.len() - e.input.len(), message: unexpected(e.input) });
        }
        Err(nom::Err::Incomplete(_)) => {
            return Err(Error::Expression { offset: expr.len(), message: "unexpected end of expression".to_string() });
        }
    };
    build(&ast)
}

fn unexpected(rest: &str) -> String {
    match rest.chars().next() {
        Some(c) => format!("unexpected {c:?}"),
        None => "unexpected end of expression".to_string(),
    }
}

// --- Grammar -----------------------------------------------------------------

fn ws<'a, O>(inner: impl FnMut(&'a str) -> IResult<&'a str, O>) -> impl FnMut(&'a str) -> IResult<&'a str, O> {
    delimited(multispace0, inner, multispace0)
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn ident(input: &str) -> IResult<&str, &str> {
    recognize(pair(satisfy(|c: char| c.is_ascii_alphabetic() || c == '_'), take_while(is_ident_char)))(input)
}

/// `word` not followed by another identifier character.
fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag(word), not(peek(satisfy(is_ident_char))))
}

fn alternation(input: &str) -> IResult<&str, Ast> {
    map(separated_list1(ws(char('|')), sequence), |mut alternatives| {
        if alternatives.len() == 1 { alternatives.remove(0) } else { Ast::Alt(alternatives) }
    })(input)
}

fn sequence(input: &str) -> IResult<&str, Ast> {
    let (input, (group, first)) = alt((
        map(delimited(pair(char('('), multispace0), alternation, pair(multispace0, char(')'))), |ast| {
            (Some(Box::new(ast)), None)
        }),
        map(keyword("C"), |_| (None, None)),
        map(step, |step| (None, Some(step))),
    ))(input)?;
    let (input, more) = many0(preceded(ws(char('.')), step))(input)?;

    let mut steps: Vec<Step> = first.into_iter().collect();
    steps.extend(more);
    Ok((input, Ast::Seq { group, steps }))
}

fn step(input: &str) -> IResult<&str, Step> {
    map(pair(ident, opt(preceded(multispace0, call_args))), |(name, args)| Step { name: name.to_string(), args })(
        input,
    )
}

fn call_args(input: &str) -> IResult<&str, Vec<ArgAst>> {
    delimited(
        char('('),
        terminated(separated_list0(char(','), ws(argument)), opt(char(','))),
        preceded(multispace0, char(')')),
    )(input)
}

fn argument(input: &str) -> IResult<&str, ArgAst> {
    alt((
        map(separated_pair(ident, ws(char('=')), literal), |(name, lit)| ArgAst::Named(name.to_string(), lit)),
        map(literal, ArgAst::Positional),
    ))(input)
}

fn literal(input: &str) -> IResult<&str, Literal> {
    alt((
        map(string_lit, Literal::Str),
        number,
        value(Literal::Null, alt((keyword("null"), keyword("None")))),
        value(Literal::Bool(true), alt((keyword("true"), keyword("True")))),
        value(Literal::Bool(false), alt((keyword("false"), keyword("False")))),
        map(
            delimited(
                char('['),
                terminated(separated_list0(char(','), ws(literal)), opt(char(','))),
                preceded(multispace0, char(']')),
            ),
            Literal::List,
        ),
        map(
            delimited(
                char('{'),
                terminated(separated_list0(char(','), ws(entry)), opt(char(','))),
                preceded(multispace0, char('}')),
            ),
            Literal::Map,
        ),
        map(alternation, Literal::Chain),
    ))(input)
}

fn entry(input: &str) -> IResult<&str, (Key, Literal)> {
    separated_pair(
        alt((map(string_lit, Key::Name), map_res(digit1, |d: &str| d.parse::<usize>().map(Key::Index)))),
        ws(char(':')),
        literal,
    )(input)
}

fn number(input: &str) -> IResult<&str, Literal> {
    let (rest, text) = recognize(tuple((
        opt(char('-')),
        digit1,
        opt(pair(char('.'), digit1)),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)?;

    let parsed = if text.contains(['.', 'e', 'E']) {
        text.parse::<f64>().ok().map(Literal::Float)
    } else {
        text.parse::<i64>().ok().map(Literal::Int)
    };
    match parsed {
        Some(lit) => Ok((rest, lit)),
        None => Err(nom::Err::Error(NomError::new(input, ErrorKind::Digit))),
    }
}

/// Quoted string with backslash escapes. An unterminated string is a hard
/// failure, so alternatives are not tried on it.
fn string_lit(input: &str) -> IResult<&str, String> {
    let mut chars = input.char_indices().peekable();
    let quote = match chars.next() {
        Some((_, q @ ('"' | '\''))) => q,
        _ => return Err(nom::Err::Error(NomError::new(input, ErrorKind::Char))),
    };

    let mut out = String::new();
    while let Some((i, c)) = chars.next() {
        if c == quote {
            return Ok((&input[i + c.len_utf8()..], out));
        }
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some((_, escaped)) = chars.next() else { break };
        match escaped {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            '\\' | '"' | '\'' => out.push(escaped),
            'u' if chars.peek().is_some_and(|&(_, c)| c == '{') => {
                chars.next();
                let mut hex = String::new();
                for (_, c) in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    hex.push(c);
                }
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(c) => out.push(c),
                    None => return Err(nom::Err::Failure(NomError::new(input, ErrorKind::Escaped))),
                }
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    Err(nom::Err::Failure(NomError::new(input, ErrorKind::Char)))
}

// --- Building ----------------------------------------------------------------

fn build(ast: &Ast) -> Result<Chain> {
    match ast {
        Ast::Alt(alternatives) => {
            let mut chains = alternatives.iter().map(build);
            let first = chains.next().unwrap_or_else(|| Ok(Chain::new()))?;
            chains.try_fold(first, |acc, next| Ok(acc | next?))
        }
        Ast::Seq { group, steps } => {
            let mut chain = match group {
                Some(inner) => build(inner)?,
                None => Chain::new(),
            };
            for step in steps {
                chain = match &step.args {
                    None => chain.op(&step.name)?,
                    Some(args) => chain.call(&step.name, build_args(args)?)?,
                };
            }
            chain.close()
        }
    }
}

fn build_args(args: &[ArgAst]) -> Result<Args> {
    args.iter().try_fold(Args::new(), |out, arg| {
        Ok(match arg {
            ArgAst::Positional(lit) => out.arg(build_literal(lit)?),
            ArgAst::Named(name, lit) => out.named(name.clone(), build_literal(lit)?),
        })
    })
}

fn build_literal(lit: &Literal) -> Result<Arg> {
    Ok(match lit {
        Literal::Null => Arg::Null,
        Literal::Bool(b) => Arg::Bool(*b),
        Literal::Int(i) => Arg::Int(*i),
        Literal::Float(x) => Arg::Float(*x),
        Literal::Str(s) => Arg::Str(s.clone()),
        Literal::List(items) => Arg::List(items.iter().map(build_literal).collect::<Result<_>>()?),
        Literal::Map(entries) => {
            Arg::Map(entries.iter().map(|(k, v)| Ok((k.clone(), build_literal(v)?))).collect::<Result<_>>()?)
        }
        Literal::Chain(ast) => Arg::Chain(build(ast)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(expr: &str) -> String {
        parse_chain(expr).unwrap().to_string()
    }

    #[test]
    fn bare_steps_and_root() {
        assert_eq!(label(r#"css("li").map(text)"#), r#"C.css("li").map(C.text)"#);
        assert_eq!(label("C . parent . text"), "C.parent.text");
        assert_eq!(label("C"), "C");
        assert_eq!(label("strip"), "C.strip()");
    }

    #[test]
    fn literals() {
        assert_eq!(
            label(r#"slice(-1, stop=null, step=2)"#),
            r#"C.slice(-1, stop=null, step=2)"#
        );
        assert_eq!(label(r"re_sub('\s+', ' ', flags=2)"), r#"C.re_sub("\\s+", " ", flags=2)"#);
        assert_eq!(label(r#"const([1, 2.5, "x", true, None])"#), r#"C.const([1, 2.5, "x", true, null])"#);
        assert_eq!(
            label(r#"multi({"name": C.text, 0: 'lit'})"#),
            r#"C.multi({"name": C.text, 0: "lit"})"#
        );
    }

    #[test]
    fn alternation_and_groups() {
        assert_eq!(label("attr('title') | text"), r#"C.notnone(C.attr("title"), C.text)"#);
        assert_eq!(
            label("(css('.a') | css('.b')).text"),
            r#"C.notnone(C.css(".a"), C.css(".b")).text"#
        );
        assert_eq!(label("text | tail | const(1)"), "C.notnone(C.notnone(C.text, C.tail), C.const(1))");
    }

    #[test]
    fn labels_parse_back() {
        let source = r#"css("ul").multi([C.css("li").texts, C.css("li").len, "k"]) | const("none")"#;
        let chain = parse_chain(source).unwrap();
        assert_eq!(parse_chain(&chain.to_string()).unwrap(), chain);
    }

    #[test]
    fn syntax_errors_report_offsets() {
        let Error::Expression { offset, .. } = parse_chain(r#"C.css("li") )"#).unwrap_err() else {
            panic!("expected expression error")
        };
        assert_eq!(offset, 12);
        assert!(matches!(parse_chain(r#"css("li"#).unwrap_err(), Error::Expression { .. }));
        assert!(matches!(parse_chain("").unwrap_err(), Error::Expression { offset: 0, .. }));
    }

    #[test]
    fn name_errors_surface_after_parsing() {
        assert!(matches!(parse_chain("css('a').nope").unwrap_err(), Error::UnknownOperation { .. }));
        assert!(matches!(parse_chain("attr").unwrap_err(), Error::Arity { .. }));
        assert!(matches!(parse_chain("text(1)").unwrap_err(), Error::Arity { .. }));
    }
}
