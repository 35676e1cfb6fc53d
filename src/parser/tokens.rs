use nom::{
    bytes::complete::take_while1,
    character::complete::char,
    combinator::all_consuming,
    error::{Error, ErrorKind},
    multi::separated_list1,
    sequence::{delimited, pair},
    IResult,
};

use crate::ast::Value;

/// Split on commas at parenthesis depth 0.
///
/// A stray `)` never drives the depth below zero, so unbalanced input
/// still splits best-effort. Empty input yields one empty segment.
pub fn split_top_level(input: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in input.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                segments.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(&input[start..]);
    segments
}

/// Map a raw token to a typed literal.
pub fn coerce(token: &str) -> Value {
    let token = token.trim();
    match token {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }

    if let Some(number) = parse_number(token) {
        return number;
    }

    if let Some(inner) = unquote(token) {
        return Value::String(inner.to_string());
    }

    Value::String(token.to_string())
}

/// Whole-token numeric parse. Non-finite spellings are not numbers.
fn parse_number(token: &str) -> Option<Value> {
    if let Ok(n) = token.parse::<i64>() {
        return Some(Value::Int(n));
    }
    match token.parse::<f64>() {
        Ok(n) if n.is_finite() => Some(Value::Float(n)),
        _ => None,
    }
}

fn unquote(token: &str) -> Option<&str> {
    ['\'', '"'].into_iter().find_map(|quote| {
        token
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
    })
}

/// A `path(args)` call, e.g. `name.like(foo)` or `department(id,name)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call<'a> {
    pub path: Vec<&'a str>,
    pub args: &'a str,
}

/// Parse an identifier (column, relation, operator name).
pub fn parse_identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)
}

/// Parse a dotted path: `id`, `department.name`, `name.eq`.
pub fn parse_path(input: &str) -> IResult<&str, Vec<&str>> {
    separated_list1(char('.'), parse_identifier)(input)
}

/// Take everything up to the `)` that closes the current depth.
fn balanced(input: &str) -> IResult<&str, &str> {
    let mut depth = 0usize;
    for (i, c) in input.char_indices() {
        match c {
            '(' => depth += 1,
            ')' if depth == 0 => return Ok((&input[i..], &input[..i])),
            ')' => depth -= 1,
            _ => {}
        }
    }
    Err(nom::Err::Error(Error::new(input, ErrorKind::TakeUntil)))
}

/// Parse `path(args)` where the closing paren matches the opening one.
pub fn parse_call(input: &str) -> IResult<&str, Call<'_>> {
    let (input, (path, args)) = pair(parse_path, delimited(char('('), balanced, char(')')))(input)?;
    Ok((input, Call { path, args }))
}

/// The whole token as a call, or `None`.
pub fn call(token: &str) -> Option<Call<'_>> {
    all_consuming(parse_call)(token.trim())
        .ok()
        .map(|(_, call)| call)
}

/// The whole token as a dotted path, or `None`.
pub fn path(token: &str) -> Option<Vec<&str>> {
    all_consuming(parse_path)(token.trim())
        .ok()
        .map(|(_, path)| path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_respects_parens() {
        assert_eq!(
            split_top_level("id,department(id,name),name"),
            vec!["id", "department(id,name)", "name"]
        );
        assert_eq!(
            split_top_level("and(a.eq(1),or(b.eq(2),c.eq(3))),d.eq(4)"),
            vec!["and(a.eq(1),or(b.eq(2),c.eq(3)))", "d.eq(4)"]
        );
    }

    #[test]
    fn test_split_edge_cases() {
        assert_eq!(split_top_level(""), vec![""]);
        assert_eq!(split_top_level("a,,b"), vec!["a", "", "b"]);
        // unbalanced input never raises
        assert_eq!(split_top_level("a(b,c"), vec!["a(b,c"]);
        assert_eq!(split_top_level("a)b,c"), vec!["a)b", "c"]);
    }

    #[test]
    fn test_coerce_order() {
        assert_eq!(coerce(" true "), Value::Bool(true));
        assert_eq!(coerce("false"), Value::Bool(false));
        assert_eq!(coerce("null"), Value::Null);
        assert_eq!(coerce("42"), Value::Int(42));
        assert_eq!(coerce("-3.5"), Value::Float(-3.5));
        assert_eq!(coerce("'42'"), Value::String("42".into()));
        assert_eq!(coerce("\"hi there\""), Value::String("hi there".into()));
        assert_eq!(coerce("foo"), Value::String("foo".into()));
        assert_eq!(coerce("'unterminated"), Value::String("'unterminated".into()));
    }

    #[test]
    fn test_coerce_rejects_non_finite() {
        assert_eq!(coerce("NaN"), Value::String("NaN".into()));
        assert_eq!(coerce("inf"), Value::String("inf".into()));
        assert_eq!(coerce(""), Value::String(String::new()));
    }

    #[test]
    fn test_call() {
        let c = call("name.like(foo)").unwrap();
        assert_eq!(c.path, vec!["name", "like"]);
        assert_eq!(c.args, "foo");

        let c = call(" and(id.eq(1),or(x.eq(2))) ").unwrap();
        assert_eq!(c.path, vec!["and"]);
        assert_eq!(c.args, "id.eq(1),or(x.eq(2))");

        assert_eq!(call("department(*)").unwrap().args, "*");
        assert_eq!(call("id.eq()").unwrap().args, "");
    }

    #[test]
    fn test_call_requires_matching_close() {
        assert!(call("id.eq(1),name.eq(2)").is_none());
        assert!(call("id.eq(1").is_none());
        assert!(call("id.eq(1))").is_none());
        assert!(call("(1)").is_none());
    }

    #[test]
    fn test_path() {
        assert_eq!(path("department.name"), Some(vec!["department", "name"]));
        assert_eq!(path("id"), Some(vec!["id"]));
        assert_eq!(path("a..b"), None);
        assert_eq!(path("na me"), None);
    }
}
