//! Raw query parameters.
//!
//! The compiler consumes a flat mapping from parameter name to either one
//! string or a list of strings. [`QueryParams::parse`] builds that mapping
//! from a URL query string; callers with their own query-string parser can
//! fill a [`QueryParams`] directly.

use std::collections::BTreeMap;
use url::form_urlencoded;

/// A single parameter's raw value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Single(String),
    List(Vec<String>),
}

impl ParamValue {
    /// All raw fragments, in order.
    pub fn fragments(&self) -> Vec<&str> {
        match self {
            ParamValue::Single(s) => vec![s.as_str()],
            ParamValue::List(items) => items.iter().map(String::as_str).collect(),
        }
    }

    fn push(&mut self, value: String) {
        match self {
            ParamValue::Single(first) => {
                let first = std::mem::take(first);
                *self = ParamValue::List(vec![first, value]);
            }
            ParamValue::List(items) => items.push(value),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Single(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Single(v)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(v: Vec<String>) -> Self {
        ParamValue::List(v)
    }
}

impl From<Vec<&str>> for ParamValue {
    fn from(v: Vec<&str>) -> Self {
        ParamValue::List(v.into_iter().map(String::from).collect())
    }
}

/// Query parameters by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    params: BTreeMap<String, ParamValue>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a URL query string such as `select=id,name&sort=-id`.
    ///
    /// A leading `?` is ignored. Repeated keys, and keys written as
    /// `key[]` or `key[0]`, collect into [`ParamValue::List`].
    pub fn parse(raw: &str) -> Self {
        let raw = raw.strip_prefix('?').unwrap_or(raw);
        let mut params = Self::new();

        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            match split_list_key(&key) {
                Some(base) => params.push_list(base, value.into_owned()),
                None => params.push(key.into_owned(), value.into_owned()),
            }
        }

        params
    }

    /// Set `key`, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.params.insert(key.into(), value.into());
    }

    /// Append `value` under `key`, turning an existing value into a list.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let (key, value) = (key.into(), value.into());
        match self.params.get_mut(&key) {
            Some(existing) => existing.push(value),
            None => {
                self.params.insert(key, ParamValue::Single(value));
            }
        }
    }

    fn push_list(&mut self, key: &str, value: String) {
        match self.params.get_mut(key) {
            Some(existing) => existing.push(value),
            None => {
                self.params
                    .insert(key.to_string(), ParamValue::List(vec![value]));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.params.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K, V> FromIterator<(K, V)> for QueryParams
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

/// `filter[]` and `filter[3]` both name the list `filter`.
fn split_list_key(key: &str) -> Option<&str> {
    let (base, rest) = key.split_once('[')?;
    let index = rest.strip_suffix(']')?;
    if base.is_empty() || !index.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let params = QueryParams::parse("?select=id,name&limit=10");
        assert_eq!(params.get("select"), Some(&ParamValue::from("id,name")));
        assert_eq!(params.get("limit"), Some(&ParamValue::from("10")));
        assert_eq!(params.get("offset"), None);
    }

    #[test]
    fn test_parse_decodes_percent_and_plus() {
        let params = QueryParams::parse("filter=name.like(%27Data+Structures%27)");
        assert_eq!(
            params.get("filter"),
            Some(&ParamValue::from("name.like('Data Structures')"))
        );
    }

    #[test]
    fn test_repeated_and_bracket_keys_become_lists() {
        let params = QueryParams::parse("sort=-id&sort=name&filter[]=id.eq(1)&filter[1]=name.eq(x)");
        assert_eq!(params.get("sort"), Some(&ParamValue::from(vec!["-id", "name"])));
        assert_eq!(
            params.get("filter"),
            Some(&ParamValue::from(vec!["id.eq(1)", "name.eq(x)"]))
        );
    }

    #[test]
    fn test_nested_object_keys_are_kept_verbatim() {
        let params = QueryParams::parse("select[department]=id");
        assert_eq!(params.get("select"), None);
        assert!(params.get("select[department]").is_some());
    }

    #[test]
    fn test_empty_query() {
        assert!(QueryParams::parse("").is_empty());
        assert!(QueryParams::parse("?").is_empty());
    }
}
