//! Path placeholders and query parameter encoding.

use crate::error::ConfigError;
use once_cell::sync::Lazy;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Matches `{name}` placeholders such as `/user/{uid}/order/{oid}`.
static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^{}]+)\}").expect("placeholder pattern is valid"));

/// Characters left as-is in a path segment. Everything else, `/ ; , ?`
/// included, is percent-encoded.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'=')
    .remove(b':')
    .remove(b'@');

/// Escape a value for use as a single path segment.
pub fn escape_path_segment(value: &str) -> String {
    utf8_percent_encode(value, PATH_SEGMENT).to_string()
}

/// Number of `{name}` placeholders in `template`.
pub fn placeholder_count(template: &str) -> usize {
    PLACEHOLDER.find_iter(template).count()
}

/// Check that `template` is an absolute URL once its placeholders are
/// filled. Placeholders may stand anywhere, the port included.
pub fn validate_template(template: &str) -> Result<(), ConfigError> {
    let filled = PLACEHOLDER.replace_all(template, "0");
    url::Url::parse(&filled)
        .map(|_| ())
        .map_err(|source| ConfigError::InvalidUrl {
            url: template.to_string(),
            source,
        })
}

/// Replace the placeholders of `template`, left to right, with the escaped
/// `values`. The counts must match.
pub fn substitute_path<S: AsRef<str>>(template: &str, values: &[S]) -> Result<String, ConfigError> {
    let expected = placeholder_count(template);
    if expected != values.len() {
        return Err(ConfigError::PathParamCount {
            expected,
            actual: values.len(),
        });
    }

    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for (found, value) in PLACEHOLDER.find_iter(template).zip(values) {
        out.push_str(&template[last..found.start()]);
        out.push_str(&escape_path_segment(value.as_ref()));
        last = found.end();
    }
    out.push_str(&template[last..]);

    Ok(out)
}

/// Query parameters, kept sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    values: BTreeMap<String, Vec<String>>,
}

impl QueryParams {
    /// An empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every value of `key` with `value`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), vec![value.into()]);
    }

    /// Add another value for `key`.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.entry(key.into()).or_default().push(value.into());
    }

    /// Every value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.values.get(key).map(Vec::as_slice)
    }

    /// Whether no parameter is set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `application/x-www-form-urlencoded` form, keys in sorted order.
    pub fn encode(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, values) in &self.values {
            for value in values {
                serializer.append_pair(key, value);
            }
        }
        serializer.finish()
    }
}

/// Flatten a serializable struct into query pairs.
///
/// Each field becomes a key. Scalars give one value, sequences give one
/// value per element, `null` (e.g. `None`) is skipped. Nested objects
/// cannot be expressed as a flat query and are rejected.
pub fn flatten_query<S: Serialize + ?Sized>(
    params: &S,
) -> Result<Vec<(String, Vec<String>)>, ConfigError> {
    let value = serde_json::to_value(params).map_err(|e| ConfigError::Query(e.to_string()))?;
    let fields = match value {
        Value::Object(fields) => fields,
        other => {
            return Err(ConfigError::Query(format!(
                "expected a struct or map, got {}",
                kind_of(&other)
            )))
        }
    };

    let mut pairs = Vec::with_capacity(fields.len());
    for (key, value) in fields {
        let values = match value {
            Value::Null => continue,
            Value::Array(items) => items
                .into_iter()
                .filter(|item| !item.is_null())
                .map(|item| scalar_to_string(&key, item))
                .collect::<Result<Vec<_>, _>>()?,
            scalar => vec![scalar_to_string(&key, scalar)?],
        };
        pairs.push((key, values));
    }

    Ok(pairs)
}

fn scalar_to_string(key: &str, value: Value) -> Result<String, ConfigError> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(ConfigError::Query(format!(
            "field {key:?} is a nested {}",
            kind_of(&other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
