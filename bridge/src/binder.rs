//! Named-parameter binding
//!
//! Rewrites `@name` placeholders in a statement template into the driver's
//! positional marker and collects the bound values in occurrence order.
//!
//! The scan is purely lexical over the whole statement: a `@name` inside a
//! string literal or a comment is still treated as a placeholder, and there is
//! no escape syntax for a literal `@name`. System variables such as
//! `@@version` are scanned as `@version`. The bridge is an operator tool fed
//! trusted templates, so statements that need those forms must pass them in
//! as parameters instead.

use regex::{NoExpand, Regex};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::error::BridgeError;

/// Positional placeholder understood by the driver
pub const POSITIONAL_MARKER: &str = "?";

/// Parameter map as received from the caller
pub type Params = HashMap<String, ParamValue>;

/// A scalar parameter value crossing from JSON into the driver
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    /// Convert a JSON value into a parameter, rejecting arrays and objects
    pub fn from_json(name: &str, value: Value) -> Result<Self, BridgeError> {
        match value {
            Value::Null => Ok(Self::Null),
            Value::Bool(b) => Ok(Self::Bool(b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Integer(i))
                } else if n.is_u64() {
                    Err(BridgeError::MalformedRequest(format!(
                        "Parameter '{}' is out of range for a 64-bit signed integer",
                        name
                    )))
                } else {
                    n.as_f64().map(Self::Float).ok_or_else(|| {
                        BridgeError::MalformedRequest(format!(
                            "Parameter '{}' is not a representable number",
                            name
                        ))
                    })
                }
            }
            Value::String(s) => Ok(Self::Text(s)),
            Value::Array(_) | Value::Object(_) => Err(BridgeError::MalformedRequest(format!(
                "Parameter '{}' must be a string, number, boolean or null",
                name
            ))),
        }
    }
}

/// Convert a JSON object into a parameter map
pub fn params_from_json(map: serde_json::Map<String, Value>) -> Result<Params, BridgeError> {
    map.into_iter()
        .map(|(name, value)| {
            let param = ParamValue::from_json(&name, value)?;
            Ok((name, param))
        })
        .collect()
}

/// A template rewritten for positional binding
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    /// Statement text with every placeholder replaced by [`POSITIONAL_MARKER`]
    pub rewritten_text: String,
    /// One value per placeholder, in placeholder order
    pub values: Vec<ParamValue>,
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"@([A-Za-z0-9_]+)").expect("placeholder pattern is valid"))
}

/// Names referenced by `text`, left to right, repeats included
pub fn scan_names(text: &str) -> Vec<String> {
    placeholder_pattern()
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Distinct names in first-occurrence order
fn expected_names(occurrences: &[String]) -> Vec<String> {
    let mut expected: Vec<String> = Vec::new();
    for name in occurrences {
        if !expected.contains(name) {
            expected.push(name.clone());
        }
    }
    expected
}

/// Bind `params` to the placeholders of `text`
///
/// Fails with [`BridgeError::MissingParameter`] naming the first referenced
/// name that has no value. `params` is never modified, and parameters the
/// template does not reference are ignored.
pub fn bind(text: &str, params: &Params) -> Result<BoundStatement, BridgeError> {
    let occurrences = scan_names(text);

    if let Some(missing) = occurrences.iter().find(|name| !params.contains_key(*name)) {
        return Err(BridgeError::MissingParameter {
            name: missing.clone(),
            expected: expected_names(&occurrences),
        });
    }

    if occurrences.is_empty() {
        return Ok(BoundStatement {
            rewritten_text: text.to_string(),
            values: Vec::new(),
        });
    }

    let rewritten_text = placeholder_pattern()
        .replace_all(text, NoExpand(POSITIONAL_MARKER))
        .into_owned();

    let values = occurrences
        .iter()
        .filter_map(|name| params.get(name).cloned())
        .collect();

    Ok(BoundStatement {
        rewritten_text,
        values,
    })
}
