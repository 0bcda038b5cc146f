//! # Value Normalizer
//!
//! Pure functions that sanitize property values for one output format.
//!
//! - Tabular (CSV): primary delimiter removed, list delimiter and line breaks
//!   become spaces, quotes removed; lists are joined with the list delimiter.
//! - Symbolic (MeTTa): same stripping, whitespace becomes `_`, parentheses are
//!   escaped with a backslash; lists become `(a b c)`; absence becomes `N/A`.
//! - Graph exchange (NetworkX JSON): native JSON types are preserved and
//!   absent values are omitted.
//!
//! Every text rendering is idempotent: normalizing an already-normalized
//! scalar returns it unchanged.

use crate::primitives::{ARRAY_DELIMITER, CSV_DELIMITER, METTA_NULL};
use crate::{PropertyValue, Scalar};
use serde_json::Value as JsonValue;

/// Target representation of a normalized value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Tabular,
    Symbolic,
    GraphExchange,
}

/// Result of normalizing one property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// Text for a delimited or symbolic format.
    Text(String),
    /// Native JSON value for the graph-exchange format.
    Native(JsonValue),
    /// The field is left out entirely.
    Omitted,
}

impl Normalized {
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s),
            Self::Native(_) | Self::Omitted => None,
        }
    }
}

/// Normalize a (possibly missing) property value for `format`.
///
/// `max_len` caps each rendered scalar, counted in characters.
pub fn normalize(
    value: Option<&PropertyValue>,
    format: OutputFormat,
    max_len: Option<usize>,
) -> Normalized {
    match format {
        OutputFormat::Tabular => Normalized::Text(tabular_value(value, max_len)),
        OutputFormat::Symbolic => Normalized::Text(symbolic_value(value, max_len)),
        OutputFormat::GraphExchange => value
            .and_then(|v| exchange_value(v, max_len))
            .map_or(Normalized::Omitted, Normalized::Native),
    }
}

// =============================================================================
// IDENTIFIERS & FILE NAMES
// =============================================================================

/// Normalize an identifier into a join key.
///
/// Lowercase, trim, then spaces and colons become underscores. Every writer
/// applies this to vertex ids and edge endpoint ids alike, so `"Node A:1"`
/// and `"node a:1"` meet at `"node_a_1"`.
pub fn normalize_id(raw: &str) -> String {
    raw.trim().to_lowercase().replace([' ', ':'], "_")
}

/// Make a label safe to embed in a file name inside the output directory.
pub fn file_stem(label: &str) -> String {
    label.replace(['/', '\\', '\0'], "_")
}

// =============================================================================
// TABULAR
// =============================================================================

/// Render a value as one CSV field. Absence renders as the empty string.
pub fn tabular_value(value: Option<&PropertyValue>, max_len: Option<usize>) -> String {
    match value {
        None | Some(PropertyValue::Null) => String::new(),
        Some(PropertyValue::Scalar(s)) => tabular_scalar(&s.to_string(), max_len),
        Some(PropertyValue::List(items)) => {
            let mut field = String::new();
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    field.push(ARRAY_DELIMITER);
                }
                field.push_str(&tabular_scalar(&item.to_string(), max_len));
            }
            field
        }
    }
}

/// Sanitize one scalar for a CSV field.
pub fn tabular_scalar(raw: &str, max_len: Option<usize>) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            CSV_DELIMITER | '\'' | '"' => {}
            ARRAY_DELIMITER | '\n' | '\r' => out.push(' '),
            c => out.push(c),
        }
    }
    truncate_chars(out, max_len)
}

fn truncate_chars(s: String, max_len: Option<usize>) -> String {
    match max_len {
        Some(max) if s.chars().count() > max => s.chars().take(max).collect(),
        _ => s,
    }
}

// =============================================================================
// SYMBOLIC
// =============================================================================

/// Render a value as a MeTTa atom or list expression.
pub fn symbolic_value(value: Option<&PropertyValue>, max_len: Option<usize>) -> String {
    match value {
        None | Some(PropertyValue::Null) => METTA_NULL.to_string(),
        Some(PropertyValue::Scalar(s)) => symbolic_scalar(&s.to_string(), max_len),
        Some(PropertyValue::List(items)) => {
            let rendered: Vec<String> = items
                .iter()
                .map(|item| symbolic_scalar(&item.to_string(), max_len))
                .collect();
            format!("({})", rendered.join(" "))
        }
    }
}

/// Sanitize one scalar into a single MeTTa atom.
///
/// Works on units where an escaped parenthesis (`\(`) counts as one
/// character, so truncation never separates an escape from its target and a
/// second pass finds nothing left to escape.
pub fn symbolic_scalar(raw: &str, max_len: Option<usize>) -> String {
    if raw == METTA_NULL {
        return METTA_NULL.to_string();
    }
    let mut units: Vec<String> = Vec::with_capacity(raw.len());

    for c in raw.chars() {
        let c = match c {
            CSV_DELIMITER | '\'' | '"' => continue,
            ARRAY_DELIMITER => '_',
            c if c.is_whitespace() => '_',
            c => c,
        };

        if c == '(' || c == ')' {
            match units.last_mut() {
                Some(last) if last == "\\" => last.push(c),
                _ => units.push(format!("\\{c}")),
            }
        } else {
            units.push(c.to_string());
        }
    }

    if let Some(max) = max_len {
        units.truncate(max);
    }

    // A dangling backslash would escape the closing parenthesis of the
    // enclosing expression.
    while units.last().is_some_and(|u| u == "\\") {
        units.pop();
    }

    if units.is_empty() {
        return METTA_NULL.to_string();
    }
    units.concat()
}

// =============================================================================
// GRAPH EXCHANGE
// =============================================================================

/// Convert a value to native JSON. `None` means the field is omitted.
pub fn exchange_value(value: &PropertyValue, max_len: Option<usize>) -> Option<JsonValue> {
    match value {
        PropertyValue::Null => None,
        PropertyValue::Scalar(s) => Some(exchange_scalar(s, max_len)),
        PropertyValue::List(items) => Some(JsonValue::Array(
            items.iter().map(|s| exchange_scalar(s, max_len)).collect(),
        )),
    }
}

fn exchange_scalar(scalar: &Scalar, max_len: Option<usize>) -> JsonValue {
    match scalar {
        Scalar::Bool(b) => JsonValue::Bool(*b),
        Scalar::Int(n) => JsonValue::from(*n),
        Scalar::Float(x) => serde_json::Number::from_f64(*x).map_or(JsonValue::Null, JsonValue::Number),
        Scalar::Text(s) => JsonValue::String(truncate_chars(s.clone(), max_len)),
    }
}

// =============================================================================
// TESTS
// =============================================================================
