//! Coercion of loosely typed document values into canonical typed values.
//!
//! Deployment documents are written by hand, so the same setting may arrive
//! as a YAML boolean, a quoted string such as `"yes"`, or a number. These
//! helpers accept the forms people actually write and reject everything else
//! with a [`ConfigError::InvalidValue`] naming the offending field.

use serde_yaml::Value;

use crate::error::ConfigError;

const TRUE_WORDS: &[&str] = &["1", "true", "yes", "y", "on"];
const FALSE_WORDS: &[&str] = &["0", "false", "no", "n", "off", ""];

/// Returns whether a looked-up value counts as unset (absent or `null`).
#[must_use]
pub const fn is_unset(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

/// Parses the textual boolean forms accepted in documents.
///
/// Matching is case-insensitive and ignores surrounding whitespace.
#[must_use]
pub fn parse_bool_str(raw: &str) -> Option<bool> {
    let normalised = raw.trim().to_ascii_lowercase();
    if TRUE_WORDS.contains(&normalised.as_str()) {
        Some(true)
    } else if FALSE_WORDS.contains(&normalised.as_str()) {
        Some(false)
    } else {
        None
    }
}

/// Coerces a value into a boolean.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] for values that are not a boolean,
/// `0`/`1`, or one of the accepted words.
pub fn to_bool(value: &Value, field: &str) -> Result<bool, ConfigError> {
    let parsed = match value {
        Value::Null => Some(false),
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => match number.as_u64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(text) => parse_bool_str(text),
        Value::Sequence(_) | Value::Mapping(_) | Value::Tagged(_) => None,
    };
    parsed.ok_or_else(|| invalid(field, format!("expected a boolean, got {}", describe(value))))
}

/// Coerces a scalar into a trimmed string.
///
/// Numbers and booleans are rendered in their canonical textual form. Every
/// string ends up on a single line of some generated file, so control
/// characters (newlines included) left after trimming are rejected.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] for `null`, sequences, mappings and
/// strings carrying control characters.
pub fn to_string(value: &Value, field: &str) -> Result<String, ConfigError> {
    match value {
        Value::String(text) => single_line(text.trim(), field).map(str::to_owned),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) | Value::Tagged(_) => Err(invalid(
            field,
            format!("expected a string, got {}", describe(value)),
        )),
    }
}

/// Coerces a scalar into a string that must not be empty.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] when the value is not a scalar or is
/// blank after trimming.
pub fn to_non_empty_string(value: &Value, field: &str) -> Result<String, ConfigError> {
    let text = to_string(value, field)?;
    if text.is_empty() {
        return Err(invalid(field, String::from("must not be empty")));
    }
    Ok(text)
}

/// Coerces an integer or numeric string into a `u32`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] for negative, fractional, oversized
/// or non-numeric values.
pub fn to_u32(value: &Value, field: &str) -> Result<u32, ConfigError> {
    let parsed = match value {
        Value::Number(number) => number.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(text) => text.trim().parse::<u32>().ok(),
        Value::Null | Value::Bool(_) | Value::Sequence(_) | Value::Mapping(_) | Value::Tagged(_) => {
            None
        }
    };
    parsed.ok_or_else(|| {
        invalid(
            field,
            format!("expected a non-negative integer, got {}", describe(value)),
        )
    })
}

/// Coerces an integer or numeric string into a TCP port.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] unless the value is in `1..=65535`.
pub fn to_port(value: &Value, field: &str) -> Result<u16, ConfigError> {
    let number = to_u32(value, field)?;
    u16::try_from(number)
        .ok()
        .filter(|port| *port != 0)
        .ok_or_else(|| invalid(field, format!("port {number} is out of range")))
}

/// Coerces a sequence of scalars, or a comma-separated string, into a list.
///
/// Blank items are dropped; order is preserved. `null` yields an empty list.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] when the value is a mapping or a
/// sequence item is not a scalar.
pub fn to_string_list(value: &Value, field: &str) -> Result<Vec<String>, ConfigError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(text) => text
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| single_line(item, field).map(str::to_owned))
            .collect(),
        Value::Sequence(items) => {
            let mut list = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                let text = to_string(item, &format!("{field}[{index}]"))?;
                if !text.is_empty() {
                    list.push(text);
                }
            }
            Ok(list)
        }
        Value::Bool(_) | Value::Number(_) | Value::Mapping(_) | Value::Tagged(_) => Err(invalid(
            field,
            format!("expected a list of strings, got {}", describe(value)),
        )),
    }
}

/// Passes `text` through unless it contains a control character.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] naming `field` otherwise.
pub fn single_line<'t>(text: &'t str, field: &str) -> Result<&'t str, ConfigError> {
    if text.chars().any(char::is_control) {
        Err(invalid(
            field,
            String::from("must not contain newlines or other control characters"),
        ))
    } else {
        Ok(text)
    }
}

fn invalid(field: &str, reason: String) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => String::from("null"),
        Value::Bool(flag) => format!("'{flag}'"),
        Value::Number(number) => format!("'{number}'"),
        Value::String(text) => format!("'{text}'"),
        Value::Sequence(_) => String::from("a list"),
        Value::Mapping(_) => String::from("a mapping"),
        Value::Tagged(_) => String::from("a tagged value"),
    }
}
