//! Response Repair
//!
//! Generated payloads are usually JSON wrapped in prose, and now and then missing a
//! single delimiter. Recovery is deliberately narrow: take the outermost object,
//! parse it, and if the parser stopped at a missing `,` or `:` insert that one
//! character and parse once more. Anything else is a [`ApiError::RepairFailure`].

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ApiError;

/// Bytes of context kept on each side of the failure point.
pub const EXCERPT_RADIUS: usize = 40;

/// Slice from the first `{` to the last `}` inclusive.
pub fn extract_object(raw: &str) -> Result<&str, ApiError> {
    let start = raw.find('{');
    let end = raw.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if start < end => Ok(&raw[start..=end]),
        _ => Err(ApiError::RepairFailure {
            message: "no JSON object in generator output".to_string(),
            excerpt: excerpt(raw, 0),
        }),
    }
}

/// Parse generator output into a JSON value, repairing at most one missing delimiter.
pub fn repair_json(raw: &str) -> Result<Value, ApiError> {
    let body = extract_object(raw)?;
    let err = match serde_json::from_str::<Value>(body) {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };

    let Some(delimiter) = missing_delimiter(&err) else {
        return Err(failure(body, &err));
    };
    let Some(offset) = byte_offset(body, err.line(), err.column()) else {
        return Err(failure(body, &err));
    };

    let mut patched = String::with_capacity(body.len() + 1);
    patched.push_str(&body[..offset]);
    patched.push(delimiter);
    patched.push_str(&body[offset..]);
    debug!(%delimiter, offset, "Inserted missing delimiter into generator output");

    serde_json::from_str::<Value>(&patched).map_err(|second| {
        warn!(error = %second, "Generator output still invalid after repair");
        ApiError::RepairFailure {
            message: format!("{err}; after inserting {delimiter:?}: {second}"),
            excerpt: excerpt(body, offset),
        }
    })
}

fn missing_delimiter(err: &serde_json::Error) -> Option<char> {
    if !err.is_syntax() {
        return None;
    }
    let message = err.to_string();
    if message.starts_with("expected `,` or `}`") || message.starts_with("expected `,` or `]`") {
        Some(',')
    } else if message.starts_with("expected `:`") {
        Some(':')
    } else {
        None
    }
}

/// Byte offset of a 1-based line and column as reported by the parser.
fn byte_offset(text: &str, line: usize, column: usize) -> Option<usize> {
    if line == 0 || column == 0 {
        return None;
    }
    let line_start = if line == 1 {
        0
    } else {
        text.match_indices('\n').nth(line - 2).map(|(i, _)| i + 1)?
    };
    let offset = line_start + column - 1;
    (offset <= text.len() && text.is_char_boundary(offset)).then_some(offset)
}

fn failure(body: &str, err: &serde_json::Error) -> ApiError {
    let offset = byte_offset(body, err.line(), err.column()).unwrap_or(0);
    warn!(error = %err, "Generator output is not repairable");
    ApiError::RepairFailure {
        message: err.to_string(),
        excerpt: excerpt(body, offset),
    }
}

/// Up to [`EXCERPT_RADIUS`] bytes either side of `offset`, widened to char boundaries.
pub fn excerpt(text: &str, offset: usize) -> String {
    let offset = offset.min(text.len());
    let mut start = offset.saturating_sub(EXCERPT_RADIUS);
    while !text.is_char_boundary(start) {
        start -= 1;
    }
    let mut end = (offset + EXCERPT_RADIUS).min(text.len());
    while !text.is_char_boundary(end) {
        end += 1;
    }
    text[start..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_surrounding_prose() {
        let value = repair_json("Here you go:\n{\"a\": [1, 2]}\nThanks!").unwrap();
        assert_eq!(value, json!({"a": [1, 2]}));
    }

    #[test]
    fn inserts_missing_comma_between_members() {
        let value = repair_json(r#"{"a":1 "b":2}"#).unwrap();
        assert_eq!(value, json!({"a": 1, "b": 2}));
    }

    #[test]
    fn inserts_missing_comma_on_later_line() {
        let raw = "{\n  \"items\": [\n    \"x\"\n    \"y\"\n  ]\n}";
        let value = repair_json(raw).unwrap();
        assert_eq!(value, json!({"items": ["x", "y"]}));
    }

    #[test]
    fn inserts_missing_colon() {
        let value = repair_json(r#"{"a" 1}"#).unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn only_one_repair_is_attempted() {
        let err = repair_json(r#"{"a":1 "b":2 "c":3}"#).unwrap_err();
        assert!(matches!(err, ApiError::RepairFailure { .. }));
    }

    #[test]
    fn garbage_is_a_repair_failure_with_excerpt() {
        match repair_json("{ this is not json }") {
            Err(ApiError::RepairFailure { excerpt, .. }) => {
                assert!(excerpt.contains("this is not json"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            repair_json("no braces at all"),
            Err(ApiError::RepairFailure { .. })
        ));
    }

    #[test]
    fn excerpt_is_bounded_and_char_safe() {
        let text = "é".repeat(100);
        let cut = excerpt(&text, 101);
        assert!(cut.len() <= 2 * EXCERPT_RADIUS + 2);
        assert!(cut.chars().all(|c| c == 'é'));
    }
}
