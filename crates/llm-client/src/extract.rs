//! Defensive JSON extraction from LLM completions.
//!
//! Providers are asked for strict JSON but routinely wrap the object in
//! fenced code blocks or surround it with prose. This module locates the
//! first syntactically valid JSON object in the text and parses it, ignoring
//! everything around it.

use serde_json::Value;

use crate::LlmError;

/// Returns the first balanced `{...}` in `raw` that parses as a JSON object,
/// scanning string-and-escape aware so braces inside string literals do not
/// confuse the balance. Fails with a typed error when no candidate parses.
pub fn first_json_object(raw: &str) -> Result<Value, LlmError> {
    let bytes = raw.as_bytes();
    let mut search_from = 0;

    while let Some(offset) = raw[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(end) = balanced_object_end(bytes, start) {
            let candidate = &raw[start..=end];
            if let Ok(value) = serde_json::from_str::<Value>(candidate) {
                if value.is_object() {
                    return Ok(value);
                }
            }
        }
        search_from = start + 1;
    }

    Err(LlmError::parse(format!(
        "no JSON object found in completion ({} bytes)",
        raw.len()
    )))
}

/// Index of the byte closing the object opened at `start`, tracking string
/// literals and escapes. None when the object never closes.
fn balanced_object_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_from_fenced_block() {
        let raw = "```json\n{\"action_type\":\"send_text\",\"value\":\"10\"}\n```";
        let value = first_json_object(raw).unwrap();
        assert_eq!(value["action_type"], "send_text");
        assert_eq!(value["value"], "10");
    }

    #[test]
    fn test_extracts_from_surrounding_prose() {
        let raw = "Result:\n{\"action_type\":\"click_inline\",\"row\":0,\"col\":1}\nThanks";
        let value = first_json_object(raw).unwrap();
        assert_eq!(value["action_type"], "click_inline");
        assert_eq!(value["row"], 0);
        assert_eq!(value["col"], 1);
    }

    #[test]
    fn test_braces_inside_strings_do_not_break_balance() {
        let raw = r#"note {"value":"curly } inside","ok":true} tail"#;
        let value = first_json_object(raw).unwrap();
        assert_eq!(value["value"], "curly } inside");
        assert_eq!(value["ok"], true);
    }

    #[test]
    fn test_skips_invalid_prefix_object() {
        // First "{" opens something that never parses; the real object follows.
        let raw = "{not json} then {\"action_type\":\"stop\"}";
        let value = first_json_object(raw).unwrap();
        assert_eq!(value["action_type"], "stop");
    }

    #[test]
    fn test_no_object_is_typed_error() {
        let err = first_json_object("no json here").unwrap_err();
        assert!(err.status_code.is_none());
        assert!(err.message.contains("no JSON object"));
    }
}
