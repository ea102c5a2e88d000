//! Tolerant JSON handling for tool and model output.
//!
//! Tools and models sometimes wrap JSON in code fences, prefix it with log
//! noise, leave trailing commas or stop before the closing brackets. The
//! helpers here recover what they can and report `Parse` otherwise.

use serde_json::Value;

use crate::error::{MemoryError, Result};

/// Ordered candidate locations for a session id in a `session-create` response.
/// The first non-empty string wins.
pub const SESSION_ID_PATHS: &[&[&str]] = &[
    &["id"],
    &["session_id"],
    &["sessionId"],
    &["result", "id"],
    &["result", "session_id"],
    &["result", "sessionId"],
    &["data", "id"],
    &["data", "session_id"],
    &["data", "sessionId"],
];

/// Scans from an opening bracket at byte 0, honoring string literals.
///
/// Returns the byte index one past the matching closer, or the stack of
/// closers still missing when the input ends first.
fn scan_balanced(text: &str) -> std::result::Result<usize, Vec<char>> {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (index, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.last() == Some(&ch) {
                    stack.pop();
                    if stack.is_empty() {
                        return Ok(index + ch.len_utf8());
                    }
                }
            }
            _ => {}
        }
    }

    if in_string {
        stack.push('"');
    }
    Err(stack)
}

/// First balanced `{...}` substring, string-literal aware.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let mut offset = 0;
    while let Some(start) = text[offset..].find('{') {
        let begin = offset + start;
        if let Ok(end) = scan_balanced(&text[begin..]) {
            return Some(&text[begin..begin + end]);
        }
        offset = begin + 1;
    }
    None
}

fn strip_code_fences(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn remove_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (index, &ch) in chars.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            out.push(ch);
            continue;
        }
        if ch == '"' {
            in_string = true;
        }
        if ch == ',' {
            let next = chars[index + 1..].iter().find(|c| !c.is_whitespace());
            if matches!(next, Some('}') | Some(']') | None) {
                continue;
            }
        }
        out.push(ch);
    }
    out
}

/// Best-effort repair pass. Returns `None` when nothing parseable remains.
pub fn repair_json(raw: &str) -> Option<Value> {
    let unfenced = strip_code_fences(raw.trim());
    let text = unfenced.trim();
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Some(value);
    }

    let start = text.find(|c: char| c == '{' || c == '[')?;
    let tail = &text[start..];
    let candidate = match scan_balanced(tail) {
        Ok(end) => tail[..end].to_string(),
        Err(missing) => {
            let mut patched = tail.trim_end().to_string();
            for closer in missing.iter().rev() {
                patched.push(*closer);
            }
            patched
        }
    };

    serde_json::from_str::<Value>(&candidate)
        .ok()
        .or_else(|| serde_json::from_str::<Value>(&remove_trailing_commas(&candidate)).ok())
}

/// Parses JSON output of a tool verb, falling back to the repair pass.
pub fn parse_tool_json(verb: &str, raw: &str) -> Result<Value> {
    repair_json(raw).ok_or_else(|| {
        let preview: String = raw.chars().take(120).collect();
        MemoryError::Parse(format!("{} returned non-JSON output: {}", verb, preview))
    })
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(*key))
}

/// Pulls a session id out of a `session-create` response following [`SESSION_ID_PATHS`].
pub fn extract_session_id(value: &Value) -> Option<String> {
    SESSION_ID_PATHS.iter().find_map(|path| {
        lookup(value, path)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_json_object_skips_braces_in_strings() {
        let text = r#"Sure! {"reason": "uses } brace", "need_memory": true} trailing"#;
        let object = extract_json_object(text).unwrap();
        let value: Value = serde_json::from_str(object).unwrap();
        assert_eq!(value["need_memory"], json!(true));
    }

    #[test]
    fn test_extract_json_object_none() {
        assert!(extract_json_object("no json here").is_none());
        assert!(extract_json_object("{ unterminated").is_none());
    }

    #[test]
    fn test_repair_code_fence_and_noise() {
        let raw = "loading index...\n```json\n{\"id\": \"s-1\"}\n```";
        assert_eq!(repair_json(raw).unwrap(), json!({"id": "s-1"}));
    }

    #[test]
    fn test_repair_trailing_comma_and_missing_closer() {
        assert_eq!(repair_json(r#"{"a": [1, 2,], }"#).unwrap(), json!({"a": [1, 2]}));
        assert_eq!(repair_json(r#"{"a": {"b": 1"#).unwrap(), json!({"a": {"b": 1}}));
    }

    #[test]
    fn test_parse_tool_json_fails_on_garbage() {
        let err = parse_tool_json("search", "segfault").unwrap_err();
        assert!(matches!(err, MemoryError::Parse(_)));
    }

    #[test]
    fn test_extract_session_id_precedence() {
        assert_eq!(extract_session_id(&json!({"id": "top"})).as_deref(), Some("top"));
        assert_eq!(
            extract_session_id(&json!({"id": "", "sessionId": "camel"})).as_deref(),
            Some("camel")
        );
        assert_eq!(
            extract_session_id(&json!({"result": {"session_id": "r"}, "data": {"id": "d"}}))
                .as_deref(),
            Some("r")
        );
        assert_eq!(
            extract_session_id(&json!({"data": {"sessionId": "d"}})).as_deref(),
            Some("d")
        );
        assert_eq!(extract_session_id(&json!({"id": 42})), None);
        assert_eq!(extract_session_id(&json!({"status": "ok"})), None);
    }
}
