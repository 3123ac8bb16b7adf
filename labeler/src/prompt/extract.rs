//! Recovery of the `{"labels": [...]}` object from model output.
//!
//! Models asked for bare JSON still wrap it in prose now and then. The whole
//! text is tried as a JSON object first; failing that, every occurrence of a
//! `labels` key is traced back to the innermost `{` still open there, the
//! balanced span from there is cut out and parsed. The first span that parses wins.

use serde_json::{Map, Value};

const LABELS_KEYS: [&str; 2] = ["\"labels\"", "'labels'"];

pub fn extract_labels_object(text: &str) -> Option<Map<String, Value>> {
    let text = text.trim();
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text) {
        return Some(map);
    }

    let bytes = text.as_bytes();
    for key in LABELS_KEYS {
        for (idx, _) in text.match_indices(key) {
            let Some(start) = enclosing_open_brace(bytes, idx) else {
                continue;
            };
            let Some(end) = balanced_end(bytes, start) else {
                continue;
            };
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&text[start..=end]) {
                return Some(map);
            }
        }
    }

    None
}

/// Index of the innermost `{` still open at `idx`.
///
/// Braces inside double-quoted strings do not count. Quotes outside of any
/// object are prose and do not start a string.
fn enclosing_open_brace(bytes: &[u8], idx: usize) -> Option<usize> {
    let mut open = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().take(idx) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' if !open.is_empty() => in_string = true,
            b'{' => open.push(i),
            b'}' => {
                open.pop();
            }
            _ => {}
        }
    }
    open.last().copied()
}

/// Index of the `}` that brings the depth opened at `start` back to zero.
/// Braces inside double-quoted strings do not count.
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
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

/// Label names listed under `labels`, ignoring non-string entries.
pub fn labels_from_object(object: &Map<String, Value>) -> Vec<String> {
    object
        .get("labels")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
