//! Reply extraction from provider response documents.
//!
//! Generation providers disagree on response shape and change it between
//! versions. Instead of binding a rigid schema, extraction walks an ordered
//! chain of known shapes and degrades to an empty string when none match.
//! The function is total: any JSON document is accepted, nothing panics.

use serde_json::Value;

/// Pull the reply text out of a provider response document.
///
/// Strategies, first non-empty result wins:
/// 1. a top-level `"text"` string
/// 2. `candidates[0].content` (a single object or an array of objects),
///    concatenating every `parts` entry's `"text"` (or `"outputText"`)
///    in document order with no separator
///
/// Returns the trimmed reply, or an empty string when the document carries
/// no recognizable text.
#[must_use]
pub fn extract_reply_text(doc: &Value) -> String {
    if let Some(text) = top_level_text(doc) {
        return text;
    }
    if let Some(text) = candidate_parts_text(doc) {
        return text;
    }
    String::new()
}

fn top_level_text(doc: &Value) -> Option<String> {
    let text = doc.get("text")?.as_str()?.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn candidate_parts_text(doc: &Value) -> Option<String> {
    let candidate = doc.get("candidates")?.as_array()?.first()?;
    let content = candidate.get("content")?;
    // Some provider versions return content as a single object, others as an
    // array of entries. Normalize before walking parts.
    let entries: Vec<&Value> = match content {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };

    let mut out = String::new();
    for entry in entries {
        let Some(parts) = entry.get("parts").and_then(Value::as_array) else {
            continue;
        };
        for part in parts {
            if let Some(text) = part_text(part) {
                out.push_str(text);
            }
        }
    }

    let trimmed = out.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn part_text(part: &Value) -> Option<&str> {
    part.get("text")
        .and_then(Value::as_str)
        .or_else(|| part.get("outputText").and_then(Value::as_str))
}
