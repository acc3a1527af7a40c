use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::types::CandidateRecord;
use super::StructuringError;

/// First triple-backtick block, optional `json` language tag.
static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[ \t]*(?i:json)?[ \t]*\r?\n?(.*?)```").unwrap());

/// Decode the model's reply into a candidate record.
///
/// Fences are stripped first. When the cleaned text still does not decode,
/// the outermost `{ ... }` slice is tried once. Anything other than a
/// non-empty JSON object is rejected.
pub fn parse_candidate(response: &str) -> Result<CandidateRecord, StructuringError> {
    let cleaned = strip_code_fences(response);
    let unparsable = |reason: String| StructuringError::UnparsableResponse {
        reason,
        raw: response.to_string(),
        cleaned: cleaned.clone(),
    };

    let value: Value = match serde_json::from_str(&cleaned) {
        Ok(value) => value,
        Err(e) => match outermost_object(&cleaned).and_then(|s| serde_json::from_str(s).ok()) {
            Some(value) => {
                tracing::debug!("Recovered JSON object from surrounding text");
                value
            }
            None => return Err(unparsable(e.to_string())),
        },
    };

    match value {
        Value::Object(map) if !map.is_empty() => Ok(CandidateRecord::from_map(map)),
        Value::Object(_) => Err(unparsable("empty object".into())),
        other => Err(unparsable(format!("expected object, got {}", json_kind(&other)))),
    }
}

/// Remove Markdown code fencing around a reply.
///
/// Handles a closed triple fence anywhere in the text, an unclosed opening
/// fence, and single-backtick inline wrapping.
pub fn strip_code_fences(response: &str) -> String {
    let trimmed = response.trim();

    if let Some(caps) = FENCED_BLOCK.captures(trimmed) {
        return caps[1].trim().to_string();
    }

    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.trim_start();
        let rest = match rest.get(..4) {
            Some(tag) if tag.eq_ignore_ascii_case("json") => &rest[4..],
            _ => rest,
        };
        return rest.trim().to_string();
    }

    if trimmed.len() >= 2 && trimmed.starts_with('`') && trimmed.ends_with('`') {
        return trimmed.trim_matches('`').trim().to_string();
    }

    trimmed.to_string()
}

/// Slice from the first `{` to the last `}`, if both exist in that order.
fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
