//! Helper functions for payload access and text rendering.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

// Characters allowed in a single path component derived from user data
static UNSAFE_PATH_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._@-]").unwrap());

/// Walk a chain of object keys, returning `None` at the first step that is
/// missing or lands on something other than an object.
pub fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(value, |current, key| current.as_object()?.get(*key))
}

/// Render an optional JSON value as text.
///
/// Absent and `null` become the empty string, strings are used as-is and
/// every other value is rendered as its compact JSON text, so a numeric
/// answer shows up as `42` instead of disappearing.
pub fn stringify(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// [`lookup`] followed by [`stringify`].
pub fn text_at(value: &Value, path: &[&str]) -> String {
    stringify(lookup(value, path))
}

/// Clean text by normalizing line endings and trimming surrounding whitespace.
pub fn clean_text(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n").trim().to_string()
}

/// Format one log paragraph: a `<timestamp> [<speaker>]` header line followed by the body.
///
/// The timestamp is printed verbatim; a blank one is left out of the header.
pub fn format_entry(timestamp: &str, speaker: &str, body: &str) -> String {
    if timestamp.trim().is_empty() {
        format!("[{}]\n{}", speaker, body)
    } else {
        format!("{} [{}]\n{}", timestamp, speaker, body)
    }
}

/// Render a list of choices as a bulleted block, one `- choice` line per element.
///
/// Every element is kept, in order, as its stringified text. Returns `None`
/// only for an empty list.
pub fn render_choices(choices: &[Value]) -> Option<String> {
    if choices.is_empty() {
        return None;
    }
    let lines: Vec<String> = choices
        .iter()
        .map(|choice| format!("- {}", stringify(Some(choice))))
        .collect();
    Some(lines.join("\n"))
}

/// Turn arbitrary text into something usable as a single path component.
///
/// Returns `None` if nothing usable remains.
pub fn sanitize_path_component(raw: &str) -> Option<String> {
    let replaced = UNSAFE_PATH_CHARS_RE.replace_all(raw.trim(), "_");
    let trimmed = replaced.trim_start_matches('.');
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '_') {
        None
    } else {
        Some(trimmed.to_string())
    }
}
