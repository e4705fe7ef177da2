//! Decoding of newline-delimited transcript events.

use serde_json::Value;

use crate::helpers::stringify;

/// Discriminator of a transcript event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    UserMessage,
    ToolExecutionStart,
    ToolExecutionComplete,
    /// Anything this crate does not act on. Kept so callers can still log it.
    Other(String),
}

impl From<&str> for EventKind {
    fn from(kind: &str) -> Self {
        match kind {
            "user.message" => EventKind::UserMessage,
            "tool.execution_start" => EventKind::ToolExecutionStart,
            "tool.execution_complete" => EventKind::ToolExecutionComplete,
            other => EventKind::Other(other.to_string()),
        }
    }
}

/// One decoded transcript line.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEvent {
    pub kind: EventKind,
    /// Printed verbatim; empty when the line carries none.
    pub timestamp: String,
    /// The line's `data` object, or `Null` when absent.
    pub payload: Value,
}

/// Decode a single transcript line.
///
/// Blank lines, lines that are not valid JSON and JSON values that are not
/// objects all yield `None`.
pub fn decode_line(line: &str) -> Option<TranscriptEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let Value::Object(mut record) = serde_json::from_str::<Value>(line).ok()? else {
        return None;
    };

    Some(TranscriptEvent {
        kind: EventKind::from(stringify(record.get("type")).as_str()),
        timestamp: stringify(record.get("timestamp")),
        payload: record.remove("data").unwrap_or(Value::Null),
    })
}

/// Lazily decode transcript lines into events, skipping anything malformed.
pub fn decode_events<I, S>(lines: I) -> impl Iterator<Item = TranscriptEvent>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines.into_iter().filter_map(|line| decode_line(line.as_ref()))
}
