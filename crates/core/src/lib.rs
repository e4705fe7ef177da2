//! Core logic for turning assistant session transcripts into conversation logs.
//!
//! A transcript is a newline-delimited stream of JSON events. [`decode_events`]
//! turns raw lines into [`TranscriptEvent`]s, dropping anything malformed, and
//! [`TranscriptReducer`] folds those events into an ordered list of
//! [`LogEntry`] paragraphs: user messages, plus `ask_user` questions paired
//! with their answers.
//!
//! Everything touching the filesystem or the hook payload lives in
//! [`pipeline`]; the decoder and reducer are pure.

mod conversation;
pub mod error;
mod event;
mod helpers;
pub mod pipeline;

pub use conversation::{LogEntry, ReduceStats, Speaker, TranscriptReducer};
pub use error::{ErrorCategory, HookError};
pub use event::{decode_events, decode_line, EventKind, TranscriptEvent};
pub use helpers::{
    clean_text, format_entry, lookup, render_choices, sanitize_path_component, stringify, text_at,
};
pub use pipeline::{
    discover_transcripts, error_note_dir, find_repo_root, process_all_transcripts,
    reduce_transcript_file, resolve_identity, run_hook, run_hook_from_reader, write_error_note,
    write_log, BatchResult, HookConfig, HookInput, LogTarget, TranscriptResult,
};

/// Name of the tool whose calls represent the agent asking the user a question.
pub const ASK_USER_TOOL: &str = "ask_user";

/// Default log directory, relative to the repository root.
pub const LOG_DIR_NAME: &str = ".convo-logs";

/// File the hook leaves behind when it fails, next to the log directory.
pub const ERROR_NOTE_NAME: &str = "convo-log-error.log";

/// Separator placed between consecutive log entries.
pub const ENTRY_SEPARATOR: &str = "\n\n";

/// Reduce raw transcript lines into ordered log entries.
///
/// Never fails: malformed lines and mistyped fields only lead to omissions.
pub fn reduce_transcript<I, S>(lines: I) -> Vec<LogEntry>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut reducer = TranscriptReducer::new();
    for event in decode_events(lines) {
        reducer.handle_event(&event);
    }
    reducer.finish()
}

/// Join entries into the final log text.
///
/// Returns `None` for an empty list so callers can skip the write entirely.
pub fn render_log(entries: &[LogEntry]) -> Option<String> {
    if entries.is_empty() {
        return None;
    }
    let mut text = entries
        .iter()
        .map(LogEntry::as_str)
        .collect::<Vec<_>>()
        .join(ENTRY_SEPARATOR);
    text.push('\n');
    Some(text)
}
