//! Reduction of transcript events into ordered conversation log entries.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use crate::event::{EventKind, TranscriptEvent};
use crate::helpers::{clean_text, format_entry, lookup, render_choices, text_at};
use crate::ASK_USER_TOOL;

/// Who a log entry is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Agent,
}

impl Speaker {
    pub fn label(self) -> &'static str {
        match self {
            Speaker::User => "User",
            Speaker::Agent => "Agent",
        }
    }
}

/// A single pre-formatted paragraph of the conversation log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry(String);

impl LogEntry {
    pub fn new(timestamp: &str, speaker: Speaker, body: &str) -> Self {
        Self(format_entry(timestamp, speaker.label(), body))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Counters collected while reducing a transcript. Diagnostic only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReduceStats {
    pub events: usize,
    pub user_messages: usize,
    pub questions_answered: usize,
    /// Completions whose call id was never pending.
    pub unmatched_completions: usize,
    /// Questions still waiting for an answer.
    pub pending_questions: usize,
}

/// Folds transcript events into log entries.
///
/// `ask_user` questions are rendered when their start event arrives but held
/// back until the matching completion, so a question and its answer always
/// end up next to each other. Questions that never complete are dropped.
///
/// One reducer belongs to one transcript; never share it between transcripts.
#[derive(Debug, Default)]
pub struct TranscriptReducer {
    entries: Vec<LogEntry>,
    // tool call id -> rendered question entry
    pending_questions: HashMap<String, LogEntry>,
    stats: ReduceStats,
}

impl TranscriptReducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatch one event.
    pub fn handle_event(&mut self, event: &TranscriptEvent) {
        self.stats.events += 1;
        match &event.kind {
            EventKind::UserMessage => self.handle_user_message(&event.timestamp, &event.payload),
            EventKind::ToolExecutionStart => {
                self.handle_tool_start(&event.timestamp, &event.payload)
            }
            EventKind::ToolExecutionComplete => {
                self.handle_tool_complete(&event.timestamp, &event.payload)
            }
            EventKind::Other(kind) => {
                tracing::trace!(kind = %kind, "ignoring transcript event");
            }
        }
    }

    /// Handle a `user.message` event.
    pub fn handle_user_message(&mut self, timestamp: &str, payload: &Value) {
        let content = clean_text(&text_at(payload, &["content"]));
        if content.is_empty() {
            return;
        }
        self.entries
            .push(LogEntry::new(timestamp, Speaker::User, &content));
        self.stats.user_messages += 1;
    }

    /// Handle a `tool.execution_start` event. Only `ask_user` calls are kept.
    pub fn handle_tool_start(&mut self, timestamp: &str, payload: &Value) {
        if text_at(payload, &["toolName"]) != ASK_USER_TOOL {
            return;
        }

        let tool_call_id = text_at(payload, &["toolCallId"]).trim().to_string();
        let question = clean_text(&text_at(payload, &["arguments", "question"]));
        if tool_call_id.is_empty() || question.is_empty() {
            return;
        }

        let mut body = question;
        let choices = lookup(payload, &["arguments", "choices"])
            .and_then(Value::as_array)
            .and_then(|choices| render_choices(choices.as_slice()));
        if let Some(choices) = choices {
            body.push('\n');
            body.push_str(&choices);
        }

        let rendered = LogEntry::new(timestamp, Speaker::Agent, &body);
        if self
            .pending_questions
            .insert(tool_call_id.clone(), rendered)
            .is_some()
        {
            tracing::debug!(
                tool_call_id = %tool_call_id,
                "ask_user restarted; replacing pending question"
            );
        }
    }

    /// Handle a `tool.execution_complete` event.
    ///
    /// Emits the pending question followed by the answer, if any.
    pub fn handle_tool_complete(&mut self, timestamp: &str, payload: &Value) {
        let tool_call_id = text_at(payload, &["toolCallId"]).trim().to_string();
        let Some(question) = self.pending_questions.remove(&tool_call_id) else {
            self.stats.unmatched_completions += 1;
            return;
        };

        self.entries.push(question);
        self.stats.questions_answered += 1;

        let answer = clean_text(&text_at(payload, &["result", "content"]));
        if !answer.is_empty() {
            self.entries
                .push(LogEntry::new(timestamp, Speaker::User, &answer));
        }
    }

    /// Entries emitted so far.
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn stats(&self) -> ReduceStats {
        ReduceStats {
            pending_questions: self.pending_questions.len(),
            ..self.stats
        }
    }

    /// Finish the fold. Unanswered questions are discarded.
    pub fn finish(self) -> Vec<LogEntry> {
        let stats = self.stats();
        tracing::debug!(
            events = stats.events,
            user_messages = stats.user_messages,
            questions_answered = stats.questions_answered,
            unmatched_completions = stats.unmatched_completions,
            dropped_questions = stats.pending_questions,
            "transcript reduced"
        );
        self.entries
    }
}
