//! Errors raised around the reducer: hook input, identity and storage.

use std::error::Error as _;
use std::fmt::Write as _;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Broad failure class, used to pick the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    MalformedInput,
    MissingResource,
    StorageFailure,
}

impl ErrorCategory {
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorCategory::MalformedInput => 2,
            ErrorCategory::MissingResource => 3,
            ErrorCategory::StorageFailure => 4,
        }
    }
}

#[derive(Debug, Error)]
pub enum HookError {
    #[error("could not read hook input from stdin")]
    ReadInput(#[source] io::Error),

    #[error("hook input is not valid JSON")]
    InvalidInput(#[source] serde_json::Error),

    #[error("hook input must be a JSON object")]
    InputNotAnObject,

    #[error("hook input is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("hook input field `{0}` must be a string or a number")]
    InvalidFieldType(&'static str),

    #[error("session id {0:?} cannot be used as a file name")]
    InvalidSessionId(String),

    #[error("transcript not found at {}", path.display())]
    TranscriptNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not read transcript {}", path.display())]
    TranscriptUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not determine a user identity for {}", repo_root.display())]
    IdentityUnavailable { repo_root: PathBuf },

    #[error("no *.jsonl transcripts found under {}", root.display())]
    NoTranscripts { root: PathBuf },

    #[error("could not create log directory {}", path.display())]
    CreateLogDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not write log file {}", path.display())]
    WriteLog {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl HookError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            HookError::ReadInput(_)
            | HookError::InvalidInput(_)
            | HookError::InputNotAnObject
            | HookError::MissingField(_)
            | HookError::InvalidFieldType(_)
            | HookError::InvalidSessionId(_) => ErrorCategory::MalformedInput,
            HookError::TranscriptNotFound { .. }
            | HookError::TranscriptUnreadable { .. }
            | HookError::IdentityUnavailable { .. }
            | HookError::NoTranscripts { .. } => ErrorCategory::MissingResource,
            HookError::CreateLogDir { .. } | HookError::WriteLog { .. } => {
                ErrorCategory::StorageFailure
            }
        }
    }

    /// A note telling the operator what to fix before re-running.
    pub fn remediation(&self) -> String {
        match self {
            HookError::ReadInput(_)
            | HookError::InvalidInput(_)
            | HookError::InputNotAnObject
            | HookError::MissingField(_)
            | HookError::InvalidFieldType(_) => {
                "The hook expects a JSON object on stdin such as \
                 {\"sessionId\": \"...\", \"transcriptPath\": \"/path/to/events.jsonl\"}. \
                 Check the hook registration passes the session payload through."
                    .to_string()
            }
            HookError::InvalidSessionId(_) => {
                "Session ids may only contain letters, digits, '.', '_', '-' or '@'. \
                 Re-run with the id reported by the assistant."
                    .to_string()
            }
            HookError::TranscriptNotFound { path, .. } => format!(
                "Make sure the session transcript exists at {} and that transcriptPath \
                 points at it, then re-run the hook.",
                path.display()
            ),
            HookError::TranscriptUnreadable { path, .. } => format!(
                "Check the permissions of {} and re-run the hook.",
                path.display()
            ),
            HookError::IdentityUnavailable { .. } => {
                "Set `git config user.email` (or user.name), or set CONVO_LOG_IDENTITY \
                 or pass --identity, then re-run."
                    .to_string()
            }
            HookError::NoTranscripts { root } => format!(
                "Point the batch command at a directory containing *.jsonl transcripts \
                 (searched {}).",
                root.display()
            ),
            HookError::CreateLogDir { path, .. } | HookError::WriteLog { path, .. } => format!(
                "Make sure {} is writable (or choose another location with --log-dir / \
                 CONVO_LOG_DIR) and re-run the hook.",
                path.display()
            ),
        }
    }

    /// The message, its chain of causes and the remediation note, as printed
    /// to stderr and into the error note.
    pub fn report(&self) -> String {
        let mut report = format!("error: {}", self);
        let mut source = self.source();
        while let Some(cause) = source {
            let _ = write!(report, "\n  caused by: {}", cause);
            source = cause.source();
        }
        let _ = write!(report, "\n\n{}", self.remediation());
        report
    }
}

pub type Result<T, E = HookError> = std::result::Result<T, E>;
