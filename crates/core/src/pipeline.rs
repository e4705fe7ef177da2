//! Pipeline around the reducer: hook input, log location, storage and batch runs.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{Local, NaiveDate};
use rayon::prelude::*;
use serde::Serialize;
use serde_json::{Map, Value};
use walkdir::WalkDir;

use crate::conversation::LogEntry;
use crate::error::{HookError, Result};
use crate::helpers::sanitize_path_component;
use crate::{reduce_transcript, render_log, ERROR_NOTE_NAME, LOG_DIR_NAME};

/// Read a required text field, accepting its camelCase or snake_case spelling.
///
/// Numbers are taken as their decimal text; blank or absent values are missing.
fn required_text(
    payload: &Map<String, Value>,
    field: &'static str,
    alias: &str,
) -> Result<String> {
    let value = payload.get(field).or_else(|| payload.get(alias));
    let text = match value {
        None | Some(Value::Null) => return Err(HookError::MissingField(field)),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(_) => return Err(HookError::InvalidFieldType(field)),
    };
    if text.trim().is_empty() {
        return Err(HookError::MissingField(field));
    }
    Ok(text)
}

/// Validated hook input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookInput {
    pub session_id: String,
    pub transcript_path: PathBuf,
    /// Directory the assistant ran in, if reported.
    pub cwd: Option<PathBuf>,
}

impl HookInput {
    /// Parse the raw stdin payload.
    pub fn parse(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw).map_err(HookError::InvalidInput)?;
        let Value::Object(payload) = value else {
            return Err(HookError::InputNotAnObject);
        };

        let session_id = required_text(&payload, "sessionId", "session_id")?
            .trim()
            .to_string();
        let transcript_path = required_text(&payload, "transcriptPath", "transcript_path")?;
        let cwd = payload
            .get("cwd")
            .and_then(Value::as_str)
            .filter(|c| !c.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            session_id,
            transcript_path: PathBuf::from(transcript_path),
            cwd,
        })
    }

    /// Transcript path, resolved against `cwd` when relative.
    pub fn resolved_transcript_path(&self) -> PathBuf {
        match &self.cwd {
            Some(cwd) if self.transcript_path.is_relative() => cwd.join(&self.transcript_path),
            _ => self.transcript_path.clone(),
        }
    }
}

/// Configuration for where and as whom logs are written.
#[derive(Debug, Clone, Default)]
pub struct HookConfig {
    /// Overrides `<repo_root>/.convo-logs`.
    pub log_dir: Option<PathBuf>,
    /// Overrides the identity looked up from git.
    pub identity: Option<String>,
    /// Name files `<YYYY-MM-DD>_<session prefix>.log` instead of `<session_id>.log`.
    pub dated_file_names: bool,
}

/// Nearest ancestor of `start` that holds a `.git` entry, or `start` itself.
pub fn find_repo_root(start: &Path) -> PathBuf {
    match start.ancestors().find(|dir| dir.join(".git").exists()) {
        Some(root) => root.to_path_buf(),
        None => {
            tracing::warn!(
                start = %start.display(),
                "no git repository found; writing logs relative to the start directory"
            );
            start.to_path_buf()
        }
    }
}

fn git_config_value(repo_root: &Path, key: &str) -> Option<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(repo_root)
        .args(["config", "--get", key])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!value.is_empty()).then_some(value)
}

/// Resolve the identity that namespaces log files.
///
/// An explicit override wins; otherwise `user.email` then `user.name` from git.
pub fn resolve_identity(repo_root: &Path, override_identity: Option<&str>) -> Result<String> {
    if let Some(identity) = override_identity.and_then(sanitize_path_component) {
        return Ok(identity);
    }

    ["user.email", "user.name"]
        .iter()
        .filter_map(|key| git_config_value(repo_root, key))
        .find_map(|value| sanitize_path_component(&value))
        .ok_or_else(|| HookError::IdentityUnavailable {
            repo_root: repo_root.to_path_buf(),
        })
}

/// Resolved output location: `<log_dir>/<identity>/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogTarget {
    pub log_dir: PathBuf,
    pub identity: String,
    /// When set, file names start with this date.
    pub date_prefix: Option<NaiveDate>,
}

impl LogTarget {
    /// Resolve the target for a session started in `start`.
    pub fn resolve(start: &Path, config: &HookConfig) -> Result<Self> {
        let repo_root = find_repo_root(start);
        let identity = resolve_identity(&repo_root, config.identity.as_deref())?;
        let log_dir = config
            .log_dir
            .clone()
            .unwrap_or_else(|| repo_root.join(LOG_DIR_NAME));
        let date_prefix = config
            .dated_file_names
            .then(|| Local::now().date_naive());
        Ok(Self {
            log_dir,
            identity,
            date_prefix,
        })
    }

    /// Log file for an already sanitized session id.
    ///
    /// With a date prefix only the part of the id before the first `-` is kept.
    pub fn path_for(&self, session_id: &str) -> PathBuf {
        let file_name = match self.date_prefix {
            Some(date) => {
                let prefix = session_id
                    .split('-')
                    .find(|part| !part.is_empty())
                    .unwrap_or(session_id);
                format!("{}_{}.log", date.format("%Y-%m-%d"), prefix)
            }
            None => format!("{}.log", session_id),
        };
        self.log_dir.join(&self.identity).join(file_name)
    }
}

/// Stream a transcript file through the reducer.
pub fn reduce_transcript_file(path: &Path) -> Result<Vec<LogEntry>> {
    let file = File::open(path).map_err(|source| {
        let path = path.to_path_buf();
        if source.kind() == io::ErrorKind::NotFound {
            HookError::TranscriptNotFound { path, source }
        } else {
            HookError::TranscriptUnreadable { path, source }
        }
    })?;

    let mut read_error = None;
    let lines = BufReader::new(file)
        .split(b'\n')
        .map_while(|chunk| match chunk {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                read_error = Some(err);
                None
            }
        })
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned());
    let entries = reduce_transcript(lines);

    match read_error {
        Some(source) => Err(HookError::TranscriptUnreadable {
            path: path.to_path_buf(),
            source,
        }),
        None => Ok(entries),
    }
}

/// Write entries to `path`, creating parent directories.
///
/// Nothing is created when `entries` is empty. Returns whether a file was written.
pub fn write_log(path: &Path, entries: &[LogEntry]) -> Result<bool> {
    let Some(contents) = render_log(entries) else {
        return Ok(false);
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| HookError::CreateLogDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, contents).map_err(|source| HookError::WriteLog {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(true)
}

/// Result of converting a single transcript.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptResult {
    pub session_id: String,
    pub source_path: PathBuf,
    pub log_path: PathBuf,
    pub entries: usize,
    pub written: bool,
}

/// Run the whole hook for one session.
pub fn run_hook(input: &HookInput, config: &HookConfig) -> Result<TranscriptResult> {
    let session_id = sanitize_path_component(&input.session_id)
        .ok_or_else(|| HookError::InvalidSessionId(input.session_id.clone()))?;

    let start = match &input.cwd {
        Some(cwd) => cwd.clone(),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };
    let target = LogTarget::resolve(&start, config)?;

    let source_path = input.resolved_transcript_path();
    convert_transcript(&source_path, &session_id, &target)
}

/// Read the hook payload from `reader` and run the hook.
///
/// On failure a note with the error and its remediation is also left in
/// [`error_note_dir`].
pub fn run_hook_from_reader<R: Read>(
    mut reader: R,
    config: &HookConfig,
) -> Result<TranscriptResult> {
    let mut raw = String::new();
    let mut parsed = None;
    let result = reader
        .read_to_string(&mut raw)
        .map_err(HookError::ReadInput)
        .and_then(|_| HookInput::parse(&raw))
        .and_then(|input| {
            let result = run_hook(&input, config);
            parsed = Some(input);
            result
        });

    if let Err(err) = &result {
        let dir = error_note_dir(parsed.as_ref(), config);
        if let Some(path) = write_error_note(&dir, err) {
            tracing::info!(path = %path.display(), "wrote error note");
        }
    }
    result
}

/// Where the error note goes: the parent of an explicit log directory,
/// otherwise the repository root of the session (or of the process cwd).
pub fn error_note_dir(input: Option<&HookInput>, config: &HookConfig) -> PathBuf {
    if let Some(log_dir) = &config.log_dir {
        return match log_dir.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
    }
    let start = input
        .and_then(|input| input.cwd.clone())
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));
    find_repo_root(&start)
}

/// Best-effort write of `<dir>/convo-log-error.log`. I/O failures are ignored.
pub fn write_error_note(dir: &Path, err: &HookError) -> Option<PathBuf> {
    let path = dir.join(ERROR_NOTE_NAME);
    let note = format!(
        "[{}] convo-log failed\n\n{}\n",
        Local::now().to_rfc3339(),
        err.report()
    );
    match std::fs::write(&path, note) {
        Ok(()) => Some(path),
        Err(write_err) => {
            tracing::debug!(path = %path.display(), error = %write_err, "could not write error note");
            None
        }
    }
}

fn convert_transcript(
    source_path: &Path,
    session_id: &str,
    target: &LogTarget,
) -> Result<TranscriptResult> {
    let entries = reduce_transcript_file(source_path)?;
    let log_path = target.path_for(session_id);
    let written = write_log(&log_path, &entries)?;

    if written {
        tracing::info!(
            session_id,
            entries = entries.len(),
            path = %log_path.display(),
            "wrote conversation log"
        );
    } else {
        tracing::debug!(session_id, "transcript produced no entries; nothing written");
    }

    Ok(TranscriptResult {
        session_id: session_id.to_string(),
        source_path: source_path.to_path_buf(),
        log_path,
        entries: entries.len(),
        written,
    })
}

/// Summary of a batch run.
#[derive(Debug, Default, Serialize)]
pub struct BatchResult {
    pub total_transcripts: usize,
    pub written_logs: usize,
    pub empty_transcripts: usize,
    pub failed_transcripts: usize,
    pub total_entries: usize,
}

/// Discover all `*.jsonl` transcripts in a directory, sorted.
pub fn discover_transcripts(root: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "jsonl"))
        .map(|e| e.path().to_path_buf())
        .collect();
    paths.sort();
    paths
}

/// Convert every transcript under `root` in parallel, one reducer per file.
///
/// The file stem is used as the session id. Failures of individual
/// transcripts are logged and counted but do not stop the run.
pub fn process_all_transcripts(
    root: &Path,
    target: &LogTarget,
) -> Result<(Vec<TranscriptResult>, BatchResult)> {
    let transcripts = discover_transcripts(root);
    if transcripts.is_empty() {
        return Err(HookError::NoTranscripts {
            root: root.to_path_buf(),
        });
    }

    let total = transcripts.len();
    let processed_count = AtomicUsize::new(0);
    let error_count = AtomicUsize::new(0);

    let results: Vec<TranscriptResult> = transcripts
        .into_par_iter()
        .filter_map(|path| {
            let session_id = path
                .file_stem()
                .and_then(|stem| sanitize_path_component(&stem.to_string_lossy()));
            let result = match session_id {
                Some(session_id) => convert_transcript(&path, &session_id, target),
                None => Err(HookError::InvalidSessionId(
                    path.file_stem()
                        .map(|stem| stem.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                )),
            };

            let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;
            if count % 100 == 0 || count == total {
                tracing::info!("processed {}/{} transcripts", count, total);
            }

            match result {
                Ok(result) => Some(result),
                Err(err) => {
                    error_count.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(path = %path.display(), error = %err, "failed to convert transcript");
                    None
                }
            }
        })
        .collect();

    let written_logs = results.iter().filter(|r| r.written).count();
    let summary = BatchResult {
        total_transcripts: total,
        written_logs,
        empty_transcripts: results.len() - written_logs,
        failed_transcripts: error_count.load(Ordering::Relaxed),
        total_entries: results.iter().map(|r| r.entries).sum(),
    };

    Ok((results, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = concat!(
        r#"{"type":"user.message","timestamp":"T1","data":{"content":"hi"}}"#,
        "\n",
        r#"{"type":"tool.execution_start","timestamp":"T2","data":{"toolName":"ask_user","toolCallId":"c1","arguments":{"question":"pick one","choices":["a","b"]}}}"#,
        "\n",
        r#"{"type":"tool.execution_complete","timestamp":"T3","data":{"toolCallId":"c1","result":{"content":"a"}}}"#,
        "\n",
    );

    fn target(temp: &TempDir) -> LogTarget {
        LogTarget {
            log_dir: temp.path().join("logs"),
            identity: "dev@example.com".to_string(),
            date_prefix: None,
        }
    }

    #[test]
    fn test_parse_hook_input() {
        let input = HookInput::parse(
            r#"{"sessionId":"abc","transcriptPath":"/tmp/t.jsonl","cwd":"/work","extra":1}"#,
        )
        .unwrap();
        assert_eq!(input.session_id, "abc");
        assert_eq!(input.transcript_path, PathBuf::from("/tmp/t.jsonl"));
        assert_eq!(input.cwd, Some(PathBuf::from("/work")));

        let input =
            HookInput::parse(r#"{"session_id":"abc","transcript_path":"t.jsonl","cwd":"/work"}"#)
                .unwrap();
        assert_eq!(input.resolved_transcript_path(), PathBuf::from("/work/t.jsonl"));
    }

    #[test]
    fn test_parse_hook_input_errors() {
        assert!(matches!(
            HookInput::parse("{not json"),
            Err(HookError::InvalidInput(_))
        ));
        assert!(matches!(
            HookInput::parse(r#"["sessionId"]"#),
            Err(HookError::InputNotAnObject)
        ));
        assert!(matches!(
            HookInput::parse(r#"{"transcriptPath":"/tmp/t.jsonl"}"#),
            Err(HookError::MissingField("sessionId"))
        ));
        assert!(matches!(
            HookInput::parse(r#"{"sessionId":"  ","transcriptPath":"/tmp/t.jsonl"}"#),
            Err(HookError::MissingField("sessionId"))
        ));
        assert!(matches!(
            HookInput::parse(r#"{"sessionId":"abc"}"#),
            Err(HookError::MissingField("transcriptPath"))
        ));
        assert!(matches!(
            HookInput::parse(r#"{"sessionId":["a"],"transcriptPath":"/tmp/t.jsonl"}"#),
            Err(HookError::InvalidFieldType("sessionId"))
        ));
        assert!(matches!(
            HookInput::parse(r#"{"sessionId":"abc","transcriptPath":null}"#),
            Err(HookError::MissingField("transcriptPath"))
        ));
    }

    #[test]
    fn test_parse_hook_input_numeric_session_id() {
        let input = HookInput::parse(r#"{"sessionId":5,"transcriptPath":"/tmp/t.jsonl"}"#).unwrap();
        assert_eq!(input.session_id, "5");
    }

    #[test]
    fn test_find_repo_root() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("repo/.git")).unwrap();
        std::fs::create_dir_all(temp.path().join("repo/src/nested")).unwrap();

        assert_eq!(
            find_repo_root(&temp.path().join("repo/src/nested")),
            temp.path().join("repo")
        );
    }

    #[test]
    fn test_find_repo_root_worktree_file() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("wt/sub")).unwrap();
        std::fs::write(temp.path().join("wt/.git"), "gitdir: /elsewhere\n").unwrap();

        assert_eq!(find_repo_root(&temp.path().join("wt/sub")), temp.path().join("wt"));
    }

    #[test]
    fn test_resolve_identity_override() {
        let temp = TempDir::new().unwrap();
        assert_eq!(
            resolve_identity(temp.path(), Some("Jane Doe")).unwrap(),
            "Jane_Doe"
        );
    }

    #[test]
    fn test_log_target_path() {
        let target = LogTarget {
            log_dir: PathBuf::from("/repo/.convo-logs"),
            identity: "me".to_string(),
            date_prefix: None,
        };
        assert_eq!(
            target.path_for("session-1"),
            PathBuf::from("/repo/.convo-logs/me/session-1.log")
        );
    }

    #[test]
    fn test_log_target_dated_path() {
        let target = LogTarget {
            log_dir: PathBuf::from("/repo/.convo-logs"),
            identity: "me".to_string(),
            date_prefix: NaiveDate::from_ymd_opt(2024, 3, 9),
        };
        assert_eq!(
            target.path_for("8f2c1a-4b7e-99d0"),
            PathBuf::from("/repo/.convo-logs/me/2024-03-09_8f2c1a.log")
        );
        assert_eq!(
            target.path_for("plain"),
            PathBuf::from("/repo/.convo-logs/me/2024-03-09_plain.log")
        );
    }

    #[test]
    fn test_log_target_resolve_dated() {
        let temp = TempDir::new().unwrap();
        let config = HookConfig {
            identity: Some("me".to_string()),
            dated_file_names: true,
            ..Default::default()
        };
        let target = LogTarget::resolve(temp.path(), &config).unwrap();
        assert!(target.date_prefix.is_some());
    }

    #[test]
    fn test_log_target_default_dir() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join(".git")).unwrap();
        let config = HookConfig {
            identity: Some("me".to_string()),
            ..Default::default()
        };
        let target = LogTarget::resolve(temp.path(), &config).unwrap();
        assert_eq!(target.log_dir, temp.path().join(LOG_DIR_NAME));
        assert_eq!(target.identity, "me");
    }

    #[test]
    fn test_reduce_transcript_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("events.jsonl");
        // Trailing partial line from a writer that is still running
        std::fs::write(&path, format!("{}\n\n{{\"type\":\"user.mes", SAMPLE)).unwrap();

        let entries = reduce_transcript_file(&path).unwrap();
        let entries: Vec<&str> = entries.iter().map(LogEntry::as_str).collect();
        assert_eq!(
            entries,
            vec!["T1 [User]\nhi", "T2 [Agent]\npick one\n- a\n- b", "T3 [User]\na"]
        );
    }

    #[test]
    fn test_reduce_transcript_file_invalid_utf8_line() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("events.jsonl");
        let mut bytes = b"\xff\xfe garbage\n".to_vec();
        bytes.extend_from_slice(SAMPLE.as_bytes());
        std::fs::write(&path, bytes).unwrap();

        assert_eq!(reduce_transcript_file(&path).unwrap().len(), 3);
    }

    #[test]
    fn test_reduce_transcript_file_missing() {
        let temp = TempDir::new().unwrap();
        let result = reduce_transcript_file(&temp.path().join("missing.jsonl"));
        assert!(matches!(result, Err(HookError::TranscriptNotFound { .. })));
    }

    #[test]
    fn test_write_log() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a/b/session.log");
        let entries = reduce_transcript(SAMPLE.lines());

        assert!(write_log(&path, &entries).unwrap());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "T1 [User]\nhi\n\nT2 [Agent]\npick one\n- a\n- b\n\nT3 [User]\na\n"
        );

        // Second write truncates rather than appends
        assert!(write_log(&path, &entries[..1]).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "T1 [User]\nhi\n");
    }

    #[test]
    fn test_write_log_empty_creates_nothing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a/session.log");

        assert!(!write_log(&path, &[]).unwrap());
        assert!(!path.exists());
        assert!(!temp.path().join("a").exists());
    }

    #[test]
    fn test_write_log_storage_failure() {
        let temp = TempDir::new().unwrap();
        // A regular file where a directory is expected
        std::fs::write(temp.path().join("blocker"), "").unwrap();
        let path = temp.path().join("blocker/me/session.log");
        let entries = reduce_transcript(SAMPLE.lines());

        let err = write_log(&path, &entries).unwrap_err();
        assert!(matches!(err, HookError::CreateLogDir { .. }));
    }

    #[test]
    fn test_run_hook() {
        let temp = TempDir::new().unwrap();
        let repo = temp.path().join("repo");
        std::fs::create_dir_all(repo.join(".git")).unwrap();
        std::fs::write(repo.join("events.jsonl"), SAMPLE).unwrap();

        let input = HookInput {
            session_id: "sess-1".to_string(),
            transcript_path: PathBuf::from("events.jsonl"),
            cwd: Some(repo.clone()),
        };
        let config = HookConfig {
            identity: Some("me".to_string()),
            ..Default::default()
        };

        let result = run_hook(&input, &config).unwrap();
        assert!(result.written);
        assert_eq!(result.entries, 3);
        assert_eq!(result.log_path, repo.join(".convo-logs/me/sess-1.log"));
        assert!(result.log_path.exists());
    }

    #[test]
    fn test_run_hook_empty_transcript_writes_nothing() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join(".git")).unwrap();
        std::fs::write(temp.path().join("events.jsonl"), "\nnot json\n").unwrap();

        let input = HookInput {
            session_id: "sess-1".to_string(),
            transcript_path: temp.path().join("events.jsonl"),
            cwd: Some(temp.path().to_path_buf()),
        };
        let config = HookConfig {
            identity: Some("me".to_string()),
            log_dir: Some(temp.path().join("logs")),
            ..Default::default()
        };

        let result = run_hook(&input, &config).unwrap();
        assert!(!result.written);
        assert!(!temp.path().join("logs").exists());
    }

    #[test]
    fn test_run_hook_rejects_unusable_session_id() {
        let input = HookInput {
            session_id: "///".to_string(),
            transcript_path: PathBuf::from("/tmp/unused.jsonl"),
            cwd: None,
        };
        let result = run_hook(&input, &HookConfig::default());
        assert!(matches!(result, Err(HookError::InvalidSessionId(_))));
    }

    #[test]
    fn test_run_hook_from_reader() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join(".git")).unwrap();
        std::fs::write(temp.path().join("events.jsonl"), SAMPLE).unwrap();
        let payload = format!(
            r#"{{"sessionId":"s1","transcriptPath":"events.jsonl","cwd":{:?}}}"#,
            temp.path().to_string_lossy()
        );
        let config = HookConfig {
            identity: Some("me".to_string()),
            ..Default::default()
        };

        let result = run_hook_from_reader(payload.as_bytes(), &config).unwrap();
        assert!(result.written);
        assert!(!temp.path().join(ERROR_NOTE_NAME).exists());
    }

    #[test]
    fn test_error_note_written_to_repo_root() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join(".git")).unwrap();
        std::fs::create_dir_all(temp.path().join("sub")).unwrap();
        let payload = format!(
            r#"{{"sessionId":"s1","transcriptPath":"missing.jsonl","cwd":{:?}}}"#,
            temp.path().join("sub").to_string_lossy()
        );
        let config = HookConfig {
            identity: Some("me".to_string()),
            ..Default::default()
        };

        let err = run_hook_from_reader(payload.as_bytes(), &config).unwrap_err();
        assert!(matches!(err, HookError::TranscriptNotFound { .. }));

        let note = std::fs::read_to_string(temp.path().join(ERROR_NOTE_NAME)).unwrap();
        assert!(note.contains("transcript not found"));
        assert!(note.contains(&err.remediation()));
    }

    #[test]
    fn test_error_note_for_malformed_input_uses_log_dir_parent() {
        let temp = TempDir::new().unwrap();
        let config = HookConfig {
            log_dir: Some(temp.path().join("logs")),
            ..Default::default()
        };

        let err = run_hook_from_reader("not json".as_bytes(), &config).unwrap_err();
        assert!(matches!(err, HookError::InvalidInput(_)));

        let note = std::fs::read_to_string(temp.path().join(ERROR_NOTE_NAME)).unwrap();
        assert!(note.contains("hook input is not valid JSON"));
    }

    #[test]
    fn test_write_error_note_ignores_io_failure() {
        let temp = TempDir::new().unwrap();
        let missing_dir = temp.path().join("does/not/exist");
        let err = HookError::MissingField("sessionId");
        assert_eq!(write_error_note(&missing_dir, &err), None);
    }

    #[test]
    fn test_discover_transcripts() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("subdir")).unwrap();
        std::fs::write(temp.path().join("b.jsonl"), "").unwrap();
        std::fs::write(temp.path().join("subdir/a.jsonl"), "").unwrap();
        std::fs::write(temp.path().join("notes.txt"), "").unwrap();

        let files = discover_transcripts(temp.path());
        assert_eq!(
            files,
            vec![temp.path().join("b.jsonl"), temp.path().join("subdir/a.jsonl")]
        );
    }

    #[test]
    fn test_process_all_transcripts() {
        let temp = TempDir::new().unwrap();
        let sessions = temp.path().join("sessions");
        std::fs::create_dir_all(&sessions).unwrap();
        std::fs::write(sessions.join("one.jsonl"), SAMPLE).unwrap();
        std::fs::write(sessions.join("two.jsonl"), SAMPLE).unwrap();
        std::fs::write(sessions.join("empty.jsonl"), "").unwrap();

        let target = target(&temp);
        let (results, summary) = process_all_transcripts(&sessions, &target).unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(summary.total_transcripts, 3);
        assert_eq!(summary.written_logs, 2);
        assert_eq!(summary.empty_transcripts, 1);
        assert_eq!(summary.failed_transcripts, 0);
        assert_eq!(summary.total_entries, 6);

        // Each transcript gets its own reducer, so the logs are identical
        let one = std::fs::read_to_string(target.path_for("one")).unwrap();
        let two = std::fs::read_to_string(target.path_for("two")).unwrap();
        assert_eq!(one, two);
        assert!(!target.path_for("empty").exists());
    }

    #[test]
    fn test_process_all_transcripts_empty_dir() {
        let temp = TempDir::new().unwrap();
        let result = process_all_transcripts(temp.path(), &target(&temp));
        assert!(matches!(result, Err(HookError::NoTranscripts { .. })));
    }
}
