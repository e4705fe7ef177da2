//! Post-session hook that turns an assistant transcript into a readable conversation log.
//!
//! Invoked without a subcommand it reads the hook payload from stdin and
//! writes `<log_dir>/<identity>/<session_id>.log`. `render` prints a log to
//! stdout and `batch` converts a whole directory of transcripts.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use convo_log_core::{
    pipeline::{BatchResult, HookConfig, LogTarget},
    process_all_transcripts, reduce_transcript_file, render_log, run_hook_from_reader, HookError,
};

/// Convert assistant session transcripts into conversation logs.
#[derive(Parser, Debug)]
#[command(name = "convo-log")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory logs are written under (default: <repo root>/.convo-logs)
    #[arg(long, global = true, env = "CONVO_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Identity used to namespace log files (default: git user.email / user.name)
    #[arg(long, global = true, env = "CONVO_LOG_IDENTITY")]
    identity: Option<String>,

    /// Name log files <YYYY-MM-DD>_<session prefix>.log
    #[arg(long, global = true, env = "CONVO_LOG_DATED_NAMES")]
    dated_names: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read the hook payload from stdin and write the session log (default)
    Hook,

    /// Print the log for a transcript to stdout
    Render {
        /// Path to a JSON-Lines transcript
        transcript: PathBuf,
    },

    /// Convert every *.jsonl transcript under a directory
    Batch {
        /// Directory searched recursively for transcripts
        root: PathBuf,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Args {
    fn config(&self) -> HookConfig {
        HookConfig {
            log_dir: self.log_dir.clone(),
            identity: self.identity.clone(),
            dated_file_names: self.dated_names,
        }
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("CONVO_LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn hook(config: &HookConfig) -> Result<(), HookError> {
    run_hook_from_reader(std::io::stdin().lock(), config)?;
    Ok(())
}

fn render(transcript: &Path) -> Result<(), HookError> {
    let entries = reduce_transcript_file(transcript)?;
    if let Some(text) = render_log(&entries) {
        print!("{}", text);
    }
    Ok(())
}

fn batch(root: &Path, json: bool, config: &HookConfig) -> Result<(), HookError> {
    let start = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let target = LogTarget::resolve(&start, config)?;

    let (_, result): (_, BatchResult) = process_all_transcripts(root, &target)?;

    if json {
        match serde_json::to_string_pretty(&result) {
            Ok(summary) => println!("{}", summary),
            Err(err) => tracing::error!("failed to serialize summary: {err}"),
        }
        return Ok(());
    }

    println!("[summary]");
    println!("  Transcripts found: {}", result.total_transcripts);
    println!("  Logs written: {}", result.written_logs);
    println!("  Empty transcripts: {}", result.empty_transcripts);
    println!("  Failed transcripts: {}", result.failed_transcripts);
    println!("  Total entries: {}", result.total_entries);
    println!("  Output: {:?}", target.log_dir.join(&target.identity));
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();
    let config = args.config();

    let result = match &args.command {
        None | Some(Commands::Hook) => hook(&config),
        Some(Commands::Render { transcript }) => render(transcript),
        Some(Commands::Batch { root, json }) => batch(root, *json, &config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(category = ?err.category(), "hook failed");
            eprintln!("{}", err.report());
            ExitCode::from(err.category().exit_code())
        }
    }
}
