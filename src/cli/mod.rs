//! Command-line interface definition and progress display.

use crate::constants::{APP_DESCRIPTION, APP_NAME, PROGRESS_POLL_INTERVAL_MS};
use crate::errors::{AppError, AppResult, BackupError};
use crate::logging::LogFormat;
use crate::ops::ArchiveFormat;
use crate::task::Task;
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::info;

/// Back up, restore and export hierarchical notebooks
#[derive(Parser, Debug)]
#[command(name = APP_NAME, about = APP_DESCRIPTION)]
#[command(author, version, long_about = None)]
pub struct CliArgs {
    /// Print verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Log line format: text or json
    #[arg(long, global = true, default_value = "text")]
    pub log_format: LogFormat,

    /// Do not draw a progress line
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Archive a notebook into a single compressed file
    Archive {
        /// Notebook directory to archive
        notebook: PathBuf,

        /// Archive to create (defaults to <name>-YYYY-MM-DD in the archive directory)
        output: Option<PathBuf>,

        /// Archive format: tar.gz or zip (defaults to NBARCHIVE_FORMAT)
        #[arg(short = 'f', long)]
        format: Option<ArchiveFormat>,
    },

    /// Restore a notebook from an archive
    Restore {
        /// Archive to restore
        archive: PathBuf,

        /// Path of the new notebook, or the base directory with --into
        destination: PathBuf,

        /// Extract into an existing base directory instead of creating a new notebook path
        #[arg(long)]
        into: bool,
    },

    /// Export a notebook as a browsable HTML tree
    Export {
        /// Notebook directory to export
        notebook: PathBuf,

        /// Directory to create for the export
        destination: PathBuf,
    },
}

impl CliArgs {
    /// Parse command-line arguments
    pub fn parse() -> Self {
        <CliArgs as Parser>::parse()
    }
}

/// Aborts `task` when the process receives Ctrl-C or a termination signal.
///
/// The worker then stops at its next abort check and cleans up after itself,
/// and `wait_with_progress` returns `BackupError::Canceled`.
///
/// # Errors
///
/// Returns `AppError::Signal` if a handler is already installed or the signal
/// cannot be hooked.
pub fn cancel_on_interrupt(task: Arc<Task>) -> AppResult<()> {
    ctrlc::set_handler(move || {
        info!("Interrupt received, canceling");
        task.abort();
    })
    .map_err(|e| AppError::Signal(e.to_string()))
}

/// Waits for a worker while drawing its task's progress on stderr.
///
/// The task is polled every 100 ms until the worker thread exits; nothing is
/// drawn when `quiet` is set.
pub fn wait_with_progress<T>(
    task: &Task,
    handle: JoinHandle<Result<T, BackupError>>,
    quiet: bool,
) -> Result<T, BackupError> {
    let interval = Duration::from_millis(PROGRESS_POLL_INTERVAL_MS);
    let mut stderr = io::stderr();

    while !handle.is_finished() {
        if !quiet {
            let _ = write!(stderr, "\r\x1b[2K{}", progress_line(task));
            let _ = stderr.flush();
        }
        thread::sleep(interval);
    }
    if !quiet {
        let _ = writeln!(stderr, "\r\x1b[2K{}", progress_line(task));
    }

    handle.join().unwrap_or_else(|_| {
        Err(BackupError::io(
            PathBuf::new(),
            io::Error::new(io::ErrorKind::Other, "worker thread panicked"),
        ))
    })
}

/// One-line rendering of a task's progress.
///
/// # Examples
///
/// ```
/// use notebook_archiver::cli::progress_line;
/// use notebook_archiver::task::{Task, TaskMessage};
///
/// let task = Task::new();
/// task.set_message(TaskMessage::Text("Archiving 4 files...".to_string()));
/// task.set_percent(0.5);
/// assert_eq!(progress_line(&task), " 50% Archiving 4 files...");
/// ```
pub fn progress_line(task: &Task) -> String {
    let percent = (task.percent() * 100.0).round() as u32;
    let detail = task.detail();
    if detail.is_empty() {
        format!("{:>3}% {}", percent, task.text())
    } else {
        format!("{:>3}% {} {}", percent, task.text(), detail)
    }
}
