/*!
# notebook-archiver

Command-line front end for backing up, restoring and exporting notebooks.

## Usage

```text
notebook-archiver [OPTIONS] <COMMAND>

Commands:
  archive  Archive a notebook into a single compressed file
  restore  Restore a notebook from an archive
  export   Export a notebook as a browsable HTML tree

Options:
  -v, --verbose                  Print verbose output
      --log-format <LOG_FORMAT>  Log line format: text or json [default: text]
  -q, --quiet                    Do not draw a progress line
```

## Configuration

- `NBARCHIVE_DIR`: Directory for archives created without an explicit output path
- `NBARCHIVE_FORMAT`: Default archive format (`tar.gz` or `zip`)

Each operation runs on a worker thread while the main thread polls its task
and draws progress on stderr. Ctrl-C aborts the task: the worker removes any
partial archive or staging directory before the process exits.
*/

use chrono::Local;
use notebook_archiver::cli::{cancel_on_interrupt, wait_with_progress, CliArgs, Command};
use notebook_archiver::config::Config;
use notebook_archiver::errors::AppResult;
use notebook_archiver::logging;
use notebook_archiver::notebook::{FsNotebook, Notebook};
use notebook_archiver::ops::{
    self, default_archive_stem, describe_outcome, unique_archive_path, ArchiveFormat,
    OperationKind, OperationOutcome, OutcomeStatus, RestoreMode,
};
use notebook_archiver::task::{self, Task};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

fn main() -> ExitCode {
    let args = CliArgs::parse();

    if let Err(err) = logging::init_logging(args.verbose, args.log_format) {
        eprintln!("{}", err);
    }
    debug!("CLI arguments: {:?}", args);

    match run(args) {
        Ok(outcome) => match outcome.status {
            OutcomeStatus::Succeeded => {
                println!("{}", outcome.message);
                ExitCode::SUCCESS
            }
            OutcomeStatus::Canceled => {
                info!("Operation canceled");
                ExitCode::SUCCESS
            }
            OutcomeStatus::Failed => {
                eprintln!("{}", outcome.message);
                ExitCode::FAILURE
            }
        },
        Err(err) => {
            error!("{}", err);
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}

/// Runs the selected command and describes how it ended.
///
/// Errors returned here happen before the operation starts (configuration,
/// opening the notebook); errors from the operation itself are folded into the
/// returned outcome.
fn run(args: CliArgs) -> AppResult<OperationOutcome> {
    let quiet = args.quiet;
    let shared = Arc::new(Task::new());
    if let Err(err) = cancel_on_interrupt(Arc::clone(&shared)) {
        warn!("{}; Ctrl-C will not clean up", err);
    }

    match args.command {
        Command::Archive {
            notebook,
            output,
            format,
        } => {
            let config = Config::load()?;
            let notebook = FsNotebook::open(&notebook)?;
            let format = format.unwrap_or(config.archive_format);
            let output = match output {
                Some(path) => with_default_extension(path, format),
                None => default_output(&config, &notebook, format)?,
            };
            info!("Archiving to {:?}", output);

            let handle = task::spawn(Arc::clone(&shared), move |task| {
                ops::archive_notebook(&notebook, &output, format, task)
            });
            let result = wait_with_progress(&shared, handle, quiet);
            if let Ok(report) = &result {
                println!(
                    "{} ({} files, {} bytes, blake3 {})",
                    report.archive_path.display(),
                    report.files_archived,
                    report.archive_size,
                    report.checksum
                );
            }
            Ok(describe_outcome(OperationKind::Archive, &result))
        }

        Command::Restore {
            archive,
            destination,
            into,
        } => {
            let mode = if into {
                RestoreMode::Into
            } else {
                RestoreMode::Rename
            };
            let handle = task::spawn(Arc::clone(&shared), move |task| {
                ops::restore_notebook(&archive, &destination, mode, task)
            });
            let result = wait_with_progress(&shared, handle, quiet);
            if let Ok(report) = &result {
                println!("{}", report.restored_path.display());
            }
            Ok(describe_outcome(OperationKind::Restore, &result))
        }

        Command::Export {
            notebook,
            destination,
        } => {
            let notebook = FsNotebook::open(&notebook)?;
            let handle = task::spawn(Arc::clone(&shared), move |task| {
                ops::export_notebook(&notebook, &destination, task)
            });
            let result = wait_with_progress(&shared, handle, quiet);
            if let Ok(report) = &result {
                println!(
                    "{} ({} notes, {} pages copied unchanged)",
                    report.export_path.display(),
                    report.nodes_exported,
                    report.pages_copied
                );
            }
            Ok(describe_outcome(OperationKind::Export, &result))
        }
    }
}

/// Appends the format's extension when the file name has none at all.
fn with_default_extension(path: PathBuf, format: ArchiveFormat) -> PathBuf {
    let has_dot = path
        .file_name()
        .map(|name| name.to_string_lossy().contains('.'))
        .unwrap_or(true);
    if has_dot {
        path
    } else {
        let mut name = path.into_os_string();
        name.push(".");
        name.push(format.extension());
        PathBuf::from(name)
    }
}

fn default_output(
    config: &Config,
    notebook: &FsNotebook,
    format: ArchiveFormat,
) -> AppResult<PathBuf> {
    config.validate()?;
    fs::create_dir_all(&config.archive_dir)?;
    let name = notebook
        .path()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "notebook".to_string());
    let stem = default_archive_stem(&name, Local::now().date_naive());
    Ok(unique_archive_path(&config.archive_dir, &stem, format))
}
