/*!
# notebook-archiver

notebook-archiver backs up, restores and exports hierarchical notebooks kept on
disk as a tree of directories, one per note, each carrying a `node.json`
metadata file and optionally a `page.html` body.

## Core Features

- Archive a whole notebook directory into a single `.tar.gz` or `.zip` file
- Restore a notebook from an archive, either as a new notebook path or into an
  existing base directory
- Export a notebook as a static HTML tree whose inter-note links point at the
  exported pages
- Progress reporting and cancellation for every operation through a shared `Task`

## Architecture

- `cli`: Command-line interface handling using clap, plus the progress line
- `config`: Configuration loading and validation
- `errors`: Error handling infrastructure
- `logging`: tracing subscriber setup
- `notebook`: On-disk notebook model
- `ops`: Archive, restore and export operations
- `task`: Progress and cancellation handle shared with worker threads

## Usage Example

```rust,no_run
use notebook_archiver::notebook::FsNotebook;
use notebook_archiver::ops::{archive_notebook, ArchiveFormat};
use notebook_archiver::Task;
use std::path::Path;

fn main() -> notebook_archiver::AppResult<()> {
    let notebook = FsNotebook::open(Path::new("/home/me/Notes"))?;
    let task = Task::new();
    let report = archive_notebook(
        &notebook,
        Path::new("/backups/Notes.tar.gz"),
        ArchiveFormat::TarGz,
        &task,
    )?;
    println!("{} files archived", report.files_archived);
    Ok(())
}
```
*/

/// Command-line interface for parsing arguments and drawing progress
pub mod cli;
/// Configuration loading and management
pub mod config;
/// Constants shared across modules
pub mod constants;
/// Error types and utilities for error handling
pub mod errors;
/// Logging setup
pub mod logging;
/// On-disk notebook model
pub mod notebook;
/// Archive, restore and export operations
pub mod ops;
/// Progress and cancellation tracking
pub mod task;

// Re-export important types for convenience
pub use cli::CliArgs;
pub use config::Config;
pub use errors::{AppError, AppResult, BackupError, NotebookError};
pub use notebook::{FsNotebook, Notebook};
pub use task::Task;
