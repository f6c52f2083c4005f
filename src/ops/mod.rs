//! High-level notebook operations: archive, restore and HTML export.
//!
//! Each operation runs against a `Task` for progress and cancellation, and
//! returns a report on success. `describe_outcome` turns any operation result
//! into the message a front end shows the user.

pub mod archive;
pub mod export;
pub mod restore;
pub mod walk;

use crate::errors::BackupError;

// Re-export commonly used functions
pub use archive::{
    archive_notebook, default_archive_stem, unique_archive_path, ArchiveFormat, ArchiveReport,
};
pub use export::{export_notebook, relative_path, ExportReport};
pub use restore::{restore_notebook, RestoreMode, RestoreReport, RESTORE_WRITE_ERROR};
pub use walk::{count_files, walk_tree, TreeVisitor, WalkContext};

/// Which operation a result came from, for user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Archive,
    Restore,
    Export,
}

impl OperationKind {
    fn success_message(self) -> &'static str {
        match self {
            OperationKind::Archive => "Notebook archived",
            OperationKind::Restore => "Notebook restored",
            OperationKind::Export => "Notebook exported",
        }
    }

    fn failure_context(self) -> &'static str {
        match self {
            OperationKind::Archive => "Error while archiving notebook",
            OperationKind::Restore => "Error restoring notebook",
            OperationKind::Export => "Error while exporting notebook",
        }
    }
}

/// How an operation ended, from the user's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    Succeeded,
    /// The user aborted the task; not reported as an error.
    Canceled,
    Failed,
}

/// Status plus a human-readable message for a finished operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationOutcome {
    pub status: OutcomeStatus,
    pub message: String,
}

/// Maps an operation result to the status and message shown to the user.
///
/// Failure messages have the form `"<context>:\n<error>"`, so the message of a
/// restore error is shown verbatim on its second line.
///
/// # Examples
///
/// ```
/// use notebook_archiver::errors::BackupError;
/// use notebook_archiver::ops::{describe_outcome, OperationKind, OutcomeStatus};
///
/// let outcome = describe_outcome(OperationKind::Restore, &Err::<(), _>(BackupError::Canceled));
/// assert_eq!(outcome.status, OutcomeStatus::Canceled);
/// ```
pub fn describe_outcome<T>(kind: OperationKind, result: &Result<T, BackupError>) -> OperationOutcome {
    match result {
        Ok(_) => OperationOutcome {
            status: OutcomeStatus::Succeeded,
            message: kind.success_message().to_string(),
        },
        Err(BackupError::Canceled) => OperationOutcome {
            status: OutcomeStatus::Canceled,
            message: String::new(),
        },
        Err(err) => OperationOutcome {
            status: OutcomeStatus::Failed,
            message: format!("{}:\n{}", kind.failure_context(), err),
        },
    }
}
