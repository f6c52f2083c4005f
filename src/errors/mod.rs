//! Error handling utilities for the notebook archiver.
//!
//! This module provides the error taxonomy shared by the archive, restore and
//! export operations (`BackupError`), the errors raised by the notebook model
//! (`NotebookError`), and the application-level `AppError` with its
//! convenience alias `AppResult`.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Represents errors raised while loading or saving a notebook.
///
/// # Examples
///
/// ```
/// use notebook_archiver::errors::NotebookError;
/// use std::path::PathBuf;
///
/// let error = NotebookError::NotFound {
///     path: PathBuf::from("/notes/missing"),
/// };
/// assert!(format!("{}", error).contains("/notes/missing"));
/// ```
#[derive(Debug, Error)]
pub enum NotebookError {
    /// The notebook directory or one of its node metadata files is missing.
    #[error("Notebook not found at {path}. Expected a directory containing node.json.")]
    NotFound {
        /// The path that was expected to hold a notebook node
        path: PathBuf,
    },

    /// Reading or writing a node file failed.
    #[error("Failed to access notebook file {path}: {source}")]
    Io {
        /// The file or directory being accessed
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// A node metadata file could not be parsed or serialized.
    #[error("Invalid node metadata in {path}: {source}")]
    Metadata {
        /// The metadata file
        path: PathBuf,
        /// The underlying serialization error
        #[source]
        source: serde_json::Error,
    },
}

/// Represents the ways an archive, restore or export operation can end
/// without succeeding.
///
/// `Canceled` is not a failure: it is raised when the caller aborts the task
/// and should be handled as a clean stop rather than reported as an error.
///
/// # Examples
///
/// ```
/// use notebook_archiver::errors::BackupError;
/// use std::path::PathBuf;
///
/// let error = BackupError::AlreadyExists {
///     path: PathBuf::from("/backups/notes.tar.gz"),
/// };
/// assert!(format!("{}", error).contains("already exists"));
/// assert!(!error.is_canceled());
/// assert!(BackupError::Canceled.is_canceled());
/// ```
#[derive(Debug, Error)]
pub enum BackupError {
    /// The destination is already taken; nothing is ever overwritten.
    #[error("File '{path}' already exists")]
    AlreadyExists {
        /// The destination path that already exists
        path: PathBuf,
    },

    /// The notebook could not flush its pending edits before the operation.
    #[error("Could not save notebook before archiving: {0}")]
    SaveFailed(#[source] NotebookError),

    /// The user aborted the task.
    #[error("Operation canceled")]
    Canceled,

    /// A read, write or copy failed while walking the tree.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path being processed when the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// An argument was empty or malformed.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Writing the extracted notebook failed during restore.
    ///
    /// The message is meant to be shown to the user verbatim.
    #[error("{message}")]
    Restore {
        /// Human-readable description of the failure
        message: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The archive does not have the expected single notebook folder layout.
    #[error("Malformed archive: {0}")]
    MalformedArchive(String),

    /// The file is neither a gzip tar nor a zip archive.
    #[error("Unsupported archive format: {path}")]
    UnsupportedArchive {
        /// The archive path
        path: PathBuf,
    },
}

impl BackupError {
    /// Wraps an I/O error with the path it occurred at.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        BackupError::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true when the operation stopped because the task was aborted.
    pub fn is_canceled(&self) -> bool {
        matches!(self, BackupError::Canceled)
    }
}

/// Represents all possible errors that can occur in the application.
///
/// This enum is the error type returned at the application boundary. Library
/// operations return the more specific `BackupError`, which converts into this
/// type through `From`.
///
/// # Examples
///
/// ```
/// use notebook_archiver::errors::AppError;
/// use std::io::{self, ErrorKind};
///
/// let io_error = io::Error::new(ErrorKind::NotFound, "file not found");
/// let app_error: AppError = io_error.into();
///
/// match app_error {
///     AppError::Io(inner) => assert_eq!(inner.kind(), ErrorKind::NotFound),
///     _ => panic!("Expected Io variant"),
/// }
/// ```
#[derive(Debug, Error)]
pub enum AppError {
    /// Errors related to configuration loading or validation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input/output errors from filesystem operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors from loading or saving the notebook model.
    #[error("Notebook error: {0}")]
    Notebook(#[from] NotebookError),

    /// Errors from archive, restore or export operations.
    #[error("{0}")]
    Backup(#[from] BackupError),

    /// The logging subscriber could not be installed.
    #[error("Logging error: {0}")]
    Logging(String),

    /// The interrupt handler could not be installed.
    #[error("Signal handler error: {0}")]
    Signal(String),
}

/// A type alias for `Result<T, AppError>` to simplify function signatures.
///
/// # Examples
///
/// ```
/// use notebook_archiver::errors::{AppError, AppResult};
///
/// fn might_fail() -> AppResult<String> {
///     if false {
///         return Err(AppError::Config("Something went wrong".to_string()));
///     }
///     Ok("Operation succeeded".to_string())
/// }
/// ```
pub type AppResult<T> = Result<T, AppError>;
