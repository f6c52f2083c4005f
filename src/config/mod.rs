//! Configuration management for the notebook archiver.
//!
//! This module loads settings from environment variables, with sensible
//! defaults.
//!
//! # Environment Variables
//!
//! - `NBARCHIVE_DIR`: Directory new archives are written to (defaults to ~/Documents)
//! - `NBARCHIVE_FORMAT`: Default archive format, `tar.gz` or `zip` (defaults to `tar.gz`)
//! - `HOME`: Used for expanding the default archive directory path

use crate::constants::{
    DEFAULT_ARCHIVE_SUBDIR, ENV_VAR_ARCHIVE_DIR, ENV_VAR_ARCHIVE_FORMAT, ENV_VAR_HOME,
};
use crate::errors::{AppError, AppResult};
use crate::ops::ArchiveFormat;
use std::env;
use std::path::PathBuf;

/// Configuration for the notebook archiver.
///
/// # Examples
///
/// ```
/// use notebook_archiver::Config;
/// use notebook_archiver::ops::ArchiveFormat;
/// use std::path::PathBuf;
///
/// let config = Config {
///     archive_dir: PathBuf::from("/backups"),
///     archive_format: ArchiveFormat::Zip,
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory where archives are created when no output path is given.
    pub archive_dir: PathBuf,

    /// Archive format used when none is given on the command line.
    pub archive_format: ArchiveFormat,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            archive_dir: PathBuf::from(""),
            archive_format: ArchiveFormat::default(),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables with sensible defaults.
    ///
    /// The archive directory is expanded with `shellexpand`, so `~` and
    /// environment variable references are resolved.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if:
    /// - The archive directory path expansion fails
    /// - The archive directory resolves to an empty path
    /// - `NBARCHIVE_FORMAT` names an unknown format
    pub fn load() -> AppResult<Self> {
        let archive_dir_str = env::var(ENV_VAR_ARCHIVE_DIR).unwrap_or_else(|_| {
            let home = env::var(ENV_VAR_HOME).unwrap_or_else(|_| "".to_string());
            format!("{}/{}", home, DEFAULT_ARCHIVE_SUBDIR)
        });

        let expanded_path = shellexpand::full(&archive_dir_str)
            .map_err(|e| AppError::Config(format!("Failed to expand path: {}", e)))?;
        let archive_dir = PathBuf::from(expanded_path.into_owned());

        if archive_dir.as_os_str().is_empty() {
            return Err(AppError::Config(
                "Archive directory path is empty".to_string(),
            ));
        }

        let archive_format = match env::var(ENV_VAR_ARCHIVE_FORMAT) {
            Ok(value) => value.parse::<ArchiveFormat>().map_err(AppError::Config)?,
            Err(_) => ArchiveFormat::default(),
        };

        Ok(Config {
            archive_dir,
            archive_format,
        })
    }

    /// Validates that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the archive directory is empty or relative.
    pub fn validate(&self) -> AppResult<()> {
        if self.archive_dir.as_os_str().is_empty() {
            return Err(AppError::Config(
                "Archive directory path is empty".to_string(),
            ));
        }

        if !self.archive_dir.is_absolute() {
            return Err(AppError::Config(
                "Archive directory must be an absolute path".to_string(),
            ));
        }

        Ok(())
    }
}
