//! Constants used throughout the application.
//!
//! This module contains the constants shared by the archive, restore and export
//! operations and by the command-line front end, organized into logical groups.

// Application Metadata
/// The name of the application.
pub const APP_NAME: &str = "notebook-archiver";
/// The description of the application used in CLI help text.
pub const APP_DESCRIPTION: &str = "Back up, restore and export hierarchical notebooks";

// Logging
/// Log format identifier for plain text.
pub const LOG_FORMAT_TEXT: &str = "text";
/// Log format identifier for JSON.
pub const LOG_FORMAT_JSON: &str = "json";
/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";
/// Log level used when `--verbose` is given.
pub const VERBOSE_LOG_LEVEL: &str = "debug";

// Configuration Keys & Environment Variables
/// Environment variable for the directory new archives are written to.
pub const ENV_VAR_ARCHIVE_DIR: &str = "NBARCHIVE_DIR";
/// Environment variable for the default archive format.
pub const ENV_VAR_ARCHIVE_FORMAT: &str = "NBARCHIVE_FORMAT";
/// Standard environment variable for the user's home directory.
pub const ENV_VAR_HOME: &str = "HOME";
/// Default sub-directory for archives within the user's home directory.
pub const DEFAULT_ARCHIVE_SUBDIR: &str = "Documents";

// Notebook Layout
/// Name of the per-node metadata file.
pub const NODE_METADATA_FILE: &str = "node.json";
/// Name of the rich page file inside a page node.
pub const PAGE_FILE: &str = "page.html";
/// Content type of rich XHTML pages.
pub const CONTENT_TYPE_PAGE: &str = "text/xhtml+xml";
/// Content type of plain folder nodes.
pub const CONTENT_TYPE_DIR: &str = "application/x-notebook-dir";
/// Scheme prefix of internal node links.
pub const NODE_URL_PREFIX: &str = "nbk://";

// Archive Formats
/// File extension of gzip-compressed tar archives.
pub const TAR_GZ_EXTENSION: &str = "tar.gz";
/// File extension of zip archives.
pub const ZIP_EXTENSION: &str = "zip";
/// Separator between the archive stem and a uniqueness counter.
pub const UNIQUE_NAME_SEPARATOR: &str = ".";
/// Suffix of staging directories created during restore.
pub const STAGING_SUFFIX: &str = "-tmp";

// HTML Export
/// Frameset page written at the export root.
pub const EXPORT_INDEX_FILE: &str = "index.html";
/// Navigation tree page written at the export root.
pub const EXPORT_TREE_FILE: &str = "tree.html";

// Progress Reporting
/// Maximum length of a progress detail line, in characters.
pub const MAX_DETAIL_LEN: usize = 100;
/// Prefix shown when a detail line has been truncated.
pub const DETAIL_ELLIPSIS: &str = "...";
/// Interval at which the CLI polls a running task, in milliseconds.
pub const PROGRESS_POLL_INTERVAL_MS: u64 = 100;
