//! Structured logging setup.
//!
//! Installs a `tracing-subscriber` formatter on stderr, so stdout stays free
//! for command output. `RUST_LOG` overrides the level chosen from the
//! command-line verbosity.

use crate::constants::{DEFAULT_LOG_LEVEL, LOG_FORMAT_JSON, LOG_FORMAT_TEXT, VERBOSE_LOG_LEVEL};
use crate::errors::{AppError, AppResult};
use std::str::FromStr;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

/// Output format of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            LOG_FORMAT_TEXT => Ok(LogFormat::Text),
            LOG_FORMAT_JSON => Ok(LogFormat::Json),
            other => Err(format!(
                "unknown log format '{}' (expected '{}' or '{}')",
                other, LOG_FORMAT_TEXT, LOG_FORMAT_JSON
            )),
        }
    }
}

/// Builds the level filter: `RUST_LOG` if set, otherwise from verbosity.
fn env_filter(verbose: bool) -> EnvFilter {
    let default_level = if verbose {
        VERBOSE_LOG_LEVEL
    } else {
        DEFAULT_LOG_LEVEL
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Installs the global tracing subscriber.
///
/// # Errors
///
/// Returns `AppError::Logging` if a global subscriber is already installed.
pub fn init_logging(verbose: bool, format: LogFormat) -> AppResult<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr);

    let result = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|e| AppError::Logging(e.to_string()))
}
