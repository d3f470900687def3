//! Logging for tagcure.
//!
//! Every run appends to `tagcure.log` in the platform cache directory
//! (`~/.cache/tagcure/` on Linux). By default only tagcure's own `info`
//! events and other crates' warnings are kept; `TAGCURE_LOG` takes any
//! `EnvFilter` directive list instead and also mirrors events to stderr.
//!
//! ```bash
//! # Every sidecar write and skipped file
//! TAGCURE_LOG=tagcure=debug tagcure tag ./dataset a.png --add smile
//!
//! tail -f ~/.cache/tagcure/tagcure.log
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt::{self, format::FmtSpan}, prelude::*, EnvFilter};

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "TAGCURE_LOG";

const LOG_FILE_NAME: &str = "tagcure.log";
const DEFAULT_FILTER: &str = "warn,tagcure=info";

fn log_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "tagcure").map(|dirs| dirs.cache_dir().to_path_buf())
}

/// Path of the log file, if the platform has a cache directory
pub fn log_file_path() -> Option<PathBuf> {
    log_dir().map(|dir| dir.join(LOG_FILE_NAME))
}

/// Parse a `TAGCURE_LOG` value. A value that does not parse is reported
/// back and the default filter used instead.
fn parse_filter(value: Option<&str>) -> (EnvFilter, Option<String>) {
    match value.map(EnvFilter::try_new) {
        Some(Ok(filter)) => (filter, None),
        Some(Err(err)) => (EnvFilter::new(DEFAULT_FILTER), Some(err.to_string())),
        None => (EnvFilter::new(DEFAULT_FILTER), None),
    }
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer when dropped, so hold it
/// until the program exits.
pub fn init_logging() -> Result<WorkerGuard> {
    let dir = log_dir().context("Failed to determine cache directory")?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create cache directory: {}", dir.display()))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILE_NAME)
        .build(&dir)
        .with_context(|| format!("Failed to open log file in {}", dir.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let env_value = std::env::var(LOG_ENV).ok();
    let (filter, rejected) = parse_filter(env_value.as_deref());

    // Load and sync spans report their duration on close
    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE);

    let stderr_layer = env_value.is_some().then(|| {
        fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("Failed to set global tracing subscriber")?;

    if let Some(reason) = rejected {
        warn!(value = ?env_value, %reason, "ignoring invalid TAGCURE_LOG");
    }
    Ok(guard)
}
