//! Logging setup for the host binary.
//!
//! Configures tracing with JSON output to stderr and, when enabled, to a
//! daily-rotated log file under the platform data directory.

use crate::config::LogConfig;
use crate::error::LoggingError;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, time::UtcTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Log directory name under the platform data directory
const LOG_DIR: &str = "adaptive-perf";
/// Log file name prefix
const LOG_FILE_PREFIX: &str = "monitor";
/// Maximum number of log files to retain
const MAX_LOG_FILES: usize = 3;

/// Initialize the global tracing subscriber.
///
/// RUST_LOG takes precedence over the configured level.
pub fn init_logging(config: &LogConfig) -> Result<LogGuard, LoggingError> {
    let (file_writer, file_guard) = if config.file {
        let log_dir = resolve_log_directory(config)?;

        std::fs::create_dir_all(&log_dir).map_err(|e| LoggingError::DirectoryCreationFailed {
            path: log_dir.display().to_string(),
            source: e,
        })?;

        let file_appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .max_log_files(MAX_LOG_FILES)
            .filename_prefix(LOG_FILE_PREFIX)
            .filename_suffix("log")
            .build(&log_dir)
            .map_err(|e| LoggingError::AppenderCreationFailed(e.to_string()))?;

        let (writer, guard) = tracing_appender::non_blocking(file_appender);
        (Some(writer), Some(guard))
    } else {
        (None, None)
    };

    let (non_blocking_stderr, stderr_guard) = tracing_appender::non_blocking(std::io::stderr());

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let file_layer = file_writer.map(|writer| {
        fmt::layer()
            .json()
            .with_timer(UtcTime::rfc_3339())
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(writer)
    });

    let stderr_layer = fmt::layer()
        .json()
        .with_timer(UtcTime::rfc_3339())
        .with_current_span(true)
        .with_writer(non_blocking_stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    Ok(LogGuard {
        _file_guard: file_guard,
        _stderr_guard: stderr_guard,
    })
}

/// Configured directory, or `<data dir>/adaptive-perf`.
pub fn resolve_log_directory(config: &LogConfig) -> Result<PathBuf, LoggingError> {
    match &config.directory {
        Some(dir) => Ok(dir.clone()),
        None => dirs::data_local_dir()
            .map(|dir| dir.join(LOG_DIR))
            .ok_or(LoggingError::DataDirectoryNotFound),
    }
}

/// Keeps the non-blocking writers alive.
/// Must be held for the lifetime of the application.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
    _stderr_guard: WorkerGuard,
}
