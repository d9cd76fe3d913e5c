//! Logging initialization.
//!
//! `serve` with `logging.to_file`: logs to `{logging.dir}/mahakrama-{datetime}.log`
//! Everything else: logs to stderr

use anyhow::Result;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// Result of logging initialization
pub struct LoggingHandle {
    /// Guard that must be kept alive for the duration of the program.
    /// When dropped, ensures all buffered logs are flushed.
    pub _guard: Option<WorkerGuard>,

    /// Path to the log file (only set when file logging is active)
    pub log_file_path: Option<PathBuf>,
}

/// Effective filter directive: `--debug` beats the configured level
pub fn log_level(config: &Config, debug_override: bool) -> String {
    if debug_override {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    }
}

/// File name for a log started at `timestamp`
pub fn log_file_name(timestamp: chrono::DateTime<chrono::Utc>) -> String {
    format!("mahakrama-{}.log", timestamp.format("%Y%m%dT%H%M%SZ"))
}

/// Whether logs go to a file rather than stderr. Only `serve` writes log files.
pub fn logs_to_file(config: &Config, is_server_mode: bool) -> bool {
    is_server_mode && config.logging.to_file
}

/// Initialize logging.
///
/// # Arguments
/// * `config` - Application configuration
/// * `is_server_mode` - Whether running the REST server (file logging allowed)
/// * `debug_override` - If true, override log level to "debug" (from --debug flag)
pub fn init_logging(
    config: &Config,
    is_server_mode: bool,
    debug_override: bool,
) -> Result<LoggingHandle> {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| log_level(config, debug_override)),
    );

    if logs_to_file(config, is_server_mode) {
        let logs_dir = config.logs_path();
        std::fs::create_dir_all(&logs_dir)?;

        let log_filename = log_file_name(chrono::Utc::now());
        let log_file_path = logs_dir.join(&log_filename);

        let file_appender = tracing_appender::rolling::never(&logs_dir, &log_filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false) // No ANSI codes in log files
                    .with_writer(non_blocking),
            )
            .init();

        Ok(LoggingHandle {
            _guard: Some(guard),
            log_file_path: Some(log_file_path),
        })
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();

        Ok(LoggingHandle {
            _guard: None,
            log_file_path: None,
        })
    }
}
