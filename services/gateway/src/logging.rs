use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::settings::LoggingConfig;

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the global subscriber: human-readable stdout, plus hourly
/// rotated JSON files when a log file is configured.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let stdout_layer = fmt::layer()
        .with_target(false)
        .with_filter(filter(&config.level));

    let Some(path) = config.file.as_deref() else {
        tracing_subscriber::registry().with(stdout_layer).try_init()?;
        return Ok(());
    };

    let appender = rolling_appender(path, config.max_files)?;
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = FILE_GUARD.set(guard);
    let file_layer = fmt::layer()
        .json()
        .with_ansi(false)
        .with_target(true)
        .with_writer(writer)
        .with_filter(filter(&config.level));

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .try_init()?;
    Ok(())
}

fn rolling_appender(path: &Path, max_files: usize) -> Result<RollingFileAppender> {
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let prefix = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("gateway.log");

    RollingFileAppender::builder()
        .rotation(Rotation::HOURLY)
        .filename_prefix(prefix)
        .max_log_files(max_files)
        .build(dir)
        .with_context(|| format!("failed to open log directory {}", dir.display()))
}
