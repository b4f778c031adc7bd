use std::fs;
use tracing::subscriber::DefaultGuard;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingSettings;
use crate::error::Result;

/// Keeps the invocation's subscriber installed and the file writer alive.
/// Dropping it restores the previous subscriber and flushes pending lines.
pub struct LoggingGuard {
    _default: DefaultGuard,
    _file: Option<WorkerGuard>,
}

/// Build a console + (optional) JSON file subscriber and install it as the
/// default for the current thread until the returned guard is dropped.
pub fn init_logging(settings: &LoggingSettings) -> Result<LoggingGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.level.as_str()));

    let (file_layer, file_guard) = if settings.json_file {
        fs::create_dir_all(&settings.dir)?;
        // Daily-rotated JSON lines next to the human-readable console output
        let file_appender = tracing_appender::rolling::daily(&settings.dir, "basic_cleaning.log");
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);
        let layer = fmt::layer()
            .json()
            .with_ansi(false)
            .with_writer(non_blocking_writer);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let console_layer = fmt::layer().with_writer(std::io::stdout);

    let default = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .set_default();

    Ok(LoggingGuard {
        _default: default,
        _file: file_guard,
    })
}
