//! Logging setup for hosts embedding the compositor core.
//!
//! The core itself only emits `tracing` events; these helpers install a global
//! subscriber for hosts that do not bring their own.

use std::io::{stderr, stdout};
use std::path::Path;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

use crate::config::LoggingConfig;
use crate::error::CompositorError;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Installs a stderr subscriber filtered by `RUST_LOG` (default `info`).
///
/// Meant for tests and early startup; does nothing if a subscriber is already set.
pub fn init_minimal_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));

    let _ = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(stderr)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .try_init();
}

fn parse_level(level: &str) -> Result<Level, CompositorError> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        invalid => Err(CompositorError::Logging(format!("Invalid log level in config: {invalid}"))),
    }
}

/// Daily-rolling file layer; the guard must live as long as logging is needed.
fn create_file_layer(log_path: &Path, format: &str) -> Result<(BoxedLayer, WorkerGuard), CompositorError> {
    let directory = log_path.parent().filter(|parent| !parent.as_os_str().is_empty()).unwrap_or(Path::new("."));
    std::fs::create_dir_all(directory).map_err(|err| {
        CompositorError::Logging(format!("Failed to create log directory {}: {err}", directory.display()))
    })?;
    let file_name = log_path.file_name().unwrap_or(std::ffi::OsStr::new("compositor.log"));

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(directory, file_name));
    let layer = match format.to_lowercase().as_str() {
        "json" => fmt::layer().json().with_writer(writer).with_ansi(false).boxed(),
        _ => fmt::layer().with_writer(writer).with_ansi(false).boxed(),
    };
    Ok((layer, guard))
}

/// Installs the global subscriber described by `config`: a stdout layer in the
/// configured format plus an optional file layer.
///
/// Returns the file writer's guard, if any; dropping it flushes and stops file
/// logging.
///
/// # Errors
/// `CompositorError::Logging` for an invalid level, an unusable log directory, or
/// when a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>, CompositorError> {
    let level = parse_level(&config.level)?;

    let stdout_layer = match config.format.to_lowercase().as_str() {
        "json" => fmt::layer()
            .json()
            .with_writer(stdout)
            .with_ansi(false)
            .with_filter(EnvFilter::new(level.to_string()))
            .boxed(),
        _ => fmt::layer()
            .with_writer(stdout)
            .with_ansi(atty::is(atty::Stream::Stdout))
            .with_filter(EnvFilter::new(level.to_string()))
            .boxed(),
    };

    let mut layers: Vec<BoxedLayer> = vec![stdout_layer];
    let mut guard = None;
    if let Some(log_path) = &config.file_path {
        let (file_layer, file_guard) = create_file_layer(log_path, &config.format)?;
        layers.push(file_layer.with_filter(EnvFilter::new(level.to_string())).boxed());
        guard = Some(file_guard);
    }

    Registry::default().with(layers).try_init().map_err(|err| {
        CompositorError::Logging(format!("Failed to set global tracing subscriber. Was it already initialized? {err}"))
    })?;
    Ok(guard)
}
