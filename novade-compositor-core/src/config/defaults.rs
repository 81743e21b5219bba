//! Default configuration values for the compositor core.
//!
//! Used by `serde`'s `default` attribute on the configuration structures.

use std::path::PathBuf;

use novade_render_context::DEFAULT_BACKENDS;

use crate::config::{LoggingConfig, OutputConfig, RenderConfig};
use crate::view::Size;

pub(super) fn default_logging_config() -> LoggingConfig {
    LoggingConfig { level: default_log_level(), file_path: default_log_file_path(), format: default_log_format() }
}

/// `"info"`.
pub(super) fn default_log_level() -> String {
    "info".to_string()
}

/// No log file.
pub(super) fn default_log_file_path() -> Option<PathBuf> {
    None
}

/// `"text"`.
pub(super) fn default_log_format() -> String {
    "text".to_string()
}

pub(super) fn default_render_config() -> RenderConfig {
    RenderConfig { backends: default_backends(), clear_color: default_clear_color() }
}

/// The software renderer; `egl` has to be named explicitly.
pub(super) fn default_backends() -> Vec<String> {
    DEFAULT_BACKENDS.iter().map(|name| name.to_string()).collect()
}

/// Opaque black.
pub(super) fn default_clear_color() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

pub(super) fn default_output_config() -> OutputConfig {
    OutputConfig { default_resolution: default_resolution() }
}

pub(super) fn default_resolution() -> Size {
    Size { width: 1280, height: 720 }
}
