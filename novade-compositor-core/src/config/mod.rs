//! Configuration for the compositor core.
//!
//! Loaded from TOML. Every section and field is optional and falls back to the
//! values in [`defaults`]; unknown fields are rejected.
//!
//! ```toml
//! [logging]
//! level = "debug"
//! format = "json"
//!
//! [render]
//! backends = ["software"]
//! clear_color = [0.1, 0.1, 0.1, 1.0]
//!
//! [output]
//! default_resolution = { width = 1920, height = 1080 }
//! ```

mod defaults;

use std::path::{Path, PathBuf};

use novade_render_context::BUILTIN_BACKENDS;
use serde::Deserialize;
use tracing::debug;

use crate::error::ConfigError;
use crate::view::Size;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// One of "trace", "debug", "info", "warn", "error" (case-insensitive).
    #[serde(default = "defaults::default_log_level")]
    pub level: String,
    /// Optional log file, written in addition to stdout.
    #[serde(default = "defaults::default_log_file_path")]
    pub file_path: Option<PathBuf>,
    /// "text" or "json".
    #[serde(default = "defaults::default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        defaults::default_logging_config()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenderConfig {
    /// Backend names probed, in order, for every output.
    #[serde(default = "defaults::default_backends")]
    pub backends: Vec<String>,
    /// RGBA, each channel in `0.0..=1.0`.
    #[serde(default = "defaults::default_clear_color")]
    pub clear_color: [f32; 4],
}

impl Default for RenderConfig {
    fn default() -> Self {
        defaults::default_render_config()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Used for backend surfaces that do not report a size.
    #[serde(default = "defaults::default_resolution")]
    pub default_resolution: Size,
}

impl Default for OutputConfig {
    fn default() -> Self {
        defaults::default_output_config()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompositorConfig {
    #[serde(default = "defaults::default_logging_config")]
    pub logging: LoggingConfig,
    #[serde(default = "defaults::default_render_config")]
    pub render: RenderConfig,
    #[serde(default = "defaults::default_output_config")]
    pub output: OutputConfig,
}

impl CompositorConfig {
    /// Parses a configuration without validating it.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Loads and validates the configuration at `path`.
    ///
    /// A missing file yields the default configuration.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no configuration file, using defaults");
                Self::default()
            }
            Err(source) => return Err(ConfigError::Read { path: path.to_path_buf(), source }),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks every value and normalizes level and format to lower case.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        let level = self.logging.level.to_lowercase();
        if !matches!(level.as_str(), "trace" | "debug" | "info" | "warn" | "error") {
            return Err(ConfigError::Validation(format!(
                "Invalid log level: '{}'. Must be one of trace, debug, info, warn, error.",
                self.logging.level
            )));
        }
        self.logging.level = level;

        let format = self.logging.format.to_lowercase();
        if !matches!(format.as_str(), "text" | "json") {
            return Err(ConfigError::Validation(format!(
                "Invalid log format: '{}'. Must be one of text, json.",
                self.logging.format
            )));
        }
        self.logging.format = format;

        if self.render.backends.is_empty() {
            return Err(ConfigError::Validation("render.backends must name at least one backend".to_string()));
        }
        if let Some(unknown) = self.render.backends.iter().find(|name| !BUILTIN_BACKENDS.contains(&name.as_str())) {
            return Err(ConfigError::Validation(format!(
                "Unknown render backend: '{}'. Must be one of {}.",
                unknown,
                BUILTIN_BACKENDS.join(", ")
            )));
        }
        if self.render.clear_color.iter().any(|channel| !(0.0..=1.0).contains(channel)) {
            return Err(ConfigError::Validation(format!(
                "render.clear_color channels must be within 0.0..=1.0, got {:?}",
                self.render.clear_color
            )));
        }

        let resolution = self.output.default_resolution;
        if resolution.width == 0 || resolution.height == 0 {
            return Err(ConfigError::Validation(format!(
                "output.default_resolution must be non-zero, got {}x{}",
                resolution.width, resolution.height
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = CompositorConfig::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.file_path, None);
        assert_eq!(config.logging.format, "text");
        assert_eq!(config.render.backends, vec!["software".to_string()]);
        assert_eq!(config.render.clear_color, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(config.output.default_resolution, Size { width: 1280, height: 720 });
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(CompositorConfig::from_toml_str("").unwrap(), CompositorConfig::default());
    }

    #[test]
    fn test_partial_document() {
        let config = CompositorConfig::from_toml_str(
            r#"
            [render]
            backends = ["egl", "software"]

            [output]
            default_resolution = { width = 800, height = 600 }
            "#,
        )
        .unwrap();
        assert_eq!(config.render.backends, vec!["egl".to_string(), "software".to_string()]);
        assert_eq!(config.render.clear_color, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(config.output.default_resolution, Size { width: 800, height: 600 });
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let result = CompositorConfig::from_toml_str("[render]\nvsync = true\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validate_normalizes_case() {
        let mut config = CompositorConfig::from_toml_str("[logging]\nlevel = \"DEBUG\"\nformat = \"Json\"\n").unwrap();
        config.validate().unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
    }

    #[rstest]
    #[case("[logging]\nlevel = \"verbose\"\n")]
    #[case("[logging]\nformat = \"xml\"\n")]
    #[case("[render]\nbackends = []\n")]
    #[case("[render]\nbackends = [\"software\", \"vulkan\"]\n")]
    #[case("[render]\nclear_color = [0.0, 1.5, 0.0, 1.0]\n")]
    #[case("[output]\ndefault_resolution = { width = 0, height = 600 }\n")]
    fn test_validate_rejects(#[case] toml_str: &str) {
        let mut config = CompositorConfig::from_toml_str(toml_str).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CompositorConfig::load(&dir.path().join("compositor.toml")).unwrap();
        assert_eq!(config, CompositorConfig::default());
    }

    #[test]
    fn test_load_reads_and_validates_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\nlevel = \"WARN\"\n[render]\nbackends = [\"software\"]").unwrap();

        let config = CompositorConfig::load(file.path()).unwrap();
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.render.backends, vec!["software".to_string()]);
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[render\nbackends = ").unwrap();
        assert!(matches!(CompositorConfig::load(file.path()), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_directory_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(CompositorConfig::load(dir.path()), Err(ConfigError::Read { .. })));
    }
}
