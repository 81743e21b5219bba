//! Error types for the compositor core.
//!
//! [`CompositorError`] is the crate's main error type. Lookups of stale or unknown
//! handles are not errors: accessors return `Option` and mutators on a gone object
//! are no-ops, so only operations that must tell the caller about a bad handle
//! report [`CompositorError::InvalidHandle`].

use std::path::PathBuf;

use novade_buffer_manager::BufferError;
use novade_render_context::ContextError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompositorError {
    /// A protocol-backed object could not be allocated. The client has been sent
    /// the protocol's "no memory" error and nothing was changed.
    #[error("Resource exhausted: could not allocate {0}")]
    ResourceExhausted(&'static str),

    #[error("Invalid handle: {0} does not exist or was destroyed")]
    InvalidHandle(&'static str),

    /// Every output failed to initialize a render backend.
    #[error("No output can be driven by any render backend")]
    NoRenderableOutput,

    #[error("Buffer Error: {0}")]
    Buffer(#[from] BufferError),

    #[error("Render Context Error: {0}")]
    Context(#[from] ContextError),

    #[error("Configuration Error: {0}")]
    Config(#[from] ConfigError),

    #[error("Logging Initialization Failed: {0}")]
    Logging(String),
}

/// Error type for configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file from {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration validation failed: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::error::Error;

    #[test]
    fn test_config_error_wraps_into_compositor_error() {
        let err = CompositorError::from(ConfigError::Validation("empty backend list".to_string()));
        assert_eq!(err.to_string(), "Configuration Error: Configuration validation failed: empty backend list");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_read_error_keeps_io_source() {
        let err = ConfigError::Read {
            path: PathBuf::from("/etc/novade/compositor.toml"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let source = err.source().and_then(|source| source.downcast_ref::<std::io::Error>());
        assert_eq!(source.map(std::io::Error::kind), Some(std::io::ErrorKind::PermissionDenied));
    }

    #[test]
    fn test_context_error_conversion() {
        let err: CompositorError = ContextError::Terminated.into();
        assert!(matches!(err, CompositorError::Context(ContextError::Terminated)));
    }
}
