//! # Novade Buffer Manager
//!
//! This crate tracks the client buffers known to the Novade compositor core: their
//! dimensions, format and orientation, and how many in-flight renders currently
//! read them. Releasing or destroying a buffer that a render still uses is parked
//! until the render completes.

pub mod buffer;

// Re-export key types for convenience.
pub use buffer::{
    BufferDetails, BufferError, BufferFormat, BufferId, BufferManager, BufferRelease, BufferType, ClientId,
};
