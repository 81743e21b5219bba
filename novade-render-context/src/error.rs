// Copyright (c) 2025 NovaDE Contributors
// SPDX-License-Identifier: MIT

// Definition of the render context error types using `thiserror`.

use thiserror::Error;

use crate::context::ImageId;

/// A backend surface could not hand the finished frame to the display.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("page flip failed: {0}")]
pub struct PageFlipError(pub String);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    /// A backend constructor failed; everything it created has been released.
    #[error("failed to initialize {backend} backend: {reason}")]
    Init { backend: &'static str, reason: String },

    /// Every configured backend failed for this backend surface.
    #[error("no usable render backend (tried: {})", .tried.join(", "))]
    NoUsableBackend { tried: Vec<&'static str> },

    /// A backend name that is not built into this crate.
    #[error("unknown render backend `{0}`")]
    UnknownBackend(String),

    /// The backend does not implement an optional operation.
    #[error("{backend} backend does not support {operation}")]
    Unsupported { backend: &'static str, operation: &'static str },

    #[error("image {0:?} does not belong to this context")]
    ImageNotFound(ImageId),

    /// Making the context current failed.
    #[error("failed to bind context: {0}")]
    Bind(String),

    /// Presenting the back buffer failed.
    #[error("failed to present frame: {0}")]
    Present(String),

    #[error(transparent)]
    PageFlip(#[from] PageFlipError),

    /// The context has already been terminated.
    #[error("render context was terminated")]
    Terminated,

    /// Memory for a framebuffer or image could not be reserved.
    #[error("out of memory allocating {0}")]
    OutOfMemory(&'static str),
}
