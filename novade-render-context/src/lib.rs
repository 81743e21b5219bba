// Copyright (c) 2025 NovaDE Contributors
// SPDX-License-Identifier: MIT

//! # Novade Render Context
//!
//! Graphics-backend plumbing for the Novade compositor core. Each output owns one
//! render context, selected by probing an ordered list of backend constructors
//! (hardware EGL first, the CPU software renderer as the fallback). After
//! selection the context is driven exclusively through the [`RenderContext`]
//! trait, with bind and swap routed through a [`ContextManager`] that tracks the
//! currently bound context and each output's page-flip health.

pub mod context;
pub mod error;
pub mod manager;
pub mod software;
pub mod surface;

#[cfg(feature = "egl")]
pub mod egl;

pub use context::{BufferQuery, ImageId, Placement, ProcAddress, RenderContext};
pub use error::{ContextError, PageFlipError};
pub use manager::{
    Backend, ContextConstructor, ContextId, ContextManager, RenderHandle, BUILTIN_BACKENDS, DEFAULT_BACKENDS,
};
pub use software::SoftwareContext;
pub use surface::{BackendSurface, Frame, NativeHandle};
