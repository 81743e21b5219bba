// Copyright (c) 2025 NovaDE Contributors
// SPDX-License-Identifier: MIT

//! # Render Context Interface
//!
//! The capability interface every graphics backend implements. A context is created
//! once per output by one of the backend constructors (see [`crate::manager`]) and
//! driven exclusively through this trait afterwards.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use novade_buffer_manager::BufferDetails;

use crate::error::ContextError;
use crate::surface::{BackendSurface, NativeHandle};

/// Address of a backend entry point, as returned by `eglGetProcAddress` and friends.
pub type ProcAddress = extern "system" fn();

/// Identifies an image imported into a render context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageId(u64);

impl ImageId {
    /// Creates a new, unique `ImageId`.
    pub fn new_unique() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        ImageId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Where an image lands on the output, in output pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Buffer attributes a backend can be asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferQuery {
    Width,
    Height,
    YInverted,
}

/// A live graphics backend bound to one output.
///
/// The optional operations have defaults that report `Unsupported` (or `None`), so a
/// backend only implements what it can actually do.
pub trait RenderContext: fmt::Debug {
    /// Short backend name, used in logs and configuration.
    fn backend_name(&self) -> &'static str;

    /// Makes this context current.
    fn bind(&mut self) -> Result<(), ContextError>;

    /// Presents the back buffer and hands the frame to `surface`.
    ///
    /// A failed hand-off must be reported as [`ContextError::PageFlip`]; the manager
    /// turns it into degraded mode instead of a hard error.
    fn swap(&mut self, surface: &mut dyn BackendSurface) -> Result<(), ContextError>;

    /// Releases the native context. Called exactly once.
    fn terminate(&mut self);

    /// Lets clients share buffers with this context through the native display.
    fn bind_to_display(&mut self, _display: NativeHandle) -> Result<(), ContextError> {
        Err(ContextError::Unsupported { backend: self.backend_name(), operation: "bind_to_display" })
    }

    /// Answers a buffer attribute query. The default reads the buffer record.
    fn query_buffer(&self, buffer: &BufferDetails, query: BufferQuery) -> Option<i64> {
        Some(match query {
            BufferQuery::Width => i64::from(buffer.width),
            BufferQuery::Height => i64::from(buffer.height),
            BufferQuery::YInverted => i64::from(buffer.y_inverted),
        })
    }

    /// Imports a client buffer as an image this context can draw.
    fn create_image(&mut self, buffer: &BufferDetails) -> Result<ImageId, ContextError>;

    /// Destroys an image created by [`RenderContext::create_image`].
    ///
    /// Returns `false` if the image was unknown.
    fn destroy_image(&mut self, image: ImageId) -> bool;

    fn get_proc_address(&self, _name: &str) -> Option<ProcAddress> {
        None
    }

    /// The output changed size.
    fn resize(&mut self, _width: u32, _height: u32) -> Result<(), ContextError> {
        Ok(())
    }

    /// Fills the whole back buffer with `color` (RGBA, 0.0..=1.0).
    fn clear(&mut self, color: [f32; 4]);

    /// Draws `image` at `placement`, clipped to the output.
    fn draw_image(&mut self, image: ImageId, placement: Placement) -> Result<(), ContextError>;
}
