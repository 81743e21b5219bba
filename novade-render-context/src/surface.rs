// Copyright (c) 2025 NovaDE Contributors
// SPDX-License-Identifier: MIT

//! The device-side half of an output: whatever the windowing or DRM layer hands us
//! to render into and present.

use std::fmt;

use crate::error::PageFlipError;

/// An opaque native handle (display connection, window, ...), pointer sized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeHandle(pub usize);

impl NativeHandle {
    /// Returns the handle as a raw pointer for FFI calls.
    pub fn as_ptr(&self) -> *mut std::ffi::c_void {
        self.0 as *mut std::ffi::c_void
    }
}

/// A finished frame as handed to [`BackendSurface::page_flip`].
#[derive(Debug, Clone, Copy)]
pub enum Frame<'a> {
    /// The frame lives in a native buffer the backend already presented
    /// (e.g. after `eglSwapBuffers`); only the flip hand-off remains.
    Native,
    /// A CPU framebuffer, one ARGB word per pixel, row-major.
    Pixels { data: &'a [u32], width: u32, height: u32 },
}

/// A render target provided by the device layer for one output.
///
/// Device discovery, DRM and X11 windowing live outside the core; they only have to
/// satisfy this interface.
pub trait BackendSurface: fmt::Debug {
    /// Current size in pixels. `(0, 0)` if the device does not know yet.
    fn size(&self) -> (u32, u32);

    /// Native display connection, for backends that need one (EGL).
    fn native_display(&self) -> Option<NativeHandle> {
        None
    }

    /// Native window, for backends that need one (EGL).
    fn native_window(&self) -> Option<NativeHandle> {
        None
    }

    /// Hands a finished frame to the display and advances the flip state.
    fn page_flip(&mut self, frame: Frame<'_>) -> Result<(), PageFlipError>;
}
