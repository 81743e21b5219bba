// Copyright (c) 2025 NovaDE Contributors
// SPDX-License-Identifier: MIT

//! # Context Manager
//!
//! Selects a backend for each output and keeps the bookkeeping every backend shares:
//! which context is currently bound, and whether an output's page flips are failing.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info, warn};

use crate::context::RenderContext;
use crate::error::ContextError;
use crate::software::SoftwareContext;
use crate::surface::BackendSurface;

/// Fallible backend constructor. Must release everything it created before
/// returning an error.
pub type ContextConstructor = fn(&mut dyn BackendSurface) -> Result<Box<dyn RenderContext>, ContextError>;

/// A named backend constructor, one entry of the probe list.
#[derive(Clone, Copy)]
pub struct Backend {
    pub name: &'static str,
    pub construct: ContextConstructor,
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Names accepted by [`Backend::builtin`].
pub const BUILTIN_BACKENDS: &[&str] = &["egl", "software"];

/// Probe order when none is configured. `egl` cannot show client content yet and
/// is only probed when named explicitly.
pub const DEFAULT_BACKENDS: &[&str] = &["software"];

impl Backend {
    /// Looks up a backend compiled into this crate.
    pub fn builtin(name: &str) -> Result<Self, ContextError> {
        match name {
            "egl" => Ok(Backend { name: "egl", construct: egl_constructor }),
            "software" => Ok(Backend { name: "software", construct: SoftwareContext::create }),
            other => Err(ContextError::UnknownBackend(other.to_string())),
        }
    }
}

#[cfg(feature = "egl")]
fn egl_constructor(surface: &mut dyn BackendSurface) -> Result<Box<dyn RenderContext>, ContextError> {
    crate::egl::EglContext::create(surface)
}

#[cfg(not(feature = "egl"))]
fn egl_constructor(_surface: &mut dyn BackendSurface) -> Result<Box<dyn RenderContext>, ContextError> {
    Err(ContextError::Init { backend: "egl", reason: "built without the `egl` feature".to_string() })
}

/// Identifies a render context for the bound-context marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    fn new_unique() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        ContextId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Owning handle to a live render context.
///
/// The native context is terminated exactly once: through
/// [`ContextManager::terminate`], or on drop if that never happened.
#[derive(Debug)]
pub struct RenderHandle {
    id: ContextId,
    context: Box<dyn RenderContext>,
    flip_failed: bool,
    terminated: bool,
}

impl RenderHandle {
    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn backend_name(&self) -> &'static str {
        self.context.backend_name()
    }

    /// `true` once a page flip failed; swaps skip presenting until cleared.
    pub fn flip_failed(&self) -> bool {
        self.flip_failed
    }

    /// Leaves degraded mode, e.g. after the device reports it recovered.
    pub fn clear_flip_failed(&mut self) {
        self.flip_failed = false;
    }

    /// Direct access to the backend for image import and drawing.
    pub fn context(&self) -> &dyn RenderContext {
        self.context.as_ref()
    }

    pub fn context_mut(&mut self) -> &mut dyn RenderContext {
        self.context.as_mut()
    }
}

impl Drop for RenderHandle {
    fn drop(&mut self) {
        if !self.terminated {
            self.terminated = true;
            self.context.terminate();
        }
    }
}

/// Creates render contexts and tracks which one is bound.
///
/// Binding is process-wide state for native APIs, but here it is an explicit value
/// owned by the manager, so several outputs can share one manager without a hidden
/// static.
#[derive(Debug)]
pub struct ContextManager {
    backends: Vec<Backend>,
    bound: Option<ContextId>,
}

impl ContextManager {
    /// Creates a manager probing `backends` in order.
    pub fn new(backends: Vec<Backend>) -> Self {
        Self { backends, bound: None }
    }

    /// Creates a manager from backend names, see [`Backend::builtin`].
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, ContextError> {
        let backends = names.iter().map(|name| Backend::builtin(name.as_ref())).collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(backends))
    }

    pub fn backends(&self) -> &[Backend] {
        &self.backends
    }

    /// The currently bound context, if any.
    pub fn bound(&self) -> Option<ContextId> {
        self.bound
    }

    /// Probes the backend list for `surface`; the first constructor that succeeds wins.
    ///
    /// # Errors
    /// `ContextError::NoUsableBackend` if every constructor failed. The output cannot
    /// be driven, but other outputs are unaffected.
    pub fn create_context(&mut self, surface: &mut dyn BackendSurface) -> Result<RenderHandle, ContextError> {
        let mut tried = Vec::with_capacity(self.backends.len());
        let mut selected = None;
        for backend in &self.backends {
            tried.push(backend.name);
            match (backend.construct)(surface) {
                Ok(context) => {
                    info!(backend = backend.name, "render context created");
                    selected = Some(context);
                    break;
                }
                Err(err) => {
                    warn!(backend = backend.name, error = %err, "render backend unavailable, trying next");
                }
            }
        }
        match selected {
            Some(context) => Ok(self.adopt(context)),
            None => Err(ContextError::NoUsableBackend { tried }),
        }
    }

    /// Wraps an already constructed context in a handle managed by this manager.
    pub fn adopt(&mut self, context: Box<dyn RenderContext>) -> RenderHandle {
        RenderHandle { id: ContextId::new_unique(), context, flip_failed: false, terminated: false }
    }

    /// Makes `handle` current. Rebinding the bound context is a no-op.
    pub fn bind(&mut self, handle: &mut RenderHandle) -> Result<(), ContextError> {
        if handle.terminated {
            return Err(ContextError::Terminated);
        }
        if self.bound == Some(handle.id) {
            return Ok(());
        }
        handle.context.bind()?;
        debug!(context = ?handle.id, backend = handle.backend_name(), "context bound");
        self.bound = Some(handle.id);
        Ok(())
    }

    /// Binds if needed, presents, and hands the frame to `surface`.
    ///
    /// After a failed page flip the handle is in degraded mode: later swaps return
    /// `Ok(())` without presenting until [`RenderHandle::clear_flip_failed`].
    pub fn swap(&mut self, handle: &mut RenderHandle, surface: &mut dyn BackendSurface) -> Result<(), ContextError> {
        self.bind(handle)?;
        if handle.flip_failed {
            return Ok(());
        }
        match handle.context.swap(surface) {
            Ok(()) => Ok(()),
            Err(ContextError::PageFlip(err)) => {
                warn!(context = ?handle.id, error = %err, "page flip failed, skipping presents until cleared");
                handle.flip_failed = true;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Terminates the context behind `handle`.
    pub fn terminate(&mut self, mut handle: RenderHandle) {
        if self.bound == Some(handle.id) {
            self.bound = None;
        }
        handle.terminated = true;
        handle.context.terminate();
        debug!(context = ?handle.id, "context terminated");
    }
}

impl Default for ContextManager {
    fn default() -> Self {
        let backends = DEFAULT_BACKENDS.iter().filter_map(|name| Backend::builtin(name).ok()).collect();
        Self::new(backends)
    }
}
