//! # Novade Compositor Core
//!
//! This crate forms the core logic for the Novade Wayland compositor.
//! It includes management of:
//! - Surfaces (`wl_surface`): pending vs. committed state, damage tracking,
//!   frame callbacks and the commit lifecycle.
//! - Regions (`wl_region`): sets of disjoint rectangles used for damage, opaque
//!   and input areas.
//! - Views: a surface placed by the shell, with geometry, state and stacking.
//! - Outputs: render targets with their own view stack and render context.
//! - Buffers: (via `novade-buffer-manager`) association with surfaces and
//!   release bookkeeping.
//!
//! The wire protocol is not handled here. A host drives the [`Compositor`] with
//! decoded requests, implements [`Transport`] to talk back to clients and
//! [`CompositorHandler`] to apply window-management policy.

pub mod callback;
pub mod compositor;
pub mod config;
pub mod error;
pub mod handler;
pub mod logging;
pub mod output;
pub mod region;
pub mod render;
pub mod resource;
pub mod surface;
pub mod view;

#[cfg(test)]
mod test_support;

pub use compositor::Compositor;
pub use config::{CompositorConfig, LoggingConfig, OutputConfig, RenderConfig};
pub use error::{CompositorError, ConfigError};
pub use handler::CompositorHandler;
pub use logging::{init_logging, init_minimal_logging};
pub use output::{Output, OutputId};
pub use region::{Rectangle, Region, RegionId};
pub use render::{OutputRenderer, PaintItem};
pub use resource::{ResourceHandle, ResourceKind, ResourceLink, Transport, TransportError};
pub use surface::{CommitOutcome, Surface, SurfaceBackend, SurfaceId, SurfaceState};
pub use view::{Geometry, Point, Size, View, ViewId, ViewState, ViewType};
