//! The top-level container: owns every surface, region, view and output, routes
//! client requests to them and drives the render passes.
//!
//! All state lives in id-keyed arenas. Relations between objects (a view's
//! surface, output and parent) are ids, so a stale relation simply fails to
//! resolve instead of keeping anything alive.

use std::collections::HashMap;

use novade_buffer_manager::{BufferId, BufferManager, BufferRelease, ClientId};
use novade_render_context::{Backend, BackendSurface, ContextManager, NativeHandle, Placement};
use tracing::{debug, error, info, trace, warn};

use crate::callback::Callback;
use crate::config::CompositorConfig;
use crate::error::CompositorError;
use crate::handler::CompositorHandler;
use crate::output::{Output, OutputId};
use crate::region::{Region, RegionId};
use crate::render::{OutputImporter, OutputRenderer, PaintItem};
use crate::resource::{ResourceHandle, ResourceKind, ResourceLink, Transport};
use crate::surface::{CommitOutcome, Surface, SurfaceId};
use crate::view::{Geometry, Size, View, ViewId, ViewState, ViewType};

/// Which core object a protocol object belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResourceOwner {
    Surface(SurfaceId),
    Region(RegionId),
    Callback(SurfaceId),
    View(ViewId),
}

/// A `wl_region`: a region the client builds up and then copies into surface state.
#[derive(Debug)]
struct RegionResource {
    link: ResourceLink,
    region: Region,
}

pub struct Compositor<T: Transport, H: CompositorHandler = ()> {
    config: CompositorConfig,
    transport: T,
    handler: H,
    buffers: BufferManager,
    contexts: ContextManager,
    surfaces: HashMap<SurfaceId, Surface>,
    regions: HashMap<RegionId, RegionResource>,
    views: HashMap<ViewId, View>,
    outputs: HashMap<OutputId, Output>,
    output_order: Vec<OutputId>,
    resources: HashMap<ResourceHandle, ResourceOwner>,
    focused: Option<ViewId>,
}

impl<T: Transport, H: CompositorHandler> Compositor<T, H> {
    /// Validates `config` and creates a compositor probing the backends named in
    /// `config.render.backends`.
    pub fn new(mut config: CompositorConfig, transport: T, handler: H) -> Result<Self, CompositorError> {
        config.validate()?;
        let contexts = ContextManager::from_names(config.render.backends.as_slice())?;
        Ok(Self::with_context_manager(config, contexts, transport, handler))
    }

    /// Creates a compositor probing an explicit list of backend constructors.
    pub fn with_backends(config: CompositorConfig, backends: Vec<Backend>, transport: T, handler: H) -> Self {
        Self::with_context_manager(config, ContextManager::new(backends), transport, handler)
    }

    fn with_context_manager(config: CompositorConfig, contexts: ContextManager, transport: T, handler: H) -> Self {
        Self {
            config,
            transport,
            handler,
            buffers: BufferManager::new(),
            contexts,
            surfaces: HashMap::new(),
            regions: HashMap::new(),
            views: HashMap::new(),
            outputs: HashMap::new(),
            output_order: Vec::new(),
            resources: HashMap::new(),
            focused: None,
        }
    }

    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn buffers(&self) -> &BufferManager {
        &self.buffers
    }

    /// Client buffers are registered here by the wire layer.
    pub fn buffers_mut(&mut self) -> &mut BufferManager {
        &mut self.buffers
    }

    pub fn contexts(&self) -> &ContextManager {
        &self.contexts
    }

    pub fn surface(&self, id: SurfaceId) -> Option<&Surface> {
        self.surfaces.get(&id)
    }

    /// Looks up the surface behind a `wl_surface` object.
    pub fn surface_for_resource(&self, handle: ResourceHandle) -> Option<SurfaceId> {
        match self.resources.get(&handle) {
            Some(ResourceOwner::Surface(id)) => Some(*id),
            _ => None,
        }
    }

    pub fn region(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(&id).map(|resource| &resource.region)
    }

    pub fn view(&self, id: ViewId) -> Option<&View> {
        self.views.get(&id)
    }

    pub fn output(&self, id: OutputId) -> Option<&Output> {
        self.outputs.get(&id)
    }

    /// Outputs in creation order.
    pub fn outputs(&self) -> &[OutputId] {
        &self.output_order
    }

    pub fn focused_view(&self) -> Option<ViewId> {
        self.focused
    }

    // --- Surfaces ---

    /// Creates a surface for the client's `wl_compositor.create_surface` request.
    ///
    /// # Errors
    /// `CompositorError::ResourceExhausted` if the protocol object could not be
    /// created; the client has been sent "no memory".
    pub fn create_surface(&mut self, client: ClientId, id: u32) -> Result<SurfaceId, CompositorError> {
        let handle = self.create_resource(ResourceKind::Surface, client, id, "surface")?;
        let surface = Surface::new(handle);
        let surface_id = surface.id();
        self.resources.insert(handle, ResourceOwner::Surface(surface_id));
        self.surfaces.insert(surface_id, surface);
        debug!(surface = ?surface_id, ?client, "surface created");
        Ok(surface_id)
    }

    pub fn surface_attach(&mut self, surface: SurfaceId, buffer: Option<BufferId>, x: i32, y: i32) {
        if let Some(surface) = self.surfaces.get_mut(&surface) {
            surface.attach(buffer, x, y);
        }
    }

    pub fn surface_damage(&mut self, surface: SurfaceId, x: i32, y: i32, width: i32, height: i32) {
        if let Some(surface) = self.surfaces.get_mut(&surface) {
            surface.damage(x, y, width, height);
        }
    }

    /// Copies `region` into the pending opaque region; `None` clears it.
    pub fn surface_set_opaque_region(&mut self, surface: SurfaceId, region: Option<RegionId>) {
        let region = region.and_then(|id| self.regions.get(&id)).map(|resource| &resource.region);
        if let Some(surface) = self.surfaces.get_mut(&surface) {
            surface.set_opaque_region(region);
        }
    }

    /// Copies `region` into the pending input region; `None` makes the whole surface
    /// take input.
    pub fn surface_set_input_region(&mut self, surface: SurfaceId, region: Option<RegionId>) {
        let region = region.and_then(|id| self.regions.get(&id)).map(|resource| &resource.region);
        if let Some(surface) = self.surfaces.get_mut(&surface) {
            surface.set_input_region(region);
        }
    }

    /// `wl_surface.frame`: requests a callback once the next commit has been shown.
    ///
    /// # Errors
    /// `InvalidHandle` for an unknown surface, `ResourceExhausted` if the callback
    /// object could not be created (the client has been sent "no memory").
    pub fn surface_frame(&mut self, surface: SurfaceId, callback_id: u32) -> Result<(), CompositorError> {
        let client = self.surfaces.get(&surface).ok_or(CompositorError::InvalidHandle("surface"))?.client();
        let handle = self.create_resource(ResourceKind::Callback, client, callback_id, "frame callback")?;
        self.resources.insert(handle, ResourceOwner::Callback(surface));

        let replaced = match self.surfaces.get_mut(&surface) {
            Some(surface) => surface.set_frame_callback(Callback::new(handle)),
            None => None,
        };
        if let Some(released) = replaced.and_then(|callback| callback.cancel(&mut self.transport)) {
            self.resources.remove(&released);
        }
        Ok(())
    }

    /// Applies the surface's pending state and schedules a repaint of the outputs
    /// showing it. Returns `None` for an unknown surface.
    pub fn surface_commit(&mut self, surface_id: SurfaceId) -> Option<CommitOutcome> {
        let surface = self.surfaces.get_mut(&surface_id)?;
        let targets: Vec<OutputId> =
            surface.view().and_then(|view| self.views.get(&view)).and_then(View::output).into_iter().collect();

        let mut importer = OutputImporter::new(&mut self.outputs, &targets);
        let outcome = surface.commit(&self.buffers, &mut importer);

        if let Some(superseded) = outcome.superseded_buffer {
            self.release_buffer(superseded);
        }
        self.schedule_repaint(surface_id);
        Some(outcome)
    }

    /// Marks every output showing `surface` as needing a render.
    pub fn schedule_repaint(&mut self, surface: SurfaceId) {
        let output = self
            .surfaces
            .get(&surface)
            .and_then(Surface::view)
            .and_then(|view| self.views.get(&view))
            .and_then(View::output);
        if let Some(output) = output {
            self.schedule_output_repaint(output);
        }
    }

    /// Takes a temporary reference that keeps the surface alive past the
    /// destruction of its protocol object. Returns `false` for an unknown surface.
    pub fn surface_acquire(&mut self, surface: SurfaceId) -> bool {
        match self.surfaces.get_mut(&surface) {
            Some(surface) => {
                surface.acquire();
                true
            }
            None => false,
        }
    }

    /// Drops a reference; the surface is freed with the last one.
    pub fn surface_release(&mut self, surface: SurfaceId) {
        let last = self.surfaces.get_mut(&surface).is_some_and(Surface::release);
        if last {
            self.free_surface(surface);
        }
    }

    /// Destroys the surface's protocol object and drops the reference it held.
    ///
    /// Does nothing if the object is already gone.
    pub fn destroy_surface(&mut self, surface: SurfaceId) {
        let Some(handle) = self.surfaces.get_mut(&surface).and_then(Surface::detach_resource) else {
            return;
        };
        self.resources.remove(&handle);
        self.transport.destroy_resource(handle);
        self.surface_resource_gone(surface);
    }

    fn surface_resource_gone(&mut self, surface: SurfaceId) {
        if let Some(view) = self.surfaces.get(&surface).and_then(Surface::view) {
            self.destroy_view(view);
        }
        self.surface_release(surface);
    }

    fn free_surface(&mut self, id: SurfaceId) {
        let Some(mut surface) = self.surfaces.remove(&id) else {
            return;
        };
        if let Some(handle) = surface.detach_resource() {
            self.resources.remove(&handle);
            self.transport.destroy_resource(handle);
        }
        if let Some(view) = surface.view() {
            self.destroy_view(view);
        }
        for callback in surface.take_all_callbacks() {
            if let Some(handle) = callback.cancel(&mut self.transport) {
                self.resources.remove(&handle);
            }
        }
        if let Some(buffer) = surface.buffer() {
            self.release_buffer(buffer);
        }
        for output in self.outputs.values_mut() {
            if let Some(renderer) = output.renderer_mut() {
                renderer.detach(id);
            }
        }
        debug!(surface = ?id, "surface freed");
    }

    /// The transport reports that a protocol object is gone.
    ///
    /// Objects the compositor destroyed itself are already detached and ignored here.
    pub fn resource_destroyed(&mut self, handle: ResourceHandle) {
        let Some(owner) = self.resources.remove(&handle) else {
            trace!(?handle, "destroyed resource already detached");
            return;
        };
        match owner {
            ResourceOwner::Surface(id) => {
                if let Some(surface) = self.surfaces.get_mut(&id) {
                    surface.detach_resource();
                }
                self.surface_resource_gone(id);
            }
            ResourceOwner::Region(id) => {
                self.regions.remove(&id);
            }
            ResourceOwner::Callback(surface) => {
                if let Some(surface) = self.surfaces.get_mut(&surface) {
                    surface.detach_callback(handle);
                }
            }
            ResourceOwner::View(id) => {
                if let Some(view) = self.views.get_mut(&id) {
                    view.detach_role();
                }
                self.destroy_view(id);
            }
        }
    }

    fn create_resource(
        &mut self,
        kind: ResourceKind,
        client: ClientId,
        id: u32,
        what: &'static str,
    ) -> Result<ResourceHandle, CompositorError> {
        self.transport.create_resource(kind, client, id).map_err(|err| {
            warn!(?client, error = %err, "could not create {what}");
            self.transport.post_no_memory(client);
            CompositorError::ResourceExhausted(what)
        })
    }

    // --- Buffers ---

    /// The client destroyed a `wl_buffer`. A busy buffer is freed once its last
    /// render completes.
    pub fn destroy_buffer(&mut self, buffer: BufferId) -> Result<BufferRelease, CompositorError> {
        Ok(self.buffers.destroy_buffer(buffer)?)
    }

    /// A render that read `buffer` finished. Completes a deferred release.
    pub fn buffer_render_complete(&mut self, buffer: BufferId) {
        match self.buffers.clear_busy(buffer) {
            Ok(Some(BufferRelease::Released)) => self.transport.send_buffer_release(buffer),
            Ok(Some(BufferRelease::Freed)) => trace!(?buffer, "busy buffer freed"),
            Ok(_) => {}
            Err(err) => debug!(?buffer, error = %err, "render completion for unknown buffer"),
        }
    }

    fn release_buffer(&mut self, buffer: BufferId) {
        match self.buffers.release_buffer(buffer) {
            Ok(BufferRelease::Released) => self.transport.send_buffer_release(buffer),
            Ok(BufferRelease::Deferred) => debug!(?buffer, "buffer busy, release deferred"),
            Ok(BufferRelease::Freed) => {}
            Err(err) => trace!(?buffer, error = %err, "released buffer is already gone"),
        }
    }

    // --- Regions ---

    /// `wl_compositor.create_region`.
    pub fn create_region(&mut self, client: ClientId, id: u32) -> Result<RegionId, CompositorError> {
        let handle = self.create_resource(ResourceKind::Region, client, id, "region")?;
        let region_id = RegionId::new_unique();
        self.resources.insert(handle, ResourceOwner::Region(region_id));
        self.regions.insert(region_id, RegionResource { link: ResourceLink::Live(handle), region: Region::new() });
        Ok(region_id)
    }

    pub fn region_add(&mut self, region: RegionId, x: i32, y: i32, width: i32, height: i32) {
        if let Some(resource) = self.regions.get_mut(&region) {
            resource.region.union_rect(x, y, width, height);
        }
    }

    pub fn region_subtract(&mut self, region: RegionId, x: i32, y: i32, width: i32, height: i32) {
        if let Some(resource) = self.regions.get_mut(&region) {
            resource.region.subtract_rect(x, y, width, height);
        }
    }

    pub fn destroy_region(&mut self, region: RegionId) {
        let Some(mut resource) = self.regions.remove(&region) else {
            return;
        };
        if let Some(handle) = resource.link.detach() {
            self.resources.remove(&handle);
            self.transport.destroy_resource(handle);
        }
    }

    // --- Views ---

    /// Wraps `surface` in a view once it got a shell role; `role` is the role's
    /// protocol object.
    ///
    /// Returns `Ok(None)` if the policy rejected the view.
    ///
    /// # Errors
    /// `InvalidHandle` if the surface is unknown or already has a view.
    pub fn create_view(&mut self, surface: SurfaceId, role: ResourceHandle) -> Result<Option<ViewId>, CompositorError> {
        let target = self.surfaces.get_mut(&surface).ok_or(CompositorError::InvalidHandle("surface"))?;
        if target.view().is_some() {
            return Err(CompositorError::InvalidHandle("surface without a role"));
        }
        let view = View::new(surface, role);
        let view_id = view.id();
        target.set_view(Some(view_id));
        self.views.insert(view_id, view);
        self.resources.insert(role, ResourceOwner::View(view_id));

        if !self.handler.view_created(view_id) {
            debug!(view = ?view_id, "view rejected by policy");
            self.discard_view(view_id);
            return Ok(None);
        }
        debug!(view = ?view_id, ?surface, "view created");
        Ok(Some(view_id))
    }

    /// Destroys a view and its role object. The surface stays.
    pub fn destroy_view(&mut self, view: ViewId) {
        if self.discard_view(view) {
            self.handler.view_destroyed(view);
        }
    }

    fn discard_view(&mut self, id: ViewId) -> bool {
        let Some(mut view) = self.views.remove(&id) else {
            return false;
        };
        if let Some(handle) = view.detach_role() {
            self.resources.remove(&handle);
            self.transport.destroy_resource(handle);
        }
        if let Some(output) = view.output().and_then(|output| self.outputs.get_mut(&output)) {
            output.remove_view(id);
            if let Some(renderer) = output.renderer_mut() {
                renderer.detach(view.surface());
            }
            output.schedule_repaint();
        }
        if let Some(surface) = self.surfaces.get_mut(&view.surface()) {
            surface.set_view(None);
        }
        if self.focused == Some(id) {
            self.focused = None;
        }
        debug!(view = ?id, "view destroyed");
        true
    }

    /// Moves `view` to `output` (or off all outputs), appending it to both of the
    /// new output's orderings. Returns `false` for an unknown view or output.
    pub fn set_view_output(&mut self, view_id: ViewId, output: Option<OutputId>) -> bool {
        if output.is_some_and(|output| !self.outputs.contains_key(&output)) {
            return false;
        }
        let Some(view) = self.views.get_mut(&view_id) else {
            return false;
        };
        let from = view.output();
        if from == output {
            return true;
        }
        view.set_output(output);
        let surface = view.surface();

        if let Some(old) = from.and_then(|from| self.outputs.get_mut(&from)) {
            old.remove_view(view_id);
            if let Some(renderer) = old.renderer_mut() {
                renderer.detach(surface);
            }
            old.schedule_repaint();
        }
        if let Some(new) = output.and_then(|output| self.outputs.get_mut(&output)) {
            new.add_view(view_id);
            let buffer = self.surfaces.get(&surface).and_then(Surface::buffer);
            if let (Some(renderer), Some(buffer)) = (new.renderer_mut(), buffer) {
                renderer.attach(surface, self.buffers.get_buffer_details(buffer));
            }
            new.schedule_repaint();
        }
        self.handler.view_moved_to_output(view_id, from, output);
        true
    }

    /// Gives `view` the keyboard focus (`None` clears it), updating `ACTIVATED` on
    /// both the old and the new focus.
    pub fn focus_view(&mut self, view: Option<ViewId>) {
        let view = view.filter(|view| self.views.contains_key(view));
        if view == self.focused {
            return;
        }
        if let Some(old) = self.focused.take() {
            self.set_view_state(old, ViewState::ACTIVATED, false);
            self.handler.view_focus_changed(old, false);
        }
        if let Some(new) = view {
            self.set_view_state(new, ViewState::ACTIVATED, true);
            self.handler.view_focus_changed(new, true);
        }
        self.focused = view;
    }

    /// The topmost visible view on `output` that takes input at `(x, y)`.
    ///
    /// Tests the same rectangle the render pass paints: the view origin with the
    /// committed surface size.
    pub fn view_at(&self, output: OutputId, x: i32, y: i32) -> Option<ViewId> {
        let output = self.outputs.get(&output)?;
        output.paint_order().iter().rev().copied().find(|id| {
            let Some(view) = self.views.get(id) else {
                return false;
            };
            if !view.visible_on(output.mask()) {
                return false;
            }
            let Some(surface) = self.surfaces.get(&view.surface()).filter(|surface| surface.is_mapped()) else {
                return false;
            };
            let area = painted_area(view, surface);
            if !area.contains(x, y) {
                return false;
            }
            let local_x = i64::from(x) - i64::from(area.origin.x);
            let local_y = i64::from(y) - i64::from(area.origin.y);
            match (i32::try_from(local_x), i32::try_from(local_y)) {
                (Ok(local_x), Ok(local_y)) => surface.committed().input.contains_point(local_x, local_y),
                _ => false,
            }
        })
    }

    pub fn set_view_geometry(&mut self, view: ViewId, geometry: Geometry) {
        let Some(target) = self.views.get_mut(&view) else {
            return;
        };
        target.set_geometry(geometry);
        self.schedule_view_repaint(view);
    }

    /// A client asked for `geometry`; applied unless the policy claims the request.
    pub fn request_geometry(&mut self, view: ViewId, geometry: Geometry) {
        if !self.views.contains_key(&view) {
            return;
        }
        if !self.handler.view_request_geometry(view, geometry) {
            self.set_view_geometry(view, geometry);
        }
    }

    /// A client asked to set or clear `state`; applied unless the policy claims the
    /// request.
    pub fn request_state(&mut self, view: ViewId, state: ViewState, toggle: bool) {
        if !self.views.contains_key(&view) {
            return;
        }
        if !self.handler.view_request_state(view, state, toggle) {
            self.set_view_state(view, state, toggle);
        }
    }

    pub fn set_view_state(&mut self, view: ViewId, state: ViewState, toggle: bool) {
        let changed = self.views.get_mut(&view).is_some_and(|target| target.set_state(state, toggle));
        if changed {
            self.schedule_view_repaint(view);
        }
    }

    pub fn set_view_type(&mut self, view: ViewId, view_type: ViewType, toggle: bool) {
        if let Some(target) = self.views.get_mut(&view) {
            target.set_view_type(view_type, toggle);
        }
    }

    pub fn set_view_mask(&mut self, view: ViewId, mask: u32) {
        let Some(target) = self.views.get_mut(&view) else {
            return;
        };
        if target.mask() != mask {
            target.set_mask(mask);
            self.schedule_view_repaint(view);
        }
    }

    /// Sets the parent relation. It never keeps the parent alive. Returns `false` if
    /// either view is unknown or `parent` is the view itself.
    pub fn set_view_parent(&mut self, view: ViewId, parent: Option<ViewId>) -> bool {
        if parent.is_some_and(|parent| parent == view || !self.views.contains_key(&parent)) {
            return false;
        }
        match self.views.get_mut(&view) {
            Some(target) => {
                target.set_parent(parent);
                true
            }
            None => false,
        }
    }

    /// The view's parent, or `None` once the parent has been destroyed.
    pub fn view_parent(&self, view: ViewId) -> Option<ViewId> {
        self.views.get(&view)?.parent().filter(|parent| self.views.contains_key(parent))
    }

    pub fn set_view_title(&mut self, view: ViewId, title: &str) -> Result<(), CompositorError> {
        self.views.get_mut(&view).ok_or(CompositorError::InvalidHandle("view"))?.set_title(title)
    }

    pub fn set_view_class(&mut self, view: ViewId, class: &str) -> Result<(), CompositorError> {
        self.views.get_mut(&view).ok_or(CompositorError::InvalidHandle("view"))?.set_class(class)
    }

    pub fn set_view_app_id(&mut self, view: ViewId, app_id: &str) -> Result<(), CompositorError> {
        self.views.get_mut(&view).ok_or(CompositorError::InvalidHandle("view"))?.set_app_id(app_id)
    }

    pub fn bring_to_front(&mut self, view: ViewId) -> bool {
        self.restack(view, |output| output.bring_to_front(view))
    }

    pub fn send_to_back(&mut self, view: ViewId) -> bool {
        self.restack(view, |output| output.send_to_back(view))
    }

    /// Moves `view` directly below `other`; both must be on the same output.
    pub fn send_below(&mut self, view: ViewId, other: ViewId) -> bool {
        self.restack(view, |output| output.send_below(view, other))
    }

    /// Moves `view` directly above `other`; both must be on the same output.
    pub fn bring_above(&mut self, view: ViewId, other: ViewId) -> bool {
        self.restack(view, |output| output.bring_above(view, other))
    }

    fn restack(&mut self, view: ViewId, apply: impl FnOnce(&mut Output) -> bool) -> bool {
        let Some(output) = self.views.get(&view).and_then(View::output).and_then(|id| self.outputs.get_mut(&id))
        else {
            return false;
        };
        let changed = apply(output);
        if changed {
            debug!(?view, output = ?output.id(), "view restacked");
            output.schedule_repaint();
        }
        changed
    }

    /// See [`Output::topmost`].
    pub fn topmost_view(&self, output: OutputId, offset: usize) -> Option<ViewId> {
        self.outputs.get(&output)?.topmost(offset)
    }

    fn schedule_view_repaint(&mut self, view: ViewId) {
        if let Some(output) = self.views.get(&view).and_then(View::output) {
            self.schedule_output_repaint(output);
        }
    }

    // --- Outputs ---

    /// Adds an output for a backend surface the device layer discovered and probes
    /// the configured backends for it.
    ///
    /// An output whose backends all fail is kept without a renderer. Returns
    /// `Ok(None)` if the policy rejected the output.
    ///
    /// # Errors
    /// `NoRenderableOutput` if no output, this one included, has a working render
    /// context. The new output is removed again.
    pub fn add_output(
        &mut self,
        name: &str,
        backend: Box<dyn BackendSurface>,
    ) -> Result<Option<OutputId>, CompositorError> {
        let resolution = match backend.size() {
            (0, _) | (_, 0) => self.config.output.default_resolution,
            (width, height) => Size { width, height },
        };
        let mut output = Output::new(name, resolution, backend);
        match self.contexts.create_context(output.backend_mut()) {
            Ok(handle) => {
                let mut renderer = OutputRenderer::new(handle);
                if let Err(err) = renderer.resize(resolution.width, resolution.height) {
                    warn!(output = name, error = %err, "could not size render context");
                }
                output.set_renderer(renderer);
            }
            Err(err) => warn!(output = name, error = %err, "output has no working render context"),
        }

        let id = output.id();
        info!(
            output = name,
            width = resolution.width,
            height = resolution.height,
            backend = output.renderer().map(OutputRenderer::backend_name),
            "output added"
        );
        self.outputs.insert(id, output);
        self.output_order.push(id);

        if !self.outputs.values().any(|output| output.renderer().is_some()) {
            error!("no output can be driven by any render backend");
            self.discard_output(id);
            return Err(CompositorError::NoRenderableOutput);
        }
        if !self.handler.output_created(id) {
            debug!(output = ?id, "output rejected by policy");
            self.discard_output(id);
            return Ok(None);
        }
        self.schedule_output_repaint(id);
        Ok(Some(id))
    }

    pub fn remove_output(&mut self, output: OutputId) {
        if self.discard_output(output) {
            self.handler.output_destroyed(output);
        }
    }

    fn discard_output(&mut self, id: OutputId) -> bool {
        let Some(mut output) = self.outputs.remove(&id) else {
            return false;
        };
        self.output_order.retain(|output| *output != id);
        for view in output.creation_order() {
            if let Some(view) = self.views.get_mut(view) {
                view.set_output(None);
            }
        }
        if let Some(renderer) = output.take_renderer() {
            renderer.terminate(&mut self.contexts);
        }
        info!(output = output.name(), "output removed");
        true
    }

    pub fn set_output_resolution(&mut self, output: OutputId, resolution: Size) {
        let Some(target) = self.outputs.get_mut(&output) else {
            return;
        };
        let from = target.resolution();
        if from == resolution {
            return;
        }
        target.set_resolution(resolution);
        if let Some(renderer) = target.renderer_mut() {
            if let Err(err) = renderer.resize(resolution.width, resolution.height) {
                warn!(?output, error = %err, "could not resize render context");
            }
        }
        target.schedule_repaint();
        self.handler.output_resolution_changed(output, from, resolution);
    }

    /// A sleeping output is skipped by [`Compositor::render_outputs`].
    pub fn set_output_sleep(&mut self, output: OutputId, sleeping: bool) {
        if let Some(target) = self.outputs.get_mut(&output) {
            target.set_sleeping(sleeping);
            if !sleeping {
                target.schedule_repaint();
            }
        }
    }

    pub fn set_output_mask(&mut self, output: OutputId, mask: u32) {
        if let Some(target) = self.outputs.get_mut(&output) {
            target.set_mask(mask);
            target.schedule_repaint();
        }
    }

    pub fn schedule_output_repaint(&mut self, output: OutputId) {
        if let Some(target) = self.outputs.get_mut(&output) {
            if target.schedule_repaint() {
                trace!(?output, "repaint scheduled");
            }
        }
    }

    /// Lets clients share buffers with every output's render context. Returns the
    /// number of contexts that accepted the display.
    pub fn bind_display(&mut self, display: NativeHandle) -> usize {
        let mut bound = 0;
        for output in self.outputs.values_mut() {
            let Some(renderer) = output.renderer_mut() else {
                continue;
            };
            match renderer.bind_to_display(display) {
                Ok(()) => bound += 1,
                Err(err) => debug!(output = ?output.id(), error = %err, "display not bound"),
            }
        }
        bound
    }

    // --- Rendering ---

    /// Runs a render pass for every output that needs one and is awake. Returns how
    /// many passes succeeded.
    pub fn render_outputs(&mut self, time_ms: u32) -> usize {
        let due: Vec<OutputId> = self
            .output_order
            .iter()
            .copied()
            .filter(|id| self.outputs.get(id).is_some_and(|output| output.pending_render() && !output.is_sleeping()))
            .collect();

        let mut rendered = 0;
        for id in due {
            if let Some(output) = self.outputs.get_mut(&id) {
                output.clear_pending_render();
            }
            if self.render_output(id, time_ms) {
                rendered += 1;
            }
        }
        rendered
    }

    fn render_output(&mut self, id: OutputId, time_ms: u32) -> bool {
        let Some(output) = self.outputs.get(&id) else {
            return false;
        };
        if output.renderer().is_none() {
            return false;
        }

        let mut items = Vec::new();
        for view in output.paint_order().iter().filter_map(|view| self.views.get(view)) {
            if !view.visible_on(output.mask()) {
                continue;
            }
            let Some(surface) = self.surfaces.get(&view.surface()) else {
                continue;
            };
            if !surface.is_mapped() {
                continue;
            }
            let area = painted_area(view, surface);
            let placement =
                Placement { x: area.origin.x, y: area.origin.y, width: area.size.width, height: area.size.height };
            items.push(PaintItem { surface: surface.id(), placement });
        }

        let mut busy = Vec::new();
        for item in &items {
            let Some(surface) = self.surfaces.get_mut(&item.surface) else {
                continue;
            };
            surface.acquire();
            if let Some(buffer) = surface.buffer() {
                if self.buffers.mark_busy(buffer).is_ok() {
                    busy.push(buffer);
                }
            }
        }

        let clear_color = self.config.render.clear_color;
        let result = match self.outputs.get_mut(&id).and_then(Output::render_parts) {
            Some((renderer, backend)) => renderer.repaint(&mut self.contexts, backend, clear_color, &items),
            None => Ok(()),
        };
        if let Err(err) = &result {
            warn!(output = ?id, error = %err, "render pass failed");
        }

        for buffer in busy {
            self.buffer_render_complete(buffer);
        }
        for item in &items {
            let callbacks = match self.surfaces.get_mut(&item.surface) {
                Some(surface) => {
                    surface.take_damage();
                    surface.take_frame_callbacks()
                }
                None => continue,
            };
            for callback in callbacks {
                if let Some(handle) = callback.fire(&mut self.transport, time_ms) {
                    self.resources.remove(&handle);
                }
            }
        }
        for item in &items {
            self.surface_release(item.surface);
        }
        trace!(output = ?id, painted = items.len(), "render pass done");
        result.is_ok()
    }
}

/// Where a view's surface lands on its output: the view origin, at the committed
/// surface size.
fn painted_area(view: &View, surface: &Surface) -> Geometry {
    let (width, height) = surface.size();
    Geometry { origin: view.geometry().origin, size: Size { width, height } }
}
