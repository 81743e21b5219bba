//! Per-output rendering: buffer import and the render pass.

use std::collections::HashMap;

use novade_buffer_manager::BufferDetails;
use novade_render_context::{
    BackendSurface, ContextError, ContextManager, ImageId, NativeHandle, Placement, RenderHandle,
};
use tracing::{debug, trace};

use crate::output::{Output, OutputId};
use crate::surface::{SurfaceBackend, SurfaceId};

/// A surface to draw in a render pass, and where.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaintItem {
    pub surface: SurfaceId,
    pub placement: Placement,
}

/// The render context of one output plus the images imported into it.
#[derive(Debug)]
pub struct OutputRenderer {
    handle: RenderHandle,
    images: HashMap<SurfaceId, ImageId>,
}

impl OutputRenderer {
    pub fn new(handle: RenderHandle) -> Self {
        Self { handle, images: HashMap::new() }
    }

    pub fn handle(&self) -> &RenderHandle {
        &self.handle
    }

    pub fn backend_name(&self) -> &'static str {
        self.handle.backend_name()
    }

    /// The image currently imported for `surface`.
    pub fn image(&self, surface: SurfaceId) -> Option<ImageId> {
        self.images.get(&surface).copied()
    }

    /// Imports `buffer` for `surface`, replacing any previous image. `None` only drops
    /// the previous image.
    ///
    /// A buffer the backend cannot import leaves the surface without an image; it is
    /// skipped when drawing but otherwise treated as shown.
    pub fn attach(&mut self, surface: SurfaceId, buffer: Option<&BufferDetails>) {
        if let Some(old) = self.images.remove(&surface) {
            self.handle.context_mut().destroy_image(old);
        }
        let Some(buffer) = buffer else {
            return;
        };
        match self.handle.context_mut().create_image(buffer) {
            Ok(image) => {
                trace!(?surface, buffer = ?buffer.id, ?image, "buffer imported");
                self.images.insert(surface, image);
            }
            Err(err) => {
                debug!(?surface, buffer = ?buffer.id, error = %err, "buffer import failed");
            }
        }
    }

    pub fn detach(&mut self, surface: SurfaceId) {
        self.attach(surface, None);
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), ContextError> {
        self.handle.context_mut().resize(width, height)
    }

    pub fn bind_to_display(&mut self, display: NativeHandle) -> Result<(), ContextError> {
        self.handle.context_mut().bind_to_display(display)
    }

    /// Binds, clears, draws `items` bottom to top and presents.
    ///
    /// Items without an image are skipped. A failed page flip does not fail the
    /// pass; the handle switches to degraded mode instead.
    pub fn repaint(
        &mut self,
        contexts: &mut ContextManager,
        backend: &mut dyn BackendSurface,
        clear_color: [f32; 4],
        items: &[PaintItem],
    ) -> Result<(), ContextError> {
        contexts.bind(&mut self.handle)?;
        self.handle.context_mut().clear(clear_color);
        for item in items {
            let Some(image) = self.images.get(&item.surface).copied() else {
                continue;
            };
            self.handle.context_mut().draw_image(image, item.placement)?;
        }
        contexts.swap(&mut self.handle, backend)
    }

    /// Destroys all images and terminates the context.
    pub fn terminate(mut self, contexts: &mut ContextManager) {
        for (_, image) in self.images.drain() {
            self.handle.context_mut().destroy_image(image);
        }
        contexts.terminate(self.handle);
    }
}

/// Routes a surface commit's buffer import to the renderers of the outputs that
/// show the surface.
pub(crate) struct OutputImporter<'a> {
    outputs: &'a mut HashMap<OutputId, Output>,
    targets: &'a [OutputId],
}

impl<'a> OutputImporter<'a> {
    pub(crate) fn new(outputs: &'a mut HashMap<OutputId, Output>, targets: &'a [OutputId]) -> Self {
        Self { outputs, targets }
    }
}

impl SurfaceBackend for OutputImporter<'_> {
    fn attach(&mut self, surface: SurfaceId, buffer: Option<&BufferDetails>) {
        for id in self.targets {
            if let Some(renderer) = self.outputs.get_mut(id).and_then(Output::renderer_mut) {
                renderer.attach(surface, buffer);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedSurface;
    use novade_buffer_manager::{BufferFormat, BufferId, BufferManager, BufferType, ClientId};
    use novade_render_context::{RenderContext, SoftwareContext};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn renderer(contexts: &mut ContextManager, width: u32, height: u32) -> OutputRenderer {
        let context: Box<dyn RenderContext> = Box::new(SoftwareContext::with_size(width, height).unwrap());
        OutputRenderer::new(contexts.adopt(context))
    }

    fn solid_buffer(buffers: &mut BufferManager, width: u32, height: u32, pixel: u32) -> BufferId {
        let id = buffers
            .register_buffer(BufferType::Shm, width, height, width * 4, BufferFormat::Argb8888, Some(ClientId::new(1)))
            .unwrap();
        let pixels: Arc<[u32]> = vec![pixel; (width * height) as usize].into();
        buffers.set_contents(id, pixels).unwrap();
        id
    }

    #[test]
    fn test_attach_replaces_and_detach_drops_image() {
        let mut contexts = ContextManager::new(Vec::new());
        let mut buffers = BufferManager::new();
        let mut renderer = renderer(&mut contexts, 4, 4);
        let surface = SurfaceId::new_unique();
        let first = solid_buffer(&mut buffers, 2, 2, 0xff00_00ff);
        let second = solid_buffer(&mut buffers, 2, 2, 0xffff_0000);

        renderer.attach(surface, buffers.get_buffer_details(first));
        let first_image = renderer.image(surface).unwrap();
        renderer.attach(surface, buffers.get_buffer_details(second));
        let second_image = renderer.image(surface).unwrap();
        assert_ne!(first_image, second_image);

        renderer.detach(surface);
        assert_eq!(renderer.image(surface), None);
    }

    #[test]
    fn test_unimportable_buffer_leaves_no_image() {
        let mut contexts = ContextManager::new(Vec::new());
        let mut buffers = BufferManager::new();
        let mut renderer = renderer(&mut contexts, 4, 4);
        let surface = SurfaceId::new_unique();
        let dmabuf = buffers.register_buffer(BufferType::DmaBuf, 2, 2, 8, BufferFormat::Xrgb8888, None).unwrap();

        renderer.attach(surface, buffers.get_buffer_details(dmabuf));
        assert_eq!(renderer.image(surface), None);
    }

    #[test]
    fn test_repaint_draws_bottom_to_top_and_presents() {
        let mut contexts = ContextManager::new(Vec::new());
        let mut buffers = BufferManager::new();
        let mut renderer = renderer(&mut contexts, 4, 1);
        let (mut backend, log) = ScriptedSurface::with_log(4, 1);
        let (bottom, top) = (SurfaceId::new_unique(), SurfaceId::new_unique());
        let red = solid_buffer(&mut buffers, 3, 1, 0xffff_0000);
        let blue = solid_buffer(&mut buffers, 2, 1, 0xff00_00ff);
        renderer.attach(bottom, buffers.get_buffer_details(red));
        renderer.attach(top, buffers.get_buffer_details(blue));

        let items = [
            PaintItem { surface: bottom, placement: Placement { x: 0, y: 0, width: 3, height: 1 } },
            PaintItem { surface: top, placement: Placement { x: 2, y: 0, width: 2, height: 1 } },
            PaintItem { surface: SurfaceId::new_unique(), placement: Placement { x: 0, y: 0, width: 4, height: 1 } },
        ];
        renderer.repaint(&mut contexts, &mut backend, [0.0, 0.0, 0.0, 1.0], &items).unwrap();

        let log = log.borrow();
        assert_eq!(log.flips, 1);
        assert_eq!(log.last_frame, vec![0xffff_0000, 0xffff_0000, 0xff00_00ff, 0xff00_00ff]);
        assert_eq!(contexts.bound(), Some(renderer.handle().id()));
    }

    #[test]
    fn test_failed_flip_degrades_instead_of_failing() {
        let mut contexts = ContextManager::new(Vec::new());
        let mut renderer = renderer(&mut contexts, 2, 2);
        let (mut backend, log) = ScriptedSurface::with_log(2, 2);
        log.borrow_mut().fail_flips = true;

        assert!(renderer.repaint(&mut contexts, &mut backend, [0.0; 4], &[]).is_ok());
        assert!(renderer.handle().flip_failed());
        log.borrow_mut().fail_flips = false;
        renderer.repaint(&mut contexts, &mut backend, [0.0; 4], &[]).unwrap();
        assert_eq!(log.borrow().flips, 0);
    }

    #[test]
    fn test_terminate_clears_bound_marker() {
        let mut contexts = ContextManager::new(Vec::new());
        let mut renderer = renderer(&mut contexts, 2, 2);
        let mut backend = ScriptedSurface::new(2, 2);
        renderer.repaint(&mut contexts, &mut backend, [0.0; 4], &[]).unwrap();
        assert!(contexts.bound().is_some());

        renderer.terminate(&mut contexts);
        assert_eq!(contexts.bound(), None);
    }
}
