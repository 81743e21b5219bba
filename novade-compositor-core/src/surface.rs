//! Surfaces (`wl_surface`) and their double-buffered state.
//!
//! Requests only ever touch the pending [`SurfaceState`]; [`Surface::commit`] is the
//! single transition into the committed, render-visible state.

use std::sync::atomic::{AtomicU64, Ordering};

use novade_buffer_manager::{BufferDetails, BufferId, BufferManager, ClientId};
use tracing::{debug, trace};

use crate::callback::Callback;
use crate::region::Region;
use crate::resource::{ResourceHandle, ResourceLink};
use crate::view::ViewId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(u64);

impl SurfaceId {
    /// Creates a new, unique `SurfaceId`.
    pub fn new_unique() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        SurfaceId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// One half of a surface's double-buffered state.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceState {
    /// Buffer attached in this cycle. In the committed state: the buffer whose
    /// contents are currently shown, kept so it can be released when superseded.
    pub buffer: Option<BufferId>,
    /// `wl_surface.attach` offset.
    pub offset: (i32, i32),
    pub opaque: Region,
    /// Defaults to the infinite plane: the whole surface takes input.
    pub input: Region,
    pub damage: Region,
    pub newly_attached: bool,
}

impl Default for SurfaceState {
    fn default() -> Self {
        Self {
            buffer: None,
            offset: (0, 0),
            opaque: Region::new(),
            input: Region::infinite(),
            damage: Region::new(),
            newly_attached: false,
        }
    }
}

/// Whatever imports committed buffers for drawing.
pub trait SurfaceBackend {
    /// A commit carried a newly attached buffer (`None` for a null attach).
    fn attach(&mut self, surface: SurfaceId, buffer: Option<&BufferDetails>);
}

/// What a commit changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitOutcome {
    /// The commit carried an attach and the backend was notified.
    pub attached: bool,
    pub size_changed: bool,
    pub opaque_changed: bool,
    /// The previously shown buffer, now replaced and due for release.
    pub superseded_buffer: Option<BufferId>,
}

#[derive(Debug)]
pub struct Surface {
    id: SurfaceId,
    client: ClientId,
    link: ResourceLink,
    ref_count: u32,
    pending: SurfaceState,
    committed: SurfaceState,
    size: (u32, u32),
    pending_callback: Option<Callback>,
    frame_callbacks: Vec<Callback>,
    view: Option<ViewId>,
}

impl Surface {
    /// Creates a surface for the protocol object `handle`, holding one reference on
    /// behalf of that object.
    pub fn new(handle: ResourceHandle) -> Self {
        Self {
            id: SurfaceId::new_unique(),
            client: handle.client,
            link: ResourceLink::Live(handle),
            ref_count: 1,
            pending: SurfaceState::default(),
            committed: SurfaceState::default(),
            size: (0, 0),
            pending_callback: None,
            frame_callbacks: Vec::new(),
            view: None,
        }
    }

    pub fn id(&self) -> SurfaceId {
        self.id
    }

    pub fn client(&self) -> ClientId {
        self.client
    }

    pub fn resource(&self) -> Option<ResourceHandle> {
        self.link.handle()
    }

    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    pub fn pending(&self) -> &SurfaceState {
        &self.pending
    }

    pub fn committed(&self) -> &SurfaceState {
        &self.committed
    }

    /// Size of the committed buffer, `(0, 0)` before the first attach.
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// A surface with committed content.
    pub fn is_mapped(&self) -> bool {
        self.size.0 > 0 && self.size.1 > 0
    }

    /// The buffer currently shown.
    pub fn buffer(&self) -> Option<BufferId> {
        self.committed.buffer
    }

    pub fn view(&self) -> Option<ViewId> {
        self.view
    }

    pub(crate) fn set_view(&mut self, view: Option<ViewId>) {
        self.view = view;
    }

    /// `wl_surface.attach`. `None` detaches the current buffer on the next commit.
    pub fn attach(&mut self, buffer: Option<BufferId>, x: i32, y: i32) {
        trace!(surface = ?self.id, ?buffer, x, y, "attach");
        self.pending.buffer = buffer;
        self.pending.offset = (x, y);
        self.pending.newly_attached = true;
    }

    /// `wl_surface.damage`, in surface coordinates.
    pub fn damage(&mut self, x: i32, y: i32, width: i32, height: i32) {
        trace!(surface = ?self.id, x, y, width, height, "damage");
        self.pending.damage.union_rect(x, y, width, height);
    }

    /// `None` resets the opaque region to empty.
    pub fn set_opaque_region(&mut self, region: Option<&Region>) {
        match region {
            Some(region) => self.pending.opaque.copy_from(region),
            None => self.pending.opaque.clear(),
        }
    }

    /// `None` resets the input region to the whole surface.
    pub fn set_input_region(&mut self, region: Option<&Region>) {
        match region {
            Some(region) => self.pending.input.copy_from(region),
            None => self.pending.input = Region::infinite(),
        }
    }

    /// Stores the frame callback for the next commit.
    ///
    /// Only one callback may be pending per commit; the one it replaces is returned
    /// so the caller can release it.
    pub fn set_frame_callback(&mut self, callback: Callback) -> Option<Callback> {
        self.pending_callback.replace(callback)
    }

    /// Applies the pending state.
    pub fn commit(&mut self, buffers: &BufferManager, backend: &mut dyn SurfaceBackend) -> CommitOutcome {
        let mut outcome = CommitOutcome::default();

        if self.pending.newly_attached {
            let buffer = self.pending.buffer.take();
            let details = buffer.and_then(|id| buffers.get_buffer_details(id));
            backend.attach(self.id, details);
            outcome.attached = true;

            let size = details.map_or((0, 0), |details| (details.width, details.height));
            if size != self.size {
                self.size = size;
                outcome.size_changed = true;
            }
            if buffer != self.committed.buffer {
                outcome.superseded_buffer = std::mem::replace(&mut self.committed.buffer, buffer);
            }
        }
        self.committed.offset = self.pending.offset;
        self.pending.offset = (0, 0);
        self.pending.newly_attached = false;

        let (width, height) = self.bounds();
        self.committed.damage.union(&self.pending.damage);
        self.committed.damage.intersect_rect(0, 0, width, height);
        self.pending.damage.clear();

        let mut opaque = self.pending.opaque.clone();
        opaque.intersect_rect(0, 0, width, height);
        if opaque != self.committed.opaque {
            self.committed.opaque = opaque;
            outcome.opaque_changed = true;
        }

        self.committed.input.copy_from(&self.pending.input);
        self.committed.input.intersect_rect(0, 0, width, height);

        if let Some(callback) = self.pending_callback.take() {
            self.frame_callbacks.push(callback);
        }

        debug!(surface = ?self.id, size = ?self.size, attached = outcome.attached, "surface committed");
        outcome
    }

    /// Hands the committed damage to a render pass, leaving it empty.
    pub fn take_damage(&mut self) -> Region {
        std::mem::take(&mut self.committed.damage)
    }

    /// Committed frame callbacks, due once the next frame has been shown.
    pub fn take_frame_callbacks(&mut self) -> Vec<Callback> {
        std::mem::take(&mut self.frame_callbacks)
    }

    /// Takes a reference for the duration of some work (e.g. a render in flight).
    pub fn acquire(&mut self) {
        self.ref_count += 1;
    }

    /// Drops a reference. Returns `true` when it was the last one and the surface
    /// must be freed.
    pub fn release(&mut self) -> bool {
        self.ref_count = self.ref_count.saturating_sub(1);
        self.ref_count == 0
    }

    pub(crate) fn detach_resource(&mut self) -> Option<ResourceHandle> {
        self.link.detach()
    }

    /// Forgets a callback whose protocol object the client destroyed.
    pub(crate) fn detach_callback(&mut self, handle: ResourceHandle) -> bool {
        let pending_matches = self.pending_callback.as_ref().and_then(Callback::handle) == Some(handle);
        if pending_matches {
            if let Some(mut callback) = self.pending_callback.take() {
                callback.detach();
            }
            return true;
        }
        match self.frame_callbacks.iter().position(|cb| cb.handle() == Some(handle)) {
            Some(index) => {
                self.frame_callbacks.remove(index).detach();
                true
            }
            None => false,
        }
    }

    /// Every callback this surface still owns, pending one included.
    pub(crate) fn take_all_callbacks(&mut self) -> Vec<Callback> {
        let mut callbacks = std::mem::take(&mut self.frame_callbacks);
        callbacks.extend(self.pending_callback.take());
        callbacks
    }

    fn bounds(&self) -> (i32, i32) {
        let clamp = |value: u32| i32::try_from(value).unwrap_or(i32::MAX);
        (clamp(self.size.0), clamp(self.size.1))
    }
}
