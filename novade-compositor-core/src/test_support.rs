//! Recording test doubles for the transport, the policy handler and backend
//! surfaces.

use std::cell::RefCell;
use std::rc::Rc;

use novade_buffer_manager::{BufferId, ClientId};
use novade_render_context::{BackendSurface, Frame, PageFlipError};

use crate::handler::CompositorHandler;
use crate::output::OutputId;
use crate::resource::{ResourceHandle, ResourceKind, Transport, TransportError};
use crate::view::{Geometry, Size, ViewId, ViewState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Created(ResourceKind, ResourceHandle),
    Destroyed(ResourceHandle),
    NoMemory(ClientId),
    FrameDone(ResourceHandle, u32),
    BufferReleased(BufferId),
}

#[derive(Debug, Default)]
pub struct RecordingTransport {
    pub events: Vec<TransportEvent>,
    /// Object kinds whose creation fails with `NoMemory`.
    pub fail_kinds: Vec<ResourceKind>,
}

impl RecordingTransport {
    pub fn destroyed(&self) -> Vec<ResourceHandle> {
        self.events
            .iter()
            .filter_map(|event| match event {
                TransportEvent::Destroyed(handle) => Some(*handle),
                _ => None,
            })
            .collect()
    }

    pub fn frames_done(&self) -> Vec<ResourceHandle> {
        self.events
            .iter()
            .filter_map(|event| match event {
                TransportEvent::FrameDone(handle, _) => Some(*handle),
                _ => None,
            })
            .collect()
    }

    pub fn released_buffers(&self) -> Vec<BufferId> {
        self.events
            .iter()
            .filter_map(|event| match event {
                TransportEvent::BufferReleased(buffer) => Some(*buffer),
                _ => None,
            })
            .collect()
    }
}

impl Transport for RecordingTransport {
    fn create_resource(
        &mut self,
        kind: ResourceKind,
        client: ClientId,
        id: u32,
    ) -> Result<ResourceHandle, TransportError> {
        if self.fail_kinds.contains(&kind) {
            return Err(TransportError::NoMemory { kind, client });
        }
        let handle = ResourceHandle::new(client, id);
        self.events.push(TransportEvent::Created(kind, handle));
        Ok(handle)
    }

    fn destroy_resource(&mut self, handle: ResourceHandle) {
        self.events.push(TransportEvent::Destroyed(handle));
    }

    fn post_no_memory(&mut self, client: ClientId) {
        self.events.push(TransportEvent::NoMemory(client));
    }

    fn send_frame_done(&mut self, callback: ResourceHandle, time_ms: u32) {
        self.events.push(TransportEvent::FrameDone(callback, time_ms));
    }

    fn send_buffer_release(&mut self, buffer: BufferId) {
        self.events.push(TransportEvent::BufferReleased(buffer));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerEvent {
    OutputCreated(OutputId),
    OutputDestroyed(OutputId),
    ResolutionChanged(OutputId, Size, Size),
    ViewCreated(ViewId),
    ViewDestroyed(ViewId),
    Focus(ViewId, bool),
    RequestGeometry(ViewId, Geometry),
    RequestState(ViewId, ViewState, bool),
    Moved(ViewId, Option<OutputId>, Option<OutputId>),
}

#[derive(Debug, Default)]
pub struct RecordingHandler {
    pub events: Vec<HandlerEvent>,
    pub veto_outputs: bool,
    pub veto_views: bool,
    /// Claim geometry and state requests instead of letting the core apply them.
    pub claim_requests: bool,
}

impl CompositorHandler for RecordingHandler {
    fn output_created(&mut self, output: OutputId) -> bool {
        self.events.push(HandlerEvent::OutputCreated(output));
        !self.veto_outputs
    }

    fn output_destroyed(&mut self, output: OutputId) {
        self.events.push(HandlerEvent::OutputDestroyed(output));
    }

    fn output_resolution_changed(&mut self, output: OutputId, from: Size, to: Size) {
        self.events.push(HandlerEvent::ResolutionChanged(output, from, to));
    }

    fn view_created(&mut self, view: ViewId) -> bool {
        self.events.push(HandlerEvent::ViewCreated(view));
        !self.veto_views
    }

    fn view_destroyed(&mut self, view: ViewId) {
        self.events.push(HandlerEvent::ViewDestroyed(view));
    }

    fn view_focus_changed(&mut self, view: ViewId, focused: bool) {
        self.events.push(HandlerEvent::Focus(view, focused));
    }

    fn view_request_geometry(&mut self, view: ViewId, geometry: Geometry) -> bool {
        self.events.push(HandlerEvent::RequestGeometry(view, geometry));
        self.claim_requests
    }

    fn view_request_state(&mut self, view: ViewId, state: ViewState, toggle: bool) -> bool {
        self.events.push(HandlerEvent::RequestState(view, state, toggle));
        self.claim_requests
    }

    fn view_moved_to_output(&mut self, view: ViewId, from: Option<OutputId>, to: Option<OutputId>) {
        self.events.push(HandlerEvent::Moved(view, from, to));
    }
}

#[derive(Debug, Default)]
pub struct FlipLog {
    /// Successful page flips.
    pub flips: u32,
    pub last_frame: Vec<u32>,
    pub fail_flips: bool,
}

/// A backend surface that records presented frames.
#[derive(Debug)]
pub struct ScriptedSurface {
    size: (u32, u32),
    log: Rc<RefCell<FlipLog>>,
}

impl ScriptedSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_log(width, height).0
    }

    /// Also returns a shared view of the flip log, for surfaces owned by an output.
    pub fn with_log(width: u32, height: u32) -> (Self, Rc<RefCell<FlipLog>>) {
        let log = Rc::new(RefCell::new(FlipLog::default()));
        (Self { size: (width, height), log: Rc::clone(&log) }, log)
    }
}

impl BackendSurface for ScriptedSurface {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn page_flip(&mut self, frame: Frame<'_>) -> Result<(), PageFlipError> {
        let mut log = self.log.borrow_mut();
        if log.fail_flips {
            return Err(PageFlipError("vblank timeout".to_string()));
        }
        log.flips += 1;
        if let Frame::Pixels { data, .. } = frame {
            log.last_frame = data.to_vec();
        }
        Ok(())
    }
}
