//! One-shot frame callbacks (`wl_callback` created by `wl_surface.frame`).

use crate::resource::{ResourceHandle, ResourceLink, Transport};

/// A pending "frame done" notification.
///
/// Consumed by exactly one of [`Callback::fire`] or [`Callback::cancel`], or detached
/// when the client destroyed the object first.
#[derive(Debug, PartialEq, Eq)]
pub struct Callback {
    link: ResourceLink,
}

impl Callback {
    pub fn new(handle: ResourceHandle) -> Self {
        Self { link: ResourceLink::Live(handle) }
    }

    pub fn handle(&self) -> Option<ResourceHandle> {
        self.link.handle()
    }

    /// Sends `done` and destroys the protocol object.
    ///
    /// Returns the handle that was released, `None` if the client had already
    /// destroyed it.
    pub fn fire(mut self, transport: &mut dyn Transport, time_ms: u32) -> Option<ResourceHandle> {
        let handle = self.link.detach()?;
        transport.send_frame_done(handle, time_ms);
        transport.destroy_resource(handle);
        Some(handle)
    }

    /// Destroys the protocol object without sending `done`.
    pub fn cancel(mut self, transport: &mut dyn Transport) -> Option<ResourceHandle> {
        let handle = self.link.detach()?;
        transport.destroy_resource(handle);
        Some(handle)
    }

    /// The client destroyed the object; nothing may be sent to it anymore.
    pub(crate) fn detach(&mut self) -> Option<ResourceHandle> {
        self.link.detach()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingTransport, TransportEvent};
    use novade_buffer_manager::ClientId;
    use pretty_assertions::assert_eq;

    fn handle(id: u32) -> ResourceHandle {
        ResourceHandle::new(ClientId::new(1), id)
    }

    #[test]
    fn test_fire_sends_done_then_destroys() {
        let mut transport = RecordingTransport::default();
        let released = Callback::new(handle(5)).fire(&mut transport, 1234);

        assert_eq!(released, Some(handle(5)));
        assert_eq!(
            transport.events,
            vec![TransportEvent::FrameDone(handle(5), 1234), TransportEvent::Destroyed(handle(5))]
        );
    }

    #[test]
    fn test_cancel_only_destroys() {
        let mut transport = RecordingTransport::default();
        Callback::new(handle(6)).cancel(&mut transport);
        assert_eq!(transport.events, vec![TransportEvent::Destroyed(handle(6))]);
    }

    #[test]
    fn test_detached_callback_sends_nothing() {
        let mut transport = RecordingTransport::default();
        let mut callback = Callback::new(handle(7));
        assert_eq!(callback.detach(), Some(handle(7)));

        assert_eq!(callback.fire(&mut transport, 1), None);
        assert!(transport.events.is_empty());
    }
}
