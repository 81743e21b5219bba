//! Links between compositor objects and the protocol objects clients see.
//!
//! The wire layer is not part of the core; it is reached through the [`Transport`]
//! trait. Every protocol-backed object holds a [`ResourceLink`] that is flipped to
//! `Detached` before either side is torn down, so destruction can start from the
//! client ("object destroyed, free our state") or from the compositor ("state
//! released, destroy the object") and still happen exactly once.

use novade_buffer_manager::{BufferId, ClientId};
use thiserror::Error;

/// The protocol interfaces the core creates objects for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Surface,
    Region,
    Callback,
}

/// A protocol object as the transport identifies it: the owning client plus the
/// client-chosen object id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    pub client: ClientId,
    pub id: u32,
}

impl ResourceHandle {
    pub fn new(client: ClientId, id: u32) -> Self {
        Self { client, id }
    }
}

/// State of the protocol side of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceLink {
    Live(ResourceHandle),
    Detached,
}

impl ResourceLink {
    pub fn handle(&self) -> Option<ResourceHandle> {
        match self {
            ResourceLink::Live(handle) => Some(*handle),
            ResourceLink::Detached => None,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, ResourceLink::Live(_))
    }

    /// Switches the link to `Detached` and returns the handle it held.
    ///
    /// Only the first call returns `Some`; every teardown path goes through here.
    pub fn detach(&mut self) -> Option<ResourceHandle> {
        match std::mem::replace(self, ResourceLink::Detached) {
            ResourceLink::Live(handle) => Some(handle),
            ResourceLink::Detached => None,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("out of memory creating {kind:?} object for client {client:?}")]
    NoMemory { kind: ResourceKind, client: ClientId },
    #[error("client {0:?} is no longer connected")]
    ClientGone(ClientId),
}

/// The wire layer, as seen from the core.
///
/// Destroying a resource here must not call back into the compositor
/// synchronously; the transport reports it later through
/// `Compositor::resource_destroyed`, which ignores objects already detached.
pub trait Transport {
    /// Creates the protocol object for a new core object.
    fn create_resource(
        &mut self,
        kind: ResourceKind,
        client: ClientId,
        id: u32,
    ) -> Result<ResourceHandle, TransportError>;

    fn destroy_resource(&mut self, handle: ResourceHandle);

    /// Posts the protocol's "no memory" error to `client`.
    fn post_no_memory(&mut self, client: ClientId);

    /// Sends `wl_callback.done`.
    fn send_frame_done(&mut self, callback: ResourceHandle, time_ms: u32);

    /// Tells the owning client it may reuse `buffer`.
    fn send_buffer_release(&mut self, buffer: BufferId);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_detach_returns_handle_once() {
        let handle = ResourceHandle::new(ClientId::new(3), 17);
        let mut link = ResourceLink::Live(handle);
        assert!(link.is_live());
        assert_eq!(link.handle(), Some(handle));

        assert_eq!(link.detach(), Some(handle));
        assert_eq!(link, ResourceLink::Detached);
        assert_eq!(link.detach(), None);
        assert_eq!(link.handle(), None);
    }
}
