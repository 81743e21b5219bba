//! Notifications from the core to the host's window-management policy.

use crate::output::OutputId;
use crate::view::{Geometry, Size, ViewId, ViewState};

/// Policy hooks. Every method has a default, so a host implements only what it
/// cares about.
///
/// Handlers run while the compositor is mutably borrowed; they receive ids and act
/// on the compositor after the call returns.
pub trait CompositorHandler {
    /// Returning `false` destroys the output again immediately.
    fn output_created(&mut self, _output: OutputId) -> bool {
        true
    }

    fn output_destroyed(&mut self, _output: OutputId) {}

    fn output_resolution_changed(&mut self, _output: OutputId, _from: Size, _to: Size) {}

    /// Returning `false` destroys the view again immediately.
    fn view_created(&mut self, _view: ViewId) -> bool {
        true
    }

    fn view_destroyed(&mut self, _view: ViewId) {}

    fn view_focus_changed(&mut self, _view: ViewId, _focused: bool) {}

    /// A client asked for a new geometry. Return `true` if the policy handled it;
    /// otherwise the core applies the geometry as requested.
    fn view_request_geometry(&mut self, _view: ViewId, _geometry: Geometry) -> bool {
        false
    }

    /// A client asked to set or clear a state bit. Return `true` if the policy
    /// handled it; otherwise the core applies it.
    fn view_request_state(&mut self, _view: ViewId, _state: ViewState, _toggle: bool) -> bool {
        false
    }

    fn view_moved_to_output(&mut self, _view: ViewId, _from: Option<OutputId>, _to: Option<OutputId>) {}
}

/// Accepts everything and lets the core apply every request.
impl CompositorHandler for () {}
