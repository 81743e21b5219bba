//! Views: the stackable, policy-visible wrapper around a surface with a shell role.

use std::sync::atomic::{AtomicU64, Ordering};

use bitflags::bitflags;
use serde::Deserialize;

use crate::error::CompositorError;
use crate::output::OutputId;
use crate::resource::{ResourceHandle, ResourceLink};
use crate::surface::SurfaceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewId(u64);

impl ViewId {
    /// Creates a new, unique `ViewId`.
    pub fn new_unique() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        ViewId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

bitflags! {
    /// Window state requested by the shell or applied by policy.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ViewState: u32 {
        const MAXIMIZED = 1;
        const FULLSCREEN = 2;
        const RESIZING = 4;
        const MOVING = 8;
        /// Set on the focused view.
        const ACTIVATED = 16;
    }
}

bitflags! {
    /// What kind of window a view is. Set by shell adapters, read by policy.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ViewType: u32 {
        /// Positions itself and is not managed (X11 override-redirect).
        const OVERRIDE_REDIRECT = 1;
        const UNMANAGED = 2;
        const SPLASH = 4;
        const MODAL = 8;
        const POPUP = 16;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

/// Position and size of a view, in output coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Geometry {
    pub origin: Point,
    pub size: Size,
}

impl Geometry {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { origin: Point { x, y }, size: Size { width, height } }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        let (x, y) = (i64::from(x), i64::from(y));
        let (left, top) = (i64::from(self.origin.x), i64::from(self.origin.y));
        x >= left && y >= top && x < left + i64::from(self.size.width) && y < top + i64::from(self.size.height)
    }
}

/// Replaces `target` with `value`, reporting allocation failure instead of aborting.
fn store(target: &mut String, value: &str, what: &'static str) -> Result<(), CompositorError> {
    let mut stored = String::new();
    stored.try_reserve_exact(value.len()).map_err(|_| CompositorError::ResourceExhausted(what))?;
    stored.push_str(value);
    *target = stored;
    Ok(())
}

#[derive(Debug)]
pub struct View {
    id: ViewId,
    surface: SurfaceId,
    link: ResourceLink,
    output: Option<OutputId>,
    geometry: Geometry,
    mask: u32,
    state: ViewState,
    view_type: ViewType,
    parent: Option<ViewId>,
    title: String,
    class: String,
    app_id: String,
}

impl View {
    /// Creates a view for `surface`, whose shell role object is `role`.
    ///
    /// New views are visible on outputs with the default mask.
    pub fn new(surface: SurfaceId, role: ResourceHandle) -> Self {
        Self {
            id: ViewId::new_unique(),
            surface,
            link: ResourceLink::Live(role),
            output: None,
            geometry: Geometry::default(),
            mask: 1,
            state: ViewState::empty(),
            view_type: ViewType::empty(),
            parent: None,
            title: String::new(),
            class: String::new(),
            app_id: String::new(),
        }
    }

    pub fn id(&self) -> ViewId {
        self.id
    }

    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    /// The shell role object, while it is alive.
    pub fn role(&self) -> Option<ResourceHandle> {
        self.link.handle()
    }

    pub fn output(&self) -> Option<OutputId> {
        self.output
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn mask(&self) -> u32 {
        self.mask
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub fn view_type(&self) -> ViewType {
        self.view_type
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Visible on an output whose mask shares a bit with this view's.
    pub fn visible_on(&self, output_mask: u32) -> bool {
        self.mask & output_mask != 0
    }

    pub fn set_title(&mut self, title: &str) -> Result<(), CompositorError> {
        store(&mut self.title, title, "view title")
    }

    pub fn set_class(&mut self, class: &str) -> Result<(), CompositorError> {
        store(&mut self.class, class, "view class")
    }

    pub fn set_app_id(&mut self, app_id: &str) -> Result<(), CompositorError> {
        store(&mut self.app_id, app_id, "view app id")
    }

    pub(crate) fn parent(&self) -> Option<ViewId> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: Option<ViewId>) {
        self.parent = parent;
    }

    pub(crate) fn set_output(&mut self, output: Option<OutputId>) {
        self.output = output;
    }

    pub(crate) fn set_geometry(&mut self, geometry: Geometry) {
        self.geometry = geometry;
    }

    pub(crate) fn set_mask(&mut self, mask: u32) {
        self.mask = mask;
    }

    /// Sets or clears `state`. Returns `true` if anything changed.
    pub(crate) fn set_state(&mut self, state: ViewState, toggle: bool) -> bool {
        let before = self.state;
        self.state.set(state, toggle);
        before != self.state
    }

    pub(crate) fn set_view_type(&mut self, view_type: ViewType, toggle: bool) {
        self.view_type.set(view_type, toggle);
    }

    pub(crate) fn detach_role(&mut self) -> Option<ResourceHandle> {
        self.link.detach()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use novade_buffer_manager::ClientId;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn view() -> View {
        View::new(SurfaceId::new_unique(), ResourceHandle::new(ClientId::new(1), 20))
    }

    #[rstest]
    #[case(10, 10, true)]
    #[case(109, 59, true)]
    #[case(110, 30, false)]
    #[case(50, 60, false)]
    #[case(9, 30, false)]
    fn test_geometry_contains(#[case] x: i32, #[case] y: i32, #[case] inside: bool) {
        assert_eq!(Geometry::new(10, 10, 100, 50).contains(x, y), inside);
    }

    #[test]
    fn test_geometry_contains_near_limits() {
        let geometry = Geometry::new(i32::MAX - 5, 0, u32::MAX, 1);
        assert!(geometry.contains(i32::MAX, 0));
    }

    #[test]
    fn test_string_setters_replace_values() {
        let mut view = view();
        view.set_title("Terminal").unwrap();
        view.set_title("Terminal: ~/src").unwrap();
        view.set_class("foot").unwrap();
        view.set_app_id("org.codeberg.dnkl.foot").unwrap();

        assert_eq!(view.title(), "Terminal: ~/src");
        assert_eq!(view.class(), "foot");
        assert_eq!(view.app_id(), "org.codeberg.dnkl.foot");
    }

    #[test]
    fn test_set_state_reports_changes() {
        let mut view = view();
        assert!(view.set_state(ViewState::MAXIMIZED, true));
        assert!(!view.set_state(ViewState::MAXIMIZED, true));
        assert!(view.set_state(ViewState::FULLSCREEN, true));
        assert_eq!(view.state(), ViewState::MAXIMIZED | ViewState::FULLSCREEN);
        assert!(view.set_state(ViewState::MAXIMIZED, false));
        assert_eq!(view.state(), ViewState::FULLSCREEN);
    }

    #[test]
    fn test_visibility_mask() {
        let mut view = view();
        assert!(view.visible_on(1));
        view.set_mask(0b10);
        assert!(!view.visible_on(0b01));
        assert!(view.visible_on(0b11));
    }
}
