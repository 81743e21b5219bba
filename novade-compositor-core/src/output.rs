//! Outputs: render targets with their own view stack and render context.

use std::sync::atomic::{AtomicU64, Ordering};

use novade_render_context::BackendSurface;

use crate::render::OutputRenderer;
use crate::view::{Size, ViewId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputId(u64);

impl OutputId {
    /// Creates a new, unique `OutputId`.
    pub fn new_unique() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        OutputId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A display the compositor renders to.
///
/// Views are kept in two orderings. `paint_order` runs bottom to top (the last
/// element is the topmost view) and is what compositing and hit-testing use;
/// `creation_order` is stable and only changes when views join or leave.
#[derive(Debug)]
pub struct Output {
    id: OutputId,
    name: String,
    resolution: Size,
    paint_order: Vec<ViewId>,
    creation_order: Vec<ViewId>,
    mask: u32,
    sleeping: bool,
    pending_render: bool,
    backend: Box<dyn BackendSurface>,
    renderer: Option<OutputRenderer>,
}

impl Output {
    pub fn new(name: &str, resolution: Size, backend: Box<dyn BackendSurface>) -> Self {
        Self {
            id: OutputId::new_unique(),
            name: name.to_string(),
            resolution,
            paint_order: Vec::new(),
            creation_order: Vec::new(),
            mask: 1,
            sleeping: false,
            pending_render: false,
            backend,
            renderer: None,
        }
    }

    pub fn id(&self) -> OutputId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resolution(&self) -> Size {
        self.resolution
    }

    /// Views from bottom to top.
    pub fn paint_order(&self) -> &[ViewId] {
        &self.paint_order
    }

    pub fn creation_order(&self) -> &[ViewId] {
        &self.creation_order
    }

    pub fn mask(&self) -> u32 {
        self.mask
    }

    pub fn is_sleeping(&self) -> bool {
        self.sleeping
    }

    pub fn pending_render(&self) -> bool {
        self.pending_render
    }

    pub fn backend(&self) -> &dyn BackendSurface {
        self.backend.as_ref()
    }

    /// The output's renderer; `None` if no backend could be initialized for it.
    pub fn renderer(&self) -> Option<&OutputRenderer> {
        self.renderer.as_ref()
    }

    /// The view `offset` places below the top of the stack, wrapping around, so
    /// callers can cycle through the stack. `None` if the output has no views.
    pub fn topmost(&self, offset: usize) -> Option<ViewId> {
        let len = self.paint_order.len();
        if len == 0 {
            return None;
        }
        self.paint_order.get((offset % len + len - 1) % len).copied()
    }

    pub(crate) fn backend_mut(&mut self) -> &mut dyn BackendSurface {
        self.backend.as_mut()
    }

    pub(crate) fn renderer_mut(&mut self) -> Option<&mut OutputRenderer> {
        self.renderer.as_mut()
    }

    pub(crate) fn set_renderer(&mut self, renderer: OutputRenderer) {
        self.renderer = Some(renderer);
    }

    pub(crate) fn take_renderer(&mut self) -> Option<OutputRenderer> {
        self.renderer.take()
    }

    /// Renderer and backend surface together, for a render pass.
    pub(crate) fn render_parts(&mut self) -> Option<(&mut OutputRenderer, &mut dyn BackendSurface)> {
        let renderer = self.renderer.as_mut()?;
        Some((renderer, self.backend.as_mut()))
    }

    pub(crate) fn set_resolution(&mut self, resolution: Size) {
        self.resolution = resolution;
    }

    pub(crate) fn set_mask(&mut self, mask: u32) {
        self.mask = mask;
    }

    pub(crate) fn set_sleeping(&mut self, sleeping: bool) {
        self.sleeping = sleeping;
    }

    /// Marks the output dirty. Returns `false` if a render was already pending.
    pub(crate) fn schedule_repaint(&mut self) -> bool {
        !std::mem::replace(&mut self.pending_render, true)
    }

    pub(crate) fn clear_pending_render(&mut self) {
        self.pending_render = false;
    }

    /// Appends `view` to both orderings; it lands on top of the stack.
    pub(crate) fn add_view(&mut self, view: ViewId) {
        if !self.creation_order.contains(&view) {
            self.creation_order.push(view);
            self.paint_order.push(view);
        }
    }

    pub(crate) fn remove_view(&mut self, view: ViewId) -> bool {
        let before = self.creation_order.len();
        self.creation_order.retain(|id| *id != view);
        self.paint_order.retain(|id| *id != view);
        before != self.creation_order.len()
    }

    pub(crate) fn bring_to_front(&mut self, view: ViewId) -> bool {
        let Some(index) = self.position(view) else {
            return false;
        };
        let view = self.paint_order.remove(index);
        self.paint_order.push(view);
        true
    }

    pub(crate) fn send_to_back(&mut self, view: ViewId) -> bool {
        let Some(index) = self.position(view) else {
            return false;
        };
        let view = self.paint_order.remove(index);
        self.paint_order.insert(0, view);
        true
    }

    /// Moves `view` directly below `other`.
    pub(crate) fn send_below(&mut self, view: ViewId, other: ViewId) -> bool {
        self.restack(view, other, 0)
    }

    /// Moves `view` directly above `other`.
    pub(crate) fn bring_above(&mut self, view: ViewId, other: ViewId) -> bool {
        self.restack(view, other, 1)
    }

    fn restack(&mut self, view: ViewId, other: ViewId, above: usize) -> bool {
        if view == other {
            return false;
        }
        let (Some(index), Some(_)) = (self.position(view), self.position(other)) else {
            return false;
        };
        self.paint_order.remove(index);
        match self.position(other) {
            Some(anchor) => {
                self.paint_order.insert(anchor + above, view);
                true
            }
            None => false,
        }
    }

    fn position(&self, view: ViewId) -> Option<usize> {
        self.paint_order.iter().position(|id| *id == view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedSurface;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn output_with(views: usize) -> (Output, Vec<ViewId>) {
        let mut output = Output::new("test-0", Size { width: 64, height: 48 }, Box::new(ScriptedSurface::new(64, 48)));
        let ids: Vec<_> = (0..views).map(|_| ViewId::new_unique()).collect();
        for id in &ids {
            output.add_view(*id);
        }
        (output, ids)
    }

    #[test]
    fn test_topmost_on_empty_output_is_none() {
        let (output, _) = output_with(0);
        assert_eq!(output.topmost(0), None);
        assert_eq!(output.topmost(5), None);
    }

    #[rstest]
    #[case(0, 2)]
    #[case(1, 0)]
    #[case(2, 1)]
    #[case(3, 2)]
    #[case(usize::MAX, 2)]
    fn test_topmost_wraps_around(#[case] offset: usize, #[case] expected: usize) {
        let (output, ids) = output_with(3);
        // usize::MAX % 3 == 0
        assert_eq!(output.topmost(offset), Some(ids[expected]));
    }

    #[test]
    fn test_bring_to_front_makes_view_topmost() {
        let (mut output, ids) = output_with(3);
        assert!(output.bring_to_front(ids[0]));
        assert_eq!(output.topmost(0), Some(ids[0]));
        assert_eq!(output.creation_order(), ids.as_slice());
    }

    #[test]
    fn test_send_to_back_exposes_another_view() {
        let (mut output, ids) = output_with(2);
        let top = output.topmost(0);
        assert!(output.send_to_back(ids[1]));
        assert_ne!(output.topmost(0), top);
        assert_eq!(output.paint_order(), &[ids[1], ids[0]]);
    }

    #[test]
    fn test_send_below_and_bring_above() {
        let (mut output, ids) = output_with(4);
        assert!(output.send_below(ids[3], ids[1]));
        assert_eq!(output.paint_order(), &[ids[0], ids[3], ids[1], ids[2]]);

        assert!(output.bring_above(ids[0], ids[2]));
        assert_eq!(output.paint_order(), &[ids[3], ids[1], ids[2], ids[0]]);

        assert!(!output.bring_above(ids[0], ids[0]));
        assert!(!output.send_below(ids[0], ViewId::new_unique()));
        assert_eq!(output.paint_order().len(), 4);
    }

    #[test]
    fn test_remove_view_updates_both_orderings() {
        let (mut output, ids) = output_with(3);
        assert!(output.remove_view(ids[1]));
        assert!(!output.remove_view(ids[1]));
        assert_eq!(output.paint_order(), &[ids[0], ids[2]]);
        assert_eq!(output.creation_order(), &[ids[0], ids[2]]);
    }

    #[test]
    fn test_schedule_repaint_is_idempotent() {
        let (mut output, _) = output_with(0);
        assert!(output.schedule_repaint());
        assert!(!output.schedule_repaint());
        output.clear_pending_render();
        assert!(output.schedule_repaint());
    }
}
