//! Pointer drag handling shared by the clip and the selection window.
//!
//! A drag is `begin → update* → end`. Updates only clamp; `end` is the single
//! place where bar snapping happens.

use crate::clip::ClipPlacement;
use crate::selection::SelectionWindow;
use crate::timeline::{TimeSpan, TimelineViewport};

/// Width of the grab zone at each clip edge, in pixels.
pub const EDGE_HANDLE_PX: f64 = 8.0;

/// Part of a draggable item under the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handle {
    Body,
    StartEdge,
    EndEdge,
}

/// Something that can be moved (and possibly trimmed) by a pointer drag.
pub trait Draggable {
    /// Time the pointer grabs: the start for body and start-edge drags, the
    /// end for end-edge drags.
    fn anchor(&self, handle: Handle) -> f64;

    /// Continuous update with an unclamped candidate time.
    fn drag(&mut self, handle: Handle, candidate: f64);

    /// Gesture release.
    fn release(&mut self, handle: Handle);
}

impl Draggable for ClipPlacement {
    fn anchor(&self, handle: Handle) -> f64 {
        match handle {
            Handle::Body | Handle::StartEdge => self.start(),
            Handle::EndEdge => self.end(),
        }
    }

    fn drag(&mut self, handle: Handle, candidate: f64) {
        match handle {
            Handle::Body => self.move_to(candidate),
            Handle::StartEdge => self.trim_start(candidate),
            Handle::EndEdge => self.trim_end(candidate),
        }
    }

    fn release(&mut self, handle: Handle) {
        match handle {
            Handle::Body => self.commit_move(),
            Handle::StartEdge | Handle::EndEdge => {}
        }
    }
}

/// The selection has a fixed size, so every handle moves the whole window.
impl Draggable for SelectionWindow {
    fn anchor(&self, _handle: Handle) -> f64 {
        self.start()
    }

    fn drag(&mut self, _handle: Handle, candidate: f64) {
        self.move_to(candidate);
    }

    fn release(&mut self, _handle: Handle) {
        self.commit_move();
    }
}

/// Finds the handle of `span` under pointer position `x`. Edge handles win
/// over the body when `with_edges` is set; very narrow spans keep a body
/// zone of at least a third of their width.
pub fn hit_test(viewport: &TimelineViewport, span: TimeSpan, x: f64, with_edges: bool) -> Option<Handle> {
    let left = viewport.time_to_pixel(span.start);
    let right = viewport.time_to_pixel(span.end());
    if x < left || x > right {
        return None;
    }
    if !with_edges {
        return Some(Handle::Body);
    }

    let edge = EDGE_HANDLE_PX.min((right - left) / 3.0);
    if x <= left + edge {
        Some(Handle::StartEdge)
    } else if x >= right - edge {
        Some(Handle::EndEdge)
    } else {
        Some(Handle::Body)
    }
}

pub fn hit_test_clip(viewport: &TimelineViewport, clip: &ClipPlacement, x: f64) -> Option<Handle> {
    hit_test(viewport, clip.span(), x, true)
}

pub fn hit_test_selection(viewport: &TimelineViewport, selection: &SelectionWindow, x: f64) -> Option<Handle> {
    hit_test(viewport, selection.span(), x, false)
}

/// An in-progress drag. Remembers how far from the anchor the pointer
/// grabbed so the item does not jump under it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragSession {
    handle: Handle,
    grab_offset: f64,
}

impl DragSession {
    pub fn begin(handle: Handle, pointer_x: f64, viewport: &TimelineViewport, target: &dyn Draggable) -> Self {
        let grab_offset = viewport.pixel_to_time(pointer_x) - target.anchor(handle);
        Self {
            handle,
            grab_offset: if grab_offset.is_finite() { grab_offset } else { 0.0 },
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn update(&self, pointer_x: f64, viewport: &TimelineViewport, target: &mut dyn Draggable) {
        let candidate = viewport.pixel_to_time(pointer_x) - self.grab_offset;
        target.drag(self.handle, candidate);
    }

    /// Applies the final pointer position, then the release step.
    pub fn end(self, pointer_x: f64, viewport: &TimelineViewport, target: &mut dyn Draggable) {
        self.update(pointer_x, viewport, target);
        target.release(self.handle);
    }

    /// Releases without a final position (pointer lost or cancelled).
    pub fn abandon(self, target: &mut dyn Draggable) {
        target.release(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimelineConfig;
    use crate::selection::BarCount;

    fn viewport() -> TimelineViewport {
        // 10 px per second
        TimelineViewport::new(600.0, 60.0)
    }

    fn clip() -> ClipPlacement {
        ClipPlacement::from_parts(60.0, 40.0, 10.0, 5.0, 8.0, &TimelineConfig::default()).unwrap()
    }

    #[test]
    fn hit_test_finds_edges_and_body() {
        let view = viewport();
        let clip = clip();

        assert_eq!(hit_test_clip(&view, &clip, 101.0), Some(Handle::StartEdge));
        assert_eq!(hit_test_clip(&view, &clip, 140.0), Some(Handle::Body));
        assert_eq!(hit_test_clip(&view, &clip, 178.0), Some(Handle::EndEdge));
        assert_eq!(hit_test_clip(&view, &clip, 90.0), None);
    }

    #[test]
    fn body_drag_keeps_grab_offset_and_snaps_on_release() {
        let view = viewport();
        let mut clip = clip();

        let drag = DragSession::begin(Handle::Body, 130.0, &view, &clip);
        drag.update(150.0, &view, &mut clip);
        assert!((clip.start() - 12.0).abs() < 1e-9);

        drag.update(156.0, &view, &mut clip);
        assert!((clip.start() - 12.6).abs() < 1e-9);

        drag.end(146.0, &view, &mut clip);
        assert_eq!(clip.start(), 12.0);
    }

    #[test]
    fn edge_drags_trim_without_snapping() {
        let view = viewport();
        let mut clip = clip();

        let drag = DragSession::begin(Handle::StartEdge, 100.0, &view, &clip);
        drag.end(121.0, &view, &mut clip);
        assert!((clip.start() - 12.1).abs() < 1e-9);
        assert!((clip.end() - 18.0).abs() < 1e-9);

        let drag = DragSession::begin(Handle::EndEdge, 180.0, &view, &clip);
        drag.end(250.0, &view, &mut clip);
        assert!((clip.end() - 25.0).abs() < 1e-9);
        assert!((clip.start() - 12.1).abs() < 1e-9);
    }

    #[test]
    fn selection_drag_snaps_to_bars() {
        let view = viewport();
        let mut selection = SelectionWindow::new(60.0, BarCount::Two);
        assert_eq!(hit_test_selection(&view, &selection, 10.0), Some(Handle::Body));

        let drag = DragSession::begin(Handle::Body, 10.0, &view, &selection);
        drag.update(105.0, &view, &mut selection);
        assert!((selection.start() - 9.5).abs() < 1e-9);
        drag.abandon(&mut selection);
        assert_eq!(selection.start(), 8.0);
    }
}
