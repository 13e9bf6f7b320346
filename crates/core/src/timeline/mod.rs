use serde::{Deserialize, Serialize};

use crate::config::TimelineConfig;

const BASELINE_ZOOM: f64 = 1.0;
const ZOOM_EPSILON: f64 = 1e-9;

/// Half-open range `[start, start + duration)` on a time axis, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start: f64,
    pub duration: f64,
}

impl TimeSpan {
    pub fn new(start: f64, duration: f64) -> Self {
        Self {
            start,
            duration: duration.max(0.0),
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time < self.end()
    }

    pub fn is_empty(&self) -> bool {
        self.duration <= 0.0
    }
}

/// Clamps without panicking when the range collapses: an inverted range
/// resolves to its lower bound.
pub(crate) fn clamp_to(value: f64, lo: f64, hi: f64) -> f64 {
    if hi < lo {
        lo
    } else {
        value.max(lo).min(hi)
    }
}

/// Rounds to the nearest multiple of `grid`.
pub(crate) fn snap_to_grid(value: f64, grid: f64) -> f64 {
    if grid > 0.0 {
        (value / grid).round() * grid
    } else {
        value
    }
}

/// Zoom, scroll and time/pixel mapping shared by every track of one view.
///
/// Pixel coordinates are relative to the left edge of the visible viewport.
/// The viewport does no drawing; consumers re-read positions after every
/// change.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineViewport {
    zoom: f64,
    scroll_offset: f64,
    viewport_width_px: f64,
    total_duration: f64,
    min_zoom: f64,
    max_zoom: f64,
    zoom_step: f64,
}

impl TimelineViewport {
    pub fn new(viewport_width_px: f64, total_duration: f64) -> Self {
        Self::with_config(viewport_width_px, total_duration, &TimelineConfig::default())
    }

    pub fn with_config(viewport_width_px: f64, total_duration: f64, config: &TimelineConfig) -> Self {
        let min_zoom = config.min_zoom.max(ZOOM_EPSILON);
        Self {
            zoom: BASELINE_ZOOM.max(min_zoom).min(config.max_zoom.max(min_zoom)),
            scroll_offset: 0.0,
            viewport_width_px: viewport_width_px.max(0.0),
            total_duration: total_duration.max(0.0),
            min_zoom,
            max_zoom: config.max_zoom.max(min_zoom),
            zoom_step: config.zoom_step.max(1.0 + ZOOM_EPSILON),
        }
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn scroll_offset(&self) -> f64 {
        self.scroll_offset
    }

    pub fn viewport_width_px(&self) -> f64 {
        self.viewport_width_px
    }

    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub fn pixels_per_second(&self) -> f64 {
        if self.total_duration <= 0.0 {
            return 0.0;
        }
        (self.viewport_width_px / self.total_duration) * self.zoom
    }

    /// Width of the whole timeline at the current zoom.
    pub fn total_width_px(&self) -> f64 {
        self.viewport_width_px * self.zoom
    }

    /// Horizontal scrolling is only possible once zoomed past the baseline.
    pub fn is_scrollable(&self) -> bool {
        self.zoom > BASELINE_ZOOM + ZOOM_EPSILON
    }

    pub fn time_to_pixel(&self, time: f64) -> f64 {
        time * self.pixels_per_second() - self.scroll_offset
    }

    pub fn pixel_to_time(&self, x: f64) -> f64 {
        let pps = self.pixels_per_second();
        if pps <= 0.0 {
            return 0.0;
        }
        (x + self.scroll_offset) / pps
    }

    /// Converts a duration to a pixel width at the current zoom.
    pub fn duration_to_width(&self, seconds: f64) -> f64 {
        seconds * self.pixels_per_second()
    }

    /// The slice of the timeline currently on screen.
    pub fn visible_span(&self) -> TimeSpan {
        let start = self.pixel_to_time(0.0);
        let end = self.pixel_to_time(self.viewport_width_px).min(self.total_duration);
        TimeSpan::new(start, end - start)
    }

    /// Sets the zoom, clamped to the configured range, keeping the scroll
    /// offset valid for the new timeline width.
    pub fn set_zoom(&mut self, zoom: f64) {
        if !zoom.is_finite() {
            return;
        }
        self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
        if (self.zoom - BASELINE_ZOOM).abs() <= ZOOM_EPSILON {
            self.zoom = BASELINE_ZOOM;
        }
        self.set_scroll(self.scroll_offset);
    }

    /// Sets the zoom while keeping the time under `anchor_px` stationary.
    pub fn zoom_around(&mut self, zoom: f64, anchor_px: f64) {
        let anchor_time = self.pixel_to_time(anchor_px);
        self.set_zoom(zoom);
        self.set_scroll(anchor_time * self.pixels_per_second() - anchor_px);
    }

    pub fn zoom_in(&mut self) {
        self.set_zoom(self.zoom * self.zoom_step);
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(self.zoom / self.zoom_step);
    }

    pub fn zoom_in_around(&mut self, anchor_px: f64) {
        self.zoom_around(self.zoom * self.zoom_step, anchor_px);
    }

    pub fn zoom_out_around(&mut self, anchor_px: f64) {
        self.zoom_around(self.zoom / self.zoom_step, anchor_px);
    }

    /// Sets the scroll offset, clamped so the visible window stays inside
    /// `[0, total_width_px]`. Pinned to zero while unzoomed.
    pub fn set_scroll(&mut self, scroll_px: f64) {
        if !scroll_px.is_finite() {
            return;
        }
        self.scroll_offset = if self.is_scrollable() {
            clamp_to(scroll_px, 0.0, self.max_scroll())
        } else {
            0.0
        };
    }

    pub fn scroll_by(&mut self, delta_px: f64) {
        self.set_scroll(self.scroll_offset + delta_px);
    }

    pub fn max_scroll(&self) -> f64 {
        (self.total_width_px() - self.viewport_width_px).max(0.0)
    }

    /// Scrolls the minimum amount needed to bring `time` on screen.
    pub fn reveal(&mut self, time: f64) {
        let x = self.time_to_pixel(time);
        if x < 0.0 {
            self.scroll_by(x);
        } else if x > self.viewport_width_px {
            self.scroll_by(x - self.viewport_width_px);
        }
    }

    /// Container width changed.
    pub fn resize(&mut self, viewport_width_px: f64) {
        if !viewport_width_px.is_finite() {
            return;
        }
        self.viewport_width_px = viewport_width_px.max(0.0);
        self.set_scroll(self.scroll_offset);
    }

    pub fn set_total_duration(&mut self, total_duration: f64) {
        if !total_duration.is_finite() {
            return;
        }
        self.total_duration = total_duration.max(0.0);
        self.set_scroll(self.scroll_offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> TimelineViewport {
        TimelineViewport::new(1000.0, 100.0)
    }

    #[test]
    fn time_and_pixel_are_inverse() {
        let mut view = viewport();
        view.set_zoom(3.7);
        view.set_scroll(812.5);

        for t in [0.0, 0.001, 12.34, 50.0, 99.999] {
            let back = view.pixel_to_time(view.time_to_pixel(t));
            assert!((back - t).abs() < 1e-9, "{t} -> {back}");
        }
    }

    #[test]
    fn pixels_per_second_scales_with_zoom() {
        let mut view = viewport();
        assert_eq!(view.pixels_per_second(), 10.0);
        view.set_zoom(2.0);
        assert_eq!(view.pixels_per_second(), 20.0);
    }

    #[test]
    fn zoom_steps_are_multiplicative_and_clamped() {
        let mut view = viewport();
        view.zoom_in();
        assert!((view.zoom() - 1.35).abs() < 1e-12);
        view.zoom_in();
        assert!((view.zoom() - 1.35 * 1.35).abs() < 1e-12);
        view.zoom_out();
        view.zoom_out();
        assert_eq!(view.zoom(), 1.0);

        view.zoom_out();
        assert_eq!(view.zoom(), 1.0);
        view.set_zoom(1_000.0);
        assert_eq!(view.zoom(), 32.0);
    }

    #[test]
    fn baseline_zoom_disables_scrolling() {
        let mut view = viewport();
        view.set_zoom(4.0);
        view.set_scroll(1500.0);
        assert_eq!(view.scroll_offset(), 1500.0);

        view.set_zoom(1.0);
        assert_eq!(view.scroll_offset(), 0.0);
        view.set_scroll(200.0);
        assert_eq!(view.scroll_offset(), 0.0);
    }

    #[test]
    fn scroll_is_clamped_to_timeline_width() {
        let mut view = viewport();
        view.set_zoom(2.0);
        view.set_scroll(5_000.0);
        assert_eq!(view.scroll_offset(), 1000.0);
        assert!((view.visible_span().start - 50.0).abs() < 1e-9);
        assert!((view.visible_span().end() - 100.0).abs() < 1e-9);
        view.set_scroll(-20.0);
        assert_eq!(view.scroll_offset(), 0.0);
        assert_eq!(view.visible_span().start, 0.0);
    }

    #[test]
    fn zoom_around_keeps_anchor_time_fixed() {
        let mut view = viewport();
        let before = view.pixel_to_time(400.0);
        view.zoom_in_around(400.0);
        view.zoom_in_around(400.0);
        assert!((view.pixel_to_time(400.0) - before).abs() < 1e-9);

        view.zoom_out_around(400.0);
        assert!((view.zoom() - 1.35).abs() < 1e-9);
        assert!((view.pixel_to_time(400.0) - before).abs() < 1e-9);
    }

    #[test]
    fn zooming_out_to_baseline_unpins_scroll() {
        let mut view = viewport();
        view.zoom_in_around(900.0);
        assert!(view.scroll_offset() > 0.0);

        view.zoom_out_around(900.0);
        assert_eq!(view.zoom(), 1.0);
        assert_eq!(view.scroll_offset(), 0.0);
    }

    #[test]
    fn reveal_scrolls_minimally() {
        let mut view = viewport();
        view.set_zoom(4.0);
        view.reveal(60.0);
        assert!((view.time_to_pixel(60.0) - 1000.0).abs() < 1e-9);
        view.reveal(5.0);
        assert!(view.time_to_pixel(5.0).abs() < 1e-9);
    }

    #[test]
    fn resize_revalidates_scroll() {
        let mut view = viewport();
        view.set_zoom(2.0);
        view.set_scroll(1000.0);
        view.resize(400.0);
        assert_eq!(view.scroll_offset(), 400.0);
    }

    #[test]
    fn empty_timeline_maps_everything_to_zero() {
        let view = TimelineViewport::new(800.0, 0.0);
        assert_eq!(view.pixels_per_second(), 0.0);
        assert_eq!(view.pixel_to_time(250.0), 0.0);
    }
}
