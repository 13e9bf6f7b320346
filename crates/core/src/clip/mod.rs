use serde::{Deserialize, Serialize};

use crate::config::TimelineConfig;
use crate::timeline::{clamp_to, snap_to_grid, TimeSpan};
use crate::{Result, SyncError};

/// Position and trim of an audio excerpt on the master (video) timeline.
///
/// Invariants, held after every operation:
/// `duration >= min_duration`, `start >= 0`, `start + duration <= total`,
/// `source_offset >= 0`, `source_offset + duration <= source`.
///
/// Every mutating operation accepts out-of-range input and clamps it, since a
/// drag gesture is expected to overshoot. Non-finite input is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipPlacement {
    start: f64,
    source_offset: f64,
    duration: f64,
    total_duration: f64,
    source_duration: f64,
    bar_seconds: f64,
    min_duration: f64,
}

impl ClipPlacement {
    /// Places the longest possible excerpt at the start of both timelines.
    pub fn new(total_duration: f64, source_duration: f64) -> Result<Self> {
        Self::with_config(total_duration, source_duration, &TimelineConfig::default())
    }

    pub fn with_config(
        total_duration: f64,
        source_duration: f64,
        config: &TimelineConfig,
    ) -> Result<Self> {
        let min_duration = config.min_clip_duration.max(0.0);
        if !total_duration.is_finite() || !source_duration.is_finite() {
            return Err(SyncError::InvalidInput("media durations must be finite"));
        }
        if total_duration < min_duration || source_duration < min_duration {
            return Err(SyncError::InvalidInput(
                "media is shorter than the minimum clip duration",
            ));
        }

        Ok(Self {
            start: 0.0,
            source_offset: 0.0,
            duration: total_duration.min(source_duration),
            total_duration,
            source_duration,
            bar_seconds: config.bar_seconds,
            min_duration,
        })
    }

    /// Builds a placement from explicit values, clamping them into range.
    pub fn from_parts(
        total_duration: f64,
        source_duration: f64,
        start: f64,
        source_offset: f64,
        duration: f64,
        config: &TimelineConfig,
    ) -> Result<Self> {
        let mut clip = Self::with_config(total_duration, source_duration, config)?;
        clip.source_offset = clamp_to(finite_or(source_offset, 0.0), 0.0, source_duration - clip.min_duration);
        clip.duration = clamp_to(
            finite_or(duration, clip.duration),
            clip.min_duration,
            total_duration.min(source_duration - clip.source_offset),
        );
        clip.start = clamp_to(finite_or(start, 0.0), 0.0, total_duration - clip.duration);
        Ok(clip)
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn source_offset(&self) -> f64 {
        self.source_offset
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub fn source_duration(&self) -> f64 {
        self.source_duration
    }

    pub fn bar_seconds(&self) -> f64 {
        self.bar_seconds
    }

    /// Where the clip sits on the master timeline.
    pub fn span(&self) -> TimeSpan {
        TimeSpan::new(self.start, self.duration)
    }

    /// The excerpt of the source audio the clip plays.
    pub fn source_span(&self) -> TimeSpan {
        TimeSpan::new(self.source_offset, self.duration)
    }

    /// Re-expresses a source-audio time on the master timeline.
    pub fn to_master_time(&self, source_time: f64) -> f64 {
        source_time - self.source_offset + self.start
    }

    pub fn to_source_time(&self, master_time: f64) -> f64 {
        master_time - self.start + self.source_offset
    }

    /// Continuous drag update. No snapping.
    pub fn move_to(&mut self, candidate_start: f64) {
        if !candidate_start.is_finite() {
            return;
        }
        self.start = clamp_to(candidate_start, 0.0, self.total_duration - self.duration);
    }

    /// Release step of a move: snap to the nearest bar, then re-clamp.
    pub fn commit_move(&mut self) {
        let snapped = snap_to_grid(self.start, self.bar_seconds);
        self.move_to(snapped);
    }

    /// Moves the clip's left edge while keeping its end fixed on the master
    /// timeline. The source offset moves by the same amount until it reaches
    /// the start of the source; past that the clip still grows leftwards,
    /// limited by the source length and the timeline start.
    pub fn trim_start(&mut self, candidate_start: f64) {
        if !candidate_start.is_finite() {
            return;
        }
        let end = self.end();
        let delta = (candidate_start - self.start).min(self.duration - self.min_duration);

        let mut duration = (self.duration - delta).max(self.min_duration);
        let source_offset = (self.source_offset + delta).max(0.0);
        if source_offset + duration > self.source_duration {
            duration = self.source_duration - source_offset;
        }

        self.start = (end - duration).max(0.0);
        self.source_offset = source_offset;
        self.duration = end - self.start;
    }

    /// Moves the clip's right edge. Start and source offset are unchanged.
    pub fn trim_end(&mut self, candidate_end: f64) {
        if !candidate_end.is_finite() {
            return;
        }
        let upper = (self.total_duration - self.start).min(self.source_duration - self.source_offset);
        self.duration = clamp_to(candidate_end - self.start, self.min_duration, upper);
    }

    /// Programmatic placement (e.g. at the playhead). Clamped, not snapped.
    pub fn place_at(&mut self, time: f64) {
        self.move_to(time);
    }

    /// Re-establishes the invariants after the video or audio was replaced.
    pub fn set_media_durations(&mut self, total_duration: f64, source_duration: f64) -> Result<()> {
        if !total_duration.is_finite() || !source_duration.is_finite() {
            return Err(SyncError::InvalidInput("media durations must be finite"));
        }
        if total_duration < self.min_duration || source_duration < self.min_duration {
            return Err(SyncError::InvalidInput(
                "media is shorter than the minimum clip duration",
            ));
        }
        self.total_duration = total_duration;
        self.source_duration = source_duration;
        self.source_offset = clamp_to(self.source_offset, 0.0, source_duration - self.min_duration);
        self.duration = clamp_to(
            self.duration,
            self.min_duration,
            total_duration.min(source_duration - self.source_offset),
        );
        self.start = clamp_to(self.start, 0.0, total_duration - self.duration);
        Ok(())
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn clip(start: f64, source_offset: f64, duration: f64) -> ClipPlacement {
        clip_on(60.0, 30.0, start, source_offset, duration)
    }

    fn clip_on(total: f64, source: f64, start: f64, source_offset: f64, duration: f64) -> ClipPlacement {
        ClipPlacement::from_parts(total, source, start, source_offset, duration, &TimelineConfig::default())
            .unwrap()
    }

    fn assert_invariants(clip: &ClipPlacement) {
        assert!(clip.duration() >= 2.0 - EPS, "{clip:?}");
        assert!(clip.start() >= 0.0, "{clip:?}");
        assert!(clip.end() <= clip.total_duration() + EPS, "{clip:?}");
        assert!(clip.source_offset() >= 0.0, "{clip:?}");
        assert!(
            clip.source_offset() + clip.duration() <= clip.source_duration() + EPS,
            "{clip:?}"
        );
    }

    #[test]
    fn new_clip_covers_the_shorter_media() {
        let clip = ClipPlacement::new(60.0, 30.0).unwrap();
        assert_eq!(clip.duration(), 30.0);
        assert_eq!(clip.start(), 0.0);
        assert!(ClipPlacement::new(60.0, 1.5).is_err());
    }

    #[test]
    fn trim_start_preserves_clip_end() {
        let mut clip = clip(10.0, 5.0, 8.0);
        clip.trim_start(12.0);

        assert!((clip.start() - 12.0).abs() < EPS);
        assert!((clip.duration() - 6.0).abs() < EPS);
        assert!((clip.source_offset() - 7.0).abs() < EPS);
        assert!((clip.end() - 18.0).abs() < EPS);
    }

    #[test]
    fn trim_start_stops_at_minimum_duration() {
        let mut clip = clip(10.0, 5.0, 8.0);
        clip.trim_start(100.0);
        assert!((clip.duration() - 2.0).abs() < EPS);
        assert!((clip.source_offset() - 11.0).abs() < EPS);
        assert!((clip.end() - 18.0).abs() < EPS);
        assert_invariants(&clip);
    }

    #[test]
    fn trim_start_overshooting_the_source_start_keeps_growing() {
        let mut clip = clip(10.0, 5.0, 8.0);
        clip.trim_start(3.0);
        assert!((clip.start() - 3.0).abs() < EPS);
        assert_eq!(clip.source_offset(), 0.0);
        assert!((clip.duration() - 15.0).abs() < EPS);
        assert!((clip.end() - 18.0).abs() < EPS);
    }

    #[test]
    fn trim_start_is_bounded_by_source_length_and_timeline_start() {
        let mut clip = clip(10.0, 5.0, 8.0);
        clip.trim_start(-100.0);
        assert_eq!(clip.start(), 0.0);
        assert_eq!(clip.source_offset(), 0.0);
        assert!((clip.end() - 18.0).abs() < EPS);
        assert_invariants(&clip);

        let mut long = clip_on(60.0, 12.0, 40.0, 2.0, 8.0);
        long.trim_start(0.0);
        assert_eq!(long.source_offset(), 0.0);
        assert!((long.duration() - 12.0).abs() < EPS);
        assert!((long.start() - 36.0).abs() < EPS);
        assert!((long.end() - 48.0).abs() < EPS);
    }

    #[test]
    fn trim_end_respects_timeline_and_source() {
        let mut clip = clip(10.0, 5.0, 8.0);
        clip.trim_end(1_000.0);
        assert!((clip.duration() - 25.0).abs() < EPS);
        clip.trim_end(0.0);
        assert!((clip.duration() - 2.0).abs() < EPS);
        assert_eq!(clip.start(), 10.0);
        assert_eq!(clip.source_offset(), 5.0);
    }

    #[test]
    fn move_then_commit_snaps_to_bar() {
        let mut clip = clip(0.0, 0.0, 8.0);
        clip.move_to(9.6);
        assert_eq!(clip.start(), 9.6);
        clip.commit_move();
        assert_eq!(clip.start(), 8.0);
    }

    #[test]
    fn commit_reclamps_after_snapping() {
        let mut clip = clip(0.0, 0.0, 5.0);
        clip.move_to(500.0);
        assert_eq!(clip.start(), 55.0);
        clip.commit_move();
        assert_eq!(clip.start(), 55.0);
    }

    #[test]
    fn operations_are_idempotent() {
        let mut clip = clip(3.0, 2.0, 10.0);
        clip.trim_start(4.5);
        let once = clip.clone();
        clip.trim_start(4.5);
        assert_eq!(clip, once);

        clip.trim_end(20.0);
        let once = clip.clone();
        clip.trim_end(20.0);
        assert_eq!(clip, once);

        clip.commit_move();
        let once = clip.clone();
        clip.commit_move();
        assert_eq!(clip, once);
    }

    #[test]
    fn invariants_hold_across_arbitrary_gestures() {
        let mut clip = clip(10.0, 5.0, 8.0);
        let inputs = [
            -50.0, 0.0, 1.3, 7.7, 13.9, 29.99, 45.0, 59.0, 61.0, 1e6, -1e-3, f64::NAN,
            f64::INFINITY,
        ];

        for (round, value) in inputs.iter().cycle().take(200).enumerate() {
            match round % 5 {
                0 => clip.move_to(*value),
                1 => clip.trim_start(*value),
                2 => clip.trim_end(*value),
                3 => clip.commit_move(),
                _ => clip.place_at(*value * 0.5),
            }
            assert_invariants(&clip);
        }
    }

    #[test]
    fn shrinking_media_restores_invariants() {
        let mut clip = clip(40.0, 20.0, 10.0);
        clip.set_media_durations(45.0, 25.0).unwrap();
        assert_invariants(&clip);
        assert!((clip.duration() - 5.0).abs() < EPS);

        assert!(clip.set_media_durations(1.0, 25.0).is_err());
    }

    #[test]
    fn converts_between_source_and_master_time() {
        let clip = clip(10.0, 5.0, 8.0);
        assert_eq!(clip.to_master_time(6.0), 11.0);
        assert_eq!(clip.to_source_time(11.0), 6.0);
    }
}
