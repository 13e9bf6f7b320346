use serde::{Deserialize, Serialize};

use crate::config::TimelineConfig;
use crate::timeline::{clamp_to, snap_to_grid, TimeSpan};

/// Allowed selection sizes, in bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BarCount {
    Two,
    Four,
    #[default]
    Eight,
    Sixteen,
}

impl BarCount {
    pub const ALL: [BarCount; 4] = [BarCount::Two, BarCount::Four, BarCount::Eight, BarCount::Sixteen];

    pub fn bars(self) -> u32 {
        match self {
            BarCount::Two => 2,
            BarCount::Four => 4,
            BarCount::Eight => 8,
            BarCount::Sixteen => 16,
        }
    }

    pub fn from_bars(bars: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|count| count.bars() == bars)
    }
}

/// Bar-quantized window used for focused viewing and as the scoring domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionWindow {
    start: f64,
    bar_count: BarCount,
    bar_seconds: f64,
    total_duration: f64,
}

impl SelectionWindow {
    pub fn new(total_duration: f64, bar_count: BarCount) -> Self {
        Self::with_config(total_duration, bar_count, &TimelineConfig::default())
    }

    pub fn with_config(total_duration: f64, bar_count: BarCount, config: &TimelineConfig) -> Self {
        let total_duration = if total_duration.is_finite() {
            total_duration.max(0.0)
        } else {
            0.0
        };
        Self {
            start: 0.0,
            bar_count,
            bar_seconds: config.bar_seconds.max(0.0),
            total_duration,
        }
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn bar_count(&self) -> BarCount {
        self.bar_count
    }

    /// Window length, never longer than the timeline.
    pub fn duration(&self) -> f64 {
        (self.bar_count.bars() as f64 * self.bar_seconds).min(self.total_duration)
    }

    pub fn span(&self) -> TimeSpan {
        TimeSpan::new(self.start, self.duration())
    }

    fn max_start(&self) -> f64 {
        self.total_duration - self.duration()
    }

    /// Continuous drag update. No snapping.
    pub fn move_to(&mut self, candidate_start: f64) {
        if !candidate_start.is_finite() {
            return;
        }
        self.start = clamp_to(candidate_start, 0.0, self.max_start());
    }

    /// Release step of a drag: snap to the nearest bar boundary.
    pub fn commit_move(&mut self) {
        self.move_to(snap_to_grid(self.start, self.bar_seconds));
    }

    /// Resizes the window, pulling it back if it would run past the end.
    pub fn set_bar_count(&mut self, bar_count: BarCount) {
        self.bar_count = bar_count;
        self.start = clamp_to(self.start, 0.0, self.max_start());
    }

    /// Explicit jump, so no snapping.
    pub fn jump_to_playhead(&mut self, current_time: f64) {
        self.move_to(current_time);
    }

    pub fn set_total_duration(&mut self, total_duration: f64) {
        if !total_duration.is_finite() {
            return;
        }
        self.total_duration = total_duration.max(0.0);
        self.start = clamp_to(self.start, 0.0, self.max_start());
    }
}
