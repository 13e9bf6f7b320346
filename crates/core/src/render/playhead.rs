use crate::config::OverlayConfig;

/// Displayed playhead that approaches the true playback time exponentially,
/// hiding the jitter of coarse time updates. Large jumps (seeks) are taken
/// immediately.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayheadSmoother {
    displayed: Option<f64>,
    rate: f64,
    seek_snap_seconds: f64,
}

impl PlayheadSmoother {
    pub fn new(config: &OverlayConfig) -> Self {
        Self {
            displayed: None,
            rate: config.playhead_smoothing.max(0.0),
            seek_snap_seconds: config.seek_snap_seconds.max(0.0),
        }
    }

    /// Moves the displayed time toward `target` after `dt` seconds of frame
    /// time and returns it.
    pub fn advance(&mut self, target: f64, dt: f64) -> f64 {
        if !target.is_finite() {
            return self.displayed.unwrap_or(0.0);
        }
        let next = match self.displayed {
            Some(current) if (target - current).abs() <= self.seek_snap_seconds && dt.is_finite() => {
                let blend = 1.0 - (-self.rate * dt.max(0.0)).exp();
                current + (target - current) * blend
            }
            _ => target,
        };
        self.displayed = Some(next);
        next
    }

    /// Jumps straight to `target`, e.g. while paused.
    pub fn snap(&mut self, target: f64) {
        if target.is_finite() {
            self.displayed = Some(target);
        }
    }

    pub fn displayed(&self) -> Option<f64> {
        self.displayed
    }
}
