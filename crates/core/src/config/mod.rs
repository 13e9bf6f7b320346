use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level configuration structure for the editor core.
///
/// Every section falls back to its defaults, so a partial JSON document only
/// needs to name the values it overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub timeline: TimelineConfig,
    pub scoring: ScoringConfig,
    pub waveform: WaveformConfig,
    pub overlay: OverlayConfig,
}

impl AppConfig {
    /// Loads a configuration document from a JSON file.
    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Zoom limits and the musical grid shared by clip and selection placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Factor applied by one zoom-in step (and divided out by one zoom-out).
    pub zoom_step: f64,
    pub bar_seconds: f64,
    pub min_clip_duration: f64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            min_zoom: 1.0,
            max_zoom: 32.0,
            zoom_step: 1.35,
            bar_seconds: 4.0,
            min_clip_duration: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    /// Nearest-neighbour Gaussian matching with a windowed weak-spot penalty.
    #[default]
    Gaussian,
    /// Motion-to-music weighted coverage with linear decay.
    Coverage,
}

/// Logistic curve optionally applied to the coverage metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SigmoidConfig {
    pub k: f64,
    pub x0: f64,
}

impl Default for SigmoidConfig {
    fn default() -> Self {
        Self { k: 12.0, x0: 0.55 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub mode: ScoringMode,
    /// Gaussian falloff width in seconds.
    pub sigma: f64,
    /// Matches further apart than this contribute nothing.
    pub tau: f64,
    pub window: f64,
    pub step: f64,
    pub penalty_weight: f64,
    pub coverage_tau: f64,
    pub sigmoid: Option<SigmoidConfig>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            mode: ScoringMode::Gaussian,
            sigma: 0.1,
            tau: 0.22,
            window: 6.0,
            step: 3.0,
            penalty_weight: 0.3,
            coverage_tau: 0.3,
            sigmoid: Some(SigmoidConfig::default()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveformConfig {
    pub buckets_per_second: u32,
    /// Upper bound on the body size accepted from a remote source.
    pub max_fetch_bytes: u64,
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            buckets_per_second: 70,
            max_fetch_bytes: 256 * 1024 * 1024,
        }
    }
}

/// Geometry and timing of the event overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Seconds before an event at which it starts flashing.
    pub lead: f64,
    /// Seconds after an event during which it keeps flashing.
    pub lag: f64,
    /// Exponential approach rate of the displayed playhead, per second.
    pub playhead_smoothing: f64,
    /// Jumps larger than this are treated as seeks and not smoothed.
    pub seek_snap_seconds: f64,
    pub min_radius: f32,
    pub max_radius: f32,
    pub min_opacity: f32,
    pub row_height: f32,
    pub waveform_height: f32,
    pub waveform_column_px: f32,
    /// Horizontal slack for culling primitives just outside the viewport.
    pub cull_margin_px: f32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            lead: 0.03,
            lag: 0.15,
            playhead_smoothing: 18.0,
            seek_snap_seconds: 1.0,
            min_radius: 2.0,
            max_radius: 7.0,
            min_opacity: 0.35,
            row_height: 14.0,
            waveform_height: 48.0,
            waveform_column_px: 2.0,
            cull_margin_px: 16.0,
        }
    }
}
