//! Keypoint data model and loaders for the analysis pipeline's JSON output.
//!
//! Music keypoints are stamped in source-audio time, motion keypoints in
//! master (video) time. Both lists are immutable once loaded and are kept
//! sorted by time so every consumer traverses them in the same order.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{Result, SyncError};

/// Frequency band a music keypoint was detected in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Low,
    Mid,
    High,
}

impl Band {
    /// Maps the band names used by the analysis pipeline. Unknown names fall
    /// back to the mid band.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "low" => Band::Low,
            "high" => Band::High,
            _ => Band::Mid,
        }
    }
}

/// The discrete gesture a motion keypoint represents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MotionKind {
    Hit,
    Hold { duration: f64 },
    Appear,
    Vanish,
}

/// Every event kind that participates in matching.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventKind {
    Music(Band),
    Motion(MotionKind),
}

impl EventKind {
    /// Fixed matching weight of the kind.
    pub fn weight(&self) -> f64 {
        match self {
            EventKind::Music(Band::Low) => 0.6,
            EventKind::Music(Band::Mid) => 0.8,
            EventKind::Music(Band::High) => 1.0,
            EventKind::Motion(MotionKind::Hit) => 1.0,
            EventKind::Motion(MotionKind::Hold { .. }) => 0.7,
            EventKind::Motion(MotionKind::Appear) => 0.8,
            EventKind::Motion(MotionKind::Vanish) => 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MusicKeypoint {
    pub time: f64,
    pub band: Band,
    pub intensity: f32,
}

impl MusicKeypoint {
    pub fn new(time: f64, band: Band, intensity: f32) -> Self {
        Self {
            time,
            band,
            intensity: clamp_unit(intensity),
        }
    }

    pub fn kind(&self) -> EventKind {
        EventKind::Music(self.band)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionKeypoint {
    pub time: f64,
    #[serde(flatten)]
    pub kind: MotionKind,
    pub intensity: f32,
}

impl MotionKeypoint {
    pub fn new(time: f64, kind: MotionKind, intensity: f32) -> Self {
        Self {
            time,
            kind,
            intensity: clamp_unit(intensity),
        }
    }
}

/// A sustained bass note, stamped in source-audio time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BassNote {
    pub time: f64,
    pub duration: f64,
    /// MIDI pitch at the note centre, when the tracker found one.
    pub pitch: Option<f64>,
    /// Peak energy in `[0, 1]`, used as the note's visual weight.
    pub energy: f32,
}

/// Music side of an analysis: per-band keypoints and optional bass notes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MusicAnalysis {
    pub keypoints: Vec<MusicKeypoint>,
    pub bass: Vec<BassNote>,
    pub duration: Option<f64>,
}

impl MusicAnalysis {
    pub fn new(mut keypoints: Vec<MusicKeypoint>, mut bass: Vec<BassNote>) -> Self {
        keypoints.sort_by(|a, b| a.time.total_cmp(&b.time));
        bass.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self {
            keypoints,
            bass,
            duration: None,
        }
    }

    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    /// Parses either the per-band (`keypoints_by_band`) or the flat
    /// (`keypoints`) document layout. The per-band layout wins when present.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let document: RawMusicDocument = parse_document(raw)?;

        let keypoints = match document.keypoints_by_band {
            Some(bands) => [
                (Band::Low, bands.low),
                (Band::Mid, bands.mid),
                (Band::High, bands.high),
            ]
            .into_iter()
            .flat_map(|(band, points)| {
                points
                    .into_iter()
                    .map(move |point| MusicKeypoint::new(point.time(), band, point.intensity()))
            })
            .collect(),
            None => document
                .keypoints
                .into_iter()
                .map(|point| {
                    let band = point
                        .band
                        .as_deref()
                        .or(point.frequency.as_deref())
                        .map(Band::from_name)
                        .unwrap_or(Band::Mid);
                    MusicKeypoint::new(point.time(), band, point.intensity())
                })
                .collect(),
        };

        let bass = document
            .bass
            .map(|bass| bass.notes.into_iter().map(RawBassNote::into_note).collect())
            .unwrap_or_default();

        let mut analysis = Self::new(keypoints, bass);
        analysis.duration = document.duration_sec;
        tracing::debug!(
            keypoints = analysis.keypoints.len(),
            bass_notes = analysis.bass.len(),
            "loaded music analysis"
        );
        Ok(analysis)
    }
}

/// Motion side of an analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionAnalysis {
    pub keypoints: Vec<MotionKeypoint>,
}

impl MotionAnalysis {
    pub fn new(mut keypoints: Vec<MotionKeypoint>) -> Self {
        keypoints.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { keypoints }
    }

    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    /// Parses the `events` array of a motion document. Events of an unknown
    /// kind are skipped.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let document: RawMotionDocument = parse_document(raw)?;
        let mut skipped = 0usize;

        let keypoints = document
            .events
            .into_iter()
            .filter_map(|event| {
                let keypoint = event.into_keypoint();
                if keypoint.is_none() {
                    skipped += 1;
                }
                keypoint
            })
            .collect::<Vec<_>>();

        if skipped > 0 {
            tracing::debug!(skipped, "ignored motion events of unknown kind");
        }

        Ok(Self::new(keypoints))
    }
}

/// Analysis documents are JSON objects. Serde would otherwise accept a bare
/// array for these all-default structs and load it as an empty analysis.
fn parse_document<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    if !value.is_object() {
        return Err(SyncError::InvalidInput("analysis document must be a JSON object"));
    }
    Ok(serde_json::from_value(value)?)
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[derive(Debug, Deserialize)]
struct RawMusicDocument {
    #[serde(default)]
    keypoints_by_band: Option<RawBands>,
    #[serde(default)]
    keypoints: Vec<RawMusicPoint>,
    #[serde(default)]
    bass: Option<RawBass>,
    #[serde(default)]
    duration_sec: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawBands {
    low: Vec<RawMusicPoint>,
    mid: Vec<RawMusicPoint>,
    high: Vec<RawMusicPoint>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMusicPoint {
    t: Option<f64>,
    time: Option<f64>,
    band: Option<String>,
    frequency: Option<String>,
    intensity: Option<f32>,
    score: Option<f32>,
}

impl RawMusicPoint {
    fn time(&self) -> f64 {
        self.t.or(self.time).unwrap_or(0.0)
    }

    fn intensity(&self) -> f32 {
        self.intensity.or(self.score).unwrap_or(1.0)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawBass {
    notes: Vec<RawBassNote>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawBassNote {
    start: f64,
    end: Option<f64>,
    duration: Option<f64>,
    pitch_center: Option<f64>,
    energy_peak: Option<f32>,
}

impl RawBassNote {
    fn into_note(self) -> BassNote {
        let duration = self
            .duration
            .or(self.end.map(|end| end - self.start))
            .unwrap_or(0.0)
            .max(0.0);
        BassNote {
            time: self.start,
            duration,
            pitch: self.pitch_center,
            energy: clamp_unit(self.energy_peak.unwrap_or(1.0)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawMotionDocument {
    #[serde(default)]
    events: Vec<RawMotionEvent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMotionEvent {
    #[serde(rename = "type")]
    event_type: Option<String>,
    kind: Option<String>,
    t: Option<f64>,
    time: Option<f64>,
    t_start: Option<f64>,
    start: Option<f64>,
    t_end: Option<f64>,
    end: Option<f64>,
    duration: Option<f64>,
    hold_duration: Option<f64>,
    intensity: Option<f32>,
    score: Option<f32>,
}

impl RawMotionEvent {
    fn into_keypoint(self) -> Option<MotionKeypoint> {
        let name = self.event_type.as_deref().or(self.kind.as_deref())?;
        let point_time = self.t.or(self.time).unwrap_or(0.0);

        let (time, kind) = match name.to_ascii_lowercase().as_str() {
            "hit" => (point_time, MotionKind::Hit),
            "appear" => (point_time, MotionKind::Appear),
            "vanish" => (point_time, MotionKind::Vanish),
            "hold" => {
                let start = self.t_start.or(self.start).or(self.t).or(self.time).unwrap_or(0.0);
                let duration = self
                    .hold_duration
                    .or(self.duration)
                    .or(self.t_end.or(self.end).map(|end| end - start))
                    .unwrap_or(0.0)
                    .max(0.0);
                (start, MotionKind::Hold { duration })
            }
            _ => return None,
        };

        let intensity = self.intensity.or(self.score).unwrap_or(1.0);
        Some(MotionKeypoint::new(time, kind, intensity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_follow_event_kind() {
        assert_eq!(EventKind::Music(Band::Low).weight(), 0.6);
        assert_eq!(EventKind::Music(Band::High).weight(), 1.0);
        assert_eq!(
            EventKind::Motion(MotionKind::Hold { duration: 1.0 }).weight(),
            0.7
        );
        assert_eq!(EventKind::Motion(MotionKind::Vanish).weight(), 0.8);
    }

    #[test]
    fn loads_per_band_music_documents_sorted() {
        let raw = r#"{
            "duration_sec": 30.0,
            "keypoints_by_band": {
                "low": [{"time": 2.0, "score": 0.4}],
                "high": [{"time": 0.5, "score": 0.9}, {"t": 1.5}]
            },
            "bass": {"notes": [{"start": 1.0, "end": 1.75, "pitch_center": 40.2, "energy_peak": 0.6}]}
        }"#;

        let music = MusicAnalysis::from_json_str(raw).unwrap();
        let times: Vec<f64> = music.keypoints.iter().map(|k| k.time).collect();

        assert_eq!(times, vec![0.5, 1.5, 2.0]);
        assert_eq!(music.keypoints[0].band, Band::High);
        assert_eq!(music.keypoints[1].intensity, 1.0);
        assert_eq!(music.keypoints[2].band, Band::Low);
        assert_eq!(music.duration, Some(30.0));
        assert_eq!(music.bass.len(), 1);
        assert!((music.bass[0].duration - 0.75).abs() < 1e-9);
        assert_eq!(music.bass[0].pitch, Some(40.2));
    }

    #[test]
    fn loads_flat_music_documents_with_band_aliases() {
        let raw = r#"{"keypoints": [
            {"t": 1.0, "frequency": "low"},
            {"time": 0.25, "band": "HIGH", "intensity": 3.0},
            {"t": 2.0}
        ]}"#;

        let music = MusicAnalysis::from_json_str(raw).unwrap();

        assert_eq!(music.keypoints[0].band, Band::High);
        assert_eq!(music.keypoints[0].intensity, 1.0);
        assert_eq!(music.keypoints[1].band, Band::Low);
        assert_eq!(music.keypoints[2].band, Band::Mid);
    }

    #[test]
    fn loads_motion_events_including_holds() {
        let raw = r#"{"events": [
            {"type": "hold", "t_start": 3.0, "t_end": 4.5},
            {"type": "hit", "t": 1.0},
            {"kind": "appear", "time": 2.0, "intensity": 0.5},
            {"type": "spin", "t": 0.2}
        ]}"#;

        let motion = MotionAnalysis::from_json_str(raw).unwrap();

        assert_eq!(motion.keypoints.len(), 3);
        assert_eq!(motion.keypoints[0].kind, MotionKind::Hit);
        assert_eq!(motion.keypoints[1].kind, MotionKind::Appear);
        assert_eq!(motion.keypoints[1].intensity, 0.5);
        assert_eq!(motion.keypoints[2].time, 3.0);
        assert_eq!(motion.keypoints[2].kind, MotionKind::Hold { duration: 1.5 });
    }

    #[test]
    fn motion_keypoints_round_trip_through_serde() {
        let keypoint = MotionKeypoint::new(1.0, MotionKind::Hold { duration: 0.5 }, 0.8);
        let json = serde_json::to_value(keypoint).unwrap();

        assert_eq!(json["kind"], "hold");
        assert_eq!(json["duration"], 0.5);
        let back: MotionKeypoint = serde_json::from_value(json).unwrap();
        assert_eq!(back, keypoint);
    }

    #[test]
    fn malformed_documents_error() {
        assert!(matches!(MotionAnalysis::from_json_str("{\"events\": "), Err(SyncError::Json(_))));
        assert!(matches!(MusicAnalysis::from_json_str("{\"keypoints\": 3}"), Err(SyncError::Json(_))));
    }

    #[test]
    fn documents_must_be_objects() {
        assert!(matches!(MotionAnalysis::from_json_str("[]"), Err(SyncError::InvalidInput(_))));
        assert!(matches!(MusicAnalysis::from_json_str("[]"), Err(SyncError::InvalidInput(_))));
        assert!(MotionAnalysis::from_json_str("{}").unwrap().keypoints.is_empty());
    }
}
