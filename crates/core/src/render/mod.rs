//! Projection of timeline state onto draw primitives.
//!
//! [`project`] is recomputed from scratch whenever any input changes; no draw
//! state is kept between frames. How a surface paints the primitives is up to
//! the host.

mod playhead;

pub use playhead::PlayheadSmoother;

use serde::Serialize;

use crate::analysis::{Band, BassNote, MotionKeypoint, MotionKind, MusicKeypoint};
use crate::clip::ClipPlacement;
use crate::config::OverlayConfig;
use crate::selection::SelectionWindow;
use crate::timeline::{TimeSpan, TimelineViewport};
use crate::waveform::AmplitudeEnvelope;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self { a: a.clamp(0.0, 1.0), ..self }
    }

    /// Blends toward white by `amount`.
    pub fn lighten(self, amount: f32) -> Self {
        let amount = amount.clamp(0.0, 1.0);
        Self {
            r: self.r + (1.0 - self.r) * amount,
            g: self.g + (1.0 - self.g) * amount,
            b: self.b + (1.0 - self.b) * amount,
            a: self.a,
        }
    }
}

const LOW_COLOR: Rgba = Rgba::rgb(0.35, 0.55, 1.0);
const MID_COLOR: Rgba = Rgba::rgb(0.3, 0.85, 0.6);
const HIGH_COLOR: Rgba = Rgba::rgb(1.0, 0.8, 0.3);
const HIT_COLOR: Rgba = Rgba::rgb(1.0, 0.35, 0.35);
const HOLD_COLOR: Rgba = Rgba::rgb(0.85, 0.45, 1.0);
const APPEAR_COLOR: Rgba = Rgba::rgb(0.4, 0.9, 0.95);
const VANISH_COLOR: Rgba = Rgba::rgb(0.6, 0.6, 0.65);
const BASS_COLOR: Rgba = Rgba::rgb(0.2, 0.4, 0.9);
const WAVEFORM_COLOR: Rgba = Rgba::rgb(0.7, 0.7, 0.75);
const CLIP_COLOR: Rgba = Rgba { r: 1.0, g: 1.0, b: 1.0, a: 0.08 };
const SELECTION_COLOR: Rgba = Rgba { r: 1.0, g: 0.85, b: 0.2, a: 0.12 };
const PLAYHEAD_COLOR: Rgba = Rgba::rgb(1.0, 1.0, 1.0);

/// Radius factor and white blend applied to events under the playhead.
const ACTIVE_GROWTH: f32 = 1.35;
const ACTIVE_LIGHTEN: f32 = 0.45;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionLane {
    Hit,
    Hold,
    Appear,
    Vanish,
}

impl From<MotionKind> for MotionLane {
    fn from(kind: MotionKind) -> Self {
        match kind {
            MotionKind::Hit => MotionLane::Hit,
            MotionKind::Hold { .. } => MotionLane::Hold,
            MotionKind::Appear => MotionLane::Appear,
            MotionKind::Vanish => MotionLane::Vanish,
        }
    }
}

/// Horizontal band of the overlay a primitive belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    Waveform,
    Music(Band),
    Bass,
    Motion(MotionLane),
}

impl Lane {
    /// Row below the waveform lane, top to bottom.
    fn row(self) -> usize {
        match self {
            Lane::Waveform => 0,
            Lane::Music(Band::High) => 0,
            Lane::Music(Band::Mid) => 1,
            Lane::Music(Band::Low) => 2,
            Lane::Bass => 3,
            Lane::Motion(MotionLane::Hit) => 4,
            Lane::Motion(MotionLane::Hold) => 5,
            Lane::Motion(MotionLane::Appear) => 6,
            Lane::Motion(MotionLane::Vanish) => 7,
        }
    }

    fn color(self) -> Rgba {
        match self {
            Lane::Waveform => WAVEFORM_COLOR,
            Lane::Music(Band::Low) => LOW_COLOR,
            Lane::Music(Band::Mid) => MID_COLOR,
            Lane::Music(Band::High) => HIGH_COLOR,
            Lane::Bass => BASS_COLOR,
            Lane::Motion(MotionLane::Hit) => HIT_COLOR,
            Lane::Motion(MotionLane::Hold) => HOLD_COLOR,
            Lane::Motion(MotionLane::Appear) => APPEAR_COLOR,
            Lane::Motion(MotionLane::Vanish) => VANISH_COLOR,
        }
    }
}

const EVENT_ROWS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    Clip,
    Selection,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Primitive {
    Region {
        kind: RegionKind,
        x: f32,
        width: f32,
        color: Rgba,
    },
    WaveformColumn {
        x: f32,
        width: f32,
        center_y: f32,
        half_height: f32,
        color: Rgba,
    },
    Marker {
        lane: Lane,
        x: f32,
        y: f32,
        radius: f32,
        color: Rgba,
        active: bool,
    },
    Bar {
        lane: Lane,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Rgba,
        active: bool,
    },
    Playhead {
        x: f32,
        color: Rgba,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OverlayFrame {
    pub width: f32,
    pub height: f32,
    pub primitives: Vec<Primitive>,
}

impl OverlayFrame {
    pub fn active_count(&self) -> usize {
        self.primitives
            .iter()
            .filter(|primitive| match primitive {
                Primitive::Marker { active, .. } | Primitive::Bar { active, .. } => *active,
                _ => false,
            })
            .count()
    }
}

/// Playback position as reported by the player, plus the smoothed value
/// used to draw the playhead line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayheadState {
    pub time: f64,
    pub displayed: f64,
}

impl PlayheadState {
    pub fn at(time: f64) -> Self {
        Self { time, displayed: time }
    }
}

/// Every input of a frame. Music keypoints and bass notes are stamped in
/// source-audio time; motion keypoints in master time.
#[derive(Debug, Clone, Copy)]
pub struct OverlayScene<'a> {
    pub viewport: &'a TimelineViewport,
    pub clip: Option<&'a ClipPlacement>,
    pub selection: Option<&'a SelectionWindow>,
    pub music: &'a [MusicKeypoint],
    pub motion: &'a [MotionKeypoint],
    pub bass: &'a [BassNote],
    pub waveform: &'a AmplitudeEnvelope,
    pub playhead: PlayheadState,
}

impl OverlayScene<'_> {
    /// Master-timeline time of a source-audio time, or `None` when it falls
    /// outside the placed excerpt. Without a clip the audio is the master.
    fn source_to_master(&self, source_time: f64) -> Option<f64> {
        match self.clip {
            Some(clip) if clip.source_span().contains(source_time) => Some(clip.to_master_time(source_time)),
            Some(_) => None,
            None => Some(source_time),
        }
    }

    /// Master-timeline span the audio occupies.
    fn audio_span(&self) -> TimeSpan {
        match self.clip {
            Some(clip) => clip.span(),
            None => TimeSpan::new(0.0, self.waveform.duration()),
        }
    }
}

/// Builds the primitives for one frame.
pub fn project(scene: &OverlayScene<'_>, config: &OverlayConfig) -> OverlayFrame {
    let mut projector = Projector {
        scene,
        config,
        width: scene.viewport.viewport_width_px() as f32,
        primitives: Vec::new(),
    };

    projector.regions();
    projector.waveform();
    projector.bass_notes();
    projector.music_events();
    projector.motion_events();
    projector.playhead();

    OverlayFrame {
        width: projector.width,
        height: config.waveform_height + config.row_height * EVENT_ROWS as f32,
        primitives: projector.primitives,
    }
}

struct Projector<'s, 'a> {
    scene: &'s OverlayScene<'a>,
    config: &'s OverlayConfig,
    width: f32,
    primitives: Vec<Primitive>,
}

impl Projector<'_, '_> {
    fn x(&self, time: f64) -> f32 {
        self.scene.viewport.time_to_pixel(time) as f32
    }

    fn visible(&self, x: f32, width: f32) -> bool {
        x + width >= -self.config.cull_margin_px && x <= self.width + self.config.cull_margin_px
    }

    fn row_y(&self, lane: Lane) -> f32 {
        self.config.waveform_height + self.config.row_height * (lane.row() as f32 + 0.5)
    }

    fn radius(&self, weight: f32) -> f32 {
        let weight = weight.clamp(0.0, 1.0);
        self.config.min_radius + (self.config.max_radius - self.config.min_radius) * weight
    }

    fn opacity(&self, weight: f32) -> f32 {
        let weight = weight.clamp(0.0, 1.0);
        self.config.min_opacity + (1.0 - self.config.min_opacity) * weight
    }

    /// Point events flash from slightly before their time until a little
    /// after it.
    fn point_active(&self, time: f64) -> bool {
        let now = self.scene.playhead.time;
        now >= time - self.config.lead && now <= time + self.config.lag
    }

    /// Sustained events are active for their own span.
    fn span_active(&self, start: f64, duration: f64) -> bool {
        if duration <= 0.0 {
            return self.point_active(start);
        }
        let now = self.scene.playhead.time;
        now >= start && now <= start + duration
    }

    fn span_region(&mut self, kind: RegionKind, span: TimeSpan, color: Rgba) {
        let x = self.x(span.start);
        let width = self.scene.viewport.duration_to_width(span.duration) as f32;
        if self.visible(x, width) {
            self.primitives.push(Primitive::Region { kind, x, width, color });
        }
    }

    fn regions(&mut self) {
        if let Some(selection) = self.scene.selection {
            self.span_region(RegionKind::Selection, selection.span(), SELECTION_COLOR);
        }
        if let Some(clip) = self.scene.clip {
            self.span_region(RegionKind::Clip, clip.span(), CLIP_COLOR);
        }
    }

    fn waveform(&mut self) {
        let envelope = self.scene.waveform;
        if envelope.is_empty() {
            return;
        }
        let span = self.scene.audio_span();
        let column = self.config.waveform_column_px.max(1.0) as f64;
        let viewport = self.scene.viewport;

        let mut x = viewport.time_to_pixel(span.start).max(0.0);
        let end = viewport.time_to_pixel(span.end()).min(viewport.viewport_width_px());
        let center_y = self.config.waveform_height * 0.5;

        while x < end {
            let right = (x + column).min(end);
            let from = viewport.pixel_to_time(x);
            let to = viewport.pixel_to_time(right);
            let (from, to) = match self.scene.clip {
                Some(clip) => (clip.to_source_time(from), clip.to_source_time(to)),
                None => (from, to),
            };
            let peak = envelope.peak_between(from, to).min(1.0);
            if peak > 0.0 {
                self.primitives.push(Primitive::WaveformColumn {
                    x: x as f32,
                    width: (right - x) as f32,
                    center_y,
                    half_height: peak * center_y,
                    color: WAVEFORM_COLOR,
                });
            }
            x = right;
        }
    }

    fn bass_notes(&mut self) {
        for note in self.scene.bass {
            let Some(time) = self.scene.source_to_master(note.time) else {
                continue;
            };
            let x = self.x(time);
            let width = (self.scene.viewport.duration_to_width(note.duration) as f32).max(1.0);
            if !self.visible(x, width) {
                continue;
            }
            let active = self.span_active(time, note.duration);
            self.bar(Lane::Bass, x, width, note.energy, active);
        }
    }

    fn music_events(&mut self) {
        for event in self.scene.music {
            let Some(time) = self.scene.source_to_master(event.time) else {
                continue;
            };
            let active = self.point_active(time);
            self.marker(Lane::Music(event.band), time, event.intensity, active);
        }
    }

    fn motion_events(&mut self) {
        for event in self.scene.motion {
            let lane = Lane::Motion(event.kind.into());
            match event.kind {
                MotionKind::Hold { duration } => {
                    let x = self.x(event.time);
                    let width = (self.scene.viewport.duration_to_width(duration) as f32).max(1.0);
                    if self.visible(x, width) {
                        let active = self.span_active(event.time, duration);
                        self.bar(lane, x, width, event.intensity, active);
                    }
                }
                MotionKind::Hit | MotionKind::Appear | MotionKind::Vanish => {
                    let active = self.point_active(event.time);
                    self.marker(lane, event.time, event.intensity, active);
                }
            }
        }
    }

    fn marker(&mut self, lane: Lane, time: f64, weight: f32, active: bool) {
        let x = self.x(time);
        if !self.visible(x, 0.0) {
            return;
        }
        let mut radius = self.radius(weight);
        let mut color = lane.color().with_alpha(self.opacity(weight));
        if active {
            radius *= ACTIVE_GROWTH;
            color = color.lighten(ACTIVE_LIGHTEN).with_alpha(1.0);
        }
        self.primitives.push(Primitive::Marker {
            lane,
            x,
            y: self.row_y(lane),
            radius,
            color,
            active,
        });
    }

    fn bar(&mut self, lane: Lane, x: f32, width: f32, weight: f32, active: bool) {
        let height = self.config.row_height * (0.4 + 0.5 * weight.clamp(0.0, 1.0));
        let mut color = lane.color().with_alpha(self.opacity(weight));
        if active {
            color = color.lighten(ACTIVE_LIGHTEN).with_alpha(1.0);
        }
        self.primitives.push(Primitive::Bar {
            lane,
            x,
            y: self.row_y(lane) - height * 0.5,
            width,
            height,
            color,
            active,
        });
    }

    fn playhead(&mut self) {
        let x = self.x(self.scene.playhead.displayed);
        if self.visible(x, 0.0) {
            self.primitives.push(Primitive::Playhead { x, color: PLAYHEAD_COLOR });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimelineConfig;
    use crate::selection::BarCount;

    struct Fixture {
        viewport: TimelineViewport,
        clip: ClipPlacement,
        selection: SelectionWindow,
        music: Vec<MusicKeypoint>,
        motion: Vec<MotionKeypoint>,
        bass: Vec<BassNote>,
        waveform: AmplitudeEnvelope,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                // 10 px per second
                viewport: TimelineViewport::new(600.0, 60.0),
                clip: ClipPlacement::from_parts(60.0, 30.0, 10.0, 5.0, 8.0, &TimelineConfig::default()).unwrap(),
                selection: SelectionWindow::new(60.0, BarCount::Two),
                music: vec![
                    MusicKeypoint::new(4.0, Band::High, 1.0),
                    MusicKeypoint::new(6.0, Band::Low, 0.0),
                    MusicKeypoint::new(9.0, Band::Mid, 0.5),
                ],
                motion: vec![
                    MotionKeypoint::new(11.0, MotionKind::Hit, 1.0),
                    MotionKeypoint::new(13.0, MotionKind::Hold { duration: 2.0 }, 0.5),
                ],
                bass: vec![BassNote {
                    time: 7.0,
                    duration: 1.0,
                    pitch: Some(40.0),
                    energy: 0.8,
                }],
                waveform: AmplitudeEnvelope::from_peaks(vec![0.5; 300], 30.0),
            }
        }

        fn frame(&self, playhead: f64) -> OverlayFrame {
            let scene = OverlayScene {
                viewport: &self.viewport,
                clip: Some(&self.clip),
                selection: Some(&self.selection),
                music: &self.music,
                motion: &self.motion,
                bass: &self.bass,
                waveform: &self.waveform,
                playhead: PlayheadState::at(playhead),
            };
            project(&scene, &OverlayConfig::default())
        }
    }

    fn markers(frame: &OverlayFrame) -> Vec<(Lane, f32, f32, bool)> {
        frame
            .primitives
            .iter()
            .filter_map(|primitive| match primitive {
                Primitive::Marker { lane, x, radius, active, .. } => Some((*lane, *x, *radius, *active)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn music_events_are_shifted_into_master_time() {
        let frame = Fixture::new().frame(0.0);
        let music: Vec<_> = markers(&frame)
            .into_iter()
            .filter(|(lane, ..)| matches!(lane, Lane::Music(_)))
            .collect();

        // 4.0 lies before the excerpt; 6.0 -> 11.0 and 9.0 -> 14.0
        assert_eq!(music.len(), 2);
        assert_eq!(music[0].0, Lane::Music(Band::Low));
        assert!((music[0].1 - 110.0).abs() < 1e-4);
        assert!((music[1].1 - 140.0).abs() < 1e-4);
    }

    #[test]
    fn visual_weight_grows_with_intensity() {
        let frame = Fixture::new().frame(0.0);
        let music = markers(&frame);
        let quiet = music.iter().find(|m| m.0 == Lane::Music(Band::Low)).unwrap();
        let medium = music.iter().find(|m| m.0 == Lane::Music(Band::Mid)).unwrap();
        assert_eq!(quiet.2, OverlayConfig::default().min_radius);
        assert!(medium.2 > quiet.2);
    }

    #[test]
    fn events_flash_around_the_playhead() {
        let fixture = Fixture::new();

        let before = fixture.frame(10.9);
        assert_eq!(before.active_count(), 0);

        let hit = fixture.frame(11.1);
        let active: Vec<_> = markers(&hit).into_iter().filter(|m| m.3).collect();
        assert_eq!(active.len(), 2);
        assert!(active.iter().any(|m| m.0 == Lane::Motion(MotionLane::Hit)));

        let hold = fixture.frame(14.5);
        assert!(hold.primitives.iter().any(|primitive| matches!(
            primitive,
            Primitive::Bar { lane: Lane::Motion(MotionLane::Hold), active: true, .. }
        )));

        assert_eq!(fixture.frame(11.2).active_count(), 0);
    }

    #[test]
    fn waveform_columns_cover_only_the_clip() {
        let frame = Fixture::new().frame(0.0);
        let columns: Vec<_> = frame
            .primitives
            .iter()
            .filter_map(|primitive| match primitive {
                Primitive::WaveformColumn { x, width, half_height, .. } => Some((*x, *width, *half_height)),
                _ => None,
            })
            .collect();

        assert_eq!(columns.len(), 40);
        assert!((columns[0].0 - 100.0).abs() < 1e-4);
        let (last_x, last_width, _) = columns[columns.len() - 1];
        assert!((last_x + last_width - 180.0).abs() < 1e-3);
        assert!(columns.iter().all(|c| (c.2 - 12.0).abs() < 1e-4));
    }

    #[test]
    fn offscreen_events_are_culled() {
        let mut fixture = Fixture::new();
        fixture.viewport.set_zoom(8.0);
        fixture.viewport.set_scroll(2_400.0);

        let frame = fixture.frame(0.0);
        assert!(markers(&frame).is_empty());
        assert!(!frame.primitives.iter().any(|p| matches!(p, Primitive::Playhead { .. })));
    }

    #[test]
    fn bass_notes_render_as_bars_in_master_time() {
        let frame = Fixture::new().frame(12.5);
        let bass = frame
            .primitives
            .iter()
            .find_map(|primitive| match primitive {
                Primitive::Bar { lane: Lane::Bass, x, width, active, .. } => Some((*x, *width, *active)),
                _ => None,
            })
            .unwrap();

        assert!((bass.0 - 120.0).abs() < 1e-4);
        assert!((bass.1 - 10.0).abs() < 1e-4);
        assert!(bass.2);
    }

    #[test]
    fn missing_waveform_renders_nothing_for_it() {
        let mut fixture = Fixture::new();
        fixture.waveform = AmplitudeEnvelope::empty();
        let frame = fixture.frame(0.0);
        assert!(!frame
            .primitives
            .iter()
            .any(|p| matches!(p, Primitive::WaveformColumn { .. })));
        assert!(frame.primitives.iter().any(|p| matches!(p, Primitive::Playhead { .. })));
    }
}
