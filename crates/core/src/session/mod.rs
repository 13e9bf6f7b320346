//! Editing state for one video/audio pairing, and the per-view state that
//! renders it.
//!
//! [`EditSession`] owns the clip, the selection and the event lists, and is
//! the only thing drag handlers mutate. [`TrackView`] owns a viewport, the
//! waveform slot and the playhead smoother of one mounted track view.

use crate::analysis::{MotionAnalysis, MotionKeypoint, MusicAnalysis};
use crate::clip::ClipPlacement;
use crate::config::AppConfig;
use crate::gesture::{hit_test_clip, hit_test_selection, DragSession, Draggable, Handle};
use crate::render::{project, OverlayFrame, OverlayScene, PlayheadSmoother, PlayheadState};
use crate::score::{compute_score, ScoreInput, ScoreOutcome};
use crate::selection::{BarCount, SelectionWindow};
use crate::timeline::TimelineViewport;
use crate::waveform::{AmplitudeEnvelope, WaveformSlot, WaveformTicket};
use crate::{Result, SyncError};

/// Which draggable item a pointer gesture addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragSubject {
    Clip,
    Selection,
}

#[derive(Debug, Clone, Copy)]
struct ActiveDrag {
    subject: DragSubject,
    session: DragSession,
}

#[derive(Debug)]
pub struct EditSession {
    config: AppConfig,
    total_duration: f64,
    music: MusicAnalysis,
    motion: MotionAnalysis,
    clip: Option<ClipPlacement>,
    selection: SelectionWindow,
    drag: Option<ActiveDrag>,
    revision: u64,
    score_cache: Option<(u64, ScoreOutcome)>,
    score_computations: u64,
}

impl EditSession {
    /// Starts a session over a video of `total_duration` seconds.
    pub fn new(total_duration: f64, config: AppConfig) -> Self {
        let selection = SelectionWindow::with_config(total_duration, BarCount::default(), &config.timeline);
        Self {
            config,
            total_duration,
            music: MusicAnalysis::default(),
            motion: MotionAnalysis::default(),
            clip: None,
            selection,
            drag: None,
            revision: 0,
            score_cache: None,
            score_computations: 0,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub fn music(&self) -> &MusicAnalysis {
        &self.music
    }

    pub fn motion(&self) -> &[MotionKeypoint] {
        &self.motion.keypoints
    }

    pub fn clip(&self) -> Option<&ClipPlacement> {
        self.clip.as_ref()
    }

    pub fn selection(&self) -> &SelectionWindow {
        &self.selection
    }

    /// Increases whenever an input of the score changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// What is being dragged and by which handle, for cursor feedback.
    pub fn active_drag(&self) -> Option<(DragSubject, Handle)> {
        self.drag.map(|active| (active.subject, active.session.handle()))
    }

    /// The video or audio was replaced. The clip and the selection are pulled
    /// back inside the new bounds; on error nothing changes.
    pub fn set_media_durations(&mut self, video_duration: f64, audio_duration: f64) -> Result<()> {
        if !video_duration.is_finite() || video_duration < 0.0 {
            return Err(SyncError::InvalidInput("video duration must be finite and non-negative"));
        }
        let clip = match &self.clip {
            Some(clip) => {
                let mut clip = clip.clone();
                clip.set_media_durations(video_duration, audio_duration)?;
                Some(clip)
            }
            None => None,
        };

        let mut selection = self.selection.clone();
        selection.set_total_duration(video_duration);

        if clip != self.clip || selection != self.selection || video_duration != self.total_duration {
            self.drag = None;
            self.clip = clip;
            self.selection = selection;
            self.total_duration = video_duration;
            self.revision += 1;
        }
        Ok(())
    }

    pub fn load_music(&mut self, music: MusicAnalysis) {
        self.music = music;
        self.revision += 1;
    }

    pub fn load_motion(&mut self, motion: MotionAnalysis) {
        self.motion = motion;
        self.revision += 1;
    }

    /// Places a fresh clip of the source audio at the start of the timeline.
    pub fn place_clip(&mut self, source_duration: f64) -> Result<()> {
        let clip = ClipPlacement::with_config(self.total_duration, source_duration, &self.config.timeline)?;
        self.drag = None;
        self.clip = Some(clip);
        self.revision += 1;
        Ok(())
    }

    /// Replaces the clip wholesale, e.g. with one restored from saved state.
    pub fn set_clip(&mut self, clip: Option<ClipPlacement>) {
        if self.clip != clip {
            self.drag = None;
            self.clip = clip;
            self.revision += 1;
        }
    }

    pub fn remove_clip(&mut self) {
        if self.clip.take().is_some() {
            self.drag = None;
            self.revision += 1;
        }
    }

    /// Programmatic "place clip at playhead".
    pub fn place_clip_at(&mut self, time: f64) {
        self.update_clip(|clip| clip.place_at(time));
    }

    pub fn set_bar_count(&mut self, bar_count: BarCount) {
        self.update_selection(|selection| selection.set_bar_count(bar_count));
    }

    pub fn jump_selection_to(&mut self, time: f64) {
        self.update_selection(|selection| selection.jump_to_playhead(time));
    }

    /// Runs `change` on the clip, bumping the revision if it moved.
    pub fn update_clip(&mut self, change: impl FnOnce(&mut ClipPlacement)) {
        if let Some(clip) = self.clip.as_mut() {
            let before = clip.clone();
            change(clip);
            if *clip != before {
                self.revision += 1;
            }
        }
    }

    pub fn update_selection(&mut self, change: impl FnOnce(&mut SelectionWindow)) {
        let before = self.selection.clone();
        change(&mut self.selection);
        if self.selection != before {
            self.revision += 1;
        }
    }

    fn update_subject(&mut self, subject: DragSubject, change: impl FnOnce(&mut dyn Draggable)) {
        match subject {
            DragSubject::Clip => self.update_clip(|clip| change(clip)),
            DragSubject::Selection => self.update_selection(|selection| change(selection)),
        }
    }

    /// Pointer pressed over `subject`. Starts a drag if the pointer is on it.
    /// A drag still open from a lost release is committed first.
    pub fn pointer_down(&mut self, subject: DragSubject, x: f64, viewport: &TimelineViewport) -> bool {
        self.pointer_cancel();

        let started = match subject {
            DragSubject::Clip => self.clip.as_ref().and_then(|clip| {
                hit_test_clip(viewport, clip, x).map(|handle| DragSession::begin(handle, x, viewport, clip))
            }),
            DragSubject::Selection => hit_test_selection(viewport, &self.selection, x)
                .map(|handle| DragSession::begin(handle, x, viewport, &self.selection)),
        };

        self.drag = started.map(|session| ActiveDrag { subject, session });
        self.drag.is_some()
    }

    pub fn pointer_move(&mut self, x: f64, viewport: &TimelineViewport) {
        if let Some(active) = self.drag {
            self.update_subject(active.subject, |target| active.session.update(x, viewport, target));
        }
    }

    /// Pointer released: final position, then the snap/commit step.
    pub fn pointer_up(&mut self, x: f64, viewport: &TimelineViewport) {
        if let Some(active) = self.drag.take() {
            self.update_subject(active.subject, |target| active.session.end(x, viewport, target));
        }
    }

    /// Pointer lost without a release position; the item is committed where
    /// it is.
    pub fn pointer_cancel(&mut self) {
        if let Some(active) = self.drag.take() {
            self.update_subject(active.subject, |target| active.session.abandon(target));
        }
    }

    /// The current sync score, recomputed only if an input changed since the
    /// last call.
    pub fn score(&mut self) -> &ScoreOutcome {
        let revision = self.revision;
        if matches!(&self.score_cache, Some((cached, _)) if *cached != revision) {
            self.score_cache = None;
        }

        let (_, outcome) = self.score_cache.get_or_insert_with(|| {
            self.score_computations += 1;
            let outcome = compute_score(
                &ScoreInput {
                    music: &self.music.keypoints,
                    motion: &self.motion.keypoints,
                    clip: self.clip.as_ref(),
                    selection: self.selection.span(),
                },
                &self.config.scoring,
            );
            (revision, outcome)
        });
        outcome
    }

    /// Number of full score computations performed so far.
    pub fn score_computations(&self) -> u64 {
        self.score_computations
    }

    /// Draw primitives for `view` at the given playback position.
    pub fn overlay(&self, view: &TrackView, playhead: PlayheadState) -> OverlayFrame {
        let scene = OverlayScene {
            viewport: view.viewport(),
            clip: self.clip.as_ref(),
            selection: Some(&self.selection),
            music: &self.music.keypoints,
            motion: &self.motion.keypoints,
            bass: &self.music.bass,
            waveform: view.waveform(),
            playhead,
        };
        project(&scene, &self.config.overlay)
    }
}

/// State of one mounted track view.
#[derive(Debug)]
pub struct TrackView {
    viewport: TimelineViewport,
    waveform: WaveformSlot,
    playhead: PlayheadSmoother,
    nominal_audio_duration: Option<f64>,
    mounted: bool,
}

impl TrackView {
    pub fn mount(viewport_width_px: f64, total_duration: f64, config: &AppConfig) -> Self {
        Self {
            viewport: TimelineViewport::with_config(viewport_width_px, total_duration, &config.timeline),
            waveform: WaveformSlot::new(),
            playhead: PlayheadSmoother::new(&config.overlay),
            nominal_audio_duration: None,
            mounted: true,
        }
    }

    pub fn viewport(&self) -> &TimelineViewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut TimelineViewport {
        &mut self.viewport
    }

    /// Keeps the viewport's timeline length in step with the video.
    pub fn set_video_duration(&mut self, seconds: f64) {
        self.viewport.set_total_duration(seconds);
    }

    pub fn waveform(&self) -> &AmplitudeEnvelope {
        self.waveform.envelope()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Duration the host reports for the audio, used when it disagrees with
    /// the decoded length.
    pub fn set_nominal_audio_duration(&mut self, seconds: f64) {
        self.nominal_audio_duration = Some(seconds);
    }

    /// Switches the audio source. In-flight decodes for the previous source
    /// become stale.
    pub fn switch_source(&mut self, url: &str) -> Option<WaveformTicket> {
        self.mounted.then(|| self.waveform.request(url))
    }

    /// Stores a finished decode if it is still the latest request.
    pub fn apply_waveform(&mut self, ticket: &WaveformTicket, envelope: AmplitudeEnvelope) -> bool {
        if !self.mounted {
            return false;
        }
        let envelope = match self.nominal_audio_duration {
            Some(seconds) => envelope.with_nominal_duration(seconds),
            None => envelope,
        };
        self.waveform.apply(ticket, envelope)
    }

    /// Advances the displayed playhead by one frame.
    pub fn tick(&mut self, current_time: f64, frame_dt: f64, playing: bool) -> PlayheadState {
        let displayed = if playing {
            self.playhead.advance(current_time, frame_dt)
        } else {
            self.playhead.snap(current_time);
            current_time
        };
        PlayheadState {
            time: current_time,
            displayed,
        }
    }

    pub fn unmount(&mut self) {
        self.mounted = false;
        self.waveform.invalidate();
    }
}
