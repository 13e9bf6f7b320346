//! Core library for the motion/music sync editor.
//!
//! A video's motion events are compared against the rhythmic events of an
//! audio clip placed on the video's timeline. Each module owns one piece of
//! that: the zoomable timeline, clip placement and trimming, the bar-aligned
//! selection, pointer gestures, waveform decoding, the overlay projection and
//! the sync score. [`session`] ties them together for a single editor.

pub mod analysis;
pub mod clip;
pub mod config;
pub mod error;
pub mod gesture;
pub mod render;
pub mod score;
pub mod selection;
pub mod session;
pub mod timeline;
pub mod waveform;

pub use analysis::{Band, BassNote, MotionAnalysis, MotionKeypoint, MotionKind, MusicAnalysis, MusicKeypoint};
pub use clip::ClipPlacement;
pub use config::{AppConfig, OverlayConfig, ScoringConfig, ScoringMode, TimelineConfig, WaveformConfig};
pub use error::{Result, SyncError};
pub use gesture::{DragSession, Draggable, Handle};
pub use render::{project, OverlayFrame, OverlayScene, PlayheadSmoother, PlayheadState, Primitive};
pub use score::{compute_score, MatchingScoreResult, ScoreInput, ScoreOutcome, UnavailableReason, WeakWindow};
pub use selection::{BarCount, SelectionWindow};
pub use session::{DragSubject, EditSession, TrackView};
pub use timeline::{TimeSpan, TimelineViewport};
pub use waveform::{AmplitudeEnvelope, WaveformService, WaveformSlot, WaveformTicket};
