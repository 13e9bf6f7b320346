//! Sync score between music and motion keypoints.
//!
//! Pure and synchronous: every call builds a fresh result from its inputs.
//! Events are traversed in time order (stable for equal times), so equal
//! distances always resolve the same way.

use serde::{Deserialize, Serialize};

use crate::analysis::{EventKind, MotionKeypoint, MotionKind, MusicKeypoint};
use crate::clip::ClipPlacement;
use crate::config::{ScoringConfig, ScoringMode, SigmoidConfig};
use crate::timeline::TimeSpan;

/// Why no score could be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnavailableReason {
    NoClip,
    NoMusicEvents,
    NoMotionEvents,
    InsufficientWindowData,
}

impl UnavailableReason {
    /// Explanation suitable for showing in place of a number.
    pub fn message(&self) -> &'static str {
        match self {
            UnavailableReason::NoClip => "place an audio clip on the timeline to score it",
            UnavailableReason::NoMusicEvents => "no music keypoints fall inside the selection",
            UnavailableReason::NoMotionEvents => "no motion keypoints fall inside the selection",
            UnavailableReason::InsufficientWindowData => "the selection window is empty",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeakWindow {
    pub window_start: f64,
    pub window_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingScoreResult {
    /// Final score in `[0, 100]`.
    pub score: u32,
    pub base_score: f64,
    pub penalty: f64,
    /// Lowest-scoring windows, weakest first.
    pub weak_windows: Vec<WeakWindow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScoreOutcome {
    Scored(MatchingScoreResult),
    Unavailable { reason: UnavailableReason },
}

impl ScoreOutcome {
    pub fn result(&self) -> Option<&MatchingScoreResult> {
        match self {
            ScoreOutcome::Scored(result) => Some(result),
            ScoreOutcome::Unavailable { .. } => None,
        }
    }

    pub fn score(&self) -> Option<u32> {
        self.result().map(|result| result.score)
    }

    fn unavailable(reason: UnavailableReason) -> Self {
        ScoreOutcome::Unavailable { reason }
    }
}

/// Everything one score calculation reads.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInput<'a> {
    pub music: &'a [MusicKeypoint],
    pub motion: &'a [MotionKeypoint],
    pub clip: Option<&'a ClipPlacement>,
    pub selection: TimeSpan,
}

/// An event reduced to what matching needs, in master-timeline time.
#[derive(Debug, Clone, Copy, PartialEq)]
struct TimedWeight {
    time: f64,
    weight: f64,
}

pub fn compute_score(input: &ScoreInput<'_>, config: &ScoringConfig) -> ScoreOutcome {
    let Some(clip) = input.clip else {
        return ScoreOutcome::unavailable(UnavailableReason::NoClip);
    };
    if input.selection.is_empty() {
        return ScoreOutcome::unavailable(UnavailableReason::InsufficientWindowData);
    }

    let music = music_in_selection(input.music, clip, input.selection);
    if music.is_empty() {
        return ScoreOutcome::unavailable(UnavailableReason::NoMusicEvents);
    }
    let weight = match config.mode {
        ScoringMode::Gaussian => matching_weight,
        ScoringMode::Coverage => coverage_weight,
    };
    let motion = motion_in_selection(input.motion, input.selection, weight);
    if motion.is_empty() {
        return ScoreOutcome::unavailable(UnavailableReason::NoMotionEvents);
    }

    let result = match config.mode {
        ScoringMode::Gaussian => gaussian_score(&music, &motion, config),
        ScoringMode::Coverage => coverage_score(&music, &motion, config),
    };
    tracing::debug!(
        score = result.score,
        base = result.base_score,
        penalty = result.penalty,
        music = music.len(),
        motion = motion.len(),
        "computed sync score"
    );
    ScoreOutcome::Scored(result)
}

/// Music keypoints inside the clip's excerpt, shifted onto the master
/// timeline and restricted to the selection.
fn music_in_selection(music: &[MusicKeypoint], clip: &ClipPlacement, selection: TimeSpan) -> Vec<TimedWeight> {
    let excerpt = clip.source_span();
    let mut events: Vec<TimedWeight> = music
        .iter()
        .filter(|event| excerpt.contains(event.time))
        .map(|event| TimedWeight {
            time: clip.to_master_time(event.time),
            weight: event.kind().weight(),
        })
        .filter(|event| selection.contains(event.time))
        .collect();
    events.sort_by(|a, b| a.time.total_cmp(&b.time));
    events
}

fn motion_in_selection(
    motion: &[MotionKeypoint],
    selection: TimeSpan,
    weight: fn(MotionKind) -> f64,
) -> Vec<TimedWeight> {
    let mut events: Vec<TimedWeight> = motion
        .iter()
        .filter(|event| selection.contains(event.time))
        .map(|event| TimedWeight {
            time: event.time,
            weight: weight(event.kind),
        })
        .collect();
    events.sort_by(|a, b| a.time.total_cmp(&b.time));
    events
}

fn gaussian(dt: f64, sigma: f64) -> f64 {
    (-(dt * dt) / (2.0 * sigma * sigma)).exp()
}

/// Distance from `time` to the closest candidate; the first of equally
/// close candidates wins.
fn nearest_distance(time: f64, candidates: &[TimedWeight]) -> Option<f64> {
    candidates.iter().fold(None, |best, candidate| {
        let dt = (time - candidate.time).abs();
        match best {
            Some(current) if current <= dt => Some(current),
            _ => Some(dt),
        }
    })
}

/// Weighted Gaussian agreement of every music event with its nearest motion
/// event. Zero when either side is empty.
fn nearest_match(music: &[TimedWeight], motion: &[TimedWeight], sigma: f64, tau: f64) -> f64 {
    if music.is_empty() || motion.is_empty() {
        return 0.0;
    }

    let mut total = 0.0;
    let mut weights = 0.0;
    for event in music {
        weights += event.weight;
        let Some(dt) = nearest_distance(event.time, motion) else {
            continue;
        };
        if dt <= tau {
            total += event.weight * gaussian(dt, sigma);
        }
    }
    total / weights.max(1.0)
}

/// Scores of windows of width `window` stepping by `step` from the first to
/// the last music event.
fn window_scores(music: &[TimedWeight], motion: &[TimedWeight], config: &ScoringConfig) -> Vec<WeakWindow> {
    let (Some(first), Some(last)) = (music.first(), music.last()) else {
        return Vec::new();
    };

    let mut windows = Vec::new();
    let mut start = first.time;
    loop {
        let end = start + config.window;
        let in_window = |event: &&TimedWeight| event.time >= start && event.time < end;
        let music_window: Vec<TimedWeight> = music.iter().filter(in_window).copied().collect();
        let motion_window: Vec<TimedWeight> = motion.iter().filter(in_window).copied().collect();

        windows.push(WeakWindow {
            window_start: start,
            window_score: nearest_match(&music_window, &motion_window, config.sigma, config.tau),
        });

        if config.step <= 0.0 {
            break;
        }
        start += config.step;
        if start > last.time {
            break;
        }
    }
    windows
}

fn gaussian_score(music: &[TimedWeight], motion: &[TimedWeight], config: &ScoringConfig) -> MatchingScoreResult {
    let base_score = nearest_match(music, motion, config.sigma, config.tau);

    let mut weak_windows = window_scores(music, motion, config);
    weak_windows.sort_by(|a, b| a.window_score.total_cmp(&b.window_score));
    weak_windows.truncate(2);

    let penalty = if weak_windows.is_empty() {
        0.0
    } else {
        weak_windows.iter().map(|window| window.window_score).sum::<f64>() / weak_windows.len() as f64
    };

    let raw = (base_score - config.penalty_weight * penalty).max(0.0);
    MatchingScoreResult {
        score: to_percent(raw),
        base_score,
        penalty,
        weak_windows,
    }
}

fn matching_weight(kind: MotionKind) -> f64 {
    EventKind::Motion(kind).weight()
}

/// Motion weights of the coverage metric: holds count a little less, every
/// other kind fully.
fn coverage_weight(kind: MotionKind) -> f64 {
    match kind {
        MotionKind::Hold { .. } => 0.8,
        MotionKind::Hit | MotionKind::Appear | MotionKind::Vanish => 1.0,
    }
}

/// Share of motion weight that lands within `coverage_tau` of some music
/// event, with linear falloff.
fn coverage(motion: &[TimedWeight], music: &[TimedWeight], tau: f64) -> f64 {
    if motion.is_empty() || tau <= 0.0 {
        return 0.0;
    }
    let mut total = 0.0;
    for event in motion {
        let Some(dt) = nearest_distance(event.time, music) else {
            break;
        };
        if dt <= tau {
            total += (1.0 - dt / tau).max(0.0) * event.weight;
        }
    }
    let weights: f64 = motion.iter().map(|event| event.weight).sum();
    if weights > 0.0 {
        total / weights
    } else {
        total
    }
}

fn sigmoid(x: f64, curve: SigmoidConfig) -> f64 {
    1.0 / (1.0 + (-curve.k * (x - curve.x0)).exp())
}

fn coverage_score(music: &[TimedWeight], motion: &[TimedWeight], config: &ScoringConfig) -> MatchingScoreResult {
    let base_score = coverage(motion, music, config.coverage_tau);
    let raw = config.sigmoid.map_or(base_score, |curve| sigmoid(base_score, curve));
    MatchingScoreResult {
        score: to_percent(raw),
        base_score,
        penalty: 0.0,
        weak_windows: Vec::new(),
    }
}

fn to_percent(raw: f64) -> u32 {
    (raw * 100.0).round_ties_even().clamp(0.0, 100.0) as u32
}
