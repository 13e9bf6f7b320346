use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use motion_sync_core::{
    AppConfig, BarCount, ClipPlacement, EditSession, MotionAnalysis, MusicAnalysis, ScoreOutcome, SyncError, TrackView,
    WaveformService,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

fn main() -> motion_sync_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::from_json_path(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Score { edit } => run_score(&edit, config),
        Commands::Waveform { url, nominal_duration } => run_waveform(&url, nominal_duration, config),
        Commands::Overlay {
            edit,
            at,
            width,
            audio,
            zoom,
        } => run_overlay(&edit, at, width, zoom, audio.as_deref(), config),
    }
}

fn run_score(edit: &EditArgs, config: AppConfig) -> motion_sync_core::Result<()> {
    let mut session = edit.build_session(config)?;
    let outcome = session.score();
    match outcome {
        ScoreOutcome::Scored(result) => tracing::info!(score = result.score, "sync score"),
        ScoreOutcome::Unavailable { reason } => {
            tracing::info!(reason = reason.message(), "sync score unavailable")
        }
    }
    print_json(outcome)
}

fn run_waveform(url: &str, nominal_duration: Option<f64>, config: AppConfig) -> motion_sync_core::Result<()> {
    tracing::info!(url, "decoding waveform");
    let service = WaveformService::new(config.waveform);
    let envelope = current_thread()?.block_on(service.try_decode(url))?;
    let envelope = match nominal_duration {
        Some(seconds) => envelope.with_nominal_duration(seconds),
        None => envelope,
    };
    print_json(&envelope)
}

fn run_overlay(
    edit: &EditArgs,
    at: f64,
    width: f64,
    zoom: f64,
    audio: Option<&str>,
    config: AppConfig,
) -> motion_sync_core::Result<()> {
    let mut view = TrackView::mount(width, edit.video_duration, &config);
    view.viewport_mut().set_zoom(zoom);
    view.viewport_mut().reveal(at);
    view.set_nominal_audio_duration(edit.audio_duration);
    if let Some(url) = audio {
        let service = WaveformService::new(config.waveform.clone());
        if let Some(ticket) = view.switch_source(url) {
            let envelope = current_thread()?.block_on(service.decode(url));
            view.apply_waveform(&ticket, envelope);
        }
    }

    let session = edit.build_session(config)?;
    let playhead = view.tick(at, 0.0, false);
    let frame = session.overlay(&view, playhead);
    tracing::info!(
        primitives = frame.primitives.len(),
        active = frame.active_count(),
        "projected overlay"
    );
    print_json(&frame)
}

fn current_thread() -> motion_sync_core::Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread().enable_all().build()?)
}

fn print_json(value: &impl Serialize) -> motion_sync_core::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Score how well a video's motion follows a music clip", long_about = None)]
struct Cli {
    /// JSON file overriding the default timeline, scoring and overlay settings.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute the sync score of a clip placement over a selection.
    Score {
        #[command(flatten)]
        edit: EditArgs,
    },
    /// Decode an audio file or URL into an amplitude envelope.
    Waveform {
        url: String,
        /// Duration reported by the player, if it differs from the decode.
        #[arg(long)]
        nominal_duration: Option<f64>,
    },
    /// Project the overlay primitives visible at one playback position.
    Overlay {
        #[command(flatten)]
        edit: EditArgs,
        /// Playback position in seconds.
        #[arg(long, default_value_t = 0.0)]
        at: f64,
        /// Viewport width in pixels.
        #[arg(long, default_value_t = 1200.0)]
        width: f64,
        /// Zoom factor; the playhead is scrolled into view.
        #[arg(long, default_value_t = 1.0)]
        zoom: f64,
        /// Audio to draw the waveform from.
        #[arg(long)]
        audio: Option<String>,
    },
}

#[derive(Args, Debug)]
struct EditArgs {
    /// Music analysis JSON.
    #[arg(long)]
    music: PathBuf,
    /// Motion analysis JSON.
    #[arg(long)]
    motion: PathBuf,
    /// Video length in seconds.
    #[arg(long)]
    video_duration: f64,
    /// Audio length in seconds.
    #[arg(long)]
    audio_duration: f64,
    /// Where the clip starts on the video timeline.
    #[arg(long, default_value_t = 0.0)]
    clip_start: f64,
    /// Where the clip starts within the audio.
    #[arg(long, default_value_t = 0.0)]
    clip_offset: f64,
    /// Clip length; defaults to the rest of the audio.
    #[arg(long)]
    clip_duration: Option<f64>,
    /// Leave the clip off the timeline.
    #[arg(long)]
    no_clip: bool,
    /// Start of the selection window in seconds.
    #[arg(long, default_value_t = 0.0)]
    selection_start: f64,
    /// Selection length in bars: 2, 4, 8 or 16.
    #[arg(long, default_value_t = 8)]
    bars: u32,
}

impl EditArgs {
    fn build_session(&self, config: AppConfig) -> motion_sync_core::Result<EditSession> {
        let bar_count = BarCount::from_bars(self.bars)
            .ok_or(SyncError::InvalidInput("bar count must be 2, 4, 8 or 16"))?;

        let clip = if self.no_clip {
            None
        } else {
            let duration = self
                .clip_duration
                .unwrap_or(self.audio_duration - self.clip_offset);
            Some(ClipPlacement::from_parts(
                self.video_duration,
                self.audio_duration,
                self.clip_start,
                self.clip_offset,
                duration,
                &config.timeline,
            )?)
        };

        let mut session = EditSession::new(self.video_duration, config);
        session.load_music(MusicAnalysis::from_json_path(&self.music)?);
        session.load_motion(MotionAnalysis::from_json_path(&self.motion)?);
        session.set_clip(clip);
        session.set_bar_count(bar_count);
        session.jump_selection_to(self.selection_start);
        Ok(session)
    }
}
