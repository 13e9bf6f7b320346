//! Amplitude envelopes for drawing an audio track's waveform.
//!
//! Decoding is the only asynchronous work in the core. Results are routed
//! through a [`WaveformSlot`], whose generation token guarantees that a slow,
//! superseded decode never overwrites a newer one.

mod decode;

pub use decode::{decode_audio, extension_hint, AudioFetcher, DecodedAudio, SourceFetcher};

use serde::{Deserialize, Serialize};

use crate::config::WaveformConfig;
use crate::{Result, SyncError};

/// Downsampled peak magnitudes of channel 0, one per bucket, covering
/// `[0, duration)` of the source audio.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AmplitudeEnvelope {
    peaks: Vec<f32>,
    decoded_duration: f64,
    nominal_duration: Option<f64>,
}

impl AmplitudeEnvelope {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_peaks(peaks: Vec<f32>, decoded_duration: f64) -> Self {
        Self {
            peaks,
            decoded_duration: decoded_duration.max(0.0),
            nominal_duration: None,
        }
    }

    /// Fixed-stride maximum-magnitude downsampling.
    pub fn from_samples(samples: &[f32], sample_rate: u32, buckets_per_second: u32) -> Self {
        if samples.is_empty() || sample_rate == 0 {
            return Self::empty();
        }
        let stride = (sample_rate as f64 / buckets_per_second.max(1) as f64)
            .round()
            .max(1.0) as usize;
        let peaks = samples
            .chunks(stride)
            .map(|chunk| chunk.iter().fold(0.0f32, |peak, sample| peak.max(sample.abs())))
            .collect();
        Self::from_peaks(peaks, samples.len() as f64 / sample_rate as f64)
    }

    /// Records the duration the rest of the application believes the audio
    /// has. Index scaling uses the longer of the two estimates.
    pub fn with_nominal_duration(mut self, seconds: f64) -> Self {
        if seconds.is_finite() && seconds > 0.0 {
            self.nominal_duration = Some(seconds);
        }
        self
    }

    pub fn peaks(&self) -> &[f32] {
        &self.peaks
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn duration(&self) -> f64 {
        self.nominal_duration
            .map_or(self.decoded_duration, |nominal| nominal.max(self.decoded_duration))
    }

    fn index_of(&self, time: f64) -> f64 {
        let duration = self.duration();
        if duration <= 0.0 {
            return 0.0;
        }
        time / duration * self.peaks.len() as f64
    }

    /// Peak of the bucket containing `time`, if inside the envelope.
    pub fn peak_at(&self, time: f64) -> Option<f32> {
        if time < 0.0 || !time.is_finite() {
            return None;
        }
        self.peaks.get(self.index_of(time).floor() as usize).copied()
    }

    /// Largest peak over `[from, to)`. Always covers at least the bucket
    /// containing `from`, so narrow pixel columns never come out blank.
    pub fn peak_between(&self, from: f64, to: f64) -> f32 {
        if self.peaks.is_empty() || !from.is_finite() || !to.is_finite() {
            return 0.0;
        }
        let first = self.index_of(from.max(0.0)).floor().max(0.0) as usize;
        let last = (self.index_of(to.max(0.0)).ceil() as usize).min(self.peaks.len());
        if first >= self.peaks.len() {
            return 0.0;
        }
        self.peaks[first..last.max(first + 1)]
            .iter()
            .fold(0.0f32, |peak, value| peak.max(*value))
    }
}

/// Identifies one decode request issued through a [`WaveformSlot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveformTicket {
    generation: u64,
    url: String,
}

impl WaveformTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// The stored envelope of one track view plus the generation of the most
/// recent request for it.
#[derive(Debug, Default)]
pub struct WaveformSlot {
    generation: u64,
    url: Option<String>,
    envelope: AmplitudeEnvelope,
}

impl WaveformSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a request for `url`. Any ticket handed out earlier is stale
    /// from now on. Switching to a different source clears the envelope.
    pub fn request(&mut self, url: impl Into<String>) -> WaveformTicket {
        let url = url.into();
        self.generation += 1;
        if self.url.as_deref() != Some(url.as_str()) {
            self.envelope = AmplitudeEnvelope::empty();
        }
        self.url = Some(url.clone());
        WaveformTicket {
            generation: self.generation,
            url,
        }
    }

    /// Stores `envelope` if `ticket` is still the latest request. Returns
    /// whether it was applied.
    pub fn apply(&mut self, ticket: &WaveformTicket, envelope: AmplitudeEnvelope) -> bool {
        let current = ticket.generation == self.generation && self.url.as_deref() == Some(ticket.url.as_str());
        if current {
            self.envelope = envelope;
        } else {
            tracing::debug!(
                url = %ticket.url,
                generation = ticket.generation,
                latest = self.generation,
                "discarding superseded waveform"
            );
        }
        current
    }

    /// Forgets the source; every in-flight request becomes stale.
    pub fn invalidate(&mut self) {
        self.generation += 1;
        self.url = None;
        self.envelope = AmplitudeEnvelope::empty();
    }

    pub fn envelope(&self) -> &AmplitudeEnvelope {
        &self.envelope
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Fetches and decodes audio into envelopes.
#[derive(Debug, Clone)]
pub struct WaveformService<F = SourceFetcher> {
    fetcher: F,
    config: WaveformConfig,
}

impl WaveformService<SourceFetcher> {
    pub fn new(config: WaveformConfig) -> Self {
        Self {
            fetcher: SourceFetcher::new(config.max_fetch_bytes),
            config,
        }
    }
}

impl<F: AudioFetcher> WaveformService<F> {
    pub fn with_fetcher(fetcher: F, config: WaveformConfig) -> Self {
        Self { fetcher, config }
    }

    /// Decodes `url` into an envelope. Any failure is logged and yields an
    /// empty envelope, which renders as "no waveform".
    pub async fn decode(&self, url: &str) -> AmplitudeEnvelope {
        match self.try_decode(url).await {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(url, error = %err, "waveform unavailable");
                AmplitudeEnvelope::empty()
            }
        }
    }

    pub async fn try_decode(&self, url: &str) -> Result<AmplitudeEnvelope> {
        let bytes = self.fetcher.fetch(url).await?;
        let hint = extension_hint(url);
        let buckets_per_second = self.config.buckets_per_second;

        let envelope = tokio::task::spawn_blocking(move || -> Result<AmplitudeEnvelope> {
            let audio = decode_audio(bytes, hint.as_deref())?;
            Ok(AmplitudeEnvelope::from_samples(
                &audio.samples,
                audio.sample_rate,
                buckets_per_second,
            ))
        })
        .await
        .map_err(|err| SyncError::Decode(format!("decode task failed: {err}")))??;

        tracing::debug!(url, buckets = envelope.len(), duration = envelope.duration(), "decoded waveform");
        Ok(envelope)
    }

    /// Issues a request through `slot`, decodes, and applies the result only
    /// if no newer request was made meanwhile.
    pub async fn load_into(&self, slot: &std::cell::RefCell<WaveformSlot>, url: &str) -> bool {
        let ticket = slot.borrow_mut().request(url);
        let envelope = self.decode(url).await;
        slot.borrow_mut().apply(&ticket, envelope)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::time::Duration;

    use super::decode::fixtures::stereo_wav;
    use super::*;

    struct ScriptedFetcher {
        responses: HashMap<&'static str, (Vec<u8>, Duration)>,
    }

    impl AudioFetcher for ScriptedFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            let (bytes, delay) = self
                .responses
                .get(url)
                .cloned()
                .ok_or_else(|| SyncError::fetch(url, "404"))?;
            tokio::time::sleep(delay).await;
            Ok(bytes)
        }
    }

    fn service() -> WaveformService<ScriptedFetcher> {
        let mut responses = HashMap::new();
        responses.insert("slow-a.wav", (stereo_wav(8_000, 1.0, 0.25, 0.0), Duration::from_millis(80)));
        responses.insert("fast-b.wav", (stereo_wav(8_000, 2.0, 0.75, 0.0), Duration::ZERO));
        responses.insert("broken.wav", (vec![1, 2, 3], Duration::ZERO));
        let config = WaveformConfig {
            buckets_per_second: 80,
            ..WaveformConfig::default()
        };
        WaveformService::with_fetcher(ScriptedFetcher { responses }, config)
    }

    #[test]
    fn downsamples_by_max_magnitude() {
        let samples = [0.1, -0.9, 0.2, 0.3, -0.4, 0.0, 0.5];
        let envelope = AmplitudeEnvelope::from_samples(&samples, 6, 2);

        assert_eq!(envelope.peaks(), &[0.9, 0.4, 0.5]);
        assert!((envelope.duration() - 7.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn nominal_duration_only_stretches_the_index() {
        let envelope = AmplitudeEnvelope::from_peaks(vec![0.1, 0.2, 0.3, 0.4], 2.0);
        assert_eq!(envelope.peak_at(1.6), Some(0.4));

        let stretched = envelope.clone().with_nominal_duration(4.0);
        assert_eq!(stretched.duration(), 4.0);
        assert_eq!(stretched.peak_at(1.6), Some(0.2));
        assert_eq!(envelope.with_nominal_duration(1.0).duration(), 2.0);
    }

    #[test]
    fn peak_between_covers_at_least_one_bucket() {
        let envelope = AmplitudeEnvelope::from_peaks(vec![0.1, 0.8, 0.3, 0.4], 4.0);
        assert_eq!(envelope.peak_between(0.0, 2.0), 0.8);
        assert_eq!(envelope.peak_between(2.1, 2.1), 0.3);
        assert_eq!(envelope.peak_between(9.0, 10.0), 0.0);
        assert_eq!(envelope.peak_at(-1.0), None);
    }

    #[test]
    fn stale_tickets_are_rejected() {
        let mut slot = WaveformSlot::new();
        let first = slot.request("a.wav");
        let second = slot.request("b.wav");

        assert!(slot.apply(&second, AmplitudeEnvelope::from_peaks(vec![0.5], 1.0)));
        assert!(!slot.apply(&first, AmplitudeEnvelope::from_peaks(vec![0.9], 1.0)));
        assert_eq!(slot.envelope().peaks(), &[0.5]);

        slot.invalidate();
        assert!(!slot.apply(&second, AmplitudeEnvelope::from_peaks(vec![0.1], 1.0)));
        assert!(slot.envelope().is_empty());
    }

    #[tokio::test]
    async fn decodes_envelope_at_configured_rate() {
        let envelope = service().decode("fast-b.wav").await;

        assert_eq!(envelope.len(), 160);
        assert!((envelope.duration() - 2.0).abs() < 1e-9);
        assert!(envelope.peaks().iter().all(|peak| (peak - 0.75).abs() < 1e-3));
    }

    #[tokio::test]
    async fn failures_degrade_to_empty_envelopes() {
        let service = service();
        assert!(service.decode("broken.wav").await.is_empty());
        assert!(service.decode("missing.wav").await.is_empty());
        assert!(service.try_decode("missing.wav").await.is_err());
    }

    #[tokio::test]
    async fn superseded_decode_never_overwrites_newer_result() {
        let service = service();
        let slot = RefCell::new(WaveformSlot::new());

        let (applied_a, applied_b) = tokio::join!(
            service.load_into(&slot, "slow-a.wav"),
            service.load_into(&slot, "fast-b.wav"),
        );

        assert!(!applied_a);
        assert!(applied_b);
        let slot = slot.into_inner();
        assert_eq!(slot.url(), Some("fast-b.wav"));
        assert!((slot.envelope().duration() - 2.0).abs() < 1e-9);
    }
}
