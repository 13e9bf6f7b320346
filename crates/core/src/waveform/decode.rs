use std::future::Future;
use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::{Result, SyncError};

/// First channel of a decoded stream.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.samples.len() as f64 / self.sample_rate as f64
        }
    }
}

/// Retrieves raw audio bytes for a URL.
pub trait AudioFetcher {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// Fetches `http(s)://` URLs over the network and treats anything else as a
/// local path, with or without a `file://` prefix.
#[derive(Debug, Clone)]
pub struct SourceFetcher {
    max_bytes: u64,
}

impl SourceFetcher {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }
}

impl AudioFetcher for SourceFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if url.starts_with("http://") || url.starts_with("https://") {
            let owned = url.to_string();
            let limit = self.max_bytes;
            tokio::task::spawn_blocking(move || fetch_http(&owned, limit))
                .await
                .map_err(|err| SyncError::fetch(url, err))?
        } else {
            fetch_local(url, self.max_bytes).await
        }
    }
}

async fn fetch_local(url: &str, limit: u64) -> Result<Vec<u8>> {
    let path = url.strip_prefix("file://").unwrap_or(url);
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|err| SyncError::fetch(url, err))?;
    if metadata.len() > limit {
        return Err(SyncError::fetch(
            url,
            format!("file is {} bytes, limit is {limit}", metadata.len()),
        ));
    }
    tokio::fs::read(path)
        .await
        .map_err(|err| SyncError::fetch(url, err))
}

fn fetch_http(url: &str, limit: u64) -> Result<Vec<u8>> {
    let mut response = ureq::get(url)
        .call()
        .map_err(|err| SyncError::fetch(url, err))?;
    response
        .body_mut()
        .with_config()
        .limit(limit)
        .read_to_vec()
        .map_err(|err| SyncError::fetch(url, err))
}

/// File extension of the URL's path, used as a probe hint.
pub fn extension_hint(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file = path.rsplit('/').next().unwrap_or(path);
    let (_, extension) = file.rsplit_once('.')?;
    if extension.is_empty() || extension.len() > 5 {
        return None;
    }
    Some(extension.to_ascii_lowercase())
}

/// Decodes a complete audio file held in memory, keeping channel 0 only.
pub fn decode_audio(bytes: Vec<u8>, extension: Option<&str>) -> Result<DecodedAudio> {
    let stream = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = extension {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        stream,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| SyncError::Decode("no audio track found".to_string()))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| SyncError::Decode("unknown sample rate".to_string()))?;
    let mut decoder = symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();
    let mut buffer: Option<(SampleBuffer<f32>, u64)> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(err) => return Err(err.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(reason)) => {
                tracing::debug!(reason, "skipping undecodable packet");
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count().max(1);
        let frames = decoded.capacity() as u64;
        if buffer.as_ref().map_or(true, |(_, capacity)| *capacity < frames) {
            buffer = Some((SampleBuffer::new(frames, spec), frames));
        }
        if let Some((sample_buffer, _)) = buffer.as_mut() {
            sample_buffer.copy_interleaved_ref(decoded);
            samples.extend(sample_buffer.samples().iter().step_by(channels).copied());
        }
    }

    if samples.is_empty() {
        return Err(SyncError::Decode("stream contained no samples".to_string()));
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}
