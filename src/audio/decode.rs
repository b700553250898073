use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{Result, WaveError};

/// Decoded audio, one sample sequence per channel.
#[derive(Clone, Debug)]
pub struct PcmBuffer {
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl PcmBuffer {
    /// De-interleave `samples` into `channels` sequences. A trailing partial
    /// frame is dropped.
    pub fn from_interleaved(samples: &[f32], channels: usize, sample_rate: u32) -> Result<Self> {
        if channels == 0 {
            return Err(WaveError::input("audio stream reports zero channels"));
        }
        if sample_rate == 0 {
            return Err(WaveError::input("audio stream reports a zero sample rate"));
        }

        let frames = samples.len() / channels;
        if samples.len() % channels != 0 {
            log::warn!(
                "Dropping {} trailing samples of an incomplete frame",
                samples.len() % channels
            );
        }

        let mut out = vec![Vec::with_capacity(frames); channels];
        for frame in samples.chunks_exact(channels) {
            for (c, &s) in frame.iter().enumerate() {
                out[c].push(s);
            }
        }

        Ok(Self {
            channels: out,
            sample_rate,
        })
    }

    /// Parse raw interleaved 32-bit little-endian float PCM.
    pub fn from_f32le_bytes(bytes: &[u8], channels: usize, sample_rate: u32) -> Result<Self> {
        if bytes.len() % 4 != 0 {
            log::warn!("Raw PCM length {} is not a multiple of 4 bytes", bytes.len());
        }
        let samples: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        Self::from_interleaved(&samples, channels, sample_rate)
    }

    /// Samples per channel.
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }
}

fn native_err(e: impl std::fmt::Display) -> WaveError {
    WaveError::collaborator("symphonia", e.to_string())
}

/// Decode `path` in-process, keeping only `[seek, seek + duration)`.
pub fn decode_native(path: &Path, seek: Option<f64>, duration: Option<f64>) -> Result<PcmBuffer> {
    let file = std::fs::File::open(path).map_err(|e| {
        WaveError::input(format!("failed to open audio file {}: {}", path.display(), e))
    })?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(native_err)?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| WaveError::input(format!("{} contains no audio track", path.display())))?;

    let track_id = track.id;
    let declared_channels = track.codec_params.channels.map(|c| c.count());
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| WaveError::input("unknown sample rate"))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(native_err)?;

    let mut interleaved: Vec<f32> = Vec::new();
    let mut decoded_channels = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(native_err(e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(native_err(e)),
        };

        let spec = *decoded.spec();
        decoded_channels.get_or_insert(spec.channels.count());
        let mut sample_buf = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        interleaved.extend_from_slice(sample_buf.samples());
    }

    let channels = resolve_channels(decoded_channels, declared_channels);
    let total_frames = interleaved.len() / channels;
    let start = seek.map_or(0, |s| (s * sample_rate as f64) as usize).min(total_frames);
    let end = duration.map_or(total_frames, |d| {
        (start + (d * sample_rate as f64) as usize).min(total_frames)
    });

    let pcm = PcmBuffer::from_interleaved(
        &interleaved[start * channels..end * channels],
        channels,
        sample_rate,
    )?;

    log::info!(
        "Decoded audio natively: {} samples x {} channels, {}Hz, {:.1}s",
        pcm.frames(),
        channels,
        sample_rate,
        pcm.duration_secs()
    );

    Ok(pcm)
}

/// Containers such as ADTS leave the track layout unset, so the layout of
/// the decoded buffers wins over the declared one.
fn resolve_channels(decoded: Option<usize>, declared: Option<usize>) -> usize {
    decoded
        .or(declared)
        .filter(|&c| c > 0)
        .unwrap_or(1)
}
