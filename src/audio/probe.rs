use serde::Deserialize;
use std::path::Path;
use std::process::{Command, Output};

use super::decode::PcmBuffer;
use crate::error::{Result, WaveError};

#[derive(Debug, Deserialize)]
pub struct ProbeInfo {
    #[serde(default)]
    pub format: FormatInfo,
    #[serde(default)]
    pub streams: Vec<StreamInfo>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FormatInfo {
    #[serde(default)]
    pub format_name: String,
    pub duration: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StreamInfo {
    pub codec_type: String,
    #[serde(default)]
    pub codec_name: String,
    #[serde(default)]
    pub channels: usize,
    pub sample_rate: Option<String>,
    pub bit_rate: Option<String>,
    pub duration: Option<String>,
}

impl ProbeInfo {
    pub fn parse(json: &[u8]) -> Result<Self> {
        serde_json::from_slice(json)
            .map_err(|e| WaveError::collaborator("ffprobe", format!("unreadable probe output: {e}")))
    }

    pub fn audio_stream(&self) -> Option<&StreamInfo> {
        self.streams.iter().find(|s| s.codec_type == "audio")
    }

    /// Channel count and sample rate of the first audio stream.
    pub fn audio_layout(&self) -> Result<(usize, u32)> {
        let stream = self
            .audio_stream()
            .ok_or_else(|| WaveError::input("no audio stream found in file"))?;
        let sample_rate = stream
            .sample_rate
            .as_deref()
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|&sr| sr > 0.0)
            .ok_or_else(|| WaveError::input("audio stream has no usable sample rate"))?;
        if stream.channels == 0 {
            return Err(WaveError::input("audio stream reports zero channels"));
        }
        Ok((stream.channels, sample_rate as u32))
    }

    pub fn log_summary(&self) {
        log::info!("Format: {}", self.format.format_name);
        if let Some(stream) = self.audio_stream() {
            log::info!("Codec: {}", stream.codec_name);
            if let Some(bps) = stream.bit_rate.as_deref().and_then(|b| b.parse::<u64>().ok()) {
                log::info!("Bitrate: {} kbps", bps / 1000);
            }
            log::info!("Channels: {}", stream.channels);
            let duration = stream.duration.as_deref().or(self.format.duration.as_deref());
            if let Some(d) = duration.and_then(|d| d.parse::<f64>().ok()) {
                log::info!("Duration: {:.2} seconds", d);
            }
        }
    }
}

fn run(tool: &'static str, args: &[String]) -> Result<Output> {
    let output = Command::new(tool)
        .args(args)
        .output()
        .map_err(|e| WaveError::collaborator(tool, format!("could not run {tool}: {e}")))?;
    if !output.status.success() {
        return Err(WaveError::collaborator(
            tool,
            format!(
                "`{} {}` exited with {}:\n{}",
                tool,
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr)
            ),
        ));
    }
    Ok(output)
}

/// Fail early when ffmpeg or ffprobe is missing from PATH.
pub fn check_installation() -> Result<()> {
    for tool in ["ffmpeg", "ffprobe"] {
        Command::new(tool)
            .arg("-version")
            .output()
            .ok()
            .filter(|o| o.status.success())
            .ok_or_else(|| {
                WaveError::collaborator(tool, format!("{tool} is not installed or not accessible in your PATH"))
            })?;
    }
    log::info!("FFmpeg and FFprobe are installed and accessible");
    Ok(())
}

pub fn probe(path: &Path) -> Result<ProbeInfo> {
    let args = vec![
        "-v".to_string(),
        "quiet".into(),
        "-print_format".into(),
        "json".into(),
        "-show_format".into(),
        "-show_streams".into(),
        path.display().to_string(),
    ];
    let output = run("ffprobe", &args)?;
    ProbeInfo::parse(&output.stdout)
}

pub fn decode_args(path: &Path, seek: Option<f64>, duration: Option<f64>) -> Vec<String> {
    let mut args = vec!["-y".to_string(), "-loglevel".into(), "panic".into()];
    if let Some(s) = seek {
        args.extend(["-ss".to_string(), format!("{s:.6}")]);
    }
    args.extend(["-i".to_string(), path.display().to_string()]);
    if let Some(d) = duration {
        args.extend(["-t".to_string(), format!("{d:.6}")]);
    }
    args.extend(["-f".to_string(), "f32le".into(), "-".into()]);
    args
}

/// Decode `path` to interleaved f32 through an ffmpeg subprocess.
pub fn read_audio(
    path: &Path,
    info: &ProbeInfo,
    seek: Option<f64>,
    duration: Option<f64>,
) -> Result<PcmBuffer> {
    let (channels, sample_rate) = info.audio_layout()?;

    let output = run("ffmpeg", &decode_args(path, seek, duration))?;
    let pcm = PcmBuffer::from_f32le_bytes(&output.stdout, channels, sample_rate)?;

    log::info!(
        "Decoded audio: {} samples x {} channels, {}Hz, {:.1}s",
        pcm.frames(),
        channels,
        sample_rate,
        pcm.duration_secs()
    );
    Ok(pcm)
}
