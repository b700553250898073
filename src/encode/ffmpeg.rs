use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{Result, WaveError};

/// Joins a numbered PNG sequence with the source audio into one video.
pub struct FfmpegMuxer {
    pub frame_pattern: PathBuf,
    pub audio: PathBuf,
    pub rate: u32,
    pub seek: Option<f64>,
    pub duration: Option<f64>,
    pub format: String,
}

impl FfmpegMuxer {
    pub fn args(&self, output: &Path) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-framerate".into(), self.rate.to_string(),
            "-i".into(), self.frame_pattern.display().to_string(),
        ];

        if let Some(s) = self.seek {
            args.extend(["-ss".to_string(), format!("{s:.6}")]);
        }
        args.extend(["-i".to_string(), self.audio.display().to_string()]);
        if let Some(d) = self.duration {
            args.extend(["-t".to_string(), format!("{d:.6}")]);
        }

        let format = self.format.to_lowercase();
        match format.as_str() {
            "webm" => args.extend([
                "-c:v".to_string(), "libvpx".into(),
                "-c:a".into(), "libopus".into(),
                "-deadline".into(), "best".into(),
                "-pix_fmt".into(), "yuv420p".into(),
                "-shortest".into(),
                "-f".into(), "webm".into(),
            ]),
            "mkv" => args.extend([
                "-c:v".to_string(), "libx264".into(),
                "-c:a".into(), "aac".into(),
                "-pix_fmt".into(), "yuv420p".into(),
                "-shortest".into(),
                "-f".into(), "matroska".into(),
            ]),
            _ => args.extend([
                "-c:v".to_string(), "libx264".into(),
                "-c:a".into(), "aac".into(),
                "-pix_fmt".into(), "yuv420p".into(),
                "-shortest".into(),
                "-movflags".into(), "+faststart".into(),
                "-f".into(), format.clone(),
            ]),
        }

        args.push(output.display().to_string());
        args
    }

    pub fn run(&self, output: &Path) -> Result<()> {
        let args = self.args(output);
        log::info!("FFmpeg muxing {} @ {}fps into {}", self.format, self.rate, output.display());

        let result = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| WaveError::collaborator("ffmpeg", format!("failed to spawn ffmpeg: {e}")))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(WaveError::collaborator(
                "ffmpeg",
                format!("failed to encode video ({}):\n{}", result.status, stderr),
            ));
        }

        log::info!("FFmpeg encoding complete");
        Ok(())
    }
}

/// `my song.mp3` becomes `my_song_mp3.<format>`.
pub fn default_output_name(input: &Path, format: &str) -> PathBuf {
    let stem = input.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    let ext = input.extension().map(|s| s.to_string_lossy()).unwrap_or_default();

    let mut name = String::with_capacity(stem.len() + ext.len() + format.len() + 2);
    let mut in_gap = false;
    for ch in stem.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            name.push(ch);
            in_gap = false;
        } else if !in_gap {
            name.push('_');
            in_gap = true;
        }
    }
    if !ext.is_empty() {
        name.push('_');
        name.push_str(&ext);
    }
    name.push('.');
    name.push_str(format);
    PathBuf::from(name)
}
