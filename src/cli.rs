use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::defaults;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Decoder {
    /// Decode through an ffmpeg subprocess
    Ffmpeg,
    /// Decode in-process with symphonia
    Native,
}

#[derive(Parser, Debug)]
#[command(name = "wavebars", about = "Audio to waveform bar video generator")]
pub struct Cli {
    /// Input audio file
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output video file (derived from the input name when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output video format (mp4, mkv, webm, mov, avi, ...)
    #[arg(long, default_value = defaults::FORMAT)]
    pub format: String,

    /// Video framerate
    #[arg(short, long, default_value_t = defaults::RATE)]
    pub rate: u32,

    /// Number of bars on the video at once
    #[arg(short, long, default_value_t = defaults::BARS)]
    pub bars: usize,

    /// Seconds of audio shown at once on a frame
    #[arg(short, long, default_value_t = defaults::TIME)]
    pub time: f64,

    /// Analysis oversampling; lower values feel less reactive
    #[arg(long, default_value_t = defaults::OVERSAMPLE)]
    pub oversample: f64,

    /// Higher values mean faster transitions between frames
    #[arg(long, default_value_t = defaults::SPEED)]
    pub speed: f64,

    /// Width in pixels of the animation
    #[arg(short = 'W', long, default_value_t = defaults::WIDTH)]
    pub width: u32,

    /// Height in pixels of the animation
    #[arg(short = 'H', long, default_value_t = defaults::HEIGHT)]
    pub height: u32,

    /// Foreground color (#RRGGBB[AA] or r,g,b[,a] in 0..1)
    #[arg(long, default_value = defaults::FOREGROUND)]
    pub fg: String,

    /// Background color (#RRGGBB[AA] or r,g,b[,a] in 0..1)
    #[arg(long, default_value = defaults::BACKGROUND)]
    pub bg: String,

    /// Height of the lower bar relative to the upper bar
    #[arg(long, default_value_t = defaults::LOWER_SCALE)]
    pub lower_scale: f64,

    /// Opacity of the lower bar (0..1)
    #[arg(long, default_value_t = defaults::LOWER_OPACITY)]
    pub lower_opacity: f64,

    /// Seek to this time in seconds before reading audio
    #[arg(long)]
    pub seek: Option<f64>,

    /// Seconds of audio to use from the seek point
    #[arg(long)]
    pub duration: Option<f64>,

    /// Audio decoder backend
    #[arg(long, value_enum, default_value_t = Decoder::Ffmpeg)]
    pub decoder: Decoder,

    /// Frame worker threads (0 = one per core)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    /// Abort frame generation after this many seconds
    #[arg(long)]
    pub timeout: Option<f64>,

    /// Config file (defaults to ./wavebars.toml or the user config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Zero or negative seek/duration mean "not set".
    pub fn seek(&self) -> Option<f64> {
        self.seek.filter(|&s| s > 0.0)
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration.filter(|&d| d > 0.0)
    }
}
