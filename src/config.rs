use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cli::Cli;

pub mod defaults {
    pub const RATE: u32 = 60;
    pub const BARS: usize = 50;
    pub const TIME: f64 = 0.4;
    pub const OVERSAMPLE: f64 = 5.0;
    pub const SPEED: f64 = 3.5;
    pub const WIDTH: u32 = 800;
    pub const HEIGHT: u32 = 600;
    pub const FOREGROUND: &str = "#007D9C";
    pub const BACKGROUND: &str = "#000000";
    pub const FORMAT: &str = "mp4";
    pub const LOWER_SCALE: f64 = crate::render::bars::LOWER_SCALE;
    pub const LOWER_OPACITY: f64 = crate::render::bars::LOWER_OPACITY;
}

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub bars: BarsConfig,
    #[serde(default)]
    pub colors: ColorConfig,
}

#[derive(Debug, Deserialize)]
pub struct VideoConfig {
    #[serde(default = "default_rate")]
    pub rate: u32,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_format")]
    pub format: String,
}

#[derive(Debug, Deserialize)]
pub struct BarsConfig {
    #[serde(default = "default_count")]
    pub count: usize,
    #[serde(default = "default_time")]
    pub time: f64,
    #[serde(default = "default_oversample")]
    pub oversample: f64,
    #[serde(default = "default_speed")]
    pub speed: f64,
    #[serde(default = "default_lower_scale")]
    pub lower_scale: f64,
    #[serde(default = "default_lower_opacity")]
    pub lower_opacity: f64,
}

#[derive(Debug, Deserialize)]
pub struct ColorConfig {
    #[serde(default = "default_foreground")]
    pub foreground: String,
    #[serde(default = "default_background")]
    pub background: String,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            rate: default_rate(),
            width: default_width(),
            height: default_height(),
            format: default_format(),
        }
    }
}

impl Default for BarsConfig {
    fn default() -> Self {
        Self {
            count: default_count(),
            time: default_time(),
            oversample: default_oversample(),
            speed: default_speed(),
            lower_scale: default_lower_scale(),
            lower_opacity: default_lower_opacity(),
        }
    }
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            foreground: default_foreground(),
            background: default_background(),
        }
    }
}

fn default_rate() -> u32 { defaults::RATE }
fn default_width() -> u32 { defaults::WIDTH }
fn default_height() -> u32 { defaults::HEIGHT }
fn default_format() -> String { defaults::FORMAT.into() }
fn default_count() -> usize { defaults::BARS }
fn default_time() -> f64 { defaults::TIME }
fn default_oversample() -> f64 { defaults::OVERSAMPLE }
fn default_speed() -> f64 { defaults::SPEED }
fn default_lower_scale() -> f64 { defaults::LOWER_SCALE }
fn default_lower_opacity() -> f64 { defaults::LOWER_OPACITY }
fn default_foreground() -> String { defaults::FOREGROUND.into() }
fn default_background() -> String { defaults::BACKGROUND.into() }

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            log::warn!("Invalid config {}: {}", path.display(), e);
            None
        }
    }
}

/// Explicit path first, then `./wavebars.toml`, then the user config dirs.
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("wavebars.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("wavebars").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("wavebars").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

/// Config values apply only where the CLI is still at its default.
pub fn merge(cli: &mut Cli, cfg: Config) {
    if cli.rate == defaults::RATE { cli.rate = cfg.video.rate; }
    if cli.width == defaults::WIDTH { cli.width = cfg.video.width; }
    if cli.height == defaults::HEIGHT { cli.height = cfg.video.height; }
    if cli.format == defaults::FORMAT { cli.format = cfg.video.format; }
    if cli.bars == defaults::BARS { cli.bars = cfg.bars.count; }
    if cli.time == defaults::TIME { cli.time = cfg.bars.time; }
    if cli.oversample == defaults::OVERSAMPLE { cli.oversample = cfg.bars.oversample; }
    if cli.speed == defaults::SPEED { cli.speed = cfg.bars.speed; }
    if cli.lower_scale == defaults::LOWER_SCALE { cli.lower_scale = cfg.bars.lower_scale; }
    if cli.lower_opacity == defaults::LOWER_OPACITY { cli.lower_opacity = cfg.bars.lower_opacity; }
    if cli.fg == defaults::FOREGROUND { cli.fg = cfg.colors.foreground; }
    if cli.bg == defaults::BACKGROUND { cli.bg = cfg.colors.background; }
}
