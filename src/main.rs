mod audio;
mod cli;
mod color;
mod config;
mod encode;
mod error;
mod render;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::{Duration, Instant};

use audio::decode::{decode_native, PcmBuffer};
use audio::envelope::{AnalysisParams, Envelope};
use audio::preprocess::to_mono_normalized;
use audio::probe;
use cli::{Cli, Decoder};
use color::parse_color;
use encode::ffmpeg::{default_output_name, FfmpegMuxer};
use render::bars::BarRenderer;
use render::interpolate::FrameInterpolator;
use render::scheduler::{CancellationToken, FrameScheduler, PngDirectory};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    if let Some(path) = config::find_config(cli.config.as_deref()) {
        if let Some(cfg) = config::load_config(&path) {
            log::info!("Loaded config from {}", path.display());
            config::merge(&mut cli, cfg);
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }

    if !cli.input.exists() {
        anyhow::bail!("Audio file '{}' does not exist", cli.input.display());
    }

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_name(&cli.input, &cli.format));

    log::info!("wavebars - audio to waveform video");
    log::info!("Input: {}", cli.input.display());
    log::info!("Output: {} ({})", output.display(), cli.format);
    log::info!("Resolution: {}x{} @ {}fps", cli.width, cli.height, cli.rate);
    log::info!(
        "Bars: {}, time per frame: {:.2}s, speed: {:.2}, oversample: {:.2}",
        cli.bars, cli.time, cli.speed, cli.oversample
    );
    log::info!("Colors: fg {}, bg {}", cli.fg, cli.bg);
    if let Some(seek) = cli.seek() {
        log::info!("Seek: {:.2}s", seek);
    }
    if let Some(duration) = cli.duration() {
        log::info!("Duration: {:.2}s", duration);
    }

    let started = Instant::now();
    visualize(&cli, &output)?;
    log::info!("Generation completed in: {}", format_elapsed(started.elapsed()));
    Ok(())
}

fn visualize(cli: &Cli, output: &Path) -> Result<()> {
    probe::check_installation().context("FFmpeg installation check failed")?;

    let foreground = parse_color(&cli.fg).context("Invalid foreground color")?;
    let background = parse_color(&cli.bg).context("Invalid background color")?;
    let renderer = BarRenderer::new(cli.width, cli.height, foreground, background)?
        .with_lower_bar(cli.lower_scale, cli.lower_opacity);

    // 1. Decode
    let pcm = decode(cli).context("Decoding audio failed")?;

    // 2. Preprocess + envelope
    let mono = to_mono_normalized(&pcm).context("Preprocessing failed")?;
    let params = AnalysisParams::derive(pcm.sample_rate, cli.time, cli.bars, cli.oversample)
        .context("Envelope extraction failed")?;
    let envelope = Envelope::extract(&mono, params);
    log::info!(
        "Envelope: {} values (window={}, stride={})",
        envelope.len(),
        params.window,
        params.stride
    );
    let envelope = envelope.padded(cli.bars);

    let duration = mono.len() as f64 / pcm.sample_rate as f64;
    let frames = (cli.rate as f64 * duration).round() as usize;
    if frames == 0 {
        anyhow::bail!("Audio is too short ({:.3}s) to produce a single frame", duration);
    }
    log::info!("Total frames: {}, Duration: {:.1}s", frames, duration);

    let interpolator = FrameInterpolator::new(
        &envelope,
        cli.rate,
        pcm.sample_rate,
        params.stride,
        cli.bars,
        cli.speed,
    )?;

    // 3. Frames
    let frame_dir = tempfile::Builder::new()
        .prefix("wavebars_")
        .tempdir()
        .context("Failed to create temporary frame directory")?;
    let sink = PngDirectory::new(frame_dir.path());

    let cancel = cli
        .timeout
        .and_then(|t| Duration::try_from_secs_f64(t).ok())
        .filter(|t| !t.is_zero())
        .map_or_else(CancellationToken::new, CancellationToken::with_timeout);

    let pb = ProgressBar::new(frames as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} frames ({eta} remaining)")?
            .progress_chars("=>-"),
    );

    let scheduler = FrameScheduler::new(cli.jobs).with_cancellation(cancel);
    log::info!("Frame workers: {}", scheduler.jobs());
    scheduler
        .run(frames, &interpolator, &renderer, &sink, &pb)
        .context("Frame generation failed")?;
    pb.finish_with_message("Frames complete");

    // 4. Mux
    let muxer = FfmpegMuxer {
        frame_pattern: sink.pattern(),
        audio: cli.input.clone(),
        rate: cli.rate,
        seek: cli.seek(),
        duration: cli.duration(),
        format: cli.format.clone(),
    };
    let spinner = spinner("Encoding video with FFmpeg...");
    let muxed = muxer.run(output);
    spinner.finish_and_clear();
    muxed.context("Muxing failed")?;

    frame_dir
        .close()
        .context("Failed to remove temporary frame directory")?;

    log::info!("Audio wave video generation completed: {}", output.display());
    Ok(())
}

fn decode(cli: &Cli) -> Result<PcmBuffer> {
    let spinner = spinner("Verifying audio format...");
    let pcm = match cli.decoder {
        Decoder::Ffmpeg => probe::probe(&cli.input).and_then(|info| {
            info.log_summary();
            probe::read_audio(&cli.input, &info, cli.seek(), cli.duration())
        }),
        Decoder::Native => decode_native(&cli.input, cli.seek(), cli.duration()),
    };
    spinner.finish_and_clear();
    Ok(pcm?)
}

fn spinner(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// "1 hours 2 minutes 3 seconds", dropping leading zero units.
fn format_elapsed(d: Duration) -> String {
    let total = d.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours} hours "));
    }
    if minutes > 0 || hours > 0 {
        out.push_str(&format!("{minutes} minutes "));
    }
    out.push_str(&format!("{seconds} seconds"));
    out
}
