use image::{ImageFormat, RgbaImage};
use indicatif::ProgressBar;
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::bars::BarRenderer;
use super::interpolate::FrameInterpolator;
use crate::error::{Result, WaveError};

/// Zero-padded width of frame file names.
pub const FRAME_DIGITS: usize = 6;

/// Destination for finished frames, keyed by frame index.
pub trait FrameSink: Sync {
    fn write(&self, idx: usize, frame: &RgbaImage) -> Result<()>;
}

/// Writes `000000.png`, `000001.png`, ... into one directory.
pub struct PngDirectory {
    dir: PathBuf,
}

impl PngDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn frame_path(&self, idx: usize) -> PathBuf {
        self.dir.join(format!("{:0width$}.png", idx, width = FRAME_DIGITS))
    }

    /// printf-style input pattern for ffmpeg's image2 demuxer.
    pub fn pattern(&self) -> PathBuf {
        self.dir.join(format!("%0{}d.png", FRAME_DIGITS))
    }
}

impl FrameSink for PngDirectory {
    fn write(&self, idx: usize, frame: &RgbaImage) -> Result<()> {
        let path = self.frame_path(idx);
        frame
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|e| WaveError::resource(format!("frame {idx}: failed to write {}: {e}", path.display())))
    }
}

/// Shared stop flag with an optional deadline.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            flag: Arc::default(),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Fans frame work out over a fixed-size worker pool.
pub struct FrameScheduler {
    jobs: usize,
    cancel: CancellationToken,
}

impl FrameScheduler {
    /// `jobs == 0` sizes the pool to the machine.
    pub fn new(jobs: usize) -> Self {
        let jobs = if jobs == 0 {
            std::thread::available_parallelism().map_or(1, |n| n.get())
        } else {
            jobs
        };
        Self {
            jobs,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Interpolate, render and persist frames `0..frames`. Returns once every
    /// frame is written, or with the first failure after the rest of the
    /// group has been cancelled.
    pub fn run<S: FrameSink>(
        &self,
        frames: usize,
        interpolator: &FrameInterpolator<'_>,
        renderer: &BarRenderer,
        sink: &S,
        progress: &ProgressBar,
    ) -> Result<()> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .thread_name(|i| format!("frame-worker-{i}"))
            .build()
            .map_err(|e| WaveError::resource(format!("failed to start worker pool: {e}")))?;

        log::info!("Generating {} frames on {} workers", frames, self.jobs);

        // Workers that stop because of a sibling's failure report `Cancelled`;
        // the failure itself is parked here so it wins over those.
        let failure: Mutex<Option<WaveError>> = Mutex::new(None);

        let result = pool.install(|| {
            (0..frames).into_par_iter().try_for_each(|idx| {
                if self.cancel.is_cancelled() {
                    return Err(WaveError::Cancelled);
                }
                let written = interpolator
                    .bars_at(idx)
                    .and_then(|bars| sink.write(idx, &renderer.render(&bars)));
                if let Err(e) = written {
                    self.cancel.cancel();
                    if let Ok(mut slot) = failure.lock() {
                        slot.get_or_insert(e);
                    }
                    return Err(WaveError::Cancelled);
                }
                progress.inc(1);
                Ok(())
            })
        });
        let result = result.map_err(|cancelled| {
            failure.into_inner().ok().flatten().unwrap_or(cancelled)
        });

        if let Err(ref e) = result {
            self.cancel.cancel();
            log::error!("Frame generation stopped: {}", e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::envelope::{AnalysisParams, Envelope};
    use image::Rgba;
    use std::sync::atomic::AtomicUsize;

    const FG: Rgba<u8> = Rgba([0, 125, 156, 255]);
    const BG: Rgba<u8> = Rgba([0, 0, 0, 255]);

    #[derive(Default)]
    struct MemorySink {
        frames: Mutex<Vec<(usize, RgbaImage)>>,
    }

    impl FrameSink for MemorySink {
        fn write(&self, idx: usize, frame: &RgbaImage) -> Result<()> {
            self.frames.lock().unwrap().push((idx, frame.clone()));
            Ok(())
        }
    }

    /// Fails on one index; every other write takes `delay`.
    struct FailingSink {
        fail_at: usize,
        delay: Duration,
        written: AtomicUsize,
    }

    impl FrameSink for FailingSink {
        fn write(&self, idx: usize, _frame: &RgbaImage) -> Result<()> {
            if idx == self.fail_at {
                return Err(WaveError::resource(format!("frame {idx}: disk full")));
            }
            std::thread::sleep(self.delay);
            self.written.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn envelope(signal: &[f32], bars: usize) -> (Envelope, AnalysisParams) {
        let params = AnalysisParams::new(800, 160).unwrap();
        (Envelope::extract(signal, params).padded(bars), params)
    }

    #[test]
    fn writes_every_frame_exactly_once() {
        let signal: Vec<f32> = (0..16000).map(|i| (i as f32 * 0.03).sin()).collect();
        let (env, params) = envelope(&signal, 50);
        let interp = FrameInterpolator::new(&env, 60, 16000, params.stride, 50, 3.5).unwrap();
        let renderer = BarRenderer::new(64, 32, FG, BG).unwrap();
        let sink = MemorySink::default();

        FrameScheduler::new(4)
            .run(60, &interp, &renderer, &sink, &ProgressBar::hidden())
            .unwrap();

        let mut idxs: Vec<usize> = sink.frames.lock().unwrap().iter().map(|(i, _)| *i).collect();
        idxs.sort_unstable();
        assert_eq!(idxs, (0..60).collect::<Vec<_>>());
    }

    #[test]
    fn silent_audio_renders_background_only() {
        let (env, params) = envelope(&[0.0; 16000], 50);
        assert!(env.values().iter().all(|&v| v == 0.0));
        let interp = FrameInterpolator::new(&env, 60, 16000, params.stride, 50, 3.5).unwrap();
        let renderer = BarRenderer::new(40, 20, FG, BG).unwrap();
        let sink = MemorySink::default();

        FrameScheduler::new(2)
            .run(60, &interp, &renderer, &sink, &ProgressBar::hidden())
            .unwrap();

        let frames = sink.frames.lock().unwrap();
        assert_eq!(frames.len(), 60);
        assert!(frames.iter().all(|(_, img)| img.pixels().all(|p| *p == BG)));
    }

    #[test]
    fn first_failure_fails_the_run() {
        let env = Envelope::from(vec![0.5; 200]).padded(10);
        let interp = FrameInterpolator::new(&env, 30, 1000, 10, 10, 3.5).unwrap();
        let renderer = BarRenderer::new(20, 10, FG, BG).unwrap();
        let sink = FailingSink {
            fail_at: 3,
            delay: Duration::ZERO,
            written: AtomicUsize::new(0),
        };
        let cancel = CancellationToken::new();

        let err = FrameScheduler::new(2)
            .with_cancellation(cancel.clone())
            .run(50, &interp, &renderer, &sink, &ProgressBar::hidden())
            .unwrap_err();

        assert!(matches!(err, WaveError::Resource(_)));
        assert!(err.to_string().contains("disk full"));
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn failure_stops_queued_frames() {
        const FRAMES: usize = 2000;
        // position = idx / 300, well inside the 23 padded segments
        let env = Envelope::from(vec![0.5; 200]).padded(10);
        let interp = FrameInterpolator::new(&env, 3000, 1000, 10, 10, 3.5).unwrap();
        let renderer = BarRenderer::new(20, 10, FG, BG).unwrap();
        let sink = FailingSink {
            fail_at: 0,
            delay: Duration::from_millis(2),
            written: AtomicUsize::new(0),
        };

        let err = FrameScheduler::new(2)
            .run(FRAMES, &interp, &renderer, &sink, &ProgressBar::hidden())
            .unwrap_err();

        assert!(err.to_string().contains("frame 0: disk full"));
        let written = sink.written.load(Ordering::SeqCst);
        assert!(written < FRAMES / 10, "{written} frames written after the failure");
    }

    #[test]
    fn cancelled_token_stops_before_any_frame() {
        let env = Envelope::from(vec![0.5; 200]).padded(10);
        let interp = FrameInterpolator::new(&env, 30, 1000, 10, 10, 3.5).unwrap();
        let renderer = BarRenderer::new(20, 10, FG, BG).unwrap();
        let sink = MemorySink::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = FrameScheduler::new(2)
            .with_cancellation(cancel)
            .run(20, &interp, &renderer, &sink, &ProgressBar::hidden())
            .unwrap_err();

        assert!(matches!(err, WaveError::Cancelled));
        assert!(sink.frames.lock().unwrap().is_empty());
    }

    #[test]
    fn expired_deadline_cancels() {
        let token = CancellationToken::with_timeout(Duration::ZERO);
        assert!(token.is_cancelled());
        assert!(!CancellationToken::with_timeout(Duration::from_secs(3600)).is_cancelled());
    }

    #[test]
    fn png_directory_names_frames_by_index() {
        let dir = tempfile::tempdir().unwrap();
        let sink = PngDirectory::new(dir.path());
        assert_eq!(sink.frame_path(42), dir.path().join("000042.png"));
        assert_eq!(sink.pattern(), dir.path().join("%06d.png"));

        let img = BarRenderer::new(16, 8, FG, BG).unwrap().render(&[0.0, 0.9, 0.0]);
        sink.write(7, &img).unwrap();
        let back = image::open(sink.frame_path(7)).unwrap().to_rgba8();
        assert_eq!(back, img);
    }

    #[test]
    fn png_write_failure_is_a_resource_error() {
        let sink = PngDirectory::new("/nonexistent/wavebars/frames");
        let img = RgbaImage::from_pixel(2, 2, BG);
        assert!(matches!(sink.write(0, &img), Err(WaveError::Resource(_))));
    }

    #[test]
    fn zero_jobs_uses_available_parallelism() {
        assert!(FrameScheduler::new(0).jobs() >= 1);
        assert_eq!(FrameScheduler::new(3).jobs(), 3);
    }
}
