use std::f64::consts::PI;

use crate::audio::envelope::{sigmoid, Envelope};
use crate::error::{Result, WaveError};

/// Loudness (dB) at which the crossfade runs slowest / fastest.
const QUIET_DB: f64 = -6.0;
const LOUD_DB: f64 = 0.0;
const MIN_SPEEDUP: f64 = 0.5;
const MAX_SPEEDUP: f64 = 2.0;

/// Maps video frame indices to tapered bar heights.
///
/// Holds only shared references and scalars, so one instance serves every
/// worker.
#[derive(Clone, Copy, Debug)]
pub struct FrameInterpolator<'a> {
    envelope: &'a Envelope,
    rate: u32,
    sample_rate: u32,
    stride: usize,
    bars: usize,
    speed: f64,
}

impl<'a> FrameInterpolator<'a> {
    /// `envelope` must already carry the padding from [`Envelope::padded`].
    pub fn new(
        envelope: &'a Envelope,
        rate: u32,
        sample_rate: u32,
        stride: usize,
        bars: usize,
        speed: f64,
    ) -> Result<Self> {
        if rate == 0 || sample_rate == 0 || stride == 0 || bars == 0 {
            return Err(WaveError::input(format!(
                "rate ({rate}), sample rate ({sample_rate}), stride ({stride}) and bars ({bars}) must be positive"
            )));
        }
        Ok(Self {
            envelope,
            rate,
            sample_rate,
            stride,
            bars,
            speed,
        })
    }

    /// Position of frame `idx` in whole bar groups.
    pub fn position(&self, idx: usize) -> f64 {
        (idx as f64 / self.rate as f64 * self.sample_rate as f64)
            / self.stride as f64
            / self.bars as f64
    }

    pub fn bars_at(&self, idx: usize) -> Result<Vec<f64>> {
        let pos = self.position(idx);
        let off = pos.floor() as usize;
        let loc = pos - off as f64;

        let out_of_range = || {
            WaveError::resource(format!(
                "frame {idx}: envelope segment {} lies past the padded envelope ({} values)",
                off + 1,
                self.envelope.len()
            ))
        };
        let env1 = self.envelope.segment(off, self.bars).ok_or_else(out_of_range)?;
        let env2 = self.envelope.segment(off + 1, self.bars).ok_or_else(out_of_range)?;

        let maxvol = env2.iter().copied().fold(0.0f64, f64::max);
        let w = crossfade_weight(self.speed, speedup(maxvol), loc);

        Ok(env1
            .iter()
            .zip(env2)
            .enumerate()
            .map(|(i, (&a, &b))| ((1.0 - w) * a + w * b) * hann_taper(i, self.bars))
            .collect())
    }
}

fn interpolate(x1: f64, y1: f64, x2: f64, y2: f64, x: f64) -> f64 {
    y1 + (y2 - y1) * (x - x1) / (x2 - x1)
}

/// Crossfade speed multiplier for an upcoming segment peaking at `maxvol`.
pub fn speedup(maxvol: f64) -> f64 {
    let db = (1e-4 + maxvol).log10() * 10.0;
    interpolate(QUIET_DB, MIN_SPEEDUP, LOUD_DB, MAX_SPEEDUP, db).clamp(MIN_SPEEDUP, MAX_SPEEDUP)
}

pub fn crossfade_weight(speed: f64, speedup: f64, loc: f64) -> f64 {
    sigmoid(speed * speedup * (loc - 0.5))
}

/// Raised-cosine weight of bar `i` out of `bars`. A lone bar has no edges
/// and keeps full height.
pub fn hann_taper(i: usize, bars: usize) -> f64 {
    if bars < 2 {
        return 1.0;
    }
    0.5 * (1.0 - (2.0 * PI * i as f64 / (bars - 1) as f64).cos())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::envelope::{AnalysisParams, Envelope};

    fn ramp_envelope(len: usize) -> Envelope {
        Envelope::from((0..len).map(|i| (i as f64 * 0.013).sin() * 0.9).collect::<Vec<_>>())
    }

    #[test]
    fn output_is_deterministic() {
        let env = ramp_envelope(500).padded(20);
        let interp = FrameInterpolator::new(&env, 30, 8000, 16, 20, 3.5).unwrap();
        for idx in [0, 7, 13, 29] {
            let a = interp.bars_at(idx).unwrap();
            let b = interp.bars_at(idx).unwrap();
            assert_eq!(a.len(), 20);
            assert!(a.iter().zip(&b).all(|(x, y)| x.to_bits() == y.to_bits()));
        }
    }

    #[test]
    fn weight_is_half_at_midpoint() {
        for speed in [0.1, 1.0, 3.5, 40.0] {
            for s in [0.5, 1.0, 2.0] {
                assert_eq!(crossfade_weight(speed, s, 0.5), 0.5);
            }
        }
        assert!(crossfade_weight(3.5, 2.0, 0.0) < 0.05);
        assert!(crossfade_weight(3.5, 2.0, 1.0) > 0.95);
    }

    #[test]
    fn speedup_is_clamped() {
        assert_eq!(speedup(0.0), MIN_SPEEDUP);
        assert_eq!(speedup(1e-9), MIN_SPEEDUP);
        assert_eq!(speedup(1.0), MAX_SPEEDUP);
        assert_eq!(speedup(50.0), MAX_SPEEDUP);
        let mid = speedup(0.5);
        assert!(mid > MIN_SPEEDUP && mid < MAX_SPEEDUP);
    }

    #[test]
    fn edge_bars_are_zero() {
        let env = Envelope::from(vec![0.8; 400]).padded(16);
        let interp = FrameInterpolator::new(&env, 60, 16000, 160, 16, 3.5).unwrap();
        for idx in 0..40 {
            let bars = interp.bars_at(idx).unwrap();
            assert!(bars[0].abs() < 1e-12);
            assert!(bars[15].abs() < 1e-12);
        }
    }

    #[test]
    fn single_bar_does_not_divide_by_zero() {
        assert_eq!(hann_taper(0, 1), 1.0);
        let env = Envelope::from(vec![0.6; 50]).padded(1);
        let interp = FrameInterpolator::new(&env, 60, 16000, 160, 1, 3.5).unwrap();
        for idx in 0..30 {
            let bars = interp.bars_at(idx).unwrap();
            assert_eq!(bars.len(), 1);
            assert!(bars[0].is_finite());
        }
    }

    #[test]
    fn first_frame_reads_first_two_groups_only() {
        let bars = 50;
        let mut values = vec![0.0; 100 + 3 * bars];
        for v in &mut values[2 * bars..] {
            *v = f64::NAN;
        }
        let env = Envelope::from(values);
        let interp = FrameInterpolator::new(&env, 60, 16000, 160, bars, 3.5).unwrap();
        assert_eq!(interp.position(0), 0.0);
        assert!(interp.bars_at(0).unwrap().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn last_frame_stays_inside_padded_envelope() {
        let sample_rate = 16000;
        let signal: Vec<f32> = (0..sample_rate).map(|i| (i as f32 * 0.02).sin()).collect();
        let (rate, bars) = (60u32, 50usize);
        let params = AnalysisParams::new(800, 160).unwrap();
        let env = Envelope::extract(&signal, params).padded(bars);

        let interp =
            FrameInterpolator::new(&env, rate, sample_rate as u32, params.stride, bars, 3.5).unwrap();
        let frames = (rate as f64 * signal.len() as f64 / sample_rate as f64).round() as usize;
        assert_eq!(frames, 60);
        for idx in 0..frames {
            assert!(interp.bars_at(idx).is_ok(), "frame {idx}");
        }
    }

    #[test]
    fn reports_out_of_range_frames() {
        let env = Envelope::from(vec![0.1; 10]);
        let interp = FrameInterpolator::new(&env, 1, 100, 10, 5, 3.5).unwrap();
        match interp.bars_at(100) {
            Err(WaveError::Resource(msg)) => assert!(msg.starts_with("frame 100:")),
            other => panic!("expected resource error, got {other:?}"),
        }
    }
}
