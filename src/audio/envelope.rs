use crate::error::{Result, WaveError};

/// Largest analysis window accepted, in samples.
pub const MAX_WINDOW: usize = u32::MAX as usize;

/// Analysis window and hop, both in samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnalysisParams {
    pub window: usize,
    pub stride: usize,
}

impl AnalysisParams {
    pub fn new(window: usize, stride: usize) -> Result<Self> {
        if window == 0 || stride == 0 {
            return Err(WaveError::input(format!(
                "analysis window ({window}) and stride ({stride}) must be positive"
            )));
        }
        if window > MAX_WINDOW {
            return Err(WaveError::input(format!(
                "analysis window ({window}) exceeds {MAX_WINDOW} samples"
            )));
        }
        if stride > window {
            return Err(WaveError::input(format!(
                "analysis stride ({stride}) exceeds window ({window}); oversample must be >= 1"
            )));
        }
        Ok(Self { window, stride })
    }

    /// One window per bar over `time` seconds of audio, hopping by
    /// `window / oversample`.
    pub fn derive(sample_rate: u32, time: f64, bars: usize, oversample: f64) -> Result<Self> {
        if bars == 0 {
            return Err(WaveError::input("bar count must be positive"));
        }
        if !(time > 0.0 && time.is_finite()) || !(oversample > 0.0 && oversample.is_finite()) {
            return Err(WaveError::input(format!(
                "time ({time}) and oversample ({oversample}) must be positive and finite"
            )));
        }
        let window = sample_rate as f64 * time / bars as f64;
        if window > MAX_WINDOW as f64 {
            return Err(WaveError::input(format!(
                "analysis window of {window:.0} samples is too large; lower the time per frame ({time}s)"
            )));
        }
        let window = window as usize;
        let stride = (window as f64 / oversample) as usize;
        Self::new(window, stride)
    }
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Soft saturation into (-0.95, 0.95), near-linear for small values.
pub fn compress(v: f64) -> f64 {
    1.9 * (sigmoid(2.5 * v) - 0.5)
}

/// Compressed, rectified short-time amplitude envelope.
///
/// Read-only once built; frame workers share it by reference.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Envelope {
    values: Vec<f64>,
}

impl Envelope {
    pub fn extract(signal: &[f32], params: AnalysisParams) -> Self {
        let AnalysisParams { window, stride } = params;

        let mut padded = vec![0.0f32; signal.len() + window];
        padded[window / 2..window / 2 + signal.len()].copy_from_slice(signal);

        let count = (padded.len() - window) / stride;
        let values = (0..count)
            .map(|k| {
                let off = k * stride;
                compress(rectified_mean(&padded[off..off + window]))
            })
            .collect();

        Self { values }
    }

    /// Surround with zeros so every frame's segment pair is in bounds:
    /// `bars / 2` entries in front, the rest of `3 * bars` at the tail.
    pub fn padded(&self, bars: usize) -> Self {
        let lead = bars / 2;
        let mut values = vec![0.0; self.values.len() + 3 * bars];
        values[lead..lead + self.values.len()].copy_from_slice(&self.values);
        Self { values }
    }

    #[cfg(test)]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// The `index`-th run of `bars` consecutive values.
    pub fn segment(&self, index: usize, bars: usize) -> Option<&[f64]> {
        let start = index.checked_mul(bars)?;
        self.values.get(start..start.checked_add(bars)?)
    }
}

impl From<Vec<f64>> for Envelope {
    fn from(values: Vec<f64>) -> Self {
        Self { values }
    }
}

/// Mean of the positive samples, 0 when there are none.
fn rectified_mean(frame: &[f32]) -> f64 {
    let (sum, count) = frame
        .iter()
        .filter(|&&v| v > 0.0)
        .fold((0.0f64, 0usize), |(sum, n), &v| (sum + v as f64, n + 1));
    if count > 0 {
        sum / count as f64
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(window: usize, stride: usize) -> AnalysisParams {
        AnalysisParams::new(window, stride).unwrap()
    }

    #[test]
    fn length_matches_stride_count() {
        let signal: Vec<f32> = (0..1234).map(|i| (i as f32 * 0.1).sin()).collect();
        for (window, stride) in [(100, 20), (64, 64), (50, 7), (1, 1)] {
            let env = Envelope::extract(&signal, params(window, stride));
            assert_eq!(env.len(), (signal.len() + window - window) / stride);
        }
    }

    #[test]
    fn values_stay_inside_saturation_bounds() {
        let signal: Vec<f32> = (0..4000).map(|i| ((i as f32 * 0.37).sin() * 50.0)).collect();
        let env = Envelope::extract(&signal, params(80, 16));
        assert!(env.values().iter().all(|&v| v > -0.95 && v < 0.95));
    }

    #[test]
    fn silent_window_is_exactly_zero() {
        let env = Envelope::extract(&[0.0; 500], params(50, 10));
        assert!(env.values().iter().all(|&v| v == 0.0));
        assert_eq!(compress(0.0), 0.0);
    }

    #[test]
    fn negative_samples_are_ignored() {
        let env = Envelope::extract(&[-1.0; 400], params(40, 40));
        assert!(env.values().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn averages_only_positive_samples() {
        // window 4 with front pad 2: first window is [0, 0, 1, -1]
        let env = Envelope::extract(&[1.0, -1.0, 1.0, -1.0], params(4, 4));
        assert_eq!(env.len(), 1);
        assert!((env.values()[0] - compress(1.0)).abs() < 1e-12);
    }

    #[test]
    fn one_second_at_16k_yields_100_windows() {
        let signal: Vec<f32> = (0..16000).map(|i| (i as f32 * 0.05).sin()).collect();
        let p = AnalysisParams::derive(16000, 0.4, 50, 5.0).unwrap();
        assert_eq!(p, params(128, 25));

        let env = Envelope::extract(&signal, params(800, 160));
        assert_eq!(env.len(), 100);
    }

    #[test]
    fn padding_centres_values_and_adds_three_bar_groups() {
        let env = Envelope::from(vec![0.5; 10]).padded(4);
        assert_eq!(env.len(), 10 + 12);
        assert_eq!(&env.values()[..2], &[0.0, 0.0]);
        assert_eq!(env.values()[2], 0.5);
        assert_eq!(env.values()[11], 0.5);
        assert!(env.values()[12..].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn segment_is_bounds_checked() {
        let env = Envelope::from((0..10).map(f64::from).collect::<Vec<_>>());
        assert_eq!(env.segment(1, 3), Some(&[3.0, 4.0, 5.0][..]));
        assert_eq!(env.segment(3, 3), None);
        assert_eq!(env.segment(usize::MAX, 3), None);
    }

    #[test]
    fn rejects_invalid_params() {
        assert!(AnalysisParams::new(0, 1).is_err());
        assert!(AnalysisParams::new(10, 0).is_err());
        assert!(AnalysisParams::new(10, 11).is_err());
        assert!(AnalysisParams::new(usize::MAX, 1).is_err());
        assert!(AnalysisParams::derive(16000, 0.4, 50, 0.5).is_err());
        assert!(AnalysisParams::derive(16000, 0.4, 0, 5.0).is_err());
        assert!(AnalysisParams::derive(100, 0.01, 50, 5.0).is_err());
    }

    #[test]
    fn rejects_unbounded_time_and_oversample() {
        for (time, oversample) in [
            (f64::INFINITY, 5.0),
            (1e30, 5.0),
            (f64::NAN, 5.0),
            (0.4, f64::INFINITY),
        ] {
            let err = AnalysisParams::derive(16000, time, 50, oversample).unwrap_err();
            assert!(matches!(err, WaveError::Input(_)), "{time}/{oversample}: {err}");
        }
    }
}
