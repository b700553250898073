use super::decode::PcmBuffer;
use crate::error::{Result, WaveError};

/// Average all channels into one unit-RMS mono signal.
pub fn to_mono_normalized(pcm: &PcmBuffer) -> Result<Vec<f32>> {
    if pcm.frames() == 0 {
        return Err(WaveError::input("audio contains no samples"));
    }
    let mut mono = downmix(pcm);
    normalize(&mut mono);
    Ok(mono)
}

pub fn downmix(pcm: &PcmBuffer) -> Vec<f32> {
    let n = pcm.channels.len() as f32;
    (0..pcm.frames())
        .map(|i| pcm.channels.iter().map(|c| c[i]).sum::<f32>() / n)
        .collect()
}

/// Divide by the root-mean-square. Silent input is left untouched.
pub fn normalize(signal: &mut [f32]) {
    if signal.is_empty() {
        return;
    }
    let mean_sq = signal.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>() / signal.len() as f64;
    let rms = mean_sq.sqrt() as f32;
    if rms == 0.0 || !rms.is_finite() {
        log::warn!("Audio is silent, skipping normalization");
        return;
    }
    for s in signal.iter_mut() {
        *s /= rms;
    }
}
