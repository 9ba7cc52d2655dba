//! Decoded sample buffers and the simple effects applied before output.

use std::time::Duration;

/// Interleaved `f32` samples in `[-1.0, 1.0]` plus the format needed to play them
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Number of sample frames (one sample per channel)
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Peak-normalized copy
    pub fn normalized(&self) -> Self {
        Self {
            samples: normalize(&self.samples),
            ..self.clone()
        }
    }

    /// Copy with linear fades measured in milliseconds.
    ///
    /// Ramps cover whole frames, so for stereo the sample counts handed to
    /// [`apply_fade`] are twice the frame counts.
    pub fn with_fades(&self, fade_in_ms: u64, fade_out_ms: u64) -> Self {
        let channels = self.channels.max(1) as usize;
        let fade_in = ms_to_samples(fade_in_ms, self.sample_rate).saturating_mul(channels);
        let fade_out = ms_to_samples(fade_out_ms, self.sample_rate).saturating_mul(channels);

        Self {
            samples: apply_fade(&self.samples, fade_in, fade_out),
            ..self.clone()
        }
    }
}

/// Scale so the loudest sample hits 1.0. Silence comes back untouched.
pub fn normalize(samples: &[f32]) -> Vec<f32> {
    let peak = samples.iter().fold(0.0f32, |peak, s| peak.max(s.abs()));

    // dividing keeps the peak at exactly 1.0, so a second pass is a no-op
    if peak > 0.0 {
        samples.iter().map(|s| s / peak).collect()
    } else {
        samples.to_vec()
    }
}

/// Linear fade-in over the first `fade_in_samples` and fade-out over the last
/// `fade_out_samples`.
///
/// Sample `i` of the fade-in is scaled by `i / fade_in_samples`; sample `j` in
/// the fade-out region by `(len - j) / fade_out_samples`. A fade longer than the
/// buffer is truncated, not compressed. Where the regions overlap both factors
/// apply.
pub fn apply_fade(samples: &[f32], fade_in_samples: usize, fade_out_samples: usize) -> Vec<f32> {
    let mut out = samples.to_vec();
    let len = out.len();

    for (i, sample) in out.iter_mut().enumerate().take(fade_in_samples) {
        *sample *= i as f32 / fade_in_samples as f32;
    }

    if fade_out_samples > 0 {
        let start = len.saturating_sub(fade_out_samples);
        for (j, sample) in out.iter_mut().enumerate().skip(start) {
            *sample *= (len - j) as f32 / fade_out_samples as f32;
        }
    }

    out
}

/// `ms * sample_rate / 1000`, truncated. Saturates at `usize::MAX`.
pub fn ms_to_samples(ms: u64, sample_rate: u32) -> usize {
    let samples = ms as u128 * sample_rate as u128 / 1000;
    usize::try_from(samples).unwrap_or(usize::MAX)
}
