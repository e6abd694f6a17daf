//! Audio post-processing
//!
//! Smooths raw synthesis output before playback: dynamic range compression,
//! de-essing, then peak normalization. Every stage is fail-safe: if a stage
//! produces a non-finite sample the original buffer is returned unchanged so
//! a numeric edge case never silences a phrase.

use tracing::warn;

use crate::config::DspConfig;

/// Amplitudes below this are treated as silence when computing gain
const SILENCE_FLOOR: f32 = 1e-6;

/// Width of the soft knee around the compressor threshold, in decibels
const KNEE_DB: f32 = 6.0;

/// Smoothing window for de-essed samples, centered on the offender
const DEESS_WINDOW: usize = 5;

/// Post-processing chain applied to synthesized audio
#[derive(Debug, Clone)]
pub struct PostProcessor {
    config: DspConfig,
    sample_rate: u32,
}

impl PostProcessor {
    /// Create a processor for audio at the given sample rate
    #[must_use]
    pub const fn new(config: DspConfig, sample_rate: u32) -> Self {
        Self {
            config,
            sample_rate,
        }
    }

    /// Run the full chain: compression, de-essing, normalization
    ///
    /// Returns the input unchanged when it is empty or when any stage
    /// produces a non-finite sample.
    #[must_use]
    pub fn process(&self, samples: &[f32]) -> Vec<f32> {
        if samples.is_empty() {
            return Vec::new();
        }

        let compressed = self.compress(samples);
        let deessed = self.deess(&compressed);
        let normalized = self.normalize(&deessed);

        if normalized.iter().all(|s| s.is_finite()) {
            normalized
        } else {
            warn!("post-processing produced non-finite samples, passing audio through");
            samples.to_vec()
        }
    }

    /// Soft-knee compression with an attack/release envelope follower
    ///
    /// Gain reduction is computed in the decibel domain at the configured
    /// ratio once the envelope crosses the threshold.
    fn compress(&self, samples: &[f32]) -> Vec<f32> {
        let attack = envelope_coefficient(self.config.attack_ms, self.sample_rate);
        let release = envelope_coefficient(self.config.release_ms, self.sample_rate);
        let threshold = self.config.compressor_threshold;
        let ratio = self.config.compressor_ratio;

        let mut envelope = 0.0f32;
        samples
            .iter()
            .map(|&sample| {
                let level = sample.abs();
                let coeff = if level > envelope { attack } else { release };
                envelope = coeff.mul_add(envelope, (1.0 - coeff) * level);
                sample * compressor_gain(envelope, threshold, ratio)
            })
            .collect()
    }

    /// Smooth out samples whose local high-frequency energy marks sibilance
    ///
    /// An interior sample's energy is the sum of absolute differences to its
    /// immediate neighbors; above the threshold the sample is replaced by the
    /// unweighted mean of the surrounding window, clamped at buffer edges.
    fn deess(&self, samples: &[f32]) -> Vec<f32> {
        if samples.len() < 3 {
            return samples.to_vec();
        }

        let threshold = self.config.deess_threshold;
        let reach = DEESS_WINDOW / 2;
        let mut out = samples.to_vec();
        for i in 1..samples.len() - 1 {
            let energy =
                (samples[i] - samples[i - 1]).abs() + (samples[i + 1] - samples[i]).abs();
            if energy > threshold {
                let start = i.saturating_sub(reach);
                let end = (i + reach).min(samples.len() - 1);
                let window = &samples[start..=end];
                out[i] = window.iter().sum::<f32>() / window.len() as f32;
            }
        }
        out
    }

    /// Raise quiet audio up to the target peak
    ///
    /// Never attenuates: buffers whose peak already meets the target are left
    /// unmodified, which makes repeated application a no-op.
    fn normalize(&self, samples: &[f32]) -> Vec<f32> {
        let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        if peak < SILENCE_FLOOR || peak >= self.config.normalize_target {
            return samples.to_vec();
        }

        let gain = self.config.normalize_target / peak;
        samples.iter().map(|s| s * gain).collect()
    }
}

/// One-pole envelope coefficient for a time constant in milliseconds
fn envelope_coefficient(time_ms: f32, sample_rate: u32) -> f32 {
    let samples = time_ms * 0.001 * sample_rate as f32;
    if samples <= 0.0 {
        0.0
    } else {
        (-1.0 / samples).exp()
    }
}

/// Linear gain for an envelope level under a soft-knee dB transfer curve
fn compressor_gain(envelope: f32, threshold: f32, ratio: f32) -> f32 {
    if envelope < SILENCE_FLOOR {
        return 1.0;
    }

    let over_db = 20.0 * (envelope / threshold).log10();
    let half_knee = KNEE_DB / 2.0;
    let reduction_db = if over_db <= -half_knee {
        0.0
    } else if over_db >= half_knee {
        over_db * (1.0 - 1.0 / ratio)
    } else {
        // quadratic blend between unity and the compressed slope
        let excess = over_db + half_knee;
        (1.0 - 1.0 / ratio) * excess * excess / (2.0 * KNEE_DB)
    };
    10f32.powf(-reduction_db / 20.0)
}
