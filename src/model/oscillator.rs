use std::f64::consts::{PI, TAU};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

use crate::error::EvalError;

/// Renders per-frame controls to audio at the sample rate.
///
/// Frame `i` is anchored at sample `i * hop_length`; controls are linearly
/// interpolated between anchors and held after the last one. The output has
/// `frames * hop_length` samples.
pub trait Oscillator: Send + Sync {
    /// Control channels consumed per frame.
    fn num_params(&self) -> usize;

    fn generate(
        &self,
        f0_hz: &[f32],
        params: &[Vec<f32>],
        hop_length: usize,
        sample_rate_hz: u32,
    ) -> Vec<f32>;
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HarmonicArgs {
    #[serde(default = "default_num_harmonics")]
    pub num_harmonics: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NoiseArgs {
    #[serde(default)]
    pub seed: u64,
}

fn default_num_harmonics() -> usize {
    64
}

#[derive(Debug, Clone, PartialEq)]
pub enum OscillatorConfig {
    Harmonic(HarmonicArgs),
    Sawtooth(HarmonicArgs),
    WhiteNoise(NoiseArgs),
}

impl OscillatorConfig {
    pub fn build(&self) -> Result<Box<dyn Oscillator>, EvalError> {
        match self {
            Self::Harmonic(args) => Ok(Box::new(HarmonicOscillator::new(args.num_harmonics)?)),
            Self::Sawtooth(args) => Ok(Box::new(SawtoothOscillator::new(args.num_harmonics)?)),
            Self::WhiteNoise(args) => Ok(Box::new(WhiteNoiseGenerator::new(args.seed))),
        }
    }
}

/// Additive sinusoids with one amplitude channel per harmonic.
pub struct HarmonicOscillator {
    num_harmonics: usize,
}

impl HarmonicOscillator {
    pub fn new(num_harmonics: usize) -> Result<Self, EvalError> {
        if num_harmonics == 0 {
            return Err(EvalError::configuration(
                "harmonic oscillator needs at least one harmonic",
            ));
        }
        Ok(Self { num_harmonics })
    }
}

impl Oscillator for HarmonicOscillator {
    fn num_params(&self) -> usize {
        self.num_harmonics
    }

    fn generate(
        &self,
        f0_hz: &[f32],
        params: &[Vec<f32>],
        hop_length: usize,
        sample_rate_hz: u32,
    ) -> Vec<f32> {
        let len = f0_hz.len() * hop_length;
        let f0 = upsample(f0_hz, hop_length, len);
        let amplitudes: Vec<Vec<f32>> = (0..self.num_harmonics)
            .map(|k| upsample(&channel(params, k), hop_length, len))
            .collect();
        additive(&f0, sample_rate_hz, self.num_harmonics, |k, n| {
            amplitudes[k - 1][n] as f64
        })
    }
}

/// Band-limited sawtooth built from `2 / (pi * k)` weighted harmonics, scaled
/// by a single gain channel.
pub struct SawtoothOscillator {
    num_harmonics: usize,
}

impl SawtoothOscillator {
    pub fn new(num_harmonics: usize) -> Result<Self, EvalError> {
        if num_harmonics == 0 {
            return Err(EvalError::configuration(
                "sawtooth oscillator needs at least one harmonic",
            ));
        }
        Ok(Self { num_harmonics })
    }
}

impl Oscillator for SawtoothOscillator {
    fn num_params(&self) -> usize {
        1
    }

    fn generate(
        &self,
        f0_hz: &[f32],
        params: &[Vec<f32>],
        hop_length: usize,
        sample_rate_hz: u32,
    ) -> Vec<f32> {
        let len = f0_hz.len() * hop_length;
        let f0 = upsample(f0_hz, hop_length, len);
        let gain = upsample(&channel(params, 0), hop_length, len);
        additive(&f0, sample_rate_hz, self.num_harmonics, |k, n| {
            2.0 / (PI * k as f64) * gain[n] as f64
        })
    }
}

/// Uniform noise in `[-1, 1)` scaled by a single gain channel. The generator
/// is reseeded on every call so a given input always renders the same audio.
pub struct WhiteNoiseGenerator {
    seed: u64,
}

impl WhiteNoiseGenerator {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl Oscillator for WhiteNoiseGenerator {
    fn num_params(&self) -> usize {
        1
    }

    fn generate(
        &self,
        f0_hz: &[f32],
        params: &[Vec<f32>],
        hop_length: usize,
        _sample_rate_hz: u32,
    ) -> Vec<f32> {
        let len = f0_hz.len() * hop_length;
        let gain = upsample(&channel(params, 0), hop_length, len);
        let mut rng = StdRng::seed_from_u64(self.seed);
        gain.iter().map(|&g| g * rng.gen_range(-1.0f32..1.0)).collect()
    }
}

/// Sum of `amplitude(k, n) * sin(k * phase[n])` over harmonics below Nyquist.
fn additive(
    f0: &[f32],
    sample_rate_hz: u32,
    num_harmonics: usize,
    amplitude: impl Fn(usize, usize) -> f64,
) -> Vec<f32> {
    let sr = sample_rate_hz as f64;
    if sr <= 0.0 {
        return vec![0.0; f0.len()];
    }
    let nyquist = sr / 2.0;
    let mut phase = 0.0f64;
    let mut out = Vec::with_capacity(f0.len());
    for (n, &freq) in f0.iter().enumerate() {
        let freq = freq as f64;
        let mut sample = 0.0f64;
        if freq > 0.0 {
            for k in 1..=num_harmonics {
                if k as f64 * freq >= nyquist {
                    break;
                }
                sample += amplitude(k, n) * (k as f64 * phase).sin();
            }
        }
        out.push(sample as f32);
        phase = (phase + TAU * freq.max(0.0) / sr).rem_euclid(TAU);
    }
    out
}

fn channel(params: &[Vec<f32>], index: usize) -> Vec<f32> {
    params
        .iter()
        .map(|frame| frame.get(index).copied().unwrap_or(0.0))
        .collect()
}

fn upsample(frames: &[f32], hop_length: usize, len: usize) -> Vec<f32> {
    if frames.is_empty() || hop_length == 0 {
        return vec![0.0; len];
    }
    let last = frames.len() - 1;
    (0..len)
        .map(|n| {
            let i = n / hop_length;
            if i >= last {
                return frames[last];
            }
            let frac = (n % hop_length) as f32 / hop_length as f32;
            frames[i] + (frames[i + 1] - frames[i]) * frac
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dominant_period(signal: &[f32]) -> usize {
        // Spacing of consecutive upward zero crossings.
        let crossings: Vec<usize> = signal
            .windows(2)
            .enumerate()
            .filter(|(_, w)| w[0] <= 0.0 && w[1] > 0.0)
            .map(|(i, _)| i)
            .collect();
        crossings[2] - crossings[1]
    }

    #[test]
    fn upsample_interpolates_and_holds() {
        let out = upsample(&[0.0, 4.0], 4, 8);
        assert_eq!(out, vec![0.0, 1.0, 2.0, 3.0, 4.0, 4.0, 4.0, 4.0]);
        assert_eq!(upsample(&[], 4, 3), vec![0.0; 3]);
    }

    #[test]
    fn harmonic_fundamental_has_expected_period() {
        let osc = HarmonicOscillator::new(4).unwrap();
        let frames = 20;
        let f0 = vec![200.0f32; frames];
        let params = vec![vec![1.0, 0.0, 0.0, 0.0]; frames];
        let out = osc.generate(&f0, &params, 80, 16_000);
        assert_eq!(out.len(), frames * 80);
        // 16 kHz / 200 Hz = 80 samples.
        let period = dominant_period(&out);
        assert!((79..=81).contains(&period), "period {period}");
    }

    #[test]
    fn harmonics_above_nyquist_are_silent() {
        let osc = HarmonicOscillator::new(2).unwrap();
        let f0 = vec![5_000.0f32; 4];
        let only_second = vec![vec![0.0, 1.0]; 4];
        let out = osc.generate(&f0, &only_second, 16, 16_000);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn unvoiced_frames_render_silence() {
        let osc = SawtoothOscillator::new(8).unwrap();
        let out = osc.generate(&[0.0; 3], &vec![vec![1.0]; 3], 10, 16_000);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn noise_is_seeded_and_gain_scaled() {
        let noise = WhiteNoiseGenerator::new(7);
        let params = vec![vec![0.5f32]; 8];
        let a = noise.generate(&[100.0; 8], &params, 32, 16_000);
        let b = noise.generate(&[100.0; 8], &params, 32, 16_000);
        assert_eq!(a, b);
        assert_eq!(a.len(), 256);
        assert!(a.iter().all(|s| s.abs() <= 0.5));
        assert!(a.iter().any(|&s| s != 0.0));
    }

    #[test]
    fn zero_harmonics_rejected() {
        assert!(HarmonicOscillator::new(0).is_err());
        assert!(SawtoothOscillator::new(0).is_err());
    }
}
