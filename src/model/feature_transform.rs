use serde::Deserialize;

use crate::error::EvalError;
use crate::metrics::stft::{Stft, WindowFn};
use crate::types::Features;

const LOG_FLOOR: f32 = 1e-5;

/// Turns a waveform into frame-wise model input.
pub trait FeatureTransform: Send + Sync {
    fn transform(&self, waveform: &[f32]) -> Result<Features, EvalError>;

    fn num_features(&self) -> usize;

    fn hop_length(&self) -> usize;
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MelSpectrogramConfig {
    pub sample_rate: u32,
    pub hop_length: usize,
    #[serde(default)]
    pub window: WindowFn,
    #[serde(default = "default_n_fft")]
    pub n_fft: usize,
    #[serde(default = "default_n_mels")]
    pub n_mels: usize,
    #[serde(default)]
    pub f_min: f64,
    /// Defaults to Nyquist.
    #[serde(default)]
    pub f_max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SpectrogramConfig {
    pub sample_rate: u32,
    pub hop_length: usize,
    #[serde(default)]
    pub window: WindowFn,
    #[serde(default = "default_n_fft")]
    pub n_fft: usize,
}

fn default_n_fft() -> usize {
    1024
}

fn default_n_mels() -> usize {
    80
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeatureTransformConfig {
    LogMel(MelSpectrogramConfig),
    LogSpectrogram(SpectrogramConfig),
}

impl FeatureTransformConfig {
    pub fn build(&self) -> Result<Box<dyn FeatureTransform>, EvalError> {
        Ok(match self {
            Self::LogMel(cfg) => Box::new(LogMelSpectrogram::new(cfg)?),
            Self::LogSpectrogram(cfg) => Box::new(LogSpectrogram::new(cfg)?),
        })
    }
}

/// `ln(max(mel, 1e-5))` over a triangular HTK mel filterbank.
pub struct LogMelSpectrogram {
    stft: Stft,
    filterbank: Vec<Vec<f32>>,
}

impl LogMelSpectrogram {
    pub fn new(cfg: &MelSpectrogramConfig) -> Result<Self, EvalError> {
        if cfg.sample_rate == 0 || cfg.n_mels == 0 {
            return Err(EvalError::configuration(format!(
                "mel spectrogram needs positive sample_rate and n_mels, got {} and {}",
                cfg.sample_rate, cfg.n_mels
            )));
        }
        let nyquist = cfg.sample_rate as f64 / 2.0;
        let f_max = cfg.f_max.unwrap_or(nyquist);
        if !(cfg.f_min >= 0.0 && f_max > cfg.f_min && f_max <= nyquist) {
            return Err(EvalError::configuration(format!(
                "mel range must satisfy 0 <= f_min < f_max <= {nyquist}, got {}..{f_max}",
                cfg.f_min
            )));
        }
        let stft = Stft::new(cfg.n_fft, cfg.hop_length, cfg.window, true, false)
            .map_err(|e| EvalError::configuration(e.to_string()))?;
        let filterbank =
            mel_filterbank(stft.num_bins(), cfg.n_mels, cfg.sample_rate, cfg.f_min, f_max);
        Ok(Self { stft, filterbank })
    }
}

impl FeatureTransform for LogMelSpectrogram {
    fn transform(&self, waveform: &[f32]) -> Result<Features, EvalError> {
        let values = self
            .stft
            .magnitudes(waveform)
            .into_iter()
            .map(|frame| {
                self.filterbank
                    .iter()
                    .map(|filter| {
                        let energy: f32 = filter.iter().zip(&frame).map(|(w, m)| w * m).sum();
                        energy.max(LOG_FLOOR).ln()
                    })
                    .collect()
            })
            .collect();
        Ok(Features {
            values,
            hop_length: self.stft.hop_length(),
        })
    }

    fn num_features(&self) -> usize {
        self.filterbank.len()
    }

    fn hop_length(&self) -> usize {
        self.stft.hop_length()
    }
}

/// `ln(|X| + 1e-5)` per linear frequency bin.
pub struct LogSpectrogram {
    stft: Stft,
}

impl LogSpectrogram {
    pub fn new(cfg: &SpectrogramConfig) -> Result<Self, EvalError> {
        let stft = Stft::new(cfg.n_fft, cfg.hop_length, cfg.window, true, false)
            .map_err(|e| EvalError::configuration(e.to_string()))?;
        Ok(Self { stft })
    }
}

impl FeatureTransform for LogSpectrogram {
    fn transform(&self, waveform: &[f32]) -> Result<Features, EvalError> {
        let values = self
            .stft
            .magnitudes(waveform)
            .into_iter()
            .map(|frame| frame.into_iter().map(|m| (m + LOG_FLOOR).ln()).collect())
            .collect();
        Ok(Features {
            values,
            hop_length: self.stft.hop_length(),
        })
    }

    fn num_features(&self) -> usize {
        self.stft.num_bins()
    }

    fn hop_length(&self) -> usize {
        self.stft.hop_length()
    }
}

fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10f64.powf(mel / 2595.0) - 1.0)
}

/// `n_mels x num_bins` triangular filters with unit peak, edges equally
/// spaced on the mel scale.
fn mel_filterbank(
    num_bins: usize,
    n_mels: usize,
    sample_rate: u32,
    f_min: f64,
    f_max: f64,
) -> Vec<Vec<f32>> {
    let nyquist = sample_rate as f64 / 2.0;
    let bin_hz: Vec<f64> = (0..num_bins)
        .map(|k| {
            if num_bins > 1 {
                nyquist * k as f64 / (num_bins - 1) as f64
            } else {
                0.0
            }
        })
        .collect();
    let (mel_min, mel_max) = (hz_to_mel(f_min), hz_to_mel(f_max));
    let edges: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f64 / (n_mels + 1) as f64))
        .collect();

    (0..n_mels)
        .map(|m| {
            let (lower, centre, upper) = (edges[m], edges[m + 1], edges[m + 2]);
            bin_hz
                .iter()
                .map(|&f| {
                    let rising = (f - lower) / (centre - lower);
                    let falling = (upper - f) / (upper - centre);
                    rising.min(falling).max(0.0) as f32
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use super::*;

    fn mel_config() -> MelSpectrogramConfig {
        MelSpectrogramConfig {
            sample_rate: 16_000,
            hop_length: 128,
            window: WindowFn::Hann,
            n_fft: 512,
            n_mels: 40,
            f_min: 0.0,
            f_max: None,
        }
    }

    #[test]
    fn mel_scale_round_trips_reference_point() {
        assert!((hz_to_mel(1000.0) - 999.985).abs() < 0.01);
        assert!((mel_to_hz(hz_to_mel(440.0)) - 440.0).abs() < 1e-9);
    }

    #[test]
    fn filterbank_has_unit_peaks_and_no_negative_weights() {
        let fb = mel_filterbank(257, 40, 16_000, 0.0, 8_000.0);
        assert_eq!(fb.len(), 40);
        for filter in &fb {
            assert_eq!(filter.len(), 257);
            assert!(filter.iter().all(|&w| (0.0..=1.0).contains(&w)));
            let peak = filter.iter().copied().fold(0.0f32, f32::max);
            assert!(peak > 0.5, "filter peak {peak}");
        }
    }

    #[test]
    fn log_mel_frames_follow_centered_hop() {
        let transform = LogMelSpectrogram::new(&mel_config()).unwrap();
        let wave = vec![0.0f32; 1280];
        let features = transform.transform(&wave).unwrap();
        assert_eq!(features.num_frames(), 1280 / 128 + 1);
        assert_eq!(features.num_features(), 40);
        assert_eq!(features.hop_length, 128);
        // Silence sits on the log floor.
        assert!(features.values[3].iter().all(|&v| (v - LOG_FLOOR.ln()).abs() < 1e-6));
    }

    #[test]
    fn log_spectrogram_peaks_at_tone_bin() {
        let cfg = SpectrogramConfig {
            sample_rate: 16_000,
            hop_length: 256,
            window: WindowFn::Hann,
            n_fft: 512,
        };
        let transform = LogSpectrogram::new(&cfg).unwrap();
        // 1 kHz lands on bin 32 for a 512-point FFT at 16 kHz.
        let wave: Vec<f32> = (0..4096)
            .map(|i| (2.0 * PI * 1000.0 * i as f32 / 16_000.0).sin())
            .collect();
        let features = transform.transform(&wave).unwrap();
        assert_eq!(transform.num_features(), 257);
        let frame = &features.values[features.num_frames() / 2];
        let peak = frame
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(k, _)| k)
            .unwrap();
        assert_eq!(peak, 32);
    }

    #[test]
    fn rejects_mel_range_above_nyquist() {
        let cfg = MelSpectrogramConfig {
            f_max: Some(12_000.0),
            ..mel_config()
        };
        assert!(matches!(
            LogMelSpectrogram::new(&cfg),
            Err(EvalError::Configuration { .. })
        ));
    }
}
