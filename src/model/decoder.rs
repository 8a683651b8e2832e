use crate::error::EvalError;
use crate::model::encoder::FrameControls;
use crate::model::filter::{Filter, FilterConfig};
use crate::model::oscillator::{Oscillator, OscillatorConfig};

#[derive(Debug, Clone, PartialEq)]
pub struct DecoderConfig {
    pub harm_oscillator: OscillatorConfig,
    pub noise_generator: OscillatorConfig,
    pub harm_filter: Option<FilterConfig>,
    pub noise_filter: Option<FilterConfig>,
    pub end_filter: Option<FilterConfig>,
}

/// The two rendered branches and their sum, all `frames * hop_length` long.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub harmonic: Vec<f32>,
    pub noise: Vec<f32>,
    pub waveform: Vec<f32>,
}

/// Harmonic-plus-noise synthesis with optional filter stages on each branch
/// and on the mix.
pub struct HarmonicNoiseDecoder {
    harm_oscillator: Box<dyn Oscillator>,
    noise_generator: Box<dyn Oscillator>,
    harm_filter: Option<Box<dyn Filter>>,
    noise_filter: Option<Box<dyn Filter>>,
    end_filter: Option<Box<dyn Filter>>,
}

impl HarmonicNoiseDecoder {
    pub fn from_config(cfg: &DecoderConfig) -> Result<Self, EvalError> {
        Ok(Self {
            harm_oscillator: cfg.harm_oscillator.build()?,
            noise_generator: cfg.noise_generator.build()?,
            harm_filter: cfg.harm_filter.as_ref().map(FilterConfig::build).transpose()?,
            noise_filter: cfg.noise_filter.as_ref().map(FilterConfig::build).transpose()?,
            end_filter: cfg.end_filter.as_ref().map(FilterConfig::build).transpose()?,
        })
    }

    pub fn harmonic_params(&self) -> usize {
        self.harm_oscillator.num_params()
    }

    pub fn noise_params(&self) -> usize {
        self.noise_generator.num_params()
    }

    pub fn decode(
        &self,
        controls: &FrameControls,
        hop_length: usize,
        sample_rate_hz: u32,
    ) -> DecodedAudio {
        let mut harmonic = self.harm_oscillator.generate(
            &controls.f0_hz,
            &controls.harmonic_params,
            hop_length,
            sample_rate_hz,
        );
        if let Some(filter) = &self.harm_filter {
            filter.process(&mut harmonic, sample_rate_hz);
        }

        let mut noise = self.noise_generator.generate(
            &controls.f0_hz,
            &controls.noise_params,
            hop_length,
            sample_rate_hz,
        );
        if let Some(filter) = &self.noise_filter {
            filter.process(&mut noise, sample_rate_hz);
        }

        let mut waveform: Vec<f32> = harmonic.iter().zip(&noise).map(|(h, n)| h + n).collect();
        if let Some(filter) = &self.end_filter {
            filter.process(&mut waveform, sample_rate_hz);
        }

        DecodedAudio {
            harmonic,
            noise,
            waveform,
        }
    }
}
