use std::path::Path;

use serde::Deserialize;

use crate::error::EvalError;
use crate::metrics::pitch::VOICING_FLOOR_HZ;
use crate::metrics::spectral::DEFAULT_RESOLUTIONS;
use crate::metrics::stft::WindowFn;
use crate::model::decoder::DecoderConfig;
use crate::model::encoder::EncoderConfig;
use crate::model::feature_transform::FeatureTransformConfig;
use crate::model::registry::{
    decoder_registry, encoder_registry, feature_transform_registry, ComponentSpec,
};
use crate::pitch::PitchSearch;

#[derive(Debug, Clone)]
pub struct EvalConfig {
    pub config_path: String,
    pub checkpoint_path: String,
    pub device: String,
    pub resolutions: Vec<usize>,
    pub window: WindowFn,
    pub voicing_floor_hz: f64,
    pub pitch_search: PitchSearch,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            config_path: String::new(),
            checkpoint_path: String::new(),
            device: "cpu".to_string(),
            resolutions: DEFAULT_RESOLUTIONS.to_vec(),
            window: WindowFn::Hann,
            voicing_floor_hz: VOICING_FLOOR_HZ,
            pitch_search: PitchSearch::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfigFile {
    model: RawModelSection,
}

/// The `model` section as written by the training setup. Anything not listed
/// here (the training `criterion`, optimiser settings) is ignored.
#[derive(Debug, Deserialize)]
struct RawModelSection {
    sample_rate: u32,
    #[serde(default)]
    window: WindowFn,
    hop_length: usize,
    feature_trsfm: ComponentSpec,
    encoder: ComponentSpec,
    decoder: ComponentSpec,
}

/// Typed vocoder architecture resolved from the YAML config.
#[derive(Debug, Clone, PartialEq)]
pub struct VocoderModelConfig {
    pub sample_rate_hz: u32,
    pub hop_length: usize,
    pub window: WindowFn,
    pub feature_transform: FeatureTransformConfig,
    pub encoder: EncoderConfig,
    pub decoder: DecoderConfig,
}

impl VocoderModelConfig {
    pub fn load(path: &Path) -> Result<Self, EvalError> {
        let data =
            std::fs::read_to_string(path).map_err(|e| EvalError::io("read model config", e))?;
        Self::from_yaml_str(&data)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, EvalError> {
        let raw: RawConfigFile =
            serde_yaml::from_str(yaml).map_err(|e| EvalError::yaml("parse model config", e))?;
        Self::resolve(raw.model)
    }

    fn resolve(raw: RawModelSection) -> Result<Self, EvalError> {
        if raw.sample_rate == 0 || raw.hop_length == 0 {
            return Err(EvalError::configuration(format!(
                "model section needs positive sample_rate and hop_length, got {} and {}",
                raw.sample_rate, raw.hop_length
            )));
        }

        let mut feature_trsfm = raw.feature_trsfm;
        feature_trsfm.inject("sample_rate", raw.sample_rate)?;
        feature_trsfm.inject("window", raw.window.as_str())?;
        feature_trsfm.inject("hop_length", raw.hop_length as u64)?;

        let config = Self {
            sample_rate_hz: raw.sample_rate,
            hop_length: raw.hop_length,
            window: raw.window,
            feature_transform: feature_transform_registry().resolve(&feature_trsfm)?,
            encoder: encoder_registry().resolve(&raw.encoder)?,
            decoder: decoder_registry().resolve(&raw.decoder)?,
        };
        tracing::debug!(
            sample_rate_hz = config.sample_rate_hz,
            hop_length = config.hop_length,
            feature_transform = feature_trsfm.kind(),
            encoder = raw.encoder.kind(),
            decoder = raw.decoder.kind(),
            "model config resolved"
        );
        Ok(config)
    }
}

#[cfg(test)]
pub(crate) const SAMPLE_MODEL_YAML: &str = r#"
model:
  sample_rate: 16000
  window: hanning
  hop_length: 80
  feature_trsfm:
    class_path: ltng.features.LogMelSpectrogram
    init_args:
      n_fft: 512
      n_mels: 16
  encoder:
    class_path: models.enc.MlpEncoder
    init_args:
      hidden_size: 8
      num_layers: 2
  criterion:
    class_path: loss.spec.MSSLoss
    init_args:
      n_ffts: [512, 1024, 2048]
  decoder:
    class_path: models.dec.HarmonicNoiseDecoder
    init_args:
      harm_oscillator:
        class_path: models.synth.HarmonicOscillator
        init_args:
          num_harmonics: 4
      noise_generator:
        class_path: models.synth.WhiteNoiseGenerator
      harm_filter: null
      noise_filter:
        class_path: models.filters.LowpassFilter
        init_args:
          cutoff_hz: 4000.0
      end_filter: null
"#;
