use std::path::Path;

use crate::config::{EvalConfig, VocoderModelConfig};
use crate::error::EvalError;
use crate::metrics::spectral::MultiResolutionSpectralDistance;
use crate::metrics::stft::WindowFn;
use crate::model::{DdspVocoder, ExecutionContext};
use crate::pipeline::runtime::{Evaluator, EvaluatorParts};
use crate::pipeline::traits::{PitchExtractor, VocoderModel};
use crate::pitch::YinPitchExtractor;

pub struct EvaluatorBuilder {
    config: EvalConfig,
    context: Option<ExecutionContext>,
    model: Option<Box<dyn VocoderModel>>,
    pitch_extractor: Option<Box<dyn PitchExtractor>>,
}

impl EvaluatorBuilder {
    pub fn new(config: EvalConfig) -> Self {
        Self {
            config,
            context: None,
            model: None,
            pitch_extractor: None,
        }
    }

    pub fn with_context(mut self, context: ExecutionContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_model(mut self, model: Box<dyn VocoderModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_pitch_extractor(mut self, pitch_extractor: Box<dyn PitchExtractor>) -> Self {
        self.pitch_extractor = Some(pitch_extractor);
        self
    }

    pub fn with_resolutions(mut self, resolutions: Vec<usize>) -> Self {
        self.config.resolutions = resolutions;
        self
    }

    pub fn with_window(mut self, window: WindowFn) -> Self {
        self.config.window = window;
        self
    }

    pub fn build(self) -> Result<Evaluator, EvalError> {
        let voicing_floor_hz = self.config.voicing_floor_hz;
        if voicing_floor_hz.is_nan() || voicing_floor_hz <= 0.0 {
            return Err(EvalError::configuration(format!(
                "voicing floor must be positive, got {voicing_floor_hz}"
            )));
        }
        self.config.pitch_search.validate()?;
        let spectral =
            MultiResolutionSpectralDistance::new(&self.config.resolutions, self.config.window)
                .map_err(|e| EvalError::configuration(e.to_string()))?;

        let model = match self.model {
            Some(model) => model,
            None => {
                let model_cfg = VocoderModelConfig::load(Path::new(&self.config.config_path))?;
                let context = match self.context {
                    Some(context) => context,
                    None => ExecutionContext::from_label(&self.config.device)?,
                };
                Box::new(DdspVocoder::load(
                    &model_cfg,
                    Path::new(&self.config.checkpoint_path),
                    context,
                )?)
            }
        };

        Ok(Evaluator::from_parts(EvaluatorParts {
            model,
            pitch_extractor: self
                .pitch_extractor
                .unwrap_or_else(|| Box::new(YinPitchExtractor::default())),
            spectral,
            pitch_search: self.config.pitch_search,
            voicing_floor_hz,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use candle_core::{DType, Device, Tensor};

    use super::*;
    use crate::config::SAMPLE_MODEL_YAML;
    use crate::types::{Features, VocoderOutput};

    struct MockModel;

    impl VocoderModel for MockModel {
        fn feature_transform(&self, _waveform: &[f32]) -> Result<Features, EvalError> {
            Ok(Features {
                values: Vec::new(),
                hop_length: 1,
            })
        }

        fn infer(&self, _features: &Features) -> Result<VocoderOutput, EvalError> {
            Ok(VocoderOutput {
                f0_hz: Vec::new(),
                harmonic: Vec::new(),
                noise: Vec::new(),
                waveform: Vec::new(),
            })
        }

        fn sample_rate_hz(&self) -> u32 {
            16_000
        }

        fn device_label(&self) -> String {
            "mock".to_string()
        }
    }

    #[test]
    fn injected_model_skips_loading() {
        let evaluator = EvaluatorBuilder::new(EvalConfig::default())
            .with_model(Box::new(MockModel))
            .build()
            .expect("build should succeed");
        assert_eq!(evaluator.device_label(), "mock");
        assert_eq!(evaluator.spectral_distance().resolutions(), vec![512, 1024, 2048]);
        assert_eq!(evaluator.voicing_floor_hz(), 80.0);
    }

    #[test]
    fn overrides_reach_the_spectral_metric() {
        let evaluator = EvaluatorBuilder::new(EvalConfig::default())
            .with_model(Box::new(MockModel))
            .with_resolutions(vec![256, 128])
            .with_window(WindowFn::Hamming)
            .build()
            .unwrap();
        let spectral = evaluator.spectral_distance();
        assert_eq!(spectral.resolutions(), vec![256, 128]);
        assert_eq!(spectral.window_fn(), WindowFn::Hamming);
        assert_eq!(spectral.min_signal_len(), 256);
    }

    #[test]
    fn bad_metric_settings_are_configuration_errors() {
        let empty = EvaluatorBuilder::new(EvalConfig::default())
            .with_model(Box::new(MockModel))
            .with_resolutions(Vec::new())
            .build();
        assert!(matches!(empty, Err(EvalError::Configuration { .. })));

        let config = EvalConfig {
            voicing_floor_hz: 0.0,
            ..EvalConfig::default()
        };
        let floor = EvaluatorBuilder::new(config)
            .with_model(Box::new(MockModel))
            .build();
        assert!(matches!(floor, Err(EvalError::Configuration { .. })));
    }

    #[test]
    fn build_fails_on_missing_config_file() {
        let config = EvalConfig {
            config_path: "/nonexistent/config.yaml".to_string(),
            ..EvalConfig::default()
        };
        let result = EvaluatorBuilder::new(config).build();
        assert!(matches!(result, Err(EvalError::Io { .. })));
    }

    #[test]
    fn build_loads_config_and_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        std::fs::write(&config_path, SAMPLE_MODEL_YAML).unwrap();

        let device = Device::Cpu;
        let tensors: HashMap<String, Tensor> = [
            ("encoder.layers.0.weight", Tensor::zeros((8, 16), DType::F32, &device)),
            ("encoder.layers.0.bias", Tensor::zeros(8, DType::F32, &device)),
            ("encoder.layers.1.weight", Tensor::zeros((6, 8), DType::F32, &device)),
            ("encoder.layers.1.bias", Tensor::zeros(6, DType::F32, &device)),
        ]
        .into_iter()
        .map(|(name, tensor)| (name.to_string(), tensor.unwrap()))
        .collect();
        let checkpoint_path = dir.path().join("model.safetensors");
        candle_core::safetensors::save(&tensors, &checkpoint_path).unwrap();

        let config = EvalConfig {
            config_path: config_path.to_string_lossy().to_string(),
            checkpoint_path: checkpoint_path.to_string_lossy().to_string(),
            ..EvalConfig::default()
        };
        let evaluator = EvaluatorBuilder::new(config).build().unwrap();
        assert_eq!(evaluator.device_label(), "cpu");
    }
}
