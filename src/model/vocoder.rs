use std::path::Path;

use candle_core::DType;
use candle_nn::VarBuilder;

use crate::config::VocoderModelConfig;
use crate::error::EvalError;
use crate::model::context::ExecutionContext;
use crate::model::decoder::HarmonicNoiseDecoder;
use crate::model::encoder::{EncoderConfig, MlpEncoder};
use crate::model::feature_transform::FeatureTransform;
use crate::pipeline::traits::VocoderModel;
use crate::types::{Features, VocoderOutput};

/// Feature transform, candle encoder and DSP decoder assembled from a
/// resolved config.
///
/// Trainable weights live under the `encoder.` prefix of the checkpoint; the
/// feature transform and decoder are parameter-free.
pub struct DdspVocoder {
    feature_trsfm: Box<dyn FeatureTransform>,
    encoder: MlpEncoder,
    decoder: HarmonicNoiseDecoder,
    sample_rate_hz: u32,
    context: ExecutionContext,
}

impl DdspVocoder {
    pub fn load(
        cfg: &VocoderModelConfig,
        checkpoint_path: &Path,
        context: ExecutionContext,
    ) -> Result<Self, EvalError> {
        let checkpoint =
            std::fs::read(checkpoint_path).map_err(|e| EvalError::io("read checkpoint", e))?;
        let vb = VarBuilder::from_buffered_safetensors(checkpoint, DType::F32, context.device())
            .map_err(|e| EvalError::runtime("load safetensors", e))?;
        let model = Self::from_var_builder(cfg, vb, context)?;

        tracing::info!(
            checkpoint = %checkpoint_path.display(),
            sample_rate_hz = cfg.sample_rate_hz,
            hop_length = cfg.hop_length,
            features = model.feature_trsfm.num_features(),
            harmonic_params = model.decoder.harmonic_params(),
            noise_params = model.decoder.noise_params(),
            device = %model.context.label(),
            "DDSP vocoder loaded"
        );
        Ok(model)
    }

    pub fn from_var_builder(
        cfg: &VocoderModelConfig,
        vb: VarBuilder,
        context: ExecutionContext,
    ) -> Result<Self, EvalError> {
        let feature_trsfm = cfg.feature_transform.build()?;
        let decoder = HarmonicNoiseDecoder::from_config(&cfg.decoder)?;
        let encoder = match &cfg.encoder {
            EncoderConfig::Mlp(encoder_cfg) => MlpEncoder::load(
                encoder_cfg,
                feature_trsfm.num_features(),
                decoder.harmonic_params(),
                decoder.noise_params(),
                vb.pp("encoder"),
            )
            .map_err(|e| EvalError::runtime("build encoder", e))?,
        };
        Ok(Self {
            feature_trsfm,
            encoder,
            decoder,
            sample_rate_hz: cfg.sample_rate_hz,
            context,
        })
    }
}

impl VocoderModel for DdspVocoder {
    fn feature_transform(&self, waveform: &[f32]) -> Result<Features, EvalError> {
        self.feature_trsfm.transform(waveform)
    }

    fn infer(&self, features: &Features) -> Result<VocoderOutput, EvalError> {
        let controls = self
            .encoder
            .forward(features)
            .map_err(|e| EvalError::runtime("encoder forward pass", e))?;
        let audio = self
            .decoder
            .decode(&controls, features.hop_length, self.sample_rate_hz);
        Ok(VocoderOutput {
            f0_hz: controls.f0_hz,
            harmonic: audio.harmonic,
            noise: audio.noise,
            waveform: audio.waveform,
        })
    }

    fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    fn device_label(&self) -> String {
        self.context.label()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use candle_core::{Device, Tensor};

    use super::*;
    use crate::config::SAMPLE_MODEL_YAML;

    fn model_config() -> VocoderModelConfig {
        VocoderModelConfig::from_yaml_str(SAMPLE_MODEL_YAML).unwrap()
    }

    #[test]
    fn zero_weights_render_full_length_audio() {
        let cfg = model_config();
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        let model = DdspVocoder::from_var_builder(&cfg, vb, ExecutionContext::cpu()).unwrap();

        let wave = vec![0.0f32; 1600];
        let features = model.feature_transform(&wave).unwrap();
        assert_eq!(features.num_frames(), 1600 / 80 + 1);
        assert_eq!(features.num_features(), 16);

        let out = model.infer(&features).unwrap();
        assert_eq!(out.f0_hz.len(), features.num_frames());
        assert_eq!(out.waveform.len(), features.num_frames() * 80);
        assert!(out.waveform.iter().all(|s| s.is_finite()));
        assert!(out.harmonic.iter().any(|&s| s != 0.0));
        assert_eq!(model.sample_rate_hz(), 16_000);
        assert_eq!(model.device_label(), "cpu");
    }

    #[test]
    fn loads_safetensors_checkpoint() {
        let cfg = model_config();
        let device = Device::Cpu;
        // 16 mel features -> 8 hidden -> 1 f0 + 4 harmonics + 1 noise gain.
        let tensors: HashMap<String, Tensor> = [
            ("encoder.layers.0.weight", Tensor::zeros((8, 16), DType::F32, &device)),
            ("encoder.layers.0.bias", Tensor::zeros(8, DType::F32, &device)),
            ("encoder.layers.1.weight", Tensor::zeros((6, 8), DType::F32, &device)),
            ("encoder.layers.1.bias", Tensor::zeros(6, DType::F32, &device)),
        ]
        .into_iter()
        .map(|(name, tensor)| (name.to_string(), tensor.unwrap()))
        .collect();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.safetensors");
        candle_core::safetensors::save(&tensors, &path).unwrap();

        let model = DdspVocoder::load(&cfg, &path, ExecutionContext::cpu()).unwrap();
        let features = model.feature_transform(&vec![0.0f32; 800]).unwrap();
        let out = model.infer(&features).unwrap();
        assert_eq!(out.waveform.len(), features.num_frames() * 80);
    }

    #[test]
    fn checkpoint_with_wrong_shapes_is_runtime_error() {
        let cfg = model_config();
        let device = Device::Cpu;
        let tensors: HashMap<String, Tensor> = [
            ("encoder.layers.0.weight", Tensor::zeros((8, 3), DType::F32, &device)),
            ("encoder.layers.0.bias", Tensor::zeros(8, DType::F32, &device)),
        ]
        .into_iter()
        .map(|(name, tensor)| (name.to_string(), tensor.unwrap()))
        .collect();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.safetensors");
        candle_core::safetensors::save(&tensors, &path).unwrap();

        let err = DdspVocoder::load(&cfg, &path, ExecutionContext::cpu())
            .err()
            .unwrap();
        assert!(matches!(err, EvalError::Runtime { .. }));
    }

    #[test]
    fn missing_checkpoint_is_io_error() {
        let err = DdspVocoder::load(
            &model_config(),
            Path::new("/nonexistent/model.safetensors"),
            ExecutionContext::cpu(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, EvalError::Io { .. }));
    }
}
