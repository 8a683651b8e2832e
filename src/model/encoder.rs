use candle_core::{Device, Module, Tensor};
use candle_nn::{Linear, VarBuilder};
use serde::Deserialize;

use crate::types::Features;

/// Largest value of the exponentiated sigmoid, `2 * sigmoid(x) ^ ln(10)`.
const EXP_SIGMOID_MAX: f64 = 2.0;
const EXP_SIGMOID_FLOOR: f64 = 1e-7;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MlpEncoderConfig {
    #[serde(default = "default_hidden_size")]
    pub hidden_size: usize,
    #[serde(default = "default_num_layers")]
    pub num_layers: usize,
    #[serde(default = "default_f0_min")]
    pub f0_min: f64,
    #[serde(default = "default_f0_max")]
    pub f0_max: f64,
}

fn default_hidden_size() -> usize {
    256
}

fn default_num_layers() -> usize {
    3
}

fn default_f0_min() -> f64 {
    65.0
}

fn default_f0_max() -> f64 {
    1047.0
}

impl Default for MlpEncoderConfig {
    fn default() -> Self {
        Self {
            hidden_size: default_hidden_size(),
            num_layers: default_num_layers(),
            f0_min: default_f0_min(),
            f0_max: default_f0_max(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EncoderConfig {
    Mlp(MlpEncoderConfig),
}

/// Per-frame synthesis controls (`frames x channels` for the parameter sets).
#[derive(Debug, Clone, PartialEq)]
pub struct FrameControls {
    pub f0_hz: Vec<f32>,
    pub harmonic_params: Vec<Vec<f32>>,
    pub noise_params: Vec<Vec<f32>>,
}

impl FrameControls {
    pub fn num_frames(&self) -> usize {
        self.f0_hz.len()
    }
}

/// Stack of linear layers with ReLU between them. The last layer emits
/// `1 + harmonic_dim + noise_dim` channels: f0 first, then the oscillator
/// parameters.
///
/// Checkpoint keys: `layers.{i}.weight` / `layers.{i}.bias` under the
/// encoder prefix.
pub(crate) struct MlpEncoder {
    layers: Vec<Linear>,
    device: Device,
    in_dim: usize,
    harmonic_dim: usize,
    noise_dim: usize,
    f0_min: f64,
    f0_max: f64,
}

impl MlpEncoder {
    pub(crate) fn load(
        cfg: &MlpEncoderConfig,
        in_dim: usize,
        harmonic_dim: usize,
        noise_dim: usize,
        vb: VarBuilder,
    ) -> candle_core::Result<Self> {
        if cfg.num_layers == 0 {
            candle_core::bail!("encoder needs at least one layer");
        }
        if !(cfg.f0_min > 0.0 && cfg.f0_max > cfg.f0_min) {
            candle_core::bail!(
                "encoder f0 range must satisfy 0 < f0_min < f0_max, got {}..{}",
                cfg.f0_min,
                cfg.f0_max
            );
        }
        let out_dim = 1 + harmonic_dim + noise_dim;
        let vb_layers = vb.pp("layers");
        let mut layers = Vec::with_capacity(cfg.num_layers);
        for i in 0..cfg.num_layers {
            let input = if i == 0 { in_dim } else { cfg.hidden_size };
            let output = if i + 1 == cfg.num_layers {
                out_dim
            } else {
                cfg.hidden_size
            };
            layers.push(candle_nn::linear(input, output, vb_layers.pp(i))?);
        }
        Ok(Self {
            layers,
            device: vb.device().clone(),
            in_dim,
            harmonic_dim,
            noise_dim,
            f0_min: cfg.f0_min,
            f0_max: cfg.f0_max,
        })
    }

    pub(crate) fn forward(&self, features: &Features) -> candle_core::Result<FrameControls> {
        let frames = features.num_frames();
        if frames == 0 {
            return Ok(FrameControls {
                f0_hz: Vec::new(),
                harmonic_params: Vec::new(),
                noise_params: Vec::new(),
            });
        }
        if features.num_features() != self.in_dim {
            candle_core::bail!(
                "encoder expects {} features per frame, got {}",
                self.in_dim,
                features.num_features()
            );
        }

        let flat: Vec<f32> = features.values.iter().flatten().copied().collect();
        let mut xs = Tensor::from_vec(flat, (frames, self.in_dim), &self.device)?;
        let last = self.layers.len() - 1;
        for (i, layer) in self.layers.iter().enumerate() {
            xs = layer.forward(&xs)?;
            if i < last {
                xs = xs.relu()?;
            }
        }

        let f0 = self.scale_f0(&xs.narrow(1, 0, 1)?)?;
        let harmonic = exp_sigmoid(&xs.narrow(1, 1, self.harmonic_dim)?)?;
        let noise = exp_sigmoid(&xs.narrow(1, 1 + self.harmonic_dim, self.noise_dim)?)?;

        Ok(FrameControls {
            f0_hz: f0.squeeze(1)?.to_vec1()?,
            harmonic_params: harmonic.to_vec2()?,
            noise_params: noise.to_vec2()?,
        })
    }

    /// Log-scaled sigmoid: `f0_min * (f0_max / f0_min) ^ sigmoid(x)`.
    fn scale_f0(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let log_ratio = (self.f0_max / self.f0_min).ln();
        candle_nn::ops::sigmoid(xs)?
            .affine(log_ratio, self.f0_min.ln())?
            .exp()
    }
}

fn exp_sigmoid(xs: &Tensor) -> candle_core::Result<Tensor> {
    candle_nn::ops::sigmoid(xs)?
        .powf(std::f64::consts::LN_10)?
        .affine(EXP_SIGMOID_MAX, EXP_SIGMOID_FLOOR)
}
