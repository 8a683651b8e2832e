use std::f64::consts::TAU;

use serde::Deserialize;

use crate::error::EvalError;

/// In-place audio processing stage.
pub trait Filter: Send + Sync {
    fn process(&self, signal: &mut [f32], sample_rate_hz: u32);
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LowpassArgs {
    pub cutoff_hz: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DcBlockerArgs {
    #[serde(default = "default_pole")]
    pub pole: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GainArgs {
    pub gain_db: f64,
}

fn default_pole() -> f64 {
    0.995
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterConfig {
    Lowpass(LowpassArgs),
    DcBlocker(DcBlockerArgs),
    Gain(GainArgs),
}

impl FilterConfig {
    pub fn build(&self) -> Result<Box<dyn Filter>, EvalError> {
        match self {
            Self::Lowpass(args) => Ok(Box::new(LowpassFilter::new(args.cutoff_hz)?)),
            Self::DcBlocker(args) => Ok(Box::new(DcBlocker::new(args.pole)?)),
            Self::Gain(args) => Ok(Box::new(GainFilter::new(args.gain_db))),
        }
    }
}

/// One-pole lowpass, `y[n] = (1 - a) x[n] + a y[n-1]` with
/// `a = exp(-2 pi fc / sr)`.
pub struct LowpassFilter {
    cutoff_hz: f64,
}

impl LowpassFilter {
    pub fn new(cutoff_hz: f64) -> Result<Self, EvalError> {
        if cutoff_hz <= 0.0 || !cutoff_hz.is_finite() {
            return Err(EvalError::configuration(format!(
                "lowpass cutoff must be positive, got {cutoff_hz}"
            )));
        }
        Ok(Self { cutoff_hz })
    }
}

impl Filter for LowpassFilter {
    fn process(&self, signal: &mut [f32], sample_rate_hz: u32) {
        if sample_rate_hz == 0 {
            return;
        }
        let a = (-TAU * self.cutoff_hz / sample_rate_hz as f64).exp();
        let mut y = 0.0f64;
        for s in signal.iter_mut() {
            y = (1.0 - a) * *s as f64 + a * y;
            *s = y as f32;
        }
    }
}

/// `y[n] = x[n] - x[n-1] + R y[n-1]`.
pub struct DcBlocker {
    pole: f64,
}

impl DcBlocker {
    pub fn new(pole: f64) -> Result<Self, EvalError> {
        if !(0.0..1.0).contains(&pole) {
            return Err(EvalError::configuration(format!(
                "DC blocker pole must be in [0, 1), got {pole}"
            )));
        }
        Ok(Self { pole })
    }
}

impl Filter for DcBlocker {
    fn process(&self, signal: &mut [f32], _sample_rate_hz: u32) {
        let (mut x_prev, mut y_prev) = (0.0f64, 0.0f64);
        for s in signal.iter_mut() {
            let x = *s as f64;
            let y = x - x_prev + self.pole * y_prev;
            x_prev = x;
            y_prev = y;
            *s = y as f32;
        }
    }
}

pub struct GainFilter {
    gain: f32,
}

impl GainFilter {
    pub fn new(gain_db: f64) -> Self {
        Self {
            gain: 10f64.powf(gain_db / 20.0) as f32,
        }
    }
}

impl Filter for GainFilter {
    fn process(&self, signal: &mut [f32], _sample_rate_hz: u32) {
        signal.iter_mut().for_each(|s| *s *= self.gain);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rms(signal: &[f32]) -> f32 {
        (signal.iter().map(|s| s * s).sum::<f32>() / signal.len() as f32).sqrt()
    }

    #[test]
    fn lowpass_passes_dc_and_attenuates_nyquist() {
        let filter = LowpassFilter::new(500.0).unwrap();
        let mut dc = vec![1.0f32; 2000];
        filter.process(&mut dc, 16_000);
        assert!((dc[1999] - 1.0).abs() < 1e-4);

        let mut alternating: Vec<f32> = (0..2000)
            .map(|i| if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        filter.process(&mut alternating, 16_000);
        assert!(rms(&alternating[1000..]) < 0.2);
    }

    #[test]
    fn dc_blocker_removes_offset() {
        let filter = DcBlocker::new(0.995).unwrap();
        let mut signal = vec![0.5f32; 8000];
        filter.process(&mut signal, 16_000);
        assert!(signal[7999].abs() < 1e-3);
    }

    #[test]
    fn gain_scales_by_decibels() {
        let filter = GainFilter::new(-6.0206);
        let mut signal = vec![1.0f32, -2.0];
        filter.process(&mut signal, 16_000);
        assert!((signal[0] - 0.5).abs() < 1e-4);
        assert!((signal[1] + 1.0).abs() < 1e-4);
    }

    #[test]
    fn invalid_parameters_are_configuration_errors() {
        assert!(LowpassFilter::new(0.0).is_err());
        assert!(DcBlocker::new(1.0).is_err());
        assert!(FilterConfig::Lowpass(LowpassArgs { cutoff_hz: -1.0 })
            .build()
            .is_err());
    }
}
