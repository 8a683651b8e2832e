use crate::error::EvalError;
use crate::metrics::stft::{Stft, WindowFn};

pub const DEFAULT_RESOLUTIONS: [usize; 3] = [512, 1024, 2048];
const LOG_EPS: f64 = 1e-7;

/// Multi-resolution magnitude-spectrogram distance.
///
/// Every resolution uses hop = window / 4, no centering and a unit-energy
/// window. The per-resolution term is the mean absolute difference of linear
/// magnitudes plus the mean absolute difference of log magnitudes; the
/// distance is the sum of these terms over all resolutions.
pub struct MultiResolutionSpectralDistance {
    window_fn: WindowFn,
    transforms: Vec<Stft>,
}

impl MultiResolutionSpectralDistance {
    pub fn new(resolutions: &[usize], window_fn: WindowFn) -> Result<Self, EvalError> {
        if resolutions.is_empty() {
            return Err(EvalError::invalid_input(
                "spectral distance needs at least one resolution",
            ));
        }
        let transforms = resolutions
            .iter()
            .map(|&window_size| {
                if window_size == 0 {
                    return Err(EvalError::InvalidResolution {
                        window_size,
                        signal_len: 0,
                    });
                }
                Stft::new(window_size, (window_size / 4).max(1), window_fn, false, true)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            window_fn,
            transforms,
        })
    }

    pub fn window_fn(&self) -> WindowFn {
        self.window_fn
    }

    pub fn resolutions(&self) -> Vec<usize> {
        self.transforms.iter().map(Stft::n_fft).collect()
    }

    /// Smallest signal length every resolution can analyse.
    pub fn min_signal_len(&self) -> usize {
        self.transforms.iter().map(Stft::n_fft).max().unwrap_or(0)
    }

    pub fn distance(&self, reference: &[f32], estimate: &[f32]) -> Result<f64, EvalError> {
        if reference.len() != estimate.len() {
            return Err(EvalError::shape_mismatch(
                "spectral distance",
                reference.len(),
                estimate.len(),
            ));
        }
        if let Some(stft) = self
            .transforms
            .iter()
            .find(|stft| stft.n_fft() > reference.len())
        {
            return Err(EvalError::InvalidResolution {
                window_size: stft.n_fft(),
                signal_len: reference.len(),
            });
        }

        let mut total = 0.0f64;
        for stft in &self.transforms {
            let term = resolution_term(&stft.magnitudes(reference), &stft.magnitudes(estimate));
            tracing::trace!(n_fft = stft.n_fft(), term, "spectral distance resolution");
            total += term;
        }
        Ok(total)
    }
}

/// Functional form: builds the transforms and evaluates once.
pub fn spectral_distance(
    reference: &[f32],
    estimate: &[f32],
    resolutions: &[usize],
    window_fn: WindowFn,
) -> Result<f64, EvalError> {
    MultiResolutionSpectralDistance::new(resolutions, window_fn)?.distance(reference, estimate)
}

fn resolution_term(reference: &[Vec<f32>], estimate: &[Vec<f32>]) -> f64 {
    let mut linear = 0.0f64;
    let mut log = 0.0f64;
    let mut bins = 0usize;
    for (ref_frame, est_frame) in reference.iter().zip(estimate) {
        for (&r, &e) in ref_frame.iter().zip(est_frame) {
            let (r, e) = (r as f64, e as f64);
            linear += (r - e).abs();
            log += ((r + LOG_EPS).ln() - (e + LOG_EPS).ln()).abs();
            bins += 1;
        }
    }
    if bins == 0 {
        return 0.0;
    }
    (linear + log) / bins as f64
}
