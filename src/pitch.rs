use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::error::EvalError;
use crate::pipeline::traits::PitchExtractor;
use crate::types::PitchTrack;

/// F0 search range and frame rate handed to a pitch extractor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchSearch {
    pub floor_hz: f64,
    pub ceil_hz: f64,
    pub frame_period_ms: f64,
}

impl PitchSearch {
    pub const DEFAULT_FLOOR_HZ: f64 = 65.0;
    pub const DEFAULT_CEIL_HZ: f64 = 1047.0;
    pub const DEFAULT_FRAME_PERIOD_MS: f64 = 5.0;

    /// Frame `i` is centred at `i * frame_period_ms`, and the last frame sits
    /// at or before the end of the signal.
    pub fn num_frames(&self, num_samples: usize, sample_rate_hz: u32) -> usize {
        if sample_rate_hz == 0 || self.frame_period_ms <= 0.0 {
            return 0;
        }
        let duration_ms = num_samples as f64 * 1000.0 / sample_rate_hz as f64;
        (duration_ms / self.frame_period_ms) as usize + 1
    }

    pub(crate) fn validate(&self) -> Result<(), EvalError> {
        let ordered = self.floor_hz > 0.0 && self.ceil_hz > self.floor_hz;
        let period_ok = self.frame_period_ms > 0.0 && self.frame_period_ms.is_finite();
        if !ordered || !period_ok {
            return Err(EvalError::invalid_input(format!(
                "invalid pitch search: floor={} Hz ceil={} Hz period={} ms",
                self.floor_hz, self.ceil_hz, self.frame_period_ms
            )));
        }
        Ok(())
    }
}

impl Default for PitchSearch {
    fn default() -> Self {
        Self {
            floor_hz: Self::DEFAULT_FLOOR_HZ,
            ceil_hz: Self::DEFAULT_CEIL_HZ,
            frame_period_ms: Self::DEFAULT_FRAME_PERIOD_MS,
        }
    }
}

/// Squared difference `d(tau) = sum_{j < W} (x[j] - x[j + tau])^2` for every
/// lag up to `tau_max`, from one FFT cross-correlation per frame and prefix
/// sums of squares.
struct DifferenceFunction {
    integration: usize,
    tau_max: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    head: Vec<Complex<f64>>,
    frame: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
    energy_prefix: Vec<f64>,
}

impl DifferenceFunction {
    /// Frames handed to `compute` hold `integration + tau_max` samples, so the
    /// circular correlation never wraps.
    fn new(integration: usize, tau_max: usize) -> Self {
        let size = integration + tau_max;
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());
        Self {
            integration,
            tau_max,
            forward,
            inverse,
            head: vec![Complex::new(0.0, 0.0); size],
            frame: vec![Complex::new(0.0, 0.0); size],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            energy_prefix: vec![0.0; size + 1],
        }
    }

    fn frame_len(&self) -> usize {
        self.integration + self.tau_max
    }

    /// Fills `diff[0..=tau_max]`.
    fn compute(&mut self, frame: &[f64], diff: &mut [f64]) {
        let size = self.frame_len();
        for (k, (head, slot)) in self.head.iter_mut().zip(self.frame.iter_mut()).enumerate() {
            let x = frame[k];
            *slot = Complex::new(x, 0.0);
            *head = Complex::new(if k < self.integration { x } else { 0.0 }, 0.0);
            self.energy_prefix[k + 1] = self.energy_prefix[k] + x * x;
        }

        self.forward.process_with_scratch(&mut self.head, &mut self.scratch);
        self.forward.process_with_scratch(&mut self.frame, &mut self.scratch);
        for (slot, head) in self.frame.iter_mut().zip(&self.head) {
            *slot *= head.conj();
        }
        self.inverse.process_with_scratch(&mut self.frame, &mut self.scratch);

        let head_energy = self.energy_prefix[self.integration];
        for (tau, d) in diff.iter_mut().enumerate().take(self.tau_max + 1) {
            let lagged_energy =
                self.energy_prefix[tau + self.integration] - self.energy_prefix[tau];
            let correlation = self.frame[tau].re / size as f64;
            *d = (head_energy + lagged_energy - 2.0 * correlation).max(0.0);
        }
    }
}

/// YIN estimator (cumulative mean normalised difference with an absolute
/// threshold and parabolic refinement).
#[derive(Debug, Clone)]
pub struct YinPitchExtractor {
    threshold: f64,
    silence_rms: f64,
}

impl YinPitchExtractor {
    pub const DEFAULT_THRESHOLD: f64 = 0.15;
    pub const DEFAULT_SILENCE_RMS: f64 = 1e-4;

    pub fn new(threshold: f64, silence_rms: f64) -> Self {
        Self {
            threshold,
            silence_rms,
        }
    }

    fn estimate_frame(
        &self,
        frame: &[f64],
        sample_rate_hz: f64,
        tau_min: usize,
        difference: &mut DifferenceFunction,
        search: &PitchSearch,
    ) -> f64 {
        let integration = difference.integration;
        let tau_max = difference.tau_max;
        let energy = frame[..integration].iter().map(|x| x * x).sum::<f64>() / integration as f64;
        if energy.sqrt() < self.silence_rms {
            return 0.0;
        }

        let mut diff = vec![0.0f64; tau_max + 1];
        difference.compute(frame, &mut diff);
        let mut cmnd = vec![1.0f64; tau_max + 1];
        let mut running = 0.0f64;
        for tau in 1..=tau_max {
            running += diff[tau];
            cmnd[tau] = if running > 0.0 {
                diff[tau] * tau as f64 / running
            } else {
                1.0
            };
        }

        let mut best = None;
        let mut tau = tau_min.max(1);
        while tau <= tau_max {
            if cmnd[tau] < self.threshold {
                while tau < tau_max && cmnd[tau + 1] < cmnd[tau] {
                    tau += 1;
                }
                best = Some(tau);
                break;
            }
            tau += 1;
        }
        let Some(tau) = best else {
            return 0.0;
        };

        let refined = if tau > 1 && tau < tau_max {
            let (a, b, c) = (cmnd[tau - 1], cmnd[tau], cmnd[tau + 1]);
            let denom = a - 2.0 * b + c;
            if denom.abs() > 1e-12 {
                tau as f64 + 0.5 * (a - c) / denom
            } else {
                tau as f64
            }
        } else {
            tau as f64
        };

        let f0 = sample_rate_hz / refined;
        if f0.is_finite() && f0 >= search.floor_hz && f0 <= search.ceil_hz {
            f0
        } else {
            0.0
        }
    }
}

impl Default for YinPitchExtractor {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD, Self::DEFAULT_SILENCE_RMS)
    }
}

impl PitchExtractor for YinPitchExtractor {
    fn estimate_f0(
        &self,
        samples: &[f32],
        sample_rate_hz: u32,
        search: &PitchSearch,
    ) -> Result<PitchTrack, EvalError> {
        search.validate()?;
        if sample_rate_hz == 0 {
            return Err(EvalError::invalid_input("sample rate must be positive"));
        }
        let sr = sample_rate_hz as f64;
        let tau_min = (sr / search.ceil_hz).floor().max(1.0) as usize;
        let tau_max = (sr / search.floor_hz).ceil() as usize;
        // Integration window of one longest period; the frame also needs room
        // for the largest lag.
        let mut difference = DifferenceFunction::new(tau_max, tau_max);
        let frame_len = difference.frame_len();
        let half = frame_len / 2;
        let frames = search.num_frames(samples.len(), sample_rate_hz);

        let mut frame = vec![0.0f64; frame_len];
        let mut track = Vec::with_capacity(frames);
        for i in 0..frames {
            let centre = (i as f64 * search.frame_period_ms * sr / 1000.0).round() as isize;
            let start = centre - half as isize;
            for (k, slot) in frame.iter_mut().enumerate() {
                let idx = start + k as isize;
                *slot = if idx >= 0 && (idx as usize) < samples.len() {
                    samples[idx as usize] as f64
                } else {
                    0.0
                };
            }
            track.push(self.estimate_frame(&frame, sr, tau_min, &mut difference, search));
        }

        tracing::trace!(
            frames,
            voiced = track.iter().filter(|&&f| f > 0.0).count(),
            "yin pitch track extracted"
        );
        Ok(PitchTrack::new(search.frame_period_ms, track))
    }
}
