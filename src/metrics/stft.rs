use std::borrow::Cow;
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};

use crate::error::EvalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowFn {
    #[default]
    #[serde(alias = "hanning")]
    Hann,
    Hamming,
    Blackman,
    #[serde(alias = "boxcar")]
    Rectangular,
}

impl WindowFn {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hann => "hann",
            Self::Hamming => "hamming",
            Self::Blackman => "blackman",
            Self::Rectangular => "rectangular",
        }
    }

    /// Periodic (DFT-even) window of `len` samples.
    pub fn coefficients(self, len: usize) -> Vec<f32> {
        (0..len)
            .map(|n| {
                let phase = 2.0 * PI * n as f64 / len as f64;
                let w = match self {
                    Self::Hann => 0.5 - 0.5 * phase.cos(),
                    Self::Hamming => 0.54 - 0.46 * phase.cos(),
                    Self::Blackman => 0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos(),
                    Self::Rectangular => 1.0,
                };
                w as f32
            })
            .collect()
    }
}

impl FromStr for WindowFn {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hann" | "hanning" => Ok(Self::Hann),
            "hamming" => Ok(Self::Hamming),
            "blackman" => Ok(Self::Blackman),
            "rectangular" | "boxcar" => Ok(Self::Rectangular),
            other => Err(EvalError::configuration(format!(
                "unknown window function '{other}'"
            ))),
        }
    }
}

impl fmt::Display for WindowFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Magnitude short-time Fourier transform with a precomputed FFT plan.
pub struct Stft {
    n_fft: usize,
    hop_length: usize,
    window: Vec<f32>,
    centered: bool,
    fft: Arc<dyn Fft<f32>>,
}

impl Stft {
    /// `centered` reflect-pads `n_fft / 2` samples on both sides so frame `i`
    /// is centred on sample `i * hop_length`. `normalized` scales the window
    /// to unit energy.
    pub fn new(
        n_fft: usize,
        hop_length: usize,
        window_fn: WindowFn,
        centered: bool,
        normalized: bool,
    ) -> Result<Self, EvalError> {
        if n_fft == 0 || hop_length == 0 {
            return Err(EvalError::invalid_input(format!(
                "STFT needs positive n_fft and hop_length, got n_fft={n_fft} hop_length={hop_length}"
            )));
        }
        let mut window = window_fn.coefficients(n_fft);
        if normalized {
            let norm = window.iter().map(|w| w * w).sum::<f32>().sqrt();
            if norm > 0.0 {
                window.iter_mut().for_each(|w| *w /= norm);
            }
        }
        let fft = FftPlanner::new().plan_fft_forward(n_fft);
        Ok(Self {
            n_fft,
            hop_length,
            window,
            centered,
            fft,
        })
    }

    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    pub fn hop_length(&self) -> usize {
        self.hop_length
    }

    pub fn num_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    pub fn num_frames(&self, signal_len: usize) -> usize {
        let padded_len = if self.centered {
            signal_len + 2 * (self.n_fft / 2)
        } else {
            signal_len
        };
        if padded_len < self.n_fft {
            0
        } else {
            1 + (padded_len - self.n_fft) / self.hop_length
        }
    }

    /// `frames x bins` magnitude spectrogram.
    pub fn magnitudes(&self, signal: &[f32]) -> Vec<Vec<f32>> {
        let frames = self.num_frames(signal.len());
        if frames == 0 {
            return Vec::new();
        }
        let padded: Cow<'_, [f32]> = if self.centered {
            Cow::Owned(reflect_pad(signal, self.n_fft / 2))
        } else {
            Cow::Borrowed(signal)
        };

        let num_bins = self.num_bins();
        let mut buffer = vec![Complex::new(0.0f32, 0.0); self.n_fft];
        let mut scratch = vec![Complex::new(0.0f32, 0.0); self.fft.get_inplace_scratch_len()];
        let mut spectrogram = Vec::with_capacity(frames);
        for frame in 0..frames {
            let start = frame * self.hop_length;
            let segment = &padded[start..start + self.n_fft];
            for (slot, (&x, &w)) in buffer.iter_mut().zip(segment.iter().zip(&self.window)) {
                *slot = Complex::new(x * w, 0.0);
            }
            self.fft.process_with_scratch(&mut buffer, &mut scratch);
            spectrogram.push(buffer[..num_bins].iter().map(|c| c.norm()).collect());
        }
        spectrogram
    }
}

fn reflect_pad(signal: &[f32], pad: usize) -> Vec<f32> {
    let len = signal.len();
    let mut out = Vec::with_capacity(len + 2 * pad);
    if len < 2 {
        let edge = signal.first().copied().unwrap_or(0.0);
        out.resize(pad, edge);
        out.extend_from_slice(signal);
        out.resize(len + 2 * pad, edge);
        return out;
    }
    let period = 2 * (len as isize - 1);
    for i in -(pad as isize)..(len + pad) as isize {
        let m = i.rem_euclid(period);
        let idx = if m >= len as isize { period - m } else { m };
        out.push(signal[idx as usize]);
    }
    out
}
