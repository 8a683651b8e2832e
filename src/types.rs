use serde::Serialize;

#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub sample_rate_hz: u32,
    pub samples: Vec<f32>,
}

impl Waveform {
    pub fn new(sample_rate_hz: u32, samples: Vec<f32>) -> Self {
        Self {
            sample_rate_hz,
            samples,
        }
    }
}

/// Per-frame fundamental frequency in Hz, one value every `frame_period_ms`.
/// Frame `i` is centred at `i * frame_period_ms`. Zero marks an unvoiced frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PitchTrack {
    pub frame_period_ms: f64,
    pub frames_hz: Vec<f64>,
}

impl PitchTrack {
    pub fn new(frame_period_ms: f64, frames_hz: Vec<f64>) -> Self {
        Self {
            frame_period_ms,
            frames_hz,
        }
    }

    pub fn len(&self) -> usize {
        self.frames_hz.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames_hz.is_empty()
    }
}

/// Reference material for one corpus entry.
#[derive(Debug, Clone)]
pub struct Utterance {
    pub id: String,
    pub waveform: Waveform,
    pub reference_f0: PitchTrack,
}

/// Frame-wise model input produced by a feature transform (`frames x features`).
#[derive(Debug, Clone, PartialEq)]
pub struct Features {
    pub values: Vec<Vec<f32>>,
    pub hop_length: usize,
}

impl Features {
    pub fn num_frames(&self) -> usize {
        self.values.len()
    }

    pub fn num_features(&self) -> usize {
        self.values.first().map_or(0, Vec::len)
    }
}

/// Everything a vocoder forward pass returns. Only `waveform` is scored; the
/// model's own `f0_hz` is kept for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct VocoderOutput {
    pub f0_hz: Vec<f32>,
    pub harmonic: Vec<f32>,
    pub noise: Vec<f32>,
    pub waveform: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerFileResult {
    pub id: String,
    pub spectral_loss: f64,
    /// Aligned waveform length in samples.
    pub waveform_length: usize,
    pub f0_abs_error_sum: f64,
    pub valid_voiced_frames: usize,
    /// Voiced reference frames where the re-extracted track found no pitch.
    /// Excluded from the f0 error, so `valid_voiced_frames` plus this is the
    /// size of the voicing mask.
    pub unvoiced_estimate_frames: usize,
}

impl PerFileResult {
    /// Mean absolute cent error of this file, `None` when it has no voiced frame.
    pub fn f0_mean_error(&self) -> Option<f64> {
        (self.valid_voiced_frames > 0)
            .then(|| self.f0_abs_error_sum / self.valid_voiced_frames as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorpusResult {
    pub weighted_spectral_loss: f64,
    pub weighted_f0_error: f64,
    pub total_frames: u64,
    pub total_valid_f0_frames: u64,
    pub total_unvoiced_estimate_frames: u64,
    pub file_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Validation,
    Test,
}

impl Split {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Test => "test",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f0_mean_error_requires_voiced_frames() {
        let mut result = PerFileResult {
            id: "a".to_string(),
            spectral_loss: 1.0,
            waveform_length: 100,
            f0_abs_error_sum: 30.0,
            valid_voiced_frames: 3,
            unvoiced_estimate_frames: 0,
        };
        assert_eq!(result.f0_mean_error(), Some(10.0));
        result.valid_voiced_frames = 0;
        result.f0_abs_error_sum = 0.0;
        assert_eq!(result.f0_mean_error(), None);
    }
}
