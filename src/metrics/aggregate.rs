use crate::error::EvalError;
use crate::types::{CorpusResult, PerFileResult};

/// Running corpus-level accumulation of per-file results.
///
/// Spectral loss is a per-file scalar, so it is weighted by the file's
/// waveform length. F0 error is accumulated frame by frame: every voiced frame
/// in the corpus counts once, regardless of which file it came from.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    file_count: usize,
    total_frames: u64,
    length_weighted_loss_sum: f64,
    f0_abs_error_sum: f64,
    total_valid_f0_frames: u64,
    total_unvoiced_estimate_frames: u64,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accumulate(&mut self, result: &PerFileResult) {
        let length = result.waveform_length as u64;
        self.file_count += 1;
        self.total_frames += length;
        self.length_weighted_loss_sum += result.spectral_loss * length as f64;
        self.total_unvoiced_estimate_frames += result.unvoiced_estimate_frames as u64;
        if result.valid_voiced_frames > 0 {
            self.f0_abs_error_sum += result.f0_abs_error_sum;
            self.total_valid_f0_frames += result.valid_voiced_frames as u64;
        }
    }

    pub fn file_count(&self) -> usize {
        self.file_count
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn total_valid_f0_frames(&self) -> u64 {
        self.total_valid_f0_frames
    }

    /// Voiced reference frames left out of the f0 error because the estimate
    /// was unvoiced there.
    pub fn total_unvoiced_estimate_frames(&self) -> u64 {
        self.total_unvoiced_estimate_frames
    }

    /// Length-weighted spectral loss over the files seen so far.
    pub fn running_spectral_loss(&self) -> Option<f64> {
        (self.total_frames > 0).then(|| self.length_weighted_loss_sum / self.total_frames as f64)
    }

    /// Frame-weighted f0 error over the files seen so far.
    pub fn running_f0_error(&self) -> Option<f64> {
        (self.total_valid_f0_frames > 0)
            .then(|| self.f0_abs_error_sum / self.total_valid_f0_frames as f64)
    }

    pub fn finalize(&self) -> Result<CorpusResult, EvalError> {
        if self.file_count == 0 {
            return Err(EvalError::empty_corpus("no file was evaluated"));
        }
        if self.total_valid_f0_frames == 0 {
            return Err(EvalError::empty_corpus(format!(
                "none of the {} evaluated files has a voiced frame",
                self.file_count
            )));
        }
        let weighted_spectral_loss = self.running_spectral_loss().ok_or_else(|| {
            EvalError::empty_corpus("evaluated files contain no waveform samples")
        })?;
        Ok(CorpusResult {
            weighted_spectral_loss,
            weighted_f0_error: self.f0_abs_error_sum / self.total_valid_f0_frames as f64,
            total_frames: self.total_frames,
            total_valid_f0_frames: self.total_valid_f0_frames,
            total_unvoiced_estimate_frames: self.total_unvoiced_estimate_frames,
            file_count: self.file_count,
        })
    }
}
