use crate::error::EvalError;
use crate::pitch::PitchSearch;
use crate::types::{Features, PerFileResult, PitchTrack, Utterance, VocoderOutput};

/// A trained vocoder: analysis features in, resynthesised audio out.
pub trait VocoderModel: Send + Sync {
    fn feature_transform(&self, waveform: &[f32]) -> Result<Features, EvalError>;

    fn infer(&self, features: &Features) -> Result<VocoderOutput, EvalError>;

    fn sample_rate_hz(&self) -> u32;

    fn device_label(&self) -> String;
}

pub trait PitchExtractor: Send + Sync {
    fn estimate_f0(
        &self,
        samples: &[f32],
        sample_rate_hz: u32,
        search: &PitchSearch,
    ) -> Result<PitchTrack, EvalError>;
}

/// Source of reference utterances.
///
/// `utterance_ids` failing is a corpus-level failure; `load` failing with
/// `CorpusAccess` only affects that utterance.
pub trait Corpus {
    fn utterance_ids(&self) -> Result<Vec<String>, EvalError>;

    fn load(&self, id: &str) -> Result<Utterance, EvalError>;
}

/// Receives per-file progress from the evaluation loop.
pub trait EvaluationObserver {
    fn on_start(&mut self, _total: usize) {}

    fn on_file(&mut self, _progress: &PerFileProgress<'_>) {}

    fn on_skip(&mut self, _id: &str, _error: &EvalError) {}
}

/// Snapshot handed to observers after each evaluated file.
#[derive(Debug, Clone, Copy)]
pub struct PerFileProgress<'a> {
    pub result: &'a PerFileResult,
    pub running_spectral_loss: Option<f64>,
    pub running_f0_error: Option<f64>,
    pub running_unvoiced_estimate_frames: u64,
}

/// Observer that ignores every event.
pub struct SilentObserver;

impl EvaluationObserver for SilentObserver {}
