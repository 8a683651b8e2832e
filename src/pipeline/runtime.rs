use crate::error::EvalError;
use crate::metrics::aggregate::Aggregator;
use crate::metrics::alignment::align_nonempty;
use crate::metrics::pitch::pitch_error;
use crate::metrics::report::SkippedFile;
use crate::metrics::spectral::MultiResolutionSpectralDistance;
use crate::pipeline::traits::{
    Corpus, EvaluationObserver, PerFileProgress, PitchExtractor, VocoderModel,
};
use crate::pitch::PitchSearch;
use crate::types::{CorpusResult, PerFileResult, Utterance};

/// Scores a vocoder against a reference corpus, one utterance at a time.
pub struct Evaluator {
    model: Box<dyn VocoderModel>,
    pitch_extractor: Box<dyn PitchExtractor>,
    spectral: MultiResolutionSpectralDistance,
    pitch_search: PitchSearch,
    voicing_floor_hz: f64,
}

pub(crate) struct EvaluatorParts {
    pub model: Box<dyn VocoderModel>,
    pub pitch_extractor: Box<dyn PitchExtractor>,
    pub spectral: MultiResolutionSpectralDistance,
    pub pitch_search: PitchSearch,
    pub voicing_floor_hz: f64,
}

/// Outcome of a corpus pass. `files` keeps corpus order.
#[derive(Debug, Clone)]
pub struct EvaluationRun {
    pub files: Vec<PerFileResult>,
    pub skipped: Vec<SkippedFile>,
    pub corpus: CorpusResult,
}

impl Evaluator {
    pub(crate) fn from_parts(parts: EvaluatorParts) -> Self {
        Self {
            model: parts.model,
            pitch_extractor: parts.pitch_extractor,
            spectral: parts.spectral,
            pitch_search: parts.pitch_search,
            voicing_floor_hz: parts.voicing_floor_hz,
        }
    }

    pub fn device_label(&self) -> String {
        self.model.device_label()
    }

    pub fn spectral_distance(&self) -> &MultiResolutionSpectralDistance {
        &self.spectral
    }

    pub fn voicing_floor_hz(&self) -> f64 {
        self.voicing_floor_hz
    }

    /// Resynthesises one utterance and scores it.
    ///
    /// F0 is re-extracted from the aligned resynthesis on the reference
    /// track's frame period; the model's own f0 output is not scored.
    pub fn evaluate_utterance(&self, utterance: &Utterance) -> Result<PerFileResult, EvalError> {
        let sample_rate_hz = utterance.waveform.sample_rate_hz;
        if sample_rate_hz != self.model.sample_rate_hz() {
            tracing::warn!(
                id = %utterance.id,
                expected_rate_hz = self.model.sample_rate_hz(),
                actual_rate_hz = sample_rate_hz,
                "utterance sample rate differs from the model's; scores may degrade"
            );
        }

        let features = self.model.feature_transform(&utterance.waveform.samples)?;
        let output = self.model.infer(&features)?;

        let (reference, estimate) =
            align_nonempty("waveforms", &utterance.waveform.samples, &output.waveform)?;
        let spectral_loss = self.spectral.distance(reference, estimate)?;

        let reference_track = &utterance.reference_f0;
        let search = PitchSearch {
            frame_period_ms: reference_track.frame_period_ms,
            ..self.pitch_search
        };
        let estimated_f0 = self
            .pitch_extractor
            .estimate_f0(estimate, sample_rate_hz, &search)?;
        if !same_frame_period(reference_track.frame_period_ms, estimated_f0.frame_period_ms) {
            return Err(EvalError::invalid_input(format!(
                "pitch extractor returned {} ms frames for '{}', reference track uses {} ms",
                estimated_f0.frame_period_ms, utterance.id, reference_track.frame_period_ms
            )));
        }
        let (reference_f0, estimate_f0) = align_nonempty(
            "pitch tracks",
            &reference_track.frames_hz,
            &estimated_f0.frames_hz,
        )?;
        let pitch = pitch_error(reference_f0, estimate_f0, self.voicing_floor_hz)?;

        tracing::debug!(
            id = %utterance.id,
            waveform_length = reference.len(),
            spectral_loss,
            f0_frames = reference_f0.len(),
            valid_voiced_frames = pitch.valid_frames,
            unvoiced_estimate_frames = pitch.unvoiced_estimate_frames,
            "utterance evaluated"
        );

        Ok(PerFileResult {
            id: utterance.id.clone(),
            spectral_loss,
            waveform_length: reference.len(),
            f0_abs_error_sum: pitch.abs_error_sum,
            valid_voiced_frames: pitch.valid_frames,
            unvoiced_estimate_frames: pitch.unvoiced_estimate_frames,
        })
    }

    /// Evaluates every corpus id accepted by `accept`, in corpus order.
    pub fn run(
        &self,
        corpus: &dyn Corpus,
        accept: impl Fn(&str) -> bool,
        observer: &mut dyn EvaluationObserver,
    ) -> Result<EvaluationRun, EvalError> {
        let ids: Vec<String> = corpus
            .utterance_ids()?
            .into_iter()
            .filter(|id| accept(id))
            .collect();
        self.run_ids(corpus, &ids, observer)
    }

    /// Evaluates exactly `ids`. Per-file failures are reported to the observer
    /// and skipped; any other failure aborts the pass.
    pub fn run_ids(
        &self,
        corpus: &dyn Corpus,
        ids: &[String],
        observer: &mut dyn EvaluationObserver,
    ) -> Result<EvaluationRun, EvalError> {
        tracing::info!(files = ids.len(), device = %self.device_label(), "evaluation started");
        observer.on_start(ids.len());

        let mut aggregator = Aggregator::new();
        let mut files = Vec::with_capacity(ids.len());
        let mut skipped = Vec::new();
        for id in ids {
            let outcome = corpus
                .load(id)
                .and_then(|utterance| self.evaluate_utterance(&utterance));
            match outcome {
                Ok(result) => {
                    aggregator.accumulate(&result);
                    observer.on_file(&PerFileProgress {
                        result: &result,
                        running_spectral_loss: aggregator.running_spectral_loss(),
                        running_f0_error: aggregator.running_f0_error(),
                        running_unvoiced_estimate_frames: aggregator
                            .total_unvoiced_estimate_frames(),
                    });
                    files.push(result);
                }
                Err(err) if err.is_per_file() => {
                    tracing::warn!(id = %id, error = %err, "skipping utterance");
                    observer.on_skip(id, &err);
                    skipped.push(SkippedFile {
                        id: id.clone(),
                        reason: err.to_string(),
                    });
                }
                Err(err) => {
                    tracing::error!(id = %id, error = %err, "evaluation aborted");
                    return Err(err);
                }
            }
        }

        let corpus_result = aggregator.finalize()?;
        tracing::info!(
            files = corpus_result.file_count,
            skipped = skipped.len(),
            total_frames = corpus_result.total_frames,
            total_valid_f0_frames = corpus_result.total_valid_f0_frames,
            total_unvoiced_estimate_frames = corpus_result.total_unvoiced_estimate_frames,
            spectral_loss = corpus_result.weighted_spectral_loss,
            f0_error_cents = corpus_result.weighted_f0_error,
            "evaluation finished"
        );
        Ok(EvaluationRun {
            files,
            skipped,
            corpus: corpus_result,
        })
    }
}

fn same_frame_period(a_ms: f64, b_ms: f64) -> bool {
    (a_ms - b_ms).abs() <= 1e-9 * a_ms.abs().max(b_ms.abs())
}
