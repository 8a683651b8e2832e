pub mod config;
pub mod corpus;
pub mod error;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod pitch;
pub mod types;

pub use config::{EvalConfig, VocoderModelConfig};
pub use corpus::DirectoryCorpus;
pub use error::EvalError;
pub use metrics::aggregate::Aggregator;
pub use metrics::alignment::{align, align_nonempty};
pub use metrics::pitch::{cents, f0_error, pitch_error, PitchError, VOICING_FLOOR_HZ};
pub use metrics::report::{build_report, Meta, Report, SkippedFile};
pub use metrics::spectral::{spectral_distance, MultiResolutionSpectralDistance};
pub use metrics::stft::WindowFn;
pub use model::{DdspVocoder, ExecutionContext};
pub use pipeline::builder::EvaluatorBuilder;
pub use pipeline::runtime::{EvaluationRun, Evaluator};
pub use pipeline::traits::{
    Corpus, EvaluationObserver, PerFileProgress, PitchExtractor, SilentObserver, VocoderModel,
};
pub use pitch::{PitchSearch, YinPitchExtractor};
pub use types::{
    CorpusResult, Features, PerFileResult, PitchTrack, Split, Utterance, VocoderOutput, Waveform,
};
