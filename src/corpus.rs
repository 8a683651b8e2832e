use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::EvalError;
use crate::pipeline::traits::Corpus;
use crate::types::{PitchTrack, Split, Utterance, Waveform};

pub const PITCH_SIDECAR_EXTENSION: &str = "pv";

/// Flat directory of `<singer>_<song>_<segment>.wav` files, each with a
/// `<stem>.pv` sidecar holding one reference F0 value per frame.
///
/// The split of a file is decided by its second `_`-separated token.
#[derive(Debug, Clone)]
pub struct DirectoryCorpus {
    root: PathBuf,
    f0_frame_period_ms: f64,
    validation_postfixes: BTreeSet<String>,
    test_postfixes: BTreeSet<String>,
}

impl DirectoryCorpus {
    pub const DEFAULT_F0_FRAME_PERIOD_MS: f64 = 5.0;

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            f0_frame_period_ms: Self::DEFAULT_F0_FRAME_PERIOD_MS,
            validation_postfixes: numbered_postfixes(6..=10),
            test_postfixes: numbered_postfixes(1..=5),
        }
    }

    pub fn with_split_postfixes(
        mut self,
        split: Split,
        postfixes: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let set = postfixes.into_iter().map(Into::into).collect();
        match split {
            Split::Validation => self.validation_postfixes = set,
            Split::Test => self.test_postfixes = set,
        }
        self
    }

    pub fn with_f0_frame_period_ms(mut self, frame_period_ms: f64) -> Self {
        self.f0_frame_period_ms = frame_period_ms;
        self
    }

    pub fn belongs_to(&self, id: &str, split: Split) -> bool {
        let postfixes = match split {
            Split::Validation => &self.validation_postfixes,
            Split::Test => &self.test_postfixes,
        };
        id.split('_')
            .nth(1)
            .is_some_and(|token| postfixes.contains(token))
    }

    fn wav_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.wav"))
    }

    fn pitch_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.{PITCH_SIDECAR_EXTENSION}"))
    }
}

impl Corpus for DirectoryCorpus {
    fn utterance_ids(&self) -> Result<Vec<String>, EvalError> {
        let entries =
            std::fs::read_dir(&self.root).map_err(|e| EvalError::io("read corpus directory", e))?;
        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| EvalError::io("read corpus directory entry", e))?;
            let path = entry.path();
            let is_wav = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
            if !is_wav || !path.is_file() {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        tracing::debug!(root = %self.root.display(), count = ids.len(), "corpus enumerated");
        Ok(ids)
    }

    fn load(&self, id: &str) -> Result<Utterance, EvalError> {
        let waveform = read_wav_mono(&self.wav_path(id)).map_err(|e| EvalError::corpus_access(id, e))?;
        let pitch_path = self.pitch_path(id);
        let contents = std::fs::read_to_string(&pitch_path).map_err(|e| {
            EvalError::corpus_access(id, format!("read '{}': {e}", pitch_path.display()))
        })?;
        let frames_hz = parse_pitch_values(&contents).map_err(|e| EvalError::corpus_access(id, e))?;
        Ok(Utterance {
            id: id.to_string(),
            waveform,
            reference_f0: PitchTrack::new(self.f0_frame_period_ms, frames_hz),
        })
    }
}

fn numbered_postfixes(range: std::ops::RangeInclusive<u32>) -> BTreeSet<String> {
    range.map(|i| format!("{i:03}")).collect()
}

/// Decodes a WAV file to mono `f32`, averaging channels.
pub fn read_wav_mono(path: &Path) -> Result<Waveform, String> {
    let reader = hound::WavReader::open(path)
        .map_err(|err| format!("Failed to open WAV '{}': {err}", path.display()))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let full_scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / full_scale))
                .collect::<Result<_, _>>()
                .map_err(|err| format!("Failed to decode WAV '{}': {err}", path.display()))?
        }
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|err| format!("Failed to decode WAV '{}': {err}", path.display()))?,
    };

    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };
    Ok(Waveform::new(spec.sample_rate, samples))
}

/// Parses whitespace-separated floats, one per frame.
pub fn parse_pitch_values(contents: &str) -> Result<Vec<f64>, String> {
    contents
        .split_whitespace()
        .enumerate()
        .map(|(i, token)| {
            token
                .parse::<f64>()
                .map_err(|err| format!("invalid pitch value '{token}' at frame {i}: {err}"))
        })
        .collect()
}
