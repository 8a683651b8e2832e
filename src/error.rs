use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("YAML parse error while {context}: {source}")]
    Yaml {
        context: &'static str,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("configuration error: {message}")]
    Configuration { message: String },
    #[error("shape mismatch in {context}: reference has {reference} elements, estimate has {estimate}")]
    ShapeMismatch {
        context: &'static str,
        reference: usize,
        estimate: usize,
    },
    #[error("invalid resolution: window size {window_size} for a signal of {signal_len} samples")]
    InvalidResolution {
        window_size: usize,
        signal_len: usize,
    },
    #[error("no overlap between reference and estimated {context}")]
    EmptyOverlap { context: &'static str },
    #[error("corpus access failed for '{id}': {message}")]
    CorpusAccess { id: String, message: String },
    #[error("empty corpus: {message}")]
    EmptyCorpus { message: String },
    #[error("{context}: {message}")]
    Runtime {
        context: &'static str,
        message: String,
    },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

impl EvalError {
    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    pub(crate) fn yaml(context: &'static str, source: serde_yaml::Error) -> Self {
        Self::Yaml { context, source }
    }

    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub(crate) fn shape_mismatch(context: &'static str, reference: usize, estimate: usize) -> Self {
        Self::ShapeMismatch {
            context,
            reference,
            estimate,
        }
    }

    pub(crate) fn corpus_access(id: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::CorpusAccess {
            id: id.into(),
            message: err.to_string(),
        }
    }

    pub(crate) fn empty_corpus(message: impl Into<String>) -> Self {
        Self::EmptyCorpus {
            message: message.into(),
        }
    }

    pub(crate) fn runtime(context: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Runtime {
            context,
            message: err.to_string(),
        }
    }

    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Errors that only invalidate the current utterance. The evaluation loop
    /// reports and skips these; everything else aborts the run.
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            Self::CorpusAccess { .. } | Self::EmptyOverlap { .. } | Self::InvalidResolution { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_file_classification() {
        assert!(EvalError::corpus_access("f1_001_0", "missing .pv").is_per_file());
        assert!(EvalError::EmptyOverlap { context: "waveform" }.is_per_file());
        assert!(EvalError::InvalidResolution {
            window_size: 2048,
            signal_len: 100
        }
        .is_per_file());
        assert!(!EvalError::empty_corpus("no files").is_per_file());
        assert!(!EvalError::configuration("bad").is_per_file());
        assert!(!EvalError::shape_mismatch("f0", 3, 4).is_per_file());
    }

    #[test]
    fn messages_carry_context() {
        let err = EvalError::shape_mismatch("spectral distance", 10, 7);
        assert_eq!(
            err.to_string(),
            "shape mismatch in spectral distance: reference has 10 elements, estimate has 7"
        );
        let err = EvalError::runtime("forward pass", "boom");
        assert_eq!(err.to_string(), "forward pass: boom");
    }
}
