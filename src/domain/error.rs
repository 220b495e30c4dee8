// ============================================================
// Layer 3 — Pipeline Error Taxonomy
// ============================================================
// Every stage of the pipeline fails with one of these kinds.
// The caller-facing use cases (Layer 2) are the only place
// that turns them into absent results.
//
// "No answer found" is deliberately missing from this enum:
// an empty span list is a normal outcome, not a failure.

use thiserror::Error;

pub type QaResult<T> = std::result::Result<T, QaError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QaError {
    /// Model or tokenizer could not be loaded.
    #[error("initialisation failed: {0}")]
    Initialization(String),

    /// An internal invariant does not hold (label map, tensor shape, ...).
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("tokenisation failed: {0}")]
    Tokenization(String),

    /// Truncation is disabled and the assembled sequence does not fit.
    #[error("input of {len} tokens exceeds max_seq_len {max}")]
    InputTooLong { len: usize, max: usize },

    #[error("inference failed: {0}")]
    Inference(String),
}

impl QaError {
    /// Short name of the stage that produced this error, used as a log field.
    pub fn stage(&self) -> &'static str {
        match self {
            QaError::Initialization(_) => "initialisation",
            QaError::Configuration(_)  => "configuration",
            QaError::Tokenization(_)   => "tokenisation",
            QaError::InputTooLong { .. } => "assembly",
            QaError::Inference(_)      => "inference",
        }
    }

    pub fn is_initialization(&self) -> bool {
        matches!(self, QaError::Initialization(_))
    }
}
