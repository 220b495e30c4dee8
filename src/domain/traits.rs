// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The tokenizer and the inference runner are external
// collaborators. The pipeline only ever sees them through
// these traits, so tests can swap in scripted fakes and the
// application layer never touches tokenizers or burn types.
//
// Both collaborators are shared read-only across threads once
// initialised, hence the Send + Sync bounds.

use crate::domain::error::QaResult;
use crate::domain::tensors::{ModelInput, ModelOutputs};
use crate::domain::tokens::SpecialTokens;

// ─── QaTokenizer ──────────────────────────────────────────────────────────────
/// Maps text to token ids and back.
///
/// Implementations:
///   - HfTokenizer → wraps a HuggingFace `tokenizer.json`
pub trait QaTokenizer: Send + Sync {
    /// Tokenise ordinary text. Must never emit special-token ids.
    fn tokenize(&self, text: &str) -> QaResult<Vec<u32>>;

    /// Reconstruct text from ids.
    fn decode(&self, ids: &[u32]) -> QaResult<String>;

    /// Ids reserved for [CLS], [SEP] and [PAD].
    fn special_tokens(&self) -> SpecialTokens;

    fn vocab_size(&self) -> usize;
}

// ─── InferenceRunner ──────────────────────────────────────────────────────────
/// Runs one forward pass. Opaque: the pipeline only relies on
/// the names and shapes of the outputs.
///
/// Implementations:
///   - BurnRunner → burn transformer encoder with a span or class head
pub trait InferenceRunner: Send + Sync {
    fn run(&self, input: &ModelInput) -> QaResult<ModelOutputs>;
}

// ─── QuestionAnswerer ─────────────────────────────────────────────────────────
/// Caller-facing span task over a fixed context.
///
/// `Ok(None)` covers both "no answer" and any swallowed pipeline
/// failure. `Err` is reserved for an initialisation failure, and
/// is returned only to the first caller that observes it.
pub trait QuestionAnswerer {
    fn answer_question(&self, question: &str) -> QaResult<Option<String>>;
}

// ─── TextClassifier ───────────────────────────────────────────────────────────
/// Caller-facing classification task, same error contract as
/// `QuestionAnswerer`.
pub trait TextClassifier {
    fn classify(&self, text: &str) -> QaResult<Option<String>>;
}
