// ============================================================
// Layer 5 — Answer Resolver
// ============================================================
// Span task:           token slice [start..=end] → text
// Classification task: class index → label name

use crate::domain::error::{QaError, QaResult};
use crate::domain::labels::LabelMap;
use crate::domain::span::{Classification, SpanCandidate};
use crate::domain::tokens::TokenSequence;
use crate::domain::traits::QaTokenizer;

/// Decode the inclusive span back to text.
///
/// [CLS] / [SEP] ids inside the slice are dropped before decoding.
/// A valid span never contains them, but a stray one must not
/// leak into the answer.
pub fn resolve_span(
    tokenizer: &dyn QaTokenizer,
    tokens:    &TokenSequence,
    span:      &SpanCandidate,
) -> QaResult<String> {
    if span.end < span.start || span.end >= tokens.len() {
        return Err(QaError::Configuration(format!(
            "span [{}, {}] outside sequence of {} tokens",
            span.start,
            span.end,
            tokens.len()
        )));
    }

    let special = tokenizer.special_tokens();
    let ids: Vec<u32> = tokens.ids()[span.start..=span.end]
        .iter()
        .copied()
        .filter(|&id| !special.is_boundary_marker(id))
        .collect();

    let text = tokenizer.decode(&ids)?;
    Ok(text.trim().to_string())
}

/// Argmax over class probabilities, then label lookup.
/// The first maximum wins ties.
pub fn resolve_label(labels: &LabelMap, probs: &[f32]) -> QaResult<Classification> {
    if probs.len() != labels.len() {
        return Err(QaError::Configuration(format!(
            "model produced {} class scores but the label map holds {}",
            probs.len(),
            labels.len()
        )));
    }

    let (index, probability) = probs
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, p)| match best {
            Some((_, bp)) if bp >= p => best,
            _ => Some((i, p)),
        })
        .ok_or_else(|| QaError::Configuration("empty class probability vector".into()))?;

    let label = labels.label(index)?.to_string();
    Ok(Classification { label, index, probability })
}
