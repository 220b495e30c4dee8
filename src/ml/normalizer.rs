// ============================================================
// Layer 5 — Probability Normalizer (masked softmax)
// ============================================================
// softmax(x)_i = exp(x_i - max(x)) / Σ_j exp(x_j - max(x))
//
// Subtracting the maximum keeps every exponent ≤ 0, so nothing
// overflows and the largest term is exactly 1 (the sum can
// never be zero).
//
// Masked positions are overwritten with MASKED_LOGIT before
// normalising. The vector keeps its length, so position i in
// the output still refers to token i.

use crate::domain::error::{QaError, QaResult};

/// Lowest finite f32. exp(MASKED_LOGIT - max) underflows to 0
/// whenever at least one position is unmasked.
pub const MASKED_LOGIT: f32 = f32::MIN;

/// Normalise `logits` into a probability distribution.
///
/// Masked entries end up ≈ 0. A fully masked vector yields the
/// uniform distribution (every entry equals the sentinel).
pub fn softmax(logits: &[f32], mask: Option<&[bool]>) -> QaResult<Vec<f32>> {
    let masked = apply_mask(logits, mask)?;
    if masked.is_empty() {
        return Ok(Vec::new());
    }

    let (max, sum) = max_and_sum(&masked);
    Ok(masked.iter().map(|&x| (x - max).exp() / sum).collect())
}

/// Weight of position `index` measured against the distribution
/// `softmax(logits, Some(mask))`, using its raw logit even when the
/// position itself is masked. This is how the [CLS] "no answer"
/// score is put on the same scale as span probabilities.
///
/// None when every position is masked.
pub fn reference_probability(logits: &[f32], mask: &[bool], index: usize) -> QaResult<Option<f32>> {
    let masked = apply_mask(logits, Some(mask))?;
    if index >= logits.len() {
        return Err(QaError::Configuration(format!(
            "reference position {index} outside {} logits",
            logits.len()
        )));
    }
    if mask.iter().all(|&m| m) {
        return Ok(None);
    }

    let (max, sum) = max_and_sum(&masked);
    Ok(Some((logits[index] - max).exp() / sum))
}

fn apply_mask(logits: &[f32], mask: Option<&[bool]>) -> QaResult<Vec<f32>> {
    if let Some(mask) = mask {
        if mask.len() != logits.len() {
            return Err(QaError::Configuration(format!(
                "mask length {} does not match {} logits",
                mask.len(),
                logits.len()
            )));
        }
    }
    if let Some(i) = logits.iter().position(|x| !x.is_finite()) {
        return Err(QaError::Inference(format!("non-finite logit at position {i}")));
    }

    Ok(match mask {
        Some(mask) => logits
            .iter()
            .zip(mask)
            .map(|(&x, &m)| if m { MASKED_LOGIT } else { x })
            .collect(),
        None => logits.to_vec(),
    })
}

fn max_and_sum(masked: &[f32]) -> (f32, f32) {
    let max = masked.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let sum = masked.iter().map(|&x| (x - max).exp()).sum();
    (max, sum)
}
