// ============================================================
// Layer 5 — Span Decoder
// ============================================================
// Picks the best answer span(s) from start/end probabilities.
//
//   score(i, j) = P_start(i) · P_end(j)
//
// A pair is valid only if
//   j >= i                       (end not before start)
//   j - i < max_answer_len       (bounded answer length)
//   neither i nor j is masked    ([CLS], [SEP], padding)
// Every other pair scores NEG_INFINITY and can never be chosen.
//
// With a null score set (the [CLS] "no answer" score), a pair
// must also score strictly above it; ties go to "no answer".
//
// Conceptually this is an n × n matrix. Only the band
// i <= j < i + max_answer_len can hold valid pairs, so that band
// is scanned row by row (start-major, then end). Visit order is
// the row-major order of the full matrix, so ties resolve the
// same way: lower start first, then lower end.
//
// Reference: Devlin et al. (2019) - BERT, §4.2

use crate::domain::error::{QaError, QaResult};
use crate::domain::span::SpanCandidate;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpanDecoder {
    top_k:          usize,
    max_answer_len: usize,
    null_score:     Option<f32>,
}

impl SpanDecoder {
    pub fn new(top_k: usize, max_answer_len: usize) -> Self {
        Self { top_k, max_answer_len, null_score: None }
    }

    /// Only spans scoring strictly above `null_score` survive.
    pub fn with_null_score(mut self, null_score: Option<f32>) -> Self {
        self.null_score = null_score;
        self
    }

    /// Score of an arbitrary (start, end) pair, NEG_INFINITY when invalid.
    pub fn pair_score(
        &self,
        start_probs: &[f32],
        end_probs:   &[f32],
        mask:        &[bool],
        start:       usize,
        end:         usize,
    ) -> f32 {
        let in_range = start < start_probs.len() && end < end_probs.len() && end < mask.len();
        if !in_range
            || end < start
            || end - start >= self.max_answer_len
            || mask[start]
            || mask[end]
        {
            return f32::NEG_INFINITY;
        }
        start_probs[start] * end_probs[end]
    }

    /// Return up to `top_k` valid spans, best first.
    /// An empty result means no valid span exists.
    pub fn decode(
        &self,
        start_probs: &[f32],
        end_probs:   &[f32],
        mask:        &[bool],
    ) -> QaResult<Vec<SpanCandidate>> {
        let n = start_probs.len();
        if end_probs.len() != n || mask.len() != n {
            return Err(QaError::Configuration(format!(
                "span decoder inputs disagree: start {}, end {}, mask {}",
                n,
                end_probs.len(),
                mask.len()
            )));
        }
        if self.top_k == 0 {
            return Ok(Vec::new());
        }

        let spans = match self.top_k {
            1 => self.best(start_probs, end_probs, mask).into_iter().collect(),
            k => {
                let mut all = self.valid_candidates(start_probs, end_probs, mask);
                // sort_by is stable: equal scores keep row-major order
                all.sort_by(|a, b| b.score.total_cmp(&a.score));
                all.truncate(k);
                all
            }
        };

        tracing::debug!("Span decoder kept {} candidate(s) over {} positions", spans.len(), n);
        Ok(spans)
    }

    /// Single global maximum; the first one seen wins ties.
    fn best(&self, start_probs: &[f32], end_probs: &[f32], mask: &[bool]) -> Option<SpanCandidate> {
        let mut best: Option<SpanCandidate> = None;
        self.for_each_valid(start_probs, end_probs, mask, |cand| {
            if best.map_or(true, |b| cand.score > b.score) {
                best = Some(cand);
            }
        });
        best
    }

    fn valid_candidates(&self, start_probs: &[f32], end_probs: &[f32], mask: &[bool]) -> Vec<SpanCandidate> {
        let mut out = Vec::new();
        self.for_each_valid(start_probs, end_probs, mask, |cand| out.push(cand));
        out
    }

    /// Visit every valid pair in row-major order. NaN, sentinel and
    /// below-null scores are skipped so they can never surface.
    fn for_each_valid<F>(&self, start_probs: &[f32], end_probs: &[f32], mask: &[bool], mut visit: F)
    where
        F: FnMut(SpanCandidate),
    {
        let n = start_probs.len();
        for i in (0..n).filter(|&i| !mask[i]) {
            let band_end = n.min(i.saturating_add(self.max_answer_len));
            for j in (i..band_end).filter(|&j| !mask[j]) {
                let score = self.pair_score(start_probs, end_probs, mask, i, j);
                if score.is_nan() || score == f32::NEG_INFINITY {
                    continue;
                }
                if self.null_score.is_some_and(|null| score <= null) {
                    continue;
                }
                visit(SpanCandidate::new(i, j, score));
            }
        }
    }
}
