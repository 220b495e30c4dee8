// ============================================================
// Layer 3 — Span and Answer Types
// ============================================================
// Extractive Q&A never generates text: the model only points
// at a span [start, end] (inclusive) of the assembled input,
// and the answer is whatever those tokens decode to.
//
// Reference: Devlin et al. (2019) - BERT, §4.2 (SQuAD)

use serde::{Deserialize, Serialize};

/// One scored (start, end) pair. Indices address the full
/// assembled sequence, structural tokens included.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpanCandidate {
    pub start: usize,
    pub end:   usize,
    pub score: f32,
}

impl SpanCandidate {
    pub fn new(start: usize, end: usize, score: f32) -> Self {
        Self { start, end, score }
    }

    /// Number of tokens covered by the span.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start) + 1
    }
}

/// A resolved answer for the span task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub span: SpanCandidate,
}

/// A resolved answer for the classification task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label:       String,
    pub index:       usize,
    pub probability: f32,
}
