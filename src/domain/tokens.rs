// ============================================================
// Layer 3 — Token Sequences and Special Tokens
// ============================================================
// A TokenSequence is the exact id sequence sent to the model,
// together with the layout that produced it. The layout is
// what the undesired mask is derived from, so a structural
// position is excluded because of WHERE it sits, not because
// of which id value happens to be stored there.
//
// Pair layout:    [CLS] question [SEP] context [SEP] [PAD]...
// Single layout:  [CLS] text [SEP] [PAD]...

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Reserved ids for the structural markers.
/// Defaults follow the BERT vocabulary convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialTokens {
    pub cls: u32,
    pub sep: u32,
    pub pad: u32,
}

impl SpecialTokens {
    pub fn new(cls: u32, sep: u32, pad: u32) -> Self {
        Self { cls, sep, pad }
    }

    /// True for the start and separator markers (the ones the
    /// answer resolver strips).
    pub fn is_boundary_marker(&self, id: u32) -> bool {
        id == self.cls || id == self.sep
    }
}

impl Default for SpecialTokens {
    fn default() -> Self {
        Self { cls: 101, sep: 102, pad: 0 }
    }
}

/// How the non-padding part of a sequence is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Pair { question_len: usize, context_len: usize },
    Single { text_len: usize },
}

impl Layout {
    /// Number of ids before padding, structural markers included.
    pub fn unpadded_len(&self) -> usize {
        match *self {
            Layout::Pair { question_len, context_len } => question_len + context_len + 3,
            Layout::Single { text_len } => text_len + 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSequence {
    ids:    Vec<u32>,
    layout: Layout,
}

impl TokenSequence {
    /// Wrap assembled ids. Returns None when `ids` is shorter than
    /// the layout claims, which would make the mask meaningless.
    pub fn new(ids: Vec<u32>, layout: Layout) -> Option<Self> {
        if ids.len() < layout.unpadded_len() {
            return None;
        }
        Some(Self { ids, layout })
    }

    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Positions of the question tokens (empty for single-text layouts).
    pub fn question_range(&self) -> Range<usize> {
        match self.layout {
            Layout::Pair { question_len, .. } => 1..1 + question_len,
            Layout::Single { .. } => 0..0,
        }
    }

    /// Positions of the context tokens, or of the text for single layouts.
    pub fn context_range(&self) -> Range<usize> {
        match self.layout {
            Layout::Pair { question_len, context_len } => {
                let start = question_len + 2;
                start..start + context_len
            }
            Layout::Single { text_len } => 1..1 + text_len,
        }
    }

    /// Positions that may never be an answer boundary: the start
    /// marker, every separator and all padding. With `context_only`
    /// the question tokens are excluded as well.
    pub fn undesired_mask(&self, context_only: bool) -> Vec<bool> {
        let mut mask = vec![true; self.len()];
        for m in &mut mask[self.context_range()] {
            *m = false;
        }
        if !context_only {
            for m in &mut mask[self.question_range()] {
                *m = false;
            }
        }
        mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // [CLS] q1 q2 [SEP] c1 c2 c3 [SEP] [PAD] [PAD]
    fn pair() -> TokenSequence {
        let ids = vec![101, 7, 8, 102, 20, 21, 22, 102, 0, 0];
        TokenSequence::new(ids, Layout::Pair { question_len: 2, context_len: 3 }).unwrap()
    }

    #[test]
    fn test_pair_mask_marks_structure_and_padding() {
        let mask = pair().undesired_mask(false);
        assert_eq!(
            mask,
            vec![true, false, false, true, false, false, false, true, true, true]
        );
    }

    #[test]
    fn test_context_only_masks_question() {
        let mask = pair().undesired_mask(true);
        assert!(mask[1] && mask[2]);
        assert!(!mask[4] && !mask[5] && !mask[6]);
    }

    #[test]
    fn test_mask_follows_layout_not_id_values() {
        // A context token that happens to carry the [SEP] id is still a
        // legal boundary: only layout positions are masked.
        let ids = vec![101, 7, 102, 102, 102];
        let seq = TokenSequence::new(ids, Layout::Pair { question_len: 1, context_len: 1 }).unwrap();
        assert_eq!(seq.undesired_mask(false), vec![true, false, true, false, true]);
    }

    #[test]
    fn test_single_layout() {
        let seq = TokenSequence::new(vec![101, 5, 6, 102, 0], Layout::Single { text_len: 2 }).unwrap();
        assert_eq!(seq.undesired_mask(false), vec![true, false, false, true, true]);
        assert_eq!(seq.context_range(), 1..3);
        assert!(seq.question_range().is_empty());
    }

    #[test]
    fn test_ranges() {
        let seq = pair();
        assert_eq!(seq.question_range(), 1..3);
        assert_eq!(seq.context_range(), 4..7);
    }

    #[test]
    fn test_rejects_short_ids() {
        assert!(TokenSequence::new(vec![101, 102], Layout::Pair { question_len: 1, context_len: 0 }).is_none());
    }

    #[test]
    fn test_boundary_markers() {
        let special = SpecialTokens::default();
        assert!(special.is_boundary_marker(101));
        assert!(special.is_boundary_marker(102));
        assert!(!special.is_boundary_marker(0));
    }
}
