// ============================================================
// Layer 4 — Input Assembler
// ============================================================
// Builds the exact id sequence the model consumes.
//
//   [CLS] question [SEP] context [SEP] [PAD] [PAD] ...
//
// Truncation policy (when the pair does not fit):
//   budget   = max_seq_len - 3 structural tokens
//   question ← first budget/2 tokens
//   context  ← first budget - budget/2 tokens
// The split point is fixed, whatever the two texts contain.
// Each side is cut from its tail independently.
//
// Padding policy: right-pad with [PAD] up to max_seq_len.

use serde::{Deserialize, Serialize};

use crate::domain::error::{QaError, QaResult};
use crate::domain::tokens::{Layout, TokenSequence};
use crate::domain::traits::QaTokenizer;

/// [CLS] + 2 × [SEP]
pub const PAIR_STRUCTURAL_TOKENS: usize = 3;
/// [CLS] + [SEP]
pub const SINGLE_STRUCTURAL_TOKENS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblerConfig {
    pub max_seq_len:       usize,
    pub pad_to_max_length: bool,
    pub truncate:          bool,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self { max_seq_len: 384, pad_to_max_length: true, truncate: true }
    }
}

pub struct InputAssembler {
    config: AssemblerConfig,
}

impl InputAssembler {
    pub fn new(config: AssemblerConfig) -> Self {
        Self { config }
    }

    /// Assemble `[CLS] question [SEP] context [SEP]` for the span task.
    pub fn assemble_pair(
        &self,
        tokenizer: &dyn QaTokenizer,
        question:  &str,
        context:   &str,
    ) -> QaResult<TokenSequence> {
        let max = self.checked_max(PAIR_STRUCTURAL_TOKENS)?;

        let mut q_ids = tokenizer.tokenize(question)?;
        let mut c_ids = tokenizer.tokenize(context)?;

        let total = q_ids.len() + c_ids.len() + PAIR_STRUCTURAL_TOKENS;
        if total > max {
            if !self.config.truncate {
                return Err(QaError::InputTooLong { len: total, max });
            }
            let (q_budget, c_budget) = split_budget(max - PAIR_STRUCTURAL_TOKENS);
            q_ids.truncate(q_budget);
            c_ids.truncate(c_budget);
            tracing::debug!(
                "Truncated pair from {} to {} tokens (question {}, context {})",
                total,
                q_ids.len() + c_ids.len() + PAIR_STRUCTURAL_TOKENS,
                q_ids.len(),
                c_ids.len(),
            );
        }

        let special = tokenizer.special_tokens();
        let mut ids = Vec::with_capacity(max);
        ids.push(special.cls);
        ids.extend_from_slice(&q_ids);
        ids.push(special.sep);
        ids.extend_from_slice(&c_ids);
        ids.push(special.sep);
        self.pad(&mut ids, special.pad, max);

        let layout = Layout::Pair { question_len: q_ids.len(), context_len: c_ids.len() };
        TokenSequence::new(ids, layout)
            .ok_or_else(|| QaError::Configuration("assembled pair shorter than its layout".into()))
    }

    /// Assemble `[CLS] text [SEP]` for the classification task.
    /// Truncation cuts the text from its tail.
    pub fn assemble_single(&self, tokenizer: &dyn QaTokenizer, text: &str) -> QaResult<TokenSequence> {
        let max = self.checked_max(SINGLE_STRUCTURAL_TOKENS)?;

        let mut t_ids = tokenizer.tokenize(text)?;
        let total = t_ids.len() + SINGLE_STRUCTURAL_TOKENS;
        if total > max {
            if !self.config.truncate {
                return Err(QaError::InputTooLong { len: total, max });
            }
            t_ids.truncate(max - SINGLE_STRUCTURAL_TOKENS);
            tracing::debug!("Truncated text from {} to {} tokens", total, max);
        }

        let special = tokenizer.special_tokens();
        let mut ids = Vec::with_capacity(max);
        ids.push(special.cls);
        ids.extend_from_slice(&t_ids);
        ids.push(special.sep);
        self.pad(&mut ids, special.pad, max);

        TokenSequence::new(ids, Layout::Single { text_len: t_ids.len() })
            .ok_or_else(|| QaError::Configuration("assembled text shorter than its layout".into()))
    }

    fn checked_max(&self, structural: usize) -> QaResult<usize> {
        let max = self.config.max_seq_len;
        if max < structural {
            return Err(QaError::Configuration(format!(
                "max_seq_len {max} cannot hold {structural} structural tokens"
            )));
        }
        Ok(max)
    }

    fn pad(&self, ids: &mut Vec<u32>, pad_id: u32, max: usize) {
        if self.config.pad_to_max_length && ids.len() < max {
            ids.resize(max, pad_id);
        }
    }
}

/// Fixed split of the non-structural budget: (question, context).
pub fn split_budget(budget: usize) -> (usize, usize) {
    let question = budget / 2;
    (question, budget - question)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::WordTokenizer;

    fn assembler(max_seq_len: usize, pad: bool, truncate: bool) -> InputAssembler {
        InputAssembler::new(AssemblerConfig { max_seq_len, pad_to_max_length: pad, truncate })
    }

    #[test]
    fn test_pair_layout() {
        let tok = WordTokenizer::new("what is the capital austin of texas");
        let seq = assembler(16, false, true)
            .assemble_pair(&tok, "what is", "austin texas")
            .unwrap();
        let sp = tok.special_tokens();
        let ids = seq.ids();
        assert_eq!(ids.len(), 7);
        assert_eq!(ids[0], sp.cls);
        assert_eq!(ids[3], sp.sep);
        assert_eq!(ids[6], sp.sep);
        assert_eq!(&ids[4..6], tok.tokenize("austin texas").unwrap().as_slice());
    }

    #[test]
    fn test_padding_reaches_max_len() {
        let tok = WordTokenizer::new("a b c");
        let seq = assembler(10, true, true).assemble_pair(&tok, "a", "b c").unwrap();
        assert_eq!(seq.len(), 10);
        assert_eq!(seq.context_range().end, 5);
        assert!(seq.ids()[6..].iter().all(|&id| id == tok.special_tokens().pad));
    }

    #[test]
    fn test_no_padding_keeps_natural_length() {
        let tok = WordTokenizer::new("a b c");
        let seq = assembler(10, false, true).assemble_pair(&tok, "a", "b c").unwrap();
        assert_eq!(seq.len(), 6);
    }

    #[test]
    fn test_truncation_splits_budget_in_half() {
        let words: Vec<String> = (0..40).map(|i| format!("w{i}")).collect();
        let text = words.join(" ");
        let tok = WordTokenizer::new(&text);

        // budget = 16 - 3 = 13 → question 6, context 7
        let seq = assembler(16, true, true).assemble_pair(&tok, &text, &text).unwrap();
        assert_eq!(seq.len(), 16);
        assert_eq!(seq.question_range().len(), 6);
        assert_eq!(seq.context_range().len(), 7);

        // Tail truncation keeps the leading tokens of each side.
        let first_six = tok.tokenize("w0 w1 w2 w3 w4 w5").unwrap();
        assert_eq!(&seq.ids()[seq.question_range()], first_six.as_slice());
    }

    #[test]
    fn test_truncation_split_is_fixed_for_short_question() {
        let words: Vec<String> = (0..40).map(|i| format!("w{i}")).collect();
        let context = words.join(" ");
        let tok = WordTokenizer::new(&context);

        let seq = assembler(16, false, true).assemble_pair(&tok, "w0", &context).unwrap();
        assert!(seq.len() <= 16);
        assert_eq!(seq.question_range().len(), 1);
        assert_eq!(seq.context_range().len(), 7);
    }

    #[test]
    fn test_truncation_disabled_is_an_error() {
        let tok = WordTokenizer::new("a b c d e f");
        let err = assembler(6, true, false)
            .assemble_pair(&tok, "a b", "c d e f")
            .unwrap_err();
        assert_eq!(err, QaError::InputTooLong { len: 9, max: 6 });
    }

    #[test]
    fn test_tiny_max_len_is_configuration_error() {
        let tok = WordTokenizer::new("a");
        let err = assembler(2, true, true).assemble_pair(&tok, "a", "a").unwrap_err();
        assert!(matches!(err, QaError::Configuration(_)));
    }

    #[test]
    fn test_empty_context_still_well_formed() {
        let tok = WordTokenizer::new("a");
        let seq = assembler(8, false, true).assemble_pair(&tok, "a", "").unwrap();
        assert_eq!(seq.len(), 4);
        assert!(seq.context_range().is_empty());
    }

    #[test]
    fn test_single_layout_and_truncation() {
        let tok = WordTokenizer::new("a b c d e f g h");
        let seq = assembler(5, true, true).assemble_single(&tok, "a b c d e f g h").unwrap();
        let sp = tok.special_tokens();
        assert_eq!(seq.len(), 5);
        assert_eq!(seq.ids()[0], sp.cls);
        assert_eq!(seq.ids()[4], sp.sep);
        assert_eq!(seq.context_range(), 1..4);
    }

    #[test]
    fn test_tokenizer_failure_propagates() {
        let tok = WordTokenizer::failing();
        let err = assembler(8, true, true).assemble_pair(&tok, "a", "b").unwrap_err();
        assert!(matches!(err, QaError::Tokenization(_)));
    }

    #[test]
    fn test_split_budget() {
        assert_eq!(split_budget(13), (6, 7));
        assert_eq!(split_budget(0), (0, 0));
        assert_eq!(split_budget(509), (254, 255));
    }
}
