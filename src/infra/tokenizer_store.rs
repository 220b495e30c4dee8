// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Loads the HuggingFace tokenizer.json shipped next to the
// weights, and adapts it to the Layer 3 QaTokenizer trait.
//
// For the `init` command it can also write a word-level
// tokenizer built from a text corpus. The JSON is built by hand
// instead of going through a trainer, which sidesteps the
// Trainer::Model / ModelWrapper mismatch in tokenizers 0.15.
//
// Special ids follow the BERT convention:
//   [PAD]=0  [UNK]=1  [CLS]=101  [SEP]=102  [MASK]=103

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use tokenizers::Tokenizer;

use crate::domain::error::{QaError, QaResult};
use crate::domain::tokens::SpecialTokens;
use crate::domain::traits::QaTokenizer;

pub const TOKENIZER_FILE: &str = "tokenizer.json";

const SPECIAL_TOKENS: [(&str, u32); 5] = [
    ("[PAD]", 0),
    ("[UNK]", 1),
    ("[CLS]", 101),
    ("[SEP]", 102),
    ("[MASK]", 103),
];
const FIRST_WORD_ID: usize = 104;

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(TOKENIZER_FILE)
    }

    /// Load a previously saved tokenizer from JSON file
    pub fn load(&self) -> Result<Tokenizer> {
        let path = self.path();
        Tokenizer::from_file(&path)
            .map_err(|e| anyhow::anyhow!(
                "Cannot load tokenizer from '{}': {}", path.display(), e
            ))
    }

    /// Build a word-level vocabulary from `texts`, write it as
    /// tokenizer.json and load it back.
    pub fn build_and_save(&self, texts: &[String], vocab_size: usize) -> Result<Tokenizer> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        // ── Step 1: Count pre-tokenised pieces ───────────────────────────────
        let mut freq: HashMap<String, usize> = HashMap::new();
        for text in texts {
            for piece in pre_tokenize(text) {
                *freq.entry(piece).or_insert(0) += 1;
            }
        }

        // Most frequent first; ties alphabetical so rebuilds are stable
        let mut words: Vec<(String, usize)> = freq.into_iter().collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        words.truncate(vocab_size.saturating_sub(FIRST_WORD_ID));

        // ── Step 2: Vocab JSON ────────────────────────────────────────────────
        let mut vocab = serde_json::Map::new();
        for (token, id) in SPECIAL_TOKENS {
            vocab.insert(token.to_string(), serde_json::json!(id));
        }
        for (offset, (word, _)) in words.iter().enumerate() {
            vocab.insert(word.clone(), serde_json::json!(FIRST_WORD_ID + offset));
        }

        let added_tokens: Vec<serde_json::Value> = SPECIAL_TOKENS
            .iter()
            .map(|(token, id)| serde_json::json!({
                "id": id, "content": token, "single_word": false, "lstrip": false,
                "rstrip": false, "normalized": false, "special": true
            }))
            .collect();

        // ── Step 3: tokenizer.json in HuggingFace format ──────────────────────
        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": added_tokens,
            "normalizer": {
                "type": "BertNormalizer",
                "clean_text": true,
                "handle_chinese_chars": true,
                "strip_accents": false,
                "lowercase": true
            },
            "pre_tokenizer": { "type": "Whitespace" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": "[UNK]"
            }
        });

        let path = self.path();
        std::fs::write(&path, serde_json::to_string_pretty(&tokenizer_json)?)
            .with_context(|| format!("Cannot write tokenizer JSON to '{}'", path.display()))?;

        tracing::info!(
            "Tokenizer built with {} words, saved to '{}'",
            words.len(),
            path.display()
        );

        self.load()
    }
}

/// Lowercased word and punctuation runs, mirroring the
/// `Whitespace` pre-tokenizer (`\w+|[^\w\s]+`).
fn pre_tokenize(text: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    for chunk in text.split_whitespace() {
        let mut current = String::new();
        let mut current_is_word = None;
        for c in chunk.chars() {
            let is_word = c.is_alphanumeric() || c == '_';
            if current_is_word.is_some_and(|w| w != is_word) {
                pieces.push(std::mem::take(&mut current));
            }
            current_is_word = Some(is_word);
            current.extend(c.to_lowercase());
        }
        if !current.is_empty() {
            pieces.push(current);
        }
    }
    pieces
}

// ─── HfTokenizer ──────────────────────────────────────────────────────────────
/// `tokenizers::Tokenizer` behind the QaTokenizer trait.
///
/// Added special tokens are matched even inside raw text, so a
/// literal "[SEP]" typed by a user would come back as the real
/// separator. Those ids are rewritten to [UNK] on the way in.
pub struct HfTokenizer {
    inner:    Tokenizer,
    special:  SpecialTokens,
    unk:      u32,
    reserved: Vec<u32>,
}

impl HfTokenizer {
    /// Resolve [CLS] / [SEP] / [PAD] / [UNK] from the vocabulary.
    pub fn new(inner: Tokenizer) -> QaResult<Self> {
        let id = |token: &str| {
            inner.token_to_id(token).ok_or_else(|| {
                QaError::Initialization(format!("tokenizer vocabulary has no '{token}' token"))
            })
        };
        let special = SpecialTokens::new(id("[CLS]")?, id("[SEP]")?, id("[PAD]")?);
        let unk = id("[UNK]")?;
        let reserved = SPECIAL_TOKENS
            .iter()
            .filter_map(|(token, _)| inner.token_to_id(token))
            .filter(|&reserved| reserved != unk)
            .collect();
        Ok(Self { inner, special, unk, reserved })
    }
}

impl QaTokenizer for HfTokenizer {
    fn tokenize(&self, text: &str) -> QaResult<Vec<u32>> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| QaError::Tokenization(e.to_string()))?;
        Ok(encoding
            .get_ids()
            .iter()
            .map(|&id| if self.reserved.contains(&id) { self.unk } else { id })
            .collect())
    }

    fn decode(&self, ids: &[u32]) -> QaResult<String> {
        self.inner
            .decode(ids, true)
            .map_err(|e| QaError::Tokenization(format!("decode: {e}")))
    }

    fn special_tokens(&self) -> SpecialTokens {
        self.special
    }

    fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }
}
