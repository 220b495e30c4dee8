// Scripted collaborators for unit tests: a whitespace word
// tokenizer, a runner driven by a closure, and a ready-made
// lazy engine.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::application::engine::{LazyEngine, QaEngine};
use crate::domain::error::{QaError, QaResult};
use crate::domain::tensors::{ModelInput, ModelOutputs};
use crate::domain::tokens::SpecialTokens;
use crate::domain::traits::{InferenceRunner, QaTokenizer};

pub const UNK_ID: u32 = 1;
const FIRST_WORD_ID: u32 = 1000;

pub struct WordTokenizer {
    vocab:   HashMap<String, u32>,
    inverse: HashMap<u32, String>,
    special: SpecialTokens,
    fail:    bool,
}

impl WordTokenizer {
    /// Vocabulary is every distinct word of `corpus`, in order.
    pub fn new(corpus: &str) -> Self {
        let mut vocab = HashMap::new();
        let mut inverse = HashMap::new();
        for word in split_words(corpus) {
            if !vocab.contains_key(&word) {
                let id = FIRST_WORD_ID + vocab.len() as u32;
                inverse.insert(id, word.clone());
                vocab.insert(word, id);
            }
        }
        Self { vocab, inverse, special: SpecialTokens::default(), fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Self::new("") }
    }

    pub fn id(&self, word: &str) -> u32 {
        self.vocab[&word.to_lowercase()]
    }
}

impl QaTokenizer for WordTokenizer {
    fn tokenize(&self, text: &str) -> QaResult<Vec<u32>> {
        if self.fail {
            return Err(QaError::Tokenization("scripted failure".into()));
        }
        Ok(split_words(text)
            .map(|w| self.vocab.get(&w).copied().unwrap_or(UNK_ID))
            .collect())
    }

    /// Unknown ids decode to nothing, like a HuggingFace decode
    /// that skips special tokens.
    fn decode(&self, ids: &[u32]) -> QaResult<String> {
        let words: Vec<&str> = ids
            .iter()
            .filter_map(|&id| match id {
                id if id == self.special.cls => Some("[CLS]"),
                id if id == self.special.sep => Some("[SEP]"),
                id if id == self.special.pad => Some("[PAD]"),
                id => self.inverse.get(&id).map(String::as_str),
            })
            .collect();
        Ok(words.join(" "))
    }

    fn special_tokens(&self) -> SpecialTokens {
        self.special
    }

    fn vocab_size(&self) -> usize {
        self.vocab.len()
    }
}

fn split_words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
}

type RunFn = dyn Fn(&ModelInput) -> QaResult<ModelOutputs> + Send + Sync;

/// Runner whose outputs are computed by a closure over the input.
pub struct ScriptedRunner {
    script: Box<RunFn>,
    calls:  AtomicUsize,
}

impl ScriptedRunner {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&ModelInput) -> QaResult<ModelOutputs> + Send + Sync + 'static,
    {
        Self { script: Box::new(script), calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl InferenceRunner for ScriptedRunner {
    fn run(&self, input: &ModelInput) -> QaResult<ModelOutputs> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.script)(input)
    }
}

/// Logits that are `high` wherever `ids[i] == target` and 0 elsewhere.
pub fn peak_at(ids: &[u32], target: u32, high: f32) -> Vec<f32> {
    ids.iter().map(|&id| if id == target { high } else { 0.0 }).collect()
}

/// A lazy engine whose loader hands out clones of `engine`.
pub fn ready(engine: QaEngine) -> Arc<LazyEngine> {
    Arc::new(LazyEngine::new(move || Ok(engine.clone())))
}
