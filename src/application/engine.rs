// ============================================================
// Layer 2 — QaEngine (the pipeline handle)
// ============================================================
// One owned handle holding the immutable, shared collaborators
// (tokenizer, inference runner) plus the pipeline settings.
// Built once by an explicit initialisation step, then shared as
// Arc<QaEngine>; every call is an independent pure pass:
//
//   clean → assemble → infer → softmax(masked) → decode spans → resolve
//
// LazyEngine keeps the "initialise on first use" contract
// without a global: the first callers block on one in-flight
// load, and everybody afterwards reuses its result.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use burn::prelude::Backend;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::data::assembler::{AssemblerConfig, InputAssembler};
use crate::data::preprocessor::Preprocessor;
use crate::domain::error::{QaError, QaResult};
use crate::domain::labels::LabelMap;
use crate::domain::span::{Answer, Classification, SpanCandidate};
use crate::domain::tensors::{ModelInput, END_LOGITS, LOGITS, START_LOGITS};
use crate::domain::tokens::TokenSequence;
use crate::domain::traits::{InferenceRunner, QaTokenizer};
use crate::infra::checkpoint::{CheckpointManager, CLASSIFIER_NAME, QA_MODEL_NAME};
use crate::infra::tokenizer_store::{HfTokenizer, TokenizerStore};
use crate::ml::model::TransformerConfig;
use crate::ml::normalizer::{reference_probability, softmax};
use crate::ml::resolver::{resolve_label, resolve_span};
use crate::ml::runner::BurnRunner;
use crate::ml::span_decoder::SpanDecoder;

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    QuestionAnswering,
    Classification,
}

/// Per-call pipeline settings. Missing JSON fields take defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub max_seq_len:       usize,
    pub pad_to_max_length: bool,
    pub truncate:          bool,
    /// Exclusive bound on end - start.
    pub max_answer_len:    usize,
    pub top_k:             usize,
    /// Mask question tokens so answers come from the context only.
    pub context_only:      bool,
    /// Drop spans that do not beat the [CLS] "no answer" score.
    pub null_answer:       bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_seq_len:       384,
            pad_to_max_length: true,
            truncate:          true,
            max_answer_len:    30,
            top_k:             1,
            context_only:      true,
            null_answer:       true,
        }
    }
}

impl PipelineConfig {
    pub fn assembler(&self) -> AssemblerConfig {
        AssemblerConfig {
            max_seq_len:       self.max_seq_len,
            pad_to_max_length: self.pad_to_max_length,
            truncate:          self.truncate,
        }
    }
}

/// Everything needed to rebuild an engine from a checkpoint
/// directory. Persisted as engine_config.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub task:     Task,
    pub model:    TransformerConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub labels:   Option<LabelMap>,
}

// ─── QaEngine ────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct QaEngine {
    tokenizer: Arc<dyn QaTokenizer>,
    runner:    Arc<dyn InferenceRunner>,
    config:    PipelineConfig,
    labels:    Option<LabelMap>,
}

impl QaEngine {
    pub fn new(
        tokenizer: Arc<dyn QaTokenizer>,
        runner:    Arc<dyn InferenceRunner>,
        config:    PipelineConfig,
    ) -> Self {
        Self { tokenizer, runner, config, labels: None }
    }

    pub fn with_labels(mut self, labels: LabelMap) -> Self {
        self.labels = Some(labels);
        self
    }

    /// Replace the pipeline settings (CLI overrides).
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load config, tokenizer and weights from a checkpoint
    /// directory. Every failure here is an initialisation failure.
    pub fn from_checkpoint<B: Backend>(dir: impl Into<PathBuf>, device: B::Device) -> QaResult<Self> {
        let dir = dir.into();
        let init = |e: anyhow::Error| QaError::Initialization(format!("{e:#}"));

        let ckpt = CheckpointManager::new(dir.clone());
        let cfg = ckpt.load_config().map_err(init)?;
        if cfg.pipeline.max_seq_len > cfg.model.max_seq_len {
            return Err(QaError::Initialization(format!(
                "pipeline max_seq_len {} exceeds the model's {}",
                cfg.pipeline.max_seq_len, cfg.model.max_seq_len
            )));
        }

        let tokenizer = HfTokenizer::new(TokenizerStore::new(dir.clone()).load().map_err(init)?)?;
        if tokenizer.vocab_size() > cfg.model.vocab_size {
            return Err(QaError::Initialization(format!(
                "tokenizer has {} entries but the model embeds only {}",
                tokenizer.vocab_size(), cfg.model.vocab_size
            )));
        }
        let pad = tokenizer.special_tokens().pad;

        let runner: Arc<dyn InferenceRunner> = match cfg.task {
            Task::QuestionAnswering => {
                let model = ckpt
                    .load_model::<B, _>(cfg.model.init_qa::<B>(&device), QA_MODEL_NAME, &device)
                    .map_err(init)?;
                Arc::new(BurnRunner::question_answering(model, device, pad))
            }
            Task::Classification => {
                let labels = cfg.labels.as_ref().ok_or_else(|| {
                    QaError::Initialization("classification checkpoint has no label map".into())
                })?;
                if labels.len() != cfg.model.num_labels {
                    return Err(QaError::Initialization(format!(
                        "label map holds {} labels but the model predicts {}",
                        labels.len(), cfg.model.num_labels
                    )));
                }
                let model = ckpt
                    .load_model::<B, _>(cfg.model.init_classifier::<B>(&device), CLASSIFIER_NAME, &device)
                    .map_err(init)?;
                Arc::new(BurnRunner::classifier(model, device, pad))
            }
        };

        tracing::info!("Engine ready ({:?}) from '{}'", cfg.task, dir.display());

        let engine = Self::new(Arc::new(tokenizer), runner, cfg.pipeline);
        Ok(match cfg.labels {
            Some(labels) => engine.with_labels(labels),
            None => engine,
        })
    }

    /// Run the span pipeline. An empty Vec means no answer: no
    /// valid span, none beating the [CLS] score, or only spans whose
    /// text is blank.
    pub fn answer(&self, question: &str, context: &str) -> QaResult<Vec<Answer>> {
        let prep = Preprocessor::new();
        let (question, context) = (prep.clean(question), prep.clean(context));
        let tokenizer = self.tokenizer.as_ref();

        let tokens = InputAssembler::new(self.config.assembler())
            .assemble_pair(tokenizer, &question, &context)?;
        let outputs = self.runner.run(&ModelInput::from(&tokens))?;

        let n = tokens.len();
        let mask = tokens.undesired_mask(self.config.context_only);
        let start_logits = outputs.get(START_LOGITS)?.row(n)?;
        let end_logits   = outputs.get(END_LOGITS)?.row(n)?;
        let start_probs  = softmax(start_logits, Some(&mask))?;
        let end_probs    = softmax(end_logits,   Some(&mask))?;

        // [CLS] sits at position 0 of every assembled pair
        let null_score = if self.config.null_answer {
            let start = reference_probability(start_logits, &mask, 0)?;
            let end   = reference_probability(end_logits,   &mask, 0)?;
            start.zip(end).map(|(s, e)| s * e)
        } else {
            None
        };
        let decoder = |top_k| {
            SpanDecoder::new(top_k, self.config.max_answer_len).with_null_score(null_score)
        };

        let top_k = self.config.top_k;
        let spans = decoder(top_k).decode(&start_probs, &end_probs, &mask)?;
        let ranked_all = spans.len() < top_k;
        tracing::debug!("{} span(s) over {} tokens", spans.len(), n);

        let mut answers = self.non_blank_answers(&tokens, spans, top_k)?;
        if answers.len() < top_k && !ranked_all {
            // Blank spans took slots; rank every valid span and refill
            let spans = decoder(usize::MAX).decode(&start_probs, &end_probs, &mask)?;
            answers = self.non_blank_answers(&tokens, spans, top_k)?;
        }
        Ok(answers)
    }

    /// Resolve spans best first, skipping blank text, until `top_k` answers.
    fn non_blank_answers(
        &self,
        tokens: &TokenSequence,
        spans:  Vec<SpanCandidate>,
        top_k:  usize,
    ) -> QaResult<Vec<Answer>> {
        let mut answers = Vec::with_capacity(top_k.min(spans.len()));
        for span in spans {
            if answers.len() == top_k {
                break;
            }
            let text = resolve_span(self.tokenizer.as_ref(), tokens, &span)?;
            if text.trim().is_empty() {
                tracing::debug!("Span [{},{}] resolves to blank text, skipped", span.start, span.end);
                continue;
            }
            tracing::debug!("Span [{},{}] ({} tokens) score={:.4} answer='{}'", span.start, span.end, span.len(), span.score, text);
            answers.push(Answer { text, span });
        }
        Ok(answers)
    }

    /// Run the classification pipeline: the same assembler and
    /// normaliser, then argmax and label lookup.
    pub fn classify(&self, text: &str) -> QaResult<Classification> {
        let labels = self
            .labels
            .as_ref()
            .ok_or_else(|| QaError::Configuration("engine has no label map".into()))?;

        let text = Preprocessor::new().clean(text);
        let tokens = InputAssembler::new(self.config.assembler())
            .assemble_single(self.tokenizer.as_ref(), &text)?;
        let outputs = self.runner.run(&ModelInput::from(&tokens))?;

        let logits = outputs.get(LOGITS)?;
        let probs = softmax(logits.row(logits.data.len())?, None)?;
        let result = resolve_label(labels, &probs)?;

        tracing::debug!("Class {} '{}' p={:.4}", result.index, result.label, result.probability);
        Ok(result)
    }
}

// ─── LazyEngine ──────────────────────────────────────────────────────────────

type Loader = dyn Fn() -> QaResult<QaEngine> + Send + Sync;

pub struct LazyEngine {
    cell:             OnceCell<QaResult<Arc<QaEngine>>>,
    loader:           Box<Loader>,
    failure_reported: AtomicBool,
}

impl LazyEngine {
    /// `loader` runs at most once, on the first `acquire`.
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> QaResult<QaEngine> + Send + Sync + 'static,
    {
        Self {
            cell:             OnceCell::new(),
            loader:           Box::new(loader),
            failure_reported: AtomicBool::new(false),
        }
    }

    /// Get the shared engine, loading it on first use.
    ///
    ///   Ok(Some(engine))      ready
    ///   Err(Initialization)   load failed; only the first caller sees this
    ///   Ok(None)              load failed earlier and was already reported
    ///
    /// A failed load is never retried.
    pub fn acquire(&self) -> QaResult<Option<Arc<QaEngine>>> {
        let state = self.cell.get_or_init(|| {
            tracing::info!("Initialising engine");
            (self.loader)()
                .map(Arc::new)
                .map_err(|e| if e.is_initialization() { e } else { QaError::Initialization(e.to_string()) })
        });

        match state {
            Ok(engine) => Ok(Some(Arc::clone(engine))),
            Err(e) if !self.failure_reported.swap(true, Ordering::SeqCst) => {
                tracing::error!("Engine initialisation failed: {e}");
                Err(e.clone())
            }
            Err(e) => {
                tracing::warn!("Engine unavailable after earlier initialisation failure: {e}");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use crate::domain::tensors::{ModelOutputs, OutputTensor};
    use crate::test_support::{peak_at, ScriptedRunner, WordTokenizer};

    const CONTEXT: &str = "Austin is the Capital of Texas";

    fn span_engine(config: PipelineConfig) -> (QaEngine, Arc<WordTokenizer>) {
        let tok = Arc::new(WordTokenizer::new("what is the capital of texas austin"));
        let austin = tok.id("austin");
        let runner = ScriptedRunner::new(move |input| {
            let n = input.seq_len();
            let logits = peak_at(&input.ids, austin, 8.0);
            Ok(ModelOutputs::new()
                .with(START_LOGITS, OutputTensor::new(logits.clone(), vec![1, n]))
                .with(END_LOGITS,   OutputTensor::new(logits, vec![1, n])))
        });
        let engine = QaEngine::new(tok.clone(), Arc::new(runner), config);
        (engine, tok)
    }

    #[test]
    fn test_answer_resolves_peak_span() {
        let (engine, _) = span_engine(PipelineConfig { max_seq_len: 32, ..Default::default() });
        let answers = engine.answer("What is the capital of Texas?", CONTEXT).unwrap();
        assert_eq!(answers.len(), 1);
        assert!(answers[0].text.eq_ignore_ascii_case("Austin"));
    }

    #[test]
    fn test_top_k_answers_are_ordered() {
        let config = PipelineConfig { max_seq_len: 32, top_k: 3, ..Default::default() };
        let (engine, _) = span_engine(config);
        let answers = engine.answer("What is the capital of Texas?", CONTEXT).unwrap();
        assert_eq!(answers.len(), 3);
        assert_eq!(answers[0].text, "austin");
        assert!(answers.windows(2).all(|w| w[0].span.score >= w[1].span.score));
    }

    fn flat_runner() -> ScriptedRunner {
        ScriptedRunner::new(|input| {
            let n = input.seq_len();
            Ok(ModelOutputs::new()
                .with(START_LOGITS, OutputTensor::new(vec![0.0; n], vec![1, n]))
                .with(END_LOGITS,   OutputTensor::new(vec![0.0; n], vec![1, n])))
        })
    }

    #[test]
    fn test_irrelevant_context_gives_no_answer_by_default() {
        let tok = Arc::new(WordTokenizer::new("what is the capital of texas cats sleep a lot"));
        let cls = tok.special_tokens().cls;

        // Model puts its mass on [CLS]: the "no answer" position
        let runner = ScriptedRunner::new(move |input| {
            let n = input.seq_len();
            let logits = peak_at(&input.ids, cls, 8.0);
            Ok(ModelOutputs::new()
                .with(START_LOGITS, OutputTensor::new(logits.clone(), vec![1, n]))
                .with(END_LOGITS,   OutputTensor::new(logits, vec![1, n])))
        });
        let engine = QaEngine::new(tok.clone(), Arc::new(runner), PipelineConfig::default());
        assert!(engine.answer("What is the capital of Texas?", "Cats sleep a lot").unwrap().is_empty());

        // Flat logits carry no evidence either way
        let engine = QaEngine::new(tok, Arc::new(flat_runner()), PipelineConfig::default());
        assert!(engine.answer("What is the capital of Texas?", "Cats sleep a lot").unwrap().is_empty());
    }

    #[test]
    fn test_empty_context_never_answers_from_question() {
        let tok = Arc::new(WordTokenizer::new("what is the capital of texas"));
        let engine = QaEngine::new(tok, Arc::new(flat_runner()), PipelineConfig::default());
        assert!(engine.answer("What is the capital of Texas?", "").unwrap().is_empty());
    }

    #[test]
    fn test_blank_spans_do_not_take_top_k_slots() {
        // "zzz" is out of vocabulary and decodes to nothing
        let tok = Arc::new(WordTokenizer::new("where austin"));
        let austin = tok.id("austin");
        let runner = ScriptedRunner::new(move |input| {
            let n = input.seq_len();
            let logits: Vec<f32> = input
                .ids
                .iter()
                .map(|&id| match id {
                    crate::test_support::UNK_ID => 10.0,
                    id if id == austin => 8.0,
                    _ => 0.0,
                })
                .collect();
            Ok(ModelOutputs::new()
                .with(START_LOGITS, OutputTensor::new(logits.clone(), vec![1, n]))
                .with(END_LOGITS,   OutputTensor::new(logits, vec![1, n])))
        });
        let runner = Arc::new(runner);

        for top_k in [1, 2] {
            let config = PipelineConfig { max_seq_len: 16, top_k, ..Default::default() };
            let engine = QaEngine::new(tok.clone(), runner.clone(), config);
            let answers = engine.answer("where", "zzz austin").unwrap();
            assert_eq!(answers.len(), top_k);
            assert!(answers.iter().all(|a| a.text == "austin"));
        }
        // One forward pass per request, refill included
        assert_eq!(runner.calls(), 2);
    }

    #[test]
    fn test_missing_output_is_configuration_error() {
        let tok = Arc::new(WordTokenizer::new("a b"));
        let runner = ScriptedRunner::new(|input| {
            let n = input.seq_len();
            Ok(ModelOutputs::new().with(START_LOGITS, OutputTensor::new(vec![0.0; n], vec![1, n])))
        });
        let engine = QaEngine::new(tok, Arc::new(runner), PipelineConfig::default());
        assert!(matches!(engine.answer("a", "b"), Err(QaError::Configuration(_))));
    }

    #[test]
    fn test_classify_without_labels_is_configuration_error() {
        let (engine, _) = span_engine(PipelineConfig::default());
        assert!(matches!(engine.classify("hello"), Err(QaError::Configuration(_))));
    }

    #[test]
    fn test_lazy_engine_loads_once_under_contention() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = loads.clone();
        let lazy = Arc::new(LazyEngine::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            Ok(span_engine(PipelineConfig::default()).0)
        }));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lazy = lazy.clone();
                std::thread::spawn(move || lazy.acquire().unwrap().is_some())
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap());
        }
        assert!(lazy.acquire().unwrap().is_some());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_lazy_engine_failure_surfaces_once() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = loads.clone();
        let lazy = LazyEngine::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(QaError::Initialization("missing weights".into()))
        });

        assert!(matches!(lazy.acquire(), Err(QaError::Initialization(_))));
        assert!(matches!(lazy.acquire(), Ok(None)));
        assert!(matches!(lazy.acquire(), Ok(None)));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_lazy_engine_wraps_other_load_errors() {
        let lazy = LazyEngine::new(|| Err(QaError::Configuration("bad".into())));
        assert!(matches!(lazy.acquire(), Err(QaError::Initialization(_))));
    }

    #[test]
    fn test_pipeline_config_fills_defaults_from_json() {
        let cfg: PipelineConfig = serde_json::from_str(r#"{ "top_k": 5 }"#).unwrap();
        assert_eq!(cfg.top_k, 5);
        assert_eq!(cfg.max_answer_len, 30);
        assert!(cfg.truncate);
    }

    #[test]
    fn test_from_checkpoint_missing_dir_is_initialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let res = QaEngine::from_checkpoint::<burn::backend::NdArray>(dir.path(), Default::default());
        assert!(matches!(res, Err(QaError::Initialization(_))));
    }
}
