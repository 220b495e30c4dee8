// ============================================================
// Layer 2 — InitUseCase
// ============================================================
// Scaffolds a checkpoint directory that `ask` / `classify` can
// load, in order:
//
//   Step 1: Read the corpus file        (std::fs)
//   Step 2: Clean each line             (Layer 4 - data)
//   Step 3: Build tokenizer             (Layer 6 - infra)
//   Step 4: Save engine config          (Layer 6 - infra)
//   Step 5: Initialise + save weights   (Layer 5 / 6)
//
// The weights are freshly initialised, not trained. Real
// checkpoints are produced elsewhere and dropped into the same
// directory layout.

use anyhow::{bail, Context, Result};
use burn::prelude::Backend;
use serde::{Deserialize, Serialize};

use crate::application::engine::{EngineConfig, PipelineConfig, Task};
use crate::data::preprocessor::Preprocessor;
use crate::domain::labels::LabelMap;
use crate::infra::checkpoint::{CheckpointManager, CLASSIFIER_NAME, QA_MODEL_NAME};
use crate::infra::tokenizer_store::TokenizerStore;
use crate::ml::model::TransformerConfig;

/// Ids 0..104 are reserved for the BERT special tokens.
const RESERVED_IDS: usize = 104;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitConfig {
    pub checkpoint_dir: String,
    pub corpus_file:    String,
    pub task:           Task,
    /// Class names in index order; required for classification.
    pub labels:         Vec<String>,
    pub vocab_size:     usize,
    pub max_seq_len:    usize,
    pub d_model:        usize,
    pub num_heads:      usize,
    pub num_layers:     usize,
    pub d_ff:           usize,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: "checkpoints".to_string(),
            corpus_file:    "corpus.txt".to_string(),
            task:           Task::QuestionAnswering,
            labels:         Vec::new(),
            vocab_size:     8192,
            max_seq_len:    384,
            d_model:        128,
            num_heads:      4,
            num_layers:     2,
            d_ff:           512,
        }
    }
}

impl InitConfig {
    fn validate(&self) -> Result<()> {
        if self.vocab_size <= RESERVED_IDS {
            bail!("vocab_size must exceed {RESERVED_IDS} (ids below are reserved), got {}", self.vocab_size);
        }
        if self.num_heads == 0 || self.d_model % self.num_heads != 0 {
            bail!("d_model {} must be a positive multiple of num_heads {}", self.d_model, self.num_heads);
        }
        if self.task == Task::Classification && self.labels.is_empty() {
            bail!("classification needs at least one label (--labels a,b,c)");
        }
        Ok(())
    }

    fn model_config(&self) -> TransformerConfig {
        let num_labels = match self.task {
            Task::QuestionAnswering => 0,
            Task::Classification    => self.labels.len(),
        };
        TransformerConfig::new(
            self.vocab_size,
            self.max_seq_len,
            self.d_model,
            self.num_heads,
            self.num_layers,
            self.d_ff,
            0.0,
            num_labels,
        )
    }
}

pub struct InitUseCase {
    config: InitConfig,
}

impl InitUseCase {
    pub fn new(config: InitConfig) -> Self {
        Self { config }
    }

    /// Write engine_config.json, tokenizer.json and the weights.
    pub fn execute<B: Backend>(&self, device: &B::Device) -> Result<EngineConfig> {
        let cfg = &self.config;
        cfg.validate()?;

        // ── Step 1: Read corpus ──────────────────────────────────────────────
        tracing::info!("Reading corpus '{}'", cfg.corpus_file);
        let raw = std::fs::read_to_string(&cfg.corpus_file)
            .with_context(|| format!("Cannot read corpus '{}'", cfg.corpus_file))?;

        // ── Step 2: Clean ────────────────────────────────────────────────────
        let prep = Preprocessor::new();
        let lines: Vec<String> = raw
            .lines()
            .map(|l| prep.clean(l))
            .filter(|l| !l.is_empty())
            .collect();
        if lines.is_empty() {
            bail!("Corpus '{}' has no text", cfg.corpus_file);
        }
        tracing::info!("Corpus has {} non-empty lines", lines.len());

        // ── Step 3: Tokenizer ────────────────────────────────────────────────
        TokenizerStore::new(&cfg.checkpoint_dir).build_and_save(&lines, cfg.vocab_size)?;

        // ── Step 4: Engine config ────────────────────────────────────────────
        let model = cfg.model_config();
        let engine_cfg = EngineConfig {
            task:     cfg.task,
            model:    model.clone(),
            pipeline: PipelineConfig { max_seq_len: cfg.max_seq_len, ..Default::default() },
            labels:   match cfg.task {
                Task::QuestionAnswering => None,
                Task::Classification    => Some(LabelMap::from_names(cfg.labels.iter().cloned())),
            },
        };
        let ckpt = CheckpointManager::new(&cfg.checkpoint_dir);
        ckpt.save_config(&engine_cfg)?;

        // ── Step 5: Weights ──────────────────────────────────────────────────
        match cfg.task {
            Task::QuestionAnswering => {
                ckpt.save_model::<B, _>(&model.init_qa::<B>(device), QA_MODEL_NAME)?
            }
            Task::Classification => {
                ckpt.save_model::<B, _>(&model.init_classifier::<B>(device), CLASSIFIER_NAME)?
            }
        }

        tracing::info!("Initialised {:?} checkpoint in '{}'", cfg.task, cfg.checkpoint_dir);
        Ok(engine_cfg)
    }
}
