// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder,
// plus the engine config needed to rebuild the model first.
//
// Directory layout:
//   checkpoints/
//     engine_config.json        ← task, model dims, pipeline settings, labels
//     tokenizer.json            ← written by TokenizerStore
//     qa_model.mpk.gz           ← span-head weights
//     classifier_model.mpk.gz   ← class-head weights
//
// The recorder is type-safe: loading fails if the architecture
// rebuilt from engine_config.json does not match the weights.

use anyhow::{Context, Result};
use std::{fs, path::PathBuf};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};

use crate::application::engine::EngineConfig;

pub const ENGINE_CONFIG_FILE: &str = "engine_config.json";
pub const QA_MODEL_NAME:      &str = "qa_model";
pub const CLASSIFIER_NAME:    &str = "classifier_model";

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Save module weights as `{dir}/{name}.mpk.gz`.
    pub fn save_model<B: Backend, M: Module<B>>(&self, model: &M, name: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        // Path without extension; the recorder adds it
        let path = self.dir.join(name);
        Recorder::<B>::record(&CompactRecorder::new(), model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save weights to '{}'", path.display()))?;

        tracing::debug!("Saved weights '{}'", path.display());
        Ok(())
    }

    /// Load weights saved under `name` into a freshly built module.
    pub fn load_model<B: Backend, M: Module<B>>(
        &self,
        model:  M,
        name:   &str,
        device: &B::Device,
    ) -> Result<M> {
        let path = self.dir.join(name);
        let record = Recorder::<B>::load(&CompactRecorder::new(), path.clone(), device)
            .with_context(|| {
                format!("Cannot load weights '{}'. Have you run 'init' first?", path.display())
            })?;

        tracing::info!("Loaded weights from '{}'", path.display());
        Ok(model.load_record(record))
    }

    pub fn save_config(&self, cfg: &EngineConfig) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;
        let path = self.dir.join(ENGINE_CONFIG_FILE);

        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved engine config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<EngineConfig> {
        let path = self.dir.join(ENGINE_CONFIG_FILE);

        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read config from '{}'", path.display()))?;

        serde_json::from_str(&json)
            .with_context(|| format!("Malformed config in '{}'", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::engine::{PipelineConfig, Task};
    use crate::domain::labels::LabelMap;
    use crate::ml::model::TransformerConfig;

    type TestBackend = burn::backend::NdArray;

    fn model_config() -> TransformerConfig {
        TransformerConfig::new(32, 8, 8, 2, 1, 16, 0.0, 3)
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path());
        let cfg = EngineConfig {
            task:     Task::Classification,
            model:    model_config(),
            pipeline: PipelineConfig::default(),
            labels:   Some(LabelMap::from_names(["a", "b", "c"])),
        };
        ckpt.save_config(&cfg).unwrap();

        let back = ckpt.load_config().unwrap();
        assert_eq!(back.task, Task::Classification);
        assert_eq!(back.model.d_model, 8);
        assert_eq!(back.pipeline, cfg.pipeline);
        assert_eq!(back.labels.unwrap().label(1).unwrap(), "b");
    }

    #[test]
    fn test_missing_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CheckpointManager::new(dir.path()).load_config().is_err());
    }

    #[test]
    fn test_weights_roundtrip_replace_fresh_init() {
        let dir = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path());
        let device = Default::default();

        let saved = model_config().init_qa::<TestBackend>(&device);
        ckpt.save_model::<TestBackend, _>(&saved, QA_MODEL_NAME).unwrap();

        let start_logits = |model: &crate::ml::model::TransformerQaModel<TestBackend>| {
            let ids = Tensor::<TestBackend, 1, Int>::from_ints([3, 7, 4, 9, 4].as_slice(), &device)
                .reshape([1, 5]);
            model.forward(ids, None).start_logits.into_data().to_vec::<f32>().unwrap()
        };

        // CompactRecorder stores half precision, so compare loads with
        // each other rather than with the in-memory original.
        let first  = ckpt.load_model::<TestBackend, _>(model_config().init_qa(&device), QA_MODEL_NAME, &device).unwrap();
        let second = ckpt.load_model::<TestBackend, _>(model_config().init_qa(&device), QA_MODEL_NAME, &device).unwrap();
        let fresh  = model_config().init_qa::<TestBackend>(&device);

        assert_eq!(start_logits(&first), start_logits(&second));
        assert_ne!(start_logits(&first), start_logits(&fresh));
    }

    #[test]
    fn test_missing_weights_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let device = Default::default();
        let model = model_config().init_qa::<TestBackend>(&device);
        let res = CheckpointManager::new(dir.path())
            .load_model::<TestBackend, _>(model, QA_MODEL_NAME, &device);
        assert!(res.is_err());
    }
}
