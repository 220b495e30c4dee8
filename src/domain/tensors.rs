// ============================================================
// Layer 3 — Model Input / Output Tensors
// ============================================================
// The inference runner is a black box that takes one named
// integer tensor and hands back named float buffers. These
// types are that contract, with no framework types in sight.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::error::{QaError, QaResult};
use crate::domain::tokens::TokenSequence;

pub const INPUT_IDS:    &str = "input_ids";
pub const START_LOGITS: &str = "start_logits";
pub const END_LOGITS:   &str = "end_logits";
pub const LOGITS:       &str = "logits";

/// The `input_ids` tensor, shape [1, seq_len].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInput {
    pub ids:   Vec<u32>,
    pub shape: [usize; 2],
}

impl ModelInput {
    pub fn name(&self) -> &'static str {
        INPUT_IDS
    }

    pub fn seq_len(&self) -> usize {
        self.shape[1]
    }
}

impl From<&TokenSequence> for ModelInput {
    fn from(seq: &TokenSequence) -> Self {
        Self {
            ids:   seq.ids().to_vec(),
            shape: [1, seq.len()],
        }
    }
}

/// A flat float32 buffer plus its shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputTensor {
    pub data:  Vec<f32>,
    pub shape: Vec<usize>,
}

impl OutputTensor {
    pub fn new(data: Vec<f32>, shape: Vec<usize>) -> Self {
        Self { data, shape }
    }

    /// The single row of a [1, n] tensor, checked against the
    /// expected width.
    pub fn row(&self, expected: usize) -> QaResult<&[f32]> {
        let ok_shape = matches!(self.shape.as_slice(), [1, n] if *n == expected);
        if !ok_shape || self.data.len() != expected {
            return Err(QaError::Configuration(format!(
                "expected output shape [1, {expected}], got {:?} with {} values",
                self.shape,
                self.data.len()
            )));
        }
        Ok(&self.data)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelOutputs {
    tensors: HashMap<String, OutputTensor>,
}

impl ModelOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, tensor: OutputTensor) -> Self {
        self.tensors.insert(name.into(), tensor);
        self
    }

    pub fn get(&self, name: &str) -> QaResult<&OutputTensor> {
        self.tensors.get(name).ok_or_else(|| {
            QaError::Configuration(format!("model produced no '{name}' output"))
        })
    }
}
