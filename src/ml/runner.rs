// ============================================================
// Layer 5 — Burn Inference Runner
// ============================================================
// Implements the Layer 3 InferenceRunner trait on top of the
// burn models in model.rs. Everything burn-specific stops here:
// the pipeline only sees named flat f32 buffers.
//
//   input_ids [1, n] ──► encoder ──► span head  → start_logits [1, n]
//                                                 end_logits   [1, n]
//                                ──► class head → logits       [1, num_labels]
//
// Padding positions are derived from input_ids == [PAD] and
// passed to self-attention as a key padding mask.

use std::sync::Mutex;

use burn::prelude::*;

use crate::domain::error::{QaError, QaResult};
use crate::domain::tensors::{ModelInput, ModelOutputs, OutputTensor, END_LOGITS, LOGITS, START_LOGITS};
use crate::domain::traits::InferenceRunner;
use crate::ml::model::{TransformerClassifierModel, TransformerQaModel};

enum Head<B: Backend> {
    Span(TransformerQaModel<B>),
    Class(TransformerClassifierModel<B>),
}

impl<B: Backend> Head<B> {
    fn max_seq_len(&self) -> usize {
        match self {
            Head::Span(m)  => m.max_seq_len(),
            Head::Class(m) => m.max_seq_len(),
        }
    }
}

struct RunnerState<B: Backend> {
    head:   Head<B>,
    device: B::Device,
}

/// Forward passes are serialised through a mutex; concurrent
/// callers queue here and nowhere else in the pipeline.
pub struct BurnRunner<B: Backend> {
    state:  Mutex<RunnerState<B>>,
    pad_id: u32,
}

impl<B: Backend> BurnRunner<B> {
    pub fn question_answering(model: TransformerQaModel<B>, device: B::Device, pad_id: u32) -> Self {
        Self::with_head(Head::Span(model), device, pad_id)
    }

    pub fn classifier(model: TransformerClassifierModel<B>, device: B::Device, pad_id: u32) -> Self {
        Self::with_head(Head::Class(model), device, pad_id)
    }

    fn with_head(head: Head<B>, device: B::Device, pad_id: u32) -> Self {
        Self { state: Mutex::new(RunnerState { head, device }), pad_id }
    }
}

impl<B: Backend> InferenceRunner for BurnRunner<B> {
    fn run(&self, input: &ModelInput) -> QaResult<ModelOutputs> {
        let n = input.seq_len();
        if input.shape[0] != 1 || input.ids.len() != n || n == 0 {
            return Err(QaError::Configuration(format!(
                "{} must have shape [1, n] with n > 0, got {:?} with {} ids",
                input.name(),
                input.shape,
                input.ids.len()
            )));
        }

        let state = self
            .state
            .lock()
            .map_err(|_| QaError::Inference("runner lock poisoned by an earlier panic".into()))?;

        let max = state.head.max_seq_len();
        if n > max {
            return Err(QaError::Configuration(format!(
                "sequence of {n} tokens exceeds the model's max_seq_len {max}"
            )));
        }

        let ints: Vec<i32> = input.ids.iter().map(|&x| x as i32).collect();
        let input_ids = Tensor::<B, 1, Int>::from_ints(ints.as_slice(), &state.device)
            .reshape([1, n]);
        let pad_mask = input_ids.clone().equal_elem(self.pad_id as i32);

        let outputs = match &state.head {
            Head::Span(model) => {
                let out = model.forward(input_ids, Some(pad_mask));
                ModelOutputs::new()
                    .with(START_LOGITS, OutputTensor::new(to_vec(out.start_logits)?, vec![1, n]))
                    .with(END_LOGITS,   OutputTensor::new(to_vec(out.end_logits)?,   vec![1, n]))
            }
            Head::Class(model) => {
                let logits = model.forward(input_ids, Some(pad_mask));
                let [_, num_labels] = logits.dims();
                ModelOutputs::new()
                    .with(LOGITS, OutputTensor::new(to_vec(logits)?, vec![1, num_labels]))
            }
        };

        tracing::debug!("Forward pass over {} tokens complete", n);
        Ok(outputs)
    }
}

fn to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> QaResult<Vec<f32>> {
    tensor
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| QaError::Inference(format!("cannot read output tensor: {e:?}")))
}
