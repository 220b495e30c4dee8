// ============================================================
// Layer 5 — Transformer Encoder with Span and Class Heads
// ============================================================
// One encoder body, two heads:
//
//   TransformerQaModel          encoder → Linear(d_model, 2)
//                               → start_logits, end_logits [batch, seq]
//   TransformerClassifierModel  encoder → [CLS] vector → Linear(d_model, num_labels)
//                               → logits [batch, num_labels]
//
// Encoder block (post-norm, as in the original transformer):
//   x = LayerNorm(x + Dropout(SelfAttention(x, pad_mask)))
//   x = LayerNorm(x + Dropout(FFN(x)))      FFN = Linear → GELU → Linear
//
// Reference: Vaswani et al. (2017) Attention Is All You Need
//            Devlin et al. (2019) BERT

use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally, so do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct TransformerConfig {
    pub vocab_size:  usize,
    pub max_seq_len: usize,
    pub d_model:     usize,
    pub num_heads:   usize,
    pub num_layers:  usize,
    pub d_ff:        usize,
    pub dropout:     f64,
    /// Only read by the classifier head.
    pub num_labels:  usize,
}

impl TransformerConfig {
    pub fn init_encoder<B: Backend>(&self, device: &B::Device) -> TransformerEncoder<B> {
        let token_embedding    = EmbeddingConfig::new(self.vocab_size, self.d_model).init(device);
        let position_embedding = EmbeddingConfig::new(self.max_seq_len, self.d_model).init(device);
        let layers: Vec<EncoderBlock<B>> = (0..self.num_layers)
            .map(|_| self.build_encoder_block(device))
            .collect();
        let final_norm = LayerNormConfig::new(self.d_model).init(device);
        let dropout    = DropoutConfig::new(self.dropout).init();
        TransformerEncoder {
            token_embedding, position_embedding, layers, final_norm, dropout,
            max_seq_len: self.max_seq_len,
        }
    }

    pub fn init_qa<B: Backend>(&self, device: &B::Device) -> TransformerQaModel<B> {
        TransformerQaModel {
            encoder: self.init_encoder(device),
            qa_head: LinearConfig::new(self.d_model, 2).init(device),
        }
    }

    pub fn init_classifier<B: Backend>(&self, device: &B::Device) -> TransformerClassifierModel<B> {
        TransformerClassifierModel {
            encoder:         self.init_encoder(device),
            classifier_head: LinearConfig::new(self.d_model, self.num_labels).init(device),
        }
    }

    fn build_encoder_block<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        let self_attn   = MultiHeadAttentionConfig::new(self.d_model, self.num_heads)
            .with_dropout(self.dropout)
            .init(device);
        let ffn_linear1 = LinearConfig::new(self.d_model, self.d_ff).init(device);
        let ffn_linear2 = LinearConfig::new(self.d_ff, self.d_model).init(device);
        let norm1   = LayerNormConfig::new(self.d_model).init(device);
        let norm2   = LayerNormConfig::new(self.d_model).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        EncoderBlock { self_attn, ffn_linear1, ffn_linear2, norm1, norm2, dropout }
    }
}

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    /// `pad_mask`: [batch, seq], true where the position is padding.
    pub fn forward(&self, x: Tensor<B, 3>, pad_mask: Option<Tensor<B, 2, Bool>>) -> Tensor<B, 3> {
        let mut input = MhaInput::self_attn(x.clone());
        if let Some(mask) = pad_mask {
            input = input.mask_pad(mask);
        }
        let attn_output = self.self_attn.forward(input).context;
        let x = self.norm1.forward(x + self.dropout.forward(attn_output));
        let ffn_out = self.ffn_linear2.forward(
            burn::tensor::activation::gelu(self.ffn_linear1.forward(x.clone()))
        );
        self.norm2.forward(x + self.dropout.forward(ffn_out))
    }
}

#[derive(Module, Debug)]
pub struct TransformerEncoder<B: Backend> {
    pub token_embedding:    Embedding<B>,
    pub position_embedding: Embedding<B>,
    pub layers:             Vec<EncoderBlock<B>>,
    pub final_norm:         LayerNorm<B>,
    pub dropout:            Dropout,
    pub max_seq_len:        usize,
}

impl<B: Backend> TransformerEncoder<B> {
    /// input_ids: [batch, seq_len] → hidden states [batch, seq_len, d_model]
    pub fn forward(
        &self,
        input_ids: Tensor<B, 2, Int>,
        pad_mask:  Option<Tensor<B, 2, Bool>>,
    ) -> Tensor<B, 3> {
        let [batch_size, seq_len] = input_ids.dims();

        let tok_emb = self.token_embedding.forward(input_ids);

        // Self-attention is permutation-invariant, so position must be injected explicitly.
        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &tok_emb.device())
            .reshape([1, seq_len])
            .expand([batch_size, seq_len]);
        let pos_emb = self.position_embedding.forward(positions);

        let mut x = self.dropout.forward(tok_emb + pos_emb);
        for layer in &self.layers {
            x = layer.forward(x, pad_mask.clone());
        }
        self.final_norm.forward(x)
    }
}

#[derive(Module, Debug)]
pub struct TransformerQaModel<B: Backend> {
    pub encoder: TransformerEncoder<B>,
    pub qa_head: Linear<B>,
}

pub struct QaModelOutput<B: Backend> {
    pub start_logits: Tensor<B, 2>,
    pub end_logits:   Tensor<B, 2>,
}

impl<B: Backend> TransformerQaModel<B> {
    /// input_ids: [batch, seq_len] → start_logits, end_logits: [batch, seq_len]
    pub fn forward(
        &self,
        input_ids: Tensor<B, 2, Int>,
        pad_mask:  Option<Tensor<B, 2, Bool>>,
    ) -> QaModelOutput<B> {
        let [batch_size, seq_len] = input_ids.dims();
        let x = self.encoder.forward(input_ids, pad_mask);

        // Project to 2 logits per token then split into start / end.
        let logits = self.qa_head.forward(x); // [batch, seq_len, 2]
        let start_logits = logits.clone()
            .slice([0..batch_size, 0..seq_len, 0..1])
            .reshape([batch_size, seq_len]);
        let end_logits = logits
            .slice([0..batch_size, 0..seq_len, 1..2])
            .reshape([batch_size, seq_len]);

        QaModelOutput { start_logits, end_logits }
    }

    pub fn max_seq_len(&self) -> usize {
        self.encoder.max_seq_len
    }
}

#[derive(Module, Debug)]
pub struct TransformerClassifierModel<B: Backend> {
    pub encoder:         TransformerEncoder<B>,
    pub classifier_head: Linear<B>,
}

impl<B: Backend> TransformerClassifierModel<B> {
    /// input_ids: [batch, seq_len] → logits: [batch, num_labels]
    pub fn forward(
        &self,
        input_ids: Tensor<B, 2, Int>,
        pad_mask:  Option<Tensor<B, 2, Bool>>,
    ) -> Tensor<B, 2> {
        let x = self.encoder.forward(input_ids, pad_mask);
        let [batch_size, _, d_model] = x.dims();

        // The [CLS] vector summarises the whole sequence.
        let cls = x.slice([0..batch_size, 0..1, 0..d_model]).reshape([batch_size, d_model]);
        self.classifier_head.forward(cls)
    }

    pub fn max_seq_len(&self) -> usize {
        self.encoder.max_seq_len
    }
}
