// ============================================================
// Layer 5 — ML Layer
// ============================================================
// The model itself and the numeric post-processing that turns
// its raw logits into answers. Only model.rs and runner.rs
// import burn; the rest operates on plain f32 slices.
//
//   runner.rs        burn forward pass → named logit buffers
//   normalizer.rs    masked, numerically stable softmax
//   span_decoder.rs  constrained top-k over (start, end) pairs
//   resolver.rs      span → text, class index → label

/// Transformer encoder with span and class heads
pub mod model;

/// InferenceRunner implementation over the burn models
pub mod runner;

/// Logits → probabilities
pub mod normalizer;

/// Probabilities → best (start, end) spans
pub mod span_decoder;

/// Spans / class indices → answer text / labels
pub mod resolver;
