// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the filesystem:
//
//   checkpoint.rs      : burn weights (CompactRecorder) and
//                        engine_config.json
//   tokenizer_store.rs : tokenizer.json loading, corpus-built
//                        word-level tokenizers, and the
//                        HfTokenizer adapter
//
// Errors here are anyhow errors with file context; the engine
// maps them to QaError::Initialization at the boundary.

/// Model weight and engine config persistence
pub mod checkpoint;

/// Tokenizer loading/building and the QaTokenizer adapter
pub mod tokenizer_store;
