// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits describing what the pipeline
// works on. No burn, no tokenizers, no file I/O in here.

// Error taxonomy shared by every stage
pub mod error;

// Token sequences, layout and special tokens
pub mod tokens;

// Span candidates and resolved answers
pub mod span;

// Class index → label mapping
pub mod labels;

// Framework-free model input/output tensors
pub mod tensors;

// Tokenizer / runner / caller-facing abstractions
pub mod traits;
