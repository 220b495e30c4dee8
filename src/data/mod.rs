// ============================================================
// Layer 4 — Input Pipeline
// ============================================================
// Turns caller text into the token sequence the model sees:
//
//   raw question / context
//       │
//       ▼
//   Preprocessor    → normalises whitespace and invisible chars
//       │
//       ▼
//   Tokenizer       → ids (external collaborator, Layer 3 trait)
//       │
//       ▼
//   InputAssembler  → [CLS] q [SEP] c [SEP], truncation, padding

/// Cleans question and context text before tokenisation
pub mod preprocessor;

/// Special-token placement, truncation and padding
pub mod assembler;
