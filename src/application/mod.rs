// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer wires the other layers into the two caller-facing
// operations (answer a question, classify a text) plus the
// `init` scaffolding workflow.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No UI or printing here (that's Layer 1)
//   - No direct file access except through Layer 6
//   - Only workflow coordination
//
// Think of this layer as the "director": it tells other
// layers what to do but doesn't do the work itself.

// The pipeline handle and its lazy, once-only initialisation
pub mod engine;

// Question answering over a fixed context
pub mod ask_use_case;

// Text classification
pub mod classify_use_case;

// Checkpoint scaffolding for `init`
pub mod init_use_case;
