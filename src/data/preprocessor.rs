// ============================================================
// Layer 4 — Input Text Preprocessor
// ============================================================
// Normalises a question or context before it reaches the
// tokenizer. Text pasted from documents or mobile keyboards
// carries non-breaking spaces, zero-width characters, stray
// control bytes and runs of whitespace. The tokenizer would
// either drop them or map them to [UNK], which wastes positions
// in a fixed-length input.
//
// Output is always a single line with single spaces.

pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Clean `text` into single-spaced, trimmed form.
    pub fn clean(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut pending_space = false;

        for c in text.chars().filter(|c| !is_invisible(*c)) {
            if c.is_whitespace() || c.is_control() {
                pending_space = !out.is_empty();
                continue;
            }
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.push(c);
        }

        out
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Characters that should vanish without leaving a word break.
fn is_invisible(c: char) -> bool {
    matches!(c, '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' | '\u{00AD}')
}
