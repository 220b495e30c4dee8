// ============================================================
// Layer 2 — Classify Use Case
// ============================================================
// Caller-facing text classification. Same error contract as
// AskUseCase: a first-observed initialisation failure is an
// Err, everything else is logged and becomes Ok(None).

use std::sync::Arc;

use crate::application::engine::LazyEngine;
use crate::domain::error::QaResult;
use crate::domain::span::Classification;
use crate::domain::traits::TextClassifier;

pub struct ClassifyUseCase {
    engine: Arc<LazyEngine>,
}

impl ClassifyUseCase {
    pub fn new(engine: Arc<LazyEngine>) -> Self {
        Self { engine }
    }

    /// Label, class index and probability of the best class.
    pub fn classify_detailed(&self, text: &str) -> QaResult<Option<Classification>> {
        let Some(engine) = self.engine.acquire()? else {
            return Ok(None);
        };

        match engine.classify(text) {
            Ok(result) => Ok(Some(result)),
            Err(e) => {
                tracing::error!(stage = e.stage(), text, "Classification failed: {e}");
                Ok(None)
            }
        }
    }
}

impl TextClassifier for ClassifyUseCase {
    fn classify(&self, text: &str) -> QaResult<Option<String>> {
        Ok(self.classify_detailed(text)?.map(|c| c.label))
    }
}
