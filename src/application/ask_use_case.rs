// ============================================================
// Layer 2 — Ask Use Case
// ============================================================
// Caller-facing question answering over one fixed context.
//
// This is the single place where pipeline errors turn into
// absent results: everything except a first-observed
// initialisation failure is logged with its stage and the
// question, then reported as Ok(None).

use std::sync::Arc;

use crate::application::engine::LazyEngine;
use crate::domain::error::QaResult;
use crate::domain::span::Answer;
use crate::domain::traits::QuestionAnswerer;

pub struct AskUseCase {
    engine:  Arc<LazyEngine>,
    context: String,
}

impl AskUseCase {
    pub fn new(engine: Arc<LazyEngine>, context: impl Into<String>) -> Self {
        Self { engine, context: context.into() }
    }

    /// All top-k answers, best first. Empty when there is nothing
    /// to return (including swallowed pipeline failures). Blank
    /// spans never take a slot; fewer than top-k answers means
    /// fewer non-blank spans beat the "no answer" score.
    pub fn answer_candidates(&self, question: &str) -> QaResult<Vec<Answer>> {
        let Some(engine) = self.engine.acquire()? else {
            return Ok(Vec::new());
        };

        match engine.answer(question, &self.context) {
            Ok(answers) => {
                if answers.is_empty() {
                    tracing::info!(question, "No answer found");
                }
                Ok(answers)
            }
            Err(e) => {
                tracing::error!(stage = e.stage(), question, "Question answering failed: {e}");
                Ok(Vec::new())
            }
        }
    }
}

impl QuestionAnswerer for AskUseCase {
    fn answer_question(&self, question: &str) -> QaResult<Option<String>> {
        Ok(self
            .answer_candidates(question)?
            .into_iter()
            .next()
            .map(|a| a.text))
    }
}
