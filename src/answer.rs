//! Thin adapter that turns a finished session into a model answer.

use std::sync::Arc;

use crate::config::AnswerConfig;
use crate::error::Result;
use crate::llm::LanguageModel;
use crate::orchestrator::SessionOutcome;
use crate::prompts;

pub struct AnswerGenerator {
    model: Arc<dyn LanguageModel>,
    role: String,
    topic: String,
}

impl AnswerGenerator {
    pub fn new(model: Arc<dyn LanguageModel>, config: &AnswerConfig) -> Self {
        Self {
            model,
            role: config.role.clone(),
            topic: config.topic.clone(),
        }
    }

    /// Answer `question` from `context` with the configured persona and topic.
    pub async fn answer(&self, question: &str, context: &str) -> Result<String> {
        let prompt = prompts::fill(
            prompts::ANSWER,
            &[
                ("role", self.role.as_str()),
                ("topic", self.topic.as_str()),
                ("context", context),
                ("question", question),
            ],
        );
        Ok(self.model.complete(&prompt, None).await?.trim().to_string())
    }

    /// Evaluation variant: no topic, and the output language is named.
    pub async fn answer_in(&self, question: &str, context: &str, language: &str) -> Result<String> {
        let prompt = prompts::fill(
            prompts::ANSWER_EVAL,
            &[
                ("role", self.role.as_str()),
                ("context", context),
                ("question", question),
                ("language", language),
            ],
        );
        Ok(self.model.complete(&prompt, None).await?.trim().to_string())
    }

    pub async fn answer_session(&self, outcome: &SessionOutcome) -> Result<String> {
        if outcome.context_text.is_empty() {
            log::warn!("Session {} gathered no context; answering without it", outcome.session_id);
        }
        self.answer(&outcome.question, &outcome.context_text).await
    }
}
