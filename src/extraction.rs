//! Entity mentions and the model-backed extractor.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::config::ExtractionMode;
use crate::error::{KgragError, Result};
use crate::llm::output::{find_list_literal, parse_string_list};
use crate::llm::LanguageModel;
use crate::prompts;
use crate::search::normalize::split_importance;

/// An entity named in a question, with its retrieval weight.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityMention {
    pub text: String,
    /// Always positive and finite
    pub importance: f32,
}

impl EntityMention {
    pub fn new(text: impl Into<String>, importance: f32) -> Option<Self> {
        let text = text.into().trim().to_string();
        if text.is_empty() || !importance.is_finite() || importance <= 0.0 {
            return None;
        }
        Some(Self { text, importance })
    }

    /// Parse `"text^N"`. A suffix that is not a positive number stays part of
    /// the text with importance 1.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        match split_importance(raw) {
            (text, Some(importance)) => Self::new(text, importance),
            (text, None) => Self::new(text, 1.0),
        }
    }

    /// Parse a list of raw strings, dropping invalid and repeated mentions.
    pub fn parse_all<S: AsRef<str>>(raw: &[S]) -> Vec<Self> {
        let mut seen = HashSet::new();
        raw.iter()
            .filter_map(|s| Self::parse(s.as_ref()))
            .filter(|m| seen.insert(m.render()))
            .collect()
    }

    /// The query form: the marker is emitted only when importance is not 1.
    pub fn render(&self) -> String {
        if self.importance == 1.0 {
            self.text.clone()
        } else {
            // f32 Display prints integral values without a decimal point
            format!("{}^{}", self.text, self.importance)
        }
    }
}

impl fmt::Display for EntityMention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Turns a question into weighted entity mentions with one model call.
pub struct EntityExtractor {
    model: Arc<dyn LanguageModel>,
    mode: ExtractionMode,
}

impl EntityExtractor {
    pub fn new(model: Arc<dyn LanguageModel>, mode: ExtractionMode) -> Self {
        Self { model, mode }
    }

    fn template(&self) -> &'static str {
        match self.mode {
            ExtractionMode::Plain => prompts::EXTRACTION_PLAIN,
            ExtractionMode::Weighted => prompts::EXTRACTION_WEIGHTED,
        }
    }

    /// Extract mentions. Undecodable model output is a `Parse` error and a
    /// list with no usable mention is `EmptyResult`; there is no retry here.
    pub async fn extract(&self, question: &str) -> Result<Vec<EntityMention>> {
        let prompt = prompts::fill(self.template(), &[("question", question)]);
        let raw = self.model.complete(&prompt, None).await?;
        let items = parse_string_list(find_list_literal(&raw)?)?;
        let mentions = EntityMention::parse_all(&items);
        if mentions.is_empty() {
            return Err(KgragError::EmptyResult(format!("no entity mentions in {:?}", question)));
        }
        log::debug!(
            "Extracted {} mention(s): {:?}",
            mentions.len(),
            mentions.iter().map(EntityMention::render).collect::<Vec<_>>()
        );
        Ok(mentions)
    }
}
