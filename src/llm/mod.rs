//! Generative model contract and structured-output helpers.

pub mod openai;
pub mod output;

pub use openai::OpenAiChatModel;

use async_trait::async_trait;

use crate::error::Result;

/// A text completion model. Failures surface as errors, never as partial text.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<String>;
}
