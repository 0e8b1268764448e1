//! Embedding model contract.

pub mod openai;

pub use openai::OpenAIEmbedder;

use async_trait::async_trait;

use crate::error::Result;

/// Turns text into a fixed-dimension vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Length of every vector this embedder returns.
    fn dimensions(&self) -> usize;
}
