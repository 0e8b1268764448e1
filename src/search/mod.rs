//! Retrieval over the knowledge graph.
//!
//! `structured` resolves entity mentions against the full-text index; the
//! unstructured fallbacks (`bm25`, `vector`) search by question text when the
//! structured pass comes back thin.

pub mod bm25;
pub mod normalize;
pub mod structured;
pub mod vector;

pub use bm25::{Bm25Corpus, Bm25Retriever};
pub use normalize::normalize_query;
pub use structured::{StructuredResult, StructuredRetriever};
pub use vector::VectorRetriever;

use async_trait::async_trait;

use crate::error::Result;
use crate::graph::ScoredNode;

/// Question-text retrieval shared by the lexical and vector fallbacks.
#[async_trait]
pub trait UnstructuredRetriever: Send + Sync {
    /// Best matches first. An empty result is not an error.
    async fn retrieve(&self, question: &str) -> Result<Vec<ScoredNode>>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}
