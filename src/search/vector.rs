use async_trait::async_trait;
use std::sync::Arc;

use super::UnstructuredRetriever;
use crate::embeddings::Embedder;
use crate::error::Result;
use crate::graph::{GraphStore, Language, NodeLabel, ScoredNode};

/// Cosine-similarity fallback over node embeddings.
///
/// When nothing clears the threshold, one more scan runs at
/// `threshold - step`. The relaxed value lives only for that call.
pub struct VectorRetriever {
    store: Arc<dyn GraphStore>,
    embedder: Arc<dyn Embedder>,
    language: Language,
    label: NodeLabel,
    threshold: f32,
    step: f32,
    k: usize,
}

impl VectorRetriever {
    pub fn new(
        store: Arc<dyn GraphStore>,
        embedder: Arc<dyn Embedder>,
        language: Language,
        label: NodeLabel,
        threshold: f32,
        step: f32,
        k: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            language,
            label,
            threshold,
            step,
            k,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }
}

#[async_trait]
impl UnstructuredRetriever for VectorRetriever {
    async fn retrieve(&self, question: &str) -> Result<Vec<ScoredNode>> {
        if question.trim().is_empty() {
            return Ok(Vec::new());
        }

        let embed_start = std::time::Instant::now();
        let query_vec = self.embedder.embed(question).await?;
        log::debug!("Vector fallback: query embedding took {:?}", embed_start.elapsed());

        let hits = self
            .store
            .similar_nodes(&query_vec, self.language, &self.label, self.threshold, self.k)
            .await?;
        if !hits.is_empty() {
            return Ok(hits);
        }

        let relaxed = (self.threshold - self.step).max(-1.0);
        log::debug!(
            "Vector fallback: no node above {:.2}, retrying at {:.2}",
            self.threshold,
            relaxed
        );
        self.store
            .similar_nodes(&query_vec, self.language, &self.label, relaxed, self.k)
            .await
    }

    fn name(&self) -> &'static str {
        "vector"
    }
}

/// Cosine similarity of two vectors; 0.0 for mismatched lengths or a zero vector.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}
