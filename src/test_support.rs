//! Scripted doubles for the model, embedder and graph store.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::embeddings::Embedder;
use crate::error::{KgragError, Result};
use crate::graph::{FulltextHit, GraphStore, Language, NodeLabel, ScoredNode};
use crate::llm::LanguageModel;

#[derive(Debug, Clone)]
pub struct ModelCall {
    pub prompt: String,
    pub system: Option<String>,
}

/// Replays queued responses in order and records every call.
#[derive(Default)]
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<String>>>,
    calls: Mutex<Vec<ModelCall>>,
}

impl ScriptedModel {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_results(responses.into_iter().map(|s| Ok(s.into())))
    }

    pub fn from_results<I: IntoIterator<Item = Result<String>>>(responses: I) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, response: impl Into<String>) {
        self.responses.lock().unwrap().push_back(Ok(response.into()));
    }

    pub fn calls(&self) -> Vec<ModelCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<String> {
        self.calls.lock().unwrap().push(ModelCall {
            prompt: prompt.to_string(),
            system: system.map(str::to_string),
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(KgragError::Llm("script exhausted".to_string())))
    }
}

/// Returns the same vector for every text.
pub struct FixedEmbedder {
    vector: Vec<f32>,
    calls: AtomicUsize,
}

impl FixedEmbedder {
    pub fn new(vector: Vec<f32>) -> Self {
        Self {
            vector,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for FixedEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vector.clone())
    }

    fn dimensions(&self) -> usize {
        self.vector.len()
    }
}

/// In-memory graph store with canned answers.
///
/// Full-text hits are keyed by the exact normalized query. Search failures
/// can be scripted as a count of leading failures.
#[derive(Default)]
pub struct MockGraphStore {
    hits: HashMap<String, Vec<FulltextHit>>,
    descriptions: Vec<(String, String)>,
    similar: Vec<ScoredNode>,
    embeddings: Vec<(String, Vec<f32>)>,
    search_failures: AtomicUsize,
    always_fail: bool,
    queries: Mutex<Vec<String>>,
    thresholds: Mutex<Vec<f32>>,
    index_calls: AtomicUsize,
    description_loads: AtomicUsize,
}

impl MockGraphStore {
    pub fn with_hits(mut self, query: &str, hits: Vec<FulltextHit>) -> Self {
        self.hits.insert(query.to_string(), hits);
        self
    }

    pub fn with_descriptions(mut self, docs: Vec<(String, String)>) -> Self {
        self.descriptions = docs;
        self
    }

    pub fn with_similar(mut self, nodes: Vec<ScoredNode>) -> Self {
        self.similar = nodes;
        self
    }

    pub fn with_embeddings(mut self, embeddings: Vec<(String, Vec<f32>)>) -> Self {
        self.embeddings = embeddings;
        self
    }

    /// Every full-text search fails with an I/O-class error.
    pub fn failing_search(mut self) -> Self {
        self.always_fail = true;
        self
    }

    /// The next `n` full-text searches fail, later ones succeed.
    pub fn failing_first(self, n: usize) -> Self {
        self.search_failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    pub fn thresholds(&self) -> Vec<f32> {
        self.thresholds.lock().unwrap().clone()
    }

    pub fn index_calls(&self) -> usize {
        self.index_calls.load(Ordering::SeqCst)
    }

    pub fn description_loads(&self) -> usize {
        self.description_loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GraphStore for MockGraphStore {
    async fn ensure_entity_index(&self, _labels: &[NodeLabel]) -> Result<()> {
        self.index_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn fulltext_search(&self, query: &str, _k: usize, _language: Language) -> Result<Vec<FulltextHit>> {
        self.queries.lock().unwrap().push(query.to_string());
        let scripted_failure = self
            .search_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if self.always_fail || scripted_failure {
            return Err(KgragError::Io(std::io::Error::other("graph store unavailable")));
        }
        // returned as scripted, duplicates included
        Ok(self.hits.get(query).cloned().unwrap_or_default())
    }

    async fn neighbor_edges(&self, node_id: &str) -> Result<Vec<String>> {
        Ok(self
            .hits
            .values()
            .flatten()
            .filter(|hit| hit.node_id == node_id)
            .flat_map(|hit| hit.edges.clone())
            .collect())
    }

    async fn node_descriptions(&self, _language: Language) -> Result<Vec<(String, String)>> {
        self.description_loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.descriptions.clone())
    }

    async fn similar_nodes(
        &self,
        _embedding: &[f32],
        _language: Language,
        _label: &NodeLabel,
        threshold: f32,
        k: usize,
    ) -> Result<Vec<ScoredNode>> {
        self.thresholds.lock().unwrap().push(threshold);
        let mut nodes: Vec<ScoredNode> = self.similar.iter().filter(|n| n.score > threshold).cloned().collect();
        nodes.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        nodes.truncate(k);
        Ok(nodes)
    }

    async fn entity_embeddings(&self, _language: Language) -> Result<Vec<(String, Vec<f32>)>> {
        Ok(self.embeddings.clone())
    }
}
