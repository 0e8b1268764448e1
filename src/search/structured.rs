//! Entity-driven retrieval over the full-text index.
//!
//! Each mention is normalized, searched, and expanded to its one-hop
//! neighbourhood. Mentions are queried concurrently but their results are
//! assembled in the caller's order, so output is deterministic for a
//! deterministic store.

use futures_util::future::try_join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::OnceCell;

use super::normalize::normalize_query;
use crate::error::Result;
use crate::extraction::EntityMention;
use crate::graph::{FulltextHit, GraphStore, Language, NodeLabel};

/// Output of one structured pass. `entities[i]` describes node `node_ids[i]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuredResult {
    pub context_text: String,
    pub entities: Vec<String>,
    pub edges: Vec<String>,
    pub node_ids: Vec<String>,
}

impl StructuredResult {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.edges.is_empty()
    }
}

/// Matches for a single mention.
#[derive(Debug, Default)]
struct MentionBlock {
    /// `(node_id, formatted entity)`, best score first
    entities: Vec<(String, String)>,
    edges: Vec<String>,
}

pub fn format_entity(node_id: &str, score: f32, description: &str) -> String {
    format!("{} (score:{:.2}) {}", node_id, score, description)
        .trim_end()
        .to_string()
}

/// Render one context block: entities, then relationships; empty parts omitted.
pub fn render_block<S: AsRef<str>>(entities: &[S], edges: &[S]) -> String {
    let mut out = String::new();
    if !entities.is_empty() {
        out.push_str("\n\n**entities**:\n");
        out.push_str(&join(entities, "\n\n"));
    }
    if !edges.is_empty() {
        out.push_str("\n\n**relationships**:\n");
        out.push_str(&join(edges, "\n"));
    }
    out
}

fn join<S: AsRef<str>>(items: &[S], sep: &str) -> String {
    items.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(sep)
}

/// Sort hits by descending score, format, and drop repeated strings.
fn build_block(mut hits: Vec<FulltextHit>) -> MentionBlock {
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut seen = HashSet::new();
    let mut entities = Vec::new();
    let mut edges = Vec::new();
    for hit in hits {
        let formatted = format_entity(&hit.node_id, hit.score, &hit.description);
        if seen.insert(formatted.clone()) {
            entities.push((hit.node_id, formatted));
        }
        edges.extend(hit.edges.into_iter().filter(|e| !e.trim().is_empty()));
    }
    edges.sort();
    edges.dedup();

    MentionBlock { entities, edges }
}

/// Resolves entity mentions against the graph's full-text index.
pub struct StructuredRetriever {
    store: Arc<dyn GraphStore>,
    labels: Vec<NodeLabel>,
    k: usize,
    index_ready: OnceCell<()>,
}

impl StructuredRetriever {
    pub fn new(store: Arc<dyn GraphStore>, labels: Vec<NodeLabel>, k: usize) -> Self {
        Self {
            store,
            labels,
            k,
            index_ready: OnceCell::new(),
        }
    }

    /// Run the marker/index step once per retriever. A failed attempt is
    /// retried on the next call.
    pub async fn ensure_index(&self) -> Result<()> {
        self.index_ready
            .get_or_try_init(|| async {
                log::debug!("Ensuring entity marker and full-text index");
                self.store.ensure_entity_index(&self.labels).await
            })
            .await?;
        Ok(())
    }

    pub async fn retrieve(&self, mentions: &[EntityMention], language: Language) -> Result<StructuredResult> {
        self.ensure_index().await?;

        let blocks = try_join_all(mentions.iter().map(|m| self.retrieve_one(m, language))).await?;

        let mut result = StructuredResult::default();
        for block in blocks {
            let texts: Vec<&str> = block.entities.iter().map(|(_, text)| text.as_str()).collect();
            let edges: Vec<&str> = block.edges.iter().map(String::as_str).collect();
            result
                .context_text
                .push_str(&render_block(texts.as_slice(), edges.as_slice()));
            for (node_id, text) in block.entities {
                result.node_ids.push(node_id);
                result.entities.push(text);
            }
            result.edges.extend(block.edges);
        }
        Ok(result)
    }

    async fn retrieve_one(&self, mention: &EntityMention, language: Language) -> Result<MentionBlock> {
        let query = normalize_query(&mention.render());
        if query.is_empty() {
            log::debug!("Mention {:?} has no searchable content", mention.text);
            return Ok(MentionBlock::default());
        }

        let hits = self.store.fulltext_search(&query, self.k, language).await?;
        log::debug!("Full-text query {:?}: {} match(es)", query, hits.len());
        Ok(build_block(hits))
    }
}
