//! Knowledge graph model and the query contract the retrieval engine needs.
//!
//! The engine only reads the graph, apart from one idempotent administrative
//! step (`ensure_entity_index`) that tags retrievable nodes with the generic
//! entity marker and keeps the full-text index over them.

mod sqlite;

pub use sqlite::SqliteGraphStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// Label of the generic marker added to every retrievable node.
pub const ENTITY_MARKER: &str = "__Entity__";

/// Which description/embedding variant a session reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Language {
    #[default]
    En,
    Other,
}

impl Language {
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("en") {
            Language::En
        } else {
            Language::Other
        }
    }

    /// Column holding the node description in this language.
    pub fn description_column(self) -> &'static str {
        match self {
            Language::En => "description_en",
            Language::Other => "description",
        }
    }

    /// Column holding the node embedding in this language.
    pub fn embedding_column(self) -> &'static str {
        match self {
            Language::En => "embedding_en",
            Language::Other => "embedding",
        }
    }
}

impl From<String> for Language {
    fn from(value: String) -> Self {
        Language::parse(&value)
    }
}

impl From<Language> for String {
    fn from(value: Language) -> Self {
        match value {
            Language::En => "en".to_string(),
            Language::Other => "other".to_string(),
        }
    }
}

/// Node label. Unknown labels are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeLabel {
    KnowledgePoint,
    Example,
    Image,
    Url,
    Attribute,
    Method,
    Entity,
    Other(String),
}

impl NodeLabel {
    /// Labels whose nodes are searchable by default.
    pub fn retrievable() -> &'static [NodeLabel] {
        &[
            NodeLabel::KnowledgePoint,
            NodeLabel::Example,
            NodeLabel::Image,
            NodeLabel::Url,
            NodeLabel::Attribute,
            NodeLabel::Method,
        ]
    }

    pub fn as_str(&self) -> &str {
        match self {
            NodeLabel::KnowledgePoint => "KnowledgePoint",
            NodeLabel::Example => "Example",
            NodeLabel::Image => "Image",
            NodeLabel::Url => "URL",
            NodeLabel::Attribute => "Attribute",
            NodeLabel::Method => "Method",
            NodeLabel::Entity => ENTITY_MARKER,
            NodeLabel::Other(s) => s,
        }
    }
}

impl From<&str> for NodeLabel {
    fn from(value: &str) -> Self {
        match value {
            "KnowledgePoint" => NodeLabel::KnowledgePoint,
            "Example" => NodeLabel::Example,
            "Image" => NodeLabel::Image,
            "URL" => NodeLabel::Url,
            "Attribute" => NodeLabel::Attribute,
            "Method" => NodeLabel::Method,
            ENTITY_MARKER => NodeLabel::Entity,
            other => NodeLabel::Other(other.to_string()),
        }
    }
}

impl From<String> for NodeLabel {
    fn from(value: String) -> Self {
        NodeLabel::from(value.as_str())
    }
}

impl From<NodeLabel> for String {
    fn from(value: NodeLabel) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node as stored in the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    /// Globally unique, human-readable id
    pub id: String,
    pub labels: Vec<NodeLabel>,
    pub description: Option<String>,
    pub description_en: Option<String>,
    pub embedding: Option<Vec<f32>>,
    pub embedding_en: Option<Vec<f32>>,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, label: NodeLabel) -> Self {
        Self {
            id: id.into(),
            labels: vec![label],
            description: None,
            description_en: None,
            embedding: None,
            embedding_en: None,
        }
    }
}

/// A directed, typed relationship between two node ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
    pub source_id: String,
    pub relation_type: String,
    pub target_id: String,
}

impl Edge {
    pub fn new(
        source_id: impl Into<String>,
        relation_type: impl Into<String>,
        target_id: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            relation_type: relation_type.into(),
            target_id: target_id.into(),
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} -> {}", self.source_id, self.relation_type, self.target_id)
    }
}

/// One full-text index match with its neighbourhood.
#[derive(Debug, Clone, PartialEq)]
pub struct FulltextHit {
    pub node_id: String,
    pub score: f32,
    /// Language-selected description, empty when absent
    pub description: String,
    /// Rendered adjacent edges, both directions
    pub edges: Vec<String>,
}

/// A node matched by one of the unstructured retrievers.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredNode {
    pub node_id: String,
    pub description: String,
    pub score: f32,
}

/// Query contract the retrieval engine requires from a graph store.
///
/// Every call is long-latency I/O; failures surface as I/O-class errors and
/// are never retried by the store itself.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Tag nodes carrying any of `labels` with [`ENTITY_MARKER`] and make sure
    /// the full-text index over them exists. Safe to repeat and to run
    /// concurrently.
    async fn ensure_entity_index(&self, labels: &[NodeLabel]) -> Result<()>;

    /// Full-text search over marked nodes. `query` is already normalized and
    /// may carry `^N` boosts. Returns at most `k` hits in store order.
    async fn fulltext_search(&self, query: &str, k: usize, language: Language) -> Result<Vec<FulltextHit>>;

    /// Edges adjacent to `node_id`, rendered, both directions.
    async fn neighbor_edges(&self, node_id: &str) -> Result<Vec<String>>;

    /// `(node_id, description)` for every node with a non-empty description,
    /// in stable store order.
    async fn node_descriptions(&self, language: Language) -> Result<Vec<(String, String)>>;

    /// Nodes labelled `label` whose embedding has cosine similarity strictly
    /// above `threshold`, best first, at most `k`.
    async fn similar_nodes(
        &self,
        embedding: &[f32],
        language: Language,
        label: &NodeLabel,
        threshold: f32,
        k: usize,
    ) -> Result<Vec<ScoredNode>>;

    /// `(node_id, embedding)` for every marked node that has an embedding.
    async fn entity_embeddings(&self, language: Language) -> Result<Vec<(String, Vec<f32>)>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_rendering() {
        let edge = Edge::new("flex-direction", "PART_OF", "CSS 属性");
        assert_eq!(edge.to_string(), "flex-direction - PART_OF -> CSS 属性");
    }

    #[test]
    fn test_language_parse() {
        assert_eq!(Language::parse("en"), Language::En);
        assert_eq!(Language::parse(" EN "), Language::En);
        assert_eq!(Language::parse("zh"), Language::Other);
        assert_eq!(Language::En.description_column(), "description_en");
        assert_eq!(Language::Other.embedding_column(), "embedding");
    }

    #[test]
    fn test_node_label_round_trip_names() {
        assert_eq!(NodeLabel::from("URL"), NodeLabel::Url);
        assert_eq!(NodeLabel::Url.as_str(), "URL");
        assert_eq!(NodeLabel::from("__Entity__"), NodeLabel::Entity);
        assert_eq!(NodeLabel::from("Glossary"), NodeLabel::Other("Glossary".into()));
        assert_eq!(NodeLabel::retrievable().len(), 6);
    }
}
