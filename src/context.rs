//! Session-scoped retrieval context.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use crate::graph::ScoredNode;
use crate::search::structured::{format_entity, render_block};
use crate::search::StructuredResult;

/// Entity descriptions and edges gathered across the hops of one session.
///
/// Entries are unique by string; an entity is also skipped when its node is
/// already present. Only [`RetrievalContext::discard`] ever removes anything.
#[derive(Debug, Default, Clone)]
pub struct RetrievalContext {
    entities: Vec<String>,
    node_ids: Vec<String>,
    edges: Vec<String>,
    seen_entities: HashSet<String>,
    seen_nodes: HashSet<String>,
    seen_edges: HashSet<String>,
}

impl RetrievalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one entity; false when it is already known.
    pub fn add_entity(&mut self, node_id: &str, text: &str) -> bool {
        if self.seen_entities.contains(text) || self.seen_nodes.contains(node_id) {
            return false;
        }
        self.seen_entities.insert(text.to_string());
        self.seen_nodes.insert(node_id.to_string());
        self.entities.push(text.to_string());
        self.node_ids.push(node_id.to_string());
        true
    }

    pub fn add_edge(&mut self, edge: &str) -> bool {
        if edge.trim().is_empty() || !self.seen_edges.insert(edge.to_string()) {
            return false;
        }
        self.edges.push(edge.to_string());
        true
    }

    /// Merge a structured pass; returns the number of new entities.
    pub fn absorb_structured(&mut self, result: &StructuredResult) -> usize {
        let added = result
            .node_ids
            .iter()
            .zip(&result.entities)
            .filter(|(node_id, text)| self.add_entity(node_id, text))
            .count();
        for edge in &result.edges {
            self.add_edge(edge);
        }
        added
    }

    /// Append fallback hits after the structured entries; returns the number
    /// of new entities.
    pub fn absorb_fallback(&mut self, hits: &[ScoredNode]) -> usize {
        hits.iter()
            .filter(|hit| {
                let text = format_entity(&hit.node_id, hit.score, &hit.description);
                self.add_entity(&hit.node_id, &text)
            })
            .count()
    }

    /// Drop everything gathered so far.
    pub fn discard(&mut self) {
        *self = Self::default();
    }

    pub fn entities(&self) -> &[String] {
        &self.entities
    }

    pub fn edges(&self) -> &[String] {
        &self.edges
    }

    pub fn node_ids(&self) -> &[String] {
        &self.node_ids
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.entities.len() + self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Content hash used to detect iterations that added nothing.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.entities.hash(&mut hasher);
        self.edges.hash(&mut hasher);
        hasher.finish()
    }

    pub fn render(&self) -> String {
        render_block(self.entities.as_slice(), self.edges.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn structured(entries: &[(&str, &str)], edges: &[&str]) -> StructuredResult {
        StructuredResult {
            context_text: String::new(),
            entities: entries.iter().map(|(_, t)| t.to_string()).collect(),
            node_ids: entries.iter().map(|(id, _)| id.to_string()).collect(),
            edges: edges.iter().map(|e| e.to_string()).collect(),
        }
    }

    #[test]
    fn test_absorb_dedups() {
        let mut ctx = RetrievalContext::new();
        let pass = structured(&[("a", "a (score:1.00) x"), ("b", "b (score:0.50) y")], &["a - R -> b"]);
        assert_eq!(ctx.absorb_structured(&pass), 2);
        assert_eq!(ctx.absorb_structured(&pass), 0);
        assert_eq!(ctx.len(), 3);

        // same node with another score is not a new entity
        let rescored = structured(&[("a", "a (score:2.00) x")], &["a - R -> b", "b - S -> c"]);
        assert_eq!(ctx.absorb_structured(&rescored), 0);
        assert_eq!(ctx.edges(), ["a - R -> b", "b - S -> c"]);
    }

    #[test]
    fn test_fallback_skips_known_nodes() {
        let mut ctx = RetrievalContext::new();
        ctx.absorb_structured(&structured(&[("a", "a (score:1.00) x")], &[]));
        let hits = vec![
            ScoredNode { node_id: "a".into(), description: "x".into(), score: 3.0 },
            ScoredNode { node_id: "c".into(), description: "z".into(), score: 0.85 },
        ];
        assert_eq!(ctx.absorb_fallback(&hits), 1);
        assert_eq!(ctx.entities(), ["a (score:1.00) x", "c (score:0.85) z"]);
        assert_eq!(ctx.node_ids(), ["a", "c"]);
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let mut ctx = RetrievalContext::new();
        let empty = ctx.fingerprint();
        ctx.add_edge("a - R -> b");
        let one = ctx.fingerprint();
        assert_ne!(empty, one);
        ctx.add_edge("a - R -> b");
        assert_eq!(one, ctx.fingerprint());
    }

    #[test]
    fn test_discard_and_render() {
        let mut ctx = RetrievalContext::new();
        ctx.add_entity("a", "a (score:1.00) x");
        ctx.add_edge("a - R -> b");
        assert_eq!(ctx.render(), "\n\n**entities**:\na (score:1.00) x\n\n**relationships**:\na - R -> b");

        ctx.discard();
        assert!(ctx.is_empty());
        assert!(ctx.node_ids().is_empty());
        assert!(ctx.add_entity("a", "a (score:1.00) x"));
    }

    #[test]
    fn test_blank_edge_rejected() {
        let mut ctx = RetrievalContext::new();
        assert!(!ctx.add_edge("  "));
        assert!(ctx.is_empty());
    }
}
