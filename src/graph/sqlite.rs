//! SQLite-backed graph store.
//!
//! Nodes, labels and edges live in plain tables; the entity full-text index is
//! an FTS5 table over marked nodes. Indexed text and query terms both go
//! through [`segment_cjk`], so Chinese text matches per character. `^N` boosts
//! are applied the way Lucene does: each term is scored separately and its
//! score multiplied by the boost.

use async_trait::async_trait;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::HashMap;

use super::{
    Edge, FulltextHit, GraphNode, GraphStore, Language, NodeLabel, ScoredNode, ENTITY_MARKER,
};
use crate::db::{migrate, Db};
use crate::error::{Result, KgragError};
use crate::search::normalize::{parse_boosted_terms, segment_cjk};
use crate::search::vector::cosine_similarity;

/// Adjacent edges returned per matched node
const MAX_EDGES_PER_NODE: usize = 50;

/// Per-term candidate rows considered before boosts are combined
const MIN_TERM_CANDIDATES: usize = 50;

/// `node_id` is the key; `name` is its segmented, searchable form
const ENTITY_FTS_SCHEMA: &str = "CREATE VIRTUAL TABLE IF NOT EXISTS entity_fts
     USING fts5(node_id UNINDEXED, name, description, description_en);";

/// Searchable `(name, description, description_en)` of one node
type FtsText = (String, String, String);

/// Graph store over a SQLite database file.
#[derive(Debug, Clone)]
pub struct SqliteGraphStore {
    db: Db,
}

impl SqliteGraphStore {
    /// Open the store and bring the schema up to date.
    pub async fn open(db: Db) -> Result<Self> {
        db.with_connection(|conn| migrate::run_migrations(conn).map(|_| ())).await?;
        Ok(Self { db })
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Insert or replace a node together with its labels.
    pub async fn insert_node(&self, node: GraphNode) -> Result<()> {
        self.db
            .with_connection(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO nodes (id, description, description_en, embedding, embedding_en)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(id) DO UPDATE SET
                        description = excluded.description,
                        description_en = excluded.description_en,
                        embedding = excluded.embedding,
                        embedding_en = excluded.embedding_en",
                    params![
                        node.id,
                        node.description,
                        node.description_en,
                        node.embedding.as_deref().map(encode_embedding),
                        node.embedding_en.as_deref().map(encode_embedding),
                    ],
                )?;
                for label in &node.labels {
                    tx.execute(
                        "INSERT OR IGNORE INTO node_labels (node_id, label) VALUES (?1, ?2)",
                        params![node.id, label.as_str()],
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
    }

    pub async fn insert_edge(&self, edge: Edge) -> Result<()> {
        self.db
            .with_connection(move |conn| {
                conn.execute(
                    "INSERT OR IGNORE INTO edges (source_id, relation_type, target_id) VALUES (?1, ?2, ?3)",
                    params![edge.source_id, edge.relation_type, edge.target_id],
                )?;
                Ok(())
            })
            .await
    }

    /// `(nodes, edges, marked entities)` counts, for diagnostics.
    pub async fn counts(&self) -> Result<(usize, usize, usize)> {
        self.db
            .with_connection(|conn| {
                let count = |sql: &str| -> Result<usize> {
                    let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
                    Ok(n as usize)
                };
                Ok((
                    count("SELECT COUNT(*) FROM nodes")?,
                    count("SELECT COUNT(*) FROM edges")?,
                    count("SELECT COUNT(*) FROM node_labels WHERE label = '__Entity__'")?,
                ))
            })
            .await
    }
}

/// Create the FTS5 table when absent and sync it with the marked nodes:
/// new nodes are indexed, nodes whose text changed are re-indexed, unmarked
/// nodes are dropped.
fn sync_entity_index(conn: &mut Connection, labels: &[String]) -> Result<()> {
    let tx = conn.transaction()?;

    let placeholders = labels.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    let mark_sql = format!(
        "INSERT OR IGNORE INTO node_labels (node_id, label)
         SELECT DISTINCT node_id, '{}' FROM node_labels WHERE label IN ({})",
        ENTITY_MARKER, placeholders
    );
    let marked = tx.execute(&mark_sql, params_from_iter(labels.iter()))?;

    // tables from before CJK segmentation have no separate key column
    let existing_schema: Option<String> = tx
        .query_row(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = 'entity_fts'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    if existing_schema.is_some_and(|sql| !sql.contains("UNINDEXED")) {
        log::info!("Rebuilding entity index with the current schema");
        tx.execute_batch("DROP TABLE entity_fts;")?;
    }
    tx.execute_batch(ENTITY_FTS_SCHEMA)?;

    let (mut indexed, mut refreshed) = (0, 0);
    {
        let mut stmt = tx.prepare("SELECT node_id, name, description, description_en FROM entity_fts")?;
        let mut current: HashMap<String, FtsText> = HashMap::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            current.insert(row.get(0)?, (row.get(1)?, row.get(2)?, row.get(3)?));
        }

        let mut stmt = tx.prepare(
            "SELECT n.id, COALESCE(n.description, ''), COALESCE(n.description_en, '')
             FROM nodes n
             JOIN node_labels l ON l.node_id = n.id AND l.label = ?1
             ORDER BY n.id",
        )?;
        let mut wanted: Vec<(String, FtsText)> = Vec::new();
        let mut rows = stmt.query(params![ENTITY_MARKER])?;
        while let Some(row) = rows.next()? {
            let id: String = row.get(0)?;
            let description: String = row.get(1)?;
            let description_en: String = row.get(2)?;
            let text = (segment_cjk(&id), segment_cjk(&description), segment_cjk(&description_en));
            wanted.push((id, text));
        }

        let mut delete = tx.prepare("DELETE FROM entity_fts WHERE node_id = ?1")?;
        let mut insert = tx.prepare(
            "INSERT INTO entity_fts (node_id, name, description, description_en) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for (id, text) in wanted {
            match current.get(&id) {
                Some(stored) if *stored == text => continue,
                Some(_) => {
                    delete.execute(params![id])?;
                    refreshed += 1;
                }
                None => indexed += 1,
            }
            insert.execute(params![id, text.0, text.1, text.2])?;
        }
    }

    let removed = tx.execute(
        "DELETE FROM entity_fts
         WHERE node_id NOT IN (SELECT node_id FROM node_labels WHERE label = ?1)",
        params![ENTITY_MARKER],
    )?;

    tx.commit()?;

    if marked + indexed + refreshed + removed > 0 {
        log::info!(
            "Entity index updated: {} marked, {} indexed, {} refreshed, {} removed",
            marked,
            indexed,
            refreshed,
            removed
        );
    }
    Ok(())
}

/// Quote a term as an FTS5 phrase, segmented like the indexed text.
fn fts5_phrase(term: &str) -> Option<String> {
    if !term.chars().any(char::is_alphanumeric) {
        return None;
    }
    Some(format!("\"{}\"", segment_cjk(term).replace('"', "\"\"")))
}

/// Combined boosted score per node id, best first, ties by id.
fn score_terms(conn: &Connection, query: &str, k: usize) -> Result<Vec<(String, f32)>> {
    let terms = parse_boosted_terms(query);
    let mut scores: HashMap<String, f32> = HashMap::new();
    let candidates = (k * 25).max(MIN_TERM_CANDIDATES) as i64;

    // name column weighted above the descriptions
    let mut stmt = conn.prepare(
        "SELECT node_id, -bm25(entity_fts, 0.0, 2.0, 1.0, 1.0) AS score
         FROM entity_fts WHERE entity_fts MATCH ?1
         ORDER BY bm25(entity_fts, 0.0, 2.0, 1.0, 1.0)
         LIMIT ?2",
    )?;

    for term in terms {
        let Some(phrase) = fts5_phrase(&term.term) else {
            continue;
        };
        let mut rows = stmt.query(params![phrase, candidates])?;
        while let Some(row) = rows.next()? {
            let node_id: String = row.get(0)?;
            let score: f64 = row.get(1)?;
            *scores.entry(node_id).or_insert(0.0) += term.boost * score as f32;
        }
    }

    let mut ranked: Vec<(String, f32)> = scores.into_iter().collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    ranked.truncate(k);
    Ok(ranked)
}

fn load_neighbor_edges(conn: &Connection, node_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT source_id, relation_type, target_id FROM edges WHERE source_id = ?1
         UNION
         SELECT source_id, relation_type, target_id FROM edges WHERE target_id = ?1
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![node_id, MAX_EDGES_PER_NODE as i64], |row| {
        Ok(Edge::new(
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;
    let mut edges = Vec::new();
    for row in rows {
        edges.push(row?.to_string());
    }
    Ok(edges)
}

#[async_trait]
impl GraphStore for SqliteGraphStore {
    async fn ensure_entity_index(&self, labels: &[NodeLabel]) -> Result<()> {
        if labels.is_empty() {
            return Err(KgragError::InvalidInput("no retrievable labels given".to_string()));
        }
        let labels: Vec<String> = labels.iter().map(|l| l.as_str().to_string()).collect();
        self.db.with_connection(move |conn| sync_entity_index(conn, &labels)).await
    }

    async fn fulltext_search(&self, query: &str, k: usize, language: Language) -> Result<Vec<FulltextHit>> {
        let start = std::time::Instant::now();
        let query = query.to_string();
        let hits = self
            .db
            .with_connection(move |conn| {
                let ranked = score_terms(conn, &query, k)?;
                let desc_sql = format!(
                    "SELECT COALESCE({}, '') FROM nodes WHERE id = ?1",
                    language.description_column()
                );
                let mut hits = Vec::with_capacity(ranked.len());
                for (node_id, score) in ranked {
                    let description: String = conn
                        .query_row(&desc_sql, params![node_id], |row| row.get(0))
                        .optional()?
                        .unwrap_or_default();
                    let edges = load_neighbor_edges(conn, &node_id)?;
                    hits.push(FulltextHit {
                        node_id,
                        score,
                        description,
                        edges,
                    });
                }
                Ok(hits)
            })
            .await?;
        log::debug!("Full-text search took {:?}, {} hits", start.elapsed(), hits.len());
        Ok(hits)
    }

    async fn neighbor_edges(&self, node_id: &str) -> Result<Vec<String>> {
        let node_id = node_id.to_string();
        self.db
            .with_connection(move |conn| load_neighbor_edges(conn, &node_id))
            .await
    }

    async fn node_descriptions(&self, language: Language) -> Result<Vec<(String, String)>> {
        self.db
            .with_connection(move |conn| {
                let column = language.description_column();
                let sql = format!(
                    "SELECT id, {col} FROM nodes WHERE {col} IS NOT NULL AND {col} != '' ORDER BY rowid",
                    col = column
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
            .await
    }

    async fn similar_nodes(
        &self,
        embedding: &[f32],
        language: Language,
        label: &NodeLabel,
        threshold: f32,
        k: usize,
    ) -> Result<Vec<ScoredNode>> {
        let query_vec = embedding.to_vec();
        let label = label.as_str().to_string();
        self.db
            .with_connection(move |conn| {
                let sql = format!(
                    "SELECT n.id, COALESCE(n.{desc}, ''), n.{emb}
                     FROM nodes n
                     JOIN node_labels l ON l.node_id = n.id AND l.label = ?1
                     WHERE n.{emb} IS NOT NULL",
                    desc = language.description_column(),
                    emb = language.embedding_column()
                );
                let mut stmt = conn.prepare(&sql)?;
                let mut rows = stmt.query(params![label])?;
                let mut scored = Vec::new();
                while let Some(row) = rows.next()? {
                    let blob: Vec<u8> = row.get(2)?;
                    let Some(node_vec) = parse_embedding(&blob) else {
                        continue;
                    };
                    if node_vec.len() != query_vec.len() {
                        continue;
                    }
                    let score = cosine_similarity(&query_vec, &node_vec);
                    if score > threshold {
                        scored.push(ScoredNode {
                            node_id: row.get(0)?,
                            description: row.get(1)?,
                            score,
                        });
                    }
                }
                scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
                scored.truncate(k);
                Ok(scored)
            })
            .await
    }

    async fn entity_embeddings(&self, language: Language) -> Result<Vec<(String, Vec<f32>)>> {
        self.db
            .with_connection(move |conn| {
                let sql = format!(
                    "SELECT n.id, n.{emb} FROM nodes n
                     JOIN node_labels l ON l.node_id = n.id AND l.label = ?1
                     WHERE n.{emb} IS NOT NULL
                     ORDER BY n.id",
                    emb = language.embedding_column()
                );
                let mut stmt = conn.prepare(&sql)?;
                let mut rows = stmt.query(params![ENTITY_MARKER])?;
                let mut out = Vec::new();
                while let Some(row) = rows.next()? {
                    let blob: Vec<u8> = row.get(1)?;
                    if let Some(vec) = parse_embedding(&blob) {
                        out.push((row.get(0)?, vec));
                    }
                }
                Ok(out)
            })
            .await
    }
}

/// Encode an embedding as a little-endian f32 BLOB
pub(crate) fn encode_embedding(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Parse an embedding BLOB (little-endian f32 array); None if the length is off
pub(crate) fn parse_embedding(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return None;
    }
    blob.chunks(4)
        .map(|bytes| {
            let arr: [u8; 4] = bytes.try_into().ok()?;
            Some(f32::from_le_bytes(arr))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn node(id: &str, label: NodeLabel, desc_en: &str) -> GraphNode {
        let mut node = GraphNode::new(id, label);
        node.description_en = Some(desc_en.to_string());
        node.description = Some(format!("{} (zh)", desc_en));
        node
    }

    async fn setup_store() -> (SqliteGraphStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteGraphStore::open(Db::new(temp_dir.path().join("graph.db")))
            .await
            .unwrap();

        store
            .insert_node(node("flex-direction", NodeLabel::KnowledgePoint, "Defines the direction of flex items"))
            .await
            .unwrap();
        store
            .insert_node(node("flex-flow", NodeLabel::KnowledgePoint, "Shorthand for flex-direction and flex-wrap"))
            .await
            .unwrap();
        store
            .insert_node(node("direction", NodeLabel::Attribute, "Specifies the text direction"))
            .await
            .unwrap();
        store
            .insert_node(node("CSS 属性", NodeLabel::Other("Category".into()), "CSS properties"))
            .await
            .unwrap();

        store.insert_edge(Edge::new("flex-direction", "NEXT_KNOWLEDGE", "flex-flow")).await.unwrap();
        store.insert_edge(Edge::new("flex-flow", "PRE_KNOWLEDGE", "flex-direction")).await.unwrap();
        store.insert_edge(Edge::new("flex-direction", "PART_OF", "CSS 属性")).await.unwrap();

        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_ensure_entity_index_is_idempotent() {
        let (store, _tmp) = setup_store().await;
        store.ensure_entity_index(NodeLabel::retrievable()).await.unwrap();
        let first = store.counts().await.unwrap();
        store.ensure_entity_index(NodeLabel::retrievable()).await.unwrap();
        let second = store.counts().await.unwrap();

        assert_eq!(first, second);
        // "CSS 属性" carries no retrievable label
        assert_eq!(first, (4, 3, 3));
    }

    #[tokio::test]
    async fn test_ensure_entity_index_concurrent() {
        let (store, _tmp) = setup_store().await;
        let labels = NodeLabel::retrievable();
        let (a, b) = tokio::join!(store.ensure_entity_index(labels), store.ensure_entity_index(labels));
        a.unwrap();
        b.unwrap();
        assert_eq!(store.counts().await.unwrap().2, 3);
    }

    #[tokio::test]
    async fn test_fulltext_search_returns_neighbourhood() {
        let (store, _tmp) = setup_store().await;
        store.ensure_entity_index(NodeLabel::retrievable()).await.unwrap();

        let hits = store.fulltext_search("flex-direction", 2, Language::En).await.unwrap();
        assert!(!hits.is_empty());
        assert!(hits.len() <= 2);
        let top = hits.iter().find(|h| h.node_id == "flex-direction").unwrap();
        assert_eq!(top.description, "Defines the direction of flex items");
        assert!(top.edges.contains(&"flex-direction - PART_OF -> CSS 属性".to_string()));
        assert!(top.edges.contains(&"flex-flow - PRE_KNOWLEDGE -> flex-direction".to_string()));
        assert!(top.score >= 0.0);
    }

    #[tokio::test]
    async fn test_fulltext_search_language_field() {
        let (store, _tmp) = setup_store().await;
        store.ensure_entity_index(NodeLabel::retrievable()).await.unwrap();
        let hits = store.fulltext_search("direction", 5, Language::Other).await.unwrap();
        let hit = hits.iter().find(|h| h.node_id == "direction").unwrap();
        assert_eq!(hit.description, "Specifies the text direction (zh)");
    }

    #[tokio::test]
    async fn test_fulltext_matches_inside_chinese_text() {
        let (store, _tmp) = setup_store().await;
        let mut p = GraphNode::new("p", NodeLabel::KnowledgePoint);
        p.description = Some("HTML p标签用于定义段落".to_string());
        p.description_en = Some("The p element defines a paragraph".to_string());
        store.insert_node(p).await.unwrap();
        store.ensure_entity_index(NodeLabel::retrievable()).await.unwrap();

        let hits = store.fulltext_search("标签", 2, Language::Other).await.unwrap();
        assert_eq!(hits[0].node_id, "p");
        assert_eq!(hits[0].description, "HTML p标签用于定义段落");

        let hits = store.fulltext_search("段落^2", 2, Language::Other).await.unwrap();
        assert_eq!(hits[0].node_id, "p");
        // characters out of order are not the phrase
        assert!(store.fulltext_search("签标", 2, Language::Other).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reindex_picks_up_changed_description() {
        let (store, _tmp) = setup_store().await;
        store.ensure_entity_index(NodeLabel::retrievable()).await.unwrap();
        assert!(store.fulltext_search("bidirectional", 2, Language::En).await.unwrap().is_empty());

        store
            .insert_node(node("direction", NodeLabel::Attribute, "Bidirectional writing mode"))
            .await
            .unwrap();
        store.ensure_entity_index(NodeLabel::retrievable()).await.unwrap();

        let hits = store.fulltext_search("bidirectional", 2, Language::En).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].node_id, "direction");
        // the old text is gone from the index
        let hits = store.fulltext_search("text", 5, Language::En).await.unwrap();
        assert!(hits.iter().all(|h| h.node_id != "direction"));
        assert_eq!(store.counts().await.unwrap(), (4, 3, 3));
    }

    #[tokio::test]
    async fn test_fulltext_boost_changes_ranking() {
        let (store, _tmp) = setup_store().await;
        store.ensure_entity_index(NodeLabel::retrievable()).await.unwrap();

        let boosted = store.fulltext_search("text^5 shorthand", 1, Language::En).await.unwrap();
        assert_eq!(boosted[0].node_id, "direction");

        let boosted = store.fulltext_search("text shorthand^5", 1, Language::En).await.unwrap();
        assert_eq!(boosted[0].node_id, "flex-flow");
    }

    #[tokio::test]
    async fn test_fulltext_no_match_is_empty() {
        let (store, _tmp) = setup_store().await;
        store.ensure_entity_index(NodeLabel::retrievable()).await.unwrap();
        let hits = store.fulltext_search("nonexistentterm", 2, Language::En).await.unwrap();
        assert!(hits.is_empty());
        let hits = store.fulltext_search("- ^", 2, Language::En).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_node_descriptions_in_insert_order() {
        let (store, _tmp) = setup_store().await;
        let docs = store.node_descriptions(Language::En).await.unwrap();
        let ids: Vec<&str> = docs.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["flex-direction", "flex-flow", "direction", "CSS 属性"]);
    }

    #[tokio::test]
    async fn test_similar_nodes_threshold_and_label() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteGraphStore::open(Db::new(temp_dir.path().join("graph.db")))
            .await
            .unwrap();
        let mut a = node("a", NodeLabel::KnowledgePoint, "a");
        a.embedding_en = Some(vec![1.0, 0.0, 0.0]);
        let mut b = node("b", NodeLabel::KnowledgePoint, "b");
        b.embedding_en = Some(vec![0.7, 0.7, 0.0]);
        let mut c = node("c", NodeLabel::Example, "c");
        c.embedding_en = Some(vec![1.0, 0.0, 0.0]);
        for n in [a, b, c] {
            store.insert_node(n).await.unwrap();
        }

        let hits = store
            .similar_nodes(&[1.0, 0.0, 0.0], Language::En, &NodeLabel::KnowledgePoint, 0.8, 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].node_id, "a");

        let hits = store
            .similar_nodes(&[1.0, 0.0, 0.0], Language::En, &NodeLabel::KnowledgePoint, 0.5, 10)
            .await
            .unwrap();
        assert_eq!(hits.iter().map(|h| h.node_id.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_entity_embeddings_only_marked() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteGraphStore::open(Db::new(temp_dir.path().join("graph.db")))
            .await
            .unwrap();
        let mut a = node("a", NodeLabel::Method, "a");
        a.embedding_en = Some(vec![0.5, 0.5]);
        let mut z = node("z", NodeLabel::Other("Category".into()), "z");
        z.embedding_en = Some(vec![0.5, 0.5]);
        store.insert_node(a).await.unwrap();
        store.insert_node(z).await.unwrap();
        store.ensure_entity_index(NodeLabel::retrievable()).await.unwrap();

        let embs = store.entity_embeddings(Language::En).await.unwrap();
        assert_eq!(embs.len(), 1);
        assert_eq!(embs[0].0, "a");
        assert_eq!(embs[0].1, vec![0.5, 0.5]);
    }

    #[test]
    fn test_embedding_blob_round_trip() {
        let values = vec![1.0f32, -2.5, 3.25];
        assert_eq!(parse_embedding(&encode_embedding(&values)), Some(values));
        assert!(parse_embedding(&[0u8, 1, 2]).is_none());
    }

    #[test]
    fn test_fts5_phrase_quoting() {
        assert_eq!(fts5_phrase("border-collapse").as_deref(), Some("\"border-collapse\""));
        assert_eq!(fts5_phrase("p标签").as_deref(), Some("\"p 标 签\""));
        assert!(fts5_phrase("-").is_none());
    }
}
