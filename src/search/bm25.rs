use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

use super::normalize::{normalize_query, parse_boosted_terms};
use super::UnstructuredRetriever;
use crate::error::Result;
use crate::graph::{GraphStore, Language, ScoredNode};

/// Okapi BM25 parameters
const K1: f64 = 1.5;
const B: f64 = 0.75;
/// Negative IDF values are floored at `EPSILON * mean IDF`
const EPSILON: f64 = 0.25;

/// Lower-cased terms of normalized text, `^N` markers stripped
fn tokenize(text: &str) -> Vec<String> {
    parse_boosted_terms(&normalize_query(text))
        .into_iter()
        .map(|t| t.term.to_lowercase())
        .collect()
}

struct Document {
    node_id: String,
    description: String,
    term_freqs: HashMap<String, usize>,
    len: usize,
}

/// Immutable BM25 index over node descriptions.
///
/// Built once and shared read-only between sessions.
pub struct Bm25Corpus {
    docs: Vec<Document>,
    idf: HashMap<String, f64>,
    avg_len: f64,
}

impl Bm25Corpus {
    /// Build from `(node_id, description)` pairs; order is kept for tie-breaks.
    pub fn build(rows: Vec<(String, String)>) -> Self {
        let docs: Vec<Document> = rows
            .into_iter()
            .filter(|(_, description)| !description.trim().is_empty())
            .map(|(node_id, description)| {
                let tokens = tokenize(&description);
                let mut term_freqs = HashMap::new();
                for token in &tokens {
                    *term_freqs.entry(token.clone()).or_insert(0) += 1;
                }
                Document {
                    node_id,
                    description,
                    term_freqs,
                    len: tokens.len(),
                }
            })
            .collect();

        let n = docs.len() as f64;
        let avg_len = if docs.is_empty() {
            0.0
        } else {
            docs.iter().map(|d| d.len as f64).sum::<f64>() / n
        };

        let mut doc_freqs: HashMap<&str, usize> = HashMap::new();
        for doc in &docs {
            for term in doc.term_freqs.keys() {
                *doc_freqs.entry(term.as_str()).or_insert(0) += 1;
            }
        }

        let mut idf: HashMap<String, f64> = HashMap::with_capacity(doc_freqs.len());
        let mut idf_sum = 0.0;
        let mut negative = Vec::new();
        for (term, freq) in doc_freqs {
            let freq = freq as f64;
            let value = (n - freq + 0.5).ln() - (freq + 0.5).ln();
            idf_sum += value;
            if value < 0.0 {
                negative.push(term.to_string());
            }
            idf.insert(term.to_string(), value);
        }
        if !idf.is_empty() {
            let floor = EPSILON * idf_sum / idf.len() as f64;
            for term in negative {
                idf.insert(term, floor);
            }
        }

        Self { docs, idf, avg_len }
    }

    /// Load every non-empty description in `language` from the store.
    pub async fn load(store: &dyn GraphStore, language: Language) -> Result<Self> {
        let start = std::time::Instant::now();
        let corpus = Self::build(store.node_descriptions(language).await?);
        log::info!("BM25 corpus built: {} documents in {:?}", corpus.len(), start.elapsed());
        Ok(corpus)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Top `k` documents by score, descending; ties keep corpus order.
    /// Documents matching no query term are left out.
    pub fn top_k(&self, query: &str, k: usize) -> Vec<ScoredNode> {
        let terms: Vec<(String, f64)> = parse_boosted_terms(&normalize_query(query))
            .into_iter()
            .map(|t| (t.term.to_lowercase(), t.boost as f64))
            .collect();
        if terms.is_empty() || self.docs.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f64)> = self
            .docs
            .iter()
            .enumerate()
            .map(|(idx, doc)| (idx, self.score(doc, &terms)))
            .filter(|(_, score)| *score > 0.0)
            .collect();
        // stable sort keeps corpus order among equal scores
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(idx, score)| ScoredNode {
                node_id: self.docs[idx].node_id.clone(),
                description: self.docs[idx].description.clone(),
                score: score as f32,
            })
            .collect()
    }

    fn score(&self, doc: &Document, terms: &[(String, f64)]) -> f64 {
        let len_norm = if self.avg_len > 0.0 {
            doc.len as f64 / self.avg_len
        } else {
            0.0
        };
        terms
            .iter()
            .map(|(term, boost)| {
                let tf = doc.term_freqs.get(term).copied().unwrap_or(0) as f64;
                if tf == 0.0 {
                    return 0.0;
                }
                let idf = self.idf.get(term).copied().unwrap_or(0.0);
                boost * idf * (tf * (K1 + 1.0)) / (tf + K1 * (1.0 - B + B * len_norm))
            })
            .sum()
    }
}

/// Lexical fallback over node descriptions.
pub struct Bm25Retriever {
    store: Arc<dyn GraphStore>,
    language: Language,
    k: usize,
    corpus: Arc<OnceCell<Bm25Corpus>>,
}

impl Bm25Retriever {
    /// The corpus is built from the store on first use.
    pub fn new(store: Arc<dyn GraphStore>, language: Language, k: usize) -> Self {
        Self::with_corpus(store, language, k, Arc::new(OnceCell::new()))
    }

    /// Share a corpus cell between retrievers; a prebuilt corpus is used as is.
    pub fn with_corpus(
        store: Arc<dyn GraphStore>,
        language: Language,
        k: usize,
        corpus: Arc<OnceCell<Bm25Corpus>>,
    ) -> Self {
        Self {
            store,
            language,
            k,
            corpus,
        }
    }

    async fn corpus(&self) -> Result<&Bm25Corpus> {
        self.corpus
            .get_or_try_init(|| Bm25Corpus::load(self.store.as_ref(), self.language))
            .await
    }
}

#[async_trait]
impl UnstructuredRetriever for Bm25Retriever {
    async fn retrieve(&self, question: &str) -> Result<Vec<ScoredNode>> {
        if normalize_query(question).is_empty() {
            return Ok(Vec::new());
        }
        let corpus = self.corpus().await?;
        let hits = corpus.top_k(question, self.k);
        log::debug!("BM25 fallback: {} hit(s) for {:?}", hits.len(), question);
        Ok(hits)
    }

    fn name(&self) -> &'static str {
        "bm25"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockGraphStore;

    fn docs() -> Vec<(String, String)> {
        vec![
            ("flex-direction".into(), "Defines the direction of flex items".into()),
            ("grid".into(), "Grid layout arranges items in rows and columns".into()),
            ("a".into(), "The anchor element creates a hyperlink".into()),
        ]
    }

    #[test]
    fn test_top_k_bounded_by_corpus() {
        let corpus = Bm25Corpus::build(docs());
        let hits = corpus.top_k("flex items layout hyperlink", 5);
        assert!(hits.len() <= 3);
        assert!(!hits.is_empty());
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_top_k_best_match_first() {
        let corpus = Bm25Corpus::build(docs());
        let hits = corpus.top_k("hyperlink anchor", 5);
        assert_eq!(hits[0].node_id, "a");
        assert_eq!(hits[0].description, "The anchor element creates a hyperlink");
    }

    #[test]
    fn test_no_overlap_returns_nothing() {
        let corpus = Bm25Corpus::build(docs());
        assert!(corpus.top_k("database transaction", 5).is_empty());
        assert!(corpus.top_k("+++", 5).is_empty());
    }

    #[test]
    fn test_ties_keep_corpus_order() {
        let corpus = Bm25Corpus::build(vec![
            ("x".into(), "alpha beta".into()),
            ("y".into(), "alpha beta".into()),
            ("z".into(), "gamma delta".into()),
            ("w".into(), "epsilon zeta".into()),
            ("v".into(), "eta theta".into()),
        ]);
        let hits = corpus.top_k("alpha", 5);
        let ids: Vec<&str> = hits.iter().map(|h| h.node_id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y"]);
        assert_eq!(hits[0].score, hits[1].score);
    }

    #[test]
    fn test_boost_multiplies_contribution() {
        let corpus = Bm25Corpus::build(docs());
        let plain = corpus.top_k("grid", 1)[0].score;
        let boosted = corpus.top_k("grid^2", 1)[0].score;
        assert!((boosted - 2.0 * plain).abs() < 1e-4);

        let hits = corpus.top_k("hyperlink grid^3", 2);
        assert_eq!(hits[0].node_id, "grid");
    }

    #[test]
    fn test_negative_idf_is_floored() {
        // "items" is in 2 of 3 documents: raw IDF is negative
        let corpus = Bm25Corpus::build(vec![
            ("a".into(), "flex items".into()),
            ("b".into(), "grid items".into()),
            ("c".into(), "anchor".into()),
        ]);
        assert!(corpus.idf["items"] > 0.0);
        assert!(!corpus.top_k("items", 5).is_empty());
    }

    #[test]
    fn test_empty_descriptions_skipped() {
        let corpus = Bm25Corpus::build(vec![("a".into(), "  ".into()), ("b".into(), "text".into())]);
        assert_eq!(corpus.len(), 1);
    }

    #[tokio::test]
    async fn test_retriever_builds_corpus_once() {
        let store = Arc::new(MockGraphStore::default().with_descriptions(docs()));
        let retriever = Bm25Retriever::new(store.clone(), Language::En, 5);

        let first = retriever.retrieve("flex direction").await.unwrap();
        let second = retriever.retrieve("grid columns").await.unwrap();
        assert_eq!(first[0].node_id, "flex-direction");
        assert_eq!(second[0].node_id, "grid");
        assert_eq!(store.description_loads(), 1);
    }

    #[tokio::test]
    async fn test_shared_corpus_cell() {
        let store = Arc::new(MockGraphStore::default().with_descriptions(docs()));
        let cell = Arc::new(OnceCell::new());
        let a = Bm25Retriever::with_corpus(store.clone(), Language::En, 5, cell.clone());
        let b = Bm25Retriever::with_corpus(store.clone(), Language::En, 5, cell);

        let (ra, rb) = tokio::join!(a.retrieve("anchor"), b.retrieve("anchor"));
        assert_eq!(ra.unwrap(), rb.unwrap());
        assert_eq!(store.description_loads(), 1);
    }

    #[tokio::test]
    async fn test_prebuilt_corpus_skips_store() {
        let store = Arc::new(MockGraphStore::default());
        let cell = Arc::new(OnceCell::new_with(Some(Bm25Corpus::build(docs()))));
        let retriever = Bm25Retriever::with_corpus(store.clone(), Language::En, 5, cell);
        assert_eq!(retriever.retrieve("anchor").await.unwrap().len(), 1);
        assert_eq!(store.description_loads(), 0);
    }

    #[tokio::test]
    async fn test_empty_question_skips_corpus() {
        let store = Arc::new(MockGraphStore::default().with_descriptions(docs()));
        let retriever = Bm25Retriever::new(store.clone(), Language::En, 5);
        assert!(retriever.retrieve("?!").await.unwrap().is_empty());
        assert_eq!(store.description_loads(), 0);
    }
}
