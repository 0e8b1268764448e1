//! Entity resolution: find near-duplicate entities and let the model decide
//! which of them to merge. Runs offline, never during a question session.
//!
//! Applying a merge to the graph is left to whoever owns the entity
//! namespace; this module only produces the decision.

pub mod candidates;

pub use candidates::{find_candidate_clusters, CandidateSettings};

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{KgragError, Result};
use crate::graph::{GraphStore, Language};
use crate::llm::output::extract_json_object;
use crate::llm::LanguageModel;
use crate::prompts;

/// Entity ids judged to denote the same referent. Never fewer than two.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DuplicateCluster(Vec<String>);

impl DuplicateCluster {
    /// Deduplicates members, keeping first occurrence. `None` when fewer
    /// than two remain.
    pub fn new<I: IntoIterator<Item = String>>(members: I) -> Option<Self> {
        let mut seen = HashSet::new();
        let members: Vec<String> = members
            .into_iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty() && seen.insert(m.clone()))
            .collect();
        (members.len() >= 2).then_some(Self(members))
    }

    pub fn members(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Outcome of a full resolution run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolutionReport {
    pub candidate_clusters: Vec<Vec<String>>,
    pub merge_entities: Vec<DuplicateCluster>,
}

/// Read merge groups out of the model's JSON answer.
///
/// A group is either a list of strings or an object with an `entities` list.
/// Members outside `candidates` are dropped, as is any member already placed
/// in an earlier group.
fn parse_merge_groups(value: &serde_json::Value, candidates: &[String]) -> Result<Vec<DuplicateCluster>> {
    let groups = value
        .get("merge_entities")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| KgragError::Parse("answer has no merge_entities list".to_string()))?;

    let known: HashSet<&str> = candidates.iter().map(String::as_str).collect();
    let mut placed: HashSet<String> = HashSet::new();
    let mut clusters = Vec::new();

    for group in groups {
        let members = match group {
            serde_json::Value::Array(items) => items,
            serde_json::Value::Object(obj) => match obj.get("entities").and_then(serde_json::Value::as_array) {
                Some(items) => items,
                None => continue,
            },
            _ => continue,
        };
        let members: Vec<String> = members
            .iter()
            .filter_map(serde_json::Value::as_str)
            .map(|m| m.trim().to_string())
            .filter(|m| known.contains(m.as_str()) && !placed.contains(m))
            .collect();
        if let Some(cluster) = DuplicateCluster::new(members) {
            placed.extend(cluster.members().iter().cloned());
            clusters.push(cluster);
        }
    }
    Ok(clusters)
}

/// Model adjudication of candidate clusters.
pub struct EntityResolver {
    model: Arc<dyn LanguageModel>,
}

impl EntityResolver {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Ask which of `candidates` should merge. Fewer than two candidates
    /// need no call.
    pub async fn resolve(&self, candidates: &[String]) -> Result<Vec<DuplicateCluster>> {
        if candidates.len() < 2 {
            return Ok(Vec::new());
        }
        let listing = candidates
            .iter()
            .map(|c| format!("- {}", c))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = prompts::fill(prompts::RESOLUTION_USER, &[("entities", listing.as_str())]);
        let raw = self.model.complete(&prompt, Some(prompts::RESOLUTION_SYSTEM)).await?;

        let value = extract_json_object(&raw)?;
        let clusters = parse_merge_groups(&value, candidates)?;
        log::debug!("{} candidate(s) -> {} merge group(s)", candidates.len(), clusters.len());
        Ok(clusters)
    }

    /// Candidate search over the store's embeddings followed by one model call
    /// per candidate cluster. A cluster whose answer cannot be parsed is
    /// skipped with a warning.
    pub async fn resolve_store(
        &self,
        store: &dyn GraphStore,
        language: Language,
        settings: &CandidateSettings,
    ) -> Result<ResolutionReport> {
        let start = std::time::Instant::now();
        let nodes = store.entity_embeddings(language).await?;
        let candidate_clusters = find_candidate_clusters(&nodes, settings);
        log::info!(
            "Found {} candidate cluster(s) among {} embedded entities",
            candidate_clusters.len(),
            nodes.len()
        );

        let mut merge_entities = Vec::new();
        for cluster in &candidate_clusters {
            match self.resolve(cluster).await {
                Ok(groups) => merge_entities.extend(groups),
                Err(KgragError::Parse(msg)) => {
                    log::warn!("Skipping cluster {:?}: {}", cluster, msg);
                }
                Err(e) => return Err(e),
            }
        }

        log::info!(
            "Resolution finished in {:?}: {} merge group(s)",
            start.elapsed(),
            merge_entities.len()
        );
        Ok(ResolutionReport {
            candidate_clusters,
            merge_entities,
        })
    }
}
