//! Candidate duplicate groups, computed without the model.
//!
//! Nodes are linked when their embeddings are near neighbours, the linked
//! components are split into pairs whose ids are also close as strings, and
//! the surviving pairs are unioned into groups.

use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

use crate::config::ResolutionConfig;
use crate::search::vector::cosine_similarity;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateSettings {
    /// Minimum cosine similarity for a kNN edge
    pub similarity_cutoff: f32,
    pub knn_k: usize,
    /// Normalized ids must be strictly closer than this
    pub max_edit_distance: usize,
}

impl From<&ResolutionConfig> for CandidateSettings {
    fn from(config: &ResolutionConfig) -> Self {
        Self {
            similarity_cutoff: config.similarity_cutoff,
            knn_k: config.knn_k,
            max_edit_distance: config.max_edit_distance,
        }
    }
}

/// Disjoint-set forest with path halving and union by size.
struct DisjointSet {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (mut a, mut b) = (self.find(a), self.find(b));
        if a == b {
            return;
        }
        if self.size[a] < self.size[b] {
            std::mem::swap(&mut a, &mut b);
        }
        self.parent[b] = a;
        self.size[a] += self.size[b];
    }

    /// Members of every set with at least two elements, keyed by root.
    fn groups(&mut self) -> Vec<Vec<usize>> {
        let mut by_root: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for x in 0..self.parent.len() {
            let root = self.find(x);
            by_root.entry(root).or_default().push(x);
        }
        by_root.into_values().filter(|g| g.len() >= 2).collect()
    }
}

/// Lower-case and drop whitespace, so `"Flex Box"` equals `"flexbox"`.
pub fn normalize_id(id: &str) -> String {
    id.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn digit_runs(text: &str) -> Vec<&str> {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    DIGITS
        .get_or_init(|| Regex::new(r"\d+").expect("Invalid regex pattern"))
        .find_iter(text)
        .map(|m| m.as_str())
        .collect()
}

/// Edit distance over chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Whether two ids may name the same thing. Ids whose numbers differ never
/// pair, however close the rest of the text is.
pub fn may_pair(a: &str, b: &str, max_edit_distance: usize) -> bool {
    let (a, b) = (normalize_id(a), normalize_id(b));
    if digit_runs(&a) != digit_runs(&b) {
        return false;
    }
    a == b || levenshtein(&a, &b) < max_edit_distance
}

/// Group nodes that are probably duplicates.
///
/// Nodes whose embedding length differs from the first node's are ignored,
/// as are repeated ids. Every returned group has at least two members, is
/// sorted, and the groups themselves are sorted.
pub fn find_candidate_clusters(nodes: &[(String, Vec<f32>)], settings: &CandidateSettings) -> Vec<Vec<String>> {
    let dims = match nodes.iter().find(|(_, e)| !e.is_empty()) {
        Some((_, e)) => e.len(),
        None => return Vec::new(),
    };
    let mut seen = HashSet::new();
    let nodes: Vec<&(String, Vec<f32>)> = nodes
        .iter()
        .filter(|(id, e)| e.len() == dims && seen.insert(id.as_str()))
        .collect();
    let n = nodes.len();

    // kNN similarity graph
    let mut components = DisjointSet::new(n);
    for i in 0..n {
        let mut neighbours: Vec<(usize, f32)> = (0..n)
            .filter(|&j| j != i)
            .map(|j| (j, cosine_similarity(&nodes[i].1, &nodes[j].1)))
            .filter(|&(_, sim)| sim >= settings.similarity_cutoff)
            .collect();
        neighbours.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        for (j, _) in neighbours.into_iter().take(settings.knn_k) {
            components.union(i, j);
        }
    }

    // string filter inside each component, then merge overlapping pairs
    let mut merged = DisjointSet::new(n);
    for component in components.groups() {
        for (x, &i) in component.iter().enumerate() {
            for &j in &component[x + 1..] {
                if may_pair(&nodes[i].0, &nodes[j].0, settings.max_edit_distance) {
                    merged.union(i, j);
                }
            }
        }
    }

    let mut clusters: Vec<Vec<String>> = merged
        .groups()
        .into_iter()
        .map(|group| {
            let mut ids: Vec<String> = group.into_iter().map(|i| nodes[i].0.clone()).collect();
            ids.sort();
            ids
        })
        .collect();
    clusters.sort();
    log::debug!("{} candidate cluster(s) from {} node(s)", clusters.len(), n);
    clusters
}
