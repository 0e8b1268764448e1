use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::graph::{Language, NodeLabel};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub kgrag: KgragConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub resolution: ResolutionConfig,
    #[serde(default)]
    pub answer: AnswerConfig,
}

/// Store and session-wide settings
#[derive(Debug, Clone, Deserialize)]
pub struct KgragConfig {
    pub db_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub language: Language,
}

/// Which instruction template the entity extractor sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    /// Bare list of entity strings
    Plain,
    /// Entity strings may carry a `^N` importance suffix
    #[default]
    Weighted,
}

/// Generative model configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub extraction_mode: ExtractionMode,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            temperature: 0.0,
            timeout_secs: default_llm_timeout_secs(),
            extraction_mode: ExtractionMode::default(),
        }
    }
}

/// Embeddings configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// HTTP timeout of one embedding request
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            dimensions: default_dimensions(),
            cache_capacity: default_cache_capacity(),
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

/// Which unstructured strategy backs up an under-returning structured pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackStrategy {
    #[default]
    Bm25,
    Vector,
    None,
}

/// Retrieval configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    /// Full-text matches fetched per entity mention
    #[serde(default = "default_structured_k")]
    pub structured_k: usize,
    #[serde(default = "default_bm25_k")]
    pub bm25_k: usize,
    #[serde(default = "default_vector_k")]
    pub vector_k: usize,
    #[serde(default = "default_vector_threshold")]
    pub vector_threshold: f32,
    /// How far the vector threshold drops for the single relaxed retry
    #[serde(default = "default_threshold_step")]
    pub threshold_step: f32,
    #[serde(default = "default_retrievable_labels")]
    pub retrievable_labels: Vec<NodeLabel>,
    #[serde(default = "default_vector_label")]
    pub vector_label: NodeLabel,
    #[serde(default)]
    pub fallback: FallbackStrategy,
    /// Below this many new structured entries in a hop, the fallback runs
    #[serde(default = "default_min_structured_entities")]
    pub min_structured_entities: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            structured_k: default_structured_k(),
            bm25_k: default_bm25_k(),
            vector_k: default_vector_k(),
            vector_threshold: default_vector_threshold(),
            threshold_step: default_threshold_step(),
            retrievable_labels: default_retrievable_labels(),
            vector_label: default_vector_label(),
            fallback: FallbackStrategy::default(),
            min_structured_entities: default_min_structured_entities(),
        }
    }
}

/// What a session does when the decision cannot be parsed even after the reformat retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UndecidedPolicy {
    #[default]
    Finalize,
    Abort,
}

/// Hop loop configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_max_hops")]
    pub max_hops: usize,
    #[serde(default = "default_max_stagnant_iterations")]
    pub max_stagnant_iterations: usize,
    #[serde(default = "default_max_io_retries")]
    pub max_io_retries: usize,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub refine_discards_context: bool,
    #[serde(default)]
    pub on_undecided: UndecidedPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_hops: default_max_hops(),
            max_stagnant_iterations: default_max_stagnant_iterations(),
            max_io_retries: default_max_io_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            call_timeout_secs: default_call_timeout_secs(),
            refine_discards_context: true,
            on_undecided: UndecidedPolicy::default(),
        }
    }
}

/// Entity resolution configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ResolutionConfig {
    #[serde(default = "default_similarity_cutoff")]
    pub similarity_cutoff: f32,
    #[serde(default = "default_knn_k")]
    pub knn_k: usize,
    /// Pairs closer than this (Levenshtein, normalized ids) may merge
    #[serde(default = "default_max_edit_distance")]
    pub max_edit_distance: usize,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            similarity_cutoff: default_similarity_cutoff(),
            knn_k: default_knn_k(),
            max_edit_distance: default_max_edit_distance(),
        }
    }
}

/// Answer synthesis persona
#[derive(Debug, Clone, Deserialize)]
pub struct AnswerConfig {
    #[serde(default = "default_answer_role")]
    pub role: String,
    #[serde(default = "default_answer_topic")]
    pub topic: String,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            role: default_answer_role(),
            topic: default_answer_topic(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    60
}

fn default_embedding_timeout_secs() -> u64 {
    30
}

fn default_dimensions() -> usize {
    1536
}

fn default_cache_capacity() -> usize {
    1000
}

fn default_structured_k() -> usize {
    2
}

fn default_bm25_k() -> usize {
    5
}

fn default_vector_k() -> usize {
    50
}

fn default_vector_threshold() -> f32 {
    0.8
}

fn default_threshold_step() -> f32 {
    0.1
}

fn default_retrievable_labels() -> Vec<NodeLabel> {
    NodeLabel::retrievable().to_vec()
}

fn default_vector_label() -> NodeLabel {
    NodeLabel::KnowledgePoint
}

fn default_min_structured_entities() -> usize {
    1
}

fn default_max_hops() -> usize {
    3
}

fn default_max_stagnant_iterations() -> usize {
    2
}

fn default_max_io_retries() -> usize {
    2
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_call_timeout_secs() -> u64 {
    120
}

fn default_true() -> bool {
    true
}

fn default_similarity_cutoff() -> f32 {
    0.95
}

fn default_knn_k() -> usize {
    10
}

fn default_max_edit_distance() -> usize {
    3
}

fn default_answer_role() -> String {
    "Web专家".to_string()
}

fn default_answer_topic() -> String {
    "Web".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in KGRAG_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        let config_path = std::env::var("KGRAG_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config = Self::from_toml_str(&config_str)?;
        config.validate_credentials()?;

        Ok(config)
    }

    /// Parse and validate configuration text without touching the environment.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str).context("Failed to parse config.toml")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        if r.structured_k == 0 || r.bm25_k == 0 || r.vector_k == 0 {
            anyhow::bail!("retrieval.structured_k, bm25_k and vector_k must be greater than 0");
        }

        if !(0.0..=1.0).contains(&r.vector_threshold) {
            anyhow::bail!("retrieval.vector_threshold must be between 0.0 and 1.0");
        }

        if r.threshold_step <= 0.0 || r.threshold_step > 1.0 {
            anyhow::bail!("retrieval.threshold_step must be in (0.0, 1.0]");
        }

        if r.retrievable_labels.is_empty() {
            anyhow::bail!("retrieval.retrievable_labels must not be empty");
        }

        if self.orchestrator.max_hops == 0 {
            anyhow::bail!("orchestrator.max_hops must be greater than 0");
        }

        if self.orchestrator.call_timeout_secs == 0 {
            anyhow::bail!("orchestrator.call_timeout_secs must be greater than 0");
        }

        if self.llm.timeout_secs == 0 || self.embeddings.timeout_secs == 0 {
            anyhow::bail!("llm.timeout_secs and embeddings.timeout_secs must be greater than 0");
        }

        if self.orchestrator.max_stagnant_iterations == 0 {
            anyhow::bail!("orchestrator.max_stagnant_iterations must be greater than 0");
        }

        if !(0.0..=1.0).contains(&self.resolution.similarity_cutoff) {
            anyhow::bail!("resolution.similarity_cutoff must be between 0.0 and 1.0");
        }

        if self.embeddings.dimensions == 0 {
            anyhow::bail!("embeddings.dimensions must be greater than 0");
        }

        Ok(())
    }

    /// Both API keys must be resolvable (dotenv already loaded in Config::load)
    fn validate_credentials(&self) -> Result<()> {
        for var in [&self.llm.api_key_env, &self.embeddings.api_key_env] {
            std::env::var(var).with_context(|| {
                format!(
                    "Environment variable {} not set. Set it in your .env file or as an environment variable.",
                    var
                )
            })?;
        }
        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.kgrag.db_path
    }

    pub fn language(&self) -> Language {
        self.kgrag.language
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serialize config tests that mutate process-wide env so they don't race.
    static CONFIG_TEST_LOCK: Mutex<()> = Mutex::new(());

    const MINIMAL: &str = r#"
[kgrag]
db_path = "./graph.db"
"#;

    const FULL: &str = r#"
[kgrag]
db_path = "./graph.db"
log_level = "debug"
language = "zh"

[llm]
model = "gpt-4o"
extraction_mode = "plain"

[retrieval]
structured_k = 4
fallback = "vector"
retrievable_labels = ["KnowledgePoint", "Method", "Glossary"]

[orchestrator]
max_hops = 5
on_undecided = "abort"
"#;

    fn with_env(config_path: &Path, api_key: Option<&str>, f: impl FnOnce()) {
        let original_config = std::env::var("KGRAG_CONFIG").ok();
        let original_key = std::env::var("OPENAI_API_KEY").ok();
        std::env::set_var("KGRAG_CONFIG", config_path);
        match api_key {
            Some(k) => std::env::set_var("OPENAI_API_KEY", k),
            None => std::env::remove_var("OPENAI_API_KEY"),
        }
        f();
        std::env::remove_var("KGRAG_CONFIG");
        std::env::remove_var("OPENAI_API_KEY");
        if let Some(val) = original_config {
            std::env::set_var("KGRAG_CONFIG", val);
        }
        if let Some(val) = original_key {
            std::env::set_var("OPENAI_API_KEY", val);
        }
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.kgrag.log_level, "info");
        assert_eq!(config.language(), Language::En);
        assert_eq!(config.retrieval.structured_k, 2);
        assert_eq!(config.retrieval.bm25_k, 5);
        assert_eq!(config.retrieval.vector_k, 50);
        assert!((config.retrieval.vector_threshold - 0.8).abs() < 1e-6);
        assert_eq!(config.retrieval.retrievable_labels.len(), 6);
        assert_eq!(config.orchestrator.max_hops, 3);
        assert!(config.orchestrator.refine_discards_context);
        assert_eq!(config.orchestrator.on_undecided, UndecidedPolicy::Finalize);
        assert!((config.resolution.similarity_cutoff - 0.95).abs() < 1e-6);
        assert_eq!(config.llm.extraction_mode, ExtractionMode::Weighted);
        assert_eq!(config.embeddings.timeout_secs, 30);
    }

    #[test]
    fn test_full_config_overrides() {
        let config = Config::from_toml_str(FULL).unwrap();
        assert_eq!(config.language(), Language::Other);
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.extraction_mode, ExtractionMode::Plain);
        assert_eq!(config.retrieval.structured_k, 4);
        assert_eq!(config.retrieval.fallback, FallbackStrategy::Vector);
        assert_eq!(
            config.retrieval.retrievable_labels,
            vec![
                NodeLabel::KnowledgePoint,
                NodeLabel::Method,
                NodeLabel::Other("Glossary".to_string())
            ]
        );
        assert_eq!(config.orchestrator.max_hops, 5);
        assert_eq!(config.orchestrator.on_undecided, UndecidedPolicy::Abort);
    }

    #[test]
    fn test_validation_rejects_zero_hops() {
        let text = format!("{}\n[orchestrator]\nmax_hops = 0\n", MINIMAL);
        let err = Config::from_toml_str(&text).unwrap_err();
        assert!(err.to_string().contains("max_hops"));
    }

    #[test]
    fn test_validation_rejects_zero_timeouts() {
        let text = format!("{}\n[orchestrator]\ncall_timeout_secs = 0\n", MINIMAL);
        let err = Config::from_toml_str(&text).unwrap_err();
        assert!(err.to_string().contains("call_timeout_secs"));

        let text = format!("{}\n[embeddings]\ntimeout_secs = 0\n", MINIMAL);
        let err = Config::from_toml_str(&text).unwrap_err();
        assert!(err.to_string().contains("embeddings.timeout_secs"));
    }

    #[test]
    fn test_validation_rejects_bad_threshold() {
        let text = format!("{}\n[retrieval]\nvector_threshold = 1.5\n", MINIMAL);
        assert!(Config::from_toml_str(&text).is_err());
    }

    #[test]
    fn test_config_load_success() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, FULL).unwrap();
        with_env(&config_path, Some("test-key"), || {
            let config = Config::load();
            assert!(config.is_ok(), "Config::load() failed: {:?}", config.err());
            assert_eq!(config.unwrap().kgrag.log_level, "debug");
        });
    }

    #[test]
    fn test_config_missing_api_key() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, MINIMAL).unwrap();
        with_env(&config_path, None, || {
            let config = Config::load();
            assert!(config.is_err(), "Expected missing API key error");
            assert!(config.unwrap_err().to_string().contains("OPENAI_API_KEY"));
        });
    }

    #[test]
    fn test_config_invalid_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        with_env(Path::new("nonexistent.toml"), Some("test-key"), || {
            assert!(Config::load().is_err());
        });
    }
}
