use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::Embedder;
use crate::cache::EmbeddingCache;
use crate::config::EmbeddingsConfig;
use crate::error::{KgragError, Result};

/// Request structure for the embeddings endpoint
#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// OpenAI-compatible embeddings client
///
/// Makes exactly one request per uncached text; retrying is left to the
/// orchestration layer.
pub struct OpenAIEmbedder {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    dimensions: usize,
    cache: Option<Arc<EmbeddingCache>>,
}

impl OpenAIEmbedder {
    pub fn new(
        api_key: String,
        model: String,
        base_url: String,
        dimensions: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KgragError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            dimensions,
            cache: None,
        })
    }

    /// Build from the `[embeddings]` section; the key is read from the
    /// configured environment variable.
    pub fn from_config(config: &EmbeddingsConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            KgragError::Config(format!("Environment variable {} not set", config.api_key_env))
        })?;
        let embedder = Self::new(
            api_key,
            config.model.clone(),
            config.base_url.clone(),
            config.dimensions,
            Duration::from_secs(config.timeout_secs),
        )?;
        Ok(embedder.with_cache(Arc::new(EmbeddingCache::new(config.cache_capacity))))
    }

    pub fn with_cache(mut self, cache: Arc<EmbeddingCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn request(&self, text: &str) -> Result<Vec<f32>> {
        let start = std::time::Instant::now();
        let request = EmbeddingRequest {
            model: &self.model,
            input: vec![text],
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    KgragError::Timeout(format!("embedding request: {}", e))
                } else {
                    KgragError::Embedding(format!("Network error: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(KgragError::Embedding(format!("API error {}: {}", status, body)));
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| KgragError::Embedding(format!("Failed to parse response: {}", e)))?;

        let embedding = result
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| KgragError::Embedding("Empty response from embeddings API".to_string()))?;

        log::debug!("Embedding API call took {:?}", start.elapsed());
        Ok(embedding)
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(&self.model, text) {
                log::debug!("Embedding cache hit for: {}", text);
                return Ok(cached);
            }
        }

        let embedding = self.request(text).await?;
        check_dimensions(&embedding, self.dimensions)?;

        if let Some(cache) = &self.cache {
            cache.put(&self.model, text, embedding.clone());
        }
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

fn check_dimensions(embedding: &[f32], expected: usize) -> Result<()> {
    if embedding.len() != expected {
        return Err(KgragError::Embedding(format!(
            "Unexpected embedding dimension: expected {}, got {}",
            expected,
            embedding.len()
        )));
    }
    Ok(())
}
