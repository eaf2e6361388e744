use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};

use super::{EmbedError, Embedder};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "text-embedding-ada-002";
const DEFAULT_DIM: usize = 1536;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Clone, Debug)]
pub struct OpenAiEmbedderConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub dim: usize,
    pub timeout: Duration,
}

impl Default for OpenAiEmbedderConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            dim: DEFAULT_DIM,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl OpenAiEmbedderConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(base) = std::env::var("OPENAI_BASE_URL") {
            cfg.base_url = base;
        }
        if let Ok(model) = std::env::var("OPENAI_EMBED_MODEL") {
            cfg.model = model;
        }
        if let Some(dim) = std::env::var("OPENAI_EMBED_DIM").ok().and_then(|v| v.parse().ok()) {
            cfg.dim = dim;
        }
        if let Some(secs) = std::env::var("OPENAI_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()) {
            cfg.timeout = Duration::from_secs(secs);
        }
        cfg
    }
}

/// Hosted embeddings over an OpenAI-compatible `/embeddings` endpoint.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    http: HttpClient,
    cfg: OpenAiEmbedderConfig,
}

impl OpenAiEmbedder {
    pub fn new(cfg: OpenAiEmbedderConfig) -> Result<Self, EmbedError> {
        let http = HttpClient::builder().timeout(cfg.timeout).build()?;
        Ok(Self { http, cfg })
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.cfg.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed_passages(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() { return Ok(vec![]); }
        let api_key = self.cfg.api_key.as_deref().ok_or(EmbedError::MissingApiKey)?;

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&EmbeddingRequest { model: &self.cfg.model, input: texts })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmbedError::Api { status, message });
        }
        let parsed: EmbeddingResponse = response.json().await?;
        order_and_check(parsed.data, texts.len(), self.cfg.dim)
    }

    fn model_tag(&self) -> &str { &self.cfg.model }
}

// Items may arrive out of order; `index` refers to the input position.
fn order_and_check(mut items: Vec<EmbeddingItem>, expected: usize, dim: usize) -> Result<Vec<Vec<f32>>, EmbedError> {
    if items.len() != expected {
        return Err(EmbedError::Count { expected, got: items.len() });
    }
    items.sort_by_key(|item| item.index);
    items
        .into_iter()
        .map(|item| {
            if item.embedding.len() != dim {
                return Err(EmbedError::Dimension { expected: dim, got: item.embedding.len() });
            }
            Ok(item.embedding)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(index: usize, v: Vec<f32>) -> EmbeddingItem { EmbeddingItem { index, embedding: v } }

    #[test]
    fn responses_are_reordered_by_index() {
        let out = order_and_check(vec![item(1, vec![1.0, 1.0]), item(0, vec![0.0, 0.0])], 2, 2).unwrap();
        assert_eq!(out, vec![vec![0.0, 0.0], vec![1.0, 1.0]]);
    }

    #[test]
    fn wrong_count_or_dimension_is_an_error() {
        assert!(matches!(
            order_and_check(vec![item(0, vec![1.0])], 2, 1),
            Err(EmbedError::Count { expected: 2, got: 1 })
        ));
        assert!(matches!(
            order_and_check(vec![item(0, vec![1.0, 2.0, 3.0])], 1, 2),
            Err(EmbedError::Dimension { expected: 2, got: 3 })
        ));
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let cfg = OpenAiEmbedderConfig { api_key: None, ..OpenAiEmbedderConfig::default() };
        let embedder = OpenAiEmbedder::new(cfg).unwrap();
        let err = embedder.embed_passages(&["hello".to_string()]).await.unwrap_err();
        assert!(matches!(err, EmbedError::MissingApiKey));
    }
}
