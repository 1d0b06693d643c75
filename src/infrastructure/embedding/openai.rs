//! OpenAI-compatible embeddings endpoint

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{HttpClient, HttpClientTrait};
use crate::config::EmbeddingConfig;
use crate::domain::embedding::{
    Embedding, EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, EmbeddingUsage,
};
use crate::domain::CacheError;

const PROVIDER: &str = "openai";
const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Embeds through `POST {base_url}/v1/embeddings`.
///
/// The response is checked before it reaches the cache: exactly one
/// non-empty vector per input, each input index answered once.
#[derive(Debug)]
pub struct OpenAiEmbeddingProvider<C: HttpClientTrait> {
    client: C,
    endpoint: String,
    auth_header: String,
}

impl OpenAiEmbeddingProvider<HttpClient> {
    /// Build from application config; `timeout` bounds each HTTP call
    pub fn from_config(config: &EmbeddingConfig, timeout: Duration) -> Result<Self, CacheError> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| CacheError::configuration("embedding.api_key is required"))?;

        let base_url = config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);

        Ok(Self::with_base_url(HttpClient::with_timeout(timeout)?, api_key, base_url))
    }
}

impl<C: HttpClientTrait> OpenAiEmbeddingProvider<C> {
    pub fn new(client: C, api_key: impl Into<String>) -> Self {
        Self::with_base_url(client, api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(client: C, api_key: impl Into<String>, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/v1/embeddings", base_url.trim_end_matches('/')),
            auth_header: format!("Bearer {}", api_key.into()),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl<C: HttpClientTrait> EmbeddingProvider for OpenAiEmbeddingProvider<C> {
    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, CacheError> {
        let body = serde_json::json!({
            "model": request.model(),
            "input": request.inputs(),
            "encoding_format": "float",
        });
        let headers = vec![
            ("Authorization", self.auth_header.as_str()),
            ("Content-Type", "application/json"),
        ];

        let raw = self.client.post_json(&self.endpoint, headers, &body).await?;
        let payload: EmbeddingsPayload = serde_json::from_value(raw).map_err(|e| {
            CacheError::provider(PROVIDER, format!("Unexpected embeddings payload: {}", e))
        })?;

        let embeddings = checked_embeddings(payload.data, request.expected_vectors())?;
        let usage = payload
            .usage
            .map(|u| EmbeddingUsage::new(u.prompt_tokens, u.total_tokens))
            .unwrap_or_default();

        Ok(EmbeddingResponse::new(payload.model, embeddings, usage))
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Order vectors by input index and reject anything the cache could not store
fn checked_embeddings(data: Vec<VectorItem>, expected: usize) -> Result<Vec<Embedding>, CacheError> {
    if data.len() != expected {
        return Err(CacheError::provider(
            PROVIDER,
            format!("expected {} embeddings, got {}", expected, data.len()),
        ));
    }

    let mut by_index = BTreeMap::new();
    for item in data {
        if item.index >= expected {
            return Err(CacheError::provider(
                PROVIDER,
                format!("embedding index {} out of range", item.index),
            ));
        }
        if item.embedding.is_empty() {
            return Err(CacheError::provider(
                PROVIDER,
                format!("embedding {} is empty", item.index),
            ));
        }
        if by_index.insert(item.index, item.embedding).is_some() {
            return Err(CacheError::provider(
                PROVIDER,
                format!("embedding index {} returned twice", item.index),
            ));
        }
    }

    Ok(by_index
        .into_iter()
        .map(|(index, vector)| Embedding::new(index, vector))
        .collect())
}

#[derive(Debug, Deserialize)]
struct EmbeddingsPayload {
    model: String,
    data: Vec<VectorItem>,
    #[serde(default)]
    usage: Option<UsageItem>,
}

#[derive(Debug, Deserialize)]
struct VectorItem {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct UsageItem {
    prompt_tokens: u32,
    total_tokens: u32,
}
