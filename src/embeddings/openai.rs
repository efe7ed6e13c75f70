//! Embedding client for OpenAI-compatible endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Secrets;
use crate::embeddings::EmbeddingProvider;
use crate::types::RagError;

const PROVIDER: &str = "openai-embeddings";

/// Talks to `{api_base}/embeddings`, splitting input into provider-sized
/// batches. Batching never disturbs ordering: responses are re-sorted by
/// the provider's `index` field and appended batch by batch.
pub struct OpenAiEmbeddingProvider {
    client: Client,
    endpoint: String,
    model: String,
    max_batch: usize,
}

impl OpenAiEmbeddingProvider {
    pub fn new(
        secrets: &Secrets,
        model: impl Into<String>,
        timeout: Duration,
        max_batch: usize,
    ) -> Result<Self, RagError> {
        if max_batch == 0 {
            return Err(RagError::Config(
                "embedding max_batch must be greater than zero".to_string(),
            ));
        }
        let client = Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .default_headers(auth_headers(&secrets.api_key)?)
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", secrets.api_base),
            model: model.into(),
            max_batch,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.max_batch) {
            let request = EmbeddingRequest {
                model: &self.model,
                input: batch,
            };
            let response = self
                .client
                .post(&self.endpoint)
                .json(&request)
                .send()
                .await
                .map_err(|err| provider_error(PROVIDER, &err))?;

            let status = response.status();
            if !status.is_success() {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<body unavailable>".to_string());
                return Err(RagError::provider(
                    PROVIDER,
                    format!("request failed ({status}): {body}"),
                ));
            }

            let mut parsed: EmbeddingResponse = response
                .json()
                .await
                .map_err(|err| RagError::provider(PROVIDER, format!("invalid response: {err}")))?;
            parsed.data.sort_by_key(|entry| entry.index);
            if parsed.data.len() != batch.len() {
                return Err(RagError::provider(
                    PROVIDER,
                    format!(
                        "returned {} embeddings for {} inputs",
                        parsed.data.len(),
                        batch.len()
                    ),
                ));
            }
            vectors.extend(parsed.data.into_iter().map(|entry| entry.embedding));
        }

        debug!(count = vectors.len(), model = %self.model, "embedded batch");
        Ok(vectors)
    }
}

pub(crate) fn auth_headers(api_key: &str) -> Result<HeaderMap, RagError> {
    let mut headers = HeaderMap::new();
    let bearer = format!("Bearer {}", api_key.trim());
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&bearer)
            .map_err(|_| RagError::Config("API key contains invalid header bytes".to_string()))?,
    );
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}

pub(crate) fn provider_error(provider: &'static str, err: &reqwest::Error) -> RagError {
    let message = if err.is_timeout() {
        "request timed out".to_string()
    } else {
        err.to_string()
    };
    RagError::provider(provider, message)
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingEntry>,
}

#[derive(Deserialize)]
struct EmbeddingEntry {
    index: usize,
    embedding: Vec<f32>,
}
