//! # Embeddings Provider
//!
//! Generates idea embeddings by calling an external, OpenAI-compatible embeddings API.

use crate::{errors::ProviderError, providers::ai::Embedder};
use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// --- OpenAI-compatible request and response structures ---

#[derive(Serialize, Debug)]
struct OpenAIEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    dimensions: usize,
}

#[derive(Deserialize, Debug)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
}

#[derive(Deserialize, Debug)]
struct OpenAIEmbeddingData {
    embedding: Vec<f32>,
}

/// An `Embedder` backed by `POST {api_url}` with an OpenAI-style payload.
#[derive(Clone, Debug)]
pub struct OpenAiEmbedder {
    client: ReqwestClient,
    api_url: String,
    api_key: Option<String>,
    model: String,
    dimension: usize,
}

impl OpenAiEmbedder {
    /// `api_url` is the full embeddings endpoint, e.g. `https://api.openai.com/v1/embeddings`.
    pub fn new(
        api_url: String,
        api_key: Option<String>,
        model: String,
        dimension: usize,
    ) -> Result<Self, ProviderError> {
        let client = ReqwestClient::builder()
            .build()
            .map_err(ProviderError::ReqwestClientBuild)?;
        Ok(Self {
            client,
            api_url,
            api_key,
            model,
            dimension,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>, ProviderError> {
        let request_body = OpenAIEmbeddingRequest {
            model: &self.model,
            input: text,
            dimensions: self.dimension,
        };
        debug!(model = %self.model, "--> Sending request to embeddings API");

        let mut request_builder = self.client.post(&self.api_url).json(&request_body);
        if let Some(key) = &self.api_key {
            request_builder = request_builder.bearer_auth(key);
        }

        let response = request_builder
            .send()
            .await
            .map_err(ProviderError::AiRequest)?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::AiApi(error_text));
        }

        let embedding_response: OpenAIEmbeddingResponse = response
            .json()
            .await
            .map_err(ProviderError::AiDeserialization)?;

        let vector = embedding_response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .filter(|v| !v.is_empty());
        if vector.is_none() {
            warn!("Embeddings API returned no vector.");
        }
        Ok(vector)
    }
}
