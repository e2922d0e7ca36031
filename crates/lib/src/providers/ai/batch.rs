//! # OpenAI Batch Adapter
//!
//! Thin client for the OpenAI Files + Batches APIs: upload a JSONL task file, create a
//! batch against `/v1/chat/completions`, and check a batch once. Polling cadence is the
//! caller's business.

use crate::{
    batch::{tasks_to_jsonl, BatchTask},
    errors::ProviderError,
    providers::ai::{BatchExtractor, BatchPoll},
};
use async_trait::async_trait;
use reqwest::{multipart, Client as ReqwestClient, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Deserialize, Debug)]
struct FileObject {
    id: String,
}

#[derive(Serialize, Debug)]
struct CreateBatchRequest<'a> {
    input_file_id: &'a str,
    endpoint: &'a str,
    completion_window: &'a str,
}

#[derive(Deserialize, Debug)]
struct BatchObject {
    id: String,
    status: String,
    #[serde(default)]
    output_file_id: Option<String>,
}

#[derive(Clone, Debug)]
pub struct OpenAiBatchClient {
    client: ReqwestClient,
    base_url: String,
    api_key: String,
    completion_window: String,
}

impl OpenAiBatchClient {
    /// `base_url` is the API root without the version segment, e.g. `https://api.openai.com`.
    pub fn new(
        base_url: String,
        api_key: String,
        completion_window: String,
    ) -> Result<Self, ProviderError> {
        let client = ReqwestClient::builder()
            .build()
            .map_err(ProviderError::ReqwestClientBuild)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            completion_window,
        })
    }

    async fn upload_tasks(&self, jsonl: String) -> Result<String, ProviderError> {
        let file_part = multipart::Part::bytes(jsonl.into_bytes())
            .file_name("batch_tasks.jsonl")
            .mime_str("application/jsonl")
            .map_err(ProviderError::AiRequest)?;
        let form = multipart::Form::new()
            .text("purpose", "batch")
            .part("file", file_part);

        let response = self
            .client
            .post(format!("{}/v1/files", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(ProviderError::AiRequest)?;
        let file: FileObject = read_json(response).await?;
        info!("Uploaded batch input file {}", file.id);
        Ok(file.id)
    }

    async fn download_file(&self, file_id: &str) -> Result<String, ProviderError> {
        let response = self
            .client
            .get(format!("{}/v1/files/{file_id}/content", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(ProviderError::AiRequest)?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::AiApi(error_text));
        }
        response.text().await.map_err(ProviderError::AiDeserialization)
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
    if !response.status().is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(ProviderError::AiApi(error_text));
    }
    response
        .json()
        .await
        .map_err(ProviderError::AiDeserialization)
}

#[async_trait]
impl BatchExtractor for OpenAiBatchClient {
    async fn submit(&self, tasks: &[BatchTask]) -> Result<String, ProviderError> {
        if tasks.is_empty() {
            return Err(ProviderError::AiApi(
                "refusing to submit an empty batch".to_string(),
            ));
        }
        let jsonl = tasks_to_jsonl(tasks)?;
        let input_file_id = self.upload_tasks(jsonl).await?;

        let request_body = CreateBatchRequest {
            input_file_id: &input_file_id,
            endpoint: "/v1/chat/completions",
            completion_window: &self.completion_window,
        };
        let response = self
            .client
            .post(format!("{}/v1/batches", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(ProviderError::AiRequest)?;
        let batch: BatchObject = read_json(response).await?;
        info!(
            "Created batch job {} with {} tasks (status: {}).",
            batch.id,
            tasks.len(),
            batch.status
        );
        Ok(batch.id)
    }

    async fn poll(&self, job_id: &str) -> Result<BatchPoll, ProviderError> {
        let response = self
            .client
            .get(format!("{}/v1/batches/{job_id}", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(ProviderError::AiRequest)?;
        let batch: BatchObject = read_json(response).await?;

        match (batch.status.as_str(), batch.output_file_id) {
            ("completed", Some(output_file_id)) => {
                let jsonl = self.download_file(&output_file_id).await?;
                Ok(BatchPoll::Completed(jsonl))
            }
            ("completed", None) => {
                warn!("Batch {job_id} completed without an output file.");
                Ok(BatchPoll::Failed(batch.status))
            }
            ("failed" | "expired" | "cancelled" | "cancelling", _) => {
                Ok(BatchPoll::Failed(batch.status))
            }
            _ => Ok(BatchPoll::Pending(batch.status)),
        }
    }
}
