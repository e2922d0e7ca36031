pub mod batch;
pub mod embedding;
pub mod gemini;
pub mod local;

use crate::{batch::BatchTask, errors::ProviderError};
use async_trait::async_trait;
use dyn_clone::DynClone;
pub use embedding::OpenAiEmbedder;
use serde_json::Value;
use std::fmt::Debug;

/// Turns a piece of text into a fixed-length embedding vector.
#[async_trait]
pub trait Embedder: Send + Sync + Debug + DynClone {
    /// Returns `Ok(None)` when the service answered but produced no vector.
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>, ProviderError>;
}

dyn_clone::clone_trait_object!(Embedder);

/// Synchronous idea extraction: one article in, zero or more raw idea drafts out.
///
/// Drafts are returned untyped; the normalizer decides which ones are usable.
#[async_trait]
pub trait IdeaExtractor: Send + Sync + Debug + DynClone {
    async fn extract(&self, content: &str, prompt: &str) -> Result<Vec<Value>, ProviderError>;
}

dyn_clone::clone_trait_object!(IdeaExtractor);

/// State of a submitted batch job at the time it was polled.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchPoll {
    /// Still queued or running; carries the provider's status string.
    Pending(String),
    /// The job ended without output (failed, expired, cancelled).
    Failed(String),
    /// The job finished; carries the raw JSONL result file.
    Completed(String),
}

/// Two-phase extraction through an asynchronous batch job.
#[async_trait]
pub trait BatchExtractor: Send + Sync + Debug + DynClone {
    /// Submits all tasks as one job and returns its opaque identifier.
    async fn submit(&self, tasks: &[BatchTask]) -> Result<String, ProviderError>;

    /// Checks a job once. No waiting or retrying happens here.
    async fn poll(&self, job_id: &str) -> Result<BatchPoll, ProviderError>;
}

dyn_clone::clone_trait_object!(BatchExtractor);
