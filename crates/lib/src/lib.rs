//! # IdeaSieve
//!
//! Turns a stream of news articles into a deduplicated catalogue of business ideas.
//!
//! Article links come from RSS/Atom feeds and are filtered against a persistent URL
//! ledger. Each new article is sent to a language model that extracts idea drafts. The
//! drafts are normalized and embedded, then compared against a vector index by cosine
//! similarity. A near-duplicate increments the stored idea's occurrence count; anything
//! else is stored as a new idea. Counts live in the vector index and are mirrored to a
//! human-facing record store (Notion) as a best-effort copy.
//!
//! Extraction runs either synchronously (`Pipeline::run`) or as a two-phase batch job
//! (`Pipeline::submit_batch`, then `Pipeline::collect_batch`).

pub mod batch;
pub mod constants;
pub mod dedup;
pub mod errors;
pub mod ingest;
pub mod pipeline;
pub mod prompts;
pub mod providers;
pub mod types;

pub use errors::ProviderError;
pub use pipeline::{
    CollectStatus, Pipeline, PipelineBuilder, PipelineError, PipelineOptions, RunSummary,
};
pub use types::{Decision, Idea, IdeaDraft, IdeaMetadata, UrlFingerprint};
