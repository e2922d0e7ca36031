use crate::types::PageContent;
use async_trait::async_trait;
use dyn_clone::DynClone;
use std::fmt::Debug;
use thiserror::Error;

/// A generic error type for the feed and content collaborators.
///
/// Each adapter crate maps its own errors (HTTP, feed parsing, HTML parsing) into these
/// variants so the pipeline can treat every source uniformly.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to fetch or read content from the source: {0}")]
    Fetch(String),

    #[error("Failed to parse the content from the source: {0}")]
    Parse(String),

    #[error("The source returned no usable content: {0}")]
    Empty(String),

    #[error("An unexpected internal error occurred: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Produces candidate article URLs from the configured feeds.
#[async_trait]
pub trait FeedSource: Send + Sync + Debug + DynClone {
    /// Returns every link discovered across all enabled feeds, in feed order.
    ///
    /// A single failing feed must not fail the call; implementations log and skip it.
    async fn discover_links(&self) -> Result<Vec<String>, IngestError>;
}

dyn_clone::clone_trait_object!(FeedSource);

/// Turns an article URL into a title plus a block of plain text.
#[async_trait]
pub trait ContentSource: Send + Sync + Debug + DynClone {
    async fn fetch_content(&self, url: &str) -> Result<PageContent, IngestError>;
}

dyn_clone::clone_trait_object!(ContentSource);
