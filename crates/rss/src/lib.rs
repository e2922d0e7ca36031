//! # `ideasieve-rss`: Feed Link Discovery
//!
//! Implements the `FeedSource` trait from the core `ideasieve` library. Each configured
//! RSS or Atom feed is fetched and parsed with `feed-rs`, and the link of every entry is
//! returned. Google Alerts wraps article links in a `google.com/url?url=...` redirect;
//! those are unwrapped to the article itself.

use async_trait::async_trait;
use ideasieve::ingest::{FeedSource, IngestError};
use reqwest::Client as ReqwestClient;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

/// Custom error types for fetching a single feed.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(reqwest::Error),
    #[error("Failed to fetch feed: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("Failed to parse feed: {0}")]
    Parse(#[from] feed_rs::parser::ParseFeedError),
}

/// A helper to convert the specific `FeedError` into the generic `ideasieve::ingest::IngestError`.
impl From<FeedError> for IngestError {
    fn from(err: FeedError) -> Self {
        match err {
            FeedError::ClientBuild(e) | FeedError::Fetch(e) => IngestError::Fetch(e.to_string()),
            FeedError::Parse(e) => IngestError::Parse(e.to_string()),
        }
    }
}

/// One configured feed.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct FeedSubscription {
    pub name: String,
    pub url: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Returns the target of a Google redirect link, or the link unchanged.
pub fn unwrap_redirect(link: &str) -> String {
    let Ok(parsed) = Url::parse(link) else {
        return link.to_string();
    };
    let is_google = parsed
        .host_str()
        .is_some_and(|h| h == "google.com" || h.ends_with(".google.com"));
    if !is_google || parsed.path() != "/url" {
        return link.to_string();
    }
    parsed
        .query_pairs()
        .find(|(k, _)| k == "url" || k == "q")
        .map(|(_, v)| v.into_owned())
        .unwrap_or_else(|| link.to_string())
}

/// The `FeedSource` implementation for RSS and Atom feeds.
#[derive(Clone, Debug)]
pub struct RssFeedSource {
    client: ReqwestClient,
    feeds: Vec<FeedSubscription>,
}

impl RssFeedSource {
    pub fn new(feeds: Vec<FeedSubscription>) -> Result<Self, FeedError> {
        let client = ReqwestClient::builder()
            .user_agent(concat!("ideasieve/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FeedError::ClientBuild)?;
        Ok(Self { client, feeds })
    }

    /// Fetches one feed and returns its entry links in document order.
    pub async fn fetch_feed(&self, feed_url: &str) -> Result<Vec<String>, FeedError> {
        let bytes = self
            .client
            .get(feed_url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        let feed = feed_rs::parser::parse(&bytes[..])?;

        let links = feed
            .entries
            .into_iter()
            .filter_map(|entry| {
                entry
                    .links
                    .first()
                    .map(|l| l.href.clone())
                    .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()))
            })
            .map(|link| unwrap_redirect(&link))
            .collect();
        Ok(links)
    }
}

#[async_trait]
impl FeedSource for RssFeedSource {
    /// A feed that cannot be fetched or parsed is logged and skipped.
    async fn discover_links(&self) -> Result<Vec<String>, IngestError> {
        let mut all_links = Vec::new();
        for feed in self.feeds.iter().filter(|f| f.enabled) {
            match self.fetch_feed(&feed.url).await {
                Ok(links) => {
                    info!("Feed '{}' returned {} links.", feed.name, links.len());
                    all_links.extend(links);
                }
                Err(e) => warn!("Skipping feed '{}' ({}): {e}", feed.name, feed.url),
            }
        }
        Ok(all_links)
    }
}
