//! # `ideasieve-notion`: Notion Record Store
//!
//! Mirrors idea counts into a Notion database so people can browse them. Implements the
//! `RecordStore` trait from the core `ideasieve` library on top of the Notion REST API:
//! pages are looked up by their `Title` property, created with the full idea, and have
//! their `Count` property overwritten with the value held by the vector index.

use async_trait::async_trait;
use chrono::SecondsFormat;
use ideasieve::errors::ProviderError;
use ideasieve::providers::RecordStore;
use ideasieve::types::{DisplayRecord, IdeaMetadata, SourceInfo};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};

/// Notion rejects rich-text objects longer than this.
const RICH_TEXT_LIMIT: usize = 2000;

// --- Error Definitions ---

#[derive(Error, Debug, Clone)]
pub enum NotionError {
    #[error("Failed to reach the Notion API: {0}")]
    Fetch(String),
    #[error("Notion API returned an error: {0}")]
    ApiError(String),
    #[error("Invalid Notion configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for NotionError {
    fn from(err: reqwest::Error) -> Self {
        NotionError::Fetch(err.to_string())
    }
}

/// A helper to convert the specific `NotionError` into the generic `ProviderError`.
impl From<NotionError> for ProviderError {
    fn from(err: NotionError) -> Self {
        ProviderError::RecordStore(err.to_string())
    }
}

// --- Notion API Response Structures ---

#[derive(Deserialize, Debug, Clone)]
struct PlainText {
    plain_text: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
enum PropertyValue {
    Title {
        title: Vec<PlainText>,
    },
    Number {
        number: Option<f64>,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize, Debug)]
struct Page {
    id: String,
    #[serde(default)]
    properties: HashMap<String, PropertyValue>,
}

#[derive(Deserialize, Debug)]
struct QueryResponse {
    results: Vec<Page>,
}

impl Page {
    fn title(&self) -> String {
        match self.properties.get("Title") {
            Some(PropertyValue::Title { title }) => {
                title.iter().map(|t| t.plain_text.as_str()).collect()
            }
            _ => String::new(),
        }
    }

    fn count(&self) -> Option<u32> {
        match self.properties.get("Count") {
            Some(PropertyValue::Number { number: Some(n) }) if *n >= 0.0 => Some(*n as u32),
            _ => None,
        }
    }
}

// --- Property Builders ---

fn rich_text(content: &str) -> Value {
    let content: String = content.chars().take(RICH_TEXT_LIMIT).collect();
    json!({ "rich_text": [{ "text": { "content": content } }] })
}

/// Builds the property map for a new page.
pub fn page_properties(metadata: &IdeaMetadata, source: &SourceInfo) -> Map<String, Value> {
    let draft = &metadata.draft;
    let mut properties = Map::new();
    properties.insert(
        "Title".into(),
        json!({ "title": [{ "text": { "content": draft.title } }] }),
    );
    properties.insert("Count".into(), json!({ "number": metadata.count }));
    properties.insert("Type".into(), rich_text(&draft.category));
    properties.insert(
        "Problem Statement".into(),
        rich_text(&draft.problem_statement),
    );
    properties.insert("Solution".into(), rich_text(&draft.solution));
    properties.insert("Target Audience".into(), rich_text(&draft.target_audience));
    properties.insert(
        "Innovation Score".into(),
        json!({ "number": draft.innovation_score }),
    );
    properties.insert(
        "Potential Applications".into(),
        rich_text(&draft.potential_applications),
    );
    properties.insert("Prerequisites".into(), rich_text(&draft.prerequisites));
    properties.insert("Additional Notes".into(), rich_text(&draft.additional_notes));

    if !source.url.is_empty() {
        properties.insert("Source URL".into(), json!({ "url": source.url }));
    }
    if !source.title.is_empty() {
        properties.insert("Source Title".into(), rich_text(&source.title));
    }
    if let Some(discovered_at) = source.discovered_at {
        properties.insert(
            "Processed Date".into(),
            json!({ "date": { "start": discovered_at.to_rfc3339_opts(SecondsFormat::Secs, true) } }),
        );
    }
    properties
}

fn construct_headers(token: &str, version: &str) -> Result<HeaderMap, NotionError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| NotionError::Config(format!("Invalid token: {e}")))?,
    );
    headers.insert(
        "Notion-Version",
        HeaderValue::from_str(version)
            .map_err(|e| NotionError::Config(format!("Invalid version: {e}")))?,
    );
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}

async fn ensure_success(response: reqwest::Response, action: &str) -> Result<reqwest::Response, NotionError> {
    if !response.status().is_success() {
        let err_text = response.text().await.unwrap_or_default();
        return Err(NotionError::ApiError(format!("{action}: {err_text}")));
    }
    Ok(response)
}

// --- Record Store Implementation ---

#[derive(Clone, Debug)]
pub struct NotionRecordStore {
    client: reqwest::Client,
    base_url: String,
    database_id: String,
}

impl NotionRecordStore {
    /// `base_url` is the API root, e.g. `https://api.notion.com`.
    pub fn new(
        base_url: &str,
        token: &str,
        database_id: &str,
        version: &str,
    ) -> Result<Self, NotionError> {
        let client = reqwest::Client::builder()
            .default_headers(construct_headers(token, version)?)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            database_id: database_id.to_string(),
        })
    }

    async fn query_title(&self, title: &str) -> Result<Option<Page>, NotionError> {
        let url = format!("{}/v1/databases/{}/query", self.base_url, self.database_id);
        let body = json!({
            "filter": { "property": "Title", "title": { "equals": title } },
            "page_size": 1
        });
        let response = self.client.post(&url).json(&body).send().await?;
        let response = ensure_success(response, "Failed to query database").await?;
        let query_response: QueryResponse = response.json().await?;
        Ok(query_response.results.into_iter().next())
    }

    async fn create_page(
        &self,
        metadata: &IdeaMetadata,
        source: &SourceInfo,
    ) -> Result<(), NotionError> {
        let body = json!({
            "parent": { "database_id": self.database_id },
            "properties": page_properties(metadata, source),
        });
        let response = self
            .client
            .post(format!("{}/v1/pages", self.base_url))
            .json(&body)
            .send()
            .await?;
        ensure_success(response, "Failed to create page").await?;
        info!("Created Notion page for '{}'", metadata.draft.title);
        Ok(())
    }

    async fn set_count(&self, page_id: &str, count: u32) -> Result<(), NotionError> {
        let body = json!({ "properties": { "Count": { "number": count } } });
        let response = self
            .client
            .patch(format!("{}/v1/pages/{page_id}", self.base_url))
            .json(&body)
            .send()
            .await?;
        ensure_success(response, "Failed to update page").await?;
        debug!("Set Count={count} on Notion page {page_id}");
        Ok(())
    }
}

#[async_trait]
impl RecordStore for NotionRecordStore {
    async fn find_by_title(&self, title: &str) -> Result<Option<DisplayRecord>, ProviderError> {
        let page = self.query_title(title).await?;
        Ok(page.map(|page| DisplayRecord {
            title: page.title(),
            count: page.count(),
            record_id: page.id,
        }))
    }

    async fn create(
        &self,
        metadata: &IdeaMetadata,
        source: &SourceInfo,
    ) -> Result<(), ProviderError> {
        Ok(self.create_page(metadata, source).await?)
    }

    async fn update_count(&self, record_id: &str, count: u32) -> Result<(), ProviderError> {
        Ok(self.set_count(record_id, count).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use ideasieve::types::IdeaDraft;

    fn metadata() -> IdeaMetadata {
        IdeaMetadata {
            draft: IdeaDraft {
                title: "Edge AI Router".into(),
                category: "Startup".into(),
                problem_statement: "x".repeat(2500),
                solution: "A router that explains itself".into(),
                target_audience: "Households".into(),
                innovation_score: 7.5,
                potential_applications: String::new(),
                prerequisites: String::new(),
                additional_notes: String::new(),
            },
            source_fingerprint: None,
            count: 3,
        }
    }

    #[test]
    fn properties_carry_count_and_optional_source() {
        let without_source = page_properties(&metadata(), &SourceInfo::default());
        assert_eq!(without_source["Count"]["number"], 3);
        assert_eq!(without_source["Innovation Score"]["number"], 7.5);
        assert!(!without_source.contains_key("Source URL"));
        assert!(!without_source.contains_key("Processed Date"));
        let problem = without_source["Problem Statement"]["rich_text"][0]["text"]["content"]
            .as_str()
            .unwrap();
        assert_eq!(problem.len(), RICH_TEXT_LIMIT);

        let source = SourceInfo {
            url: "https://news.example.com/a".into(),
            title: "Routers".into(),
            discovered_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()),
        };
        let with_source = page_properties(&metadata(), &source);
        assert_eq!(with_source["Source URL"]["url"], "https://news.example.com/a");
        assert_eq!(
            with_source["Processed Date"]["date"]["start"],
            "2024-05-01T08:00:00Z"
        );
    }
}
