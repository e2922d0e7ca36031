//! # Notion Record Store Tests
//!
//! Exercises `NotionRecordStore` against an `httpmock` stand-in for the Notion API.

use anyhow::Result;
use httpmock::{Method, MockServer};
use ideasieve::errors::ProviderError;
use ideasieve::providers::RecordStore;
use ideasieve::types::{IdeaDraft, IdeaMetadata, SourceInfo};
use ideasieve_notion::NotionRecordStore;
use serde_json::json;

const DB_ID: &str = "mock-db-id-12345";

fn store(server: &MockServer) -> Result<NotionRecordStore> {
    Ok(NotionRecordStore::new(
        &server.base_url(),
        "test_token",
        DB_ID,
        "2022-06-28",
    )?)
}

fn metadata(title: &str, count: u32) -> IdeaMetadata {
    IdeaMetadata {
        draft: IdeaDraft {
            title: title.to_string(),
            category: "Startup".to_string(),
            problem_statement: "Home networks are opaque".to_string(),
            solution: "A router that explains itself".to_string(),
            target_audience: "Households".to_string(),
            innovation_score: 7.0,
            potential_applications: "Homes".to_string(),
            prerequisites: String::new(),
            additional_notes: String::new(),
        },
        source_fingerprint: None,
        count,
    }
}

#[tokio::test]
async fn test_find_by_title_reads_page_id_and_count() -> Result<()> {
    // --- Arrange ---
    let server = MockServer::start_async().await;
    let query_mock = server
        .mock_async(|when, then| {
            when.method(Method::POST)
                .path(format!("/v1/databases/{DB_ID}/query"))
                .header("authorization", "Bearer test_token")
                .header("notion-version", "2022-06-28")
                .json_body_partial(
                    json!({ "filter": { "property": "Title", "title": { "equals": "Edge AI Router" } } })
                        .to_string(),
                );
            then.status(200).json_body(json!({
                "object": "list",
                "results": [{
                    "object": "page",
                    "id": "page-1",
                    "properties": {
                        "Title": { "id": "title", "type": "title", "title": [{ "plain_text": "Edge AI Router" }] },
                        "Count": { "id": "c", "type": "number", "number": 4 },
                        "Type": { "id": "t", "type": "rich_text", "rich_text": [{ "plain_text": "Startup" }] }
                    }
                }]
            }));
        })
        .await;
    let store = store(&server)?;

    // --- Act ---
    let record = store.find_by_title("Edge AI Router").await?;

    // --- Assert ---
    query_mock.assert_async().await;
    let record = record.expect("page found");
    assert_eq!(record.record_id, "page-1");
    assert_eq!(record.title, "Edge AI Router");
    assert_eq!(record.count, Some(4));
    Ok(())
}

#[tokio::test]
async fn test_find_by_title_returns_none_for_empty_results() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(Method::POST)
                .path(format!("/v1/databases/{DB_ID}/query"));
            then.status(200).json_body(json!({ "object": "list", "results": [] }));
        })
        .await;

    assert!(store(&server)?.find_by_title("Unknown").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_create_and_update_count() -> Result<()> {
    // --- Arrange ---
    let server = MockServer::start_async().await;
    let create_mock = server
        .mock_async(|when, then| {
            when.method(Method::POST).path("/v1/pages").json_body_partial(
                json!({
                    "parent": { "database_id": DB_ID },
                    "properties": {
                        "Count": { "number": 1 },
                        "Source URL": { "url": "https://news.example.com/a" }
                    }
                })
                .to_string(),
            );
            then.status(200).json_body(json!({ "object": "page", "id": "page-9" }));
        })
        .await;
    let update_mock = server
        .mock_async(|when, then| {
            when.method(Method::PATCH)
                .path("/v1/pages/page-9")
                .json_body(json!({ "properties": { "Count": { "number": 2 } } }));
            then.status(200).json_body(json!({ "object": "page", "id": "page-9" }));
        })
        .await;
    let store = store(&server)?;
    let source = SourceInfo {
        url: "https://news.example.com/a".to_string(),
        title: "Routers".to_string(),
        discovered_at: None,
    };

    // --- Act ---
    store.create(&metadata("Edge AI Router", 1), &source).await?;
    store.update_count("page-9", 2).await?;

    // --- Assert ---
    create_mock.assert_async().await;
    update_mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_api_errors_map_to_record_store_errors() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(Method::PATCH).path("/v1/pages/missing");
            then.status(404).body("object_not_found");
        })
        .await;

    let result = store(&server)?.update_count("missing", 3).await;

    match result {
        Err(ProviderError::RecordStore(msg)) => assert!(msg.contains("object_not_found")),
        other => panic!("expected a record store error, got {other:?}"),
    }
    Ok(())
}
