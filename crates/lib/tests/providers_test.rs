//! # AI Provider Tests
//!
//! Checks the wire format of the embeddings, extraction and batch clients against a
//! `wiremock` server.

mod common;

use anyhow::Result;
use common::setup_tracing;
use ideasieve::batch::BatchTask;
use ideasieve::errors::ProviderError;
use ideasieve::providers::ai::{
    batch::OpenAiBatchClient, gemini::GeminiIdeaExtractor, local::ChatIdeaExtractor,
    BatchExtractor, BatchPoll, Embedder, IdeaExtractor, OpenAiEmbedder,
};
use ideasieve::types::UrlFingerprint;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ideas_json() -> String {
    json!({
        "output": [{
            "title": "Edge AI Router",
            "type": "Startup",
            "problemStatement": "Home networks are opaque",
            "solution": "A router that explains itself",
            "targetAudience": "Households",
            "innovationScore": 7,
            "potentialApplications": "Homes",
            "prerequisites": "",
            "additionalNotes": ""
        }]
    })
    .to_string()
}

#[tokio::test]
async fn test_embedder_sends_model_and_dimensions() -> Result<()> {
    setup_tracing();
    // --- Arrange ---
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "text-embedding-3-small",
            "input": "problem_solution",
            "dimensions": 3
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": [{ "embedding": [0.1, 0.2, 0.3] }] })),
        )
        .mount(&server)
        .await;
    let embedder = OpenAiEmbedder::new(
        format!("{}/v1/embeddings", server.uri()),
        Some("test-key".to_string()),
        "text-embedding-3-small".to_string(),
        3,
    )?;

    // --- Act ---
    let vector = embedder.embed("problem_solution").await?;

    // --- Assert ---
    assert_eq!(vector, Some(vec![0.1, 0.2, 0.3]));
    Ok(())
}

#[tokio::test]
async fn test_embedder_empty_answer_and_api_error() -> Result<()> {
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/empty"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let empty = OpenAiEmbedder::new(format!("{}/empty", server.uri()), None, "m".into(), 3)?;
    let broken = OpenAiEmbedder::new(format!("{}/broken", server.uri()), None, "m".into(), 3)?;

    assert_eq!(empty.embed("text").await?, None);
    match broken.embed("text").await {
        Err(ProviderError::AiApi(body)) => assert_eq!(body, "upstream down"),
        other => panic!("expected an API error, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_chat_extractor_uses_json_mode_and_parses_output() -> Result<()> {
    setup_tracing();
    // --- Arrange ---
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "model": "gpt-4o",
            "response_format": { "type": "json_object" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": ideas_json() } }]
        })))
        .mount(&server)
        .await;
    let extractor = ChatIdeaExtractor::new(
        format!("{}/v1/chat/completions", server.uri()),
        Some("test-key".to_string()),
        "gpt-4o".to_string(),
        0.4,
    )?;

    // --- Act ---
    let drafts = extractor.extract("article text", "extract ideas").await?;

    // --- Assert ---
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0]["title"], "Edge AI Router");
    Ok(())
}

#[tokio::test]
async fn test_gemini_extractor_passes_key_and_handles_no_ideas() -> Result<()> {
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
        .and(query_param("key", "gemini-key"))
        .and(body_partial_json(json!({
            "generationConfig": { "responseMimeType": "application/json" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "{\"endReason\":\"nothing new\"}" }] } }]
        })))
        .mount(&server)
        .await;
    let extractor = GeminiIdeaExtractor::new(
        format!("{}/v1beta/models/gemini-2.0-flash:generateContent", server.uri()),
        "gemini-key".to_string(),
        0.4,
    )?;

    let drafts = extractor.extract("article text", "extract ideas").await?;

    assert!(drafts.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_batch_client_submits_and_polls() -> Result<()> {
    setup_tracing();
    // --- Arrange ---
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/files"))
        .and(header("authorization", "Bearer batch-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "file-in" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/batches"))
        .and(body_partial_json(json!({
            "input_file_id": "file-in",
            "endpoint": "/v1/chat/completions",
            "completion_window": "24h"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "batch_123", "status": "validating"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/batches/batch_123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "batch_123", "status": "completed", "output_file_id": "file-out"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/batches/batch_slow"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "batch_slow", "status": "in_progress"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/batches/batch_dead"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "batch_dead", "status": "expired"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/files/file-out/content"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"custom_id\":\"task-x\"}\n"))
        .mount(&server)
        .await;

    let client = OpenAiBatchClient::new(
        format!("{}/", server.uri()),
        "batch-key".to_string(),
        "24h".to_string(),
    )?;
    let fp = UrlFingerprint::of_canonical("https://news.example.com/a");
    let tasks = vec![BatchTask::new(&fp, "gpt-4o", 0.4, "extract ideas", "article")];

    // --- Act ---
    let job_id = client.submit(&tasks).await?;
    let done = client.poll(&job_id).await?;
    let slow = client.poll("batch_slow").await?;
    let dead = client.poll("batch_dead").await?;

    // --- Assert ---
    assert_eq!(job_id, "batch_123");
    assert_eq!(done, BatchPoll::Completed("{\"custom_id\":\"task-x\"}\n".to_string()));
    assert_eq!(slow, BatchPoll::Pending("in_progress".to_string()));
    assert_eq!(dead, BatchPoll::Failed("expired".to_string()));
    assert!(client.submit(&[]).await.is_err());
    Ok(())
}
