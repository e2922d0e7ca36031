use crate::{
    batch::parse_idea_envelope, errors::ProviderError, prompts::extraction_user_prompt,
    providers::ai::IdeaExtractor,
};
use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;
use tracing::debug;

// --- OpenAI-compatible request and response structures ---

/// A chat-completions request body. Also used verbatim inside batch tasks.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub temperature: f32,
    pub response_format: ResponseFormat,
    pub messages: Vec<ChatMessage>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatCompletionRequest {
    /// Builds a JSON-mode extraction request for one article.
    pub fn for_extraction(model: &str, temperature: f32, prompt: &str, content: &str) -> Self {
        Self {
            model: model.to_string(),
            temperature,
            response_format: ResponseFormat {
                kind: "json_object".to_string(),
            },
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: prompt.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: extraction_user_prompt(content),
                },
            ],
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Debug)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

impl ChatCompletionResponse {
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

// --- Chat extractor implementation ---

/// Extracts ideas through an OpenAI-compatible `/v1/chat/completions` endpoint.
#[derive(Clone, Debug)]
pub struct ChatIdeaExtractor {
    client: ReqwestClient,
    api_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
}

impl ChatIdeaExtractor {
    pub fn new(
        api_url: String,
        api_key: Option<String>,
        model: String,
        temperature: f32,
    ) -> Result<Self, ProviderError> {
        let client = ReqwestClient::builder()
            .build()
            .map_err(ProviderError::ReqwestClientBuild)?;
        Ok(Self {
            client,
            api_url,
            api_key,
            model,
            temperature,
        })
    }
}

#[async_trait]
impl IdeaExtractor for ChatIdeaExtractor {
    async fn extract(&self, content: &str, prompt: &str) -> Result<Vec<Value>, ProviderError> {
        let request_body =
            ChatCompletionRequest::for_extraction(&self.model, self.temperature, prompt, content);

        let mut request_builder = self.client.post(&self.api_url);
        if let Some(key) = &self.api_key {
            request_builder = request_builder.bearer_auth(key);
        }

        let response = request_builder
            .json(&request_body)
            .send()
            .await
            .map_err(ProviderError::AiRequest)?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::AiApi(error_text));
        }

        let chat_response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(ProviderError::AiDeserialization)?;

        let raw = chat_response.first_content().unwrap_or_default();
        debug!("<-- Extraction output: {} bytes", raw.len());
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        parse_idea_envelope(raw)
    }
}
