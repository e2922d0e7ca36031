//! # Extractor Factory
//!
//! Builds the configured synchronous `IdeaExtractor` so every entry point wires the
//! same provider the same way.

use crate::{
    errors::ProviderError,
    providers::ai::{gemini::GeminiIdeaExtractor, local::ChatIdeaExtractor, IdeaExtractor},
};
use tracing::info;

/// Provider-agnostic extractor settings, usually taken straight from configuration.
#[derive(Debug, Clone)]
pub struct ExtractorSettings {
    /// `"openai"` (any OpenAI-compatible endpoint) or `"gemini"`.
    pub provider: String,
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub model_name: String,
    pub temperature: f32,
}

pub const DEFAULT_OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

pub fn gemini_generate_url(model_name: &str) -> String {
    format!("https://generativelanguage.googleapis.com/v1beta/models/{model_name}:generateContent")
}

pub fn create_extractor(
    settings: &ExtractorSettings,
) -> Result<Box<dyn IdeaExtractor>, ProviderError> {
    let extractor: Box<dyn IdeaExtractor> = match settings.provider.as_str() {
        "gemini" => {
            let api_key = settings
                .api_key
                .clone()
                .filter(|k| !k.is_empty())
                .ok_or(ProviderError::MissingApiKey)?;
            let api_url = settings
                .api_url
                .clone()
                .unwrap_or_else(|| gemini_generate_url(&settings.model_name));
            info!("Using Gemini extractor at {api_url}");
            Box::new(GeminiIdeaExtractor::new(
                api_url,
                api_key,
                settings.temperature,
            )?)
        }
        "openai" | "local" => {
            let api_url = settings
                .api_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_CHAT_URL.to_string());
            info!("Using chat-completions extractor at {api_url}");
            Box::new(ChatIdeaExtractor::new(
                api_url,
                settings.api_key.clone().filter(|k| !k.is_empty()),
                settings.model_name.clone(),
                settings.temperature,
            )?)
        }
        other => {
            return Err(ProviderError::AiApi(format!(
                "unknown extraction provider '{other}'"
            )))
        }
    };
    Ok(extractor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(provider: &str, api_key: Option<&str>) -> ExtractorSettings {
        ExtractorSettings {
            provider: provider.to_string(),
            api_url: None,
            api_key: api_key.map(String::from),
            model_name: "gemini-2.0-flash".to_string(),
            temperature: 0.4,
        }
    }

    #[test]
    fn gemini_requires_an_api_key() {
        let err = create_extractor(&settings("gemini", None)).unwrap_err();
        assert!(matches!(err, ProviderError::MissingApiKey));
        assert!(create_extractor(&settings("gemini", Some("k"))).is_ok());
    }

    #[test]
    fn unknown_provider_is_rejected() {
        assert!(create_extractor(&settings("carrier-pigeon", None)).is_err());
        assert!(create_extractor(&settings("openai", None)).is_ok());
    }
}
