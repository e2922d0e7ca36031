//! # Service Wiring
//!
//! Turns an `AppConfig` into the concrete collaborators the pipeline runs against. Each
//! constructor checks the credentials it needs, so a subcommand fails before any
//! processing when its services are misconfigured.

use crate::config::{required, AppConfig};
use anyhow::{Context, Result};
use ideasieve::{
    dedup::SimilarityResolver,
    prompts::IDEA_EXTRACTION_SYSTEM_PROMPT,
    providers::{
        ai::{batch::OpenAiBatchClient, embedding::OpenAiEmbedder},
        db::{SqliteProvider, SqliteVectorIndex},
        factory::{create_extractor, ExtractorSettings},
    },
    PipelineBuilder, PipelineOptions,
};
use ideasieve_html::HtmlContentSource;
use ideasieve_notion::NotionRecordStore;
use ideasieve_rss::{FeedSubscription, RssFeedSource};
use std::path::Path;
use tracing::info;

pub struct App {
    pub config: AppConfig,
    pub storage: SqliteProvider,
}

impl App {
    /// Opens the local database, creating its directory and tables on first use.
    pub async fn open(config: AppConfig) -> Result<Self> {
        if config.db_url != ":memory:" {
            if let Some(parent) = Path::new(&config.db_url).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create database directory {}", parent.display())
                    })?;
                }
            }
        }
        let storage = SqliteProvider::new(&config.db_url).await?;
        storage.initialize_schema().await?;
        info!("Opened database at {}", config.db_url);
        Ok(Self { config, storage })
    }

    /// A builder with the ledger, batch-job table and options already set.
    pub fn builder(&self) -> PipelineBuilder {
        PipelineBuilder::new()
            .ledger(Box::new(self.storage.clone()))
            .jobs(Box::new(self.storage.clone()))
            .options(self.options())
    }

    pub fn options(&self) -> PipelineOptions {
        let dedup = &self.config.dedup;
        let extraction = &self.config.extraction;
        PipelineOptions {
            resolver: SimilarityResolver::new(
                dedup.similarity_threshold,
                dedup.top_k,
                dedup.match_policy,
            ),
            prompt: extraction
                .system_prompt
                .clone()
                .unwrap_or_else(|| IDEA_EXTRACTION_SYSTEM_PROMPT.to_string()),
            batch_model: self.config.batch.model_name.clone(),
            temperature: extraction.temperature,
            max_urls: self.config.max_urls,
        }
    }

    pub fn vector_index(&self) -> SqliteVectorIndex {
        SqliteVectorIndex::new(self.storage.db.clone(), self.config.embedding.dimension)
    }

    pub fn feed_source(&self) -> Result<RssFeedSource> {
        let feeds: Vec<FeedSubscription> = self
            .config
            .feeds
            .iter()
            .map(|f| FeedSubscription {
                name: f.name.clone(),
                url: f.url.clone(),
                enabled: f.enabled,
            })
            .collect();
        if feeds.iter().all(|f| !f.enabled) {
            anyhow::bail!("No enabled feeds are configured");
        }
        Ok(RssFeedSource::new(feeds)?)
    }

    pub fn content_source(&self) -> Result<HtmlContentSource> {
        Ok(HtmlContentSource::new(self.config.max_page_chars)?)
    }

    pub fn embedder(&self) -> Result<OpenAiEmbedder> {
        let embedding = &self.config.embedding;
        Ok(OpenAiEmbedder::new(
            embedding.api_url.clone(),
            embedding.api_key.clone().filter(|k| !k.is_empty()),
            embedding.model_name.clone(),
            embedding.dimension,
        )?)
    }

    pub fn extractor_settings(&self) -> Result<ExtractorSettings> {
        let extraction = &self.config.extraction;
        if extraction.provider == "gemini" {
            required(&extraction.api_key, "extraction.api_key")?;
        }
        Ok(ExtractorSettings {
            provider: extraction.provider.clone(),
            api_url: extraction.api_url.clone(),
            api_key: extraction.api_key.clone(),
            model_name: extraction.model_name.clone(),
            temperature: extraction.temperature,
        })
    }

    pub fn batch_client(&self) -> Result<OpenAiBatchClient> {
        let batch = &self.config.batch;
        Ok(OpenAiBatchClient::new(
            batch.api_base_url.clone(),
            batch.require_api_key()?.to_string(),
            batch.completion_window.clone(),
        )?)
    }

    pub fn record_store(&self) -> Result<NotionRecordStore> {
        let notion = &self.config.notion;
        let (api_key, database_id) = notion.credentials()?;
        Ok(NotionRecordStore::new(
            &notion.api_base_url,
            api_key,
            database_id,
            &notion.version,
        )?)
    }

    /// Everything the synchronous run needs.
    pub fn run_pipeline(&self) -> Result<ideasieve::Pipeline> {
        let extractor = create_extractor(&self.extractor_settings()?)?;
        Ok(self
            .builder()
            .feeds(Box::new(self.feed_source()?))
            .content(Box::new(self.content_source()?))
            .extractor(extractor)
            .embedder(Box::new(self.embedder()?))
            .index(Box::new(self.vector_index()))
            .records(Box::new(self.record_store()?))
            .build()?)
    }

    /// The batch front half: discovery, fetching and submission.
    pub fn submit_pipeline(&self) -> Result<ideasieve::Pipeline> {
        Ok(self
            .builder()
            .feeds(Box::new(self.feed_source()?))
            .content(Box::new(self.content_source()?))
            .batch(Box::new(self.batch_client()?))
            .build()?)
    }

    /// The batch back half: polling, claiming and merging.
    pub fn collect_pipeline(&self) -> Result<ideasieve::Pipeline> {
        Ok(self
            .builder()
            .batch(Box::new(self.batch_client()?))
            .embedder(Box::new(self.embedder()?))
            .index(Box::new(self.vector_index()))
            .records(Box::new(self.record_store()?))
            .build()?)
    }

    pub fn repair_pipeline(&self) -> Result<ideasieve::Pipeline> {
        Ok(self
            .builder()
            .index(Box::new(self.vector_index()))
            .records(Box::new(self.record_store()?))
            .build()?)
    }

    pub fn purge_pipeline(&self) -> Result<ideasieve::Pipeline> {
        Ok(self.builder().build()?)
    }
}
