//! # Pipeline Orchestration
//!
//! Wires the collaborators (feeds, page content, extraction, embeddings, the vector
//! index, the record store, the ledger and the batch-job table) into the operations the
//! CLI exposes. Every collaborator is injected, so tests can substitute doubles.
//!
//! Per-item failures (a page that will not load, an idea the model got wrong, an
//! embedding that did not come back, a vector write that failed) are counted in the
//! `RunSummary` and never abort the run. Only setup failures and failures of the ledger
//! or batch-job table are returned as errors.

use crate::{
    batch::{parse_batch_results, BatchTask},
    constants::EXTRACTION_TEMPERATURE,
    dedup::{
        filter_against_ledger, normalize_all, CandidateUrl, ReconcileOutcome, Reconciler,
        RepairReport, SimilarityResolver,
    },
    errors::ProviderError,
    ingest::{ContentSource, FeedSource, IngestError},
    prompts::IDEA_EXTRACTION_SYSTEM_PROMPT,
    providers::{
        ai::{BatchExtractor, BatchPoll, Embedder, IdeaExtractor},
        db::{BatchJobStore, Ledger, VectorIndex},
        RecordStore,
    },
    types::{ExtractedDrafts, PageContent, SeenUrlRecord},
};
use chrono::{Duration, Utc};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("the pipeline was built without a {0}")]
    MissingService(&'static str),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Ingest(#[from] IngestError),
}

/// Counters reported at the end of every run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub urls_found: usize,
    pub urls_unique: usize,
    pub urls_new: usize,
    pub pages_fetched: usize,
    pub page_failures: usize,
    pub extraction_failures: usize,
    pub batch_lines_rejected: usize,
    pub ideas_extracted: usize,
    pub ideas_rejected: usize,
    pub embedding_failures: usize,
    pub query_failures: usize,
    pub ideas_merged: usize,
    pub ideas_created: usize,
    pub mirror_failures: usize,
    pub vector_failures: usize,
    /// Titles whose vector-index write failed.
    pub failed_titles: Vec<String>,
    /// The batch job submitted or collected by this run.
    pub job_id: Option<String>,
}

impl RunSummary {
    pub fn has_vector_failures(&self) -> bool {
        self.vector_failures > 0
    }

    fn log(&self) {
        info!(
            urls_found = self.urls_found,
            urls_unique = self.urls_unique,
            urls_new = self.urls_new,
            pages_fetched = self.pages_fetched,
            ideas_extracted = self.ideas_extracted,
            ideas_rejected = self.ideas_rejected,
            ideas_merged = self.ideas_merged,
            ideas_created = self.ideas_created,
            embedding_failures = self.embedding_failures,
            mirror_failures = self.mirror_failures,
            vector_failures = self.vector_failures,
            "Run summary"
        );
    }
}

/// What `collect_batch` found.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectStatus {
    NoJob,
    AlreadyProcessed(String),
    Pending { job_id: String, status: String },
    Failed { job_id: String, status: String },
    Processed(RunSummary),
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub resolver: SimilarityResolver,
    pub prompt: String,
    /// Model name written into batch tasks.
    pub batch_model: String,
    pub temperature: f32,
    /// Caps how many new URLs one run processes.
    pub max_urls: Option<usize>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            resolver: SimilarityResolver::default(),
            prompt: IDEA_EXTRACTION_SYSTEM_PROMPT.to_string(),
            batch_model: "gpt-4o".to_string(),
            temperature: EXTRACTION_TEMPERATURE,
            max_urls: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct PipelineBuilder {
    feeds: Option<Box<dyn FeedSource>>,
    content: Option<Box<dyn ContentSource>>,
    ledger: Option<Box<dyn Ledger>>,
    jobs: Option<Box<dyn BatchJobStore>>,
    extractor: Option<Box<dyn IdeaExtractor>>,
    batch: Option<Box<dyn BatchExtractor>>,
    embedder: Option<Box<dyn Embedder>>,
    index: Option<Box<dyn VectorIndex>>,
    records: Option<Box<dyn RecordStore>>,
    options: PipelineOptions,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feeds(mut self, feeds: Box<dyn FeedSource>) -> Self {
        self.feeds = Some(feeds);
        self
    }

    pub fn content(mut self, content: Box<dyn ContentSource>) -> Self {
        self.content = Some(content);
        self
    }

    pub fn ledger(mut self, ledger: Box<dyn Ledger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn jobs(mut self, jobs: Box<dyn BatchJobStore>) -> Self {
        self.jobs = Some(jobs);
        self
    }

    pub fn extractor(mut self, extractor: Box<dyn IdeaExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn batch(mut self, batch: Box<dyn BatchExtractor>) -> Self {
        self.batch = Some(batch);
        self
    }

    pub fn embedder(mut self, embedder: Box<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn index(mut self, index: Box<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn records(mut self, records: Box<dyn RecordStore>) -> Self {
        self.records = Some(records);
        self
    }

    pub fn options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// The ledger is the only service every operation needs; the rest are checked by
    /// the operation that uses them.
    pub fn build(self) -> Result<Pipeline, PipelineError> {
        let ledger = self.ledger.ok_or(PipelineError::MissingService("ledger"))?;
        Ok(Pipeline {
            feeds: self.feeds,
            content: self.content,
            ledger,
            jobs: self.jobs,
            extractor: self.extractor,
            batch: self.batch,
            embedder: self.embedder,
            index: self.index,
            records: self.records,
            options: self.options,
        })
    }
}

#[derive(Debug)]
pub struct Pipeline {
    feeds: Option<Box<dyn FeedSource>>,
    content: Option<Box<dyn ContentSource>>,
    ledger: Box<dyn Ledger>,
    jobs: Option<Box<dyn BatchJobStore>>,
    extractor: Option<Box<dyn IdeaExtractor>>,
    batch: Option<Box<dyn BatchExtractor>>,
    embedder: Option<Box<dyn Embedder>>,
    index: Option<Box<dyn VectorIndex>>,
    records: Option<Box<dyn RecordStore>>,
    options: PipelineOptions,
}

fn require<'a, T: ?Sized>(
    service: &'a Option<Box<T>>,
    name: &'static str,
) -> Result<&'a T, PipelineError> {
    service
        .as_deref()
        .ok_or(PipelineError::MissingService(name))
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    fn reconciler(&self) -> Result<Reconciler, PipelineError> {
        let index = require(&self.index, "vector index")?;
        let records = require(&self.records, "record store")?;
        Ok(
            Reconciler::new(dyn_clone::clone_box(index), dyn_clone::clone_box(records))
                .with_ledger(self.ledger.clone()),
        )
    }

    /// Synchronous mode: discover, fetch, extract and reconcile in one invocation.
    ///
    /// Nothing is recorded in the batch-job table, so `collect_batch` keeps seeing the
    /// latest submitted batch job.
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        let extractor = require(&self.extractor, "idea extractor")?;
        require(&self.embedder, "embedder")?;
        let index = require(&self.index, "vector index")?;
        let reconciler = self.reconciler()?;
        index.ensure_index().await?;

        let mut summary = RunSummary::default();
        let articles = self.gather_articles(&mut summary).await?;

        let mut extracted = Vec::with_capacity(articles.len());
        for (candidate, page) in &articles {
            match extractor.extract(&page.text, &self.options.prompt).await {
                Ok(drafts) => {
                    info!("Extracted {} idea drafts from {}", drafts.len(), candidate.url);
                    extracted.push(ExtractedDrafts {
                        url_fingerprint: Some(candidate.fingerprint.clone()),
                        drafts,
                    });
                }
                Err(e) => {
                    warn!("Extraction failed for {}: {e}", candidate.url);
                    summary.extraction_failures += 1;
                }
            }
        }

        self.process_ideas(&extracted, &reconciler, &mut summary).await;
        summary.log();
        Ok(summary)
    }

    /// Batch mode, first half: discover and fetch, then submit one extraction job and
    /// remember its id.
    pub async fn submit_batch(&self) -> Result<RunSummary, PipelineError> {
        let batch = require(&self.batch, "batch extractor")?;
        let jobs = require(&self.jobs, "batch job store")?;

        let mut summary = RunSummary::default();
        let articles = self.gather_articles(&mut summary).await?;

        let tasks: Vec<BatchTask> = articles
            .iter()
            .map(|(candidate, page)| {
                BatchTask::new(
                    &candidate.fingerprint,
                    &self.options.batch_model,
                    self.options.temperature,
                    &self.options.prompt,
                    &page.text,
                )
            })
            .collect();

        if tasks.is_empty() {
            info!("No new articles; nothing to submit.");
            summary.log();
            return Ok(summary);
        }

        let job_id = batch.submit(&tasks).await?;
        jobs.record_job(&job_id).await?;
        info!("Submitted batch job {job_id} with {} tasks.", tasks.len());
        summary.job_id = Some(job_id);
        summary.log();
        Ok(summary)
    }

    /// Batch mode, second half: process the results of the latest job exactly once.
    pub async fn collect_batch(&self) -> Result<CollectStatus, PipelineError> {
        let batch = require(&self.batch, "batch extractor")?;
        let jobs = require(&self.jobs, "batch job store")?;
        require(&self.embedder, "embedder")?;
        let index = require(&self.index, "vector index")?;
        let reconciler = self.reconciler()?;

        let Some(job) = jobs.latest_job().await? else {
            info!("No batch jobs recorded.");
            return Ok(CollectStatus::NoJob);
        };
        let job_id = job.job_id;

        if jobs.is_claimed(&job_id).await? {
            info!("Batch job {job_id} was already processed.");
            return Ok(CollectStatus::AlreadyProcessed(job_id));
        }

        let jsonl = match batch.poll(&job_id).await? {
            BatchPoll::Completed(jsonl) => jsonl,
            BatchPoll::Pending(status) => {
                info!("Batch job {job_id} is not finished yet (status: {status}).");
                return Ok(CollectStatus::Pending { job_id, status });
            }
            BatchPoll::Failed(status) => {
                error!("Batch job {job_id} ended without results (status: {status}).");
                return Ok(CollectStatus::Failed { job_id, status });
            }
        };

        // Everything fallible runs before the claim; once claimed, the results are processed.
        index.ensure_index().await?;
        if !jobs.claim_job(&job_id).await? {
            info!("Batch job {job_id} was claimed by another invocation.");
            return Ok(CollectStatus::AlreadyProcessed(job_id));
        }

        let parsed = parse_batch_results(&jsonl);
        let mut summary = RunSummary {
            batch_lines_rejected: parsed.rejected_lines,
            job_id: Some(job_id),
            ..Default::default()
        };
        self.process_ideas(&parsed.extracted, &reconciler, &mut summary)
            .await;
        summary.log();
        Ok(CollectStatus::Processed(summary))
    }

    /// Rewrites the record store from the vector index.
    pub async fn repair(&self) -> Result<RepairReport, PipelineError> {
        let reconciler = self.reconciler()?;
        Ok(reconciler.repair().await?)
    }

    /// Removes ledger records older than `retention`.
    pub async fn purge(&self, retention: Duration) -> Result<u64, PipelineError> {
        Ok(self.ledger.purge_older_than(retention).await?)
    }

    /// Discovers links, filters them, fetches each page, and records the fetched ones
    /// in the ledger.
    async fn gather_articles(
        &self,
        summary: &mut RunSummary,
    ) -> Result<Vec<(CandidateUrl, PageContent)>, PipelineError> {
        let feeds = require(&self.feeds, "feed source")?;
        let content = require(&self.content, "content source")?;

        let links = feeds.discover_links().await?;
        let filtered = filter_against_ledger(&links, self.ledger.as_ref()).await?;
        summary.urls_found = filtered.found;
        summary.urls_unique = filtered.unique();
        summary.urls_new = filtered.urls.len();

        let mut candidates = filtered.urls;
        if let Some(max) = self.options.max_urls {
            if candidates.len() > max {
                info!("Processing the first {max} of {} new URLs.", candidates.len());
                candidates.truncate(max);
            }
        }

        let mut articles = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match content.fetch_content(&candidate.url).await {
                Ok(page) => articles.push((candidate, page)),
                Err(e) => {
                    warn!("Skipping {}: {e}", candidate.url);
                    summary.page_failures += 1;
                }
            }
        }
        summary.pages_fetched = articles.len();

        let now = Utc::now();
        let records: Vec<SeenUrlRecord> = articles
            .iter()
            .map(|(candidate, page)| SeenUrlRecord {
                fingerprint: candidate.fingerprint.clone(),
                url: candidate.url.clone(),
                title: page.title.clone(),
                discovered_at: now,
            })
            .collect();
        self.ledger.bulk_insert(&records).await?;

        Ok(articles)
    }

    /// Normalize → embed → resolve → reconcile, one idea at a time.
    async fn process_ideas(
        &self,
        extracted: &[ExtractedDrafts],
        reconciler: &Reconciler,
        summary: &mut RunSummary,
    ) {
        // Both were checked by the calling operation.
        let (Some(embedder), Some(index)) = (self.embedder.as_deref(), self.index.as_deref())
        else {
            return;
        };

        let normalized = normalize_all(extracted);
        summary.ideas_extracted += normalized.ideas.len() + normalized.rejected;
        summary.ideas_rejected += normalized.rejected;

        for mut idea in normalized.ideas {
            let embedding = match embedder.embed(&idea.embedding_text()).await {
                Ok(Some(vector)) => vector,
                Ok(None) => {
                    warn!(title = %idea.title(), "Skipping idea: no embedding returned");
                    summary.embedding_failures += 1;
                    continue;
                }
                Err(e) => {
                    warn!(title = %idea.title(), "Skipping idea: embedding failed: {e}");
                    summary.embedding_failures += 1;
                    continue;
                }
            };
            idea.embedding = embedding;

            let decision = match self
                .options
                .resolver
                .resolve(index, &idea.embedding)
                .await
            {
                Ok(decision) => decision,
                Err(e) => {
                    warn!(title = %idea.title(), "Skipping idea: similarity query failed: {e}");
                    summary.query_failures += 1;
                    continue;
                }
            };

            match reconciler.apply(&idea, decision).await {
                Ok(outcome) => {
                    if !outcome.mirrored() {
                        summary.mirror_failures += 1;
                    }
                    match outcome {
                        ReconcileOutcome::Merged { .. } => summary.ideas_merged += 1,
                        ReconcileOutcome::Created { .. } => summary.ideas_created += 1,
                    }
                }
                Err(e) => {
                    error!(title = %idea.title(), "Reconciliation aborted: {e}");
                    summary.vector_failures += 1;
                    summary.failed_titles.push(idea.title().to_string());
                }
            }
        }
    }
}
