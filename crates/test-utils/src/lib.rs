use anyhow::Result;
use async_trait::async_trait;
use ideasieve::batch::BatchTask;
use ideasieve::errors::ProviderError;
use ideasieve::ingest::{ContentSource, FeedSource, IngestError};
use ideasieve::providers::ai::{BatchExtractor, BatchPoll, Embedder, IdeaExtractor};
use ideasieve::providers::db::{SqliteProvider, SqliteVectorIndex, VectorIndex};
use ideasieve::providers::RecordStore;
use ideasieve::types::{
    DisplayRecord, IdeaDraft, IdeaMetadata, PageContent, SourceInfo, VectorEntry, VectorMatch,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use turso::Database;

/// Embedding width used by the in-memory test index.
pub const TEST_DIMENSION: usize = 3;

// --- Test Setup ---

/// A helper struct to manage database creation for each test.
pub struct TestSetup {
    pub db: Database,
    pub provider: SqliteProvider,
    pub index: SqliteVectorIndex,
}

impl TestSetup {
    /// Creates a new, isolated in-memory database with the ledger, batch-job and vector
    /// tables in place.
    pub async fn new() -> Result<Self> {
        let db = turso::Builder::new_local(":memory:").build().await?;
        let provider = SqliteProvider::from_database(db.clone());
        provider.initialize_schema().await?;
        let index = SqliteVectorIndex::new(db.clone(), TEST_DIMENSION);
        index.ensure_index().await?;
        Ok(Self {
            db,
            provider,
            index,
        })
    }
}

// --- Fixtures ---

/// A complete raw draft as an extraction service would return it.
pub fn raw_draft(title: &str, problem: &str, solution: &str) -> Value {
    json!({
        "title": title,
        "type": "Startup",
        "problemStatement": problem,
        "solution": solution,
        "targetAudience": "Small businesses",
        "innovationScore": 7,
        "potentialApplications": "Retail, logistics",
        "prerequisites": "Cloud account",
        "additionalNotes": ""
    })
}

/// Metadata for an idea stored with `count`.
pub fn idea_metadata(title: &str, count: u32) -> IdeaMetadata {
    IdeaMetadata {
        draft: IdeaDraft {
            title: title.to_string(),
            category: "Startup".to_string(),
            problem_statement: format!("{title} problem"),
            solution: format!("{title} solution"),
            target_audience: "Small businesses".to_string(),
            innovation_score: 7.0,
            potential_applications: String::new(),
            prerequisites: String::new(),
            additional_notes: String::new(),
        },
        source_fingerprint: None,
        count,
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| (*x as f64) * (*y as f64)).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

// --- Mock Embedder ---

/// Returns programmed vectors keyed by a substring of the embedded text.
#[derive(Clone, Debug, Default)]
pub struct MockEmbedder {
    responses: Arc<Mutex<Vec<(String, Option<Vec<f32>>)>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Texts containing `key` embed to `vector`.
    pub fn add_vector(&self, key: &str, vector: Vec<f32>) {
        self.responses
            .lock()
            .unwrap()
            .push((key.to_string(), Some(vector)));
    }

    /// Texts containing `key` get an empty answer (`Ok(None)`).
    pub fn add_empty(&self, key: &str) {
        self.responses.lock().unwrap().push((key.to_string(), None));
    }

    pub fn get_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>, ProviderError> {
        self.calls.lock().unwrap().push(text.to_string());
        let responses = self.responses.lock().unwrap();
        for (key, vector) in responses.iter() {
            if text.contains(key.as_str()) {
                return Ok(vector.clone());
            }
        }
        Err(ProviderError::AiApi(format!(
            "MockEmbedder: no vector programmed for '{text}'"
        )))
    }
}

// --- Mock Vector Index ---

#[derive(Debug, Clone)]
struct StoredVector {
    id: String,
    metadata: IdeaMetadata,
    vector: Vec<f32>,
}

/// An in-memory vector index with switchable failures and result ordering.
#[derive(Clone, Debug, Default)]
pub struct MockVectorIndex {
    entries: Arc<Mutex<Vec<StoredVector>>>,
    fail_writes: Arc<AtomicBool>,
    fail_queries: Arc<AtomicBool>,
    fail_ensure: Arc<AtomicBool>,
    ascending: Arc<AtomicBool>,
    writes: Arc<Mutex<Vec<String>>>,
}

impl MockVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: &str, metadata: IdeaMetadata, vector: Vec<f32>) {
        self.entries.lock().unwrap().push(StoredVector {
            id: id.to_string(),
            metadata,
            vector,
        });
    }

    /// Makes `upsert` and `update_metadata` fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// Makes `ensure_index` fail, as an unreachable index would.
    pub fn set_fail_ensure_index(&self, fail: bool) {
        self.fail_ensure.store(fail, Ordering::SeqCst);
    }

    /// Returns query results lowest score first instead of highest first.
    pub fn set_ascending_results(&self, ascending: bool) {
        self.ascending.store(ascending, Ordering::SeqCst);
    }

    pub fn count_of(&self, id: &str) -> Option<u32> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.metadata.count)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of every successful write, in order.
    pub fn get_writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    fn check_write(&self) -> Result<(), ProviderError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ProviderError::StorageOperationFailed(
                "MockVectorIndex: write failure injected".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for MockVectorIndex {
    async fn ensure_index(&self) -> Result<(), ProviderError> {
        if self.fail_ensure.load(Ordering::SeqCst) {
            return Err(ProviderError::StorageConnection(
                "MockVectorIndex: ensure_index failure injected".to_string(),
            ));
        }
        Ok(())
    }

    async fn upsert(
        &self,
        id: &str,
        metadata: &IdeaMetadata,
        vector: &[f32],
    ) -> Result<(), ProviderError> {
        self.check_write()?;
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|e| e.id != id);
        entries.push(StoredVector {
            id: id.to_string(),
            metadata: metadata.clone(),
            vector: vector.to_vec(),
        });
        self.writes.lock().unwrap().push(id.to_string());
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<VectorMatch>, ProviderError> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(ProviderError::StorageOperationFailed(
                "MockVectorIndex: query failure injected".to_string(),
            ));
        }
        let mut matches: Vec<VectorMatch> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .map(|e| VectorMatch {
                id: e.id.clone(),
                score: cosine(vector, &e.vector),
                metadata: e.metadata.clone(),
            })
            .collect();
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(top_k);
        if self.ascending.load(Ordering::SeqCst) {
            matches.reverse();
        }
        Ok(matches)
    }

    async fn update_metadata(
        &self,
        id: &str,
        metadata: &IdeaMetadata,
    ) -> Result<(), ProviderError> {
        self.check_write()?;
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.iter_mut().find(|e| e.id == id).ok_or_else(|| {
            ProviderError::StorageOperationFailed(format!("MockVectorIndex: no entry '{id}'"))
        })?;
        entry.metadata = metadata.clone();
        self.writes.lock().unwrap().push(id.to_string());
        Ok(())
    }

    async fn fetch(&self, id: &str) -> Result<Option<VectorEntry>, ProviderError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id == id)
            .map(|e| VectorEntry {
                id: e.id.clone(),
                metadata: e.metadata.clone(),
            }))
    }

    async fn list_entries(&self) -> Result<Vec<VectorEntry>, ProviderError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .map(|e| VectorEntry {
                id: e.id.clone(),
                metadata: e.metadata.clone(),
            })
            .collect())
    }
}

// --- Mock Record Store ---

#[derive(Debug, Clone, PartialEq)]
pub struct MockRecord {
    pub record_id: String,
    pub title: String,
    pub count: u32,
    pub source: SourceInfo,
}

/// An in-memory record store that logs every call.
#[derive(Clone, Debug, Default)]
pub struct MockRecordStore {
    records: Arc<Mutex<Vec<MockRecord>>>,
    calls: Arc<Mutex<Vec<String>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MockRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, title: &str, count: u32) {
        let mut records = self.records.lock().unwrap();
        let record_id = format!("record-{}", records.len() + 1);
        records.push(MockRecord {
            record_id,
            title: title.to_string(),
            count,
            source: SourceInfo::default(),
        });
    }

    /// Makes `create` and `update_count` fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn count_of(&self, title: &str) -> Option<u32> {
        self.find(title).map(|r| r.count)
    }

    pub fn find(&self, title: &str) -> Option<MockRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.title == title)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls in order, e.g. `find:Title`, `create:Title`, `update:record-1=2`.
    pub fn get_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Write calls only.
    pub fn get_writes(&self) -> Vec<String> {
        self.get_calls()
            .into_iter()
            .filter(|c| !c.starts_with("find:"))
            .collect()
    }

    fn check_write(&self) -> Result<(), ProviderError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ProviderError::RecordStore(
                "MockRecordStore: write failure injected".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MockRecordStore {
    async fn find_by_title(&self, title: &str) -> Result<Option<DisplayRecord>, ProviderError> {
        self.calls.lock().unwrap().push(format!("find:{title}"));
        Ok(self.find(title).map(|r| DisplayRecord {
            record_id: r.record_id,
            title: r.title,
            count: Some(r.count),
        }))
    }

    async fn create(
        &self,
        metadata: &IdeaMetadata,
        source: &SourceInfo,
    ) -> Result<(), ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("create:{}", metadata.draft.title));
        self.check_write()?;
        let mut records = self.records.lock().unwrap();
        let record_id = format!("record-{}", records.len() + 1);
        records.push(MockRecord {
            record_id,
            title: metadata.draft.title.clone(),
            count: metadata.count,
            source: source.clone(),
        });
        Ok(())
    }

    async fn update_count(&self, record_id: &str, count: u32) -> Result<(), ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("update:{record_id}={count}"));
        self.check_write()?;
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.record_id == record_id)
            .ok_or_else(|| ProviderError::RecordStore(format!("no record '{record_id}'")))?;
        record.count = count;
        Ok(())
    }
}

// --- Mock Extractor ---

/// Returns programmed drafts keyed by a substring of the article text.
#[derive(Clone, Debug, Default)]
pub struct MockExtractor {
    responses: Arc<Mutex<Vec<(String, Result<Vec<Value>, String>)>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_drafts(&self, key: &str, drafts: Vec<Value>) {
        self.responses
            .lock()
            .unwrap()
            .push((key.to_string(), Ok(drafts)));
    }

    pub fn add_failure(&self, key: &str, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .push((key.to_string(), Err(message.to_string())));
    }

    pub fn get_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdeaExtractor for MockExtractor {
    async fn extract(&self, content: &str, _prompt: &str) -> Result<Vec<Value>, ProviderError> {
        self.calls.lock().unwrap().push(content.to_string());
        let responses = self.responses.lock().unwrap();
        for (key, response) in responses.iter() {
            if content.contains(key.as_str()) {
                return response.clone().map_err(ProviderError::AiApi);
            }
        }
        Ok(Vec::new())
    }
}

// --- Mock Feed & Content Sources ---

#[derive(Clone, Debug, Default)]
pub struct MockFeedSource {
    links: Arc<Mutex<Vec<String>>>,
}

impl MockFeedSource {
    pub fn new<S: AsRef<str>>(links: &[S]) -> Self {
        Self {
            links: Arc::new(Mutex::new(
                links.iter().map(|l| l.as_ref().to_string()).collect(),
            )),
        }
    }

    pub fn set_links<S: AsRef<str>>(&self, links: &[S]) {
        *self.links.lock().unwrap() = links.iter().map(|l| l.as_ref().to_string()).collect();
    }
}

#[async_trait]
impl FeedSource for MockFeedSource {
    async fn discover_links(&self) -> Result<Vec<String>, IngestError> {
        Ok(self.links.lock().unwrap().clone())
    }
}

/// Serves programmed pages; unknown URLs fail to fetch.
#[derive(Clone, Debug, Default)]
pub struct MockContentSource {
    pages: Arc<Mutex<HashMap<String, PageContent>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockContentSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_page(&self, url: &str, title: &str, text: &str) {
        self.pages.lock().unwrap().insert(
            url.to_string(),
            PageContent {
                url: url.to_string(),
                title: title.to_string(),
                text: text.to_string(),
            },
        );
    }

    pub fn get_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentSource for MockContentSource {
    async fn fetch_content(&self, url: &str) -> Result<PageContent, IngestError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.pages
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| IngestError::Fetch(format!("MockContentSource: no page for {url}")))
    }
}

// --- Mock Batch Extractor ---

#[derive(Clone, Debug)]
pub struct MockBatchExtractor {
    job_id: String,
    poll_result: Arc<Mutex<BatchPoll>>,
    submitted: Arc<Mutex<Vec<Vec<BatchTask>>>>,
    polls: Arc<Mutex<Vec<String>>>,
}

impl MockBatchExtractor {
    /// Every submission returns `job_id`; polls report `Pending` until told otherwise.
    pub fn new(job_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            poll_result: Arc::new(Mutex::new(BatchPoll::Pending("in_progress".to_string()))),
            submitted: Arc::new(Mutex::new(Vec::new())),
            polls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn set_poll_result(&self, result: BatchPoll) {
        *self.poll_result.lock().unwrap() = result;
    }

    pub fn get_submissions(&self) -> Vec<Vec<BatchTask>> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn get_polls(&self) -> Vec<String> {
        self.polls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BatchExtractor for MockBatchExtractor {
    async fn submit(&self, tasks: &[BatchTask]) -> Result<String, ProviderError> {
        self.submitted.lock().unwrap().push(tasks.to_vec());
        Ok(self.job_id.clone())
    }

    async fn poll(&self, job_id: &str) -> Result<BatchPoll, ProviderError> {
        self.polls.lock().unwrap().push(job_id.to_string());
        Ok(self.poll_result.lock().unwrap().clone())
    }
}

/// Builds one line of a batch result file carrying `drafts` for `custom_id`.
pub fn batch_result_line(custom_id: &str, drafts: &[Value]) -> String {
    let content = json!({ "output": drafts }).to_string();
    json!({
        "id": format!("batch_req_{custom_id}"),
        "custom_id": custom_id,
        "response": {
            "status_code": 200,
            "body": {
                "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
            }
        }
    })
    .to_string()
}

/// Timestamp helper for ledger fixtures.
pub fn days_ago(days: i64) -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now() - chrono::Duration::days(days)
}
