use crate::errors::ProviderError;
use crate::types::{
    BatchJobRecord, IdeaMetadata, SeenUrlRecord, UrlFingerprint, VectorEntry, VectorMatch,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dyn_clone::DynClone;
use std::collections::HashSet;
use std::fmt::Debug;

/// Per-call summary of a ledger bulk insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkInsertOutcome {
    pub inserted: usize,
    pub duplicates: usize,
}

/// Persistent store of URL fingerprints already handed to the pipeline.
///
/// Entries are inserted once and never updated; the only deletion path is purge.
#[async_trait]
pub trait Ledger: Send + Sync + Debug + DynClone {
    async fn fetch_all_fingerprints(&self) -> Result<HashSet<UrlFingerprint>, ProviderError>;

    /// Inserts records, skipping (and logging) any whose fingerprint already exists.
    async fn bulk_insert(
        &self,
        records: &[SeenUrlRecord],
    ) -> Result<BulkInsertOutcome, ProviderError>;

    /// Deletes records discovered strictly before `cutoff`. Returns the number removed.
    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, ProviderError>;

    /// Deletes records older than `retention`, measured from now.
    async fn purge_older_than(&self, retention: Duration) -> Result<u64, ProviderError> {
        self.purge_before(Utc::now() - retention).await
    }

    async fn find(
        &self,
        fingerprint: &UrlFingerprint,
    ) -> Result<Option<SeenUrlRecord>, ProviderError>;
}

dyn_clone::clone_trait_object!(Ledger);

/// Append-only table of submitted batch jobs plus the set of jobs already processed.
#[async_trait]
pub trait BatchJobStore: Send + Sync + Debug + DynClone {
    async fn record_job(&self, job_id: &str) -> Result<BatchJobRecord, ProviderError>;

    /// The most recently created job, if any.
    async fn latest_job(&self) -> Result<Option<BatchJobRecord>, ProviderError>;

    async fn is_claimed(&self, job_id: &str) -> Result<bool, ProviderError>;

    /// Marks a job as processed. Returns `false` when another invocation already claimed it.
    async fn claim_job(&self, job_id: &str) -> Result<bool, ProviderError>;
}

dyn_clone::clone_trait_object!(BatchJobStore);

/// A nearest-neighbour index over idea embeddings, using cosine similarity.
#[async_trait]
pub trait VectorIndex: Send + Sync + Debug + DynClone {
    /// Provisions the index if it does not exist yet. Idempotent.
    async fn ensure_index(&self) -> Result<(), ProviderError>;

    /// Inserts or fully replaces the entry `id`.
    async fn upsert(
        &self,
        id: &str,
        metadata: &IdeaMetadata,
        vector: &[f32],
    ) -> Result<(), ProviderError>;

    /// Returns up to `top_k` matches with their similarity score and metadata.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<VectorMatch>, ProviderError>;

    /// Replaces all metadata of entry `id`, leaving its vector unchanged.
    async fn update_metadata(&self, id: &str, metadata: &IdeaMetadata)
        -> Result<(), ProviderError>;

    async fn fetch(&self, id: &str) -> Result<Option<VectorEntry>, ProviderError>;

    async fn list_entries(&self) -> Result<Vec<VectorEntry>, ProviderError>;
}

dyn_clone::clone_trait_object!(VectorIndex);
