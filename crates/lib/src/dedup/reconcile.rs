//! # Count Reconciliation & Sync
//!
//! Applies a resolver decision to the two stores. The vector index holds the
//! authoritative occurrence count and is always written first; the record store is a
//! best-effort mirror that is told the new count, never asked to increment its own.
//!
//! A failed vector write aborts the idea and is returned to the caller. A failed
//! record-store write is logged and left for `repair`, which rewrites every mirrored
//! record from the vector index.
//!
//! Resolve-then-apply is not atomic across processes. Two concurrent runs can both decide
//! that an idea is new. Entries are keyed by title, so the later insert overwrites the
//! earlier one instead of duplicating it, and one occurrence can be lost.

use crate::{
    errors::ProviderError,
    providers::{
        db::{Ledger, VectorIndex},
        RecordStore,
    },
    types::{Decision, Idea, IdeaMetadata, SourceInfo, VectorEntry},
};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("vector index write failed for '{title}': {source}")]
    VectorWrite {
        title: String,
        #[source]
        source: ProviderError,
    },
    #[error("embedding missing for '{0}'")]
    MissingEmbedding(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    Merged {
        id: String,
        count: u32,
        mirrored: bool,
    },
    Created {
        id: String,
        mirrored: bool,
    },
}

impl ReconcileOutcome {
    pub fn mirrored(&self) -> bool {
        match self {
            ReconcileOutcome::Merged { mirrored, .. } | ReconcileOutcome::Created { mirrored, .. } => {
                *mirrored
            }
        }
    }
}

/// Counts from one repair pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct Reconciler {
    index: Box<dyn VectorIndex>,
    records: Box<dyn RecordStore>,
    ledger: Option<Box<dyn Ledger>>,
}

impl Reconciler {
    pub fn new(index: Box<dyn VectorIndex>, records: Box<dyn RecordStore>) -> Self {
        Self {
            index,
            records,
            ledger: None,
        }
    }

    /// Enables source metadata (URL, title, date) on newly created display records.
    pub fn with_ledger(mut self, ledger: Box<dyn Ledger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Applies `decision` for `idea`, whose embedding must already be set.
    pub async fn apply(
        &self,
        idea: &Idea,
        decision: Decision,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        match decision {
            Decision::Merge(matched) => {
                info!(
                    title = %idea.title(),
                    matched = %matched.id,
                    score = matched.score,
                    "Merging into existing idea"
                );
                self.merge(matched.id, matched.metadata).await
            }
            Decision::New => self.create(idea).await,
        }
    }

    /// `matched` is the metadata the query returned; the stored entry is re-read so the
    /// increment starts from the count the index holds now.
    async fn merge(
        &self,
        id: String,
        matched: IdeaMetadata,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let mut metadata = match self.index.fetch(&id).await {
            Ok(Some(entry)) => entry.metadata,
            Ok(None) => {
                warn!(id = %id, "Matched entry vanished before merge; using query metadata");
                matched
            }
            Err(e) => {
                warn!(id = %id, "Could not re-read matched entry, using query metadata: {e}");
                matched
            }
        };
        metadata.count += 1;

        if let Err(source) = self.index.update_metadata(&id, &metadata).await {
            error!(id = %id, "Vector index metadata update failed: {source}");
            return Err(ReconcileError::VectorWrite { title: id, source });
        }

        let mirrored = self.mirror_count(&metadata.draft.title, metadata.count).await;
        Ok(ReconcileOutcome::Merged {
            id,
            count: metadata.count,
            mirrored,
        })
    }

    async fn create(&self, idea: &Idea) -> Result<ReconcileOutcome, ReconcileError> {
        if idea.embedding.is_empty() {
            return Err(ReconcileError::MissingEmbedding(idea.title().to_string()));
        }
        let id = idea.title().to_string();

        // Titles are identity keys: an entry with this title that was not similar
        // enough to match still owns the count, so fold into it instead of resetting it.
        match self.index.fetch(&id).await {
            Ok(Some(VectorEntry { id, metadata })) => {
                warn!(title = %id, "Title already indexed under a dissimilar embedding; merging by title");
                return self.merge(id, metadata).await;
            }
            Ok(None) => {}
            Err(e) => warn!(title = %id, "Could not check for an existing entry: {e}"),
        }

        let mut metadata = idea.metadata();
        metadata.count = 1;

        if let Err(source) = self.index.upsert(&id, &metadata, &idea.embedding).await {
            error!(title = %id, "Vector index upsert failed: {source}");
            return Err(ReconcileError::VectorWrite { title: id, source });
        }
        info!(title = %id, "Stored new idea");

        let mirrored = self.mirror_new(&metadata).await;
        Ok(ReconcileOutcome::Created { id, mirrored })
    }

    /// Creates the display record for a new entry, or resets the count of a record left
    /// behind under the same title so the store never holds two records for one title.
    async fn mirror_new(&self, metadata: &IdeaMetadata) -> bool {
        let title = &metadata.draft.title;
        match self.records.find_by_title(title).await {
            Ok(Some(record)) => {
                warn!(title = %title, "Display record already exists; overwriting its count");
                match self.records.update_count(&record.record_id, metadata.count).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(title = %title, "Record store count update failed, mirror is behind: {e}");
                        false
                    }
                }
            }
            Ok(None) => {
                let source = self.source_info(metadata).await;
                match self.records.create(metadata, &source).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(title = %title, "Record store create failed, mirror is behind: {e}");
                        false
                    }
                }
            }
            Err(e) => {
                warn!(title = %title, "Record store lookup failed, mirror is behind: {e}");
                false
            }
        }
    }

    /// Sets the mirrored count for `title`. Returns whether the mirror now matches.
    async fn mirror_count(&self, title: &str, count: u32) -> bool {
        match self.records.find_by_title(title).await {
            Ok(Some(record)) => match self.records.update_count(&record.record_id, count).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(title = %title, "Record store count update failed, mirror is behind: {e}");
                    false
                }
            },
            Ok(None) => {
                warn!(title = %title, "No display record to update; repair will create it");
                false
            }
            Err(e) => {
                warn!(title = %title, "Record store lookup failed, mirror is behind: {e}");
                false
            }
        }
    }

    async fn source_info(&self, metadata: &IdeaMetadata) -> SourceInfo {
        let (Some(ledger), Some(fp)) = (&self.ledger, &metadata.source_fingerprint) else {
            return SourceInfo::default();
        };
        match ledger.find(fp).await {
            Ok(Some(record)) => record.into(),
            Ok(None) => SourceInfo::default(),
            Err(e) => {
                warn!("Could not load source metadata for {fp}: {e}");
                SourceInfo::default()
            }
        }
    }

    /// Rewrites the record store from the vector index: creates missing display records
    /// and overwrites counts that differ. Running it twice in a row performs no writes
    /// the second time.
    pub async fn repair(&self) -> Result<RepairReport, ProviderError> {
        let entries = self.index.list_entries().await?;
        info!("Repairing record store against {} indexed ideas.", entries.len());
        let mut report = RepairReport::default();

        for entry in entries {
            let metadata = entry.metadata;
            let title = metadata.draft.title.clone();
            match self.records.find_by_title(&title).await {
                Ok(Some(record)) if record.count == Some(metadata.count) => report.unchanged += 1,
                Ok(Some(record)) => {
                    match self.records.update_count(&record.record_id, metadata.count).await {
                        Ok(()) => {
                            info!(title = %title, "Mirror count {:?} -> {}", record.count, metadata.count);
                            report.updated += 1;
                        }
                        Err(e) => {
                            warn!(title = %title, "Repair update failed: {e}");
                            report.failed += 1;
                        }
                    }
                }
                Ok(None) => {
                    let source = self.source_info(&metadata).await;
                    match self.records.create(&metadata, &source).await {
                        Ok(()) => {
                            info!(title = %title, "Created missing display record");
                            report.created += 1;
                        }
                        Err(e) => {
                            warn!(title = %title, "Repair create failed: {e}");
                            report.failed += 1;
                        }
                    }
                }
                Err(e) => {
                    warn!(title = %title, "Repair lookup failed: {e}");
                    report.failed += 1;
                }
            }
        }

        info!(
            "Repair finished: {} created, {} updated, {} unchanged, {} failed.",
            report.created, report.updated, report.unchanged, report.failed
        );
        Ok(report)
    }
}

