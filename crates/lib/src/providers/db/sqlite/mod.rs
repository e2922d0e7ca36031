use crate::{
    errors::ProviderError,
    providers::db::storage::{BatchJobStore, BulkInsertOutcome, Ledger},
    types::{BatchJobRecord, SeenUrlRecord, UrlFingerprint},
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::{
    collections::HashSet,
    fmt::{self, Debug},
};
use tracing::{debug, info, warn};
use turso::{params, Database, Row, Value as TursoValue};

pub mod sql;
mod vector;

pub use vector::SqliteVectorIndex;

/// A provider for the pipeline's local state (seen-URL ledger and batch jobs), backed by Turso.
///
/// Cloning shares the same underlying `Database`, so a cloned provider sees the same
/// file or in-memory instance.
#[derive(Clone)]
pub struct SqliteProvider {
    pub db: Database,
}

impl SqliteProvider {
    /// Opens (or creates) the database at `db_path`. Use `":memory:"` for an isolated
    /// in-memory database; clone the provider to share it.
    pub async fn new(db_path: &str) -> Result<Self, ProviderError> {
        let db = turso::Builder::new_local(db_path)
            .build()
            .await
            .map_err(|e| ProviderError::StorageConnection(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| ProviderError::StorageConnection(e.to_string()))?;
        // PRAGMA returns a row, so it must go through `query`.
        conn.query("PRAGMA journal_mode=WAL;", ())
            .await
            .map_err(|e| ProviderError::StorageConnection(e.to_string()))?;

        Ok(Self { db })
    }

    /// Wraps an existing database handle.
    pub fn from_database(db: Database) -> Self {
        Self { db }
    }

    /// Ensures the ledger and batch-job tables exist. Safe to call on every start.
    pub async fn initialize_schema(&self) -> Result<(), ProviderError> {
        let conn = self
            .db
            .connect()
            .map_err(|e| ProviderError::StorageConnection(e.to_string()))?;

        for statement in sql::ALL_TABLE_CREATION_SQL {
            conn.execute(statement, ())
                .await
                .map_err(|e| ProviderError::StorageOperationFailed(e.to_string()))?;
        }
        Ok(())
    }

    fn connect(&self) -> Result<turso::Connection, ProviderError> {
        self.db
            .connect()
            .map_err(|e| ProviderError::StorageConnection(e.to_string()))
    }
}

impl Debug for SqliteProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteProvider").finish_non_exhaustive()
    }
}

/// Fixed-width RFC 3339 (microseconds, `Z` suffix).
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ProviderError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ProviderError::StorageOperationFailed(format!("bad timestamp '{raw}': {e}")))
}

pub(crate) fn text_at(row: &Row, idx: usize) -> Result<String, ProviderError> {
    match row.get_value(idx)? {
        TursoValue::Text(s) => Ok(s),
        TursoValue::Null => Ok(String::new()),
        other => Err(ProviderError::StorageOperationFailed(format!(
            "expected text in column {idx}, got {other:?}"
        ))),
    }
}

fn is_unique_violation(err: &turso::Error) -> bool {
    matches!(err, turso::Error::SqlExecutionFailure(msg) if msg.contains("UNIQUE constraint failed"))
}

fn seen_url_from_row(row: &Row) -> Result<SeenUrlRecord, ProviderError> {
    let fingerprint = text_at(row, 0)?;
    let fingerprint = UrlFingerprint::parse(&fingerprint).ok_or_else(|| {
        ProviderError::StorageOperationFailed(format!("malformed fingerprint '{fingerprint}'"))
    })?;
    Ok(SeenUrlRecord {
        fingerprint,
        url: text_at(row, 1)?,
        title: text_at(row, 2)?,
        discovered_at: parse_timestamp(&text_at(row, 3)?)?,
    })
}

#[async_trait]
impl Ledger for SqliteProvider {
    async fn fetch_all_fingerprints(&self) -> Result<HashSet<UrlFingerprint>, ProviderError> {
        let conn = self.connect()?;
        let mut rows = conn.query(sql::SELECT_ALL_FINGERPRINTS, ()).await?;
        let mut fingerprints = HashSet::new();
        while let Some(row) = rows.next().await? {
            let raw = text_at(&row, 0)?;
            match UrlFingerprint::parse(&raw) {
                Some(fp) => {
                    fingerprints.insert(fp);
                }
                None => warn!("Ignoring malformed fingerprint in ledger: {raw}"),
            }
        }
        debug!("Loaded {} fingerprints from the ledger.", fingerprints.len());
        Ok(fingerprints)
    }

    async fn bulk_insert(
        &self,
        records: &[SeenUrlRecord],
    ) -> Result<BulkInsertOutcome, ProviderError> {
        let mut outcome = BulkInsertOutcome::default();
        if records.is_empty() {
            return Ok(outcome);
        }

        let conn = self.connect()?;
        conn.execute("BEGIN TRANSACTION", ()).await?;

        for record in records {
            let result = conn
                .execute(
                    sql::INSERT_SEEN_URL,
                    params![
                        record.fingerprint.to_string(),
                        record.url.clone(),
                        record.title.clone(),
                        format_timestamp(&record.discovered_at)
                    ],
                )
                .await;

            match result {
                Ok(_) => outcome.inserted += 1,
                Err(e) if is_unique_violation(&e) => {
                    warn!(
                        "Skipping already-seen URL {} ({})",
                        record.url, record.fingerprint
                    );
                    outcome.duplicates += 1;
                }
                Err(e) => {
                    conn.execute("ROLLBACK", ()).await?;
                    return Err(ProviderError::Database(e));
                }
            }
        }

        conn.execute("COMMIT", ()).await?;
        info!(
            "Ledger insert committed: {} new, {} duplicates.",
            outcome.inserted, outcome.duplicates
        );
        Ok(outcome)
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<u64, ProviderError> {
        let conn = self.connect()?;
        let removed = conn
            .execute(sql::PURGE_SEEN_URLS_BEFORE, params![format_timestamp(&cutoff)])
            .await?;
        info!("Purged {removed} ledger records discovered before {cutoff}.");
        Ok(removed)
    }

    async fn find(
        &self,
        fingerprint: &UrlFingerprint,
    ) -> Result<Option<SeenUrlRecord>, ProviderError> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(sql::SELECT_SEEN_URL, params![fingerprint.to_string()])
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(seen_url_from_row(&row)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl BatchJobStore for SqliteProvider {
    async fn record_job(&self, job_id: &str) -> Result<BatchJobRecord, ProviderError> {
        let conn = self.connect()?;
        let created_at = Utc::now();
        conn.execute(
            sql::INSERT_BATCH_JOB,
            params![job_id.to_string(), format_timestamp(&created_at)],
        )
        .await?;
        info!("Recorded batch job {job_id}.");
        Ok(BatchJobRecord {
            job_id: job_id.to_string(),
            created_at,
        })
    }

    async fn latest_job(&self) -> Result<Option<BatchJobRecord>, ProviderError> {
        let conn = self.connect()?;
        let mut rows = conn.query(sql::SELECT_LATEST_BATCH_JOB, ()).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(BatchJobRecord {
                job_id: text_at(&row, 0)?,
                created_at: parse_timestamp(&text_at(&row, 1)?)?,
            })),
            None => Ok(None),
        }
    }

    async fn is_claimed(&self, job_id: &str) -> Result<bool, ProviderError> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(sql::SELECT_BATCH_JOB_CLAIM, params![job_id.to_string()])
            .await?;
        Ok(rows.next().await?.is_some())
    }

    async fn claim_job(&self, job_id: &str) -> Result<bool, ProviderError> {
        let conn = self.connect()?;
        let changes = conn
            .execute(
                sql::INSERT_BATCH_JOB_CLAIM,
                params![job_id.to_string(), format_timestamp(&Utc::now())],
            )
            .await?;
        Ok(changes > 0)
    }
}
