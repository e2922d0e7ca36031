//! # SQLite Specific SQL Queries
//!
//! Centralizes the SQL used by the SQLite provider and the local vector index.
//! Timestamps are stored as fixed-width RFC 3339 text so that string comparison
//! orders them chronologically.

pub const CREATE_SEEN_URLS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS seen_urls (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        fingerprint TEXT NOT NULL UNIQUE,
        url TEXT NOT NULL,
        title TEXT NOT NULL DEFAULT '',
        discovered_at TEXT NOT NULL
    );
";

pub const CREATE_BATCH_JOBS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS batch_jobs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        job_id TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL
    );
";

pub const CREATE_BATCH_JOB_CLAIMS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS batch_job_claims (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        job_id TEXT NOT NULL UNIQUE,
        claimed_at TEXT NOT NULL
    );
";

pub const CREATE_IDEA_VECTORS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS idea_vectors (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        entry_id TEXT NOT NULL UNIQUE,
        metadata TEXT NOT NULL,
        embedding BLOB NOT NULL,
        updated_at TEXT NOT NULL
    );
";

/// Tables owned by `SqliteProvider`. The vector table is provisioned separately by
/// `SqliteVectorIndex::ensure_index`.
pub const ALL_TABLE_CREATION_SQL: &[&str] = &[
    CREATE_SEEN_URLS_TABLE,
    CREATE_BATCH_JOBS_TABLE,
    CREATE_BATCH_JOB_CLAIMS_TABLE,
];

pub const INSERT_SEEN_URL: &str =
    "INSERT INTO seen_urls (fingerprint, url, title, discovered_at) VALUES (?, ?, ?, ?)";

pub const SELECT_ALL_FINGERPRINTS: &str = "SELECT fingerprint FROM seen_urls";

pub const SELECT_SEEN_URL: &str =
    "SELECT fingerprint, url, title, discovered_at FROM seen_urls WHERE fingerprint = ?";

pub const PURGE_SEEN_URLS_BEFORE: &str = "DELETE FROM seen_urls WHERE discovered_at < ?";

pub const INSERT_BATCH_JOB: &str = "INSERT INTO batch_jobs (job_id, created_at) VALUES (?, ?)";

pub const SELECT_LATEST_BATCH_JOB: &str =
    "SELECT job_id, created_at FROM batch_jobs ORDER BY created_at DESC, id DESC LIMIT 1";

pub const SELECT_BATCH_JOB_CLAIM: &str = "SELECT job_id FROM batch_job_claims WHERE job_id = ?";

pub const INSERT_BATCH_JOB_CLAIM: &str = "
    INSERT INTO batch_job_claims (job_id, claimed_at) VALUES (?, ?)
    ON CONFLICT(job_id) DO NOTHING
";

pub const UPSERT_IDEA_VECTOR: &str = "
    INSERT INTO idea_vectors (entry_id, metadata, embedding, updated_at) VALUES (?, ?, ?, ?)
    ON CONFLICT(entry_id) DO UPDATE SET
        metadata = excluded.metadata,
        embedding = excluded.embedding,
        updated_at = excluded.updated_at
";

pub const UPDATE_IDEA_METADATA: &str =
    "UPDATE idea_vectors SET metadata = ?, updated_at = ? WHERE entry_id = ?";

pub const SELECT_IDEA_VECTOR: &str = "SELECT entry_id, metadata FROM idea_vectors WHERE entry_id = ?";

pub const SELECT_ALL_IDEA_VECTORS: &str = "SELECT entry_id, metadata FROM idea_vectors ORDER BY id";

/// Builds the nearest-neighbour query. Turso's vector functions take the query vector
/// as a literal inside the statement.
pub fn nearest_ideas(query_vector: &[f32], limit: usize) -> String {
    let vector_str = format!(
        "vector32('[{}]')",
        query_vector
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );

    format!(
        "SELECT entry_id, metadata, vector_distance_cos(embedding, {vector_str}) AS distance
         FROM idea_vectors
         ORDER BY distance ASC
         LIMIT {limit};"
    )
}
