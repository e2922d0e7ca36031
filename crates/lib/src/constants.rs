//! # Shared Constants
//!
//! Tunables shared between the library, the adapter crates and the CLI.

/// The default path for the pipeline's local database.
pub const DEFAULT_DB_FILE: &str = "db/ideasieve.db";

/// Cosine similarity above which two ideas are considered the same.
pub const SIMILARITY_THRESHOLD: f64 = 0.75;

/// Number of nearest neighbours fetched per similarity query.
pub const TOP_K: usize = 5;

/// Dimension of the embedding vectors stored in the vector index.
pub const EMBEDDING_DIMENSION: usize = 1536;

/// Default embedding model.
pub const EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Days a seen-URL record is retained before it becomes eligible for purge.
pub const LEDGER_RETENTION_DAYS: i64 = 7;

/// Sampling temperature used for idea extraction requests.
pub const EXTRACTION_TEMPERATURE: f32 = 0.4;

/// Prefix of the `custom_id` attached to every batch task.
pub const BATCH_TASK_PREFIX: &str = "task-";
