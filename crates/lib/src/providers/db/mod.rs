pub mod sqlite;
pub mod storage;

pub use sqlite::{SqliteProvider, SqliteVectorIndex};
pub use storage::{BatchJobStore, BulkInsertOutcome, Ledger, VectorIndex};
