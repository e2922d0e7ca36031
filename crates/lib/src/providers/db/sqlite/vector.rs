//! # Local Vector Index
//!
//! A `VectorIndex` over Turso's native vector functions. Embeddings are stored as raw
//! little-endian `f32` blobs and ranked with `vector_distance_cos`; the reported score
//! is the cosine similarity (`1 - distance`).

use super::{format_timestamp, sql, text_at};
use crate::{
    errors::ProviderError,
    providers::db::storage::VectorIndex,
    types::{IdeaMetadata, VectorEntry, VectorMatch},
};
use async_trait::async_trait;
use chrono::Utc;
use std::fmt::{self, Debug};
use tracing::{debug, info, warn};
use turso::{params, Database, Row, Value as TursoValue};

#[derive(Clone)]
pub struct SqliteVectorIndex {
    db: Database,
    dimension: usize,
}

impl SqliteVectorIndex {
    pub fn new(db: Database, dimension: usize) -> Self {
        Self { db, dimension }
    }

    fn connect(&self) -> Result<turso::Connection, ProviderError> {
        self.db
            .connect()
            .map_err(|e| ProviderError::StorageConnection(e.to_string()))
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), ProviderError> {
        if vector.len() != self.dimension {
            return Err(ProviderError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

impl Debug for SqliteVectorIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteVectorIndex")
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn metadata_at(row: &Row, idx: usize) -> Result<IdeaMetadata, ProviderError> {
    let raw = text_at(row, idx)?;
    Ok(serde_json::from_str(&raw)?)
}

fn entry_from_row(row: &Row) -> Result<VectorEntry, ProviderError> {
    Ok(VectorEntry {
        id: text_at(row, 0)?,
        metadata: metadata_at(row, 1)?,
    })
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn ensure_index(&self) -> Result<(), ProviderError> {
        let conn = self.connect()?;
        conn.execute(sql::CREATE_IDEA_VECTORS_TABLE, ())
            .await
            .map_err(|e| ProviderError::StorageOperationFailed(e.to_string()))?;
        info!(
            "Vector index ready (cosine, {} dimensions).",
            self.dimension
        );
        Ok(())
    }

    async fn upsert(
        &self,
        id: &str,
        metadata: &IdeaMetadata,
        vector: &[f32],
    ) -> Result<(), ProviderError> {
        self.check_dimension(vector)?;
        let conn = self.connect()?;
        let metadata_json = serde_json::to_string(metadata)?;
        conn.execute(
            sql::UPSERT_IDEA_VECTOR,
            params![
                id.to_string(),
                metadata_json,
                vector_to_blob(vector),
                format_timestamp(&Utc::now())
            ],
        )
        .await?;
        debug!("Upserted vector entry '{id}' (count {}).", metadata.count);
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<VectorMatch>, ProviderError> {
        self.check_dimension(vector)?;
        let conn = self.connect()?;
        let mut rows = conn.query(&sql::nearest_ideas(vector, top_k), ()).await?;

        let mut matches = Vec::new();
        while let Some(row) = rows.next().await? {
            let distance = match row.get_value(2)? {
                TursoValue::Real(d) => d,
                TursoValue::Integer(d) => d as f64,
                other => {
                    warn!("Skipping vector row with non-numeric distance: {other:?}");
                    continue;
                }
            };
            matches.push(VectorMatch {
                id: text_at(&row, 0)?,
                score: 1.0 - distance,
                metadata: metadata_at(&row, 1)?,
            });
        }
        Ok(matches)
    }

    async fn update_metadata(
        &self,
        id: &str,
        metadata: &IdeaMetadata,
    ) -> Result<(), ProviderError> {
        let conn = self.connect()?;
        let metadata_json = serde_json::to_string(metadata)?;
        let changes = conn
            .execute(
                sql::UPDATE_IDEA_METADATA,
                params![metadata_json, format_timestamp(&Utc::now()), id.to_string()],
            )
            .await?;
        if changes == 0 {
            return Err(ProviderError::StorageOperationFailed(format!(
                "vector entry '{id}' does not exist"
            )));
        }
        Ok(())
    }

    async fn fetch(&self, id: &str) -> Result<Option<VectorEntry>, ProviderError> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(sql::SELECT_IDEA_VECTOR, params![id.to_string()])
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(entry_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_entries(&self) -> Result<Vec<VectorEntry>, ProviderError> {
        let conn = self.connect()?;
        let mut rows = conn.query(sql::SELECT_ALL_IDEA_VECTORS, ()).await?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            entries.push(entry_from_row(&row)?);
        }
        Ok(entries)
    }
}
