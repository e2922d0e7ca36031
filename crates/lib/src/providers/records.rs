use crate::{
    errors::ProviderError,
    types::{DisplayRecord, IdeaMetadata, SourceInfo},
};
use async_trait::async_trait;
use dyn_clone::DynClone;
use std::fmt::Debug;

/// The display/document store mirroring idea counts for humans.
///
/// Records are keyed by idea title. The pipeline never deletes records here, and it
/// only ever *sets* a count copied from the vector index.
#[async_trait]
pub trait RecordStore: Send + Sync + Debug + DynClone {
    async fn find_by_title(&self, title: &str) -> Result<Option<DisplayRecord>, ProviderError>;

    /// Creates a display record for an idea, with `metadata.count` as its count.
    async fn create(&self, metadata: &IdeaMetadata, source: &SourceInfo)
        -> Result<(), ProviderError>;

    /// Overwrites the mirrored count of an existing record.
    async fn update_count(&self, record_id: &str, count: u32) -> Result<(), ProviderError>;
}

dyn_clone::clone_trait_object!(RecordStore);
