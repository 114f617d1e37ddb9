//! No-op store: memory disabled. Writes succeed and are discarded.

use async_trait::async_trait;
use gradwise_core::error::MemoryError;
use gradwise_core::memory::{MemoryRecord, Metadata, RecordKind, RetrievalStore, ScoredRecord};
use uuid::Uuid;

/// A store that keeps nothing.
pub struct NoopStore;

#[async_trait]
impl RetrievalStore for NoopStore {
    fn name(&self) -> &str {
        "none"
    }

    async fn store(&self, _body: &str, kind: RecordKind, _metadata: Metadata) -> Result<String, MemoryError> {
        Ok(format!("{kind}-{}", Uuid::new_v4()))
    }

    async fn query(
        &self,
        _text: &str,
        _limit: usize,
        _kind: Option<RecordKind>,
    ) -> Result<Vec<ScoredRecord>, MemoryError> {
        Ok(Vec::new())
    }

    async fn recent(&self, _kind: RecordKind, _limit: usize) -> Result<Vec<MemoryRecord>, MemoryError> {
        Ok(Vec::new())
    }

    async fn count(&self) -> Result<usize, MemoryError> {
        Ok(0)
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        Ok(())
    }
}
