//! The local retrieval store: records held in memory, optionally journaled
//! to a JSON-lines file, optionally embedded for similarity search.

use crate::journal::Journal;
use crate::lexical::lexical_rank;
use crate::vector::vector_rank;
use async_trait::async_trait;
use chrono::Utc;
use gradwise_core::error::MemoryError;
use gradwise_core::memory::{Embedder, MemoryRecord, Metadata, RecordKind, RetrievalStore, ScoredRecord};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

/// In-memory or file-backed record store.
///
/// Records are kept oldest-first. Writes hold the lock across the journal
/// append and the in-memory push, so a `store` is all-or-nothing with
/// respect to concurrent readers.
pub struct LocalStore {
    records: RwLock<Vec<MemoryRecord>>,
    journal: Option<Journal>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl LocalStore {
    /// A store that forgets everything when dropped.
    pub fn in_memory() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            journal: None,
            embedder: None,
        }
    }

    /// Open (or create on first write) a journal-backed store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, MemoryError> {
        let journal = Journal::new(path);
        let records = journal.load()?;
        debug!(path = %journal.path().display(), count = records.len(), "File memory store loaded");
        Ok(Self {
            records: RwLock::new(records),
            journal: Some(journal),
            embedder: None,
        })
    }

    /// Enable similarity search through `embedder`.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    async fn try_embed(&self, text: &str) -> Option<Vec<f32>> {
        let embedder = self.embedder.as_ref()?;
        match embedder.embed(text).await {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(embedder = %embedder.name(), error = %e, "Embedding unavailable, using lexical path");
                None
            }
        }
    }
}

impl LocalStore {
    /// Similarity ranking for one query. Records stored while the embedder
    /// was down are embedded for this call only and returned unchanged.
    /// `None` when any embedding fails, so the whole call goes lexical.
    async fn similarity_rank(&self, text: &str, candidates: &[MemoryRecord], limit: usize) -> Option<Vec<ScoredRecord>> {
        let query_embedding = self.try_embed(text).await?;

        let mut ranked_candidates = Vec::with_capacity(candidates.len());
        for record in candidates {
            let mut record = record.clone();
            if record.embedding.is_none() {
                record.embedding = Some(self.try_embed(&record.body).await?);
            }
            ranked_candidates.push(record);
        }

        let mut ranked = vector_rank(&query_embedding, &ranked_candidates, limit);
        for scored in &mut ranked {
            if let Some(original) = candidates.iter().find(|r| r.id == scored.record.id) {
                scored.record.embedding = original.embedding.clone();
            }
        }
        Some(ranked)
    }
}

#[async_trait]
impl RetrievalStore for LocalStore {
    fn name(&self) -> &str {
        if self.journal.is_some() { "file" } else { "in_memory" }
    }

    async fn store(&self, body: &str, kind: RecordKind, metadata: Metadata) -> Result<String, MemoryError> {
        let embedding = self.try_embed(body).await;
        let record = MemoryRecord {
            id: format!("{kind}-{}", Uuid::new_v4()),
            kind,
            body: body.to_string(),
            metadata,
            created_at: Utc::now(),
            embedding,
        };
        let id = record.id.clone();

        let mut records = self.records.write().await;
        if let Some(journal) = &self.journal {
            journal.append(&record)?;
        }
        debug!(id = %id, kind = %kind, lexical_only = record.is_lexical_only(), "Stored memory record");
        records.push(record);

        Ok(id)
    }

    async fn query(
        &self,
        text: &str,
        limit: usize,
        kind: Option<RecordKind>,
    ) -> Result<Vec<ScoredRecord>, MemoryError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let candidates: Vec<MemoryRecord> = self
            .records
            .read()
            .await
            .iter()
            .filter(|r| kind.is_none_or(|k| r.kind == k))
            .cloned()
            .collect();

        let any_embedded = candidates.iter().any(|r| r.embedding.is_some());
        if self.embedder.is_some() && any_embedded {
            if let Some(ranked) = self.similarity_rank(text, &candidates, limit).await {
                return Ok(ranked);
            }
        }

        Ok(lexical_rank(text, &candidates, limit))
    }

    async fn recent(&self, kind: RecordKind, limit: usize) -> Result<Vec<MemoryRecord>, MemoryError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .rev()
            .filter(|r| r.kind == kind)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<usize, MemoryError> {
        Ok(self.records.read().await.len())
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        let mut records = self.records.write().await;
        if let Some(journal) = &self.journal {
            journal.truncate()?;
        }
        records.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gradwise_core::memory::Metadata;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Deterministic bag-of-words embedding: each word hashes to a bucket.
    struct BucketEmbedder {
        healthy: AtomicBool,
    }

    impl BucketEmbedder {
        fn new() -> Self {
            Self {
                healthy: AtomicBool::new(true),
            }
        }
    }

    #[async_trait]
    impl Embedder for BucketEmbedder {
        fn name(&self) -> &str {
            "buckets"
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
            if !self.healthy.load(Ordering::SeqCst) {
                return Err(MemoryError::EmbeddingFailed("offline".into()));
            }
            let mut v = vec![0.0f32; 32];
            for word in text.split_whitespace() {
                let bucket = word
                    .to_lowercase()
                    .bytes()
                    .fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize));
                v[bucket % 32] += 1.0;
            }
            Ok(v)
        }
    }

    fn session(id: &str) -> Metadata {
        BTreeMap::from([("session_id".to_string(), id.to_string())])
    }

    #[tokio::test]
    async fn identical_input_yields_distinct_ids() {
        let store = LocalStore::in_memory();
        let a = store.store("same", RecordKind::Conversation, Metadata::new()).await.unwrap();
        let b = store.store("same", RecordKind::Conversation, Metadata::new()).await.unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("conversation-"));
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn lexical_query_returns_only_overlapping_records() {
        let store = LocalStore::in_memory();
        store
            .store("User: when is the MIT application deadline", RecordKind::Conversation, session("s1"))
            .await
            .unwrap();
        store
            .store("User: the Stanford deadline moved", RecordKind::Conversation, session("s1"))
            .await
            .unwrap();

        let results = store.query("application deadline", 5, None).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].record.body.contains("MIT"));
        assert!(results[0].relevance > results[1].relevance);
        assert!(results.iter().all(|r| r.record.is_lexical_only()));
    }

    #[tokio::test]
    async fn self_match_on_lexical_path() {
        let store = LocalStore::in_memory();
        let target = store
            .store("Prefers programs with strong NLP groups", RecordKind::Preference, Metadata::new())
            .await
            .unwrap();
        store
            .store("Prefers programs with strong NLP groups and funding in Boston", RecordKind::Preference, Metadata::new())
            .await
            .unwrap();

        let results = store
            .query("Prefers programs with strong NLP groups", 5, None)
            .await
            .unwrap();
        assert_eq!(results[0].record.id, target);
    }

    #[tokio::test]
    async fn self_match_survives_same_words_in_newer_record() {
        let store = LocalStore::in_memory();
        let target = store
            .store("Stanford deadline", RecordKind::Conversation, Metadata::new())
            .await
            .unwrap();
        store
            .store("deadline Stanford", RecordKind::Conversation, Metadata::new())
            .await
            .unwrap();

        let results = store.query("Stanford deadline", 5, None).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].record.id, target);
    }

    #[tokio::test]
    async fn self_match_on_vector_path() {
        let store = LocalStore::in_memory().with_embedder(Arc::new(BucketEmbedder::new()));
        store
            .store("Analysed statement of purpose draft", RecordKind::DomainNote, Metadata::new())
            .await
            .unwrap();
        let target = store
            .store("Reminder to request recommendation letters", RecordKind::DomainNote, Metadata::new())
            .await
            .unwrap();

        let results = store
            .query("Reminder to request recommendation letters", 1, None)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.id, target);
        assert!((results[0].relevance - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn embedder_failure_demotes_single_calls() {
        let embedder = Arc::new(BucketEmbedder::new());
        let store = LocalStore::in_memory().with_embedder(embedder.clone());

        embedder.healthy.store(false, Ordering::SeqCst);
        store
            .store("GRE scores sent to Stanford", RecordKind::Conversation, Metadata::new())
            .await
            .unwrap();
        let lexical = store.query("stanford", 5, None).await.unwrap();
        assert_eq!(lexical.len(), 1);
        assert!(lexical[0].record.is_lexical_only());

        embedder.healthy.store(true, Ordering::SeqCst);
        store
            .store("TOEFL scores sent to MIT", RecordKind::Conversation, Metadata::new())
            .await
            .unwrap();

        // The record stored during the outage is still found on the similarity
        // path, and stays lexical-only.
        let vector = store.query("GRE scores sent to Stanford", 5, None).await.unwrap();
        assert_eq!(vector.len(), 2);
        assert_eq!(vector[0].record.body, "GRE scores sent to Stanford");
        assert!((vector[0].relevance - 1.0).abs() < 1e-5);
        assert!(vector[0].record.is_lexical_only());
        assert!(!vector[1].record.is_lexical_only());
        let stored = store.recent(RecordKind::Conversation, 5).await.unwrap();
        assert!(stored.iter().any(|r| r.is_lexical_only()));

        embedder.healthy.store(false, Ordering::SeqCst);
        let fallback = store.query("scores sent", 5, None).await.unwrap();
        assert_eq!(fallback.len(), 2);
    }

    #[tokio::test]
    async fn kind_filter_and_recent_ordering() {
        let store = LocalStore::in_memory();
        store.store("first chat", RecordKind::Conversation, Metadata::new()).await.unwrap();
        store.store("likes Boston", RecordKind::Preference, Metadata::new()).await.unwrap();
        store.store("second chat", RecordKind::Conversation, Metadata::new()).await.unwrap();

        let recent = store.recent(RecordKind::Conversation, 5).await.unwrap();
        let bodies: Vec<&str> = recent.iter().map(|r| r.body.as_str()).collect();
        assert_eq!(bodies, vec!["second chat", "first chat"]);

        assert!(store.query("chat", 5, Some(RecordKind::Preference)).await.unwrap().is_empty());
        assert_eq!(store.query("boston", 5, Some(RecordKind::Preference)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn file_store_survives_reopen_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.jsonl");

        let store = LocalStore::open(&path).unwrap();
        assert_eq!(store.name(), "file");
        let id = store
            .store("User: Add MIT\nAssistant: Done", RecordKind::Conversation, session("s1"))
            .await
            .unwrap();

        let reopened = LocalStore::open(&path).unwrap();
        let recent = reopened.recent(RecordKind::Conversation, 1).await.unwrap();
        assert_eq!(recent[0].id, id);
        assert_eq!(recent[0].metadata.get("session_id").map(String::as_str), Some("s1"));

        reopened.clear().await.unwrap();
        assert_eq!(LocalStore::open(&path).unwrap().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn concurrent_stores_are_all_kept() {
        let store = Arc::new(LocalStore::in_memory());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .store(&format!("note {i}"), RecordKind::DomainNote, Metadata::new())
                        .await
                })
            })
            .collect();
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(store.count().await.unwrap(), 16);
    }
}
