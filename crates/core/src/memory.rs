//! Memory trait: durable recall of past interactions.
//!
//! Records are append-only: a correction is a new record, never an edit.
//! Retrieval is semantic when an embedder is available and lexical
//! otherwise; callers see the same result shape either way.

use crate::error::MemoryError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata attached to a record (session id, tags, ...).
pub type Metadata = BTreeMap<String, String>;

/// What a record is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// A summarised user/assistant exchange
    Conversation,
    /// A domain artifact such as an essay draft
    DomainNote,
    /// A stated user preference or goal
    Preference,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Conversation => "conversation",
            RecordKind::DomainNote => "domain_note",
            RecordKind::Preference => "preference",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "conversation" => Ok(RecordKind::Conversation),
            "domain_note" | "note" => Ok(RecordKind::DomainNote),
            "preference" => Ok(RecordKind::Preference),
            other => Err(format!("unknown record kind '{other}'")),
        }
    }
}

/// A single durable memory record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique, stable id
    pub id: String,

    pub kind: RecordKind,

    /// The recallable text; never edited after storage
    pub body: String,

    #[serde(default)]
    pub metadata: Metadata,

    pub created_at: DateTime<Utc>,

    /// Present only when the embedder was reachable at store time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl MemoryRecord {
    /// Whether this record can only be found by lexical scoring.
    pub fn is_lexical_only(&self) -> bool {
        self.embedding.is_none()
    }
}

/// A record plus its relevance for one query.
///
/// `relevance` is comparable only within the result list of a single call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub record: MemoryRecord,
    pub relevance: f32,
}

/// Produces embedding vectors for similarity search.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;

    /// Embed one text. Any error means "unavailable for this call".
    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError>;
}

/// The retrieval store contract.
///
/// Implementations: in-memory, JSON-lines file, none (no-op).
#[async_trait]
pub trait RetrievalStore: Send + Sync {
    /// The backend name (e.g., "file", "in_memory", "none").
    fn name(&self) -> &str;

    /// Append a new record and return its id. Identical input twice yields
    /// two records.
    async fn store(&self, body: &str, kind: RecordKind, metadata: Metadata) -> Result<String, MemoryError>;

    /// Rank records against `text`, best first.
    async fn query(
        &self,
        text: &str,
        limit: usize,
        kind: Option<RecordKind>,
    ) -> Result<Vec<ScoredRecord>, MemoryError>;

    /// The most recent records of `kind`, newest first.
    async fn recent(&self, kind: RecordKind, limit: usize) -> Result<Vec<MemoryRecord>, MemoryError>;

    /// Total number of records.
    async fn count(&self) -> Result<usize, MemoryError>;

    /// Remove everything. Administrative; never called while serving turns.
    async fn clear(&self) -> Result<(), MemoryError>;
}
