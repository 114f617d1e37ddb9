//! Append-only JSON-lines journal of memory records.
//!
//! One `MemoryRecord` per line. New fields may be added to records but
//! existing ones are never renamed, so old journals stay readable. Lines that
//! fail to parse are skipped with a warning on load.

use gradwise_core::error::MemoryError;
use gradwise_core::memory::MemoryRecord;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// A JSONL file of memory records.
#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every parseable record, oldest first. A missing file is empty.
    pub fn load(&self) -> Result<Vec<MemoryRecord>, MemoryError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(MemoryError::Storage(format!(
                    "Failed to read {}: {e}",
                    self.path.display()
                )));
            }
        };

        Ok(content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .filter_map(|(n, line)| match serde_json::from_str::<MemoryRecord>(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(path = %self.path.display(), line = n + 1, error = %e, "Skipping corrupted memory record");
                    None
                }
            })
            .collect())
    }

    /// Append one record as a single line.
    pub fn append(&self, record: &MemoryRecord) -> Result<(), MemoryError> {
        self.ensure_parent()?;

        let mut line = serde_json::to_string(record)
            .map_err(|e| MemoryError::Storage(format!("Failed to serialize memory record: {e}")))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| MemoryError::Storage(format!("Failed to open memory file: {e}")))?;
        file.write_all(line.as_bytes())
            .map_err(|e| MemoryError::Storage(format!("Failed to write memory file: {e}")))?;

        Ok(())
    }

    /// Empty the journal.
    pub fn truncate(&self) -> Result<(), MemoryError> {
        self.ensure_parent()?;
        std::fs::write(&self.path, "")
            .map_err(|e| MemoryError::Storage(format!("Failed to clear memory file: {e}")))
    }

    fn ensure_parent(&self) -> Result<(), MemoryError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| MemoryError::Storage(format!("Failed to create memory directory: {e}")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gradwise_core::memory::RecordKind;
    use std::io::Write as _;

    fn record(id: &str, body: &str) -> MemoryRecord {
        MemoryRecord {
            id: id.into(),
            kind: RecordKind::Preference,
            body: body.into(),
            metadata: Default::default(),
            created_at: Utc::now(),
            embedding: None,
        }
    }

    #[test]
    fn append_then_load_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path().join("nested").join("memory.jsonl"));

        journal.append(&record("preference-1", "prefers east coast")).unwrap();
        journal.append(&record("preference-2", "wants funded PhD")).unwrap();

        let loaded = journal.load().unwrap();
        let ids: Vec<&str> = loaded.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["preference-1", "preference-2"]);
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path().join("absent.jsonl"));
        assert!(journal.load().unwrap().is_empty());
    }

    #[test]
    fn corrupted_lines_are_skipped() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, r#"{{"id":"conversation-1","kind":"conversation","body":"valid","created_at":"2026-01-01T00:00:00Z"}}"#).unwrap();
        writeln!(tmp, "this is not json").unwrap();
        writeln!(tmp, r#"{{"id":"conversation-2","kind":"mystery","body":"bad kind","created_at":"2026-01-01T00:00:00Z"}}"#).unwrap();
        writeln!(tmp).unwrap();
        writeln!(tmp, r#"{{"id":"conversation-3","kind":"conversation","body":"also valid","metadata":{{"session_id":"s1"}},"created_at":"2026-01-02T00:00:00Z","embedding":[0.5,0.5]}}"#).unwrap();

        let loaded = Journal::new(tmp.path()).load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].metadata.get("session_id").map(String::as_str), Some("s1"));
        assert!(!loaded[1].is_lexical_only());
    }

    #[test]
    fn truncate_empties_file() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path().join("memory.jsonl"));
        journal.append(&record("preference-1", "x")).unwrap();
        journal.truncate().unwrap();
        assert!(journal.load().unwrap().is_empty());
    }
}
