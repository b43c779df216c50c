use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;

use super::event::CostRecord;

/// Errors raised while persisting telemetry. They never reach the voice path;
/// the consumer logs and moves on.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Telemetry IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Telemetry serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Destination for priced cost records.
#[async_trait]
pub trait CostStore: Send + Sync {
    async fn persist(&self, record: &CostRecord) -> Result<(), TelemetryError>;

    fn name(&self) -> &'static str;
}

/// Records kept by [`MemoryCostStore::new`].
pub const DEFAULT_MEMORY_RECORDS: usize = 1000;

/// Keeps the most recent records in memory. Used when no store path is
/// configured; older records are dropped once `capacity` is reached.
pub struct MemoryCostStore {
    records: Mutex<VecDeque<CostRecord>>,
    capacity: usize,
}

impl MemoryCostStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MEMORY_RECORDS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_MEMORY_RECORDS))),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Retained records, oldest first.
    pub fn records(&self) -> Vec<CostRecord> {
        self.records.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryCostStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CostStore for MemoryCostStore {
    async fn persist(&self, record: &CostRecord) -> Result<(), TelemetryError> {
        let mut records = self.records.lock();
        if records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Appends one JSON object per line to a file.
pub struct JsonlCostStore {
    path: PathBuf,
}

impl JsonlCostStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CostStore for JsonlCostStore {
    async fn persist(&self, record: &CostRecord) -> Result<(), TelemetryError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "jsonl"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::telemetry::event::{CostEvent, Stage};
    use tempfile::TempDir;

    fn record(turn: u64) -> CostRecord {
        CostRecord {
            event: CostEvent::new("session-a", turn, Stage::Synthesis).with_characters(10),
            cost_usd: 0.00015,
        }
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryCostStore::new();
        store.persist(&record(1)).await.unwrap();
        store.persist(&record(2)).await.unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.records()[1].event.turn, 2);
    }

    #[tokio::test]
    async fn test_memory_store_drops_oldest_at_capacity() {
        let store = MemoryCostStore::with_capacity(2);
        for turn in 1..=5 {
            store.persist(&record(turn)).await.unwrap();
        }

        let turns: Vec<u64> = store.records().iter().map(|r| r.event.turn).collect();
        assert_eq!(turns, vec![4, 5]);
        assert_eq!(store.capacity(), 2);
    }

    #[tokio::test]
    async fn test_jsonl_store_appends_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("costs.jsonl");
        let store = JsonlCostStore::new(&path);

        store.persist(&record(1)).await.unwrap();
        store.persist(&record(2)).await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: CostRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed.event.turn, 2);
        assert_eq!(parsed.event.session_id, "session-a");
    }

    #[tokio::test]
    async fn test_jsonl_store_missing_directory_errors() {
        let dir = TempDir::new().unwrap();
        let store = JsonlCostStore::new(dir.path().join("nope").join("costs.jsonl"));
        assert!(matches!(
            store.persist(&record(1)).await,
            Err(TelemetryError::Io(_))
        ));
    }
}
