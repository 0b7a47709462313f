//! Append-only payout records.
//!
//! [`FaucetStore`] answers the cooldown question and keeps the audit log.
//! Two implementations: [`MemoryStore`] for tests and ephemeral runs, and
//! [`JsonlStore`], which appends one JSON object per line and rebuilds its
//! index from the file on open.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ckb_faucet_core::types::Hash256;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::error::StoreError;

/// Audit entry written once per successful payout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaucetRecord {
    pub identity: String,
    pub tx_hash: Hash256,
    pub timestamp: DateTime<Utc>,
}

impl FaucetRecord {
    pub fn now(identity: impl Into<String>, tx_hash: Hash256) -> Self {
        Self {
            identity: identity.into(),
            tx_hash,
            timestamp: Utc::now(),
        }
    }
}

/// Payout record persistence.
#[async_trait]
pub trait FaucetStore: Send + Sync {
    /// Append a record. Records are never updated or removed.
    async fn record(&self, record: FaucetRecord) -> Result<(), StoreError>;

    /// Time of the most recent payout to `identity`.
    async fn last_received(&self, identity: &str) -> Result<Option<DateTime<Utc>>, StoreError>;

    /// Whether `identity` was paid within `window` of now.
    ///
    /// Default implementation compares [`last_received`](Self::last_received).
    async fn has_received_within(&self, identity: &str, window: Duration) -> Result<bool, StoreError> {
        let Some(last) = self.last_received(identity).await? else {
            return Ok(false);
        };
        let window = chrono::Duration::from_std(window).map_err(|_| StoreError::WindowOutOfRange)?;
        Ok(match Utc::now().checked_sub_signed(window) {
            Some(cutoff) => last > cutoff,
            None => true,
        })
    }
}

/// Latest timestamp per identity, built from a sequence of records.
fn index_records<'a>(records: impl IntoIterator<Item = &'a FaucetRecord>) -> HashMap<String, DateTime<Utc>> {
    let mut index: HashMap<String, DateTime<Utc>> = HashMap::new();
    for r in records {
        let entry = index.entry(r.identity.clone()).or_insert(r.timestamp);
        if r.timestamp > *entry {
            *entry = r.timestamp;
        }
    }
    index
}

/// In-memory store. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Vec<FaucetRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record in insertion order.
    pub fn records(&self) -> Vec<FaucetRecord> {
        self.records.read().clone()
    }
}

#[async_trait]
impl FaucetStore for MemoryStore {
    async fn record(&self, record: FaucetRecord) -> Result<(), StoreError> {
        self.records.write().push(record);
        Ok(())
    }

    async fn last_received(&self, identity: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self
            .records
            .read()
            .iter()
            .filter(|r| r.identity == identity)
            .map(|r| r.timestamp)
            .max())
    }
}

/// JSON-lines file store.
///
/// Appends are serialized through an async mutex over the open file.
pub struct JsonlStore {
    path: PathBuf,
    file: tokio::sync::Mutex<tokio::fs::File>,
    latest: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl JsonlStore {
    /// Open (or create) the log at `path` and index existing records.
    ///
    /// Unparseable lines are skipped with a warning. A final line cut off
    /// before its newline is terminated so the next append starts a line of
    /// its own.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let existing = match tokio::fs::read(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        let mut records = Vec::new();
        for (line_no, line) in String::from_utf8_lossy(&existing).lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<FaucetRecord>(line) {
                Ok(r) => records.push(r),
                Err(e) => warn!(path = %path.display(), line = line_no + 1, error = %e, "skipping corrupt record"),
            }
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        if existing.last().is_some_and(|&b| b != b'\n') {
            warn!(path = %path.display(), "terminating torn final record");
            file.write_all(b"\n").await?;
            file.flush().await?;
        }

        Ok(Self {
            latest: RwLock::new(index_records(&records)),
            file: tokio::sync::Mutex::new(file),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl FaucetStore for JsonlStore {
    async fn record(&self, record: FaucetRecord) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(&record).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        line.push('\n');

        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        drop(file);

        let mut latest = self.latest.write();
        let entry = latest.entry(record.identity).or_insert(record.timestamp);
        if record.timestamp > *entry {
            *entry = record.timestamp;
        }
        Ok(())
    }

    async fn last_received(&self, identity: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.latest.read().get(identity).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(86_400);

    fn record_at(identity: &str, hours_ago: i64) -> FaucetRecord {
        FaucetRecord {
            identity: identity.into(),
            tx_hash: Hash256([hours_ago as u8; 32]),
            timestamp: Utc::now() - chrono::Duration::hours(hours_ago),
        }
    }

    #[tokio::test]
    async fn memory_store_cooldown() {
        let store = MemoryStore::new();
        assert!(!store.has_received_within("alice", DAY).await.unwrap());

        store.record(record_at("alice", 30)).await.unwrap();
        assert!(!store.has_received_within("alice", DAY).await.unwrap());

        store.record(record_at("alice", 2)).await.unwrap();
        assert!(store.has_received_within("alice", DAY).await.unwrap());
        assert!(!store.has_received_within("bob", DAY).await.unwrap());
        assert_eq!(store.records().len(), 2);
    }

    #[tokio::test]
    async fn zero_window_never_blocks() {
        let store = MemoryStore::new();
        store.record(record_at("alice", 1)).await.unwrap();
        assert!(!store.has_received_within("alice", Duration::ZERO).await.unwrap());
    }

    #[tokio::test]
    async fn huge_window_out_of_range() {
        let store = MemoryStore::new();
        store.record(record_at("alice", 1)).await.unwrap();
        assert_eq!(
            store.has_received_within("alice", Duration::from_secs(u64::MAX)).await.unwrap_err(),
            StoreError::WindowOutOfRange
        );
    }

    #[tokio::test]
    async fn jsonl_store_appends_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("records.jsonl");

        {
            let store = JsonlStore::open(&path).await.unwrap();
            store.record(record_at("alice", 3)).await.unwrap();
            store.record(record_at("bob", 40)).await.unwrap();
            assert!(store.has_received_within("alice", DAY).await.unwrap());
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.contains("\"tx_hash\":\"0x03"));

        let reopened = JsonlStore::open(&path).await.unwrap();
        assert!(reopened.has_received_within("alice", DAY).await.unwrap());
        assert!(!reopened.has_received_within("bob", DAY).await.unwrap());
        assert!(reopened.last_received("bob").await.unwrap().is_some());
        assert_eq!(reopened.path(), path.as_path());
    }

    #[tokio::test]
    async fn jsonl_store_skips_corrupt_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        let good = serde_json::to_string(&record_at("carol", 1)).unwrap();
        std::fs::write(&path, format!("not json\n\n{good}\n")).unwrap();

        let store = JsonlStore::open(&path).await.unwrap();
        assert!(store.has_received_within("carol", DAY).await.unwrap());

        store.record(record_at("dave", 1)).await.unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 4);
    }

    #[tokio::test]
    async fn jsonl_store_terminates_torn_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        let good = serde_json::to_string(&record_at("erin", 2)).unwrap();
        std::fs::write(&path, format!("{good}\n{{\"identity\":\"github:9\",\"tx_ha")).unwrap();

        let store = JsonlStore::open(&path).await.unwrap();
        assert!(store.has_received_within("erin", DAY).await.unwrap());
        assert!(!store.has_received_within("github:9", DAY).await.unwrap());
        store.record(record_at("github:1", 1)).await.unwrap();
        drop(store);

        let reopened = JsonlStore::open(&path).await.unwrap();
        assert!(reopened.has_received_within("github:1", DAY).await.unwrap());
        assert!(reopened.has_received_within("erin", DAY).await.unwrap());
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 3);
        assert!(contents.ends_with('\n'));
    }

    #[tokio::test]
    async fn jsonl_store_leaves_clean_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        let good = serde_json::to_string(&record_at("frank", 1)).unwrap();
        std::fs::write(&path, format!("{good}\n")).unwrap();

        drop(JsonlStore::open(&path).await.unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), format!("{good}\n"));
    }

    #[test]
    fn index_keeps_latest() {
        let older = record_at("alice", 10);
        let newer = record_at("alice", 1);
        let index = index_records([&newer, &older]);
        assert_eq!(index["alice"], newer.timestamp);
    }
}
