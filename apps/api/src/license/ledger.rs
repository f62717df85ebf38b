//! Durable record of consumed remote license keys.
//!
//! The ledger is the only state that outlives a single request. It is a set
//! of key strings persisted as a JSON array, lazily loaded on first access
//! and rewritten atomically (temp file + rename) on every mutation. Keys are
//! only ever added, never removed.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::warn;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Mutable set of remote keys that have already authorized a request.
///
/// Invariant: a key present here must never again authorize the remote path.
pub struct RedemptionLedger {
    path: PathBuf,
    /// `None` until first access; loaded lazily so a missing file on first
    /// run is treated as an empty ledger.
    consumed: Mutex<Option<HashSet<String>>>,
}

impl RedemptionLedger {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            consumed: Mutex::new(None),
        }
    }

    /// Returns true iff `key` was previously recorded as consumed.
    ///
    /// Unreadable or malformed storage degrades to an empty ledger with a
    /// warning rather than failing the validation path.
    pub async fn has_consumed(&self, key: &str) -> bool {
        let mut guard = self.consumed.lock().await;
        self.load_if_needed(&mut guard).await;
        guard.as_ref().map(|set| set.contains(key)).unwrap_or(false)
    }

    /// Idempotently adds `key` to the consumed set and durably persists the
    /// updated set before returning.
    ///
    /// The in-memory set is updated before the write so a persistence failure
    /// still blocks the key for the lifetime of this process; the caller must
    /// surface the error rather than report success. The file write runs on
    /// the blocking pool, so a caller disconnect cannot abandon a half-written
    /// ledger file.
    pub async fn record(&self, key: &str) -> Result<(), LedgerError> {
        let mut guard = self.consumed.lock().await;
        self.load_if_needed(&mut guard).await;
        let set = guard.get_or_insert_with(HashSet::new);

        // Idempotent at the set level. The write always runs, so a retry
        // after a failed persist still reaches disk.
        set.insert(key.to_string());

        let mut keys: Vec<&String> = set.iter().collect();
        keys.sort();
        let serialized = serde_json::to_string_pretty(&keys)?;

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &serialized))
            .await
            .map_err(|e| LedgerError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
    }

    /// Lazily loads the consumed set. File IO runs on the blocking pool, off
    /// the async workers, like the write path.
    async fn load_if_needed(&self, slot: &mut Option<HashSet<String>>) {
        if slot.is_some() {
            return;
        }
        let path = self.path.clone();
        let loaded = match tokio::task::spawn_blocking(move || read_consumed(&path)).await {
            Ok(set) => set,
            Err(e) => {
                warn!("Ledger load task failed ({e}); treating as empty");
                HashSet::new()
            }
        };
        *slot = Some(loaded);
    }
}

fn read_consumed(path: &Path) -> HashSet<String> {
    match std::fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str::<HashSet<String>>(&raw) {
            Ok(set) => set,
            Err(e) => {
                warn!("Ledger file {} is malformed ({e}); treating as empty", path.display());
                HashSet::new()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashSet::new(),
        Err(e) => {
            warn!("Ledger file {} is unreadable ({e}); treating as empty", path.display());
            HashSet::new()
        }
    }
}

/// Writes `contents` to `path` via a temp file in the same directory followed
/// by an atomic rename, so readers never observe a partial file.
fn write_atomic(path: &Path, contents: &str) -> Result<(), LedgerError> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    let mut tmp = match dir {
        Some(dir) => tempfile::NamedTempFile::new_in(dir)?,
        None => tempfile::NamedTempFile::new_in(".")?,
    };
    tmp.write_all(contents.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| LedgerError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_in(dir: &tempfile::TempDir) -> RedemptionLedger {
        RedemptionLedger::new(dir.path().join("used_licenses.json"))
    }

    #[tokio::test]
    async fn test_missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger_in(&dir);
        assert!(!ledger.has_consumed("REM-1").await);
    }

    #[tokio::test]
    async fn test_record_then_has_consumed() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger_in(&dir);
        ledger.record("REM-1").await.unwrap();
        assert!(ledger.has_consumed("REM-1").await);
        assert!(!ledger.has_consumed("REM-2").await);
    }

    #[tokio::test]
    async fn test_record_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger_in(&dir);
        ledger.record("REM-1").await.unwrap();
        ledger.record("REM-1").await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join("used_licenses.json")).unwrap();
        let on_disk: Vec<String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(on_disk, vec!["REM-1".to_string()]);
    }

    #[tokio::test]
    async fn test_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        ledger_in(&dir).record("REM-1").await.unwrap();

        let reopened = ledger_in(&dir);
        assert!(reopened.has_consumed("REM-1").await);
    }

    #[tokio::test]
    async fn test_record_preserves_existing_entries() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger_in(&dir);
        ledger.record("REM-1").await.unwrap();
        ledger.record("REM-2").await.unwrap();

        let reopened = ledger_in(&dir);
        assert!(reopened.has_consumed("REM-1").await);
        assert!(reopened.has_consumed("REM-2").await);
    }

    #[tokio::test]
    async fn test_malformed_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("used_licenses.json");
        std::fs::write(&path, "not json at all").unwrap();

        let ledger = RedemptionLedger::new(path);
        assert!(!ledger.has_consumed("REM-1").await);
    }

    #[tokio::test]
    async fn test_persist_failure_surfaces_error() {
        let ledger = RedemptionLedger::new(PathBuf::from("/nonexistent-dir/ledger.json"));
        let err = ledger.record("REM-1").await.unwrap_err();
        assert!(matches!(err, LedgerError::Io(_)));
    }

    #[tokio::test]
    async fn test_key_stays_blocked_in_memory_after_persist_failure() {
        // Fail closed: if the write fails the key is still held consumed for
        // the lifetime of this process.
        let ledger = RedemptionLedger::new(PathBuf::from("/nonexistent-dir/ledger.json"));
        assert!(ledger.record("REM-1").await.is_err());
        assert!(ledger.has_consumed("REM-1").await);
    }
}
