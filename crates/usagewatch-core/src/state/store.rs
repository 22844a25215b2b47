use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::SinkError;
use crate::usage::UsageRecord;

/// Outcome of the most recent cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeStatus {
    /// No cycle has completed yet
    #[default]
    Initialized,
    /// Last cycle produced a record
    Success,
    /// Last cycle failed
    Error,
}

/// Status query surface
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// When the last successful record was stored
    pub last_scrape: Option<DateTime<Utc>>,
    /// Last known good record (kept across failed cycles)
    pub last_record: Option<UsageRecord>,
    /// Outcome of the last cycle
    pub status: ScrapeStatus,
    /// Message of the last failure, cleared on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Single-writer slot holding the current status.
///
/// Cloning shares the slot. When a status file is configured, every update
/// is mirrored to it so the `status` command and the next start can read it.
#[derive(Debug, Clone, Default)]
pub struct StatusStore {
    inner: Arc<RwLock<StatusSnapshot>>,
    status_file: Option<PathBuf>,
}

impl StatusStore {
    /// Create an in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store mirrored to `path`, restoring any previous status
    pub fn with_status_file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let initial = if path.exists() {
            match read_status_file(&path) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!("Ignoring unreadable status file: {:#}", e);
                    StatusSnapshot::default()
                }
            }
        } else {
            StatusSnapshot::default()
        };

        Self {
            inner: Arc::new(RwLock::new(initial)),
            status_file: Some(path),
        }
    }

    /// Owned copy of the current status
    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner.read().clone()
    }

    /// Store a new record, replacing the previous one
    pub fn record_success(&self, record: UsageRecord) -> StatusSnapshot {
        let snapshot = {
            let mut state = self.inner.write();
            state.last_scrape = Some(Utc::now());
            state.last_record = Some(record);
            state.status = ScrapeStatus::Success;
            state.last_error = None;
            state.clone()
        };
        self.persist(&snapshot);
        snapshot
    }

    /// Mark the last cycle as failed, keeping the last good record
    pub fn record_failure(&self, message: impl Into<String>) -> StatusSnapshot {
        let snapshot = {
            let mut state = self.inner.write();
            state.status = ScrapeStatus::Error;
            state.last_error = Some(message.into());
            state.clone()
        };
        self.persist(&snapshot);
        snapshot
    }

    fn persist(&self, snapshot: &StatusSnapshot) {
        if let Some(ref path) = self.status_file {
            if let Err(e) = write_status_file(path, snapshot) {
                warn!("Failed to persist status: {}", e);
            }
        }
    }
}

/// Read a status file written by [`write_status_file`]
pub fn read_status_file(path: &Path) -> Result<StatusSnapshot> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read status file: {:?}", path))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse status file: {:?}", path))
}

/// Write the status as pretty JSON, replacing the file atomically
pub fn write_status_file(path: &Path, snapshot: &StatusSnapshot) -> Result<(), SinkError> {
    write_json_file(path, snapshot)
}

/// Write `value` as pretty JSON via a temp file and rename, creating parents
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), SinkError> {
    let json = serde_json::to_string_pretty(value)?;
    let write_err = |source| SinkError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    let temp = path.with_extension("json.tmp");
    fs::write(&temp, json).map_err(write_err)?;
    fs::rename(&temp, path).map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(session: u8) -> UsageRecord {
        UsageRecord {
            session,
            weekly: 30,
            session_reset_time: None,
            weekly_reset_time: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_initial_snapshot() {
        let store = StatusStore::new();
        let snapshot = store.snapshot();
        assert_eq!(snapshot.status, ScrapeStatus::Initialized);
        assert!(snapshot.last_record.is_none());
        assert!(snapshot.last_scrape.is_none());
    }

    #[test]
    fn test_failure_keeps_last_record() {
        let store = StatusStore::new();
        store.record_success(record(17));
        let snapshot = store.record_failure("page load timed out after 10s");

        assert_eq!(snapshot.status, ScrapeStatus::Error);
        assert_eq!(snapshot.last_record.map(|r| r.session), Some(17));
        assert_eq!(
            snapshot.last_error.as_deref(),
            Some("page load timed out after 10s")
        );

        let snapshot = store.record_success(record(20));
        assert_eq!(snapshot.status, ScrapeStatus::Success);
        assert!(snapshot.last_error.is_none());
    }

    #[test]
    fn test_clones_share_slot() {
        let store = StatusStore::new();
        let reader = store.clone();
        store.record_success(record(55));
        assert_eq!(reader.snapshot().last_record.map(|r| r.session), Some(55));
    }

    #[test]
    fn test_status_file_roundtrip_across_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("status.json");

        let store = StatusStore::with_status_file(&path);
        let written = store.record_success(record(64));

        let restored = StatusStore::with_status_file(&path);
        assert_eq!(restored.snapshot(), written);
        assert_eq!(read_status_file(&path).unwrap(), written);
    }

    #[test]
    fn test_status_file_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.json");
        let store = StatusStore::with_status_file(&path);
        store.record_failure("missing usage data");

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["lastError"], "missing usage data");
        assert!(value["lastRecord"].is_null());
        assert!(value["lastScrape"].is_null());
    }

    #[test]
    fn test_corrupt_status_file_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.json");
        fs::write(&path, "{ not json").unwrap();

        let store = StatusStore::with_status_file(&path);
        assert_eq!(store.snapshot(), StatusSnapshot::default());
        assert!(read_status_file(&path).is_err());
    }
}
