//! Downstream consumers of each new usage record.
//!
//! The orchestrator publishes every successful record to all configured
//! sinks. A failing sink is logged and skipped; it never undoes the
//! in-memory update.

use std::fs;
use std::io::Write;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::error::SinkError;
use crate::usage::UsageRecord;

/// Default file name of the handoff artifact
pub const DEFAULT_HANDOFF_FILE: &str = "claude-auto-usage.json";

/// Write timeout for socket sinks
const SOCKET_WRITE_TIMEOUT: Duration = Duration::from_secs(2);

/// A consumer of usage records
pub trait UsageSink: Send + Sync {
    /// Name used in log messages
    fn name(&self) -> &str;

    /// Hand the record to the consumer
    fn publish(&self, record: &UsageRecord) -> Result<(), SinkError>;
}

/// Writes the latest record as JSON to a fixed path.
///
/// The previous artifact is replaced atomically (temp file + rename), so a
/// reader never sees a half-written file and only one artifact exists.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
    name: String,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = format!("file:{}", path.display());
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| DEFAULT_HANDOFF_FILE.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl UsageSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn publish(&self, record: &UsageRecord) -> Result<(), SinkError> {
        let json = serde_json::to_vec(record)?;
        let write_err = |source| SinkError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let temp = self.temp_path();
        fs::write(&temp, &json).map_err(write_err)?;
        fs::rename(&temp, &self.path).map_err(write_err)?;

        debug!("Wrote usage record to {}", self.path.display());
        Ok(())
    }
}

/// Sends each record as one ndjson line to a Unix domain socket
#[derive(Debug, Clone)]
pub struct SocketSink {
    path: PathBuf,
    name: String,
}

impl SocketSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = format!("socket:{}", path.display());
        Self { path, name }
    }
}

impl UsageSink for SocketSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn publish(&self, record: &UsageRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let socket_err = |source| SinkError::Socket {
            path: self.path.clone(),
            source,
        };
        let mut stream = UnixStream::connect(&self.path).map_err(socket_err)?;
        stream
            .set_write_timeout(Some(SOCKET_WRITE_TIMEOUT))
            .map_err(socket_err)?;
        stream.write_all(&line).map_err(socket_err)?;

        debug!("Sent usage record to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::io::Read;
    use std::os::unix::net::UnixListener;

    fn record(session: u8) -> UsageRecord {
        UsageRecord {
            session,
            weekly: 42,
            session_reset_time: Some("3시간 후".to_string()),
            weekly_reset_time: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_file_sink_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(DEFAULT_HANDOFF_FILE);
        let sink = FileSink::new(&path);

        sink.publish(&record(17)).unwrap();
        sink.publish(&record(23)).unwrap();

        let written: UsageRecord =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written.session, 23);

        // Only the artifact remains, no temp file
        let entries: Vec<_> = fs::read_dir(path.parent().unwrap()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_file_sink_unwritable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();

        let sink = FileSink::new(blocker.join("usage.json"));
        assert!(matches!(
            sink.publish(&record(1)),
            Err(SinkError::Write { .. })
        ));
    }

    #[test]
    fn test_socket_sink_sends_ndjson() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("usage.sock");
        let listener = UnixListener::bind(&sock).unwrap();

        let sink = SocketSink::new(&sock);
        sink.publish(&record(17)).unwrap();

        let (mut stream, _) = listener.accept().unwrap();
        let mut received = String::new();
        stream.read_to_string(&mut received).unwrap();

        assert!(received.ends_with('\n'));
        let parsed: UsageRecord = serde_json::from_str(received.trim_end()).unwrap();
        assert_eq!(parsed.session, 17);
    }

    #[test]
    fn test_socket_sink_no_listener() {
        let dir = tempfile::tempdir().unwrap();
        let sink = SocketSink::new(dir.path().join("missing.sock"));
        assert!(matches!(
            sink.publish(&record(1)),
            Err(SinkError::Socket { .. })
        ));
        assert!(sink.name().starts_with("socket:"));
    }
}
