//! Error taxonomy for extraction cycles.
//!
//! Every variant is non-fatal: the orchestrator converts them into a status
//! flag plus a last-error message and waits for the next tick.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// The page text did not contain the required figures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    /// Session or weekly percent was not found after a full scan
    #[error("missing usage data")]
    MissingUsageData,
}

/// Failure to obtain the page text
#[derive(Debug, Error)]
pub enum SourceError {
    /// No command configured for a command source
    #[error("no page source command configured")]
    EmptyCommand,

    /// The source program could not be started
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The source program exited unsuccessfully
    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },

    /// Reading the page text failed
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure to hand a record to a downstream consumer
#[derive(Debug, Error)]
pub enum SinkError {
    /// Record could not be serialized
    #[error("failed to serialize usage record: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Filesystem write failed
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Socket connection or write failed
    #[error("failed to send to socket {}: {source}", .path.display())]
    Socket {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of a failed extraction cycle
#[derive(Debug, Error)]
pub enum CycleError {
    /// Another cycle is already in flight
    #[error("an extraction cycle is already running")]
    Busy,

    /// The page did not finish loading in time
    #[error("page load timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The page source failed
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The page text was loaded but could not be parsed
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ExtractionError::MissingUsageData.to_string(),
            "missing usage data"
        );
        assert_eq!(
            CycleError::Timeout(Duration::from_secs(10)).to_string(),
            "page load timed out after 10s"
        );
        assert_eq!(
            CycleError::from(ExtractionError::MissingUsageData).to_string(),
            "missing usage data"
        );
    }
}
