//! Session usage threshold alerts.
//!
//! Each threshold fires at most once per session window. A drop in the
//! session percentage means the window rolled over and re-arms every
//! threshold.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::state::write_json_file;

/// Default alert thresholds in percent
pub const DEFAULT_THRESHOLDS: [u8; 3] = [80, 90, 95];

/// Alert progress within the current session window
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertState {
    /// Thresholds already fired in this window
    pub notified: BTreeSet<u8>,
    /// Session percent seen by the last check
    pub last_session: Option<u8>,
}

/// Tracks which thresholds have fired in the current session window
#[derive(Debug, Clone)]
pub struct ThresholdAlerts {
    thresholds: Vec<u8>,
    state: AlertState,
    state_file: Option<PathBuf>,
}

impl ThresholdAlerts {
    /// Thresholds are sorted and deduplicated; 0 and values above 100 are dropped
    pub fn new(thresholds: &[u8]) -> Self {
        let set: BTreeSet<u8> = thresholds
            .iter()
            .copied()
            .filter(|t| (1..=100).contains(t))
            .collect();
        Self {
            thresholds: set.into_iter().collect(),
            state: AlertState::default(),
            state_file: None,
        }
    }

    /// Remember fired thresholds in `path`, restoring any previous state
    pub fn with_state_file(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if path.exists() {
            match read_alert_state(&path) {
                Ok(state) => self.state = state,
                Err(e) => warn!("Ignoring unreadable alert state: {:#}", e),
            }
        }
        self.state_file = Some(path);
        self
    }

    pub fn thresholds(&self) -> &[u8] {
        &self.thresholds
    }

    pub fn state(&self) -> &AlertState {
        &self.state
    }

    /// Record a new session percentage and return thresholds newly crossed
    pub fn check(&mut self, session_percent: u8) -> Vec<u8> {
        let before = self.state.clone();
        let state = &mut self.state;

        if let Some(previous) = state.last_session {
            if session_percent < previous && !state.notified.is_empty() {
                debug!(
                    "Session usage dropped {}% -> {}%, re-arming alerts",
                    previous, session_percent
                );
                state.notified.clear();
            }
        }
        state.last_session = Some(session_percent);

        let crossed: Vec<u8> = self
            .thresholds
            .iter()
            .copied()
            .filter(|t| session_percent >= *t && !state.notified.contains(t))
            .collect();
        state.notified.extend(crossed.iter().copied());

        if self.state != before {
            self.persist();
        }
        crossed
    }

    fn persist(&self) {
        if let Some(ref path) = self.state_file {
            if let Err(e) = write_json_file(path, &self.state) {
                warn!("Failed to persist alert state: {}", e);
            }
        }
    }
}

fn read_alert_state(path: &Path) -> Result<AlertState> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read alert state: {:?}", path))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse alert state: {:?}", path))
}

/// Runs an external command for each alert, e.g. `notify-send`.
///
/// The title and message are appended as the last two arguments.
#[derive(Debug, Clone)]
pub struct AlertNotifier {
    command: Vec<String>,
}

impl AlertNotifier {
    /// Returns `None` for an empty command
    pub fn new(command: Vec<String>) -> Option<Self> {
        if command.first().map_or(true, |p| p.trim().is_empty()) {
            return None;
        }
        Some(Self { command })
    }

    /// Spawn the notifier without waiting for it.
    ///
    /// Must be called inside a tokio runtime, which reaps the child.
    pub fn notify(&self, title: &str, message: &str) {
        let (program, args) = match self.command.split_first() {
            Some(split) => split,
            None => return,
        };
        let result = Command::new(program)
            .args(args)
            .arg(title)
            .arg(message)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        if let Err(e) = result {
            warn!("Failed to run alert command {}: {}", program, e);
        }
    }
}

/// Title and message for a crossed threshold
pub fn alert_text(threshold: u8, session_percent: u8) -> (String, String) {
    (
        "Claude Usage Alert".to_string(),
        format!(
            "Session usage has reached {}% (threshold {}%)",
            session_percent, threshold
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_thresholds_normalized() {
        let alerts = ThresholdAlerts::new(&[95, 80, 0, 90, 80, 150]);
        assert_eq!(alerts.thresholds(), &[80, 90, 95]);
    }

    #[test]
    fn test_each_threshold_fires_once() {
        let mut alerts = ThresholdAlerts::new(&DEFAULT_THRESHOLDS);
        assert!(alerts.check(50).is_empty());
        assert_eq!(alerts.check(82), vec![80]);
        assert!(alerts.check(85).is_empty());
        assert_eq!(alerts.check(96), vec![90, 95]);
        assert!(alerts.check(99).is_empty());
    }

    #[test]
    fn test_drop_rearms() {
        let mut alerts = ThresholdAlerts::new(&DEFAULT_THRESHOLDS);
        assert_eq!(alerts.check(91), vec![80, 90]);
        // New session window
        assert!(alerts.check(3).is_empty());
        assert_eq!(alerts.check(81), vec![80]);
    }

    #[test]
    fn test_state_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.json");

        let mut alerts = ThresholdAlerts::new(&DEFAULT_THRESHOLDS).with_state_file(&path);
        assert_eq!(alerts.check(85), vec![80]);

        // Same window after a restart
        let mut restored = ThresholdAlerts::new(&DEFAULT_THRESHOLDS).with_state_file(&path);
        assert_eq!(
            restored.state(),
            &AlertState {
                notified: BTreeSet::from([80]),
                last_session: Some(85),
            }
        );
        assert!(restored.check(85).is_empty());
        assert_eq!(restored.check(91), vec![90]);

        // Window rolled over while stopped
        let mut restored = ThresholdAlerts::new(&DEFAULT_THRESHOLDS).with_state_file(&path);
        assert!(restored.check(2).is_empty());
        assert_eq!(restored.check(80), vec![80]);
    }

    #[test]
    fn test_corrupt_state_file_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.json");
        fs::write(&path, "[1, 2").unwrap();

        let mut alerts = ThresholdAlerts::new(&DEFAULT_THRESHOLDS).with_state_file(&path);
        assert_eq!(alerts.state(), &AlertState::default());
        assert_eq!(alerts.check(81), vec![80]);
        assert!(read_alert_state(&path).is_ok());
    }

    #[test]
    fn test_notifier_requires_command() {
        assert!(AlertNotifier::new(Vec::new()).is_none());
        assert!(AlertNotifier::new(vec![" ".to_string()]).is_none());
        assert!(AlertNotifier::new(vec!["notify-send".to_string()]).is_some());
    }

    #[test]
    fn test_alert_text() {
        let (title, message) = alert_text(80, 83);
        assert_eq!(title, "Claude Usage Alert");
        assert_eq!(message, "Session usage has reached 83% (threshold 80%)");
    }
}
