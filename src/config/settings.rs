use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use usagewatch_core::alerts::DEFAULT_THRESHOLDS;
use usagewatch_core::sink::DEFAULT_HANDOFF_FILE;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Relay Claude usage dashboard percentages")]
pub struct Config {
    /// Enable debug mode
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Scrape interval in minutes
    #[arg(short = 'i', long, global = true)]
    pub interval: Option<u64>,

    /// Subcommand (defaults to `run`)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Scrape on a schedule until interrupted
    Run,
    /// Scrape once and print the record as JSON
    Once,
    /// Show the last known status
    Status {
        /// Print the raw status JSON
        #[arg(long)]
        json: bool,
    },
    /// Open the terminal popup (r: scrape now, q: quit)
    Watch,
    /// Extract a record from saved page text (stdin if no file)
    Extract {
        /// File containing the page's visible text
        file: Option<PathBuf>,
    },
}

impl Config {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Subcommand to execute
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run)
    }

    /// Check if running the terminal popup
    pub fn is_watch_mode(&self) -> bool {
        matches!(self.command, Some(Command::Watch))
    }
}

/// Application settings (from config file)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Scrape interval in minutes
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,

    /// Where the last status is persisted (default: state dir)
    #[serde(default)]
    pub status_file: Option<PathBuf>,

    /// Page text source
    #[serde(default)]
    pub source: SourceSettings,

    /// Record handoff settings
    #[serde(default)]
    pub sink: SinkSettings,

    /// Threshold alert settings
    #[serde(default)]
    pub alerts: AlertSettings,

    /// UI settings
    #[serde(default)]
    pub ui: UiSettings,
}

fn default_interval_minutes() -> u64 {
    5
}

/// Kind of page source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Run a command that prints the page text
    #[default]
    Command,
    /// Read the page text from a file
    File,
}

/// Page source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSettings {
    #[serde(default)]
    pub kind: SourceKind,

    /// Program and arguments (for `kind = "command"`)
    #[serde(default)]
    pub command: Vec<String>,

    /// Text file path (for `kind = "file"`)
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Maximum time to wait for the page, in seconds
    #[serde(default = "default_load_timeout")]
    pub load_timeout_secs: u64,
}

fn default_load_timeout() -> u64 {
    10
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            command: Vec::new(),
            path: None,
            load_timeout_secs: default_load_timeout(),
        }
    }
}

/// Record handoff settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkSettings {
    /// Write the record JSON to `file`
    #[serde(default = "default_file_enabled")]
    pub file_enabled: bool,

    /// Handoff file (default: ~/Downloads/claude-auto-usage.json)
    #[serde(default = "default_handoff_file")]
    pub file: Option<PathBuf>,

    /// Unix socket to send each record to as ndjson
    #[serde(default)]
    pub socket: Option<PathBuf>,
}

fn default_file_enabled() -> bool {
    true
}

fn default_handoff_file() -> Option<PathBuf> {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Downloads")))
        .map(|d| d.join(DEFAULT_HANDOFF_FILE))
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            file_enabled: default_file_enabled(),
            file: default_handoff_file(),
            socket: None,
        }
    }
}

/// Threshold alert settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertSettings {
    /// Enable threshold alerts
    #[serde(default = "default_alerts_enabled")]
    pub enabled: bool,

    /// Session percentages that trigger an alert, once per session window
    #[serde(default = "default_thresholds")]
    pub thresholds: Vec<u8>,

    /// Command run for each alert, title and message appended
    /// (e.g. `["notify-send"]`)
    #[serde(default)]
    pub command: Vec<String>,

    /// Where fired thresholds are remembered across restarts (default: state dir)
    #[serde(default)]
    pub state_file: Option<PathBuf>,
}

fn default_alerts_enabled() -> bool {
    true
}

fn default_thresholds() -> Vec<u8> {
    DEFAULT_THRESHOLDS.to_vec()
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            enabled: default_alerts_enabled(),
            thresholds: default_thresholds(),
            command: Vec::new(),
            state_file: None,
        }
    }
}

/// UI-related settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiSettings {
    /// Color the indicator by usage tier
    #[serde(default = "default_color")]
    pub color: bool,
}

fn default_color() -> bool {
    true
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            color: default_color(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            status_file: None,
            source: SourceSettings::default(),
            sink: SinkSettings::default(),
            alerts: AlertSettings::default(),
            ui: UiSettings::default(),
        }
    }
}

/// Directory for the status file and the watch-mode log
pub fn state_dir() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join("usagewatch")
}

impl Settings {
    /// Load settings from config file or use defaults
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        // Try custom path first
        if let Some(p) = path {
            if p.exists() {
                let content = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config file: {:?}", p))?;
                return toml::from_str(&content)
                    .with_context(|| format!("Failed to parse config file: {:?}", p));
            }
        }

        let default_paths = [
            dirs::config_dir().map(|p| p.join("usagewatch/config.toml")),
            dirs::home_dir().map(|p| p.join(".config/usagewatch/config.toml")),
            dirs::home_dir().map(|p| p.join(".usagewatch.toml")),
        ];

        for path in default_paths.iter().flatten() {
            if path.exists() {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {:?}", path))?;
                return toml::from_str(&content)
                    .with_context(|| format!("Failed to parse config file: {:?}", path));
            }
        }

        Ok(Self::default())
    }

    /// Merge CLI config into settings (CLI takes precedence)
    pub fn merge_cli(&mut self, cli: &Config) {
        if let Some(interval) = cli.interval {
            self.interval_minutes = interval;
        }
    }

    /// Validate and normalize settings values
    pub fn validate(&mut self) {
        const MIN_INTERVAL_MINUTES: u64 = 1;
        const MAX_INTERVAL_MINUTES: u64 = 24 * 60;
        const MIN_LOAD_TIMEOUT_SECS: u64 = 1;

        self.interval_minutes = self
            .interval_minutes
            .clamp(MIN_INTERVAL_MINUTES, MAX_INTERVAL_MINUTES);
        if self.source.load_timeout_secs < MIN_LOAD_TIMEOUT_SECS {
            self.source.load_timeout_secs = MIN_LOAD_TIMEOUT_SECS;
        }

        self.alerts.thresholds.retain(|t| (1..=100).contains(t));
        self.alerts.thresholds.sort_unstable();
        self.alerts.thresholds.dedup();
    }

    /// Status file path, falling back to the state dir
    pub fn status_file_path(&self) -> PathBuf {
        self.status_file
            .clone()
            .unwrap_or_else(|| state_dir().join("status.json"))
    }

    /// Alert state file path, next to the status file
    pub fn alert_state_path(&self) -> PathBuf {
        self.alerts
            .state_file
            .clone()
            .unwrap_or_else(|| state_dir().join("alerts.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.interval_minutes, 5);
        assert_eq!(settings.source.kind, SourceKind::Command);
        assert_eq!(settings.source.load_timeout_secs, 10);
        assert!(settings.sink.file_enabled);
        assert_eq!(settings.alerts.thresholds, vec![80, 90, 95]);
        assert!(settings.ui.color);
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            interval_minutes = 15

            [source]
            kind = "file"
            path = "/tmp/usage-page.txt"
            load_timeout_secs = 30

            [sink]
            file = "/tmp/usage.json"
            socket = "/tmp/usage.sock"

            [alerts]
            thresholds = [70]
            command = ["notify-send", "-u", "critical"]
        "#;

        let settings: Settings = toml::from_str(toml).expect("Should parse TOML");
        assert_eq!(settings.interval_minutes, 15);
        assert_eq!(settings.source.kind, SourceKind::File);
        assert_eq!(
            settings.source.path,
            Some(PathBuf::from("/tmp/usage-page.txt"))
        );
        assert_eq!(settings.source.load_timeout_secs, 30);
        assert_eq!(settings.sink.file, Some(PathBuf::from("/tmp/usage.json")));
        assert_eq!(settings.sink.socket, Some(PathBuf::from("/tmp/usage.sock")));
        assert_eq!(settings.alerts.thresholds, vec![70]);
        assert_eq!(settings.alerts.command.len(), 3);
    }

    #[test]
    fn test_validate_normalizes() {
        let mut settings = Settings::default();
        settings.interval_minutes = 0;
        settings.source.load_timeout_secs = 0;
        settings.alerts.thresholds = vec![95, 0, 80, 80, 120];
        settings.validate();

        assert_eq!(settings.interval_minutes, 1);
        assert_eq!(settings.source.load_timeout_secs, 1);
        assert_eq!(settings.alerts.thresholds, vec![80, 95]);

        settings.interval_minutes = u64::MAX / 60 + 1;
        settings.validate();
        assert_eq!(settings.interval_minutes, 1440);
    }

    #[test]
    fn test_merge_cli_interval() {
        let cli = Config::parse_from(["usagewatch", "--interval", "2", "once"]);
        let mut settings = Settings::default();
        settings.merge_cli(&cli);
        assert_eq!(settings.interval_minutes, 2);
        assert_eq!(cli.command(), Command::Once);
    }

    #[test]
    fn test_default_command_is_run() {
        let cli = Config::parse_from(["usagewatch"]);
        assert_eq!(cli.command(), Command::Run);
        assert!(!cli.is_watch_mode());
    }

    #[test]
    fn test_load_custom_path() {
        let dir = tempfile::tempdir().unwrap();
        let custom = dir.path().join("config.toml");
        std::fs::write(&custom, "interval_minutes = 9\n").unwrap();

        let settings = Settings::load(Some(&custom)).unwrap();
        assert_eq!(settings.interval_minutes, 9);

        std::fs::write(&custom, "interval_minutes = \"soon\"\n").unwrap();
        assert!(Settings::load(Some(&custom)).is_err());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_status_file_under_state_dir() {
        temp_env::with_var("XDG_STATE_HOME", Some("/var/tmp/uw-state"), || {
            let settings = Settings::default();
            assert_eq!(
                settings.status_file_path(),
                PathBuf::from("/var/tmp/uw-state/usagewatch/status.json")
            );
        });
    }
}
