//! Page text providers.
//!
//! A source opens the usage page out of view and returns its visible text.
//! The orchestrator bounds every fetch with a timeout; sources themselves
//! just load and return.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::error::SourceError;

/// Something that can produce the usage page's visible text
pub trait PageSource: Send + Sync {
    /// Load the page and return its text, lines separated by newlines
    fn fetch_text(&self) -> impl Future<Output = Result<String, SourceError>> + Send;
}

/// Runs an external program and uses its stdout as the page text.
///
/// Typically a headless browser script that loads the dashboard and prints
/// `document.body.innerText`. The child is killed if the fetch is dropped.
#[derive(Debug, Clone)]
pub struct CommandSource {
    program: String,
    args: Vec<String>,
}

impl CommandSource {
    /// Create a source from `[program, args...]`
    pub fn new(command: &[String]) -> Result<Self, SourceError> {
        let (program, args) = command.split_first().ok_or(SourceError::EmptyCommand)?;
        if program.trim().is_empty() {
            return Err(SourceError::EmptyCommand);
        }
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    /// Program name, for logging
    pub fn program(&self) -> &str {
        &self.program
    }
}

impl PageSource for CommandSource {
    async fn fetch_text(&self) -> Result<String, SourceError> {
        debug!("Page source: running {} {:?}", self.program, self.args);

        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| SourceError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SourceError::CommandFailed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Reads the page text from a file written by another tool
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PageSource for FileSource {
    async fn fetch_text(&self) -> Result<String, SourceError> {
        debug!("Page source: reading {}", self.path.display());
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| SourceError::Io {
                path: self.path.clone(),
                source,
            })
    }
}

/// Source selected at runtime from settings
#[derive(Debug, Clone)]
pub enum ConfiguredSource {
    Command(CommandSource),
    File(FileSource),
}

impl ConfiguredSource {
    /// Short human-readable description
    pub fn describe(&self) -> String {
        match self {
            ConfiguredSource::Command(c) => format!("command `{}`", c.program()),
            ConfiguredSource::File(f) => format!("file {}", f.path().display()),
        }
    }
}

impl PageSource for ConfiguredSource {
    async fn fetch_text(&self) -> Result<String, SourceError> {
        match self {
            ConfiguredSource::Command(source) => source.fetch_text().await,
            ConfiguredSource::File(source) => source.fetch_text().await,
        }
    }
}
