//! Wiring of settings into the core orchestrator, and the headless commands.

use std::io::Read;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use usagewatch_core::alerts::{AlertNotifier, ThresholdAlerts};
use usagewatch_core::monitor::Orchestrator;
use usagewatch_core::presentation::{DetailView, Indicator};
use usagewatch_core::sink::{FileSink, SocketSink};
use usagewatch_core::source::{CommandSource, ConfiguredSource, FileSource};
use usagewatch_core::state::{read_status_file, StatusSnapshot, StatusStore};
use usagewatch_core::usage::extract_usage;

use crate::config::{Settings, SourceKind, SourceSettings};

/// Build the page source described by the settings
pub fn build_source(settings: &SourceSettings) -> Result<ConfiguredSource> {
    match settings.kind {
        SourceKind::Command => {
            let source = CommandSource::new(&settings.command)
                .context("Set [source] command in the config file")?;
            Ok(ConfiguredSource::Command(source))
        }
        SourceKind::File => match settings.path {
            Some(ref path) => Ok(ConfiguredSource::File(FileSource::new(path))),
            None => bail!("[source] kind = \"file\" requires a path"),
        },
    }
}

/// Build an orchestrator with the configured source, sinks and alerts
pub fn build_orchestrator(settings: &Settings) -> Result<Orchestrator<ConfiguredSource>> {
    let source = build_source(&settings.source)?;
    info!("Page source: {}", source.describe());

    let store = StatusStore::with_status_file(settings.status_file_path());
    let mut orchestrator = Orchestrator::new(source, store)
        .with_load_timeout(Duration::from_secs(settings.source.load_timeout_secs));

    if settings.sink.file_enabled {
        match settings.sink.file {
            Some(ref path) => orchestrator = orchestrator.with_sink(FileSink::new(path)),
            None => warn!("File sink enabled but no handoff path could be determined"),
        }
    }
    if let Some(ref socket) = settings.sink.socket {
        orchestrator = orchestrator.with_sink(SocketSink::new(socket));
    }

    if settings.alerts.enabled {
        let notifier = AlertNotifier::new(settings.alerts.command.clone());
        let alerts = ThresholdAlerts::new(&settings.alerts.thresholds)
            .with_state_file(settings.alert_state_path());
        orchestrator = orchestrator.with_alerts(alerts, notifier);
    }

    Ok(orchestrator)
}

/// Scheduling interval from settings
pub fn interval(settings: &Settings) -> Duration {
    Duration::from_secs(settings.interval_minutes.saturating_mul(60))
}

/// Scrape on a schedule until Ctrl+C
pub async fn run_daemon(settings: &Settings) -> Result<()> {
    let handle = build_orchestrator(settings)?.spawn(interval(settings));
    let mut updates = handle.subscribe();

    info!(
        "usagewatch started (every {} min, status {:?})",
        settings.interval_minutes,
        settings.status_file_path()
    );

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl+C")?;
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                info!("Indicator: {}", Indicator::from_snapshot(&snapshot));
            }
        }
    }

    handle.shutdown().await;
    info!("usagewatch stopped");
    Ok(())
}

/// Run a single cycle and print the record JSON
pub async fn run_once(settings: &Settings) -> Result<()> {
    let orchestrator = build_orchestrator(settings)?;
    let record = orchestrator
        .run_cycle()
        .await
        .context("Extraction cycle failed")?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

/// Print the last persisted status
pub fn show_status(settings: &Settings, json: bool) -> Result<()> {
    let path = settings.status_file_path();
    let snapshot = if path.exists() {
        read_status_file(&path)?
    } else {
        StatusSnapshot::default()
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print!(
            "{}",
            DetailView::from_snapshot(&snapshot, chrono::Utc::now()).render_text()
        );
    }
    Ok(())
}

/// Run the extractor on saved page text and print the record JSON
pub fn run_extract(file: Option<&Path>) -> Result<()> {
    let text = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read page text: {:?}", path))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read page text from stdin")?;
            buf
        }
    };

    let record = extract_usage(&text)?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
