use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use usagewatch::config::{state_dir, Command, Config, Settings};
use usagewatch::runner;
use usagewatch::ui::App;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Config::parse_args();

    // Setup logging
    setup_logging(cli.debug, cli.is_watch_mode())?;

    // Load settings
    let mut settings = Settings::load(cli.config.as_ref())?;
    settings.merge_cli(&cli);
    settings.validate();

    match cli.command() {
        Command::Run => runner::run_daemon(&settings).await,
        Command::Once => runner::run_once(&settings).await,
        Command::Status { json } => runner::show_status(&settings, json),
        Command::Extract { file } => runner::run_extract(file.as_deref()),
        Command::Watch => {
            let mut app = App::new(settings);
            app.run().await
        }
    }
}

/// Log to stderr, or to a file in the state dir while the popup owns the terminal
fn setup_logging(debug: bool, to_file: bool) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("usagewatch=debug,usagewatch_core=debug")
    } else {
        EnvFilter::new("usagewatch=info,usagewatch_core=info")
    };

    let (stderr_layer, file_layer) = if to_file {
        let dir = state_dir();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create state directory: {:?}", dir))?;
        let path = dir.join("usagewatch.log");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file: {:?}", path))?;
        let layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_ansi(false)
            .with_writer(Mutex::new(file));
        (None, Some(layer))
    } else {
        let layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr);
        (Some(layer), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(())
}
