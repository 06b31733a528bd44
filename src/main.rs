//! Bookfix - Interactive ebook text cleanup
//!
//! Main entry point for the terminal application.
//!
//! # Overview
//!
//! This binary wires the library together for one session. It initializes:
//! - Configuration loading ([`ConfigManager`]: `.data.txt` rules + YAML settings)
//! - Logging infrastructure (daily rolling file + optional stderr console)
//! - Tokio runtime (pipeline steps run on blocking workers)
//! - State management ([`StateManager`])
//! - The session controller, driven by a [`TerminalHost`] on stdin/stdout
//!
//! # Execution Flow
//!
//! 1. Load settings from `bookfix_data/bookfix_settings.yaml` (defaults if absent)
//! 2. Initialize logging → `logs/bookfix.<date>`
//! 3. Create the tokio runtime
//! 4. Run the session: select file, pipeline, interactive passes, save
//! 5. Log metrics and shut the runtime down
//!
//! # Usage
//!
//! `bookfix [INPUT]`: with no input path the user is asked for one, starting
//! from the default directory in the data file. `--help` and `--version` print
//! and exit with code 0.
//!
//! Exit code 0 on normal completion or when a startup prompt is cancelled;
//! non-zero when the input cannot be read or initialization fails.

use anyhow::Result;
use bookfix::logging::{LOG_PREFIX, setup_logging_with_console};
use bookfix::ui::{SessionController, SessionOutcome, TerminalHost};
use bookfix::{APP_NAME, ConfigManager, Metrics, StateManager, VERSION};
use camino::Utf8PathBuf;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;

/// Directory holding `.data.txt` and the settings file
const CONFIG_DIR: &str = "bookfix_data";

#[derive(Parser, Debug)]
#[command(name = "bookfix", version, about = "Interactive ebook text cleanup")]
struct Cli {
    /// Text or (X)HTML file to clean; prompted for when omitted
    input: Option<Utf8PathBuf>,
}

fn main() -> Result<()> {
    // Before any disk access
    let cli = Cli::parse();

    let config_manager = ConfigManager::new(CONFIG_DIR)?;

    // Settings decide how logging is set up, so a load failure is held until
    // the subscriber exists
    let (settings, settings_error) = match config_manager.load_settings() {
        Ok(settings) => (settings, None),
        Err(e) => (Default::default(), Some(e)),
    };

    let _guard = setup_logging_with_console(
        &settings.log_dir,
        LOG_PREFIX,
        settings.debug_mode,
        settings.console_logging,
    )?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);
    if let Some(e) = settings_error {
        tracing::warn!("Failed to load settings, using defaults: {:#}", e);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("bookfix-worker")
        .build()?;

    let metrics = Arc::new(Metrics::new());
    let controller = SessionController::new(
        Arc::new(StateManager::new()),
        config_manager,
        settings,
        Arc::clone(&metrics),
    );

    let mut host = TerminalHost::stdio();
    let result = runtime.block_on(controller.run_session(&mut host, cli.input));

    metrics.log_summary();
    runtime.shutdown_timeout(Duration::from_secs(5));

    match result {
        Ok(SessionOutcome::Saved(path)) => {
            tracing::info!("Output written to {}", path);
            Ok(())
        }
        Ok(SessionOutcome::Unsaved) => {
            tracing::info!("Session ended without saving");
            Ok(())
        }
        Ok(SessionOutcome::Cancelled) => {
            tracing::info!("Cancelled at startup");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Session failed: {:#}", e);
            Err(e)
        }
    }
}
