//! Subtrad - Batch English to French subtitle translation
//!
//! Entry point: loads configuration, sets up logging and dispatches the
//! library run, single-file translation or config bootstrap commands.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use tracing::{info, warn, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use subtrad::cli::{Args, Commands};
use subtrad::config::{Config, RunMode};
use subtrad::library::output_path_for_subtitle;
use subtrad::schedule::spawn_interrupt_listener;
use subtrad::workflow::{JobOutcome, Workflow};

const DEFAULT_CONFIG_FILE: &str = "subtrad.toml";
const LOG_FILE: &str = "subtrad.log";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    setup_logging(&config.logging.log_dir, args.verbose)?;
    info!("Starting Subtrad - English to French subtitle translation");

    config.apply_env_overrides()?;
    let interrupt = spawn_interrupt_listener();

    match args.command {
        Commands::Run { folders, once } => {
            if !folders.is_empty() {
                config.run.source_folders = folders;
            }
            if once {
                config.run.mode = RunMode::SinglePass;
            }
            config.validate()?;

            let mut workflow = Workflow::new(config, interrupt.clone())?;
            log_converter_version(&workflow).await;

            let summary = workflow.run().await?;
            if summary.exhausted > 0 {
                anyhow::bail!("API credentials exhausted before the library was translated");
            }
        }
        Commands::Translate { input, output } => {
            config.validate()?;
            let output = output.unwrap_or_else(|| output_path_for_subtitle(&input));
            info!("Translating {} -> {}", input.display(), output.display());

            let mut workflow = Workflow::new(config, interrupt.clone())?;
            log_converter_version(&workflow).await;

            match workflow.translate_file(&input, &output).await? {
                JobOutcome::Completed | JobOutcome::AlreadyDone => {}
                outcome => anyhow::bail!("Translation of {} ended: {}", input.display(), outcome),
            }
        }
        Commands::InitConfig { output } => init_config(&output)?,
    }

    info!("Subtrad finished");
    Ok(())
}

/// Explicit `--config`, else `./subtrad.toml`, else built-in defaults
fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(config_path) => Config::from_file(config_path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => Config::from_file(DEFAULT_CONFIG_FILE)?,
        None => Config::default(),
    };
    Ok(config)
}

fn init_config(output: &Path) -> Result<()> {
    if output.exists() {
        anyhow::bail!("{} already exists, not overwriting", output.display());
    }
    Config::default().save_to_file(output)?;
    info!("📝 Wrote default configuration to {}", output.display());
    Ok(())
}

async fn log_converter_version(workflow: &Workflow) {
    match workflow.converter().get_version_info().await {
        Ok(version) => info!("Converter: {}", version),
        Err(e) => warn!("⚠️ Subtitle converter unavailable, only SRT sources can be translated: {}", e),
    }
}

/// Setup logging to both console and file
fn setup_logging(log_dir: &Path, verbose: bool) -> Result<()> {
    std::fs::create_dir_all(log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(log_dir, LOG_FILE);
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer().with_target(false);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join(LOG_FILE).display()
    );

    Ok(())
}
