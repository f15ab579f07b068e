//! srtfix - AI-assisted SRT spelling review
//!
//! This is the main entry point for the srtfix command-line tool, which
//! flags suspected spelling errors in subtitle files with an external
//! review service and lets the operator correct them interactively.

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tracing_appender::{non_blocking, rolling};

use srtfix::cli::{Args, Commands, ConfigAction, KeyAction};
use srtfix::config::{AnalyzerProvider, Config};
use srtfix::credentials::{store_from_config, CredentialStore, FileCredentialStore};
use srtfix::error::SrtfixError;
use srtfix::workflow::Workflow;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;
    info!("Starting srtfix");

    if let Err(e) = run(args).await {
        error!("srtfix failed: {:#}", e);
        return Err(e);
    }

    info!("srtfix finished successfully");
    Ok(())
}

async fn run(args: Args) -> Result<()> {

    // Load configuration
    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if std::path::Path::new("srtfix.toml").exists() {
                info!("Found srtfix.toml in current directory, loading...");
                Config::from_file("srtfix.toml")?
            } else {
                Config::default()
            }
        }
    };

    if let Some(provider) = &args.provider {
        config.use_provider(provider.parse::<AnalyzerProvider>()?);
    }

    match args.command {
        Commands::Check { input } => {
            info!("Checking subtitles: {}", input.display());
            let workflow = Workflow::new(config)?;
            let mut stdout = std::io::stdout();
            workflow.check(&input, &mut stdout).await?;
        }
        Commands::Review { input, output, video } => {
            info!("Reviewing subtitles: {}", input.display());
            let workflow = Workflow::new(config)?;
            let mut stdin = std::io::stdin().lock();
            let mut stdout = std::io::stdout();
            workflow
                .review(&input, output.as_deref(), video.as_deref(), &mut stdin, &mut stdout)
                .await?;
        }
        Commands::Format { input, output } => {
            info!("Formatting subtitles: {}", input.display());
            let workflow = Workflow::new(config)?;
            let count = workflow.format(&input, &output).await?;
            println!("Wrote {} subtitle entries to {}", count, output.display());
        }
        Commands::Key { action } => {
            let store = FileCredentialStore::new(&config.credentials.path);
            match action {
                KeyAction::Set { value } => {
                    store.save(&value)?;
                    println!("API key saved to {}", store.path().display());
                }
                KeyAction::Remove => {
                    store.remove()?;
                    println!("API key removed");
                }
                KeyAction::Status => {
                    if store_from_config(&config.credentials).has() {
                        match store.saved_at()? {
                            Some(saved_at) => println!("API key set (saved {})", saved_at.to_rfc3339()),
                            None => println!(
                                "API key set (from ${})",
                                config.credentials.env_var.as_deref().unwrap_or("environment")
                            ),
                        }
                    } else {
                        println!("No API key set");
                    }
                }
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Init { path, force } => {
                if path.exists() && !force {
                    return Err(SrtfixError::Config(format!(
                        "{} already exists, use --force to overwrite",
                        path.display()
                    ))
                    .into());
                }
                config.save_to_file(&path)?;
                println!("Wrote configuration to {}", path.display());
            }
        },
    }

    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = std::env::current_dir()?.join(".srtfix").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "srtfix.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    // Console logs go to stderr, stdout carries the review dialogue
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(verbose)
        .with_line_number(verbose);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer);

    subscriber.try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}",
          log_level, log_dir.join("srtfix.log").display());

    Ok(())
}
