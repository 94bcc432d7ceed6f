//! Subtrans - embedded subtitle translation
//!
//! Entry point of the command line tool: extracts the text subtitle track of
//! media files, translates it in batches and writes bilingual SRT files.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use tracing::{info, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tracing_appender::{non_blocking, rolling};

use subtrans::cli::{Args, Commands};
use subtrans::config::Config;
use subtrans::workflow::{self, Workflow};

const DEFAULT_CONFIG_FILE: &str = "subtrans.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Keep the file writer guard alive until main returns
    let _log_guard = setup_logging(args.verbose)?;

    match &args.command {
        Commands::Process { input, output_dir } => {
            let workflow = Workflow::new(load_config(&args)?).await?;
            let report = workflow.process_single_file(input, output_dir.as_deref()).await?;

            match report.track.and_then(|track| track.path) {
                Some(path) => println!("{}", path.display()),
                None => println!("No eligible subtitle track in {}", input.display()),
            }
        }
        Commands::Batch { input_dir, output_dir } => {
            let workflow = Workflow::new(load_config(&args)?).await?;
            let summary = workflow.process_directory(input_dir, output_dir.as_deref()).await?;

            println!(
                "{} translated, {} without eligible track, {} failed",
                summary.translated, summary.without_track, summary.failed
            );
        }
        Commands::Tracks { input } => {
            let config = load_config(&args)?;
            subtrans::media::check_availability(&config.media).await?;
            let (tracks, selected) = workflow::inspect_tracks(&config, input).await?;

            if tracks.is_empty() {
                println!("No text subtitle tracks found.");
            } else {
                println!("{:<8} {:<10} {:<12} {:<8}", "Track", "Language", "Codec", "Selected");
                println!("{}", "-".repeat(40));
                for track in &tracks {
                    println!(
                        "{:<8} {:<10} {:<12} {:<8}",
                        track.number,
                        track.language.as_deref().unwrap_or("-"),
                        track.codec.as_deref().unwrap_or("-"),
                        if selected == Some(track.number) { "yes" } else { "" }
                    );
                }
            }
        }
        Commands::InitConfig { output } => {
            Config::default().save_to_file(output)?;
            println!("Wrote default configuration to {}", output.display());
        }
    }

    Ok(())
}

/// Load `--config`, else ./subtrans.toml, else defaults, then apply flag overrides
fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new(DEFAULT_CONFIG_FILE).exists() {
                info!("Found {} in current directory, loading...", DEFAULT_CONFIG_FILE);
                Config::from_file(DEFAULT_CONFIG_FILE)?
            } else {
                Config::default()
            }
        }
    };

    args.apply_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

/// Setup logging to both console and a daily rolling file
fn setup_logging(verbose: bool) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_dir = std::env::current_dir()?.join(".subtrans").join("log");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = rolling::daily(&log_dir, "subtrans.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}",
          log_level, log_dir.join("subtrans.log").display());

    Ok(guard)
}
