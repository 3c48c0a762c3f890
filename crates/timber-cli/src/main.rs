//! Timber Lens - command line entry point.

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::io;
use std::path::PathBuf;
use timber_cli::{parse_assignment, LensConfig, Session};
use timber_save::CompressionLevel;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Inspect, track and edit Timberborn saves.
#[derive(Debug, Parser)]
#[command(name = "timber-lens", version, about)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the .timber saves
    #[arg(long, short = 'd', global = true)]
    save_dir: Option<PathBuf>,

    /// History file (defaults to historical_data.json in the save directory)
    #[arg(long, global = true)]
    history_file: Option<PathBuf>,

    /// Scheduled phases listed after the current one
    #[arg(long, global = true)]
    upcoming: Option<usize>,

    /// Compression used when a save is rewritten (fast, normal, best)
    #[arg(long, global = true, value_parser = parse_compression)]
    compression: Option<CompressionLevel>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List saves, newest first
    List,
    /// Show weather, water and settings of a save
    Inspect {
        /// Save to inspect (defaults to the latest)
        #[arg(long)]
        file: Option<PathBuf>,
        /// Print the metrics snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Record metrics of the latest save in the history
    Track {
        /// Record every save in the directory, oldest first
        #[arg(long)]
        all: bool,
    },
    /// Show recorded history
    History {
        /// First day (inclusive)
        #[arg(long)]
        from: Option<u32>,
        /// Last day (inclusive)
        #[arg(long)]
        to: Option<u32>,
        /// Print full snapshots as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or change weather duration settings
    Settings {
        /// Save to edit (defaults to the latest)
        #[arg(long)]
        file: Option<PathBuf>,
        /// Setting to change, e.g. drought_max=8 (repeatable)
        #[arg(long = "set", short = 's', value_parser = parse_assignment)]
        updates: Vec<(String, Value)>,
        /// Name to save the edited world as (defaults to overwriting it)
        #[arg(long, short = 'o')]
        output: Option<String>,
    },
}

fn parse_compression(text: &str) -> std::result::Result<CompressionLevel, String> {
    match text.to_ascii_lowercase().as_str() {
        "fast" => Ok(CompressionLevel::Fast),
        "normal" => Ok(CompressionLevel::Normal),
        "best" => Ok(CompressionLevel::Best),
        other => Err(format!("unknown compression level '{other}'")),
    }
}

/// Main entry point.
fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = cli
        .config
        .as_ref()
        .map_or_else(LensConfig::load, LensConfig::load_from);
    if let Some(dir) = cli.save_dir {
        config.save_dir = Some(dir);
    }
    if let Some(file) = cli.history_file {
        config.history_file = Some(file);
    }
    if let Some(upcoming) = cli.upcoming {
        config.upcoming_phases = upcoming;
    }
    if let Some(level) = cli.compression {
        config.compression = level;
    }
    config.validate();

    // Initialize tracing; RUST_LOG wins over the configured filter
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_filter)?,
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();

    info!("Timber Lens {}", env!("CARGO_PKG_VERSION"));

    let session = Session::from_config(&config)?;
    let mut out = io::stdout().lock();
    match cli.command {
        Command::List => session.list(&mut out)?,
        Command::Inspect { file, json } => session.inspect(file.as_deref(), json, &mut out)?,
        Command::Track { all } => {
            session.track(all, &mut out)?;
        },
        Command::History { from, to, json } => session.history(from, to, json, &mut out)?,
        Command::Settings {
            file,
            updates,
            output,
        } => {
            session.settings(file.as_deref(), &updates, output.as_deref(), &mut out)?;
        },
    }
    Ok(())
}
