//! Sage CLI - binary entry point.
//!
//! Subcommands:
//!
//! - `sage chat` (default) - full-screen chat session against the index
//! - `sage ingest <path>...` - chunk, embed, and store documents
//! - `sage report <kind>` - print usage reports from the audit log
//!
//! Logs go to a file under the data directory, never to stdout; the chat
//! TUI owns the terminal while it runs.

mod footer;
mod ingest;
mod report;
mod tui;

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use sage_engine::{Config, QueryEngine};
use sage_index::Store;

use crate::report::ReportCommand;

#[derive(Debug, Parser)]
#[command(name = "sage", about = "Local study assistant for course materials")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive chat session (the default).
    Chat,
    /// Index documents into the store.
    Ingest {
        /// Text or markdown files to ingest.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Print a usage report.
    Report {
        #[command(subcommand)]
        kind: ReportCommand,
    },
}

fn init_tracing(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let log_file = config.log_path().and_then(|path| {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok()?;
        }
        OpenOptions::new().create(true).append(true).open(&path).ok()
    });

    if let Some(file) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();
    } else {
        // No usable log file: prefer silence over corrupting the TUI by
        // writing to stdout/stderr.
        tracing_subscriber::registry().with(env_filter).init();
    }
}

fn open_store(config: &Config) -> Result<Store> {
    let path = config
        .db_path()
        .context("Could not determine the data directory")?;
    Store::open(path)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load().context("Failed to load configuration")?;
    init_tracing(&config);

    let mut store = open_store(&config)?;
    let engine = QueryEngine::new(config);

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => tui::run(&engine, &mut store).await,
        Command::Ingest { paths } => ingest::run(&engine, &mut store, &paths).await,
        Command::Report { kind } => report::run(&store, &kind),
    }
}
