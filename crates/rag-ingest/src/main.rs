//! Batch ingestion CLI.
//!
//! Reads the club records file, embeds each record through the
//! rate-limited scheduler, and persists the resulting index as an
//! atomic snapshot. Per-record failures are reported, not fatal; the
//! run only fails outright when configuration or input is unusable,
//! when nothing at all could be indexed, or when the snapshot cannot
//! be written.
//!
//! # Usage
//!
//! ```bash
//! OPENAI_API_KEY=... rag-ingest --records data/clubs.json --index data/index
//! ```
//!
//! # Configuration
//!
//! Loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/club-rag/config.*)
//! 3. Environment variables (RAG_*)
//! 4. CLI flags

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use rag_embeddings::{Embedder, OpenAiEmbedder, RemoteEmbedderConfig};
use rag_scheduler::Scheduler;
use rag_types::{ClubRecord, RagConfig};
use rag_vector::{populate, IndexBuilder, PopulateReport};

/// Club index ingestion
#[derive(Parser, Debug)]
#[command(name = "rag-ingest")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the club records file (JSON array)
    #[arg(short, long)]
    records: Option<PathBuf>,

    /// Directory to write the index snapshot to
    #[arg(short, long)]
    index: Option<PathBuf>,

    /// Path to config file (overrides default ~/.config/club-rag/config.*)
    #[arg(short, long)]
    config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.log_level.as_deref());

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("rag-ingest: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(log_level: Option<&str>) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level.unwrap_or("info")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = RagConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    // CLI overrides take highest precedence
    if let Some(records) = cli.records {
        config.data.records_path = records;
    }
    if let Some(index) = cli.index {
        config.data.index_path = index;
    }
    config.validate()?;
    let api_key = config.api_key()?;

    let records = load_records(&config)?;
    if records.is_empty() {
        info!("No records to ingest, nothing to do");
        return Ok(());
    }
    info!(
        records = records.len(),
        index = %config.data.index_path.display(),
        "Starting ingestion"
    );

    let embedder: Arc<dyn Embedder> = Arc::new(OpenAiEmbedder::new(
        RemoteEmbedderConfig::from_settings(&config.embedder, api_key),
    )?);
    let builder = IndexBuilder::create_empty(config.embedder.dimension, records.len())?;
    let scheduler = Scheduler::from_settings(&config.scheduler);

    // Ctrl-C stops scheduling new records; in-flight ones settle.
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping new work");
            signal_token.cancel();
        }
    });

    let report = populate(&builder, records, embedder, &scheduler, cancel).await;
    print_report(&report);

    if report.succeeded() == 0 {
        bail!("No records were indexed ({} attempted)", report.total);
    }

    builder
        .save(&config.data.index_path)
        .context("Failed to persist index snapshot")?;
    info!(
        entries = builder.entry_count(),
        path = %config.data.index_path.display(),
        "Snapshot saved"
    );

    Ok(())
}

fn load_records(config: &RagConfig) -> Result<Vec<rag_types::Record>> {
    let path = &config.data.records_path;
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read records file {}", path.display()))?;
    let clubs: Vec<ClubRecord> = serde_json::from_str(&raw)
        .with_context(|| format!("Records file {} is not a JSON array of clubs", path.display()))?;
    Ok(clubs.into_iter().map(ClubRecord::into_record).collect())
}

fn print_report(report: &PopulateReport) {
    println!(
        "Ingestion finished: {} indexed, {} failed, {} duplicate ids skipped",
        report.succeeded(),
        report.failed(),
        report.duplicates
    );
    for outcome in &report.outcomes {
        if let Some(error) = &outcome.error {
            println!(
                "  FAILED {} after {} attempt(s): {}",
                outcome.id, outcome.attempts, error
            );
        }
    }
}
