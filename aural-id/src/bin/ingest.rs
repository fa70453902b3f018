//! aural-ingest - batch ingestion CLI
//!
//! Walks a directory recursively and ingests every audio file through the
//! full pipeline, one file at a time (the fingerprint store allows a
//! single writer). Prints a summary report when done.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use aural_id::config::ServiceConfig;
use aural_id::db;
use aural_id::ingest::{IngestPipeline, PipelineStatus};
use aural_id::services::{Embedder, OlafClient, QdrantClient};

/// Batch-ingest a directory of audio files
#[derive(Parser, Debug)]
#[command(name = "aural-ingest", version)]
struct Args {
    /// Directory to scan recursively for audio files
    directory: PathBuf,

    /// Override the database file path
    #[arg(long, env = "AURAL_DATABASE")]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    if !args.directory.is_dir() {
        anyhow::bail!("'{}' is not a directory", args.directory.display());
    }

    let mut config = ServiceConfig::load()?;
    if let Some(database) = args.database {
        config.database_path = database;
    }

    let db_pool = db::init_database_pool(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    let config = std::sync::Arc::new(config);
    let olaf = OlafClient::new(config.olaf_bin.clone(), config.olaf_db_dir.clone());
    let qdrant = QdrantClient::from_config(config.as_ref());
    let embedder = match Embedder::from_config(config.as_ref()) {
        Ok(embedder) => Some(embedder),
        Err(e) => {
            info!("Embedder unavailable ({}); ingesting without embeddings", e);
            None
        }
    };

    let pipeline = IngestPipeline::new(db_pool, config, olaf, qdrant, embedder);
    let report = pipeline.ingest_directory(&args.directory).await;

    println!("\n{}", "=".repeat(60));
    println!("Ingestion Report");
    println!("{}", "=".repeat(60));
    println!("Total files:  {}", report.total_files);
    println!("Ingested:     {}", report.ingested);
    println!("Duplicates:   {}", report.duplicates);
    println!("Skipped:      {}", report.skipped);
    println!("Errors:       {}", report.errors);

    if report.errors > 0 {
        println!("\nFailed files:");
        for outcome in &report.outcomes {
            if outcome.status == PipelineStatus::Error {
                println!(
                    "  - {}: {}",
                    outcome.file_path.display(),
                    outcome.detail.as_deref().unwrap_or("unknown error")
                );
            }
        }
    }

    println!("{}", "=".repeat(60));

    Ok(())
}
