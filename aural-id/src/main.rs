//! aural-id - Audio identification service
//!
//! Exposes fingerprint (exact) and embedding (vibe) search over HTTP,
//! plus an admin-key-protected ingestion endpoint. Batch ingestion is
//! handled by the separate `aural-ingest` binary.

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use aural_id::config::ServiceConfig;
use aural_id::{build_router, db, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting aural-id (audio identification) service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = ServiceConfig::load()?;

    // The decoder is load-bearing for every request; refuse to start
    // without it.
    if !ffmpeg_available().await {
        anyhow::bail!("ffmpeg not found on PATH; install ffmpeg and restart");
    }
    info!("ffmpeg found on PATH");

    let db_pool = db::init_database_pool(&config.database_path)
        .await
        .context("Failed to initialize database")?;
    info!("Database connection established: {}", config.database_path.display());

    let state = AppState::new(db_pool, config);

    // The vector store and embedder only degrade the vibe lane; warn and
    // keep serving the exact lane.
    match state.qdrant.health_check().await {
        Ok(()) => info!("Vector store reachable at {}", state.config.qdrant_url),
        Err(e) => warn!(error = %e, "Vector store unreachable; vibe search will return empty"),
    }
    if state.embedder.is_none() {
        warn!("No embedder configured (AURAL_EMBED_BIN); vibe search disabled");
    }

    let addr = format!("{}:{}", state.config.host, state.config.port);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Probe for ffmpeg on PATH.
async fn ffmpeg_available() -> bool {
    tokio::process::Command::new("ffmpeg")
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}
