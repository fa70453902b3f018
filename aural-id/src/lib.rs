//! aural-id library interface
//!
//! Audio identification and similarity service: exact matching over an
//! inverted fingerprint index plus perceptual ("vibe") matching over
//! learned audio embeddings, with an ingestion pipeline that populates
//! both indexes in one pass.

pub mod api;
pub mod audio;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod models;
pub mod search;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use crate::config::ServiceConfig;
use crate::services::{Embedder, OlafClient, QdrantClient};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Resolved service configuration
    pub config: Arc<ServiceConfig>,
    /// Fingerprint store client
    pub olaf: OlafClient,
    /// Vector store client
    pub qdrant: QdrantClient,
    /// Embedding model client; `None` keeps the vibe lane fail-closed
    pub embedder: Option<Embedder>,
    /// Single-writer gate for the fingerprint store. Contended HTTP
    /// ingests are refused, never queued.
    pub ingest_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(db: SqlitePool, config: ServiceConfig) -> Self {
        let config = Arc::new(config);
        let olaf = OlafClient::new(config.olaf_bin.clone(), config.olaf_db_dir.clone());
        let qdrant = QdrantClient::from_config(config.as_ref());
        let embedder = Embedder::from_config(config.as_ref()).ok();

        Self {
            db,
            config,
            olaf,
            qdrant,
            embedder,
            ingest_lock: Arc::new(Mutex::new(())),
        }
    }
}

/// Build application router
///
/// - `GET  /health`
/// - `GET  /api/v1/version`
/// - `POST /api/v1/search`
/// - `POST /api/v1/ingest`
/// - `GET  /api/v1/tracks` (+ `/:id`, `/:id/audio`)
pub fn build_router(state: AppState) -> Router {
    let v1 = Router::new()
        .merge(api::version_routes())
        .merge(api::search_routes())
        .merge(api::ingest_routes())
        .merge(api::tracks_routes());

    Router::new()
        .merge(api::health_routes())
        .nest("/api/v1", v1)
        // Per-endpoint limits are enforced in the handlers; this bound
        // covers the largest allowed ingest upload plus form overhead.
        .layer(DefaultBodyLimit::max(api::ingest::MAX_UPLOAD_BYTES + 1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
