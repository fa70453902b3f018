//! Configuration resolution for aural-id
//!
//! Every knob resolves with env → TOML (`~/.config/aural/aural-id.toml`) →
//! compiled default priority. Scoring parameters are configuration, not
//! constants, so deployments can tune them without a rebuild.

use aural_common::config::{
    load_config_table, resolve_f64, resolve_i64, resolve_opt_string, resolve_string,
};
use aural_common::Result;
use std::path::PathBuf;

/// Default embedding model identifier (512-dim audio embeddings at 48 kHz)
pub const DEFAULT_EMBEDDING_MODEL: &str = "laion/larger_clap_music_and_speech";

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// HTTP listen host
    pub host: String,
    /// HTTP listen port
    pub port: u16,
    /// SQLite database file
    pub database_path: PathBuf,
    /// Root directory for canonical audio storage (`{root}/raw/{hh}/{hash}.{ext}`)
    pub storage_root: PathBuf,

    /// olaf_c binary (PATH-resolved unless absolute)
    pub olaf_bin: String,
    /// Directory handed to the fingerprint tool via OLAF_DB
    pub olaf_db_dir: PathBuf,
    /// fpcalc binary for chromaprint generation
    pub fpcalc_bin: String,

    /// External embedder binary; `None` disables the vibe lane (fail-closed)
    pub embed_bin: Option<String>,
    /// Embedding model identifier recorded on tracks and responses
    pub embedding_model: String,
    /// Embedding vector dimensionality
    pub embedding_dim: usize,

    /// Qdrant base URL
    pub qdrant_url: String,
    /// Optional Qdrant API key
    pub qdrant_api_key: Option<String>,
    /// Qdrant collection name
    pub qdrant_collection: String,
    /// Point limit per similarity query
    pub qdrant_search_limit: usize,

    /// Minimum aggregated score for a vibe match
    pub vibe_match_threshold: f64,
    /// Chunk scores averaged per track
    pub top_k_per_track: usize,
    /// Weight of the multi-offset diversity bonus
    pub diversity_weight: f64,

    /// Admin API key for the ingest endpoint; empty/unset rejects all requests
    pub admin_api_key: Option<String>,
}

impl ServiceConfig {
    /// Load configuration for the service.
    pub fn load() -> Result<Self> {
        let table = load_config_table("aural-id")?;

        let olaf_db_dir = std::env::var("OLAF_DB")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| {
                resolve_string("AURAL_OLAF_DB", &table, "olaf_db_dir", "./olaf-db")
            });

        Ok(Self {
            host: resolve_string("AURAL_HOST", &table, "host", "127.0.0.1"),
            port: resolve_i64("AURAL_PORT", &table, "port", 17010) as u16,
            database_path: resolve_string("AURAL_DATABASE", &table, "database", "aural.db").into(),
            storage_root: resolve_string(
                "AURAL_STORAGE_ROOT",
                &table,
                "storage_root",
                "./audio-store",
            )
            .into(),

            olaf_bin: resolve_string("AURAL_OLAF_BIN", &table, "olaf_bin", "olaf_c"),
            olaf_db_dir: olaf_db_dir.into(),
            fpcalc_bin: resolve_string("AURAL_FPCALC_BIN", &table, "fpcalc_bin", "fpcalc"),

            embed_bin: resolve_opt_string("AURAL_EMBED_BIN", &table, "embed_bin"),
            embedding_model: resolve_string(
                "AURAL_EMBEDDING_MODEL",
                &table,
                "embedding_model",
                DEFAULT_EMBEDDING_MODEL,
            ),
            embedding_dim: resolve_i64("AURAL_EMBEDDING_DIM", &table, "embedding_dim", 512)
                .max(1) as usize,

            qdrant_url: resolve_string(
                "AURAL_QDRANT_URL",
                &table,
                "qdrant_url",
                "http://127.0.0.1:6333",
            ),
            qdrant_api_key: resolve_opt_string("AURAL_QDRANT_API_KEY", &table, "qdrant_api_key"),
            qdrant_collection: resolve_string(
                "AURAL_QDRANT_COLLECTION",
                &table,
                "qdrant_collection",
                "audio_chunks",
            ),
            qdrant_search_limit: resolve_i64(
                "AURAL_QDRANT_SEARCH_LIMIT",
                &table,
                "qdrant_search_limit",
                50,
            )
            .max(1) as usize,

            vibe_match_threshold: resolve_f64(
                "AURAL_VIBE_MATCH_THRESHOLD",
                &table,
                "vibe_match_threshold",
                0.60,
            ),
            top_k_per_track: resolve_i64("AURAL_TOP_K_PER_TRACK", &table, "top_k_per_track", 3)
                .max(1) as usize,
            diversity_weight: resolve_f64(
                "AURAL_DIVERSITY_WEIGHT",
                &table,
                "diversity_weight",
                0.05,
            ),

            admin_api_key: resolve_opt_string("AURAL_ADMIN_API_KEY", &table, "admin_api_key")
                .filter(|k| !k.trim().is_empty()),
        })
    }
}

impl Default for ServiceConfig {
    /// Compiled defaults, independent of env/TOML. Used by tests.
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 17010,
            database_path: "aural.db".into(),
            storage_root: "./audio-store".into(),
            olaf_bin: "olaf_c".to_string(),
            olaf_db_dir: "./olaf-db".into(),
            fpcalc_bin: "fpcalc".to_string(),
            embed_bin: None,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dim: 512,
            qdrant_url: "http://127.0.0.1:6333".to_string(),
            qdrant_api_key: None,
            qdrant_collection: "audio_chunks".to_string(),
            qdrant_search_limit: 50,
            vibe_match_threshold: 0.60,
            top_k_per_track: 3,
            diversity_weight: 0.05,
            admin_api_key: None,
        }
    }
}
