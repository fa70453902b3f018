//! Database schema for aural-id
//!
//! One authoritative table: `tracks`. The fingerprint store and the vector
//! store hold their own indexes keyed by the stringified track id; the row
//! here is the transactional "ingestion succeeded" marker.

use aural_common::Result;
use sqlx::SqlitePool;

/// Create tables and indexes if they do not exist.
pub async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tracks (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            artist TEXT,
            album TEXT,
            duration_seconds REAL NOT NULL,
            sample_rate INTEGER,
            channels INTEGER,
            bitrate INTEGER,
            format TEXT,
            file_hash_sha256 TEXT NOT NULL UNIQUE,
            file_size_bytes INTEGER NOT NULL,
            file_path TEXT NOT NULL,
            chromaprint_fingerprint TEXT,
            chromaprint_duration REAL,
            olaf_indexed INTEGER NOT NULL DEFAULT 0,
            embedding_model TEXT,
            embedding_dim INTEGER,
            ingested_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS ix_tracks_file_hash ON tracks (file_hash_sha256)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS ix_tracks_artist_title ON tracks (artist, title)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS ix_tracks_ingested_at ON tracks (ingested_at)")
        .execute(pool)
        .await?;

    // Bounds the content-dedup candidate scan to the duration band
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS ix_tracks_chromaprint_duration \
         ON tracks (chromaprint_duration)",
    )
    .execute(pool)
    .await?;

    tracing::debug!("Database schema initialized");
    Ok(())
}
