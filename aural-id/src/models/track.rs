//! Track records and their API projections
//!
//! The relational store owns the authoritative Track row. A track either
//! has both chromaprint fields populated or both null; `olaf_indexed`
//! records whether the fingerprint-store write succeeded at ingestion
//! time; a non-null `embedding_dim` implies vectors exist under the
//! track's id in the vector store.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Authoritative track record
#[derive(Debug, Clone)]
pub struct Track {
    pub id: Uuid,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_seconds: f64,
    pub sample_rate: Option<i64>,
    pub channels: Option<i64>,
    pub bitrate: Option<i64>,
    pub format: Option<String>,
    /// Lowercase hex SHA-256 of the original file bytes, unique
    pub file_hash_sha256: String,
    pub file_size_bytes: i64,
    /// Canonical stored file path
    pub file_path: String,
    /// Raw chromaprint (comma-separated 32-bit ints); null with duration
    pub chromaprint_fingerprint: Option<String>,
    pub chromaprint_duration: Option<f64>,
    /// Whether the fingerprint-store write succeeded at ingestion time
    pub olaf_indexed: bool,
    pub embedding_model: Option<String>,
    pub embedding_dim: Option<i64>,
    pub ingested_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Minimal track metadata returned in search results and listings
#[derive(Debug, Clone, Serialize)]
pub struct TrackInfo {
    pub id: Uuid,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_seconds: f64,
    pub ingested_at: DateTime<Utc>,
}

/// Full track detail including audio properties and indexing status
#[derive(Debug, Clone, Serialize)]
pub struct TrackDetail {
    pub id: Uuid,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_seconds: f64,
    pub ingested_at: DateTime<Utc>,
    pub sample_rate: Option<i64>,
    pub channels: Option<i64>,
    pub bitrate: Option<i64>,
    pub format: Option<String>,
    pub file_hash_sha256: String,
    pub file_size_bytes: i64,
    pub olaf_indexed: bool,
    pub embedding_model: Option<String>,
    pub embedding_dim: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Track> for TrackInfo {
    fn from(track: &Track) -> Self {
        Self {
            id: track.id,
            title: track.title.clone(),
            artist: track.artist.clone(),
            album: track.album.clone(),
            duration_seconds: track.duration_seconds,
            ingested_at: track.ingested_at,
        }
    }
}

impl From<&Track> for TrackDetail {
    fn from(track: &Track) -> Self {
        Self {
            id: track.id,
            title: track.title.clone(),
            artist: track.artist.clone(),
            album: track.album.clone(),
            duration_seconds: track.duration_seconds,
            ingested_at: track.ingested_at,
            sample_rate: track.sample_rate,
            channels: track.channels,
            bitrate: track.bitrate,
            format: track.format.clone(),
            file_hash_sha256: track.file_hash_sha256.clone(),
            file_size_bytes: track.file_size_bytes,
            olaf_indexed: track.olaf_indexed,
            embedding_model: track.embedding_model.clone(),
            embedding_dim: track.embedding_dim,
            updated_at: track.updated_at,
        }
    }
}
