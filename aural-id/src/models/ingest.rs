//! Ingest endpoint schemas

use serde::Serialize;
use uuid::Uuid;

/// Outcome of a single-file ingest, as reported to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestStatus {
    Ingested,
    Duplicate,
    Error,
}

/// Response body for a single-file ingest
#[derive(Debug, Clone, Serialize)]
pub struct IngestResponse {
    pub track_id: Uuid,
    pub title: String,
    pub artist: Option<String>,
    pub status: IngestStatus,
}
