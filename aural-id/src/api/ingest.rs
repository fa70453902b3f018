//! Ingest endpoint
//!
//! Admin-key-protected single-file ingestion. The key is compared in
//! constant time; an unconfigured key rejects every request (fail-closed).
//! The fingerprint store allows one writer, so a contended ingest returns
//! 429 before any pipeline work starts.

use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::{http::StatusCode, routing::post, Json, Router};
use std::io::Write;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::error::{ApiError, ApiResult};
use crate::ingest::{IngestPipeline, PipelineStatus};
use crate::models::{IngestResponse, IngestStatus};
use crate::AppState;

/// Maximum ingest upload size
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Sniff the container for ingest; a superset of the search formats that
/// also admits FLAC.
pub fn detect_ingest_mime(content: &[u8]) -> Option<&'static str> {
    if let Some(mime) = super::search::detect_search_mime(content) {
        return Some(mime);
    }
    match infer::get(content)?.mime_type() {
        "audio/x-flac" | "audio/flac" => Some("audio/flac"),
        _ => None,
    }
}

/// Verify the X-Admin-Key header against the configured key.
///
/// Comparison is constant-time. An empty or unset server-side key rejects
/// all requests rather than allowing them.
pub fn require_admin_key(headers: &HeaderMap, configured_key: Option<&str>) -> ApiResult<()> {
    let Some(expected) = configured_key else {
        return Err(ApiError::auth(
            "AUTH_NOT_CONFIGURED",
            "Admin API key not configured on the server.",
        ));
    };

    let provided = headers
        .get("x-admin-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        Err(ApiError::auth(
            "FORBIDDEN",
            "Invalid or missing admin API key.",
        ))
    }
}

/// POST /api/v1/ingest
pub async fn ingest_audio(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<IngestResponse>)> {
    require_admin_key(&headers, state.config.admin_api_key.as_deref())?;

    // Read and validate the upload fully before touching the writer lock.
    let mut content: Option<Vec<u8>> = None;
    let mut file_name = String::from("upload");

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ApiError::validation("UNSUPPORTED_FORMAT", format!("Bad multipart body: {}", e))
    })? {
        if field.name() == Some("audio") {
            if let Some(name) = field.file_name() {
                file_name = name.to_string();
            }
            let bytes = field.bytes().await.map_err(|e| {
                ApiError::validation("FILE_TOO_LARGE", format!("Upload failed: {}", e))
            })?;
            content = Some(bytes.to_vec());
        }
    }

    let content =
        content.ok_or_else(|| ApiError::validation("EMPTY_FILE", "No audio file provided."))?;

    if content.is_empty() {
        return Err(ApiError::validation("EMPTY_FILE", "Empty file uploaded."));
    }
    if content.len() > MAX_UPLOAD_BYTES {
        return Err(ApiError::validation(
            "FILE_TOO_LARGE",
            format!(
                "File too large. Maximum upload size is {} MB.",
                MAX_UPLOAD_BYTES / (1024 * 1024)
            ),
        ));
    }
    if detect_ingest_mime(&content).is_none() {
        return Err(ApiError::validation(
            "UNSUPPORTED_FORMAT",
            "Unsupported audio format. Supported: MP3, WAV, FLAC, OGG, WebM, MP4.",
        ));
    }

    // Stage the upload where the pipeline can read it; the extension hints
    // the tag parser and names the canonical copy.
    let suffix = std::path::Path::new(&file_name)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_else(|| ".bin".to_string());
    let mut tmp = tempfile::Builder::new()
        .prefix("aural-ingest-")
        .suffix(&suffix)
        .tempfile()
        .map_err(ApiError::Io)?;
    tmp.write_all(&content).map_err(ApiError::Io)?;
    tmp.flush().map_err(ApiError::Io)?;

    // Single-writer gate: refuse rather than queue.
    let Ok(_guard) = state.ingest_lock.try_lock() else {
        return Err(ApiError::RateLimited(
            "Another ingestion is in progress. Please try again in a moment.".into(),
        ));
    };

    let pipeline = IngestPipeline::new(
        state.db.clone(),
        state.config.clone(),
        state.olaf.clone(),
        state.qdrant.clone(),
        state.embedder.clone(),
    );

    let outcome = pipeline.ingest_file(tmp.path()).await;

    match outcome.status {
        PipelineStatus::Skipped | PipelineStatus::Error => {
            let detail = outcome.detail.unwrap_or_else(|| "Ingestion failed".into());
            let lower = detail.to_lowercase();
            if lower.contains("too short") {
                Err(ApiError::validation("AUDIO_TOO_SHORT", detail))
            } else if lower.contains("too long") {
                Err(ApiError::validation("AUDIO_TOO_LONG", detail))
            } else if lower.contains("decode") {
                Err(ApiError::validation(
                    "UNSUPPORTED_FORMAT",
                    "Unable to decode audio file.",
                ))
            } else {
                warn!(detail = %detail, "Ingestion failed");
                Err(ApiError::Unavailable(
                    "Ingestion backend failed. Please retry.".into(),
                ))
            }
        }
        PipelineStatus::Ingested | PipelineStatus::Duplicate => {
            let track_id = outcome.track_id.ok_or_else(|| {
                ApiError::Unavailable("Ingestion completed without a track id.".into())
            })?;

            let status = if outcome.status == PipelineStatus::Duplicate {
                IngestStatus::Duplicate
            } else {
                IngestStatus::Ingested
            };

            Ok((
                StatusCode::CREATED,
                Json(IngestResponse {
                    track_id,
                    title: outcome.title.unwrap_or(file_name),
                    artist: outcome.artist,
                    status,
                }),
            ))
        }
    }
}

/// Build ingest routes
pub fn ingest_routes() -> Router<AppState> {
    Router::new().route("/ingest", post(ingest_audio))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with_key(key: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-admin-key", HeaderValue::from_str(key).unwrap());
        headers
    }

    #[test]
    fn unconfigured_key_rejects_everything() {
        let result = require_admin_key(&headers_with_key("whatever"), None);
        assert!(matches!(
            result,
            Err(ApiError::Auth {
                code: "AUTH_NOT_CONFIGURED",
                ..
            })
        ));
    }

    #[test]
    fn wrong_or_missing_key_is_forbidden() {
        assert!(matches!(
            require_admin_key(&headers_with_key("wrong"), Some("secret")),
            Err(ApiError::Auth { code: "FORBIDDEN", .. })
        ));
        assert!(matches!(
            require_admin_key(&HeaderMap::new(), Some("secret")),
            Err(ApiError::Auth { code: "FORBIDDEN", .. })
        ));
    }

    #[test]
    fn correct_key_is_accepted() {
        assert!(require_admin_key(&headers_with_key("secret"), Some("secret")).is_ok());
    }

    #[test]
    fn flac_is_accepted_for_ingest_only() {
        let mut flac = Vec::from(*b"fLaC");
        flac.resize(64, 0);
        assert_eq!(detect_ingest_mime(&flac), Some("audio/flac"));
        assert_eq!(super::super::search::detect_search_mime(&flac), None);
    }
}
