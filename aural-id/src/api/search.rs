//! Search endpoint
//!
//! Accepts a multipart audio upload, validates size and container format
//! (sniffed from magic bytes, never the declared content type), decodes to
//! dual-rate PCM, and hands off to the orchestrator.

use axum::extract::{Multipart, State};
use axum::{routing::post, Json, Router};
use tracing::warn;

use crate::audio::decode;
use crate::error::{ApiError, ApiResult};
use crate::models::{SearchMode, SearchResponse};
use crate::search::{orchestrate_search, SearchError};
use crate::AppState;

/// Maximum search upload size
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Minimum query clip duration in seconds
pub const MIN_QUERY_DURATION: f64 = 3.0;

/// Default result cap per lane
const DEFAULT_MAX_RESULTS: usize = 10;

/// Upper bound on the per-lane result cap
const MAX_MAX_RESULTS: usize = 50;

/// Map a sniffed container to the canonical MIME accepted for search.
///
/// Browser captures arrive in a Matroska/WebM container that sniffers
/// report as video; those normalize to `audio/webm` here.
pub fn detect_search_mime(content: &[u8]) -> Option<&'static str> {
    let detected = infer::get(content)?;
    match detected.mime_type() {
        "audio/mpeg" => Some("audio/mpeg"),
        "audio/ogg" | "application/ogg" => Some("audio/ogg"),
        "audio/x-wav" | "audio/wav" => Some("audio/x-wav"),
        "audio/m4a" | "audio/mp4" | "video/mp4" => Some("audio/mp4"),
        "video/webm" | "audio/webm" | "video/x-matroska" => Some("audio/webm"),
        _ => None,
    }
}

/// Fields accepted by the search endpoint
#[derive(Debug, Default)]
pub(crate) struct SearchForm {
    pub audio: Option<Vec<u8>>,
    pub mode: SearchMode,
    pub max_results: usize,
}

/// Read the multipart form, enforcing the upload size limit.
pub(crate) async fn read_search_form(
    mut multipart: Multipart,
    max_upload_bytes: usize,
) -> ApiResult<SearchForm> {
    let mut form = SearchForm {
        max_results: DEFAULT_MAX_RESULTS,
        ..Default::default()
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation("UNSUPPORTED_FORMAT", format!("Bad multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "audio" => {
                let bytes = field.bytes().await.map_err(|e| {
                    ApiError::validation("FILE_TOO_LARGE", format!("Upload failed: {}", e))
                })?;
                if bytes.len() > max_upload_bytes {
                    return Err(ApiError::validation(
                        "FILE_TOO_LARGE",
                        format!("Max upload size is {} MB.", max_upload_bytes / (1024 * 1024)),
                    ));
                }
                form.audio = Some(bytes.to_vec());
            }
            "mode" => {
                let text = field.text().await.unwrap_or_default();
                form.mode = text.parse().map_err(|e: String| {
                    ApiError::validation("UNSUPPORTED_FORMAT", e)
                })?;
            }
            "max_results" => {
                let text = field.text().await.unwrap_or_default();
                let requested: usize = text.trim().parse().unwrap_or(DEFAULT_MAX_RESULTS);
                form.max_results = requested.clamp(1, MAX_MAX_RESULTS);
            }
            _ => {}
        }
    }

    Ok(form)
}

/// POST /api/v1/search
pub async fn search_audio(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<SearchResponse>> {
    let form = read_search_form(multipart, MAX_UPLOAD_BYTES).await?;

    let content = form
        .audio
        .ok_or_else(|| ApiError::validation("EMPTY_FILE", "No audio file provided."))?;

    if content.is_empty() {
        return Err(ApiError::validation(
            "EMPTY_FILE",
            "Empty file uploaded. Please provide an audio file.",
        ));
    }

    if detect_search_mime(&content).is_none() {
        return Err(ApiError::validation(
            "UNSUPPORTED_FORMAT",
            "Unsupported audio format. Supported: WebM, OGG, MP3, MP4, WAV.",
        ));
    }

    let (pcm_16k, pcm_48k, _duration) =
        decode::decode_and_validate(&content, MIN_QUERY_DURATION, f64::INFINITY)
            .await
            .map_err(|e| match e {
                decode::DecodeError::TooShort { actual, min } => ApiError::validation(
                    "AUDIO_TOO_SHORT",
                    format!("Audio too short: {:.1}s (minimum {:.0}s).", actual, min),
                ),
                other => {
                    warn!(error = %other, "Audio decode failed");
                    ApiError::validation(
                        "UNSUPPORTED_FORMAT",
                        "Unable to decode audio file. Please try a different format.",
                    )
                }
            })?;

    let response = orchestrate_search(&state, &pcm_16k, &pcm_48k, form.mode, form.max_results)
        .await
        .map_err(|e| match e {
            SearchError::Timeout(_) => {
                ApiError::SearchTimeout("Search timed out. Please try a shorter clip.".into())
            }
            SearchError::Unavailable(_) => {
                ApiError::Unavailable("Search temporarily unavailable. Please retry.".into())
            }
        })?;

    Ok(Json(response))
}

/// Build search routes
pub fn search_routes() -> Router<AppState> {
    Router::new().route("/search", post(search_audio))
}
