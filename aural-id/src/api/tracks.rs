//! Track library endpoints: paginated listing, detail, audio streaming

use axum::extract::{Path as AxumPath, Query, Request, State};
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Json, Router};
use serde::Deserialize;
use std::path::Path;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::warn;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::pagination::{
    clamp_page, clamp_page_size, total_pages, PaginatedResponse, PaginationMeta, DEFAULT_PAGE_SIZE,
};
use crate::models::{TrackDetail, TrackInfo};
use crate::services::storage;
use crate::AppState;

/// Query parameters for the track listing
#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub page: Option<i64>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<i64>,
    pub search: Option<String>,
}

/// GET /api/v1/tracks
pub async fn list_tracks(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<PaginatedResponse<TrackInfo>>> {
    let page = clamp_page(params.page.unwrap_or(1));
    let page_size = clamp_page_size(params.page_size.unwrap_or(DEFAULT_PAGE_SIZE));
    let search = params.search.as_deref().filter(|s| !s.trim().is_empty());

    let (tracks, total_items) =
        crate::db::tracks::list_tracks(&state.db, page, page_size, search).await?;

    Ok(Json(PaginatedResponse {
        data: tracks.iter().map(TrackInfo::from).collect(),
        pagination: PaginationMeta {
            page,
            page_size,
            total_items,
            total_pages: total_pages(total_items, page_size),
        },
    }))
}

/// GET /api/v1/tracks/:id
pub async fn get_track(
    State(state): State<AppState>,
    AxumPath(track_id): AxumPath<Uuid>,
) -> ApiResult<Json<TrackDetail>> {
    let track = crate::db::tracks::get_track(&state.db, track_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No track found with id {}", track_id)))?;

    Ok(Json(TrackDetail::from(&track)))
}

/// GET /api/v1/tracks/:id/audio
///
/// Streams the canonical file with Range support (Accept-Ranges, 206).
/// The file path is reconstructed from the hash, then checked to resolve
/// under the storage root before anything is served.
pub async fn get_track_audio(
    State(state): State<AppState>,
    AxumPath(track_id): AxumPath<Uuid>,
    request: Request,
) -> ApiResult<Response> {
    let track = crate::db::tracks::get_track(&state.db, track_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No track found with id {}", track_id)))?;

    let format = track
        .format
        .as_deref()
        .map(|f| f.trim_start_matches('.').to_lowercase())
        .or_else(|| {
            Path::new(&track.file_path)
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
        })
        .ok_or_else(|| file_not_found("Track has no format information"))?;

    let file_path = storage::raw_audio_path(&state.config.storage_root, &track.file_hash_sha256, &format);

    let storage_root = state
        .config
        .storage_root
        .canonicalize()
        .map_err(|_| file_not_found("Audio file not found on disk"))?;
    let resolved = file_path
        .canonicalize()
        .map_err(|_| file_not_found("Audio file not found on disk"))?;

    if !resolved.starts_with(&storage_root) {
        warn!(
            track_id = %track_id,
            resolved = %resolved.display(),
            "Path traversal blocked"
        );
        return Err(file_not_found("Audio file not found on disk"));
    }

    if !resolved.is_file() {
        return Err(file_not_found("Audio file not found on disk"));
    }

    // ServeFile handles Range, Accept-Ranges, Content-Length, and the
    // extension-derived Content-Type.
    let response = ServeFile::new(&resolved)
        .oneshot(request)
        .await
        .map_err(|e| ApiError::Internal(format!("File serve failed: {}", e)))?;

    Ok(response.map(axum::body::Body::new).into_response())
}

/// 404 with the FILE_NOT_FOUND code (distinct from a missing track row).
fn file_not_found(message: &str) -> ApiError {
    ApiError::FileNotFound(message.to_string())
}

/// Build track routes
pub fn tracks_routes() -> Router<AppState> {
    Router::new()
        .route("/tracks", get(list_tracks))
        .route("/tracks/:id", get(get_track))
        .route("/tracks/:id/audio", get(get_track_audio))
}
