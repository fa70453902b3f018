//! Version endpoint

use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

/// Version response
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub name: String,
    pub version: String,
    pub build_time: String,
}

/// GET /api/v1/version
pub async fn get_version() -> Json<VersionResponse> {
    Json(VersionResponse {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    })
}

/// Build version routes
pub fn version_routes() -> Router<AppState> {
    Router::new().route("/version", get(get_version))
}
