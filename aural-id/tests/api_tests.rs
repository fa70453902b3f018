//! Integration tests for aural-id API endpoints
//!
//! Drive the real router with an in-memory database. Everything here is
//! hermetic: no ffmpeg, fingerprint store, or vector store is touched.
//! These tests cover the validation, auth, listing, and streaming layers
//! that sit in front of the lanes.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::util::ServiceExt;

use aural_id::config::ServiceConfig;
use aural_id::{build_router, AppState};

const BOUNDARY: &str = "aural-test-boundary";

/// Test helper: app with in-memory database and the given config.
async fn create_test_app(config: ServiceConfig) -> (axum::Router, AppState) {
    let pool = aural_id::db::init_memory_pool()
        .await
        .expect("Failed to create in-memory database");
    let state = AppState::new(pool, config);
    (build_router(state.clone()), state)
}

/// Build a multipart body: (field name, optional filename, bytes).
fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, bytes) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    name, filename
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n", name).as_bytes(),
            ),
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn multipart_request(uri: &str, admin_key: Option<&str>, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri).header(
        "content-type",
        format!("multipart/form-data; boundary={}", BOUNDARY),
    );
    if let Some(key) = admin_key {
        builder = builder.header("x-admin-key", key);
    }
    builder.body(Body::from(body)).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}

/// Minimal valid WAV header so magic-byte sniffing accepts the upload.
fn wav_magic() -> Vec<u8> {
    let mut bytes = Vec::from(*b"RIFF");
    bytes.extend_from_slice(&[0x24, 0x00, 0x00, 0x00]);
    bytes.extend_from_slice(b"WAVEfmt ");
    bytes.resize(128, 0);
    bytes
}

// ---------------------------------------------------------------------------
// Health and version
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let (app, _) = create_test_app(ServiceConfig::default()).await;

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "aural-id");
}

#[tokio::test]
async fn version_endpoint_reports_package_metadata() {
    let (app, _) = create_test_app(ServiceConfig::default()).await;

    let response = app
        .oneshot(Request::get("/api/v1/version").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["name"], "aural-id");
}

// ---------------------------------------------------------------------------
// Search validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn search_without_audio_field_is_rejected() {
    let (app, _) = create_test_app(ServiceConfig::default()).await;

    let body = multipart_body(&[("mode", None, b"both")]);
    let response = app
        .oneshot(multipart_request("/api/v1/search", None, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&json_body(response).await), "EMPTY_FILE");
}

#[tokio::test]
async fn search_with_empty_audio_is_rejected() {
    let (app, _) = create_test_app(ServiceConfig::default()).await;

    let body = multipart_body(&[("audio", Some("clip.wav"), b"")]);
    let response = app
        .oneshot(multipart_request("/api/v1/search", None, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&json_body(response).await), "EMPTY_FILE");
}

#[tokio::test]
async fn search_with_oversized_audio_is_rejected() {
    let (app, _) = create_test_app(ServiceConfig::default()).await;

    let oversized = vec![0u8; 10 * 1024 * 1024 + 1];
    let body = multipart_body(&[("audio", Some("clip.wav"), &oversized)]);
    let response = app
        .oneshot(multipart_request("/api/v1/search", None, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&json_body(response).await), "FILE_TOO_LARGE");
}

#[tokio::test]
async fn search_with_unrecognized_bytes_is_rejected() {
    let (app, _) = create_test_app(ServiceConfig::default()).await;

    let body = multipart_body(&[("audio", Some("notes.txt"), b"just some text")]);
    let response = app
        .oneshot(multipart_request("/api/v1/search", None, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&json_body(response).await), "UNSUPPORTED_FORMAT");
}

#[tokio::test]
async fn search_with_unknown_mode_is_rejected() {
    let (app, _) = create_test_app(ServiceConfig::default()).await;

    let wav = wav_magic();
    let body = multipart_body(&[("audio", Some("clip.wav"), &wav), ("mode", None, b"fuzzy")]);
    let response = app
        .oneshot(multipart_request("/api/v1/search", None, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Ingest auth and contention
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ingest_fails_closed_when_key_unconfigured() {
    let (app, _) = create_test_app(ServiceConfig::default()).await;

    let wav = wav_magic();
    let body = multipart_body(&[("audio", Some("track.wav"), &wav)]);
    let response = app
        .oneshot(multipart_request("/api/v1/ingest", Some("any-key"), body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_code(&json_body(response).await), "AUTH_NOT_CONFIGURED");
}

#[tokio::test]
async fn ingest_rejects_wrong_or_missing_key() {
    let config = ServiceConfig {
        admin_api_key: Some("right-key".to_string()),
        ..ServiceConfig::default()
    };
    let (app, _) = create_test_app(config).await;

    let wav = wav_magic();
    let body = multipart_body(&[("audio", Some("track.wav"), &wav)]);
    let response = app
        .clone()
        .oneshot(multipart_request("/api/v1/ingest", Some("wrong-key"), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_code(&json_body(response).await), "FORBIDDEN");

    let wav = wav_magic();
    let body = multipart_body(&[("audio", Some("track.wav"), &wav)]);
    let response = app
        .oneshot(multipart_request("/api/v1/ingest", None, body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn ingest_validates_before_any_pipeline_work() {
    let config = ServiceConfig {
        admin_api_key: Some("secret".to_string()),
        ..ServiceConfig::default()
    };
    let (app, _) = create_test_app(config).await;

    // Empty upload
    let body = multipart_body(&[("audio", Some("track.wav"), b"")]);
    let response = app
        .clone()
        .oneshot(multipart_request("/api/v1/ingest", Some("secret"), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&json_body(response).await), "EMPTY_FILE");

    // Unsupported bytes
    let body = multipart_body(&[("audio", Some("track.wav"), b"definitely not audio")]);
    let response = app
        .oneshot(multipart_request("/api/v1/ingest", Some("secret"), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&json_body(response).await), "UNSUPPORTED_FORMAT");
}

#[tokio::test]
async fn contended_ingest_returns_429_without_starting() {
    let config = ServiceConfig {
        admin_api_key: Some("secret".to_string()),
        ..ServiceConfig::default()
    };
    let (app, state) = create_test_app(config).await;

    // Hold the single-writer lock as a running ingestion would
    let _guard = state.ingest_lock.try_lock().unwrap();

    let wav = wav_magic();
    let body = multipart_body(&[("audio", Some("track.wav"), &wav)]);
    let response = app
        .oneshot(multipart_request("/api/v1/ingest", Some("secret"), body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(error_code(&json_body(response).await), "RATE_LIMITED");
}

// ---------------------------------------------------------------------------
// Track listing and detail
// ---------------------------------------------------------------------------

async fn insert_sample_track(state: &AppState, title: &str, hash: &str) -> uuid::Uuid {
    let now = chrono::Utc::now();
    let track = aural_id::models::Track {
        id: uuid::Uuid::new_v4(),
        title: title.to_string(),
        artist: Some("Integration Artist".to_string()),
        album: Some("Integration Album".to_string()),
        duration_seconds: 42.0,
        sample_rate: Some(44_100),
        channels: Some(2),
        bitrate: Some(192),
        format: Some("wav".to_string()),
        file_hash_sha256: hash.to_string(),
        file_size_bytes: 128,
        file_path: format!("/tmp/{}.wav", hash),
        chromaprint_fingerprint: None,
        chromaprint_duration: None,
        olaf_indexed: false,
        embedding_model: None,
        embedding_dim: None,
        ingested_at: now,
        updated_at: now,
    };
    aural_id::db::tracks::insert_track(&state.db, &track)
        .await
        .unwrap();
    track.id
}

#[tokio::test]
async fn track_listing_pages_and_clamps() {
    let (app, state) = create_test_app(ServiceConfig::default()).await;
    insert_sample_track(&state, "First Track", "a1").await;
    insert_sample_track(&state, "Second Track", "a2").await;

    let response = app
        .clone()
        .oneshot(Request::get("/api/v1/tracks").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["pagination"]["page"], 1);
    assert_eq!(body["pagination"]["pageSize"], 50);
    assert_eq!(body["pagination"]["totalItems"], 2);
    assert_eq!(body["pagination"]["totalPages"], 1);

    // Out-of-range parameters clamp instead of failing
    let response = app
        .oneshot(
            Request::get("/api/v1/tracks?page=0&pageSize=1000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["pagination"]["page"], 1);
    assert_eq!(body["pagination"]["pageSize"], 100);
}

#[tokio::test]
async fn track_listing_filters_by_search() {
    let (app, state) = create_test_app(ServiceConfig::default()).await;
    insert_sample_track(&state, "Morning Raga", "b1").await;
    insert_sample_track(&state, "Evening Blues", "b2").await;

    let response = app
        .oneshot(
            Request::get("/api/v1/tracks?search=raga")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["pagination"]["totalItems"], 1);
    assert_eq!(body["data"][0]["title"], "Morning Raga");
}

#[tokio::test]
async fn track_detail_found_and_missing() {
    let (app, state) = create_test_app(ServiceConfig::default()).await;
    let id = insert_sample_track(&state, "Detailed Track", "c1").await;

    let response = app
        .clone()
        .oneshot(
            Request::get(format!("/api/v1/tracks/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["title"], "Detailed Track");
    assert_eq!(body["file_hash_sha256"], "c1");
    assert_eq!(body["olaf_indexed"], false);

    let response = app
        .oneshot(
            Request::get(format!("/api/v1/tracks/{}", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(error_code(&json_body(response).await), "NOT_FOUND");
}

// ---------------------------------------------------------------------------
// Audio streaming
// ---------------------------------------------------------------------------

#[tokio::test]
async fn track_audio_missing_file_is_file_not_found() {
    let storage = tempfile::tempdir().unwrap();
    let config = ServiceConfig {
        storage_root: storage.path().to_path_buf(),
        ..ServiceConfig::default()
    };
    let (app, state) = create_test_app(config).await;
    let id = insert_sample_track(&state, "Ghost Track", "d1").await;

    let response = app
        .oneshot(
            Request::get(format!("/api/v1/tracks/{}/audio", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(error_code(&json_body(response).await), "FILE_NOT_FOUND");
}

#[tokio::test]
async fn track_audio_streams_with_range_support() {
    let storage = tempfile::tempdir().unwrap();
    let config = ServiceConfig {
        storage_root: storage.path().to_path_buf(),
        ..ServiceConfig::default()
    };
    let (app, state) = create_test_app(config).await;

    // Place the canonical file where the hash fan-out expects it
    let hash = "deadbeef";
    let dir = aural_id::services::storage::ensure_storage_dirs(storage.path(), hash).unwrap();
    let audio_bytes: Vec<u8> = (0..=255u8).collect();
    std::fs::write(dir.join(format!("{}.wav", hash)), &audio_bytes).unwrap();

    let id = insert_sample_track(&state, "Streamable", hash).await;

    let response = app
        .clone()
        .oneshot(
            Request::get(format!("/api/v1/tracks/{}/audio", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("accept-ranges").unwrap(),
        "bytes"
    );
    assert_eq!(
        response.headers().get("content-length").unwrap(),
        &audio_bytes.len().to_string()
    );
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body.as_ref(), audio_bytes.as_slice());

    // Range request yields 206 with the requested slice
    let response = app
        .oneshot(
            Request::get(format!("/api/v1/tracks/{}/audio", id))
                .header("range", "bytes=0-15")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body.len(), 16);
    assert_eq!(body.as_ref(), &audio_bytes[..16]);
}
