//! Vibe (similarity) lane
//!
//! Embeds the whole query clip (the query path never chunks, only
//! ingestion does), queries the vector store for nearest chunks, and
//! aggregates chunk hits to ranked track results. A vector-store failure
//! degrades to an empty result; a missing embedding model fails the lane
//! closed.

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::audio::pcm;
use crate::config::ServiceConfig;
use crate::models::VibeMatch;
use crate::search::aggregation::{aggregate_chunk_hits, ChunkHit};
use crate::services::embedding::{Embedder, EmbeddingError};
use crate::services::qdrant::{QdrantClient, ScoredPoint};

/// Run the vibe lane end to end.
pub async fn run_vibe_lane(
    pool: &SqlitePool,
    qdrant: &QdrantClient,
    embedder: Option<&Embedder>,
    config: &ServiceConfig,
    pcm_48k: &[u8],
    max_results: usize,
    exact_match_track_id: Option<Uuid>,
) -> Result<Vec<VibeMatch>> {
    let embedder = embedder.ok_or_else(|| {
        EmbeddingError::Unavailable("embedding model not loaded; vibe lane disabled".into())
    })?;

    let samples = pcm::bytes_to_f32(pcm_48k);
    if samples.is_empty() {
        warn!("Empty audio input for vibe search");
        return Ok(Vec::new());
    }

    // One embedding for the entire clip, serialized by the inference gate.
    let embedding = embedder.embed(&samples).await?;

    let chunk_hits = match qdrant.query(&embedding, config.qdrant_search_limit).await {
        Ok(points) => points_to_hits(points),
        Err(e) => {
            warn!(error = %e, "Vector store query failed; returning no vibe matches");
            return Ok(Vec::new());
        }
    };

    if chunk_hits.is_empty() {
        debug!("No chunk hits for vibe search");
        return Ok(Vec::new());
    }

    let track_results = aggregate_chunk_hits(
        &chunk_hits,
        config.top_k_per_track,
        config.diversity_weight,
        exact_match_track_id,
    );

    let mut passing: Vec<_> = track_results
        .into_iter()
        .filter(|r| r.final_score >= config.vibe_match_threshold)
        .collect();
    passing.truncate(max_results);

    if passing.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<Uuid> = passing.iter().map(|r| r.track_id).collect();
    let tracks = crate::db::tracks::get_tracks_by_ids(pool, &ids).await?;

    let mut matches = Vec::with_capacity(passing.len());
    for result in passing {
        let Some(track) = tracks.get(&result.track_id) else {
            warn!(
                track_id = %result.track_id,
                "Track in vector store but missing from database (stale index?)"
            );
            continue;
        };

        matches.push(VibeMatch {
            track: track.into(),
            similarity: result.final_score.min(1.0),
            embedding_model: embedder.model_name().to_string(),
        });
    }

    Ok(matches)
}

/// Convert scored points to chunk hits, skipping points whose payload
/// lacks a valid track id.
fn points_to_hits(points: Vec<ScoredPoint>) -> Vec<ChunkHit> {
    let mut hits = Vec::with_capacity(points.len());

    for point in points {
        let Some(payload) = point.payload.as_ref() else {
            warn!(id = %point.id, "Vector point has no payload; skipping");
            continue;
        };

        let track_id = payload
            .get("track_id")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok());
        let Some(track_id) = track_id else {
            warn!(id = %point.id, "Vector point has missing or invalid track_id; skipping");
            continue;
        };

        hits.push(ChunkHit {
            track_id,
            score: point.score,
            chunk_index: payload
                .get("chunk_index")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as usize,
            offset_sec: payload
                .get("offset_sec")
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0),
        });
    }

    hits
}
