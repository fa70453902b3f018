//! Exact identification lane
//!
//! Queries the olaf inverted index with 16 kHz PCM and scores the matches.
//! Short clips (≤ 5 s) go through three overlapping sub-windows whose
//! results are combined by consensus: agreement across windows keeps the
//! full hash count, a single-window match is halved. Offsets reconcile to
//! the median of the reference start times, which tolerates one outlier
//! window where a mean would not.

use anyhow::Result;
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::audio::pcm;
use crate::models::ExactMatch;
use crate::services::olaf::{OlafClient, OlafMatch};

/// Minimum aligned hashes for a candidate to survive filtering
pub const MIN_ALIGNED_HASHES: u32 = 8;

/// Aligned hashes representing a full-confidence match
pub const STRONG_MATCH_HASHES: u32 = 20;

/// Clips at or below this duration use sub-window querying
pub const SHORT_CLIP_THRESHOLD_SEC: f64 = 5.0;

/// Overlapping (start, stop) sub-windows for short clips
pub const SUB_WINDOWS: [(f64, f64); 3] = [(0.0, 3.5), (0.75, 4.25), (1.5, 5.0)];

const SAMPLE_RATE: u32 = 16_000;

/// Candidate between consensus scoring and response construction
#[derive(Debug, Clone, PartialEq)]
struct ScoredCandidate {
    track_id: Uuid,
    aligned_hashes: u32,
    offset_seconds: Option<f64>,
}

/// Run the exact lane: query, score, filter, normalize, enrich.
pub async fn run_exact_lane(
    pool: &SqlitePool,
    olaf: &OlafClient,
    pcm_16k: &[u8],
    max_results: usize,
) -> Result<Vec<ExactMatch>> {
    if pcm_16k.is_empty() {
        return Ok(Vec::new());
    }

    let clip_duration = pcm::duration_seconds(pcm_16k.len(), SAMPLE_RATE, pcm::BYTES_PER_F32);
    debug!(clip_duration, max_results, "Exact lane query");

    let candidates = if clip_duration <= SHORT_CLIP_THRESHOLD_SEC {
        let window_results = query_sub_windows(olaf, pcm_16k, clip_duration).await?;
        consensus_score(&window_results)
    } else {
        let matches = olaf.query(pcm_16k).await?;
        full_clip_candidates(&matches)
    };

    let mut filtered: Vec<(ScoredCandidate, f64)> = candidates
        .into_iter()
        .filter(|c| c.aligned_hashes >= MIN_ALIGNED_HASHES)
        .map(|c| {
            let confidence = normalize_confidence(c.aligned_hashes);
            (c, confidence)
        })
        .collect();

    filtered.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    filtered.truncate(max_results);

    enrich_with_metadata(pool, filtered).await
}

/// Query each clamped sub-window independently.
async fn query_sub_windows(
    olaf: &OlafClient,
    pcm_16k: &[u8],
    clip_duration: f64,
) -> Result<Vec<Vec<OlafMatch>>> {
    let mut window_results = Vec::with_capacity(SUB_WINDOWS.len());

    for (start_sec, stop_sec) in SUB_WINDOWS {
        let stop_sec = stop_sec.min(clip_duration);
        if start_sec >= stop_sec {
            window_results.push(Vec::new());
            continue;
        }

        let window_pcm = pcm::extract_window(pcm_16k, start_sec, stop_sec, SAMPLE_RATE);
        if window_pcm.is_empty() {
            window_results.push(Vec::new());
            continue;
        }

        window_results.push(olaf.query(window_pcm).await?);
    }

    Ok(window_results)
}

/// Consensus scoring across sub-window results.
///
/// Tracks matched by two or more distinct windows keep their summed hash
/// count; a single-window match is penalized to `max(sum / 2, 1)`.
fn consensus_score(window_results: &[Vec<OlafMatch>]) -> Vec<ScoredCandidate> {
    let mut track_windows: HashMap<&str, Vec<(usize, &OlafMatch)>> = HashMap::new();

    for (window_idx, matches) in window_results.iter().enumerate() {
        for m in matches {
            track_windows
                .entry(m.reference_path.trim())
                .or_default()
                .push((window_idx, m));
        }
    }

    let mut candidates = Vec::with_capacity(track_windows.len());

    for (reference, window_matches) in track_windows {
        let Ok(track_id) = Uuid::parse_str(reference) else {
            warn!(reference, "Non-UUID reference name from fingerprint store");
            continue;
        };

        let distinct_windows = window_matches
            .iter()
            .map(|(idx, _)| *idx)
            .collect::<std::collections::HashSet<usize>>()
            .len();

        let total_hashes: u32 = window_matches.iter().map(|(_, m)| m.match_count).sum();
        let offsets: Vec<f64> = window_matches
            .iter()
            .map(|(_, m)| m.reference_start)
            .collect();

        let aligned_hashes = if distinct_windows >= 2 {
            total_hashes
        } else {
            (total_hashes / 2).max(1)
        };

        candidates.push(ScoredCandidate {
            track_id,
            aligned_hashes,
            offset_seconds: median(offsets),
        });
    }

    candidates
}

/// Full-clip scoring: group by track, sum hashes, median offset.
fn full_clip_candidates(matches: &[OlafMatch]) -> Vec<ScoredCandidate> {
    let mut by_track: HashMap<&str, Vec<&OlafMatch>> = HashMap::new();
    for m in matches {
        by_track.entry(m.reference_path.trim()).or_default().push(m);
    }

    let mut candidates = Vec::with_capacity(by_track.len());

    for (reference, track_matches) in by_track {
        let Ok(track_id) = Uuid::parse_str(reference) else {
            warn!(reference, "Non-UUID reference name from fingerprint store");
            continue;
        };

        let total_hashes: u32 = track_matches.iter().map(|m| m.match_count).sum();
        let offsets: Vec<f64> = track_matches.iter().map(|m| m.reference_start).collect();

        candidates.push(ScoredCandidate {
            track_id,
            aligned_hashes: total_hashes,
            offset_seconds: median(offsets),
        });
    }

    candidates
}

/// Normalize an aligned hash count to a [0, 1] confidence.
fn normalize_confidence(aligned_hashes: u32) -> f64 {
    if aligned_hashes == 0 {
        return 0.0;
    }
    (aligned_hashes as f64 / STRONG_MATCH_HASHES as f64).min(1.0)
}

/// Median of a value set; averages the two middles for even counts.
fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}

/// Resolve track metadata, dropping candidates whose track has vanished
/// from the relational store since it was indexed.
async fn enrich_with_metadata(
    pool: &SqlitePool,
    candidates: Vec<(ScoredCandidate, f64)>,
) -> Result<Vec<ExactMatch>> {
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<Uuid> = candidates.iter().map(|(c, _)| c.track_id).collect();
    let tracks = crate::db::tracks::get_tracks_by_ids(pool, &ids).await?;

    let mut results = Vec::with_capacity(candidates.len());
    for (candidate, confidence) in candidates {
        let Some(track) = tracks.get(&candidate.track_id) else {
            warn!(track_id = %candidate.track_id, "Indexed track missing from database; dropping match");
            continue;
        };

        results.push(ExactMatch {
            track: track.into(),
            confidence,
            offset_seconds: candidate.offset_seconds,
            aligned_hashes: candidate.aligned_hashes,
        });
    }

    Ok(results)
}
