//! Two-phase duplicate detection
//!
//! Phase 1: exact byte-level duplicate via SHA-256 lookup, before any
//! decode or index work. Phase 2: content-level near-duplicate via
//! chromaprint similarity over candidates within ±10% of the query
//! duration.

use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use aural_common::Result;

/// Default minimum similarity for a content duplicate
pub const CONTENT_DUP_THRESHOLD: f64 = 0.85;

/// Phase 1: look up an existing track by file hash.
pub async fn check_file_duplicate(pool: &SqlitePool, file_hash: &str) -> Result<Option<Uuid>> {
    crate::db::tracks::find_id_by_hash(pool, file_hash).await
}

/// Phase 2: find a content duplicate by chromaprint similarity.
///
/// Scans all indexed tracks whose fingerprint duration lies within ±10% of
/// `duration` and returns the best candidate at or above `threshold`.
pub async fn check_content_duplicate(
    pool: &SqlitePool,
    fingerprint: &str,
    duration: f64,
    threshold: f64,
) -> Result<Option<Uuid>> {
    let candidates =
        crate::db::tracks::chromaprint_candidates(pool, duration * 0.9, duration * 1.1).await?;

    debug!(
        candidates = candidates.len(),
        duration, "Scanning content-dedup candidates"
    );

    let mut best_id: Option<Uuid> = None;
    let mut best_similarity = 0.0f64;

    for (track_id, track_fp) in &candidates {
        let similarity = fingerprint_similarity(fingerprint, track_fp);
        if similarity > best_similarity {
            best_similarity = similarity;
            best_id = Some(*track_id);
        }
    }

    if best_similarity >= threshold {
        if let Some(id) = best_id {
            info!(track_id = %id, similarity = best_similarity, "Content duplicate found");
            return Ok(Some(id));
        }
    }

    Ok(None)
}

/// Similarity between two raw chromaprint fingerprints in [0, 1].
///
/// Fingerprints are comma-separated 32-bit integers compared over the
/// overlapping prefix by bitwise Hamming distance, with a length penalty
/// of `min_len / max_len` so differing-length prints cannot reach 1.0.
/// Empty or unparseable input scores 0.0.
pub fn fingerprint_similarity(fp1: &str, fp2: &str) -> f64 {
    let (Some(a), Some(b)) = (parse_fingerprint(fp1), parse_fingerprint(fp2)) else {
        return 0.0;
    };

    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let min_len = a.len().min(b.len());
    let max_len = a.len().max(b.len());
    let total_bits = (min_len * 32) as f64;

    let matching_bits: u64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| 32 - (x ^ y).count_ones() as u64)
        .sum();

    let length_penalty = min_len as f64 / max_len as f64;

    (matching_bits as f64 / total_bits) * length_penalty
}

/// Parse a raw fingerprint into 32-bit words.
///
/// Accepts signed decimals (fpcalc variants emit both); values wrap into
/// u32. Any unparseable element invalidates the whole fingerprint.
fn parse_fingerprint(fp: &str) -> Option<Vec<u32>> {
    if fp.trim().is_empty() {
        return Some(Vec::new());
    }
    fp.split(',')
        .map(|part| part.trim().parse::<i64>().ok().map(|v| v as u32))
        .collect()
}
