//! Chunk-to-track aggregation for vector search results
//!
//! Top-K average with diversity bonus: a track's base score is the mean of
//! its best K chunk scores, plus a small reward for matching at several
//! distinct offsets. The bonus only breaks ties between tracks with
//! similar top-K scores but different coverage, so its weight is small.

use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// A single chunk hit from the vector store
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkHit {
    /// Track the chunk belongs to
    pub track_id: Uuid,
    /// Cosine similarity in [0, 1]
    pub score: f64,
    /// Sequential chunk index within the track
    pub chunk_index: usize,
    /// Chunk start time within the track
    pub offset_sec: f64,
}

/// Aggregated track-level score
#[derive(Debug, Clone)]
pub struct TrackResult {
    pub track_id: Uuid,
    /// `base_score + diversity_bonus`
    pub final_score: f64,
    /// Mean of the top-K chunk scores
    pub base_score: f64,
    /// Reward for matching at multiple offsets
    pub diversity_bonus: f64,
    /// Total matching chunks for this track
    pub chunk_count: usize,
    /// The scores that produced `base_score`
    pub top_chunk_scores: Vec<f64>,
}

/// Aggregate chunk hits into per-track scores, best first.
///
/// When `exact_match_track_id` is set that track is excluded, so a clip of
/// an indexed track does not answer "similar to X" with X itself.
pub fn aggregate_chunk_hits(
    chunk_hits: &[ChunkHit],
    top_k_per_track: usize,
    diversity_weight: f64,
    exact_match_track_id: Option<Uuid>,
) -> Vec<TrackResult> {
    if chunk_hits.is_empty() {
        return Vec::new();
    }

    let mut by_track: HashMap<Uuid, Vec<&ChunkHit>> = HashMap::new();
    for hit in chunk_hits {
        by_track.entry(hit.track_id).or_default().push(hit);
    }

    let mut results: Vec<TrackResult> = Vec::with_capacity(by_track.len());

    for (track_id, hits) in by_track {
        if exact_match_track_id == Some(track_id) {
            debug!(track_id = %track_id, "Excluding exact-match track from vibe results");
            continue;
        }

        let mut scores: Vec<f64> = hits.iter().map(|h| h.score).collect();
        scores.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
        scores.truncate(top_k_per_track.max(1));

        let base_score = scores.iter().sum::<f64>() / scores.len() as f64;

        let unique_offsets = hits
            .iter()
            .map(|h| h.offset_sec.to_bits())
            .collect::<std::collections::HashSet<u64>>()
            .len();
        let diversity_bonus = (unique_offsets as f64 / 5.0).min(1.0) * diversity_weight;

        results.push(TrackResult {
            track_id,
            final_score: base_score + diversity_bonus,
            base_score,
            diversity_bonus,
            chunk_count: hits.len(),
            top_chunk_scores: scores,
        });
    }

    results.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    debug!(
        hits = chunk_hits.len(),
        tracks = results.len(),
        "Aggregated chunk hits"
    );

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(track_id: Uuid, score: f64, offset_sec: f64) -> ChunkHit {
        ChunkHit {
            track_id,
            score,
            chunk_index: (offset_sec / 5.0) as usize,
            offset_sec,
        }
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(aggregate_chunk_hits(&[], 3, 0.05, None).is_empty());
    }

    #[test]
    fn top_k_average_with_diversity_bonus() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let hits = vec![
            hit(a, 0.9, 0.0),
            hit(a, 0.85, 5.0),
            hit(a, 0.8, 10.0),
            hit(b, 0.75, 0.0),
            hit(b, 0.7, 5.0),
        ];

        let results = aggregate_chunk_hits(&hits, 3, 0.05, None);
        assert_eq!(results.len(), 2);

        let ra = &results[0];
        assert_eq!(ra.track_id, a);
        assert!((ra.base_score - 0.85).abs() < 1e-9);
        assert!((ra.diversity_bonus - 0.03).abs() < 1e-9);
        assert!((ra.final_score - 0.88).abs() < 1e-9);
        assert_eq!(ra.chunk_count, 3);

        let rb = &results[1];
        assert_eq!(rb.track_id, b);
        assert!((rb.base_score - 0.725).abs() < 1e-9);
        assert!((rb.diversity_bonus - 0.02).abs() < 1e-9);
        assert!((rb.final_score - 0.745).abs() < 1e-9);
    }

    #[test]
    fn exact_match_track_is_excluded() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let hits = vec![hit(a, 0.9, 0.0), hit(b, 0.7, 0.0)];

        let results = aggregate_chunk_hits(&hits, 3, 0.05, Some(a));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].track_id, b);
    }

    #[test]
    fn no_track_appears_twice_and_order_is_descending() {
        let tracks: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let mut hits = Vec::new();
        for (i, t) in tracks.iter().enumerate() {
            hits.push(hit(*t, 0.5 + 0.1 * i as f64, 0.0));
            hits.push(hit(*t, 0.4, 5.0));
        }

        let results = aggregate_chunk_hits(&hits, 3, 0.05, None);
        assert_eq!(results.len(), tracks.len());

        let mut seen = std::collections::HashSet::new();
        for r in &results {
            assert!(seen.insert(r.track_id));
        }
        for pair in results.windows(2) {
            assert!(pair[0].final_score >= pair[1].final_score);
        }
    }

    #[test]
    fn fewer_hits_than_top_k_averages_what_exists() {
        let a = Uuid::new_v4();
        let results = aggregate_chunk_hits(&[hit(a, 0.6, 0.0)], 3, 0.05, None);
        assert_eq!(results.len(), 1);
        assert!((results[0].base_score - 0.6).abs() < 1e-9);
        assert_eq!(results[0].top_chunk_scores, vec![0.6]);
    }

    #[test]
    fn diversity_bonus_saturates_at_five_offsets() {
        let a = Uuid::new_v4();
        let hits: Vec<ChunkHit> = (0..8).map(|i| hit(a, 0.5, i as f64 * 5.0)).collect();
        let results = aggregate_chunk_hits(&hits, 3, 0.05, None);
        assert!((results[0].diversity_bonus - 0.05).abs() < 1e-9);
    }
}
