//! Search request and response schemas

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::track::TrackInfo;

/// Which search lanes to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Fingerprint lane only
    Exact,
    /// Embedding lane only
    Vibe,
    /// Both lanes in parallel
    Both,
}

impl Default for SearchMode {
    fn default() -> Self {
        SearchMode::Both
    }
}

impl std::str::FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(SearchMode::Exact),
            "vibe" => Ok(SearchMode::Vibe),
            "both" => Ok(SearchMode::Both),
            other => Err(format!("unknown search mode '{}'", other)),
        }
    }
}

/// Result from the fingerprint (exact identification) lane
#[derive(Debug, Clone, Serialize)]
pub struct ExactMatch {
    pub track: TrackInfo,
    /// Normalized confidence in [0, 1]
    pub confidence: f64,
    /// Position of the clip within the reference track, if reconciled
    pub offset_seconds: Option<f64>,
    /// Aligned fingerprint hash count after consensus scoring
    pub aligned_hashes: u32,
}

/// Result from the embedding (vibe/similarity) lane
#[derive(Debug, Clone, Serialize)]
pub struct VibeMatch {
    pub track: TrackInfo,
    /// Aggregated similarity in [0, 1]
    pub similarity: f64,
    pub embedding_model: String,
}

/// Combined response from the search orchestrator
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub request_id: Uuid,
    pub query_duration_ms: f64,
    pub exact_matches: Vec<ExactMatch>,
    pub vibe_matches: Vec<VibeMatch>,
    pub mode_used: SearchMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("exact".parse::<SearchMode>().unwrap(), SearchMode::Exact);
        assert_eq!("VIBE".parse::<SearchMode>().unwrap(), SearchMode::Vibe);
        assert_eq!(" Both ".parse::<SearchMode>().unwrap(), SearchMode::Both);
        assert!("fuzzy".parse::<SearchMode>().is_err());
    }

    #[test]
    fn mode_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&SearchMode::Both).unwrap(), r#""both""#);
    }
}
