//! Search orchestrator
//!
//! Dispatches the requested lanes with independent wall-clock budgets and
//! classifies the aggregate outcome. In both-mode one lane's failure or
//! timeout never cancels the other; a single surviving lane still yields a
//! successful response with the failed lane empty. There are no retries
//! here; retrying is the client's job.

use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use crate::models::{ExactMatch, SearchMode, SearchResponse, VibeMatch};
use crate::search::{exact, vibe};
use crate::AppState;

/// Budget for the exact (fingerprint) lane. Typical latency is well under
/// a second; the budget leaves room for a cold index.
pub const EXACT_TIMEOUT: Duration = Duration::from_secs(3);

/// Budget for the vibe (embedding + vector store) lane, the slower of the
/// two because of model inference.
pub const VIBE_TIMEOUT: Duration = Duration::from_secs(4);

/// Aggregate search failures surfaced to the HTTP layer
#[derive(Debug, Error)]
pub enum SearchError {
    /// Every requested lane exceeded its budget
    #[error("Search timed out: {0}")]
    Timeout(String),

    /// Every requested lane failed
    #[error("Search unavailable: {0}")]
    Unavailable(String),
}

/// Terminal state of one lane
#[derive(Debug)]
enum LaneOutcome<T> {
    Success(Vec<T>),
    TimedOut,
    Failed,
}

/// Orchestrate a search across the requested lanes.
pub async fn orchestrate_search(
    state: &AppState,
    pcm_16k: &[u8],
    pcm_48k: &[u8],
    mode: SearchMode,
    max_results: usize,
) -> Result<SearchResponse, SearchError> {
    let request_id = Uuid::new_v4();
    let started = Instant::now();

    let (exact_matches, vibe_matches) = match mode {
        SearchMode::Exact => {
            let matches = match run_exact_lane(state, pcm_16k, max_results).await {
                LaneOutcome::Success(matches) => matches,
                LaneOutcome::TimedOut => {
                    return Err(SearchError::Timeout("exact lane timed out".into()))
                }
                LaneOutcome::Failed => {
                    return Err(SearchError::Unavailable("exact lane failed".into()))
                }
            };
            (matches, Vec::new())
        }
        SearchMode::Vibe => {
            let matches = match run_vibe_lane(state, pcm_48k, max_results).await {
                LaneOutcome::Success(matches) => matches,
                LaneOutcome::TimedOut => {
                    return Err(SearchError::Timeout("vibe lane timed out".into()))
                }
                LaneOutcome::Failed => {
                    return Err(SearchError::Unavailable("vibe lane failed".into()))
                }
            };
            (Vec::new(), matches)
        }
        SearchMode::Both => {
            // Concurrent, independently timed; neither cancels the other.
            let (exact_outcome, vibe_outcome) = tokio::join!(
                run_exact_lane(state, pcm_16k, max_results),
                run_vibe_lane(state, pcm_48k, max_results),
            );
            classify_both(exact_outcome, vibe_outcome)?
        }
    };

    Ok(SearchResponse {
        request_id,
        query_duration_ms: started.elapsed().as_secs_f64() * 1000.0,
        exact_matches,
        vibe_matches,
        mode_used: mode,
    })
}

async fn run_exact_lane(
    state: &AppState,
    pcm_16k: &[u8],
    max_results: usize,
) -> LaneOutcome<ExactMatch> {
    match tokio::time::timeout(
        EXACT_TIMEOUT,
        exact::run_exact_lane(&state.db, &state.olaf, pcm_16k, max_results),
    )
    .await
    {
        Ok(Ok(matches)) => LaneOutcome::Success(matches),
        Ok(Err(e)) => {
            error!(error = %e, "Exact lane failed");
            LaneOutcome::Failed
        }
        Err(_) => {
            warn!("Exact lane timed out after {:?}", EXACT_TIMEOUT);
            LaneOutcome::TimedOut
        }
    }
}

async fn run_vibe_lane(
    state: &AppState,
    pcm_48k: &[u8],
    max_results: usize,
) -> LaneOutcome<VibeMatch> {
    match tokio::time::timeout(
        VIBE_TIMEOUT,
        vibe::run_vibe_lane(
            &state.db,
            &state.qdrant,
            state.embedder.as_ref(),
            state.config.as_ref(),
            pcm_48k,
            max_results,
            None,
        ),
    )
    .await
    {
        Ok(Ok(matches)) => LaneOutcome::Success(matches),
        Ok(Err(e)) => {
            error!(error = %e, "Vibe lane failed");
            LaneOutcome::Failed
        }
        Err(_) => {
            warn!("Vibe lane timed out after {:?}", VIBE_TIMEOUT);
            LaneOutcome::TimedOut
        }
    }
}

/// Classify the pair of lane outcomes in both-mode.
///
/// Both timed out → timeout; both failed (any mix of failure kinds with no
/// survivor) → unavailable; otherwise the surviving lane(s) are returned
/// and the failed lane is an empty array.
fn classify_both(
    exact: LaneOutcome<ExactMatch>,
    vibe: LaneOutcome<VibeMatch>,
) -> Result<(Vec<ExactMatch>, Vec<VibeMatch>), SearchError> {
    if matches!(exact, LaneOutcome::TimedOut) && matches!(vibe, LaneOutcome::TimedOut) {
        return Err(SearchError::Timeout("both search lanes timed out".into()));
    }

    match (exact, vibe) {
        (LaneOutcome::Success(e), LaneOutcome::Success(v)) => Ok((e, v)),
        (LaneOutcome::Success(e), _) => Ok((e, Vec::new())),
        (_, LaneOutcome::Success(v)) => Ok((Vec::new(), v)),
        _ => Err(SearchError::Unavailable("both search lanes failed".into())),
    }
}
