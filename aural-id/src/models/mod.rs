//! Data models and API schemas

pub mod ingest;
pub mod pagination;
pub mod search;
pub mod track;

pub use ingest::{IngestResponse, IngestStatus};
pub use pagination::{PaginatedResponse, PaginationMeta};
pub use search::{ExactMatch, SearchMode, SearchResponse, VibeMatch};
pub use track::{Track, TrackDetail, TrackInfo};
