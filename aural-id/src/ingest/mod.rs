//! Ingestion pipeline

pub mod pipeline;

pub use pipeline::{IngestOutcome, IngestPipeline, IngestReport, PipelineStatus};
