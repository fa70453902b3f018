//! Audio embedding via an external model process
//!
//! The embedder binary receives 48 kHz mono f32le PCM on stdin and writes
//! one JSON document to stdout. Model variants disagree on the output
//! shape, so three forms are accepted: a raw `[1, D]` tensor, an object
//! with a non-null `pooled_output [1, D]`, or an object with
//! `last_hidden_state [1, T, D]` (position 0 along T is taken). The batch
//! dimension is squeezed and the vector stored as plain floats.
//!
//! Inference is CPU-bound and serialized process-wide by a single-slot
//! semaphore held only across the model call; surrounding I/O is not
//! serialized, and the permit is released on success and failure alike.

use once_cell::sync::Lazy;
use serde::Deserialize;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::audio::chunker::PcmChunk;
use crate::config::ServiceConfig;

/// Single-slot gate: at most one inference runs at any instant, shared by
/// the vibe lane and the ingestion embedding step.
static EMBED_GATE: Lazy<Semaphore> = Lazy::new(|| Semaphore::new(1));

/// Embedding errors
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// No embedder configured or binary missing
    #[error("Embedding model unavailable: {0}")]
    Unavailable(String),

    /// Embedder process exited non-zero
    #[error("Embedder process failed: {0}")]
    ProcessFailed(String),

    /// Output was not one of the accepted shapes
    #[error("Failed to parse embedder output: {0}")]
    ParseError(String),

    /// Vector length did not match the configured dimensionality
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    WrongDimension { expected: usize, actual: usize },

    /// I/O error talking to the child process
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A chunk embedding ready for the vector store
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Fixed-dimension embedding vector
    pub embedding: Vec<f32>,
    /// Chunk start time within the track (seconds)
    pub offset_sec: f64,
    /// Sequential chunk index
    pub chunk_index: usize,
    /// Unpadded chunk duration (seconds)
    pub duration_sec: f64,
}

/// The shapes model variants emit.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ModelOutput {
    Object {
        #[serde(default)]
        pooled_output: Option<Vec<Vec<f32>>>,
        #[serde(default)]
        last_hidden_state: Option<Vec<Vec<Vec<f32>>>>,
    },
    Raw(Vec<Vec<f32>>),
}

/// External embedder client
#[derive(Debug, Clone)]
pub struct Embedder {
    bin: String,
    model: String,
    dim: usize,
}

impl Embedder {
    /// Build from config; fails closed when no embedder binary is set.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, EmbeddingError> {
        let bin = config
            .embed_bin
            .clone()
            .ok_or_else(|| EmbeddingError::Unavailable("no embedder binary configured".into()))?;

        Ok(Self {
            bin,
            model: config.embedding_model.clone(),
            dim: config.embedding_dim,
        })
    }

    /// Model identifier recorded on tracks and responses.
    pub fn model_name(&self) -> &str {
        &self.model
    }

    /// Embedding dimensionality.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Produce one embedding vector for a buffer of 48 kHz samples.
    pub async fn embed(&self, samples: &[f32]) -> Result<Vec<f32>, EmbeddingError> {
        let pcm: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();

        // Gate held only across the model call; dropped on every path.
        let _permit = EMBED_GATE
            .acquire()
            .await
            .map_err(|_| EmbeddingError::Unavailable("inference gate closed".into()))?;

        let output = self.run_model(&pcm).await?;
        squeeze_output(output, self.dim)
    }

    /// Embed every chunk of a track, in order.
    ///
    /// The gate is re-acquired per chunk so a long track cannot starve
    /// concurrent query-path inference.
    pub async fn embed_chunks(
        &self,
        chunks: Vec<PcmChunk>,
    ) -> Result<Vec<AudioChunk>, EmbeddingError> {
        let mut out = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let embedding = self.embed(&chunk.samples).await?;
            out.push(AudioChunk {
                embedding,
                offset_sec: chunk.offset_sec,
                chunk_index: chunk.index,
                duration_sec: chunk.duration_sec,
            });
        }
        debug!(chunks = out.len(), "Generated chunk embeddings");
        Ok(out)
    }

    async fn run_model(&self, pcm: &[u8]) -> Result<ModelOutput, EmbeddingError> {
        let mut child = Command::new(&self.bin)
            .arg(&self.model)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    EmbeddingError::Unavailable(format!("embedder binary '{}' not found", self.bin))
                }
                _ => EmbeddingError::Io(e),
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| EmbeddingError::ProcessFailed("embedder stdin unavailable".into()))?;
        let input = pcm.to_vec();
        let writer = tokio::spawn(async move {
            let _ = stdin.write_all(&input).await;
        });

        let output = child.wait_with_output().await?;
        let _ = writer.await;

        if !output.status.success() {
            return Err(EmbeddingError::ProcessFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| EmbeddingError::ParseError(e.to_string()))
    }
}

/// Reduce a model output to a single D-length vector.
fn squeeze_output(output: ModelOutput, dim: usize) -> Result<Vec<f32>, EmbeddingError> {
    let vector = match output {
        ModelOutput::Raw(mut rows) => {
            if rows.is_empty() {
                return Err(EmbeddingError::ParseError("empty output tensor".into()));
            }
            rows.swap_remove(0)
        }
        ModelOutput::Object {
            pooled_output: Some(mut rows),
            ..
        } if !rows.is_empty() => rows.swap_remove(0),
        ModelOutput::Object {
            last_hidden_state: Some(mut batches),
            ..
        } if !batches.is_empty() && !batches[0].is_empty() => batches.swap_remove(0).swap_remove(0),
        ModelOutput::Object { .. } => {
            return Err(EmbeddingError::ParseError(
                "output object carries neither pooled_output nor last_hidden_state".into(),
            ));
        }
    };

    if vector.len() != dim {
        return Err(EmbeddingError::WrongDimension {
            expected: dim,
            actual: vector.len(),
        });
    }

    Ok(vector)
}
