//! Ingestion pipeline
//!
//! Processes one audio file end to end: hash dedup, tag extraction,
//! dual-rate decode with duration gating, canonical storage, content
//! dedup, parallel indexing into the fingerprint and vector stores, and
//! finally the Track row, the transactional "ingestion succeeded"
//! marker. Either side-index may fail without aborting the other; the
//! row records which ones actually landed.
//!
//! The fingerprint store tolerates one writer process. Callers serialize
//! ingestions: the HTTP endpoint through the AppState mutex, the CLI by
//! processing files sequentially.

use chrono::Utc;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::audio::{chunker, decode, pcm};
use crate::config::ServiceConfig;
use crate::services::qdrant::PointMetadata;
use crate::services::{chromaprint, dedup, metadata, storage};
use crate::services::{Embedder, OlafClient, QdrantClient};
use crate::models::Track;

/// Minimum ingestable duration in seconds
pub const MIN_INGESTION_DURATION: f64 = 3.0;

/// Maximum ingestable duration in seconds (30 minutes)
pub const MAX_INGESTION_DURATION: f64 = 1800.0;

/// File extensions considered audio during directory scans
pub const AUDIO_EXTENSIONS: [&str; 7] = ["mp3", "wav", "webm", "ogg", "mp4", "m4a", "flac"];

/// Terminal status of one file's ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStatus {
    Ingested,
    Duplicate,
    Skipped,
    Error,
}

/// Result of ingesting a single file
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub file_path: PathBuf,
    pub status: PipelineStatus,
    /// New id on success; existing id on duplicate
    pub track_id: Option<Uuid>,
    /// Skip or error reason
    pub detail: Option<String>,
    pub duration_seconds: Option<f64>,
    pub title: Option<String>,
    pub artist: Option<String>,
}

impl IngestOutcome {
    fn new(file_path: &Path) -> Self {
        Self {
            file_path: file_path.to_path_buf(),
            status: PipelineStatus::Error,
            track_id: None,
            detail: None,
            duration_seconds: None,
            title: None,
            artist: None,
        }
    }

    fn error(mut self, detail: impl Into<String>) -> Self {
        self.status = PipelineStatus::Error;
        self.detail = Some(detail.into());
        self
    }

    fn skipped(mut self, detail: impl Into<String>) -> Self {
        self.status = PipelineStatus::Skipped;
        self.detail = Some(detail.into());
        self
    }
}

/// Summary of a batch ingestion run
#[derive(Debug, Default)]
pub struct IngestReport {
    pub total_files: usize,
    pub ingested: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub errors: usize,
    pub outcomes: Vec<IngestOutcome>,
}

/// The ingestion pipeline with its store clients
#[derive(Clone)]
pub struct IngestPipeline {
    db: SqlitePool,
    config: std::sync::Arc<ServiceConfig>,
    olaf: OlafClient,
    qdrant: QdrantClient,
    embedder: Option<Embedder>,
}

impl IngestPipeline {
    pub fn new(
        db: SqlitePool,
        config: std::sync::Arc<ServiceConfig>,
        olaf: OlafClient,
        qdrant: QdrantClient,
        embedder: Option<Embedder>,
    ) -> Self {
        Self {
            db,
            config,
            olaf,
            qdrant,
            embedder,
        }
    }

    /// Ingest a single audio file. Failures are folded into the outcome;
    /// this function does not error.
    pub async fn ingest_file(&self, file_path: &Path) -> IngestOutcome {
        let mut outcome = IngestOutcome::new(file_path);

        // Step 1: hash and fast-path dedup, before any decode or index work
        let file_bytes = match std::fs::read(file_path) {
            Ok(bytes) => bytes,
            Err(e) => return outcome.error(format!("Read failed: {}", e)),
        };
        let file_hash = format!("{:x}", Sha256::digest(&file_bytes));

        match dedup::check_file_duplicate(&self.db, &file_hash).await {
            Ok(Some(existing_id)) => {
                let tags = metadata::extract_tags(file_path);
                outcome.status = PipelineStatus::Duplicate;
                outcome.track_id = Some(existing_id);
                outcome.title = tags.title.or_else(|| file_stem(file_path));
                outcome.artist = tags.artist;
                info!(file = %file_path.display(), hash = %&file_hash[..8], "Skipping duplicate file");
                return outcome;
            }
            Ok(None) => {}
            Err(e) => return outcome.error(format!("Dedup lookup failed: {}", e)),
        }

        // Step 2: tag metadata; missing fields stay null
        let tags = metadata::extract_tags(file_path);
        outcome.title = tags.title.clone().or_else(|| file_stem(file_path));
        outcome.artist = tags.artist.clone();

        // Step 3: dual-rate decode and duration gate
        let (pcm_16k, pcm_48k) = match decode::decode_dual_rate(&file_bytes).await {
            Ok(streams) => streams,
            Err(e) => return outcome.error(format!("Decode error: {}", e)),
        };

        let duration = pcm::duration_seconds(pcm_16k.len(), 16_000, pcm::BYTES_PER_F32);
        outcome.duration_seconds = Some(duration);

        if duration < MIN_INGESTION_DURATION {
            warn!(file = %file_path.display(), duration, "Skipping too-short file");
            return outcome.skipped(format!(
                "Too short: {:.1}s (min: {}s)",
                duration, MIN_INGESTION_DURATION
            ));
        }
        if duration > MAX_INGESTION_DURATION {
            warn!(file = %file_path.display(), duration, "Skipping too-long file");
            return outcome.skipped(format!(
                "Too long: {:.1}s (max: {}s)",
                duration, MAX_INGESTION_DURATION
            ));
        }

        // Step 4: canonical storage, only after validation passed
        let extension = file_path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_else(|| "bin".to_string());
        let storage_path = storage::raw_audio_path(&self.config.storage_root, &file_hash, &extension);
        if let Err(e) = storage::ensure_storage_dirs(&self.config.storage_root, &file_hash)
            .and_then(|_| std::fs::write(&storage_path, &file_bytes))
        {
            return outcome.error(format!("Storage write failed: {}", e));
        }

        // Step 5: content dedup, before the expensive indexing
        let pcm_s16le = pcm::f32le_to_s16le(&pcm_16k);
        let fingerprint =
            chromaprint::generate_chromaprint(&self.config.fpcalc_bin, &pcm_s16le, duration).await;

        if let Some(fp) = &fingerprint {
            match dedup::check_content_duplicate(&self.db, fp, duration, dedup::CONTENT_DUP_THRESHOLD)
                .await
            {
                Ok(Some(existing_id)) => {
                    // No fingerprint-store or vector-store writes happened
                    // yet, so the copied file is the only thing to undo.
                    let _ = std::fs::remove_file(&storage_path);
                    outcome.status = PipelineStatus::Duplicate;
                    outcome.track_id = Some(existing_id);
                    return outcome;
                }
                Ok(None) => {}
                Err(e) => {
                    let _ = std::fs::remove_file(&storage_path);
                    return outcome.error(format!("Content dedup failed: {}", e));
                }
            }
        }

        // Step 6: parallel indexing; either side may fail independently
        let track_id = Uuid::new_v4();

        let olaf_task = async {
            match self.olaf.store(&pcm_16k, track_id).await {
                Ok(success) => success,
                Err(e) => {
                    error!(track_id = %track_id, error = %e, "Fingerprint indexing failed");
                    false
                }
            }
        };

        let embedding_task = async {
            let Some(embedder) = &self.embedder else {
                return 0usize;
            };
            let chunks = chunker::chunk_pcm(&pcm_48k);
            if chunks.is_empty() {
                return 0;
            }
            let embedded = match embedder.embed_chunks(chunks).await {
                Ok(embedded) => embedded,
                Err(e) => {
                    error!(track_id = %track_id, error = %e, "Embedding failed");
                    return 0;
                }
            };
            let point_meta = PointMetadata {
                artist: tags.artist.clone().unwrap_or_default(),
                title: tags.title.clone().unwrap_or_default(),
                genre: tags.genre.clone().unwrap_or_default(),
            };
            match self.qdrant.upsert_chunks(track_id, &embedded, &point_meta).await {
                Ok(count) => count,
                Err(e) => {
                    error!(track_id = %track_id, error = %e, "Vector upsert failed");
                    0
                }
            }
        };

        let (olaf_indexed, embedding_count) = tokio::join!(olaf_task, embedding_task);

        // Step 7: persist the Track row
        let now = Utc::now();
        let track = Track {
            id: track_id,
            title: outcome
                .title
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
            artist: tags.artist.clone(),
            album: tags.album.clone(),
            duration_seconds: duration,
            sample_rate: tags.sample_rate.map(i64::from),
            channels: tags.channels.map(i64::from),
            bitrate: tags.bitrate.map(i64::from),
            format: tags.format.clone().or(Some(extension)),
            file_hash_sha256: file_hash,
            file_size_bytes: file_bytes.len() as i64,
            file_path: storage_path.to_string_lossy().to_string(),
            chromaprint_duration: fingerprint.as_ref().map(|_| duration),
            chromaprint_fingerprint: fingerprint,
            olaf_indexed,
            embedding_model: (embedding_count > 0)
                .then(|| self.config.embedding_model.clone()),
            embedding_dim: (embedding_count > 0).then_some(self.config.embedding_dim as i64),
            ingested_at: now,
            updated_at: now,
        };

        if let Err(e) = crate::db::tracks::insert_track(&self.db, &track).await {
            // The canonical file and any upserted points are orphaned;
            // reconcilable by an offline sweep.
            return outcome.error(format!("Track insert failed: {}", e));
        }

        info!(
            file = %file_path.display(),
            track_id = %track_id,
            olaf_indexed,
            embeddings = embedding_count,
            "Ingested track"
        );

        outcome.status = PipelineStatus::Ingested;
        outcome.track_id = Some(track_id);
        outcome
    }

    /// Ingest every audio file under a directory, sequentially.
    ///
    /// Files are visited in sorted order and never in parallel: the
    /// fingerprint store allows a single writer.
    pub async fn ingest_directory(&self, directory: &Path) -> IngestReport {
        let mut audio_files: Vec<PathBuf> = WalkDir::new(directory)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| {
                path.extension()
                    .map(|e| {
                        let ext = e.to_string_lossy().to_lowercase();
                        AUDIO_EXTENSIONS.contains(&ext.as_str())
                    })
                    .unwrap_or(false)
            })
            .collect();
        audio_files.sort();

        let mut report = IngestReport {
            total_files: audio_files.len(),
            ..Default::default()
        };

        if audio_files.is_empty() {
            warn!(directory = %directory.display(), "No audio files found");
            return report;
        }

        info!(
            count = audio_files.len(),
            directory = %directory.display(),
            "Starting batch ingestion"
        );

        for (i, file_path) in audio_files.iter().enumerate() {
            info!(
                progress = %format!("{}/{}", i + 1, report.total_files),
                file = %file_path.display(),
                "Ingesting"
            );

            let outcome = self.ingest_file(file_path).await;
            match outcome.status {
                PipelineStatus::Ingested => report.ingested += 1,
                PipelineStatus::Duplicate => report.duplicates += 1,
                PipelineStatus::Skipped => report.skipped += 1,
                PipelineStatus::Error => report.errors += 1,
            }
            report.outcomes.push(outcome);
        }

        info!(
            ingested = report.ingested,
            duplicates = report.duplicates,
            skipped = report.skipped,
            errors = report.errors,
            total = report.total_files,
            "Batch ingestion complete"
        );

        report
    }
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().map(|s| s.to_string_lossy().to_string())
}
