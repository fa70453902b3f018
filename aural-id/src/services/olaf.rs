//! Olaf acoustic fingerprint store client
//!
//! Wraps the `olaf_c` command-line tool, which maintains an inverted hash
//! index keyed by track name and reads PCM from disk (not stdin). The
//! store tolerates exactly one writer process; writes are serialized by
//! the ingestion mutex, reads are not gated.
//!
//! Audio must be 16 kHz mono f32le PCM.

use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Olaf client errors
#[derive(Debug, Error)]
pub enum OlafError {
    /// olaf_c binary not found
    #[error("olaf_c binary not found at '{0}'")]
    BinaryNotFound(String),

    /// Subprocess I/O failure
    #[error("olaf_c I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single match line from an olaf query.
#[derive(Debug, Clone, PartialEq)]
pub struct OlafMatch {
    /// Number of aligned fingerprint hashes
    pub match_count: u32,
    /// Start time in the query audio (seconds)
    pub query_start: f64,
    /// Stop time in the query audio (seconds)
    pub query_stop: f64,
    /// Track name used when indexing (a stringified UUID here)
    pub reference_path: String,
    /// Internal olaf reference id
    pub reference_id: i64,
    /// Start time in the reference track (seconds)
    pub reference_start: f64,
    /// Stop time in the reference track (seconds)
    pub reference_stop: f64,
}

/// Client for the olaf_c fingerprint store
#[derive(Debug, Clone)]
pub struct OlafClient {
    bin: String,
    db_dir: PathBuf,
}

impl OlafClient {
    /// Create a client for the given binary and index directory.
    pub fn new(bin: impl Into<String>, db_dir: impl Into<PathBuf>) -> Self {
        Self {
            bin: bin.into(),
            db_dir: db_dir.into(),
        }
    }

    /// Index a track's fingerprint hashes under its UUID string.
    ///
    /// Returns `Ok(false)` on a tool-level failure (logged); the pipeline
    /// records the miss on the track row and continues.
    pub async fn store(&self, pcm_16k_f32le: &[u8], track_id: Uuid) -> Result<bool, OlafError> {
        if pcm_16k_f32le.is_empty() {
            warn!(track_id = %track_id, "Empty PCM provided for fingerprint indexing");
            return Ok(false);
        }

        let tmp = self.write_temp_pcm(pcm_16k_f32le)?;
        let output = self
            .run(&["store", &tmp.path().to_string_lossy(), &track_id.to_string()])
            .await?;

        if !output.status.success() {
            error!(
                track_id = %track_id,
                code = output.status.code().unwrap_or(-1),
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "olaf_c store failed"
            );
            return Ok(false);
        }

        info!(track_id = %track_id, "Indexed track fingerprints");
        Ok(true)
    }

    /// Query the index with a PCM clip.
    ///
    /// A non-zero exit is treated as "no matches". A missing binary is the
    /// distinguished `BinaryNotFound` error.
    pub async fn query(&self, pcm_16k_f32le: &[u8]) -> Result<Vec<OlafMatch>, OlafError> {
        if pcm_16k_f32le.is_empty() {
            return Ok(Vec::new());
        }

        let tmp = self.write_temp_pcm(pcm_16k_f32le)?;
        let output = self
            .run(&["query", &tmp.path().to_string_lossy(), "query"])
            .await?;

        if !output.status.success() {
            warn!(
                code = output.status.code().unwrap_or(-1),
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "olaf_c query failed; treating as no matches"
            );
            return Ok(Vec::new());
        }

        Ok(parse_query_output(&String::from_utf8_lossy(&output.stdout)))
    }

    /// Remove a track from the index.
    pub async fn delete(&self, track_id: Uuid) -> Result<bool, OlafError> {
        let output = self.run(&["del", &track_id.to_string()]).await?;

        if !output.status.success() {
            error!(
                track_id = %track_id,
                code = output.status.code().unwrap_or(-1),
                "olaf_c del failed"
            );
            return Ok(false);
        }

        info!(track_id = %track_id, "Deleted track fingerprints");
        Ok(true)
    }

    /// Spawn olaf_c with OLAF_DB pointed at the index directory.
    async fn run(&self, args: &[&str]) -> Result<std::process::Output, OlafError> {
        std::fs::create_dir_all(&self.db_dir)?;
        let db_dir = self
            .db_dir
            .canonicalize()
            .unwrap_or_else(|_| self.db_dir.clone());

        debug!(bin = %self.bin, ?args, "Invoking olaf_c");

        Command::new(&self.bin)
            .args(args)
            .env("OLAF_DB", &db_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => OlafError::BinaryNotFound(self.bin.clone()),
                _ => OlafError::Io(e),
            })
    }

    /// Write PCM to a temp file the tool can read; the file is removed when
    /// the returned handle drops, on every path.
    fn write_temp_pcm(&self, pcm: &[u8]) -> Result<tempfile::NamedTempFile, OlafError> {
        let mut tmp = tempfile::Builder::new()
            .prefix("aural-olaf-")
            .suffix(".raw")
            .tempfile()?;
        tmp.write_all(pcm)?;
        tmp.flush()?;
        Ok(tmp)
    }
}

/// Parse query stdout into matches, strongest first.
fn parse_query_output(stdout: &str) -> Vec<OlafMatch> {
    let mut matches: Vec<OlafMatch> = stdout
        .lines()
        .filter_map(|line| parse_query_line(line.trim()))
        .collect();

    matches.sort_by(|a, b| b.match_count.cmp(&a.match_count));
    matches
}

/// Parse a single output line: comma-separated first, semicolon fallback.
///
/// Expected fields, in order:
/// `match_count, query_start, query_stop, ref_path, ref_id, ref_start, ref_stop`
fn parse_query_line(line: &str) -> Option<OlafMatch> {
    if line.is_empty() {
        return None;
    }

    let comma: Vec<&str> = line.split(',').map(str::trim).collect();
    if comma.len() >= 7 {
        if let Some(m) = fields_to_match(&comma) {
            return Some(m);
        }
    }

    let semi: Vec<&str> = line.split(';').map(str::trim).collect();
    if semi.len() >= 7 {
        if let Some(m) = fields_to_match(&semi) {
            return Some(m);
        }
    }

    debug!(line, "Skipping unparseable olaf output line");
    None
}

fn fields_to_match(parts: &[&str]) -> Option<OlafMatch> {
    Some(OlafMatch {
        match_count: parts[0].parse().ok()?,
        query_start: parts[1].parse().ok()?,
        query_stop: parts[2].parse().ok()?,
        reference_path: parts[3].to_string(),
        reference_id: parts[4].parse().ok()?,
        reference_start: parts[5].parse().ok()?,
        reference_stop: parts[6].parse().ok()?,
    })
}
