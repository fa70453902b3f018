//! Audio decoding via ffmpeg subprocess
//!
//! Converts any container format to raw mono PCM at a requested rate.
//! The fingerprint path consumes 16 kHz f32le, the embedding path 48 kHz
//! f32le; both are produced from the same source bytes in parallel.

use super::pcm;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Decoding errors
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Input byte buffer was empty
    #[error("Empty audio data provided")]
    EmptyInput,

    /// ffmpeg binary not found on PATH
    #[error("ffmpeg binary not found on PATH")]
    BinaryNotFound,

    /// ffmpeg exited with a non-zero status
    #[error("ffmpeg exited with code {code}: {stderr}")]
    FfmpegFailed { code: i32, stderr: String },

    /// ffmpeg exited cleanly but produced no PCM
    #[error("ffmpeg produced no output")]
    EmptyOutput,

    /// Decoded duration below the configured minimum
    #[error("Audio too short: {actual:.2}s (minimum {min:.2}s)")]
    TooShort { actual: f64, min: f64 },

    /// Decoded duration above the configured maximum
    #[error("Audio too long: {actual:.2}s (maximum {max:.2}s)")]
    TooLong { actual: f64, max: f64 },

    /// I/O error talking to the child process
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Output PCM sample format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcmFormat {
    /// 32-bit float little-endian (fingerprinting, embedding)
    F32le,
    /// 16-bit signed little-endian (chromaprint input)
    S16le,
}

impl PcmFormat {
    fn muxer(self) -> &'static str {
        match self {
            PcmFormat::F32le => "f32le",
            PcmFormat::S16le => "s16le",
        }
    }

    fn codec(self) -> &'static str {
        match self {
            PcmFormat::F32le => "pcm_f32le",
            PcmFormat::S16le => "pcm_s16le",
        }
    }

    /// Bytes per mono sample in this format
    pub fn bytes_per_sample(self) -> usize {
        match self {
            PcmFormat::F32le => pcm::BYTES_PER_F32,
            PcmFormat::S16le => pcm::BYTES_PER_S16,
        }
    }
}

/// Decode audio bytes to raw mono PCM at the requested rate.
pub async fn decode_to_pcm(
    audio_data: &[u8],
    sample_rate: u32,
    format: PcmFormat,
) -> Result<Vec<u8>, DecodeError> {
    if audio_data.is_empty() {
        return Err(DecodeError::EmptyInput);
    }

    let mut child = Command::new("ffmpeg")
        .args([
            "-hide_banner",
            "-loglevel",
            "error",
            "-i",
            "pipe:0",
            "-ar",
            &sample_rate.to_string(),
            "-ac",
            "1",
            "-f",
            format.muxer(),
            "-acodec",
            format.codec(),
            "pipe:1",
        ])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DecodeError::BinaryNotFound,
            _ => DecodeError::Io(e),
        })?;

    // Feed stdin from a separate task so a full stdout pipe cannot deadlock
    // the write side.
    let mut stdin = child.stdin.take().ok_or_else(|| {
        DecodeError::Io(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "ffmpeg stdin unavailable",
        ))
    })?;
    let input = audio_data.to_vec();
    let writer = tokio::spawn(async move {
        let _ = stdin.write_all(&input).await;
        // stdin drops here, closing the pipe
    });

    let output = child.wait_with_output().await?;
    let _ = writer.await;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(DecodeError::FfmpegFailed {
            code: output.status.code().unwrap_or(-1),
            stderr,
        });
    }

    if output.stdout.is_empty() {
        return Err(DecodeError::EmptyOutput);
    }

    debug!(
        sample_rate,
        bytes = output.stdout.len(),
        "Decoded audio to PCM"
    );

    Ok(output.stdout)
}

/// Decode to both 16 kHz f32le and 48 kHz f32le in parallel.
///
/// Fails if either child fails; the surviving decode is discarded.
pub async fn decode_dual_rate(audio_data: &[u8]) -> Result<(Vec<u8>, Vec<u8>), DecodeError> {
    tokio::try_join!(
        decode_to_pcm(audio_data, 16_000, PcmFormat::F32le),
        decode_to_pcm(audio_data, 48_000, PcmFormat::F32le),
    )
}

/// Decode dual rate and enforce duration bounds.
///
/// Returns the two PCM streams and the duration derived from the 16 kHz
/// stream.
pub async fn decode_and_validate(
    audio_data: &[u8],
    min_duration: f64,
    max_duration: f64,
) -> Result<(Vec<u8>, Vec<u8>, f64), DecodeError> {
    let (pcm_16k, pcm_48k) = decode_dual_rate(audio_data).await?;

    let duration = pcm::duration_seconds(pcm_16k.len(), 16_000, pcm::BYTES_PER_F32);

    if duration < min_duration {
        return Err(DecodeError::TooShort {
            actual: duration,
            min: min_duration,
        });
    }
    if duration > max_duration {
        return Err(DecodeError::TooLong {
            actual: duration,
            max: max_duration,
        });
    }

    Ok((pcm_16k, pcm_48k, duration))
}
