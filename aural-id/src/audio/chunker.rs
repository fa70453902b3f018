//! Overlapping-window chunker for embedding inference
//!
//! Splits 48 kHz PCM into 10 s windows at a 5 s hop so features near a
//! window boundary are seen by at least two windows. Residuals shorter
//! than 1 s are skipped; shorter final windows are zero-padded on the
//! right, with the unpadded duration carried alongside.

use super::pcm;

/// Window length in seconds (the embedding model's native input length)
pub const CHUNK_WINDOW_SEC: f64 = 10.0;

/// Hop between window start times in seconds (50% overlap)
pub const CHUNK_HOP_SEC: f64 = 5.0;

/// Minimum residual audio for a window to be emitted
pub const MIN_CHUNK_SEC: f64 = 1.0;

/// Required sample rate for the embedding model
pub const CHUNK_SAMPLE_RATE: u32 = 48_000;

/// A single window of samples awaiting embedding
#[derive(Debug, Clone)]
pub struct PcmChunk {
    /// Zero-padded samples, always exactly one window long
    pub samples: Vec<f32>,
    /// Window start within the track, in seconds
    pub offset_sec: f64,
    /// Sequential window index
    pub index: usize,
    /// Unpadded duration in seconds
    pub duration_sec: f64,
}

/// Chunk 48 kHz f32le PCM into overlapping embedding windows.
pub fn chunk_pcm(pcm_48k_f32le: &[u8]) -> Vec<PcmChunk> {
    let audio = pcm::bytes_to_f32(pcm_48k_f32le);
    let total_samples = audio.len();

    let window_samples = (CHUNK_WINDOW_SEC * CHUNK_SAMPLE_RATE as f64) as usize;
    let hop_samples = (CHUNK_HOP_SEC * CHUNK_SAMPLE_RATE as f64) as usize;

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index = 0usize;

    while start < total_samples {
        let end = (start + window_samples).min(total_samples);
        let chunk_samples = end - start;
        let duration_sec = chunk_samples as f64 / CHUNK_SAMPLE_RATE as f64;

        if duration_sec < MIN_CHUNK_SEC {
            break;
        }

        let mut samples = vec![0.0f32; window_samples];
        samples[..chunk_samples].copy_from_slice(&audio[start..end]);

        chunks.push(PcmChunk {
            samples,
            offset_sec: start as f64 / CHUNK_SAMPLE_RATE as f64,
            index,
            duration_sec,
        });

        index += 1;
        start += hop_samples;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: usize = CHUNK_SAMPLE_RATE as usize;

    /// PCM of the given duration whose sample values encode their index,
    /// so chunk content can be checked positionally.
    fn ramp_pcm(duration_sec: f64) -> Vec<u8> {
        let n = (duration_sec * RATE as f64) as usize;
        (0..n)
            .flat_map(|i| ((i % 1000) as f32).to_le_bytes())
            .collect()
    }

    #[test]
    fn thirty_seconds_yields_six_chunks() {
        let chunks = chunk_pcm(&ramp_pcm(30.0));
        assert_eq!(chunks.len(), 6);
        let offsets: Vec<f64> = chunks.iter().map(|c| c.offset_sec).collect();
        assert_eq!(offsets, vec![0.0, 5.0, 10.0, 15.0, 20.0, 25.0]);
        for c in &chunks {
            assert_eq!(c.samples.len(), 10 * RATE);
        }
        // Final chunk covers 25..30s, so only 5s of real signal
        assert_eq!(chunks[5].duration_sec, 5.0);
    }

    #[test]
    fn ten_seconds_yields_two_chunks_with_padded_tail() {
        let chunks = chunk_pcm(&ramp_pcm(10.0));
        assert_eq!(chunks.len(), 2);

        assert_eq!(chunks[0].offset_sec, 0.0);
        assert_eq!(chunks[0].duration_sec, 10.0);

        assert_eq!(chunks[1].offset_sec, 5.0);
        assert_eq!(chunks[1].duration_sec, 5.0);
        // Second half of the tail window is zero padding
        assert!(chunks[1].samples[5 * RATE..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn half_second_yields_nothing() {
        assert!(chunk_pcm(&ramp_pcm(0.5)).is_empty());
    }

    #[test]
    fn exactly_one_second_yields_one_chunk() {
        let chunks = chunk_pcm(&ramp_pcm(1.0));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].duration_sec, 1.0);
        assert_eq!(chunks[0].index, 0);
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(chunk_pcm(&[]).is_empty());
    }

    #[test]
    fn unpadded_chunk_content_reproduces_source() {
        let pcm = ramp_pcm(12.0);
        let source = pcm::bytes_to_f32(&pcm);
        for chunk in chunk_pcm(&pcm) {
            let start = (chunk.offset_sec * RATE as f64) as usize;
            let len = (chunk.duration_sec * RATE as f64) as usize;
            assert_eq!(&chunk.samples[..len], &source[start..start + len]);
        }
    }

    #[test]
    fn indexes_are_sequential() {
        let chunks = chunk_pcm(&ramp_pcm(26.0));
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
        }
    }
}
