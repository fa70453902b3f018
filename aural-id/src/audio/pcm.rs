//! Raw PCM buffer helpers
//!
//! All decoded audio in this service is little-endian mono: f32le for the
//! fingerprint and embedding paths, s16le only as chromaprint input.

/// Bytes per sample for f32le PCM
pub const BYTES_PER_F32: usize = 4;

/// Bytes per sample for s16le PCM
pub const BYTES_PER_S16: usize = 2;

/// Duration of a PCM buffer in seconds.
pub fn duration_seconds(byte_len: usize, sample_rate: u32, bytes_per_sample: usize) -> f64 {
    byte_len as f64 / (sample_rate as f64 * bytes_per_sample as f64)
}

/// Reinterpret f32le bytes as samples. A trailing partial sample is dropped.
pub fn bytes_to_f32(pcm: &[u8]) -> Vec<f32> {
    pcm.chunks_exact(BYTES_PER_F32)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Convert f32le PCM to s16le PCM.
///
/// Scales by 32767 and clamps to the s16 range, matching what the
/// chromaprint tool expects as `-signed` input.
pub fn f32le_to_s16le(pcm_f32le: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(pcm_f32le.len() / 2);
    for b in pcm_f32le.chunks_exact(BYTES_PER_F32) {
        let sample = f32::from_le_bytes([b[0], b[1], b[2], b[3]]);
        let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
        out.extend_from_slice(&scaled.to_le_bytes());
    }
    out
}

/// Extract a time window from f32le PCM, clamped to the buffer bounds.
///
/// Returns an empty slice when the clamped window collapses.
pub fn extract_window(pcm: &[u8], start_sec: f64, stop_sec: f64, sample_rate: u32) -> &[u8] {
    let start_byte = (start_sec * sample_rate as f64) as usize * BYTES_PER_F32;
    let stop_byte = (stop_sec * sample_rate as f64) as usize * BYTES_PER_F32;

    let start_byte = start_byte.min(pcm.len());
    let stop_byte = stop_byte.clamp(start_byte, pcm.len());

    &pcm[start_byte..stop_byte]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32le_bytes(samples: &[f32]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    fn s16le_to_f32le(pcm: &[u8]) -> Vec<f32> {
        pcm.chunks_exact(BYTES_PER_S16)
            .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32767.0)
            .collect()
    }

    #[test]
    fn duration_of_one_second_16k_f32() {
        assert_eq!(duration_seconds(16_000 * 4, 16_000, BYTES_PER_F32), 1.0);
    }

    #[test]
    fn duration_of_empty_buffer_is_zero() {
        assert_eq!(duration_seconds(0, 48_000, BYTES_PER_F32), 0.0);
    }

    #[test]
    fn s16_conversion_clamps_out_of_range_samples() {
        let bytes = f32le_bytes(&[2.0, -2.0]);
        let s16 = f32le_to_s16le(&bytes);
        assert_eq!(i16::from_le_bytes([s16[0], s16[1]]), 32767);
        assert_eq!(i16::from_le_bytes([s16[2], s16[3]]), -32768);
    }

    #[test]
    fn s16_round_trip_loses_at_most_one_lsb() {
        let samples = [0.0f32, 0.25, -0.25, 0.5, -0.99, 0.999, -1.0, 1.0 / 3.0];
        let round_tripped = s16le_to_f32le(&f32le_to_s16le(&f32le_bytes(&samples)));
        for (orig, rt) in samples.iter().zip(round_tripped.iter()) {
            assert!(
                (orig - rt).abs() <= 1.0 / 32767.0,
                "sample {} round-tripped to {}",
                orig,
                rt
            );
        }
    }

    #[test]
    fn extract_window_clamps_to_buffer() {
        // 2 seconds at a toy 4 Hz rate = 32 bytes
        let pcm = f32le_bytes(&[0.0; 8]);
        assert_eq!(extract_window(&pcm, 0.0, 1.0, 4).len(), 16);
        assert_eq!(extract_window(&pcm, 1.5, 10.0, 4).len(), 8);
        assert!(extract_window(&pcm, 5.0, 6.0, 4).is_empty());
        assert!(extract_window(&pcm, 1.0, 0.5, 4).is_empty());
    }
}
