//! PCM-level audio processing
//!
//! Decoding is delegated to an external ffmpeg process; everything in this
//! module operates on the raw PCM it produces.

pub mod chunker;
pub mod decode;
pub mod pcm;

pub use chunker::{chunk_pcm, PcmChunk};
pub use decode::{decode_and_validate, decode_dual_rate, decode_to_pcm, DecodeError, PcmFormat};
