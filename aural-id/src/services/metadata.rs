//! Audio tag metadata extraction using lofty
//!
//! Extracts title/artist/album/genre plus technical properties. Tag
//! extraction is best-effort: an unreadable or untagged file produces an
//! empty `AudioTags`, never an error, and the pipeline fills nulls.

use lofty::file::{FileType, TaggedFileExt};
use lofty::prelude::*;
use lofty::probe::Probe;
use std::path::Path;

/// Extracted tag and technical metadata
#[derive(Debug, Clone, Default)]
pub struct AudioTags {
    /// Track title
    pub title: Option<String>,
    /// Artist name(s)
    pub artist: Option<String>,
    /// Album title
    pub album: Option<String>,
    /// Genre
    pub genre: Option<String>,
    /// Sample rate (Hz)
    pub sample_rate: Option<u32>,
    /// Number of channels
    pub channels: Option<u8>,
    /// Bitrate (kbps)
    pub bitrate: Option<u32>,
    /// Container/codec family, lowercase (mp3, flac, ...)
    pub format: Option<String>,
}

/// Extract tags and properties from an audio file.
pub fn extract_tags(file_path: &Path) -> AudioTags {
    let tagged_file = match Probe::open(file_path).and_then(|p| p.read()) {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!(file = %file_path.display(), error = %e, "Tag probe failed");
            return AudioTags::default();
        }
    };

    let properties = tagged_file.properties();

    let format = match tagged_file.file_type() {
        FileType::Mpeg => Some("mp3"),
        FileType::Flac => Some("flac"),
        FileType::Opus | FileType::Vorbis => Some("ogg"),
        FileType::Aac | FileType::Mp4 => Some("mp4"),
        FileType::Wav => Some("wav"),
        _ => None,
    }
    .map(str::to_string)
    .or_else(|| {
        file_path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    });

    let tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag());
    let (title, artist, album, genre) = if let Some(tag) = tag {
        (
            tag.title().map(|s| s.to_string()),
            tag.artist().map(|s| s.to_string()),
            tag.album().map(|s| s.to_string()),
            tag.genre().map(|s| s.to_string()),
        )
    } else {
        (None, None, None, None)
    };

    AudioTags {
        title,
        artist,
        album,
        genre,
        sample_rate: properties.sample_rate(),
        channels: properties.channels(),
        bitrate: properties.audio_bitrate(),
        format,
    }
}
