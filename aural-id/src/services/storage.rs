//! Canonical audio file storage
//!
//! Files land at `{root}/raw/{hash[:2]}/{hash}.{ext}` so no single
//! directory accumulates the whole library.

use std::path::{Path, PathBuf};

/// Storage path for a raw audio file.
pub fn raw_audio_path(root: &Path, file_hash: &str, extension: &str) -> PathBuf {
    let ext = extension.trim_start_matches('.');
    let prefix = &file_hash[..2.min(file_hash.len())];
    root.join("raw").join(prefix).join(format!("{}.{}", file_hash, ext))
}

/// Create the fan-out directory for a file hash, returning it.
pub fn ensure_storage_dirs(root: &Path, file_hash: &str) -> std::io::Result<PathBuf> {
    let prefix = &file_hash[..2.min(file_hash.len())];
    let raw_dir = root.join("raw").join(prefix);
    std::fs::create_dir_all(&raw_dir)?;
    Ok(raw_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_fans_out_by_hash_prefix() {
        let path = raw_audio_path(Path::new("/store"), "abcdef0123", "mp3");
        assert_eq!(path, PathBuf::from("/store/raw/ab/abcdef0123.mp3"));
    }

    #[test]
    fn leading_dot_in_extension_is_stripped() {
        let path = raw_audio_path(Path::new("/store"), "abcdef0123", ".wav");
        assert_eq!(path, PathBuf::from("/store/raw/ab/abcdef0123.wav"));
    }

    #[test]
    fn ensure_dirs_creates_prefix_dir() {
        let tmp = std::env::temp_dir().join(format!("aural-storage-test-{}", std::process::id()));
        let dir = ensure_storage_dirs(&tmp, "cafebabe").unwrap();
        assert!(dir.ends_with("raw/ca"));
        assert!(dir.is_dir());
        std::fs::remove_dir_all(&tmp).unwrap();
    }
}
