//! Media storage for covers, images and attached files.
//!
//! Items never store file contents, only opaque `media://` references. The
//! [`MediaStorage`] trait resolves those references; the catalog and the
//! import pipeline treat them as plain strings.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::{KabinetError, Result};

/// Scheme prefix of every media reference.
pub const MEDIA_SCHEME: &str = "media://";

/// Abstract interface for media blob storage.
pub trait MediaStorage {
    /// Store a blob and return its `media://` reference. `ext` is a file
    /// extension hint without the dot.
    fn store(&self, bytes: &[u8], ext: Option<&str>) -> Result<String>;

    /// Load the blob behind a reference.
    fn load(&self, reference: &str) -> Result<Vec<u8>>;

    /// Remove the blob behind a reference. Removing a reference that no
    /// longer resolves is not an error.
    fn remove(&self, reference: &str) -> Result<()>;

    /// Copy a local file into media storage.
    fn import_path(&self, path: &Path) -> Result<String> {
        let bytes = fs::read(path).map_err(KabinetError::Io)?;
        let ext = path.extension().and_then(|e| e.to_str());
        self.store(&bytes, ext)
    }

    /// Available renditions of a blob: size tag → media reference. Backends
    /// without thumbnail generation expose the original only; an unknown
    /// reference yields an empty map.
    fn thumbnails(&self, reference: &str) -> BTreeMap<String, String>;
}

/// Strip the scheme and reject references that try to escape the media
/// directory.
fn reference_key(reference: &str) -> Result<&str> {
    let key = reference
        .strip_prefix(MEDIA_SCHEME)
        .ok_or_else(|| KabinetError::Media(format!("not a media reference: {reference}")))?;
    if key.is_empty() || key.contains('/') || key.contains('\\') || key.contains("..") {
        return Err(KabinetError::Media(format!(
            "malformed media reference: {reference}"
        )));
    }
    Ok(key)
}

/// Filesystem media storage: one file per blob under a flat directory, named
/// by a fresh uuid.
pub struct FsMedia {
    root: PathBuf,
}

impl FsMedia {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl MediaStorage for FsMedia {
    fn store(&self, bytes: &[u8], ext: Option<&str>) -> Result<String> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root).map_err(KabinetError::Io)?;
        }
        let key = match ext {
            Some(ext) if !ext.is_empty() => format!("{}.{ext}", Uuid::new_v4()),
            _ => Uuid::new_v4().to_string(),
        };
        fs::write(self.blob_path(&key), bytes).map_err(KabinetError::Io)?;
        Ok(format!("{MEDIA_SCHEME}{key}"))
    }

    fn load(&self, reference: &str) -> Result<Vec<u8>> {
        let key = reference_key(reference)?;
        let path = self.blob_path(key);
        if !path.exists() {
            return Err(KabinetError::Media(format!("no such blob: {reference}")));
        }
        fs::read(path).map_err(KabinetError::Io)
    }

    fn remove(&self, reference: &str) -> Result<()> {
        let key = reference_key(reference)?;
        let path = self.blob_path(key);
        if path.exists() {
            fs::remove_file(path).map_err(KabinetError::Io)?;
        }
        Ok(())
    }

    fn thumbnails(&self, reference: &str) -> BTreeMap<String, String> {
        // No generated renditions; the original is the only size.
        match reference_key(reference) {
            Ok(key) if self.blob_path(key).exists() => {
                let mut sizes = BTreeMap::new();
                sizes.insert("original".to_string(), reference.to_string());
                sizes
            }
            _ => BTreeMap::new(),
        }
    }
}

/// Media storage that stores nothing. Every `store` fails, so callers fall
/// back to keeping the original value.
pub struct NullMedia;

impl MediaStorage for NullMedia {
    fn store(&self, _bytes: &[u8], _ext: Option<&str>) -> Result<String> {
        Err(KabinetError::Media("media storage disabled".to_string()))
    }

    fn load(&self, reference: &str) -> Result<Vec<u8>> {
        Err(KabinetError::Media(format!("no such blob: {reference}")))
    }

    fn remove(&self, _reference: &str) -> Result<()> {
        Ok(())
    }

    fn thumbnails(&self, _reference: &str) -> BTreeMap<String, String> {
        BTreeMap::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let media = FsMedia::new(dir.path());

        let reference = media.store(b"jpeg bytes", Some("jpg")).unwrap();
        assert!(reference.starts_with(MEDIA_SCHEME));
        assert!(reference.ends_with(".jpg"));
        assert_eq!(media.load(&reference).unwrap(), b"jpeg bytes");
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let media = FsMedia::new(dir.path());

        let reference = media.store(b"x", None).unwrap();
        media.remove(&reference).unwrap();
        media.remove(&reference).unwrap();
        assert!(media.load(&reference).is_err());
    }

    #[test]
    fn malformed_references_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let media = FsMedia::new(dir.path());

        assert!(media.load("http://example.com/a.jpg").is_err());
        assert!(media.load("media://../escape").is_err());
        assert!(media.load("media://a/b").is_err());
        assert!(media.load("media://").is_err());
    }

    #[test]
    fn import_path_copies_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let media = FsMedia::new(dir.path().join("media"));

        let src = dir.path().join("cover.png");
        fs::write(&src, b"png").unwrap();
        let reference = media.import_path(&src).unwrap();
        assert!(reference.ends_with(".png"));
        assert_eq!(media.load(&reference).unwrap(), b"png");
    }

    #[test]
    fn null_media_never_stores() {
        assert!(NullMedia.store(b"x", None).is_err());
        assert!(NullMedia.remove("media://whatever").is_ok());
    }
}
