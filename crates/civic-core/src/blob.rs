//! Attachment storage.
//!
//! The lifecycle engine only needs `upload(bytes, name) -> url`. The
//! filesystem store names each blob by the BLAKE3 hash of its content, so
//! re-uploading the same photo yields the same URL.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::CivicError;

/// Largest attachment accepted by [`FsBlobStore`] (10 MiB).
pub const MAX_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;

/// Stores attachment bytes and returns a retrievable URL.
pub trait BlobStore: Send + Sync {
    /// Persist `bytes` under a name derived from `name` and return its URL.
    ///
    /// # Errors
    ///
    /// Returns [`CivicError::AttachmentUpload`] when the bytes cannot be
    /// stored.
    fn upload(&self, bytes: &[u8], name: &str) -> Result<String, CivicError>;
}

impl<B: BlobStore + ?Sized> BlobStore for std::sync::Arc<B> {
    fn upload(&self, bytes: &[u8], name: &str) -> Result<String, CivicError> {
        (**self).upload(bytes, name)
    }
}

/// Content-addressed blobs in a local directory, exposed as `file://` URLs.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Blob file name: `<blake3 hex>[.<ext>]`, extension taken from `name`.
    #[must_use]
    pub fn blob_file_name(bytes: &[u8], name: &str) -> String {
        let digest = blake3::hash(bytes).to_hex();
        match extension(name) {
            Some(ext) => format!("{digest}.{ext}"),
            None => digest.to_string(),
        }
    }
}

fn extension(name: &str) -> Option<String> {
    let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    (!ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .then_some(ext)
}

/// A temp name unique to this write, so concurrent uploads never share one.
fn partial_path(path: &Path) -> PathBuf {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    let file_name = path
        .file_name()
        .map_or_else(|| "blob".into(), |name| name.to_string_lossy());
    path.with_file_name(format!(
        "{file_name}.{}.{}.partial",
        std::process::id(),
        NEXT.fetch_add(1, Ordering::Relaxed)
    ))
}

impl BlobStore for FsBlobStore {
    fn upload(&self, bytes: &[u8], name: &str) -> Result<String, CivicError> {
        let fail = |reason: String| CivicError::AttachmentUpload {
            name: name.to_string(),
            reason,
        };
        if bytes.is_empty() {
            return Err(fail("attachment is empty".to_string()));
        }
        if bytes.len() > MAX_ATTACHMENT_BYTES {
            return Err(fail(format!(
                "{} bytes exceeds the {MAX_ATTACHMENT_BYTES} byte limit",
                bytes.len()
            )));
        }

        fs::create_dir_all(&self.root)
            .map_err(|e| fail(format!("create {}: {e}", self.root.display())))?;
        let path = self.root.join(Self::blob_file_name(bytes, name));
        if !path.exists() {
            // Incomplete writes only ever exist under a `.partial` name.
            let tmp = partial_path(&path);
            fs::write(&tmp, bytes).map_err(|e| fail(format!("write {}: {e}", tmp.display())))?;
            fs::rename(&tmp, &path).map_err(|e| fail(format!("rename {}: {e}", path.display())))?;
        }

        let absolute = path
            .canonicalize()
            .map_err(|e| fail(format!("resolve {}: {e}", path.display())))?;
        tracing::debug!(path = %absolute.display(), bytes = bytes.len(), "stored attachment");
        Ok(format!("file://{}", absolute.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_is_content_addressed() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path().join("blobs"));

        let first = store.upload(b"jpeg bytes", "pothole.JPG").unwrap();
        let second = store.upload(b"jpeg bytes", "other-name.jpg").unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with("file://"));
        assert!(first.ends_with(".jpg"));

        let third = store.upload(b"different", "pothole.jpg").unwrap();
        assert_ne!(first, third);
    }

    #[test]
    fn stored_file_holds_the_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        store.upload(b"photo", "a.png").unwrap();
        let path = dir.path().join(FsBlobStore::blob_file_name(b"photo", "a.png"));
        assert_eq!(fs::read(path).unwrap(), b"photo");
    }

    #[test]
    fn partial_names_do_not_collide_across_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let jpg = dir.path().join(FsBlobStore::blob_file_name(b"same", "a.jpg"));
        let png = dir.path().join(FsBlobStore::blob_file_name(b"same", "a.png"));
        let jpg_tmp = partial_path(&jpg);
        let png_tmp = partial_path(&png);
        assert_ne!(jpg_tmp, png_tmp);
        assert_ne!(partial_path(&jpg), jpg_tmp);
        assert!(jpg_tmp.to_string_lossy().ends_with(".partial"));
    }

    #[test]
    fn concurrent_identical_uploads_all_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(FsBlobStore::new(dir.path().join("blobs")));
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let store = std::sync::Arc::clone(&store);
                std::thread::spawn(move || {
                    let name = if n % 2 == 0 { "leak.jpg" } else { "leak.png" };
                    store.upload(b"same photo", name).unwrap()
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let leftovers = fs::read_dir(dir.path().join("blobs"))
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".partial"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn odd_names_get_no_extension() {
        let name = FsBlobStore::blob_file_name(b"x", "no-extension");
        assert_eq!(name.len(), 64);
        let name = FsBlobStore::blob_file_name(b"x", "weird.j p g");
        assert_eq!(name.len(), 64);
    }

    #[test]
    fn empty_attachment_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = FsBlobStore::new(dir.path()).upload(b"", "a.jpg").unwrap_err();
        assert!(matches!(err, CivicError::AttachmentUpload { .. }));
    }

    #[test]
    fn unwritable_root_fails_upload() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"not a dir").unwrap();
        let err = FsBlobStore::new(blocker.join("blobs"))
            .upload(b"bytes", "a.jpg")
            .unwrap_err();
        assert!(matches!(err, CivicError::AttachmentUpload { .. }));
    }
}
