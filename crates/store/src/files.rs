use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::StoreError;

/// A file persisted by [`FileStore::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Server-side name: fresh uuid plus the original extension.
    pub stored_name: String,
    /// Full path on disk.
    pub path: PathBuf,
}

/// Flat on-disk directory of reassembled upload files.
///
/// Stored names are generated, never taken from the sender, which rules out
/// collisions and path traversal by construction. Lookups still validate the
/// requested name since it arrives over HTTP.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Creates the store, creating the directory if missing.
    pub async fn new(dir: PathBuf) -> Result<Self, StoreError> {
        fs::create_dir_all(&dir).await?;
        info!(path = %dir.display(), "file store initialized");
        Ok(Self { dir })
    }

    /// Returns the base directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `bytes` under a fresh unique name carrying the original
    /// extension, and returns the stored name and path.
    pub async fn save(&self, original_name: &str, bytes: &[u8]) -> Result<StoredFile, StoreError> {
        let id = Uuid::new_v4();
        let stored_name = match Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
        {
            Some(ext) => format!("{id}.{ext}"),
            None => id.to_string(),
        };

        let path = self.dir.join(&stored_name);
        fs::write(&path, bytes).await?;
        debug!(name = %stored_name, size = bytes.len(), "stored file");

        Ok(StoredFile { stored_name, path })
    }

    /// Resolves a stored name to its path, rejecting anything that is not a
    /// plain filename.
    pub fn resolve(&self, stored_name: &str) -> Result<PathBuf, StoreError> {
        if stored_name.is_empty() {
            return Err(StoreError::InvalidName("empty name".into()));
        }
        let mut components = Path::new(stored_name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => {
                return Err(StoreError::InvalidName(format!(
                    "not a plain filename: {stored_name}"
                )));
            }
        }
        Ok(self.dir.join(stored_name))
    }

    /// Reads a stored file; `None` if it does not exist.
    pub async fn read(&self, stored_name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.resolve(stored_name)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn store() -> (TempDir, FileStore) {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("files")).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn save_generates_unique_name_with_extension() {
        let (_dir, store) = store().await;

        let a = store.save("report.pdf", b"one").await.unwrap();
        let b = store.save("report.pdf", b"two").await.unwrap();

        assert!(a.stored_name.ends_with(".pdf"));
        assert!(b.stored_name.ends_with(".pdf"));
        assert_ne!(a.stored_name, b.stored_name);
        assert_eq!(fs::read(&a.path).await.unwrap(), b"one");
        assert_eq!(fs::read(&b.path).await.unwrap(), b"two");
    }

    #[tokio::test]
    async fn save_without_extension() {
        let (_dir, store) = store().await;
        let f = store.save("README", b"x").await.unwrap();
        assert!(!f.stored_name.contains('.'));
    }

    #[tokio::test]
    async fn read_roundtrip() {
        let (_dir, store) = store().await;
        let f = store.save("data.bin", b"payload").await.unwrap();
        let bytes = store.read(&f.stored_name).await.unwrap();
        assert_eq!(bytes.unwrap(), b"payload");
    }

    #[tokio::test]
    async fn read_missing_is_none() {
        let (_dir, store) = store().await;
        assert!(store.read("nope.bin").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn resolve_rejects_traversal() {
        let (_dir, store) = store().await;
        assert!(store.resolve("../../etc/passwd").is_err());
        assert!(store.resolve("/etc/passwd").is_err());
        assert!(store.resolve("sub/file.bin").is_err());
        assert!(store.resolve("").is_err());
        assert!(store.resolve("ok.bin").is_ok());
    }
}
