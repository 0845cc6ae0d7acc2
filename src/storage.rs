use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};

use crate::utils::filename::validate_flat_filename;

pub type BlobReader = Pin<Box<dyn AsyncRead + Send>>;

/// Flat key/value storage for uploaded file bytes.
///
/// Missing objects are reported through return values (`None`, `false`)
/// rather than errors so callers can decide whether absence matters.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    async fn put_object(&self, key: &str, bytes: Bytes) -> Result<()>;

    async fn open_object(&self, key: &str) -> Result<Option<BlobReader>>;

    /// Returns `false` when `from` does not exist.
    async fn rename_object(&self, from: &str, to: &str) -> Result<bool>;

    /// Returns `false` when the object was already gone.
    async fn delete_object(&self, key: &str) -> Result<bool>;

    /// The path recorded on the file record for `key`.
    fn locate(&self, key: &str) -> String;
}

pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    /// Opens the uploads directory, creating it if it does not exist yet.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("failed to create uploads directory {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        match validate_flat_filename(key) {
            Ok(name) => Ok(self.root.join(name)),
            Err(err) => bail!("invalid blob key {key:?}: {}", err.message()),
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put_object(&self, key: &str, bytes: Bytes) -> Result<()> {
        let path = self.path_for(key)?;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .with_context(|| format!("failed to create blob {}", path.display()))?;
        file.write_all(&bytes)
            .await
            .context("failed to write blob bytes")?;
        file.flush().await.context("failed to flush blob")?;
        Ok(())
    }

    async fn open_object(&self, key: &str) -> Result<Option<BlobReader>> {
        let path = self.path_for(key)?;
        match fs::File::open(&path).await {
            Ok(file) => Ok(Some(Box::pin(file))),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed to open blob {}", path.display())),
        }
    }

    async fn rename_object(&self, from: &str, to: &str) -> Result<bool> {
        let source = self.path_for(from)?;
        let target = self.path_for(to)?;
        match fs::rename(&source, &target).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err).with_context(|| {
                format!(
                    "failed to rename blob {} to {}",
                    source.display(),
                    target.display()
                )
            }),
        }
    }

    async fn delete_object(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => {
                Err(err).with_context(|| format!("failed to delete blob {}", path.display()))
            }
        }
    }

    fn locate(&self, key: &str) -> String {
        self.root.join(key).to_string_lossy().into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn store() -> (tempfile::TempDir, LocalBlobStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalBlobStore::new(dir.path().join("uploads")).expect("store");
        (dir, store)
    }

    #[test]
    fn creates_missing_uploads_directory() {
        let (_dir, store) = store();
        assert!(store.root().is_dir());
    }

    #[tokio::test]
    async fn writes_and_reads_back_bytes() {
        let (_dir, store) = store();
        store
            .put_object("abc-report.pdf", Bytes::from_static(b"%PDF-1.7"))
            .await
            .unwrap();

        let mut reader = store.open_object("abc-report.pdf").await.unwrap().unwrap();
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"%PDF-1.7");
        assert!(store.locate("abc-report.pdf").ends_with("abc-report.pdf"));
    }

    #[tokio::test]
    async fn refuses_to_overwrite_existing_blob() {
        let (_dir, store) = store();
        store
            .put_object("same.png", Bytes::from_static(b"one"))
            .await
            .unwrap();
        assert!(store
            .put_object("same.png", Bytes::from_static(b"two"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (_dir, store) = store();
        store
            .put_object("gone.doc", Bytes::from_static(b"x"))
            .await
            .unwrap();
        assert!(store.delete_object("gone.doc").await.unwrap());
        assert!(!store.delete_object("gone.doc").await.unwrap());
        assert!(store.open_object("gone.doc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rename_reports_missing_source() {
        let (_dir, store) = store();
        assert!(!store.rename_object("nope.pdf", "new.pdf").await.unwrap());

        store
            .put_object("old.pdf", Bytes::from_static(b"x"))
            .await
            .unwrap();
        assert!(store.rename_object("old.pdf", "new.pdf").await.unwrap());
        assert!(store.open_object("old.pdf").await.unwrap().is_none());
        assert!(store.open_object("new.pdf").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn rejects_keys_with_directories() {
        let (_dir, store) = store();
        assert!(store
            .put_object("../escape.pdf", Bytes::from_static(b"x"))
            .await
            .is_err());
    }
}
