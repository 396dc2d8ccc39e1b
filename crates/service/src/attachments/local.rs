use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, instrument};
use uuid::Uuid;

use super::{AttachmentRef, AttachmentStore, StoredAttachment};
use crate::errors::ServiceError;

/// Files live flat under `root`; in-progress writes use hidden `.<uuid>.tmp`
/// names and are renamed into place once fully synced.
#[derive(Debug, Clone)]
pub struct LocalAttachmentStore {
    root: PathBuf,
}

impl LocalAttachmentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    pub fn root(&self) -> &Path { &self.root }

    fn path_of(&self, reference: &AttachmentRef) -> PathBuf { self.root.join(reference.as_str()) }

    fn extension_of(suggested_name: &str) -> String {
        Path::new(suggested_name)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_else(|| "bin".to_string())
    }

    async fn write_then_rename(&self, tmp: &Path, target: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = fs::OpenOptions::new().write(true).create_new(true).open(tmp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(tmp, target).await
    }
}

#[async_trait]
impl AttachmentStore for LocalAttachmentStore {
    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    async fn store(&self, bytes: &[u8], suggested_name: &str) -> Result<AttachmentRef, ServiceError> {
        let name = format!("{}.{}", Uuid::new_v4().simple(), Self::extension_of(suggested_name));
        let reference = AttachmentRef::parse(&name)
            .ok_or_else(|| ServiceError::WriteFailure("could not name attachment".into()))?;
        let tmp = self.root.join(format!(".{}.tmp", Uuid::new_v4().simple()));
        let target = self.path_of(&reference);

        if let Err(e) = self.write_then_rename(&tmp, &target, bytes).await {
            let _ = fs::remove_file(&tmp).await;
            error!(path = %target.display(), error = %e, "attachment write failed");
            return Err(ServiceError::WriteFailure(format!("failed to store file '{}'", suggested_name)));
        }
        debug!(reference = %reference, "attachment stored");
        Ok(reference)
    }

    async fn delete(&self, reference: &AttachmentRef) -> Result<bool, ServiceError> {
        match fs::remove_file(self.path_of(reference)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(false),
            Err(e) => Err(ServiceError::WriteFailure(format!("failed to delete {}: {}", reference, e))),
        }
    }

    async fn read(&self, reference: &AttachmentRef) -> Result<Option<Vec<u8>>, ServiceError> {
        match fs::read(self.path_of(reference)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(None),
            Err(e) => Err(ServiceError::Infrastructure(format!("failed to read {}: {}", reference, e))),
        }
    }

    async fn list(&self) -> Result<Vec<StoredAttachment>, ServiceError> {
        let io = |e: std::io::Error| ServiceError::Infrastructure(format!("cannot scan {}: {}", self.root.display(), e));
        let mut out = Vec::new();
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(d) => d,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(io(e)),
        };
        while let Some(entry) = dir.next_entry().await.map_err(io)? {
            let meta = entry.metadata().await.map_err(io)?;
            if !meta.is_file() {
                continue;
            }
            // skips temp files too, they start with '.'
            let Some(reference) = entry.file_name().to_str().and_then(AttachmentRef::parse) else { continue };
            let modified = meta.modified().map_err(io)?;
            out.push(StoredAttachment { reference, modified });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::temp_dir;

    #[tokio::test]
    async fn store_read_delete_roundtrip() -> anyhow::Result<()> {
        let dir = temp_dir("attach_roundtrip").await;
        let store = LocalAttachmentStore::new(&dir);
        let r = store.store(b"png-bytes", "Photo.PNG").await?;
        assert!(r.as_str().ends_with(".png"));
        assert_eq!(store.read(&r).await?.as_deref(), Some(&b"png-bytes"[..]));
        assert_eq!(store.list().await?.len(), 1);
        assert!(store.delete(&r).await?);
        assert!(!store.delete(&r).await?, "second delete is a no-op");
        assert_eq!(store.read(&r).await?, None);
        let _ = fs::remove_dir_all(&dir).await;
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_uploads_with_same_name_do_not_collide() -> anyhow::Result<()> {
        let dir = temp_dir("attach_collide").await;
        let store = LocalAttachmentStore::new(&dir);
        let (a, b) = tokio::join!(store.store(b"one", "car.jpg"), store.store(b"two", "car.jpg"));
        let (a, b) = (a?, b?);
        assert_ne!(a, b);
        assert_eq!(store.read(&a).await?.as_deref(), Some(&b"one"[..]));
        assert_eq!(store.read(&b).await?.as_deref(), Some(&b"two"[..]));
        let _ = fs::remove_dir_all(&dir).await;
        Ok(())
    }

    #[tokio::test]
    async fn failed_write_leaves_nothing_behind() {
        let dir = std::env::temp_dir().join(format!("attach_missing_{}", Uuid::new_v4()));
        let store = LocalAttachmentStore::new(dir.join("does-not-exist"));
        let err = store.store(b"x", "a.png").await.unwrap_err();
        assert!(matches!(err, ServiceError::WriteFailure(_)));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn odd_extensions_fall_back_to_bin() {
        assert_eq!(LocalAttachmentStore::extension_of("noext"), "bin");
        assert_eq!(LocalAttachmentStore::extension_of("x.p/ng"), "bin");
        assert_eq!(LocalAttachmentStore::extension_of("x.JPeG"), "jpeg");
    }
}
