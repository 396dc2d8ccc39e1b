//! Attachment manager: uploaded binaries stored under a content directory
//! and referenced by file name.

pub mod local;

use std::fmt;
use std::time::SystemTime;

use async_trait::async_trait;
use configs::StorageConfig;
use serde::{Deserialize, Serialize};

use crate::errors::{FieldError, ServiceError};

pub use local::LocalAttachmentStore;

/// Relative reference to a stored file, e.g. `3f1c...e9.png`.
///
/// Always a single path segment, so resolving it can never escape the
/// content directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttachmentRef(String);

impl AttachmentRef {
    pub fn parse(raw: &str) -> Option<Self> {
        let ok = !raw.is_empty()
            && !raw.starts_with('.')
            && !raw.contains(&['/', '\\', '\0'][..])
            && raw != "..";
        ok.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str { &self.0 }

    pub fn into_string(self) -> String { self.0 }
}

impl fmt::Display for AttachmentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// One uploaded file as received from the transport.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Form field the file arrived under.
    pub field: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(field: &str, file_name: &str, bytes: impl Into<Vec<u8>>) -> Self {
        Self { field: field.into(), file_name: file_name.into(), content_type: None, bytes: bytes.into() }
    }

    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }
}

#[derive(Debug, Clone)]
pub struct StoredAttachment {
    pub reference: AttachmentRef,
    pub modified: SystemTime,
}

/// Accepted size and extensions for uploads.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub max_bytes: usize,
    pub allowed_extensions: Vec<String>,
}

impl UploadPolicy {
    pub fn from_config(cfg: &StorageConfig) -> Self {
        Self { max_bytes: cfg.max_upload_bytes, allowed_extensions: cfg.allowed_extensions.clone() }
    }

    pub fn check(&self, upload: &Upload) -> Result<(), FieldError> {
        if upload.bytes.is_empty() {
            return Err(FieldError::new(&upload.field, format!("file '{}' is empty", upload.file_name)));
        }
        if upload.bytes.len() > self.max_bytes {
            return Err(FieldError::new(
                &upload.field,
                format!("file '{}' exceeds {} bytes", upload.file_name, self.max_bytes),
            ));
        }
        match upload.extension() {
            Some(ext) if self.allowed_extensions.iter().any(|a| *a == ext) => Ok(()),
            _ => Err(FieldError::new(
                &upload.field,
                format!("file '{}' must be one of: {}", upload.file_name, self.allowed_extensions.join(", ")),
            )),
        }
    }
}

impl Default for UploadPolicy {
    fn default() -> Self { Self::from_config(&StorageConfig::default()) }
}

/// What an update does to the entity's attachment list.
#[derive(Debug, Clone, PartialEq)]
pub enum AttachmentChange {
    Keep,
    Replace(Vec<AttachmentRef>),
    Append(Vec<AttachmentRef>),
}

impl AttachmentChange {
    /// Resulting list given the current one.
    pub fn resolve(&self, current: &[AttachmentRef]) -> Option<Vec<AttachmentRef>> {
        match self {
            AttachmentChange::Keep => None,
            AttachmentChange::Replace(new) => Some(new.clone()),
            AttachmentChange::Append(new) => Some(current.iter().chain(new.iter()).cloned().collect()),
        }
    }
}

#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Persist `bytes` under a fresh name derived from `suggested_name`.
    /// Fails with `WriteFailure`; never leaves a partial file visible.
    async fn store(&self, bytes: &[u8], suggested_name: &str) -> Result<AttachmentRef, ServiceError>;
    /// Returns whether a file was removed; a missing file is `Ok(false)`.
    async fn delete(&self, reference: &AttachmentRef) -> Result<bool, ServiceError>;
    async fn read(&self, reference: &AttachmentRef) -> Result<Option<Vec<u8>>, ServiceError>;
    async fn list(&self) -> Result<Vec<StoredAttachment>, ServiceError>;
}
