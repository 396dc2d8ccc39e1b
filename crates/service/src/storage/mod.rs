//! Entity persistence contract and its adapters.
//!
//! `EntityStore` is the only way the resource layer touches persisted
//! records. Every call is atomic for a single entity; the SeaORM user store
//! widens that to one transaction covering the user and its role links.

pub mod memory;
pub mod seaorm;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::attachments::AttachmentRef;
use crate::errors::ServiceError;
use crate::query::{FieldValue, Filter};

pub use memory::MemoryStore;

/// A persisted record the generic layer can store, filter and page.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Partial field update; `None` members leave the stored value alone.
    type Patch: Clone + Send + Sync + 'static;

    const NAME: &'static str;
    /// Request-facing filter keys.
    const FILTERABLE: &'static [&'static str];

    fn id(&self) -> Uuid;
    fn created_at(&self) -> DateTime<Utc>;
    /// Every attachment this record owns.
    fn attachments(&self) -> Vec<AttachmentRef>;
    fn field(&self, name: &str) -> Option<FieldValue<'_>>;

    /// Values that must be unique across the store, keyed by field name.
    fn unique_keys(&self) -> Vec<(&'static str, String)> { Vec::new() }

    fn apply(&mut self, patch: &Self::Patch, now: DateTime<Utc>);
}

#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Attach entity context when crossing into the service taxonomy.
    pub fn into_service(self, entity: &str, id: Uuid) -> ServiceError {
        match self {
            StoreError::NotFound => ServiceError::not_found(entity, id),
            StoreError::Conflict(msg) => ServiceError::Conflict(msg),
            StoreError::Backend(msg) => ServiceError::Infrastructure(msg),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ServiceError::NotFound("record not found".into()),
            StoreError::Conflict(msg) => ServiceError::Conflict(msg),
            StoreError::Backend(msg) => ServiceError::Infrastructure(msg),
        }
    }
}

#[async_trait]
pub trait EntityStore<E: Entity>: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<E, StoreError>;
    /// Unpaged; the query engine filters again, so adapters may push down
    /// only the predicates they can express.
    async fn list(&self, filter: &Filter) -> Result<Vec<E>, StoreError>;
    async fn insert(&self, entity: E) -> Result<E, StoreError>;
    async fn update(&self, id: Uuid, patch: &E::Patch) -> Result<E, StoreError>;
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
}
