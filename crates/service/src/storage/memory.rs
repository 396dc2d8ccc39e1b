use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Entity, EntityStore, StoreError};
use crate::query::Filter;

/// In-process store; each call holds the lock for its whole read-check-write.
pub struct MemoryStore<E> {
    inner: RwLock<HashMap<Uuid, E>>,
}

impl<E> Default for MemoryStore<E> {
    fn default() -> Self { Self { inner: RwLock::new(HashMap::new()) } }
}

impl<E: Entity> MemoryStore<E> {
    pub fn new() -> Self { Self::default() }

    pub async fn len(&self) -> usize { self.inner.read().await.len() }

    pub async fn is_empty(&self) -> bool { self.inner.read().await.is_empty() }

    fn unique_clash(map: &HashMap<Uuid, E>, candidate: &E) -> Option<String> {
        let keys = candidate.unique_keys();
        map.values().filter(|other| other.id() != candidate.id()).find_map(|other| {
            other
                .unique_keys()
                .into_iter()
                .find(|k| keys.contains(k))
                .map(|(field, value)| format!("{} with {} '{}' already exists", E::NAME, field, value))
        })
    }
}

#[async_trait]
impl<E: Entity> EntityStore<E> for MemoryStore<E> {
    async fn get(&self, id: Uuid) -> Result<E, StoreError> {
        self.inner.read().await.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn list(&self, filter: &Filter) -> Result<Vec<E>, StoreError> {
        let map = self.inner.read().await;
        Ok(map.values().filter(|e| filter.matches(*e)).cloned().collect())
    }

    async fn insert(&self, entity: E) -> Result<E, StoreError> {
        let mut map = self.inner.write().await;
        if map.contains_key(&entity.id()) {
            return Err(StoreError::Conflict(format!("{} {} already exists", E::NAME, entity.id())));
        }
        if let Some(msg) = Self::unique_clash(&map, &entity) {
            return Err(StoreError::Conflict(msg));
        }
        map.insert(entity.id(), entity.clone());
        Ok(entity)
    }

    async fn update(&self, id: Uuid, patch: &E::Patch) -> Result<E, StoreError> {
        let mut map = self.inner.write().await;
        let mut next = map.get(&id).cloned().ok_or(StoreError::NotFound)?;
        next.apply(patch, Utc::now());
        if let Some(msg) = Self::unique_clash(&map, &next) {
            return Err(StoreError::Conflict(msg));
        }
        map.insert(id, next.clone());
        Ok(next)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.inner.write().await.remove(&id).map(|_| ()).ok_or(StoreError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::role::{Role, RolePatch};
    use std::sync::Arc;

    #[tokio::test]
    async fn insert_rejects_duplicate_id_and_unique_key() {
        let store = MemoryStore::<Role>::new();
        let admin = Role::new("admin");
        store.insert(admin.clone()).await.unwrap();
        assert!(matches!(store.insert(admin.clone()).await, Err(StoreError::Conflict(_))));
        assert!(matches!(store.insert(Role::new("admin")).await, Err(StoreError::Conflict(_))));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn update_is_partial_and_checks_uniqueness() {
        let store = MemoryStore::<Role>::new();
        let a = store.insert(Role::new("admin")).await.unwrap();
        store.insert(Role::new("user")).await.unwrap();
        let clash = store.update(a.id, &RolePatch { name: Some("user".into()) }).await;
        assert!(matches!(clash, Err(StoreError::Conflict(_))));
        let renamed = store.update(a.id, &RolePatch { name: Some("owner".into()) }).await.unwrap();
        assert_eq!(renamed.name, "owner");
        assert_eq!(renamed.created_at, a.created_at);
        assert_eq!(store.update(Uuid::new_v4(), &RolePatch::default()).await, Err(StoreError::NotFound));
    }

    #[tokio::test]
    async fn concurrent_deletes_have_one_winner() {
        let store = Arc::new(MemoryStore::<Role>::new());
        let r = store.insert(Role::new("temp")).await.unwrap();
        let (a, b) = tokio::join!(store.delete(r.id), store.delete(r.id));
        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
        assert!(a == Err(StoreError::NotFound) || b == Err(StoreError::NotFound));
    }
}
