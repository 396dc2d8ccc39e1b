use async_trait::async_trait;
use models::role;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, Set, Unchanged};
use uuid::Uuid;

use super::{map_db_err, utc};
use crate::query::Filter;
use crate::resources::role::RolePatch;
use crate::resources::Role;
use crate::storage::{EntityStore, StoreError};

pub struct SeaOrmRoleStore {
    db: DatabaseConnection,
}

impl SeaOrmRoleStore {
    pub fn new(db: DatabaseConnection) -> Self { Self { db } }
}

impl From<role::Model> for Role {
    fn from(m: role::Model) -> Self { Self { id: m.id, name: m.name, created_at: utc(m.created_at) } }
}

#[async_trait]
impl EntityStore<Role> for SeaOrmRoleStore {
    async fn get(&self, id: Uuid) -> Result<Role, StoreError> {
        role::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(map_db_err)?
            .map(Role::from)
            .ok_or(StoreError::NotFound)
    }

    async fn list(&self, _filter: &Filter) -> Result<Vec<Role>, StoreError> {
        let rows = role::Entity::find()
            .order_by_asc(role::Column::CreatedAt)
            .order_by_asc(role::Column::Id)
            .all(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(rows.into_iter().map(Role::from).collect())
    }

    async fn insert(&self, r: Role) -> Result<Role, StoreError> {
        let am = role::ActiveModel { id: Set(r.id), name: Set(r.name), created_at: Set(r.created_at.into()) };
        Ok(am.insert(&self.db).await.map_err(map_db_err)?.into())
    }

    async fn update(&self, id: Uuid, p: &RolePatch) -> Result<Role, StoreError> {
        let Some(name) = &p.name else { return self.get(id).await };
        let am = role::ActiveModel { id: Unchanged(id), name: Set(name.clone()), ..Default::default() };
        Ok(am.update(&self.db).await.map_err(map_db_err)?.into())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let res = role::Entity::delete_by_id(id).exec(&self.db).await.map_err(map_db_err)?;
        if res.rows_affected == 0 { Err(StoreError::NotFound) } else { Ok(()) }
    }
}
