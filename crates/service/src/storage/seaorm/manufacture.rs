use async_trait::async_trait;
use chrono::Utc;
use models::manufacture;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, Set, Unchanged};
use uuid::Uuid;

use super::{attachment, map_db_err, utc};
use crate::query::Filter;
use crate::resources::manufacture::ManufacturePatch;
use crate::resources::Manufacture;
use crate::storage::{EntityStore, StoreError};

pub struct SeaOrmManufactureStore {
    db: DatabaseConnection,
}

impl SeaOrmManufactureStore {
    pub fn new(db: DatabaseConnection) -> Self { Self { db } }
}

impl From<manufacture::Model> for Manufacture {
    fn from(m: manufacture::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            description: m.description,
            founder: m.founder,
            director: m.director,
            website: m.website,
            image: attachment(m.image),
            created_at: utc(m.created_at),
            updated_at: utc(m.updated_at),
        }
    }
}

#[async_trait]
impl EntityStore<Manufacture> for SeaOrmManufactureStore {
    async fn get(&self, id: Uuid) -> Result<Manufacture, StoreError> {
        manufacture::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(map_db_err)?
            .map(Manufacture::from)
            .ok_or(StoreError::NotFound)
    }

    async fn list(&self, _filter: &Filter) -> Result<Vec<Manufacture>, StoreError> {
        let rows = manufacture::Entity::find()
            .order_by_asc(manufacture::Column::CreatedAt)
            .order_by_asc(manufacture::Column::Id)
            .all(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(rows.into_iter().map(Manufacture::from).collect())
    }

    async fn insert(&self, m: Manufacture) -> Result<Manufacture, StoreError> {
        let am = manufacture::ActiveModel {
            id: Set(m.id),
            name: Set(m.name),
            description: Set(m.description),
            founder: Set(m.founder),
            director: Set(m.director),
            website: Set(m.website),
            image: Set(m.image.map(|r| r.into_string())),
            created_at: Set(m.created_at.into()),
            updated_at: Set(m.updated_at.into()),
        };
        Ok(am.insert(&self.db).await.map_err(map_db_err)?.into())
    }

    async fn update(&self, id: Uuid, p: &ManufacturePatch) -> Result<Manufacture, StoreError> {
        let mut am = manufacture::ActiveModel { id: Unchanged(id), ..Default::default() };
        if let Some(v) = &p.name { am.name = Set(v.clone()); }
        if let Some(v) = &p.description { am.description = Set(v.clone()); }
        if let Some(v) = &p.founder { am.founder = Set(v.clone()); }
        if let Some(v) = &p.director { am.director = Set(v.clone()); }
        if let Some(v) = &p.website { am.website = Set(v.clone()); }
        if let Some(v) = &p.image { am.image = Set(v.as_ref().map(|r| r.as_str().to_string())); }
        am.updated_at = Set(Utc::now().into());
        Ok(am.update(&self.db).await.map_err(map_db_err)?.into())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let res = manufacture::Entity::delete_by_id(id).exec(&self.db).await.map_err(map_db_err)?;
        if res.rows_affected == 0 { Err(StoreError::NotFound) } else { Ok(()) }
    }
}
