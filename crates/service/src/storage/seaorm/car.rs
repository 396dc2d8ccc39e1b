use async_trait::async_trait;
use chrono::Utc;
use models::car::{self, images_from_json, images_to_json};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set, Unchanged};
use uuid::Uuid;

use super::{map_db_err, utc};
use crate::attachments::AttachmentRef;
use crate::query::Filter;
use crate::resources::car::CarPatch;
use crate::resources::Car;
use crate::storage::{EntityStore, StoreError};

pub struct SeaOrmCarStore {
    db: DatabaseConnection,
}

impl SeaOrmCarStore {
    pub fn new(db: DatabaseConnection) -> Self { Self { db } }
}

fn to_json(images: &[AttachmentRef]) -> sea_orm::prelude::Json {
    let names: Vec<String> = images.iter().map(|r| r.as_str().to_string()).collect();
    images_to_json(&names)
}

fn from_model(m: car::Model) -> Result<Car, StoreError> {
    let images = images_from_json(&m.images)
        .map_err(|e| StoreError::Backend(e.to_string()))?
        .iter()
        .filter_map(|s| AttachmentRef::parse(s))
        .collect();
    Ok(Car {
        id: m.id,
        brand: m.brand,
        model: m.model,
        year: m.year,
        price: m.price,
        color: m.color,
        gearbox: m.gearbox,
        manufacture_id: m.manufacture_id,
        images,
        created_at: utc(m.created_at),
        updated_at: utc(m.updated_at),
    })
}

#[async_trait]
impl EntityStore<Car> for SeaOrmCarStore {
    async fn get(&self, id: Uuid) -> Result<Car, StoreError> {
        let m = car::Entity::find_by_id(id).one(&self.db).await.map_err(map_db_err)?.ok_or(StoreError::NotFound)?;
        from_model(m)
    }

    async fn list(&self, filter: &Filter) -> Result<Vec<Car>, StoreError> {
        let mut q = car::Entity::find();
        if let Some(id) = filter.get("manufactureId").and_then(|v| Uuid::parse_str(v).ok()) {
            q = q.filter(car::Column::ManufactureId.eq(id));
        }
        if let Some(year) = filter.get("year").and_then(|v| v.parse::<i32>().ok()) {
            q = q.filter(car::Column::Year.eq(year));
        }
        let rows = q
            .order_by_asc(car::Column::CreatedAt)
            .order_by_asc(car::Column::Id)
            .all(&self.db)
            .await
            .map_err(map_db_err)?;
        rows.into_iter().map(from_model).collect()
    }

    async fn insert(&self, c: Car) -> Result<Car, StoreError> {
        let am = car::ActiveModel {
            id: Set(c.id),
            brand: Set(c.brand),
            model: Set(c.model),
            year: Set(c.year),
            price: Set(c.price),
            color: Set(c.color),
            gearbox: Set(c.gearbox),
            manufacture_id: Set(c.manufacture_id),
            images: Set(to_json(&c.images)),
            created_at: Set(c.created_at.into()),
            updated_at: Set(c.updated_at.into()),
        };
        from_model(am.insert(&self.db).await.map_err(map_db_err)?)
    }

    async fn update(&self, id: Uuid, p: &CarPatch) -> Result<Car, StoreError> {
        let mut am = car::ActiveModel { id: Unchanged(id), ..Default::default() };
        if let Some(v) = &p.brand { am.brand = Set(v.clone()); }
        if let Some(v) = &p.model { am.model = Set(v.clone()); }
        if let Some(v) = p.year { am.year = Set(v); }
        if let Some(v) = p.price { am.price = Set(v); }
        if let Some(v) = &p.color { am.color = Set(v.clone()); }
        if let Some(v) = &p.gearbox { am.gearbox = Set(v.clone()); }
        if let Some(v) = p.manufacture_id { am.manufacture_id = Set(v); }
        if let Some(v) = &p.images { am.images = Set(to_json(v)); }
        am.updated_at = Set(Utc::now().into());
        from_model(am.update(&self.db).await.map_err(map_db_err)?)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let res = car::Entity::delete_by_id(id).exec(&self.db).await.map_err(map_db_err)?;
        if res.rows_affected == 0 { Err(StoreError::NotFound) } else { Ok(()) }
    }
}
