use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "car")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub brand: String,
    pub model: String,
    pub year: i32,
    #[sea_orm(column_type = "Double")]
    pub price: f64,
    pub color: String,
    pub gearbox: String,
    pub manufacture_id: Option<Uuid>,
    /// Ordered image file names, stored as a JSON array.
    pub images: Json,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::manufacture::Entity",
        from = "Column::ManufactureId",
        to = "super::manufacture::Column::Id"
    )]
    Manufacture,
}

impl Related<super::manufacture::Entity> for Entity {
    fn to() -> RelationDef { Relation::Manufacture.def() }
}

impl ActiveModelBehavior for ActiveModel {}

/// Encode image names for the `images` column.
pub fn images_to_json(images: &[String]) -> Json {
    Json::Array(images.iter().cloned().map(Json::String).collect())
}

/// Decode the `images` column; anything but an array of strings is rejected.
pub fn images_from_json(value: &Json) -> Result<Vec<String>, ModelError> {
    let arr = value
        .as_array()
        .ok_or_else(|| ModelError::Decode("car.images is not an array".into()))?;
    arr.iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| ModelError::Decode("car.images contains a non-string".into()))
        })
        .collect()
}
