use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{Manufacture, ManufactureResource};
use crate::attachments::AttachmentRef;
use crate::errors::ServiceError;
use crate::form::{FieldErrors, FormFields};
use crate::query::{FieldValue, Filter};
use crate::resource::{AttachmentMode, AttachmentRules, Resource};
use crate::storage::{Entity, EntityStore};

pub const FIRST_CAR_YEAR: i32 = 1886;
pub const MAX_IMAGES: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct Car {
    pub id: Uuid,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub price: f64,
    pub color: String,
    pub gearbox: String,
    pub manufacture_id: Option<Uuid>,
    pub images: Vec<AttachmentRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct CarPatch {
    pub brand: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub price: Option<f64>,
    pub color: Option<String>,
    pub gearbox: Option<String>,
    pub manufacture_id: Option<Option<Uuid>>,
    pub images: Option<Vec<AttachmentRef>>,
}

impl Entity for Car {
    type Patch = CarPatch;
    const NAME: &'static str = "car";
    const FILTERABLE: &'static [&'static str] = &["brand", "model", "color", "gearbox", "year", "manufacture"];

    fn id(&self) -> Uuid { self.id }
    fn created_at(&self) -> DateTime<Utc> { self.created_at }
    fn attachments(&self) -> Vec<AttachmentRef> { self.images.clone() }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "brand" => Some(FieldValue::Text(&self.brand)),
            "model" => Some(FieldValue::Text(&self.model)),
            "color" => Some(FieldValue::Text(&self.color)),
            "gearbox" => Some(FieldValue::Text(&self.gearbox)),
            "year" => Some(FieldValue::Exact(self.year.to_string())),
            "manufactureId" => self.manufacture_id.map(|id| FieldValue::Exact(id.to_string())),
            _ => None,
        }
    }

    fn apply(&mut self, p: &CarPatch, now: DateTime<Utc>) {
        if let Some(v) = &p.brand { self.brand = v.clone(); }
        if let Some(v) = &p.model { self.model = v.clone(); }
        if let Some(v) = p.year { self.year = v; }
        if let Some(v) = p.price { self.price = v; }
        if let Some(v) = &p.color { self.color = v.clone(); }
        if let Some(v) = &p.gearbox { self.gearbox = v.clone(); }
        if let Some(v) = p.manufacture_id { self.manufacture_id = v; }
        if let Some(v) = &p.images { self.images = v.clone(); }
        self.updated_at = now;
    }
}

/// Car as shown to clients: the manufacturer by name.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CarView {
    pub id: Uuid,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub price: f64,
    pub color: String,
    pub gearbox: String,
    pub manufacture: Option<String>,
    pub images: Vec<AttachmentRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct CarCreate {
    brand: String,
    model: String,
    year: i32,
    price: f64,
    color: String,
    gearbox: String,
    manufacture: Option<String>,
    manufacture_id: Option<Uuid>,
}

pub struct CarUpdate {
    brand: Option<String>,
    model: Option<String>,
    year: Option<i32>,
    price: Option<f64>,
    color: Option<String>,
    gearbox: Option<String>,
    /// `Some(None)` detaches the manufacturer.
    manufacture: Option<Option<String>>,
    manufacture_id: Option<Option<Uuid>>,
}

pub struct CarResource {
    manufactures: Arc<dyn EntityStore<Manufacture>>,
}

impl CarResource {
    pub fn new(manufactures: Arc<dyn EntityStore<Manufacture>>) -> Self { Self { manufactures } }

    async fn manufacture_id(&self, name: &str) -> Result<Uuid, ServiceError> {
        ManufactureResource::find_by_name(self.manufactures.as_ref(), name)
            .await?
            .map(|m| m.id)
            .ok_or_else(|| ServiceError::invalid("manufacture", format!("unknown manufacture '{}'", name)))
    }
}

fn check_year(errs: &mut FieldErrors, year: Option<i32>) {
    let latest = Utc::now().year() + 1;
    if let Some(y) = year {
        errs.check(
            (FIRST_CAR_YEAR..=latest).contains(&y),
            "year",
            &format!("must be between {} and {}", FIRST_CAR_YEAR, latest),
        );
    }
}

fn check_price(errs: &mut FieldErrors, price: Option<f64>) {
    if let Some(p) = price {
        errs.check(p.is_finite() && p >= 0.0, "price", "must be zero or more");
    }
}

#[async_trait]
impl Resource for CarResource {
    type Entity = Car;
    type Create = CarCreate;
    type Update = CarUpdate;
    type View = CarView;

    fn attachment_rules(&self) -> Option<AttachmentRules> {
        Some(AttachmentRules { field: "images", required_on_create: false, max: MAX_IMAGES, mode: AttachmentMode::Append })
    }

    fn parse_create(&self, form: &FormFields) -> Result<CarCreate, ServiceError> {
        let mut errs = FieldErrors::new();
        let brand = errs.required(form, "brand");
        let model = errs.required(form, "model");
        let year = errs.parse_required::<i32>(form, "year", "a whole number");
        let price = errs.parse_required::<f64>(form, "price", "a number");
        check_year(&mut errs, year);
        check_price(&mut errs, price);
        errs.finish(|| CarCreate {
            brand: brand.unwrap_or_default(),
            model: model.unwrap_or_default(),
            year: year.unwrap_or_default(),
            price: price.unwrap_or_default(),
            color: form.text("color").unwrap_or_default().to_string(),
            gearbox: form.text("gearbox").unwrap_or_default().to_string(),
            manufacture: form.text("manufacture").map(str::to_string),
            manufacture_id: None,
        })
    }

    fn parse_update(&self, form: &FormFields) -> Result<CarUpdate, ServiceError> {
        let mut errs = FieldErrors::new();
        for required in ["brand", "model", "year", "price"] {
            errs.check(!form.contains(required) || form.text(required).is_some(), required, "must not be empty");
        }
        let year = errs.parse::<i32>(form, "year", "a whole number");
        let price = errs.parse::<f64>(form, "price", "a number");
        check_year(&mut errs, year);
        check_price(&mut errs, price);
        errs.finish(|| CarUpdate {
            brand: form.text("brand").map(str::to_string),
            model: form.text("model").map(str::to_string),
            year,
            price,
            color: form.contains("color").then(|| form.text("color").unwrap_or_default().to_string()),
            gearbox: form.contains("gearbox").then(|| form.text("gearbox").unwrap_or_default().to_string()),
            manufacture: super::optional_text(form, "manufacture"),
            manufacture_id: None,
        })
    }

    async fn validate_create(&self, input: &mut CarCreate) -> Result<(), ServiceError> {
        if let Some(name) = &input.manufacture {
            input.manufacture_id = Some(self.manufacture_id(name).await?);
        }
        Ok(())
    }

    async fn validate_update(&self, _current: &Car, input: &mut CarUpdate) -> Result<(), ServiceError> {
        input.manufacture_id = match &input.manufacture {
            Some(Some(name)) => Some(Some(self.manufacture_id(name).await?)),
            Some(None) => Some(None),
            None => None,
        };
        Ok(())
    }

    fn build(&self, input: CarCreate, attachments: Vec<AttachmentRef>) -> Result<Car, ServiceError> {
        let now = Utc::now();
        Ok(Car {
            id: Uuid::new_v4(),
            brand: input.brand,
            model: input.model,
            year: input.year,
            price: input.price,
            color: input.color,
            gearbox: input.gearbox,
            manufacture_id: input.manufacture_id,
            images: attachments,
            created_at: now,
            updated_at: now,
        })
    }

    fn patch(&self, input: CarUpdate, attachments: Option<Vec<AttachmentRef>>) -> Result<CarPatch, ServiceError> {
        Ok(CarPatch {
            brand: input.brand,
            model: input.model,
            year: input.year,
            price: input.price,
            color: input.color,
            gearbox: input.gearbox,
            manufacture_id: input.manufacture_id,
            images: attachments,
        })
    }

    async fn resolve_filter(&self, mut filter: Filter) -> Result<Option<Filter>, ServiceError> {
        if let Some(name) = filter.remove("manufacture") {
            match ManufactureResource::find_by_name(self.manufactures.as_ref(), &name).await? {
                Some(m) => filter.insert("manufactureId", m.id.to_string()),
                None => return Ok(None),
            }
        }
        Ok(Some(filter))
    }

    async fn present(&self, items: Vec<Car>) -> Result<Vec<CarView>, ServiceError> {
        let names: HashMap<Uuid, String> = if items.iter().any(|c| c.manufacture_id.is_some()) {
            self.manufactures.list(&Filter::new()).await?.into_iter().map(|m| (m.id, m.name)).collect()
        } else {
            HashMap::new()
        };
        Ok(items
            .into_iter()
            .map(|c| CarView {
                manufacture: c.manufacture_id.and_then(|id| names.get(&id).cloned()),
                id: c.id,
                brand: c.brand,
                model: c.model,
                year: c.year,
                price: c.price,
                color: c.color,
                gearbox: c.gearbox,
                images: c.images,
                created_at: c.created_at,
                updated_at: c.updated_at,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachments::AttachmentStore;
    use crate::context::OpContext;
    use crate::errors::ErrorKind;
    use crate::test_support::{car_form, Fixture};

    #[tokio::test]
    async fn year_and_price_bounds() {
        let fx = Fixture::new().await;
        let ctx = OpContext::new();
        let too_old = FormFields::new().with("brand", "Benz").with("model", "Motorwagen").with("year", "1885").with("price", "1");
        assert!(fx.services.cars.create(&ctx, &too_old, vec![]).await.is_kind(ErrorKind::ValidationFailed));
        let negative = car_form("Polo", 2020);
        let car = fx.services.cars.create(&ctx, &negative, vec![]).await.payload.unwrap();
        let res = fx.services.cars.update(&ctx, car.id, &FormFields::new().with("price", "-5"), vec![]).await;
        assert!(res.is_kind(ErrorKind::ValidationFailed));
        let res = fx.services.cars.update(&ctx, car.id, &FormFields::new().with("price", "NaN"), vec![]).await;
        assert!(res.is_kind(ErrorKind::ValidationFailed));
        fx.cleanup().await;
    }

    #[tokio::test]
    async fn manufacture_can_be_changed_and_detached() {
        let fx = Fixture::new().await;
        let ctx = OpContext::new();
        fx.manufacture("Opel").await;
        fx.manufacture("Fiat").await;
        let car = fx.services.cars.create(&ctx, &car_form("Corsa", 2016).with("manufacture", "opel"), vec![]).await.payload.unwrap();
        assert_eq!(car.manufacture.as_deref(), Some("Opel"));
        let moved = fx.services.cars.update(&ctx, car.id, &FormFields::new().with("manufacture", "FIAT"), vec![]).await.payload.unwrap();
        assert_eq!(moved.manufacture.as_deref(), Some("Fiat"));
        let detached = fx.services.cars.update(&ctx, car.id, &FormFields::new().with("manufacture", ""), vec![]).await.payload.unwrap();
        assert_eq!(detached.manufacture, None);
        fx.cleanup().await;
    }

    #[tokio::test]
    async fn uploads_outside_the_images_field_are_ignored() -> anyhow::Result<()> {
        let fx = Fixture::new().await;
        let ctx = OpContext::new();
        let stray = crate::test_support::png("avatar", "a.png", b"a");
        let car = fx.services.cars.create(&ctx, &car_form("Up", 2014), vec![stray]).await.payload.unwrap();
        assert!(car.images.is_empty());
        assert!(fx.attachments.list().await?.is_empty());
        fx.cleanup().await;
        Ok(())
    }
}
