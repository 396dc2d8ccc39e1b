use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{conflict, optional_text, Car};
use crate::attachments::AttachmentRef;
use crate::errors::ServiceError;
use crate::form::{FieldErrors, FormFields};
use crate::query::{FieldValue, Filter};
use crate::resource::{AttachmentMode, AttachmentRules, Resource};
use crate::storage::{Entity, EntityStore};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manufacture {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub founder: Option<String>,
    pub director: Option<String>,
    pub website: Option<String>,
    pub image: Option<AttachmentRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct ManufacturePatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub founder: Option<Option<String>>,
    pub director: Option<Option<String>>,
    pub website: Option<Option<String>>,
    pub image: Option<Option<AttachmentRef>>,
}

impl Entity for Manufacture {
    type Patch = ManufacturePatch;
    const NAME: &'static str = "manufacture";
    const FILTERABLE: &'static [&'static str] = &["name"];

    fn id(&self) -> Uuid { self.id }
    fn created_at(&self) -> DateTime<Utc> { self.created_at }
    fn attachments(&self) -> Vec<AttachmentRef> { self.image.iter().cloned().collect() }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "name" => Some(FieldValue::Text(&self.name)),
            _ => None,
        }
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> { vec![("name", self.name.to_lowercase())] }

    fn apply(&mut self, p: &ManufacturePatch, now: DateTime<Utc>) {
        if let Some(v) = &p.name { self.name = v.clone(); }
        if let Some(v) = &p.description { self.description = v.clone(); }
        if let Some(v) = &p.founder { self.founder = v.clone(); }
        if let Some(v) = &p.director { self.director = v.clone(); }
        if let Some(v) = &p.website { self.website = v.clone(); }
        if let Some(v) = &p.image { self.image = v.clone(); }
        self.updated_at = now;
    }
}

pub struct ManufactureCreate {
    name: String,
    description: Option<String>,
    founder: Option<String>,
    director: Option<String>,
    website: Option<String>,
}

pub struct ManufactureUpdate {
    name: Option<String>,
    description: Option<Option<String>>,
    founder: Option<Option<String>>,
    director: Option<Option<String>>,
    website: Option<Option<String>>,
}

pub struct ManufactureResource {
    manufactures: Arc<dyn EntityStore<Manufacture>>,
    cars: Arc<dyn EntityStore<Car>>,
}

impl ManufactureResource {
    pub fn new(manufactures: Arc<dyn EntityStore<Manufacture>>, cars: Arc<dyn EntityStore<Car>>) -> Self {
        Self { manufactures, cars }
    }

    /// Case-insensitive exact lookup by name.
    pub async fn find_by_name(
        store: &dyn EntityStore<Manufacture>,
        name: &str,
    ) -> Result<Option<Manufacture>, ServiceError> {
        let candidates = store.list(&Filter::eq("name", name)).await?;
        Ok(candidates.into_iter().find(|m| m.name.eq_ignore_ascii_case(name)))
    }

    async fn ensure_name_free(&self, name: &str, except: Option<Uuid>) -> Result<(), ServiceError> {
        match Self::find_by_name(self.manufactures.as_ref(), name).await? {
            Some(m) if Some(m.id) != except => Err(conflict(Manufacture::NAME, "name", name)),
            _ => Ok(()),
        }
    }
}

fn check_website(errs: &mut FieldErrors, website: Option<&str>) {
    if let Some(w) = website {
        errs.check(w.starts_with("http://") || w.starts_with("https://"), "website", "must start with http:// or https://");
    }
}

fn check_name(errs: &mut FieldErrors, name: Option<&str>) {
    if let Some(n) = name {
        errs.check(n.chars().count() <= 100, "name", "must be at most 100 characters");
    }
}

#[async_trait]
impl Resource for ManufactureResource {
    type Entity = Manufacture;
    type Create = ManufactureCreate;
    type Update = ManufactureUpdate;
    type View = Manufacture;

    fn attachment_rules(&self) -> Option<AttachmentRules> {
        Some(AttachmentRules { field: "image", required_on_create: false, max: 1, mode: AttachmentMode::Replace })
    }

    fn parse_create(&self, form: &FormFields) -> Result<ManufactureCreate, ServiceError> {
        let mut errs = FieldErrors::new();
        let name = errs.required(form, "name");
        check_name(&mut errs, name.as_deref());
        let website = form.text("website").map(str::to_string);
        check_website(&mut errs, website.as_deref());
        errs.finish(|| ManufactureCreate {
            name: name.unwrap_or_default(),
            description: form.text("description").map(str::to_string),
            founder: form.text("founder").map(str::to_string),
            director: form.text("director").map(str::to_string),
            website,
        })
    }

    fn parse_update(&self, form: &FormFields) -> Result<ManufactureUpdate, ServiceError> {
        let mut errs = FieldErrors::new();
        let name = form.text("name").map(str::to_string);
        errs.check(!form.contains("name") || name.is_some(), "name", "must not be empty");
        check_name(&mut errs, name.as_deref());
        let website = optional_text(form, "website");
        check_website(&mut errs, website.clone().flatten().as_deref());
        errs.finish(|| ManufactureUpdate {
            name,
            description: optional_text(form, "description"),
            founder: optional_text(form, "founder"),
            director: optional_text(form, "director"),
            website,
        })
    }

    async fn validate_create(&self, input: &mut ManufactureCreate) -> Result<(), ServiceError> {
        self.ensure_name_free(&input.name, None).await
    }

    async fn validate_update(&self, current: &Manufacture, input: &mut ManufactureUpdate) -> Result<(), ServiceError> {
        match &input.name {
            Some(name) => self.ensure_name_free(name, Some(current.id)).await,
            None => Ok(()),
        }
    }

    fn build(&self, input: ManufactureCreate, attachments: Vec<AttachmentRef>) -> Result<Manufacture, ServiceError> {
        let now = Utc::now();
        Ok(Manufacture {
            id: Uuid::new_v4(),
            name: input.name,
            description: input.description,
            founder: input.founder,
            director: input.director,
            website: input.website,
            image: attachments.into_iter().next(),
            created_at: now,
            updated_at: now,
        })
    }

    fn patch(&self, input: ManufactureUpdate, attachments: Option<Vec<AttachmentRef>>) -> Result<ManufacturePatch, ServiceError> {
        Ok(ManufacturePatch {
            name: input.name,
            description: input.description,
            founder: input.founder,
            director: input.director,
            website: input.website,
            image: attachments.map(|v| v.into_iter().next()),
        })
    }

    async fn check_delete(&self, entity: &Manufacture) -> Result<(), ServiceError> {
        let cars = self.cars.list(&Filter::eq("manufactureId", entity.id.to_string())).await?;
        if cars.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::Conflict(format!(
                "manufacture '{}' is still referenced by {} car(s)",
                entity.name,
                cars.len()
            )))
        }
    }

    async fn present(&self, items: Vec<Manufacture>) -> Result<Vec<Manufacture>, ServiceError> { Ok(items) }
}
