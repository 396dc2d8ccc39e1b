//! Generic CRUD orchestration over an entity store and the attachment store.
//!
//! A [`Resource`] supplies the entity-specific parts (parsing, validation,
//! relationship checks, presentation); [`ResourceService`] owns ordering,
//! compensation and error mapping, identical for every entity.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use configs::PaginationConfig;
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::attachments::{AttachmentChange, AttachmentRef, AttachmentStore, Upload, UploadPolicy};
use crate::context::OpContext;
use crate::envelope::Envelope;
use crate::errors::{with_field_errors, FieldError, ServiceError};
use crate::form::FormFields;
use crate::pagination::{ListQuery, ListResult};
use crate::query::{Filter, QueryEngine};
use crate::storage::{Entity, EntityStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentMode {
    /// New uploads replace the whole list.
    Replace,
    /// New uploads are added after the existing ones.
    Append,
}

#[derive(Debug, Clone, Copy)]
pub struct AttachmentRules {
    /// Form field uploads arrive under.
    pub field: &'static str,
    pub required_on_create: bool,
    pub max: usize,
    pub mode: AttachmentMode,
}

#[async_trait]
pub trait Resource: Send + Sync + 'static {
    type Entity: Entity;
    type Create: Send;
    type Update: Send;
    type View: Serialize + Send;

    fn attachment_rules(&self) -> Option<AttachmentRules> { None }

    fn parse_create(&self, form: &FormFields) -> Result<Self::Create, ServiceError>;
    fn parse_update(&self, form: &FormFields) -> Result<Self::Update, ServiceError>;

    /// Referential and uniqueness checks; may fill resolved ids into `input`.
    async fn validate_create(&self, _input: &mut Self::Create) -> Result<(), ServiceError> { Ok(()) }

    async fn validate_update(&self, _current: &Self::Entity, _input: &mut Self::Update) -> Result<(), ServiceError> {
        Ok(())
    }

    fn build(&self, input: Self::Create, attachments: Vec<AttachmentRef>) -> Result<Self::Entity, ServiceError>;

    /// `attachments` is the complete new list when it changes.
    fn patch(
        &self,
        input: Self::Update,
        attachments: Option<Vec<AttachmentRef>>,
    ) -> Result<<Self::Entity as Entity>::Patch, ServiceError>;

    /// Restrict policy; fail with `Conflict` while others reference `entity`.
    async fn check_delete(&self, _entity: &Self::Entity) -> Result<(), ServiceError> { Ok(()) }

    /// Rewrite request-facing filters into stored fields. `None` means
    /// nothing can match (e.g. an unknown related name).
    async fn resolve_filter(&self, filter: Filter) -> Result<Option<Filter>, ServiceError> { Ok(Some(filter)) }

    /// Views for a batch; related data is loaded once per batch.
    async fn present(&self, items: Vec<Self::Entity>) -> Result<Vec<Self::View>, ServiceError>;
}

/// Something whose records own attachments; used by the orphan sweep.
#[async_trait]
pub trait AttachmentOwner: Send + Sync {
    fn owner_name(&self) -> &'static str;
    async fn referenced_attachments(&self) -> Result<Vec<AttachmentRef>, ServiceError>;
}

pub struct ResourceService<R: Resource> {
    resource: Arc<R>,
    store: Arc<dyn EntityStore<R::Entity>>,
    attachments: Arc<dyn AttachmentStore>,
    policy: UploadPolicy,
    engine: QueryEngine,
}

impl<R: Resource> Clone for ResourceService<R> {
    fn clone(&self) -> Self {
        Self {
            resource: self.resource.clone(),
            store: self.store.clone(),
            attachments: self.attachments.clone(),
            policy: self.policy.clone(),
            engine: self.engine,
        }
    }
}

impl<R: Resource> ResourceService<R> {
    pub fn new(
        resource: R,
        store: Arc<dyn EntityStore<R::Entity>>,
        attachments: Arc<dyn AttachmentStore>,
        policy: UploadPolicy,
        pagination: PaginationConfig,
    ) -> Self {
        Self { resource: Arc::new(resource), store, attachments, policy, engine: QueryEngine::new(pagination) }
    }

    pub fn name(&self) -> &'static str { <R::Entity as Entity>::NAME }

    pub fn store(&self) -> &Arc<dyn EntityStore<R::Entity>> { &self.store }

    #[instrument(skip(self, ctx, query), fields(resource = <R::Entity as Entity>::NAME))]
    pub async fn list(&self, ctx: &OpContext, query: &ListQuery) -> Envelope<ListResult<R::View>> {
        Envelope::from_result(self.try_list(ctx, query).await)
    }

    #[instrument(skip(self, ctx), fields(resource = <R::Entity as Entity>::NAME))]
    pub async fn get(&self, ctx: &OpContext, id: Uuid) -> Envelope<R::View> {
        Envelope::from_result(self.try_get(ctx, id).await)
    }

    #[instrument(skip(self, ctx, form, uploads), fields(resource = <R::Entity as Entity>::NAME, files = uploads.len()))]
    pub async fn create(&self, ctx: &OpContext, form: &FormFields, uploads: Vec<Upload>) -> Envelope<R::View> {
        Envelope::from_result(self.try_create(ctx, form, uploads).await)
    }

    #[instrument(skip(self, ctx, form, uploads), fields(resource = <R::Entity as Entity>::NAME, files = uploads.len()))]
    pub async fn update(&self, ctx: &OpContext, id: Uuid, form: &FormFields, uploads: Vec<Upload>) -> Envelope<R::View> {
        Envelope::from_result(self.try_update(ctx, id, form, uploads).await)
    }

    #[instrument(skip(self, ctx), fields(resource = <R::Entity as Entity>::NAME))]
    pub async fn delete(&self, ctx: &OpContext, id: Uuid) -> Envelope<()> {
        Envelope::from_result(self.try_delete(ctx, id).await)
    }

    async fn try_list(&self, ctx: &OpContext, query: &ListQuery) -> Result<ListResult<R::View>, ServiceError> {
        let page = self.engine.page_request(query);
        let filter = self.engine.normalize_filter::<R::Entity>(query);
        let Some(filter) = ctx.run(self.resource.resolve_filter(filter)).await? else {
            return Ok(ListResult::empty(page.page));
        };
        let candidates = ctx.run(async { self.store.list(&filter).await.map_err(ServiceError::from) }).await?;
        let ListResult { items, page, total_count, page_count } = self.engine.execute(candidates, &filter, page);
        let items = ctx.run(self.resource.present(items)).await?;
        Ok(ListResult { items, page, total_count, page_count })
    }

    async fn try_get(&self, ctx: &OpContext, id: Uuid) -> Result<R::View, ServiceError> {
        let entity = ctx.run(self.load(id)).await?;
        ctx.run(self.present_one(entity)).await
    }

    async fn try_create(&self, ctx: &OpContext, form: &FormFields, uploads: Vec<Upload>) -> Result<R::View, ServiceError> {
        ctx.check()?;
        let (files, upload_errors) = self.accept_uploads(uploads, None);
        let mut input = with_field_errors(self.resource.parse_create(form), upload_errors)?;
        ctx.run(self.resource.validate_create(&mut input)).await?;

        let stored = self.store_files(ctx, &files).await?;
        let entity = match self.resource.build(input, stored.clone()) {
            Ok(e) => e,
            Err(e) => {
                self.discard(&stored).await;
                return Err(e);
            }
        };
        let id = entity.id();
        let created = match self.store.insert(entity).await {
            Ok(c) => c,
            Err(e) => {
                self.discard(&stored).await;
                return Err(e.into_service(self.name(), id));
            }
        };
        info!(resource = self.name(), id = %created.id(), files = stored.len(), "resource_created");
        // committed: no cancellation from here on
        self.present_one(created).await
    }

    async fn try_update(
        &self,
        ctx: &OpContext,
        id: Uuid,
        form: &FormFields,
        uploads: Vec<Upload>,
    ) -> Result<R::View, ServiceError> {
        ctx.check()?;
        let current = ctx.run(self.load(id)).await?;
        let existing = current.attachments();
        let (files, upload_errors) = self.accept_uploads(uploads, Some(existing.len()));
        let mut input = with_field_errors(self.resource.parse_update(form), upload_errors)?;
        ctx.run(self.resource.validate_update(&current, &mut input)).await?;

        let stored = self.store_files(ctx, &files).await?;
        let change = match (self.resource.attachment_rules(), stored.is_empty()) {
            (Some(rules), false) if rules.mode == AttachmentMode::Append => AttachmentChange::Append(stored.clone()),
            (Some(_), false) => AttachmentChange::Replace(stored.clone()),
            _ => AttachmentChange::Keep,
        };
        let patch = match self.resource.patch(input, change.resolve(&existing)) {
            Ok(p) => p,
            Err(e) => {
                self.discard(&stored).await;
                return Err(e);
            }
        };
        let updated = match self.store.update(id, &patch).await {
            Ok(u) => u,
            Err(e) => {
                self.discard(&stored).await;
                return Err(e.into_service(self.name(), id));
            }
        };

        // the record now points at the new list; drop what it no longer references
        let kept: HashSet<AttachmentRef> = updated.attachments().into_iter().collect();
        let stale: Vec<AttachmentRef> = existing.into_iter().filter(|r| !kept.contains(r)).collect();
        self.discard(&stale).await;
        info!(resource = self.name(), %id, added = stored.len(), removed = stale.len(), "resource_updated");
        self.present_one(updated).await
    }

    async fn try_delete(&self, ctx: &OpContext, id: Uuid) -> Result<(), ServiceError> {
        let current = ctx.run(self.load(id)).await?;
        ctx.run(self.resource.check_delete(&current)).await?;
        ctx.check()?;
        self.store.delete(id).await.map_err(|e| e.into_service(self.name(), id))?;
        let owned = current.attachments();
        self.discard(&owned).await;
        info!(resource = self.name(), %id, files = owned.len(), "resource_deleted");
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<R::Entity, ServiceError> {
        self.store.get(id).await.map_err(|e| e.into_service(self.name(), id))
    }

    async fn present_one(&self, entity: R::Entity) -> Result<R::View, ServiceError> {
        self.resource
            .present(vec![entity])
            .await?
            .pop()
            .ok_or_else(|| ServiceError::Infrastructure(format!("{} presenter returned nothing", self.name())))
    }

    /// Split uploads into accepted files and field errors. `existing` is the
    /// current attachment count on update, `None` on create.
    fn accept_uploads(&self, uploads: Vec<Upload>, existing: Option<usize>) -> (Vec<Upload>, Vec<FieldError>) {
        let Some(rules) = self.resource.attachment_rules() else {
            if !uploads.is_empty() {
                warn!(resource = self.name(), count = uploads.len(), "ignoring uploads for resource without attachments");
            }
            return (Vec::new(), Vec::new());
        };
        let (files, ignored): (Vec<Upload>, Vec<Upload>) =
            uploads.into_iter().partition(|u| u.field.eq_ignore_ascii_case(rules.field));
        if !ignored.is_empty() {
            warn!(resource = self.name(), count = ignored.len(), "ignoring uploads under unknown fields");
        }

        let mut errors: Vec<FieldError> = files.iter().filter_map(|u| self.policy.check(u).err()).collect();
        if existing.is_none() && rules.required_on_create && files.is_empty() {
            errors.push(FieldError::new(rules.field, "is required"));
        }
        let total = match (rules.mode, existing) {
            (AttachmentMode::Append, Some(n)) => n + files.len(),
            _ => files.len(),
        };
        if total > rules.max {
            errors.push(FieldError::new(rules.field, format!("at most {} file(s) allowed", rules.max)));
        }
        (files, errors)
    }

    /// Store every file or none: on failure or cancellation between files,
    /// the ones already written are removed.
    async fn store_files(&self, ctx: &OpContext, files: &[Upload]) -> Result<Vec<AttachmentRef>, ServiceError> {
        let mut stored = Vec::with_capacity(files.len());
        for file in files {
            let res = match ctx.check() {
                Ok(()) => self.attachments.store(&file.bytes, &file.file_name).await,
                Err(e) => Err(e),
            };
            match res {
                Ok(r) => stored.push(r),
                Err(e) => {
                    self.discard(&stored).await;
                    return Err(e);
                }
            }
        }
        Ok(stored)
    }

    /// Best-effort removal; failures are logged and left to the orphan sweep.
    async fn discard(&self, refs: &[AttachmentRef]) {
        for r in refs {
            if let Err(e) = self.attachments.delete(r).await {
                warn!(resource = self.name(), reference = %r, error = %e, "attachment cleanup failed");
            }
        }
    }
}

#[async_trait]
impl<R: Resource> AttachmentOwner for ResourceService<R> {
    fn owner_name(&self) -> &'static str { self.name() }

    async fn referenced_attachments(&self) -> Result<Vec<AttachmentRef>, ServiceError> {
        let all = self.store.list(&Filter::new()).await?;
        Ok(all.iter().flat_map(|e| e.attachments()).collect())
    }
}
