use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{conflict, User};
use crate::attachments::AttachmentRef;
use crate::errors::ServiceError;
use crate::form::{FieldErrors, FormFields};
use crate::query::{FieldValue, Filter};
use crate::resource::Resource;
use crate::storage::{Entity, EntityStore};

pub const ADMIN: &str = "admin";
pub const USER: &str = "user";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Role {
    pub fn new(name: &str) -> Self {
        Self { id: Uuid::new_v4(), name: name.to_lowercase(), created_at: Utc::now() }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RolePatch {
    pub name: Option<String>,
}

impl Entity for Role {
    type Patch = RolePatch;
    const NAME: &'static str = "role";
    const FILTERABLE: &'static [&'static str] = &["name"];

    fn id(&self) -> Uuid { self.id }
    fn created_at(&self) -> DateTime<Utc> { self.created_at }
    fn attachments(&self) -> Vec<AttachmentRef> { Vec::new() }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "name" => Some(FieldValue::Text(&self.name)),
            _ => None,
        }
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> { vec![("name", self.name.clone())] }

    fn apply(&mut self, p: &RolePatch, _now: DateTime<Utc>) {
        if let Some(v) = &p.name {
            self.name = v.clone();
        }
    }
}

pub struct RoleInput {
    name: String,
}

pub struct RoleResource {
    roles: Arc<dyn EntityStore<Role>>,
    users: Arc<dyn EntityStore<User>>,
}

impl RoleResource {
    pub fn new(roles: Arc<dyn EntityStore<Role>>, users: Arc<dyn EntityStore<User>>) -> Self { Self { roles, users } }

    /// Exact lookup; role names are stored lowercase.
    pub async fn find_by_name(store: &dyn EntityStore<Role>, name: &str) -> Result<Option<Role>, ServiceError> {
        let name = name.to_lowercase();
        Ok(store.list(&Filter::eq("name", name.clone())).await?.into_iter().find(|r| r.name == name))
    }

    async fn ensure_name_free(&self, name: &str, except: Option<Uuid>) -> Result<(), ServiceError> {
        match Self::find_by_name(self.roles.as_ref(), name).await? {
            Some(r) if Some(r.id) != except => Err(conflict(Role::NAME, "name", name)),
            _ => Ok(()),
        }
    }
}

/// Roles the auth layer matches by name.
fn is_builtin(name: &str) -> bool { name == ADMIN || name == USER }

fn parse_name(form: &FormFields) -> Result<RoleInput, ServiceError> {
    let mut errs = FieldErrors::new();
    let name = errs.required(form, "name").map(|n| n.to_lowercase());
    if let Some(n) = &name {
        errs.check(n.len() <= 32, "name", "must be at most 32 characters");
        errs.check(
            n.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'),
            "name",
            "may contain only letters, digits, '_' and '-'",
        );
    }
    errs.finish(|| RoleInput { name: name.unwrap_or_default() })
}

#[async_trait]
impl Resource for RoleResource {
    type Entity = Role;
    type Create = RoleInput;
    type Update = RoleInput;
    type View = Role;

    fn parse_create(&self, form: &FormFields) -> Result<RoleInput, ServiceError> { parse_name(form) }

    fn parse_update(&self, form: &FormFields) -> Result<RoleInput, ServiceError> { parse_name(form) }

    async fn validate_create(&self, input: &mut RoleInput) -> Result<(), ServiceError> {
        self.ensure_name_free(&input.name, None).await
    }

    async fn validate_update(&self, current: &Role, input: &mut RoleInput) -> Result<(), ServiceError> {
        if is_builtin(&current.name) && input.name != current.name {
            return Err(ServiceError::Conflict(format!("built-in role '{}' cannot be renamed", current.name)));
        }
        self.ensure_name_free(&input.name, Some(current.id)).await
    }

    fn build(&self, input: RoleInput, _attachments: Vec<AttachmentRef>) -> Result<Role, ServiceError> {
        Ok(Role::new(&input.name))
    }

    fn patch(&self, input: RoleInput, _attachments: Option<Vec<AttachmentRef>>) -> Result<RolePatch, ServiceError> {
        Ok(RolePatch { name: Some(input.name) })
    }

    async fn check_delete(&self, entity: &Role) -> Result<(), ServiceError> {
        let holders = self.users.list(&Filter::eq("roleId", entity.id.to_string())).await?;
        if holders.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::Conflict(format!("role '{}' is held by {} user(s)", entity.name, holders.len())))
        }
    }

    async fn present(&self, items: Vec<Role>) -> Result<Vec<Role>, ServiceError> { Ok(items) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::OpContext;
    use crate::errors::ErrorKind;
    use crate::test_support::{user_form, Fixture};

    #[tokio::test]
    async fn names_are_lowercased_and_unique() {
        let fx = Fixture::new().await;
        let ctx = OpContext::new();
        let r = fx.services.roles.create(&ctx, &FormFields::new().with("name", "Editor"), vec![]).await.payload.unwrap();
        assert_eq!(r.name, "editor");
        let dup = fx.services.roles.create(&ctx, &FormFields::new().with("name", "EDITOR"), vec![]).await;
        assert!(dup.is_kind(ErrorKind::Conflict));
        let bad = fx.services.roles.create(&ctx, &FormFields::new().with("name", "no spaces"), vec![]).await;
        assert!(bad.is_kind(ErrorKind::ValidationFailed));
        fx.cleanup().await;
    }

    #[tokio::test]
    async fn held_role_cannot_be_deleted() {
        let fx = Fixture::new().await;
        let ctx = OpContext::new();
        let user = fx.services.users.create(&ctx, &user_form("ann@example.com"), vec![]).await.payload.unwrap();
        let role = &user.roles[0];
        assert_eq!(role.name, USER);
        assert!(fx.services.roles.delete(&ctx, role.id).await.is_kind(ErrorKind::Conflict));

        assert!(fx.services.users.delete(&ctx, user.id).await.succeeded);
        assert!(fx.services.roles.delete(&ctx, role.id).await.succeeded);
        fx.cleanup().await;
    }

    #[tokio::test]
    async fn builtin_roles_cannot_be_renamed() {
        let fx = Fixture::new().await;
        let ctx = OpContext::new();
        let admin = RoleResource::find_by_name(fx.stores.roles.as_ref(), ADMIN).await.unwrap().unwrap();
        let res = fx.services.roles.update(&ctx, admin.id, &FormFields::new().with("name", "owner"), vec![]).await;
        assert!(res.is_kind(ErrorKind::Conflict));
        assert!(RoleResource::find_by_name(fx.stores.roles.as_ref(), ADMIN).await.unwrap().is_some());

        let same = fx.services.roles.update(&ctx, admin.id, &FormFields::new().with("name", "Admin"), vec![]).await;
        assert!(same.succeeded);

        let editor = fx.services.roles.create(&ctx, &FormFields::new().with("name", "editor"), vec![]).await.payload.unwrap();
        let renamed = fx.services.roles.update(&ctx, editor.id, &FormFields::new().with("name", "author"), vec![]).await;
        assert_eq!(renamed.payload.unwrap().name, "author");
        fx.cleanup().await;
    }
}
