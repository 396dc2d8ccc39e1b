use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{conflict, Role};
use crate::attachments::AttachmentRef;
use crate::auth::password::hash_password_blocking;
use crate::errors::{FieldError, ServiceError};
use crate::form::{FieldErrors, FormFields};
use crate::query::{FieldValue, Filter};
use crate::resource::{AttachmentMode, AttachmentRules, Resource};
use crate::storage::{Entity, EntityStore};

use super::role::USER;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub user_name: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub email_confirmed: bool,
    pub image: Option<AttachmentRef>,
    pub role_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub email: Option<String>,
    pub user_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password_hash: Option<String>,
    pub email_confirmed: Option<bool>,
    pub image: Option<Option<AttachmentRef>>,
    pub role_ids: Option<Vec<Uuid>>,
}

impl Entity for User {
    type Patch = UserPatch;
    const NAME: &'static str = "user";
    const FILTERABLE: &'static [&'static str] = &["email", "userName", "firstName", "lastName", "role"];

    fn id(&self) -> Uuid { self.id }
    fn created_at(&self) -> DateTime<Utc> { self.created_at }
    fn attachments(&self) -> Vec<AttachmentRef> { self.image.iter().cloned().collect() }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "email" => Some(FieldValue::Text(&self.email)),
            "userName" => Some(FieldValue::Text(&self.user_name)),
            "firstName" => Some(FieldValue::Text(&self.first_name)),
            "lastName" => Some(FieldValue::Text(&self.last_name)),
            "roleId" => Some(FieldValue::Set(self.role_ids.iter().map(Uuid::to_string).collect())),
            _ => None,
        }
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("email", self.email.to_lowercase()), ("userName", self.user_name.to_lowercase())]
    }

    fn apply(&mut self, p: &UserPatch, now: DateTime<Utc>) {
        if let Some(v) = &p.email { self.email = v.clone(); }
        if let Some(v) = &p.user_name { self.user_name = v.clone(); }
        if let Some(v) = &p.first_name { self.first_name = v.clone(); }
        if let Some(v) = &p.last_name { self.last_name = v.clone(); }
        if let Some(v) = &p.password_hash { self.password_hash = v.clone(); }
        if let Some(v) = p.email_confirmed { self.email_confirmed = v; }
        if let Some(v) = &p.image { self.image = v.clone(); }
        if let Some(v) = &p.role_ids { self.role_ids = v.clone(); }
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleRef {
    pub id: Uuid,
    pub name: String,
}

/// User as shown to clients; never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub user_name: String,
    pub first_name: String,
    pub last_name: String,
    pub email_confirmed: bool,
    pub image: Option<AttachmentRef>,
    pub roles: Vec<RoleRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct UserCreate {
    email: String,
    user_name: String,
    first_name: String,
    last_name: String,
    password: String,
    password_hash: String,
    email_confirmed: bool,
    roles: Vec<String>,
    role_ids: Vec<Uuid>,
}

pub struct UserUpdate {
    email: Option<String>,
    user_name: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    password: Option<String>,
    password_hash: Option<String>,
    email_confirmed: Option<bool>,
    roles: Option<Vec<String>>,
    role_ids: Option<Vec<Uuid>>,
}

pub struct UserResource {
    users: Arc<dyn EntityStore<User>>,
    roles: Arc<dyn EntityStore<Role>>,
}

impl UserResource {
    pub fn new(users: Arc<dyn EntityStore<User>>, roles: Arc<dyn EntityStore<Role>>) -> Self { Self { users, roles } }

    pub async fn find_by_email(store: &dyn EntityStore<User>, email: &str) -> Result<Option<User>, ServiceError> {
        let candidates = store.list(&Filter::eq("email", email)).await?;
        Ok(candidates.into_iter().find(|u| u.email.eq_ignore_ascii_case(email)))
    }

    async fn ensure_unique(&self, email: Option<&str>, user_name: Option<&str>, except: Option<Uuid>) -> Result<(), ServiceError> {
        if let Some(email) = email {
            if let Some(u) = Self::find_by_email(self.users.as_ref(), email).await? {
                if Some(u.id) != except {
                    return Err(conflict(User::NAME, "email", email));
                }
            }
        }
        if let Some(name) = user_name {
            let clash = self
                .users
                .list(&Filter::eq("userName", name))
                .await?
                .into_iter()
                .any(|u| u.user_name.eq_ignore_ascii_case(name) && Some(u.id) != except);
            if clash {
                return Err(conflict(User::NAME, "userName", name));
            }
        }
        Ok(())
    }

    /// Resolve role names to ids with one store read; unknown names are
    /// field errors.
    async fn role_ids(&self, names: &[String]) -> Result<Vec<Uuid>, ServiceError> {
        let known: HashMap<String, Uuid> = self.roles.list(&Filter::new()).await?.into_iter().map(|r| (r.name, r.id)).collect();
        let mut ids = Vec::with_capacity(names.len());
        let mut errors = Vec::new();
        for name in names {
            match known.get(name) {
                Some(id) if !ids.contains(id) => ids.push(*id),
                Some(_) => {}
                None => errors.push(FieldError::new("roles", format!("unknown role '{}'", name))),
            }
        }
        if errors.is_empty() { Ok(ids) } else { Err(ServiceError::Validation(errors)) }
    }
}

fn looks_like_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.starts_with('.') && !domain.ends_with('.') && domain.contains('.') && !s.contains(char::is_whitespace)
        }
        None => false,
    }
}

fn check_email(errs: &mut FieldErrors, email: Option<&str>) {
    if let Some(e) = email {
        errs.check(looks_like_email(e), "email", "is not a valid email address");
    }
}

fn check_password(errs: &mut FieldErrors, password: Option<&str>) {
    if let Some(p) = password {
        errs.check(
            p.chars().count() >= MIN_PASSWORD_LEN,
            "password",
            &format!("must be at least {} characters", MIN_PASSWORD_LEN),
        );
    }
}

fn role_names(form: &FormFields) -> Vec<String> {
    form.all("roles").into_iter().map(|r| r.to_lowercase()).collect()
}

#[async_trait]
impl Resource for UserResource {
    type Entity = User;
    type Create = UserCreate;
    type Update = UserUpdate;
    type View = UserView;

    fn attachment_rules(&self) -> Option<AttachmentRules> {
        Some(AttachmentRules { field: "image", required_on_create: false, max: 1, mode: AttachmentMode::Replace })
    }

    fn parse_create(&self, form: &FormFields) -> Result<UserCreate, ServiceError> {
        let mut errs = FieldErrors::new();
        let email = errs.required(form, "email");
        check_email(&mut errs, email.as_deref());
        let password = errs.required(form, "password");
        check_password(&mut errs, password.as_deref());
        let email_confirmed = errs.bool(form, "emailConfirmed").unwrap_or(false);
        errs.finish(|| {
            let email = email.unwrap_or_default();
            UserCreate {
                user_name: form.text("userName").map(str::to_string).unwrap_or_else(|| email.clone()),
                email,
                first_name: form.text("firstName").unwrap_or_default().to_string(),
                last_name: form.text("lastName").unwrap_or_default().to_string(),
                password: password.unwrap_or_default(),
                password_hash: String::new(),
                email_confirmed,
                roles: role_names(form),
                role_ids: Vec::new(),
            }
        })
    }

    fn parse_update(&self, form: &FormFields) -> Result<UserUpdate, ServiceError> {
        let mut errs = FieldErrors::new();
        for required in ["email", "userName"] {
            errs.check(!form.contains(required) || form.text(required).is_some(), required, "must not be empty");
        }
        let email = form.text("email").map(str::to_string);
        check_email(&mut errs, email.as_deref());
        // blank password means "unchanged"
        let password = form.text("password").map(str::to_string);
        check_password(&mut errs, password.as_deref());
        let email_confirmed = errs.bool(form, "emailConfirmed");
        errs.finish(|| UserUpdate {
            email,
            user_name: form.text("userName").map(str::to_string),
            first_name: form.contains("firstName").then(|| form.text("firstName").unwrap_or_default().to_string()),
            last_name: form.contains("lastName").then(|| form.text("lastName").unwrap_or_default().to_string()),
            password,
            password_hash: None,
            email_confirmed,
            roles: form.contains("roles").then(|| role_names(form)),
            role_ids: None,
        })
    }

    async fn validate_create(&self, input: &mut UserCreate) -> Result<(), ServiceError> {
        self.ensure_unique(Some(&input.email), Some(&input.user_name), None).await?;
        if input.roles.is_empty() {
            // default role when it exists; no roles otherwise
            if let Some(r) = super::RoleResource::find_by_name(self.roles.as_ref(), USER).await? {
                input.role_ids = vec![r.id];
            }
        } else {
            input.role_ids = self.role_ids(&input.roles).await?;
        }
        input.password_hash = hash_password_blocking(std::mem::take(&mut input.password)).await?;
        Ok(())
    }

    async fn validate_update(&self, current: &User, input: &mut UserUpdate) -> Result<(), ServiceError> {
        self.ensure_unique(input.email.as_deref(), input.user_name.as_deref(), Some(current.id)).await?;
        if let Some(names) = &input.roles {
            input.role_ids = Some(self.role_ids(names).await?);
        }
        if let Some(password) = input.password.take() {
            input.password_hash = Some(hash_password_blocking(password).await?);
        }
        Ok(())
    }

    fn build(&self, input: UserCreate, attachments: Vec<AttachmentRef>) -> Result<User, ServiceError> {
        let now = Utc::now();
        Ok(User {
            id: Uuid::new_v4(),
            email: input.email,
            user_name: input.user_name,
            first_name: input.first_name,
            last_name: input.last_name,
            password_hash: input.password_hash,
            email_confirmed: input.email_confirmed,
            image: attachments.into_iter().next(),
            role_ids: input.role_ids,
            created_at: now,
            updated_at: now,
        })
    }

    fn patch(&self, input: UserUpdate, attachments: Option<Vec<AttachmentRef>>) -> Result<UserPatch, ServiceError> {
        Ok(UserPatch {
            email: input.email,
            user_name: input.user_name,
            first_name: input.first_name,
            last_name: input.last_name,
            password_hash: input.password_hash,
            email_confirmed: input.email_confirmed,
            image: attachments.map(|v| v.into_iter().next()),
            role_ids: input.role_ids,
        })
    }

    async fn resolve_filter(&self, mut filter: Filter) -> Result<Option<Filter>, ServiceError> {
        if let Some(name) = filter.remove("role") {
            match super::RoleResource::find_by_name(self.roles.as_ref(), &name).await? {
                Some(r) => filter.insert("roleId", r.id.to_string()),
                None => return Ok(None),
            }
        }
        Ok(Some(filter))
    }

    async fn present(&self, items: Vec<User>) -> Result<Vec<UserView>, ServiceError> {
        let names: HashMap<Uuid, String> = if items.iter().any(|u| !u.role_ids.is_empty()) {
            self.roles.list(&Filter::new()).await?.into_iter().map(|r| (r.id, r.name)).collect()
        } else {
            HashMap::new()
        };
        Ok(items
            .into_iter()
            .map(|u| UserView {
                roles: u
                    .role_ids
                    .iter()
                    .filter_map(|id| names.get(id).map(|n| RoleRef { id: *id, name: n.clone() }))
                    .collect(),
                id: u.id,
                email: u.email,
                user_name: u.user_name,
                first_name: u.first_name,
                last_name: u.last_name,
                email_confirmed: u.email_confirmed,
                image: u.image,
                created_at: u.created_at,
                updated_at: u.updated_at,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::verify_password;
    use crate::context::OpContext;
    use crate::errors::ErrorKind;
    use crate::pagination::ListQuery;
    use crate::test_support::{user_form, Fixture};

    #[tokio::test]
    async fn create_hashes_password_and_hides_it() -> anyhow::Result<()> {
        let fx = Fixture::new().await;
        let ctx = OpContext::new();
        let view = fx.services.users.create(&ctx, &user_form("bob@example.com").with("firstName", "Bob"), vec![]).await.payload.unwrap();
        assert_eq!(view.user_name, "bob@example.com");
        let json = serde_json::to_value(&view)?;
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["firstName"], "Bob");

        let stored = fx.stores.users.get(view.id).await?;
        assert_ne!(stored.password_hash, "secret1");
        assert!(verify_password("secret1", &stored.password_hash)?);
        fx.cleanup().await;
        Ok(())
    }

    #[tokio::test]
    async fn unknown_roles_and_bad_fields_are_rejected() {
        let fx = Fixture::new().await;
        let ctx = OpContext::new();
        let res = fx.services.users.create(&ctx, &user_form("c@example.com").with("roles", "admin,ghost"), vec![]).await;
        assert!(res.is_kind(ErrorKind::ValidationFailed));
        assert_eq!(res.errors, vec!["roles: unknown role 'ghost'"]);

        let form = FormFields::new().with("email", "not-an-email").with("password", "123");
        let res = fx.services.users.create(&ctx, &form, vec![]).await;
        assert_eq!(res.errors.len(), 2);
        assert_eq!(fx.stores.users.len().await, 0);
        fx.cleanup().await;
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let fx = Fixture::new().await;
        let ctx = OpContext::new();
        assert!(fx.services.users.create(&ctx, &user_form("d@example.com"), vec![]).await.succeeded);
        let dup = fx.services.users.create(&ctx, &user_form("D@Example.com"), vec![]).await;
        assert!(dup.is_kind(ErrorKind::Conflict));
        fx.cleanup().await;
    }

    #[tokio::test]
    async fn roles_replace_on_update_and_filter_by_role() {
        let fx = Fixture::new().await;
        let ctx = OpContext::new();
        let u = fx.services.users.create(&ctx, &user_form("e@example.com"), vec![]).await.payload.unwrap();
        fx.services.users.create(&ctx, &user_form("f@example.com"), vec![]).await;
        let promoted = fx
            .services
            .users
            .update(&ctx, u.id, &FormFields::new().with("roles", "admin").with("roles", "user"), vec![])
            .await
            .payload
            .unwrap();
        let mut names: Vec<_> = promoted.roles.iter().map(|r| r.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["admin", "user"]);

        let admins = fx.services.users.list(&ctx, &ListQuery::new(1, 10).with("role", "ADMIN")).await.payload.unwrap();
        assert_eq!(admins.total_count, 1);
        assert_eq!(admins.items[0].id, u.id);
        let users = fx.services.users.list(&ctx, &ListQuery::new(1, 10).with("role", "user")).await.payload.unwrap();
        assert_eq!(users.total_count, 2);
        fx.cleanup().await;
    }

    #[tokio::test]
    async fn blank_password_on_update_keeps_hash() -> anyhow::Result<()> {
        let fx = Fixture::new().await;
        let ctx = OpContext::new();
        let u = fx.services.users.create(&ctx, &user_form("g@example.com"), vec![]).await.payload.unwrap();
        let before = fx.stores.users.get(u.id).await?.password_hash;
        let res = fx.services.users.update(&ctx, u.id, &FormFields::new().with("password", "").with("lastName", "Ng"), vec![]).await;
        assert!(res.succeeded);
        assert_eq!(fx.stores.users.get(u.id).await?.password_hash, before);
        fx.cleanup().await;
        Ok(())
    }

    #[tokio::test(flavor = "current_thread")]
    async fn new_password_on_update_is_hashed_off_the_worker() -> anyhow::Result<()> {
        let fx = Fixture::new().await;
        let ctx = OpContext::new();
        let u = fx.services.users.create(&ctx, &user_form("h@example.com"), vec![]).await.payload.unwrap();
        let res = fx.services.users.update(&ctx, u.id, &FormFields::new().with("password", "changed9"), vec![]).await;
        assert!(res.succeeded);
        let stored = fx.stores.users.get(u.id).await?;
        assert!(verify_password("changed9", &stored.password_hash)?);
        assert!(!verify_password("secret1", &stored.password_hash)?);
        fx.cleanup().await;
        Ok(())
    }
}
