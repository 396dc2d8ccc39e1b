use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use models::{app_user, user_role};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait, Unchanged,
};
use uuid::Uuid;

use super::{attachment, map_db_err, utc};
use crate::query::Filter;
use crate::resources::user::UserPatch;
use crate::resources::User;
use crate::storage::{EntityStore, StoreError};

/// Users plus their `user_role` links; writes touching both share one
/// transaction.
pub struct SeaOrmUserStore {
    db: DatabaseConnection,
}

impl SeaOrmUserStore {
    pub fn new(db: DatabaseConnection) -> Self { Self { db } }
}

fn from_model(m: app_user::Model, role_ids: Vec<Uuid>) -> User {
    User {
        id: m.id,
        email: m.email,
        user_name: m.user_name,
        first_name: m.first_name,
        last_name: m.last_name,
        password_hash: m.password_hash,
        email_confirmed: m.email_confirmed,
        image: attachment(m.image),
        role_ids,
        created_at: utc(m.created_at),
        updated_at: utc(m.updated_at),
    }
}

/// Role ids for every user in `ids`, one query.
async fn role_links<C: ConnectionTrait>(conn: &C, ids: Vec<Uuid>) -> Result<HashMap<Uuid, Vec<Uuid>>, StoreError> {
    let mut out: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    if ids.is_empty() {
        return Ok(out);
    }
    let links = user_role::Entity::find()
        .filter(user_role::Column::UserId.is_in(ids))
        .all(conn)
        .await
        .map_err(map_db_err)?;
    for l in links {
        out.entry(l.user_id).or_default().push(l.role_id);
    }
    Ok(out)
}

async fn replace_links<C: ConnectionTrait>(conn: &C, user_id: Uuid, role_ids: &[Uuid]) -> Result<(), StoreError> {
    user_role::Entity::delete_many()
        .filter(user_role::Column::UserId.eq(user_id))
        .exec(conn)
        .await
        .map_err(map_db_err)?;
    if role_ids.is_empty() {
        return Ok(());
    }
    let rows = role_ids.iter().map(|r| user_role::ActiveModel { user_id: Set(user_id), role_id: Set(*r) });
    user_role::Entity::insert_many(rows).exec_without_returning(conn).await.map_err(map_db_err)?;
    Ok(())
}

#[async_trait]
impl EntityStore<User> for SeaOrmUserStore {
    async fn get(&self, id: Uuid) -> Result<User, StoreError> {
        let m = app_user::Entity::find_by_id(id).one(&self.db).await.map_err(map_db_err)?.ok_or(StoreError::NotFound)?;
        let mut links = role_links(&self.db, vec![id]).await?;
        Ok(from_model(m, links.remove(&id).unwrap_or_default()))
    }

    async fn list(&self, filter: &Filter) -> Result<Vec<User>, StoreError> {
        let mut q = app_user::Entity::find();
        if let Some(role_id) = filter.get("roleId").and_then(|v| Uuid::parse_str(v).ok()) {
            let holders: Vec<Uuid> = user_role::Entity::find()
                .filter(user_role::Column::RoleId.eq(role_id))
                .all(&self.db)
                .await
                .map_err(map_db_err)?
                .into_iter()
                .map(|l| l.user_id)
                .collect();
            q = q.filter(app_user::Column::Id.is_in(holders));
        }
        let rows = q
            .order_by_asc(app_user::Column::CreatedAt)
            .order_by_asc(app_user::Column::Id)
            .all(&self.db)
            .await
            .map_err(map_db_err)?;
        let mut links = role_links(&self.db, rows.iter().map(|m| m.id).collect()).await?;
        Ok(rows
            .into_iter()
            .map(|m| {
                let ids = links.remove(&m.id).unwrap_or_default();
                from_model(m, ids)
            })
            .collect())
    }

    async fn insert(&self, u: User) -> Result<User, StoreError> {
        let txn = self.db.begin().await.map_err(map_db_err)?;
        let am = app_user::ActiveModel {
            id: Set(u.id),
            email: Set(u.email),
            user_name: Set(u.user_name),
            first_name: Set(u.first_name),
            last_name: Set(u.last_name),
            password_hash: Set(u.password_hash),
            email_confirmed: Set(u.email_confirmed),
            image: Set(u.image.map(|r| r.into_string())),
            created_at: Set(u.created_at.into()),
            updated_at: Set(u.updated_at.into()),
        };
        let m = am.insert(&txn).await.map_err(map_db_err)?;
        replace_links(&txn, m.id, &u.role_ids).await?;
        txn.commit().await.map_err(map_db_err)?;
        Ok(from_model(m, u.role_ids))
    }

    async fn update(&self, id: Uuid, p: &UserPatch) -> Result<User, StoreError> {
        let txn = self.db.begin().await.map_err(map_db_err)?;
        let mut am = app_user::ActiveModel { id: Unchanged(id), ..Default::default() };
        if let Some(v) = &p.email { am.email = Set(v.clone()); }
        if let Some(v) = &p.user_name { am.user_name = Set(v.clone()); }
        if let Some(v) = &p.first_name { am.first_name = Set(v.clone()); }
        if let Some(v) = &p.last_name { am.last_name = Set(v.clone()); }
        if let Some(v) = &p.password_hash { am.password_hash = Set(v.clone()); }
        if let Some(v) = p.email_confirmed { am.email_confirmed = Set(v); }
        if let Some(v) = &p.image { am.image = Set(v.as_ref().map(|r| r.as_str().to_string())); }
        am.updated_at = Set(Utc::now().into());
        let m = am.update(&txn).await.map_err(map_db_err)?;
        if let Some(role_ids) = &p.role_ids {
            replace_links(&txn, id, role_ids).await?;
        }
        let mut links = role_links(&txn, vec![id]).await?;
        txn.commit().await.map_err(map_db_err)?;
        Ok(from_model(m, links.remove(&id).unwrap_or_default()))
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        // user_role rows go with the user (ON DELETE CASCADE)
        let res = app_user::Entity::delete_by_id(id).exec(&self.db).await.map_err(map_db_err)?;
        if res.rows_affected == 0 { Err(StoreError::NotFound) } else { Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::Role;
    use crate::storage::seaorm::SeaOrmRoleStore;
    use crate::test_support::{db_tests_enabled, get_db};

    fn user(email: &str, roles: Vec<Uuid>) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: email.into(),
            user_name: email.into(),
            first_name: "Test".into(),
            last_name: "User".into(),
            password_hash: "$argon2id$placeholder".into(),
            email_confirmed: false,
            image: None,
            role_ids: roles,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn user_roles_round_trip_in_one_transaction() -> Result<(), anyhow::Error> {
        if !db_tests_enabled() { return Ok(()); }
        let db = get_db().await?;
        let roles = SeaOrmRoleStore::new(db.clone());
        let users = SeaOrmUserStore::new(db.clone());
        let r1 = roles.insert(Role::new(&format!("r{}", Uuid::new_v4().simple()))).await?;
        let r2 = roles.insert(Role::new(&format!("r{}", Uuid::new_v4().simple()))).await?;

        let email = format!("{}@example.com", Uuid::new_v4().simple());
        let u = users.insert(user(&email, vec![r1.id])).await?;
        assert_eq!(users.get(u.id).await?.role_ids, vec![r1.id]);

        let patch = UserPatch { role_ids: Some(vec![r2.id]), first_name: Some("Renamed".into()), ..Default::default() };
        let updated = users.update(u.id, &patch).await?;
        assert_eq!(updated.role_ids, vec![r2.id]);
        assert_eq!(updated.first_name, "Renamed");

        let holders = users.list(&Filter::eq("roleId", r2.id.to_string())).await?;
        assert!(holders.iter().any(|h| h.id == u.id));

        let dup = users.insert(user(&email, vec![])).await;
        assert!(matches!(dup, Err(StoreError::Conflict(_))));

        users.delete(u.id).await?;
        assert_eq!(users.delete(u.id).await, Err(StoreError::NotFound));
        roles.delete(r1.id).await?;
        roles.delete(r2.id).await?;
        Ok(())
    }
}
