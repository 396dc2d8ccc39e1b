//! Postgres-backed stores on the `models` entities.
//!
//! Rows are converted to the service's entity types at this boundary.
//! Listing orders by `(created_at, id)` and pushes down the exact-match
//! predicates it can express; substring predicates are left to the
//! query engine.

mod car;
mod manufacture;
mod role;
mod user;

pub use car::SeaOrmCarStore;
pub use manufacture::SeaOrmManufactureStore;
pub use role::SeaOrmRoleStore;
pub use user::SeaOrmUserStore;

use chrono::{DateTime, Utc};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{DbErr, SqlErr};
use tracing::debug;

use super::StoreError;
use crate::attachments::AttachmentRef;

pub(crate) fn map_db_err(e: DbErr) -> StoreError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => {
            debug!(%detail, "unique violation");
            return StoreError::Conflict("a record with the same unique value already exists".into());
        }
        Some(SqlErr::ForeignKeyConstraintViolation(detail)) => {
            debug!(%detail, "foreign key violation");
            return StoreError::Conflict("the record is still referenced by another record".into());
        }
        _ => {}
    }
    match e {
        DbErr::RecordNotFound(_) | DbErr::RecordNotUpdated => StoreError::NotFound,
        other => StoreError::Backend(other.to_string()),
    }
}

pub(crate) fn utc(t: DateTimeWithTimeZone) -> DateTime<Utc> { t.with_timezone(&Utc) }

/// Stored names that no longer parse are dropped rather than failing reads.
pub(crate) fn attachment(raw: Option<String>) -> Option<AttachmentRef> {
    raw.as_deref().and_then(AttachmentRef::parse)
}
