//! Concrete resources: entity types, form parsing, validation and views.

pub mod car;
pub mod manufacture;
pub mod role;
pub mod user;

pub use car::{Car, CarResource, CarView};
pub use manufacture::{Manufacture, ManufactureResource};
pub use role::{Role, RoleResource};
pub use user::{User, UserResource, UserView};

use crate::errors::ServiceError;
use crate::form::FormFields;

/// `Some(value)` when the field was sent; a blank value clears it.
pub(crate) fn optional_text(form: &FormFields, name: &str) -> Option<Option<String>> {
    form.contains(name).then(|| form.text(name).map(str::to_string))
}

pub(crate) fn conflict(entity: &str, field: &str, value: &str) -> ServiceError {
    ServiceError::Conflict(format!("{} with {} '{}' already exists", entity, field, value))
}
