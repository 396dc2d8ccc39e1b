//! SeaORM entities backing the resource stores.
//!
//! Entities are plain table mappings; validation and relationship policy
//! live in the `service` crate.

pub mod errors;
pub mod db;
pub mod manufacture;
pub mod car;
pub mod role;
pub mod app_user;
pub mod user_role;

#[cfg(test)]
mod tests;
