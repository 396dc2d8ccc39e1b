//! Resource layer for the car admin backend.
//! - Generic create/read/update/delete/list over any [`resource::Resource`].
//! - File attachments stored next to the records that reference them.
//! - Uniform [`envelope::Envelope`] results with field-level validation errors.
//!
//! Web framework independent; the `server` crate maps envelopes to HTTP.

pub mod errors;
pub mod envelope;
pub mod context;
pub mod pagination;
pub mod query;
pub mod form;
pub mod storage;
pub mod attachments;
pub mod resource;
pub mod resources;
pub mod auth;
pub mod jobs;
pub mod registry;
pub mod runtime;
pub mod seed;
#[cfg(test)]
pub mod test_support;
