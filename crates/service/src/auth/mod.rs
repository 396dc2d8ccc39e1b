//! Auth module: password hashing, login and bearer-token verification.
//!
//! Users and roles come from the same entity stores the resources use.

pub mod domain;
pub mod errors;
pub mod password;
pub mod service;

pub use service::AuthService;
