use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use service::auth::AuthService;
use service::envelope::Envelope;
use service::errors::ServiceError;
use service::resources::role::ADMIN;

use crate::errors::ApiResponse;

pub const AUTH_COOKIE: &str = "auth_token";

/// Bearer token from `Authorization`, falling back to the `auth_token` cookie.
pub fn token_from(headers: &HeaderMap, jar: &CookieJar) -> Option<String> {
    if let Some(h) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        return h.strip_prefix("Bearer ").map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
    }
    jar.get(AUTH_COOKIE).map(|c| c.value().to_string()).filter(|t| !t.is_empty())
}

/// Rejects the request unless it carries a valid token with the `admin` role.
/// The verified principal is stored in the request extensions.
pub async fn require_admin(
    State(auth): State<Arc<AuthService>>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    let Some(token) = token_from(req.headers(), &jar) else {
        tracing::warn!(path = %path, "missing bearer token");
        return reject(ServiceError::Unauthorized("authentication required".into()));
    };
    match auth.authorize(&token, ADMIN) {
        Ok(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "admin check failed");
            reject(e.into())
        }
    }
}

fn reject(err: ServiceError) -> Response {
    ApiResponse(Envelope::<()>::failure(err)).into_response()
}
