use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use service::auth::domain::{AuthSession, AuthUser, LoginInput};
use service::auth::AuthService;
use service::envelope::Envelope;
use service::errors::ServiceError;

use super::auth::{token_from, AUTH_COOKIE};
use crate::errors::ApiResponse;
use crate::metrics::LOGINS_TOTAL;

pub fn router(auth: Arc<AuthService>) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .with_state(auth)
}

#[utoipa::path(post, path = "/api/account/login", tag = "account", request_body = crate::openapi::LoginRequest, responses((status = 200, description = "Logged in; envelope carries the token"), (status = 400, description = "Validation failed"), (status = 401, description = "Invalid credentials")))]
pub async fn login(
    State(auth): State<Arc<AuthService>>,
    jar: CookieJar,
    input: Result<Json<LoginInput>, JsonRejection>,
) -> (CookieJar, ApiResponse<AuthSession>) {
    let input = match input {
        Ok(Json(input)) => input,
        Err(e) => return (jar, Envelope::failure(ServiceError::invalid("body", e.body_text())).into()),
    };
    match auth.login(input).await {
        Ok(session) => {
            LOGINS_TOTAL.with_label_values(&["ok"]).inc();
            let mut cookie = Cookie::new(AUTH_COOKIE, session.token.clone());
            cookie.set_path("/");
            cookie.set_http_only(true);
            cookie.set_same_site(SameSite::Lax);
            (jar.add(cookie), Envelope::success(session).into())
        }
        Err(e) => {
            LOGINS_TOTAL.with_label_values(&["rejected"]).inc();
            (jar, Envelope::failure(e.into()).into())
        }
    }
}

pub async fn logout(jar: CookieJar) -> (CookieJar, ApiResponse<()>) {
    (jar.remove(Cookie::from(AUTH_COOKIE)), Envelope::success(()).into())
}

#[utoipa::path(get, path = "/api/account/me", tag = "account", responses((status = 200, description = "Current principal"), (status = 401, description = "Missing or invalid token")))]
pub async fn me(State(auth): State<Arc<AuthService>>, headers: HeaderMap, jar: CookieJar) -> ApiResponse<AuthUser> {
    let res = match token_from(&headers, &jar) {
        Some(token) => auth.verify(&token).map_err(ServiceError::from),
        None => Err(ServiceError::Unauthorized("authentication required".into())),
    };
    Envelope::from_result(res).into()
}
