pub mod account;
pub mod auth;
pub mod resources;

use axum::{extract::DefaultBodyLimit, http::HeaderValue, response::IntoResponse, routing::get, Json, Router};
use configs::{CorsConfig, StorageConfig};
use service::resources::car::MAX_IMAGES;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{warn, Level};
use utoipa_swagger_ui::SwaggerUi;

use common::types::Health;

use crate::metrics::encode_metrics;
use crate::state::AppState;

#[utoipa::path(get, path = "/health", tag = "health", responses((status = 200, description = "OK", body = crate::openapi::HealthResponse)))]
pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

#[utoipa::path(get, path = "/metrics", tag = "health", responses((status = 200, description = "Prometheus text format")))]
pub async fn metrics() -> impl IntoResponse {
    encode_metrics()
}

pub fn build_cors(cfg: &CorsConfig) -> CorsLayer {
    if cfg.allowed_origins.is_empty() || cfg.allowed_origins.iter().any(|o| o.trim() == "*") {
        return CorsLayer::very_permissive();
    }
    let origins: Vec<HeaderValue> = cfg
        .allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o.trim()) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
}

/// Largest accepted request body: a full set of car images plus form text.
pub fn body_limit(cfg: &StorageConfig) -> usize {
    cfg.max_upload_bytes.saturating_mul(MAX_IMAGES).saturating_add(64 * 1024)
}

/// Build the full application router: resources, account, docs, static images.
pub fn build_router(state: AppState) -> Router {
    let services = &state.services;
    let timeout = state.request_timeout();
    let auth = services.auth.clone();

    let api = Router::new()
        .nest("/api/car", resources::router(services.cars.clone(), timeout, auth.clone()))
        .nest("/api/manufacture", resources::router(services.manufactures.clone(), timeout, auth.clone()))
        .nest("/api/role", resources::router(services.roles.clone(), timeout, auth.clone()))
        .nest("/api/user", resources::router(services.users.clone(), timeout, auth.clone()))
        .nest("/api/account", account::router(auth));

    let public = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .nest_service("/images", ServeDir::new(&state.config.storage.images_dir))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", crate::openapi::document()));

    public
        .merge(api)
        .layer(DefaultBodyLimit::max(body_limit(&state.config.storage)))
        .layer(build_cors(&state.config.cors))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO).include_headers(false))
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}
