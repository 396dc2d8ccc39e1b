#![allow(dead_code)]

use std::path::PathBuf;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use configs::{AppConfig, SeedConfig, StoreBackend};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use server::routes::build_router;
use server::startup::build_state;

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "admin-pass";
const BOUNDARY: &str = "----car-admin-test-boundary";

pub struct TestApp {
    pub router: Router,
    pub dir: PathBuf,
}

impl TestApp {
    /// In-memory stores, a throwaway images directory and a seeded admin.
    pub async fn start() -> anyhow::Result<Self> {
        let dir = std::env::temp_dir().join(format!("server_it_{}", Uuid::new_v4().simple()));
        let mut cfg = AppConfig::default();
        cfg.database.backend = StoreBackend::Memory;
        cfg.storage.images_dir = dir.join("images").to_string_lossy().into_owned();
        cfg.jobs.log_dir = dir.join("logs").to_string_lossy().into_owned();
        cfg.auth.jwt_secret = "integration-secret-0123456789".into();
        cfg.seed = SeedConfig { admin_email: Some(ADMIN_EMAIL.into()), admin_password: Some(ADMIN_PASSWORD.into()) };
        let state = build_state(cfg).await?;
        Ok(Self { router: build_router(state), dir })
    }

    pub async fn send(&self, req: Request<Body>) -> anyhow::Result<(StatusCode, Value)> {
        let resp = self.router.clone().oneshot(req).await?;
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes)? };
        Ok((status, body))
    }

    pub async fn raw(&self, req: Request<Body>) -> anyhow::Result<(StatusCode, Vec<u8>)> {
        let resp = self.router.clone().oneshot(req).await?;
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await?;
        Ok((status, bytes.to_vec()))
    }

    pub async fn login(&self, email: &str, password: &str) -> anyhow::Result<(StatusCode, Value)> {
        let req = Request::post("/api/account/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&json!({"email": email, "password": password}))?))?;
        self.send(req).await
    }

    pub async fn admin_token(&self) -> anyhow::Result<String> {
        let (status, body) = self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await?;
        assert_eq!(status, StatusCode::OK, "admin login: {body}");
        Ok(body["payload"]["token"].as_str().unwrap_or_default().to_string())
    }

    pub async fn cleanup(self) {
        let _ = tokio::fs::remove_dir_all(&self.dir).await;
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request")
}

pub fn delete(uri: &str, token: &str) -> Request<Body> {
    Request::delete(uri).header(header::AUTHORIZATION, format!("Bearer {token}")).body(Body::empty()).expect("request")
}

/// A multipart request; `token` of `None` sends it anonymously.
pub fn form(
    method: &str,
    uri: &str,
    token: Option<&str>,
    fields: &[(&str, &str)],
    files: &[(&str, &str, &[u8])],
) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
        );
    }
    for (name, file_name, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    let mut req = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"));
    if let Some(t) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    req.body(Body::from(body)).expect("request")
}

pub fn errors_of(body: &Value) -> Vec<String> {
    body["errors"]
        .as_array()
        .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}
