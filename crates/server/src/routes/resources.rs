//! One router shape for every resource: list, get, multipart create and
//! update, delete. Writes require the `admin` role.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{
        multipart::{Multipart, MultipartRejection},
        rejection::PathRejection,
        Path, Query, State,
    },
    middleware,
    routing::{get, post, put},
    Router,
};
use service::attachments::Upload;
use service::auth::AuthService;
use service::context::OpContext;
use service::envelope::Envelope;
use service::errors::ServiceError;
use service::form::FormFields;
use service::pagination::{ListQuery, ListResult};
use service::resource::{Resource, ResourceService};
use tracing::debug;
use uuid::Uuid;

use super::auth::require_admin;
use crate::errors::ApiResponse;
use crate::metrics::observe;

pub struct ResourceState<R: Resource> {
    svc: ResourceService<R>,
    timeout: Duration,
}

impl<R: Resource> Clone for ResourceState<R> {
    fn clone(&self) -> Self { Self { svc: self.svc.clone(), timeout: self.timeout } }
}

impl<R: Resource> ResourceState<R> {
    fn ctx(&self) -> OpContext { OpContext::with_timeout(self.timeout) }

    fn finish<T>(&self, op: &str, started: Instant, env: Envelope<T>) -> ApiResponse<T> {
        let outcome = env.kind.map(|k| k.as_str()).unwrap_or("ok");
        observe(self.svc.name(), op, outcome, started.elapsed().as_secs_f64());
        ApiResponse(env)
    }
}

pub fn router<R: Resource>(svc: ResourceService<R>, timeout: Duration, auth: Arc<AuthService>) -> Router {
    let state = ResourceState { svc, timeout };
    let reads = Router::new()
        .route("/", get(list::<R>))
        .route("/list", get(list::<R>))
        .route("/:id", get(get_one::<R>));
    let writes = Router::new()
        .route("/", post(create::<R>))
        .route("/:id", put(update::<R>).delete(remove::<R>))
        .route_layer(middleware::from_fn_with_state(auth, require_admin));
    reads.merge(writes).with_state(state)
}

fn path_id(id: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, ServiceError> {
    id.map(|Path(id)| id).map_err(|_| ServiceError::invalid("id", "must be a valid id"))
}

/// Split a multipart body into text fields and file uploads. A file input
/// left empty by the browser (no name, no bytes) is skipped.
async fn read_form(mp: Result<Multipart, MultipartRejection>) -> Result<(FormFields, Vec<Upload>), ServiceError> {
    let mut mp = mp.map_err(|e| ServiceError::invalid("form", e.body_text()))?;
    let bad = |e: axum::extract::multipart::MultipartError| ServiceError::invalid("form", e.body_text());
    let mut form = FormFields::new();
    let mut uploads = Vec::new();
    while let Some(field) = mp.next_field().await.map_err(bad)? {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(bad)?;
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }
                let mut upload = Upload::new(&name, &file_name, bytes.to_vec());
                upload.content_type = content_type;
                uploads.push(upload);
            }
            None => {
                let text = field.text().await.map_err(bad)?;
                form.push(name, text);
            }
        }
    }
    debug!(fields = form.len(), files = uploads.len(), "multipart form read");
    Ok((form, uploads))
}

async fn list<R: Resource>(
    State(st): State<ResourceState<R>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResponse<ListResult<R::View>> {
    let started = Instant::now();
    let env = st.svc.list(&st.ctx(), &ListQuery::from_pairs(pairs)).await;
    st.finish("list", started, env)
}

async fn get_one<R: Resource>(
    State(st): State<ResourceState<R>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResponse<R::View> {
    let started = Instant::now();
    let env = match path_id(id) {
        Ok(id) => st.svc.get(&st.ctx(), id).await,
        Err(e) => Envelope::failure(e),
    };
    st.finish("get", started, env)
}

async fn create<R: Resource>(
    State(st): State<ResourceState<R>>,
    mp: Result<Multipart, MultipartRejection>,
) -> ApiResponse<R::View> {
    let started = Instant::now();
    let env = match read_form(mp).await {
        Ok((form, uploads)) => st.svc.create(&st.ctx(), &form, uploads).await,
        Err(e) => Envelope::failure(e),
    };
    st.finish("create", started, env)
}

async fn update<R: Resource>(
    State(st): State<ResourceState<R>>,
    id: Result<Path<Uuid>, PathRejection>,
    mp: Result<Multipart, MultipartRejection>,
) -> ApiResponse<R::View> {
    let started = Instant::now();
    let env = match path_id(id) {
        Ok(id) => match read_form(mp).await {
            Ok((form, uploads)) => st.svc.update(&st.ctx(), id, &form, uploads).await,
            Err(e) => Envelope::failure(e),
        },
        Err(e) => Envelope::failure(e),
    };
    st.finish("update", started, env)
}

async fn remove<R: Resource>(
    State(st): State<ResourceState<R>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResponse<()> {
    let started = Instant::now();
    let env = match path_id(id) {
        Ok(id) => st.svc.delete(&st.ctx(), id).await,
        Err(e) => Envelope::failure(e),
    };
    st.finish("delete", started, env)
}
