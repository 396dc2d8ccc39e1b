use std::{net::SocketAddr, sync::Arc};

use configs::{AppConfig, ServerConfig, StoreBackend};
use migration::MigratorTrait;
use service::attachments::LocalAttachmentStore;
use service::registry::{Services, Stores};
use service::{runtime, seed};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::errors::StartupError;
use crate::routes;
use crate::state::AppState;

fn bind_addr(cfg: &ServerConfig) -> Result<SocketAddr, StartupError> {
    format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .map_err(|e| StartupError::InvalidConfig(format!("bind address {}:{}: {}", cfg.host, cfg.port, e)))
}

async fn build_stores(cfg: &AppConfig) -> anyhow::Result<Stores> {
    match cfg.database.backend {
        StoreBackend::Memory => {
            info!("using in-memory stores; data is lost on restart");
            Ok(Stores::in_memory())
        }
        StoreBackend::Postgres => {
            let db = models::db::connect_with_config(&cfg.database).await?;
            migration::Migrator::up(&db, None).await?;
            info!("database migrated");
            Ok(Stores::seaorm(db))
        }
    }
}

/// Directories, stores, services and seed data, ready to route.
pub async fn build_state(cfg: AppConfig) -> anyhow::Result<AppState> {
    runtime::ensure_env(&cfg)
        .await
        .map_err(|e| StartupError::Runtime(e.to_string()))?;
    let stores = build_stores(&cfg).await?;
    let attachments = Arc::new(LocalAttachmentStore::new(&cfg.storage.images_dir));
    let services = Services::new(stores, attachments, &cfg);
    seed::seed(&services, &cfg.seed).await?;
    Ok(AppState::new(services, cfg))
}

/// Public entry: build the app and serve until `shutdown` is cancelled.
pub async fn run(shutdown: CancellationToken) -> anyhow::Result<()> {
    let cfg = AppConfig::load_or_env().map_err(|e| StartupError::InvalidConfig(e.to_string()))?;
    let addr = bind_addr(&cfg.server)?;
    let state = build_state(cfg).await?;

    let scheduler = runtime::start_jobs(&state.services, &state.config, shutdown.child_token());
    let app = routes::build_router(state);

    info!(%addr, "starting server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await?;

    scheduler.shutdown().await;
    info!("server stopped");
    Ok(())
}
