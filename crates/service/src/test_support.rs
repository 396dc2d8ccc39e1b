#![cfg(test)]
//! Fixtures shared by the service tests: in-memory stores, a throwaway
//! attachment directory, and a store wrapper that fails on demand.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use configs::{AppConfig, AuthConfig, DatabaseConfig};
use migration::MigratorTrait;
use sea_orm::DatabaseConnection;
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::attachments::{LocalAttachmentStore, Upload};
use crate::context::OpContext;
use crate::form::FormFields;
use crate::query::Filter;
use crate::registry::{Services, Stores};
use crate::storage::{Entity, EntityStore, MemoryStore, StoreError};

pub use crate::resources::{Car, Manufacture, Role, User};

pub fn auth_config() -> AuthConfig {
    AuthConfig { jwt_secret: "test-secret-0123456789".into(), ..AuthConfig::default() }
}

pub fn test_config() -> AppConfig {
    AppConfig { auth: auth_config(), ..AppConfig::default() }
}

pub async fn temp_dir(prefix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("{}_{}", prefix, Uuid::new_v4().simple()));
    tokio::fs::create_dir_all(&dir).await.expect("create temp dir");
    dir
}

pub fn png(field: &str, name: &str, bytes: &[u8]) -> Upload {
    Upload::new(field, name, bytes.to_vec())
}

pub fn car_form(model: &str, year: i32) -> FormFields {
    FormFields::new()
        .with("brand", "Brand")
        .with("model", model)
        .with("year", year.to_string())
        .with("price", "45999.5")
}

pub fn user_form(email: &str) -> FormFields {
    FormFields::new().with("email", email).with("password", "secret1")
}

/// `n` cars with strictly increasing creation times.
pub fn cars(n: usize) -> Vec<Car> {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            let at = base + Duration::seconds(i as i64);
            Car {
                id: Uuid::new_v4(),
                brand: format!("brand-{i}"),
                model: format!("model-{i}"),
                year: 2000 + i as i32,
                price: 1000.0 * i as f64,
                color: "black".into(),
                gearbox: "manual".into(),
                manufacture_id: None,
                images: Vec::new(),
                created_at: at,
                updated_at: at,
            }
        })
        .collect()
}

#[derive(Default)]
pub struct Faults {
    insert: AtomicBool,
    update: AtomicBool,
}

impl Faults {
    pub fn fail_insert(&self, on: bool) { self.insert.store(on, Ordering::SeqCst); }
    pub fn fail_update(&self, on: bool) { self.update.store(on, Ordering::SeqCst); }
}

/// Delegates to `inner` unless a fault is switched on.
pub struct FaultyStore<E: Entity> {
    inner: Arc<dyn EntityStore<E>>,
    faults: Arc<Faults>,
}

#[async_trait]
impl<E: Entity> EntityStore<E> for FaultyStore<E> {
    async fn get(&self, id: Uuid) -> Result<E, StoreError> { self.inner.get(id).await }

    async fn list(&self, filter: &Filter) -> Result<Vec<E>, StoreError> { self.inner.list(filter).await }

    async fn insert(&self, entity: E) -> Result<E, StoreError> {
        if self.faults.insert.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected insert failure".into()));
        }
        self.inner.insert(entity).await
    }

    async fn update(&self, id: Uuid, patch: &E::Patch) -> Result<E, StoreError> {
        if self.faults.update.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected update failure".into()));
        }
        self.inner.update(id, patch).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> { self.inner.delete(id).await }
}

fn faulty<E: Entity>(inner: Arc<MemoryStore<E>>, faults: &Arc<Faults>) -> Arc<dyn EntityStore<E>> {
    Arc::new(FaultyStore { inner, faults: faults.clone() })
}

pub struct MemoryStores {
    pub cars: Arc<MemoryStore<Car>>,
    pub manufactures: Arc<MemoryStore<Manufacture>>,
    pub roles: Arc<MemoryStore<Role>>,
    pub users: Arc<MemoryStore<User>>,
}

pub struct Fixture {
    pub services: Services,
    pub stores: MemoryStores,
    pub attachments: Arc<LocalAttachmentStore>,
    pub faults: Arc<Faults>,
    dir: PathBuf,
}

impl Fixture {
    /// In-memory services with the `admin` and `user` roles present.
    pub async fn new() -> Self { Self::build(false, true).await }

    /// Like [`Fixture::new`], with every store behind [`FaultyStore`].
    pub async fn faulty() -> Self { Self::build(true, true).await }

    /// No roles seeded.
    pub async fn empty() -> Self { Self::build(false, false).await }

    async fn build(with_faults: bool, with_roles: bool) -> Self {
        let dir = temp_dir("svc_fixture").await;
        let attachments = Arc::new(LocalAttachmentStore::new(&dir));
        let stores = MemoryStores {
            cars: Arc::new(MemoryStore::new()),
            manufactures: Arc::new(MemoryStore::new()),
            roles: Arc::new(MemoryStore::new()),
            users: Arc::new(MemoryStore::new()),
        };
        if with_roles {
            for name in ["admin", "user"] {
                stores.roles.insert(Role::new(name)).await.expect("seed role");
            }
        }
        let faults = Arc::new(Faults::default());
        let wiring = if with_faults {
            Stores {
                cars: faulty(stores.cars.clone(), &faults),
                manufactures: faulty(stores.manufactures.clone(), &faults),
                roles: faulty(stores.roles.clone(), &faults),
                users: faulty(stores.users.clone(), &faults),
            }
        } else {
            Stores {
                cars: stores.cars.clone(),
                manufactures: stores.manufactures.clone(),
                roles: stores.roles.clone(),
                users: stores.users.clone(),
            }
        };
        let services = Services::new(wiring, attachments.clone(), &test_config());
        Self { services, stores, attachments, faults, dir }
    }

    pub async fn manufacture(&self, name: &str) -> Manufacture {
        let env = self
            .services
            .manufactures
            .create(&OpContext::new(), &FormFields::new().with("name", name), Vec::new())
            .await;
        env.payload.unwrap_or_else(|| panic!("create manufacture {name}: {:?}", env.message))
    }

    pub async fn cleanup(self) {
        let _ = tokio::fs::remove_dir_all(&self.dir).await;
    }
}

pub fn db_tests_enabled() -> bool {
    std::env::var("SKIP_DB_TESTS").is_err() && std::env::var("DATABASE_URL").is_ok()
}

// Ensure migrations run only once across the entire test process
static MIGRATED: OnceCell<()> = OnceCell::const_new();

pub async fn get_db() -> Result<DatabaseConnection, anyhow::Error> {
    MIGRATED
        .get_or_init(|| async {
            let cfg = DatabaseConfig::from_env();
            let db = models::db::connect_with_config(&cfg).await.expect("connect db for migration");
            migration::Migrator::up(&db, None).await.expect("migrate up");
            drop(db);
        })
        .await;

    let mut cfg = DatabaseConfig::from_env();
    cfg.max_connections = cfg.max_connections.max(20);
    cfg.min_connections = cfg.min_connections.min(1);
    cfg.acquire_timeout_secs = 10;
    models::db::connect_with_config(&cfg).await
}
