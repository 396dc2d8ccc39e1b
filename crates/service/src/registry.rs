//! Wiring: one place that builds every store and service from config.

use std::sync::Arc;

use configs::AppConfig;
use sea_orm::DatabaseConnection;

use crate::attachments::{AttachmentStore, UploadPolicy};
use crate::auth::AuthService;
use crate::resource::{AttachmentOwner, ResourceService};
use crate::resources::{Car, CarResource, Manufacture, ManufactureResource, Role, RoleResource, User, UserResource};
use crate::storage::seaorm::{SeaOrmCarStore, SeaOrmManufactureStore, SeaOrmRoleStore, SeaOrmUserStore};
use crate::storage::{EntityStore, MemoryStore};

#[derive(Clone)]
pub struct Stores {
    pub cars: Arc<dyn EntityStore<Car>>,
    pub manufactures: Arc<dyn EntityStore<Manufacture>>,
    pub roles: Arc<dyn EntityStore<Role>>,
    pub users: Arc<dyn EntityStore<User>>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            cars: Arc::new(MemoryStore::<Car>::new()),
            manufactures: Arc::new(MemoryStore::<Manufacture>::new()),
            roles: Arc::new(MemoryStore::<Role>::new()),
            users: Arc::new(MemoryStore::<User>::new()),
        }
    }

    pub fn seaorm(db: DatabaseConnection) -> Self {
        Self {
            cars: Arc::new(SeaOrmCarStore::new(db.clone())),
            manufactures: Arc::new(SeaOrmManufactureStore::new(db.clone())),
            roles: Arc::new(SeaOrmRoleStore::new(db.clone())),
            users: Arc::new(SeaOrmUserStore::new(db)),
        }
    }
}

pub struct Services {
    pub cars: ResourceService<CarResource>,
    pub manufactures: ResourceService<ManufactureResource>,
    pub roles: ResourceService<RoleResource>,
    pub users: ResourceService<UserResource>,
    pub auth: Arc<AuthService>,
    pub attachments: Arc<dyn AttachmentStore>,
}

impl Services {
    pub fn new(stores: Stores, attachments: Arc<dyn AttachmentStore>, cfg: &AppConfig) -> Self {
        let policy = UploadPolicy::from_config(&cfg.storage);
        let page = cfg.pagination;
        let Stores { cars, manufactures, roles, users } = stores;
        Self {
            cars: ResourceService::new(
                CarResource::new(manufactures.clone()),
                cars.clone(),
                attachments.clone(),
                policy.clone(),
                page,
            ),
            manufactures: ResourceService::new(
                ManufactureResource::new(manufactures.clone(), cars),
                manufactures,
                attachments.clone(),
                policy.clone(),
                page,
            ),
            roles: ResourceService::new(
                RoleResource::new(roles.clone(), users.clone()),
                roles.clone(),
                attachments.clone(),
                policy.clone(),
                page,
            ),
            users: ResourceService::new(
                UserResource::new(users.clone(), roles.clone()),
                users.clone(),
                attachments.clone(),
                policy,
                page,
            ),
            auth: Arc::new(AuthService::new(users, roles, cfg.auth.clone())),
            attachments,
        }
    }

    /// Resources whose records own files.
    pub fn attachment_owners(&self) -> Vec<Arc<dyn AttachmentOwner>> {
        vec![
            Arc::new(self.cars.clone()) as Arc<dyn AttachmentOwner>,
            Arc::new(self.manufactures.clone()) as Arc<dyn AttachmentOwner>,
            Arc::new(self.users.clone()) as Arc<dyn AttachmentOwner>,
        ]
    }
}
