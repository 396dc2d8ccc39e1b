use std::sync::Arc;
use std::time::Duration;

use configs::AppConfig;
use service::registry::Services;

/// Shared by every handler; cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<Services>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(services: Services, config: AppConfig) -> Self {
        Self { services: Arc::new(services), config: Arc::new(config) }
    }

    pub fn request_timeout(&self) -> Duration { Duration::from_secs(self.config.server.request_timeout_secs) }
}
