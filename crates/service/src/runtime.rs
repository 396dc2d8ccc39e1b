//! Runtime environment helpers
//!
//! Directory checks and background job startup, so binary crates only
//! depend on `service`.

use std::sync::Arc;
use std::time::Duration;

use configs::AppConfig;
use tokio_util::sync::CancellationToken;

use crate::jobs::{HeartbeatJob, LogCleanupJob, OrphanSweepJob, Scheduler};
use crate::registry::Services;

/// Ensure the images and log directories exist.
pub async fn ensure_env(cfg: &AppConfig) -> anyhow::Result<()> {
    common::env::ensure_env(&cfg.storage.images_dir, Some(cfg.jobs.log_dir.as_str())).await
}

/// Start every configured job; they stop when `shutdown` is cancelled.
pub fn start_jobs(services: &Services, cfg: &AppConfig, shutdown: CancellationToken) -> Scheduler {
    let jobs = &cfg.jobs;
    let mut scheduler = Scheduler::new(shutdown);
    scheduler.spawn(Arc::new(HeartbeatJob::new()), Duration::from_secs(jobs.heartbeat_secs));
    scheduler.spawn(
        Arc::new(LogCleanupJob::new(&jobs.log_dir, jobs.log_retention())),
        Duration::from_secs(jobs.log_cleanup_secs),
    );
    scheduler.spawn(
        Arc::new(OrphanSweepJob::new(
            services.attachments.clone(),
            services.attachment_owners(),
            Duration::from_secs(jobs.orphan_grace_secs),
        )),
        Duration::from_secs(jobs.orphan_sweep_secs),
    );
    scheduler
}
