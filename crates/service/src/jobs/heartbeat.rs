use std::time::Instant;

use async_trait::async_trait;
use tracing::info;

use super::Job;

/// Periodic liveness line in the log.
pub struct HeartbeatJob {
    started: Instant,
}

impl HeartbeatJob {
    pub fn new() -> Self { Self { started: Instant::now() } }
}

impl Default for HeartbeatJob {
    fn default() -> Self { Self::new() }
}

#[async_trait]
impl Job for HeartbeatJob {
    fn name(&self) -> &'static str { "heartbeat" }

    async fn run(&self) -> anyhow::Result<()> {
        info!(uptime_secs = self.started.elapsed().as_secs(), "alive");
        Ok(())
    }
}
