//! Background jobs on fixed intervals.
//!
//! Jobs report failures with `anyhow`; a failing run is logged and the next
//! tick runs again. Jobs never share the resource error taxonomy.

pub mod heartbeat;
pub mod log_cleanup;
pub mod orphan_sweep;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub use heartbeat::HeartbeatJob;
pub use log_cleanup::LogCleanupJob;
pub use orphan_sweep::OrphanSweepJob;

#[async_trait]
pub trait Job: Send + Sync + 'static {
    fn name(&self) -> &'static str;
    async fn run(&self) -> anyhow::Result<()>;
}

pub struct Scheduler {
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(shutdown: CancellationToken) -> Self { Self { shutdown, handles: Vec::new() } }

    pub fn job_count(&self) -> usize { self.handles.len() }

    /// First run happens one `period` from now; a zero period disables the job.
    pub fn spawn(&mut self, job: Arc<dyn Job>, period: Duration) {
        if period.is_zero() {
            info!(job = job.name(), "job disabled");
            return;
        }
        let shutdown = self.shutdown.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(job = job.name(), period_secs = period.as_secs(), "job scheduled");
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        match job.run().await {
                            Ok(()) => debug!(job = job.name(), "job run finished"),
                            Err(e) => error!(job = job.name(), error = %e, "job run failed"),
                        }
                    }
                }
            }
            debug!(job = job.name(), "job stopped");
        });
        self.handles.push(handle);
    }

    /// Cancel every job and wait for in-flight runs to end.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for h in self.handles {
            let _ = h.await;
        }
    }
}
