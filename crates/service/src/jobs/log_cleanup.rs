use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::fs;
use tracing::{info, warn};

use super::Job;

/// Deletes regular files in `dir` last modified before the retention window.
pub struct LogCleanupJob {
    dir: PathBuf,
    retention: Duration,
}

impl LogCleanupJob {
    pub fn new(dir: impl Into<PathBuf>, retention: Duration) -> Self { Self { dir: dir.into(), retention } }

    pub async fn sweep(&self) -> anyhow::Result<usize> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let cutoff = SystemTime::now().checked_sub(self.retention).unwrap_or(SystemTime::UNIX_EPOCH);
        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if !meta.is_file() || meta.modified()? > cutoff {
                continue;
            }
            match fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %entry.path().display(), error = %e, "could not remove old log"),
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl Job for LogCleanupJob {
    fn name(&self) -> &'static str { "log_cleanup" }

    async fn run(&self) -> anyhow::Result<()> {
        let removed = self.sweep().await?;
        info!(dir = %self.dir.display(), removed, "log cleanup finished");
        Ok(())
    }
}
