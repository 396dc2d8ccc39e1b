use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tracing::{info, warn};

use super::Job;
use crate::attachments::{AttachmentRef, AttachmentStore};
use crate::resource::AttachmentOwner;

/// Removes stored files no record references.
///
/// References are read before the directory is listed, and files younger
/// than `grace` are skipped, so an upload whose record is still being
/// written is never taken.
pub struct OrphanSweepJob {
    attachments: Arc<dyn AttachmentStore>,
    owners: Vec<Arc<dyn AttachmentOwner>>,
    grace: Duration,
}

impl OrphanSweepJob {
    pub fn new(attachments: Arc<dyn AttachmentStore>, owners: Vec<Arc<dyn AttachmentOwner>>, grace: Duration) -> Self {
        Self { attachments, owners, grace }
    }

    pub async fn sweep(&self) -> anyhow::Result<Vec<AttachmentRef>> {
        let mut referenced = HashSet::new();
        for owner in &self.owners {
            let refs = owner
                .referenced_attachments()
                .await
                .map_err(|e| anyhow::anyhow!("{}: {}", owner.owner_name(), e))?;
            referenced.extend(refs);
        }
        let cutoff = SystemTime::now().checked_sub(self.grace).unwrap_or(SystemTime::UNIX_EPOCH);
        let mut removed = Vec::new();
        for file in self.attachments.list().await? {
            if referenced.contains(&file.reference) || file.modified > cutoff {
                continue;
            }
            match self.attachments.delete(&file.reference).await {
                Ok(true) => removed.push(file.reference),
                Ok(false) => {}
                Err(e) => warn!(reference = %file.reference, error = %e, "orphan removal failed"),
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl Job for OrphanSweepJob {
    fn name(&self) -> &'static str { "orphan_sweep" }

    async fn run(&self) -> anyhow::Result<()> {
        let removed = self.sweep().await?;
        info!(removed = removed.len(), "orphan sweep finished");
        Ok(())
    }
}
