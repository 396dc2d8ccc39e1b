//! Per-operation cancellation and deadline.
//!
//! Every resource operation receives an [`OpContext`]. Reads are raced
//! against cancellation and the deadline through [`OpContext::run`]. Writes
//! only check the context before they start: a store write or file rename
//! that has begun runs to completion, so a cancelled request never leaves a
//! half-applied change behind.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::errors::ServiceError;

#[derive(Debug, Clone, Default)]
pub struct OpContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl OpContext {
    pub fn new() -> Self { Self::default() }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { cancel: CancellationToken::new(), deadline: Some(Instant::now() + timeout) }
    }

    /// Tie this context to an outer token (e.g. server shutdown).
    pub fn with_parent(mut self, parent: &CancellationToken) -> Self {
        self.cancel = parent.child_token();
        self
    }

    pub fn cancel(&self) { self.cancel.cancel(); }

    pub fn token(&self) -> &CancellationToken { &self.cancel }

    pub fn deadline(&self) -> Option<Instant> { self.deadline }

    /// Fail fast when the operation should not start.
    pub fn check(&self) -> Result<(), ServiceError> {
        if self.cancel.is_cancelled() {
            return Err(ServiceError::Cancelled);
        }
        if matches!(self.deadline, Some(d) if Instant::now() >= d) {
            return Err(ServiceError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Run `fut` unless cancellation or the deadline wins first.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, ServiceError>>,
    {
        self.check()?;
        let bounded = async {
            match self.deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, fut)
                    .await
                    .map_err(|_| ServiceError::DeadlineExceeded)?,
                None => fut.await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ServiceError::Cancelled),
            res = bounded => res,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_passes_through_results() {
        let ctx = OpContext::new();
        assert_eq!(ctx.run(async { Ok::<_, ServiceError>(7) }).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn cancelled_context_short_circuits() {
        let ctx = OpContext::new();
        ctx.cancel();
        assert!(matches!(ctx.check(), Err(ServiceError::Cancelled)));
        let res = ctx.run(async { Ok::<_, ServiceError>(()) }).await;
        assert!(matches!(res, Err(ServiceError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_interrupts_slow_reads() {
        let ctx = OpContext::with_timeout(Duration::from_millis(50));
        let res = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, ServiceError>(())
            })
            .await;
        assert!(matches!(res, Err(ServiceError::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn parent_cancellation_propagates() {
        let parent = CancellationToken::new();
        let ctx = OpContext::new().with_parent(&parent);
        parent.cancel();
        assert!(matches!(ctx.check(), Err(ServiceError::Cancelled)));
    }
}
