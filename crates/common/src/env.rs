//! Environment/runtime helpers
//!
//! Sanity checks to ensure expected directories exist at startup.

use tracing::warn;

/// Ensure the content directories exist, creating them when missing.
/// `log_dir` is optional: when it cannot be created we only warn, since
/// logging goes to stdout regardless.
pub async fn ensure_env(images_dir: &str, log_dir: Option<&str>) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(images_dir)
        .await
        .map_err(|e| anyhow::anyhow!("cannot create {images_dir}: {e}"))?;
    if let Some(dir) = log_dir {
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            warn!(%dir, error = %e, "log directory unavailable; log cleanup will be a no-op");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_missing_directories() -> anyhow::Result<()> {
        let root = std::env::temp_dir().join(format!("ensure_env_{}", uuid::Uuid::new_v4()));
        let images = root.join("images");
        let logs = root.join("logs");
        ensure_env(images.to_str().unwrap(), logs.to_str()).await?;
        assert!(tokio::fs::metadata(&images).await?.is_dir());
        assert!(tokio::fs::metadata(&logs).await?.is_dir());
        let _ = tokio::fs::remove_dir_all(&root).await;
        Ok(())
    }
}
