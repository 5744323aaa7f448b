// Module: Checkpoints
// Visual-checkpoint collaborator. Stores step-tagged screenshots for
// post-hoc operator review; nothing in the run ever reads them back.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

/// Stores one image artifact per checkpoint. Implementations must be
/// fire-and-forget from the executor's point of view: errors are reported
/// through the `Result` but the executor only logs them.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    async fn record(
        &self,
        step_id: &str,
        taken_at: DateTime<Utc>,
        png: &[u8],
    ) -> std::io::Result<()>;
}

/// Writes checkpoints as `{YYYYmmdd_HHMMSS}_{step}.png` under an
/// operator-visible directory, creating it on first use.
pub struct FsCheckpointer {
    dir: PathBuf,
}

impl FsCheckpointer {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

#[async_trait]
impl Checkpointer for FsCheckpointer {
    async fn record(
        &self,
        step_id: &str,
        taken_at: DateTime<Utc>,
        png: &[u8],
    ) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let name = format!("{}_{}.png", taken_at.format("%Y%m%d_%H%M%S"), step_id);
        let path = self.dir.join(name);
        tokio::fs::write(&path, png).await?;
        info!(path = %path.display(), "checkpoint saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_step_tagged_png() {
        let dir = std::env::temp_dir().join(format!("checkpoints-{}", uuid::Uuid::new_v4()));
        let checkpointer = FsCheckpointer::new(dir.clone());
        let taken_at = Utc::now();

        checkpointer
            .record("open-cart", taken_at, &[0x89, b'P', b'N', b'G'])
            .await
            .unwrap();

        let mut entries = tokio::fs::read_dir(&dir).await.unwrap();
        let entry = entries.next_entry().await.unwrap().unwrap();
        let name = entry.file_name().into_string().unwrap();
        assert!(name.ends_with("_open-cart.png"), "got {name}");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
