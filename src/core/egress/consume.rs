//! Disposal of consumed ingress files

use crate::core::session::OrchPath;
use crate::domain::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsumeActivity {
    Move,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumedEntry {
    pub activity: ConsumeActivity,
    pub fs_path: PathBuf,
}

/// Moves `path` into `archive`, or deletes it when there is no archive
pub async fn consume_ingressed(path: &Path, archive: Option<&OrchPath>) -> Result<ConsumedEntry> {
    let Some(archive) = archive else {
        tokio::fs::remove_file(path).await?;
        tracing::debug!(fs_path = %path.display(), "Consumed entry deleted");
        return Ok(ConsumedEntry {
            activity: ConsumeActivity::Delete,
            fs_path: path.to_path_buf(),
        });
    };

    let target = archive.moved_path(path);
    if tokio::fs::rename(path, &target).await.is_err() {
        // rename fails across filesystems
        tokio::fs::copy(path, &target).await?;
        tokio::fs::remove_file(path).await?;
    }
    tracing::debug!(fs_path = %path.display(), target = %target.display(), "Consumed entry archived");
    Ok(ConsumedEntry {
        activity: ConsumeActivity::Move,
        fs_path: path.to_path_buf(),
    })
}
