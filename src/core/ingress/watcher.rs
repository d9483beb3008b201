//! Ingress directory watcher
//!
//! Polls the ingress directory and reports each new file once its size has
//! been stable across two consecutive polls, so partially uploaded files are
//! never dispatched.

use super::entry::IngressEntry;
use super::transaction::OBSERVABILITY_FILE;
use crate::domain::{OrchError, Result};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct IngressWatcher {
    root: PathBuf,
    poll_interval: Duration,
}

impl IngressWatcher {
    pub fn new(root: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            root: root.into(),
            poll_interval,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Files currently in the root directory with their sizes, sorted by path
    pub async fn scan(&self) -> Result<Vec<(PathBuf, u64)>> {
        let mut dir = tokio::fs::read_dir(&self.root).await.map_err(|e| {
            OrchError::Ingress(format!(
                "Unable to read ingress directory {}: {e}",
                self.root.display()
            ))
        })?;

        let mut files = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() || entry.file_name() == OBSERVABILITY_FILE {
                continue;
            }
            files.push((entry.path(), metadata.len()));
        }
        files.sort();
        Ok(files)
    }

    /// Every file present now, as entries
    pub async fn drain(&self) -> Result<Vec<IngressEntry>> {
        Ok(self
            .scan()
            .await?
            .into_iter()
            .map(|(path, _)| IngressEntry::new(path))
            .collect())
    }

    /// Polls until `shutdown` flips to `true`, handing each settled arrival to `on_ingress`
    pub async fn watch<F>(&self, mut shutdown: watch::Receiver<bool>, mut on_ingress: F) -> Result<()>
    where
        F: FnMut(IngressEntry),
    {
        tracing::info!(
            root = %self.root.display(),
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Watching ingress directory"
        );

        let mut last_sizes: HashMap<PathBuf, u64> = HashMap::new();
        let mut emitted: HashSet<PathBuf> = HashSet::new();

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.scan().await {
                Ok(files) => {
                    let mut sizes = HashMap::with_capacity(files.len());
                    for (path, size) in files {
                        if !emitted.contains(&path) && last_sizes.get(&path) == Some(&size) {
                            emitted.insert(path.clone());
                            tracing::debug!(fs_path = %path.display(), size, "Ingress entry settled");
                            on_ingress(IngressEntry::new(path.clone()));
                        }
                        sizes.insert(path, size);
                    }
                    // forget removed files so a re-upload is seen again
                    emitted.retain(|p| sizes.contains_key(p));
                    last_sizes = sizes;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Ingress scan failed");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!(root = %self.root.display(), "Stopped watching ingress directory");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_scan_skips_directories_and_observability() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join(OBSERVABILITY_FILE), "{}").unwrap();
        std::fs::write(dir.path().join("b.csv"), "bb").unwrap();
        std::fs::write(dir.path().join("a.csv"), "a").unwrap();

        let watcher = IngressWatcher::new(dir.path(), Duration::from_millis(10));
        let files = watcher.scan().await.unwrap();
        assert_eq!(
            files,
            vec![(dir.path().join("a.csv"), 1), (dir.path().join("b.csv"), 2)]
        );
    }

    #[tokio::test]
    async fn test_scan_missing_directory_is_ingress_error() {
        let watcher = IngressWatcher::new("/definitely/not/here", Duration::from_millis(10));
        assert!(matches!(watcher.scan().await, Err(OrchError::Ingress(_))));
    }
}
