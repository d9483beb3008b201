//! Per-session working directories
//!
//! Every session gets `egress/<sessionID>` for its artifacts, a `.workflow`
//! scratch directory for the in-process database and a `.consumed` archive
//! for the input files it processed.

use crate::domain::{OrchError, Result, SessionId};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const EGRESS_DIR: &str = "egress";
pub const IN_PROCESS_DIR: &str = ".workflow";
pub const CONSUMED_DIR: &str = ".consumed";

/// A directory handle that stores content and resolves child paths
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchPath {
    pub home: PathBuf,
}

impl OrchPath {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    pub fn resolved_path(&self, child: impl AsRef<Path>) -> PathBuf {
        self.home.join(child)
    }

    /// Destination for moving `src` into this directory under its own file name
    pub fn moved_path(&self, src: &Path) -> PathBuf {
        match src.file_name() {
            Some(name) => self.home.join(name),
            None => self.home.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowPaths {
    pub ingress_archive: Option<OrchPath>,
    pub in_process: OrchPath,
    pub egress: OrchPath,
}

impl WorkflowPaths {
    /// Paths for `session_id` under `root`, with an archive for consumed files
    pub fn new(root: &Path, session_id: &SessionId) -> Self {
        let egress = root.join(EGRESS_DIR).join(session_id.as_str());
        Self {
            ingress_archive: Some(OrchPath::new(egress.join(CONSUMED_DIR))),
            in_process: OrchPath::new(egress.join(IN_PROCESS_DIR)),
            egress: OrchPath::new(egress),
        }
    }

    /// Consumed files are deleted rather than archived
    pub fn without_archive(mut self) -> Self {
        self.ingress_archive = None;
        self
    }

    pub fn duckdb_path(&self) -> PathBuf {
        self.in_process.resolved_path("ingestion-center.duckdb")
    }

    pub fn diagnostics_json(&self) -> PathBuf {
        self.egress.resolved_path("diagnostics.json")
    }

    pub fn diagnostics_md(&self) -> PathBuf {
        self.egress.resolved_path("diagnostics.md")
    }

    pub fn diagnostics_xlsx(&self) -> PathBuf {
        self.egress.resolved_path("diagnostics.xlsx")
    }

    pub fn resource_db(&self) -> PathBuf {
        self.egress.resolved_path("resource.sqlite.db")
    }

    pub fn fhir_json(&self) -> PathBuf {
        self.egress.resolved_path("fhir.json")
    }

    pub fn fhir_temp_json(&self) -> PathBuf {
        self.in_process.resolved_path("temp-fhir.json")
    }

    pub fn fhir_http(&self) -> PathBuf {
        self.egress.resolved_path("fhir.http")
    }

    pub fn session_log(&self) -> PathBuf {
        self.egress.resolved_path("session.json")
    }

    /// Creates every directory; failure is fatal to the session
    pub async fn initialize_paths(&self) -> Result<()> {
        let mut homes = vec![&self.egress, &self.in_process];
        if let Some(archive) = &self.ingress_archive {
            homes.push(archive);
        }
        for path in homes {
            tokio::fs::create_dir_all(&path.home).await.map_err(|e| {
                OrchError::Session(format!(
                    "Unable to create working directory {}: {e}",
                    path.home.display()
                ))
            })?;
        }
        Ok(())
    }

    /// Extension point run after diagnostics are written
    pub async fn finalize_paths(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths_are_derived_from_session() {
        let sid = SessionId::new("s-1").unwrap();
        let paths = WorkflowPaths::new(Path::new("/sftp/qe"), &sid);
        assert_eq!(paths.egress.home, PathBuf::from("/sftp/qe/egress/s-1"));
        assert_eq!(paths.in_process.home, PathBuf::from("/sftp/qe/egress/s-1/.workflow"));
        assert_eq!(
            paths.ingress_archive.as_ref().unwrap().home,
            PathBuf::from("/sftp/qe/egress/s-1/.consumed")
        );
        assert_eq!(paths.session_log(), PathBuf::from("/sftp/qe/egress/s-1/session.json"));
        assert!(paths.clone().without_archive().ingress_archive.is_none());
    }

    #[tokio::test]
    async fn test_initialize_creates_directories() {
        let dir = TempDir::new().unwrap();
        let sid = SessionId::new("abc").unwrap();
        let paths = WorkflowPaths::new(dir.path(), &sid);
        paths.initialize_paths().await.unwrap();
        assert!(paths.in_process.home.is_dir());
        assert!(paths.ingress_archive.unwrap().home.is_dir());
    }

    #[tokio::test]
    async fn test_initialize_failure_is_session_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("egress");
        std::fs::write(&blocker, "file in the way").unwrap();
        let sid = SessionId::new("abc").unwrap();
        let paths = WorkflowPaths::new(dir.path(), &sid);
        assert!(matches!(paths.initialize_paths().await, Err(OrchError::Session(_))));
    }

    #[test]
    fn test_moved_path_keeps_file_name() {
        let dir = TempDir::new().unwrap();
        let path = OrchPath::new(dir.path());
        assert_eq!(path.resolved_path("x.txt"), dir.path().join("x.txt"));
        assert_eq!(path.moved_path(Path::new("/a/b.csv")), dir.path().join("b.csv"));
    }
}
