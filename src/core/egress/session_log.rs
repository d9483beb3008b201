//! Session start/end log (`session.json`)

use super::consume::ConsumedEntry;
use super::publish::PublishResult;
use crate::core::ingress::IngressSource;
use crate::domain::{OrchError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStart {
    pub ingress_paths: Vec<PathBuf>,
    pub init_at: DateTime<Utc>,
    #[serde(rename = "sessionID")]
    pub session_id: String,
    pub src: IngressSource,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEnd {
    #[serde(flatten)]
    pub start: SessionStart,
    pub consumed: Vec<ConsumedEntry>,
    pub std_errs_encountered: usize,
    pub diagnostics_markdown: Option<PathBuf>,
    pub duck_db: PathBuf,
    pub resource_db: Option<PathBuf>,
    pub reference_data_home: Option<String>,
    #[serde(rename = "publishFhirURL")]
    pub publish_fhir_url: Option<String>,
    pub publish_fhir_result: Vec<PublishResult>,
    pub completed_steps: Vec<String>,
    pub failed_step: Option<String>,
    pub finalize_at: DateTime<Utc>,
}

impl SessionEnd {
    /// Whether every pipeline step completed
    pub fn succeeded(&self) -> bool {
        self.failed_step.is_none()
    }
}

/// Writes `log` as pretty JSON to `path`
pub async fn write_session_log<T: Serialize>(path: &Path, log: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(log)?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| OrchError::Io(format!("Unable to write session log {}: {e}", path.display())))
}

/// Reads a finished session log
pub async fn read_session_end(path: &Path) -> Result<SessionEnd> {
    let json = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&json)?)
}
