//! Ingress transactions
//!
//! Before processing, a partner's inbound directory is moved wholesale into
//! `ingress-tx/<txID>` and recreated empty, so files arriving mid-run land in
//! the next batch. An `observability.json` record with per-file SHA-256
//! digests is written into the transaction directory.

use crate::domain::{OrchError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

pub const INGRESS_DIR: &str = "ingress";
pub const INGRESS_TX_DIR: &str = "ingress-tx";
pub const OBSERVABILITY_FILE: &str = "observability.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressTxEntry {
    pub name: String,
    pub size: u64,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressObservability {
    pub ingress_prepare_tx_start: DateTime<Utc>,
    pub sftp_src_path: PathBuf,
    pub ingress_tx_path: PathBuf,
    pub ingress_prepare_tx_end: DateTime<Utc>,
    pub pid: u32,
    pub ingress_entries: Vec<IngressTxEntry>,
}

/// A relocated batch of inbound files
#[derive(Debug, Clone)]
pub struct IngressTransaction {
    pub tx_id: String,
    pub tx_path: PathBuf,
    pub observability: IngressObservability,
}

/// Transaction ID from the current UTC time
pub fn tx_id_now() -> String {
    Utc::now().format("%Y%m%dT%H%M%S%.3fZ").to_string()
}

/// Hex SHA-256 of a file's contents
pub async fn sha256_file(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

async fn is_empty_dir(path: &Path) -> Result<bool> {
    let mut dir = tokio::fs::read_dir(path).await?;
    Ok(dir.next_entry().await?.is_none())
}

async fn copy_dir(src: &Path, dest: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dest).await?;
    let mut dir = tokio::fs::read_dir(src).await?;
    while let Some(entry) = dir.next_entry().await? {
        let target = dest.join(entry.file_name());
        if entry.file_type().await?.is_dir() {
            Box::pin(copy_dir(&entry.path(), &target)).await?;
        } else {
            tokio::fs::copy(entry.path(), &target).await?;
        }
    }
    Ok(())
}

/// Moves `<qe_root>/ingress` to `<qe_root>/ingress-tx/<tx_id>`
///
/// Returns `None` when the inbound directory is empty. A missing inbound
/// directory is an error.
pub async fn prepare_ingress_tx(qe_root: &Path, tx_id: &str) -> Result<Option<IngressTransaction>> {
    let started = Utc::now();
    let ingress = qe_root.join(INGRESS_DIR);

    if !tokio::fs::try_exists(&ingress).await.unwrap_or(false) {
        return Err(OrchError::Ingress(format!(
            "Ingress directory not found: {}",
            ingress.display()
        )));
    }
    if is_empty_dir(&ingress).await? {
        tracing::info!(ingress = %ingress.display(), "Ingress directory is empty");
        return Ok(None);
    }

    let tx_root = qe_root.join(INGRESS_TX_DIR);
    tokio::fs::create_dir_all(&tx_root).await?;
    let tx_path = tx_root.join(tx_id);

    if let Err(e) = tokio::fs::rename(&ingress, &tx_path).await {
        tracing::debug!(error = %e, "Rename failed, falling back to copy");
        copy_dir(&ingress, &tx_path).await?;
        tokio::fs::remove_dir_all(&ingress).await?;
    }
    tokio::fs::create_dir_all(&ingress).await?;

    let mut entries = Vec::new();
    let mut dir = tokio::fs::read_dir(&tx_path).await?;
    while let Some(entry) = dir.next_entry().await? {
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        entries.push(IngressTxEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            size: metadata.len(),
            sha256: sha256_file(&entry.path()).await?,
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    let observability = IngressObservability {
        ingress_prepare_tx_start: started,
        sftp_src_path: ingress,
        ingress_tx_path: tx_path.clone(),
        ingress_prepare_tx_end: Utc::now(),
        pid: std::process::id(),
        ingress_entries: entries,
    };
    let json = serde_json::to_string_pretty(&observability)?;
    tokio::fs::write(tx_path.join(OBSERVABILITY_FILE), json).await?;

    tracing::info!(
        tx_id = %tx_id,
        tx_path = %tx_path.display(),
        entries = observability.ingress_entries.len(),
        "Ingress transaction prepared"
    );

    Ok(Some(IngressTransaction {
        tx_id: tx_id.to_string(),
        tx_path,
        observability,
    }))
}
