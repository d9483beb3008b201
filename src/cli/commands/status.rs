//! Status command implementation
//!
//! This module implements the `status` command for listing finished
//! sessions from their `session.json` logs.

use crate::config::load_config_or_default;
use crate::core::egress::{read_session_end, SessionEnd};
use crate::core::session::EGRESS_DIR;
use clap::Args;
use std::path::{Path, PathBuf};

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Partner directory name under the SFTP root
    #[arg(long)]
    pub qe: Option<String>,

    /// Show at most this many sessions, newest first
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking session status");

        println!("📊 Session Status");
        println!();

        let mut config = match load_config_or_default(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {}", e);
                return Ok(2); // Configuration error exit code
            }
        };
        if let Some(qe) = &self.qe {
            config.ingress.qe = Some(qe.clone());
        }

        let Some(qe_root) = config.ingress.qe_root() else {
            println!("❌ No partner configured: set ingress.qe or pass --qe");
            return Ok(2);
        };

        let egress = qe_root.join(EGRESS_DIR);
        let mut sessions = match collect_sessions(&egress).await {
            Ok(s) => s,
            Err(e) => {
                println!("❌ Failed to read {}", egress.display());
                println!("   Error: {}", e);
                return Ok(5); // Fatal error exit code
            }
        };

        if sessions.is_empty() {
            println!("No sessions found in {}", egress.display());
            return Ok(0);
        }

        sessions.sort_by(|a, b| b.start.init_at.cmp(&a.start.init_at));
        let total = sessions.len();
        let halted = sessions.iter().filter(|s| !s.succeeded()).count();

        for session in sessions.iter().take(self.limit) {
            let outcome = match &session.failed_step {
                Some(step) => format!("❌ halted at {step}"),
                None if session.std_errs_encountered > 0 => {
                    format!("⚠️  completed with {} SQL errors", session.std_errs_encountered)
                }
                None => "✅ completed".to_string(),
            };
            println!("Session: {}", session.start.session_id);
            println!("  Started: {}", session.start.init_at.to_rfc3339());
            println!("  Finished: {}", session.finalize_at.to_rfc3339());
            println!("  Files: {}", session.start.ingress_paths.len());
            println!("  Outcome: {outcome}");
            if !session.publish_fhir_result.is_empty() {
                let valid = session
                    .publish_fhir_result
                    .iter()
                    .filter(|r| r.fhir_json_struct_valid)
                    .count();
                println!(
                    "  FHIR published: {}/{}",
                    valid,
                    session.publish_fhir_result.len()
                );
            }
            if let Some(md) = &session.diagnostics_markdown {
                println!("  Diagnostics: {}", md.display());
            }
            println!();
        }

        println!("Total: {total} sessions, {halted} halted");
        Ok(0)
    }
}

/// Reads `<egress>/*/session.json`, skipping sessions still in progress
async fn collect_sessions(egress: &Path) -> crate::domain::Result<Vec<SessionEnd>> {
    let mut sessions = Vec::new();
    if !tokio::fs::try_exists(egress).await.unwrap_or(false) {
        return Ok(sessions);
    }

    let mut dirs = tokio::fs::read_dir(egress).await?;
    while let Some(entry) = dirs.next_entry().await? {
        let log: PathBuf = entry.path().join("session.json");
        if !tokio::fs::try_exists(&log).await.unwrap_or(false) {
            continue;
        }
        match read_session_end(&log).await {
            Ok(end) => sessions.push(end),
            Err(e) => tracing::debug!(path = %log.display(), error = %e, "Skipping unfinished session log"),
        }
    }
    Ok(sessions)
}
