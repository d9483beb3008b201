//! Run command implementation
//!
//! This module implements the `run` command: relocate a partner's inbound
//! files into an ingress transaction, group or dispatch them, and wait for
//! every spawned session to finish.

use crate::config::{load_config_or_default, OrchConfig};
use crate::core::ingress::{
    prepare_ingress_tx, tx_id_now, GroupCompleteFn, IngressEntry, IngressSource,
    IngressWatcher, ScreeningIngressGroup, ScreeningIngressGroups, WorkflowDispatcher,
    INGRESS_DIR,
};
use crate::core::workflow::{ingress_workflow, WorkflowContext};
use crate::domain::{OrchError, QeId};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

/// Arguments for the run command
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Partner directory name under the SFTP root
    #[arg(long)]
    pub qe: Option<String>,

    /// Override the SFTP root directory
    #[arg(long, value_name = "DIR")]
    pub sftp_root: Option<PathBuf>,

    /// Override the reference data home (directory or URL)
    #[arg(long, value_name = "HOME")]
    pub reference_data_home: Option<String>,

    /// Publish generated FHIR bundles to this endpoint (host and path)
    #[arg(long, value_name = "ENDPOINT")]
    pub publish_fhir: Option<String>,

    /// Processing agent sent with published bundles
    #[arg(long, value_enum, ignore_case = true, value_name = "QE_ID")]
    pub publish_fhir_qe_id: Option<QeId>,

    /// Keep watching the inbound directory until interrupted
    #[arg(long)]
    pub watch: bool,
}

impl RunArgs {
    /// Execute the run command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting run command");

        let mut config = match load_config_or_default(config_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load configuration");
                eprintln!("Failed to load configuration: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        self.apply_overrides(&mut config);

        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(2);
        }

        let Some(qe_root) = config.ingress.qe_root() else {
            eprintln!("No partner configured: set ingress.qe or pass --qe");
            return Ok(2);
        };

        let tx = match prepare_ingress_tx(&qe_root, &tx_id_now()).await {
            Ok(tx) => tx,
            Err(e @ OrchError::Ingress(_)) => {
                tracing::error!(error = %e, "Ingress directory unavailable");
                eprintln!("{e}");
                return Ok(2);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to prepare ingress transaction");
                eprintln!("Failed to prepare ingress transaction: {e}");
                return Ok(5); // Fatal error exit code
            }
        };

        if tx.is_none() && !config.ingress.watch {
            println!("📭 Nothing to process in {}", qe_root.join(INGRESS_DIR).display());
            return Ok(0);
        }

        let ctx = match WorkflowContext::from_config(&config, qe_root.clone()) {
            Ok(ctx) => Arc::new(ctx),
            Err(e) => {
                tracing::error!(error = %e, "Failed to create workflow context");
                eprintln!("Failed to initialize run: {e}");
                return Ok(2);
            }
        };

        let dispatcher = Arc::new(WorkflowDispatcher::new());
        let on_complete: GroupCompleteFn = {
            let dispatcher = Arc::clone(&dispatcher);
            let ctx = Arc::clone(&ctx);
            Arc::new(move |group: ScreeningIngressGroup| {
                dispatch(&dispatcher, &ctx, IngressSource::Group(group));
            })
        };
        let groups = ScreeningIngressGroups::with_group_size(config.ingress.group_size, on_complete);

        println!("🚀 Processing ingress for {}", qe_root.display());

        if let Some(tx) = &tx {
            println!(
                "   Transaction {} ({} files)",
                tx.tx_id,
                tx.observability.ingress_entries.len()
            );
            let watcher = IngressWatcher::new(&tx.tx_path, config.ingress.poll_interval());
            let entries = match watcher.drain().await {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::error!(error = %e, tx_path = %tx.tx_path.display(), "Failed to read ingress transaction");
                    eprintln!("Failed to read ingress transaction: {e}");
                    return Ok(5);
                }
            };

            let mut standalone = Vec::new();
            for entry in entries {
                if groups.potential(entry.clone()).is_none() {
                    standalone.push(entry);
                }
            }

            if config.ingress.watch {
                for entry in standalone {
                    dispatch(&dispatcher, &ctx, IngressSource::Entry(entry));
                }
            } else if !standalone.is_empty() {
                dispatch(&dispatcher, &ctx, IngressSource::Entries(standalone));
            }
        }

        if config.ingress.watch {
            println!("👀 Watching for new arrivals (Ctrl+C to stop)");
            let watcher = IngressWatcher::new(qe_root.join(INGRESS_DIR), config.ingress.poll_interval());
            let arrive = |entry: IngressEntry| {
                if groups.potential(entry.clone()).is_none() {
                    dispatch(&dispatcher, &ctx, IngressSource::Entry(entry));
                }
            };
            if let Err(e) = watcher.watch(shutdown_signal, arrive).await {
                tracing::error!(error = %e, "Ingress watch failed");
                eprintln!("Ingress watch failed: {e}");
            }
        }

        // members already moved into the transaction would never be seen again
        let flushed = match &tx {
            Some(tx) => groups.take_pending(|group| {
                group.entries.iter().any(|e| e.path().starts_with(&tx.tx_path))
            }),
            None => Vec::new(),
        };
        let flushed_count = flushed.len();
        for group in flushed {
            tracing::warn!(
                group_id = %group.group_id,
                members = group.entries.len(),
                expected = config.ingress.group_size,
                "Processing incomplete ingress group"
            );
            dispatch(&dispatcher, &ctx, IngressSource::Group(group));
        }

        dispatcher.wait_all().await;

        let pending = groups.pending();
        for group in &pending {
            tracing::warn!(
                group_id = %group.group_id,
                members = group.entries.len(),
                expected = config.ingress.group_size,
                "Ingress group incomplete at end of run; members left for the next run"
            );
        }

        println!();
        println!("📊 Run Summary:");
        println!("  Sessions: {}", dispatcher.spawned());
        println!("  Failed or halted: {}", dispatcher.failures());
        println!("  Incomplete groups processed: {flushed_count}");
        println!("  Incomplete groups left in ingress: {}", pending.len());
        println!("  Egress: {}", qe_root.join(crate::core::session::EGRESS_DIR).display());
        println!();

        let exit_code = if dispatcher.failures() > 0 { 1 } else { 0 };
        tracing::info!(exit_code, sessions = dispatcher.spawned(), "Run finished");
        Ok(exit_code)
    }

    /// Applies command-line overrides on top of the loaded configuration
    pub fn apply_overrides(&self, config: &mut OrchConfig) {
        if let Some(qe) = &self.qe {
            tracing::info!(qe = %qe, "Overriding partner from CLI");
            config.ingress.qe = Some(qe.clone());
        }
        if let Some(root) = &self.sftp_root {
            config.ingress.sftp_root = root.clone();
        }
        if let Some(home) = &self.reference_data_home {
            config.ingress.reference_data_home = home.clone();
        }
        if let Some(endpoint) = &self.publish_fhir {
            config.publish.fhir_endpoint = Some(endpoint.clone());
        }
        if let Some(qe_id) = self.publish_fhir_qe_id {
            config.publish.qe_id = qe_id;
        }
        if self.watch {
            config.ingress.watch = true;
        }
    }
}

/// Spawns one workflow for `src`; a halted session counts as a failure
fn dispatch(dispatcher: &WorkflowDispatcher, ctx: &Arc<WorkflowContext>, src: IngressSource) {
    let ctx = Arc::clone(ctx);
    dispatcher.spawn(src.label(), async move {
        let end = ingress_workflow(ctx, src).await?;
        match &end.failed_step {
            Some(step) => Err(OrchError::step(
                step.clone(),
                format!("session {} halted", end.start.session_id),
            )),
            None => Ok(()),
        }
    });
}
