//! Core orchestration logic.
//!
//! # Modules
//!
//! - [`ingress`] - Ingress transactions, directory watching, grouping and dispatch
//! - [`session`] - Sessions and their working directories
//! - [`sources`] - Resolution of ingress paths into typed ingest sources
//! - [`sql`] - SQL text for admin tables, views and literals
//! - [`engine`] - The step engine and execution shell
//! - [`egress`] - Session logs, consumed-file disposal and FHIR publishing
//! - [`workflow`] - One workflow invocation end to end
//!
//! # Workflow
//!
//! 1. **Ingress**: files are moved into a transaction and grouped or dispatched
//! 2. **prepareInit / init**: working directories and admin tables
//! 3. **ingest**: structural load of every source, issues read back
//! 4. **ensureContent**: content validation of issue-free sources
//! 5. **emitResources**: resource store export and views
//! 6. **emitDiagnostics**: diagnostics artifacts, always
//! 7. **Egress**: consumed files archived, bundles published, session log written
//!
//! # Example
//!
//! ```rust,no_run
//! use hrsn_orch::config::load_config;
//! use hrsn_orch::core::ingress::{IngressEntry, IngressSource};
//! use hrsn_orch::core::workflow::{ingress_workflow, WorkflowContext};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("orchctl.toml")?;
//! let root = config.ingress.qe_root().unwrap_or_else(|| config.ingress.sftp_root.clone());
//! let ctx = Arc::new(WorkflowContext::from_config(&config, root)?);
//!
//! let src = IngressSource::Entry(IngressEntry::new("/SFTP/healthelink/ingress/screening.csv"));
//! let end = ingress_workflow(ctx, src).await?;
//! println!("Session {} completed {:?}", end.start.session_id, end.completed_steps);
//! # Ok(())
//! # }
//! ```

pub mod egress;
pub mod engine;
pub mod ingress;
pub mod session;
pub mod sources;
pub mod sql;
pub mod workflow;
