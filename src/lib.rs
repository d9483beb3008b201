// HRSN Orchestration Engine
// Copyright (c) 2025 HRSN Orchestration Contributors
// Licensed under the MIT License

//! # HRSN Orchestration Engine
//!
//! Health-related social needs (HRSN) screening files arrive from partner
//! qualified entities (QEs) as CSV files and Excel workbooks. This crate turns
//! each arrival into an orchestration *session* that loads the files into an
//! embedded analytical database, validates them, records every issue, and
//! emits diagnostics, a resource database and FHIR bundles.
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Ingress, sessions, source resolution, SQL, step engine, egress
//! - [`domain`] - Identifiers, issues and the error type
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hrsn_orch::config::load_config;
//! use hrsn_orch::core::ingress::{IngressEntry, IngressSource};
//! use hrsn_orch::core::workflow::{ingress_workflow, WorkflowContext};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("orchctl.toml")?;
//!     let root = config.ingress.qe_root().ok_or("ingress.qe is not set")?;
//!     let ctx = Arc::new(WorkflowContext::from_config(&config, root.clone())?);
//!
//!     let entry = IngressEntry::new(root.join("ingress-tx/tx1/SCREENING_HEALTHELINK_20240301.csv"));
//!     let end = ingress_workflow(ctx, IngressSource::Entry(entry)).await?;
//!
//!     println!("Completed steps: {:?}", end.completed_steps);
//!     Ok(())
//! }
//! ```
//!
//! ## Sessions
//!
//! A session never aborts on bad partner data: structural and content
//! problems become rows in `orch_session_issue`. A step only halts the
//! session when the database engine cannot run its SQL, and diagnostics are
//! written either way.
//!
//! ## Error Handling
//!
//! Library functions return [`domain::Result`] over [`domain::OrchError`]:
//!
//! ```rust,no_run
//! use hrsn_orch::domain::OrchError;
//!
//! fn example() -> Result<(), OrchError> {
//!     let config = hrsn_orch::config::load_config("orchctl.toml")?;
//!     config.validate().map_err(OrchError::Configuration)?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
