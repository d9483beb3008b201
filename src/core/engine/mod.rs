//! Step engine and execution shell
//!
//! [`OrchEngine`] runs one session's steps against an [`ExecutionShell`],
//! which sends each step's SQL batch to a [`SqlEngine`] and keeps the
//! session's [`DiagnosticsLog`].
//!
//! # Example
//!
//! ```rust,no_run
//! use hrsn_orch::core::engine::{CliSqlEngine, EngineOptions, OrchEngine, SqlEngines};
//! use hrsn_orch::core::session::{OrchSession, WorkflowPaths};
//! use hrsn_orch::core::sources::WatchFsSources;
//! use hrsn_orch::domain::{IdGenerator, SessionId};
//! use std::path::{Path, PathBuf};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let ids = Arc::new(IdGenerator::random());
//! let session_id: SessionId = ids.next_id();
//! let paths = WorkflowPaths::new(Path::new("/SFTP/healthelink"), &session_id);
//! let engines = SqlEngines {
//!     analytics: Arc::new(CliSqlEngine::new("duckdb")),
//!     resource: Arc::new(CliSqlEngine::new("sqlite3")),
//! };
//! let supplier = WatchFsSources::new(vec![PathBuf::from("/SFTP/healthelink/ingress/screening.csv")]);
//!
//! let engine = OrchEngine::new(
//!     OrchSession::new(session_id, ids),
//!     paths,
//!     engines,
//!     Box::new(supplier),
//!     EngineOptions::default(),
//! );
//! let outcome = engine.run().await;
//! println!("completed: {:?}", outcome.completed_steps);
//! # }
//! ```

pub mod diagnostics;
pub mod finalize;
pub mod shell;
pub mod steps;

pub use diagnostics::{DiagnosticsEntry, DiagnosticsLog};
pub use finalize::{DiagnosticsArgs, DiagnosticsDocument, SourceSummary, FHIR_HTTP_TEMPLATE};
pub use shell::{CliSqlEngine, ExecutionShell, ProcessOutput, SqlEngine};
pub use steps::{
    EngineOptions, Ingestable, OrchEngine, OrchStep, SessionOutcome, SqlEngines, StepFailure,
    ISSUE_READ_BACK_FAILED, RESOURCE_DB_SCHEMA,
};
