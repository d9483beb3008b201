//! The orchestration step engine
//!
//! Steps run strictly in order: `prepareInit`, `init`, `ingest`,
//! `ensureContent`, `emitResources`. Whatever happens, `emitDiagnostics`
//! runs afterwards.
//!
//! - `prepareInit` and `init` failures halt the session.
//! - `ingest` records per-source issues; a source with any issue is excluded
//!   from later steps but the session continues.
//! - `ensureContent` and `emitResources` only see issue-free sources, and a
//!   failed batch halts the session.

use super::shell::{ExecutionShell, SqlEngine};
use crate::core::session::{OrchSession, SqlCatalog, WorkflowPaths};
use crate::core::sources::{
    business_rules_placeholder_ddl, ContentShape, IngestContext, IngestSource, IngestSourcesSupplier,
};
use crate::core::sql::admin::{
    admin_table_indexes, admin_tables_ddl, diagnostic_text_view, issue_read_back_sql, ADMIN_TABLES, DEVICE,
    ORCH_SESSION,
};
use crate::core::sql::{fhir_bundle_view, issue_classification_view, md_ignored, quoted_literal};
use crate::domain::{Issue, IssueId, IssueType, OrchError, SessionEntryId, SessionId};
use crate::{log_session_error, log_step_enter, log_step_exit};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Schema alias the resource store is attached under
pub const RESOURCE_DB_SCHEMA: &str = "resource_db";

/// Message of the issue attached when the issue query yields nothing usable
pub const ISSUE_READ_BACK_FAILED: &str = "issue read-back failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrchStep {
    PrepareInit,
    Init,
    Ingest,
    EnsureContent,
    EmitResources,
    EmitDiagnostics,
}

impl OrchStep {
    pub fn label(&self) -> &'static str {
        match self {
            OrchStep::PrepareInit => "prepareInit",
            OrchStep::Init => "init",
            OrchStep::Ingest => "ingest",
            OrchStep::EnsureContent => "ensureContent",
            OrchStep::EmitResources => "emitResources",
            OrchStep::EmitDiagnostics => "emitDiagnostics",
        }
    }
}

impl fmt::Display for OrchStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One source within one session
#[derive(Debug, Clone)]
pub struct Ingestable {
    pub ps_index: usize,
    pub session_entry_id: SessionEntryId,
    pub source: IngestSource,
    pub sql: String,
    pub issues: Vec<Issue>,
}

impl Ingestable {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Why a session halted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepFailure {
    pub step: String,
    pub message: String,
    pub diagnostics_file: Option<PathBuf>,
}

impl StepFailure {
    pub fn new(step: OrchStep, message: impl Into<String>) -> Self {
        Self {
            step: step.label().to_string(),
            message: message.into(),
            diagnostics_file: None,
        }
    }

    pub fn with_diagnostics_file(mut self, path: PathBuf) -> Self {
        self.diagnostics_file = Some(path);
        self
    }
}

impl From<StepFailure> for OrchError {
    fn from(failure: StepFailure) -> Self {
        OrchError::step(failure.step, failure.message)
    }
}

/// What a session did, handed to the egress writer
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub session_id: SessionId,
    pub completed_steps: Vec<String>,
    pub failure: Option<StepFailure>,
    /// `None` until the ingest step resolved its sources
    pub sources: Option<Vec<IngestSource>>,
    pub ingestables: Vec<Ingestable>,
    pub exec_errors: usize,
    pub duckdb_path: PathBuf,
    pub resource_db: Option<PathBuf>,
    pub diagnostics_md: Option<PathBuf>,
}

impl SessionOutcome {
    fn new(session_id: SessionId, duckdb_path: PathBuf) -> Self {
        Self {
            session_id,
            completed_steps: Vec::new(),
            failure: None,
            sources: None,
            ingestables: Vec::new(),
            exec_errors: 0,
            duckdb_path,
            resource_db: None,
            diagnostics_md: None,
        }
    }

    pub fn completed(&self, step: OrchStep) -> bool {
        self.completed_steps.iter().any(|s| s == step.label())
    }

    /// Ingestables that passed structural validation
    pub fn accepted(&self) -> impl Iterator<Item = &Ingestable> {
        self.ingestables.iter().filter(|i| i.is_clean())
    }
}

/// Per-session switches for optional work
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Append the reference tables from this home to every session
    pub reference_data_home: Option<String>,
    pub excel: bool,
    pub fhir: bool,
    pub resource_db: bool,
    /// Qualified entity recorded on the session row
    pub qe: Option<String>,
    /// Hidden SQL prepended to every batch
    pub preamble_sql: String,
}

/// Engines used by one session
#[derive(Clone)]
pub struct SqlEngines {
    /// Runs the in-process analytical database
    pub analytics: Arc<dyn SqlEngine>,
    /// Stamps the finished session into the resource store
    pub resource: Arc<dyn SqlEngine>,
}

/// Drives one session through every step
pub struct OrchEngine {
    pub(super) session: OrchSession,
    pub(super) paths: WorkflowPaths,
    pub(super) shell: ExecutionShell,
    pub(super) engines: SqlEngines,
    pub(super) supplier: Arc<dyn IngestSourcesSupplier>,
    pub(super) options: EngineOptions,
}

impl OrchEngine {
    pub fn new(
        session: OrchSession,
        paths: WorkflowPaths,
        engines: SqlEngines,
        supplier: Box<dyn IngestSourcesSupplier>,
        options: EngineOptions,
    ) -> Self {
        let shell = ExecutionShell::new(Arc::clone(&engines.analytics), paths.duckdb_path())
            .with_preamble(options.preamble_sql.clone());
        Self {
            session,
            paths,
            shell,
            engines,
            supplier: Arc::from(supplier),
            options,
        }
    }

    pub fn session(&self) -> &OrchSession {
        &self.session
    }

    /// Runs every step, then the finalize step regardless of outcome
    pub async fn run(mut self) -> SessionOutcome {
        let mut outcome = SessionOutcome::new(self.session.session_id.clone(), self.paths.duckdb_path());

        if let Err(failure) = self.run_steps(&mut outcome).await {
            self.session.fail(&failure.step, failure.message.clone());
            let error = OrchError::from(failure.clone());
            log_session_error!(self.session.session_id, error, "Session halted");
            outcome.failure = Some(failure);
        }

        self.emit_diagnostics(&mut outcome).await;
        outcome.exec_errors = self.shell.diagnostics().error_count();
        outcome
    }

    fn begin(&mut self, step: OrchStep) -> Instant {
        log_step_enter!(self.session.session_id, step);
        self.session.enter(step.label());
        Instant::now()
    }

    fn end(&mut self, step: OrchStep, started: Instant, outcome: &mut SessionOutcome) {
        self.session.exit(step.label());
        outcome.completed_steps.push(step.label().to_string());
        log_step_exit!(self.session.session_id, step, started.elapsed());
    }

    async fn run_steps(&mut self, outcome: &mut SessionOutcome) -> Result<(), StepFailure> {
        let started = self.begin(OrchStep::PrepareInit);
        self.prepare_init().await?;
        self.end(OrchStep::PrepareInit, started, outcome);

        let started = self.begin(OrchStep::Init);
        self.init().await?;
        self.end(OrchStep::Init, started, outcome);

        let started = self.begin(OrchStep::Ingest);
        let (sources, ingestables) = self.ingest().await?;
        outcome.sources = Some(sources);
        outcome.ingestables = ingestables;
        self.end(OrchStep::Ingest, started, outcome);

        let accepted: Vec<Ingestable> = outcome.accepted().cloned().collect();
        tracing::info!(
            session_id = %self.session.session_id,
            ingestables = outcome.ingestables.len(),
            accepted = accepted.len(),
            "Structural validation complete"
        );

        let started = self.begin(OrchStep::EnsureContent);
        let accepted = self.ensure_content(accepted).await?;
        self.end(OrchStep::EnsureContent, started, outcome);

        let started = self.begin(OrchStep::EmitResources);
        outcome.resource_db = self.emit_resources(&accepted).await?;
        self.end(OrchStep::EmitResources, started, outcome);

        Ok(())
    }

    async fn prepare_init(&mut self) -> Result<(), StepFailure> {
        self.paths
            .initialize_paths()
            .await
            .map_err(|e| StepFailure::new(OrchStep::PrepareInit, e.to_string()))
    }

    fn init_sql(&self) -> String {
        let mut sql = vec![
            self.session.catalog_sql(SqlCatalog::BeforeInit),
            admin_tables_ddl(),
            admin_table_indexes(),
            diagnostic_text_view(),
        ];
        sql.extend(ContentShape::ALL.iter().map(|shape| shape.aggregate_ddl()));
        sql.push(self.session.device_sql_dml());
        sql.push(self.session.orch_session_sql_dml(self.options.qe.as_deref()));
        sql.push(self.session.catalog_sql(SqlCatalog::AfterInit));
        sql.join("\n")
    }

    async fn init(&mut self) -> Result<(), StepFailure> {
        let sql = self.init_sql();
        let output = self.shell.execute(&sql, "initDDL").await;
        if output.success() {
            return Ok(());
        }

        let mut failure = StepFailure::new(
            OrchStep::Init,
            format!("initDDL exited with status {}: {}", output.code, output.stderr.trim()),
        );
        match self
            .shell
            .write_diagnostics_sql_md(&self.paths.egress.home, "initDDL")
            .await
        {
            Ok(path) => failure = failure.with_diagnostics_file(path),
            Err(e) => tracing::warn!(error = %e, "Unable to write initDDL diagnostics"),
        }
        Err(failure)
    }

    async fn ingest(&mut self) -> Result<(Vec<IngestSource>, Vec<Ingestable>), StepFailure> {
        // workbook reads and directory walks block
        let supplier = Arc::clone(&self.supplier);
        let mut sources = tokio::task::spawn_blocking(move || supplier.sources())
            .await
            .map_err(|e| StepFailure::new(OrchStep::Ingest, format!("Source resolution task failed: {e}")))?
            .map_err(|e| StepFailure::new(OrchStep::Ingest, e.to_string()))?;
        if let Some(home) = &self.options.reference_data_home {
            sources.extend(IngestSource::references(home));
        }

        let session_id = self.session.session_id.clone();
        let ids = Arc::clone(&self.session.ids);
        let mut ingestables: Vec<Ingestable> = sources
            .iter()
            .enumerate()
            .map(|(ps_index, source)| {
                let session_entry_id: SessionEntryId = ids.next_id();
                let sql = source.structural_sql(&IngestContext {
                    session_id: &session_id,
                    entry_id: &session_entry_id,
                    ids: &ids,
                });
                Ingestable {
                    ps_index,
                    session_entry_id,
                    source: source.clone(),
                    sql,
                    issues: Vec::new(),
                }
            })
            .collect();

        if ingestables.is_empty() {
            tracing::info!(session_id = %session_id, "No ingest sources resolved");
            return Ok((sources, ingestables));
        }

        let mut batch: Vec<&str> = ingestables.iter().map(|i| i.sql.as_str()).collect();
        let read_back = issue_read_back_sql(&session_id);
        batch.push(&read_back);
        let batch = batch.join("\n");

        let (output, issues) = self.shell.json_result::<Issue>(&batch, "ingest").await;
        match issues {
            Some(issues) => {
                for issue in issues {
                    match ingestables
                        .iter_mut()
                        .find(|i| i.session_entry_id == issue.session_entry_id)
                    {
                        Some(ingestable) => ingestable.issues.push(issue),
                        None => tracing::debug!(
                            session_entry_id = %issue.session_entry_id,
                            "Issue for an entry outside this batch"
                        ),
                    }
                }
            }
            None => {
                tracing::warn!(
                    session_id = %session_id,
                    exit_code = output.code,
                    "Issue read-back failed; excluding every source from content validation"
                );
                let detail = output.stderr.trim();
                for ingestable in &mut ingestables {
                    let issue_id: IssueId = ids.next_id();
                    ingestable.issues.push(Issue::synthetic(
                        ingestable.session_entry_id.clone(),
                        issue_id,
                        IssueType::Structural,
                        ISSUE_READ_BACK_FAILED,
                        (!detail.is_empty()).then(|| detail.to_string()),
                    ));
                }
            }
        }

        for ingestable in ingestables.iter().filter(|i| !i.is_clean()) {
            tracing::info!(
                session_id = %session_id,
                source = ingestable.source.uri(),
                issues = ingestable.issues.len(),
                "Source excluded by structural issues"
            );
        }

        Ok((sources, ingestables))
    }

    async fn ensure_content(&mut self, accepted: Vec<Ingestable>) -> Result<Vec<Ingestable>, StepFailure> {
        if accepted.is_empty() {
            tracing::debug!(session_id = %self.session.session_id, "No sources to validate");
            return Ok(accepted);
        }

        let session_id = self.session.session_id.clone();
        let ids = Arc::clone(&self.session.ids);
        let sql = accepted
            .iter()
            .map(|i| {
                i.source.content_sql(&IngestContext {
                    session_id: &session_id,
                    entry_id: &i.session_entry_id,
                    ids: &ids,
                })
            })
            .collect::<Vec<_>>()
            .join("\n");

        let output = self.shell.execute(&sql, "ensureContent").await;
        if !output.success() {
            return Err(StepFailure::new(
                OrchStep::EnsureContent,
                format!("ensureContent exited with status {}: {}", output.code, output.stderr.trim()),
            ));
        }
        Ok(accepted)
    }

    fn resource_db_sql(&self, accepted: &[Ingestable]) -> String {
        let resource_db = self.paths.resource_db();
        let sid = quoted_literal(self.session.session_id.as_str());
        let mut sql = vec![format!(
            "ATTACH {} AS {RESOURCE_DB_SCHEMA} (TYPE SQLITE);",
            quoted_literal(&resource_db.to_string_lossy())
        )];
        for table in ADMIN_TABLES {
            let filter = match table {
                DEVICE => String::new(),
                ORCH_SESSION => format!(" WHERE orch_session_id = {sid}"),
                _ => format!(" WHERE session_id = {sid}"),
            };
            sql.push(format!(
                "CREATE TABLE {RESOURCE_DB_SCHEMA}.{table} AS SELECT * FROM {table}{filter};"
            ));
        }
        for shape in ContentShape::ALL {
            let table = shape.aggregate_table();
            sql.push(format!("CREATE TABLE {RESOURCE_DB_SCHEMA}.{table} AS SELECT * FROM {table};"));
        }
        sql.extend(accepted.iter().map(|i| i.source.export_sql(RESOURCE_DB_SCHEMA)));
        sql.push(format!("DETACH DATABASE {RESOURCE_DB_SCHEMA};"));
        sql.join("\n")
    }

    async fn emit_resources(&mut self, accepted: &[Ingestable]) -> Result<Option<PathBuf>, StepFailure> {
        let session_id = self.session.session_id.clone();
        let mut sql = vec![
            self.session.catalog_sql(SqlCatalog::BeforeFinalize),
            md_ignored("state", &self.session.state_sql_dml()),
            md_ignored(
                "exec",
                &self
                    .shell
                    .diagnostics()
                    .exec_insert_dml(&session_id, &self.session.ids),
            ),
            business_rules_placeholder_ddl(),
            issue_classification_view(),
        ];

        let resource_db = if self.options.resource_db {
            let path = self.paths.resource_db();
            match tokio::fs::remove_file(&path).await {
                Ok(()) => tracing::debug!(path = %path.display(), "Removed stale resource store"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(StepFailure::new(
                        OrchStep::EmitResources,
                        format!("Unable to replace {}: {e}", path.display()),
                    ))
                }
            }
            sql.push(self.resource_db_sql(accepted));
            Some(path)
        } else {
            None
        };

        sql.push(fhir_bundle_view(session_id.as_str()));
        sql.push(self.session.catalog_sql(SqlCatalog::AfterFinalize));

        let output = self.shell.execute(&sql.join("\n"), "emitResources").await;
        if !output.success() {
            return Err(StepFailure::new(
                OrchStep::EmitResources,
                format!("emitResources exited with status {}: {}", output.code, output.stderr.trim()),
            ));
        }
        Ok(resource_db)
    }
}
