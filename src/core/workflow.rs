//! One workflow invocation: a session from ingress source to session log
//!
//! Each invocation allocates its own session ID, so concurrent workflows
//! never share an egress directory or in-process database.

use crate::config::OrchConfig;
use crate::core::egress::{
    consume_ingressed, write_session_log, FhirPublisher, SessionEnd, SessionStart,
};
use crate::core::engine::{CliSqlEngine, EngineOptions, OrchEngine, SqlEngines};
use crate::core::ingress::IngressSource;
use crate::core::session::{OrchSession, SqlCatalog, WorkflowPaths, ORCHESTRATE_VERSION};
use crate::core::sources::WatchFsSources;
use crate::domain::{IdGenerator, Result};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;

/// Everything a workflow needs, shared by all workflows of one run
pub struct WorkflowContext {
    /// Partner root; sessions write to `<root>/egress/<sessionID>`
    pub root: PathBuf,
    pub engines: SqlEngines,
    pub options: EngineOptions,
    pub ids: Arc<IdGenerator>,
    pub archive_consumed: bool,
    pub publisher: Option<Arc<FhirPublisher>>,
    /// Custom SQL registered on every session
    pub catalog: Vec<(SqlCatalog, String)>,
}

impl WorkflowContext {
    pub fn from_config(config: &OrchConfig, root: PathBuf) -> Result<Self> {
        let publisher = FhirPublisher::from_config(&config.publish)?.map(Arc::new);
        Ok(Self {
            root,
            engines: SqlEngines {
                analytics: Arc::new(CliSqlEngine::new(config.engine.duckdb_cmd.clone())),
                resource: Arc::new(CliSqlEngine::new(config.engine.sqlite_cmd.clone())),
            },
            options: EngineOptions {
                reference_data_home: Some(config.ingress.reference_data_home.clone()),
                excel: config.diagnostics.excel,
                fhir: config.diagnostics.fhir,
                resource_db: config.diagnostics.resource_db,
                qe: config.ingress.qe.clone(),
                preamble_sql: config.engine.preamble_sql.clone(),
            },
            ids: Arc::new(IdGenerator::from_flag(config.engine.deterministic_ids)),
            archive_consumed: config.ingress.archive_consumed,
            publisher,
            catalog: Vec::new(),
        })
    }
}

/// Runs one session for `src` and returns its end record
pub async fn ingress_workflow(ctx: Arc<WorkflowContext>, src: IngressSource) -> Result<SessionEnd> {
    let session_id = ctx.ids.session_id();
    let mut paths = WorkflowPaths::new(&ctx.root, &session_id);
    if !ctx.archive_consumed {
        paths = paths.without_archive();
    }
    paths.initialize_paths().await?;

    let fs_paths = src.fs_paths();
    tracing::info!(
        session_id = %session_id,
        source = %src.label(),
        entries = fs_paths.len(),
        "Workflow started"
    );

    let start = SessionStart {
        ingress_paths: fs_paths.clone(),
        init_at: Utc::now(),
        session_id: session_id.to_string(),
        src,
        version: ORCHESTRATE_VERSION.to_string(),
    };
    write_session_log(&paths.session_log(), &start).await?;

    let mut session = OrchSession::new(session_id.clone(), Arc::clone(&ctx.ids));
    for (catalog, sql) in &ctx.catalog {
        session.register_sql(*catalog, sql.clone());
    }
    let engine = OrchEngine::new(
        session,
        paths.clone(),
        ctx.engines.clone(),
        Box::new(WatchFsSources::new(fs_paths.clone())),
        ctx.options.clone(),
    );
    let outcome = engine.run().await;

    let mut consumed = Vec::with_capacity(fs_paths.len());
    for path in &fs_paths {
        match consume_ingressed(path, paths.ingress_archive.as_ref()).await {
            Ok(entry) => consumed.push(entry),
            Err(e) => tracing::warn!(
                session_id = %session_id,
                fs_path = %path.display(),
                error = %e,
                "Unable to consume ingress entry"
            ),
        }
    }

    let publish_fhir_result = match &ctx.publisher {
        Some(publisher) => match publisher.publish_dir(&paths.egress.home).await {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "FHIR publish scan failed");
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    let end = SessionEnd {
        start,
        consumed,
        std_errs_encountered: outcome.exec_errors,
        diagnostics_markdown: outcome.diagnostics_md.clone(),
        duck_db: outcome.duckdb_path.clone(),
        resource_db: outcome.resource_db.clone(),
        reference_data_home: ctx.options.reference_data_home.clone(),
        publish_fhir_url: ctx.publisher.as_ref().map(|p| p.endpoint().to_string()),
        publish_fhir_result,
        completed_steps: outcome.completed_steps.clone(),
        failed_step: outcome.failure.as_ref().map(|f| f.step.clone()),
        finalize_at: Utc::now(),
    };
    write_session_log(&paths.session_log(), &end).await?;

    match &outcome.failure {
        Some(failure) => tracing::warn!(
            session_id = %session_id,
            step = %failure.step,
            "Workflow finished with a halted session"
        ),
        None => tracing::info!(
            session_id = %session_id,
            exec_errors = outcome.exec_errors,
            "Workflow finished"
        ),
    }

    Ok(end)
}
