//! The finalize step (`emitDiagnostics`)
//!
//! Always runs, whatever happened before it. Each artifact is produced
//! independently: a failure is logged and the remaining artifacts are still
//! written.

use super::diagnostics::DiagnosticsLog;
use super::steps::{OrchEngine, OrchStep, SessionOutcome};
use crate::core::session::WorkflowPaths;
use crate::core::sources::{business_rules_placeholder_ddl, SourceNature};
use crate::core::sql::admin::ORCH_SESSION;
use crate::core::sql::{
    issue_classification_view, md_ignored, optional_literal, quoted_literal, FHIR_BUNDLE_VIEW,
    ISSUE_CLASSIFICATION_VIEW,
};
use crate::domain::{OrchError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// HTTP request template for submitting `fhir.json` by hand
pub const FHIR_HTTP_TEMPLATE: &str = "### Submit FHIR Resource Bundle\n\nPOST https://{{host}}/{{path}}?processingAgent=QE HTTP/1.1\ncontent-type: application/json\n\n< ./fhir.json\n";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSummary {
    pub uri: String,
    pub nature: SourceNature,
    pub table_name: String,
    pub ingestion_issues: usize,
}

/// Session arguments recorded in `diagnostics.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsArgs {
    pub session_id: String,
    pub workflow_paths: WorkflowPaths,
    pub walk_root_paths: Vec<PathBuf>,
    pub reference_data_home: Option<String>,
    /// One entry per resolved potential source; absent if ingest never ran
    pub sources: Option<Vec<SourceSummary>>,
}

/// Contents of `diagnostics.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticsDocument {
    pub args: DiagnosticsArgs,
    pub diags: DiagnosticsLog,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FrontMatter<'a> {
    session_id: &'a str,
    version: &'a str,
    started_at: DateTime<Utc>,
    finalized_at: DateTime<Utc>,
    completed_steps: &'a [String],
    failed_step: Option<&'a str>,
    exec_errors: usize,
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

impl OrchEngine {
    pub(super) async fn emit_diagnostics(&mut self, outcome: &mut SessionOutcome) {
        let started = std::time::Instant::now();
        crate::log_step_enter!(self.session.session_id, OrchStep::EmitDiagnostics);
        self.session.enter(OrchStep::EmitDiagnostics.label());

        if self.options.excel && outcome.completed(OrchStep::Init) {
            if let Err(e) = self.emit_excel().await {
                tracing::warn!(session_id = %self.session.session_id, error = %e, "Excel diagnostics skipped");
            }
        }

        let document = self.diagnostics_document(outcome);
        let json = match self.write_diagnostics_json(&document).await {
            Ok(json) => Some(json),
            Err(e) => {
                tracing::warn!(session_id = %self.session.session_id, error = %e, "diagnostics.json not written");
                None
            }
        };

        if self.options.fhir && outcome.completed(OrchStep::EmitResources) {
            if let Err(e) = self.emit_fhir().await {
                tracing::warn!(session_id = %self.session.session_id, error = %e, "FHIR bundle not extracted");
            }
            if let Err(e) = tokio::fs::write(self.paths.fhir_http(), FHIR_HTTP_TEMPLATE).await {
                tracing::warn!(session_id = %self.session.session_id, error = %e, "fhir.http not written");
            }
        }

        let markdown = match self.write_diagnostics_md(outcome).await {
            Ok(md) => {
                outcome.diagnostics_md = Some(self.paths.diagnostics_md());
                Some(md)
            }
            Err(e) => {
                tracing::warn!(session_id = %self.session.session_id, error = %e, "diagnostics.md not written");
                None
            }
        };

        if let Some(resource_db) = outcome.resource_db.clone() {
            if let Err(e) = self
                .stamp_resource_db(&resource_db, json.as_deref(), markdown.as_deref())
                .await
            {
                tracing::warn!(session_id = %self.session.session_id, error = %e, "Resource store not stamped");
            }
        }

        if let Err(e) = self.paths.finalize_paths().await {
            tracing::warn!(session_id = %self.session.session_id, error = %e, "Finalizing paths failed");
        }

        self.session.exit(OrchStep::EmitDiagnostics.label());
        outcome.completed_steps.push(OrchStep::EmitDiagnostics.label().to_string());
        crate::log_step_exit!(self.session.session_id, OrchStep::EmitDiagnostics, started.elapsed());
    }

    async fn emit_excel(&mut self) -> Result<()> {
        let xlsx = self.paths.diagnostics_xlsx();
        remove_if_exists(&xlsx).await?;

        let sql = [
            md_ignored("classification", &format!("{}\n{}", business_rules_placeholder_ddl(), issue_classification_view())),
            "INSTALL spatial; LOAD spatial;".to_string(),
            format!(
                "COPY (SELECT * FROM {ISSUE_CLASSIFICATION_VIEW}) TO {} WITH (FORMAT GDAL, DRIVER 'xlsx');",
                quoted_literal(&xlsx.to_string_lossy())
            ),
        ]
        .join("\n");

        let output = self.shell.execute(&sql, "emitDiagnosticsExcel").await;
        if !output.success() {
            return Err(OrchError::Execution(format!(
                "Excel export exited with status {}: {}",
                output.code,
                output.stderr.trim()
            )));
        }
        Ok(())
    }

    pub(super) fn diagnostics_document(&self, outcome: &SessionOutcome) -> DiagnosticsDocument {
        let sources = outcome.sources.as_ref().map(|sources| {
            sources
                .iter()
                .enumerate()
                .map(|(index, source)| SourceSummary {
                    uri: source.uri().to_string(),
                    nature: source.nature(),
                    table_name: source.table_name().to_string(),
                    ingestion_issues: outcome
                        .ingestables
                        .iter()
                        .find(|i| i.ps_index == index)
                        .map(|i| i.issues.len())
                        .unwrap_or(0),
                })
                .collect()
        });

        DiagnosticsDocument {
            args: DiagnosticsArgs {
                session_id: self.session.session_id.to_string(),
                workflow_paths: self.paths.clone(),
                walk_root_paths: self.supplier.walk_root_paths(),
                reference_data_home: self.options.reference_data_home.clone(),
                sources,
            },
            diags: self.shell.diagnostics().clone(),
        }
    }

    async fn write_diagnostics_json(&self, document: &DiagnosticsDocument) -> Result<String> {
        let json = serde_json::to_string_pretty(document)?;
        tokio::fs::write(self.paths.diagnostics_json(), &json).await?;
        Ok(json)
    }

    async fn emit_fhir(&mut self) -> Result<()> {
        let temp = self.paths.fhir_temp_json();
        let sql = format!(
            "COPY (SELECT FHIR_Bundle AS FHIR FROM {FHIR_BUNDLE_VIEW}) TO {} (FORMAT JSON);",
            quoted_literal(&temp.to_string_lossy())
        );
        let output = self.shell.execute(&sql, "emitFhirBundle").await;

        let extracted = if output.success() {
            extract_fhir_bundle(&temp).await
        } else {
            Err(OrchError::Execution(format!(
                "FHIR extraction exited with status {}: {}",
                output.code,
                output.stderr.trim()
            )))
        };
        if let Err(e) = remove_if_exists(&temp).await {
            tracing::debug!(error = %e, "Temporary FHIR file not removed");
        }

        let bundle = extracted?;
        tokio::fs::write(self.paths.fhir_json(), serde_json::to_string_pretty(&bundle)?).await?;
        Ok(())
    }

    async fn write_diagnostics_md(&self, outcome: &SessionOutcome) -> Result<String> {
        let front_matter = FrontMatter {
            session_id: self.session.session_id.as_str(),
            version: &self.session.version,
            started_at: self.session.started_at,
            finalized_at: Utc::now(),
            completed_steps: &outcome.completed_steps,
            failed_step: outcome.failure.as_ref().map(|f| f.step.as_str()),
            exec_errors: self.shell.diagnostics().error_count(),
        };
        let markdown = format!(
            "---\n{}---\n# Orchestration Diagnostics\n\n{}",
            serde_yaml::to_string(&front_matter)?,
            self.shell.diagnostics().markdown()
        );
        tokio::fs::write(self.paths.diagnostics_md(), &markdown).await?;
        Ok(markdown)
    }

    async fn stamp_resource_db(&self, resource_db: &Path, json: Option<&str>, markdown: Option<&str>) -> Result<()> {
        if !tokio::fs::try_exists(resource_db).await.unwrap_or(false) {
            tracing::debug!(path = %resource_db.display(), "Resource store absent; nothing to stamp");
            return Ok(());
        }

        let sql = format!(
            "UPDATE {ORCH_SESSION} SET orch_finished_at = {}, diagnostics_json = {}, diagnostics_md = {} WHERE orch_session_id = {};",
            quoted_literal(&Utc::now().to_rfc3339()),
            optional_literal(json),
            optional_literal(markdown),
            quoted_literal(self.session.session_id.as_str()),
        );
        let output = self.engines.resource.run(resource_db, &sql, false).await?;
        if !output.success() {
            return Err(OrchError::Execution(format!(
                "Resource store update exited with status {}: {}",
                output.code,
                output.stderr.trim()
            )));
        }
        Ok(())
    }
}

/// Reads the bundle out of the engine's newline-delimited JSON export
async fn extract_fhir_bundle(temp: &Path) -> Result<serde_json::Value> {
    let content = tokio::fs::read_to_string(temp).await?;
    let line = content
        .lines()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| OrchError::Other("FHIR export is empty".to_string()))?;
    let mut row: serde_json::Value = serde_json::from_str(line)?;
    match row.get_mut("FHIR").map(serde_json::Value::take) {
        Some(serde_json::Value::String(text)) => Ok(serde_json::from_str(&text)?),
        Some(bundle) if !bundle.is_null() => Ok(bundle),
        _ => Err(OrchError::Other("FHIR export has no bundle".to_string())),
    }
}
