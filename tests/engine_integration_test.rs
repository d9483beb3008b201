//! Integration tests for the step engine
//!
//! The SQL engine is scripted, so these tests exercise step ordering, issue
//! handling and the diagnostics written by the finalize step without a
//! database binary.

mod common;

use common::{
    copy_target, engine_for, entry_id_for, failed, ok, ok_json, session_for, write_file, ScriptedEngine,
};
use hrsn_orch::core::engine::{
    DiagnosticsDocument, EngineOptions, OrchEngine, ProcessOutput, SqlEngines, ISSUE_READ_BACK_FAILED,
};
use hrsn_orch::core::sources::{IngestSource, IngestSourcesSupplier, SourceNature};
use hrsn_orch::domain::{IssueType, OrchError};
use std::sync::Arc;
use tempfile::TempDir;
use test_case::test_case;

const ALL_STEPS: [&str; 6] = [
    "prepareInit",
    "init",
    "ingest",
    "ensureContent",
    "emitResources",
    "emitDiagnostics",
];

fn read_document(path: &std::path::Path) -> DiagnosticsDocument {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_init_failure_halts_and_still_writes_diagnostics() {
    let dir = TempDir::new().unwrap();
    let csv = write_file(&dir.path().join("ingress-tx/tx1"), "SCREENING_A.csv", "a,b\n1,2\n");
    let analytics = ScriptedEngine::new(|call| {
        if call.is_init() {
            failed(1, "Parser Error: syntax error at or near \"CREAT\"")
        } else {
            ok()
        }
    });
    let options = EngineOptions {
        excel: true,
        fhir: true,
        ..Default::default()
    };
    let (engine, paths) = engine_for(dir.path(), vec![csv], Arc::clone(&analytics), options);

    let outcome = engine.run().await;

    let failure = outcome.failure.as_ref().expect("session should halt");
    assert_eq!(failure.step, "init");
    assert!(failure.message.contains("Parser Error"));
    let init_md = paths.egress.home.join("initDDL-diagnostics.md");
    assert_eq!(failure.diagnostics_file.as_deref(), Some(init_md.as_path()));
    assert!(std::fs::read_to_string(&init_md).unwrap().contains("Parser Error"));

    assert_eq!(outcome.completed_steps, vec!["prepareInit", "emitDiagnostics"]);
    // excel and FHIR extraction need a completed init
    assert_eq!(analytics.calls().len(), 1);

    let document = read_document(&paths.diagnostics_json());
    assert!(document.args.sources.is_none());
    assert_eq!(document.diags.entries().len(), 1);
    assert!(document.diags.has_errors());

    let markdown = std::fs::read_to_string(paths.diagnostics_md()).unwrap();
    assert!(markdown.starts_with("---\n"));
    assert!(markdown.contains("failedStep: init"));
    assert_eq!(outcome.diagnostics_md, Some(paths.diagnostics_md()));
}

#[tokio::test]
async fn test_zero_sources_completes_every_step() {
    let dir = TempDir::new().unwrap();
    let analytics = ScriptedEngine::succeeding();
    let (engine, paths) = engine_for(dir.path(), Vec::new(), Arc::clone(&analytics), EngineOptions::default());

    let outcome = engine.run().await;

    assert!(outcome.failure.is_none());
    assert_eq!(outcome.completed_steps, ALL_STEPS);
    assert!(outcome.ingestables.is_empty());

    let calls = analytics.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].is_init());
    assert!(calls[1].is_emit_resources());
    assert!(calls.iter().all(|c| c.db_path == paths.duckdb_path()));

    let document = read_document(&paths.diagnostics_json());
    assert_eq!(document.args.sources, Some(Vec::new()));
}

#[tokio::test]
async fn test_source_with_issue_is_excluded_from_content_validation() {
    let dir = TempDir::new().unwrap();
    let tx = dir.path().join("ingress-tx/tx1");
    let good = write_file(&tx, "SCREENING_GOOD.csv", "a\n1\n");
    let bad = write_file(&tx, "SCREENING_BAD.csv", "a\n1\n");

    let analytics = ScriptedEngine::new(|call| {
        if call.is_ingest() {
            let bad_entry = entry_id_for(&call.sql, "SCREENING_BAD").unwrap_or_default();
            ok_json(format!(
                r#"[{{"session_entry_id":"{bad_entry}","orch_session_issue_id":"issue-1","issue_type":"Structural","issue_message":"Required column PATIENT_MR_ID_VALUE is missing","invalid_value":null}}]"#
            ))
        } else {
            ok()
        }
    });
    let (engine, paths) = engine_for(dir.path(), vec![good, bad], Arc::clone(&analytics), EngineOptions::default());

    let outcome = engine.run().await;

    assert!(outcome.failure.is_none());
    assert_eq!(outcome.completed_steps, ALL_STEPS);
    assert_eq!(outcome.ingestables.len(), 2);

    let good = outcome.ingestables.iter().find(|i| i.source.uri().contains("GOOD")).unwrap();
    let bad = outcome.ingestables.iter().find(|i| i.source.uri().contains("BAD")).unwrap();
    assert!(good.is_clean());
    assert_eq!(bad.issues.len(), 1);
    assert_eq!(bad.issues[0].issue_type, IssueType::Structural);
    assert_eq!(outcome.accepted().count(), 1);

    let calls = analytics.calls();
    let ensure = calls.iter().find(|c| c.is_ensure_content()).expect("ensureContent batch");
    assert!(ensure.sql.contains(good.source.table_name()));
    assert!(!ensure.sql.contains(bad.source.table_name()));

    let document = read_document(&paths.diagnostics_json());
    let sources = document.args.sources.unwrap();
    assert_eq!(sources.len(), 2);
    let bad_summary = sources.iter().find(|s| s.uri.contains("BAD")).unwrap();
    assert_eq!(bad_summary.ingestion_issues, 1);
    assert_eq!(bad_summary.nature, SourceNature::Csv);
}

#[test_case(failed(1, "Binder Error: table orch_session_issue does not exist") ; "engine error")]
#[test_case(ok_json("this is not json") ; "unparseable output")]
#[tokio::test]
async fn test_failed_issue_read_back_excludes_every_source(read_back: ProcessOutput) {
    let dir = TempDir::new().unwrap();
    let tx = dir.path().join("ingress-tx/tx1");
    let files = vec![
        write_file(&tx, "SCREENING_A.csv", "a\n"),
        write_file(&tx, "SCREENING_B.csv", "a\n"),
    ];
    let analytics = ScriptedEngine::new(move |call| {
        if call.is_ingest() {
            read_back.clone()
        } else {
            ok()
        }
    });
    let (engine, _paths) = engine_for(dir.path(), files, Arc::clone(&analytics), EngineOptions::default());

    let outcome = engine.run().await;

    assert!(outcome.failure.is_none());
    assert_eq!(outcome.accepted().count(), 0);
    for ingestable in &outcome.ingestables {
        assert_eq!(ingestable.issues.len(), 1);
        assert_eq!(ingestable.issues[0].issue_message, ISSUE_READ_BACK_FAILED);
        assert_eq!(ingestable.issues[0].issue_type, IssueType::Structural);
    }
    assert!(!analytics.calls().iter().any(|c| c.is_ensure_content()));
}

#[tokio::test]
async fn test_reference_tables_join_every_session() {
    let dir = TempDir::new().unwrap();
    let analytics = ScriptedEngine::succeeding();
    let options = EngineOptions {
        reference_data_home: Some("/opt/reference-data".to_string()),
        ..Default::default()
    };
    let (engine, paths) = engine_for(dir.path(), Vec::new(), Arc::clone(&analytics), options);

    let outcome = engine.run().await;

    assert_eq!(outcome.ingestables.len(), 13);
    assert_eq!(outcome.accepted().count(), 13);
    let ingest = analytics.calls().into_iter().find(|c| c.is_ingest()).unwrap();
    assert!(ingest.sql.contains("/opt/reference-data/ahc_cross_walk.csv"));

    let document = read_document(&paths.diagnostics_json());
    let sources = document.args.sources.unwrap();
    assert_eq!(sources.len(), 13);
    assert!(sources.iter().all(|s| s.nature == SourceNature::Reference));
    assert_eq!(document.args.reference_data_home.as_deref(), Some("/opt/reference-data"));
}

#[tokio::test]
async fn test_emit_resources_failure_skips_fhir() {
    let dir = TempDir::new().unwrap();
    let analytics = ScriptedEngine::new(|call| {
        if call.is_emit_resources() {
            failed(1, "Catalog Error: Table with name screening does not exist")
        } else {
            ok()
        }
    });
    let options = EngineOptions {
        fhir: true,
        ..Default::default()
    };
    let (engine, paths) = engine_for(dir.path(), Vec::new(), Arc::clone(&analytics), options);

    let outcome = engine.run().await;

    assert_eq!(outcome.failure.as_ref().map(|f| f.step.as_str()), Some("emitResources"));
    assert!(outcome.completed_steps.contains(&"ensureContent".to_string()));
    assert!(!outcome.completed_steps.contains(&"emitResources".to_string()));
    assert_eq!(outcome.completed_steps.last().map(String::as_str), Some("emitDiagnostics"));
    assert!(!analytics.calls().iter().any(|c| c.is_fhir_extract()));
    assert!(!paths.fhir_json().exists());
    assert!(!paths.fhir_http().exists());
    assert_eq!(outcome.exec_errors, 1);
}

#[tokio::test]
async fn test_ensure_content_failure_halts_before_resources() {
    let dir = TempDir::new().unwrap();
    let csv = write_file(&dir.path().join("ingress-tx/tx1"), "SCREENING_A.csv", "a,b\n1,2\n");
    let analytics = ScriptedEngine::new(|call| {
        if call.is_ensure_content() {
            failed(1, "Binder Error: Referenced column \"SCREENING_CODE\" not found")
        } else {
            ok()
        }
    });
    let options = EngineOptions {
        resource_db: true,
        ..Default::default()
    };
    let (engine, paths) = engine_for(dir.path(), vec![csv], Arc::clone(&analytics), options);

    let outcome = engine.run().await;

    let failure = outcome.failure.as_ref().expect("session should halt");
    assert_eq!(failure.step, "ensureContent");
    assert!(failure.message.contains("Binder Error"));
    assert_eq!(
        outcome.completed_steps,
        vec!["prepareInit", "init", "ingest", "emitDiagnostics"]
    );
    assert!(!analytics.calls().iter().any(|c| c.is_emit_resources()));
    assert!(outcome.resource_db.is_none());
    assert_eq!(outcome.exec_errors, 1);

    let document = read_document(&paths.diagnostics_json());
    assert_eq!(document.args.sources.as_ref().map(Vec::len), Some(1));
    assert!(std::fs::read_to_string(paths.diagnostics_md())
        .unwrap()
        .contains("failedStep: ensureContent"));
}

#[tokio::test]
async fn test_unusable_egress_halts_at_prepare_init() {
    let dir = TempDir::new().unwrap();
    // a plain file where the egress directory belongs
    std::fs::write(dir.path().join("egress"), "not a directory").unwrap();
    let analytics = ScriptedEngine::succeeding();
    let (engine, paths) = engine_for(dir.path(), Vec::new(), Arc::clone(&analytics), EngineOptions::default());

    let outcome = engine.run().await;

    assert_eq!(outcome.failure.as_ref().map(|f| f.step.as_str()), Some("prepareInit"));
    assert_eq!(outcome.completed_steps, vec!["emitDiagnostics"]);
    assert!(outcome.sources.is_none());
    assert!(analytics.calls().is_empty());
    assert!(!paths.egress.home.exists());
    assert!(outcome.diagnostics_md.is_none());
}

struct UnreadableRoot;

impl IngestSourcesSupplier for UnreadableRoot {
    fn sources(&self) -> hrsn_orch::domain::Result<Vec<IngestSource>> {
        Err(OrchError::Ingress("Unable to walk /SFTP/missing".to_string()))
    }
}

#[tokio::test]
async fn test_source_resolution_failure_halts_at_ingest() {
    let dir = TempDir::new().unwrap();
    let analytics = ScriptedEngine::succeeding();
    let (session, paths) = session_for(dir.path());
    let engine = OrchEngine::new(
        session,
        paths.clone(),
        SqlEngines {
            analytics: Arc::<ScriptedEngine>::clone(&analytics),
            resource: ScriptedEngine::succeeding(),
        },
        Box::new(UnreadableRoot),
        EngineOptions::default(),
    );

    let outcome = engine.run().await;

    let failure = outcome.failure.as_ref().expect("session should halt");
    assert_eq!(failure.step, "ingest");
    assert!(failure.message.contains("/SFTP/missing"));
    assert_eq!(outcome.completed_steps, vec!["prepareInit", "init", "emitDiagnostics"]);
    assert!(!analytics.calls().iter().any(|c| c.is_ingest()));
    assert!(paths.diagnostics_json().exists());
}

#[tokio::test]
async fn test_fhir_bundle_extracted_after_resources() {
    let dir = TempDir::new().unwrap();
    let analytics = ScriptedEngine::new(|call| {
        if call.is_fhir_extract() {
            let target = copy_target(&call.sql).unwrap();
            std::fs::write(target, r#"{"FHIR":{"resourceType":"Bundle","id":"b-1","entry":[]}}"#).unwrap();
        }
        ok()
    });
    let options = EngineOptions {
        fhir: true,
        resource_db: true,
        ..Default::default()
    };
    let (engine, paths) = engine_for(dir.path(), Vec::new(), Arc::clone(&analytics), options);

    let outcome = engine.run().await;

    assert!(outcome.failure.is_none());
    let bundle: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(paths.fhir_json()).unwrap()).unwrap();
    assert_eq!(bundle["resourceType"], "Bundle");
    assert_eq!(bundle["id"], "b-1");
    assert!(std::fs::read_to_string(paths.fhir_http()).unwrap().contains("POST https://"));
    assert!(!paths.fhir_temp_json().exists());

    assert_eq!(outcome.resource_db, Some(paths.resource_db()));
    let emit = analytics.calls().into_iter().find(|c| c.is_emit_resources()).unwrap();
    assert!(emit.sql.contains("ATTACH"));
    assert!(emit.sql.contains("DETACH DATABASE resource_db;"));
}

#[tokio::test]
async fn test_diagnostics_markdown_hides_infrastructure_sql() {
    let dir = TempDir::new().unwrap();
    let (engine, paths) = engine_for(
        dir.path(),
        Vec::new(),
        ScriptedEngine::succeeding(),
        EngineOptions::default(),
    );

    engine.run().await;

    let markdown = std::fs::read_to_string(paths.diagnostics_md()).unwrap();
    assert!(markdown.contains("# Orchestration Diagnostics"));
    assert!(markdown.contains("initDDL"));
    assert!(!markdown.contains("INSERT INTO orch_session_state"));
    assert!(!markdown.contains("INSERT INTO orch_session_exec"));

    let document = read_document(&paths.diagnostics_json());
    let emit = document
        .diags
        .entries()
        .iter()
        .find(|e| e.exec_identity == "emitResources")
        .unwrap();
    assert!(emit.sql.contains("INSERT INTO orch_session_state"));
}
