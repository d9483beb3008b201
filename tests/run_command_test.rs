//! End-to-end tests for `orchctl run` in drain mode
//!
//! The engine commands are pointed at `true`, which accepts any input and
//! exits successfully, so every step runs against real processes without a
//! database binary.

#![cfg(unix)]

use hrsn_orch::cli::commands::run::RunArgs;
use hrsn_orch::core::egress::read_session_end;
use hrsn_orch::core::ingress::{IngressObservability, INGRESS_DIR, INGRESS_TX_DIR, OBSERVABILITY_FILE};
use hrsn_orch::core::session::EGRESS_DIR;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::sync::watch;

fn setup(files: &[&str]) -> (TempDir, String, PathBuf) {
    setup_with(files, false)
}

fn setup_with(files: &[&str], deterministic_ids: bool) -> (TempDir, String, PathBuf) {
    let dir = TempDir::new().unwrap();
    let sftp = dir.path().join("SFTP");
    let qe_root = sftp.join("healthelink");
    let ingress = qe_root.join(INGRESS_DIR);
    std::fs::create_dir_all(&ingress).unwrap();
    for name in files {
        std::fs::write(ingress.join(name), "PATIENT_MR_ID_VALUE\n1\n").unwrap();
    }

    let config = dir.path().join("orchctl.toml");
    std::fs::write(
        &config,
        format!(
            r#"
[ingress]
sftp_root = "{sftp}"
qe = "healthelink"
reference_data_home = "{reference}"

[engine]
duckdb_cmd = "true"
sqlite_cmd = "true"
preamble_sql = ""
deterministic_ids = {deterministic_ids}
"#,
            sftp = sftp.display(),
            reference = dir.path().join("reference").display(),
        ),
    )
    .unwrap();

    (dir, config.to_string_lossy().into_owned(), qe_root)
}

fn only_tx_dir(qe_root: &Path) -> PathBuf {
    let mut dirs: Vec<PathBuf> = std::fs::read_dir(qe_root.join(INGRESS_TX_DIR))
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(dirs.len(), 1);
    dirs.remove(0)
}

#[tokio::test]
async fn test_drain_runs_group_and_standalone_sessions() {
    let (_dir, config, qe_root) = setup(&[
        "screening-G1_admin.csv",
        "screening-G1_questions.csv",
        "screening-G1_answers.csv",
        "SCREENING_X.csv",
    ]);
    let (_tx, rx) = watch::channel(false);

    let code = RunArgs::default().execute(&config, rx).await.unwrap();
    assert_eq!(code, 0);

    // inbound directory recreated and empty
    let ingress = qe_root.join(INGRESS_DIR);
    assert!(ingress.is_dir());
    assert_eq!(std::fs::read_dir(&ingress).unwrap().count(), 0);

    let tx_dir = only_tx_dir(&qe_root);
    let observability: IngressObservability =
        serde_json::from_str(&std::fs::read_to_string(tx_dir.join(OBSERVABILITY_FILE)).unwrap()).unwrap();
    assert_eq!(observability.ingress_entries.len(), 4);
    assert!(observability.ingress_entries.iter().all(|e| e.sha256.len() == 64));

    let mut sessions = Vec::new();
    for entry in std::fs::read_dir(qe_root.join(EGRESS_DIR)).unwrap() {
        let log = entry.unwrap().path().join("session.json");
        sessions.push(read_session_end(&log).await.unwrap());
    }
    assert_eq!(sessions.len(), 2);
    assert!(sessions.iter().all(|s| s.succeeded()));
    let mut sizes: Vec<usize> = sessions.iter().map(|s| s.start.ingress_paths.len()).collect();
    sizes.sort();
    assert_eq!(sizes, vec![1, 3]);

    // every uploaded file was archived under its session
    let remaining: Vec<_> = std::fs::read_dir(&tx_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(remaining, vec![OBSERVABILITY_FILE.to_string()]);
}

#[tokio::test]
async fn test_incomplete_group_from_transaction_is_processed() {
    let (_dir, config, qe_root) = setup(&["screening-G2_admin.csv", "screening-G2_questions.csv"]);
    let (_tx, rx) = watch::channel(false);

    let code = RunArgs::default().execute(&config, rx).await.unwrap();
    assert_eq!(code, 0);

    let sessions: Vec<PathBuf> = std::fs::read_dir(qe_root.join(EGRESS_DIR))
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(sessions.len(), 1);
    let end = read_session_end(&sessions[0].join("session.json")).await.unwrap();
    assert_eq!(end.start.ingress_paths.len(), 2);
    assert_eq!(end.consumed.len(), 2);
    assert!(sessions[0].join(".consumed/screening-G2_admin.csv").exists());
    assert!(sessions[0].join(".consumed/screening-G2_questions.csv").exists());

    let json = std::fs::read_to_string(sessions[0].join("session.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["src"]["groupID"], "G2");

    let tx_dir = only_tx_dir(&qe_root);
    assert!(!tx_dir.join("screening-G2_admin.csv").exists());
    assert!(!tx_dir.join("screening-G2_questions.csv").exists());
}

#[tokio::test]
async fn test_repeated_deterministic_runs_keep_separate_sessions() {
    let (_dir, config, qe_root) = setup_with(&[], true);
    let ingress = qe_root.join(INGRESS_DIR);

    for content in ["run1", "run2"] {
        std::fs::write(ingress.join("SCREENING_X.csv"), content).unwrap();
        let (_tx, rx) = watch::channel(false);
        let code = RunArgs::default().execute(&config, rx).await.unwrap();
        assert_eq!(code, 0);
        // transaction IDs have millisecond resolution
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let mut archived: Vec<String> = std::fs::read_dir(qe_root.join(EGRESS_DIR))
        .unwrap()
        .map(|e| {
            let consumed = e.unwrap().path().join(".consumed/SCREENING_X.csv");
            std::fs::read_to_string(consumed).unwrap()
        })
        .collect();
    archived.sort();
    assert_eq!(archived, vec!["run1".to_string(), "run2".to_string()]);
}
