//! Shared fixtures for integration tests
//!
//! [`ScriptedEngine`] stands in for the `duckdb`/`sqlite3` command-line
//! programs: every call is recorded and answered by a responder closure.

#![allow(dead_code)]

use async_trait::async_trait;
use hrsn_orch::core::engine::{EngineOptions, OrchEngine, ProcessOutput, SqlEngine, SqlEngines};
use hrsn_orch::core::session::{OrchSession, WorkflowPaths};
use hrsn_orch::core::sources::WatchFsSources;
use hrsn_orch::core::sql::admin::ORCH_SESSION_ENTRY;
use hrsn_orch::domain::{IdGenerator, Result, SessionId};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// One recorded engine invocation
#[derive(Debug, Clone)]
pub struct EngineCall {
    pub db_path: PathBuf,
    pub sql: String,
    pub json: bool,
}

impl EngineCall {
    /// The admin-table DDL batch of the init step
    ///
    /// Later batches embed earlier SQL as execution-log literals, so the
    /// exec insert marks anything after init.
    pub fn is_init(&self) -> bool {
        self.sql.contains("CREATE TABLE IF NOT EXISTS device (") && !self.is_emit_resources()
    }

    /// The structural batch of the ingest step (the only JSON call)
    pub fn is_ingest(&self) -> bool {
        self.json
    }

    /// The only batch that persists the execution log
    pub fn is_emit_resources(&self) -> bool {
        self.sql.contains("INSERT INTO orch_session_exec ")
    }

    pub fn is_excel_export(&self) -> bool {
        self.sql.contains("DRIVER 'xlsx'")
    }

    pub fn is_fhir_extract(&self) -> bool {
        self.sql.contains("COPY (SELECT FHIR_Bundle")
    }

    pub fn is_ensure_content(&self) -> bool {
        !(self.is_init()
            || self.is_ingest()
            || self.is_emit_resources()
            || self.is_excel_export()
            || self.is_fhir_extract())
    }
}

type Responder = dyn Fn(&EngineCall) -> ProcessOutput + Send + Sync;

pub struct ScriptedEngine {
    responder: Box<Responder>,
    calls: Mutex<Vec<EngineCall>>,
}

impl ScriptedEngine {
    pub fn new(responder: impl Fn(&EngineCall) -> ProcessOutput + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Every call succeeds with no output
    pub fn succeeding() -> Arc<Self> {
        Self::new(|_| ok())
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SqlEngine for ScriptedEngine {
    fn command_line(&self, db_path: &Path, json: bool) -> String {
        if json {
            format!("scripted -json {}", db_path.display())
        } else {
            format!("scripted {}", db_path.display())
        }
    }

    async fn run(&self, db_path: &Path, sql: &str, json: bool) -> Result<ProcessOutput> {
        let call = EngineCall {
            db_path: db_path.to_path_buf(),
            sql: sql.to_string(),
            json,
        };
        let output = (self.responder)(&call);
        self.calls.lock().unwrap().push(call);
        Ok(output)
    }
}

pub fn ok() -> ProcessOutput {
    ProcessOutput::default()
}

pub fn ok_json(stdout: impl Into<String>) -> ProcessOutput {
    ProcessOutput {
        code: 0,
        stdout: stdout.into(),
        stderr: String::new(),
    }
}

pub fn failed(code: i32, stderr: &str) -> ProcessOutput {
    ProcessOutput {
        code,
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

/// Session entry ID assigned to the source whose URI contains `uri_fragment`
pub fn entry_id_for(sql: &str, uri_fragment: &str) -> Option<String> {
    let insert = format!("INSERT INTO {ORCH_SESSION_ENTRY} ");
    sql.lines()
        .filter(|line| line.contains(&insert) && line.contains(uri_fragment))
        .find_map(|line| {
            let start = line.find("VALUES ('")? + "VALUES ('".len();
            let end = line[start..].find('\'')? + start;
            Some(line[start..end].to_string())
        })
}

/// Target path of a `COPY ... TO '<path>'` statement
pub fn copy_target(sql: &str) -> Option<PathBuf> {
    let start = sql.find(" TO '")? + " TO '".len();
    let end = sql[start..].find('\'')? + start;
    Some(PathBuf::from(&sql[start..end]))
}

/// A session under `root` with deterministic identifiers
pub fn session_for(root: &Path) -> (OrchSession, WorkflowPaths) {
    let ids = Arc::new(IdGenerator::deterministic());
    let session_id: SessionId = ids.next_id();
    let paths = WorkflowPaths::new(root, &session_id);
    (OrchSession::new(session_id, ids), paths)
}

/// An engine over `files` driven by `analytics`
pub fn engine_for(
    root: &Path,
    files: Vec<PathBuf>,
    analytics: Arc<ScriptedEngine>,
    options: EngineOptions,
) -> (OrchEngine, WorkflowPaths) {
    let (session, paths) = session_for(root);
    let engines = SqlEngines {
        analytics,
        resource: ScriptedEngine::succeeding(),
    };
    let engine = OrchEngine::new(
        session,
        paths.clone(),
        engines,
        Box::new(WatchFsSources::new(files)),
        options,
    );
    (engine, paths)
}

/// Writes `content` to `dir/name` and returns the path
pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}
