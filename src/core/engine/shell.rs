//! Execution shell
//!
//! Hands each step's SQL batch to the database command-line engine in a
//! single call and records what happened in the session's diagnostics log.

use super::diagnostics::{DiagnosticsEntry, DiagnosticsLog};
use crate::core::sql::md_ignored;
use crate::domain::{OrchError, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Exit status and captured output of one engine call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// A SQL engine reachable as a process taking SQL on stdin
#[async_trait]
pub trait SqlEngine: Send + Sync {
    /// Command line recorded in diagnostics
    fn command_line(&self, db_path: &Path, json: bool) -> String;

    /// Runs `sql` against `db_path`; `json` requests JSON row output
    async fn run(&self, db_path: &Path, sql: &str, json: bool) -> Result<ProcessOutput>;
}

/// Spawns `duckdb` or `sqlite3` style command-line programs
#[derive(Debug, Clone)]
pub struct CliSqlEngine {
    program: String,
}

impl CliSqlEngine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn args(db_path: &Path, json: bool) -> Vec<String> {
        let mut args = Vec::with_capacity(2);
        if json {
            args.push("-json".to_string());
        }
        args.push(db_path.to_string_lossy().into_owned());
        args
    }
}

#[async_trait]
impl SqlEngine for CliSqlEngine {
    fn command_line(&self, db_path: &Path, json: bool) -> String {
        std::iter::once(self.program.clone())
            .chain(Self::args(db_path, json))
            .collect::<Vec<_>>()
            .join(" ")
    }

    async fn run(&self, db_path: &Path, sql: &str, json: bool) -> Result<ProcessOutput> {
        let mut child = Command::new(&self.program)
            .args(Self::args(db_path, json))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| OrchError::Execution(format!("Unable to start {}: {e}", self.program)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| OrchError::Execution("Engine stdin unavailable".to_string()))?;
        let input = sql.as_bytes().to_vec();
        // written concurrently so a full stdout pipe can't stall the child
        let writer = tokio::spawn(async move {
            let result = stdin.write_all(&input).await;
            drop(stdin);
            result
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| OrchError::Execution(format!("{} did not complete: {e}", self.program)))?;
        match writer.await {
            Ok(Err(e)) => tracing::warn!(error = %e, "Engine closed stdin early"),
            Err(e) => tracing::warn!(error = %e, "Engine stdin writer failed"),
            Ok(Ok(())) => {}
        }

        Ok(ProcessOutput {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Rows of the last JSON array printed to stdout
///
/// Statements without results print nothing, so the last array belongs to
/// the last query that produced rows.
pub fn last_json_array(stdout: &str) -> Option<Vec<Value>> {
    let mut last = None;
    for value in serde_json::Deserializer::from_str(stdout).into_iter::<Value>() {
        match value {
            Ok(Value::Array(rows)) => last = Some(rows),
            Ok(_) => {}
            Err(_) => break,
        }
    }
    last
}

/// Executes SQL for one session and owns its diagnostics log
pub struct ExecutionShell {
    engine: Arc<dyn SqlEngine>,
    db_path: PathBuf,
    preamble: Option<String>,
    diagnostics: DiagnosticsLog,
}

impl ExecutionShell {
    pub fn new(engine: Arc<dyn SqlEngine>, db_path: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            db_path: db_path.into(),
            preamble: None,
            diagnostics: DiagnosticsLog::new(),
        }
    }

    /// SQL prepended to every batch and hidden from the diagnostics markdown
    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        let preamble = preamble.into();
        self.preamble = (!preamble.trim().is_empty()).then_some(preamble);
        self
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn diagnostics(&self) -> &DiagnosticsLog {
        &self.diagnostics
    }

    fn batch(&self, sql: &str) -> String {
        match &self.preamble {
            Some(preamble) => format!("{}\n{sql}", md_ignored("preamble", preamble)),
            None => sql.to_string(),
        }
    }

    async fn run(&mut self, sql: &str, identity: &str, json: bool) -> ProcessOutput {
        let batch = self.batch(sql);
        let started_at = Utc::now();
        let output = match self.engine.run(&self.db_path, &batch, json).await {
            Ok(output) => output,
            Err(e) => ProcessOutput {
                code: -1,
                stdout: String::new(),
                stderr: e.to_string(),
            },
        };

        if output.success() {
            tracing::debug!(exec_identity = identity, exit_code = output.code, "SQL batch executed");
        } else {
            tracing::warn!(
                exec_identity = identity,
                exit_code = output.code,
                stderr = %output.stderr.trim(),
                "SQL batch reported errors"
            );
        }

        self.diagnostics.push(DiagnosticsEntry {
            exec_identity: identity.to_string(),
            command: self.engine.command_line(&self.db_path, json),
            exec_status: output.code,
            exec_error_text: (!output.stderr.trim().is_empty()).then(|| output.stderr.clone()),
            sql: batch,
            started_at,
            finished_at: Utc::now(),
        });
        output
    }

    /// Runs `sql` as one batch
    pub async fn execute(&mut self, sql: &str, identity: &str) -> ProcessOutput {
        self.run(sql, identity, false).await
    }

    /// Runs `sql` and parses the rows of its last result set
    ///
    /// `None` means the rows could not be obtained, which is distinct from an
    /// empty result.
    pub async fn json_result<T: DeserializeOwned>(
        &mut self,
        sql: &str,
        identity: &str,
    ) -> (ProcessOutput, Option<Vec<T>>) {
        let output = self.run(sql, identity, true).await;
        let rows = match last_json_array(&output.stdout) {
            Some(rows) => match rows
                .into_iter()
                .map(serde_json::from_value)
                .collect::<std::result::Result<Vec<T>, _>>()
            {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    tracing::warn!(exec_identity = identity, error = %e, "Unexpected JSON row shape");
                    None
                }
            },
            None if output.success() && output.stdout.trim().is_empty() => Some(Vec::new()),
            None => None,
        };
        (output, rows)
    }

    /// Writes the markdown of the last call for `identity` into `dir`
    pub async fn write_diagnostics_sql_md(&self, dir: &Path, identity: &str) -> Result<PathBuf> {
        let entry = self
            .diagnostics
            .entries()
            .iter()
            .rev()
            .find(|e| e.exec_identity == identity)
            .ok_or_else(|| OrchError::Other(format!("No execution recorded for {identity}")))?;
        let path = dir.join(format!("{identity}-diagnostics.md"));
        tokio::fs::write(&path, format!("# {identity} diagnostics\n\n{}", entry.markdown())).await?;
        Ok(path)
    }
}
