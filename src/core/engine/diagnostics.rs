//! Execution diagnostics accumulated across one session
//!
//! The log is owned by the session's execution shell; every engine call
//! appends one entry. The finalize step reads it to produce the diagnostics
//! JSON and markdown and to persist `orch_session_exec` rows.

use crate::core::sql::admin::ORCH_SESSION_EXEC;
use crate::core::sql::{optional_literal, quoted_literal, MD_IGNORE_FINISH, MD_IGNORE_START};
use crate::domain::{IdGenerator, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One engine invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsEntry {
    pub exec_identity: String,
    pub command: String,
    pub exec_status: i32,
    pub exec_error_text: Option<String>,
    pub sql: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl DiagnosticsEntry {
    pub fn is_error(&self) -> bool {
        self.exec_status != 0
    }

    /// Markdown section for this call
    pub fn markdown(&self) -> String {
        let mut md = format!(
            "## {}\n\n- command: `{}`\n- status: {}\n- started: {}\n- finished: {}\n\n```sql\n{}\n```\n",
            self.exec_identity,
            self.command,
            self.exec_status,
            self.started_at.to_rfc3339(),
            self.finished_at.to_rfc3339(),
            strip_md_ignored(&self.sql).trim_end(),
        );
        if let Some(stderr) = self.exec_error_text.as_deref().filter(|s| !s.trim().is_empty()) {
            md.push_str(&format!("\n### stderr\n\n```\n{}\n```\n", stderr.trim_end()));
        }
        md
    }
}

/// Removes every block between ignore-start and ignore-finish markers
pub fn strip_md_ignored(sql: &str) -> String {
    let mut depth = 0usize;
    let mut kept = Vec::new();
    for line in sql.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with(MD_IGNORE_START) {
            depth += 1;
            continue;
        }
        if trimmed.starts_with(MD_IGNORE_FINISH) {
            depth = depth.saturating_sub(1);
            continue;
        }
        if depth == 0 {
            kept.push(line);
        }
    }
    kept.join("\n")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiagnosticsLog {
    entries: Vec<DiagnosticsEntry>,
}

impl DiagnosticsLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: DiagnosticsEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[DiagnosticsEntry] {
        &self.entries
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(DiagnosticsEntry::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_error()).count()
    }

    /// Markdown body for every call, in order
    pub fn markdown(&self) -> String {
        self.entries
            .iter()
            .map(DiagnosticsEntry::markdown)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// `orch_session_exec` rows for every call so far
    pub fn exec_insert_dml(&self, session_id: &SessionId, ids: &IdGenerator) -> String {
        if self.entries.is_empty() {
            return "-- no executions recorded".to_string();
        }
        self.entries
            .iter()
            .map(|entry| {
                let exec_id: Uuid = ids.next_id();
                format!(
                    "INSERT INTO {ORCH_SESSION_EXEC} (orch_session_exec_id, exec_nature, session_id, exec_identity, exec_code, exec_status, input_text, exec_error_text) VALUES ({}, 'SQL', {}, {}, {}, {}, {}, {});",
                    quoted_literal(&exec_id.to_string()),
                    quoted_literal(session_id.as_str()),
                    quoted_literal(&entry.exec_identity),
                    quoted_literal(&entry.command),
                    entry.exec_status,
                    quoted_literal(&entry.sql),
                    optional_literal(entry.exec_error_text.as_deref()),
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
