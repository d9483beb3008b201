//! Admin tables shared by every session
//!
//! All rows carry a session identifier so concurrent sessions writing into one
//! physical database can be told apart.

use super::literal::{optional_literal, quoted_literal};
use crate::domain::{DeviceId, IssueId, SessionEntryId, SessionId};

pub const DEVICE: &str = "device";
pub const ORCH_SESSION: &str = "orch_session";
pub const ORCH_SESSION_ENTRY: &str = "orch_session_entry";
pub const ORCH_SESSION_STATE: &str = "orch_session_state";
pub const ORCH_SESSION_EXEC: &str = "orch_session_exec";
pub const ORCH_SESSION_ISSUE: &str = "orch_session_issue";
pub const ORCH_SESSION_DIAGNOSTIC_TEXT: &str = "orch_session_diagnostic_text";

/// Admin tables copied into the resource database
pub const ADMIN_TABLES: [&str; 6] = [
    DEVICE,
    ORCH_SESSION,
    ORCH_SESSION_ENTRY,
    ORCH_SESSION_STATE,
    ORCH_SESSION_EXEC,
    ORCH_SESSION_ISSUE,
];

/// DDL for the admin tables
pub fn admin_tables_ddl() -> String {
    format!(
        r#"CREATE TABLE IF NOT EXISTS {DEVICE} (
    device_id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    state TEXT NOT NULL,
    boundary TEXT NOT NULL,
    state_sysinfo TEXT,
    created_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP
);
CREATE TABLE IF NOT EXISTS {ORCH_SESSION} (
    orch_session_id TEXT PRIMARY KEY NOT NULL,
    device_id TEXT NOT NULL,
    version TEXT NOT NULL,
    orch_started_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP,
    orch_finished_at TIMESTAMPTZ,
    qualified_entity_id TEXT,
    args_json TEXT,
    diagnostics_json TEXT,
    diagnostics_md TEXT
);
CREATE TABLE IF NOT EXISTS {ORCH_SESSION_ENTRY} (
    orch_session_entry_id TEXT PRIMARY KEY NOT NULL,
    session_id TEXT NOT NULL,
    ingest_src TEXT NOT NULL,
    ingest_table_name TEXT,
    elaboration TEXT
);
CREATE TABLE IF NOT EXISTS {ORCH_SESSION_STATE} (
    orch_session_state_id TEXT PRIMARY KEY NOT NULL,
    session_id TEXT NOT NULL,
    session_entry_id TEXT,
    from_state TEXT NOT NULL,
    to_state TEXT NOT NULL,
    transition_result TEXT,
    transition_reason TEXT,
    transitioned_at TIMESTAMPTZ,
    elaboration TEXT
);
CREATE TABLE IF NOT EXISTS {ORCH_SESSION_EXEC} (
    orch_session_exec_id TEXT PRIMARY KEY NOT NULL,
    exec_nature TEXT NOT NULL,
    session_id TEXT NOT NULL,
    session_entry_id TEXT,
    parent_exec_id TEXT,
    exec_identity TEXT,
    exec_code TEXT NOT NULL,
    exec_status INTEGER NOT NULL,
    input_text TEXT,
    exec_error_text TEXT,
    output_text TEXT,
    output_nature TEXT,
    narrative_md TEXT,
    elaboration TEXT
);
CREATE TABLE IF NOT EXISTS {ORCH_SESSION_ISSUE} (
    orch_session_issue_id TEXT PRIMARY KEY NOT NULL,
    session_id TEXT NOT NULL,
    session_entry_id TEXT,
    issue_type TEXT NOT NULL,
    issue_message TEXT NOT NULL,
    issue_row INTEGER,
    issue_column TEXT,
    invalid_value TEXT,
    remediation TEXT,
    elaboration TEXT
);"#
    )
}

/// Session-scoped indexes on the admin tables
pub fn admin_table_indexes() -> String {
    [
        (ORCH_SESSION_ENTRY, "session_id"),
        (ORCH_SESSION_STATE, "session_id"),
        (ORCH_SESSION_EXEC, "session_id"),
        (ORCH_SESSION_ISSUE, "session_id"),
        (ORCH_SESSION_ISSUE, "session_entry_id"),
    ]
    .iter()
    .map(|(table, column)| {
        format!("CREATE INDEX IF NOT EXISTS idx_{table}__{column} ON {table} ({column});")
    })
    .collect::<Vec<_>>()
    .join("\n")
}

/// Flattened view of sessions, entries and their issues
pub fn diagnostic_text_view() -> String {
    format!(
        r#"CREATE VIEW IF NOT EXISTS {ORCH_SESSION_DIAGNOSTIC_TEXT} AS
SELECT
    ises.orch_session_id,
    ises.orch_started_at,
    isee.ingest_src,
    isee.ingest_table_name,
    isi.issue_type,
    isi.issue_message,
    isi.issue_row,
    isi.issue_column,
    isi.invalid_value,
    isi.remediation
FROM {ORCH_SESSION} AS ises
JOIN {ORCH_SESSION_ENTRY} AS isee ON ises.orch_session_id = isee.session_id
LEFT JOIN {ORCH_SESSION_ISSUE} AS isi ON isee.orch_session_entry_id = isi.session_entry_id;"#
    )
}

pub fn device_insert_dml(device_id: &DeviceId, name: &str, state_sysinfo: &str) -> String {
    format!(
        "INSERT INTO {DEVICE} (device_id, name, state, boundary, state_sysinfo) VALUES ({}, {}, 'SINGLETON', 'UNKNOWN', {}) ON CONFLICT DO NOTHING;",
        quoted_literal(device_id.as_str()),
        quoted_literal(name),
        quoted_literal(state_sysinfo),
    )
}

pub fn orch_session_insert_dml(
    session_id: &SessionId,
    device_id: &DeviceId,
    version: &str,
    qualified_entity_id: Option<&str>,
) -> String {
    format!(
        "INSERT INTO {ORCH_SESSION} (orch_session_id, device_id, version, qualified_entity_id) VALUES ({}, {}, {}, {});",
        quoted_literal(session_id.as_str()),
        quoted_literal(device_id.as_str()),
        quoted_literal(version),
        optional_literal(qualified_entity_id),
    )
}

pub fn session_entry_insert_dml(
    entry_id: &SessionEntryId,
    session_id: &SessionId,
    ingest_src: &str,
    table_name: &str,
) -> String {
    format!(
        "INSERT INTO {ORCH_SESSION_ENTRY} (orch_session_entry_id, session_id, ingest_src, ingest_table_name) VALUES ({}, {}, {}, {});",
        quoted_literal(entry_id.as_str()),
        quoted_literal(session_id.as_str()),
        quoted_literal(ingest_src),
        quoted_literal(table_name),
    )
}

/// One issue row written directly (not derived from a query)
#[derive(Debug, Clone)]
pub struct IssueRow<'a> {
    pub issue_id: &'a IssueId,
    pub session_id: &'a SessionId,
    pub entry_id: &'a SessionEntryId,
    pub issue_type: &'a str,
    pub message: &'a str,
    pub invalid_value: Option<&'a str>,
}

pub fn session_issue_insert_dml(row: &IssueRow<'_>) -> String {
    format!(
        "INSERT INTO {ORCH_SESSION_ISSUE} (orch_session_issue_id, session_id, session_entry_id, issue_type, issue_message, invalid_value) VALUES ({}, {}, {}, {}, {}, {});",
        quoted_literal(row.issue_id.as_str()),
        quoted_literal(row.session_id.as_str()),
        quoted_literal(row.entry_id.as_str()),
        quoted_literal(row.issue_type),
        quoted_literal(row.message),
        optional_literal(row.invalid_value),
    )
}

/// Query that reads back every issue recorded for a session
pub fn issue_read_back_sql(session_id: &SessionId) -> String {
    format!(
        "SELECT session_entry_id, orch_session_issue_id, issue_type, issue_message, invalid_value FROM {ORCH_SESSION_ISSUE} WHERE session_id = {};",
        quoted_literal(session_id.as_str())
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_ddl_creates_every_table() {
        let ddl = admin_tables_ddl();
        for table in ADMIN_TABLES {
            assert!(
                ddl.contains(&format!("CREATE TABLE IF NOT EXISTS {table} (")),
                "missing {table}"
            );
        }
    }

    #[test]
    fn test_issue_insert_escapes_message() {
        let issue_id = IssueId::new("i1").unwrap();
        let session_id = SessionId::new("s1").unwrap();
        let entry_id = SessionEntryId::new("e1").unwrap();
        let sql = session_issue_insert_dml(&IssueRow {
            issue_id: &issue_id,
            session_id: &session_id,
            entry_id: &entry_id,
            issue_type: "Structural",
            message: "Sheet 'Other' is not supported",
            invalid_value: None,
        });
        assert!(sql.contains("'Sheet ''Other'' is not supported'"));
        assert!(sql.ends_with("NULL);"));
    }

    #[test]
    fn test_issue_read_back_is_session_scoped() {
        let session_id = SessionId::new("abc").unwrap();
        let sql = issue_read_back_sql(&session_id);
        assert_eq!(
            sql,
            "SELECT session_entry_id, orch_session_issue_id, issue_type, issue_message, invalid_value FROM orch_session_issue WHERE session_id = 'abc';"
        );
    }
}
