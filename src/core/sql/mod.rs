//! SQL text generation
//!
//! Statements are plain strings handed to the SQL engine as one batch per
//! step; nothing here talks to a database.

pub mod admin;
pub mod literal;
pub mod views;

pub use admin::{issue_read_back_sql, session_entry_insert_dml, session_issue_insert_dml, IssueRow, ADMIN_TABLES};
pub use literal::{optional_literal, quoted_literal, table_name_from};
pub use views::{fhir_bundle_view, issue_classification_view, FHIR_BUNDLE_VIEW, ISSUE_CLASSIFICATION_VIEW};

/// Opening marker for SQL omitted from the diagnostics markdown
pub const MD_IGNORE_START: &str = "-- diagnostics-md-ignore-start";
/// Closing marker for SQL omitted from the diagnostics markdown
pub const MD_IGNORE_FINISH: &str = "-- diagnostics-md-ignore-finish";

/// Wraps `sql` in diagnostics-md-ignore markers labelled `label`
pub fn md_ignored(label: &str, sql: &str) -> String {
    format!("{MD_IGNORE_START} \"{label}\"\n{sql}\n{MD_IGNORE_FINISH} \"{label}\"")
}
