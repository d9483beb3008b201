//! Ingest sources and the SQL each one contributes to a session
//!
//! A source is a closed set of variants; every step dispatches on the
//! variant to obtain its structural, content or export SQL.

use super::reference::ReferenceTable;
use super::shape::ContentShape;
use crate::core::sql::admin::{
    session_entry_insert_dml, session_issue_insert_dml, IssueRow, ADMIN_TABLES, ORCH_SESSION_ISSUE,
};
use crate::core::sql::{quoted_literal, table_name_from};
use crate::domain::{IdGenerator, IssueId, IssueType, SessionEntryId, SessionId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Where a source's rows come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceNature {
    Csv,
    ExcelSheet,
    Reference,
    Error,
}

impl fmt::Display for SourceNature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SourceNature::Csv => "csv",
            SourceNature::ExcelSheet => "excel-sheet",
            SourceNature::Reference => "reference",
            SourceNature::Error => "error",
        };
        f.write_str(label)
    }
}

/// Known worksheet of a partner workbook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetKind {
    Content(ContentShape),
    QuestionReference,
    AnswerReference,
}

impl SheetKind {
    /// Maps a worksheet name to its kind; unknown sheets yield `None`
    pub fn from_sheet_name(sheet: &str) -> Option<Self> {
        match sheet {
            "Admin_Demographic" => Some(SheetKind::Content(ContentShape::AdminDemographic)),
            "Screening" => Some(SheetKind::Content(ContentShape::Screening)),
            "QE_Admin_Data" => Some(SheetKind::Content(ContentShape::QeAdminData)),
            "Question_Reference" => Some(SheetKind::QuestionReference),
            "Answer_Reference" => Some(SheetKind::AnswerReference),
            _ => None,
        }
    }
}

/// A potential ingest source resolved from an ingress path
#[derive(Debug, Clone, PartialEq)]
pub enum IngestSource {
    Csv {
        uri: String,
        table_name: String,
        shape: ContentShape,
    },
    ExcelSheet {
        uri: String,
        sheet: String,
        table_name: String,
        kind: SheetKind,
    },
    /// Worksheet with no known handling; records a structural issue
    ExcelSheetTodo {
        uri: String,
        sheet: String,
        table_name: String,
    },
    Reference {
        uri: String,
        table: ReferenceTable,
    },
    /// Path that matched a known pattern but could not be opened
    Error {
        uri: String,
        table_name: String,
        message: String,
    },
}

/// Identifiers an ingestable's SQL is bound to
pub struct IngestContext<'a> {
    pub session_id: &'a SessionId,
    pub entry_id: &'a SessionEntryId,
    pub ids: &'a IdGenerator,
}

impl IngestContext<'_> {
    pub fn session_entry_insert_dml(&self, uri: &str, table_name: &str) -> String {
        session_entry_insert_dml(self.entry_id, self.session_id, uri, table_name)
    }

    /// Issue row bound to this entry, with a freshly generated issue ID
    pub fn issue_insert_dml(
        &self,
        message: &str,
        issue_type: &IssueType,
        invalid_value: Option<&str>,
    ) -> String {
        let issue_id: IssueId = self.ids.next_id();
        session_issue_insert_dml(&IssueRow {
            issue_id: &issue_id,
            session_id: self.session_id,
            entry_id: self.entry_id,
            issue_type: issue_type.as_str(),
            message,
            invalid_value,
        })
    }

    fn issue_select_prefix(&self, issue_type: &IssueType) -> String {
        format!(
            "INSERT INTO {ORCH_SESSION_ISSUE} (orch_session_issue_id, session_id, session_entry_id, issue_type, issue_message, issue_row, issue_column, invalid_value)\nSELECT CAST(gen_random_uuid() AS VARCHAR), {}, {}, {}",
            quoted_literal(self.session_id.as_str()),
            quoted_literal(self.entry_id.as_str()),
            quoted_literal(issue_type.as_str()),
        )
    }

    fn missing_table_sql(&self, table: &str, uri: &str) -> String {
        format!(
            "{}, {}, NULL, NULL, {}\nWHERE NOT EXISTS (SELECT 1 FROM information_schema.tables WHERE table_name = {});",
            self.issue_select_prefix(&IssueType::Structural),
            quoted_literal(&format!("Unable to load {uri} into table {table}")),
            quoted_literal(uri),
            quoted_literal(table),
        )
    }

    fn missing_columns_sql(&self, table: &str, required: &[&str], uri: &str) -> String {
        if required.is_empty() {
            return format!("-- {table}: no required columns");
        }
        let values = required
            .iter()
            .map(|c| format!("({})", quoted_literal(c)))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "{}, 'Required column ' || required.column_name || ' is missing in {table}.', NULL, required.column_name, {}\nFROM (VALUES {values}) AS required(column_name)\nWHERE EXISTS (SELECT 1 FROM information_schema.tables WHERE table_name = {})\n  AND UPPER(required.column_name) NOT IN (SELECT UPPER(column_name) FROM information_schema.columns WHERE table_name = {});",
            self.issue_select_prefix(&IssueType::Structural),
            quoted_literal(uri),
            quoted_literal(table),
            quoted_literal(table),
        )
    }

    fn not_null_sql(&self, table: &str, column: &str) -> String {
        format!(
            "{}, {}, src_row, {}, NULL\nFROM (SELECT row_number() OVER () AS src_row, {column} FROM {table})\nWHERE {column} IS NULL OR TRIM({column}) = '';",
            self.issue_select_prefix(&IssueType::Content),
            quoted_literal(&format!("{column} is required but empty")),
            quoted_literal(column),
        )
    }
}

fn file_name(uri: &str) -> String {
    Path::new(uri)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| uri.to_string())
}

impl IngestSource {
    /// CSV source for `path`, with a table name derived from the file stem
    pub fn csv(path: &Path, shape: ContentShape) -> Self {
        IngestSource::Csv {
            uri: path.to_string_lossy().into_owned(),
            table_name: stem_table_name(path),
            shape,
        }
    }

    pub fn reference(home: &str, table: ReferenceTable) -> Self {
        IngestSource::Reference {
            uri: table.uri(home),
            table,
        }
    }

    /// Every reference table under `home`
    pub fn references(home: &str) -> Vec<Self> {
        ReferenceTable::ALL
            .iter()
            .map(|table| IngestSource::reference(home, *table))
            .collect()
    }

    pub fn uri(&self) -> &str {
        match self {
            IngestSource::Csv { uri, .. }
            | IngestSource::ExcelSheet { uri, .. }
            | IngestSource::ExcelSheetTodo { uri, .. }
            | IngestSource::Reference { uri, .. }
            | IngestSource::Error { uri, .. } => uri,
        }
    }

    pub fn table_name(&self) -> &str {
        match self {
            IngestSource::Csv { table_name, .. }
            | IngestSource::ExcelSheet { table_name, .. }
            | IngestSource::ExcelSheetTodo { table_name, .. }
            | IngestSource::Error { table_name, .. } => table_name,
            IngestSource::Reference { table, .. } => table.table_name(),
        }
    }

    pub fn nature(&self) -> SourceNature {
        match self {
            IngestSource::Csv { .. } => SourceNature::Csv,
            IngestSource::ExcelSheet { .. } | IngestSource::ExcelSheetTodo { .. } => {
                SourceNature::ExcelSheet
            }
            IngestSource::Reference { .. } => SourceNature::Reference,
            IngestSource::Error { .. } => SourceNature::Error,
        }
    }

    /// Content shape fed by this source, if any
    pub fn shape(&self) -> Option<ContentShape> {
        match self {
            IngestSource::Csv { shape, .. } => Some(*shape),
            IngestSource::ExcelSheet {
                kind: SheetKind::Content(shape),
                ..
            } => Some(*shape),
            _ => None,
        }
    }

    fn required_columns(&self) -> &'static [&'static str] {
        match self {
            IngestSource::Reference { table, .. } => table.required_columns(),
            _ => self.shape().map(|s| s.required_columns()).unwrap_or(&[]),
        }
    }

    /// Whether this source loads a table (and so can be exported)
    pub fn loads_table(&self) -> bool {
        !matches!(
            self,
            IngestSource::ExcelSheetTodo { .. } | IngestSource::Error { .. }
        )
    }

    /// Load SQL, wrapped with the session-entry insert and structural checks
    pub fn structural_sql(&self, ctx: &IngestContext<'_>) -> String {
        let uri = self.uri();
        let table = self.table_name();
        let mut sql = vec![ctx.session_entry_insert_dml(uri, table)];

        match self {
            IngestSource::Csv { .. } | IngestSource::Reference { .. } => {
                sql.push(format!(
                    "CREATE OR REPLACE TABLE {table} AS SELECT * FROM read_csv_auto({}, header = true, all_varchar = true);",
                    quoted_literal(uri)
                ));
            }
            IngestSource::ExcelSheet { sheet, .. } => {
                sql.push("INSTALL spatial; LOAD spatial;".to_string());
                sql.push(format!(
                    "CREATE OR REPLACE TABLE {table} AS SELECT * FROM st_read({}, layer = {}, open_options = ['HEADERS=FORCE', 'FIELD_TYPES=STRING']);",
                    quoted_literal(uri),
                    quoted_literal(sheet)
                ));
            }
            IngestSource::ExcelSheetTodo { sheet, .. } => {
                let message = format!(
                    "Excel workbook '{}' sheet '{sheet}' has not been implemented yet.",
                    file_name(uri)
                );
                sql.push(ctx.issue_insert_dml(&message, &IssueType::Structural, Some(uri)));
                return sql.join("\n");
            }
            IngestSource::Error { message, .. } => {
                sql.push(ctx.issue_insert_dml(message, &IssueType::Structural, Some(uri)));
                return sql.join("\n");
            }
        }

        sql.push(ctx.missing_table_sql(table, uri));
        sql.push(ctx.missing_columns_sql(table, self.required_columns(), uri));
        sql.join("\n")
    }

    /// Content validation and aggregation SQL; only valid after structural checks passed
    pub fn content_sql(&self, ctx: &IngestContext<'_>) -> String {
        let table = self.table_name();
        let Some(shape) = self.shape() else {
            return format!("-- {table}: no content validation");
        };

        let mut sql: Vec<String> = shape
            .not_null_columns()
            .iter()
            .map(|column| ctx.not_null_sql(table, column))
            .collect();

        let columns = shape.required_columns().join(", ");
        sql.push(format!(
            "INSERT INTO {} ({columns}) SELECT {columns} FROM {table};",
            shape.aggregate_table()
        ));
        sql.join("\n")
    }

    /// Copies this source's table into the attached `schema`
    pub fn export_sql(&self, schema: &str) -> String {
        let table = self.table_name();
        if self.loads_table() {
            format!("CREATE TABLE {schema}.{table} AS SELECT * FROM {table};")
        } else {
            format!("-- {table}: nothing to export")
        }
    }
}

/// Table name for uploaded content derived from free text
///
/// Names that would shadow an aggregate, reference or admin table get a
/// `src_` prefix.
pub fn source_table_name(text: &str) -> String {
    let name = table_name_from(text);
    let reserved = ContentShape::ALL.iter().any(|s| s.aggregate_table() == name)
        || ReferenceTable::ALL.iter().any(|t| t.table_name() == name)
        || ADMIN_TABLES.contains(&name.as_str());
    if reserved {
        format!("src_{name}")
    } else {
        name
    }
}

/// Table name for a file path, from its stem
pub fn stem_table_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    source_table_name(&stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn ctx_fixture() -> (SessionId, SessionEntryId, IdGenerator) {
        (
            SessionId::new("sess").unwrap(),
            SessionEntryId::new("entry").unwrap(),
            IdGenerator::deterministic(),
        )
    }

    #[test]
    fn test_csv_structural_sql_loads_and_checks() {
        let (session_id, entry_id, ids) = ctx_fixture();
        let ctx = IngestContext {
            session_id: &session_id,
            entry_id: &entry_id,
            ids: &ids,
        };
        let source = IngestSource::csv(
            &PathBuf::from("/in/screening-A_questions.csv"),
            ContentShape::Screening,
        );
        assert_eq!(source.table_name(), "screening_a_questions");
        assert_eq!(source.nature(), SourceNature::Csv);

        let sql = source.structural_sql(&ctx);
        assert!(sql.starts_with("INSERT INTO orch_session_entry"));
        assert!(sql.contains("read_csv_auto('/in/screening-A_questions.csv'"));
        assert!(sql.contains("NOT EXISTS (SELECT 1 FROM information_schema.tables WHERE table_name = 'screening_a_questions')"));
        assert!(sql.contains("('QUESTION_CODE')"));
    }

    #[test]
    fn test_todo_sheet_records_issue_without_load() {
        let (session_id, entry_id, ids) = ctx_fixture();
        let ctx = IngestContext {
            session_id: &session_id,
            entry_id: &entry_id,
            ids: &ids,
        };
        let source = IngestSource::ExcelSheetTodo {
            uri: "/in/book.xlsx".to_string(),
            sheet: "Notes".to_string(),
            table_name: "book_notes".to_string(),
        };
        let sql = source.structural_sql(&ctx);
        assert!(sql.contains("sheet ''Notes'' has not been implemented yet."));
        assert!(!sql.contains("CREATE OR REPLACE TABLE"));
        assert!(!source.loads_table());
        assert_eq!(source.export_sql("resource_db"), "-- book_notes: nothing to export");
    }

    #[test]
    fn test_content_sql_feeds_aggregate() {
        let (session_id, entry_id, ids) = ctx_fixture();
        let ctx = IngestContext {
            session_id: &session_id,
            entry_id: &entry_id,
            ids: &ids,
        };
        let source = IngestSource::csv(&PathBuf::from("/in/qe_admin_data.csv"), ContentShape::QeAdminData);
        let sql = source.content_sql(&ctx);
        assert!(sql.contains("'Content'"));
        assert_eq!(source.table_name(), "src_qe_admin_data");
        assert!(sql.contains("INSERT INTO qe_admin_data (PAT_MRN_ID, FACILITY_ID"));
        assert!(sql.contains("FROM src_qe_admin_data;"));
    }

    #[test]
    fn test_reference_source_has_no_content_sql() {
        let (session_id, entry_id, ids) = ctx_fixture();
        let ctx = IngestContext {
            session_id: &session_id,
            entry_id: &entry_id,
            ids: &ids,
        };
        let source = IngestSource::reference("/ref", ReferenceTable::RaceReference);
        assert_eq!(source.nature(), SourceNature::Reference);
        assert_eq!(source.content_sql(&ctx), "-- race_reference: no content validation");
        assert_eq!(
            source.export_sql("resource_db"),
            "CREATE TABLE resource_db.race_reference AS SELECT * FROM race_reference;"
        );
    }

    #[test]
    fn test_sheet_kind_mapping() {
        assert_eq!(
            SheetKind::from_sheet_name("Screening"),
            Some(SheetKind::Content(ContentShape::Screening))
        );
        assert_eq!(SheetKind::from_sheet_name("Answer_Reference"), Some(SheetKind::AnswerReference));
        assert_eq!(SheetKind::from_sheet_name("Sheet1"), None);
    }

    #[test]
    fn test_nature_serializes_kebab_case() {
        assert_eq!(serde_json::to_string(&SourceNature::ExcelSheet).unwrap(), "\"excel-sheet\"");
    }
}
