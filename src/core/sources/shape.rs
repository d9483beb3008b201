//! Expected column shapes of partner content
//!
//! Each shape names the columns a file must carry to pass structural
//! validation and the aggregate table its rows are appended to once content
//! validation has run.

use serde::{Deserialize, Serialize};
use std::fmt;

const SCREENING_COLUMNS: &[&str] = &[
    "PAT_MRN_ID",
    "FACILITY_ID",
    "ENCOUNTER_ID",
    "ENCOUNTER_CLASS_CODE",
    "ENCOUNTER_CLASS_CODE_SYSTEM",
    "ENCOUNTER_STATUS_CODE_DESCRIPTION",
    "ENCOUNTER_TYPE_CODE",
    "ENCOUNTER_TYPE_CODE_SYSTEM",
    "SCREENING_STATUS_CODE",
    "SCREENING_CODE_SYSTEM_NAME",
    "RECORDED_TIME",
    "QUESTION_CODE",
    "QUESTION_CODE_DESCRIPTION",
    "ANSWER_CODE",
    "ANSWER_CODE_DESCRIPTION",
];

const DEMOGRAPHIC_COLUMNS: &[&str] = &[
    "PAT_MRN_ID",
    "FACILITY_ID",
    "MPI_ID",
    "FIRST_NAME",
    "MIDDLE_NAME",
    "LAST_NAME",
    "PAT_BIRTH_DATE",
    "GENDER_IDENTITY_CODE_DESCRIPTION",
    "SEX_AT_BIRTH_CODE",
    "SEX_AT_BIRTH_CODE_DESCRIPTION",
    "SEX_AT_BIRTH_CODE_SYSTEM",
    "SEXUAL_ORIENTATION_CODE",
    "SEXUAL_ORIENTATION_DESCRIPTION",
    "SEXUAL_ORIENTATION_CODE_SYSTEM_NAME",
    "RACE_CODE",
    "RACE_CODE_DESCRIPTION",
    "RACE_CODE_SYSTEM_NAME",
    "ETHNICITY_CODE",
    "ETHNICITY_CODE_DESCRIPTION",
    "ETHNICITY_CODE_SYSTEM_NAME",
    "PREFERRED_LANGUAGE_CODE",
    "MEDICAID_CIN",
    "CONSENT",
    "ADDRESS1",
    "ADDRESS2",
    "CITY",
    "STATE",
    "ZIP",
];

const QE_ADMIN_COLUMNS: &[&str] = &[
    "PAT_MRN_ID",
    "FACILITY_ID",
    "FACILITY_LONG_NAME",
    "ORGANIZATION_TYPE",
    "FACILITY_ADDRESS1",
    "FACILITY_ADDRESS2",
    "FACILITY_CITY",
    "FACILITY_STATE",
    "FACILITY_ZIP",
];

/// Shape of partner content that feeds an aggregate table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentShape {
    /// Screening questions and answers per encounter
    Screening,
    /// Patient demographics
    AdminDemographic,
    /// Facility and organization data
    QeAdminData,
}

impl ContentShape {
    pub const ALL: [ContentShape; 3] = [
        ContentShape::Screening,
        ContentShape::AdminDemographic,
        ContentShape::QeAdminData,
    ];

    /// Table that accumulates validated rows of this shape
    pub fn aggregate_table(&self) -> &'static str {
        match self {
            ContentShape::Screening => "screening",
            ContentShape::AdminDemographic => "demographic_data",
            ContentShape::QeAdminData => "qe_admin_data",
        }
    }

    /// Columns required for structural validation
    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            ContentShape::Screening => SCREENING_COLUMNS,
            ContentShape::AdminDemographic => DEMOGRAPHIC_COLUMNS,
            ContentShape::QeAdminData => QE_ADMIN_COLUMNS,
        }
    }

    /// Columns that must carry a value in every row
    pub fn not_null_columns(&self) -> &'static [&'static str] {
        match self {
            ContentShape::Screening => &[
                "PAT_MRN_ID",
                "FACILITY_ID",
                "ENCOUNTER_ID",
                "QUESTION_CODE",
                "RECORDED_TIME",
            ],
            ContentShape::AdminDemographic => &["PAT_MRN_ID", "FACILITY_ID", "LAST_NAME"],
            ContentShape::QeAdminData => &["PAT_MRN_ID", "FACILITY_ID", "FACILITY_LONG_NAME"],
        }
    }

    /// DDL for the aggregate table; every column is text
    pub fn aggregate_ddl(&self) -> String {
        let columns = self
            .required_columns()
            .iter()
            .map(|c| format!("    {c} VARCHAR"))
            .collect::<Vec<_>>()
            .join(",\n");
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{columns}\n);",
            self.aggregate_table()
        )
    }
}

impl fmt::Display for ContentShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.aggregate_table())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_ddl_lists_required_columns() {
        let ddl = ContentShape::QeAdminData.aggregate_ddl();
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS qe_admin_data ("));
        for column in ContentShape::QeAdminData.required_columns() {
            assert!(ddl.contains(&format!("{column} VARCHAR")));
        }
    }

    #[test]
    fn test_not_null_columns_are_required() {
        for shape in ContentShape::ALL {
            for column in shape.not_null_columns() {
                assert!(shape.required_columns().contains(column), "{shape}: {column}");
            }
        }
    }
}
