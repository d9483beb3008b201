//! Fixed code-system reference tables
//!
//! Loaded into every session from `reference_data_home`, which is either a
//! local directory or an HTTP(S) base URL.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceTable {
    AhcCrossWalk,
    EncounterClassReference,
    EncounterStatusCodeReference,
    EncounterTypeCodeReference,
    ScreeningStatusCodeReference,
    GenderIdentityReference,
    AdministrativeSexReference,
    SexAtBirthReference,
    SexualOrientationReference,
    BusinessRules,
    RaceReference,
    EthnicityReference,
    PreferredLanguageReference,
}

/// Columns of `business_rules` read by the issue classification view
pub const BUSINESS_RULES_COLUMNS: &[&str] = &[
    "Worksheet",
    "Field",
    "Required",
    "True Rejection",
    "Warning Layer",
    "Resolved by QE/QCS",
];

impl ReferenceTable {
    pub const ALL: [ReferenceTable; 13] = [
        ReferenceTable::AhcCrossWalk,
        ReferenceTable::EncounterClassReference,
        ReferenceTable::EncounterStatusCodeReference,
        ReferenceTable::EncounterTypeCodeReference,
        ReferenceTable::ScreeningStatusCodeReference,
        ReferenceTable::GenderIdentityReference,
        ReferenceTable::AdministrativeSexReference,
        ReferenceTable::SexAtBirthReference,
        ReferenceTable::SexualOrientationReference,
        ReferenceTable::BusinessRules,
        ReferenceTable::RaceReference,
        ReferenceTable::EthnicityReference,
        ReferenceTable::PreferredLanguageReference,
    ];

    pub fn table_name(&self) -> &'static str {
        match self {
            ReferenceTable::AhcCrossWalk => "ahc_cross_walk",
            ReferenceTable::EncounterClassReference => "encounter_class_reference",
            ReferenceTable::EncounterStatusCodeReference => "encounter_status_code_reference",
            ReferenceTable::EncounterTypeCodeReference => "encounter_type_code_reference",
            ReferenceTable::ScreeningStatusCodeReference => "screening_status_code_reference",
            ReferenceTable::GenderIdentityReference => "gender_identity_reference",
            ReferenceTable::AdministrativeSexReference => "administrative_sex_reference",
            ReferenceTable::SexAtBirthReference => "sex_at_birth_reference",
            ReferenceTable::SexualOrientationReference => "sexual_orientation_reference",
            ReferenceTable::BusinessRules => "business_rules",
            ReferenceTable::RaceReference => "race_reference",
            ReferenceTable::EthnicityReference => "ethnicity_reference",
            ReferenceTable::PreferredLanguageReference => "preferred_language_reference",
        }
    }

    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            ReferenceTable::BusinessRules => BUSINESS_RULES_COLUMNS,
            _ => &[],
        }
    }

    /// Location of `<table>.csv` under the reference home
    ///
    /// # Examples
    ///
    /// ```
    /// use hrsn_orch::core::sources::ReferenceTable;
    ///
    /// let uri = ReferenceTable::RaceReference.uri("https://example.org/ref/");
    /// assert_eq!(uri, "https://example.org/ref/race_reference.csv");
    /// ```
    pub fn uri(&self, home: &str) -> String {
        let file = format!("{}.csv", self.table_name());
        if home.starts_with("http://") || home.starts_with("https://") {
            format!("{}/{}", home.trim_end_matches('/'), file)
        } else {
            Path::new(home).join(file).to_string_lossy().into_owned()
        }
    }
}

/// Placeholder so the classification view binds when the rules failed to load
pub fn business_rules_placeholder_ddl() -> String {
    let columns = BUSINESS_RULES_COLUMNS
        .iter()
        .map(|c| format!("\"{c}\" VARCHAR"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({columns});",
        ReferenceTable::BusinessRules.table_name()
    )
}
