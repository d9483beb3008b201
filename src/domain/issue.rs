//! Ingestion issues
//!
//! Issues are rows in `orch_session_issue`. They are read back from the
//! engine as JSON after the ingest step and attached to the ingestable that
//! produced them.

use super::ids::{IssueId, SessionEntryId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of an issue at the time it was recorded
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IssueType {
    /// The source could not be loaded into its expected shape
    Structural,
    /// A business-rule or content validation failed after load
    Content,
    /// Any other label written by custom SQL
    Other(String),
}

impl IssueType {
    pub fn as_str(&self) -> &str {
        match self {
            IssueType::Structural => "Structural",
            IssueType::Content => "Content",
            IssueType::Other(label) => label,
        }
    }
}

impl From<String> for IssueType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Structural" => IssueType::Structural,
            "Content" => IssueType::Content,
            _ => IssueType::Other(value),
        }
    }
}

impl From<IssueType> for String {
    fn from(value: IssueType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One issue row as emitted by the issue read-back query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub session_entry_id: SessionEntryId,
    pub orch_session_issue_id: IssueId,
    pub issue_type: IssueType,
    pub issue_message: String,
    #[serde(default)]
    pub invalid_value: Option<String>,
}

impl Issue {
    /// Issue synthesized by the engine rather than read from the database
    pub fn synthetic(
        session_entry_id: SessionEntryId,
        issue_id: IssueId,
        issue_type: IssueType,
        message: impl Into<String>,
        invalid_value: Option<String>,
    ) -> Self {
        Self {
            session_entry_id,
            orch_session_issue_id: issue_id,
            issue_type,
            issue_message: message.into(),
            invalid_value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_deserializes_engine_row() {
        let row = r#"{
            "session_entry_id": "e1",
            "orch_session_issue_id": "i1",
            "issue_type": "Structural",
            "issue_message": "Missing column PAT_MRN_ID",
            "invalid_value": "/tmp/screening.csv"
        }"#;
        let issue: Issue = serde_json::from_str(row).unwrap();
        assert_eq!(issue.issue_type, IssueType::Structural);
        assert_eq!(issue.session_entry_id.as_str(), "e1");
        assert_eq!(issue.invalid_value.as_deref(), Some("/tmp/screening.csv"));
    }

    #[test]
    fn test_issue_null_invalid_value() {
        let row = r#"{"session_entry_id":"e","orch_session_issue_id":"i","issue_type":"Data Validation","issue_message":"m","invalid_value":null}"#;
        let issue: Issue = serde_json::from_str(row).unwrap();
        assert_eq!(issue.issue_type, IssueType::Other("Data Validation".to_string()));
        assert!(issue.invalid_value.is_none());
    }

    #[test]
    fn test_issue_type_round_trips_as_plain_string() {
        let json = serde_json::to_string(&IssueType::Content).unwrap();
        assert_eq!(json, "\"Content\"");
    }
}
