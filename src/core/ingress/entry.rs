//! Ingress entries and the sources a workflow is started from

use super::group::ScreeningIngressGroup;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One file observed in the ingress directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressEntry {
    pub fs_path: PathBuf,
}

impl IngressEntry {
    pub fn new(fs_path: impl Into<PathBuf>) -> Self {
        Self {
            fs_path: fs_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.fs_path
    }
}

/// What triggered a workflow invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IngressSource {
    /// A completed screening group
    Group(ScreeningIngressGroup),
    /// A single standalone arrival
    Entry(IngressEntry),
    /// A drained batch of standalone entries
    Entries(Vec<IngressEntry>),
}

impl IngressSource {
    /// Every file path covered by this source, in arrival order
    pub fn fs_paths(&self) -> Vec<PathBuf> {
        match self {
            IngressSource::Group(group) => group.entries.iter().map(|e| e.fs_path.clone()).collect(),
            IngressSource::Entry(entry) => vec![entry.fs_path.clone()],
            IngressSource::Entries(entries) => entries.iter().map(|e| e.fs_path.clone()).collect(),
        }
    }

    /// Short label for log output
    pub fn label(&self) -> String {
        match self {
            IngressSource::Group(group) => format!("group {}", group.group_id),
            IngressSource::Entry(entry) => entry.fs_path.display().to_string(),
            IngressSource::Entries(entries) => format!("{} entries", entries.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_serializes_camel_case() {
        let entry = IngressEntry::new("/sftp/qe/ingress/a.csv");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["fsPath"], "/sftp/qe/ingress/a.csv");
    }

    #[test]
    fn test_entries_source_paths() {
        let source = IngressSource::Entries(vec![IngressEntry::new("/a.csv"), IngressEntry::new("/b.csv")]);
        assert_eq!(source.fs_paths(), vec![PathBuf::from("/a.csv"), PathBuf::from("/b.csv")]);
        assert_eq!(source.label(), "2 entries");
    }
}
