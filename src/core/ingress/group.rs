//! Ingress grouping engine
//!
//! Files named `*screening-<groupID>_<component>.csv` belong to a multi-file
//! upload set. Members accumulate per group ID until the expected count is
//! reached; the completion callback then fires exactly once and the group is
//! evicted. A later file carrying a completed group ID is treated as a
//! standalone entry.

use super::entry::IngressEntry;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

/// Members expected in a complete screening group
pub const DEFAULT_GROUP_SIZE: usize = 3;

fn group_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)screening-([^_/\\]+)_([^/\\]+)\.csv$").expect("group pattern is valid")
    })
}

/// Group ID and component encoded in a file name, if it follows the convention
pub fn group_key(path: &Path) -> Option<(String, String)> {
    let name = path.file_name()?.to_string_lossy();
    let captures = group_pattern().captures(&name)?;
    Some((captures[1].to_string(), captures[2].to_string()))
}

/// Files accumulated under one group ID
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreeningIngressGroup {
    #[serde(rename = "groupID")]
    pub group_id: String,
    /// Component of the first member
    pub component: String,
    pub entries: Vec<IngressEntry>,
}

/// Callback fired with a group once it is complete
pub type GroupCompleteFn = Arc<dyn Fn(ScreeningIngressGroup) + Send + Sync>;

#[derive(Default)]
struct GroupState {
    pending: HashMap<String, ScreeningIngressGroup>,
    completed: HashSet<String>,
}

/// Tracks partial screening groups by group ID
pub struct ScreeningIngressGroups {
    group_size: usize,
    on_complete: GroupCompleteFn,
    state: Mutex<GroupState>,
}

impl ScreeningIngressGroups {
    pub fn new(on_complete: GroupCompleteFn) -> Self {
        Self::with_group_size(DEFAULT_GROUP_SIZE, on_complete)
    }

    pub fn with_group_size(group_size: usize, on_complete: GroupCompleteFn) -> Self {
        Self {
            group_size: group_size.max(1),
            on_complete,
            state: Mutex::new(GroupState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GroupState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records `entry` if it belongs to a group
    ///
    /// Returns a snapshot of the entry's group, or `None` when the caller
    /// should treat the entry as standalone.
    pub fn potential(&self, entry: IngressEntry) -> Option<ScreeningIngressGroup> {
        self.potential_with(entry, None)
    }

    /// Like [`potential`](Self::potential) but fires `on_complete` instead of
    /// the engine-wide callback when this entry completes its group
    pub fn potential_with(
        &self,
        entry: IngressEntry,
        on_complete: Option<GroupCompleteFn>,
    ) -> Option<ScreeningIngressGroup> {
        let (group_id, component) = group_key(entry.path())?;

        let (snapshot, completed) = {
            let mut state = self.lock();
            if state.completed.contains(&group_id) {
                tracing::warn!(
                    group_id = %group_id,
                    fs_path = %entry.fs_path.display(),
                    "Entry arrived for an already completed group; treating as standalone"
                );
                return None;
            }

            let group = state
                .pending
                .entry(group_id.clone())
                .or_insert_with(|| ScreeningIngressGroup {
                    group_id: group_id.clone(),
                    component,
                    entries: Vec::new(),
                });
            group.entries.push(entry);
            let snapshot = group.clone();

            let completed = snapshot.entries.len() >= self.group_size;
            if completed {
                state.pending.remove(&group_id);
                state.completed.insert(group_id.clone());
            }
            (snapshot, completed)
        };

        tracing::debug!(
            group_id = %snapshot.group_id,
            members = snapshot.entries.len(),
            expected = self.group_size,
            "Ingress entry grouped"
        );

        if completed {
            tracing::info!(group_id = %snapshot.group_id, "Ingress group complete");
            let callback = on_complete.unwrap_or_else(|| self.on_complete.clone());
            callback(snapshot.clone());
        }

        Some(snapshot)
    }

    /// Groups still waiting for members
    pub fn pending(&self) -> Vec<ScreeningIngressGroup> {
        let mut groups: Vec<_> = self.lock().pending.values().cloned().collect();
        groups.sort_by(|a, b| a.group_id.cmp(&b.group_id));
        groups
    }

    /// Evicts the incomplete groups matching `predicate`
    ///
    /// Taken groups count as completed, so later members are standalone.
    pub fn take_pending<P>(&self, predicate: P) -> Vec<ScreeningIngressGroup>
    where
        P: Fn(&ScreeningIngressGroup) -> bool,
    {
        let mut state = self.lock();
        let ids: Vec<String> = state
            .pending
            .values()
            .filter(|group| predicate(group))
            .map(|group| group.group_id.clone())
            .collect();

        let mut taken = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(group) = state.pending.remove(&id) {
                state.completed.insert(id);
                taken.push(group);
            }
        }
        taken.sort_by(|a, b| a.group_id.cmp(&b.group_id));
        taken
    }

    pub fn is_completed(&self, group_id: &str) -> bool {
        self.lock().completed.contains(group_id)
    }
}

impl std::fmt::Debug for ScreeningIngressGroups {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ScreeningIngressGroups")
            .field("group_size", &self.group_size)
            .field("pending", &state.pending.len())
            .field("completed", &state.completed.len())
            .finish()
    }
}
