//! Orchestration session state
//!
//! An [`OrchSession`] is created per workflow invocation and never reused. It
//! carries the identifiers every admin-table row is scoped by, the custom SQL
//! hooks registered for the session, and the step transitions recorded as
//! the pipeline runs.

use crate::core::sql::admin::{device_insert_dml, orch_session_insert_dml, ORCH_SESSION_STATE};
use crate::core::sql::{optional_literal, quoted_literal};
use crate::domain::{DeviceId, IdGenerator, SessionId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Version recorded on every session
pub const ORCHESTRATE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Points in the pipeline where custom SQL may be registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlCatalog {
    BeforeInit,
    AfterInit,
    BeforeFinalize,
    AfterFinalize,
}

impl fmt::Display for SqlCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SqlCatalog::BeforeInit => "before-init",
            SqlCatalog::AfterInit => "after-init",
            SqlCatalog::BeforeFinalize => "before-finalize",
            SqlCatalog::AfterFinalize => "after-finalize",
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateTransition {
    pub from_state: String,
    pub to_state: String,
    pub transitioned_at: DateTime<Utc>,
    pub reason: Option<String>,
}

/// Host the session ran on
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub device_id: DeviceId,
    pub name: String,
    pub sysinfo: serde_json::Value,
}

impl DeviceInfo {
    /// Device derived from the host name; the ID is stable per host
    pub fn current() -> Self {
        let name = std::env::var("HOSTNAME")
            .ok()
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| "localhost".to_string());
        let digest = Sha256::digest(name.as_bytes());
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        Self {
            device_id: DeviceId::from(Uuid::from_bytes(bytes)),
            sysinfo: serde_json::json!({
                "os": std::env::consts::OS,
                "arch": std::env::consts::ARCH,
                "family": std::env::consts::FAMILY,
                "pid": std::process::id(),
            }),
            name,
        }
    }
}

#[derive(Debug)]
pub struct OrchSession {
    pub session_id: SessionId,
    pub version: String,
    pub device: DeviceInfo,
    pub started_at: DateTime<Utc>,
    pub ids: Arc<IdGenerator>,
    catalog: HashMap<SqlCatalog, Vec<String>>,
    transitions: Vec<StateTransition>,
}

impl OrchSession {
    pub fn new(session_id: SessionId, ids: Arc<IdGenerator>) -> Self {
        Self {
            session_id,
            version: ORCHESTRATE_VERSION.to_string(),
            device: DeviceInfo::current(),
            started_at: Utc::now(),
            ids,
            catalog: HashMap::new(),
            transitions: Vec::new(),
        }
    }

    /// Adds custom SQL to run at `catalog`
    pub fn register_sql(&mut self, catalog: SqlCatalog, sql: impl Into<String>) {
        self.catalog.entry(catalog).or_default().push(sql.into());
    }

    /// Registered SQL for `catalog`, or a comment when there is none
    pub fn catalog_sql(&self, catalog: SqlCatalog) -> String {
        match self.catalog.get(&catalog) {
            Some(statements) if !statements.is_empty() => statements.join("\n"),
            _ => format!("-- no {catalog} SQL registered"),
        }
    }

    fn current_state(&self) -> String {
        self.transitions
            .last()
            .map(|t| t.to_state.clone())
            .unwrap_or_else(|| "NONE".to_string())
    }

    fn transition(&mut self, to_state: String, reason: Option<String>) {
        let from_state = self.current_state();
        self.transitions.push(StateTransition {
            from_state,
            to_state,
            transitioned_at: Utc::now(),
            reason,
        });
    }

    pub fn enter(&mut self, step: &str) {
        self.transition(format!("ENTER({step})"), None);
    }

    pub fn exit(&mut self, step: &str) {
        self.transition(format!("EXIT({step})"), None);
    }

    /// Records a step that halted the pipeline
    pub fn fail(&mut self, step: &str, reason: impl Into<String>) {
        self.transition(format!("FAIL({step})"), Some(reason.into()));
    }

    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    /// Inserts for every recorded transition
    pub fn state_sql_dml(&self) -> String {
        if self.transitions.is_empty() {
            return "-- no state transitions recorded".to_string();
        }
        self.transitions
            .iter()
            .map(|t| {
                let state_id: Uuid = self.ids.next_id();
                format!(
                    "INSERT INTO {ORCH_SESSION_STATE} (orch_session_state_id, session_id, from_state, to_state, transition_result, transition_reason, transitioned_at) VALUES ({}, {}, {}, {}, NULL, {}, {});",
                    quoted_literal(&state_id.to_string()),
                    quoted_literal(self.session_id.as_str()),
                    quoted_literal(&t.from_state),
                    quoted_literal(&t.to_state),
                    optional_literal(t.reason.as_deref()),
                    quoted_literal(&t.transitioned_at.to_rfc3339()),
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn device_sql_dml(&self) -> String {
        device_insert_dml(&self.device.device_id, &self.device.name, &self.device.sysinfo.to_string())
    }

    pub fn orch_session_sql_dml(&self, qualified_entity_id: Option<&str>) -> String {
        orch_session_insert_dml(&self.session_id, &self.device.device_id, &self.version, qualified_entity_id)
    }
}
