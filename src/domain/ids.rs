//! Domain identifier types
//!
//! Newtype wrappers keep session, entry and issue identifiers from being mixed
//! up when they are spliced into SQL and diagnostics.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates the identifier from a string
            pub fn new(id: impl Into<String>) -> Result<Self, String> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(concat!($label, " cannot be empty").to_string());
                }
                Ok(Self(id))
            }

            /// Returns the identifier as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value.to_string())
            }
        }
    };
}

uuid_id!(
    /// Identifies one run of the pipeline; scopes every admin-table row it writes
    SessionId,
    "Session ID"
);
uuid_id!(
    /// Identifies one ingest source within a session
    SessionEntryId,
    "Session entry ID"
);
uuid_id!(
    /// Identifies one recorded issue
    IssueId,
    "Issue ID"
);
uuid_id!(
    /// Identifies the device (host) that ran a session
    DeviceId,
    "Device ID"
);

/// Generates identifiers, optionally deterministically for reproducible SQL
///
/// Session IDs name egress directories that outlive the process, so
/// [`session_id`](Self::session_id) is always random; only the IDs scoped
/// inside a session follow the deterministic counter.
///
/// # Examples
///
/// ```
/// use hrsn_orch::domain::ids::{IdGenerator, SessionEntryId};
///
/// let ids = IdGenerator::deterministic();
/// let first: SessionEntryId = ids.next_id();
/// assert_eq!(first.as_str(), "00000000-0000-0000-0000-000000000001");
/// assert_ne!(ids.session_id(), ids.session_id());
/// ```
#[derive(Debug, Default)]
pub struct IdGenerator {
    deterministic: bool,
    counter: AtomicU64,
}

impl IdGenerator {
    /// Random v4 UUIDs
    pub fn random() -> Self {
        Self::default()
    }

    /// Sequential UUIDs starting at 1
    pub fn deterministic() -> Self {
        Self {
            deterministic: true,
            counter: AtomicU64::new(0),
        }
    }

    /// Creates a generator from the `engine.deterministic_ids` setting
    pub fn from_flag(deterministic: bool) -> Self {
        if deterministic {
            Self::deterministic()
        } else {
            Self::random()
        }
    }

    /// A fresh random session ID, never repeated across runs
    pub fn session_id(&self) -> SessionId {
        SessionId::from(Uuid::new_v4())
    }

    /// Next identifier of the requested type
    pub fn next_id<T: From<Uuid>>(&self) -> T {
        if self.deterministic {
            let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
            T::from(Uuid::from_u128(n as u128))
        } else {
            T::from(Uuid::new_v4())
        }
    }
}

/// Qualified entity (QE) partner identifiers accepted as processing agents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
#[value(rename_all = "UPPER")]
pub enum QeId {
    Bronx,
    Healtheconn,
    Grrhio,
    Healthix,
    Healthelink,
    Hixny,
}

impl QeId {
    /// All partner identifiers
    pub const ALL: [QeId; 6] = [
        QeId::Bronx,
        QeId::Healtheconn,
        QeId::Grrhio,
        QeId::Healthix,
        QeId::Healthelink,
        QeId::Hixny,
    ];

    /// Wire form used in the `processingAgent` query parameter
    pub fn as_str(&self) -> &'static str {
        match self {
            QeId::Bronx => "BRONX",
            QeId::Healtheconn => "HEALTHECONN",
            QeId::Grrhio => "GRRHIO",
            QeId::Healthix => "HEALTHIX",
            QeId::Healthelink => "HEALTHELINK",
            QeId::Hixny => "HIXNY",
        }
    }
}

impl Default for QeId {
    fn default() -> Self {
        QeId::Healthelink
    }
}

impl fmt::Display for QeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QeId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QeId::ALL
            .iter()
            .find(|qe| qe.as_str().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| {
                format!(
                    "Invalid QE ID '{s}'. Must be one of: {}",
                    QeId::ALL.map(|q| q.as_str()).join(", ")
                )
            })
    }
}
