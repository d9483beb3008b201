//! Domain types shared by every layer of the orchestration engine.
//!
//! # Overview
//!
//! - **Strongly-typed identifiers** ([`SessionId`], [`SessionEntryId`], [`IssueId`])
//! - **Partner identifiers** ([`QeId`])
//! - **Ingestion issues** ([`Issue`], [`IssueType`])
//! - **Error types** ([`OrchError`]) and the [`Result`] alias
//!
//! # Error Handling
//!
//! ```rust
//! use hrsn_orch::domain::{OrchError, Result};
//!
//! fn example() -> Result<()> {
//!     let config = hrsn_orch::config::OrchConfig::default();
//!     config.validate().map_err(OrchError::Configuration)?;
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod ids;
pub mod issue;
pub mod result;

pub use errors::OrchError;
pub use ids::{DeviceId, IdGenerator, IssueId, QeId, SessionEntryId, SessionId};
pub use issue::{Issue, IssueType};
pub use result::Result;
