//! Configuration management for `orchctl`.
//!
//! # Overview
//!
//! The orchestrator reads an optional TOML file with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `ORCHCTL_<SECTION>_<KEY>` environment overrides
//! - Default values for every setting
//! - Validation on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use hrsn_orch::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("orchctl.toml")?;
//!
//! println!("SFTP root: {}", config.ingress.sftp_root.display());
//! if let Some(url) = config.publish.resolved_endpoint()? {
//!     println!("Publishing FHIR bundles to {url}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level
//! - [`IngressConfig`] - SFTP root, partner directory, reference data, watch mode
//! - [`EngineConfig`] - DuckDB/SQLite executables and preamble SQL
//! - [`DiagnosticsConfig`] - Optional diagnostics artifacts
//! - [`PublishConfig`] - FHIR endpoint, processing agent, bearer token
//! - [`LoggingConfig`] - Local JSON log files
//!
//! # Example Configuration
//!
//! ```toml
//! [ingress]
//! sftp_root = "/SFTP"
//! qe = "healthelink"
//!
//! [publish]
//! fhir_endpoint = "fhir.example.org/Bundle"
//! qe_id = "HEALTHELINK"
//! auth_token = "${ORCHCTL_FHIR_TOKEN}"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

pub use loader::{load_config, load_config_or_default, DEFAULT_CONFIG_FILE};
pub use schema::{
    ApplicationConfig, DiagnosticsConfig, EngineConfig, IngressConfig, LoggingConfig,
    OrchConfig, PublishConfig, DEFAULT_REFERENCE_DATA_HOME,
};
pub use secret::{secret_string, secret_string_opt, SecretString, SecretValue};
