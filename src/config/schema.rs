//! Configuration schema types
//!
//! Every section is optional in the TOML file; missing keys fall back to the
//! defaults used by the `orchctl` command line.

use crate::config::SecretString;
use crate::domain::QeId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Public location of the fixed code-system reference tables
pub const DEFAULT_REFERENCE_DATA_HOME: &str =
    "https://raw.githubusercontent.com/qe-collaborative-services/1115-hub/main/src/ahc-hrsn-elt/reference-data";

/// Main orchestration configuration
///
/// This is the root configuration structure that maps to `orchctl.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Inbound directory layout and watch behaviour
    #[serde(default)]
    pub ingress: IngressConfig,

    /// Embedded database command-line engines
    #[serde(default)]
    pub engine: EngineConfig,

    /// Which diagnostics artifacts are produced
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,

    /// FHIR publish target
    #[serde(default)]
    pub publish: PublishConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl OrchConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.ingress.validate()?;
        self.engine.validate()?;
        self.publish.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Inbound directory configuration
///
/// A partner's files land in `<sftp_root>/<qe>/ingress`; sessions write to
/// `<sftp_root>/<qe>/egress/<session id>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngressConfig {
    /// Root of all partner directories
    #[serde(default = "default_sftp_root")]
    pub sftp_root: PathBuf,

    /// Partner directory name under `sftp_root`
    #[serde(default)]
    pub qe: Option<String>,

    /// Local directory or URL holding the reference CSV tables
    #[serde(default = "default_reference_data_home")]
    pub reference_data_home: String,

    /// Keep polling the inbound directory instead of draining it once
    #[serde(default)]
    pub watch: bool,

    /// Poll interval in watch mode
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Move consumed files into the session's `.consumed` directory instead of deleting them
    #[serde(default = "default_true")]
    pub archive_consumed: bool,

    /// Number of members that complete a screening group
    #[serde(default = "default_group_size")]
    pub group_size: usize,
}

impl IngressConfig {
    fn validate(&self) -> Result<(), String> {
        if self.sftp_root.as_os_str().is_empty() {
            return Err("ingress.sftp_root cannot be empty".to_string());
        }
        if let Some(qe) = &self.qe {
            if qe.trim().is_empty() || qe.contains(['/', '\\']) {
                return Err(format!(
                    "ingress.qe '{qe}' must be a single non-empty directory name"
                ));
            }
        }
        if self.reference_data_home.trim().is_empty() {
            return Err("ingress.reference_data_home cannot be empty".to_string());
        }
        if self.poll_interval_ms == 0 {
            return Err("ingress.poll_interval_ms must be > 0".to_string());
        }
        if self.group_size == 0 {
            return Err("ingress.group_size must be > 0".to_string());
        }
        Ok(())
    }

    /// Partner root `<sftp_root>/<qe>`
    pub fn qe_root(&self) -> Option<PathBuf> {
        self.qe.as_ref().map(|qe| self.sftp_root.join(qe))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            sftp_root: default_sftp_root(),
            qe: None,
            reference_data_home: default_reference_data_home(),
            watch: false,
            poll_interval_ms: default_poll_interval_ms(),
            archive_consumed: true,
            group_size: default_group_size(),
        }
    }
}

/// Command-line SQL engines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// DuckDB executable
    #[serde(default = "default_duckdb_cmd")]
    pub duckdb_cmd: String,

    /// SQLite executable used to stamp the resource database
    #[serde(default = "default_sqlite_cmd")]
    pub sqlite_cmd: String,

    /// SQL prepended to every batch
    #[serde(default = "default_preamble_sql")]
    pub preamble_sql: String,

    /// Generate sequential identifiers (reproducible SQL and diagnostics)
    #[serde(default)]
    pub deterministic_ids: bool,
}

impl EngineConfig {
    fn validate(&self) -> Result<(), String> {
        if self.duckdb_cmd.trim().is_empty() {
            return Err("engine.duckdb_cmd cannot be empty".to_string());
        }
        if self.sqlite_cmd.trim().is_empty() {
            return Err("engine.sqlite_cmd cannot be empty".to_string());
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            duckdb_cmd: default_duckdb_cmd(),
            sqlite_cmd: default_sqlite_cmd(),
            preamble_sql: default_preamble_sql(),
            deterministic_ids: false,
        }
    }
}

/// Optional diagnostics artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// Export `diagnostics.xlsx` through the spatial extension
    #[serde(default = "default_true")]
    pub excel: bool,

    /// Extract `fhir.json` and write `fhir.http`
    #[serde(default = "default_true")]
    pub fhir: bool,

    /// Copy validated content into `resource.sqlite.db`
    #[serde(default = "default_true")]
    pub resource_db: bool,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            excel: true,
            fhir: true,
            resource_db: true,
        }
    }
}

/// FHIR publish configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Host and path of the FHIR bundle endpoint, with or without scheme
    #[serde(default)]
    pub fhir_endpoint: Option<String>,

    /// Processing agent sent with each bundle
    #[serde(default)]
    pub qe_id: QeId,

    /// Bearer token (optional)
    /// Stored securely in memory and automatically zeroized on drop
    #[serde(default, skip_serializing)]
    pub auth_token: Option<SecretString>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl PublishConfig {
    fn validate(&self) -> Result<(), String> {
        if self.timeout_seconds == 0 {
            return Err("publish.timeout_seconds must be > 0".to_string());
        }
        if self.fhir_endpoint.is_some() {
            self.resolved_endpoint()?;
        }
        Ok(())
    }

    /// Full publish URL: `https://<endpoint>?processingAgent=<QE>`
    ///
    /// Returns `Ok(None)` when publishing is disabled.
    ///
    /// # Examples
    ///
    /// ```
    /// use hrsn_orch::config::PublishConfig;
    /// use hrsn_orch::domain::QeId;
    ///
    /// let publish = PublishConfig {
    ///     fhir_endpoint: Some("fhir.example.org/Bundle".to_string()),
    ///     qe_id: QeId::Hixny,
    ///     ..Default::default()
    /// };
    /// let url = publish.resolved_endpoint().unwrap().unwrap();
    /// assert_eq!(url.as_str(), "https://fhir.example.org/Bundle?processingAgent=HIXNY");
    /// ```
    pub fn resolved_endpoint(&self) -> Result<Option<Url>, String> {
        let Some(endpoint) = self.fhir_endpoint.as_deref().map(str::trim) else {
            return Ok(None);
        };
        if endpoint.is_empty() {
            return Err("publish.fhir_endpoint cannot be empty".to_string());
        }
        let raw = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!("https://{endpoint}")
        };
        let mut url = Url::parse(&raw)
            .map_err(|e| format!("Invalid publish.fhir_endpoint '{endpoint}': {e}"))?;
        url.query_pairs_mut()
            .append_pair("processingAgent", self.qe_id.as_str());
        Ok(Some(url))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            fhir_endpoint: None,
            qe_id: QeId::default(),
            auth_token: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default)]
    pub local_enabled: bool,

    /// Local log directory
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }
        if self.local_enabled && self.local_path.trim().is_empty() {
            return Err("logging.local_path cannot be empty when local logging is enabled".to_string());
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: false,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_sftp_root() -> PathBuf {
    PathBuf::from("/SFTP")
}

fn default_reference_data_home() -> String {
    DEFAULT_REFERENCE_DATA_HOME.to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_group_size() -> usize {
    3
}

fn default_duckdb_cmd() -> String {
    "duckdb".to_string()
}

fn default_sqlite_cmd() -> String {
    "sqlite3".to_string()
}

fn default_preamble_sql() -> String {
    "SET autoinstall_known_extensions=true;\nSET autoload_known_extensions=true;".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_local_path() -> String {
    "./logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_default_config_is_valid() {
        let config = OrchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ingress.sftp_root, PathBuf::from("/SFTP"));
        assert_eq!(config.ingress.group_size, 3);
        assert!(config.ingress.archive_consumed);
        assert_eq!(config.publish.qe_id, QeId::Healthelink);
        assert_eq!(config.engine.duckdb_cmd, "duckdb");
    }

    #[test]
    fn test_application_config_validation() {
        let mut config = ApplicationConfig::default();
        assert!(config.validate().is_ok());

        config.log_level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ingress_qe_must_be_directory_name() {
        let mut config = IngressConfig {
            qe: Some("qe1".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.qe_root(), Some(PathBuf::from("/SFTP/qe1")));

        config.qe = Some("../etc".to_string());
        assert!(config.validate().is_err());

        config.qe = Some("  ".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ingress_zero_group_size_rejected() {
        let config = IngressConfig {
            group_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_publish_endpoint_adds_scheme_and_agent() {
        let publish = PublishConfig {
            fhir_endpoint: Some("fhir.example.org/api/Bundle".to_string()),
            ..Default::default()
        };
        let url = publish.resolved_endpoint().unwrap().unwrap();
        assert_eq!(
            url.as_str(),
            "https://fhir.example.org/api/Bundle?processingAgent=HEALTHELINK"
        );
    }

    #[test]
    fn test_publish_endpoint_keeps_explicit_scheme() {
        let publish = PublishConfig {
            fhir_endpoint: Some("http://127.0.0.1:8080/Bundle".to_string()),
            qe_id: QeId::Bronx,
            ..Default::default()
        };
        let url = publish.resolved_endpoint().unwrap().unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/Bundle?processingAgent=BRONX");
    }

    #[test]
    fn test_publish_disabled_without_endpoint() {
        assert!(PublishConfig::default().resolved_endpoint().unwrap().is_none());
    }

    #[test]
    fn test_publish_token_not_serialized() {
        let toml_content = r#"
[publish]
fhir_endpoint = "fhir.example.org/Bundle"
auth_token = "secret-token"
"#;
        let config: OrchConfig = toml::from_str(toml_content).unwrap();
        let token = config.publish.auth_token.as_ref().unwrap();
        assert_eq!(token.expose_secret(), "secret-token");

        let rendered = toml::to_string(&config).unwrap();
        assert!(!rendered.contains("secret-token"));
    }

    #[test]
    fn test_logging_config_validation() {
        let mut config = LoggingConfig::default();
        assert!(!config.local_enabled);
        assert!(config.validate().is_ok());

        config.local_rotation = "weekly".to_string();
        assert!(config.validate().is_err());
    }
}
