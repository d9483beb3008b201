//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::OrchConfig;
use super::secret::secret_string;
use crate::domain::errors::OrchError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "orchctl.toml";

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into OrchConfig
/// 4. Applies environment variable overrides (ORCHCTL_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns an error if the file is missing or unreadable, a referenced
/// environment variable is unset, parsing fails or validation fails.
///
/// # Examples
///
/// ```no_run
/// use hrsn_orch::config::loader::load_config;
///
/// let config = load_config("orchctl.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<OrchConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(OrchError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        OrchError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    let contents = substitute_env_vars(&contents)?;

    let mut config: OrchConfig = toml::from_str(&contents)
        .map_err(|e| OrchError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    finish(&mut config)?;
    Ok(config)
}

/// Loads the configuration, falling back to built-in defaults when the
/// default `orchctl.toml` is absent
///
/// An explicitly named file that does not exist is still an error.
pub fn load_config_or_default(path: impl AsRef<Path>) -> Result<OrchConfig> {
    let path = path.as_ref();
    if path.exists() {
        return load_config(path);
    }
    if path != PathBuf::from(DEFAULT_CONFIG_FILE) {
        return Err(OrchError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    tracing::debug!(path = %path.display(), "No configuration file, using defaults");
    let mut config = OrchConfig::default();
    finish(&mut config)?;
    Ok(config)
}

fn finish(config: &mut OrchConfig) -> Result<()> {
    apply_env_overrides(config)?;

    config.validate().map_err(|e| {
        OrchError::Configuration(format!("Configuration validation failed: {}", e))
    })
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("placeholder pattern is valid")
    })
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are copied untouched.
///
/// # Errors
///
/// Returns an error if a referenced environment variable is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = placeholder_regex();
    let mut result = String::new();
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{}}}", var_name);
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(OrchError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

fn env_bool(name: &str) -> Result<Option<bool>> {
    match std::env::var(name) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| OrchError::Configuration(format!("{name} must be true or false, got '{val}'"))),
        Err(_) => Ok(None),
    }
}

fn env_number<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| OrchError::Configuration(format!("{name} must be a number, got '{val}'"))),
        Err(_) => Ok(None),
    }
}

/// Applies environment variable overrides using the ORCHCTL_* prefix
///
/// Environment variables follow the pattern: ORCHCTL_<SECTION>_<KEY>
/// For example: ORCHCTL_INGRESS_QE, ORCHCTL_PUBLISH_FHIR_ENDPOINT
fn apply_env_overrides(config: &mut OrchConfig) -> Result<()> {
    if let Ok(val) = std::env::var("ORCHCTL_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    // Ingress overrides
    if let Ok(val) = std::env::var("ORCHCTL_INGRESS_SFTP_ROOT") {
        config.ingress.sftp_root = PathBuf::from(val);
    }
    if let Ok(val) = std::env::var("ORCHCTL_INGRESS_QE") {
        config.ingress.qe = Some(val);
    }
    if let Ok(val) = std::env::var("ORCHCTL_INGRESS_REFERENCE_DATA_HOME") {
        config.ingress.reference_data_home = val;
    }
    if let Some(watch) = env_bool("ORCHCTL_INGRESS_WATCH")? {
        config.ingress.watch = watch;
    }
    if let Some(interval) = env_number("ORCHCTL_INGRESS_POLL_INTERVAL_MS")? {
        config.ingress.poll_interval_ms = interval;
    }
    if let Some(archive) = env_bool("ORCHCTL_INGRESS_ARCHIVE_CONSUMED")? {
        config.ingress.archive_consumed = archive;
    }

    // Engine overrides
    if let Ok(val) = std::env::var("ORCHCTL_ENGINE_DUCKDB_CMD") {
        config.engine.duckdb_cmd = val;
    }
    if let Ok(val) = std::env::var("ORCHCTL_ENGINE_SQLITE_CMD") {
        config.engine.sqlite_cmd = val;
    }
    if let Some(deterministic) = env_bool("ORCHCTL_ENGINE_DETERMINISTIC_IDS")? {
        config.engine.deterministic_ids = deterministic;
    }

    // Publish overrides
    if let Ok(val) = std::env::var("ORCHCTL_PUBLISH_FHIR_ENDPOINT") {
        config.publish.fhir_endpoint = Some(val);
    }
    if let Ok(val) = std::env::var("ORCHCTL_PUBLISH_QE_ID") {
        config.publish.qe_id = val.parse().map_err(OrchError::Configuration)?;
    }
    if let Ok(val) = std::env::var("ORCHCTL_PUBLISH_AUTH_TOKEN") {
        config.publish.auth_token = Some(secret_string(val));
    }
    if let Some(timeout) = env_number("ORCHCTL_PUBLISH_TIMEOUT_SECONDS")? {
        config.publish.timeout_seconds = timeout;
    }

    // Logging overrides
    if let Some(enabled) = env_bool("ORCHCTL_LOGGING_LOCAL_ENABLED")? {
        config.logging.local_enabled = enabled;
    }
    if let Ok(val) = std::env::var("ORCHCTL_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}
