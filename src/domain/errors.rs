//! Domain error types
//!
//! All errors are domain-specific and don't expose third-party types.
//! Structural and content issues found in partner files are *not* errors:
//! they are data, recorded in the session's issue table. Only conditions that
//! stop a step (or the whole process) are represented here.

use thiserror::Error;

/// Main orchestration error type
#[derive(Debug, Error)]
pub enum OrchError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Ingress directory / grouping errors
    #[error("Ingress error: {0}")]
    Ingress(String),

    /// Session or working-directory errors
    #[error("Session error: {0}")]
    Session(String),

    /// Failure to invoke the SQL engine process
    #[error("Execution error: {0}")]
    Execution(String),

    /// A pipeline step halted the session
    #[error("Step {step} failed: {message}")]
    Step { step: String, message: String },

    /// FHIR publish errors
    #[error("Publish error: {0}")]
    Publish(String),

    /// Ingest source resolution errors
    #[error("Source error: {0}")]
    Source(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl OrchError {
    /// Creates a step error for the given step label
    pub fn step(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Step {
            step: step.into(),
            message: message.into(),
        }
    }

    /// Whether this error halted a pipeline step
    pub fn is_step_failure(&self) -> bool {
        matches!(self, Self::Step { .. })
    }
}

impl From<std::io::Error> for OrchError {
    fn from(err: std::io::Error) -> Self {
        OrchError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for OrchError {
    fn from(err: serde_json::Error) -> Self {
        OrchError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for OrchError {
    fn from(err: serde_yaml::Error) -> Self {
        OrchError::Serialization(format!("YAML: {err}"))
    }
}

impl From<toml::de::Error> for OrchError {
    fn from(err: toml::de::Error) -> Self {
        OrchError::Configuration(format!("TOML parse error: {err}"))
    }
}

impl From<calamine::Error> for OrchError {
    fn from(err: calamine::Error) -> Self {
        OrchError::Source(format!("Excel workbook: {err}"))
    }
}

impl From<reqwest::Error> for OrchError {
    fn from(err: reqwest::Error) -> Self {
        OrchError::Publish(err.to_string())
    }
}
