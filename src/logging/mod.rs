//! Logging and observability
//!
//! Structured `tracing` output to the console and, optionally, to a JSON
//! rolling file. Session and step events carry `session_id` and `step` fields
//! so one session can be followed across concurrent workflows.
//!
//! # Example
//!
//! ```no_run
//! use hrsn_orch::logging::init_logging;
//! use hrsn_orch::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!(session_id = "abc", "Session started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard, LOG_FILE_NAME};

/// Log entry into a pipeline step
///
/// # Example
///
/// ```no_run
/// use hrsn_orch::log_step_enter;
///
/// log_step_enter!("0000-session", "ingest");
/// ```
#[macro_export]
macro_rules! log_step_enter {
    ($session_id:expr, $step:expr) => {
        tracing::info!(
            session_id = %$session_id,
            step = %$step,
            "Entering step"
        );
    };
}

/// Log the completion of a pipeline step
///
/// # Example
///
/// ```no_run
/// use hrsn_orch::log_step_exit;
/// use std::time::Duration;
///
/// log_step_exit!("0000-session", "ingest", Duration::from_millis(120));
/// ```
#[macro_export]
macro_rules! log_step_exit {
    ($session_id:expr, $step:expr, $duration:expr) => {
        tracing::info!(
            session_id = %$session_id,
            step = %$step,
            duration_ms = $duration.as_millis() as u64,
            "Step completed"
        );
    };
}

/// Log an error that halted or degraded a session
///
/// # Example
///
/// ```no_run
/// use hrsn_orch::log_session_error;
/// use hrsn_orch::domain::OrchError;
///
/// let error = OrchError::step("init", "duckdb exited with 1");
/// log_session_error!("0000-session", &error, "Session halted");
/// ```
#[macro_export]
macro_rules! log_session_error {
    ($session_id:expr, $error:expr, $context:expr) => {
        tracing::error!(
            session_id = %$session_id,
            error = %$error,
            context = $context,
            "Session error"
        );
    };
}
