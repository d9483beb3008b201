//! CLI interface and argument parsing
//!
//! This module provides the `orchctl` command-line interface using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// orchctl - HRSN screening data orchestration
#[derive(Parser, Debug)]
#[command(name = "orchctl")]
#[command(version, about, long_about = None)]
#[command(author = "HRSN Orchestration Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "orchctl.toml", env = "ORCHCTL_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "ORCHCTL_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process a partner's inbound files, once or continuously
    Run(commands::run::RunArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Show recent sessions and their outcomes
    Status(commands::status::StatusArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::QeId;

    #[test]
    fn test_cli_parse_run() {
        let cli = Cli::parse_from(["orchctl", "run"]);
        assert_eq!(cli.config, "orchctl.toml");
        assert!(matches!(cli.command, Commands::Run(_)));
    }

    #[test]
    fn test_cli_parse_run_flags() {
        let cli = Cli::parse_from([
            "orchctl",
            "run",
            "--qe",
            "healthelink",
            "--sftp-root",
            "/tmp/SFTP",
            "--publish-fhir",
            "fhir.example.org/Bundle",
            "--publish-fhir-qe-id",
            "HIXNY",
            "--watch",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.qe.as_deref(), Some("healthelink"));
        assert_eq!(args.sftp_root.as_deref(), Some(std::path::Path::new("/tmp/SFTP")));
        assert_eq!(args.publish_fhir.as_deref(), Some("fhir.example.org/Bundle"));
        assert_eq!(args.publish_fhir_qe_id, Some(QeId::Hixny));
        assert!(args.watch);
    }

    #[test]
    fn test_cli_parse_rejects_unknown_qe_id() {
        let result = Cli::try_parse_from(["orchctl", "run", "--publish-fhir-qe-id", "NOWHERE"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parse_with_config() {
        let cli = Cli::parse_from(["orchctl", "--config", "custom.toml", "run"]);
        assert_eq!(cli.config, "custom.toml");
    }

    #[test]
    fn test_cli_parse_with_log_level() {
        let cli = Cli::parse_from(["orchctl", "--log-level", "debug", "run"]);
        assert_eq!(cli.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_cli_parse_validate_config() {
        let cli = Cli::parse_from(["orchctl", "validate-config"]);
        assert!(matches!(cli.command, Commands::ValidateConfig(_)));
    }

    #[test]
    fn test_cli_parse_status() {
        let cli = Cli::parse_from(["orchctl", "status"]);
        assert!(matches!(cli.command, Commands::Status(_)));
    }

    #[test]
    fn test_cli_parse_init() {
        let cli = Cli::parse_from(["orchctl", "init"]);
        assert!(matches!(cli.command, Commands::Init(_)));
    }
}
