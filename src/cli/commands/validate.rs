//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the orchctl configuration file.

use crate::config::load_config;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // load_config validates after applying environment overrides
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Configuration is invalid");
                println!("   Error: {e}");
                println!();
                return Ok(2); // Configuration error exit code
            }
        };

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  SFTP Root: {}", config.ingress.sftp_root.display());
        println!(
            "  Partner: {}",
            config.ingress.qe.as_deref().unwrap_or("(not set)")
        );
        println!("  Reference Data: {}", config.ingress.reference_data_home);
        println!(
            "  Mode: {}",
            if config.ingress.watch { "watch" } else { "drain" }
        );
        println!("  Group Size: {}", config.ingress.group_size);
        println!("  DuckDB: {}", config.engine.duckdb_cmd);
        println!("  SQLite: {}", config.engine.sqlite_cmd);
        println!(
            "  Diagnostics: excel={} fhir={} resource_db={}",
            config.diagnostics.excel, config.diagnostics.fhir, config.diagnostics.resource_db
        );
        match config.publish.resolved_endpoint() {
            Ok(Some(url)) => {
                println!("  FHIR Publish: {url}");
                println!(
                    "  FHIR Auth: {}",
                    if config.publish.auth_token.is_some() { "bearer token" } else { "none" }
                );
            }
            _ => println!("  FHIR Publish: disabled"),
        }
        println!();
        Ok(0)
    }
}
