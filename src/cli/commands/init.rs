//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "orchctl.toml")]
    pub output: String,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing orchctl configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2); // Configuration error exit code
        }

        match fs::write(&self.output, Self::generate_config()) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} and set ingress.sftp_root and ingress.qe", self.output);
                println!("  2. Make sure `duckdb` and `sqlite3` are on your PATH");
                println!("  3. Optionally set ORCHCTL_PUBLISH_AUTH_TOKEN in a .env file");
                println!("  4. Validate configuration: orchctl validate-config");
                println!("  5. Process inbound files: orchctl run");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {}", e);
                Ok(5) // Fatal error exit code
            }
        }
    }

    /// Commented default configuration
    fn generate_config() -> String {
        format!(
            r#"# orchctl configuration
# HRSN screening data orchestration
#
# Values may reference environment variables with ${{VAR}} syntax, and any key
# can be overridden with ORCHCTL_<SECTION>_<KEY> (for example ORCHCTL_INGRESS_QE).

[application]
# trace, debug, info, warn or error
log_level = "info"

[ingress]
# Partner files land in <sftp_root>/<qe>/ingress
sftp_root = "/SFTP"
qe = "healthelink"
# Local directory or URL with the code-system reference CSV files
reference_data_home = "{reference}"
# Keep polling the inbound directory instead of draining it once
watch = false
poll_interval_ms = 1000
# Move consumed files into egress/<session>/.consumed instead of deleting them
archive_consumed = true
# Number of screening files that complete a group
group_size = 3

[engine]
duckdb_cmd = "duckdb"
sqlite_cmd = "sqlite3"
# SQL prepended to every batch
preamble_sql = "SET autoinstall_known_extensions=true;\nSET autoload_known_extensions=true;"
# Sequential identifiers for reproducible diagnostics
deterministic_ids = false

[diagnostics]
excel = true
fhir = true
resource_db = true

[publish]
# Host and path of the FHIR Bundle endpoint; leave unset to disable publishing
# fhir_endpoint = "fhir.example.org/Bundle"
# BRONX, HEALTHECONN, GRRHIO, HEALTHIX, HEALTHELINK or HIXNY
qe_id = "HEALTHELINK"
# auth_token = "${{FHIR_AUTH_TOKEN}}"
timeout_seconds = 30

[logging]
local_enabled = false
local_path = "./logs"
# daily, hourly or never
local_rotation = "daily"
"#,
            reference = crate::config::DEFAULT_REFERENCE_DATA_HOME
        )
    }
}
