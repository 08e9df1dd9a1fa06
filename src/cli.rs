use crate::config;
use crate::config::LanternConfig;
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "🔦 lantern: an HTTP gateway for versioned peer-to-peer drives"
)]
pub struct Cli {
    /// Path to the lantern configuration file.
    #[arg(
        short,
        long,
        value_name = "FILE",
        global = true, // allows specifying --config before or after subcommand
        default_value = "lantern.toml"
    )]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run lantern (default command)
    Run,

    /// Validate the configuration file and exit.
    Validate,

    /// Create a basic lantern.toml config file in the current directory.
    #[command(name = "create-config")]
    CreateConfig {
        /// Overwrite existing lantern.toml file if present.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    // NOTE: 'help' and 'version' subcommands/flags are automatically handled by clap
    // based on the attributes on the `Cli` struct and Cargo.toml.
}

pub fn parse_args() -> Cli {
    Cli::parse()
}

// --- Command Implementations ---

pub(crate) async fn validate_config_cmd(
    config_path: &Path,
    config: Option<LanternConfig>,
) -> Result<()> {
    if config.is_none() {
        if !config_path.exists() {
            bail!("Configuration file not found: {}", config_path.display());
        }
        let config_path_str = config_path.to_str().ok_or_else(|| {
            anyhow::anyhow!(
                "Configuration path is not valid UTF-8: {}",
                config_path.display()
            )
        })?;

        config::load_and_validate_config(config_path_str)
            .await
            .with_context(|| format!("Validation failed for '{}'", config_path.display()))?;
    } else {
        debug!("Using pre-validated configuration for validation check.");
    }

    info!(
        "✅ Configuration file '{}' is valid.",
        config_path.display()
    );
    Ok(())
}

pub(crate) async fn create_default_config_cmd(config_path: &Path, force: bool) -> Result<PathBuf> {
    if config_path.exists() && !force {
        bail!(
            "Configuration file '{}' already exists. Use --force to overwrite.",
            config_path.display()
        );
    }

    let default_content = r#"# Default lantern Configuration
# Define at least one server instance below.

# Drive gateway:
# Serves every subdirectory of ./drives as a drive, keyed by its name.
# GET /<key>/<path> resolves <path> inside that drive.
[server.gateway]
listen_addr = "127.0.0.1:8080" # Use 0.0.0.0:8080 to listen on all interfaces

[server.gateway.handler]
type = "drive"
drives_root = "./drives" # Path relative to where 'lantern' runs
# writable = true        # Resolve unknown keys by creating fresh empty drives


# Health check endpoint on a separate port:
# [server.health]
# listen_addr = "127.0.0.1:8081"
#
# [server.health.handler]
# type = "health_check"


# Logging (optional):
# [logging]
# level = "info"          # trace, debug, info, warn, error
# format = "text"         # or "json"
# output = { type = "stdout" }
"#;

    fs::write(config_path, default_content)
        .await
        .with_context(|| {
            format!(
                "Failed to write default config to '{}'",
                config_path.display()
            )
        })?;

    let created_path = config_path.to_path_buf();
    info!(
        "✅ Successfully created default config file: {}",
        created_path.display()
    );
    Ok(created_path)
}
